//! Text measurement, wrapping and truncation.
//!
//! Node labels are truncated to a single line with a `...` suffix; comment
//! bodies are wrapped into lines that fit the comment width. Both operations
//! take a [`TextMeasure`] so they can run against real font metrics
//! ([`FontMeasure`]) or a deterministic per-character width
//! ([`CharWidthMeasure`]).
//!
//! # Quick Start
//!
//! ```
//! # use flowcanvas_core::text::{CharWidthMeasure, truncate_label, wrap_lines};
//! let measure = CharWidthMeasure::new(10.0);
//!
//! let lines = wrap_lines("read the well-known file", 100.0, &measure);
//! assert_eq!(lines, vec!["read the", "well-known", "file"]);
//!
//! let label = truncate_label("Transform records", 80.0, &measure);
//! assert_eq!(label, "Trans...");
//! ```

use std::sync::{Mutex, OnceLock};

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping};
use log::{info, warn};
use thiserror::Error;

use crate::geometry::Size;

/// Suffix appended to truncated labels.
pub const ELLIPSIS: &str = "...";

/// Errors raised while measuring text with real font metrics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeasureError {
    #[error("font size must be greater than zero")]
    InvalidFontSize,

    #[error("font system is unavailable: {0}")]
    FontSystemUnavailable(String),
}

/// Measures the rendered width of a single line of text.
pub trait TextMeasure {
    fn text_width(&self, text: &str) -> f32;
}

// ====================================================================
// Measures
// ====================================================================

/// Fixed advance per character.
///
/// Deterministic, so wrap and truncation results can be asserted literally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharWidthMeasure {
    char_width: f32,
}

impl CharWidthMeasure {
    pub fn new(char_width: f32) -> Self {
        Self { char_width }
    }
}

impl Default for CharWidthMeasure {
    fn default() -> Self {
        Self::new(7.0)
    }
}

impl TextMeasure for CharWidthMeasure {
    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }
}

static FONT_SYSTEM: OnceLock<Mutex<FontSystem>> = OnceLock::new();

fn font_system() -> &'static Mutex<FontSystem> {
    FONT_SYSTEM.get_or_init(|| {
        info!("Initializing FontSystem");
        Mutex::new(FontSystem::new())
    })
}

/// Measures text with shaped font metrics from `cosmic-text`.
///
/// The underlying `FontSystem` is loaded once per process and shared by all
/// instances.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMeasure {
    font_family: String,
    font_size: u16,
}

impl FontMeasure {
    /// Creates a measure for the given font family and size in points.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::InvalidFontSize`] when `font_size` is zero.
    pub fn new(font_family: &str, font_size: u16) -> Result<Self, MeasureError> {
        if font_size == 0 {
            return Err(MeasureError::InvalidFontSize);
        }
        Ok(Self {
            font_family: font_family.to_string(),
            font_size,
        })
    }

    fn font_size_px(&self) -> f32 {
        self.font_size as f32 * 1.33
    }

    /// Measures the size of `text` in pixels.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::FontSystemUnavailable`] when the shared font
    /// system lock is poisoned.
    pub fn measure(&self, text: &str) -> Result<Size, MeasureError> {
        if text.is_empty() {
            return Ok(Size::default());
        }

        let mut font_system = font_system()
            .lock()
            .map_err(|err| MeasureError::FontSystemUnavailable(err.to_string()))?;

        let font_size_px = self.font_size_px();
        let metrics = Metrics::new(font_size_px, font_size_px * 1.15);

        let mut buffer = Buffer::new(&mut font_system, metrics);
        let mut buffer = buffer.borrow_with(&mut font_system);
        let attrs = Attrs::new().family(Family::Name(&self.font_family));

        buffer.set_size(None, None);
        buffer.set_text(text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(true);

        let mut max_width: f32 = 0.0;
        let mut total_height: f32 = 0.0;
        let mut has_runs = false;
        for run in buffer.layout_runs() {
            has_runs = true;
            if let Some(last) = run.glyphs.last() {
                max_width = max_width.max(last.x + last.w);
            }
            total_height += metrics.line_height;
        }

        if !has_runs {
            max_width = self.approximate_width(text);
            total_height = metrics.line_height;
        }

        Ok(Size::new(max_width, total_height))
    }

    fn approximate_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size_px() * 0.55
    }
}

impl TextMeasure for FontMeasure {
    fn text_width(&self, text: &str) -> f32 {
        match self.measure(text) {
            Ok(size) => size.width(),
            Err(err) => {
                warn!(err:%; "Falling back to approximate text width");
                self.approximate_width(text)
            }
        }
    }
}

// ====================================================================
// Wrapping and truncation
// ====================================================================

/// Splits `text` into words, each keeping its trailing space or hyphen.
fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if ch == ' ' || ch == '-' {
            let end = idx + ch.len_utf8();
            words.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        words.push(&text[start..]);
    }
    words
}

fn wrap_paragraph(paragraph: &str, width: f32, measure: &dyn TextMeasure) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in split_words(paragraph) {
        let candidate = format!("{current}{word}");
        if measure.text_width(candidate.trim_end()) <= width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(current.trim_end().to_string());
            current.clear();
        }

        if measure.text_width(word.trim_end()) <= width {
            current.push_str(word);
            continue;
        }

        // Word wider than the line: split it by character.
        for ch in word.chars() {
            current.push(ch);
            if current.chars().count() > 1 && measure.text_width(current.trim_end()) > width {
                current.pop();
                lines.push(current.trim_end().to_string());
                current.clear();
                current.push(ch);
            }
        }
    }

    lines.push(current.trim_end().to_string());
    lines
}

/// Wraps `text` into lines no wider than `width`.
///
/// Words break after spaces and hyphens; a line accumulates words until the
/// next one would overflow. A single word wider than `width` is split by
/// character. Explicit newlines always start a new line. Wrapping the joined
/// output again yields the same lines.
pub fn wrap_lines(text: &str, width: f32, measure: &dyn TextMeasure) -> Vec<String> {
    text.split('\n')
        .flat_map(|paragraph| wrap_paragraph(paragraph, width, measure))
        .collect()
}

/// Truncates `text` to a single line no wider than `width`, appending
/// [`ELLIPSIS`] when anything was cut.
///
/// The cut point is found by growing the kept prefix one character at a
/// time until the prefix plus ellipsis no longer fits. Truncating an already
/// truncated label returns it unchanged.
pub fn truncate_label(text: &str, width: f32, measure: &dyn TextMeasure) -> String {
    let single_line = text.lines().next().unwrap_or_default();
    if single_line.len() == text.len() && measure.text_width(text) <= width {
        return text.to_string();
    }

    let mut kept = String::new();
    let mut fitted = String::new();
    for ch in single_line.chars() {
        kept.push(ch);
        let candidate = format!("{}{ELLIPSIS}", kept.trim_end());
        if measure.text_width(&candidate) > width {
            break;
        }
        fitted = kept.trim_end().to_string();
    }

    format!("{fitted}{ELLIPSIS}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measure() -> CharWidthMeasure {
        CharWidthMeasure::new(10.0)
    }

    #[test]
    fn test_split_words_keeps_separators() {
        assert_eq!(split_words("a well-known fact"), vec!["a ", "well-", "known ", "fact"]);
        assert!(split_words("").is_empty());
    }

    #[test]
    fn test_wrap_fits_on_one_line() {
        assert_eq!(wrap_lines("short", 100.0, &measure()), vec!["short"]);
    }

    #[test]
    fn test_wrap_breaks_on_spaces() {
        let lines = wrap_lines("one two three four", 90.0, &measure());
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_wrap_breaks_on_hyphen() {
        let lines = wrap_lines("extract-transform-load", 110.0, &measure());
        assert_eq!(lines, vec!["extract-", "transform-", "load"]);
    }

    #[test]
    fn test_wrap_splits_long_word_by_character() {
        let lines = wrap_lines("abcdefghij xy", 40.0, &measure());
        assert_eq!(lines, vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn test_wrap_honors_newlines() {
        let lines = wrap_lines("first\n\nsecond", 200.0, &measure());
        assert_eq!(lines, vec!["first", "", "second"]);
    }

    #[test]
    fn test_wrap_narrower_than_one_char() {
        let lines = wrap_lines("abc", 5.0, &measure());
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_truncate_short_label_unchanged() {
        assert_eq!(truncate_label("Sort", 52.0, &measure()), "Sort");
    }

    #[test]
    fn test_truncate_long_label() {
        assert_eq!(truncate_label("Aggregate", 52.0, &measure()), "Ag...");
    }

    #[test]
    fn test_truncate_trims_space_before_ellipsis() {
        assert_eq!(truncate_label("ab cdefgh", 60.0, &measure()), "ab...");
    }

    #[test]
    fn test_truncate_too_narrow_for_ellipsis() {
        assert_eq!(truncate_label("Aggregate", 10.0, &measure()), "...");
    }

    #[test]
    fn test_truncate_multiline_keeps_first_line() {
        assert_eq!(truncate_label("ab\ncd", 100.0, &measure()), "ab...");
    }

    #[test]
    fn test_font_measure_rejects_zero_size() {
        assert_eq!(
            FontMeasure::new("sans-serif", 0),
            Err(MeasureError::InvalidFontSize)
        );
    }

    #[test]
    fn test_font_measure_empty_text() {
        let measure = FontMeasure::new("sans-serif", 12).unwrap();
        assert_eq!(measure.measure("").unwrap(), Size::default());
        assert!(measure.text_width("label") >= 0.0);
    }
}

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    fn text_strategy() -> impl Strategy<Value = String> {
        "[a-z \\-\n]{0,60}"
    }

    fn width_strategy() -> impl Strategy<Value = f32> {
        (1u32..30).prop_map(|chars| chars as f32 * 7.0)
    }

    // ===================
    // Property Test Functions
    // ===================

    /// Re-wrapping the joined lines must not move any break.
    fn check_wrap_idempotent(text: &str, width: f32) -> Result<(), TestCaseError> {
        let measure = CharWidthMeasure::default();
        let once = wrap_lines(text, width, &measure);
        let twice = wrap_lines(&once.join("\n"), width, &measure);
        prop_assert_eq!(once, twice);
        Ok(())
    }

    /// Every wrapped line fits, unless it is a single character.
    fn check_wrap_fits(text: &str, width: f32) -> Result<(), TestCaseError> {
        let measure = CharWidthMeasure::default();
        for line in wrap_lines(text, width, &measure) {
            prop_assert!(line.chars().count() <= 1 || measure.text_width(&line) <= width);
        }
        Ok(())
    }

    fn check_truncate_idempotent(text: &str, width: f32) -> Result<(), TestCaseError> {
        let measure = CharWidthMeasure::default();
        let once = truncate_label(text, width, &measure);
        let twice = truncate_label(&once, width, &measure);
        prop_assert_eq!(once, twice);
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn wrap_idempotent(text in text_strategy(), width in width_strategy()) {
            check_wrap_idempotent(&text, width)?;
        }

        #[test]
        fn wrap_fits(text in text_strategy(), width in width_strategy()) {
            check_wrap_fits(&text, width)?;
        }

        #[test]
        fn truncate_idempotent(text in text_strategy(), width in width_strategy()) {
            check_truncate_idempotent(&text, width)?;
        }
    }
}
