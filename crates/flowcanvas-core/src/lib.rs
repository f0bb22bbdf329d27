//! flowcanvas Core Types and Algorithms
//!
//! This crate provides the renderer-agnostic foundation of the flowcanvas
//! diagram engine. It includes:
//!
//! - **Identifiers**: Interned, copyable object ids ([`identifier::Id`])
//! - **Colors**: CSS color handling ([`color::Color`])
//! - **Geometry**: Points, sizes, bounds and perimeter intersection ([`geometry`])
//! - **Model**: The pipeline tree of nodes, comments and links ([`model`])
//! - **Layout**: Pixel constants and mode flags ([`layout::CanvasLayout`])
//! - **Ports**: Derived port offsets ([`ports`])
//! - **Text**: Measurement, wrapping and truncation ([`text`])
//! - **Routing**: Link anchors and path strings ([`routing`])

pub mod color;
pub mod geometry;
pub mod identifier;
pub mod layout;
pub mod model;
pub mod ports;
pub mod routing;
pub mod text;
