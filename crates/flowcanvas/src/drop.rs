//! Drag-and-drop payloads from the host.
//!
//! A drop arrives as raw transfer data, normally a JSON object of the form
//! `{"operation": "createFromTemplate", "data": {...}}`. Parsing is
//! defensive: anything that is not a well-formed payload is treated as a
//! generic external-object drop rather than failing the gesture.

use std::{fmt, str::FromStr};

use log::warn;
use serde::{Deserialize, Serialize};

use flowcanvas_core::{
    geometry::Point,
    identifier::Id,
    layout::CanvasLayout,
    model::{Node, Port},
};

use crate::controller::EditCommand;

/// What the drop asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DropOperation {
    CreateFromTemplate,
    CreateFromObject,
    AddToCanvas,
}

impl FromStr for DropOperation {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createFromTemplate" => Ok(Self::CreateFromTemplate),
            "createFromObject" => Ok(Self::CreateFromObject),
            "addToCanvas" => Ok(Self::AddToCanvas),
            _ => Err("Unsupported drop operation"),
        }
    }
}

impl From<DropOperation> for &'static str {
    fn from(val: DropOperation) -> Self {
        match val {
            DropOperation::CreateFromTemplate => "createFromTemplate",
            DropOperation::CreateFromObject => "createFromObject",
            DropOperation::AddToCanvas => "addToCanvas",
        }
    }
}

impl fmt::Display for DropOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = (*self).into();
        write!(f, "{s}")
    }
}

/// A palette template for a new node.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeTemplate {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub input_ports: Vec<String>,
    #[serde(default)]
    pub output_ports: Vec<String>,
}

impl NodeTemplate {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            image: None,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
        }
    }

    pub fn with_ports(mut self, inputs: &[&str], outputs: &[&str]) -> Self {
        self.input_ports = inputs.iter().map(|p| p.to_string()).collect();
        self.output_ports = outputs.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Instantiates the template as a node with the layout's default size.
    pub fn to_node(&self, id: Id, position: Point, layout: &CanvasLayout) -> Node {
        let mut node = Node::new(&id.to_text(), &self.label, position.x(), position.y())
            .with_size(layout.default_node_width, layout.default_node_height);
        node.image = self.image.clone();
        node.input_ports = self.input_ports.iter().map(|p| Port::new(p)).collect();
        node.output_ports = self.output_ports.iter().map(|p| Port::new(p)).collect();
        node
    }
}

/// Dropped data after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum DropData {
    Template(NodeTemplate),
    /// Structured data the engine does not interpret.
    Object(serde_json::Value),
    /// Transfer data that was not valid JSON.
    Raw(String),
}

impl DropData {
    /// Best label for a node created from this data.
    pub fn label(&self) -> String {
        match self {
            DropData::Template(template) => template.label.clone(),
            DropData::Object(value) => value
                .get("label")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("External object")
                .to_string(),
            DropData::Raw(_) => "External object".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DropPayload {
    operation: DropOperation,
    #[serde(default)]
    data: serde_json::Value,
}

/// A parsed drop.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDrop {
    operation: DropOperation,
    data: DropData,
}

impl ParsedDrop {
    pub fn operation(&self) -> DropOperation {
        self.operation
    }

    pub fn data(&self) -> &DropData {
        &self.data
    }

    /// The edit command that creates the dropped object at `position` in
    /// `pipeline_id`.
    pub fn into_command(self, pipeline_id: Id, position: Point) -> EditCommand {
        match (self.operation, self.data) {
            (DropOperation::CreateFromTemplate, DropData::Template(template)) => EditCommand::CreateFromTemplate {
                pipeline_id,
                template,
                position,
            },
            (DropOperation::AddToCanvas, data) => EditCommand::AddToCanvas {
                pipeline_id,
                data,
                position,
            },
            (_, data) => EditCommand::CreateFromObject {
                pipeline_id,
                data,
                position,
            },
        }
    }
}

/// Parses raw drop transfer data.
///
/// Never fails: unparsable data becomes a [`DropOperation::CreateFromObject`]
/// drop carrying the raw text, and a template drop whose data is not a valid
/// template falls back to an object drop carrying that data.
pub fn parse_drop(raw: &str) -> ParsedDrop {
    let payload: DropPayload = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(err:%; "Malformed drop payload, treating as external object");
            let data = match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value) => DropData::Object(value),
                Err(_) => DropData::Raw(raw.to_string()),
            };
            return ParsedDrop {
                operation: DropOperation::CreateFromObject,
                data,
            };
        }
    };

    match payload.operation {
        DropOperation::CreateFromTemplate => match serde_json::from_value::<NodeTemplate>(payload.data.clone()) {
            Ok(template) => ParsedDrop {
                operation: DropOperation::CreateFromTemplate,
                data: DropData::Template(template),
            },
            Err(err) => {
                warn!(err:%; "Invalid node template in drop, treating as external object");
                ParsedDrop {
                    operation: DropOperation::CreateFromObject,
                    data: DropData::Object(payload.data),
                }
            }
        },
        operation => ParsedDrop {
            operation,
            data: DropData::Object(payload.data),
        },
    }
}
