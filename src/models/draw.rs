use serde::{Deserialize, Serialize};

use super::id::opt_id;

/// Whiteboard tool selected by the drawing client
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
    Text,
    Shape,
}

/// Drawing vocabulary shared by every whiteboard in a room.
///
/// `Start`, `Draw` and `Stop` describe one freehand stroke: a `Start`, any
/// number of `Draw` points and exactly one `Stop`. The other kinds are one-shot
/// placements.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DrawEvent {
    Start {
        x: f64,
        y: f64,
        #[serde(default)]
        tool: Tool,
        color: String,
        #[serde(rename = "lineWidth")]
        line_width: f64,
    },
    Draw {
        x: f64,
        y: f64,
    },
    Stop,
    Text {
        x: f64,
        y: f64,
        text: String,
        color: String,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: String,
    },
    Circle {
        x: f64,
        y: f64,
        radius: f64,
        color: String,
    },
    Clear,
}

impl DrawEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DrawEvent::Start { .. } => "start",
            DrawEvent::Draw { .. } => "draw",
            DrawEvent::Stop => "stop",
            DrawEvent::Text { .. } => "text",
            DrawEvent::Rect { .. } => "rect",
            DrawEvent::Circle { .. } => "circle",
            DrawEvent::Clear => "clear",
        }
    }
}

/// `draw` event payload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawMessage {
    #[serde(default, deserialize_with = "opt_id")]
    pub session_id: Option<String>,
    /// Stamped by the relay with the sender's registered user id
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub event: DrawEvent,
}
