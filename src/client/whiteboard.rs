use std::collections::HashMap;
use tracing::{debug, trace};

use crate::models::{DrawEvent, DrawMessage, Tool};

/// Colour the canvas is cleared to, also used by the eraser
pub const CANVAS_BACKGROUND: &str = "#ffffff";
pub const ERASER_WIDTH: f64 = 20.0;

/// One item of the rendered whiteboard
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Stroke {
        color: String,
        line_width: f64,
        points: Vec<(f64, f64)>,
    },
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
}

/// Client-side whiteboard of one participant.
///
/// Local input is applied to the display list and queued as [`DrawMessage`]s
/// in an outbox the transport drains. Remote events go through
/// [`Whiteboard::apply_remote`], which ignores the participant's own echoes and
/// never queues anything while a remote event is being applied.
pub struct Whiteboard {
    session_id: String,
    user_id: String,
    tool: Tool,
    color: String,
    line_width: f64,
    shapes: Vec<Shape>,
    /// Stroke in progress per author
    active: HashMap<String, Shape>,
    applying_remote: bool,
    outbox: Vec<DrawMessage>,
}

impl Whiteboard {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            tool: Tool::Pen,
            color: "#000000".to_string(),
            line_width: 2.0,
            shapes: Vec::new(),
            active: HashMap::new(),
            applying_remote: false,
            outbox: Vec::new(),
        }
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn set_line_width(&mut self, line_width: f64) {
        self.line_width = line_width;
    }

    /// Committed shapes, oldest first
    pub fn display_list(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_drawing(&self) -> bool {
        self.active.contains_key(&self.user_id)
    }

    /// Drain the events waiting to be sent to the room
    pub fn take_outbox(&mut self) -> Vec<DrawMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Begin a stroke. A stroke still in progress is finished first, so every
    /// `start` on the wire is closed by one `stop`.
    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if self.is_drawing() {
            self.local(DrawEvent::Stop);
        }
        let event = DrawEvent::Start {
            x,
            y,
            tool: self.tool,
            color: self.color.clone(),
            line_width: self.line_width,
        };
        self.local(event);
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if self.is_drawing() {
            self.local(DrawEvent::Draw { x, y });
        }
    }

    pub fn pointer_up(&mut self) {
        if self.is_drawing() {
            self.local(DrawEvent::Stop);
        }
    }

    pub fn place_text(&mut self, x: f64, y: f64, text: impl Into<String>) {
        let event = DrawEvent::Text { x, y, text: text.into(), color: self.color.clone() };
        self.local(event);
    }

    pub fn draw_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let event = DrawEvent::Rect { x, y, width, height, color: self.color.clone() };
        self.local(event);
    }

    pub fn draw_circle(&mut self, x: f64, y: f64, radius: f64) {
        let event = DrawEvent::Circle { x, y, radius, color: self.color.clone() };
        self.local(event);
    }

    /// Wipe the canvas here and on every other whiteboard in the room
    pub fn clear(&mut self) {
        self.local(DrawEvent::Clear);
    }

    /// Apply an event received from the room. Returns `false` when the event
    /// was this participant's own echo and has been ignored.
    pub fn apply_remote(&mut self, msg: &DrawMessage) -> bool {
        let author = msg.user_id.as_deref().unwrap_or_default();
        if author == self.user_id {
            trace!("Ignoring echo of own {} event", msg.event.kind());
            return false;
        }

        self.applying_remote = true;
        self.record(author, msg.event.clone());
        self.applying_remote = false;
        true
    }

    fn local(&mut self, event: DrawEvent) {
        let author = self.user_id.clone();
        self.record(&author, event);
    }

    /// Render an event and queue it for the room unless it came from the room
    fn record(&mut self, author: &str, event: DrawEvent) {
        self.render(author, &event);
        if self.applying_remote {
            return;
        }
        self.outbox.push(DrawMessage {
            session_id: Some(self.session_id.clone()),
            user_id: Some(self.user_id.clone()),
            event,
        });
    }

    fn render(&mut self, author: &str, event: &DrawEvent) {
        match event {
            DrawEvent::Start { x, y, tool, color, line_width } => {
                let (color, line_width) = match tool {
                    Tool::Eraser => (CANVAS_BACKGROUND.to_string(), ERASER_WIDTH),
                    _ => (color.clone(), *line_width),
                };
                let stroke = Shape::Stroke { color, line_width, points: vec![(*x, *y)] };
                if let Some(unfinished) = self.active.insert(author.to_string(), stroke) {
                    debug!("Stroke by {} restarted before stop", author);
                    self.shapes.push(unfinished);
                }
            }
            DrawEvent::Draw { x, y } => match self.active.get_mut(author) {
                Some(Shape::Stroke { points, .. }) => points.push((*x, *y)),
                _ => trace!("Draw point from {} without an active stroke", author),
            },
            DrawEvent::Stop => {
                if let Some(stroke) = self.active.remove(author) {
                    self.shapes.push(stroke);
                }
            }
            DrawEvent::Text { x, y, text, color } => self.shapes.push(Shape::Text {
                x: *x,
                y: *y,
                text: text.clone(),
                color: color.clone(),
            }),
            DrawEvent::Rect { x, y, width, height, color } => self.shapes.push(Shape::Rect {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                color: color.clone(),
            }),
            DrawEvent::Circle { x, y, radius, color } => self.shapes.push(Shape::Circle {
                x: *x,
                y: *y,
                radius: *radius,
                color: color.clone(),
            }),
            DrawEvent::Clear => {
                self.shapes.clear();
                self.active.clear();
            }
        }
    }
}
