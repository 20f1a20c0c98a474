use std::time::Duration;

pub const FRAME_WIDTH: u32 = 1280;
pub const FRAME_HEIGHT: u32 = 720;
pub const OVERLAY_HEIGHT: u32 = 40;
pub const FRAME_BACKGROUND: &str = "#f0f2f5";
pub const OVERLAY_COLOR: &str = "rgba(0, 0, 0, 0.5)";
pub const OVERLAY_TEXT_COLOR: &str = "white";
pub const OVERLAY_FONT: &str = "16px Arial";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Where each source lands in a recorded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub video: Rect,
    pub whiteboard: Rect,
    pub overlay: Rect,
    pub title_at: (u32, u32),
    pub timer_at: (u32, u32),
}

impl FrameLayout {
    /// Remote video on the left half, whiteboard on the right half and an
    /// overlay bar across the top
    pub fn new(width: u32, height: u32) -> Self {
        let half = width / 2;
        Self {
            width,
            height,
            video: Rect { x: 0, y: 0, width: half, height },
            whiteboard: Rect { x: half, y: 0, width: width - half, height },
            overlay: Rect { x: 0, y: 0, width, height: OVERLAY_HEIGHT.min(height) },
            title_at: (10, 25),
            timer_at: (width.saturating_sub(100), 25),
        }
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::new(FRAME_WIDTH, FRAME_HEIGHT)
    }
}

/// One drawing instruction of a composited frame, in paint order
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill { rect: Rect, color: &'static str },
    RemoteVideo { dest: Rect },
    Whiteboard { dest: Rect },
    Text { x: u32, y: u32, text: String, color: &'static str, font: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub elapsed: Duration,
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

/// What the compositor reads from the live session on every frame
pub trait FrameSource: Send + Sync {
    fn session_title(&self) -> String;

    /// Whether a remote stream is currently attached
    fn has_remote_video(&self) -> bool;
}

pub struct Compositor {
    layout: FrameLayout,
}

impl Compositor {
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn compose(&self, index: u64, elapsed: Duration, source: &dyn FrameSource) -> Frame {
        let layout = &self.layout;
        let mut ops = Vec::with_capacity(6);

        ops.push(DrawOp::Fill {
            rect: Rect { x: 0, y: 0, width: layout.width, height: layout.height },
            color: FRAME_BACKGROUND,
        });
        if source.has_remote_video() {
            ops.push(DrawOp::RemoteVideo { dest: layout.video });
        }
        ops.push(DrawOp::Whiteboard { dest: layout.whiteboard });

        ops.push(DrawOp::Fill { rect: layout.overlay, color: OVERLAY_COLOR });
        ops.push(overlay_text(layout.title_at, source.session_title()));
        ops.push(overlay_text(layout.timer_at, format_duration(elapsed.as_secs())));

        Frame { index, elapsed, width: layout.width, height: layout.height, ops }
    }
}

fn overlay_text((x, y): (u32, u32), text: String) -> DrawOp {
    DrawOp::Text { x, y, text, color: OVERLAY_TEXT_COLOR, font: OVERLAY_FONT }
}

/// `m:ss`, minutes unbounded
pub fn format_duration(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Session {
        video: bool,
    }

    impl FrameSource for Session {
        fn session_title(&self) -> String {
            "Algebra II".to_string()
        }

        fn has_remote_video(&self) -> bool {
            self.video
        }
    }

    #[test]
    fn default_layout_splits_the_frame() {
        let layout = FrameLayout::default();
        assert_eq!(layout.video, Rect { x: 0, y: 0, width: 640, height: 720 });
        assert_eq!(layout.whiteboard, Rect { x: 640, y: 0, width: 640, height: 720 });
        assert_eq!(layout.overlay.height, 40);
        assert_eq!(layout.timer_at, (1180, 25));
    }

    #[test]
    fn frame_paints_sources_then_overlay() {
        let compositor = Compositor::new(FrameLayout::default());
        let frame = compositor.compose(3, Duration::from_secs(75), &Session { video: true });

        assert_eq!(frame.ops.len(), 6);
        assert!(matches!(frame.ops[1], DrawOp::RemoteVideo { .. }));
        assert!(matches!(&frame.ops[4], DrawOp::Text { text, x: 10, y: 25, .. } if text == "Algebra II"));
        assert!(matches!(&frame.ops[5], DrawOp::Text { text, x: 1180, .. } if text == "1:15"));
    }

    #[test]
    fn missing_video_leaves_left_half_blank() {
        let compositor = Compositor::new(FrameLayout::default());
        let frame = compositor.compose(0, Duration::ZERO, &Session { video: false });
        assert!(!frame.ops.iter().any(|op| matches!(op, DrawOp::RemoteVideo { .. })));
        assert!(frame.ops.iter().any(|op| matches!(op, DrawOp::Whiteboard { .. })));
    }

    #[test]
    fn durations_are_minutes_and_padded_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(9), "0:09");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(3600), "60:00");
    }
}
