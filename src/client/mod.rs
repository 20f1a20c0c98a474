//! Controllers that run inside each participant's client: the whiteboard
//! canvas, the WebRTC peer connection and the local recorder.

pub mod compositor;
pub mod library;
pub mod peer;
pub mod recording;
pub mod whiteboard;
