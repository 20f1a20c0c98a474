pub mod handler;
pub mod msg_chat_handler;
pub mod msg_draw_handler;
pub mod msg_join_handler;
pub mod msg_recording_handler;
pub mod msg_signal_handler;
