pub mod chat;
pub mod diagnostics;
pub mod draw;
pub mod error;
pub mod events;
pub mod health;
pub mod id;
pub mod participants;
pub mod presence;
pub mod signaling;
pub mod ticket;

pub use chat::*;
pub use diagnostics::*;
pub use draw::*;
pub use error::*;
pub use events::*;
pub use health::*;
pub use participants::*;
pub use presence::*;
pub use signaling::*;
pub use ticket::*;
