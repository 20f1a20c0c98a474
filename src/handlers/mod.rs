pub mod diagnostics;
pub mod health;
pub mod participants;
pub mod tickets;

pub use diagnostics::*;
pub use health::*;
pub use participants::*;
pub use tickets::*;
