pub mod connctx;
pub mod membership;
pub mod registry;
pub mod tickets;
