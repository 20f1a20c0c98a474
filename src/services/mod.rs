pub mod auth_service;
pub mod session_store;
