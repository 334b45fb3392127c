pub mod json_store;
pub mod manager;
pub mod store;

pub use json_store::JsonSessionStore;
pub use manager::SessionManager;
pub use store::{MemorySessionStore, SessionStore};
