//! Persistence layer: JSON file storage for the owner's system.

pub mod json_backend;
pub mod memory;
pub mod traits;

pub use json_backend::JsonFileStore;
pub use memory::MemoryStore;
pub use traits::SystemStore;
