pub mod context;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use context::{Context, MessageRole, SerializableMessage};
pub use error::{FlowError, Result};
pub use storage::{InMemorySessionStorage, Session, SessionStorage};
