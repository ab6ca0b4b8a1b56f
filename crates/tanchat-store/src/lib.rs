//! tanchat-store: the embedded chat database
//!
//! An in-memory SQLite engine holding conversations, messages, prompts and
//! settings, mirrored after every committed mutation as a complete base64
//! snapshot in a durable key-value slot.
//!
//! The composition root builds one [`Engine`] over a [`DurableSlot`], calls
//! [`Engine::initialize`], and hands an `Arc` of it to [`ChatRepository`].

pub mod engine;
pub mod error;
pub mod model;
pub mod repository;
pub mod schema;
pub mod slot;
pub mod snapshot;

pub use engine::{Engine, EngineStatus, StoreConfig, DEFAULT_SNAPSHOT_KEY};
pub use error::{Result, StoreError};
pub use model::{Conversation, Message, NewMessage, Prompt, Role, Setting};
pub use repository::ChatRepository;
pub use slot::{DurableSlot, FileSlot, MemorySlot, SlotError};
