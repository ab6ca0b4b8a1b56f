//! Typed CRUD operations over the chat store.
//!
//! Every mutating call commits in one transaction and writes a fresh snapshot
//! to the durable slot before returning. Reads never touch the slot.

mod conversations;
mod messages;
mod prompts;
mod settings;

use std::sync::Arc;

use chrono::Utc;

use crate::engine::Engine;

/// Repository over a shared engine.
#[derive(Debug, Clone)]
pub struct ChatRepository {
    engine: Arc<Engine>,
}

impl ChatRepository {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Current time in Unix seconds, the unit the schema defaults use.
fn now() -> i64 {
    Utc::now().timestamp()
}
