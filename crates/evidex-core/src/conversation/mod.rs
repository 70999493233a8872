//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `message`: Transcript message types (`MessageRole`, `Message`)
//! - `model`: Versioned model (`Snapshot`, `Version`, `Container`)
//! - `repository`: Repository trait for persisting the collection

mod message;
mod model;
mod repository;

pub use message::{Message, MessageRole};
pub use model::{
    Container, ContainerSummary, DerivedArtifacts, SaveAction, Snapshot, Version, VersionSummary,
    new_id, timestamp_now,
};
pub use repository::ConversationRepository;
