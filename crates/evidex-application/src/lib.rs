pub mod app;
pub mod conversation_store;
pub mod reference;
pub mod telemetry;

pub use crate::app::EvidexApp;
pub use crate::conversation_store::{
    ExportedConversation, ImportedConversation, SaveOutcome, VersionedConversationStore,
};
pub use crate::reference::{
    BatchResolution, DeepDiveState, EvidenceSession, LookupState, ReferenceResolutionService,
    RetryPolicy,
};
