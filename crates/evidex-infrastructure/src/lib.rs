pub mod config_service;
pub mod dto;
pub mod http_reference_source;
pub mod json_conversation_repository;
pub mod memory_conversation_repository;
pub mod migration;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::http_reference_source::HttpReferenceSource;
pub use crate::json_conversation_repository::JsonConversationRepository;
pub use crate::memory_conversation_repository::InMemoryConversationRepository;
pub use crate::paths::EvidexPaths;
