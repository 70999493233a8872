//! Storage layer for atomic file operations and collection encoding.

mod atomic_file;
mod codec;

pub use atomic_file::{AtomicFileError, AtomicTextFile};
pub use codec::{CollectionCodec, JsonCollectionCodec};
