//! Repository Module
//!
//! Storage access layer: turns CRUD intents into engine requests and the
//! engine's replies into a small typed outcome.
//!
//! ## Outcome Classification
//! | Operation | empty result | engine/decode error       | transport error          |
//! |-----------|--------------|---------------------------|--------------------------|
//! | insert    | n/a          | AlreadyExists / InsertOperationFailed | InsertOperationFailed |
//! | select    | NotFound     | SelectOperationFailed     | Transport                |
//! | update    | NotFound     | UpdateOperationFailed     | UpdateOperationFailed    |
//! | delete    | NotFound     | DeleteOperationFailed     | DeleteOperationFailed    |

mod error;
mod kv;

pub use error::RepositoryError;
pub use kv::{classify_insert_outcome, KvRepository, Result, DEFAULT_SPACE};
