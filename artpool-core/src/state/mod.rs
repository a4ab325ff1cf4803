//! Durable, crash-safe JSON state.
//!
//! Every write goes to a sibling temp path and is renamed over the target,
//! so readers (including the management UI) never see a half-written
//! document. Unreadable documents are treated as absent.

pub mod atomic;
pub mod rotation;
pub mod side_files;

pub use atomic::{
    StagedWrite, read_json_or_default, stage_bytes, write_bytes_atomic,
    write_json_atomic,
};
pub use rotation::{RotationState, RotationStateDoc, RotationStateStore};
pub use side_files::{
    FingerprintIndex, LanguageIndex, PoolOrder, PoolSideFiles, UNKNOWN_LANGUAGE,
};
