//! I/O utilities for chat log import and raw response recording.

pub mod chat_import;
pub mod ndjson;
pub mod raw_response_recorder;

// Re-export commonly used types and functions
pub use chat_import::{import_file, parse_csv, parse_text, ImportError, ImportFormat, ImportReport};
pub use ndjson::replay_recording;
pub use raw_response_recorder::RawResponseRecorder;
