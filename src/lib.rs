pub mod api;
pub mod chat_management;
pub mod config;
pub mod export;
pub mod io;
pub mod logging;
pub mod models;
pub mod service;
pub mod session;
pub mod source;

// Re-export the main error types for convenience
pub use api::innertube::FetchError;
pub use chat_management::ConfigurationError;
pub use export::ExportError;
pub use io::ImportError;
pub use source::SourceError;

// Re-export the engine stages
pub use chat_management::{
    eligible_participants, select, select_with_config, Aggregator, FilterConfig, FilterPipeline,
    SelectionConfig, Snapshot,
};
pub use models::{
    AuditRecord, ChatMessage, EligibilityResult, Participant, SelectionOutcome, SourceMode,
};
pub use session::{DrawResult, GiveawaySession};
pub use source::{Batch, ChatTransport, MessageSource, PageToken};

// Re-export the live chat client
pub use api::innertube::{InnerTube, InnerTubeTransport};
