pub mod config;
pub mod normalize;
pub mod rag;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use normalize::{combine_to_iso, normalize_date, normalize_time, NormalizeError};
pub use rag::{CorpusIndex, RagError, RetrievedChunk};
