pub mod config;
pub mod entity;
pub mod error;
pub mod mapping;
pub mod parser;
pub mod processor;
pub mod reduce;
pub mod session;
pub mod source;
pub mod suggest;
pub mod utils;

// Re-export key types/traits for easier use
pub use config::PipelineConfig;
pub use entity::{Embedding, Entity, EntityId, SetRole};
pub use error::{BuddyError, BuddyResult};
pub use mapping::{FieldMapping, FieldRole};
pub use processor::{Combined, DataProcessor, ProcessedData};
pub use reduce::{Reducer, Reduction, ReductionMethod, ReductionRequest};
pub use session::{ProjectedPoint, Projection, Session};
pub use source::{ClientReply, Credentials, ExternalSource, IndexClient};
pub use suggest::{FieldSample, FieldScorer, FieldSuggester, FieldSuggestions, HeuristicScorer};
