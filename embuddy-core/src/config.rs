use serde::{Serialize, Deserialize};
use crate::error::{BuddyResult, BuddyError};

/// Limits and tuning knobs for the ingestion pipeline.
///
/// Read-only once a [`DataProcessor`](crate::processor::DataProcessor) has been built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Largest upload accepted by `process_upload`, in bytes.
    pub max_upload_bytes: usize,
    /// Number of raw records inspected when inferring field suggestions.
    pub field_sample_size: usize,
    /// Number of records fetched from an external index when the caller gives no limit.
    pub default_fetch_limit: usize,
    /// Upper bound applied to any requested fetch limit.
    pub max_fetch_limit: usize,
    /// Mean character length a string field needs before it is offered as a text candidate.
    pub min_text_length: usize,
    /// Seed for record sampling. If None, uses random seed.
    pub sample_seed: Option<u64>,
}

impl PipelineConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> BuddyResult<()> {
        if self.max_upload_bytes == 0 {
            return Err(BuddyError::Configuration("max_upload_bytes must be greater than 0".to_string()));
        }
        if self.field_sample_size == 0 {
            return Err(BuddyError::Configuration("field_sample_size must be greater than 0".to_string()));
        }
        if self.max_fetch_limit == 0 {
            return Err(BuddyError::Configuration("max_fetch_limit must be greater than 0".to_string()));
        }
        if self.default_fetch_limit == 0 || self.default_fetch_limit > self.max_fetch_limit {
            return Err(BuddyError::Configuration(format!(
                "default_fetch_limit must be between 1 and max_fetch_limit ({})",
                self.max_fetch_limit
            )));
        }
        Ok(())
    }

    /// Clamps a caller-requested fetch limit into `1..=max_fetch_limit`.
    pub fn fetch_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_fetch_limit)
            .clamp(1, self.max_fetch_limit)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_upload_bytes: 50 * 1024 * 1024,
            field_sample_size: 100,
            default_fetch_limit: 100,
            max_fetch_limit: 10_000,
            min_text_length: 2,
            sample_seed: None,
        }
    }
}
