//! Batch orchestration: parsing or mapping into [`ProcessedData`], and the
//! combine/split protocol around a single reduction call.
//!
//! Every `process_*` entry point returns a `ProcessedData` value; failures are
//! reported through its `error` field instead of being propagated.

use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::entity::Entity;
use crate::error::{BuddyError, BuddyResult};
use crate::mapping::{transform, FieldMapping};
use crate::parser::{self, entity_from_record};
use crate::suggest::{FieldSample, FieldSuggester, FieldSuggestions, HeuristicScorer};

/// Maximum number of offending records named in a dimension mismatch error.
const MAX_REPORTED_MISMATCHES: usize = 5;

/// Result of processing one uploaded or fetched batch.
///
/// Either `error` is set (and there are no entities), or `matrix` holds one
/// row per entity in entity order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedData {
    pub entities: Vec<Entity>,
    #[serde(skip)]
    pub matrix: Array2<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessedData {
    /// Validates cross-record embedding lengths and assembles the matrix.
    pub fn from_entities(entities: Vec<Entity>) -> BuddyResult<Self> {
        let matrix = build_matrix(&entities)?;
        Ok(ProcessedData { entities, matrix, error: None })
    }

    pub fn failed(error: &BuddyError) -> Self {
        ProcessedData {
            entities: Vec::new(),
            matrix: Array2::zeros((0, 0)),
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Embedding dimensionality, 0 for empty or failed batches.
    pub fn dimensions(&self) -> usize {
        self.matrix.ncols()
    }

    /// Usable as a combine input: no error and at least one entity.
    fn is_usable(&self) -> bool {
        self.is_ok() && !self.is_empty()
    }
}

/// Stacks entity embeddings into an `(n, d)` matrix.
///
/// Fails with a schema error naming the records whose length differs from
/// the first record's.
pub fn build_matrix(entities: &[Entity]) -> BuddyResult<Array2<f32>> {
    let Some(first) = entities.first() else {
        return Ok(Array2::zeros((0, 0)));
    };
    let dims = first.dimensions();

    let mismatched: Vec<(usize, &Entity)> = entities
        .iter()
        .enumerate()
        .filter(|(_, e)| e.dimensions() != dims)
        .collect();
    if !mismatched.is_empty() {
        let listed: Vec<String> = mismatched
            .iter()
            .take(MAX_REPORTED_MISMATCHES)
            .map(|(pos, e)| format!("'{}' at position {} has {}", e.id, pos, e.dimensions()))
            .collect();
        let more = mismatched.len().saturating_sub(MAX_REPORTED_MISMATCHES);
        let suffix = if more > 0 { format!(" (and {} more)", more) } else { String::new() };
        return Err(BuddyError::Schema(format!(
            "Inconsistent embedding dimensions: expected {} (from record '{}' at position 0), but {}{}",
            dims,
            first.id,
            listed.join(", "),
            suffix
        )));
    }

    let flat: Vec<f32> = entities.iter().flat_map(|e| e.embedding.iter().copied()).collect();
    Array2::from_shape_vec((entities.len(), dims), flat)
        .map_err(|e| BuddyError::Internal(format!("failed to assemble embedding matrix: {}", e)))
}

/// Combined reduction input: primary rows first, then secondary rows.
#[derive(Debug)]
pub struct Combined<'a> {
    pub matrix: Array2<f32>,
    pub primary: &'a [Entity],
    pub secondary: Option<&'a [Entity]>,
}

impl Combined<'_> {
    pub fn n_primary(&self) -> usize {
        self.primary.len()
    }

    pub fn n_secondary(&self) -> usize {
        self.secondary.map_or(0, <[Entity]>::len)
    }
}

/// Entry point for turning raw sources into validated batches.
#[derive(Debug, Clone)]
pub struct DataProcessor {
    config: PipelineConfig,
    suggester: FieldSuggester<HeuristicScorer>,
}

impl DataProcessor {
    pub fn new(config: PipelineConfig) -> BuddyResult<Self> {
        config.validate()?;
        let suggester = FieldSuggester::new(HeuristicScorer::from_config(&config));
        Ok(DataProcessor { config, suggester })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes an upload given as raw NDJSON bytes or a base64 data URL.
    pub fn process_upload(&self, contents: &[u8]) -> ProcessedData {
        self.finish("upload", self.parse_upload(contents))
    }

    pub fn process_text(&self, text: &str) -> ProcessedData {
        self.finish("text", parser::parse_text(text).and_then(ProcessedData::from_entities))
    }

    /// Maps raw external records with `mapping` and validates the survivors
    /// exactly as an upload would be.
    pub fn process_external(&self, records: &[Value], mapping: &FieldMapping) -> ProcessedData {
        self.finish("external", self.map_external(records, mapping))
    }

    /// Samples `records` and ranks candidate fields for every role.
    pub fn suggest_fields(&self, records: &[Value]) -> FieldSuggestions {
        let sample = FieldSample::from_records(records, self.config.field_sample_size, self.config.sample_seed);
        self.suggester.suggest(&sample)
    }

    pub fn suggest_from_sample(&self, sample: &FieldSample) -> FieldSuggestions {
        self.suggester.suggest(sample)
    }

    fn parse_upload(&self, contents: &[u8]) -> BuddyResult<ProcessedData> {
        if contents.len() > self.config.max_upload_bytes {
            return Err(BuddyError::PayloadTooLarge {
                size: contents.len(),
                limit: self.config.max_upload_bytes,
            });
        }
        let entities = if contents.starts_with(b"data:") {
            parser::parse_upload_contents(std::str::from_utf8(contents)?)?
        } else {
            parser::parse_bytes(contents)?
        };
        ProcessedData::from_entities(entities)
    }

    fn map_external(&self, records: &[Value], mapping: &FieldMapping) -> BuddyResult<ProcessedData> {
        let transformed = transform(records, mapping);
        let entities: Vec<Entity> = transformed
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| match entity_from_record(record, &format!("record {}", idx)) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    debug!(record = idx, error = %e, "Skipping invalid transformed record");
                    None
                }
            })
            .collect();
        if entities.is_empty() {
            return Err(BuddyError::MappingExhausted);
        }
        ProcessedData::from_entities(entities)
    }

    fn finish(&self, source: &str, result: BuddyResult<ProcessedData>) -> ProcessedData {
        match result {
            Ok(data) => {
                info!(source, count = data.len(), dims = data.dimensions(), "Processed batch");
                data
            }
            Err(e) => {
                warn!(source, kind = e.kind(), error = %e, "Batch processing failed");
                ProcessedData::failed(&e)
            }
        }
    }

    /// Stacks `secondary`'s rows after `primary`'s for a single reduction run.
    ///
    /// An errored or empty `secondary` is treated as absent.
    pub fn combine<'a>(
        &self,
        primary: &'a ProcessedData,
        secondary: Option<&'a ProcessedData>,
    ) -> BuddyResult<Combined<'a>> {
        if let Some(error) = &primary.error {
            return Err(BuddyError::InvalidInput(format!("primary data carries an error: {}", error)));
        }
        if primary.is_empty() {
            return Err(BuddyError::InvalidInput("primary data has no entities".to_string()));
        }

        let Some(secondary) = secondary.filter(|s| s.is_usable()) else {
            return Ok(Combined {
                matrix: primary.matrix.clone(),
                primary: &primary.entities,
                secondary: None,
            });
        };

        if secondary.dimensions() != primary.dimensions() {
            return Err(BuddyError::InvalidInput(format!(
                "secondary embeddings have {} dimensions, primary has {}",
                secondary.dimensions(),
                primary.dimensions()
            )));
        }
        let matrix = concatenate(Axis(0), &[primary.matrix.view(), secondary.matrix.view()])
            .map_err(|e| BuddyError::Internal(format!("failed to stack embedding matrices: {}", e)))?;
        debug!(n_primary = primary.len(), n_secondary = secondary.len(), "Combined embedding sets");

        Ok(Combined {
            matrix,
            primary: &primary.entities,
            secondary: Some(&secondary.entities),
        })
    }

    /// Inverse of [`combine`](Self::combine): rows `[0, n_primary)` are primary,
    /// the following `n_secondary` rows are secondary (absent when zero).
    pub fn split(
        &self,
        reduced: ArrayView2<'_, f32>,
        n_primary: usize,
        n_secondary: usize,
    ) -> BuddyResult<(Array2<f32>, Option<Array2<f32>>)> {
        let total = n_primary.checked_add(n_secondary).ok_or_else(|| {
            BuddyError::InvalidInput(format!("row counts {} + {} overflow", n_primary, n_secondary))
        })?;
        if reduced.nrows() != total {
            return Err(BuddyError::InvalidInput(format!(
                "reduced matrix has {} rows, expected {} ({} primary + {} secondary)",
                reduced.nrows(),
                total,
                n_primary,
                n_secondary
            )));
        }
        let primary = reduced.slice(s![..n_primary, ..]).to_owned();
        let secondary = (n_secondary > 0).then(|| reduced.slice(s![n_primary..total, ..]).to_owned());
        Ok((primary, secondary))
    }
}

impl Default for DataProcessor {
    fn default() -> Self {
        DataProcessor {
            config: PipelineConfig::default(),
            suggester: FieldSuggester::default(),
        }
    }
}
