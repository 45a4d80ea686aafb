//! Per-visualisation context holding the document and prompt batches.

use ndarray::{ArrayView2, Axis};
use serde::Serialize;
use tracing::{info, warn};

use crate::entity::{Entity, EntityId, SetRole, UNKNOWN_LABEL};
use crate::error::{BuddyError, BuddyResult};
use crate::processor::{Combined, DataProcessor, ProcessedData};
use crate::reduce::{validate_components, ReductionMethod, ReductionRequest, Reducer};

/// An entity placed in the shared reduced coordinate space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub set: SetRole,
    pub id: EntityId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub coordinates: Vec<f32>,
}

impl ProjectedPoint {
    fn new(set: SetRole, entity: &Entity, coordinates: Vec<f32>) -> Self {
        ProjectedPoint {
            set,
            id: entity.id.clone(),
            text: entity.text.clone(),
            category: entity.category.clone(),
            subcategory: entity.subcategory.clone(),
            tags: entity.tags.clone(),
            coordinates,
        }
    }

    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn subcategory_label(&self) -> &str {
        self.subcategory.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

/// Result of [`Session::project`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub method: ReductionMethod,
    pub n_components: usize,
    pub points: Vec<ProjectedPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explained_variance: Option<Vec<f32>>,
}

/// Holds at most one batch per [`SetRole`].
///
/// `generation` changes on every store or reset, so coordinates reduced from
/// an earlier [`reduction_input`](Session::reduction_input) can be told apart.
#[derive(Debug, Clone, Default)]
pub struct Session {
    documents: Option<ProcessedData>,
    prompts: Option<ProcessedData>,
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the batch held for `role`; the other role is left untouched.
    pub fn store(&mut self, role: SetRole, data: ProcessedData) {
        info!(set = %role, count = data.len(), errored = !data.is_ok(), "Storing batch in session");
        *self.slot_mut(role) = Some(data);
        self.bump_generation();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn get(&self, role: SetRole) -> Option<&ProcessedData> {
        match role {
            SetRole::Document => self.documents.as_ref(),
            SetRole::Prompt => self.prompts.as_ref(),
        }
    }

    fn slot_mut(&mut self, role: SetRole) -> &mut Option<ProcessedData> {
        match role {
            SetRole::Document => &mut self.documents,
            SetRole::Prompt => &mut self.prompts,
        }
    }

    /// Discards both batches at once.
    pub fn reset(&mut self) {
        self.documents = None;
        self.prompts = None;
        self.bump_generation();
        info!("Session reset");
    }

    /// Documents are primary, prompts secondary.
    pub fn reduction_input<'a>(&'a self, processor: &DataProcessor) -> BuddyResult<Combined<'a>> {
        let documents = self
            .documents
            .as_ref()
            .ok_or_else(|| BuddyError::InvalidInput("no documents have been loaded".to_string()))?;
        processor.combine(documents, self.prompts.as_ref())
    }

    /// Splits a reduced matrix (rows in [`reduction_input`](Self::reduction_input)
    /// order, 2 or 3 columns) back into tagged points.
    pub fn annotate(&self, processor: &DataProcessor, reduced: ArrayView2<'_, f32>) -> BuddyResult<Vec<ProjectedPoint>> {
        validate_components(reduced.ncols())?;
        let combined = self.reduction_input(processor)?;
        let (primary, secondary) = processor.split(reduced, combined.n_primary(), combined.n_secondary())?;

        let mut points = Vec::with_capacity(reduced.nrows());
        for (entity, row) in combined.primary.iter().zip(primary.axis_iter(Axis(0))) {
            points.push(ProjectedPoint::new(SetRole::Document, entity, row.to_vec()));
        }
        if let (Some(entities), Some(coords)) = (combined.secondary, secondary) {
            for (entity, row) in entities.iter().zip(coords.axis_iter(Axis(0))) {
                points.push(ProjectedPoint::new(SetRole::Prompt, entity, row.to_vec()));
            }
        }
        Ok(points)
    }

    /// [`annotate`](Self::annotate) for coordinates reduced out of process.
    /// `generation` is the value read together with the reduction input; any
    /// store or reset since then fails with `StaleGeneration`.
    pub fn annotate_generation(
        &self,
        processor: &DataProcessor,
        generation: u64,
        reduced: ArrayView2<'_, f32>,
    ) -> BuddyResult<Vec<ProjectedPoint>> {
        if generation != self.generation {
            return Err(BuddyError::StaleGeneration { given: generation, current: self.generation });
        }
        self.annotate(processor, reduced)
    }

    /// Runs combine, the external reducer and split as one chain.
    pub fn project(
        &self,
        processor: &DataProcessor,
        reducer: &dyn Reducer,
        request: &ReductionRequest,
    ) -> BuddyResult<Projection> {
        request.validate()?;
        let combined = self.reduction_input(processor)?;
        let reduction = reducer.reduce(combined.matrix.view(), request)?;

        let expected = (combined.matrix.nrows(), request.n_components);
        if reduction.coordinates.dim() != expected {
            return Err(BuddyError::Collaborator(format!(
                "reducer returned a {:?} matrix, expected {:?}",
                reduction.coordinates.dim(),
                expected
            )));
        }

        let explained_variance = match (request.method, reduction.explained_variance) {
            (ReductionMethod::Pca, variance) => variance,
            (method, Some(_)) => {
                warn!(method = method.as_str(), "Discarding explained variance from non-PCA reduction");
                None
            }
            (_, None) => None,
        };

        let points = self.annotate(processor, reduction.coordinates.view())?;
        Ok(Projection {
            method: request.method,
            n_components: request.n_components,
            points,
            explained_variance,
        })
    }
}
