//! Seam for the external dimensionality-reduction routine.

use ndarray::{Array2, ArrayView2};
use serde::{Serialize, Deserialize};
use std::str::FromStr;

use crate::error::{BuddyError, BuddyResult};

/// Supported reduction methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMethod {
    Pca,
    Tsne,
    Umap,
}

impl ReductionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionMethod::Pca => "pca",
            ReductionMethod::Tsne => "tsne",
            ReductionMethod::Umap => "umap",
        }
    }
}

impl FromStr for ReductionMethod {
    type Err = BuddyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pca" => Ok(ReductionMethod::Pca),
            "tsne" | "t-sne" => Ok(ReductionMethod::Tsne),
            "umap" => Ok(ReductionMethod::Umap),
            other => Err(BuddyError::InvalidInput(format!(
                "unknown reduction method '{}', expected one of: pca, tsne, umap",
                other
            ))),
        }
    }
}

/// Parameters handed to a [`Reducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionRequest {
    pub method: ReductionMethod,
    pub n_components: usize,
}

impl ReductionRequest {
    pub fn new(method: ReductionMethod, n_components: usize) -> BuddyResult<Self> {
        let request = ReductionRequest { method, n_components };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> BuddyResult<()> {
        validate_components(self.n_components)
    }
}

/// Reduced output always has 2 or 3 components per row.
pub fn validate_components(n_components: usize) -> BuddyResult<()> {
    if !matches!(n_components, 2 | 3) {
        return Err(BuddyError::InvalidInput(format!(
            "n_components must be 2 or 3, got {}",
            n_components
        )));
    }
    Ok(())
}

/// Output of a reduction run: one row per input row.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub coordinates: Array2<f32>,
    /// Explained variance ratio per component (PCA only).
    pub explained_variance: Option<Vec<f32>>,
}

/// An opaque dimensionality-reduction routine (PCA, t-SNE, UMAP, ...).
pub trait Reducer: Send + Sync {
    fn reduce(&self, matrix: ArrayView2<'_, f32>, request: &ReductionRequest) -> BuddyResult<Reduction>;
}
