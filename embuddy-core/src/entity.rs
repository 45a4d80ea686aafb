use ndarray::Array1;
use serde::{Serialize, Deserialize};

/// Type alias for entity identifiers.
pub type EntityId = String;

/// Label shown for absent category/subcategory values.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// An embedding vector. Serialized as a plain JSON array of numbers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(pub Array1<f32>);

impl std::ops::Deref for Embedding {
    type Target = Array1<f32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(vec: Vec<f32>) -> Self {
        Embedding(Array1::from(vec))
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0.to_vec()
    }
}

/// Which of the two jointly visualised sets an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetRole {
    #[serde(rename = "document", alias = "documents")]
    Document,
    #[serde(rename = "prompt", alias = "prompts")]
    Prompt,
}

impl SetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetRole::Document => "document",
            SetRole::Prompt => "prompt",
        }
    }
}

impl std::fmt::Display for SetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document or prompt in canonical shape.
///
/// Optional metadata is stored exactly as received: absent stays `None`
/// (and `tags: Some(vec![])` is distinct from `None`). Defaults such as
/// [`UNKNOWN_LABEL`] are applied only by the `*_label` accessors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub text: String,
    pub embedding: Embedding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, text: impl Into<String>, embedding: impl Into<Embedding>) -> Self {
        Entity {
            id: id.into(),
            text: text.into(),
            embedding: embedding.into(),
            category: None,
            subcategory: None,
            tags: None,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }

    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn subcategory_label(&self) -> &str {
        self.subcategory.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}
