//! Canonical roles, operator-confirmed field mappings and record transformation.

use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::error::{BuddyError, BuddyResult};

/// A slot in the canonical entity shape that an external field can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Embedding,
    Text,
    Id,
    Category,
    Subcategory,
    Tags,
}

impl FieldRole {
    pub const ALL: [FieldRole; 6] = [
        FieldRole::Embedding,
        FieldRole::Text,
        FieldRole::Id,
        FieldRole::Category,
        FieldRole::Subcategory,
        FieldRole::Tags,
    ];

    /// Canonical key of this role in a transformed record.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldRole::Embedding => "embedding",
            FieldRole::Text => "text",
            FieldRole::Id => "id",
            FieldRole::Category => "category",
            FieldRole::Subcategory => "subcategory",
            FieldRole::Tags => "tags",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, FieldRole::Embedding | FieldRole::Text)
    }
}

impl std::fmt::Display for FieldRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role → source field name association, validated on construction.
///
/// `embedding` and `text` are always present; the other roles are optional.
/// Field names may be literal keys or dotted paths into nested objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<FieldRole, Option<String>>",
    into = "BTreeMap<FieldRole, Option<String>>"
)]
pub struct FieldMapping {
    embedding: String,
    text: String,
    id: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    tags: Option<String>,
}

impl FieldMapping {
    pub fn new(embedding: impl Into<String>, text: impl Into<String>) -> BuddyResult<Self> {
        Ok(FieldMapping {
            embedding: validate_field_name(FieldRole::Embedding, embedding.into())?,
            text: validate_field_name(FieldRole::Text, text.into())?,
            id: None,
            category: None,
            subcategory: None,
            tags: None,
        })
    }

    /// Maps every role onto the field of the same name.
    pub fn identity() -> Self {
        FieldMapping {
            embedding: "embedding".to_string(),
            text: "text".to_string(),
            id: Some("id".to_string()),
            category: Some("category".to_string()),
            subcategory: Some("subcategory".to_string()),
            tags: Some("tags".to_string()),
        }
    }

    /// Returns a copy with `role` mapped to `field`.
    pub fn with(mut self, role: FieldRole, field: impl Into<String>) -> BuddyResult<Self> {
        let field = validate_field_name(role, field.into())?;
        match role {
            FieldRole::Embedding => self.embedding = field,
            FieldRole::Text => self.text = field,
            FieldRole::Id => self.id = Some(field),
            FieldRole::Category => self.category = Some(field),
            FieldRole::Subcategory => self.subcategory = Some(field),
            FieldRole::Tags => self.tags = Some(field),
        }
        Ok(self)
    }

    pub fn field(&self, role: FieldRole) -> Option<&str> {
        match role {
            FieldRole::Embedding => Some(&self.embedding),
            FieldRole::Text => Some(&self.text),
            FieldRole::Id => self.id.as_deref(),
            FieldRole::Category => self.category.as_deref(),
            FieldRole::Subcategory => self.subcategory.as_deref(),
            FieldRole::Tags => self.tags.as_deref(),
        }
    }

    /// Iterates over mapped roles in [`FieldRole::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldRole, &str)> + '_ {
        FieldRole::ALL
            .iter()
            .filter_map(move |role| self.field(*role).map(|field| (*role, field)))
    }
}

fn validate_field_name(role: FieldRole, field: String) -> BuddyResult<String> {
    if field.trim().is_empty() {
        return Err(BuddyError::Configuration(format!(
            "field name for role '{}' must not be blank",
            role
        )));
    }
    Ok(field)
}

impl TryFrom<BTreeMap<FieldRole, Option<String>>> for FieldMapping {
    type Error = BuddyError;

    fn try_from(mut roles: BTreeMap<FieldRole, Option<String>>) -> Result<Self, Self::Error> {
        let mut take_required = |role: FieldRole| {
            roles.remove(&role).flatten().ok_or_else(|| {
                BuddyError::Configuration(format!("mapping is missing required role '{}'", role))
            })
        };
        let embedding = take_required(FieldRole::Embedding)?;
        let text = take_required(FieldRole::Text)?;

        let mut mapping = FieldMapping::new(embedding, text)?;
        for (role, field) in roles {
            if let Some(field) = field {
                mapping = mapping.with(role, field)?;
            }
        }
        Ok(mapping)
    }
}

impl From<FieldMapping> for BTreeMap<FieldRole, Option<String>> {
    fn from(mapping: FieldMapping) -> Self {
        FieldRole::ALL
            .iter()
            .map(|role| (*role, mapping.field(*role).map(str::to_string)))
            .collect()
    }
}

/// Looks up `field` in `record`, first as a literal key, then as a dotted path.
pub(crate) fn lookup<'a>(record: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(field) {
        return Some(value);
    }
    let mut segments = field.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Rewrites raw external records into canonical-shaped JSON objects.
///
/// Only mapped fields are copied. Records without a string `text` or a
/// non-empty numeric `embedding` after mapping are dropped, as are records
/// that are not JSON objects. Records whose mapped id is missing or empty get
/// `doc_<position in output>`, suffixed with `_<k>` when that would collide
/// with any mapped id in the batch or an id already assigned.
pub fn transform(records: &[Value], mapping: &FieldMapping) -> Vec<Map<String, Value>> {
    let mut output = Vec::with_capacity(records.len());
    let mut taken_ids: HashSet<String> = records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|record| mapped_id(record, mapping))
        .collect();

    for (idx, raw) in records.iter().enumerate() {
        let Some(record) = raw.as_object() else {
            debug!(record = idx, "Dropping record: not a JSON object");
            continue;
        };

        let embedding = match lookup(record, &mapping.embedding) {
            Some(value) if is_numeric_array(value) => value.clone(),
            _ => {
                debug!(record = idx, field = %mapping.embedding, "Dropping record: no numeric embedding");
                continue;
            }
        };
        let text = match lookup(record, &mapping.text) {
            Some(Value::String(s)) => s.clone(),
            _ => {
                debug!(record = idx, field = %mapping.text, "Dropping record: no text");
                continue;
            }
        };

        let mut canonical = Map::new();
        let id = mapped_id(record, mapping).unwrap_or_else(|| synthetic_id(output.len(), &taken_ids));
        taken_ids.insert(id.clone());

        canonical.insert("id".to_string(), Value::String(id));
        canonical.insert("text".to_string(), Value::String(text));
        canonical.insert("embedding".to_string(), embedding);

        for (role, field) in [(FieldRole::Category, &mapping.category), (FieldRole::Subcategory, &mapping.subcategory)] {
            if let Some(label) = field.as_deref().and_then(|f| lookup(record, f)).and_then(scalar_to_string) {
                canonical.insert(role.as_str().to_string(), Value::String(label));
            }
        }
        if let Some(tags) = mapping.tags.as_deref().and_then(|f| lookup(record, f)).and_then(tags_value) {
            canonical.insert("tags".to_string(), tags);
        }

        output.push(canonical);
    }

    info!(input = records.len(), output = output.len(), "Transformed external records");
    output
}

fn mapped_id(record: &Map<String, Value>, mapping: &FieldMapping) -> Option<String> {
    mapping
        .id
        .as_deref()
        .and_then(|field| lookup(record, field))
        .and_then(scalar_to_string)
        .filter(|id| !id.is_empty())
}

fn is_numeric_array(value: &Value) -> bool {
    matches!(value, Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_number))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn tags_value(value: &Value) -> Option<Value> {
    match value {
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(scalar_to_string)
                .map(Value::String)
                .collect(),
        )),
        Value::String(s) => Some(Value::Array(vec![Value::String(s.clone())])),
        _ => None,
    }
}

fn synthetic_id(position: usize, seen: &HashSet<String>) -> String {
    let base = format!("doc_{}", position);
    if !seen.contains(&base) {
        return base;
    }
    (1..)
        .map(|k| format!("{}_{}", base, k))
        .find(|candidate| !seen.contains(candidate))
        .unwrap_or(base)
}
