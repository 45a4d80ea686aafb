//! Field-role inference over a sample of schema-less records.
//!
//! Scoring and ranking are split: a [`FieldScorer`] rates one field for one
//! role, and [`FieldSuggester`] orders the positively scored fields per role.
//! Ties are broken by how closely the field name matches the role name, then
//! alphabetically, so suggestions are deterministic.

use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{BuddyError, BuddyResult};
use crate::mapping::{FieldMapping, FieldRole};
use crate::utils::sample_indices;

/// Observed values per field path, gathered from a handful of raw records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSample {
    fields: BTreeMap<String, Vec<Value>>,
}

impl FieldSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, value: Value) {
        self.fields.entry(field.into()).or_default().push(value);
    }

    /// Samples at most `sample_size` records and flattens nested objects into
    /// dotted paths (`meta.category`). Arrays are kept whole.
    pub fn from_records(records: &[Value], sample_size: usize, seed: Option<u64>) -> Self {
        let mut sample = FieldSample::new();
        for idx in sample_indices(records.len(), sample_size, seed) {
            if let Some(object) = records[idx].as_object() {
                sample.flatten_into("", object);
            }
        }
        debug!(records = records.len(), fields = sample.len(), "Built field sample");
        sample
    }

    fn flatten_into(&mut self, prefix: &str, object: &Map<String, Value>) {
        for (key, value) in object {
            let path = if prefix.is_empty() { key.clone() } else { format!("{}.{}", prefix, key) };
            match value {
                Value::Object(inner) if !inner.is_empty() => self.flatten_into(&path, inner),
                _ => self.push(path, value.clone()),
            }
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.fields.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Vec<Value>)> for FieldSample {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Value>)>>(iter: I) -> Self {
        FieldSample { fields: iter.into_iter().collect() }
    }
}

/// Ranked candidate field names per role, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSuggestions {
    candidates: BTreeMap<FieldRole, Vec<String>>,
}

impl FieldSuggestions {
    pub fn candidates(&self, role: FieldRole) -> &[String] {
        self.candidates.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn best(&self, role: FieldRole) -> Option<&str> {
        self.candidates(role).first().map(String::as_str)
    }

    /// Builds the mapping an operator gets by accepting every top candidate.
    pub fn default_mapping(&self) -> BuddyResult<FieldMapping> {
        let required = |role: FieldRole| {
            self.best(role).ok_or_else(|| {
                BuddyError::Configuration(format!("no candidate field found for required role '{}'", role))
            })
        };
        let mut mapping = FieldMapping::new(required(FieldRole::Embedding)?, required(FieldRole::Text)?)?;
        for role in FieldRole::ALL.into_iter().filter(|r| !r.is_required()) {
            if let Some(field) = self.best(role) {
                mapping = mapping.with(role, field)?;
            }
        }
        Ok(mapping)
    }
}

/// Rates how plausibly a field fills a role. Scores `<= 0` (or non-finite)
/// mean "not a candidate"; higher is better.
pub trait FieldScorer {
    fn score(&self, field_name: &str, samples: &[Value], role: FieldRole) -> f64;
}

/// Default scorer combining value shape with name matching.
///
/// - embedding: every sampled value is a numeric array longer than 1;
///   uniform lengths dominate, longer arrays rank higher.
/// - text: every sampled value is a string with mean length at least
///   `min_text_length`; longer strings rank higher.
/// - id / category / subcategory / tags: the field name must match the role
///   or a synonym, and values must have the right shape (scalars, or string
///   arrays for tags).
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    pub min_text_length: usize,
}

impl HeuristicScorer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        HeuristicScorer { min_text_length: config.min_text_length }
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        HeuristicScorer { min_text_length: 2 }
    }
}

const NAME_WEIGHT: f64 = 10.0;
const SHAPE_NAME_BONUS: f64 = 0.5;

impl FieldScorer for HeuristicScorer {
    fn score(&self, field_name: &str, samples: &[Value], role: FieldRole) -> f64 {
        let profile = ValueProfile::of(samples);
        if profile.present == 0 {
            return 0.0;
        }
        let affinity = name_affinity(field_name, role);

        match role {
            FieldRole::Embedding => {
                if profile.numeric_arrays.len() != profile.present {
                    return 0.0;
                }
                let min = profile.numeric_arrays.iter().copied().min().unwrap_or(0);
                let max = profile.numeric_arrays.iter().copied().max().unwrap_or(0);
                if min <= 1 {
                    return 0.0;
                }
                let uniformity = min as f64 / max as f64;
                NAME_WEIGHT * uniformity + mean(&profile.numeric_arrays).ln_1p() + SHAPE_NAME_BONUS * affinity
            }
            FieldRole::Text => {
                if profile.strings.len() != profile.present {
                    return 0.0;
                }
                let mean_len = mean(&profile.strings);
                if mean_len < self.min_text_length.max(1) as f64 {
                    return 0.0;
                }
                mean_len.ln_1p() + SHAPE_NAME_BONUS * affinity
            }
            FieldRole::Id => {
                if affinity == 0.0 || !profile.all_scalar() {
                    return 0.0;
                }
                NAME_WEIGHT * affinity + profile.distinct_ratio()
            }
            FieldRole::Category | FieldRole::Subcategory => {
                if affinity == 0.0 || !profile.all_scalar() {
                    return 0.0;
                }
                NAME_WEIGHT * affinity + (1.0 - profile.distinct_ratio())
            }
            FieldRole::Tags => {
                if affinity == 0.0 {
                    return 0.0;
                }
                if profile.string_arrays == profile.present {
                    NAME_WEIGHT * affinity + 1.0
                } else if profile.strings.len() == profile.present {
                    NAME_WEIGHT * affinity
                } else {
                    0.0
                }
            }
        }
    }
}

/// Ranks every field in a sample for every role with a pluggable scorer.
#[derive(Debug, Clone, Default)]
pub struct FieldSuggester<S = HeuristicScorer> {
    scorer: S,
}

impl<S: FieldScorer> FieldSuggester<S> {
    pub fn new(scorer: S) -> Self {
        FieldSuggester { scorer }
    }

    pub fn suggest(&self, sample: &FieldSample) -> FieldSuggestions {
        let candidates = FieldRole::ALL
            .iter()
            .map(|role| (*role, self.rank(sample, *role)))
            .collect();
        FieldSuggestions { candidates }
    }

    fn rank(&self, sample: &FieldSample, role: FieldRole) -> Vec<String> {
        let mut scored: Vec<(f64, u8, &str)> = sample
            .fields()
            .filter_map(|(name, values)| {
                let score = self.scorer.score(name, values, role);
                (score.is_finite() && score > 0.0).then(|| (score, closeness(name, role), name))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(b.2))
        });
        debug!(role = %role, candidates = scored.len(), "Ranked field candidates");
        scored.into_iter().map(|(_, _, name)| name.to_string()).collect()
    }
}

/// Suggests fields with the default heuristic scorer.
pub fn suggest(sample: &FieldSample) -> FieldSuggestions {
    FieldSuggester::new(HeuristicScorer::default()).suggest(sample)
}

#[derive(Debug, Default)]
struct ValueProfile {
    present: usize,
    numeric_arrays: Vec<usize>,
    strings: Vec<usize>,
    string_arrays: usize,
    integers: usize,
    distinct: usize,
}

impl ValueProfile {
    fn of(samples: &[Value]) -> Self {
        let mut profile = ValueProfile::default();
        let mut seen = HashSet::new();
        for value in samples.iter().filter(|v| !v.is_null()) {
            profile.present += 1;
            seen.insert(value.to_string());
            match value {
                Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_number) => {
                    profile.numeric_arrays.push(items.len())
                }
                Value::Array(items) if items.iter().all(Value::is_string) => profile.string_arrays += 1,
                Value::String(s) => profile.strings.push(s.chars().count()),
                Value::Number(n) if n.is_i64() || n.is_u64() => profile.integers += 1,
                _ => {}
            }
        }
        profile.distinct = seen.len();
        profile
    }

    fn all_scalar(&self) -> bool {
        self.strings.len() + self.integers == self.present
    }

    fn distinct_ratio(&self) -> f64 {
        self.distinct as f64 / self.present as f64
    }
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

fn synonyms(role: FieldRole) -> &'static [&'static str] {
    match role {
        FieldRole::Embedding => &["embeddings", "vector", "vectors", "vec", "emb", "dense", "knn"],
        FieldRole::Text => &["content", "body", "passage", "document", "message", "description", "chunk"],
        FieldRole::Id => &["_id", "uuid", "key", "identifier", "doc_id", "docid", "pk"],
        FieldRole::Category => &["categories", "cat", "class", "label", "type", "group", "topic", "genre"],
        FieldRole::Subcategory => &["sub_category", "subcat", "subtype", "subclass", "subgroup", "sublabel", "label"],
        FieldRole::Tags => &["tag", "keywords", "keyword", "labels", "topics"],
    }
}

/// Name-only match strength in `[0, 1]`: exact role name, exact synonym,
/// whole-token match, prefix, then substring (names of 3+ chars only).
fn name_affinity(field_name: &str, role: FieldRole) -> f64 {
    let name = leaf_name(field_name);
    let role_name = role.as_str();
    if name == role_name {
        return 1.0;
    }
    let synonyms = synonyms(role);
    if synonyms.contains(&name.as_str()) {
        return 0.9;
    }
    let terms: Vec<&str> = std::iter::once(role_name).chain(synonyms.iter().copied()).collect();
    let tokens: Vec<&str> = name.split(|c: char| c == '_' || c == '-' || c == ' ').filter(|t| !t.is_empty()).collect();
    if tokens.iter().any(|t| terms.contains(t)) {
        return 0.8;
    }
    let long_terms = terms.iter().filter(|t| t.len() >= 3);
    if long_terms.clone().any(|t| name.starts_with(t)) {
        return 0.7;
    }
    if long_terms.into_iter().any(|t| name.contains(t)) {
        return 0.5;
    }
    0.0
}

/// Tie-break rank: 0 exact role name, 1 prefix, 2 substring, 3 anything else.
fn closeness(field_name: &str, role: FieldRole) -> u8 {
    let name = leaf_name(field_name);
    let role_name = role.as_str();
    if name == role_name {
        0
    } else if name.starts_with(role_name) {
        1
    } else if name.contains(role_name) {
        2
    } else {
        3
    }
}

fn leaf_name(field_name: &str) -> String {
    field_name
        .rsplit('.')
        .next()
        .unwrap_or(field_name)
        .to_lowercase()
}
