//! Payload filters.
//!
//! Three operators, encoded in key suffixes: a bare key is an equality
//! match, `field__prefix` is a string-prefix match, `field__contains` a
//! substring match. A list value means any-of; all clauses must match.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Prefix,
    Contains,
}

#[derive(Debug, Clone)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOp,
    /// Any-of candidates (singular values become a one-element list).
    pub candidates: Vec<Value>,
}

impl FilterClause {
    fn matches(&self, payload: &Map<String, Value>) -> bool {
        let Some(actual) = payload.get(&self.field) else {
            return false;
        };
        self.candidates.iter().any(|cand| match self.op {
            FilterOp::Eq => actual == cand,
            FilterOp::Prefix => stringify(actual).starts_with(&stringify(cand)),
            FilterOp::Contains => stringify(actual).contains(&stringify(cand)),
        })
    }
}

/// Strings compare by their content, everything else by its JSON text.
fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayloadFilter {
    pub clauses: Vec<FilterClause>,
}

impl PayloadFilter {
    /// Parse the request-level filter map, decoding operator suffixes.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let clauses = map
            .iter()
            .map(|(key, value)| {
                let (field, op) = if let Some(field) = key.strip_suffix("__prefix") {
                    (field, FilterOp::Prefix)
                } else if let Some(field) = key.strip_suffix("__contains") {
                    (field, FilterOp::Contains)
                } else {
                    (key.as_str(), FilterOp::Eq)
                };
                let candidates = match value {
                    Value::Array(items) => items.clone(),
                    single => vec![single.clone()],
                };
                FilterClause {
                    field: field.to_owned(),
                    op,
                    candidates,
                }
            })
            .collect();
        Self { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True iff every clause matches (vacuously true when empty).
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        self.clauses.iter().all(|c| c.matches(payload))
    }

    /// Split into the exact-match clauses the vector store can push
    /// down and the prefix/contains remainder applied after merging.
    pub fn split_pushdown(&self) -> (PayloadFilter, PayloadFilter) {
        let (eq, rest): (Vec<_>, Vec<_>) = self
            .clauses
            .iter()
            .cloned()
            .partition(|c| c.op == FilterOp::Eq);
        (PayloadFilter { clauses: eq }, PayloadFilter { clauses: rest })
    }

    /// Render the equality clauses as a Qdrant `must` filter. Returns
    /// `None` when there is nothing to push down.
    pub fn to_qdrant(&self) -> Option<Value> {
        let must: Vec<Value> = self
            .clauses
            .iter()
            .filter(|c| c.op == FilterOp::Eq)
            .map(|c| {
                if c.candidates.len() == 1 {
                    serde_json::json!({ "key": c.field, "match": { "value": c.candidates[0] } })
                } else {
                    serde_json::json!({ "key": c.field, "match": { "any": c.candidates } })
                }
            })
            .collect();
        if must.is_empty() {
            None
        } else {
            Some(serde_json::json!({ "must": must }))
        }
    }
}
