//! Declarative queries: selector + sort + skip/limit, answered from an index.
//!
//! A query never sorts in memory. The [`IndexManager`] picks an index whose key
//! order matches the requested sort, the engine range-scans it between bounds
//! derived from the selector, re-checks the full selector on each entry, and
//! applies `skip`/`limit` as a cursor over the scan.

use crate::{
    collate::collate,
    error::{Error, Result},
    index::{Direction, IndexManager},
    Document,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Comparison on a single field. All present bounds must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl Condition {
    pub fn eq(value: impl Into<Value>) -> Self {
        Self {
            eq: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Self {
            gt: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        Self {
            gte: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Self {
            lt: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        Self {
            lte: Some(value.into()),
            ..Self::default()
        }
    }

    /// Inclusive range `[low, high]`.
    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self {
            gte: Some(low.into()),
            lte: Some(high.into()),
            ..Self::default()
        }
    }

    /// Whether the field is pinned to a single value.
    pub fn is_equality(&self) -> bool {
        self.eq.is_some()
    }

    /// Whether the condition bounds the field at all.
    pub fn is_bounded(&self) -> bool {
        self.eq.is_some()
            || self.gt.is_some()
            || self.gte.is_some()
            || self.lt.is_some()
            || self.lte.is_some()
    }

    /// Lower bound in value order, with inclusivity. The tighter of `gt`/`gte` wins.
    pub(crate) fn lower(&self) -> Option<(&Value, bool)> {
        match (&self.gt, &self.gte) {
            (Some(gt), Some(gte)) if collate(gt, gte) != Ordering::Less => Some((gt, false)),
            (_, Some(gte)) => Some((gte, true)),
            (Some(gt), None) => Some((gt, false)),
            (None, None) => None,
        }
    }

    /// Upper bound in value order, with inclusivity. The tighter of `lt`/`lte` wins.
    pub(crate) fn upper(&self) -> Option<(&Value, bool)> {
        match (&self.lt, &self.lte) {
            (Some(lt), Some(lte)) if collate(lt, lte) != Ordering::Greater => Some((lt, false)),
            (_, Some(lte)) => Some((lte, true)),
            (Some(lt), None) => Some((lt, false)),
            (None, None) => None,
        }
    }

    /// Check a field value against every bound.
    pub fn matches(&self, value: &Value) -> bool {
        let check = |bound: &Option<Value>, ok: fn(Ordering) -> bool| {
            bound.as_ref().map_or(true, |b| ok(collate(value, b)))
        };
        check(&self.eq, |o| o == Ordering::Equal)
            && check(&self.gt, |o| o == Ordering::Greater)
            && check(&self.gte, |o| o != Ordering::Less)
            && check(&self.lt, |o| o == Ordering::Less)
            && check(&self.lte, |o| o != Ordering::Greater)
    }

    fn merge(&mut self, other: Condition) {
        if other.eq.is_some() {
            self.eq = other.eq;
        }
        if other.gt.is_some() {
            self.gt = other.gt;
        }
        if other.gte.is_some() {
            self.gte = other.gte;
        }
        if other.lt.is_some() {
            self.lt = other.lt;
        }
        if other.lte.is_some() {
            self.lte = other.lte;
        }
    }
}

/// Conjunction of per-field conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector {
    conditions: BTreeMap<String, Condition>,
}

impl Selector {
    /// An empty selector (matches every live document that is indexed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on a field path, merging with any existing one.
    pub fn and(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.conditions
            .entry(path.into())
            .or_default()
            .merge(condition);
        self
    }

    /// Condition on a field path, if any.
    pub fn get(&self, path: &str) -> Option<&Condition> {
        self.conditions.get(path)
    }

    /// Whether the selector pins `path` to one value.
    pub fn pins(&self, path: &str) -> bool {
        self.get(path).is_some_and(Condition::is_equality)
    }

    /// Whether the selector constrains `path`.
    pub fn constrains(&self, path: &str) -> bool {
        self.get(path).is_some_and(Condition::is_bounded)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Check a document against every condition. Missing fields never match.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(path, cond)| doc.field(path).is_some_and(|v| cond.matches(v)))
    }

    /// Parse a Mango-style selector such as
    /// `{"likes": {"$gte": 0}, "kind": "post"}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidSelector("selector must be an object".into()))?;

        let mut selector = Selector::new();
        for (path, spec) in object {
            let operators = spec
                .as_object()
                .filter(|ops| !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')));

            let condition = match operators {
                None => Condition::eq(spec.clone()),
                Some(ops) => {
                    let mut condition = Condition::default();
                    for (op, operand) in ops {
                        let slot = match op.as_str() {
                            "$eq" => &mut condition.eq,
                            "$gt" => &mut condition.gt,
                            "$gte" => &mut condition.gte,
                            "$lt" => &mut condition.lt,
                            "$lte" => &mut condition.lte,
                            other => {
                                return Err(Error::InvalidSelector(format!(
                                    "unsupported operator '{}' on '{}'",
                                    other, path
                                )))
                            }
                        };
                        *slot = Some(operand.clone());
                    }
                    condition
                }
            };
            selector = selector.and(path.clone(), condition);
        }
        Ok(selector)
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortField {
    pub path: String,
    #[serde(default)]
    pub direction: Direction,
}

/// A query against the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub selector: Selector,
    #[serde(default)]
    pub sort: Vec<SortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: usize,
    /// Force a specific index instead of letting the planner choose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_index: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on a field path.
    pub fn filter(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.selector = self.selector.and(path, condition);
        self
    }

    /// Replace the whole selector.
    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    /// Append a sort key.
    pub fn sort(mut self, path: impl Into<String>, direction: Direction) -> Self {
        self.sort.push(SortField {
            path: path.into(),
            direction,
        });
        self
    }

    pub fn sort_asc(self, path: impl Into<String>) -> Self {
        self.sort(path, Direction::Asc)
    }

    pub fn sort_desc(self, path: impl Into<String>) -> Self {
        self.sort(path, Direction::Desc)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn use_index(mut self, name: impl Into<String>) -> Self {
        self.use_index = Some(name.into());
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Matching documents in the requested order
    pub docs: Vec<Document>,
    /// Name of the index that served the query
    pub index: String,
}

/// Run a query against the current index state.
pub(crate) fn execute(indexes: &IndexManager, query: &Query) -> Result<Page> {
    let plan = indexes.pick_index_for(&query.selector, &query.sort, query.use_index.as_deref())?;
    let index = indexes
        .get(&plan.index)
        .ok_or_else(|| Error::NoUsableIndex(plan.index.clone()))?;

    let limit = query.limit.unwrap_or(usize::MAX);
    let docs = index
        .scan(&query.selector, plan.reverse)
        .filter(|doc| query.selector.matches(doc))
        .skip(query.skip)
        .take(limit)
        .map(|doc| (**doc).clone())
        .collect();

    Ok(Page {
        docs,
        index: plan.index,
    })
}
