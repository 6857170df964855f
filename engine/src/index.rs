//! Secondary indexes over declared field paths.
//!
//! An index is a sorted map from a key tuple (one slot per indexed field, plus
//! the document id as the final tie-break) to the winning revision of that
//! document. Indexes hold derived data only and are rebuilt from the revision
//! store on open.

use crate::{
    collate::CollatedValue,
    error::{Error, Result},
    query::{Selector, SortField},
    DocId, Document,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

/// Sort direction of an index field or sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Asc => write!(f, "asc"),
            Direction::Desc => write!(f, "desc"),
        }
    }
}

/// One indexed field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexField {
    /// Dotted field path
    pub path: String,
    #[serde(default)]
    pub direction: Direction,
}

impl IndexField {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Desc,
        }
    }
}

/// Definition of a named index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    pub name: String,
    pub fields: Vec<IndexField>,
}

impl IndexDef {
    /// Validate and create a definition.
    pub fn new(name: impl Into<String>, fields: Vec<IndexField>) -> Result<Self> {
        let name = name.into();
        if fields.is_empty() {
            return Err(Error::InvalidIndexSpec("index needs at least one field".into()));
        }
        if name.is_empty() {
            return Err(Error::InvalidIndexSpec("index name must not be empty".into()));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.path.is_empty() || field.path.split('.').any(str::is_empty) {
                return Err(Error::InvalidIndexSpec(format!(
                    "invalid field path '{}'",
                    field.path
                )));
            }
            if fields[..i].iter().any(|f| f.path == field.path) {
                return Err(Error::InvalidIndexSpec(format!(
                    "field '{}' indexed twice",
                    field.path
                )));
            }
        }
        Ok(Self { name, fields })
    }

    /// Name derived from the field tuple, e.g. `idx-likes.desc-created_at.desc`.
    pub fn default_name(fields: &[IndexField]) -> String {
        let parts: Vec<String> = fields
            .iter()
            .map(|f| format!("{}.{}", f.path, f.direction))
            .collect();
        format!("idx-{}", parts.join("-"))
    }
}

/// One position in an index key.
///
/// `Low` and `High` sort before and after every value in index order; they
/// only appear in scan bounds, never in stored keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Low,
    Value(CollatedValue, Direction),
    High,
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Slot::Low, Slot::Low) | (Slot::High, Slot::High) => Ordering::Equal,
            (Slot::Low, _) | (_, Slot::High) => Ordering::Less,
            (Slot::High, _) | (_, Slot::Low) => Ordering::Greater,
            (Slot::Value(a, dir), Slot::Value(b, _)) => match dir {
                Direction::Asc => a.cmp(b),
                Direction::Desc => b.cmp(a),
            },
        }
    }
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type IndexKey = Vec<Slot>;

fn doc_slot(id: &str) -> Slot {
    Slot::Value(
        CollatedValue(serde_json::Value::String(id.to_string())),
        Direction::Asc,
    )
}

/// A sorted index over one field tuple.
#[derive(Debug, Clone)]
pub struct Index {
    def: IndexDef,
    entries: BTreeMap<IndexKey, Arc<Document>>,
    by_doc: HashMap<DocId, IndexKey>,
}

impl Index {
    fn new(def: IndexDef) -> Self {
        Self {
            def,
            entries: BTreeMap::new(),
            by_doc: HashMap::new(),
        }
    }

    /// An index over the given winners.
    pub(crate) fn build<'a>(def: IndexDef, winners: impl IntoIterator<Item = &'a Arc<Document>>) -> Self {
        let mut index = Self::new(def);
        for winner in winners {
            index.upsert(winner);
        }
        index
    }

    pub fn def(&self) -> &IndexDef {
        &self.def
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key for a document, or `None` when it is a tombstone or lacks a field.
    fn key_for(&self, doc: &Document) -> Option<IndexKey> {
        if doc.deleted {
            return None;
        }
        let mut key = Vec::with_capacity(self.def.fields.len() + 1);
        for field in &self.def.fields {
            let value = doc.field(&field.path)?;
            key.push(Slot::Value(CollatedValue(value.clone()), field.direction));
        }
        key.push(doc_slot(&doc.id));
        Some(key)
    }

    /// Drop the entry for a document, if any.
    pub(crate) fn remove(&mut self, id: &str) {
        if let Some(key) = self.by_doc.remove(id) {
            self.entries.remove(&key);
        }
    }

    /// Index the current winner of a document, replacing any previous entry.
    pub(crate) fn upsert(&mut self, doc: &Arc<Document>) {
        let key = self.key_for(doc);
        if key.is_some() && self.by_doc.get(&doc.id) == key.as_ref() {
            if let Some(key) = key {
                self.entries.insert(key, Arc::clone(doc));
            }
            return;
        }
        self.remove(&doc.id);
        if let Some(key) = key {
            self.by_doc.insert(doc.id.clone(), key.clone());
            self.entries.insert(key, Arc::clone(doc));
        }
    }

    /// Scan bounds, in index order, implied by the selector.
    ///
    /// Leading fields pinned by equality fix the key prefix; the first field
    /// after them may contribute a range; later conditions are left to the
    /// residual filter.
    fn bounds(&self, selector: &Selector) -> Option<(IndexKey, IndexKey)> {
        let width = self.def.fields.len() + 1;
        let mut lower: IndexKey = Vec::with_capacity(width);
        let mut upper: IndexKey = Vec::with_capacity(width);
        let mut lower_pad = Slot::Low;
        let mut upper_pad = Slot::High;

        for field in &self.def.fields {
            let Some(cond) = selector.get(&field.path) else {
                break;
            };
            if let Some(eq) = &cond.eq {
                let slot = Slot::Value(CollatedValue(eq.clone()), field.direction);
                lower.push(slot.clone());
                upper.push(slot);
                continue;
            }

            let (start, end) = match field.direction {
                Direction::Asc => (cond.lower(), cond.upper()),
                Direction::Desc => (cond.upper(), cond.lower()),
            };
            if let Some((value, inclusive)) = start {
                lower.push(Slot::Value(CollatedValue(value.clone()), field.direction));
                if !inclusive {
                    lower_pad = Slot::High;
                }
            }
            if let Some((value, inclusive)) = end {
                upper.push(Slot::Value(CollatedValue(value.clone()), field.direction));
                if !inclusive {
                    upper_pad = Slot::Low;
                }
            }
            break;
        }

        lower.resize(width, lower_pad);
        upper.resize(width, upper_pad);
        (lower <= upper).then_some((lower, upper))
    }

    /// Iterate over the documents within the selector's bounds, in index
    /// order or reversed.
    pub(crate) fn scan<'a>(
        &'a self,
        selector: &Selector,
        reverse: bool,
    ) -> Box<dyn Iterator<Item = &'a Arc<Document>> + 'a> {
        let Some((lower, upper)) = self.bounds(selector) else {
            return Box::new(std::iter::empty());
        };
        let range = self
            .entries
            .range((Bound::Included(lower), Bound::Included(upper)))
            .map(|(_, doc)| doc);
        if reverse {
            Box::new(range.rev())
        } else {
            Box::new(range)
        }
    }
}

/// The index chosen for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPlan {
    pub index: String,
    /// Scan the index backwards
    pub reverse: bool,
}

/// Owns every index of a store and keeps them in step with mutations.
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    indexes: BTreeMap<String, Index>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index definition.
    ///
    /// Returns the name of the index serving this field tuple and whether it
    /// was newly created. An existing index with the same fields is reused.
    pub fn create_index(&mut self, def: IndexDef) -> Result<(String, bool)> {
        if let Some(existing) = self.serving(&def)? {
            return Ok((existing, false));
        }
        let name = def.name.clone();
        self.indexes.insert(name.clone(), Index::new(def));
        Ok((name, true))
    }

    /// Name of the index already serving `def`'s field tuple, if any.
    ///
    /// Fails when `def`'s name is taken by an index over other fields.
    pub fn serving(&self, def: &IndexDef) -> Result<Option<String>> {
        if let Some(existing) = self.indexes.values().find(|i| i.def.fields == def.fields) {
            return Ok(Some(existing.def.name.clone()));
        }
        if self.indexes.contains_key(&def.name) {
            return Err(Error::InvalidIndexSpec(format!(
                "index '{}' already exists with different fields",
                def.name
            )));
        }
        Ok(None)
    }

    /// Register an index built elsewhere, replacing any of the same name.
    pub(crate) fn insert(&mut self, index: Index) {
        self.indexes.insert(index.def.name.clone(), index);
    }

    /// Remove an index. Returns whether it existed.
    pub fn drop_index(&mut self, name: &str) -> bool {
        self.indexes.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// All index definitions, by name.
    pub fn definitions(&self) -> Vec<IndexDef> {
        self.indexes.values().map(|i| i.def.clone()).collect()
    }

    /// Bring every index in line with a document's new winner.
    pub fn on_mutation(&mut self, winner: &Arc<Document>, previous: Option<&Arc<Document>>) {
        for index in self.indexes.values_mut() {
            if let Some(previous) = previous {
                if previous.id != winner.id {
                    index.remove(&previous.id);
                }
            }
            index.upsert(winner);
        }
    }

    /// Drop a document from every index.
    pub fn forget(&mut self, id: &str) {
        for index in self.indexes.values_mut() {
            index.remove(id);
        }
    }

    /// Pick an index able to serve `sort` under `selector` without re-sorting.
    ///
    /// The sort fields must appear contiguously in the index, starting at a
    /// position preceded only by fields the selector pins to equality. Their
    /// directions must all match the index (forward scan) or all be inverted
    /// (reverse scan); directions of pinned fields do not matter. Without a
    /// sort, the index's leading field must be constrained by the selector.
    pub fn pick_index_for(
        &self,
        selector: &Selector,
        sort: &[SortField],
        use_index: Option<&str>,
    ) -> Result<IndexPlan> {
        let candidates: Box<dyn Iterator<Item = &Index>> = match use_index {
            Some(name) => Box::new(self.indexes.get(name).into_iter()),
            None => Box::new(self.indexes.values()),
        };

        // Score: more pinned prefix fields, then fewer fields, then name.
        let mut best: Option<((usize, std::cmp::Reverse<usize>), IndexPlan)> = None;
        for index in candidates {
            let Some((pinned, reverse)) = Self::usable(index, selector, sort) else {
                continue;
            };
            let score = (pinned, std::cmp::Reverse(index.def.fields.len()));
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((
                    score,
                    IndexPlan {
                        index: index.def.name.clone(),
                        reverse,
                    },
                ));
            }
        }

        best.map(|(_, plan)| plan).ok_or_else(|| {
            let fields: Vec<String> = sort
                .iter()
                .map(|s| format!("{} {}", s.path, s.direction))
                .collect();
            Error::NoUsableIndex(match use_index {
                Some(name) => format!("index '{}' cannot serve sort [{}]", name, fields.join(", ")),
                None => format!("no index serves sort [{}]", fields.join(", ")),
            })
        })
    }

    /// Returns the number of pinned leading fields and the scan direction if
    /// `index` can serve the query.
    fn usable(index: &Index, selector: &Selector, sort: &[SortField]) -> Option<(usize, bool)> {
        let fields = &index.def.fields;
        let pinned = fields.iter().take_while(|f| selector.pins(&f.path)).count();

        if sort.is_empty() {
            return selector
                .constrains(&fields[0].path)
                .then_some((pinned, false));
        }

        for start in 0..=pinned {
            let Some(segment) = fields.get(start..start + sort.len()) else {
                break;
            };
            if segment.iter().zip(sort).any(|(f, s)| f.path != s.path) {
                continue;
            }

            let free: Vec<(&IndexField, &SortField)> = segment
                .iter()
                .zip(sort)
                .filter(|(f, _)| !selector.pins(&f.path))
                .collect();
            let forward = free.iter().all(|(f, s)| f.direction == s.direction);
            let backward = free.iter().all(|(f, s)| f.direction == s.direction.reverse());
            if forward {
                return Some((pinned, false));
            }
            if backward {
                return Some((pinned, true));
            }
        }
        None
    }
}
