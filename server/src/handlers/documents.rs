//! Document handlers - local reads, writes and queries over HTTP.

use crate::error::{AppError, Result};
use burrow_engine::{
    Document, IndexDef, IndexField, Page, PutResult, Query, RevId, Selector, SortField, Store,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a document write.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutDocumentRequest {
    pub body: Value,
    /// Current revision being replaced; absent for a create
    pub parent: Option<RevId>,
}

/// Query parameters naming a revision.
#[derive(Debug, Deserialize)]
pub struct RevParam {
    pub rev: RevId,
}

/// Losing leaves of a document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictsResponse {
    pub id: String,
    pub conflicts: Vec<RevId>,
}

/// A query in request form, with a Mango-style selector.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRequest {
    #[serde(default)]
    pub selector: Option<Value>,
    #[serde(default)]
    pub sort: Vec<SortField>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: usize,
    pub use_index: Option<String>,
}

/// Body of an index creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIndexRequest {
    pub name: Option<String>,
    pub fields: Vec<IndexField>,
}

/// Name of the index serving a definition.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIndexResponse {
    pub name: String,
}

/// Create or update a document. An empty `id` generates one.
pub fn handle_put_document(store: &Store, id: String, request: PutDocumentRequest) -> Result<PutResult> {
    let result = store.put(Document::new(id, request.body), request.parent.as_ref())?;
    tracing::debug!(doc_id = %result.id, rev = %result.rev, "document written");
    Ok(result)
}

pub fn handle_get_document(store: &Store, id: &str) -> Result<Document> {
    Ok(store.get(id)?)
}

pub fn handle_delete_document(store: &Store, id: &str, param: RevParam) -> Result<PutResult> {
    Ok(store.remove(id, &param.rev)?)
}

pub fn handle_conflicts(store: &Store, id: &str) -> Result<ConflictsResponse> {
    Ok(ConflictsResponse {
        id: id.to_string(),
        conflicts: store.list_conflicts(id)?,
    })
}

/// Run a query.
pub fn handle_find(store: &Store, request: FindRequest) -> Result<Page> {
    let selector = match &request.selector {
        Some(value) => Selector::from_json(value)?,
        None => Selector::new(),
    };
    let query = Query {
        selector,
        sort: request.sort,
        limit: request.limit,
        skip: request.skip,
        use_index: request.use_index,
    };
    Ok(store.find(&query)?)
}

pub fn handle_create_index(store: &Store, request: CreateIndexRequest) -> Result<CreateIndexResponse> {
    let name = match request.name {
        Some(name) => store.create_named_index(name, request.fields)?,
        None => store.create_index(request.fields)?,
    };
    Ok(CreateIndexResponse { name })
}

pub fn handle_list_indexes(store: &Store) -> Vec<IndexDef> {
    store.list_indexes()
}

pub fn handle_drop_index(store: &Store, name: &str) -> Result<()> {
    if store.drop_index(name)? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("index '{}'", name)))
    }
}
