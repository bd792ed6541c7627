//! Persistence: wire records, the API seam, and the bridge that keeps a store
//! in sync with the backend.
//!
//! Local state is optimistic. A failed request is logged and reported through
//! the [`Notifier`], but the store is never rolled back.

use std::future::Future;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::AnnotationError;
use crate::platform::{Decorator, DocumentAdapter};
use crate::store::AnnotationStore;
use crate::style::AnnotationStyle;
use crate::types::{Annotation, AnnotationId, AnnotationTarget, Position, Region, TextOffset};

/// Response envelope used by every endpoint. `code == 0` is success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            data: Some(data),
            message: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            code: 0,
            data: None,
            message: None,
        }
    }

    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    pub fn into_result(self) -> Result<Option<T>, AnnotationError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(AnnotationError::TransportFailure(format!(
                "code {}: {}",
                self.code,
                self.message.as_deref().unwrap_or("no message")
            )))
        }
    }
}

/// Whose annotations these are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub uuid: String,
    /// Entity type, e.g. `article` or `forum`.
    pub kind: String,
}

impl EntityRef {
    pub fn new(uuid: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub region: Region,
    pub text_offset: TextOffset,
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAnnotationRecord {
    pub entity_uuid: String,
    pub entity_type: String,
    pub annotation_type: String,
    pub style: AnnotationStyle,
    pub content: String,
    pub target: TargetRecord,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

/// Body of an update request. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

/// An annotation as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: String,
    pub entity_uuid: String,
    pub entity_type: String,
    #[serde(default = "default_annotation_type")]
    pub annotation_type: String,
    #[serde(default)]
    pub style: AnnotationStyle,
    #[serde(default)]
    pub content: String,
    pub target: TargetRecord,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_annotation_type() -> String {
    "text".to_string()
}

impl AnnotationRecord {
    pub fn into_annotation(self) -> Annotation {
        let now = Utc::now();
        Annotation {
            id: SmolStr::new(&self.id),
            content: self.content,
            style: self.style,
            target: AnnotationTarget::text(self.target.region, self.target.text_offset),
            position: Position::default(),
            created_at: self.created_at.as_deref().and_then(parse_timestamp).unwrap_or(now),
            updated_at: self.updated_at.as_deref().and_then(parse_timestamp).unwrap_or(now),
            meta: self.meta,
            persisted: true,
        }
    }
}

/// Parse RFC 3339 or the backend's naive ISO timestamps (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// The annotation HTTP API.
///
/// Futures are not required to be `Send` so implementations can run on wasm.
pub trait AnnotationApi {
    fn list(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<ApiResponse<Vec<AnnotationRecord>>, AnnotationError>>;

    fn create(
        &self,
        record: &CreateAnnotationRecord,
    ) -> impl Future<Output = Result<ApiResponse<AnnotationRecord>, AnnotationError>>;

    fn update(
        &self,
        id: &str,
        patch: &AnnotationPatch,
    ) -> impl Future<Output = Result<ApiResponse<AnnotationRecord>, AnnotationError>>;

    fn delete(&self, id: &str) -> impl Future<Output = Result<ApiResponse<serde_json::Value>, AnnotationError>>;
}

/// Receives user-facing failure messages.
pub trait Notifier {
    fn notify(&self, message: &str);
}

impl<F: Fn(&str)> Notifier for F {
    fn notify(&self, message: &str) {
        self(message)
    }
}

/// What to do after a create response arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum FollowUp {
    Nothing,
    /// Content was edited while the create was in flight.
    PushContent { id: AnnotationId, content: String },
    /// The record was explicitly deleted before its id came back.
    DeleteOrphan { id: AnnotationId },
}

/// Swap in the server id and work out whether another request is needed.
pub fn reconcile_created<A, D>(
    store: &mut AnnotationStore<A, D>,
    local: &str,
    server: &str,
    sent_content: &str,
) -> FollowUp
where
    A: DocumentAdapter,
    D: Decorator<A::Node>,
{
    if !store.confirm_id(local, server) {
        if store.take_deleted(local) {
            tracing::info!(local, server, "annotation deleted before it was saved");
            return FollowUp::DeleteOrphan {
                id: SmolStr::new(server),
            };
        }
        // Cleared by navigation or a reload: the saved record stays.
        tracing::debug!(local, server, "saved annotation is no longer loaded");
        return FollowUp::Nothing;
    }
    match store.get(server) {
        Some(annotation) if annotation.content != sent_content => FollowUp::PushContent {
            id: annotation.id.clone(),
            content: annotation.content.clone(),
        },
        _ => FollowUp::Nothing,
    }
}

/// Rebuild a store from backend records and decorate what can be decorated.
///
/// Returns how many records were restored. Records whose region has no
/// container yet stay undecorated until the region is shown.
pub fn rehydrate<A, D>(store: &mut AnnotationStore<A, D>, records: Vec<AnnotationRecord>) -> usize
where
    A: DocumentAdapter,
    D: Decorator<A::Node>,
{
    store.clear();
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let annotation = record.into_annotation();
        ids.push((annotation.id.clone(), annotation.region()));
        store.insert_restored(annotation);
    }
    for (id, region) in &ids {
        if store.container_for(*region).is_none() {
            continue;
        }
        if let Err(e) = store.decorate(id) {
            tracing::warn!(annotation = %id, error = %e, "restored annotation not decorated");
        }
    }
    tracing::debug!(count = ids.len(), "rehydrated annotations");
    ids.len()
}

pub struct PersistenceBridge<C> {
    api: C,
    entity: EntityRef,
    notifier: Option<Box<dyn Notifier>>,
}

impl<C: AnnotationApi> PersistenceBridge<C> {
    pub fn new(api: C, entity: EntityRef) -> Self {
        Self {
            api,
            entity,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    fn fail(&self, action: &str, err: AnnotationError) -> AnnotationError {
        tracing::error!(entity = %self.entity.uuid, action, error = %err, "annotation request failed");
        if let Some(notifier) = &self.notifier {
            notifier.notify(&format!("Failed to {} annotation", action));
        }
        err
    }

    /// Build the create request for an annotation.
    pub fn create_record(&self, annotation: &Annotation) -> Result<CreateAnnotationRecord, AnnotationError> {
        let text_offset = annotation
            .target
            .text_offset
            .clone()
            .ok_or_else(|| AnnotationError::boundary("annotation has no text offsets to save"))?;
        Ok(CreateAnnotationRecord {
            entity_uuid: self.entity.uuid.clone(),
            entity_type: self.entity.kind.clone(),
            annotation_type: default_annotation_type(),
            style: annotation.style,
            content: annotation.content.clone(),
            target: TargetRecord {
                region: annotation.region(),
                text_offset,
            },
            meta: annotation.meta.clone(),
        })
    }

    /// Send a create request and return the server-assigned id.
    pub async fn persist_created(&self, record: &CreateAnnotationRecord) -> Result<AnnotationId, AnnotationError> {
        let response = self
            .api
            .create(record)
            .await
            .and_then(ApiResponse::into_result)
            .map_err(|e| self.fail("save", e))?;
        match response {
            Some(created) => Ok(SmolStr::new(created.id)),
            None => Err(self.fail("save", AnnotationError::transport("create response carried no record"))),
        }
    }

    pub async fn persist_content(&self, id: &str, content: &str) -> Result<(), AnnotationError> {
        let patch = AnnotationPatch {
            content: Some(content.to_string()),
            meta: None,
        };
        self.api
            .update(id, &patch)
            .await
            .and_then(ApiResponse::into_result)
            .map(|_| ())
            .map_err(|e| self.fail("update", e))
    }

    pub async fn persist_delete(&self, id: &str) -> Result<(), AnnotationError> {
        self.api
            .delete(id)
            .await
            .and_then(ApiResponse::into_result)
            .map(|_| ())
            .map_err(|e| self.fail("delete", e))
    }

    /// Fetch all records of the entity.
    pub async fn fetch(&self) -> Result<Vec<AnnotationRecord>, AnnotationError> {
        self.api
            .list(&self.entity)
            .await
            .and_then(ApiResponse::into_result)
            .map(Option::unwrap_or_default)
            .map_err(|e| self.fail("load", e))
    }

    pub async fn apply(&self, follow_up: FollowUp) -> Result<(), AnnotationError> {
        match follow_up {
            FollowUp::Nothing => Ok(()),
            FollowUp::PushContent { id, content } => self.persist_content(&id, &content).await,
            FollowUp::DeleteOrphan { id } => self.persist_delete(&id).await,
        }
    }

    /// Save a newly created annotation and confirm its id in the store.
    ///
    /// Holds the store across the request; hosts that share the store with
    /// event handlers use [`create_record`](Self::create_record),
    /// [`persist_created`](Self::persist_created) and [`reconcile_created`]
    /// separately.
    pub async fn save_new<A, D>(
        &self,
        store: &mut AnnotationStore<A, D>,
        local: &str,
    ) -> Result<AnnotationId, AnnotationError>
    where
        A: DocumentAdapter,
        D: Decorator<A::Node>,
    {
        let annotation = store
            .get(local)
            .ok_or_else(|| AnnotationError::NotFound(SmolStr::new(local)))?;
        let record = self.create_record(annotation)?;
        let server = self.persist_created(&record).await?;
        let follow_up = reconcile_created(store, local, &server, &record.content);
        self.apply(follow_up).await?;
        Ok(server)
    }

    /// Fetch and rehydrate in one step.
    pub async fn load<A, D>(&self, store: &mut AnnotationStore<A, D>) -> Result<usize, AnnotationError>
    where
        A: DocumentAdapter,
        D: Decorator<A::Node>,
    {
        let records = self.fetch().await?;
        Ok(rehydrate(store, records))
    }
}
