//! Generic resource list controller.
//!
//! One controller instance owns the cached copy of one remote collection.
//! Mutations never patch the cache: after every successful create, update or
//! delete the controller refetches the whole collection, so the cache always
//! equals the server's latest list.
//!
//! ## States
//! `Idle -> Loading -> Ready` on the first fetch, `Ready -> Submitting ->
//! Ready` around a mutation. Failures emit a notice and fall back to `Ready`
//! with the previous cache.
//!
//! ## Overlapping fetches
//! Each `list()` takes a sequence number. Only the response to the most
//! recently issued fetch is applied; older ones are discarded.

mod draft;

pub use draft::{Draft, DraftFields, DraftMode, ReadOnly};

use crate::error::{ConsoleError, ConsoleResult, ERROR_METRICS};
use crate::notify::{Notice, Notifier};
use crate::session::SessionContext;
use crate::transport::{ApiRequest, ApiTransport, Attachment, Endpoint};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Endpoint set and payload keys of one remote collection.
pub trait Resource: Send + Sync + 'static {
    type Item: DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static;
    type Draft: DraftFields;

    /// Plural name used in logs ("products").
    const NAME: &'static str;
    /// Singular label used in messages ("Product").
    const LABEL: &'static str;
    /// Envelope key holding the list payload.
    const COLLECTION_KEY: &'static str;
    /// Envelope key holding a single item.
    const ITEM_KEY: &'static str;

    fn id_of(item: &Self::Item) -> &str;

    fn list_endpoint() -> Endpoint;

    /// Single-item endpoint. Without one, `get_one` searches a fresh list.
    fn get_endpoint(_id: &str) -> Option<Endpoint> {
        None
    }

    fn delete_endpoint(_id: &str) -> Option<Endpoint> {
        None
    }
}

/// Resources with a create and/or update surface.
pub trait Editable: Resource {
    fn create_endpoint() -> Option<Endpoint> {
        None
    }

    fn update_endpoint(id: &str) -> Endpoint;

    /// Builds an edit draft from authoritative server state.
    fn hydrate(item: &Self::Item) -> Self::Draft;
}

/// Synchronous user acknowledgment for destructive operations.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Fixed answer to every prompt (`--yes`, scripted callers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset(pub bool);

impl Confirm for Preset {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Idle,
    Loading,
    Ready,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection<T> {
    pub items: Vec<T>,
    pub is_loading: bool,
}

/// Server acknowledgment of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack<T> {
    pub message: Option<String>,
    /// The item, when the server echoes it back.
    pub item: Option<T>,
}

struct ControllerInner<R: Resource> {
    items: Vec<R::Item>,
    state: ControllerState,
    draft: Option<Draft<R::Draft>>,
}

pub struct ResourceController<R: Resource> {
    session: SessionContext,
    transport: Arc<dyn ApiTransport>,
    notifier: Arc<dyn Notifier>,
    inner: RwLock<ControllerInner<R>>,
    latest_fetch: AtomicU64,
}

impl<R: Resource> ResourceController<R> {
    pub fn new(
        session: SessionContext,
        transport: Arc<dyn ApiTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            transport,
            notifier,
            inner: RwLock::new(ControllerInner {
                items: Vec::new(),
                state: ControllerState::Idle,
                draft: None,
            }),
            latest_fetch: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.inner.read().state
    }

    pub fn items(&self) -> Vec<R::Item> {
        self.inner.read().items.clone()
    }

    pub fn collection(&self) -> Collection<R::Item> {
        let inner = self.inner.read();
        Collection {
            items: inner.items.clone(),
            is_loading: inner.state == ControllerState::Loading,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Looks an item up in the cache only.
    pub fn cached(&self, id: &str) -> Option<R::Item> {
        self.inner
            .read()
            .items
            .iter()
            .find(|item| R::id_of(item) == id)
            .cloned()
    }

    /// Fetches the collection and replaces the cache with it.
    pub async fn list(&self) -> ConsoleResult<Vec<R::Item>> {
        let seq = self.latest_fetch.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut inner = self.inner.write();
            if inner.state != ControllerState::Submitting {
                inner.state = ControllerState::Loading;
            }
        }
        tracing::debug!(resource = R::NAME, seq, "fetching collection");

        let result = self.fetch_collection().await;

        let mut inner = self.inner.write();
        if seq != self.latest_fetch.load(Ordering::SeqCst) {
            tracing::debug!(resource = R::NAME, seq, "discarding stale collection response");
            return Err(ConsoleError::Superseded);
        }
        if inner.state == ControllerState::Loading {
            inner.state = ControllerState::Ready;
        }
        match result {
            Ok(items) => {
                tracing::debug!(resource = R::NAME, seq, count = items.len(), "collection replaced");
                inner.items = items.clone();
                Ok(items)
            }
            Err(error) => {
                drop(inner);
                self.report(&error, "list", &format!("Failed to fetch {}", R::NAME));
                Err(error)
            }
        }
    }

    /// Fetches one item from the server, bypassing the cache.
    pub async fn get_one(&self, id: &str) -> ConsoleResult<R::Item> {
        let result = match R::get_endpoint(id) {
            Some(endpoint) => self.fetch_one(endpoint).await,
            None => self.find_in_fresh_list(id).await,
        };
        if let Err(error) = &result {
            self.report(
                error,
                "get",
                &format!("Failed to load {} details", R::LABEL.to_lowercase()),
            );
        }
        result
    }

    /// Deletes `id` after `confirm` accepts the prompt.
    ///
    /// A declined prompt sends nothing and leaves the cache untouched.
    pub async fn delete(&self, id: &str, confirm: &dyn Confirm) -> ConsoleResult<Ack<R::Item>> {
        let Some(endpoint) = R::delete_endpoint(id) else {
            let error = ConsoleError::Unsupported {
                resource: R::NAME,
                operation: "delete",
            };
            self.report(&error, "delete", "Operation failed");
            return Err(error);
        };

        let prompt = format!(
            "Are you sure you want to delete this {}?",
            R::LABEL.to_lowercase()
        );
        if !confirm.confirm(&prompt) {
            tracing::debug!(resource = R::NAME, id, "delete declined");
            return Err(ConsoleError::Declined);
        }

        self.mutate(
            "delete",
            ApiRequest::new(endpoint),
            format!("{} deleted successfully", R::LABEL),
            &format!("Failed to delete {}", R::LABEL.to_lowercase()),
        )
        .await
    }

    async fn fetch_collection(&self) -> ConsoleResult<Vec<R::Item>> {
        let request = self.session.authorize(ApiRequest::new(R::list_endpoint()));
        let mut envelope = self.transport.send(request).await?.ensure_success()?;
        envelope.take_or_default(R::COLLECTION_KEY)
    }

    async fn fetch_one(&self, endpoint: Endpoint) -> ConsoleResult<R::Item> {
        let request = self.session.authorize(ApiRequest::new(endpoint));
        let mut envelope = self.transport.send(request).await?.ensure_success()?;
        envelope.take(R::ITEM_KEY)
    }

    async fn find_in_fresh_list(&self, id: &str) -> ConsoleResult<R::Item> {
        self.fetch_collection()
            .await?
            .into_iter()
            .find(|item| R::id_of(item) == id)
            .ok_or_else(|| ConsoleError::application(format!("{} not found", R::LABEL)))
    }

    /// Sends a mutating request, then resynchronises the cache.
    async fn mutate(
        &self,
        operation: &'static str,
        request: ApiRequest,
        success_message: String,
        failure_message: &str,
    ) -> ConsoleResult<Ack<R::Item>> {
        self.set_state(ControllerState::Submitting);
        tracing::info!(resource = R::NAME, operation, endpoint = %request.endpoint, "submitting");

        let result = self.send_mutation(request).await;
        match result {
            Ok(ack) => {
                let text = ack.message.clone().unwrap_or(success_message);
                self.notifier.notify(Notice::success(text));
                // A failed resync already reported itself; the mutation stands.
                let _ = self.list().await;
                self.set_state(ControllerState::Ready);
                Ok(ack)
            }
            Err(error) => {
                self.set_state(ControllerState::Ready);
                self.report(&error, operation, failure_message);
                Err(error)
            }
        }
    }

    async fn send_mutation(&self, request: ApiRequest) -> ConsoleResult<Ack<R::Item>> {
        let mut envelope = self
            .transport
            .send(self.session.authorize(request))
            .await?
            .ensure_success()?;
        let item = match envelope.take_optional::<R::Item>(R::ITEM_KEY) {
            Ok(item) => item,
            Err(error) => {
                tracing::debug!(resource = R::NAME, %error, "ignoring undecodable echoed item");
                None
            }
        };
        Ok(Ack {
            message: envelope.message.take().filter(|m| !m.is_empty()),
            item,
        })
    }

    fn set_state(&self, state: ControllerState) {
        self.inner.write().state = state;
    }

    fn report(&self, error: &ConsoleError, operation: &str, fallback: &str) {
        ERROR_METRICS.record(error, &format!("{}.{}", R::NAME, operation));
        if error.is_user_facing() {
            tracing::warn!(resource = R::NAME, operation, %error, "operation failed");
            self.notifier.notify(Notice::error(error.notice_text(fallback)));
        }
    }
}

impl<R: Editable> ResourceController<R> {
    pub async fn create(&self, draft: &Draft<R::Draft>) -> ConsoleResult<Ack<R::Item>> {
        let Some(endpoint) = R::create_endpoint() else {
            let error = ConsoleError::Unsupported {
                resource: R::NAME,
                operation: "create",
            };
            self.report(&error, "create", "Operation failed");
            return Err(error);
        };
        self.submit("create", endpoint, draft, "created").await
    }

    pub async fn update(&self, id: &str, draft: &Draft<R::Draft>) -> ConsoleResult<Ack<R::Item>> {
        self.submit("update", R::update_endpoint(id), draft, "updated")
            .await
    }

    async fn submit(
        &self,
        operation: &'static str,
        endpoint: Endpoint,
        draft: &Draft<R::Draft>,
        verb: &str,
    ) -> ConsoleResult<Ack<R::Item>> {
        let body = match draft.encode() {
            Ok(body) => body,
            Err(error) => {
                self.report(&error, operation, "Operation failed");
                return Err(error);
            }
        };
        self.mutate(
            operation,
            ApiRequest::new(endpoint).with_body(body),
            format!("{} {} successfully", R::LABEL, verb),
            "Operation failed",
        )
        .await
    }

    /// Opens an empty create form.
    pub fn open_create(&self) -> Draft<R::Draft> {
        let draft = Draft::create();
        self.inner.write().draft = Some(draft.clone());
        draft
    }

    /// Opens an edit form hydrated from the server's copy of `id`.
    pub async fn open_edit(&self, id: &str) -> ConsoleResult<Draft<R::Draft>> {
        let item = self.get_one(id).await?;
        let draft = Draft::update(R::id_of(&item).to_string(), R::hydrate(&item));
        self.inner.write().draft = Some(draft.clone());
        Ok(draft)
    }

    pub fn draft(&self) -> Option<Draft<R::Draft>> {
        self.inner.read().draft.clone()
    }

    /// Applies `edit` to the open draft. Returns false when no form is open.
    pub fn edit_draft(&self, edit: impl FnOnce(&mut Draft<R::Draft>)) -> bool {
        match self.inner.write().draft.as_mut() {
            Some(draft) => {
                edit(draft);
                true
            }
            None => false,
        }
    }

    /// Queues a file for upload with the open draft.
    pub fn attach(&self, attachment: Attachment) -> bool {
        self.edit_draft(|draft| draft.attachments.push(attachment))
    }

    pub fn cancel_draft(&self) {
        self.inner.write().draft = None;
    }

    /// Submits the open draft. Success discards it; failure keeps it for a retry.
    pub async fn submit_draft(&self) -> ConsoleResult<Ack<R::Item>> {
        let Some(draft) = self.draft() else {
            return Err(ConsoleError::validation("no form is open"));
        };
        let result = match &draft.mode {
            DraftMode::Create => self.create(&draft).await,
            DraftMode::Update(id) => self.update(id, &draft).await,
        };
        if result.is_ok() {
            self.inner.write().draft = None;
        }
        result
    }
}

impl<R: Resource> fmt::Debug for ResourceController<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ResourceController")
            .field("resource", &R::NAME)
            .field("state", &inner.state)
            .field("items", &inner.items.len())
            .field("draft", &inner.draft.is_some())
            .finish()
    }
}
