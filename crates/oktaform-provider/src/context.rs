//! Shared provider context and the per-operation view handed to resources.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use oktaform_client::{ApiRequest, ApiResponse, OktaClient};

use crate::arbiter::Arbiter;
use crate::error::ProvisionerError;
use crate::retry::{self, RetryPolicy, Verdict};
use crate::settings::ProviderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute of another resource that changed as a side effect of this
/// operation (e.g. a sibling rule's priority after an insert).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiblingObservation {
    pub resource_type: String,
    pub id: String,
    pub attribute: String,
    pub value: Value,
}

/// Everything a resource callback may touch, shared across operations.
#[derive(Clone)]
pub struct ProviderContext {
    client: OktaClient,
    arbiter: Arbiter,
    settings: Arc<ProviderSettings>,
    cancel: CancellationToken,
}

impl ProviderContext {
    pub fn new(client: OktaClient, settings: ProviderSettings) -> Self {
        Self {
            client,
            arbiter: Arbiter::new(),
            settings: Arc::new(settings),
            cancel: CancellationToken::new(),
        }
    }

    pub fn client(&self) -> &OktaClient {
        &self.client
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    /// Root token; cancelling it aborts every in-flight operation.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Open a context for one resource operation with its own deadline.
    pub fn operation(&self, op: Operation, timeout: Duration) -> OpContext {
        OpContext {
            client: self.client.clone(),
            arbiter: self.arbiter.clone(),
            settings: self.settings.clone(),
            cancel: self.cancel.child_token(),
            deadline: Instant::now() + timeout,
            timeout,
            operation: op,
            observations: Mutex::new(Vec::new()),
        }
    }
}

/// Per-operation view: client calls bounded by this operation's deadline
/// and cancellation, arbiter access, and the sibling observation sink.
pub struct OpContext {
    client: OktaClient,
    arbiter: Arbiter,
    settings: Arc<ProviderSettings>,
    cancel: CancellationToken,
    deadline: Instant,
    timeout: Duration,
    operation: Operation,
    observations: Mutex<Vec<SiblingObservation>>,
}

impl OpContext {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `fut` unless the operation is cancelled or its deadline passes first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, ProvisionerError>
    where
        F: Future<Output = Result<T, ProvisionerError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProvisionerError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(ProvisionerError::DeadlineExceeded(
                format!("{} did not finish within {:?}", self.operation, self.timeout),
            )),
            out = fut => out,
        }
    }

    // ── HTTP helpers ─────────────────────────────────────────────

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ProvisionerError> {
        self.guard(async {
            self.client
                .execute(&request, &self.cancel)
                .await
                .map_err(ProvisionerError::from)
        })
        .await
    }

    /// Send and decode the response body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ProvisionerError> {
        let response = self.send(request).await?;
        Ok(serde_json::from_value(response.body)?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProvisionerError> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// GET that maps 404 to `None`.
    pub async fn get_opt<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ProvisionerError> {
        match self.get_json(path).await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProvisionerError> {
        self.send_json(ApiRequest::post(path).body(serde_json::to_value(body)?))
            .await
    }

    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProvisionerError> {
        self.send_json(ApiRequest::put(path).body(serde_json::to_value(body)?))
            .await
    }

    /// Body-less POST, used for lifecycle transitions.
    pub async fn post_empty(&self, path: &str) -> Result<(), ProvisionerError> {
        self.send(ApiRequest::post(path)).await.map(|_| ())
    }

    /// DELETE where a 404 counts as success.
    pub async fn delete(&self, path: &str) -> Result<(), ProvisionerError> {
        match self.send(ApiRequest::delete(path)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %path, "already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// GET every page of a collection.
    pub async fn list<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Vec<T>, ProvisionerError> {
        let items = self
            .guard(async {
                self.client
                    .list_all(&request, &self.cancel)
                    .await
                    .map_err(ProvisionerError::from)
            })
            .await?;
        items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(ProvisionerError::from))
            .collect()
    }

    // ── Serialization and retry ──────────────────────────────────

    /// Run `fut` holding the arbiter lock for `parent`.
    pub async fn serialized<T, F>(&self, parent: &str, fut: F) -> Result<T, ProvisionerError>
    where
        F: Future<Output = Result<T, ProvisionerError>>,
    {
        self.guard(self.arbiter.serialize(parent, fut)).await
    }

    /// Retry `op` under `policy`, bounded by this operation's deadline.
    pub async fn retry<T, Op, Fut, C>(
        &self,
        policy: &RetryPolicy,
        op: Op,
        classify: C,
    ) -> Result<T, ProvisionerError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProvisionerError>>,
        C: Fn(&Result<T, ProvisionerError>) -> Verdict,
    {
        retry::retry(policy, &self.cancel, self.deadline, op, classify).await
    }

    // ── Sibling observations ─────────────────────────────────────

    pub fn observe_sibling(&self, observation: SiblingObservation) {
        self.observations.lock().push(observation);
    }

    pub fn take_observations(&self) -> Vec<SiblingObservation> {
        std::mem::take(&mut *self.observations.lock())
    }
}
