//! The request pipeline.
//!
//! One call flows through: decorate, issue, classify, then either return the
//! payload, wait for a token refresh and replay once, back off and retry, or
//! fail with a [`PipelineError`].

pub mod cancellation;
pub mod classifier;
pub mod events;
pub mod refresh;
pub mod retry;

pub use cancellation::{CancellationRegistry, InFlightGuard};
pub use classifier::{ApiFailure, ClassifiedOutcome, FailureReason, classify};
pub use events::{EventRecorder, LogObserver, PipelineEvent, PipelineObserver};
pub use refresh::{RefreshCoordinator, RefreshSettlement};
pub use retry::{RetryPolicy, RetrySchedule, is_retry_eligible};

use crate::context::ClientContext;
use crate::credential::{Credential, CredentialStore};
use crate::error::PipelineError;
use crate::error::pipeline::SESSION_EXPIRED_MESSAGE;
use crate::normalizer::auth::token_pair;
use crate::request::{RequestDescriptor, RequestKey, decorate};
use crate::transport::Transport;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

use log::warn;
use serde_json::{Value, json};
use tokio::spawn as TokioSpawn;
use tokio::time::sleep as TokioSleep;

pub const REFRESH_ENDPOINT: &str = "auth/refresh";

struct PipelineInner<T> {
    transport: T,
    context: ClientContext,
    retry: RetryPolicy,
    refresh: RefreshCoordinator,
    registry: CancellationRegistry,
}

/// Cheap to clone; clones share credentials, refresh state and the registry.
pub struct Pipeline<T> {
    inner: Arc<PipelineInner<T>>,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Pipeline<T> {
    pub fn new(transport: T, context: ClientContext) -> Self {
        let retry = context.config().retry_policy();
        Self::with_retry_policy(transport, context, retry)
    }

    pub fn with_retry_policy(transport: T, context: ClientContext, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                transport,
                context,
                retry,
                refresh: RefreshCoordinator::new(),
                registry: CancellationRegistry::new(),
            }),
        }
    }

    pub fn context(&self) -> &ClientContext {
        &self.inner.context
    }

    pub fn credentials(&self) -> &dyn CredentialStore {
        self.inner.context.credentials()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    pub fn in_flight(&self) -> usize {
        self.inner.registry.in_flight()
    }

    /// Cancel the in-flight `send_latest` call for `key`, if any.
    pub fn cancel(&self, key: &RequestKey) -> bool {
        self.inner.registry.cancel(key)
    }

    pub fn cancel_all(&self) {
        self.inner.registry.cancel_all();
    }

    /// Run one call to completion: refresh, replay and retries included.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`PipelineError`] once recovery is exhausted.
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<Value, PipelineError> {
        self.inner.execute(descriptor).await
    }

    /// Like [`send`](Self::send), but a newer call with the same
    /// [`RequestKey`] cancels this one, which then resolves as
    /// [`PipelineError::Cancelled`] and never with data.
    pub async fn send_latest(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Value, PipelineError> {
        let guard = self.inner.registry.register_and_supersede(descriptor.key());
        if guard.superseded_previous() {
            self.inner.emit(PipelineEvent::Superseded {
                key: guard.key().clone(),
            });
        }

        let token = guard.token().clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PipelineError::cancelled()),
            result = self.inner.execute(descriptor) => result,
        }
    }
}

impl<T: Transport> PipelineInner<T> {
    fn emit(&self, event: PipelineEvent) {
        self.context.observer().on_event(&event);
    }

    async fn execute(
        self: &Arc<Self>,
        descriptor: &RequestDescriptor,
    ) -> Result<Value, PipelineError> {
        let key = descriptor.key();
        let mut schedule = self.retry.schedule();
        let mut replayed = false;

        loop {
            let generation = self.refresh.generation();
            let credential = self.context.credentials().get();
            let request = decorate(descriptor, &credential, self.context.device());
            let request_id = request.request_id.clone();

            self.emit(PipelineEvent::RequestStarted {
                key: key.clone(),
                request_id: request_id.clone(),
                attempt: schedule.attempts_made(),
            });

            let outcome = self.transport.issue(request).await;
            let classified = classify(&outcome);

            self.emit(PipelineEvent::RequestFinished {
                key: key.clone(),
                request_id,
                status: outcome.as_ref().ok().map(|response| response.status),
                outcome: outcome_label(&classified),
            });

            let eligible = is_retry_eligible(&classified, descriptor.is_idempotent());
            match classified {
                ClassifiedOutcome::Success(payload) => return Ok(payload),
                ClassifiedOutcome::BusinessError(failure) => return Err(failure.into_error()),
                ClassifiedOutcome::AuthExpired { server_message } => {
                    if replayed || !descriptor.refreshes_on_expiry() {
                        return Err(PipelineError::Unauthorized {
                            message: server_message
                                .unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                    replayed = true;
                    self.await_refresh(generation).await?;
                }
                ClassifiedOutcome::RetryableFailure(reason) => {
                    let delay = if eligible { schedule.next_delay() } else { None };
                    let Some(delay) = delay else {
                        return Err(reason.into_error());
                    };
                    self.emit(PipelineEvent::RetryScheduled {
                        key: key.clone(),
                        next_attempt: schedule.attempts_made(),
                        delay,
                        reason: reason.message().to_string(),
                    });
                    TokioSleep(delay).await;
                }
                ClassifiedOutcome::FatalFailure(reason) => return Err(reason.into_error()),
            }
        }
    }

    /// Wait until a refresh started by anyone settles.
    ///
    /// `generation` is the refresh generation seen before the rejected attempt
    /// was issued. A refresh that finished in the meantime means the caller
    /// can replay right away.
    async fn await_refresh(self: &Arc<Self>, generation: u64) -> Result<(), PipelineError> {
        let ticket = self.refresh.enqueue(generation);
        if ticket.is_leader {
            let inner = Arc::clone(self);
            TokioSpawn(async move {
                inner.run_refresh().await;
            });
        }

        match ticket.receiver.await {
            Ok(RefreshSettlement::Refreshed) => Ok(()),
            Ok(RefreshSettlement::Failed { reason }) => Err(PipelineError::auth_required(reason)),
            Err(_) => Err(PipelineError::auth_required("Token refresh was abandoned")),
        }
    }

    async fn run_refresh(&self) {
        self.emit(PipelineEvent::RefreshStarted);

        let settlement = match self.refresh_tokens().await {
            Ok(()) => RefreshSettlement::Refreshed,
            Err(error) => {
                warn!("Token refresh failed: {error}");
                if let Err(clear_error) = self.context.credentials().clear() {
                    warn!("Failed to clear credentials after refresh failure: {clear_error}");
                }
                let reason = error.user_message();
                self.emit(PipelineEvent::SessionExpired {
                    reason: reason.clone(),
                });
                RefreshSettlement::Failed { reason }
            }
        };

        let success = settlement == RefreshSettlement::Refreshed;
        let waiters = self.refresh.settle(settlement);
        self.emit(PipelineEvent::RefreshSettled { success, waiters });
    }

    /// One attempt at `auth/refresh`, sent without an access token.
    async fn refresh_tokens(&self) -> Result<(), PipelineError> {
        let credential = self.context.credentials().get();
        if !credential.can_refresh() {
            return Err(PipelineError::auth_required("No refresh token available"));
        }

        let descriptor = RequestDescriptor::post(REFRESH_ENDPOINT)
            .with_json(json!({ "refreshToken": credential.refresh_token.expose() }))
            .without_refresh();
        let request = decorate(&descriptor, &Credential::default(), self.context.device());

        match classify(&self.transport.issue(request).await) {
            ClassifiedOutcome::Success(payload) => {
                let tokens = token_pair(&payload)?;
                let refresh_token = tokens
                    .refresh_token
                    .filter(|token| !token.is_empty())
                    .unwrap_or(credential.refresh_token);
                self.context
                    .credentials()
                    .set(tokens.access_token, refresh_token)?;
                Ok(())
            }
            ClassifiedOutcome::BusinessError(failure) => Err(failure.into_error()),
            ClassifiedOutcome::AuthExpired { .. } => {
                Err(PipelineError::auth_required("Refresh token was rejected"))
            }
            ClassifiedOutcome::RetryableFailure(reason)
            | ClassifiedOutcome::FatalFailure(reason) => Err(reason.into_error()),
        }
    }
}

fn outcome_label(outcome: &ClassifiedOutcome) -> &'static str {
    match outcome {
        ClassifiedOutcome::Success(_) => "success",
        ClassifiedOutcome::BusinessError(_) => "business error",
        ClassifiedOutcome::AuthExpired { .. } => "auth expired",
        ClassifiedOutcome::RetryableFailure(_) => "retryable failure",
        ClassifiedOutcome::FatalFailure(_) => "fatal failure",
    }
}
