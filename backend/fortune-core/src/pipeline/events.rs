//! Observable pipeline lifecycle.

use crate::request::RequestKey;

use common::HttpStatusCode;

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, trace, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RequestStarted {
        key: RequestKey,
        request_id: String,
        attempt: u32,
    },
    RequestFinished {
        key: RequestKey,
        request_id: String,
        status: Option<HttpStatusCode>,
        outcome: &'static str,
    },
    RetryScheduled {
        key: RequestKey,
        next_attempt: u32,
        delay: Duration,
        reason: String,
    },
    RefreshStarted,
    RefreshSettled {
        success: bool,
        waiters: usize,
    },
    Superseded {
        key: RequestKey,
    },
    SessionExpired {
        reason: String,
    },
}

pub trait PipelineObserver: Send + Sync + 'static {
    fn on_event(&self, event: &PipelineEvent);
}

/// Default observer: every event goes to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RequestStarted {
                key,
                request_id,
                attempt,
            } => trace!("--> {key} [{request_id}] attempt {attempt}"),
            PipelineEvent::RequestFinished {
                key,
                request_id,
                status,
                outcome,
            } => match status {
                Some(status) => debug!("<-- {key} [{request_id}] {status} {outcome}"),
                None => debug!("<-- {key} [{request_id}] no response, {outcome}"),
            },
            PipelineEvent::RetryScheduled {
                key,
                next_attempt,
                delay,
                reason,
            } => warn!("Retrying {key} (attempt {next_attempt}) in {delay:?}: {reason}"),
            PipelineEvent::RefreshStarted => info!("Access token expired, refreshing"),
            PipelineEvent::RefreshSettled { success, waiters } => {
                info!("Token refresh settled (success: {success}), releasing {waiters} waiter(s)")
            }
            PipelineEvent::Superseded { key } => debug!("Superseded in-flight {key}"),
            PipelineEvent::SessionExpired { reason } => {
                warn!("Session expired, credentials cleared: {reason}")
            }
        }
    }
}

/// Keeps every event in memory. Handy for assertions and diagnostics.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<PipelineEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, predicate: impl Fn(&PipelineEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| predicate(event))
            .count()
    }
}

impl PipelineObserver for EventRecorder {
    fn on_event(&self, event: &PipelineEvent) {
        LogObserver.on_event(event);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
