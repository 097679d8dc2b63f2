//! Priority envelope: the unit of work for a queue placed in front of the
//! generation service.
//!
//! Envelopes are totally ordered by priority (high first), then by creation
//! time (FIFO within a tier). A max-heap serves them in order when wrapped in
//! [`std::cmp::Reverse`].

use crate::error::WeftError;
use crate::types::{GenerationRequest, GenerationResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Default number of retries an envelope allows
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Priority tier; lower ordinal is served first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
}

impl Priority {
    /// Ordinal used for ordering
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

type Completion = Result<GenerationResponse, WeftError>;

/// Awaitable side of an envelope's completion
#[derive(Debug)]
pub struct CompletionHandle {
    rx: oneshot::Receiver<Completion>,
}

impl CompletionHandle {
    /// Wait for the envelope to be resolved.
    ///
    /// Resolves to [`WeftError::Canceled`] if the envelope was dropped
    /// without being completed.
    pub async fn wait(self) -> Completion {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(WeftError::canceled(
                "request was dropped before completion",
            )),
        }
    }
}

/// A queued generation request with scheduling metadata
pub struct PriorityEnvelope {
    pub id: Uuid,
    pub request: GenerationRequest,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub attempt: u32,
    pub max_retries: u32,
    completion: Option<oneshot::Sender<Completion>>,
}

impl PriorityEnvelope {
    /// Wrap a request; returns the envelope and the handle the enqueuer awaits
    pub fn new(request: GenerationRequest, priority: Priority) -> (Self, CompletionHandle) {
        let (tx, rx) = oneshot::channel();
        let envelope = Self {
            id: Uuid::new_v4(),
            request,
            priority,
            created_at: Utc::now(),
            attempt: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            completion: Some(tx),
        };
        (envelope, CompletionHandle { rx })
    }

    /// Override the enqueue timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the retry bound
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether another attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_retries
    }

    /// Count an attempt; returns false once the bound is exceeded
    pub fn record_attempt(&mut self) -> bool {
        self.attempt = self.attempt.saturating_add(1);
        self.attempt <= self.max_retries
    }

    /// Whether the enqueuer is still waiting for a result
    pub fn is_awaited(&self) -> bool {
        self.completion.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Resolve the completion handle. Returns false if nobody was waiting.
    pub fn complete(mut self, result: Completion) -> bool {
        match self.completion.take() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for PriorityEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityEnvelope")
            .field("id", &self.id)
            .field("provider", &self.request.provider)
            .field("priority", &self.priority)
            .field("created_at", &self.created_at)
            .field("attempt", &self.attempt)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PartialEq for PriorityEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityEnvelope {}

impl PartialOrd for PriorityEnvelope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityEnvelope {
    /// Priority ordinal ascending, then creation time ascending
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.created_at.cmp(&other.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn envelope(priority: Priority, t: i64) -> PriorityEnvelope {
        let (env, _handle) = PriorityEnvelope::new(GenerationRequest::new("google", "hi"), priority);
        env.with_created_at(at(t))
    }

    fn order(envs: &[PriorityEnvelope]) -> Vec<(Priority, i64)> {
        envs.iter()
            .map(|e| (e.priority, e.created_at.timestamp()))
            .collect()
    }

    #[test]
    fn sorts_by_priority_then_fifo() {
        let mut envs = vec![
            envelope(Priority::Low, 1),
            envelope(Priority::High, 2),
            envelope(Priority::Normal, 3),
            envelope(Priority::High, 0),
        ];
        envs.sort();

        assert_eq!(
            order(&envs),
            vec![
                (Priority::High, 0),
                (Priority::High, 2),
                (Priority::Normal, 3),
                (Priority::Low, 1),
            ]
        );
    }

    #[test]
    fn reverse_heap_pops_in_service_order() {
        let mut heap = BinaryHeap::new();
        heap.push(Reverse(envelope(Priority::Normal, 5)));
        heap.push(Reverse(envelope(Priority::Low, 0)));
        heap.push(Reverse(envelope(Priority::High, 9)));
        heap.push(Reverse(envelope(Priority::Normal, 1)));

        let popped: Vec<_> = std::iter::from_fn(|| heap.pop().map(|Reverse(e)| e))
            .map(|e| (e.priority, e.created_at.timestamp()))
            .collect();
        assert_eq!(
            popped,
            vec![
                (Priority::High, 9),
                (Priority::Normal, 1),
                (Priority::Normal, 5),
                (Priority::Low, 0),
            ]
        );
    }

    #[test]
    fn priority_ordinals_and_display() {
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
        assert_eq!(Priority::High.ordinal(), 1);
        assert_eq!(Priority::Low.ordinal(), 3);
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(Priority::Low.to_string(), "low");
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
    }

    #[test]
    fn retry_bookkeeping() {
        let (mut env, _handle) =
            PriorityEnvelope::new(GenerationRequest::new("openai", "hi"), Priority::Normal);
        assert_eq!(env.attempt, 0);
        assert_eq!(env.max_retries, 3);

        env = env.with_max_retries(1);
        assert!(env.can_retry());
        assert!(env.record_attempt());
        assert!(!env.can_retry());
        assert!(!env.record_attempt());
    }

    #[tokio::test]
    async fn completion_reaches_the_enqueuer() {
        let (env, handle) =
            PriorityEnvelope::new(GenerationRequest::new("openai", "hi"), Priority::High);
        assert!(env.is_awaited());

        let response = GenerationResponse::new("ok", "openai", "gpt-3.5-turbo");
        assert!(env.complete(Ok(response.clone())));
        assert_eq!(handle.wait().await, Ok(response));
    }

    #[tokio::test]
    async fn dropped_envelope_cancels_handle() {
        let (env, handle) =
            PriorityEnvelope::new(GenerationRequest::new("openai", "hi"), Priority::Low);
        drop(env);
        assert!(matches!(handle.wait().await, Err(WeftError::Canceled(_))));
    }

    #[tokio::test]
    async fn completing_without_waiter_reports_false() {
        let (env, handle) =
            PriorityEnvelope::new(GenerationRequest::new("openai", "hi"), Priority::Low);
        drop(handle);
        assert!(!env.is_awaited());
        assert!(!env.complete(Err(WeftError::provider("openai", "late"))));
    }
}
