//! Subscriber registry for validated notices.
//!
//! Subscribers are plain callbacks keyed by [`NoticeKind`]. [`Dispatcher::emit`]
//! calls them synchronously in registration order. A subscriber that returns
//! `Err` or panics does not stop the others; the failure is logged, handed to
//! every `on_error` hook, and returned to the caller.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::claims::{Notice, NoticeKind};

pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Subscriber = Arc<dyn Fn(&Notice) -> Result<(), SubscriberError> + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&DispatchFailure) + Send + Sync>;

/// A subscriber that failed while handling a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub kind: NoticeKind,
    /// Position of the subscriber in registration order.
    pub index: usize,
    pub transaction_id: Option<String>,
    pub message: String,
}

impl std::fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} subscriber #{} failed: {}",
            self.kind, self.index, self.message
        )
    }
}

#[derive(Default)]
pub struct Dispatcher {
    subscribers: RwLock<HashMap<NoticeKind, Vec<Subscriber>>>,
    error_hooks: RwLock<Vec<ErrorHook>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("dispatcher lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("dispatcher lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for notices of `kind`.
    pub fn on<F>(&self, kind: NoticeKind, callback: F)
    where
        F: Fn(&Notice) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        write(&self.subscribers)
            .entry(kind)
            .or_default()
            .push(Arc::new(callback));
    }

    /// Register a hook that sees every subscriber failure.
    pub fn on_error<F>(&self, hook: F)
    where
        F: Fn(&DispatchFailure) + Send + Sync + 'static,
    {
        write(&self.error_hooks).push(Arc::new(hook));
    }

    pub fn listener_count(&self, kind: NoticeKind) -> usize {
        read(&self.subscribers).get(&kind).map_or(0, Vec::len)
    }

    /// Drop every subscriber and error hook.
    pub fn remove_all_listeners(&self) {
        write(&self.subscribers).clear();
        write(&self.error_hooks).clear();
    }

    /// Deliver `notice` to every subscriber of `kind`.
    pub fn emit(&self, kind: NoticeKind, notice: &Notice) -> Vec<DispatchFailure> {
        // Snapshot so callbacks may register listeners without deadlocking.
        let subscribers: Vec<Subscriber> = read(&self.subscribers)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        tracing::debug!(
            kind = %kind,
            subscribers = subscribers.len(),
            transaction_id = notice.transaction_id().unwrap_or(""),
            "dispatching notice"
        );

        let mut failures = Vec::new();
        for (index, subscriber) in subscribers.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| subscriber(notice)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            let failure = DispatchFailure {
                kind,
                index,
                transaction_id: notice.transaction_id().map(String::from),
                message,
            };
            tracing::error!(
                kind = %kind,
                index,
                transaction_id = failure.transaction_id.as_deref().unwrap_or(""),
                error = %failure.message,
                "notice subscriber failed"
            );
            failures.push(failure);
        }

        if !failures.is_empty() {
            let hooks: Vec<ErrorHook> = read(&self.error_hooks).clone();
            for failure in &failures {
                for hook in &hooks {
                    hook(failure);
                }
            }
        }

        failures
    }
}
