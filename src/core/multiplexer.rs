//! Purpose: Turn one upstream call into many independent completions.
//! Exports: `Multiplexer`, `Completion`, `Pending`.
//! Role: Broadcast-once primitive used by the search coordinator.
//! Invariants: State moves Pending -> Completed exactly once and never reverts.
//! Invariants: Subscribers attach only while Pending and each is delivered to once.
//! Invariants: The subscriber list is empty right after completion.
//! Invariants: Cancellation is advisory; completion still arrives through a push.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{Error, ErrorKind};
use super::scope::{ChannelScope, ExcludeSet, exclude_set};

/// What one subscriber receives when the upstream call finishes.
#[derive(Clone, Debug)]
pub struct Completion<T> {
    pub result: Result<Arc<T>, Error>,
    /// Concrete channels of every subscriber in the same batch.
    pub exclude: Arc<ExcludeSet>,
}

/// Receiving half handed to an attached caller.
#[derive(Debug)]
pub struct Pending<T> {
    scope: ChannelScope,
    receiver: oneshot::Receiver<Completion<T>>,
}

impl<T> Pending<T> {
    pub fn scope(&self) -> &ChannelScope {
        &self.scope
    }

    pub async fn wait(self) -> Completion<T> {
        match self.receiver.await {
            Ok(completion) => completion,
            // The multiplexer was dropped without a push.
            Err(_) => Completion {
                result: Err(Error::new(ErrorKind::Canceled)
                    .with_message("search was discarded before completing")),
                exclude: Arc::new(ExcludeSet::new()),
            },
        }
    }
}

struct Subscriber<T> {
    scope: ChannelScope,
    sink: oneshot::Sender<Completion<T>>,
}

enum State {
    Pending,
    Completed,
}

struct Inner<T> {
    state: State,
    subscribers: Vec<Subscriber<T>>,
}

pub struct Multiplexer<T> {
    inner: Arc<Mutex<Inner<T>>>,
    cancel: CancellationToken,
}

impl<T> Clone for Multiplexer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> Default for Multiplexer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Multiplexer<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                subscribers: Vec::new(),
            })),
            cancel: CancellationToken::new(),
        }
    }

    /// Token the upstream call must observe.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.lock().state, State::Completed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn attach(&self, scope: ChannelScope) -> Result<Pending<T>, Error> {
        let mut inner = self.lock();
        if matches!(inner.state, State::Completed) {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("cannot attach to a completed multiplexer"));
        }
        let (sink, receiver) = oneshot::channel();
        inner.subscribers.push(Subscriber {
            scope: scope.clone(),
            sink,
        });
        Ok(Pending { scope, receiver })
    }

    /// Delivers `payload` to every subscriber and returns how many were attached.
    pub fn push_result(&self, payload: T) -> Result<usize, Error> {
        self.finish(Ok(Arc::new(payload)))
    }

    /// Delivers a copy of `error` to every subscriber and returns how many were attached.
    pub fn push_error(&self, error: Error) -> Result<usize, Error> {
        self.finish(Err(error))
    }

    fn finish(&self, result: Result<Arc<T>, Error>) -> Result<usize, Error> {
        let subscribers = {
            let mut inner = self.lock();
            if matches!(inner.state, State::Completed) {
                return Err(Error::new(ErrorKind::Internal)
                    .with_message("multiplexer already completed"));
            }
            inner.state = State::Completed;
            mem::take(&mut inner.subscribers)
        };

        let exclude = Arc::new(exclude_set(subscribers.iter().map(|sub| &sub.scope)));
        let count = subscribers.len();
        match &result {
            Ok(_) => debug!(subscribers = count, "returning result to subscribers"),
            Err(err) => debug!(subscribers = count, error = %err, "returning error to subscribers"),
        }

        for subscriber in subscribers {
            let completion = Completion {
                result: result.clone(),
                exclude: Arc::clone(&exclude),
            };
            // A dropped receiver means the caller went away.
            let _ = subscriber.sink.send(completion);
        }
        Ok(count)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
