//! Single-shot settlement of a native call.
//!
//! A call moves through `Created → Encoding → Dispatched → (Resolved | Rejected)` and
//! never goes back. The broker keeps the [`Settlement`] half and hands the caller a
//! [`PendingRequest`]; settling consumes the `Settlement`, so a call cannot be settled
//! twice.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallState {
    Created = 0,
    Encoding = 1,
    Dispatched = 2,
    Resolved = 3,
    Rejected = 4,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Resolved | CallState::Rejected)
    }

    fn can_advance_to(self, next: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, next),
            (Created, Encoding)
                | (Created, Rejected)
                | (Encoding, Dispatched)
                | (Encoding, Rejected)
                | (Dispatched, Resolved)
                | (Dispatched, Rejected)
        )
    }

    fn from_u8(raw: u8) -> CallState {
        match raw {
            0 => CallState::Created,
            1 => CallState::Encoding,
            2 => CallState::Dispatched,
            3 => CallState::Resolved,
            _ => CallState::Rejected,
        }
    }
}

/// Shared view of one call's state.
#[derive(Debug, Clone)]
pub(crate) struct CallTracker(Arc<AtomicU8>);

impl CallTracker {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(CallState::Created as u8)))
    }

    pub(crate) fn state(&self) -> CallState {
        CallState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` if that is a forward transition from the current state.
    pub(crate) fn advance(&self, next: CallState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if !CallState::from_u8(current).can_advance_to(next) {
                return false;
            }
            match self.0.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// The producer half of a call: settles it exactly once.
#[derive(Debug)]
pub(crate) struct Settlement {
    tx: oneshot::Sender<Result<Value>>,
    tracker: CallTracker,
}

impl Settlement {
    pub(crate) fn tracker(&self) -> &CallTracker {
        &self.tracker
    }

    pub(crate) fn settle(self, outcome: Result<Value>) {
        let terminal = if outcome.is_ok() {
            CallState::Resolved
        } else {
            CallState::Rejected
        };
        if !self.tracker.advance(terminal) {
            tracing::warn!(state = ?self.tracker.state(), ?terminal, "unexpected settlement order");
        }
        // Err means the caller dropped its PendingRequest; nobody is left to tell.
        let _ = self.tx.send(outcome);
    }
}

#[derive(Debug)]
enum Slot {
    Settled(Result<Value>),
    Waiting(oneshot::Receiver<Result<Value>>),
    Taken,
}

/// Future for the reply of one native call. Settles exactly once.
#[derive(Debug)]
#[must_use = "a PendingRequest does nothing observable unless awaited"]
pub struct PendingRequest {
    slot: Slot,
    tracker: CallTracker,
}

impl PendingRequest {
    pub(crate) fn channel(tracker: CallTracker) -> (Settlement, PendingRequest) {
        let (tx, rx) = oneshot::channel();
        (
            Settlement {
                tx,
                tracker: tracker.clone(),
            },
            PendingRequest {
                slot: Slot::Waiting(rx),
                tracker,
            },
        )
    }

    /// A request that failed before anything was dispatched.
    pub(crate) fn rejected(tracker: CallTracker, err: BridgeError) -> PendingRequest {
        tracker.advance(CallState::Rejected);
        PendingRequest {
            slot: Slot::Settled(Err(err)),
            tracker,
        }
    }

    pub fn state(&self) -> CallState {
        self.tracker.state()
    }
}

impl Future for PendingRequest {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.slot, Slot::Taken) {
            Slot::Settled(outcome) => Poll::Ready(outcome),
            Slot::Waiting(mut rx) => match Pin::new(&mut rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::transport(
                    "call was abandoned before it settled",
                ))),
                Poll::Pending => {
                    this.slot = Slot::Waiting(rx);
                    Poll::Pending
                }
            },
            Slot::Taken => panic!("PendingRequest polled after completion"),
        }
    }
}
