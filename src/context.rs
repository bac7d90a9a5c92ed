/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Caller-supplied cancellation and deadlines.
//!
//! Every [`OracleDb`](crate::database::OracleDb) operation takes a `&Context`. The context is checked
//! before the operation touches the key-value store and again right before a write batch is
//! committed. If either check fails, the operation returns
//! [`CancelledFault`](crate::error::OracleDbError::CancelledFault) and nothing is written.
//!
//! Once a write batch has been handed to the key-value store the operation is no longer cancellable: a
//! write that committed reports success even if the deadline passed while it was being committed.
//!
//! Clones of a `Context` share the same cancellation flag, so a context can be cloned into another
//! thread and cancelled from there.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use thiserror::Error;

#[derive(Clone, Debug)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// Create a context that is never cancelled unless [`cancel`](Self::cancel) is called, and has no
    /// deadline.
    pub fn background() -> Context {
        Context {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a context whose deadline is `timeout` from now.
    ///
    /// A `timeout` too large to be added to the current instant is treated as no deadline.
    pub fn with_timeout(timeout: Duration) -> Context {
        Context {
            deadline: Instant::now().checked_add(timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Context {
        Context {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Get the reason this context is done, or `None` if operations may still proceed.
    ///
    /// Explicit cancellation takes precedence over an expired deadline.
    pub fn err(&self) -> Option<CancelReason> {
        if self.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::background()
    }
}

/// Why a [`Context`] stopped an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CancelReason {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}
