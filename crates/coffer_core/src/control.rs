//! Cancellation and progress reporting for long-running operations.
//!
//! Key derivation and save are the only operations expected to run off the
//! caller's primary control flow. Both take a [`TransformControl`]: a
//! cloneable cancel token plus an optional progress callback. Cancellation
//! discards intermediate buffers and returns [`CoreError::Cancelled`]
//! without mutating engine state.

use crate::error::{CoreError, CoreResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag shared between the caller and a running
/// operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The running operation observes the flag at
    /// its next checkpoint.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress callback: `(done, total)` units of the current operation.
pub type ProgressFn = dyn Fn(u32, u32) + Send + Sync;

/// Control handle for key derivation and save.
#[derive(Default)]
pub struct TransformControl {
    cancel: CancelToken,
    progress: Option<Box<ProgressFn>>,
}

impl TransformControl {
    /// Creates a control with no cancellation and no progress reporting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a control observing the given cancel token.
    #[must_use]
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    /// Attaches a progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: impl Fn(u32, u32) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Returns the cancel token observed by this control.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fails with [`CoreError::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> CoreResult<()> {
        if self.cancel.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Reports progress to the attached callback, if any.
    pub fn report(&self, done: u32, total: u32) {
        if let Some(progress) = &self.progress {
            progress(done, total);
        }
    }
}

impl std::fmt::Debug for TransformControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformControl")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}
