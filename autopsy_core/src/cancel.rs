//! Cooperative cancellation.
//!
//! Long enumerations (heap walks, path searches) check the token at
//! loop boundaries and surface [`HeapError::Cancelled`] at the next
//! check after the token fires. No partial result is guaranteed.

use crate::error::{HeapError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation token.
///
/// All clones share one flag: cancelling any clone cancels them all.
///
/// # Example
///
/// ```
/// use autopsy_core::CancelToken;
///
/// let token = CancelToken::new();
/// let worker = token.clone();
///
/// assert!(worker.checkpoint().is_ok());
/// token.cancel();
/// assert!(worker.checkpoint().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been signalled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Return `Err(HeapError::Cancelled)` if cancellation has been
    /// signalled, `Ok(())` otherwise.
    #[inline]
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(HeapError::Cancelled)
        } else {
            Ok(())
        }
    }
}
