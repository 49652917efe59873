//! Cooperative cancellation.
//!
//! The orchestrator checks the token between stages and before each
//! persistence step; in-flight subprocess work finishes its current call
//! before the pipeline observes the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use repflow_core::AppError;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Bail out of the pipeline when cancellation was requested.
    pub fn check(&self) -> Result<(), AppError> {
        if self.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_clear_and_latches() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(AppError::Cancelled)));
        // Clones observe the same flag.
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }
}
