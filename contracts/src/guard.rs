//! Reentrancy guard.
//!
//! Every state-changing lockbox entry point holds the guard for its whole
//! duration, including while external code runs. Any attempt to enter the
//! lockbox again before the outer call finishes fails with
//! [`LockboxError::ReentrantCall`].

use crate::error::LockboxError;

#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) -> Result<(), LockboxError> {
        if self.entered {
            return Err(LockboxError::ReentrantCall);
        }
        self.entered = true;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}
