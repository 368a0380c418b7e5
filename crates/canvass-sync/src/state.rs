//! Sync cycle state machine
//!
//! ```text
//! Idle -> UploadingSelf -+-> Aggregating -> Exporting -+-> Distributing -+
//!                        |                             +-> Retracting ---+
//!                        |                             +-----------------+
//!                        +------------------------------------------------+-> RefreshingTurf -> Idle
//! ```
//!
//! `Failed` is reachable from every non-idle state and only leads back to
//! `Idle`.

use crate::error::{Result, SyncError};

/// Phase of a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Idle,
    UploadingSelf,
    Aggregating,
    Exporting,
    Distributing,
    Retracting,
    RefreshingTurf,
    Failed,
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: SyncState) -> &'static [SyncState] {
    use SyncState::*;
    match from {
        Idle => &[UploadingSelf],
        UploadingSelf => &[Aggregating, RefreshingTurf, Failed],
        Aggregating => &[Exporting, Failed],
        Exporting => &[Distributing, Retracting, RefreshingTurf, Failed],
        Distributing => &[RefreshingTurf, Failed],
        Retracting => &[RefreshingTurf, Failed],
        RefreshingTurf => &[Idle, Failed],
        Failed => &[Idle],
    }
}

/// Validate a single transition
///
/// # Errors
/// Returns `SyncError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: SyncState, to: SyncState) -> Result<()> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(SyncError::IllegalTransition { from, to })
    }
}

/// Tracks one cycle's walk through [`SyncState`]
#[derive(Debug, Clone)]
pub struct SyncMachine {
    state: SyncState,
    trail: Vec<SyncState>,
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            trail: vec![SyncState::Idle],
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Every state visited so far, starting with `Idle`
    #[inline]
    #[must_use]
    pub fn trail(&self) -> &[SyncState] {
        &self.trail
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns `SyncError::IllegalTransition` and stays put if not allowed
    pub fn advance(&mut self, to: SyncState) -> Result<()> {
        validate_transition(self.state, to)?;
        tracing::debug!(from = ?self.state, to = ?to, "sync transition");
        self.state = to;
        self.trail.push(to);
        Ok(())
    }

    /// Mark the cycle failed (no-op when idle or already failed)
    pub fn fail(&mut self) {
        if !matches!(self.state, SyncState::Idle | SyncState::Failed) {
            self.state = SyncState::Failed;
            self.trail.push(SyncState::Failed);
        }
    }

    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == SyncState::Failed
    }
}
