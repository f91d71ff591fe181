use super::ShutdownFacility;
use crate::error::{AutoshutdownError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct MockState {
    armed_with: Vec<u32>,
    cancel_calls: usize,
    arm_failures: usize,
    cancel_failures: usize,
}

/// Mock shutdown facility that records calls instead of touching the host
///
/// Clones share the same record, so a test can keep one handle while the
/// controller owns another.
#[derive(Clone, Default)]
pub struct MockShutdownFacility {
    state: Arc<Mutex<MockState>>,
}

impl MockShutdownFacility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `arm` call report failure
    pub fn fail_next_arm(&self) {
        self.state.lock().arm_failures += 1;
    }

    /// Make the next `cancel` call report failure
    pub fn fail_next_cancel(&self) {
        self.state.lock().cancel_failures += 1;
    }

    pub fn arm_calls(&self) -> usize {
        self.state.lock().armed_with.len()
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.lock().cancel_calls
    }

    /// Countdown passed to each `arm` call, in call order
    pub fn armed_with(&self) -> Vec<u32> {
        self.state.lock().armed_with.clone()
    }
}

#[async_trait]
impl ShutdownFacility for MockShutdownFacility {
    async fn arm(&self, countdown_minutes: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.armed_with.push(countdown_minutes);
        if state.arm_failures > 0 {
            state.arm_failures -= 1;
            return Err(AutoshutdownError::shutdown_action("arm", "mock failure"));
        }
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.cancel_calls += 1;
        if state.cancel_failures > 0 {
            state.cancel_failures -= 1;
            return Err(AutoshutdownError::shutdown_action("cancel", "mock failure"));
        }
        Ok(())
    }
}
