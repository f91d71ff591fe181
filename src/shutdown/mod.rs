//! Delayed-shutdown state machine.
//!
//! The controller is edge-triggered: the external facility is only called when
//! the aggregate flips relative to the tracked state, so a running countdown is
//! never reset by repeated idle ticks. The tracked state only changes after the
//! facility reports success.

mod command;
pub mod mock;

pub use command::{CommandShutdownFacility, DryRunShutdownFacility};

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use tracing::{error, info};

/// Whether a shutdown countdown is pending on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownState {
    #[default]
    Disarmed,
    Armed,
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disarmed => write!(f, "disarmed"),
            Self::Armed => write!(f, "armed"),
        }
    }
}

/// The host facility that schedules and cancels the delayed shutdown.
#[async_trait]
pub trait ShutdownFacility: Send + Sync {
    /// Schedule a shutdown `countdown_minutes` from now
    async fn arm(&self, countdown_minutes: u32) -> Result<()>;

    /// Cancel a pending shutdown
    async fn cancel(&self) -> Result<()>;
}

/// What the controller did on one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerAction {
    /// No transition required
    None,
    Armed,
    ArmFailed(String),
    Cancelled,
    CancelFailed(String),
}

pub struct ShutdownController {
    facility: Box<dyn ShutdownFacility>,
    countdown_minutes: u32,
}

impl ShutdownController {
    pub fn new(facility: Box<dyn ShutdownFacility>, countdown_minutes: u32) -> Self {
        Self {
            facility,
            countdown_minutes,
        }
    }

    /// Apply one tick's aggregate to `state`.
    ///
    /// Failures leave `state` untouched; the next tick re-evaluates and
    /// therefore retries.
    pub async fn evaluate(&self, state: &mut ShutdownState, busy: bool) -> ControllerAction {
        match (*state, busy) {
            (ShutdownState::Armed, true) => {
                info!("At least one service became active, canceling the shutdown ...");
                match self.facility.cancel().await {
                    Ok(()) => {
                        *state = ShutdownState::Disarmed;
                        info!(state = %state, "Shutdown has been successfully canceled");
                        ControllerAction::Cancelled
                    }
                    Err(e) => {
                        error!(
                            state = %state,
                            "An error occurred while canceling the shutdown: {}", e
                        );
                        ControllerAction::CancelFailed(e.to_string())
                    }
                }
            }
            (ShutdownState::Disarmed, false) => {
                info!(
                    "No services active, setting up shutdown in {} minute(s) ...",
                    self.countdown_minutes
                );
                match self.facility.arm(self.countdown_minutes).await {
                    Ok(()) => {
                        *state = ShutdownState::Armed;
                        info!(state = %state, "Shutdown has been successfully set up");
                        ControllerAction::Armed
                    }
                    Err(e) => {
                        error!(
                            state = %state,
                            "An error occurred while setting up the shutdown: {}", e
                        );
                        ControllerAction::ArmFailed(e.to_string())
                    }
                }
            }
            (ShutdownState::Disarmed, true) | (ShutdownState::Armed, false) => {
                ControllerAction::None
            }
        }
    }

    /// Cancel a pending countdown regardless of activity. Used once on exit.
    pub async fn disarm(&self, state: &mut ShutdownState) -> ControllerAction {
        if *state == ShutdownState::Disarmed {
            return ControllerAction::None;
        }

        match self.facility.cancel().await {
            Ok(()) => {
                *state = ShutdownState::Disarmed;
                info!(state = %state, "Pending shutdown canceled on exit");
                ControllerAction::Cancelled
            }
            Err(e) => {
                error!(state = %state, "Failed to cancel the pending shutdown on exit: {}", e);
                ControllerAction::CancelFailed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockShutdownFacility;
    use super::*;

    fn controller(facility: &MockShutdownFacility) -> ShutdownController {
        ShutdownController::new(Box::new(facility.clone()), 15)
    }

    #[tokio::test]
    async fn test_busy_while_disarmed_is_noop() {
        let facility = MockShutdownFacility::new();
        let controller = controller(&facility);
        let mut state = ShutdownState::Disarmed;

        for _ in 0..5 {
            assert_eq!(controller.evaluate(&mut state, true).await, ControllerAction::None);
        }

        assert_eq!(state, ShutdownState::Disarmed);
        assert_eq!(facility.arm_calls(), 0);
        assert_eq!(facility.cancel_calls(), 0);
    }

    #[tokio::test]
    async fn test_idle_arms_once_and_never_resets_countdown() {
        let facility = MockShutdownFacility::new();
        let controller = controller(&facility);
        let mut state = ShutdownState::Disarmed;

        assert_eq!(controller.evaluate(&mut state, false).await, ControllerAction::Armed);
        for _ in 0..5 {
            assert_eq!(controller.evaluate(&mut state, false).await, ControllerAction::None);
        }

        assert_eq!(state, ShutdownState::Armed);
        assert_eq!(facility.arm_calls(), 1);
        assert_eq!(facility.armed_with(), vec![15]);
    }

    #[tokio::test]
    async fn test_failed_arm_keeps_state_and_retries_next_tick() {
        let facility = MockShutdownFacility::new();
        facility.fail_next_arm();
        let controller = controller(&facility);
        let mut state = ShutdownState::Disarmed;

        assert!(matches!(
            controller.evaluate(&mut state, false).await,
            ControllerAction::ArmFailed(_)
        ));
        assert_eq!(state, ShutdownState::Disarmed);

        assert_eq!(controller.evaluate(&mut state, false).await, ControllerAction::Armed);
        assert_eq!(state, ShutdownState::Armed);
        assert_eq!(facility.arm_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_cancel_retries_every_busy_tick_until_success() {
        let facility = MockShutdownFacility::new();
        facility.fail_next_cancel();
        facility.fail_next_cancel();
        let controller = controller(&facility);
        let mut state = ShutdownState::Armed;

        for expected_calls in 1..=2 {
            assert!(matches!(
                controller.evaluate(&mut state, true).await,
                ControllerAction::CancelFailed(_)
            ));
            assert_eq!(state, ShutdownState::Armed);
            assert_eq!(facility.cancel_calls(), expected_calls);
        }

        assert_eq!(controller.evaluate(&mut state, true).await, ControllerAction::Cancelled);
        assert_eq!(controller.evaluate(&mut state, true).await, ControllerAction::None);
        assert_eq!(state, ShutdownState::Disarmed);
        assert_eq!(facility.cancel_calls(), 3);
    }

    #[tokio::test]
    async fn test_arm_then_cancel_round_trip() {
        let facility = MockShutdownFacility::new();
        let controller = controller(&facility);
        let mut state = ShutdownState::default();

        controller.evaluate(&mut state, false).await;
        controller.evaluate(&mut state, true).await;

        assert_eq!(state, ShutdownState::Disarmed);
        assert_eq!(facility.arm_calls(), 1);
        assert_eq!(facility.cancel_calls(), 1);
    }

    #[tokio::test]
    async fn test_disarm_only_cancels_when_armed() {
        let facility = MockShutdownFacility::new();
        let controller = controller(&facility);

        let mut state = ShutdownState::Disarmed;
        assert_eq!(controller.disarm(&mut state).await, ControllerAction::None);
        assert_eq!(facility.cancel_calls(), 0);

        let mut state = ShutdownState::Armed;
        assert_eq!(controller.disarm(&mut state).await, ControllerAction::Cancelled);
        assert_eq!(state, ShutdownState::Disarmed);
        assert_eq!(facility.cancel_calls(), 1);
    }
}
