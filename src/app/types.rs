use crate::aggregator::Tick;
use crate::shutdown::{ControllerAction, ShutdownState};

/// Why the poll loop stopped
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Cancelled,
}

/// Everything one tick observed and did
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub tick: Tick,
    pub busy: bool,
    pub action: ControllerAction,
    pub state: ShutdownState,
}
