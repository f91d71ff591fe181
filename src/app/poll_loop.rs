use super::types::TickOutcome;
use crate::aggregator::ActivityAggregator;
use crate::config::{AutoshutdownConfig, PollConfig};
use crate::error::Result;
use crate::housekeeping::Housekeeping;
use crate::probe;
use crate::shutdown::{ShutdownController, ShutdownFacility, ShutdownState};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const TICK_SEPARATOR: &str = "-------------------------------------------------------------";

/// Drives the tick cadence and owns the shutdown state
pub struct PollLoop {
    pub(super) config: PollConfig,
    pub(super) interval: Duration,
    pub(super) aggregator: ActivityAggregator,
    pub(super) controller: ShutdownController,
    pub(super) state: ShutdownState,
    pub(super) housekeeping: Option<Housekeeping>,
    pub(super) ticks: u64,
    pub(super) cancellation_token: CancellationToken,
}

impl PollLoop {
    /// Build the loop, its probes and housekeeping from configuration
    pub fn from_config(
        config: &AutoshutdownConfig,
        facility: Box<dyn ShutdownFacility>,
    ) -> Result<Self> {
        let probes = probe::build_probes(config)?;
        let aggregator = ActivityAggregator::new(probes).with_poll_config(&config.poll);
        let controller = ShutdownController::new(facility, config.poll.countdown_minutes);
        let housekeeping = Housekeeping::from_config(&config.logging, &config.poll);

        Ok(Self::new(config.poll.clone(), aggregator, controller, housekeeping))
    }

    pub fn new(
        config: PollConfig,
        aggregator: ActivityAggregator,
        controller: ShutdownController,
        housekeeping: Option<Housekeeping>,
    ) -> Self {
        Self {
            interval: config.interval(),
            config,
            aggregator,
            controller,
            state: ShutdownState::Disarmed,
            housekeeping,
            ticks: 0,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Override the sleep between ticks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop on an externally owned token instead of a private one
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Token that stops the loop after the current tick when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Run one aggregation cycle and feed it to the controller
    pub async fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;

        let tick = self.aggregator.run_tick().await;
        let busy = tick.is_busy(self.aggregator.unknown_policy());
        let action = self.controller.evaluate(&mut self.state, busy).await;

        info!(
            tick = self.ticks,
            busy,
            state = %self.state,
            "{}",
            TICK_SEPARATOR
        );

        if let Some(housekeeping) = self.housekeeping.as_mut() {
            housekeeping.on_tick().await;
        }

        TickOutcome {
            tick,
            busy,
            action,
            state: self.state,
        }
    }
}
