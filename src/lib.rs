pub mod aggregator;
pub mod app;
pub mod command;
pub mod config;
pub mod error;
pub mod housekeeping;
pub mod logging;
pub mod probe;
pub mod shutdown;

pub use aggregator::{ActivityAggregator, ProbeReport, Tick};
pub use app::{PollLoop, ShutdownReason, TickOutcome};
pub use config::{AutoshutdownConfig, UnknownPolicy};
pub use error::{AutoshutdownError, Result};
pub use housekeeping::{CleanupResult, Housekeeping, HousekeepingSchedule, LogRetention};
pub use probe::{
    ActivityProbe, DownloadQueueProbe, FileSharingProbe, Guarded, LoginSessionProbe,
    MediaServerProbe, ProbeResult,
};
pub use shutdown::{
    CommandShutdownFacility, ControllerAction, DryRunShutdownFacility, ShutdownController,
    ShutdownFacility, ShutdownState,
};
