mod poll_loop;
mod runtime;
mod types;


pub use poll_loop::PollLoop;
pub use types::{ShutdownReason, TickOutcome};
