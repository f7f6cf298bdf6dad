//! The Graph Scheduler (§4.3): runs one graph execution to completion by
//! dispatching its ready-queue of node executions onto a bounded pool of
//! node-worker tasks, charging usage before every dispatch and folding
//! completions (and their successors) back into the run until the queue
//! runs dry.

mod config;
mod error;
mod pool;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::ChargeError;
pub use scheduler::GraphScheduler;
