//! Dropkit Worker
//!
//! Run orchestration: the session context, the sequential pipeline,
//! progress reporting over a watch channel, cancellation and bundle sinks.

pub mod pipeline;
pub mod reporter;
pub mod session;
pub mod sink;

pub use pipeline::Pipeline;
pub use reporter::ProgressReporter;
pub use session::Session;
pub use sink::{BundleSink, DirectorySink, MemorySink};
pub use tokio_util::sync::CancellationToken;
