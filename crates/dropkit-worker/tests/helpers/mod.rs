pub mod fixtures;

use dropkit_core::{PipelineConfig, SequentialIds};
use dropkit_worker::Session;
use std::sync::Arc;

/// Session with deterministic ids and default limits.
pub fn test_session() -> Session {
    test_session_with(PipelineConfig::default())
}

pub fn test_session_with(config: PipelineConfig) -> Session {
    Session::with_ids(config, Arc::new(SequentialIds::new()))
}
