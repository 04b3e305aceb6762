use crate::error::PipelineError;
use crate::output::OutputResolver;
use std::sync::Arc;
use weave_discovery::{Aggregator, Scanner};
use weave_domain::config::WeaveConfig;

/// Everything one build invocation shares between its tasks.
///
/// Created at the start of [`crate::Pipeline::run`] and dropped at its end; nothing
/// survives from one build to the next.
#[derive(Debug)]
pub struct BuildContext {
    pub config: WeaveConfig,
    pub scanner: Scanner,
    pub aggregator: Aggregator,
    pub outputs: Arc<dyn OutputResolver>,
}

impl BuildContext {
    /// # Errors
    /// Returns [`PipelineError::Discovery`] when the marker, registry name or exclusion
    /// rules in `config` are invalid.
    pub fn new(config: WeaveConfig, outputs: Arc<dyn OutputResolver>) -> Result<Self, PipelineError> {
        let scanner = Scanner::new(&config)?;
        Ok(Self { config, scanner, aggregator: Aggregator::new(), outputs })
    }
}
