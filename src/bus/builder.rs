//! Builder pattern for constructing Broker instances.

use crate::bus::config::BrokerConfig;
use crate::bus::Broker;
use crate::executor::{BackgroundExecutor, Executor};
use std::sync::Arc;
use tracing::info;

/// Builder for creating Broker instances
#[derive(Debug, Default)]
pub struct BrokerBuilder {
    config: BrokerConfig,
    default_executor: Option<Arc<dyn Executor>>,
}

impl BrokerBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom configuration
    pub fn config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure the broker
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(BrokerConfig) -> BrokerConfig,
    {
        self.config = f(self.config);
        self
    }

    /// Executor for subscriptions without affinity
    pub fn default_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.default_executor = Some(executor);
        self
    }

    /// Build with strictly sequential dispatch
    pub fn sequential(self) -> Self {
        self.config(BrokerConfig::sequential())
    }

    /// Build with per-executor dispatch
    pub fn per_executor(self) -> Self {
        self.config(BrokerConfig::per_executor())
    }

    /// Build the Broker
    pub fn build(self) -> Broker {
        let default_executor = self.default_executor.unwrap_or_else(|| {
            info!("Using default background executor");
            Arc::new(BackgroundExecutor::new())
        });

        info!(
            dispatch = ?self.config.dispatch,
            executor = default_executor.name(),
            "Broker built"
        );

        Broker::from_parts(self.config, default_executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DispatchMode;

    #[test]
    fn test_builder_default() {
        let broker = BrokerBuilder::new().build();
        assert_eq!(broker.config().dispatch, DispatchMode::Sequential);
        assert_eq!(broker.default_executor().name(), "background");
    }

    #[test]
    fn test_builder_configurations() {
        let broker = BrokerBuilder::new().per_executor().build();
        assert_eq!(broker.config().dispatch, DispatchMode::PerExecutor);

        let broker = BrokerBuilder::new()
            .configure(|c| c.dispatch(DispatchMode::PerExecutor).scope_capacity(2))
            .sequential()
            .build();
        assert_eq!(broker.config().dispatch, DispatchMode::Sequential);

        let broker = BrokerBuilder::new()
            .default_executor(Arc::new(BackgroundExecutor::new().named("pool")))
            .build();
        assert_eq!(broker.default_executor().name(), "pool");
    }
}
