//! Configuration for the broker.

/// How a publish walks its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// One handler at a time, in subscription order
    #[default]
    Sequential,

    /// Handlers grouped by executor; groups run concurrently, each group
    /// in subscription order
    PerExecutor,
}

/// Configuration for the broker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Dispatch strategy used by every registry
    pub dispatch: DispatchMode,

    /// Initial capacity of each tier's message type table
    pub type_capacity: usize,

    /// Initial capacity of the scope table
    pub scope_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Sequential,
            type_capacity: 32,
            scope_capacity: 16,
        }
    }
}

impl BrokerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dispatch strategy
    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }

    /// Set the message type table capacity
    pub fn type_capacity(mut self, capacity: usize) -> Self {
        self.type_capacity = capacity;
        self
    }

    /// Set the scope table capacity
    pub fn scope_capacity(mut self, capacity: usize) -> Self {
        self.scope_capacity = capacity;
        self
    }
}

/// Preset configurations for common use cases
impl BrokerConfig {
    /// Strict subscription order across every executor
    pub fn sequential() -> Self {
        Self::default().dispatch(DispatchMode::Sequential)
    }

    /// Independent executors make progress concurrently
    pub fn per_executor() -> Self {
        Self::default().dispatch(DispatchMode::PerExecutor)
    }

    /// Small tables for tests
    pub fn test() -> Self {
        Self::default().type_capacity(4).scope_capacity(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(BrokerConfig::default().dispatch, DispatchMode::Sequential);
        assert_eq!(BrokerConfig::sequential().dispatch, DispatchMode::Sequential);
        assert_eq!(BrokerConfig::per_executor().dispatch, DispatchMode::PerExecutor);

        let config = BrokerConfig::test();
        assert_eq!(config.type_capacity, 4);
        assert_eq!(config.scope_capacity, 4);
    }
}
