//! Orchestrator Configuration
//!
//! Model settings applied to every chat turn.

use crate::config::ChatVendorConfig;

/// Configuration for a ChatOrchestrator
///
/// ```ignore
/// let config = OrchestratorConfig::new("moonshot-v1-8k").with_temperature(0.3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Model name sent with both the streamed and the follow-up request
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,
}

impl OrchestratorConfig {
    /// Create a configuration for a model with the default temperature
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.3,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

impl From<&ChatVendorConfig> for OrchestratorConfig {
    fn from(vendor: &ChatVendorConfig) -> Self {
        Self::new(&vendor.model).with_temperature(vendor.temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_config_defaults() {
        let config = OrchestratorConfig::new("moonshot-v1-8k");
        assert_eq!(config.model, "moonshot-v1-8k");
        assert!((config.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_vendor_config() {
        let vendor = ChatVendorConfig {
            api_key: None,
            base_url: "http://localhost:9000/v1".into(),
            model: "moonshot-v1-32k".into(),
            temperature: 0.7,
        };
        let config = OrchestratorConfig::from(&vendor);
        assert_eq!(config.model, "moonshot-v1-32k");
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }
}
