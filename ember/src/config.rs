use ember_bus::BusConfig;
use ember_execution::{RiskConfig, RouterConfig};
use ember_supervisor::SupervisorConfig;
use serde::{Deserialize, Serialize};

/// The full set of `Default`-backed config structs from §6, gathered into
/// one value a (out of scope) CLI/config loader deserializes and hands to
/// `main` by value. The core itself never reads environment variables or
/// files directly.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmberConfig {
    pub bus: BusConfig,
    pub router: RouterConfig,
    pub risk: RiskConfig,
    pub supervisor: SupervisorConfig,
}

impl Default for EmberConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            router: RouterConfig::default(),
            risk: RiskConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}
