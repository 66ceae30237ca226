use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bus::Timing;
use crate::error::ConfigError;

/// Runtime configuration, loaded from a RON file. Every field has a default so
/// a partial file (or none at all) is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgrammerConfig {
    /// How long a clock wait may go without an edge before a diagnostic is
    /// logged. The wait itself never gives up.
    pub edge_warning_ms: u64,
    /// Lower bound for the "clock has stopped" threshold.
    pub clock_stop_floor_ms: u64,
    /// Instruction cap applied to an unbounded `run`.
    pub unbounded_run_cap: u32,
    /// Size of the persistent store in bytes.
    pub store_capacity: usize,
    /// Samples averaged per analog reading.
    pub analog_samples: u8,
}

impl Default for ProgrammerConfig {
    fn default() -> Self {
        Self {
            edge_warning_ms: 2000,
            clock_stop_floor_ms: 100,
            unbounded_run_cap: 0x7FFF_FFFF,
            store_capacity: 1024,
            analog_samples: 16,
        }
    }
}

impl ProgrammerConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::de::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&source)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn timing(&self) -> Timing {
        Timing {
            edge_warning_us: self.edge_warning_ms.saturating_mul(1000),
            clock_stop_floor_us: self.clock_stop_floor_ms.saturating_mul(1000),
        }
    }
}
