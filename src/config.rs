use crate::error::{DealEngineError, Result};
use crate::funding::SeverityThresholds;
use crate::schema::VehicleFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MONTHS_BACK: u32 = 6;
pub const MAX_MONTHS_BACK: u32 = 120;

fn default_months_back() -> u32 {
    DEFAULT_MONTHS_BACK
}

/// Caller-supplied settings for one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default)]
    #[schemars(
        description = "Monthly back-end profit target. 0 or less means no goal is set and progress reports 0."
    )]
    pub monthly_goal: f64,

    #[serde(default = "default_months_back")]
    #[schemars(description = "Number of calendar months in the trend series, ending with the current month (1-120)")]
    pub months_back: u32,

    #[serde(default)]
    #[schemars(description = "Day counts at which unfunded deals escalate. Defaults to 7 days critical, 3 days warning.")]
    pub thresholds: SeverityThresholds,

    #[serde(default)]
    #[schemars(description = "Whether vehicle labels include the VIN")]
    pub vehicle_format: VehicleFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monthly_goal: 0.0,
            months_back: DEFAULT_MONTHS_BACK,
            thresholds: SeverityThresholds::default(),
            vehicle_format: VehicleFormat::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_goal(monthly_goal: f64) -> Self {
        Self {
            monthly_goal,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.monthly_goal.is_finite() {
            return Err(DealEngineError::InvalidGoal(self.monthly_goal));
        }
        if self.months_back == 0 || self.months_back > MAX_MONTHS_BACK {
            return Err(DealEngineError::InvalidMonthsBack(self.months_back));
        }
        self.thresholds.validate()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}
