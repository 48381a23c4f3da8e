use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{BillError, Result};

/// hourly, matching how often bills can realistically change state
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// seconds between auto-pay sweeps
    pub sweep_interval_secs: u64,
    /// wall-clock time used when a new bill does not name one
    pub default_time_of_day: NaiveTime,
    pub default_timezone: Tz,
    /// days before the due date at which reminders go out
    pub default_remind_offsets: Vec<u32>,
    pub max_autopay_lead_days: u32,
    /// longest lead or reminder offset accepted anywhere
    pub max_offset_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            default_time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            default_timezone: Tz::UTC,
            default_remind_offsets: vec![3, 1],
            max_autopay_lead_days: 30,
            max_offset_days: 365,
        }
    }
}

impl EngineConfig {
    /// parse from json, missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| BillError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            return Err(BillError::InvalidConfiguration {
                message: "sweep interval must be at least one second".to_string(),
            });
        }

        if self.max_autopay_lead_days > self.max_offset_days {
            return Err(BillError::InvalidConfiguration {
                message: format!(
                    "auto-pay lead cap {} exceeds offset cap {}",
                    self.max_autopay_lead_days, self.max_offset_days
                ),
            });
        }

        if let Some(offset) = self
            .default_remind_offsets
            .iter()
            .find(|offset| **offset > self.max_offset_days)
        {
            return Err(BillError::InvalidConfiguration {
                message: format!("reminder offset {} exceeds {} days", offset, self.max_offset_days),
            });
        }

        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// sweep interval as a calendar span, for reminder windows
    pub fn sweep_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.sweep_interval_secs.min(i64::MAX as u64) as i64)
    }
}
