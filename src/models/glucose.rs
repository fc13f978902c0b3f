//! Glucose values, bands and CGM readings.
//!
//! Thresholds are defined in mg/dL; the mmol/L wording used by the patient
//! generator labels maps onto the same integer boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// mg/dL per mmol/L for glucose.
pub const MGDL_PER_MMOLL: f64 = 18.01559;

/// Readings arrive every 5 minutes.
pub const READING_INTERVAL_MINUTES: i64 = 5;

/// 24 * 60 / 5.
pub const READINGS_PER_DAY: u32 = 288;

/// Very low threshold (3.0 mmol/L). Readings strictly below count.
pub const VERY_LOW_BELOW: MgDl = MgDl(54);
/// Low threshold (3.9 mmol/L). Readings strictly below count.
pub const LOW_BELOW: MgDl = MgDl(70);
/// Upper bound of the target range, inclusive.
pub const TARGET_UPPER: MgDl = MgDl(180);

/// Glucose value in mg/dL
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MgDl(pub u16);

/// Glucose value in mmol/L
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MmolL(pub f64);

impl MgDl {
    pub fn format(self) -> String {
        format!("{} mg/dL", self.0)
    }

    pub fn to_mmol(self) -> MmolL {
        MmolL(f64::from(self.0) / MGDL_PER_MMOLL)
    }

    pub fn band(self) -> GlucoseBand {
        if self < VERY_LOW_BELOW {
            GlucoseBand::VeryLow
        } else if self < LOW_BELOW {
            GlucoseBand::Low
        } else if self <= TARGET_UPPER {
            GlucoseBand::InRange
        } else {
            GlucoseBand::High
        }
    }
}

impl MmolL {
    pub fn format(self) -> String {
        format!("{:.1} mmol/L", self.0)
    }

    pub fn to_mgdl(self) -> MgDl {
        MgDl((self.0 * MGDL_PER_MMOLL).round() as u16)
    }
}

impl From<u16> for MgDl {
    fn from(value: u16) -> Self {
        MgDl(value)
    }
}

/// Where a single reading lands relative to the dashboard thresholds.
///
/// `VeryLow` readings also count toward "below 70", so the below-range
/// fractions are cumulative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseBand {
    VeryLow,
    Low,
    InRange,
    High,
}

impl GlucoseBand {
    /// Closed range of synthetic values the generator draws from.
    pub fn synthetic_range(self) -> (u16, u16) {
        match self {
            Self::VeryLow => (40, 53),
            Self::Low => (55, 69),
            Self::InRange => (80, 170),
            Self::High => (200, 300),
        }
    }
}

/// One CGM sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgmReading {
    pub time: DateTime<Utc>,
    pub value: MgDl,
}

impl CgmReading {
    pub fn band(&self) -> GlucoseBand {
        self.value.band()
    }
}
