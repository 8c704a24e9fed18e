//! Gauge mapping for the battery health dashboard
//!
//! A semicircle gauge over 0-100 anomalies: the needle sits at 180° for none
//! and sweeps to 0° at 100 or more. Zone and colour depend only on the
//! anomaly total. Renderers draw from a [`GaugeReading`]; nothing here
//! rasterises.

use serde::{Deserialize, Serialize};

/// Anomaly count at which the needle reaches the end of the scale.
pub const GAUGE_MAX: usize = 100;

/// Zone boundaries drawn on the scale.
pub const ZONE_TICKS: [usize; 6] = [0, 5, 15, 30, 50, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GaugeZone {
    Safe,
    Normal,
    Warning,
    Caution,
    Danger,
}

impl GaugeZone {
    pub fn from_total(total_anomalies: usize) -> Self {
        if total_anomalies >= 50 {
            Self::Danger
        } else if total_anomalies >= 30 {
            Self::Caution
        } else if total_anomalies >= 15 {
            Self::Warning
        } else if total_anomalies >= 5 {
            Self::Normal
        } else {
            Self::Safe
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Caution => "CAUTION",
            Self::Danger => "DANGER",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Safe => "#4CAF50",
            Self::Normal => "#90EE90",
            Self::Warning => "#DAA520",
            Self::Caution => "#FF8C00",
            Self::Danger => "#DC143C",
        }
    }
}

/// Everything a renderer needs to draw the gauge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeReading {
    pub total_anomalies: usize,
    pub zone: GaugeZone,
    pub color: String,
    /// Needle angle in degrees, 180 (none) to 0 (`GAUGE_MAX` or more)
    pub needle_angle: f64,
}

impl GaugeReading {
    pub fn new(total_anomalies: usize) -> Self {
        let zone = GaugeZone::from_total(total_anomalies);
        let clamped = total_anomalies.min(GAUGE_MAX) as f64;
        Self {
            total_anomalies,
            zone,
            color: zone.color().to_string(),
            needle_angle: 180.0 - clamped * 180.0 / GAUGE_MAX as f64,
        }
    }
}
