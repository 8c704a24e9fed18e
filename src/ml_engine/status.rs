//! Status Resolver - severity counts → overall status label

use crate::types::{OverallStatus, SeverityCount};

/// More high-tier anomalies than this escalate to immediate action.
pub const HIGH_ESCALATION_LIMIT: usize = 3;

/// More medium-tier anomalies than this count as accelerating degradation.
pub const MEDIUM_ESCALATION_LIMIT: usize = 5;

pub struct StatusResolver;

impl StatusResolver {
    /// First matching rule wins.
    pub fn resolve(counts: &SeverityCount) -> OverallStatus {
        if counts.critical > 0 || counts.high > HIGH_ESCALATION_LIMIT {
            OverallStatus::ImmediateActionRequired
        } else if counts.high > 0 || counts.medium > MEDIUM_ESCALATION_LIMIT {
            OverallStatus::DegradationAccelerating
        } else if counts.medium > 0 {
            OverallStatus::ModerateIrregularities
        } else {
            OverallStatus::Stable
        }
    }
}
