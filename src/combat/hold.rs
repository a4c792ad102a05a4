//! Osaekomi (hold) timing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::score::{PointType, Side};
use crate::error::{EngineError, EngineResult};

/// Duration bands converting a hold into a score, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldThresholds {
    pub yuko_secs: f64,
    pub wazari_secs: f64,
    pub ippon_secs: f64,
}

impl Default for HoldThresholds {
    fn default() -> Self {
        Self {
            yuko_secs: 3.0,
            wazari_secs: 10.0,
            ippon_secs: 20.0,
        }
    }
}

impl HoldThresholds {
    /// Bands must be positive and strictly increasing
    pub fn validate(&self) -> EngineResult<()> {
        let ordered = 0.0 < self.yuko_secs
            && self.yuko_secs < self.wazari_secs
            && self.wazari_secs < self.ippon_secs;
        if !ordered {
            return Err(EngineError::validation(format!(
                "hold thresholds must increase: yuko {} < wazari {} < ippon {}",
                self.yuko_secs, self.wazari_secs, self.ippon_secs
            )));
        }
        Ok(())
    }

    /// Score earned by a hold of the given length
    pub fn award(&self, held_secs: f64) -> Option<PointType> {
        if held_secs >= self.ippon_secs {
            Some(PointType::Ippon)
        } else if held_secs >= self.wazari_secs {
            Some(PointType::Wazari)
        } else if held_secs >= self.yuko_secs {
            Some(PointType::Yuko)
        } else {
            None
        }
    }
}

/// Hold sub-state of a combat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldState {
    pub active: bool,
    pub side: Option<Side>,
    pub started_at: Option<DateTime<Utc>>,
}

impl HoldState {
    pub fn start(side: Side) -> Self {
        Self {
            active: true,
            side: Some(side),
            started_at: Some(Utc::now()),
        }
    }

    pub fn clear(&mut self) {
        *self = HoldState::default();
    }
}

/// Result of stopping a hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HoldOutcome {
    pub side: Side,
    pub point: Option<PointType>,
    pub finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        let t = HoldThresholds::default();
        assert_eq!(t.award(0.0), None);
        assert_eq!(t.award(2.0), None);
        assert_eq!(t.award(2.9), None);
        assert_eq!(t.award(3.0), Some(PointType::Yuko));
        assert_eq!(t.award(9.0), Some(PointType::Yuko));
        assert_eq!(t.award(10.0), Some(PointType::Wazari));
        assert_eq!(t.award(19.0), Some(PointType::Wazari));
        assert_eq!(t.award(20.0), Some(PointType::Ippon));
        assert_eq!(t.award(45.0), Some(PointType::Ippon));
    }

    #[test]
    fn test_custom_thresholds() {
        let t = HoldThresholds {
            yuko_secs: 5.0,
            wazari_secs: 10.0,
            ippon_secs: 15.0,
        };
        assert_eq!(t.award(4.0), None);
        assert_eq!(t.award(15.0), Some(PointType::Ippon));
    }

    #[test]
    fn test_validate() {
        HoldThresholds::default().validate().unwrap();
        let bad = HoldThresholds {
            yuko_secs: 0.0,
            wazari_secs: 10.0,
            ippon_secs: 20.0,
        };
        assert!(bad.validate().is_err());
    }
}
