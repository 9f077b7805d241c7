//! Hazard and risk score models

use serde::{Deserialize, Serialize};

/// Hazards scored by the risk engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Hazard {
    Flood,
    Drought,
    Storm,
    ExtremeTemperature,
}

impl Hazard {
    pub const ALL: [Hazard; 4] = [
        Hazard::Flood,
        Hazard::Drought,
        Hazard::Storm,
        Hazard::ExtremeTemperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Hazard::Flood => "flood",
            Hazard::Drought => "drought",
            Hazard::Storm => "storm",
            Hazard::ExtremeTemperature => "extreme_temperature",
        }
    }
}

impl std::fmt::Display for Hazard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent per-hazard risk scores, each in [0, 1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct RiskScores {
    pub flood: f64,
    pub drought: f64,
    pub storm: f64,
    pub extreme_temperature: f64,
}

impl RiskScores {
    pub fn get(&self, hazard: Hazard) -> f64 {
        match hazard {
            Hazard::Flood => self.flood,
            Hazard::Drought => self.drought,
            Hazard::Storm => self.storm,
            Hazard::ExtremeTemperature => self.extreme_temperature,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Hazard, f64)> + '_ {
        Hazard::ALL.into_iter().map(move |h| (h, self.get(h)))
    }

    /// Highest-scoring hazard; ties resolve to the earlier hazard
    pub fn dominant(&self) -> (Hazard, f64) {
        self.iter()
            .fold((Hazard::Flood, self.flood), |best, next| {
                if next.1 > best.1 {
                    next
                } else {
                    best
                }
            })
    }
}
