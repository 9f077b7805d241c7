//! Alert threshold policy and static alert templates

use serde::{Deserialize, Serialize};

use crate::models::{AlertCandidate, AlertContent, Hazard, RiskScores};
use crate::types::Severity;

/// Thresholds applied to each hazard score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertPolicy {
    /// A score strictly above this raises an alert
    pub alert_threshold: f64,
    /// A score strictly above this raises a high-severity alert
    pub high_severity_threshold: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            alert_threshold: 0.7,
            high_severity_threshold: 0.8,
        }
    }
}

/// Outcome of evaluating one hazard in a sweep
#[derive(Debug, Clone, PartialEq)]
pub enum HazardEvaluation {
    BelowThreshold { hazard: Hazard, score: f64 },
    BreachDetected(AlertCandidate),
}

impl AlertPolicy {
    pub fn severity(&self, score: f64) -> Severity {
        if score > self.high_severity_threshold {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Evaluate every hazard, in hazard order
    pub fn evaluate(&self, location: &str, scores: &RiskScores) -> Vec<HazardEvaluation> {
        scores
            .iter()
            .map(|(hazard, score)| {
                if score > self.alert_threshold {
                    HazardEvaluation::BreachDetected(AlertCandidate {
                        hazard,
                        severity: self.severity(score),
                        location: location.to_string(),
                        risk_value: score,
                    })
                } else {
                    HazardEvaluation::BelowThreshold { hazard, score }
                }
            })
            .collect()
    }

    /// Only the breaching hazards
    pub fn breaches(&self, location: &str, scores: &RiskScores) -> Vec<AlertCandidate> {
        self.evaluate(location, scores)
            .into_iter()
            .filter_map(|evaluation| match evaluation {
                HazardEvaluation::BreachDetected(candidate) => Some(candidate),
                HazardEvaluation::BelowThreshold { .. } => None,
            })
            .collect()
    }
}

/// Deterministic alert text keyed by hazard
pub fn template_content(candidate: &AlertCandidate) -> AlertContent {
    let severity = candidate.severity.title();
    let location = candidate.location.as_str();

    let (title, description, instructions, duration) = match candidate.hazard {
        Hazard::Flood => (
            format!("Flood {severity} Alert for {location}"),
            format!(
                "Heavy rainfall and rising water levels pose a flood risk in {location}. \
                 Monitor local conditions and be prepared to evacuate if necessary."
            ),
            "Move to higher ground, avoid flooded roads, and stay informed through official channels.",
            "Alert remains in effect until water levels recede.",
        ),
        Hazard::Drought => (
            format!("Drought {severity} Alert for {location}"),
            format!(
                "Extended dry conditions and high temperatures are creating drought conditions \
                 in {location}. Water conservation measures are recommended."
            ),
            "Conserve water, avoid outdoor burning, and monitor local water restrictions.",
            "Alert continues until significant precipitation occurs.",
        ),
        Hazard::Storm => (
            format!("Severe Storm {severity} Alert for {location}"),
            format!(
                "Dangerous weather conditions including high winds and heavy precipitation \
                 are expected in {location}."
            ),
            "Secure outdoor objects, avoid travel if possible, and stay indoors during the storm.",
            "Storm conditions expected for the next 6-12 hours.",
        ),
        Hazard::ExtremeTemperature => (
            format!("Extreme Weather {severity} Alert for {location}"),
            format!(
                "Hazardous weather conditions have been detected in {location}. \
                 Follow guidance from local authorities."
            ),
            "Follow local emergency guidelines.",
            "Monitor conditions closely.",
        ),
    };

    AlertContent {
        title,
        description,
        instructions: instructions.to_string(),
        duration: duration.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        let policy = AlertPolicy::default();
        let scores = RiskScores {
            flood: 0.7,
            drought: 0.71,
            storm: 0.8,
            extreme_temperature: 0.81,
        };

        let breaches = policy.breaches("Houston, US", &scores);
        let summary: Vec<_> = breaches.iter().map(|c| (c.hazard, c.severity)).collect();

        assert_eq!(
            summary,
            vec![
                (Hazard::Drought, Severity::Medium),
                (Hazard::Storm, Severity::Medium),
                (Hazard::ExtremeTemperature, Severity::High),
            ]
        );
    }

    #[test]
    fn test_evaluate_covers_every_hazard() {
        let scores = RiskScores {
            flood: 1.0,
            ..RiskScores::default()
        };
        let evaluations = AlertPolicy::default().evaluate("Houston, US", &scores);

        assert_eq!(evaluations.len(), 4);
        assert!(matches!(
            &evaluations[0],
            HazardEvaluation::BreachDetected(c) if c.hazard == Hazard::Flood && c.severity == Severity::High
        ));
        assert!(matches!(
            evaluations[1],
            HazardEvaluation::BelowThreshold { hazard: Hazard::Drought, .. }
        ));
    }

    #[test]
    fn test_templates_are_usable() {
        for hazard in Hazard::ALL {
            let candidate = AlertCandidate {
                hazard,
                severity: Severity::High,
                location: "Miami, US".to_string(),
                risk_value: 0.9,
            };
            let content = template_content(&candidate);
            assert!(content.is_usable());
            assert!(content.title.contains("High"));
            assert!(content.title.contains("Miami, US"));
        }
    }

    #[test]
    fn test_flood_template_text() {
        let candidate = AlertCandidate {
            hazard: Hazard::Flood,
            severity: Severity::Medium,
            location: "Houston, US".to_string(),
            risk_value: 0.75,
        };
        assert_eq!(
            template_content(&candidate).title,
            "Flood Medium Alert for Houston, US"
        );
    }
}
