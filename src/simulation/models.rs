//! Behavioural decision models used by the yearly driver

use serde::{Deserialize, Serialize};

use crate::calibration::decision::{DecisionProvider, LogitModel};
use crate::core::error::Result;

/// One provider per calibrated behaviour
pub struct DecisionModels {
    /// Probability of choosing leisure over work
    pub leisure: Box<dyn DecisionProvider>,
    pub cohabitation: Box<dyn DecisionProvider>,
    pub fertility: Box<dyn DecisionProvider>,
    pub social_care: Box<dyn DecisionProvider>,
}

/// Serialisable logit coefficients for all four behaviours
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogitModels {
    pub leisure: LogitModel,
    pub cohabitation: LogitModel,
    pub fertility: LogitModel,
    pub social_care: LogitModel,
}

impl Default for LogitModels {
    fn default() -> Self {
        Self {
            leisure: LogitModel {
                intercept: -0.4,
                age_squared: 0.08,
                education: [0.3, 0.0, -0.4],
                female: 0.2,
                ..LogitModel::default()
            },
            cohabitation: LogitModel {
                intercept: -1.2,
                age: 0.02,
                earning_potential: 0.5,
                ..LogitModel::default()
            },
            fertility: LogitModel {
                intercept: -2.4,
                age_squared: -0.05,
                partnered: 1.2,
                ..LogitModel::default()
            },
            social_care: LogitModel {
                intercept: -2.0,
                female: 0.4,
                age: 0.01,
                ..LogitModel::default()
            },
        }
    }
}

impl LogitModels {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl From<LogitModels> for DecisionModels {
    fn from(models: LogitModels) -> Self {
        Self {
            leisure: Box::new(models.leisure),
            cohabitation: Box::new(models.cohabitation),
            fertility: Box::new(models.fertility),
            social_care: Box::new(models.social_care),
        }
    }
}

impl Default for DecisionModels {
    fn default() -> Self {
        LogitModels::default().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_other_models() {
        let models = LogitModels::from_toml_str(
            r#"
            [fertility]
            intercept = -3.0
            "#,
        )
        .unwrap();
        assert_eq!(models.fertility.intercept, -3.0);
        assert_eq!(models.fertility.partnered, 0.0);
        assert_eq!(models.leisure, LogitModels::default().leisure);
    }
}
