//! Free-parameter descriptors for calibration runs.
//!
//! Descriptors are written as `"id,min,max,initial"` in configuration files,
//! e.g. `"P0,-100,100,0"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::ExchangeId;
use crate::domain::errors::CouplingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterDescriptor {
    pub id: ExchangeId,
    pub min: f64,
    pub max: f64,
    /// Value readable through the controller before the first run finishes.
    pub initial: f64,
}

impl ParameterDescriptor {
    pub fn new(id: impl Into<ExchangeId>, min: f64, max: f64, initial: f64) -> Result<Self, CouplingError> {
        let descriptor = Self {
            id: id.into(),
            min,
            max,
            initial,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn validate(&self) -> Result<(), CouplingError> {
        if self.id.as_str().trim().is_empty() {
            return Err(CouplingError::InvalidParameter {
                input: self.to_string(),
                reason: "id cannot be empty".to_string(),
            });
        }
        if !(self.min.is_finite() && self.max.is_finite() && self.initial.is_finite()) {
            return Err(CouplingError::InvalidParameter {
                input: self.to_string(),
                reason: "min, max and initial must be finite".to_string(),
            });
        }
        if self.min >= self.max {
            return Err(CouplingError::DegenerateBounds {
                id: self.id.clone(),
                min: self.min,
                max: self.max,
            });
        }
        if self.initial < self.min || self.initial > self.max {
            return Err(CouplingError::InvalidParameter {
                input: self.to_string(),
                reason: format!("initial {} lies outside [{}, {}]", self.initial, self.min, self.max),
            });
        }
        Ok(())
    }
}

impl FromStr for ParameterDescriptor {
    type Err = CouplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| CouplingError::InvalidParameter {
            input: s.to_string(),
            reason,
        };

        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        let [id, min, max, initial] = fields.as_slice() else {
            return Err(invalid(format!(
                "expected 4 comma-separated fields (id,min,max,initial), found {}",
                fields.len()
            )));
        };

        let number = |name: &str, text: &str| {
            text.parse::<f64>()
                .map_err(|e| invalid(format!("{name} '{text}' is not a number: {e}")))
        };

        Self::new(
            *id,
            number("min", *min)?,
            number("max", *max)?,
            number("initial", *initial)?,
        )
    }
}

impl TryFrom<String> for ParameterDescriptor {
    type Error = CouplingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ParameterDescriptor> for String {
    fn from(descriptor: ParameterDescriptor) -> Self {
        descriptor.to_string()
    }
}

impl fmt::Display for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.id, self.min, self.max, self.initial)
    }
}
