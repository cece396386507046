//! One completed tuner trial, as recorded in `trial_<id>/trial.json`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::topology::NetworkConfig;

/// Objective every session is ranked by.
pub const OBJECTIVE: &str = "val_accuracy";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Observation {
    pub value: Vec<f64>,
    #[serde(default)]
    pub step: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricHistory {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetricsTracker {
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricHistory>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HyperParameterValues {
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
}

/// Deserialized `trial.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trial {
    pub trial_id: String,
    #[serde(default)]
    pub hyperparameters: HyperParameterValues,
    #[serde(default)]
    pub metrics: MetricsTracker,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Trial {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("COMPLETED")
    }

    /// First recorded value of `metric`.
    pub fn first_metric(&self, metric: &str) -> Result<f64, Error> {
        self.metrics
            .metrics
            .get(metric)
            .and_then(|h| h.observations.first())
            .and_then(|o| o.value.first())
            .copied()
            .ok_or_else(|| Error::MissingMetric {
                trial: self.trial_id.clone(),
                metric: metric.to_string(),
            })
    }

    pub fn hyperparameters(&self) -> HyperParameters<'_> {
        HyperParameters { trial: self }
    }
}

/// Architecture hyperparameters searched by the tuner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchedArchitecture {
    pub filters: [u32; 3],
    pub kernel_sizes: [u32; 2],
    pub strides: [u32; 2],
}

impl SearchedArchitecture {
    /// Residual stacks implied by the filter counts alone.
    pub fn stacks(&self) -> u8 {
        1 + u8::from(self.filters[1] != 0) + u8::from(self.filters[2] != 0)
    }

    /// Overlay the searched values on `base`.
    pub fn apply(&self, base: &NetworkConfig) -> NetworkConfig {
        base.clone()
            .with_filters(self.filters.map(|f| f as usize))
            .with_body_kernel(self.kernel_sizes[0] as usize)
            .with_shortcut_kernel(self.kernel_sizes[1] as usize)
            .with_body_stride(self.strides[0] as usize)
            .with_downsample_stride(self.strides[1] as usize)
    }
}

/// Typed view over a trial's hyperparameter values.
#[derive(Debug, Clone, Copy)]
pub struct HyperParameters<'a> {
    trial: &'a Trial,
}

impl HyperParameters<'_> {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.trial.hyperparameters.values.get(name)
    }

    /// Read a non-negative integer value. JSON floats with no fractional
    /// part are accepted.
    pub fn uint(&self, name: &str) -> Result<u32, Error> {
        let value = self.get(name).ok_or_else(|| Error::MissingHyperparameter {
            trial: self.trial.trial_id.clone(),
            name: name.to_string(),
        })?;
        let parsed = match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            }),
            _ => None,
        };
        parsed
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| Error::InvalidHyperparameter {
                trial: self.trial.trial_id.clone(),
                name: name.to_string(),
                value: value.to_string(),
            })
    }

    pub fn architecture(&self) -> Result<SearchedArchitecture, Error> {
        Ok(SearchedArchitecture {
            filters: [
                self.uint("filters0")?,
                self.uint("filters1")?,
                self.uint("filters2")?,
            ],
            kernel_sizes: [self.uint("kernelsize0")?, self.uint("kernelsize1")?],
            strides: [self.uint("strides0")?, self.uint("strides1")?],
        })
    }
}
