use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_OVERLINK: usize = 1;
const DEFAULT_OVERSIZE: f64 = 1.0;
const DEFAULT_LAMBDA: f64 = 0.9;

/// Tunables for building a cell list.
///
/// Only non-default values are written when serialised, so a descriptor that
/// never touched these fields round-trips as an empty object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CellListConfig {
    /// Cells scanned in each direction beyond a particle's own cell (>= 1).
    #[serde(
        rename = "OverLink",
        default = "default_overlink",
        skip_serializing_if = "is_default_overlink"
    )]
    pub overlink: usize,

    /// Factor by which cells are made wider than strictly needed (>= 1.0).
    #[serde(default = "default_oversize", skip_serializing_if = "is_default_oversize")]
    pub oversize: f64,

    /// Fraction of the spare lattice width spent on overlap between
    /// neighbouring interaction boxes, in `[0, 1)`.
    #[serde(default = "default_lambda", skip_serializing_if = "is_default_lambda")]
    pub lambda: f64,
}

fn default_overlink() -> usize {
    DEFAULT_OVERLINK
}

fn default_oversize() -> f64 {
    DEFAULT_OVERSIZE
}

fn default_lambda() -> f64 {
    DEFAULT_LAMBDA
}

fn is_default_overlink(v: &usize) -> bool {
    *v == DEFAULT_OVERLINK
}

fn is_default_oversize(v: &f64) -> bool {
    *v == DEFAULT_OVERSIZE
}

fn is_default_lambda(v: &f64) -> bool {
    *v == DEFAULT_LAMBDA
}

impl Default for CellListConfig {
    fn default() -> Self {
        Self {
            overlink: DEFAULT_OVERLINK,
            oversize: DEFAULT_OVERSIZE,
            lambda: DEFAULT_LAMBDA,
        }
    }
}

impl CellListConfig {
    /// Config with the given look-ahead radius and defaults elsewhere.
    pub fn with_overlink(overlink: usize) -> Self {
        Self {
            overlink,
            ..Self::default()
        }
    }

    /// Reject values that cannot produce a correct grid.
    pub fn validate(&self) -> Result<()> {
        if self.overlink == 0 {
            return Err(Error::Config("overlink must be at least 1".into()));
        }
        if !self.oversize.is_finite() || self.oversize < 1.0 {
            return Err(Error::Config(format!(
                "oversize must be at least 1.0, otherwise cells are too small (got {})",
                self.oversize
            )));
        }
        if !self.lambda.is_finite() || !(0.0..1.0).contains(&self.lambda) {
            return Err(Error::Config(format!(
                "lambda must lie in [0, 1) (got {})",
                self.lambda
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(CellListConfig::default().validate().is_ok());
    }

    #[test]
    fn small_oversize_rejected() {
        let cfg = CellListConfig {
            oversize: 0.5,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("oversize"));
    }

    #[test]
    fn oversize_bound_is_inclusive() {
        let at_bound = CellListConfig {
            oversize: 1.0,
            ..Default::default()
        };
        assert!(at_bound.validate().is_ok());
        let below = CellListConfig {
            oversize: 0.99,
            ..Default::default()
        };
        assert!(matches!(below.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_overlink_and_bad_lambda_rejected() {
        assert!(CellListConfig::with_overlink(0).validate().is_err());
        let cfg = CellListConfig {
            lambda: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = CellListConfig {
            oversize: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
