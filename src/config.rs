//! Harness configuration. Values come from defaults, an optional config file,
//! and PLANHARNESS_* environment variables, in increasing priority.

use serde::Deserialize;

use crate::error::Result;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HarnessConfig {
    /// Directory holding the generated Parquet fixtures.
    pub data_dir: String,
    /// TPC-H scale factor used when generating fixtures.
    pub scale_factor: f64,
    /// Seed for fixture generation.
    pub seed: u64,
    /// Relative tolerance when comparing float cells.
    pub float_tolerance: f64,
    /// Relative tolerance of approximate aggregates against exact results.
    pub approx_tolerance: f64,
    /// Log level for the binary.
    pub log_level: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/tpch_parquet".into(),
            scale_factor: 0.01,
            seed: 0,
            float_tolerance: 1e-9,
            approx_tolerance: 0.05,
            log_level: "info".into(),
        }
    }
}

impl HarnessConfig {
    /// Loads the configuration, optionally from the given file.
    pub fn load(file: Option<&str>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("data_dir", defaults.data_dir)?
            .set_default("scale_factor", defaults.scale_factor)?
            .set_default("seed", defaults.seed)?
            .set_default("float_tolerance", defaults.float_tolerance)?
            .set_default("approx_tolerance", defaults.approx_tolerance)?
            .set_default("log_level", defaults.log_level)?;
        if let Some(file) = file {
            builder = builder.add_source(config::File::with_name(file));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("PLANHARNESS"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Parses the configured log level.
    pub fn log_level(&self) -> Result<log::LevelFilter> {
        Ok(self.log_level.parse()?)
    }
}
