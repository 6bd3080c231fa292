//! Configuration for validation runs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Options for the validation pipeline.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `warn-on-extra-fields`),
/// matching the option names used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PipelineOptions {
    /// Report undeclared fields as warnings. Extra fields are never errors.
    pub warn_on_extra_fields: bool,
    /// Date used as "today" by past-or-present checks and date clamping.
    /// `None` means the current UTC date at the start of each run.
    pub today: Option<NaiveDate>,
    pub recovery: RecoveryOptions,
}

/// Options for the recovery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RecoveryOptions {
    /// Run the recovery stage at all. When off, any violation fails the run.
    pub enabled: bool,
    /// Let the partial-accept strategy demote non-critical violations.
    pub partial_accept: bool,
    /// Clamp future dates to today when correcting past-or-present fields.
    pub clamp_future_dates: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            warn_on_extra_fields: true,
            today: None,
            recovery: RecoveryOptions::default(),
        }
    }
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            partial_accept: true,
            clamp_future_dates: true,
        }
    }
}
