//! Validate, repair and recover structured JSON output produced by LLMs.
//!
//! The entry point is [`ValidationPipeline::run`] (or the [`validate`]
//! shorthand): it takes the raw text a model returned and a [`Schema`], and
//! always produces a [`ValidationResult`] explaining what was wrong and what
//! was tried.
//!
//! ```rust
//! use output_guard_core::{validate, FieldConstraint, PipelineOptions, Schema};
//!
//! let schema = Schema::new(
//!     "order",
//!     vec![
//!         FieldConstraint::required("orderId"),
//!         FieldConstraint::pattern("orderId", r"^ORD-\d{6}$"),
//!     ],
//! )
//! .unwrap();
//!
//! let result = validate(r#"Sure! {"orderId": "ORDER123"}"#, &schema, &PipelineOptions::default());
//! assert!(result.valid);
//! assert_eq!(result.final_output.unwrap()["orderId"], "ORD-000123");
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod mock;
pub mod path;
pub mod pipeline;
pub mod recovery;
pub mod registry;
pub mod repair;
pub mod result;
pub mod schema;
pub mod validator;

pub use catalog::{ErrorKind, Strategy};
pub use config::{PipelineOptions, RecoveryOptions};
pub use error::{MockError, RegistryError, SchemaError};
pub use mock::{generate, FaultKind};
pub use pipeline::ValidationPipeline;
pub use recovery::{RecoveryEngine, RecoveryOutcome};
pub use registry::SchemaRegistry;
pub use repair::{repair, RepairOutcome, RepairStrategy};
pub use result::{RecoveryAttempt, Stage, ValidationError, ValidationResult, ValidationWarning};
pub use schema::{ConstraintKind, FieldConstraint, Schema};
pub use validator::ConstraintValidator;

/// Run the validation pipeline once with the given options.
pub fn validate(raw: &str, schema: &Schema, options: &PipelineOptions) -> ValidationResult {
    ValidationPipeline::new(options.clone()).run(raw, schema)
}
