#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use output_guard_core::registry::order_request;
use output_guard_core::{Schema, ValidationPipeline};

fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| order_request().expect("built-in schema"))
}

// Arbitrary bytes, read as lossy UTF-8, fed straight into run().
// Goal: no panics, and a result that agrees with itself.
fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let result = ValidationPipeline::default().run(&text, schema());
    assert_eq!(result.valid, result.errors.is_empty());
});
