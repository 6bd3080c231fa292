//! Schema registry: named constraint sets, including the built-in ones.

use std::collections::BTreeMap;

use serde_json::json;

use crate::error::{RegistryError, SchemaError};
use crate::schema::{FieldConstraint, Schema};

/// Name of the built-in order request schema.
pub const ORDER_REQUEST: &str = "order_request";

/// Named schemas, looked up per target type.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in schema.
    pub fn with_builtins() -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        registry.register(order_request()?);
        Ok(registry)
    }

    /// Add a schema, replacing any previous one with the same name.
    pub fn register(&mut self, schema: Schema) -> Option<Schema> {
        self.schemas.insert(schema.name().to_string(), schema)
    }

    /// Parse a schema definition from JSON text and register it.
    pub fn register_json(&mut self, text: &str) -> Result<&Schema, RegistryError> {
        let schema = Schema::from_json(text)?;
        let name = schema.name().to_string();
        self.register(schema);
        self.get(&name)
    }

    pub fn get(&self, name: &str) -> Result<&Schema, RegistryError> {
        self.schemas.get(name).ok_or_else(|| RegistryError::UnknownSchema {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

const EMAIL: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

const ORDER_STATUSES: [&str; 5] = ["PENDING", "CONFIRMED", "SHIPPED", "DELIVERED", "CANCELLED"];

/// Order placed through a chat assistant.
///
/// `status` and `currency` carry defaults; `notes` is non-critical so an
/// over-long note does not reject the order.
pub fn order_request() -> Result<Schema, SchemaError> {
    let items = vec![
        FieldConstraint::required("productId"),
        FieldConstraint::pattern("productId", r"^PRD-\d{6}$")
            .with_message("{field} must look like PRD-000000")
            .with_example(json!("PRD-004711")),
        FieldConstraint::required("quantity"),
        FieldConstraint::range("quantity", Some(1.0), Some(1000.0)).with_example(json!(2)),
        FieldConstraint::required("unitPrice"),
        FieldConstraint::range("unitPrice", Some(0.01), None).with_example(json!(24.99)),
    ];

    Schema::new(
        ORDER_REQUEST,
        vec![
            FieldConstraint::required("orderId"),
            FieldConstraint::pattern("orderId", r"^ORD-\d{6}$")
                .with_message("{field} must look like ORD-000000")
                .with_example(json!("ORD-000042")),
            FieldConstraint::required("customerEmail"),
            FieldConstraint::pattern("customerEmail", EMAIL)
                .with_message("{field} must be a valid email address")
                .with_example(json!("jane.doe@example.com")),
            FieldConstraint::required("customerName"),
            FieldConstraint::size("customerName", Some(2), Some(100))
                .with_example(json!("Jane Doe")),
            FieldConstraint::required("orderDate"),
            FieldConstraint::past_or_present("orderDate").with_example(json!("2024-01-15")),
            FieldConstraint::required("status").with_default(json!("PENDING")),
            FieldConstraint::one_of("status", ORDER_STATUSES),
            FieldConstraint::required("currency").with_default(json!("USD")),
            FieldConstraint::pattern("currency", r"^[A-Z]{3}$").with_example(json!("USD")),
            FieldConstraint::required("items"),
            FieldConstraint::size("items", Some(1), Some(50)),
            FieldConstraint::nested("items", items, true),
            FieldConstraint::required("totalAmount"),
            FieldConstraint::range("totalAmount", Some(0.01), Some(1_000_000.0))
                .with_example(json!(49.98)),
            FieldConstraint::typical("totalAmount", Some(1.0), Some(10_000.0)),
            FieldConstraint::size("notes", None, Some(500))
                .non_critical()
                .with_example(json!("Leave at the front desk")),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::mock::generate_value;
    use crate::validator::ConstraintValidator;

    #[test]
    fn test_builtins_are_registered() {
        let registry = SchemaRegistry::with_builtins().unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec![ORDER_REQUEST]);
        assert!(registry.get(ORDER_REQUEST).is_ok());
        assert!(matches!(
            registry.get("invoice"),
            Err(RegistryError::UnknownSchema { ref name }) if name == "invoice"
        ));
    }

    #[test]
    fn test_order_request_example_is_valid() {
        let schema = order_request().unwrap();
        let doc = generate_value(&schema, None).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let validator = ConstraintValidator::new(&schema, today);
        assert!(validator.validate(&doc).is_empty(), "{:?}", validator.validate(&doc));
        assert!(validator.advise(&doc, true).is_empty());
        assert_eq!(doc["status"], json!("PENDING"));
        assert_eq!(doc["items"][0]["productId"], json!("PRD-004711"));
    }

    #[test]
    fn test_register_json() {
        let mut registry = SchemaRegistry::new();
        let text = json!({
            "name": "ticket",
            "constraints": [{"path": "title", "kind": {"type": "required"}}]
        })
        .to_string();
        let schema = registry.register_json(&text).unwrap();
        assert_eq!(schema.name(), "ticket");
        assert!(registry.register_json("{\"name\": 1}").is_err());
    }
}
