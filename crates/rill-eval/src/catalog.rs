//! Catalog — the compile-side collection of concrete resources.
//!
//! Evaluating definition bodies registers resources here. The catalog
//! serializes to canonical JSON and exposes a content digest so callers
//! can detect whether two compiles produced the same result.

use rill_types::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A concrete resource registered by a definition body.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub type_name: String,
    pub title: String,
    /// Attribute values, keyed by attribute name.
    pub attributes: BTreeMap<String, Value>,
    /// Tags inherited from the declaring scope plus the resource's own.
    pub tags: BTreeSet<String>,
    /// Whether the resource is visible outside its compile context.
    pub exported: bool,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name, self.title)
    }
}

/// All resources produced by one compile, in declaration order.
#[derive(Debug, Default)]
pub struct Catalog {
    resources: Vec<Resource>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource.
    pub fn add(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    /// All resources, in declaration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Find a resource by type and title.
    pub fn find(&self, type_name: &str, title: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.type_name == type_name && r.title == title)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Serialization
    // ══════════════════════════════════════════════════════════════════════

    /// Serialize the catalog to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.resources.iter().map(Self::resource_to_json).collect())
    }

    fn resource_to_json(resource: &Resource) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            "type".to_string(),
            serde_json::Value::String(resource.type_name.clone()),
        );
        map.insert(
            "title".to_string(),
            serde_json::Value::String(resource.title.clone()),
        );

        let mut attrs = serde_json::Map::new();
        for (name, value) in &resource.attributes {
            attrs.insert(name.clone(), Self::value_to_json(value));
        }
        map.insert("attributes".to_string(), serde_json::Value::Object(attrs));

        map.insert(
            "tags".to_string(),
            serde_json::Value::Array(
                resource
                    .tags
                    .iter()
                    .map(|t| serde_json::Value::String(t.clone()))
                    .collect(),
            ),
        );
        map.insert(
            "exported".to_string(),
            serde_json::Value::Bool(resource.exported),
        );
        serde_json::Value::Object(map)
    }

    fn value_to_json(value: &Value) -> serde_json::Value {
        match value {
            Value::Number(n) => {
                if n.fract() == 0.0
                    && n.is_finite()
                    && *n >= i64::MIN as f64
                    && *n <= i64::MAX as f64
                {
                    serde_json::Value::Number(serde_json::Number::from(*n as i64))
                } else {
                    serde_json::json!(*n)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Undef => serde_json::Value::Null,
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::value_to_json).collect())
            }
            Value::Hash(fields) => {
                let mut map = serde_json::Map::new();
                for (k, v) in fields {
                    map.insert(k.clone(), Self::value_to_json(v));
                }
                serde_json::Value::Object(map)
            }
        }
    }

    /// SHA-256 digest of the canonical JSON form, as lowercase hex.
    /// Identical compiles produce identical digests.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json().to_string().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}
