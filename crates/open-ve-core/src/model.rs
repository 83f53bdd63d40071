//! Data model of §3: variables, validation units, the schema they make
//! up, and the slave node records the master keeps in memory.

use serde::{Deserialize, Serialize};

/// One of the six scalar types a variable may declare. `list` and
/// `map` are intentionally absent: the spec reserves them but treats
/// any attempt to use them as a schema error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Int,
    Uint,
    Double,
    Bool,
    Bytes,
    String,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Int => "int",
            VariableType::Uint => "uint",
            VariableType::Double => "double",
            VariableType::Bool => "bool",
            VariableType::Bytes => "bytes",
            VariableType::String => "string",
        }
    }
}

/// `(name, type)`. Names are unique within a validation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
}

/// Only consumed by the offline tester collaborator (`open-ve test`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub variables: serde_json::Map<String, serde_json::Value>,
    pub expected: bool,
}

/// A named group of boolean expressions evaluated together with a
/// declared variable environment. `id` is globally unique within a
/// schema. An empty `expressions` list produces a unit that trivially
/// passes (§8 boundary behavior).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub id: String,
    pub expressions: Vec<String>,
    pub variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_cases: Vec<TestCase>,
}

/// The complete registered set of validation units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Dsl {
    pub validations: Vec<Validation>,
}

impl Dsl {
    /// `id`s must form a set; returns the first duplicate found, if any.
    pub fn first_duplicate_id(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        for v in &self.validations {
            if !seen.insert(v.id.as_str()) {
                return Some(v.id.as_str());
            }
        }
        None
    }

    pub fn find(&self, id: &str) -> Option<&Validation> {
        self.validations.iter().find(|v| v.id == id)
    }
}

/// Authentication method a slave (or the master's own gateway) may be
/// configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthnMethod {
    None,
    Preshared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AuthnConfig {
    pub method: Option<AuthnMethod>,
    pub preshared_key: Option<String>,
}

/// `(id, http_address, tls_enabled, validation_ids, authn)`. Lives only
/// in the master's in-memory Slave Registry (§4.5); never persisted to
/// the Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaveNode {
    pub id: String,
    pub http_address: String,
    pub tls_enabled: bool,
    pub validation_ids: Vec<String>,
    pub authn: AuthnConfig,
}
