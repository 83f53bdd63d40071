//! The runtime-typed request value (§9 "Dynamic variable map"): a
//! tagged sum over the six wire scalars. The HTTP type-convert
//! middleware produces these from raw JSON literals plus the schema;
//! the Evaluator consumes only these, never an untyped JSON value.

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::VariableType;

/// One of the six `google.protobuf.*Value` wrapper types (§6).
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedValue {
    Int(i64),
    Uint(u64),
    Double(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl TaggedValue {
    pub fn type_tag(&self) -> &'static str {
        Self::wire_tag_for(self.declared_type())
    }

    /// The `google.protobuf.*Value` wire tag for a declared
    /// `VariableType` (§6), independent of any concrete value — used
    /// by the HTTP type-convert middleware, which only has the
    /// schema's declared type and a raw JSON literal to work from.
    pub fn wire_tag_for(ty: VariableType) -> &'static str {
        match ty {
            VariableType::Int => "google.protobuf.Int64Value",
            VariableType::Uint => "google.protobuf.UInt64Value",
            VariableType::Double => "google.protobuf.DoubleValue",
            VariableType::Bool => "google.protobuf.BoolValue",
            VariableType::String => "google.protobuf.StringValue",
            VariableType::Bytes => "google.protobuf.BytesValue",
        }
    }

    pub fn declared_type(&self) -> VariableType {
        match self {
            TaggedValue::Int(_) => VariableType::Int,
            TaggedValue::Uint(_) => VariableType::Uint,
            TaggedValue::Double(_) => VariableType::Double,
            TaggedValue::Bool(_) => VariableType::Bool,
            TaggedValue::String(_) => VariableType::String,
            TaggedValue::Bytes(_) => VariableType::Bytes,
        }
    }

    /// Coerce a raw JSON literal into the scalar declared for `ty`.
    /// Used by the type-convert middleware (§4.8.2) — returns `None`
    /// on a type mismatch, which the caller surfaces as a 400.
    pub fn from_json(ty: VariableType, value: &serde_json::Value) -> Option<TaggedValue> {
        match ty {
            VariableType::Int => value.as_i64().map(TaggedValue::Int),
            VariableType::Uint => value.as_u64().map(TaggedValue::Uint),
            VariableType::Double => value.as_f64().map(TaggedValue::Double),
            VariableType::Bool => value.as_bool().map(TaggedValue::Bool),
            VariableType::String => value.as_str().map(|s| TaggedValue::String(s.to_string())),
            VariableType::Bytes => value.as_str().map(|s| TaggedValue::Bytes(s.as_bytes().to_vec())),
        }
    }
}

/// Wire shape: `{"@type": "<tag>", "value": <literal>}`.
impl Serialize for TaggedValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("TaggedValue", 2)?;
        s.serialize_field("@type", self.type_tag())?;
        match self {
            TaggedValue::Int(v) => s.serialize_field("value", v)?,
            TaggedValue::Uint(v) => s.serialize_field("value", v)?,
            TaggedValue::Double(v) => s.serialize_field("value", v)?,
            TaggedValue::Bool(v) => s.serialize_field("value", v)?,
            TaggedValue::String(v) => s.serialize_field("value", v)?,
            TaggedValue::Bytes(v) => {
                s.serialize_field("value", &base64::engine::general_purpose::STANDARD.encode(v))?;
            }
        }
        s.end()
    }
}

impl<'de> Deserialize<'de> for TaggedValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(rename = "@type")]
            ty: String,
            value: serde_json::Value,
        }
        let wire = Wire::deserialize(deserializer)?;
        let value = match wire.ty.as_str() {
            "google.protobuf.Int64Value" => TaggedValue::Int(
                wire.value
                    .as_i64()
                    .ok_or_else(|| serde::de::Error::custom("expected integer value"))?,
            ),
            "google.protobuf.UInt64Value" => TaggedValue::Uint(
                wire.value
                    .as_u64()
                    .ok_or_else(|| serde::de::Error::custom("expected unsigned integer value"))?,
            ),
            "google.protobuf.DoubleValue" => TaggedValue::Double(
                wire.value
                    .as_f64()
                    .ok_or_else(|| serde::de::Error::custom("expected double value"))?,
            ),
            "google.protobuf.BoolValue" => TaggedValue::Bool(
                wire.value
                    .as_bool()
                    .ok_or_else(|| serde::de::Error::custom("expected bool value"))?,
            ),
            "google.protobuf.StringValue" => TaggedValue::String(
                wire.value
                    .as_str()
                    .ok_or_else(|| serde::de::Error::custom("expected string value"))?
                    .to_string(),
            ),
            "google.protobuf.BytesValue" => {
                let s = wire
                    .value
                    .as_str()
                    .ok_or_else(|| serde::de::Error::custom("expected base64 bytes value"))?;
                TaggedValue::Bytes(
                    base64::engine::general_purpose::STANDARD
                        .decode(s)
                        .map_err(|e| serde::de::Error::custom(e.to_string()))?,
                )
            }
            other => return Err(serde::de::Error::custom(format!("unknown @type tag: {other}"))),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_each_scalar_through_wire_json() {
        let values = vec![
            TaggedValue::Int(-42),
            TaggedValue::Uint(7),
            TaggedValue::Double(1.5),
            TaggedValue::Bool(true),
            TaggedValue::String("hi".into()),
            TaggedValue::Bytes(vec![1, 2, 3, 255]),
        ];
        for v in values {
            let json = serde_json::to_value(&v).unwrap();
            let back: TaggedValue = serde_json::from_value(json).unwrap();
            assert_eq!(back, v);
        }
    }

    #[test]
    fn coerces_json_literal_by_declared_type() {
        let lit = serde_json::json!(100);
        assert_eq!(
            TaggedValue::from_json(VariableType::Int, &lit),
            Some(TaggedValue::Int(100))
        );
        let bad = serde_json::json!("not a number");
        assert_eq!(TaggedValue::from_json(VariableType::Int, &bad), None);
    }
}
