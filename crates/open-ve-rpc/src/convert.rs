//! `TaggedValue` ↔ `google.protobuf.Any` packing: the RPC surface
//! carries each bound variable as an `Any` wrapping one of the six
//! `google.protobuf.*Value` well-known types, available through
//! `prost-types`' wrapper message definitions. This is the RPC
//! surface's analogue of `open_ve_core::value::TaggedValue`'s own
//! `{"@type", "value"}` serde impl for the HTTP surface.

use prost::Message;
use prost_types::Any;

use open_ve_core::{AppError, Dsl, TaggedValue, TestCase, Validation, Variable, VariableType};

use crate::open_ve::v1;

fn type_url_for(ty: VariableType) -> &'static str {
    match ty {
        VariableType::Int => "type.googleapis.com/google.protobuf.Int64Value",
        VariableType::Uint => "type.googleapis.com/google.protobuf.UInt64Value",
        VariableType::Double => "type.googleapis.com/google.protobuf.DoubleValue",
        VariableType::Bool => "type.googleapis.com/google.protobuf.BoolValue",
        VariableType::String => "type.googleapis.com/google.protobuf.StringValue",
        VariableType::Bytes => "type.googleapis.com/google.protobuf.BytesValue",
    }
}

pub fn tagged_value_to_any(value: &TaggedValue) -> Any {
    let type_url = type_url_for(value.declared_type()).to_string();
    let bytes = match value {
        TaggedValue::Int(v) => prost_types::Int64Value { value: *v }.encode_to_vec(),
        TaggedValue::Uint(v) => prost_types::UInt64Value { value: *v }.encode_to_vec(),
        TaggedValue::Double(v) => prost_types::DoubleValue { value: *v }.encode_to_vec(),
        TaggedValue::Bool(v) => prost_types::BoolValue { value: *v }.encode_to_vec(),
        TaggedValue::String(v) => prost_types::StringValue { value: v.clone() }.encode_to_vec(),
        TaggedValue::Bytes(v) => prost_types::BytesValue { value: v.clone() }.encode_to_vec(),
    };
    Any {
        type_url,
        value: bytes,
    }
}

/// Decodes `any` as whichever wrapper type `type_url` names, regardless
/// of the schema's declared type; the caller (the Evaluator's binding
/// step) is responsible for deciding whether the decoded kind matches
/// what the unit declares.
pub fn any_to_tagged_value(any: &Any) -> Result<TaggedValue, AppError> {
    let decode_err = |e: prost::DecodeError| {
        AppError::RequestParameterInvalid(format!("malformed Any payload: {e}"))
    };

    match any.type_url.as_str() {
        "type.googleapis.com/google.protobuf.Int64Value" => {
            Ok(TaggedValue::Int(
                prost_types::Int64Value::decode(any.value.as_slice())
                    .map_err(decode_err)?
                    .value,
            ))
        }
        "type.googleapis.com/google.protobuf.UInt64Value" => Ok(TaggedValue::Uint(
            prost_types::UInt64Value::decode(any.value.as_slice())
                .map_err(decode_err)?
                .value,
        )),
        "type.googleapis.com/google.protobuf.DoubleValue" => Ok(TaggedValue::Double(
            prost_types::DoubleValue::decode(any.value.as_slice())
                .map_err(decode_err)?
                .value,
        )),
        "type.googleapis.com/google.protobuf.BoolValue" => Ok(TaggedValue::Bool(
            prost_types::BoolValue::decode(any.value.as_slice())
                .map_err(decode_err)?
                .value,
        )),
        "type.googleapis.com/google.protobuf.StringValue" => Ok(TaggedValue::String(
            prost_types::StringValue::decode(any.value.as_slice())
                .map_err(decode_err)?
                .value,
        )),
        "type.googleapis.com/google.protobuf.BytesValue" => Ok(TaggedValue::Bytes(
            prost_types::BytesValue::decode(any.value.as_slice())
                .map_err(decode_err)?
                .value,
        )),
        other => Err(AppError::RequestParameterInvalid(format!(
            "unknown Any type_url: {other}"
        ))),
    }
}

/// `open_ve_core::Dsl` → the wire `Dsl` message (§6, RPC surface).
pub fn dsl_to_proto(dsl: &Dsl) -> v1::Dsl {
    v1::Dsl {
        validations: dsl.validations.iter().map(validation_to_proto).collect(),
    }
}

fn validation_to_proto(unit: &Validation) -> v1::Validation {
    v1::Validation {
        id: unit.id.clone(),
        expressions: unit.expressions.clone(),
        variables: unit.variables.iter().map(variable_to_proto).collect(),
        test_cases: unit.test_cases.iter().map(test_case_to_proto).collect(),
    }
}

fn variable_to_proto(v: &Variable) -> v1::Variable {
    v1::Variable {
        name: v.name.clone(),
        r#type: v.var_type.as_str().to_string(),
    }
}

fn test_case_to_proto(case: &TestCase) -> v1::TestCase {
    v1::TestCase {
        name: case.name.clone(),
        variables: case
            .variables
            .iter()
            .map(|(name, value)| v1::TestVariable {
                name: name.clone(),
                value_json: value.to_string(),
            })
            .collect(),
        expected: case.expected,
    }
}

/// The wire `Dsl` message → `open_ve_core::Dsl`, rejecting any variable
/// type string the six-scalar taxonomy (§3) doesn't recognize.
pub fn proto_to_dsl(proto: v1::Dsl) -> Result<Dsl, AppError> {
    let validations = proto
        .validations
        .into_iter()
        .map(proto_to_validation)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Dsl { validations })
}

fn proto_to_validation(unit: v1::Validation) -> Result<Validation, AppError> {
    let variables = unit
        .variables
        .into_iter()
        .map(proto_to_variable)
        .collect::<Result<Vec<_>, _>>()?;
    let test_cases = unit
        .test_cases
        .into_iter()
        .map(proto_to_test_case)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Validation {
        id: unit.id,
        expressions: unit.expressions,
        variables,
        test_cases,
    })
}

fn proto_to_variable(v: v1::Variable) -> Result<Variable, AppError> {
    let var_type = variable_type_from_str(&v.r#type)?;
    Ok(Variable {
        name: v.name,
        var_type,
    })
}

fn variable_type_from_str(s: &str) -> Result<VariableType, AppError> {
    match s {
        "int" => Ok(VariableType::Int),
        "uint" => Ok(VariableType::Uint),
        "double" => Ok(VariableType::Double),
        "bool" => Ok(VariableType::Bool),
        "bytes" => Ok(VariableType::Bytes),
        "string" => Ok(VariableType::String),
        other => Err(AppError::SchemaError(format!(
            "unsupported variable type: {other}"
        ))),
    }
}

fn proto_to_test_case(case: v1::TestCase) -> Result<TestCase, AppError> {
    let mut variables = serde_json::Map::new();
    for tv in case.variables {
        let value: serde_json::Value = serde_json::from_str(&tv.value_json).map_err(|e| {
            AppError::RequestParameterInvalid(format!(
                "malformed test case variable `{}`: {e}",
                tv.name
            ))
        })?;
        variables.insert(tv.name, value);
    }
    Ok(TestCase {
        name: case.name,
        variables,
        expected: case.expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_each_scalar_through_any() {
        let values = vec![
            TaggedValue::Int(-7),
            TaggedValue::Uint(7),
            TaggedValue::Double(1.25),
            TaggedValue::Bool(true),
            TaggedValue::String("hi".to_string()),
            TaggedValue::Bytes(vec![1, 2, 3]),
        ];
        for v in values {
            let any = tagged_value_to_any(&v);
            let back = any_to_tagged_value(&any).unwrap();
            assert_eq!(back, v);
        }
    }

    #[test]
    fn rejects_unknown_type_url() {
        let any = Any {
            type_url: "type.googleapis.com/google.protobuf.Struct".to_string(),
            value: vec![],
        };
        assert!(any_to_tagged_value(&any).is_err());
    }

    #[test]
    fn dsl_round_trips_through_proto() {
        let mut vars = serde_json::Map::new();
        vars.insert("num".to_string(), serde_json::json!(5));
        let dsl = Dsl {
            validations: vec![Validation {
                id: "x-price".to_string(),
                expressions: vec!["num > 0".to_string()],
                variables: vec![Variable {
                    name: "num".to_string(),
                    var_type: VariableType::Int,
                }],
                test_cases: vec![TestCase {
                    name: "positive".to_string(),
                    variables: vars,
                    expected: true,
                }],
            }],
        };

        let proto = dsl_to_proto(&dsl);
        let back = proto_to_dsl(proto).unwrap();
        assert_eq!(back, dsl);
    }

    #[test]
    fn rejects_unsupported_variable_type() {
        let proto = v1::Dsl {
            validations: vec![v1::Validation {
                id: "x".to_string(),
                expressions: vec![],
                variables: vec![v1::Variable {
                    name: "n".to_string(),
                    r#type: "list".to_string(),
                }],
                test_cases: vec![],
            }],
        };
        assert!(proto_to_dsl(proto).is_err());
    }
}
