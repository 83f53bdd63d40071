//! `open-ve gen openapi <schema-file> <output-dir>`: derive a skeleton
//! DSL from an OpenAPI 2.0 (Swagger) document by walking every `POST`
//! operation's body parameter, resolving `$ref`s, and flattening
//! nested object properties into dotted variable names. Walks
//! `serde_json::Value` directly rather than through a dedicated
//! OpenAPI-model crate, since the document is walked structurally and
//! never strictly validated against the OpenAPI schema itself.

use std::collections::BTreeMap;

use open_ve_core::{Dsl, Validation, Variable, VariableType};

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("failed to parse OpenAPI document: {0}")]
    Parse(String),
    #[error("unresolvable $ref: {0}")]
    UnresolvedRef(String),
}

/// Walk every `POST` path's parameters that carry a body `schema`,
/// flatten its properties into dotted variable names, and emit one
/// `Validation` per resolved schema with empty `expressions`.
pub fn generate_from_openapi2(document: &serde_json::Value) -> Result<Dsl, GeneratorError> {
    let paths = document
        .get("paths")
        .and_then(|p| p.as_object())
        .ok_or_else(|| GeneratorError::Parse("document has no `paths` object".to_string()))?;

    let mut validations = Vec::new();

    for (path, path_item) in paths {
        let Some(post) = path_item.get("post") else {
            continue;
        };
        tracing::info!(path = %path, "parsing OpenAPI path");

        let Some(parameters) = post.get("parameters").and_then(|p| p.as_array()) else {
            continue;
        };

        for param in parameters {
            let Some(schema) = param.get("schema") else {
                continue;
            };
            let (resolved, ref_name) = resolve_schema_reference(document, schema)?;
            let mut variables = Vec::new();
            parse_param_schema(document, &resolved, &ref_name, "", &mut variables);
            if !variables.is_empty() {
                validations.push(Validation {
                    id: ref_name,
                    expressions: vec![],
                    variables,
                    test_cases: vec![],
                });
            }
        }
    }

    Ok(Dsl { validations })
}

/// `$ref: "#/definitions/Foo"` → `(resolved schema, "Foo")`.
fn resolve_schema_reference(
    document: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(serde_json::Value, String), GeneratorError> {
    match schema.get("$ref").and_then(|r| r.as_str()) {
        Some(reference) => {
            let object_name = reference
                .rsplit('/')
                .next()
                .unwrap_or(reference)
                .to_string();
            let resolved = resolve_json_pointer(document, reference)
                .ok_or_else(|| GeneratorError::UnresolvedRef(reference.to_string()))?;
            Ok((resolved.clone(), object_name))
        }
        None => Ok((schema.clone(), String::new())),
    }
}

fn resolve_json_pointer<'a>(
    document: &'a serde_json::Value,
    reference: &str,
) -> Option<&'a serde_json::Value> {
    let pointer = reference.strip_prefix('#')?;
    document.pointer(pointer)
}

fn parse_param_schema(
    document: &serde_json::Value,
    schema: &serde_json::Value,
    parent_object_name: &str,
    prop_name: &str,
    variables: &mut Vec<Variable>,
) {
    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        // stable iteration order makes generated skeletons reproducible
        let ordered: BTreeMap<&String, &serde_json::Value> = properties.iter().collect();
        for (name, prop) in ordered {
            if prop.get("$ref").is_some() {
                if let Ok((resolved, object_name)) = resolve_schema_reference(document, prop) {
                    parse_param_schema(document, &resolved, &object_name, "", variables);
                }
            } else if prop.get("properties").is_some() {
                parse_param_schema(document, prop, name, "", variables);
            } else {
                parse_param_schema(document, prop, parent_object_name, name, variables);
            }
        }
    } else if schema.get("items").is_some() {
        tracing::warn!(
            parent = %parent_object_name,
            prop = %prop_name,
            "OpenAPI array schema is not supported, skipping"
        );
    } else if let Some(ty) = schema.get("type").and_then(|t| t.as_str()) {
        let format = schema.get("format").and_then(|f| f.as_str());
        match openapi_type_to_variable_type(ty, format) {
            Some(var_type) => {
                let name = if parent_object_name.is_empty() {
                    prop_name.to_string()
                } else {
                    format!("{parent_object_name}.{prop_name}")
                };
                variables.push(Variable { name, var_type });
            }
            None => {
                tracing::warn!(openapi_type = %ty, "unsupported OpenAPI type, skipping");
            }
        }
    }
}

/// `integer→int, number→double, string→string (or bytes for
/// byte/binary format), boolean→bool`; `array`/`object` are
/// unsupported (§6.1).
fn openapi_type_to_variable_type(openapi_type: &str, format: Option<&str>) -> Option<VariableType> {
    match openapi_type {
        "integer" => Some(VariableType::Int),
        "number" => Some(VariableType::Double),
        "string" => Some(match format {
            Some("byte") | Some("binary") => VariableType::Bytes,
            _ => VariableType::String,
        }),
        "boolean" => Some(VariableType::Bool),
        "array" | "object" => None,
        _ => Some(VariableType::String),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_a_referenced_body_schema() {
        let doc = serde_json::json!({
            "paths": {
                "/orders": {
                    "post": {
                        "parameters": [
                            {
                                "in": "body",
                                "name": "body",
                                "schema": { "$ref": "#/definitions/Order" }
                            }
                        ]
                    }
                }
            },
            "definitions": {
                "Order": {
                    "properties": {
                        "amount": { "type": "integer" },
                        "note": { "type": "string" }
                    }
                }
            }
        });

        let dsl = generate_from_openapi2(&doc).unwrap();
        assert_eq!(dsl.validations.len(), 1);
        let unit = &dsl.validations[0];
        assert_eq!(unit.id, "Order");
        assert!(unit.expressions.is_empty());
        let names: Vec<&str> = unit.variables.iter().map(|v| v.name.as_str()).collect();
        assert!(names.contains(&"Order.amount"));
        assert!(names.contains(&"Order.note"));
    }

    #[test]
    fn skips_unsupported_array_and_object_types() {
        let doc = serde_json::json!({
            "paths": {
                "/x": {
                    "post": {
                        "parameters": [{
                            "schema": {
                                "properties": {
                                    "tags": { "type": "array", "items": { "type": "string" } },
                                    "id": { "type": "integer" }
                                }
                            }
                        }]
                    }
                }
            }
        });
        let dsl = generate_from_openapi2(&doc).unwrap();
        let names: Vec<&str> = dsl.validations[0]
            .variables
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert!(!names.iter().any(|n| n.contains("tags")));
        assert!(names.iter().any(|n| n.contains("id")));
    }
}
