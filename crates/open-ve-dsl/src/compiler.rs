//! §4.1 Expression Compiler: `compile(variables, source) -> AET |
//! SchemaError`. Pure and deterministic, no I/O — building a `cel`
//! evaluation context and parsing the expression touches nothing
//! outside the process.

use std::collections::{HashMap, HashSet};

use cel::{Context, Program};

use open_ve_core::{TaggedValue, Variable};

use crate::aet::Aet;
use crate::error::DslError;

/// Parse and type-check `source` under `variables`, emitting a
/// serialized AET. Type-checking here means: the expression parses,
/// and every free identifier/select path it references resolves to a
/// declared variable name — `cel`'s own parser does not reject unknown
/// identifiers until evaluation time, so we walk the parsed AST
/// ourselves (the same technique used to extract referenced property
/// paths in other CEL-embedding Rust services).
pub fn compile(variables: &[Variable], source: &str) -> Result<Aet, DslError> {
    let program = Program::compile(source).map_err(|e| DslError::ExpressionSyntax {
        expr: source.to_string(),
        detail: e.to_string(),
    })?;

    let declared: HashSet<&str> = variables.iter().map(|v| v.name.as_str()).collect();
    let referenced = referenced_identifiers(&program);
    for name in &referenced {
        if !declared.contains(name.as_str()) {
            return Err(DslError::ExpressionSyntax {
                expr: source.to_string(),
                detail: format!("undeclared variable `{name}`"),
            });
        }
    }

    Ok(Aet {
        source: source.to_string(),
        variable_schema: variables.to_vec(),
    })
}

/// Evaluate one compiled AET against typed bindings, returning the
/// boolean result. Re-parses the source and rebuilds a fresh `cel`
/// context on every call (see the module doc on `aet.rs` for why the
/// blob carries source text rather than a parsed tree).
pub fn evaluate(aet: &Aet, bindings: &HashMap<String, TaggedValue>) -> Result<bool, DslError> {
    let program = Program::compile(&aet.source).map_err(|e| DslError::ExpressionSyntax {
        expr: aet.source.clone(),
        detail: e.to_string(),
    })?;

    let mut ctx = Context::default();
    for var in &aet.variable_schema {
        let value = bindings
            .get(&var.name)
            .ok_or_else(|| DslError::TypeMismatch(var.name.clone()))?;
        if value.declared_type() != var.var_type {
            return Err(DslError::TypeMismatch(var.name.clone()));
        }
        bind(&mut ctx, &var.name, value)?;
    }

    let result = program
        .execute(&ctx)
        .map_err(|e| DslError::Evaluation(e.to_string()))?;

    match result {
        cel::Value::Bool(b) => Ok(b),
        _ => Err(DslError::NonBooleanResult),
    }
}

fn bind(ctx: &mut Context, name: &str, value: &TaggedValue) -> Result<(), DslError> {
    match value {
        TaggedValue::Int(v) => ctx.add_variable_from_value(name, *v),
        TaggedValue::Uint(v) => ctx.add_variable_from_value(name, *v),
        TaggedValue::Double(v) => ctx.add_variable_from_value(name, *v),
        TaggedValue::Bool(v) => ctx.add_variable_from_value(name, *v),
        TaggedValue::String(v) => ctx.add_variable_from_value(name, v.clone()),
        TaggedValue::Bytes(v) => ctx.add_variable_from_value(name, v.clone()),
    };
    Ok(())
}

/// Walk the parsed expression tree and collect every bare identifier
/// and the root of every select path (`a.b.c` contributes `a`), the
/// same structural walk `properties()` in the cited `agentgateway`
/// `cel` integration performs (`Expr` variants there are single-payload
/// structs, and `Map`/`Struct` entries are an `EntryExpr::{StructField,
/// MapEntry}` enum, not a plain key/value pair).
fn referenced_identifiers(program: &Program) -> HashSet<String> {
    use cel::common::ast::{EntryExpr, Expr};

    let mut found = HashSet::new();

    fn walk_entry(entry_expr: &EntryExpr, found: &mut HashSet<String>) {
        match entry_expr {
            EntryExpr::StructField(field) => walk(&field.value.expr, found),
            EntryExpr::MapEntry(entry) => {
                walk(&entry.key.expr, found);
                walk(&entry.value.expr, found);
            }
        }
    }

    fn walk(expr: &Expr, found: &mut HashSet<String>) {
        match expr {
            Expr::Ident(name) => {
                found.insert(name.clone());
            }
            Expr::Select(select) => walk(&select.operand.expr, found),
            Expr::Call(call) => {
                if let Some(target) = &call.target {
                    walk(&target.expr, found);
                }
                for arg in &call.args {
                    walk(&arg.expr, found);
                }
            }
            Expr::List(list) => {
                for item in &list.elements {
                    walk(&item.expr, found);
                }
            }
            Expr::Map(map) => {
                for entry in &map.entries {
                    walk_entry(&entry.expr, found);
                }
            }
            Expr::Struct(s) => {
                for entry in &s.entries {
                    walk_entry(&entry.expr, found);
                }
            }
            Expr::Comprehension(comp) => {
                walk(&comp.iter_range.expr, found);
                walk(&comp.loop_condition.expr, found);
                walk(&comp.loop_step.expr, found);
                walk(&comp.result.expr, found);
            }
            Expr::Literal(_) | Expr::Unspecified => {}
        }
    }

    walk(&program.expression().expr, &mut found);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_ve_core::VariableType;

    fn var(name: &str, ty: VariableType) -> Variable {
        Variable {
            name: name.to_string(),
            var_type: ty,
        }
    }

    #[test]
    fn compiles_a_simple_comparison() {
        let vars = vec![var("num", VariableType::Int)];
        let aet = compile(&vars, "num > 0").expect("should compile");
        assert_eq!(aet.source, "num > 0");
    }

    #[test]
    fn rejects_undeclared_variables() {
        let vars = vec![var("num", VariableType::Int)];
        let err = compile(&vars, "other > 0").unwrap_err();
        assert!(matches!(err, DslError::ExpressionSyntax { .. }));
    }

    #[test]
    fn evaluates_true_and_false() {
        let vars = vec![var("num", VariableType::Int)];
        let aet = compile(&vars, "num > 0").unwrap();

        let mut pass = HashMap::new();
        pass.insert("num".to_string(), TaggedValue::Int(100));
        assert!(evaluate(&aet, &pass).unwrap());

        let mut fail = HashMap::new();
        fail.insert("num".to_string(), TaggedValue::Int(-5));
        assert!(!evaluate(&aet, &fail).unwrap());
    }

    #[test]
    fn rejects_non_boolean_results_at_evaluation_time() {
        let vars = vec![var("num", VariableType::Int)];
        let aet = compile(&vars, "num").expect("a bare identifier parses fine");

        let mut bindings = HashMap::new();
        bindings.insert("num".to_string(), TaggedValue::Int(5));
        let err = evaluate(&aet, &bindings).unwrap_err();
        assert!(matches!(err, DslError::NonBooleanResult));
    }
}
