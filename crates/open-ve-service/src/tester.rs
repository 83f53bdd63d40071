//! Offline DSL test-case runner (`open-ve test <file>`, §6.1). Grounded
//! on `examples/original_source/go/pkg/dsl/tester/tester.go`: every
//! test case ANDs the boolean result of every expression in its unit
//! and compares against `expected`; units without test cases are
//! reported separately rather than silently skipped.

use open_ve_core::{Dsl, TaggedValue, Validation};
use open_ve_dsl::DslError;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationTestResult {
    pub id: String,
    pub failed_test_cases: Vec<String>,
    pub test_case_not_found: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub results: Vec<ValidationTestResult>,
}

impl TestReport {
    pub fn all_passed(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.failed_test_cases.is_empty())
    }
}

pub fn run(dsl: &Dsl) -> Result<TestReport, DslError> {
    let mut results = Vec::with_capacity(dsl.validations.len());
    for unit in &dsl.validations {
        results.push(run_unit(unit)?);
    }
    Ok(TestReport { results })
}

fn run_unit(unit: &Validation) -> Result<ValidationTestResult, DslError> {
    if unit.test_cases.is_empty() {
        return Ok(ValidationTestResult {
            id: unit.id.clone(),
            failed_test_cases: vec![],
            test_case_not_found: true,
        });
    }

    let mut failed = Vec::new();
    for case in &unit.test_cases {
        let bindings = literal_map_to_bindings(unit, &case.variables)?;

        let mut pass_all = true;
        for expr in &unit.expressions {
            let aet = open_ve_dsl::compile(&unit.variables, expr)?;
            pass_all &= open_ve_dsl::evaluate(&aet, &bindings)?;
        }

        if pass_all != case.expected {
            failed.push(case.name.clone());
        }
    }

    Ok(ValidationTestResult {
        id: unit.id.clone(),
        failed_test_cases: failed,
        test_case_not_found: false,
    })
}

fn literal_map_to_bindings(
    unit: &Validation,
    variables: &serde_json::Map<String, serde_json::Value>,
) -> Result<std::collections::HashMap<String, TaggedValue>, DslError> {
    let mut bindings = std::collections::HashMap::with_capacity(unit.variables.len());
    for var in &unit.variables {
        let literal = variables.get(&var.name).ok_or_else(|| {
            DslError::TypeMismatch(var.name.clone())
        })?;
        let value = TaggedValue::from_json(var.var_type, literal)
            .ok_or_else(|| DslError::TypeMismatch(var.name.clone()))?;
        bindings.insert(var.name.clone(), value);
    }
    Ok(bindings)
}
