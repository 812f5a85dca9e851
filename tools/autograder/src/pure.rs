//! Return-value grading for exercises that take arguments and return a value.

use crate::config::GradeSettings;
use crate::errors::{ExerciseError, GraderError};
use crate::logging::append_run_log;
use crate::random::Lcg;
use crate::registry::Registry;
use crate::types::{Arguments, ExerciseKind, ExerciseResult, TestCases};
use serde_json::{json, Value};
use std::panic::{self, AssertUnwindSafe};

/// Render a value the way diagnostics show return values: strings bare, everything else as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn render_result(result: &ExerciseResult) -> String {
    match result {
        Ok(value) => render_value(value),
        Err(error) => format!("error: {error}"),
    }
}

/// Diagnostic for one mismatching call. String arguments are quoted; with
/// `arg_names` each argument is shown as `name=value`.
pub fn error_message_simple(
    expected: &str,
    real: &str,
    function: &str,
    args: &Arguments,
    arg_names: bool,
) -> String {
    let arg_text = args
        .iter()
        .map(|(name, value)| {
            let rendered = match value {
                Value::String(text) => format!("\"{text}\""),
                other => other.to_string(),
            };
            if arg_names {
                format!("{name}={rendered}")
            } else {
                rendered
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("\nCalling {function}({arg_text}) returned: \n{real} \n\nExpected: \n{expected}")
}

fn call_guarded(function: &dyn Fn(&Arguments) -> ExerciseResult, args: &Arguments) -> ExerciseResult {
    match panic::catch_unwind(AssertUnwindSafe(|| function(args))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|text| (*text).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "function panicked".to_string());
            Err(ExerciseError::Failed(message))
        }
    }
}

/// Call both functions on every case and require equal results.
pub fn compare_return_cases(
    function: &str,
    reference: &dyn Fn(&Arguments) -> ExerciseResult,
    candidate: &dyn Fn(&Arguments) -> ExerciseResult,
    cases: &TestCases,
    arg_names: bool,
) -> Result<(), GraderError> {
    for (case_index, (_, args)) in cases.iter().enumerate() {
        let expected = call_guarded(reference, args);
        let real = call_guarded(candidate, args);
        if expected == real {
            continue;
        }
        let expected = render_result(&expected);
        let real = render_result(&real);
        append_run_log(
            "info",
            "pure.case.mismatch",
            json!({
                "function": function,
                "case": case_index,
                "args": args.to_json(),
                "expected": expected,
                "actual": real,
            }),
        );
        return Err(GraderError::ReturnMismatch(error_message_simple(
            &expected, &real, function, args, arg_names,
        )));
    }
    Ok(())
}

pub fn compare_returns(
    registry: &Registry,
    activity: &str,
    function: &str,
    candidate: &dyn Fn(&Arguments) -> ExerciseResult,
    settings: &GradeSettings,
) -> Result<(), GraderError> {
    let exercise = registry.resolve_kind(activity, function, ExerciseKind::Pure)?;
    let mut rng = Lcg::new(settings.seed);
    let cases = exercise.generate_cases(&mut rng, settings.num_tests)?;
    compare_return_cases(
        function,
        exercise.reference.as_ref(),
        candidate,
        &cases,
        settings.arg_names,
    )
}

pub fn assert_returns_equivalent(
    registry: &Registry,
    activity: &str,
    function: &str,
    candidate: &dyn Fn(&Arguments) -> ExerciseResult,
    settings: &GradeSettings,
) {
    if let Err(error) = compare_returns(registry, activity, function, candidate, settings) {
        panic!("{error}");
    }
}
