use crate::config::GradeSettings;
use crate::errors::GraderError;
use crate::logging::{append_run_log, fingerprint};
use crate::random::Lcg;
use crate::registry::Registry;
use crate::session::{simulate_interaction, SessionLimits, SessionReport};
use crate::types::{Arguments, Completion, ExerciseKind, ExerciseResult, TestCases};
use serde_json::json;
use std::fmt;

/// The first test case on which the candidate's interaction diverged.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionMismatch {
    pub function: String,
    pub case_index: usize,
    pub inputs: Vec<String>,
    pub args: Arguments,
    pub expected: SessionReport,
    pub actual: SessionReport,
}

impl InteractionMismatch {
    pub fn message(&self) -> String {
        let mut message = String::new();
        if self.actual.outcome.ran_past_inputs {
            message.push_str("Your function continued after it should have ended. \n");
        } else if self.actual.outcome.ended_early {
            message.push_str("Your function ended when it shouldn't have. \n");
        }
        if !self.actual.completion.matches_for_grading(&self.expected.completion) {
            match (&self.actual.completion, &self.expected.completion) {
                (Completion::Raised(error), _) => {
                    message.push_str(&format!("Your function raised an error: {error}\n"));
                }
                (Completion::DidNotTerminate(reason), _) => {
                    message.push_str(&format!(
                        "Your function did not terminate ({}).\n",
                        reason.as_str()
                    ));
                }
                (Completion::Completed(_), Completion::Raised(error)) => {
                    message.push_str(&format!("Expected your function to fail with: {error}\n"));
                }
                (Completion::Completed(_), _) => {
                    message.push_str("Expected your function not to terminate.\n");
                }
            }
        }
        message.push_str("Your function returned: \n");
        message.push_str(&self.actual.transcript.text());
        message.push_str("\n\nExpected: \n");
        message.push_str(&self.expected.transcript.text());
        message
    }
}

impl fmt::Display for InteractionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Run reference and candidate through separate sessions for every case and
/// require identical transcripts. Stops at the first mismatch.
pub fn compare_interactive_cases(
    function: &str,
    reference: &dyn Fn(&Arguments) -> ExerciseResult,
    candidate: &dyn Fn(&Arguments) -> ExerciseResult,
    cases: &TestCases,
    limits: SessionLimits,
) -> Result<(), GraderError> {
    for (case_index, (inputs, args)) in cases.iter().enumerate() {
        let expected = simulate_interaction(inputs, reference, args, limits)?;
        let actual = simulate_interaction(inputs, candidate, args, limits)?;

        let expected_text = expected.transcript.text();
        let actual_text = actual.transcript.text();
        if expected_text == actual_text
            && actual.completion.matches_for_grading(&expected.completion)
        {
            append_run_log(
                "debug",
                "comparison.case.matched",
                json!({
                    "function": function,
                    "case": case_index,
                    "transcript": fingerprint(&actual_text),
                }),
            );
            continue;
        }

        append_run_log(
            "info",
            "comparison.case.mismatch",
            json!({
                "function": function,
                "case": case_index,
                "inputs": inputs,
                "args": args.to_json(),
                "expected": fingerprint(&expected_text),
                "actual": fingerprint(&actual_text),
                "ended_early": actual.outcome.ended_early,
                "ran_past_inputs": actual.outcome.ran_past_inputs,
                "completion": actual.completion.kind(),
            }),
        );
        return Err(GraderError::Mismatch(Box::new(InteractionMismatch {
            function: function.to_string(),
            case_index,
            inputs: inputs.to_vec(),
            args: args.clone(),
            expected,
            actual,
        })));
    }
    Ok(())
}

/// Grade `candidate` against the registered reference for `activity`/`function`.
pub fn run_interactive_comparison(
    registry: &Registry,
    activity: &str,
    function: &str,
    candidate: &dyn Fn(&Arguments) -> ExerciseResult,
    settings: &GradeSettings,
) -> Result<(), GraderError> {
    let exercise = registry.resolve_kind(activity, function, ExerciseKind::Interactive)?;
    let mut rng = Lcg::new(settings.seed);
    let cases = exercise.generate_cases(&mut rng, settings.num_tests)?;
    compare_interactive_cases(
        function,
        exercise.reference.as_ref(),
        candidate,
        &cases,
        settings.limits,
    )
}

/// Like [`run_interactive_comparison`], but panics with the diagnostic on
/// failure. Meant to be called from `#[test]` functions.
pub fn assert_interactive_equivalent(
    registry: &Registry,
    activity: &str,
    function: &str,
    candidate: &dyn Fn(&Arguments) -> ExerciseResult,
    settings: &GradeSettings,
) {
    if let Err(error) = run_interactive_comparison(registry, activity, function, candidate, settings)
    {
        panic!("{error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{input, print};
    use crate::errors::ExerciseError;
    use serde_json::Value;

    fn ask_twice(_: &Arguments) -> ExerciseResult {
        let name = input("Name? ")?;
        let age = input("Age? ")?;
        print(format!("{name} is {age}"));
        Ok(Value::Null)
    }

    fn ask_once(_: &Arguments) -> ExerciseResult {
        let name = input("Name? ")?;
        print(format!("{name} is ?"));
        Ok(Value::Null)
    }

    fn cases(inputs: &[&[&str]]) -> TestCases {
        let inputs: Vec<Vec<String>> = inputs
            .iter()
            .map(|case| case.iter().map(|v| v.to_string()).collect())
            .collect();
        let args = vec![Arguments::new(); inputs.len()];
        TestCases::new(inputs, args).expect("aligned cases")
    }

    #[test]
    fn identical_functions_compare_silently() {
        compare_interactive_cases(
            "ask_twice",
            &ask_twice,
            &ask_twice,
            &cases(&[&["Alice", "5"], &["Bob", "7"]]),
            SessionLimits::default(),
        )
        .expect("no mismatch");
    }

    #[test]
    fn early_ending_candidate_is_reported_with_both_transcripts() {
        let err = compare_interactive_cases(
            "ask_twice",
            &ask_twice,
            &ask_once,
            &cases(&[&["Alice", "5"]]),
            SessionLimits::default(),
        )
        .expect_err("candidate ends early");
        let GraderError::Mismatch(mismatch) = err else {
            panic!("expected a transcript mismatch");
        };
        assert_eq!(mismatch.case_index, 0);
        assert!(mismatch.actual.outcome.ended_early);
        let message = mismatch.message();
        assert!(message.starts_with("Your function ended when it shouldn't have. \n"));
        assert!(message.contains("Your function returned: \nName? Alice\nAlice is ?"));
        assert!(message.ends_with("Expected: \nName? Alice\nAge? 5\nAlice is 5"));
    }

    #[test]
    fn identical_failures_after_identical_prompts_match() {
        let reference = |_: &Arguments| -> ExerciseResult {
            let name = input("Name? ")?;
            print(format!("checking {name}"));
            Err(ExerciseError::Failed("name is taken".to_string()))
        };
        let candidate = |_: &Arguments| -> ExerciseResult {
            let name = input("Name? ")?;
            print(format!("checking {name}"));
            Err(ExerciseError::Failed("name is taken".to_string()))
        };
        compare_interactive_cases(
            "register",
            &reference,
            &candidate,
            &cases(&[&["Alice"], &["Bob"]]),
            SessionLimits::default(),
        )
        .expect("same transcript and same error");

        let other_error = |_: &Arguments| -> ExerciseResult {
            let name = input("Name? ")?;
            print(format!("checking {name}"));
            Err(ExerciseError::Failed("name too short".to_string()))
        };
        let err = compare_interactive_cases(
            "register",
            &reference,
            &other_error,
            &cases(&[&["Alice"]]),
            SessionLimits::default(),
        )
        .expect_err("different error message");
        assert!(err.to_string().contains("Your function raised an error: name too short"));
    }

    #[test]
    fn raising_candidate_differs_even_with_matching_output() {
        let failing = |_: &Arguments| -> ExerciseResult {
            let name = input("Name? ")?;
            let age = input("Age? ")?;
            print(format!("{name} is {age}"));
            Err(ExerciseError::Failed("boom".to_string()))
        };
        let err = compare_interactive_cases(
            "ask_twice",
            &ask_twice,
            &failing,
            &cases(&[&["Alice", "5"]]),
            SessionLimits::default(),
        )
        .expect_err("raised error must not pass");
        assert!(err.to_string().contains("Your function raised an error: boom"));
    }
}
