use crate::errors::GraderError;
use crate::logging::append_run_log;
use crate::random::Lcg;
use crate::types::{Arguments, ExerciseFn, ExerciseKind, ExerciseResult, TestCases};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds `num_tests` cases for one exercise from the given generator.
pub type CaseGenerator = Arc<dyn Fn(&mut Lcg, usize) -> Result<TestCases, GraderError> + Send + Sync>;

#[derive(Clone)]
pub struct Exercise {
    pub activity: String,
    pub name: String,
    pub kind: ExerciseKind,
    pub reference: ExerciseFn,
    generator: CaseGenerator,
}

impl Exercise {
    pub fn generate_cases(&self, rng: &mut Lcg, num_tests: usize) -> Result<TestCases, GraderError> {
        (self.generator)(rng, num_tests)
    }
}

impl std::fmt::Debug for Exercise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exercise")
            .field("activity", &self.activity)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Reference solutions and their case generators, keyed by activity then function name.
#[derive(Default, Clone)]
pub struct Registry {
    activities: BTreeMap<String, BTreeMap<String, Exercise>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pure<F, G>(&mut self, activity: &str, name: &str, reference: F, generator: G)
    where
        F: Fn(&Arguments) -> ExerciseResult + Send + Sync + 'static,
        G: Fn(&mut Lcg, usize) -> Result<TestCases, GraderError> + Send + Sync + 'static,
    {
        self.register(activity, name, ExerciseKind::Pure, Arc::new(reference), Arc::new(generator));
    }

    pub fn register_interactive<F, G>(
        &mut self,
        activity: &str,
        name: &str,
        reference: F,
        generator: G,
    ) where
        F: Fn(&Arguments) -> ExerciseResult + Send + Sync + 'static,
        G: Fn(&mut Lcg, usize) -> Result<TestCases, GraderError> + Send + Sync + 'static,
    {
        self.register(
            activity,
            name,
            ExerciseKind::Interactive,
            Arc::new(reference),
            Arc::new(generator),
        );
    }

    fn register(
        &mut self,
        activity: &str,
        name: &str,
        kind: ExerciseKind,
        reference: ExerciseFn,
        generator: CaseGenerator,
    ) {
        self.activities.entry(activity.to_string()).or_default().insert(
            name.to_string(),
            Exercise {
                activity: activity.to_string(),
                name: name.to_string(),
                kind,
                reference,
                generator,
            },
        );
    }

    pub fn resolve(&self, activity: &str, name: &str) -> Result<&Exercise, GraderError> {
        let exercises = self
            .activities
            .get(activity)
            .ok_or_else(|| GraderError::UnknownActivity(activity.to_string()))?;
        let exercise = exercises
            .get(name)
            .ok_or_else(|| GraderError::UnknownFunction {
                activity: activity.to_string(),
                function: name.to_string(),
            })?;
        append_run_log(
            "debug",
            "registry.resolved",
            json!({
                "activity": activity,
                "function": name,
                "kind": exercise.kind.as_str(),
            }),
        );
        Ok(exercise)
    }

    pub fn resolve_kind(
        &self,
        activity: &str,
        name: &str,
        kind: ExerciseKind,
    ) -> Result<&Exercise, GraderError> {
        let exercise = self.resolve(activity, name)?;
        if exercise.kind != kind {
            return Err(GraderError::WrongExerciseKind(format!(
                "{activity}/{name} is {}, not {}",
                exercise.kind.as_str(),
                kind.as_str()
            )));
        }
        Ok(exercise)
    }

    pub fn reference(&self, activity: &str, name: &str) -> Result<ExerciseFn, GraderError> {
        Ok(Arc::clone(&self.resolve(activity, name)?.reference))
    }

    pub fn exercises(&self) -> impl Iterator<Item = &Exercise> {
        self.activities.values().flat_map(BTreeMap::values)
    }
}

/// Every combination of the given choices, first parameter varying slowest.
pub fn make_argument_combinations(choices: &[(&str, Vec<Value>)]) -> Vec<Arguments> {
    let mut combos = vec![Arguments::new()];
    for (name, values) in choices {
        combos = combos
            .into_iter()
            .flat_map(|base| {
                values
                    .iter()
                    .map(move |value| base.clone().with(*name, value.clone()))
            })
            .collect();
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_pure(
            "act1",
            "double",
            |args: &Arguments| Ok(json!(args.int("n")? * 2)),
            |rng: &mut Lcg, num_tests: usize| {
                let args = (0..num_tests)
                    .map(|_| Arguments::new().with("n", rng.next_in(1, 9)))
                    .collect();
                Ok(TestCases::without_inputs(args))
            },
        );
        registry
    }

    #[test]
    fn resolve_distinguishes_unknown_activity_and_function() {
        let registry = sample_registry();
        assert!(registry.resolve("act1", "double").is_ok());
        assert!(matches!(
            registry.resolve("act9", "double"),
            Err(GraderError::UnknownActivity(name)) if name == "act9"
        ));
        assert!(matches!(
            registry.resolve("act1", "triple"),
            Err(GraderError::UnknownFunction { function, .. }) if function == "triple"
        ));
        assert!(matches!(
            registry.resolve_kind("act1", "double", ExerciseKind::Interactive),
            Err(GraderError::WrongExerciseKind(_))
        ));
    }

    #[test]
    fn reference_and_generator_are_callable() {
        let registry = sample_registry();
        let reference = registry.reference("act1", "double").expect("reference");
        assert_eq!(reference(&Arguments::new().with("n", 4)).expect("call"), json!(8));

        let exercise = registry.resolve("act1", "double").expect("exercise");
        let cases = exercise
            .generate_cases(&mut Lcg::new(5), 3)
            .expect("cases");
        assert_eq!(cases.len(), 3);
    }

    #[test]
    fn combinations_follow_product_order() {
        let combos = make_argument_combinations(&[
            ("x", vec![json!(1), json!(2)]),
            ("y", vec![json!("a"), json!("b"), json!("c")]),
        ]);
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0], Arguments::new().with("x", 1).with("y", "a"));
        assert_eq!(combos[2], Arguments::new().with("x", 1).with("y", "c"));
        assert_eq!(combos[3], Arguments::new().with("x", 2).with("y", "a"));

        assert!(make_argument_combinations(&[("x", Vec::new())]).is_empty());
        assert_eq!(make_argument_combinations(&[]), vec![Arguments::new()]);
    }
}
