use crate::errors::{ExerciseError, GraderError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type ExerciseResult = Result<Value, ExerciseError>;

/// A reference or candidate exercise function. Interactive exercises do their
/// line I/O through `crate::console`.
pub type ExerciseFn = Arc<dyn Fn(&Arguments) -> ExerciseResult + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Pure,
    Interactive,
}

impl ExerciseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pure => "pure",
            Self::Interactive => "interactive",
        }
    }
}

/// Keyword arguments for one call, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace `name`, keeping the position of an existing entry.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn value(&self, name: &str) -> Result<&Value, ExerciseError> {
        self.get(name)
            .ok_or_else(|| ExerciseError::MissingArgument(name.to_string()))
    }

    pub fn str(&self, name: &str) -> Result<&str, ExerciseError> {
        self.value(name)?
            .as_str()
            .ok_or_else(|| invalid(name, "string"))
    }

    pub fn int(&self, name: &str) -> Result<i64, ExerciseError> {
        self.value(name)?
            .as_i64()
            .ok_or_else(|| invalid(name, "integer"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, ExerciseError> {
        self.value(name)?
            .as_bool()
            .ok_or_else(|| invalid(name, "boolean"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a `name=value` pair. The value is read as JSON when it parses,
    /// otherwise it is kept as a plain string.
    pub fn parse_pair(raw: &str) -> Result<(String, Value), GraderError> {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| GraderError::Cli(format!("argument `{raw}` must be name=value")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(GraderError::Cli(format!("argument `{raw}` has an empty name")));
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        Ok((name.to_string(), value))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }
}

fn invalid(name: &str, expected: &str) -> ExerciseError {
    ExerciseError::InvalidArgument {
        name: name.to_string(),
        expected: expected.to_string(),
    }
}

/// Index-aligned scripted inputs and argument mappings for one exercise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCases {
    inputs: Vec<Vec<String>>,
    args: Vec<Arguments>,
}

impl TestCases {
    pub fn new(inputs: Vec<Vec<String>>, args: Vec<Arguments>) -> Result<Self, GraderError> {
        if inputs.len() != args.len() {
            return Err(GraderError::InvalidTestCases(format!(
                "{} input lists but {} argument mappings",
                inputs.len(),
                args.len()
            )));
        }
        Ok(Self { inputs, args })
    }

    /// Cases for a function that never reads input.
    pub fn without_inputs(args: Vec<Arguments>) -> Self {
        Self {
            inputs: vec![Vec::new(); args.len()],
            args,
        }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[String], &Arguments)> {
        self.inputs
            .iter()
            .map(Vec::as_slice)
            .zip(self.args.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Input was requested too many times after the scripted inputs ran out.
    OverrunLimit,
    /// The function wrote more lines than the session allows.
    OutputLimit,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OverrunLimit => "overrun_limit",
            Self::OutputLimit => "output_limit",
        }
    }
}

/// How the invocation inside a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Completed(Value),
    Raised(String),
    DidNotTerminate(AbortReason),
}

impl Completion {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Raised(_) => "raised",
            Self::DidNotTerminate(_) => "did_not_terminate",
        }
    }

    /// Interactive grading ignores return values but not how the call ended.
    pub fn matches_for_grading(&self, other: &Completion) -> bool {
        match (self, other) {
            (Self::Completed(_), Self::Completed(_)) => true,
            (Self::Raised(a), Self::Raised(b)) => a == b,
            (Self::DidNotTerminate(a), Self::DidNotTerminate(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(value) => write!(f, "completed with {value}"),
            Self::Raised(message) => write!(f, "raised: {message}"),
            Self::DidNotTerminate(reason) => {
                write!(f, "did not terminate ({})", reason.as_str())
            }
        }
    }
}
