use crate::comparator::InteractionMismatch;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraderError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("unknown activity: {0}")]
    UnknownActivity(String),
    #[error("unknown function {function} in activity {activity}")]
    UnknownFunction { activity: String, function: String },
    #[error("{0}")]
    WrongExerciseKind(String),
    #[error("invalid test cases: {0}")]
    InvalidTestCases(String),
    #[error("an interception session is already active on this thread")]
    SessionActive,
    #[error("illegal transition: {0}")]
    IllegalTransition(String),
    #[error("{0}")]
    Mismatch(Box<InteractionMismatch>),
    #[error("{0}")]
    ReturnMismatch(String),
    #[error("seed search gave up after {attempts} draws with {found} of {wanted} distinct results")]
    SeedSearchExhausted {
        attempts: usize,
        found: usize,
        wanted: usize,
    },
}

/// Errors raised by exercise functions themselves, reference or candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExerciseError {
    #[error("missing argument: {0}")]
    MissingArgument(String),
    #[error("invalid argument {name}: expected {expected}")]
    InvalidArgument { name: String, expected: String },
    #[error("EOF when reading a line")]
    InputExhausted,
    #[error("{0}")]
    Failed(String),
}
