pub mod catalog;
pub mod comparator;
pub mod config;
pub mod console;
pub mod errors;
pub mod logging;
pub mod pure;
pub mod random;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod types;

use catalog::builtin_registry;
use clap::{error::ErrorKind, Parser, Subcommand};
use comparator::run_interactive_comparison;
use config::{load_config, CliOverrides, GradeSettings};
use errors::GraderError;
use logging::{append_run_log, clear_run_logger, init_run_logger, JsonlLogger};
use pure::compare_returns;
use random::{default_seed_from_env, seed_value_pairs, Lcg};
use registry::Registry;
use runtime::{ProductionRuntime, Terminal};
use serde_json::json;
use session::simulate_interaction;
use types::{Arguments, ExerciseKind};

/// Upper bound on generator draws for `seeds` before giving up.
const SEED_SEARCH_MAX_DRAWS: usize = 100_000;

#[derive(Debug, Clone, Parser)]
#[command(name = "autograder")]
#[command(version, about = "Grade exercise functions against reference solutions")]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    #[arg(long = "num-tests", global = true)]
    pub num_tests: Option<usize>,
    #[arg(long = "log", global = true)]
    pub log_path: Option<std::path::PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List every registered exercise.
    List,
    /// Grade a reference solution against itself.
    Check {
        #[arg(long)]
        activity: String,
        #[arg(long)]
        function: String,
    },
    /// Run one reference solution with scripted input and print its transcript.
    Simulate {
        #[arg(long)]
        activity: String,
        #[arg(long)]
        function: String,
        #[arg(long = "input")]
        inputs: Vec<String>,
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// Print generator seeds that produce distinct values in a range.
    Seeds {
        #[arg(long, allow_negative_numbers = true)]
        min: i64,
        #[arg(long, allow_negative_numbers = true)]
        max: i64,
        #[arg(long)]
        count: usize,
    },
}

pub fn run() -> Result<i32, GraderError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| GraderError::Io(e.to_string()))?;
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &std::path::Path,
    runtime: &ProductionRuntime,
) -> Result<i32, GraderError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(GraderError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        seed: cli.seed,
        num_tests: cli.num_tests,
        log_path: cli.log_path.clone(),
    };
    let cfg = load_config(&overrides, cwd, runtime.file_system.as_ref())?;

    if let Some(path) = &cfg.logging.path {
        let mut logger = JsonlLogger::new(path);
        logger.max_payload_bytes = cfg.logging.max_payload_bytes;
        init_run_logger(logger);
    }
    let settings = cfg.grade_settings(default_seed_from_env());
    append_run_log(
        "info",
        "run.started",
        json!({
            "seed": settings.seed,
            "num_tests": settings.num_tests,
            "max_overrun_requests": settings.limits.max_overrun_requests,
        }),
    );

    let registry = builtin_registry();
    let result = dispatch(&cli.command, &registry, &settings, runtime.terminal.as_ref());
    clear_run_logger();
    result
}

fn dispatch(
    command: &Command,
    registry: &Registry,
    settings: &GradeSettings,
    terminal: &dyn Terminal,
) -> Result<i32, GraderError> {
    match command {
        Command::List => {
            for exercise in registry.exercises() {
                terminal.write_line(&format!(
                    "{}/{} ({})",
                    exercise.activity,
                    exercise.name,
                    exercise.kind.as_str()
                ))?;
            }
        }
        Command::Check { activity, function } => {
            let exercise = registry.resolve(activity, function)?;
            let reference = exercise.reference.as_ref();
            match exercise.kind {
                ExerciseKind::Pure => {
                    compare_returns(registry, activity, function, reference, settings)?
                }
                ExerciseKind::Interactive => {
                    run_interactive_comparison(registry, activity, function, reference, settings)?
                }
            }
            terminal.write_line(&format!(
                "check passed: {activity}/{function} cases={}",
                settings.num_tests
            ))?;
        }
        Command::Simulate {
            activity,
            function,
            inputs,
            args,
        } => {
            let reference = registry.reference(activity, function)?;
            let mut arguments = Arguments::new();
            for raw in args {
                let (name, value) = Arguments::parse_pair(raw)?;
                arguments.insert(name, value);
            }
            let report = simulate_interaction(inputs, reference.as_ref(), &arguments, settings.limits)?;
            for line in report.transcript.lines() {
                terminal.write_line(line)?;
            }
            terminal.write_line(&format!(
                "ended_early={} ran_past_inputs={} completion={}",
                report.outcome.ended_early, report.outcome.ran_past_inputs, report.completion
            ))?;
        }
        Command::Seeds { min, max, count } => {
            let mut rng = Lcg::new(settings.seed);
            let pairs = seed_value_pairs(&mut rng, *count, SEED_SEARCH_MAX_DRAWS, |rng| {
                rng.next_in(*min, *max)
            })?;
            for (value, seed) in pairs {
                terminal.write_line(&format!("value={value} seed={seed}"))?;
            }
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{FakeFileSystem, FakeTerminal};
    use std::ffi::OsString;
    use std::path::Path;
    use std::sync::Arc;

    fn fake_runtime(fs: FakeFileSystem, terminal: FakeTerminal) -> ProductionRuntime {
        ProductionRuntime {
            file_system: Arc::new(fs),
            terminal: Arc::new(terminal),
        }
    }

    fn argv(args: &[&str]) -> Vec<OsString> {
        std::iter::once("autograder")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn list_prints_every_exercise_with_its_kind() {
        let terminal = FakeTerminal::default();
        let runtime = fake_runtime(FakeFileSystem::default(), terminal.clone());
        let code = run_with_runtime(&argv(&["list"]), Path::new("/"), &runtime).expect("list");
        assert_eq!(code, 0);
        let lines = terminal.written_lines();
        assert!(lines.contains(&"p2act6/palindrome_checker (pure)".to_string()));
        assert!(lines.contains(&"intro_io/greet_user (interactive)".to_string()));
    }

    #[test]
    fn check_uses_num_tests_from_config_file() {
        let fs = FakeFileSystem::with_file("/work/grader.toml", "[cases]\nnum_tests = 4\nseed = 5\n");
        let terminal = FakeTerminal::default();
        let runtime = fake_runtime(fs, terminal.clone());
        run_with_runtime(
            &argv(&[
                "check",
                "--activity",
                "intro_io",
                "--function",
                "number_guesser",
                "--config",
                "grader.toml",
            ]),
            Path::new("/work"),
            &runtime,
        )
        .expect("check");
        assert_eq!(
            terminal.written_lines(),
            vec!["check passed: intro_io/number_guesser cases=4"]
        );
    }

    #[test]
    fn simulate_prints_transcript_and_flags() {
        let terminal = FakeTerminal::default();
        let runtime = fake_runtime(FakeFileSystem::default(), terminal.clone());
        run_with_runtime(
            &argv(&[
                "simulate",
                "--activity",
                "intro_io",
                "--function",
                "number_guesser",
                "--arg",
                "secret=7",
                "--input",
                "3",
            ]),
            Path::new("/"),
            &runtime,
        )
        .expect("simulate");
        let lines = terminal.written_lines();
        assert_eq!(lines[0], "Guess a number: 3");
        assert_eq!(lines[1], "Too low!");
        assert_eq!(lines[2], "Guess a number: ");
        assert_eq!(lines[3], crate::session::OVERRUN_SENTINEL);
        assert_eq!(
            lines[4],
            "ended_early=false ran_past_inputs=true completion=raised: EOF when reading a line"
        );
    }

    #[test]
    fn seeds_accepts_the_full_i64_range() {
        let terminal = FakeTerminal::default();
        let runtime = fake_runtime(FakeFileSystem::default(), terminal.clone());
        run_with_runtime(
            &argv(&[
                "seeds",
                "--min",
                "-9223372036854775808",
                "--max",
                "9223372036854775807",
                "--count",
                "1",
                "--seed",
                "5",
            ]),
            Path::new("/"),
            &runtime,
        )
        .expect("seeds");
        let lines = terminal.written_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" seed=5"));
    }

    #[test]
    fn unknown_exercise_and_bad_flags_are_errors() {
        let runtime = fake_runtime(FakeFileSystem::default(), FakeTerminal::default());
        let err = run_with_runtime(
            &argv(&["check", "--activity", "p9", "--function", "x"]),
            Path::new("/"),
            &runtime,
        )
        .expect_err("unknown activity");
        assert!(matches!(err, GraderError::UnknownActivity(_)));

        let err = run_with_runtime(&argv(&["list", "--bogus"]), Path::new("/"), &runtime)
            .expect_err("bad flag");
        assert!(matches!(err, GraderError::Cli(_)));
    }
}
