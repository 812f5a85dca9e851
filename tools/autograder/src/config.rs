use crate::errors::GraderError;
use crate::logging::DEFAULT_MAX_PAYLOAD_BYTES;
use crate::random::FALLBACK_SEED;
use crate::runtime::FileSystem;
use crate::session::{
    SessionLimits, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MAX_OUTPUT_LINES, DEFAULT_MAX_OVERRUN_REQUESTS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NUM_TESTS: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub num_tests: Option<usize>,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub cases: CasesConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub max_overrun_requests: u32,
    pub max_output_lines: usize,
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CasesConfig {
    pub num_tests: usize,
    /// `None` derives the seed from the login name, falling back to a fixed value.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportConfig {
    /// Render `f(x=1)` instead of `f(1)` in return-value diagnostics.
    pub arg_names: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                max_overrun_requests: DEFAULT_MAX_OVERRUN_REQUESTS,
                max_output_lines: DEFAULT_MAX_OUTPUT_LINES,
                max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            },
            cases: CasesConfig {
                num_tests: DEFAULT_NUM_TESTS,
                seed: None,
            },
            report: ReportConfig { arg_names: false },
            logging: LoggingConfig {
                path: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            },
        }
    }
}

/// The knobs the comparators need, resolved from an [`AppConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeSettings {
    pub limits: SessionLimits,
    pub num_tests: usize,
    pub seed: u64,
    pub arg_names: bool,
}

impl Default for GradeSettings {
    fn default() -> Self {
        Self {
            limits: SessionLimits::default(),
            num_tests: DEFAULT_NUM_TESTS,
            seed: FALLBACK_SEED,
            arg_names: false,
        }
    }
}

impl AppConfig {
    pub fn grade_settings(&self, default_seed: u64) -> GradeSettings {
        GradeSettings {
            limits: SessionLimits {
                max_overrun_requests: self.session.max_overrun_requests,
                max_output_lines: self.session.max_output_lines,
                max_output_bytes: self.session.max_output_bytes,
            },
            num_tests: self.cases.num_tests,
            seed: self.cases.seed.unwrap_or(default_seed),
            arg_names: self.report.arg_names,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    session: Option<PartialSessionConfig>,
    cases: Option<PartialCasesConfig>,
    report: Option<PartialReportConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialSessionConfig {
    max_overrun_requests: Option<u32>,
    max_output_lines: Option<usize>,
    max_output_bytes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialCasesConfig {
    num_tests: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialReportConfig {
    arg_names: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
}

pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    fs: &dyn FileSystem,
) -> Result<AppConfig, GraderError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let path = absolutize_path(process_cwd, path);
        let file_contents = fs.read_to_string(&path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| GraderError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides, process_cwd);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(session) = partial.session {
        if let Some(value) = session.max_overrun_requests {
            cfg.session.max_overrun_requests = value;
        }
        if let Some(value) = session.max_output_lines {
            cfg.session.max_output_lines = value;
        }
        if let Some(value) = session.max_output_bytes {
            cfg.session.max_output_bytes = value;
        }
    }

    if let Some(cases) = partial.cases {
        if let Some(value) = cases.num_tests {
            cfg.cases.num_tests = value;
        }
        if let Some(value) = cases.seed {
            cfg.cases.seed = Some(value);
        }
    }

    if let Some(report) = partial.report {
        if let Some(value) = report.arg_names {
            cfg.report.arg_names = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(value) = logging.path {
            cfg.logging.path = Some(value);
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides, process_cwd: &Path) {
    if let Some(seed) = overrides.seed {
        cfg.cases.seed = Some(seed);
    }
    if let Some(num_tests) = overrides.num_tests {
        cfg.cases.num_tests = num_tests;
    }
    if let Some(path) = &overrides.log_path {
        cfg.logging.path = Some(path.clone());
    }
    if let Some(path) = &cfg.logging.path {
        cfg.logging.path = Some(absolutize_path(process_cwd, path));
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), GraderError> {
    if cfg.cases.num_tests == 0 {
        return Err(GraderError::InvalidConfig(
            "cases.num_tests must be greater than zero".to_string(),
        ));
    }

    if cfg.session.max_output_lines == 0 {
        return Err(GraderError::InvalidConfig(
            "session.max_output_lines must be greater than zero".to_string(),
        ));
    }

    if cfg.session.max_output_bytes == 0 {
        return Err(GraderError::InvalidConfig(
            "session.max_output_bytes must be greater than zero".to_string(),
        ));
    }

    if cfg.logging.max_payload_bytes < 16 {
        return Err(GraderError::InvalidConfig(
            "logging.max_payload_bytes must be at least 16".to_string(),
        ));
    }

    Ok(())
}
