use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Error,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{error, warn};


// check if a file is executable
pub fn check_executable(path: &PathBuf) -> Result<bool, ConfigError> {
    if !path.is_file() {
        Err(ConfigError::FileNotFound)
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigError::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read batch config: {0}")]
    ReadConfig(Error),
    #[error("Failed to parse batch config")]
    ParseConfig(#[from] serde_yaml::Error),
    #[error("File not found")]
    FileNotFound,
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
    #[error("Walltime must be formatted as HH:MM:SS, got '{0}'")]
    InvalidWalltime(String),
    #[error("Memory must be an integer with an optional K/M/G/T suffix, got '{0}'")]
    InvalidMemory(String),
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    // resource requests and notification settings handed to the scheduler
    pub job: JobConfig,
    // the finite index set and the variable the scheduler injects it through
    pub array: ArrayConfig,
    // the external optimization program, invoked once per array instance
    pub program: ProgramConfig,
    // fixed per-batch scalars, passed through without interpretation
    pub scalars: ScalarConfig,

    #[serde(default)]
    pub local: LocalConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub name: String,
    // HH:MM:SS, also used to bound children in local runs
    pub walltime: String,
    #[serde(default = "default_ntasks")]
    pub ntasks: u32,
    // sbatch style, e.g. "6G"
    pub memory: String,
    #[serde(default)]
    pub mail_user: Option<String>,
    #[serde(default)]
    pub mail_types: Vec<MailType>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MailType {
    Begin,
    End,
    Fail,
    All,
}

impl MailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Begin => "BEGIN",
            Self::End => "END",
            Self::Fail => "FAIL",
            Self::All => "ALL",
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ArrayConfig {
    // Name of the environment variable the workload manager injects the index through
    #[serde(default = "default_array_variable")]
    pub variable: String,
    pub indices: Vec<u32>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ProgramConfig {
    pub exec: PathBuf,
    // leading arguments, placed before the six positional ones
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScalarConfig {
    pub wec_method: u32,
    pub model: u32,
    pub op_alg: u32,
    pub maxwec: u32,
    pub nsteps: u32,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    // thread pool size for run-local, defaults to the core count
    #[serde(default)]
    pub threads: Option<usize>,
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(ConfigError::ReadConfig)?;

        Ok(serde_yaml::from_str(&raw)?)
    }

    /// walltime as a duration, for bounding children in local runs
    pub fn walltime(&self) -> Result<Duration, ConfigError> {
        parse_walltime(&self.job.walltime)
    }

    pub fn preflight_checks(&mut self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        if !self.program.exec.is_file() {
            error!(
                "Failed to find program.exec. Either not a file or not found at {}",
                self.program.exec.to_string_lossy()
            );

            contains_error = true;
        } else {
            match check_executable(&self.program.exec) {
                Ok(is_executable) => {
                    if !is_executable {
                        error!(
                            "program.exec target {} is not executable, this might cause problems",
                            self.program.exec.to_string_lossy()
                        );
                        contains_error = true;
                    }
                }
                Err(e) => {
                    error!(
                        "Failed to determine if program.exec ({}) is an executable: {e}",
                        self.program.exec.to_string_lossy()
                    );

                    contains_error = true;
                }
            }
        }

        if self.array.indices.is_empty() {
            error!("array.indices is empty, the batch would schedule no work");
            contains_error = true;
        }

        let duplicates = self
            .array
            .indices
            .iter()
            .duplicates()
            .sorted()
            .collect_vec();
        if !duplicates.is_empty() {
            error!("array.indices contains duplicate values: {duplicates:?}");
            contains_error = true;
        }

        if self.array.variable.is_empty() {
            error!("array.variable cannot be empty, the launcher needs it to find its index");
            contains_error = true;
        }

        match parse_walltime(&self.job.walltime) {
            Ok(walltime) => {
                if walltime.is_zero() {
                    error!("job.walltime cannot be 00:00:00, the scheduler would kill every task");
                    contains_error = true;
                }
            }
            Err(e) => {
                error!("job.walltime is invalid: {e}");
                contains_error = true;
            }
        }

        if let Err(e) = validate_memory(&self.job.memory) {
            error!("job.memory is invalid: {e}");
            contains_error = true;
        }

        if self.job.ntasks == 0 {
            error!("job.ntasks cannot be 0");
            contains_error = true;
        }

        match (&self.job.mail_user, self.job.mail_types.is_empty()) {
            (None, false) => {
                error!("job.mail_types is set but job.mail_user is missing, nowhere to notify");
                contains_error = true;
            }
            (Some(_), true) => {
                warn!(
                    "job.mail_user is set without job.mail_types. Falling back to BEGIN,END,FAIL"
                );
                self.job.mail_types = vec![MailType::Begin, MailType::End, MailType::Fail];
            }
            _ => {}
        }

        contains_error
    }
}

pub fn parse_walltime(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidWalltime(input.to_owned());
    let parts = input.split(':').collect_vec();

    if parts.len() != 3 {
        return Err(invalid());
    }

    let mut fields = parts
        .iter()
        .map(|part| part.parse::<u64>().map_err(|_| invalid()));

    // the length is checked above, next() cannot return None here
    let hours = fields.next().unwrap()?;
    let minutes = fields.next().unwrap()?;
    let seconds = fields.next().unwrap()?;

    if minutes > 59 || seconds > 59 {
        return Err(invalid());
    }

    // minutes and seconds are bounded above, only the hours field can overflow
    let total = hours
        .checked_mul(3600)
        .and_then(|hours| hours.checked_add(minutes * 60 + seconds))
        .ok_or_else(invalid)?;

    Ok(Duration::from_secs(total))
}

pub fn validate_memory(input: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidMemory(input.to_owned());
    let digits: String = input.chars().take_while(char::is_ascii_digit).collect();
    let suffix = &input[digits.len()..];

    if digits.is_empty() || digits.parse::<u64>().is_err() {
        return Err(invalid());
    }

    match suffix {
        "" | "K" | "M" | "G" | "T" => Ok(()),
        _ => Err(invalid()),
    }
}

fn default_array_variable() -> String {
    String::from("SLURM_ARRAY_TASK_ID")
}

fn default_ntasks() -> u32 {
    1
}
