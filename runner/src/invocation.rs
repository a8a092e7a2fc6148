use crate::config::ScalarConfig;
use std::env::{self, VarError};
use thiserror::Error;


#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Task variable {0} is not set, refusing to launch without an index")]
    MissingVariable(String),
    #[error("Task variable {variable} holds '{value}', which is not an integer index")]
    MalformedVariable { variable: String, value: String },
}

/// One scheduled run: the externally supplied index plus the fixed batch scalars.
/// Built once per launch, consumed by a single outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub task_id: u32,
    pub scalars: ScalarConfig,
}

impl Invocation {
    pub fn new(task_id: u32, scalars: ScalarConfig) -> Self {
        Self { task_id, scalars }
    }

    /// read the task index from the configured environment variable
    /// fails before any subprocess exists when the variable is absent or not an integer
    pub fn from_env(variable: &str, scalars: ScalarConfig) -> Result<Self, LaunchError> {
        Ok(Self::new(task_id_from_env(variable)?, scalars))
    }

    /// the six positional arguments, task index first, scalars in wire order
    pub fn argv(&self) -> Vec<String> {
        vec![
            self.task_id.to_string(),
            self.scalars.wec_method.to_string(),
            self.scalars.model.to_string(),
            self.scalars.op_alg.to_string(),
            self.scalars.maxwec.to_string(),
            self.scalars.nsteps.to_string(),
        ]
    }
}

pub fn task_id_from_env(variable: &str) -> Result<u32, LaunchError> {
    match env::var(variable) {
        Ok(value) => {
            let parsed = value.trim().parse::<u32>();

            parsed.map_err(|_| LaunchError::MalformedVariable {
                variable: variable.to_owned(),
                value,
            })
        }
        Err(VarError::NotPresent) => Err(LaunchError::MissingVariable(variable.to_owned())),
        Err(VarError::NotUnicode(raw)) => Err(LaunchError::MalformedVariable {
            variable: variable.to_owned(),
            value: raw.to_string_lossy().into_owned(),
        }),
    }
}
