mod local;
mod scheduled;

pub use local::LocalExecutor;
pub use scheduled::ScheduledExecutor;

use crate::{config::ConfigError, invocation::LaunchError};
use std::{os::unix::process::ExitStatusExt, process::ExitStatus};
use thiserror::Error;

#[cfg(test)]
mod executors_test;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Failed to wait for the child process")]
    Wait(#[source] std::io::Error),
    #[error("Failed to build the local thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// All executor variants
/// (this is deliberately not made with dynamic dispatch to avoid the headache)
pub enum Executors {
    Scheduled(ScheduledExecutor),
    Local(LocalExecutor),
}

impl Executors {
    /// run the selected executor, yielding the process exit code to report
    pub fn execute(&mut self) -> Result<i32, ExecutorError> {
        match self {
            Self::Scheduled(executor) => executor.execute(),
            Self::Local(executor) => executor.execute(),
        }
    }
}

/// map a child's exit status onto our own exit code
/// a child killed by a signal has no code, report the conventional 128 + signo instead
pub fn status_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}
