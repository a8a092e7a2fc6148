use super::{status_code, ExecutorError};
use crate::{config::BatchConfig, invocation::Invocation};
use std::process::Command;
use tracing::{debug, info, instrument, warn};

/// Executor for a single scheduler-provided array instance
///
/// Reads the task index from the environment, performs the one blocking call
/// with inherited stdio and hands the child's exit status back unchanged.
pub struct ScheduledExecutor {
    config: BatchConfig,
}

impl ScheduledExecutor {
    pub fn load(config: BatchConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self), level = "info")]
    pub fn execute(&mut self) -> Result<i32, ExecutorError> {
        let invocation =
            Invocation::from_env(&self.config.array.variable, self.config.scalars.clone())?;

        // validity is scheduler-determined at this point, only flag the mismatch
        if !self.config.array.indices.contains(&invocation.task_id) {
            warn!(
                task = invocation.task_id,
                "Task index is not part of the configured array set"
            );
        }

        debug!(
            task = invocation.task_id,
            exec = ?self.config.program.exec,
            "Launching optimization program"
        );

        let mut child = Command::new(&self.config.program.exec)
            .args(self.config.program.params.iter())
            .args(invocation.argv())
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: self.config.program.exec.to_string_lossy().into_owned(),
                source,
            })?;

        let status = child.wait().map_err(ExecutorError::Wait)?;

        info!(
            task = invocation.task_id,
            status = status.code(),
            "Optimization program finished"
        );

        Ok(status_code(status))
    }
}
