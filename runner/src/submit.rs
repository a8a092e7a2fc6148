use crate::{config::BatchConfig, executors::status_code};
use itertools::Itertools;
use std::{
    io::Write,
    path::Path,
    process::{Command, Stdio},
};
use thiserror::Error;
use tracing::{debug, info};


#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Failed to spawn sbatch, is a SLURM client installed?")]
    SpawnScheduler(#[source] std::io::Error),
    #[error("Failed to hand the script to sbatch")]
    SchedulerIo(#[from] std::io::Error),
}

/// render the submission script with all resource declarations
/// the array directive enumerates exactly the configured index set
pub fn render_script(config: &BatchConfig, config_path: &Path) -> String {
    let mut script = String::from("#!/bin/bash\n");

    script.push_str(&format!("#SBATCH --job-name={}\n", config.job.name));
    script.push_str(&format!("#SBATCH --time={}\n", config.job.walltime));
    script.push_str(&format!("#SBATCH --ntasks={}\n", config.job.ntasks));
    script.push_str(&format!("#SBATCH --mem-per-cpu={}\n", config.job.memory));
    script.push_str(&format!(
        "#SBATCH --array={}\n",
        config.array.indices.iter().join(",")
    ));

    if let Some(ref mail_user) = config.job.mail_user {
        script.push_str(&format!("#SBATCH --mail-user={mail_user}\n"));

        if !config.job.mail_types.is_empty() {
            script.push_str(&format!(
                "#SBATCH --mail-type={}\n",
                config
                    .job
                    .mail_types
                    .iter()
                    .map(|mail_type| mail_type.as_str())
                    .join(",")
            ));
        }
    }

    script.push_str(&format!(
        "\n{} --config {} launch\n",
        env!("CARGO_PKG_NAME"),
        config_path.display()
    ));

    script
}

/// pipe the rendered script into sbatch and forward the scheduler's response
pub fn submit(config: &BatchConfig, config_path: &Path) -> Result<i32, SubmitError> {
    let script = render_script(config, config_path);

    debug!("Submitting script:\n{script}");

    let mut child = Command::new("sbatch")
        .stdin(Stdio::piped())
        .spawn()
        .map_err(SubmitError::SpawnScheduler)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(script.as_bytes())?;
        // Dropping stdin here will close the underlying file descriptor
        // sbatch reads the script from stdin until it sees the end of input
    }

    let status = child.wait()?;

    info!(status = status.code(), "sbatch finished");

    Ok(status_code(status))
}
