use super::{status_code, ExecutorError};
use crate::{config::BatchConfig, invocation::Invocation};
use rayon::{prelude::*, ThreadPoolBuilder};
use std::{
    io::Read,
    process::{Command, Stdio},
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Instant,
};
use tracing::{debug, error, info, instrument, trace, warn};
use wait_timeout::ChildExt;

/// Executor that works through the whole index set on a local thread pool
///
/// Meant for dry runs on a workstation, without a workload manager. Each
/// child is bounded by the batch walltime and killed on expiry.
pub struct LocalExecutor {
    config: BatchConfig,
}

impl LocalExecutor {
    pub fn load(config: BatchConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self), level = "info")]
    pub fn execute(&mut self) -> Result<i32, ExecutorError> {
        let walltime = self.config.walltime()?;
        let thread_number = self.config.local.threads.unwrap_or_else(num_cpus::get);

        debug!("Starting thread pool with {thread_number} threads");

        let pool = ThreadPoolBuilder::new().num_threads(thread_number).build()?;

        match nix::unistd::gethostname() {
            Ok(hostname) => info!(
                "Running {} tasks on {}",
                self.config.array.indices.len(),
                hostname.to_string_lossy()
            ),
            Err(error) => warn!(error = ?error, "Failed to retrieve hostname"),
        }

        // general counters to provide a progress report
        let total = self.config.array.indices.len() as u64;
        let processed = AtomicU64::new(0);
        let failed = AtomicU64::new(0);

        pool.install(|| {
            self.config.array.indices.par_iter().for_each(|&task_id| {
                let invocation = Invocation::new(task_id, self.config.scalars.clone());
                let start = Instant::now();

                debug!(
                    "Processing task {task_id} with walltime {}s",
                    walltime.as_secs()
                );

                match Command::new(&self.config.program.exec)
                    .args(self.config.program.params.iter())
                    .args(invocation.argv())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                {
                    Ok(mut child) => {
                        // drain both pipes while waiting, a writer blocked on a
                        // full pipe would never exit and hit the walltime instead
                        let stdout_reader = child.stdout.take().map(spawn_reader);
                        let stderr_reader = child.stderr.take().map(spawn_reader);

                        match child.wait_timeout(walltime) {
                            Ok(Some(status)) => {
                                let elapsed = start.elapsed();
                                let output = join_reader(stdout_reader);

                                debug!(
                                    task = task_id,
                                    "Finished in {} ms | status: {}",
                                    elapsed.as_millis(),
                                    status.success()
                                );
                                trace!("Output: {output}");

                                if !status.success() {
                                    warn!(
                                        task = task_id,
                                        status = status_code(status),
                                        "Task failed"
                                    );
                                    debug!(
                                        task = task_id,
                                        stderr = %join_reader(stderr_reader),
                                        "Output of the failed task"
                                    );
                                    failed.fetch_add(1, Ordering::SeqCst);
                                }
                            }
                            Ok(None) => {
                                // child hasn't exited within the walltime
                                warn!(task = task_id, "Task exceeded the walltime, killing it");

                                if let Err(e) = child.kill() {
                                    error!(task = task_id, "Failed to kill timed out task: {e}");
                                }
                                let _ = child.wait();
                                // the readers see the closed pipes and finish
                                join_reader(stdout_reader);
                                join_reader(stderr_reader);

                                failed.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(e) => {
                                error!(task = task_id, "Failed to wait on task: {e}");
                                failed.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                    Err(e) => {
                        error!(task = task_id, "Failed to spawn task: {e}");
                        failed.fetch_add(1, Ordering::SeqCst);
                    }
                };

                info!(
                    "Done with {}/{}",
                    processed.fetch_add(1, Ordering::SeqCst) + 1,
                    total
                );
            });
        });

        let failed = failed.load(Ordering::SeqCst);

        if failed > 0 {
            warn!("{failed}/{total} tasks failed");

            Ok(1)
        } else {
            info!("Done with processing");

            Ok(0)
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = String::new();

        if let Err(e) = source.read_to_string(&mut buffer) {
            warn!("Failed to read task output: {e}");
        }

        buffer
    })
}

fn join_reader(reader: Option<thread::JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
