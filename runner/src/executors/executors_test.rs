use super::{status_code, ExecutorError, Executors, LocalExecutor, ScheduledExecutor};
use crate::{
    config::{ArrayConfig, BatchConfig, JobConfig, LocalConfig, ProgramConfig, ScalarConfig},
    invocation::LaunchError,
};
use std::{env, os::unix::process::ExitStatusExt, process::ExitStatus};

fn test_config(params: &[&str], variable: &str, indices: Vec<u32>) -> BatchConfig {
    BatchConfig {
        job: JobConfig {
            name: String::from("opt-wec-test"),
            walltime: String::from("00:01:00"),
            ntasks: 1,
            memory: String::from("1G"),
            mail_user: None,
            mail_types: Vec::new(),
        },
        array: ArrayConfig {
            variable: variable.to_owned(),
            indices,
        },
        program: ProgramConfig {
            exec: "/bin/sh".into(),
            params: params.iter().map(|param| param.to_string()).collect(),
        },
        scalars: ScalarConfig {
            wec_method: 0,
            model: 2,
            op_alg: 2,
            maxwec: 1,
            nsteps: 1,
        },
        local: LocalConfig { threads: Some(2) },
    }
}

#[test]
pub fn status_code_passes_exit_codes() {
    assert_eq!(status_code(ExitStatus::from_raw(0)), 0);
    assert_eq!(status_code(ExitStatus::from_raw(3 << 8)), 3);
}

#[test]
pub fn status_code_maps_signals() {
    // raw wait status 9 is death by SIGKILL
    assert_eq!(status_code(ExitStatus::from_raw(9)), 137);
}

#[test]
pub fn scheduled_passes_the_exit_status_through() {
    env::set_var("WEC_TEST_EXEC_PASS", "46");

    let config = test_config(&["-c", "exit 7"], "WEC_TEST_EXEC_PASS", vec![46]);
    let mut executor = Executors::Scheduled(ScheduledExecutor::load(config));

    assert_eq!(executor.execute().unwrap(), 7);

    env::remove_var("WEC_TEST_EXEC_PASS");
}

#[test]
pub fn scheduled_reports_success() {
    env::set_var("WEC_TEST_EXEC_OK", "116");

    let config = test_config(&["-c", "exit 0"], "WEC_TEST_EXEC_OK", vec![116]);

    assert_eq!(ScheduledExecutor::load(config).execute().unwrap(), 0);

    env::remove_var("WEC_TEST_EXEC_OK");
}

#[test]
pub fn scheduled_fails_without_an_index() {
    let config = test_config(&["-c", "exit 0"], "WEC_TEST_EXEC_UNSET", vec![46]);

    assert!(matches!(
        ScheduledExecutor::load(config).execute(),
        Err(ExecutorError::Launch(LaunchError::MissingVariable(_)))
    ));
}

#[test]
pub fn scheduled_surfaces_spawn_failures() {
    env::set_var("WEC_TEST_EXEC_NOPROG", "46");

    let mut config = test_config(&[], "WEC_TEST_EXEC_NOPROG", vec![46]);
    config.program.exec = "/nonexistent/optimize".into();

    assert!(matches!(
        ScheduledExecutor::load(config).execute(),
        Err(ExecutorError::Spawn { .. })
    ));

    env::remove_var("WEC_TEST_EXEC_NOPROG");
}

#[test]
pub fn local_runs_the_whole_set() {
    let config = test_config(&["-c", "exit 0"], "UNUSED", vec![116, 191, 46]);

    assert_eq!(LocalExecutor::load(config).execute().unwrap(), 0);
}

#[test]
pub fn local_reports_failed_tasks() {
    let config = test_config(&["-c", "exit 3"], "UNUSED", vec![116, 46]);

    assert_eq!(LocalExecutor::load(config).execute().unwrap(), 1);
}

#[test]
pub fn local_drains_large_task_output() {
    // output well past a pipe buffer must not stall a succeeding task
    // into the walltime kill
    let mut config = test_config(&["-c", "head -c 2000000 /dev/zero"], "UNUSED", vec![46]);
    config.job.walltime = String::from("00:00:05");

    assert_eq!(LocalExecutor::load(config).execute().unwrap(), 0);
}

#[test]
pub fn local_kills_tasks_over_the_walltime() {
    let mut config = test_config(&["-c", "sleep 5"], "UNUSED", vec![46]);
    config.job.walltime = String::from("00:00:01");

    assert_eq!(LocalExecutor::load(config).execute().unwrap(), 1);
}
