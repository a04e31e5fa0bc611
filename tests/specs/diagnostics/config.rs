//! Configuration specs

use crate::prelude::*;
use std::io::Write;

#[test]
fn manager_starts_from_a_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
name = "builder"
workers = 2
wait_slice = "10ms"
long_wait_threshold = "2s"
"#
    )
    .unwrap();

    let config = ManagerConfig::load(file.path()).unwrap();
    assert_eq!(config.name, "builder");
    assert_eq!(config.wait_slice, Duration::from_millis(10));
    assert_eq!(config.long_wait_threshold, Duration::from_secs(2));
    assert!(config.deadlock_detection);

    let m = JobManager::new(config).unwrap();
    let handle = m.schedule(job_fn("ping", |_| JobStatus::Ok)).unwrap();
    assert_eq!(handle.join_timeout(WAIT), Some(JobStatus::Ok));
}

#[test]
fn zero_workers_is_rejected() {
    let err = ManagerConfig::from_toml_str("workers = 0").unwrap_err();
    assert!(matches!(err, JobError::InvalidConfig(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ManagerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, JobError::Io(_)));
}
