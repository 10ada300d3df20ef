use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use dirq::cli::CliArgs;
use dirq::exec::CommandTemplate;
use dirq::pool::{PoolOptions, ShutdownController, Supervisor};
use dirq::run;
use dirq::store::SNAPSHOT_FILE_NAME;
use dirq::work::WorkState;

type TestResult = Result<(), Box<dyn Error>>;

const RUN_TIMEOUT: Duration = Duration::from_secs(60);

fn args(directory: &Path, command: String) -> CliArgs {
    CliArgs {
        directory: directory.to_path_buf(),
        command,
        max_concurrent: 2,
        persist: false,
        log_level: None,
    }
}

/// Write a small shell script that appends its single argument to `log`,
/// returning the command string that invokes it.
fn recorder_script(scratch: &Path, log: &Path) -> Result<String, Box<dyn Error>> {
    let script = scratch.join("record.sh");
    fs::write(
        &script,
        format!("#!/bin/sh\necho \"$1\" >> {}\n", log.display()),
    )?;
    Ok(format!("sh {}", script.display()))
}

fn logged_lines(log: &Path) -> BTreeSet<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn processes_every_file_exactly_once() -> TestResult {
    let work = TempDir::new()?;
    let scratch = TempDir::new()?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(work.path().join(name), b"content")?;
    }

    let log = scratch.path().join("log");
    let command = recorder_script(scratch.path(), &log)?;

    timeout(RUN_TIMEOUT, run(args(work.path(), command))).await??;

    let expected: BTreeSet<String> = ["a.txt", "b.txt", "c.txt"]
        .iter()
        .map(|name| work.path().join(name).display().to_string())
        .collect();
    assert_eq!(logged_lines(&log), expected);

    // Exactly once: three files, three invocations.
    assert_eq!(fs::read_to_string(&log)?.lines().count(), 3);
    Ok(())
}

#[tokio::test]
async fn resumed_run_skips_snapshotted_files() -> TestResult {
    let work = TempDir::new()?;
    let scratch = TempDir::new()?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(work.path().join(name), b"content")?;
    }
    fs::write(
        work.path().join(SNAPSHOT_FILE_NAME),
        "dirq-snapshot v1\na.txt\nb.txt\n",
    )?;

    let log = scratch.path().join("log");
    let command = recorder_script(scratch.path(), &log)?;

    let mut cli = args(work.path(), command);
    cli.persist = true;
    timeout(RUN_TIMEOUT, run(cli)).await??;

    let expected: BTreeSet<String> =
        [work.path().join("c.txt").display().to_string()].into();
    assert_eq!(logged_lines(&log), expected);

    // The rewritten snapshot records everything handled so far, and the
    // snapshot/backup names themselves are reserved, never run as work.
    let snapshot = fs::read_to_string(work.path().join(SNAPSHOT_FILE_NAME))?;
    for name in ["a.txt", "b.txt", "c.txt", SNAPSHOT_FILE_NAME] {
        assert!(snapshot.contains(name), "snapshot missing {name}");
    }
    Ok(())
}

#[tokio::test]
async fn persisted_run_writes_a_snapshot_from_scratch() -> TestResult {
    let work = TempDir::new()?;
    fs::write(work.path().join("a.txt"), b"content")?;

    let mut cli = args(work.path(), "true".to_string());
    cli.persist = true;
    timeout(RUN_TIMEOUT, run(cli)).await??;

    let snapshot = fs::read_to_string(work.path().join(SNAPSHOT_FILE_NAME))?;
    assert!(snapshot.contains("a.txt"));
    Ok(())
}

#[tokio::test]
async fn missing_command_drains_work_and_terminates() -> TestResult {
    let work = TempDir::new()?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(work.path().join(name), b"content")?;
    }

    let cli = args(work.path(), "dirq-no-such-binary-404".to_string());
    // Fatal mid-run, but the engine still winds down instead of hanging.
    timeout(RUN_TIMEOUT, run(cli)).await??;
    Ok(())
}

#[tokio::test]
async fn serial_pool_never_overlaps_commands() -> TestResult {
    let work = TempDir::new()?;
    let scratch = TempDir::new()?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(work.path().join(name), b"content")?;
    }

    let log = scratch.path().join("log");
    let script = scratch.path().join("slow.sh");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"start $1\" >> {log}\nsleep 0.1\necho \"end $1\" >> {log}\n",
            log = log.display()
        ),
    )?;

    let mut cli = args(work.path(), format!("sh {}", script.display()));
    cli.max_concurrent = 1;
    timeout(RUN_TIMEOUT, run(cli)).await??;

    // With a single worker, starts and ends must strictly alternate.
    let contents = fs::read_to_string(&log)?;
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 6);
    for pair in lines.chunks(2) {
        assert!(pair[0].starts_with("start "), "unexpected line: {}", pair[0]);
        assert!(pair[1].starts_with("end "), "unexpected line: {}", pair[1]);
    }
    Ok(())
}

#[tokio::test]
async fn empty_directory_terminates_immediately() -> TestResult {
    let work = TempDir::new()?;
    timeout(RUN_TIMEOUT, run(args(work.path(), "true".to_string()))).await??;
    Ok(())
}

#[tokio::test]
async fn zero_concurrency_is_a_configuration_error() -> TestResult {
    let work = TempDir::new()?;
    fs::write(work.path().join("a.txt"), b"content")?;

    let mut cli = args(work.path(), "true".to_string());
    cli.max_concurrent = 0;
    assert!(run(cli).await.is_err());
    Ok(())
}

#[tokio::test]
async fn missing_directory_is_a_configuration_error() {
    let cli = args(
        &PathBuf::from("/definitely/not/a/real/dir"),
        "true".to_string(),
    );
    assert!(run(cli).await.is_err());
}

#[tokio::test]
async fn unbalanced_command_quotes_are_a_configuration_error() -> TestResult {
    let work = TempDir::new()?;
    let cli = args(work.path(), "echo \"unterminated".to_string());
    assert!(run(cli).await.is_err());
    Ok(())
}

#[tokio::test]
async fn raised_shutdown_stops_claims_but_awaits_inflight_commands() -> TestResult {
    let work = TempDir::new()?;
    let scratch = TempDir::new()?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(work.path().join(name), b"content")?;
    }

    let log = scratch.path().join("log");
    let script = scratch.path().join("slow.sh");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"start $1\" >> {log}\nsleep 1\necho \"done $1\" >> {log}\n",
            log = log.display()
        ),
    )?;

    // Wire the pool by hand so the test holds the shutdown controller.
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let state = Arc::new(WorkState::new(events_tx.clone()));
    let shutdown = Arc::new(ShutdownController::new());
    let template = Arc::new(CommandTemplate::parse(&format!(
        "sh {}",
        script.display()
    ))?);

    let supervisor = Supervisor::new(
        PoolOptions {
            target: 1,
            directory: work.path().to_path_buf(),
        },
        template,
        state.clone(),
        shutdown.clone(),
        None,
        events_tx,
        events_rx,
    );
    let pool = tokio::spawn(supervisor.run());

    // Wait for the first command to start, then request shutdown while it is
    // still sleeping.
    let deadline = tokio::time::Instant::now() + RUN_TIMEOUT;
    while !fs::read_to_string(&log).unwrap_or_default().contains("start") {
        assert!(tokio::time::Instant::now() < deadline, "no command started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.raise();
    state.notify_changed();

    timeout(RUN_TIMEOUT, pool).await???;

    // Exactly one claim happened: the in-flight command ran to completion
    // ("done" was written before the pool returned) and no further file was
    // picked up after the flag went up.
    let contents = fs::read_to_string(&log)?;
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2, "unexpected log: {contents}");
    assert!(lines[0].starts_with("start "));
    assert!(lines[1].starts_with("done "));
    Ok(())
}

#[tokio::test]
async fn pool_of_two_runs_at_most_two_commands_at_once() -> TestResult {
    let work = TempDir::new()?;
    let scratch = TempDir::new()?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(work.path().join(name), b"content")?;
    }

    let log = scratch.path().join("log");
    let script = scratch.path().join("slow.sh");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho start >> {log}\nsleep 0.5\necho end >> {log}\n",
            log = log.display()
        ),
    )?;

    let cli = args(work.path(), format!("sh {}", script.display()));
    timeout(RUN_TIMEOUT, run(cli)).await??;

    // Replay the append-ordered start/end events and track the high-water
    // mark of concurrently running commands.
    let contents = fs::read_to_string(&log)?;
    let mut running = 0i32;
    let mut high_water = 0i32;
    let mut starts = 0;
    for line in contents.lines() {
        match line {
            "start" => {
                running += 1;
                starts += 1;
                high_water = high_water.max(running);
            }
            "end" => running -= 1,
            other => panic!("unexpected log line: {other}"),
        }
    }

    assert_eq!(starts, 3);
    assert_eq!(running, 0);
    // Three half-second commands through a pool of two: the first pair must
    // overlap, and a third may never join them.
    assert_eq!(high_water, 2, "log was: {contents}");
    Ok(())
}

#[test]
fn shutdown_flag_flips_exactly_once() {
    let shutdown = ShutdownController::new();
    assert!(!shutdown.is_raised());
    assert!(shutdown.raise());
    assert!(!shutdown.raise());
    assert!(shutdown.is_raised());
}
