#![cfg(unix)]

//! Launch/wait protocol against a shell-script downloader double.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use lazyweights_core::{
    launch_with, wait_with, Config, FetchConfig, FetchError, Fetcher, Gate, LazyFile, Manifest,
    SentinelMode, WaitOutcome,
};
use tempfile::TempDir;

const BASE_URL: &str = "https://weights.example.test";

struct Stub {
    _dir: TempDir,
    root: PathBuf,
    log: PathBuf,
    config: FetchConfig,
}

impl Stub {
    /// Downloader that records its arguments, sleeps, then runs `finish`.
    fn new(delay: &str, finish: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        std::fs::create_dir_all(&root).unwrap();
        let log = dir.path().join("calls.log");
        let script = dir.path().join("downloader.sh");
        std::fs::write(
            &script,
            format!(
                "printf '%s %s\\n' \"$1\" \"$2\" >> '{}'\nsleep {}\n{}\n",
                log.display(),
                delay,
                finish
            ),
        )
        .unwrap();

        let config = FetchConfig {
            base_url: BASE_URL.to_string(),
            program: PathBuf::from("/bin/sh"),
            args: vec![script.display().to_string()],
            root: Some(root.clone()),
            gate: Gate::Fixed(true),
            poll_interval: Duration::from_millis(50),
            sentinel_mode: SentinelMode::Touch,
        };

        Self {
            _dir: dir,
            root,
            log,
            config,
        }
    }

    fn creating_target(delay: &str) -> Self {
        Self::new(delay, ": > \"$2\"")
    }

    fn fetcher(&self) -> Fetcher {
        Fetcher::new(self.config.clone())
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn assert_blocks(rx: &mpsc::Receiver<WaitOutcome>) {
    assert!(
        rx.recv_timeout(Duration::from_millis(300)).is_err(),
        "wait returned before the target existed"
    );
}

fn spawn_wait(
    fetcher: Fetcher,
    name: &'static str,
) -> (mpsc::Receiver<WaitOutcome>, thread::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let outcome = fetcher.wait(name, None).unwrap();
        let _ = tx.send(outcome);
    });
    (rx, handle)
}

fn touch(path: &Path) {
    std::fs::write(path, b"").unwrap();
}

#[test]
fn launch_creates_marker_and_passes_url_and_name() {
    let stub = Stub::creating_target("0");
    let fetcher = stub.fetcher();

    let handle = fetcher.launch("weights.bin").unwrap().expect("should spawn");
    assert!(stub.path("weights.bin.loading").exists());
    assert_eq!(handle.target(), stub.path("weights.bin"));

    let outcome = fetcher.wait("weights.bin", Some(handle)).unwrap();
    assert!(matches!(outcome, WaitOutcome::Exited(status) if status.success()));
    assert!(stub.path("weights.bin").exists());
    assert_eq!(
        stub.calls(),
        vec![format!("{}/weights.bin weights.bin", BASE_URL)]
    );
    // marker is left behind on success
    assert!(stub.path("weights.bin.loading").exists());
}

#[test]
fn lazy_file_launches_on_construction() {
    let stub = Stub::creating_target("0.2");

    let mut file = LazyFile::new(stub.fetcher(), "model.ckpt").unwrap();
    assert!(file.owns_download());
    assert!(stub.path("model.ckpt.loading").exists());

    let outcome = file.wait().unwrap();
    assert!(matches!(outcome, WaitOutcome::Exited(_)));
    assert!(!file.owns_download());
    assert!(file.path().exists());

    // second wait polls and sees the file
    assert_eq!(file.wait().unwrap(), WaitOutcome::Present);
    assert_eq!(stub.calls().len(), 1);
}

#[test]
fn wait_without_marker_launches_lazily() {
    let stub = Stub::creating_target("0");
    let fetcher = stub.fetcher();

    let outcome = fetcher.wait("late.bin", None).unwrap();
    assert!(matches!(outcome, WaitOutcome::Exited(_)));
    assert!(stub.path("late.bin").exists());
    assert_eq!(stub.calls(), vec![format!("{}/late.bin late.bin", BASE_URL)]);
}

#[test]
fn second_instance_polls_instead_of_spawning() {
    let stub = Stub::creating_target("0.5");

    let mut owner = LazyFile::new(stub.fetcher(), "weights.bin").unwrap();
    let mut follower = LazyFile::new(stub.fetcher(), "weights.bin").unwrap();
    assert!(owner.owns_download());
    assert!(!follower.owns_download());

    let waiter = thread::spawn(move || follower.wait().unwrap());
    owner.wait().unwrap();

    assert_eq!(waiter.join().unwrap(), WaitOutcome::Present);
    assert_eq!(stub.calls().len(), 1);
}

#[test]
fn closed_gate_never_spawns_and_wait_blocks_until_external_creation() {
    let stub = Stub::creating_target("0");
    let fetcher = Fetcher::new(FetchConfig {
        gate: Gate::Fixed(false),
        ..stub.config.clone()
    });

    assert!(fetcher.launch("weights.bin").unwrap().is_none());
    assert!(!stub.path("weights.bin.loading").exists());

    let (rx, waiter) = spawn_wait(fetcher, "weights.bin");
    assert_blocks(&rx);
    assert!(!stub.path("weights.bin.loading").exists());

    touch(&stub.path("weights.bin"));
    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    waiter.join().unwrap();

    assert_eq!(outcome, WaitOutcome::Present);
    assert!(stub.calls().is_empty());
}

#[test]
fn stale_marker_blocks_until_target_appears() {
    let stub = Stub::creating_target("0");
    touch(&stub.path("weights.bin.loading"));
    let fetcher = stub.fetcher();

    assert!(fetcher.launch("weights.bin").unwrap().is_none());

    let (rx, waiter) = spawn_wait(fetcher, "weights.bin");
    assert_blocks(&rx);

    touch(&stub.path("weights.bin"));
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        WaitOutcome::Present
    );
    waiter.join().unwrap();
    assert!(stub.calls().is_empty());
}

#[test]
fn concurrent_launches_all_waiters_return() {
    let stub = Stub::creating_target("0.2");
    let barrier = Arc::new(Barrier::new(2));

    let launchers: Vec<_> = (0..2)
        .map(|_| {
            let fetcher = stub.fetcher();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                fetcher.launch("weights.bin").unwrap()
            })
        })
        .collect();
    let handles: Vec<_> = launchers
        .into_iter()
        .filter_map(|t| t.join().unwrap())
        .collect();

    // the check-then-touch race may let both through
    assert!((1..=2).contains(&handles.len()));

    let (rx, poller) = spawn_wait(stub.fetcher(), "weights.bin");
    for handle in handles {
        stub.fetcher().wait("weights.bin", Some(handle)).unwrap();
    }
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        WaitOutcome::Present
    );
    poller.join().unwrap();
    assert!(stub.path("weights.bin").exists());
}

#[test]
fn exclusive_mode_spawns_once_under_contention() {
    let stub = Stub::creating_target("0.2");
    let config = FetchConfig {
        sentinel_mode: SentinelMode::Exclusive,
        ..stub.config.clone()
    };
    let barrier = Arc::new(Barrier::new(4));

    let launchers: Vec<_> = (0..4)
        .map(|_| {
            let fetcher = Fetcher::new(config.clone());
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                fetcher.launch("weights.bin").unwrap()
            })
        })
        .collect();
    let handles: Vec<_> = launchers
        .into_iter()
        .filter_map(|t| t.join().unwrap())
        .collect();

    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.wait().unwrap();
    }
    assert_eq!(stub.calls().len(), 1);
}

#[test]
fn failed_download_is_reported_as_exit_without_checking_target() {
    let stub = Stub::new("0", "exit 3");
    let fetcher = stub.fetcher();

    let handle = fetcher.launch("weights.bin").unwrap().unwrap();
    let outcome = fetcher.wait("weights.bin", Some(handle)).unwrap();

    match outcome {
        WaitOutcome::Exited(status) => assert_eq!(status.code(), Some(3)),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!stub.path("weights.bin").exists());
    assert!(stub.path("weights.bin.loading").exists());
}

#[test]
fn manifest_launch_uses_explicit_and_derived_sources() {
    let stub = Stub::creating_target("0");
    let manifest = Manifest::parse(
        "http://mirror.test/unet unet.bin\nvae.bin\n".as_bytes(),
    )
    .unwrap();
    touch(&stub.path("vae.bin"));

    let handles = manifest.launch_all(&stub.fetcher()).unwrap();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.wait().unwrap();
    }

    assert_eq!(stub.calls(), vec!["http://mirror.test/unet unet.bin".to_string()]);
    assert!(stub.path("unet.bin").exists());
}

#[test]
fn stateless_launch_then_wait() {
    let stub = Stub::creating_target("0.2");
    let mut config = Config::default();
    config.source.base_url = BASE_URL.to_string();
    config.downloader.program = stub.config.program.clone();
    config.downloader.args = stub.config.args.clone();
    config.storage.root = Some(stub.root.clone());
    config.gate.override_var = "LAZYWEIGHTS_TEST_STATELESS_OVERRIDE".to_string();
    config.gate.sandbox_marker = stub.root.join("no-sandbox-marker");

    launch_with(&config, "weights.bin").unwrap();
    assert!(stub.path("weights.bin.loading").exists());

    let path = wait_with(&config, "weights.bin").unwrap();
    assert_eq!(path, stub.path("weights.bin"));
    assert!(path.exists());

    // a second launch after completion is a no-op
    launch_with(&config, "weights.bin").unwrap();
    assert_eq!(
        stub.calls(),
        vec![format!("{}/weights.bin weights.bin", BASE_URL)]
    );
}

#[test]
fn handle_for_another_target_is_rejected() {
    let stub = Stub::creating_target("0");
    let fetcher = stub.fetcher();

    let handle = fetcher.launch("a.bin").unwrap().unwrap();
    let err = fetcher.wait("b.bin", Some(handle)).unwrap_err();
    assert!(matches!(err, FetchError::HandleMismatch { .. }));
}

#[cfg(target_os = "linux")]
fn process_state(pid: u32) -> Option<String> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // "<pid> (<comm>) <state> ..."; comm may contain spaces
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.split_whitespace().next().map(str::to_string)
}

#[cfg(target_os = "linux")]
#[test]
fn dropped_handle_is_reaped() {
    let stub = Stub::creating_target("0");
    let handle = stub.fetcher().launch("weights.bin").unwrap().unwrap();
    let pid = handle.pid();
    drop(handle);

    let mut state = process_state(pid);
    for _ in 0..100 {
        if state.is_none() {
            break;
        }
        thread::sleep(Duration::from_millis(50));
        state = process_state(pid);
    }
    assert_eq!(state, None, "downloader {} was not reaped after drop", pid);
    assert!(stub.path("weights.bin").exists());
}
