//! Shared embedded cluster access with process-exit shutdown.
//!
//! `pg-embed-setup-unpriv` leaks the shared cluster guard so PostgreSQL lives
//! as long as the test binary. Under `nextest` every binary is its own
//! process, and a postmaster left running blocks the next binary from
//! starting on the same data directory. An `atexit` hook stops it.

#[cfg(unix)]
use std::ffi::CString;
#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;
#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::sync::OnceLock;
#[cfg(unix)]
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

#[cfg(unix)]
use color_eyre::eyre::eyre;
#[cfg(unix)]
use pg_embedded_setup_unpriv::BootstrapError;
use pg_embedded_setup_unpriv::{BootstrapResult, ClusterHandle};

const SHARED_CLUSTER_RETRIES: usize = 5;
const SHARED_CLUSTER_RETRY_DELAY: Duration = Duration::from_millis(500);
const STABLE_PASSWORD: &str = "speaker_requests_embedded_test";
#[cfg(unix)]
const SHARED_CLUSTER_LOCK_FILE: &str = "speaker-requests-pg-embedded.lock";
#[cfg(unix)]
const SHUTDOWN_POLLS: usize = 50;
#[cfg(unix)]
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(unix)]
static POSTMASTER_PID: AtomicI32 = AtomicI32::new(0);
#[cfg(unix)]
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
#[cfg(unix)]
static PROCESS_LOCK_FD: OnceLock<i32> = OnceLock::new();

/// Serialise cluster bootstrap across test binaries with an `flock`.
#[cfg(unix)]
fn acquire_process_lock() -> BootstrapResult<()> {
    if PROCESS_LOCK_FD.get().is_some() {
        return Ok(());
    }

    let lock_path = std::env::temp_dir().join(SHARED_CLUSTER_LOCK_FILE);
    let path = CString::new(lock_path.as_os_str().as_bytes()).map_err(|error| {
        BootstrapError::from(eyre!("encode lock path '{}': {error}", lock_path.display()))
    })?;

    // SAFETY: `path` is NUL-terminated and outlives the call.
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o600) };
    if fd < 0 {
        let error = std::io::Error::last_os_error();
        return Err(BootstrapError::from(eyre!(
            "open lock file '{}': {error}",
            lock_path.display()
        )));
    }

    // SAFETY: `fd` was returned by `open` above.
    if unsafe { libc::flock(fd, libc::LOCK_EX) } != 0 {
        let error = std::io::Error::last_os_error();
        // SAFETY: `fd` is valid and unused elsewhere.
        unsafe { libc::close(fd) };
        return Err(BootstrapError::from(eyre!(
            "lock '{}': {error}",
            lock_path.display()
        )));
    }

    if PROCESS_LOCK_FD.set(fd).is_err() {
        // SAFETY: another caller stored its descriptor; ours is unused.
        unsafe { libc::close(fd) };
    }
    Ok(())
}

/// Shared cluster handle, retried on transient bootstrap failures.
///
/// The first successful call registers an exit hook that stops the
/// postmaster.
pub fn shared_cluster_handle() -> BootstrapResult<&'static ClusterHandle> {
    ensure_stable_password();
    #[cfg(unix)]
    acquire_process_lock()?;
    let mut attempt = 1;
    loop {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => {
                #[cfg(unix)]
                register_exit_hook(handle);
                return Ok(handle);
            }
            Err(error) if attempt >= SHARED_CLUSTER_RETRIES => return Err(error),
            Err(_) => {
                std::thread::sleep(SHARED_CLUSTER_RETRY_DELAY);
                attempt += 1;
            }
        }
    }
}

/// Pin `PG_PASSWORD` so a reused data directory keeps accepting logins.
///
/// `initdb` only runs for a fresh data directory; the embedded settings
/// otherwise generate a new random password per process.
fn ensure_stable_password() {
    if std::env::var_os("PG_PASSWORD").is_none() {
        // SAFETY: runs before the cluster library spawns threads.
        unsafe {
            std::env::set_var("PG_PASSWORD", STABLE_PASSWORD);
        }
    }
}

#[cfg(unix)]
fn read_postmaster_pid(data_dir: &Path) -> Option<i32> {
    let dir = cap_std::fs::Dir::open_ambient_dir(data_dir, cap_std::ambient_authority()).ok()?;
    let content = dir.read_to_string("postmaster.pid").ok()?;
    content.lines().next()?.trim().parse().ok()
}

/// SIGTERM the postmaster, escalating to SIGKILL after five seconds.
///
/// Only signals when `postmaster.pid` still names the recorded PID.
#[cfg(unix)]
extern "C" fn stop_postgres_on_exit() {
    let stored = POSTMASTER_PID.load(Ordering::Relaxed);
    if stored <= 0 {
        return;
    }
    let pid = match DATA_DIR.get().and_then(|dir| read_postmaster_pid(dir)) {
        Some(current) if current == stored => current,
        _ => return,
    };

    // SAFETY: `pid` matches the live `postmaster.pid`.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return;
    }
    for _ in 0..SHUTDOWN_POLLS {
        std::thread::sleep(SHUTDOWN_POLL_INTERVAL);
        // SAFETY: signal 0 only probes for existence.
        if unsafe { libc::kill(pid, 0) } != 0 {
            return;
        }
    }
    // SAFETY: graceful shutdown budget exhausted.
    unsafe {
        libc::kill(pid, libc::SIGKILL);
    }
}

#[cfg(unix)]
fn register_exit_hook(handle: &ClusterHandle) {
    let data_dir = &handle.settings().data_dir;
    let Some(pid) = read_postmaster_pid(data_dir) else {
        return;
    };
    if POSTMASTER_PID
        .compare_exchange(0, pid, Ordering::Relaxed, Ordering::Relaxed)
        .is_err()
    {
        return;
    }
    let _ = DATA_DIR.set(data_dir.clone());

    // SAFETY: `stop_postgres_on_exit` has no preconditions beyond the PID
    // stored above.
    let rc = unsafe { libc::atexit(stop_postgres_on_exit) };
    if rc != 0 {
        eprintln!("pg-embed: atexit registration failed (rc={rc}); PID {pid} may outlive the tests");
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    #[cfg(unix)]
    #[rstest]
    #[case::well_formed("4242\n/data\n5432\n", Some(4242))]
    #[case::garbage("postmaster\n", None)]
    fn postmaster_pid_is_read_from_first_line(#[case] content: &str, #[case] expected: Option<i32>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = cap_std::fs::Dir::open_ambient_dir(dir.path(), cap_std::ambient_authority())
            .expect("open dir");
        handle.write("postmaster.pid", content).expect("write pid file");

        assert_eq!(super::read_postmaster_pid(dir.path()), expected);
    }

    #[cfg(unix)]
    #[rstest]
    fn missing_pid_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(super::read_postmaster_pid(dir.path()), None);
    }

    #[rstest]
    fn explicit_password_is_left_alone() {
        let _guard = env_lock::lock_env([("PG_PASSWORD", Some("operator_choice"))]);
        super::ensure_stable_password();
        assert_eq!(
            std::env::var("PG_PASSWORD").expect("PG_PASSWORD set"),
            "operator_choice"
        );
    }
}
