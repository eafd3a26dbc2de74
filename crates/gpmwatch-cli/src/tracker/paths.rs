//! Device and shared-memory path resolution.
//!
//! Priority for the shared-memory directory:
//! 1. `GPMWATCH_SHM_DIR` (explicit override)
//! 2. `/dev/shm` (where `shm_open` objects live on Linux)
//!
//! The object name is the one passed with `--shm`, or `gpm-track.{pid}`
//! derived from the producer's process id, matching the producer's own
//! default.

use std::env;
use std::path::{Path, PathBuf};

/// Environment override for the shared-memory directory.
pub const SHM_DIR_ENV: &str = "GPMWATCH_SHM_DIR";

/// Directory backing POSIX shared-memory objects.
pub const DEFAULT_SHM_DIR: &str = "/dev/shm";

/// Longest single path component (`NAME_MAX`).
pub const MAX_SHM_NAME_LEN: usize = 255;

/// Get the shared-memory directory, ignoring an empty override.
pub fn get_shm_dir() -> PathBuf {
    if let Ok(dir) = env::var(SHM_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    PathBuf::from(DEFAULT_SHM_DIR)
}

/// Resolve a terminal argument to a device path.
///
/// Names are relative to `/dev` (`tty3`, `pts/4`); an absolute path is
/// used as is.
pub fn tty_path(tty: &str) -> PathBuf {
    let path = Path::new(tty);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new("/dev").join(path)
    }
}

/// Name the producer picks when none is passed.
pub fn default_shm_name(producer_pid: u32) -> String {
    format!("gpm-track.{}", producer_pid)
}

/// Check a shared-memory name is a single, safe path component.
///
/// Names must:
/// - Be non-empty and at most [`MAX_SHM_NAME_LEN`] bytes
/// - Contain only alphanumeric characters, hyphens, underscores and dots
/// - Not start with a hyphen (option) or a dot (`.`, `..`, hidden files)
pub fn is_valid_shm_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_SHM_NAME_LEN
        && !name.starts_with('-')
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Whether the producer has created its channel.
///
/// A zero-length file is not ready yet: the producer sizes it right after
/// creating it, and mapping an empty file faults on first read.
pub fn is_channel_ready(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // Env var manipulation is process-wide, so tests touching it run serially.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
        _lock: std::sync::MutexGuard<'static, ()>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), std::env::var(name).ok()))
                .collect();
            Self { vars, _lock: lock }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => std::env::set_var(name, v),
                    None => std::env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_get_shm_dir_default() {
        let _guard = EnvGuard::new(&[SHM_DIR_ENV]);
        std::env::remove_var(SHM_DIR_ENV);

        assert_eq!(get_shm_dir(), PathBuf::from("/dev/shm"));
    }

    #[test]
    fn test_get_shm_dir_override() {
        let _guard = EnvGuard::new(&[SHM_DIR_ENV]);
        std::env::set_var(SHM_DIR_ENV, "/tmp/shm-test");

        assert_eq!(get_shm_dir(), PathBuf::from("/tmp/shm-test"));
    }

    #[test]
    fn test_get_shm_dir_ignores_empty() {
        let _guard = EnvGuard::new(&[SHM_DIR_ENV]);
        std::env::set_var(SHM_DIR_ENV, "");

        assert_eq!(get_shm_dir(), PathBuf::from("/dev/shm"));
    }

    #[test]
    fn test_tty_path() {
        assert_eq!(tty_path("tty3"), PathBuf::from("/dev/tty3"));
        assert_eq!(tty_path("/dev/null"), PathBuf::from("/dev/null"));
        assert_eq!(tty_path("pts/4"), PathBuf::from("/dev/pts/4"));
        assert_eq!(tty_path("/dev/pts/4"), PathBuf::from("/dev/pts/4"));
    }

    #[test]
    fn test_default_shm_name() {
        assert_eq!(default_shm_name(26629), "gpm-track.26629");
        assert!(is_valid_shm_name(&default_shm_name(u32::MAX)));
    }

    #[test]
    fn test_valid_shm_names() {
        assert!(is_valid_shm_name("gpm-test"));
        assert!(is_valid_shm_name("gpm_track.1"));
        assert!(is_valid_shm_name("A1"));
    }

    #[test]
    fn test_invalid_shm_names() {
        assert!(!is_valid_shm_name(""));
        assert!(!is_valid_shm_name(".."));
        assert!(!is_valid_shm_name(".hidden"));
        assert!(!is_valid_shm_name("-rf"));
        assert!(!is_valid_shm_name("../../etc/passwd"));
        assert!(!is_valid_shm_name("a/b"));
        assert!(!is_valid_shm_name("name with space"));
        assert!(!is_valid_shm_name("nul\0byte"));
        assert!(!is_valid_shm_name(&"x".repeat(MAX_SHM_NAME_LEN + 1)));
    }

    #[test]
    fn test_channel_ready_requires_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpm-track.1");

        assert!(!is_channel_ready(&path), "missing file is not ready");

        std::fs::File::create(&path).unwrap();
        assert!(!is_channel_ready(&path), "empty file is not ready");

        std::fs::write(&path, b"00001 00002\n").unwrap();
        assert!(is_channel_ready(&path));

        assert!(!is_channel_ready(dir.path()), "a directory is not a channel");
    }
}
