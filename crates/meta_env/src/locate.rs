// locate.rs
//! Finds `libphp` by running `php-config --prefix` and joining the platform
//! library name onto `<prefix>/lib`.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("failed to run `{command} --prefix`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command} --prefix` failed with {status}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
    },

    #[error("`{command} --prefix` printed no install prefix")]
    EmptyOutput { command: String },
}

/// Ask `command --prefix` for the runtime's install prefix.
pub fn query_prefix(command: &str) -> Result<PathBuf, LocateError> {
    let output = Command::new(command)
        .arg("--prefix")
        .output()
        .map_err(|source| LocateError::Spawn {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(LocateError::Failed {
            command: command.to_string(),
            status: output.status,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_prefix(&stdout).ok_or_else(|| LocateError::EmptyOutput {
        command: command.to_string(),
    })
}

/// Resolve the shared library path through `command`.
pub fn locate_library(command: &str) -> Result<PathBuf, LocateError> {
    let prefix = query_prefix(command)?;
    let path = library_path_for_prefix(&prefix);
    tracing::debug!(
        prefix = %prefix.display(),
        library = %path.display(),
        "located runtime library"
    );
    Ok(path)
}

pub fn library_path_for_prefix(prefix: &Path) -> PathBuf {
    prefix.join("lib").join(LIBRARY_FILE_NAME)
}

// Only the first line counts, the way a shell `$(php-config --prefix)` would see it.
fn parse_prefix(stdout: &str) -> Option<PathBuf> {
    let first = stdout.lines().next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(PathBuf::from(first))
    }
}

/* --------------------- macOS / iOS (Darwin) --------------------- */

#[cfg(any(target_os = "macos", target_os = "ios"))]
const LIBRARY_FILE_NAME: &str = "libphp.dylib";

/* --------------------- Linux / other Unix --------------------- */

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const LIBRARY_FILE_NAME: &str = "libphp.so";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_is_the_prefix() {
        assert_eq!(
            parse_prefix("/usr/local\n/ignored\n"),
            Some(PathBuf::from("/usr/local"))
        );
        assert_eq!(parse_prefix("  /opt/php \n"), Some(PathBuf::from("/opt/php")));
    }

    #[test]
    fn blank_output_has_no_prefix() {
        assert_eq!(parse_prefix(""), None);
        assert_eq!(parse_prefix("\n"), None);
        assert_eq!(parse_prefix("   \nfoo"), None);
    }

    #[test]
    fn library_lives_under_lib() {
        let path = library_path_for_prefix(Path::new("/usr/local"));
        assert_eq!(path.parent(), Some(Path::new("/usr/local/lib")));
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some(LIBRARY_FILE_NAME)
        );
    }

    #[test]
    fn missing_command_is_a_spawn_error() {
        let err = query_prefix("php-config-that-does-not-exist-anywhere").unwrap_err();
        assert!(matches!(err, LocateError::Spawn { .. }));
    }
}
