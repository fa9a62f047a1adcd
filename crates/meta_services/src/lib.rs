//! Meta-SAPI Services Layer
//!
//! Host-side state that lives outside the runtime: settings and line history,
//! both stored next to the executable.

pub mod history;
pub mod settings;

pub use history::{history_path_for, History, HistoryError};
pub use settings::{settings_path_for, IniSettings, Settings, SettingsError};

use std::path::{Path, PathBuf};

/// `<dir of exe>/.<exe stem><suffix>`
pub(crate) fn sibling_of_executable(exe: &Path, suffix: &str) -> PathBuf {
    let stem = exe
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "php-meta-sapi".to_string());
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!(".{stem}{suffix}"))
}
