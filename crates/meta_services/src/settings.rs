//! Settings management

use meta_sapi::{HostConfig, DEFAULT_EVAL_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Host settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ini: IniSettings,
    pub prompt: String,
    /// Script name the runtime reports for inline code.
    pub eval_name: String,
    pub history_suffix: String,
    /// Configuration-query command used to find the runtime.
    pub php_config: String,
    /// Skips discovery when set.
    pub library_path: Option<PathBuf>,
}

/// Runtime options applied at global startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IniSettings {
    pub html_errors: bool,
    pub implicit_flush: bool,
    pub output_buffering: u32,
    pub max_execution_time: u32,
    pub max_input_time: i64,
    /// Raw `key=value` lines appended after the options above.
    pub extra: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ini: IniSettings::default(),
            prompt: "php_meta_sapi > ".to_string(),
            eval_name: DEFAULT_EVAL_NAME.to_string(),
            history_suffix: "-history".to_string(),
            php_config: "php-config".to_string(),
            library_path: None,
        }
    }
}

impl Default for IniSettings {
    fn default() -> Self {
        Self {
            html_errors: false,
            implicit_flush: true,
            output_buffering: 0,
            max_execution_time: 0,
            max_input_time: -1,
            extra: Vec::new(),
        }
    }
}

impl IniSettings {
    /// Newline-delimited `key=value` entries, each line terminated.
    pub fn render(&self) -> String {
        let mut out = format!(
            "html_errors={}\nimplicit_flush={}\noutput_buffering={}\n\
             max_execution_time={}\nmax_input_time={}\n",
            u8::from(self.html_errors),
            u8::from(self.implicit_flush),
            self.output_buffering,
            self.max_execution_time,
            self.max_input_time,
        );
        for entry in &self.extra {
            out.push_str(entry.trim_end_matches('\n'));
            out.push('\n');
        }
        out
    }
}

impl Settings {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            ini_entries: self.ini.render(),
            eval_name: self.eval_name.clone(),
        }
    }
}

/// `.<exe stem>-settings.json` next to the executable.
pub fn settings_path_for(exe: &Path) -> PathBuf {
    crate::sibling_of_executable(exe, "-settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use meta_sapi::DEFAULT_INI_ENTRIES;

    #[test]
    fn defaults_match_built_in_ini() {
        let settings = Settings::default();
        assert_eq!(settings.ini.render(), DEFAULT_INI_ENTRIES);
        assert_eq!(settings.host_config(), HostConfig::default());
    }

    #[test]
    fn extra_entries_follow_the_defaults() {
        let mut ini = IniSettings::default();
        ini.extra.push("display_errors=stderr".to_string());
        ini.extra.push("memory_limit=-1\n".to_string());
        assert_eq!(
            ini.render(),
            format!("{DEFAULT_INI_ENTRIES}display_errors=stderr\nmemory_limit=-1\n")
        );
    }

    #[test]
    fn partial_files_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "prompt": "php> ", "ini": { "html_errors": true } }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.prompt, "php> ");
        assert!(settings.ini.html_errors);
        assert!(settings.ini.implicit_flush);
        assert_eq!(settings.php_config, "php-config");
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn settings_file_sits_beside_the_executable() {
        assert_eq!(
            settings_path_for(Path::new("/opt/bin/php-meta-sapi")),
            PathBuf::from("/opt/bin/.php-meta-sapi-settings.json")
        );
    }
}
