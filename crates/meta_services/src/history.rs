//! Line history, one entry per line, loaded at start and rewritten at exit.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write history to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How `save` treats the file already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persistence {
    /// `entries` holds everything on disk; the file is rewritten.
    Rewrite,
    /// The file could not be read; only new entries are appended to it.
    AppendOnly { saved: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    path: PathBuf,
    entries: Vec<String>,
    persistence: Persistence,
}

impl History {
    /// An empty history that will be written to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            persistence: Persistence::Rewrite,
        }
    }

    /// Like `load`, but an unreadable file is kept as it is: the session starts
    /// empty and `save` appends to the file instead of replacing it.
    pub fn load_or_preserve(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(%err, "history unreadable; new lines will be appended to it");
                Self {
                    path,
                    entries: Vec::new(),
                    persistence: Persistence::AppendOnly { saved: 0 },
                }
            }
        }
    }

    /// Read `path` if it exists; a missing file is an empty history.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::empty(path)),
            Err(source) => return Err(HistoryError::Read { path, source }),
        };

        let entries = text.lines().map(str::to_string).collect::<Vec<_>>();
        tracing::debug!(path = %path.display(), entries = entries.len(), "loaded history");
        Ok(Self {
            path,
            entries,
            persistence: Persistence::Rewrite,
        })
    }

    pub fn add(&mut self, line: &str) {
        self.entries.push(line.to_string());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the history. A file that loaded cleanly is rewritten with every
    /// entry, oldest first; an unreadable one only gains the unsaved entries.
    pub fn save(&mut self) -> Result<(), HistoryError> {
        let result = match self.persistence {
            Persistence::Rewrite => self.rewrite(),
            Persistence::AppendOnly { saved } => self.append(&self.entries[saved..]),
        };
        result.map_err(|source| HistoryError::Write {
            path: self.path.clone(),
            source,
        })?;

        if let Persistence::AppendOnly { saved } = &mut self.persistence {
            *saved = self.entries.len();
        }
        Ok(())
    }

    fn rewrite(&self) -> io::Result<()> {
        let mut file = io::BufWriter::new(fs::File::create(&self.path)?);
        for entry in &self.entries {
            writeln!(file, "{entry}")?;
        }
        file.flush()
    }

    fn append(&self, entries: &[String]) -> io::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut file = fs::OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        // Keep the first new entry off the end of an unterminated last line.
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        let mut out = io::BufWriter::new(file);
        for entry in entries {
            writeln!(out, "{entry}")?;
        }
        out.flush()
    }
}

/// `.<exe stem><suffix>` next to the executable.
pub fn history_path_for(exe: &Path, suffix: &str) -> PathBuf {
    crate::sibling_of_executable(exe, suffix)
}
