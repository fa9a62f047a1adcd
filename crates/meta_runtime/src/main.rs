//! PHP meta-SAPI
//!
//! Interactive host that embeds `libphp` and runs one request per input line

use anyhow::{bail, Context, Result};
use meta_ffi::PhpLibrary;
use meta_repl::{EditorSource, Repl, Termination};
use meta_sapi::Lifecycle;
use meta_services::{history_path_for, settings_path_for, History, Settings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the runtime's output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("PHP meta-SAPI v{}", meta_sapi::VERSION);

    let exe = std::env::current_exe().context("cannot determine the executable's location")?;
    let settings = Settings::load(&settings_path_for(&exe))?;

    let library_path = resolve_library(&settings)?;
    // SAFETY: the path names the runtime's own embed library; its exports are
    // the ones `PhpApi` declares.
    let library = unsafe { PhpLibrary::open(&library_path) }
        .context("cannot bind the PHP runtime")?;

    let mut lifecycle = Lifecycle::new(library, settings.host_config())?;
    lifecycle.startup().context("PHP global startup failed")?;

    let history_path = history_path_for(&exe, &settings.history_suffix);
    let mut history = History::load_or_preserve(&history_path);

    let source = EditorSource::new(history.entries()).context("cannot start the line editor")?;
    let termination =
        Repl::new(&mut lifecycle, source, &mut history, settings.prompt.as_str()).run()?;
    tracing::debug!(?termination, "input loop finished");

    if let Err(err) = history.save() {
        tracing::warn!(%err, "history not saved");
    }
    lifecycle.shutdown()?;

    if let Termination::ReadFailed(reason) = termination {
        bail!("reading input failed: {reason}");
    }
    Ok(())
}

fn resolve_library(settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = &settings.library_path {
        return Ok(path.clone());
    }
    meta_env::locate_library(&settings.php_config).context("cannot locate the PHP runtime library")
}
