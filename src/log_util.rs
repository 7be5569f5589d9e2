use color_eyre::eyre::{Context, Result, eyre};
use std::{
    env,
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::EnvFilter;

const LOG_FILENAME: &str = "exercise-runner-debug.log";
const OUTPUT_DIR: &str = "output";
const LOG_FILTER_ENV: &str = "EXERCISE_RUNNER_LOG";
const DEFAULT_FILTER: &str = "exercise_runner=debug";

/// Send tracing output to `output/exercise-runner-debug.log` so log lines never
/// draw over the terminal UI. Returns the log file path.
pub fn init() -> Result<PathBuf> {
    let path = resolve_log_path(Path::new(OUTPUT_DIR))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .wrap_err_with(|| format!("failed to open debug log at {}", path.display()))?;

    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| eyre!("failed to install tracing subscriber: {}", err))?;

    Ok(path)
}

/// Resolve `root/LOG_FILENAME` against the working directory, creating `root`.
pub(crate) fn resolve_log_path(root: &Path) -> Result<PathBuf> {
    let mut dir = if root.is_absolute() {
        root.to_path_buf()
    } else {
        env::current_dir()
            .wrap_err("failed to resolve current directory")?
            .join(root)
    };
    fs::create_dir_all(&dir)
        .wrap_err_with(|| format!("failed to create log directory {}", dir.display()))?;
    dir.push(LOG_FILENAME);
    Ok(dir)
}
