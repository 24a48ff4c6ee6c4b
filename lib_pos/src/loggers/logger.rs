use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Maps a level name to a filter. `None` for unknown names.
pub fn parse_level(name: &str) -> Option<log::LevelFilter> {
    match name.trim().to_lowercase().as_str() {
        "off" => Some(log::LevelFilter::Off),
        "error" => Some(log::LevelFilter::Error),
        "warn" | "warning" => Some(log::LevelFilter::Warn),
        "info" => Some(log::LevelFilter::Info),
        "debug" => Some(log::LevelFilter::Debug),
        "trace" => Some(log::LevelFilter::Trace),
        _ => None,
    }
}

/// Installs the global logger: stdout plus `<log_dir>/<app_name>_<timestamp>.log`.
///
/// Older `.log` files in `log_dir` are pruned first so only the previous run's
/// file survives next to the new one. Returns the path of the new log file.
pub fn setup_logging(log_dir: &Path, log_level: &str, app_name: &str) -> Result<PathBuf> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir).with_context(|| format!("creating log dir {}", log_dir.display()))?;
    }

    cleanup_old_logs(log_dir)?;

    let log_file_name = format!("{}_{}.log", app_name, chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let log_path = log_dir.join(log_file_name);

    let level = parse_level(log_level).unwrap_or(log::LevelFilter::Info);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        // the HTTP stack is chatty below warn
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .chain(fern::log_file(&log_path)?)
        .apply()
        .context("a global logger is already installed")?;

    Ok(log_path)
}

/// Deletes all `.log` files in `log_dir` except the newest one.
pub fn cleanup_old_logs(log_dir: &Path) -> Result<usize> {
    let mut entries: Vec<(PathBuf, SystemTime)> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .map(|e| {
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (e.path(), modified)
        })
        .collect();

    // Sort by modification time, newest first
    entries.sort_by_key(|(_, modified)| std::cmp::Reverse(*modified));

    let mut removed = 0;
    for (path, _) in entries.iter().skip(1) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
        }
    }

    Ok(removed)
}
