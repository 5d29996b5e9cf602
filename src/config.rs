use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "SketchTracker";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Env var pointing at a JSON scoring config file.
pub const SCORING_CONFIG_ENV: &str = "SKETCH_TRACKER_SCORING_CONFIG";

/// Env var overriding the debug patch dump directory (any build).
pub const DUMP_DIR_ENV: &str = "SKETCH_TRACKER_DUMP_DIR";

/// Debug builds log and dump diagnostics by default.
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

/// Default `tracing` filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "sketch_tracker_lib=debug,warn"
    } else {
        "sketch_tracker_lib=info,warn"
    }
}

/// Get the application data directory.
/// ~/SketchTracker/ in release, ~/SketchTracker-dev/ in debug builds.
/// `None` when the home directory cannot be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let name = if is_dev() {
        format!("{APP_NAME}-dev")
    } else {
        APP_NAME.to_string()
    };
    Some(home.join(name))
}

/// Path of the scoring config file, if one is configured.
pub fn scoring_config_path() -> Option<PathBuf> {
    std::env::var_os(SCORING_CONFIG_ENV).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let Some(dir) = app_data_dir() else {
            return;
        };
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("SketchTracker"));
    }

    #[test]
    fn app_name_is_sketch_tracker() {
        assert_eq!(APP_NAME, "SketchTracker");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn log_filter_targets_this_crate() {
        assert!(default_log_filter().starts_with("sketch_tracker_lib="));
    }
}
