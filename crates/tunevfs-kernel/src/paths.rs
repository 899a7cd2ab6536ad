//! XDG Base Directory paths for tunevfs.
//!
//! | Purpose | XDG Variable | Default | tunevfs Path |
//! |---------|--------------|---------|--------------|
//! | Config | `$XDG_CONFIG_HOME` | `~/.config` | `$XDG_CONFIG_HOME/tunevfs/config.toml` |
//! | Catalog cache | `$XDG_CACHE_HOME` | `~/.cache` | `$XDG_CACHE_HOME/tunevfs/catalogs.db` |

use std::path::PathBuf;

use directories::BaseDirs;

const APP: &str = "tunevfs";

/// Uses `$XDG_CONFIG_HOME/tunevfs` or falls back to `~/.config/tunevfs`.
pub fn config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback().join(".config"))
        .join(APP)
}

/// Uses `$XDG_CACHE_HOME/tunevfs` or falls back to `~/.cache/tunevfs`.
pub fn cache_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.cache_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback().join(".cache"))
        .join(APP)
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default location of the catalog cache database.
pub fn catalog_db() -> PathBuf {
    cache_dir().join("catalogs.db")
}

fn home_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_under_tunevfs() {
        assert!(config_dir().ends_with(APP));
        assert!(cache_dir().ends_with(APP));
    }

    #[test]
    fn files_live_in_their_dirs() {
        assert!(config_file().starts_with(config_dir()));
        assert!(catalog_db().starts_with(cache_dir()));
        assert!(catalog_db().ends_with("catalogs.db"));
    }
}
