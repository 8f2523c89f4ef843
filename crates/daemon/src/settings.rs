//! Settings loading: config file, then `CONDUIT_*` environment, then the
//! legacy single-variable overrides.

use anyhow::{Context, Result};
use conduit_core::config::{LogFormat, Settings};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "CONDUIT_CONFIG";
const CONFIG_FILE: &str = "conduit.toml";
const SQLITE_SCHEME: &str = "sqlite://";

/// Candidate config files, lowest precedence first
fn config_files(explicit: Option<String>) -> Vec<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return vec![(PathBuf::from(shellexpand::tilde(&path).into_owned()), true)];
    }
    let mut files = Vec::new();
    if let Some(dirs) = ProjectDirs::from("dev", "conduit", "conduit") {
        files.push((dirs.config_dir().join(CONFIG_FILE), false));
    }
    files.push((PathBuf::from(CONFIG_FILE), false));
    files
}

pub fn load() -> Result<Settings> {
    let mut builder = Config::builder();
    for (path, required) in config_files(std::env::var(CONFIG_ENV).ok()) {
        builder = builder.add_source(File::from(path).required(required));
    }

    let mut settings: Settings = builder
        .add_source(
            Environment::with_prefix("CONDUIT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("invalid configuration")?;

    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    expand_paths(&mut settings);
    Ok(settings)
}

/// Single-variable overrides kept for existing deployments
pub fn apply_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(key) = var("CONDUIT_SECRET_KEY") {
        settings.secret_key = key;
    }
    if let Some(dir) = var("PERSISTENT_DIR").filter(|d| !d.is_empty()) {
        settings.runner.persistent_dir = Some(dir);
    }
    if let Some(path) = var("CONDUIT_DB_PATH").filter(|p| !p.is_empty()) {
        settings.database_url = format!("{}{}", SQLITE_SCHEME, path);
    }
    match var("CONDUIT_LOG_FORMAT").as_deref() {
        Some("json") => settings.log.format = LogFormat::Json,
        Some("pretty") => settings.log.format = LogFormat::Pretty,
        _ => {}
    }
}

fn tilde(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

pub fn expand_paths(settings: &mut Settings) {
    if let Some(rest) = settings.database_url.strip_prefix(SQLITE_SCHEME) {
        settings.database_url = format!("{}{}", SQLITE_SCHEME, tilde(rest));
    }
    settings.runner.config_dir = tilde(&settings.runner.config_dir);
    settings.runner.persistent_dir = settings.runner.persistent_dir.as_deref().map(tilde);
    settings.log.dir = settings.log.dir.as_deref().map(tilde);
}

/// Filesystem path of a `sqlite://` url, if it names a file
pub fn sqlite_file(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix(SQLITE_SCHEME)?;
    let path = rest.split('?').next()?;
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(Path::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("CONDUIT_SECRET_KEY", "s3cret"),
                ("PERSISTENT_DIR", "/srv/conduit"),
                ("CONDUIT_DB_PATH", "/var/lib/conduit.db"),
                ("CONDUIT_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.secret_key, "s3cret");
        assert_eq!(settings.runner.persistent_dir.as_deref(), Some("/srv/conduit"));
        assert_eq!(settings.database_url, "sqlite:///var/lib/conduit.db");
        assert_eq!(settings.log.format, LogFormat::Json);
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, vars(&[("PERSISTENT_DIR", "")]));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_expand_paths() {
        let mut settings = Settings::default();
        expand_paths(&mut settings);
        assert!(!settings.database_url.contains('~'));
        assert!(settings.database_url.starts_with(SQLITE_SCHEME));
    }

    #[test]
    fn test_sqlite_file() {
        assert_eq!(
            sqlite_file("sqlite:///tmp/c.db?mode=rwc"),
            Some(Path::new("/tmp/c.db"))
        );
        assert_eq!(sqlite_file("sqlite::memory:"), None);
        assert_eq!(sqlite_file("sqlite://:memory:"), None);
    }

    #[test]
    fn test_explicit_config_file_is_required() {
        let files = config_files(Some("/etc/conduit.toml".to_string()));
        assert_eq!(files, vec![(PathBuf::from("/etc/conduit.toml"), true)]);
    }

    #[test]
    fn test_file_source_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conduit.toml");
        std::fs::write(
            &path,
            "secret_key = \"from-file\"\n[rpc]\nport = 7000\n[engine]\nschedule_tick_secs = 5\n",
        )
        .unwrap();

        let settings: Settings = Config::builder()
            .add_source(File::from(path))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.secret_key, "from-file");
        assert_eq!(settings.rpc.port, 7000);
        assert_eq!(settings.engine.schedule_tick_secs, 5);
        assert_eq!(settings.rpc.host, "127.0.0.1");
    }
}
