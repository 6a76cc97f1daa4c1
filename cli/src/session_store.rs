use crate::config::AppConfig;
use crate::session::FormSnapshot;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "form.json";

pub fn snapshot_path() -> Result<PathBuf> {
    Ok(AppConfig::project_dirs()?.config_dir().join(SNAPSHOT_FILE))
}

pub fn load_snapshot() -> Result<Option<FormSnapshot>> {
    load_snapshot_from(&snapshot_path()?)
}

pub fn save_snapshot(snapshot: &FormSnapshot) -> Result<()> {
    save_snapshot_to(&snapshot_path()?, snapshot)
}

fn load_snapshot_from(path: &Path) -> Result<Option<FormSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read form snapshot at {}", path.display()))?;
    let snapshot = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse form snapshot {}", path.display()))?;
    Ok(Some(snapshot))
}

fn save_snapshot_to(path: &Path, snapshot: &FormSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(snapshot).context("failed to encode form snapshot")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write form snapshot to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Brief;

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SNAPSHOT_FILE);
        assert!(load_snapshot_from(&path).unwrap().is_none());

        let snapshot = FormSnapshot {
            brief: Brief {
                genre: Some("bossa nova".into()),
                tempo: Some(110),
                ..Brief::default()
            },
        };
        save_snapshot_to(&path, &snapshot).unwrap();

        assert_eq!(load_snapshot_from(&path).unwrap(), Some(snapshot));
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        fs::write(&path, "{ not json").unwrap();
        let err = load_snapshot_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse form snapshot"));
    }
}
