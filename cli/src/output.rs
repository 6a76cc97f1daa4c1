use crate::markdown::to_markdown;
use crate::types::SongPackage;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

const UNTITLED_BASENAME: &str = "untitled";

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:"*?<>|]+"#).expect("filename regex is valid"));

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("{} already exists; use --force to overwrite", path.display())]
    PathConflict { path: PathBuf },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode song package: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub base: String,
    pub json: PathBuf,
    pub markdown: PathBuf,
}

impl WrittenFiles {
    pub fn sibling(&self, extension: &str) -> PathBuf {
        self.json.with_extension(extension)
    }
}

/// Local time formatted as `YYYY-MM-DD_HHMMSS`.
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d_%H%M%S").to_string()
}

pub fn clean_filename(name: &str) -> String {
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(name, "_");
    let cleaned = replaced.trim().replace(' ', "_");
    if cleaned.is_empty() {
        UNTITLED_BASENAME.to_string()
    } else {
        cleaned
    }
}

pub fn derive_basename(
    package: &SongPackage,
    override_name: Option<&str>,
    with_timestamp: bool,
) -> String {
    if let Some(name) = override_name.map(str::trim).filter(|name| !name.is_empty()) {
        return name.to_string();
    }
    let title = clean_filename(&package.title);
    if with_timestamp {
        format!("{title}_{}", timestamp())
    } else {
        title
    }
}

pub fn write_outputs(
    package: &SongPackage,
    dir: &Path,
    base: &str,
    overwrite: bool,
) -> Result<WrittenFiles, OutputError> {
    let json_path = dir.join(format!("{base}.json"));
    let md_path = dir.join(format!("{base}.md"));

    if !overwrite {
        for path in [&json_path, &md_path] {
            if path.exists() {
                return Err(OutputError::PathConflict { path: path.clone() });
            }
        }
    }

    let json = serde_json::to_string_pretty(package)?;
    let markdown = to_markdown(package);

    write_new_file(&json_path, json.as_bytes(), overwrite)?;
    write_new_file(&md_path, markdown.as_bytes(), overwrite)?;

    info!(json = %json_path.display(), markdown = %md_path.display(), "saved song package");
    Ok(WrittenFiles { base: base.to_string(), json: json_path, markdown: md_path })
}

pub fn write_new_file(path: &Path, bytes: &[u8], overwrite: bool) -> Result<(), OutputError> {
    if path.exists() && !overwrite {
        return Err(OutputError::PathConflict { path: path.to_path_buf() });
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|source| OutputError::Io { path: parent.to_path_buf(), source })?;
    }
    fs::write(path, bytes).map_err(|source| OutputError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(title: &str) -> SongPackage {
        SongPackage { title: title.into(), ..SongPackage::default() }
    }

    #[test]
    fn cleans_titles_for_file_names() {
        assert_eq!(clean_filename("  Rain / Shine: Part 2?  "), "Rain___Shine__Part_2_");
        assert_eq!(clean_filename("Café Nights"), "Café_Nights");
        assert_eq!(clean_filename("   "), "untitled");
    }

    #[test]
    fn basename_prefers_override_then_title() {
        let pkg = package("Harbor Lights");
        assert_eq!(derive_basename(&pkg, Some("demo"), true), "demo");
        assert_eq!(derive_basename(&pkg, Some("  "), false), "Harbor_Lights");
        let stamped = derive_basename(&pkg, None, true);
        assert!(stamped.starts_with("Harbor_Lights_"));
        // YYYY-MM-DD_HHMMSS
        let suffix = &stamped["Harbor_Lights_".len()..];
        assert_eq!(suffix.len(), 17);
        assert_eq!(&suffix[4..5], "-");
        assert_eq!(&suffix[10..11], "_");
    }

    #[test]
    fn writes_json_and_markdown_with_unicode_intact() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested").join("songs");
        let pkg = package("Canción de cuna");

        let files = write_outputs(&pkg, &out_dir, "cancion", false).unwrap();

        let json = fs::read_to_string(&files.json).unwrap();
        assert!(json.contains("\"title\": \"Canción de cuna\""));
        let markdown = fs::read_to_string(&files.markdown).unwrap();
        assert!(markdown.starts_with("# Canción de cuna\n"));
        assert_eq!(files.sibling("mid"), out_dir.join("cancion.mid"));
    }

    #[test]
    fn conflict_on_either_file_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let md_path = dir.path().join("song.md");
        fs::write(&md_path, "keep me").unwrap();

        let err = write_outputs(&package("Song"), dir.path(), "song", false).unwrap_err();

        assert!(matches!(err, OutputError::PathConflict { ref path } if *path == md_path));
        assert!(!dir.path().join("song.json").exists());
        assert_eq!(fs::read_to_string(&md_path).unwrap(), "keep me");
    }

    #[test]
    fn overwrite_replaces_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("song.json"), "old").unwrap();

        let files = write_outputs(&package("Song"), dir.path(), "song", true).unwrap();

        assert_ne!(fs::read_to_string(files.json).unwrap(), "old");
    }
}
