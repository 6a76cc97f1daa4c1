use crate::api::TextModel;
use crate::config::AppConfig;
use crate::normalize::normalize;
use crate::output::{derive_basename, write_outputs, WrittenFiles};
use crate::prompt::build_prompt;
use crate::types::{Brief, SongPackage};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub model: String,
    pub output_dir: PathBuf,
    pub basename: Option<String>,
    pub overwrite: bool,
    pub timestamp_names: bool,
}

impl GenerationConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            model: config.model().to_string(),
            output_dir: config.output_dir().to_path_buf(),
            basename: None,
            overwrite: false,
            timestamp_names: true,
        }
    }

    pub fn for_form(config: &AppConfig) -> Self {
        Self { overwrite: true, ..Self::from_app(config) }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub package: SongPackage,
    pub files: WrittenFiles,
}

pub async fn generate_package(
    model: &dyn TextModel,
    config: &GenerationConfig,
    brief: &Brief,
) -> Result<SongPackage> {
    let prompt = build_prompt(brief);
    info!(provider = model.name(), model = %config.model, "requesting song package");

    let raw = model
        .complete(&prompt, &config.model)
        .await
        .with_context(|| format!("{} request failed", model.name()))?;
    info!(response_chars = raw.len(), "model responded");

    let package = normalize(&raw, brief).context("could not read the model response")?;
    info!(title = %package.title, sections = package.lyrics.len(), "normalized song package");
    Ok(package)
}

pub async fn run_generation(
    model: &dyn TextModel,
    config: &GenerationConfig,
    brief: &Brief,
) -> Result<GenerationOutcome> {
    let package = generate_package(model, config, brief).await?;

    let base = derive_basename(&package, config.basename.as_deref(), config.timestamp_names);
    let dir = config.output_dir.clone();
    let overwrite = config.overwrite;
    let to_write = package.clone();
    let files = tokio::task::spawn_blocking(move || write_outputs(&to_write, &dir, &base, overwrite))
        .await
        .context("output writer task panicked")??;

    Ok(GenerationOutcome { package, files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ModelError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedModel {
        reply: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedModel {
        fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), prompts: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { reply: Err(()), prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl TextModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, prompt: &str, _model: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|_| ModelError::EmptyResponse)
        }
    }

    fn config(dir: &std::path::Path) -> GenerationConfig {
        GenerationConfig {
            model: "test-model".into(),
            output_dir: dir.to_path_buf(),
            basename: None,
            overwrite: false,
            timestamp_names: false,
        }
    }

    const REPLY: &str = r#"Sure! Here it is:
{"title": "Paper Boats", "meta": {"genre": "indie folk"},
 "lyrics": {"verse_1": "fold the map", "chorus": "float away"},
 "musical_ideas": {"chord_progression": "G | Em | C | D"}}
Enjoy."#;

    #[tokio::test]
    async fn generates_and_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let model = CannedModel::replying(REPLY);
        let brief = Brief { topic: Some("moving away".into()), tempo: Some(84), ..Brief::default() };

        let outcome = run_generation(&model, &config(dir.path()), &brief).await.unwrap();

        assert_eq!(outcome.package.title, "Paper Boats");
        assert_eq!(outcome.package.meta.genre, "indie folk");
        assert_eq!(outcome.package.meta.topic, "moving away");
        assert_eq!(outcome.package.meta.tempo_bpm, 84);
        assert_eq!(outcome.files.json, dir.path().join("Paper_Boats.json"));
        assert!(outcome.files.markdown.exists());

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- Topic: moving away"));
    }

    #[tokio::test]
    async fn unreadable_reply_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let model = CannedModel::replying("I cannot help with that.");

        let err = run_generation(&model, &config(dir.path()), &Brief::default()).await.unwrap_err();

        assert!(format!("{err:#}").contains("not valid JSON"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn model_failure_is_reported_with_provider_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_generation(&CannedModel::failing(), &config(dir.path()), &Brief::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("canned request failed"));
    }

    #[tokio::test]
    async fn existing_files_block_a_second_run_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let model = CannedModel::replying(REPLY);
        let cfg = GenerationConfig { basename: Some("take".into()), ..config(dir.path()) };

        run_generation(&model, &cfg, &Brief::default()).await.unwrap();
        let err = run_generation(&model, &cfg, &Brief::default()).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let forced = GenerationConfig { overwrite: true, ..cfg };
        let outcome = run_generation(&model, &forced, &Brief::default()).await.unwrap();
        assert_eq!(outcome.files.base, "take");
    }

    #[test]
    fn form_config_overwrites_with_timestamped_names() {
        let app = AppConfig::default();
        let form = GenerationConfig::for_form(&app);
        assert!(form.overwrite && form.timestamp_names);
        assert_eq!(form.model, app.model());
        assert!(!GenerationConfig::from_app(&app).overwrite);
    }
}
