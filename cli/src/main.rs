use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

mod api;
mod app;
mod chords;
mod config;
mod generate;
mod markdown;
mod midi;
mod normalize;
mod output;
mod prompt;
mod session;
mod session_store;
mod types;
mod ui;

use api::{OpenAiClient, TextModel};
use app::{AppCommand, AppEvent, AppState};
use config::AppConfig;
use generate::{run_generation, GenerationConfig};
use midi::{render_sketch, write_midi, ChordSketch};
use session::{FormSnapshot, GenerationSession};
use types::{Brief, SongPackage};

const LOG_FILE_NAME: &str = "songsmith.log";
const TIP: &str = "Tip: paste the chord progression into your DAW, and use the 'melodic_hint' as a guide for topline sketches.";

#[derive(Parser)]
#[command(name = "songsmith", version, about = "Write song drafts with a language model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a song package and save it as JSON and Markdown
    Generate(GenerateArgs),
    /// Print the prompt for a brief without calling the model
    Prompt(BriefArgs),
    /// Export a MIDI chord sketch from a saved song package
    Midi(MidiArgs),
    /// Open the interactive song form
    Form,
}

#[derive(Args, Debug, Default)]
struct BriefArgs {
    /// e.g. pop, folk, rock, r&b
    #[arg(long)]
    genre: Option<String>,
    /// e.g. melancholic, euphoric, bittersweet
    #[arg(long)]
    mood: Option<String>,
    /// Song topic or theme
    #[arg(long)]
    topic: Option<String>,
    /// Musical key, e.g. C, Gm, Eb
    #[arg(long)]
    key: Option<String>,
    /// BPM, e.g. 92
    #[arg(long)]
    tempo: Option<u32>,
    /// Lyrics language (defaults to the configured language)
    #[arg(long)]
    language: Option<String>,
    /// e.g. "verse, chorus, verse, chorus, bridge, chorus"
    #[arg(long)]
    structure: Option<String>,
    /// e.g. ABAB, AABB, or flexible
    #[arg(long)]
    rhyme: Option<String>,
    /// Target syllables per line or "flexible"
    #[arg(long)]
    syllables: Option<String>,
}

impl BriefArgs {
    fn into_brief(self, config: &AppConfig) -> Brief {
        Brief {
            genre: self.genre,
            mood: self.mood,
            topic: self.topic,
            key: self.key,
            tempo: self.tempo,
            language: self.language.or_else(|| Some(config.language().to_string())),
            structure: self.structure,
            rhyme: self.rhyme,
            syllables: self.syllables,
        }
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    brief: BriefArgs,
    /// Model name
    #[arg(long)]
    model: Option<String>,
    /// Output directory
    #[arg(long)]
    outdir: Option<PathBuf>,
    /// Base file name without extension
    #[arg(long)]
    basename: Option<String>,
    /// Overwrite outputs if they exist
    #[arg(long)]
    force: bool,
    /// Also write a MIDI sketch of the chord progression
    #[arg(long)]
    midi: bool,
}

#[derive(Args, Debug)]
struct MidiArgs {
    /// Song package JSON written by `songsmith generate`
    package: PathBuf,
    /// Output path (defaults to the package path with a .mid extension)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Tempo in BPM (defaults to the package tempo)
    #[arg(long)]
    tempo: Option<u32>,
    /// Overwrite the output if it exists
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command {
        Command::Generate(args) => {
            setup_tracing(None)?;
            run_generate(&config, args).await
        }
        Command::Prompt(args) => {
            setup_tracing(None)?;
            println!("{}", prompt::build_prompt(&args.into_brief(&config)));
            Ok(())
        }
        Command::Midi(args) => {
            setup_tracing(None)?;
            run_midi(&config, args).await
        }
        Command::Form => {
            setup_tracing(Some(open_log_file(config.output_dir())?))?;
            run_form(config).await
        }
    }
}

fn setup_tracing(log_file: Option<File>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact();
    let result = match log_file {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).try_init(),
        None => builder.with_writer(io::stderr).try_init(),
    };
    result.map_err(|err: Box<dyn std::error::Error + Send + Sync>| {
        anyhow!("failed to initialise tracing: {err}")
    })
}

fn open_log_file(dir: &Path) -> Result<File> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join(LOG_FILE_NAME);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn model_client(config: &AppConfig) -> Result<OpenAiClient> {
    OpenAiClient::new(
        Some(config.api_base()),
        config.api_key().map(str::to_string),
        config.request_timeout(),
    )
}

async fn run_generate(config: &AppConfig, args: GenerateArgs) -> Result<()> {
    let client = model_client(config)?;
    let mut generation = GenerationConfig::from_app(config);
    if let Some(model) = args.model {
        generation.model = model;
    }
    if let Some(dir) = args.outdir {
        generation.output_dir = dir;
    }
    generation.basename = args.basename;
    generation.overwrite = args.force;

    let brief = args.brief.into_brief(config);
    let outcome = run_generation(&client, &generation, &brief).await?;
    println!("Saved:\n- {}\n- {}", outcome.files.json.display(), outcome.files.markdown.display());

    if args.midi {
        let path = outcome.files.sibling("mid");
        let tempo = package_tempo(&outcome.package, None, config);
        match export_package_midi(&outcome.package, tempo, &path, args.force, config).await {
            Ok(sketch) => {
                println!("- {}", path.display());
                print_rejections(&sketch);
            }
            Err(err) => println!("MIDI sketch skipped: {err:#}"),
        }
    }

    println!("\n{TIP}");
    Ok(())
}

async fn run_midi(config: &AppConfig, args: MidiArgs) -> Result<()> {
    let data = fs::read_to_string(&args.package)
        .with_context(|| format!("failed to read {}", args.package.display()))?;
    let package: SongPackage = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a song package", args.package.display()))?;

    let path = args.out.unwrap_or_else(|| args.package.with_extension("mid"));
    let tempo = package_tempo(&package, args.tempo, config);
    let sketch = export_package_midi(&package, tempo, &path, args.force, config).await?;

    println!(
        "Saved {} ({} chords over {} beats at {tempo} BPM)",
        path.display(),
        sketch.placements.len(),
        sketch.total_beats
    );
    print_rejections(&sketch);
    Ok(())
}

/// An explicit tempo wins, then the package tempo, then the configured default.
fn package_tempo(package: &SongPackage, explicit: Option<u32>, config: &AppConfig) -> u32 {
    explicit
        .filter(|bpm| *bpm > 0)
        .or((package.meta.tempo_bpm > 0).then_some(package.meta.tempo_bpm))
        .unwrap_or(config.default_tempo_bpm())
}

async fn export_package_midi(
    package: &SongPackage,
    tempo_bpm: u32,
    path: &Path,
    overwrite: bool,
    config: &AppConfig,
) -> Result<ChordSketch> {
    let progression = &package.musical_ideas.chord_progression;
    if progression.trim().is_empty() {
        bail!("no chord progression found in this song");
    }
    let sketch = render_sketch(progression, config.beats_per_chord());
    if sketch.is_empty() {
        bail!("no valid chords found in the progression {progression:?}");
    }

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        write_midi(&sketch, tempo_bpm, &path, overwrite).map(|()| sketch)
    })
    .await
    .context("MIDI writer task panicked")?
}

fn print_rejections(sketch: &ChordSketch) {
    for rejection in &sketch.rejected {
        println!("  skipped {:?}: {}", rejection.raw, rejection.reason);
    }
}

async fn run_form(config: AppConfig) -> Result<()> {
    info!("starting songsmith form");
    let client = model_client(&config)?;
    let snapshot = session_store::load_snapshot().unwrap_or_else(|err| {
        warn!("ignoring saved form: {err:#}");
        None
    });

    let (event_tx, mut event_rx) = unbounded_channel();
    let (command_tx, command_rx) = unbounded_channel();

    let mut app_state = AppState::new(config.clone(), snapshot);
    if config.api_key().is_none() {
        app_state.handle_event(AppEvent::Info(
            "OPENAI_API_KEY is not set; generation will fail until it is".to_string(),
        ));
    }
    app_state.handle_event(AppEvent::Info(format!(
        "Model {} at {} · saving to {}",
        config.model(),
        client.base_url(),
        config.output_dir().display()
    )));

    let controller = Controller::new(Box::new(client), event_tx.clone());
    controller.spawn(command_rx);

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    enable_raw_mode()?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    terminal.hide_cursor()?;

    let ui_result = ui::run(&mut terminal, &mut app_state, &mut event_rx, command_tx);

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    ui_result
}

struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    model: Box<dyn TextModel>,
    event_tx: UnboundedSender<AppEvent>,
}

impl Controller {
    fn new(model: Box<dyn TextModel>, event_tx: UnboundedSender<AppEvent>) -> Self {
        Self { inner: Arc::new(ControllerInner { model, event_tx }) }
    }

    fn spawn(self, mut command_rx: UnboundedReceiver<AppCommand>) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                if let Err(err) = Controller::handle_command(inner.clone(), command).await {
                    error!("command error: {err:#}");
                    let _ = inner.event_tx.send(AppEvent::Error(format!("{err:#}")));
                }
            }
        });
    }

    async fn handle_command(inner: Arc<ControllerInner>, command: AppCommand) -> Result<()> {
        match command {
            AppCommand::Generate { brief, config, tempo_bpm } => {
                Controller::generate(inner, brief, config, tempo_bpm).await?;
            }
            AppCommand::ExportMidi { sketch, tempo_bpm, path } => {
                Controller::export_midi(inner, sketch, tempo_bpm, path).await?;
            }
        }
        Ok(())
    }

    async fn generate(
        inner: Arc<ControllerInner>,
        brief: Brief,
        config: GenerationConfig,
        tempo_bpm: u32,
    ) -> Result<()> {
        let snapshot = FormSnapshot { brief: brief.clone() };
        if let Err(err) = session_store::save_snapshot(&snapshot) {
            warn!("failed to remember form contents: {err:#}");
        }

        let outcome = run_generation(inner.model.as_ref(), &config, &brief).await?;
        let session = GenerationSession::new(outcome.package, tempo_bpm, outcome.files);
        let _ = inner.event_tx.send(AppEvent::Generated(session));
        Ok(())
    }

    async fn export_midi(
        inner: Arc<ControllerInner>,
        sketch: ChordSketch,
        tempo_bpm: u32,
        path: PathBuf,
    ) -> Result<()> {
        let rejected = sketch.rejected.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_midi(&sketch, tempo_bpm, &target, true))
            .await
            .context("MIDI writer task panicked")??;
        let _ = inner.event_tx.send(AppEvent::MidiWritten { path, rejected });
        Ok(())
    }
}
