use anyhow::{Context, Result};
use clap::Parser;
use overlay_core::{
    AnnotatorSession, DisplayList, OverlayConfig, PageLayout, PaletteColor, TextPrompt, Tool,
    ViewPoint,
};
use pdf_engine::{default_engine, LopdfEngine};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use storage::Storage;
use tracing_subscriber::EnvFilter;

/// Overrides the per-user directory the overlay config is read from.
pub const DATA_DIR_ENV: &str = "PDF_MARKUP_DATA_DIR";

#[derive(Debug, Parser)]
#[command(name = "pdf-markup", version)]
#[command(about = "Annotate a PDF by driving the overlay engine with JSON commands on stdin")]
pub struct Cli {
    /// Document to open before reading commands.
    #[arg(value_name = "DOCUMENT")]
    document: Option<PathBuf>,

    /// Write the effective overlay config to the data directory and exit.
    #[arg(long, conflicts_with = "document")]
    init_config: bool,
}

/// One line of the command stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Command {
    Open {
        path: PathBuf,
    },
    Tool {
        tool: String,
    },
    Color {
        color: String,
    },
    ZoomIn,
    ZoomOut,
    Zoom {
        zoom: f32,
    },
    PointerDown {
        x: f32,
        y: f32,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    PointerUp,
    Wheel {
        delta: f32,
    },
    Viewport {
        height: f32,
    },
    /// Queues the reply for the next text prompt; a missing text cancels it.
    Answer {
        #[serde(default)]
        text: Option<String>,
    },
    Save {
        path: PathBuf,
    },
    Annotations,
    Display,
    State,
    Quit,
}

type Session = AnnotatorSession<LopdfEngine, DisplayList>;

/// Text prompt fed by `answer` commands. An empty queue reads as a cancel.
#[derive(Debug, Default)]
struct ScriptedPrompt {
    answers: VecDeque<Option<String>>,
    asked: Vec<String>,
}

impl TextPrompt for ScriptedPrompt {
    fn ask(&mut self, title: &str, _initial: Option<&str>) -> Option<String> {
        self.asked.push(title.to_owned());
        self.answers.pop_front().flatten()
    }
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing();

    if cli.init_config {
        let path = init_config()?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = load_config();
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(cli.document.as_deref(), config, stdin.lock(), stdout.lock())
}

/// Runs the command loop until `quit` or end of input.
///
/// Command failures are answered with an error reply and never end the loop;
/// only a startup document that cannot be opened, or broken I/O, is fatal.
pub fn serve<R, W>(
    document: Option<&Path>,
    config: OverlayConfig,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut session = AnnotatorSession::new(default_engine(), DisplayList::new(), config);
    if let Some(path) = document {
        session.open_document(path).context("cannot start without the requested document")?;
    }

    let mut prompt = ScriptedPrompt::default();

    for line in input.lines() {
        let line = line.context("failed to read command")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = serde_json::from_str::<Command>(line).context("invalid command");
        let quit = matches!(command, Ok(Command::Quit));
        let reply = to_reply(command.and_then(|command| execute(&mut session, &mut prompt, command)));

        writeln!(output, "{reply}").context("failed to write reply")?;
        output.flush()?;

        if quit {
            break;
        }
    }

    Ok(())
}

fn execute(session: &mut Session, prompt: &mut ScriptedPrompt, command: Command) -> Result<Value> {
    match command {
        Command::Open { path } => {
            session.open_document(&path)?;
            Ok(json!({ "pages": page_count(session) }))
        }
        Command::Tool { tool } => {
            let tool: Tool = tool.parse()?;
            session.select_tool(tool);
            Ok(json!({ "tool": tool.name(), "cursor": session.cursor() }))
        }
        Command::Color { color } => {
            let color: PaletteColor = color.parse()?;
            session.select_color(color);
            Ok(json!({ "color": color.name() }))
        }
        Command::ZoomIn => {
            session.zoom_in()?;
            Ok(json!({ "zoom": session.state().zoom }))
        }
        Command::ZoomOut => {
            session.zoom_out()?;
            Ok(json!({ "zoom": session.state().zoom }))
        }
        Command::Zoom { zoom } => {
            session.set_zoom(zoom)?;
            Ok(json!({ "zoom": session.state().zoom }))
        }
        Command::PointerDown { x, y } => {
            let result = session.pointer_down(ViewPoint::new(x, y), prompt);
            let prompts: Vec<String> = prompt.asked.drain(..).collect();
            result?;
            Ok(json!({ "annotations": session.store().len(), "prompts": prompts }))
        }
        Command::PointerMove { x, y } => {
            session.pointer_drag(ViewPoint::new(x, y))?;
            Ok(json!({ "annotations": session.store().len() }))
        }
        Command::PointerUp => {
            session.pointer_up();
            Ok(json!({}))
        }
        Command::Wheel { delta } => {
            session.wheel(delta);
            Ok(json!({ "scroll_offset": session.state().scroll_offset }))
        }
        Command::Viewport { height } => {
            session.set_viewport_height(height);
            Ok(json!({ "scroll_offset": session.state().scroll_offset }))
        }
        Command::Answer { text } => {
            prompt.answers.push_back(text);
            Ok(json!({ "queued": prompt.answers.len() }))
        }
        Command::Save { path } => {
            session.save(&path)?;
            Ok(json!({ "path": path.display().to_string(), "annotations": session.store().len() }))
        }
        Command::Annotations => {
            let annotations = serde_json::to_value(session.store().snapshot())?;
            Ok(json!({ "annotations": annotations }))
        }
        Command::Display => {
            let display = serde_json::to_value(session.surface())?;
            Ok(json!({ "display": display }))
        }
        Command::State => Ok(state(session)),
        Command::Quit => Ok(json!({})),
    }
}

fn state(session: &Session) -> Value {
    let state = session.state();
    json!({
        "document": session.document_path().map(|path| path.display().to_string()),
        "pages": page_count(session),
        "annotations": session.store().len(),
        "tool": state.tool.name(),
        "color": state.color.name(),
        "cursor": session.cursor(),
        "zoom": state.zoom,
        "scroll_offset": state.scroll_offset,
        "viewport_height": state.viewport_height,
    })
}

fn page_count(session: &Session) -> usize {
    session.layout().map(PageLayout::page_count).unwrap_or(0)
}

fn to_reply(result: Result<Value>) -> Value {
    match result {
        Ok(Value::Object(mut fields)) => {
            fields.insert("ok".to_owned(), Value::Bool(true));
            Value::Object(fields)
        }
        Ok(other) => json!({ "ok": true, "result": other }),
        Err(error) => {
            tracing::warn!("command failed: {error:#}");
            json!({ "ok": false, "error": format!("{error:#}") })
        }
    }
}

fn open_storage() -> Result<Storage, storage::StorageError> {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => Ok(Storage::with_root(dir)),
        None => Storage::from_default_project(),
    }
}

/// Saved config from the data directory; defaults when it is missing or unusable.
fn load_config() -> OverlayConfig {
    match open_storage().and_then(|storage| storage.load_config()) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!("using default overlay config: {error}");
            OverlayConfig::default()
        }
    }
}

/// Rewrites the config file in the current schema so it can be edited by hand.
/// An existing valid config is kept; an unreadable one is an error.
fn init_config() -> Result<PathBuf> {
    let storage = open_storage().context("cannot locate the data directory")?;
    let config = storage.load_config().context("existing overlay config is unusable")?;
    storage.save_config(&config).context("failed to write overlay config")?;
    Ok(storage.config_path())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Stdout carries the replies, so logs go to stderr.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}
