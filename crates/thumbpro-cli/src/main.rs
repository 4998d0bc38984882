use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use thumbpro_contracts::chat::{
    parse_intent, ConversationLog, Intent, Role, CHAT_HELP_COMMANDS, QUICK_ACTIONS,
};
use thumbpro_contracts::events::EventWriter;
use thumbpro_contracts::history::VersionHistory;
use thumbpro_contracts::projects::{BackgroundProjectStore, FileProjectStore, ProjectLibrary};
use thumbpro_contracts::EditorError;
use thumbpro_engine::gateway::EditResult;
use thumbpro_engine::session::ExportedImage;
use thumbpro_engine::transform::{self, ExportFormat, ExportTier};
use thumbpro_engine::{
    default_gateway_registry, EditGateway, EditorConfig, EditorSession, PendingRequest, UploadMode,
};

#[derive(Debug, Parser)]
#[command(name = "thumbpro", version, about = "Conversational YouTube thumbnail editor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive editing session.
    Chat(ChatArgs),
    /// One edit request, written straight to disk.
    Edit(EditArgs),
    /// Center-crop a local image to 16:9 and re-encode it.
    Crop(CropArgs),
    /// Inspect the saved project gallery.
    Projects(ProjectsArgs),
}

#[derive(Debug, Parser)]
struct GatewayArgs {
    #[arg(long)]
    gateway: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    text_model: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    gateway: GatewayArgs,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    projects: Option<PathBuf>,
    /// Starting frame, uploaded before the first prompt.
    #[arg(long)]
    image: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[command(flatten)]
    gateway: GatewayArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = "standard")]
    tier: String,
    #[arg(long, default_value = "png")]
    format: String,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct CropArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = "standard")]
    tier: String,
    #[arg(long, default_value = "png")]
    format: String,
}

#[derive(Debug, Parser)]
struct ProjectsArgs {
    #[arg(long)]
    projects: Option<PathBuf>,
    #[command(subcommand)]
    action: ProjectsAction,
}

#[derive(Debug, Subcommand)]
enum ProjectsAction {
    List,
    Delete {
        selector: String,
    },
    Export {
        selector: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "standard")]
        tier: String,
        #[arg(long, default_value = "png")]
        format: String,
    },
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("thumbpro error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("THUMBPRO_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Edit(args) => run_edit(args),
        Command::Crop(args) => run_crop(args),
        Command::Projects(args) => run_projects(args),
    }
}

fn resolve_config(gateway: &GatewayArgs, projects: Option<PathBuf>) -> EditorConfig {
    let mut config = EditorConfig::from_env();
    if let Some(name) = gateway.gateway.as_deref() {
        config.gateway = name.trim().to_ascii_lowercase();
    }
    if let Some(model) = gateway.image_model.clone() {
        config.image_model = model;
    }
    if let Some(model) = gateway.text_model.clone() {
        config.text_model = model;
    }
    if let Some(path) = projects {
        config.projects_path = path;
    }
    config
}

fn select_gateway(config: &EditorConfig) -> Result<Arc<dyn EditGateway>> {
    let registry = default_gateway_registry(config);
    match registry.get(&config.gateway) {
        Some(gateway) => Ok(gateway),
        None => bail!(
            "unknown gateway '{}' (available: {})",
            config.gateway,
            registry.names().join(", ")
        ),
    }
}

fn parse_export_options(
    tier: Option<&str>,
    format: Option<&str>,
) -> Result<(ExportTier, ExportFormat)> {
    let tier_raw = tier.unwrap_or("");
    let format_raw = format.unwrap_or("");
    let Some(tier) = ExportTier::parse(tier_raw) else {
        bail!("unknown export tier '{tier_raw}' (standard, hd, 4k)");
    };
    let Some(format) = ExportFormat::parse(format_raw) else {
        bail!("unknown export format '{format_raw}' (png, jpg)");
    };
    Ok((tier, format))
}

/// A path with an extension is the file itself; anything else is a directory.
fn export_destination(target: &Path, file_name: &str) -> PathBuf {
    if target.extension().is_some() {
        target.to_path_buf()
    } else {
        target.join(file_name)
    }
}

fn write_export(target: &Path, exported: &ExportedImage) -> Result<PathBuf> {
    let destination = export_destination(target, &exported.file_name);
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(&destination, &exported.bytes)
        .with_context(|| format!("failed to write {}", destination.display()))?;
    Ok(destination)
}

fn open_library(path: &Path) -> ProjectLibrary {
    ProjectLibrary::open(BackgroundProjectStore::spawn(FileProjectStore::new(path)))
}

fn new_session(events: Option<PathBuf>) -> EditorSession {
    match events {
        Some(path) => {
            let session_id = format!("session-{}", thumbpro_contracts::unix_epoch_millis());
            EditorSession::with_events(EventWriter::new(path, session_id))
        }
        None => EditorSession::new(),
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read image {}", path.display()))
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let config = resolve_config(&args.gateway, None);
    let gateway = select_gateway(&config)?;
    let (tier, format) = parse_export_options(Some(&args.tier), Some(&args.format))?;
    let mut session = new_session(args.events);

    if let Some(path) = args.image.as_deref() {
        session.upload(&read_image(path)?, UploadMode::Append)?;
    }
    if let Err(err) = session.run_edit(gateway.as_ref(), &args.prompt) {
        eprintln!("{err}");
        return Ok(2);
    }
    if let Some(turn) = session.conversation().turns().last() {
        println!("{}", turn.text);
    }
    let exported = session.export(tier, format)?;
    let written = write_export(&args.out, &exported)?;
    println!("{}", written.display());
    Ok(0)
}

fn run_crop(args: CropArgs) -> Result<i32> {
    let (tier, format) = parse_export_options(Some(&args.tier), Some(&args.format))?;
    let decoded = transform::decode_image(&read_image(&args.input)?)?;
    let (width, height) = tier.dims();
    let framed = transform::crop_to_aspect(&decoded, width, height);
    let bytes = transform::encode(&framed, format)?;
    let file_name = format!(
        "thumbnail-{}.{}",
        thumbpro_contracts::unix_epoch_millis(),
        format.extension()
    );
    let written = write_export(
        &args.out,
        &ExportedImage {
            bytes,
            mime: format.mime(),
            file_name,
            width,
            height,
        },
    )?;
    println!("{} ({width}x{height})", written.display());
    Ok(0)
}

fn run_projects(args: ProjectsArgs) -> Result<i32> {
    let mut config = EditorConfig::from_env();
    if let Some(path) = args.projects {
        config.projects_path = path;
    }
    let mut library = ProjectLibrary::open(FileProjectStore::new(&config.projects_path));

    match args.action {
        ProjectsAction::List => {
            for line in render_projects(&library) {
                println!("{line}");
            }
            Ok(0)
        }
        ProjectsAction::Delete { selector } => {
            let Some(id) = library.find(&selector).map(|project| project.id.clone()) else {
                eprintln!("No project matches '{selector}'.");
                return Ok(1);
            };
            library.delete(&id);
            println!("Deleted {id}");
            Ok(0)
        }
        ProjectsAction::Export {
            selector,
            out,
            tier,
            format,
        } => {
            let Some(project) = library.find(&selector).cloned() else {
                eprintln!("No project matches '{selector}'.");
                return Ok(1);
            };
            let (tier, format) = parse_export_options(Some(&tier), Some(&format))?;
            let mut session = EditorSession::new();
            session.load_project(&library, &project);
            let written = write_export(&out, &session.export(tier, format)?)?;
            println!("{}", written.display());
            Ok(0)
        }
    }
}

fn render_projects(library: &ProjectLibrary) -> Vec<String> {
    if library.is_empty() {
        return vec!["No saved projects.".to_string()];
    }
    library
        .projects()
        .iter()
        .enumerate()
        .map(|(index, project)| format!("{:>2}. {}  [{}]", index + 1, project.name, project.id))
        .collect()
}

fn render_history(history: &VersionHistory) -> Vec<String> {
    let mut lines = vec![format!("History {}", history.status_label())];
    for (index, version) in history.versions().iter().enumerate() {
        let marker = if history.cursor() == Some(index) { ">" } else { " " };
        let label = version.prompt().unwrap_or("(upload)");
        lines.push(format!("{marker} {:>2}. {}  {label}", index + 1, version.id));
    }
    lines
}

fn render_log(log: &ConversationLog) -> Vec<String> {
    log.turns()
        .iter()
        .enumerate()
        .map(|(index, turn)| {
            let who = match turn.role {
                Role::User => "you",
                Role::Assistant => "thumbpro",
            };
            let image = if turn.image.is_some() { " [image]" } else { "" };
            format!("{:>2}. {who}: {}{image}", index + 1, turn.text)
        })
        .collect()
}

/// 1-based position in the history.
fn resolve_history_index(selector: &str, len: usize) -> Option<usize> {
    let position = selector.trim().parse::<usize>().ok()?;
    (1..=len).contains(&position).then(|| position - 1)
}

/// 1-based position in the conversation log, or a turn id.
fn resolve_turn_id(selector: &str, log: &ConversationLog) -> Option<String> {
    let selector = selector.trim();
    if let Ok(position) = selector.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| log.turns().get(index))
            .map(|turn| turn.id.clone());
    }
    log.get(selector).map(|turn| turn.id.clone())
}

enum ReplEvent {
    Line(String),
    Closed,
    EditFinished(PendingRequest, Result<EditResult, EditorError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct ChatState {
    session: EditorSession,
    library: ProjectLibrary,
    gateway: Arc<dyn EditGateway>,
    events_tx: Sender<ReplEvent>,
}

impl ChatState {
    fn handle_intent(&mut self, intent: Intent) -> Result<Flow> {
        match intent.action.as_str() {
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                let quick: Vec<String> = QUICK_ACTIONS
                    .iter()
                    .map(|action| format!("/{} ({})", action.command, action.label))
                    .collect();
                println!("Quick actions: {}", quick.join(" "));
            }
            "quit" => return Ok(Flow::Quit),
            "generate" => {
                let prompt = intent.prompt.clone().unwrap_or_else(|| intent.raw.clone());
                self.submit(&prompt);
            }
            "upload" | "replace_frame" => {
                let Some(path) = intent.arg_str("path") else {
                    println!("/{} requires a path", intent.action.replace("_frame", ""));
                    return Ok(Flow::Continue);
                };
                let mode = if intent.action == "upload" {
                    UploadMode::Append
                } else {
                    UploadMode::Replace
                };
                let bytes = match read_image(Path::new(path)) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        println!("{err:#}");
                        return Ok(Flow::Continue);
                    }
                };
                match self.session.upload(&bytes, mode) {
                    Ok(_) => self.print_last_reply(),
                    Err(err) => println!("{err}"),
                }
            }
            "undo" => {
                let moved = self.session.undo();
                self.report_move(moved, "Nothing to undo.");
            }
            "redo" => {
                let moved = self.session.redo();
                self.report_move(moved, "Nothing to redo.");
            }
            "jump_to" => {
                let selector = intent.arg_str("selector").unwrap_or("");
                match resolve_history_index(selector, self.session.history().len()) {
                    Some(index) => {
                        self.session.jump_to(index);
                        self.print_status();
                    }
                    None => println!(
                        "/jump needs a version number between 1 and {}",
                        self.session.history().len()
                    ),
                }
            }
            "show_image" => {
                let selector = intent.arg_str("selector").unwrap_or("");
                let shown = resolve_turn_id(selector, self.session.conversation())
                    .and_then(|turn_id| self.session.show_image(&turn_id));
                match shown {
                    Some(_) => self.print_status(),
                    None => println!("That message has no image to show."),
                }
            }
            "history" => {
                for line in render_history(self.session.history()) {
                    println!("{line}");
                }
            }
            "log" => {
                for line in render_log(self.session.conversation()) {
                    println!("{line}");
                }
            }
            "suggest" => {
                for (index, suggestion) in self
                    .session
                    .suggest_next_edits(self.gateway.as_ref())
                    .iter()
                    .enumerate()
                {
                    println!("{}. {suggestion}", index + 1);
                }
            }
            "save_project" => match self.session.save_project(&mut self.library) {
                Some(project) => println!("Saved \"{}\" [{}]", project.name, project.id),
                None => println!("Nothing to save yet."),
            },
            "list_projects" => {
                for line in render_projects(&self.library) {
                    println!("{line}");
                }
            }
            "load_project" => {
                let selector = intent.arg_str("selector").unwrap_or("");
                match self.library.find(selector).cloned() {
                    Some(project) => {
                        self.session.load_project(&self.library, &project);
                        self.print_last_reply();
                    }
                    None => println!("No project matches '{selector}'."),
                }
            }
            "delete_project" => {
                let selector = intent.arg_str("selector").unwrap_or("");
                match self.library.find(selector).map(|project| project.id.clone()) {
                    Some(id) => {
                        self.library.delete(&id);
                        println!("Deleted {id}");
                    }
                    None => println!("No project matches '{selector}'."),
                }
            }
            "export" => self.export(&intent),
            "reset" => match self.session.reset() {
                Ok(()) => self.print_last_reply(),
                Err(err) => println!("{err}"),
            },
            "unknown" => {
                let command = intent.arg_str("command").unwrap_or("");
                println!("Unknown command /{command}. Type /help for commands.");
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn submit(&mut self, prompt: &str) {
        let request = match self.session.begin_edit(prompt) {
            Ok(request) => request,
            Err(err) => {
                println!("{err}");
                return;
            }
        };
        println!("Working on it...");
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        thread::spawn(move || {
            let outcome = gateway.edit_or_generate(&request.edit_request());
            let _ = tx.send(ReplEvent::EditFinished(request, outcome));
        });
    }

    fn finish(&mut self, request: PendingRequest, outcome: Result<EditResult, EditorError>) {
        match self.session.complete_edit(request, outcome) {
            Ok(_) => {
                self.print_last_reply();
                self.print_status();
            }
            Err(err) => println!("{err}"),
        }
    }

    fn export(&self, intent: &Intent) {
        let Some(path) = intent.arg_str("path") else {
            println!("/export requires a path");
            return;
        };
        let options = parse_export_options(intent.arg_str("tier"), intent.arg_str("format"));
        let (tier, format) = match options {
            Ok(options) => options,
            Err(err) => {
                println!("{err}");
                return;
            }
        };
        let exported = match self.session.export(tier, format) {
            Ok(exported) => exported,
            Err(err) => {
                println!("{err}");
                return;
            }
        };
        match write_export(Path::new(path), &exported) {
            Ok(written) => println!(
                "Exported {}x{} to {}",
                exported.width,
                exported.height,
                written.display()
            ),
            Err(err) => println!("{err:#}"),
        }
    }

    fn report_move(&self, moved: bool, refused: &str) {
        if moved {
            self.print_status();
        } else {
            println!("{refused}");
        }
    }

    fn print_status(&self) {
        let history = self.session.history();
        let label = history
            .current()
            .map(|version| version.prompt().unwrap_or("(upload)").to_string())
            .unwrap_or_default();
        println!("Version {}  {label}", history.status_label());
    }

    fn print_last_reply(&self) {
        if let Some(turn) = self.session.conversation().turns().last() {
            if turn.role == Role::Assistant {
                println!("{}", turn.text);
            }
        }
    }
}

fn spawn_stdin_reader(tx: Sender<ReplEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut handle = stdin.lock();
        let mut line = String::new();
        loop {
            line.clear();
            match handle.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let text = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(ReplEvent::Line(text)).is_err() {
                        return;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
        let _ = tx.send(ReplEvent::Closed);
    });
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let config = resolve_config(&args.gateway, args.projects);
    let gateway = select_gateway(&config)?;
    tracing::debug!(
        gateway = gateway.name(),
        projects = %config.projects_path.display(),
        "chat starting"
    );

    let (tx, rx): (Sender<ReplEvent>, Receiver<ReplEvent>) = mpsc::channel();
    let mut state = ChatState {
        session: new_session(args.events),
        library: open_library(&config.projects_path),
        gateway,
        events_tx: tx.clone(),
    };

    if let Some(turn) = state.session.conversation().turns().first() {
        println!("{}", turn.text);
    }
    if let Some(path) = args.image.as_deref() {
        state.session.upload(&read_image(path)?, UploadMode::Append)?;
        state.print_last_reply();
    }
    println!("Type /help for commands.");

    spawn_stdin_reader(tx);
    prompt()?;
    let mut input_open = true;
    while let Ok(event) = rx.recv() {
        match event {
            ReplEvent::Line(text) => {
                let intent = parse_intent(&text);
                if intent.action != "noop" && state.handle_intent(intent)? == Flow::Quit {
                    break;
                }
            }
            ReplEvent::EditFinished(request, outcome) => state.finish(request, outcome),
            ReplEvent::Closed => input_open = false,
        }
        // Piped input may close before the last edit lands.
        if !input_open && !state.session.is_loading() {
            break;
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}
