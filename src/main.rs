//! Richnote - edit Markdown notes fields through an HTML surface.
//!
//! # Usage
//!
//! ```bash
//! richnote sanitize notes.md
//! richnote render --table tasks --record rec1
//! richnote edit --table tasks --record rec1 --html note.html --watch
//! richnote insert-image --table tasks --record rec1 --html note.html --pick photo.png
//! ```

use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use richnote::config::{
    ConfigFlags, SessionConfig, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, save_config_flags,
};
use richnote::console::{ConsoleCommand, HELP, confirm_surface_ready, parse_command};
use richnote::convert::{Converter, sanitize};
use richnote::gate::ScriptLoadGate;
use richnote::host::{ImmediateLoader, RecordRef, RecordStore};
use richnote::picker::ImagePicker;
use richnote::session::{Collaborators, EditorSession, Message, View};
use richnote::store::JsonFileStore;
use richnote::surface::{HtmlFileMount, SurfaceWatcher};

/// Edit Markdown notes fields through an HTML surface
#[derive(Parser, Debug)]
#[command(name = "richnote", version, about, long_about = None)]
struct Cli {
    /// JSON record store
    #[arg(long, global = true, value_name = "PATH", default_value = "notes.json")]
    store: PathBuf,

    /// Log session activity
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet period before an edit is saved, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Field holding the Markdown notes
    #[arg(long, global = true, value_name = "NAME")]
    content_field: Option<String>,

    /// Field holding image attachments
    #[arg(long, global = true, value_name = "NAME")]
    attachment_field: Option<String>,

    /// Width given to inserted images, in pixels
    #[arg(long, global = true, value_name = "PX")]
    image_width: Option<u32>,

    /// Editor engine script to load
    #[arg(long, global = true, value_name = "URL")]
    script_url: Option<String>,

    /// Prompt shown for empty notes
    #[arg(long, global = true, value_name = "TEXT")]
    placeholder: Option<String>,

    /// Save current command-line flags as defaults
    #[arg(long, global = true)]
    save: bool,

    /// Clear saved defaults
    #[arg(long, global = true)]
    clear: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sanitize Markdown from FILE (or stdin) and print it
    Sanitize {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// Print a record's notes rendered as HTML
    Render(TargetArgs),
    /// Write a record's notes to an HTML file for editing
    Open(SurfaceArgs),
    /// Save an edited HTML file back to the record
    Save(SurfaceArgs),
    /// Edit a record interactively, saving as the HTML file changes
    Edit {
        #[command(flatten)]
        surface: SurfaceArgs,
        /// Watch the HTML file and save edits automatically
        #[arg(short, long)]
        watch: bool,
    },
    /// List the images a record can insert
    Images(TargetArgs),
    /// Append an attached image to the HTML file and save the record
    InsertImage {
        #[command(flatten)]
        surface: SurfaceArgs,
        /// Filename of the attachment to insert (default: first by name)
        #[arg(long, value_name = "FILENAME")]
        pick: Option<String>,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    #[arg(long)]
    table: String,
    #[arg(long)]
    record: String,
}

impl TargetArgs {
    fn record_ref(&self) -> RecordRef {
        RecordRef::new(&self.table, &self.record)
    }
}

#[derive(Args, Debug)]
struct SurfaceArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// HTML file acting as the editing surface
    #[arg(long, value_name = "FILE")]
    html: PathBuf,
}

type FileSession = EditorSession<JsonFileStore>;

fn open_session(
    settings: &SessionConfig,
    store_path: &Path,
    target: RecordRef,
    mount: HtmlFileMount,
) -> Result<FileSession> {
    let store = JsonFileStore::open(store_path)
        .with_context(|| format!("Failed to open store {}", store_path.display()))?;
    let gate = Arc::new(ScriptLoadGate::new(&settings.script_url));
    let host = Collaborators {
        store,
        mount: Box::new(mount),
        loader: Arc::new(ImmediateLoader),
    };
    let mut session = EditorSession::new(settings.clone(), gate, host, Some(target))?;
    confirm_surface_ready(&mut session, 0)?;
    Ok(session)
}

fn run_sanitize(file: Option<&Path>) -> Result<()> {
    let markdown = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
            buf
        }
    };
    println!("{}", sanitize(&markdown));
    Ok(())
}

fn run_render(settings: &SessionConfig, store_path: &Path, target: &TargetArgs) -> Result<()> {
    let store = JsonFileStore::open(store_path)
        .with_context(|| format!("Failed to open store {}", store_path.display()))?;
    let stored = store.get_field(&target.record_ref(), &settings.content_field)?;
    let converter = Converter::new(settings.placeholder.clone());
    print!("{}", converter.render_field(stored.as_deref()));
    Ok(())
}

fn run_images(settings: &SessionConfig, store_path: &Path, target: &TargetArgs) -> Result<()> {
    let store = JsonFileStore::open(store_path)
        .with_context(|| format!("Failed to open store {}", store_path.display()))?;
    let attachments = store.attachments(&target.record_ref(), &settings.attachment_field)?;
    for option in ImagePicker::new(attachments).options() {
        println!("{}\t{}", option.label, option.token);
    }
    Ok(())
}

fn run_save(settings: &SessionConfig, store_path: &Path, args: &SurfaceArgs) -> Result<()> {
    let mut session = open_session(
        settings,
        store_path,
        args.target.record_ref(),
        HtmlFileMount::attach(&args.html),
    )?;
    session.handle(Message::SaveRequested, 0)?;
    Ok(())
}

fn run_insert_image(
    settings: &SessionConfig,
    store_path: &Path,
    args: &SurfaceArgs,
    pick: Option<&str>,
) -> Result<()> {
    let mut session = open_session(
        settings,
        store_path,
        args.target.record_ref(),
        HtmlFileMount::attach(&args.html),
    )?;
    if !insert_image(&mut session, pick, 0)? {
        anyhow::bail!("No image to insert for {}", args.target.record_ref());
    }
    session.flush()?;
    Ok(())
}

/// Open the picker, choose an image and confirm it. Returns whether one was inserted.
fn insert_image(session: &mut FileSession, pick: Option<&str>, now_ms: u64) -> Result<bool> {
    session.handle(Message::ImageInsertRequested, now_ms)?;
    let Some(mut picker) = session.picker().cloned() else {
        return Ok(false);
    };
    if let Some(name) = pick {
        if !picker.select_by_label(name) {
            session.handle(Message::ImageCanceled, now_ms)?;
            anyhow::bail!("No attachment named {name}");
        }
    }
    let Some(token) = picker.confirm() else {
        session.handle(Message::ImageCanceled, now_ms)?;
        return Ok(false);
    };
    session.handle(Message::ImageConfirmed(Some(token)), now_ms)?;
    Ok(true)
}

fn print_status(session: &FileSession) {
    match session.view() {
        View::NothingSelected => println!("{}", richnote::session::NOTHING_SELECTED),
        View::Loading => println!("loading editor..."),
        View::Editor(view) => println!(
            "{}: {}{}",
            view.record,
            if view.locked { "locked" } else { "following selection" },
            if view.save_pending { ", unsaved edits" } else { "" }
        ),
    }
}

fn run_edit(
    settings: &SessionConfig,
    store_path: &Path,
    args: &SurfaceArgs,
    watch: bool,
) -> Result<()> {
    let mut session = open_session(
        settings,
        store_path,
        args.target.record_ref(),
        HtmlFileMount::new(&args.html),
    )?;
    let mut watcher = if watch {
        Some(
            SurfaceWatcher::new(&args.html, Duration::from_millis(100))
                .with_context(|| format!("Failed to watch {}", args.html.display()))?,
        )
    } else {
        None
    };

    eprintln!("editing {} in {}", args.target.record_ref(), args.html.display());
    eprintln!("{HELP}");

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let start = Instant::now();
    loop {
        let poll_ms = session
            .write_due_at()
            .map_or(100, |due| due.saturating_sub(elapsed_ms(start)).clamp(1, 100));
        match rx.recv_timeout(Duration::from_millis(poll_ms)) {
            Ok(line) => {
                let now_ms = elapsed_ms(start);
                match parse_command(&line) {
                    Some(ConsoleCommand::Quit) => break,
                    Some(ConsoleCommand::Status) => print_status(&session),
                    Some(ConsoleCommand::Image(name)) => {
                        match insert_image(&mut session, name.as_deref(), now_ms) {
                            Ok(true) => {}
                            Ok(false) => eprintln!("[warn] No image attachments"),
                            Err(err) => eprintln!("[error] {err:#}"),
                        }
                        acknowledge_surface(watcher.as_mut(), &session);
                    }
                    Some(ConsoleCommand::Session(msg)) => {
                        let remounts = matches!(msg, Message::CursorChanged(_));
                        report(session.handle(msg, now_ms));
                        report(confirm_surface_ready(&mut session, now_ms).map(|_| ()));
                        if remounts {
                            acknowledge_surface(watcher.as_mut(), &session);
                        }
                    }
                    None => {
                        if !line.trim().is_empty() {
                            eprintln!("{HELP}");
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now_ms = elapsed_ms(start);
        if let Some(html) = watcher.as_mut().and_then(SurfaceWatcher::poll_change) {
            report(session.handle(Message::ContentChanged(html), now_ms));
        }
        report(session.poll(now_ms).map(|_| ()));
    }

    session.flush().context("Failed to save pending edits")?;
    Ok(())
}

/// Keep the session's own surface writes from coming back as edits.
fn acknowledge_surface(watcher: Option<&mut SurfaceWatcher>, session: &FileSession) {
    if let (Some(watcher), Some(html)) = (watcher, session.surface_content()) {
        watcher.acknowledge(html);
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn report<E: std::fmt::Display>(result: Result<(), E>) {
    if let Err(err) = result {
        eprintln!("[error] {err}");
    }
}

fn main() -> Result<()> {
    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    // Initialize logging
    let level = if effective.verbose || cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let settings = effective.settings();
    tracing::debug!(?settings, "resolved settings");

    match &cli.command {
        Command::Sanitize { file } => run_sanitize(file.as_deref()),
        Command::Render(target) => run_render(&settings, &cli.store, target),
        Command::Images(target) => run_images(&settings, &cli.store, target),
        Command::Open(args) => {
            open_session(
                &settings,
                &cli.store,
                args.target.record_ref(),
                HtmlFileMount::new(&args.html),
            )?;
            Ok(())
        }
        Command::Save(args) => run_save(&settings, &cli.store, args),
        Command::Edit { surface, watch } => {
            run_edit(&settings, &cli.store, surface, *watch || effective.watch)
        }
        Command::InsertImage { surface, pick } => {
            run_insert_image(&settings, &cli.store, surface, pick.as_deref())
        }
    }
}
