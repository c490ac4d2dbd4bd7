mod command;
mod headless;

use std::env;
use std::error::Error;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc::{self, Sender};
use std::thread;

use clap::Parser;
use formwire_client_runtime::{
    ClientConfig, EventOutcome, Session, WidgetKind, WidgetTree, WidgetValue,
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::command::Command;
use crate::headless::HeadlessBuilder;

type HeadlessSession<S> = Session<S, HeadlessBuilder>;

#[derive(Parser, Debug)]
#[command(name = "formwire", about = "Headless form client")]
struct Args {
    /// JSON config file (default: ~/.formwire/client.json).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Root of the screen definition cache.
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Text encoding of strings on the wire (e.g. EUC-JP, UTF-8).
    #[arg(long)]
    encoding: Option<String>,
    /// Wrap the connection in TLS.
    #[arg(long, default_value_t = false)]
    tls: bool,
    /// Write the effective settings back to the config file.
    #[arg(long, default_value_t = false)]
    save_config: bool,
    #[arg(long, default_value_t = false)]
    debug: bool,
    application: Option<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("formwire fatal error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.debug);

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&args, &config_path)?;
    if args.save_config {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "config saved");
    }

    let mut session = formwire_client_runtime::connect(&config, HeadlessBuilder)?;
    session.get_screen_data()?;
    print_windows(&session)?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || stdin_loop(tx));
    serve(&mut session, rx)?;

    session.close()?;
    info!("session closed");
    Ok(())
}

/// Applies stdin commands until `quit` or end of input. Stops without
/// taking another line once the session has ended.
fn serve<S: Read + Write>(
    session: &mut HeadlessSession<S>,
    commands: impl IntoIterator<Item = String>,
) -> Result<(), Box<dyn Error>> {
    let mut commands = commands.into_iter();
    while !session.is_ended() {
        let Some(line) = commands.next() else {
            break;
        };
        let command = match command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                warn!(%message, "ignoring command");
                continue;
            }
        };

        match command {
            Command::Set {
                window,
                path,
                kind,
                value,
            } => set_widget(session, &window, &path, kind, value),
            Command::Event {
                window,
                widget,
                event,
            } => match session.send_event(&window, &widget, &event)? {
                EventOutcome::Suppressed => warn!(%window, %widget, %event, "event suppressed"),
                EventOutcome::Ended => break,
                EventOutcome::Updated | EventOutcome::WindowsChanged => print_windows(session)?,
            },
            Command::Show => print_windows(session)?,
            Command::Quit => break,
        }
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(env::var("FORMWIRE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
        })
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn default_config_path() -> PathBuf {
    env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".formwire")
        .join("client.json")
}

/// Defaults, then the config file, then `FORMWIRE_*` variables, then flags.
fn load_config(args: &Args, path: &Path) -> Result<ClientConfig, Box<dyn Error>> {
    let mut config = ClientConfig::load(path)?;
    config.apply_env();

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(user) = &args.user {
        config.user = user.clone();
    }
    if let Some(password) = &args.password {
        config.password = password.clone();
    }
    if let Some(cache) = &args.cache {
        config.cache_dir = cache.clone();
    }
    if let Some(encoding) = &args.encoding {
        config.encoding = encoding.clone();
    }
    if args.tls {
        config.use_tls = true;
    }
    if let Some(application) = &args.application {
        config.application = application.clone();
    }

    config.validate()?;
    Ok(config)
}

fn stdin_loop(tx: Sender<String>) {
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if tx.send(line).is_err() {
            break;
        }
    }
}

fn set_widget<S: Read + Write>(
    session: &mut HeadlessSession<S>,
    window: &str,
    path: &str,
    kind: WidgetKind,
    value: WidgetValue,
) {
    let Some(target) = session.window_mut(window) else {
        warn!(window, "no such window");
        return;
    };
    let handle = target.tree_mut().declare(path, kind);
    target.tree_mut().apply(handle, value);
    session.mark_dirty(window, path, handle);
}

fn print_windows<S: Read + Write>(session: &HeadlessSession<S>) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for window in session.windows() {
        let line = json!({
            "window": window.name(),
            "model": window.model_json(),
            "focus": window.tree().focused(),
            "widgets": window.tree().snapshot(),
        });
        writeln!(out, "{line}")?;
    }
    out.flush()
}
