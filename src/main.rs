use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use urlshrink::config;
use urlshrink::session::Session;

#[derive(Parser)]
#[command(
    name = "urlshrink",
    about = "Replay text as keystrokes, shortening URLs as their [[link] is closed",
    version,
    long_version = env!("URLSHRINK_LONG_VERSION")
)]
struct Cli {
    /// Input text file (use `-` or omit for stdin)
    input: Option<PathBuf>,

    /// Shortening service: is.gd, tinyurl or none
    #[arg(long)]
    service: Option<String>,

    /// Shorten on a worker thread instead of blocking each keystroke
    #[arg(long)]
    deferred: bool,

    /// Editing mode the trigger is installed in
    #[arg(long)]
    mode: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/urlshrink/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output file path (logs go to stderr otherwise)
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = std::fs::File::create(log_path).expect("failed to open log file");
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else {
        env_logger::init();
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    cfg.merge_cli(cli.service, cli.deferred, cli.mode);
    let config = cfg.resolve()?;

    let text = match cli.input {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let mut session = Session::new(&config);
    session.type_text(&text);
    let output = session.finish();
    info!("replayed {} chars, output {} chars", text.chars().count(), output.chars().count());

    print!("{output}");
    Ok(())
}
