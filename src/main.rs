//! answer-reveal - Streaming Answer Render Controller
//!
//! Replays a recorded research-console transcript through the render controller and
//! prints the final state as JSON, optionally previewing the reveal in the terminal.

use answer_reveal::app::transcript::read_transcript;
use answer_reveal::render::ui::{ColorTheme, TerminalUI};
use answer_reveal::{Application, ChunkPolicy, Config, ReplayOptions};
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::time::Duration;

fn cli() -> Command {
    Command::new("answer-reveal")
        .version(answer_reveal::VERSION)
        .about("Replay a research-console transcript through the streaming answer renderer")
        .long_about(
            "answer-reveal reads a JSON-lines transcript of user actions and backend events, \
             replays it on its recorded timeline, and prints the revealed answer, threads \
             and outgoing requests as JSON.",
        )
        .arg(
            Arg::new("transcript")
                .help("Transcript file (JSON lines); '-' or omitted reads stdin")
                .index(1),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file (defaults to the user config directory)"),
        )
        .arg(
            Arg::new("tui")
                .long("tui")
                .action(ArgAction::SetTrue)
                .help("Preview the reveal in the terminal; quit with 'q'"),
        )
        .arg(
            Arg::new("monochrome")
                .long("monochrome")
                .action(ArgAction::SetTrue)
                .requires("tui")
                .help("Use the monochrome theme for the terminal preview"),
        )
        .arg(
            Arg::new("settle-ms")
                .long("settle-ms")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .default_value("5000")
                .help("How long to wait for the reveal to settle after the last event"),
        )
        .arg(
            Arg::new("chunking")
                .long("chunking")
                .value_parser(["independent", "carry"])
                .help("Override how agent chunks are transformed"),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .action(ArgAction::SetTrue)
                .help("Pretty-print the JSON report"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    if let Some(path) = &config_path {
        if !path.is_file() {
            anyhow::bail!("Config path is not a regular file: {}", path.display());
        }
    }
    let mut config = Config::load(config_path.as_deref())?;
    match matches.get_one::<String>("chunking").map(String::as_str) {
        Some("carry") => config.reveal.chunking = ChunkPolicy::Carry,
        Some("independent") => config.reveal.chunking = ChunkPolicy::Independent,
        Some(other) => anyhow::bail!("Unknown chunking policy: {other}"),
        None => {}
    }

    let transcript = matches.get_one::<String>("transcript").map(PathBuf::from);
    let entries = read_transcript(transcript.as_deref()).await?;

    let settle_ms = matches.get_one::<u64>("settle-ms").copied().unwrap_or(5_000);
    let options = ReplayOptions {
        settle: Duration::from_millis(settle_ms),
        ..ReplayOptions::default()
    };

    let mut app = Application::new(&config);
    let report = if matches.get_flag("tui") {
        let mut ui = if matches.get_flag("monochrome") {
            TerminalUI::with_theme(ColorTheme::monochrome())?
        } else {
            TerminalUI::new()?
        };
        app.replay(entries, options, Some(&mut ui)).await?
    } else {
        app.replay(entries, options, None).await?
    };
    app.shutdown().await?;

    let json = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(())
}
