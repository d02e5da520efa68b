use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chat_cli::app::{App, Output};
use chat_cli::host::CliHost;
use chat_cli::providers::build_provider;
use clap::Parser;
use stream_formatter::config::{HOST_ENV_VAR, MODEL_ENV_VAR, PROVIDER_ENV_VAR};
use stream_formatter::logging::init_tracing;
use stream_formatter::{
    sink_fn, EnvConfig, FormatterConfig, ProviderKind, ResponseFormatter, StreamEvent,
    StreamOrchestrator,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(about = "Chat with a reasoning model and render its answers to HTML")]
#[command(version)]
struct Cli {
    /// Generation service base URL
    #[arg(long, env = HOST_ENV_VAR)]
    host: Option<String>,

    /// Model to request
    #[arg(long, env = MODEL_ENV_VAR)]
    model: Option<String>,

    /// Generation backend: http or mock
    #[arg(long, value_name = "PROVIDER", env = PROVIDER_ENV_VAR)]
    provider: Option<ProviderKind>,

    /// Syntax highlighting theme for code blocks
    #[arg(long, value_name = "THEME")]
    theme: Option<String>,

    /// Transport timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Rewrite this HTML page with the rendered answer as it streams
    #[arg(long, value_name = "PATH")]
    html_out: Option<PathBuf>,

    /// Echo the unprocessed stream to stdout
    #[arg(long)]
    raw: bool,

    /// Pass raw HTML from the model through to the page
    #[arg(long)]
    allow_raw_html: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

enum LoopMessage {
    Event(StreamEvent),
    Line(String),
    InputClosed,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let env = EnvConfig::from_env();
    let model = cli.model.unwrap_or(env.model);
    let host_url = cli.host.unwrap_or(env.host);
    let timeout = cli
        .timeout_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .or(env.timeout);
    let formatter = ResponseFormatter::new(&FormatterConfig {
        highlight_theme: cli.theme.unwrap_or(env.formatter.highlight_theme),
        allow_raw_html: cli.allow_raw_html || env.formatter.allow_raw_html,
    });

    let provider = build_provider(cli.provider.unwrap_or(env.provider), &host_url, timeout)
        .context("failed to construct generation provider")?;

    let (tx, rx) = mpsc::channel();
    let event_tx = tx.clone();
    let orchestrator = StreamOrchestrator::new(
        provider,
        sink_fn(move |event| {
            let _ = event_tx.send(LoopMessage::Event(event));
        }),
        formatter,
    );
    spawn_stdin_reader(tx).context("failed to start input reader")?;

    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let mut host = CliHost::new(Arc::clone(&orchestrator), cwd, cli.html_out);
    let mut app = App::new(model.clone(), cli.raw);
    info!(%model, "chat session started");
    eprintln!("Model {model}. Type /help for commands.");

    while !app.should_exit {
        let Ok(message) = rx.recv() else {
            break;
        };
        match message {
            LoopMessage::Event(event) => app.on_event(event, &mut host),
            LoopMessage::Line(line) => app.on_line(&line, &mut host),
            LoopMessage::InputClosed => app.on_input_closed(),
        }
        write_output(app.drain_output()).context("failed to write output")?;
    }

    orchestrator.cancel();
    orchestrator.join_workers();
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<LoopMessage>) -> io::Result<()> {
    thread::Builder::new()
        .name("chat-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(LoopMessage::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        warn!(%error, "stdin read failed");
                        break;
                    }
                }
            }
            let _ = tx.send(LoopMessage::InputClosed);
        })
        .map(|_| ())
}

fn write_output(output: Vec<Output>) -> io::Result<()> {
    if output.is_empty() {
        return Ok(());
    }

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    for item in output {
        match item {
            Output::Reasoning(text) => write!(stderr, "{text}")?,
            Output::Raw(text) => write!(stdout, "{text}")?,
            Output::Answer(text) => writeln!(stdout, "{text}")?,
            Output::Notice(text) => writeln!(stderr, "{text}")?,
        }
    }
    stderr.flush()?;
    stdout.flush()
}
