// pytrace: stepwise Python tracer with object-graph visualization

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser as _;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing_subscriber::EnvFilter;

use pytrace::config::TracerConfig;
use pytrace::tracer::assist::{connect_http, AssistStream, CancelToken, Chunk, CommandUpstream};
use pytrace::tracer::session::{RunRequest, Session};
use pytrace::tracer::translate::{CommandTranslator, HttpTranslator};
use pytrace::ui::App;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, clap::Parser)]
#[command(name = "pytrace", version, about = "Step through a Python program and inspect its state")]
struct Args {
    /// Program to trace
    file: PathBuf,

    /// Print the recorded trace as JSON instead of opening the viewer
    #[arg(long)]
    json: bool,

    /// Value answering the next `input()`; repeat for several
    #[arg(long = "input", value_name = "VALUE")]
    inputs: Vec<String>,

    /// Language the file is written in; anything but Python is translated first
    #[arg(long, default_value = "Python")]
    language: String,

    /// TOML file overriding the recording limits
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Ask the assistant a question about the program instead of tracing it
    #[arg(long, value_name = "QUESTION")]
    ask: Option<String>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode, BoxError> {
    let config = match &args.config {
        Some(path) => TracerConfig::load(path)?,
        None => TracerConfig::default(),
    };
    let source = fs::read_to_string(&args.file)
        .map_err(|err| format!("cannot read '{}': {}", args.file.display(), err))?;

    if let Some(question) = &args.ask {
        return ask(&config, &source, question);
    }

    let mut session = match &config.translator_command {
        Some(command) => Session::new(config.clone()).with_translator(Box::new(CommandTranslator::new(command.clone()))),
        None => {
            let timeout = Duration::from_secs(config.translation_timeout_secs);
            let translator = HttpTranslator::new(config.llm_endpoint.clone(), timeout)?;
            Session::new(config.clone()).with_translator(Box::new(translator))
        }
    };

    let request = RunRequest {
        all_previous_inputs: args.inputs.clone(),
        ..RunRequest::new(source).with_language(args.language.clone())
    };
    let response = session.submit(request);
    tracing::info!(
        steps = response.trace.len(),
        finished = response.finished,
        "initial run recorded"
    );

    if args.json {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &response)?;
        writeln!(stdout)?;
        return Ok(if response.error.is_some() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session, response);
    let res = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(ExitCode::SUCCESS)
}

/// Stream the assistant's answer to stdout
fn ask(config: &TracerConfig, source: &str, question: &str) -> Result<ExitCode, BoxError> {
    let cancel = CancelToken::new();
    match &config.assistant_command {
        Some(command) => print_chunks(AssistStream::open(source, question, cancel, |request| {
            CommandUpstream::spawn(command, request)
        })),
        None => {
            let timeout = Duration::from_secs(config.assistant_timeout_secs);
            print_chunks(AssistStream::open(source, question, cancel, |request| {
                connect_http(&config.llm_endpoint, timeout, request)
            }))
        }
    }
}

fn print_chunks<R: BufRead>(chunks: AssistStream<R>) -> Result<ExitCode, BoxError> {
    let mut stdout = io::stdout().lock();
    let mut failed = false;
    for chunk in chunks {
        match chunk {
            Chunk::Content(_) => {
                if let Some(text) = chunk.text() {
                    write!(stdout, "{}", text)?;
                    stdout.flush()?;
                }
            }
            Chunk::Error(message) => {
                eprintln!("Error: {}", message);
                failed = true;
            }
            Chunk::Done | Chunk::KeepAlive => {}
        }
    }
    writeln!(stdout)?;
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
