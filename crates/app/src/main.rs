use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use exam_core::model::{LearnerId, ModuleId};
use services::{AppServices, Clock, RemoteConfig, SourceOptions, TickOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod driver;

use driver::{DriverCommand, HELP};

const DEFAULT_FLOW: &str = "DT-T0-RW-M1,DT-T0-RW-M2,DT-T0-MT-M1,DT-T0-MT-M2";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidFlow { raw: String },
    InvalidSeconds { raw: String },
    MissingLearner,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidFlow { raw } => write!(f, "invalid --flow value: {raw}"),
            ArgsError::InvalidSeconds { raw } => {
                write!(f, "invalid --seconds-per-question value: {raw}")
            }
            ArgsError::MissingLearner => {
                write!(f, "no learner remembered; pass --learner <email> or run `app learner <email>`")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run     [--db <sqlite_url>] [--questions-dir <dir>]");
    eprintln!("                              [--submissions-dir <dir>] [--flow <M1,M2,...>]");
    eprintln!("                              [--learner <email>] [--seconds-per-question <n>]");
    eprintln!("  cargo run -p app -- learner <email> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults for run:");
    eprintln!("  --db sqlite://exam.sqlite3");
    eprintln!("  --flow {DEFAULT_FLOW}");
    eprintln!("  --seconds-per-question 60");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_QUESTIONS_DIR, EXAM_SUBMISSIONS_DIR, EXAM_FLOW,");
    eprintln!("  EXAM_SECONDS_PER_QUESTION, EXAM_QUESTION_BASE_URL, EXAM_SUBMISSION_URL,");
    eprintln!("  EXAM_STRINGIFY_VERDICTS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Run,
    Learner(String),
}

struct Args {
    db_url: String,
    questions_dir: Option<PathBuf>,
    submissions_dir: Option<PathBuf>,
    flow: Vec<ModuleId>,
    learner: Option<String>,
    seconds_per_question: u32,
}

fn parse_flow(raw: &str) -> Result<Vec<ModuleId>, ArgsError> {
    raw.split(',')
        .map(|id| id.parse::<ModuleId>())
        .collect::<Result<Vec<_>, _>>()
        .ok()
        .filter(|flow| !flow.is_empty())
        .ok_or_else(|| ArgsError::InvalidFlow {
            raw: raw.to_string(),
        })
}

fn parse_seconds(raw: &str) -> Result<u32, ArgsError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or_else(|| ArgsError::InvalidSeconds {
            raw: raw.to_string(),
        })
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://exam.sqlite3".into(), normalize_sqlite_url);
        let mut questions_dir = std::env::var("EXAM_QUESTIONS_DIR").ok().map(PathBuf::from);
        let mut submissions_dir = std::env::var("EXAM_SUBMISSIONS_DIR").ok().map(PathBuf::from);
        let mut flow = parse_flow(
            &std::env::var("EXAM_FLOW").unwrap_or_else(|_| DEFAULT_FLOW.to_string()),
        )?;
        let mut seconds_per_question = match std::env::var("EXAM_SECONDS_PER_QUESTION") {
            Ok(raw) => parse_seconds(&raw)?,
            Err(_) => services::session::DEFAULT_SECONDS_PER_QUESTION,
        };
        let mut learner = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--questions-dir" => {
                    questions_dir = Some(PathBuf::from(require_value(args, "--questions-dir")?));
                }
                "--submissions-dir" => {
                    submissions_dir =
                        Some(PathBuf::from(require_value(args, "--submissions-dir")?));
                }
                "--flow" => flow = parse_flow(&require_value(args, "--flow")?)?,
                "--learner" => learner = Some(require_value(args, "--learner")?),
                "--seconds-per-question" => {
                    seconds_per_question =
                        parse_seconds(&require_value(args, "--seconds-per-question")?)?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            questions_dir,
            submissions_dir,
            flow,
            learner,
            seconds_per_question,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_session(
    services: &AppServices,
    learner: LearnerId,
    flow: Vec<ModuleId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = services.new_session();
    if let Err(err) = session.start(learner.clone(), flow.clone()).await {
        warn!(error = %err, "could not start session");
        eprintln!("{err}");
    }
    println!("{}", driver::render(&session));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let command = match DriverCommand::parse(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        eprintln!("{message}");
                        continue;
                    }
                };
                if command == DriverCommand::Help {
                    println!("{HELP}");
                    continue;
                }
                match driver::apply(&mut session, command, &learner, &flow).await {
                    Ok(true) => println!("{}", driver::render(&session)),
                    Ok(false) => break,
                    Err(err) => {
                        eprintln!("{err}");
                        println!("{}", driver::render(&session));
                    }
                }
            }
            _ = ticker.tick() => {
                match session.tick().await {
                    Ok(TickOutcome::Expired) => {
                        println!("time is up");
                        println!("{}", driver::render(&session));
                    }
                    Ok(TickOutcome::Remaining { secs, display }) if secs % 60 == 0 || secs <= 10 => {
                        println!("time left {display}");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        eprintln!("{err}");
                        println!("{}", driver::render(&session));
                    }
                }
            }
        }
    }

    info!(session_id = %session.id(), view = %session.view(), "driver stopped");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: run the exam driver when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some("run") => Command::Run,
        Some("learner") => Command::Learner(String::new()),
        Some(first) => {
            let err = ArgsError::UnknownArg(first.to_string());
            eprintln!("unknown subcommand: {first}");
            print_usage();
            return Err(err.into());
        }
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let command = match cmd {
        Command::Learner(_) => {
            Command::Learner(require_value(&mut iter, "learner").map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?)
        }
        Command::Run => Command::Run,
    };
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let options = SourceOptions {
        questions_dir: parsed.questions_dir,
        submissions_dir: parsed.submissions_dir,
        remote: RemoteConfig::from_env()?,
        seconds_per_question: parsed.seconds_per_question,
    };
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), options).await?;

    match command {
        Command::Learner(email) => {
            let learner = services.learners().remember(&email).await?;
            println!("remembered learner {learner}");
            Ok(())
        }
        Command::Run => {
            let learner = services
                .learners()
                .resolve(parsed.learner.as_deref())
                .await?
                .ok_or(ArgsError::MissingLearner)?;
            run_session(&services, learner, parsed.flow).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_is_comma_separated_module_ids() {
        let flow = parse_flow("M1, M2").unwrap();
        assert_eq!(flow, vec![ModuleId::new("M1"), ModuleId::new("M2")]);
        assert!(parse_flow("M1,,M2").is_err());
        assert!(parse_flow(" ").is_err());
    }

    #[test]
    fn seconds_must_be_positive() {
        assert_eq!(parse_seconds("45").unwrap(), 45);
        assert!(parse_seconds("0").is_err());
        assert!(parse_seconds("-3").is_err());
    }

    #[test]
    fn sqlite_urls_are_normalized_to_absolute_paths() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/exam.db".into()),
            "sqlite:///tmp/exam.db"
        );
        assert_eq!(normalize_sqlite_url("/tmp/exam.db".into()), "sqlite:///tmp/exam.db");
    }
}
