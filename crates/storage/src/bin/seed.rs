use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use exam_core::model::{LearnerId, ModuleCatalog, ModuleCategory, ModuleId, QuestionWire};
use serde_json::Value;
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    out_dir: PathBuf,
    questions: u32,
    db_url: Option<String>,
    learner: Option<LearnerId>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuestions { raw: String },
    InvalidLearner { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuestions { raw } => write!(f, "invalid --questions value: {raw}"),
            ArgsError::InvalidLearner { raw } => write!(f, "invalid --learner value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut out_dir =
            PathBuf::from(std::env::var("EXAM_QUESTIONS_DIR").unwrap_or_else(|_| "banks".into()));
        let mut questions = 4;
        let mut db_url = std::env::var("EXAM_DB_URL").ok();
        let mut learner = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out" => out_dir = PathBuf::from(require_value(&mut args, "--out")?),
                "--questions" => {
                    let value = require_value(&mut args, "--questions")?;
                    questions = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| ArgsError::InvalidQuestions { raw: value.clone() })?;
                }
                "--db" => db_url = Some(require_value(&mut args, "--db")?),
                "--learner" => {
                    let value = require_value(&mut args, "--learner")?;
                    learner = Some(
                        LearnerId::parse(&value)
                            .map_err(|_| ArgsError::InvalidLearner { raw: value.clone() })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            out_dir,
            questions,
            db_url,
            learner,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --out <dir>               Directory for question banks (default: banks)");
    eprintln!("  --questions <n>           Questions per module (default: 4)");
    eprintln!("  --db <sqlite_url>         Also store --learner in this database");
    eprintln!("  --learner <email>         Learner to remember");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  EXAM_QUESTIONS_DIR, EXAM_DB_URL");
}

fn sample_bank(module: &ModuleId, category: &ModuleCategory, count: u32) -> Vec<QuestionWire> {
    (1..=count)
        .map(|n| {
            let id = Value::String(format!("{module}-Q{n}"));
            let is_spr = matches!(category, ModuleCategory::Math) && n % 2 == 0;
            if is_spr {
                QuestionWire {
                    question_id: Some(id),
                    question_text: Some(format!("What is {n} divided by 2?")),
                    question_type: Some("student_produced_response".into()),
                    correct_answer: Some(Value::String(format!("{}|{n}/2", f64::from(n) / 2.0))),
                    ..QuestionWire::default()
                }
            } else {
                QuestionWire {
                    question_id: Some(id),
                    question_text: Some(format!("Which choice is the number {n}?")),
                    option_a: Some(format!("{n}")),
                    option_b: Some(format!("{}", n + 1)),
                    option_c: Some(format!("{}", n + 2)),
                    option_d: Some(format!("{}", n + 3)),
                    question_type: Some("multiple_choice".into()),
                    correct_answer: Some(Value::String("A".into())),
                    ..QuestionWire::default()
                }
            }
        })
        .collect()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    std::fs::create_dir_all(&args.out_dir)?;
    let catalog = ModuleCatalog::builtin();
    let mut modules: Vec<_> = ["DT-T0-RW-M1", "DT-T0-RW-M2", "DT-T0-MT-M1", "DT-T0-MT-M2"]
        .into_iter()
        .map(ModuleId::new)
        .collect();
    modules.sort();
    for module in &modules {
        let descriptor = catalog.resolve(module);
        let bank = sample_bank(module, descriptor.category(), args.questions);
        let path = args.out_dir.join(format!("{module}.json"));
        std::fs::write(&path, serde_json::to_vec_pretty(&bank)?)?;
        println!("Wrote {} questions to {}", bank.len(), path.display());
    }

    if let (Some(db_url), Some(learner)) = (args.db_url.as_deref(), args.learner.as_ref()) {
        let storage = Storage::sqlite(db_url).await?;
        storage.learners.save_learner(learner, Utc::now()).await?;
        println!("Remembered learner {learner} in {db_url}");
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
