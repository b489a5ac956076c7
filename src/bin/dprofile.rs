//! dprofile CLI - Command-line interface for the decision profile engine
//!
//! Commands:
//! - replay: Replay a recorded interaction stream and score it
//! - score: Score stored answers directly
//! - reference: Validate and summarize the questionnaire
//! - config: Print the default engine configuration
//! - schema: Print the interaction event schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use decision_profile::replay::{InteractionEvent, InteractionEventAdapter, SCHEMA_VERSION};
use decision_profile::session::{InMemorySessionStore, SessionService};
use decision_profile::types::{Answer, CognitiveAnswer};
use decision_profile::{
    replay, ConfigError, EngineConfig, FlowController, ReferenceData, ReferenceError,
    ReplayError, ReportEncoder, ScoringEngine, ENGINE_VERSION, PRODUCER_NAME,
};

/// dprofile - questionnaire replay and behavioral scoring
#[derive(Parser)]
#[command(name = "dprofile")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Replay questionnaire attempts and compute decision profiles", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an interaction_event.v1 stream through the test flow
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reference data file (defaults to the bundled questionnaire)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Emit a profile report instead of the raw replay outcome
        #[arg(long)]
        report: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Score a JSON document of answers and cognitive answers
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reference data file (defaults to the bundled questionnaire)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Emit a profile report instead of the bare score map
        #[arg(long)]
        report: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate and summarize reference data
    Reference {
        /// Reference data file (defaults to the bundled questionnaire)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print the full reference data as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default engine configuration
    Config,

    /// Print interaction event schema information
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Input of the `score` command
#[derive(serde::Deserialize)]
struct ScoreInput {
    #[serde(default)]
    answers: Vec<Answer>,
    #[serde(default)]
    cognitive_answers: Vec<CognitiveAnswer>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, &cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, format: &LogFormat) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn run(cli: Cli) -> Result<(), DprofileCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            output,
            config,
            reference,
            report,
            pretty,
        } => cmd_replay(
            &input,
            input_format,
            &output,
            config.as_deref(),
            reference.as_deref(),
            report,
            pretty,
        ),

        Commands::Score {
            input,
            config,
            reference,
            report,
            pretty,
        } => cmd_score(&input, config.as_deref(), reference.as_deref(), report, pretty),

        Commands::Reference { file, json } => cmd_reference(file.as_deref(), json),

        Commands::Config => cmd_config(),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    output: &Path,
    config: Option<&Path>,
    reference: Option<&Path>,
    report: bool,
    pretty: bool,
) -> Result<(), DprofileCliError> {
    let input_data = read_input(input)?;

    let events: Vec<InteractionEvent> = match input_format {
        InputFormat::Ndjson => InteractionEventAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => InteractionEventAdapter::parse_array(&input_data)?,
    };
    if events.is_empty() {
        return Err(DprofileCliError::NoEvents);
    }

    let config = load_config(config)?;
    let reference = Arc::new(load_reference(reference)?);
    let service = SessionService::with_engine(
        InMemorySessionStore::new(),
        Arc::clone(&reference),
        ScoringEngine::new(config.scoring.clone()),
    );
    let mut controller = FlowController::with_config(Arc::clone(&reference), service, config);

    info!(events = events.len(), "Replaying interaction stream");
    let outcome = replay(&mut controller, &events)?;

    let output_data = if report {
        let scores = outcome
            .scores
            .as_ref()
            .ok_or_else(|| DprofileCliError::Incomplete(outcome.stage.to_string()))?;
        let report = ReportEncoder::new().encode(
            &reference,
            scores,
            &outcome.answers,
            &outcome.cognitive_answers,
            outcome.session_id.as_ref(),
        );
        to_json(&report, pretty)?
    } else {
        to_json(&outcome, pretty)?
    };

    write_output(output, &output_data)
}

fn cmd_score(
    input: &Path,
    config: Option<&Path>,
    reference: Option<&Path>,
    report: bool,
    pretty: bool,
) -> Result<(), DprofileCliError> {
    let input_data = read_input(input)?;
    let score_input: ScoreInput = serde_json::from_str(&input_data)?;

    let config = load_config(config)?;
    let reference = load_reference(reference)?;
    let engine = ScoringEngine::new(config.scoring);

    debug!(
        answers = score_input.answers.len(),
        cognitive_answers = score_input.cognitive_answers.len(),
        "Scoring answers"
    );
    let scores = engine.score(
        reference.dimension_codes(),
        &score_input.answers,
        &score_input.cognitive_answers,
    );

    let output_data = if report {
        let report = ReportEncoder::new().encode(
            &reference,
            &scores,
            &score_input.answers,
            &score_input.cognitive_answers,
            None,
        );
        to_json(&report, pretty)?
    } else {
        to_json(&scores, pretty)?
    };

    println!("{}", output_data);
    Ok(())
}

fn cmd_reference(file: Option<&Path>, json: bool) -> Result<(), DprofileCliError> {
    let reference = load_reference(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reference)?);
        return Ok(());
    }

    println!("Reference Data");
    println!("==============");
    println!("Dimensions: {}", reference.dimensions.len());
    for dimension in &reference.dimensions {
        println!("  {:<4} {}", dimension.code, dimension.name);
    }
    println!("Phases: {}", reference.phases.len());
    for (index, phase) in reference.phases.iter().enumerate() {
        let batch = reference.schedule.batch_after(index);
        println!(
            "  {}. {} ({} scenarios, {} cognitive after)",
            index + 1,
            phase.name,
            phase.scenarios.len(),
            batch.len()
        );
    }
    println!("Cognitive questions: {}", reference.cognitive.len());
    println!(
        "Total steps: {}",
        reference.scenario_count() + reference.schedule.total_questions()
    );
    Ok(())
}

fn cmd_config() -> Result<(), DprofileCliError> {
    println!("{}", EngineConfig::default().to_json()?);
    Ok(())
}

fn cmd_schema(json_schema: bool) -> Result<(), DprofileCliError> {
    if json_schema {
        println!("{}", get_event_json_schema());
        return Ok(());
    }

    println!("Input Schema: {}", SCHEMA_VERSION);
    println!();
    println!("One JSON object per interaction, each with an RFC3339 timestamp and a type:");
    println!();
    println!("- start                  Open a session and begin the test");
    println!("- tick                   Advance the clock (lets transitions elapse)");
    println!("- pointer_move {{x, y}}    Pointer sample over the active question");
    println!("- hover_start {{option}}   Option gained hover focus");
    println!("- hover_end {{option}}     Option lost hover focus");
    println!("- choose {{option, step?}} Commit an option for the active question");
    println!("- open_answer {{text}}     Submit the open answer and complete the test");
    println!();
    println!("Timestamps must be non-decreasing. Producer: {} {}", PRODUCER_NAME, ENGINE_VERSION);
    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, DprofileCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(DprofileCliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), DprofileCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, DprofileCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn load_reference(path: Option<&Path>) -> Result<ReferenceData, DprofileCliError> {
    match path {
        Some(path) => Ok(ReferenceData::from_json(&fs::read_to_string(path)?)?),
        None => Ok(ReferenceData::builtin()?),
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, DprofileCliError> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

fn get_event_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Questionnaire interaction event",
        "type": "object",
        "required": ["timestamp", "type"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "timestamp": { "type": "string", "format": "date-time" },
            "type": {
                "type": "string",
                "enum": ["start", "tick", "pointer_move", "hover_start", "hover_end", "choose", "open_answer"]
            },
            "x": { "type": "number" },
            "y": { "type": "number" },
            "option": { "type": "integer", "minimum": 0 },
            "step": { "type": "integer", "minimum": 0 },
            "text": { "type": "string", "minLength": 1 }
        }
    }).to_string()
}

// Error types

#[derive(Debug)]
enum DprofileCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Replay(ReplayError),
    Reference(ReferenceError),
    Config(ConfigError),
    NoInput,
    NoEvents,
    Incomplete(String),
}

impl From<io::Error> for DprofileCliError {
    fn from(e: io::Error) -> Self {
        DprofileCliError::Io(e)
    }
}

impl From<serde_json::Error> for DprofileCliError {
    fn from(e: serde_json::Error) -> Self {
        DprofileCliError::Json(e)
    }
}

impl From<ReplayError> for DprofileCliError {
    fn from(e: ReplayError) -> Self {
        DprofileCliError::Replay(e)
    }
}

impl From<ReferenceError> for DprofileCliError {
    fn from(e: ReferenceError) -> Self {
        DprofileCliError::Reference(e)
    }
}

impl From<ConfigError> for DprofileCliError {
    fn from(e: ConfigError) -> Self {
        DprofileCliError::Config(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DprofileCliError> for CliError {
    fn from(e: DprofileCliError) -> Self {
        match e {
            DprofileCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DprofileCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DprofileCliError::Replay(e) => {
                let (code, hint) = match &e {
                    ReplayError::Parse(_) => ("PARSE_ERROR", format!("Ensure input matches {} schema", SCHEMA_VERSION)),
                    ReplayError::Validation { .. } => ("VALIDATION_ERROR", "Fix the offending event and retry".to_string()),
                    ReplayError::Flow { .. } => ("FLOW_ERROR", "Check the event order against the test flow".to_string()),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint),
                }
            }
            DprofileCliError::Reference(e) => CliError {
                code: "REFERENCE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'dprofile reference' to check the reference data".to_string()),
            },
            DprofileCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'dprofile config' for a valid starting point".to_string()),
            },
            DprofileCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal, expected piped input".to_string(),
                hint: Some("Pipe events into dprofile or pass --input <file>".to_string()),
            },
            DprofileCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            DprofileCliError::Incomplete(stage) => CliError {
                code: "INCOMPLETE_ATTEMPT".to_string(),
                message: format!("Replay ended in stage {} without scores", stage),
                hint: Some("A report needs a stream ending with open_answer".to_string()),
            },
        }
    }
}
