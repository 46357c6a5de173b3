// fraud-cli/src/main.rs
// ============================================================================
// Module: Fraud CLI Entry Point
// Description: Command dispatcher wiring the decisioning engine, the ruleset
//              loader, and the Redis-backed adapters into a single binary.
// Purpose: Provide a thin local-operation and manual-smoke-testing surface
//          over fraud-core; no HTTP transport, no authentication, no
//          object-storage artifact fetching — those are out of scope for a
//          demonstration binary and are left to whatever process assembles
//          the engine in production.
// Dependencies: clap, fraud-config, fraud-core, fraud-redis, serde_json,
//               thiserror, tokio.
// ============================================================================

//! ## Overview
//! Two subcommands. `run` starts the long-lived background machinery a
//! deployed instance needs — the ruleset loader's poll loop and the outbox
//! worker's drain/reclaim loop — against a real Redis instance and a local
//! artifact directory, and blocks until interrupted. `evaluate` is the
//! one-shot smoke test: load a transaction from a JSON file, poll the
//! ruleset once, run it through `evaluateAuth`/`evaluateMonitoring`, and
//! print the resulting decision. Neither subcommand opens a network
//! listener; this binary is a wiring exercise, not a server.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use fraud_config::Config;
use fraud_core::CountryCode;
use fraud_core::Decision;
use fraud_core::DecisionOutcome;
use fraud_core::FieldRegistry;
use fraud_core::FieldValue;
use fraud_core::FraudEngine;
use fraud_core::LoadSheddingGate;
use fraud_core::RuleEvaluator;
use fraud_core::RulesetKey;
use fraud_core::RulesetLoader;
use fraud_core::RulesetRegistry;
use fraud_core::VelocityEngine;
use fraud_core::logging::AuditLog;
use fraud_core::runtime::PollBackoff;
use fraud_core::runtime::PollOutcome;
use fraud_core::runtime::outbox_channel;
use fraud_redis::RedisCounterStore;
use fraud_redis::RedisDurableStream;
use fraud_redis::RedisEventSink;
use thiserror::Error;

/// Consumer-group name every `fraud-cli` instance shares for the outbox
/// stream. Single consumer identity (§4.8) is derived from the process id
/// instead of generating a dependency on a UUID crate this binary otherwise
/// has no use for.
fn consumer_name() -> String {
    format!("fraud-cli-{}", std::process::id())
}

/// Bounded timeout applied to every downstream event-sink publish. Not
/// exposed as a config knob: the outbox worker already has its own queue and
/// reclaim tunables, and a CLI smoke test has no SLO to tune this against.
const EVENT_SINK_TIMEOUT: Duration = Duration::from_millis(2_000);

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fraud-cli", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the ruleset loader and outbox worker against Redis and a local
    /// artifact directory until interrupted.
    Run(RunCommand),
    /// Evaluates one transaction and prints the resulting decision.
    Evaluate(EvaluateCommand),
}

/// Shared arguments for locating configuration and the ruleset artifact
/// directory.
#[derive(Args, Debug)]
struct AssemblyArgs {
    /// Optional config file path (defaults to built-in settings, layered
    /// with the `FRAUD_CONFIG`/`FRAUD_REDIS_URL`/`FRAUD_MAX_CONCURRENT`
    /// environment overrides).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Root directory a `FileArtifactStore` reads ruleset manifests and
    /// artifacts from (§6.2 layout: `root/{environment}/{key}/`).
    #[arg(long, value_name = "DIR")]
    ruleset_dir: PathBuf,
    /// Ruleset key to poll and evaluate against.
    #[arg(long, value_name = "KEY", default_value = "CARD_AUTH")]
    ruleset_key: String,
    /// Country code scoping the installed ruleset, if any.
    #[arg(long, value_name = "COUNTRY")]
    country: Option<String>,
}

/// Configuration for the `run` command.
#[derive(Args, Debug)]
struct RunCommand {
    /// Shared assembly arguments.
    #[command(flatten)]
    assembly: AssemblyArgs,
}

/// Configuration for the `evaluate` command.
#[derive(Args, Debug)]
struct EvaluateCommand {
    /// Shared assembly arguments.
    #[command(flatten)]
    assembly: AssemblyArgs,
    /// Path to a JSON file mapping field names to values.
    #[arg(long, value_name = "PATH")]
    transaction: PathBuf,
    /// Which entry point to call.
    #[arg(long, value_enum, default_value_t = EvalMode::Auth)]
    mode: EvalMode,
    /// Caller-supplied upstream decision, required when `--mode monitoring`.
    #[arg(long, value_enum)]
    decision: Option<EvalDecision>,
}

/// Entry point selection for `evaluate`.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum EvalMode {
    /// Calls `evaluateAuth` (first-match).
    Auth,
    /// Calls `evaluateMonitoring` (all-match, requires `--decision`).
    Monitoring,
}

/// Caller-supplied decision outcome for `--mode monitoring`.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum EvalDecision {
    /// The upstream system approved the transaction.
    Approve,
    /// The upstream system declined the transaction.
    Decline,
}

impl From<EvalDecision> for DecisionOutcome {
    fn from(value: EvalDecision) -> Self {
        match value {
            EvalDecision::Approve => Self::Approve,
            EvalDecision::Decline => Self::Decline,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper, matching the one-message-per-failure shape used
/// throughout this binary.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a formatted message.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(command) => command_run(command).await,
        Commands::Evaluate(command) => command_evaluate(command).await,
    }
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Everything built once and shared by both subcommands.
struct Assembled {
    /// Field registry the evaluator and transaction builder were constructed
    /// against.
    field_registry: FieldRegistry,
    /// Polls the local artifact directory and installs verified rulesets.
    loader: RulesetLoader<fraud_core::FileArtifactStore>,
    /// The resolved loader tunables, reused to seed the poll loop's backoff.
    loader_config: fraud_core::LoaderConfig,
    /// The two public entry points, wired to the admission gate and outbox.
    engine: FraudEngine<RedisCounterStore>,
    /// Background worker that durably appends and publishes decisions.
    outbox_worker: fraud_core::OutboxWorker<RedisDurableStream, RedisEventSink, RedisCounterStore>,
    /// Structured JSON-line audit sink.
    audit: AuditLog<std::io::Stdout>,
}

/// Loads configuration and wires the engine, loader, and Redis-backed
/// adapters together into one [`Assembled`] bundle.
async fn assemble(config_path: Option<&std::path::Path>, ruleset_dir: &std::path::Path) -> CliResult<Assembled> {
    let config = Config::load(config_path).map_err(|err| CliError::new(format!("failed to load configuration: {err}")))?;

    let connection = fraud_redis::connect(&config.redis.url)
        .await
        .map_err(|err| CliError::new(format!("failed to connect to redis at {}: {err}", config.redis.url)))?;

    let velocity_timeout = Duration::from_millis(config.velocity.timeout_ms);
    let counter_store_for_eval = RedisCounterStore::new(connection.clone(), velocity_timeout);
    let counter_store_for_outbox = RedisCounterStore::new(connection.clone(), velocity_timeout);

    let field_registry = FieldRegistry::new();
    let registry = Arc::new(RulesetRegistry::new());

    let velocity_for_eval = VelocityEngine::new(counter_store_for_eval, velocity_timeout);
    let evaluator =
        RuleEvaluator::new(Arc::clone(&registry), field_registry, velocity_for_eval, config.evaluator.to_evaluator_config());
    let gate = if config.load_shedding.enabled {
        LoadSheddingGate::bounded(config.load_shedding.max_concurrent)
    } else {
        LoadSheddingGate::disabled()
    };

    let stream = Arc::new(
        RedisDurableStream::new(connection.clone(), config.redis.stream_key.clone(), config.redis.stream_group.clone())
            .await
            .map_err(|err| CliError::new(format!("failed to initialize durable stream: {err}")))?,
    );
    let sink = Arc::new(RedisEventSink::new(connection.clone(), EVENT_SINK_TIMEOUT));
    let velocity_for_outbox = Arc::new(VelocityEngine::new(counter_store_for_outbox, velocity_timeout));
    let outbox_config = config.outbox.to_outbox_config(consumer_name());
    let (outbox_handle, outbox_worker) = outbox_channel(stream, sink, velocity_for_outbox, outbox_config);

    let engine = FraudEngine::new(evaluator, gate, outbox_handle, field_registry);

    let loader_config = config.loader.to_loader_config();
    let loader = RulesetLoader::new(
        fraud_core::FileArtifactStore::new(ruleset_dir),
        Arc::clone(&registry),
        field_registry,
        loader_config.clone(),
    );

    let audit = AuditLog::new(std::io::stdout());

    Ok(Assembled { field_registry, loader, loader_config, engine, outbox_worker, audit })
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command: starts the loader poll loop and the outbox
/// worker, and blocks until interrupted.
async fn command_run(command: RunCommand) -> CliResult<ExitCode> {
    let assembly = command.assembly;
    let ruleset_key: RulesetKey = assembly.ruleset_key.clone().into();
    let country: Option<CountryCode> = assembly.country.clone().map(CountryCode::new);

    let assembled = assemble(assembly.config.as_deref(), &assembly.ruleset_dir).await?;
    let Assembled { field_registry: _field_registry, loader, loader_config, engine: _engine, outbox_worker, audit } =
        assembled;

    let worker_handle = tokio::spawn(outbox_worker.run());
    let loader_handle = tokio::spawn(poll_loop(loader, loader_config, country, ruleset_key, audit));

    tokio::signal::ctrl_c().await.map_err(|err| CliError::new(format!("failed to listen for shutdown signal: {err}")))?;

    loader_handle.abort();
    worker_handle.abort();
    Ok(ExitCode::SUCCESS)
}

/// Polls the loader on its steady interval, backing off on repeated failure
/// (§4.4), logging every outcome through the audit sink rather than a
/// tracing/log crate (§10.2).
async fn poll_loop(
    loader: RulesetLoader<fraud_core::FileArtifactStore>,
    loader_config: fraud_core::LoaderConfig,
    country: Option<CountryCode>,
    ruleset_key: RulesetKey,
    audit: AuditLog<std::io::Stdout>,
) {
    let mut backoff = PollBackoff::new(loader_config);
    loop {
        match loader.poll_once(country.as_ref(), &ruleset_key).await {
            Ok(outcome) => {
                backoff.reset();
                let detail = match outcome {
                    PollOutcome::UpToDate => "up to date",
                    PollOutcome::Installed => "installed new version",
                };
                audit.loader_event(ruleset_key.as_str(), "production", "ok", detail);
                tokio::time::sleep(backoff.steady_interval()).await;
            }
            Err(err) => {
                audit.loader_event(ruleset_key.as_str(), "production", "error", &err.to_string());
                tokio::time::sleep(backoff.next_delay()).await;
            }
        }
    }
}

// ============================================================================
// SECTION: Evaluate Command
// ============================================================================

/// Executes the `evaluate` command: polls the ruleset once, builds a
/// transaction from the given JSON file, and prints the resulting decision.
async fn command_evaluate(command: EvaluateCommand) -> CliResult<ExitCode> {
    let assembly = command.assembly;
    let ruleset_key: RulesetKey = assembly.ruleset_key.clone().into();
    let country: Option<CountryCode> = assembly.country.clone().map(CountryCode::new);

    let assembled = assemble(assembly.config.as_deref(), &assembly.ruleset_dir).await?;
    let Assembled { field_registry, loader, loader_config: _loader_config, engine, outbox_worker, audit } = assembled;

    match loader.poll_once(country.as_ref(), &ruleset_key).await {
        Ok(outcome) => audit.loader_event(
            ruleset_key.as_str(),
            "production",
            "ok",
            if matches!(outcome, PollOutcome::Installed) { "installed new version" } else { "up to date" },
        ),
        Err(err) => audit.loader_event(ruleset_key.as_str(), "production", "error", &err.to_string()),
    }

    let worker_handle = tokio::spawn(outbox_worker.run());

    let fields = read_transaction_fields(&command.transaction)?;
    let transaction = fraud_cli::build_transaction(&field_registry, fields);

    let decision = match command.mode {
        EvalMode::Auth => engine.evaluate_auth(transaction, country, &ruleset_key).await,
        EvalMode::Monitoring => {
            let caller_decision = command
                .decision
                .map(DecisionOutcome::from)
                .ok_or_else(|| CliError::new("--decision is required when --mode monitoring"))?;
            engine
                .evaluate_monitoring(transaction, country, &ruleset_key, Some(caller_decision))
                .await
                .map_err(|code| CliError::new(format!("evaluation failed: {code:?}")))?
        }
    };

    print_decision(&decision)?;

    // Give the outbox worker a moment to durably append and publish before
    // the process exits; the request path itself never waits on this.
    tokio::time::sleep(Duration::from_millis(200)).await;
    worker_handle.abort();

    Ok(ExitCode::SUCCESS)
}

/// Reads a flat JSON object of field name to value from disk.
fn read_transaction_fields(path: &std::path::Path) -> CliResult<HashMap<String, FieldValue>> {
    let bytes = std::fs::read(path).map_err(|err| CliError::new(format!("failed to read {}: {err}", path.display())))?;
    serde_json::from_slice(&bytes).map_err(|err| CliError::new(format!("failed to parse {}: {err}", path.display())))
}

/// Prints a decision as pretty-printed JSON to stdout.
fn print_decision(decision: &Decision) -> CliResult<()> {
    let rendered =
        serde_json::to_string_pretty(decision).map_err(|err| CliError::new(format!("failed to render decision: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output-stream failure message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
