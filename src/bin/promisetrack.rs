//! PromiseTrack CLI — evidence-to-promise linking engine.
//!
//! Usage:
//!   promisetrack link run --session 44-1 [--party LPC] [--scorer lexical] [--db path]
//!   promisetrack link status <evidence_id> [--db path]
//!   promisetrack integrity check [--session 44-1] [--json] [--db path]
//!   promisetrack integrity repair [--apply] [--db path]

use clap::{Parser, Subcommand};
use promisetrack::{
    AliasTable, CandidateScorer, DepartmentStandardizer, IntegrityChecker, LexicalScorer,
    LinkerConfig, LinkingOrchestrator, LlmBatchScorer, OpenStore, RunScope, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "promisetrack",
    version,
    about = "Evidence-to-promise linking engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run and inspect linking
    Link {
        #[command(subcommand)]
        action: LinkAction,
        /// Path to SQLite database file
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
    /// Audit and repair link integrity
    Integrity {
        #[command(subcommand)]
        action: IntegrityAction,
        /// Path to SQLite database file
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Process pending evidence in a session scope
    Run {
        /// Parliament session id, e.g. 44-1
        #[arg(long)]
        session: String,
        /// Restrict candidate promises to one party
        #[arg(long)]
        party: Option<String>,
        /// Scoring strategy: lexical, llm, or embedding
        #[arg(long, default_value = "lexical")]
        scorer: String,
        /// Command line for the LLM scorer, e.g. "llm -m sonnet"
        #[arg(long)]
        generate_cmd: Option<String>,
        /// Cap on evidence items processed this run
        #[arg(long)]
        limit: Option<usize>,
        /// Path to a YAML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the linking state of one evidence item
    Status {
        /// Evidence id to inspect
        evidence_id: String,
    },
}

#[derive(Subcommand)]
enum IntegrityAction {
    /// Scan both collections for link discrepancies (read-only)
    Check {
        /// Restrict the scan to one parliament session
        #[arg(long)]
        session: Option<String>,
        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate and optionally apply a remediation plan
    Repair {
        /// Restrict the scan to one parliament session
        #[arg(long)]
        session: Option<String>,
        /// Actually apply the fixes (default is dry-run)
        #[arg(long)]
        apply: bool,
    },
}

/// Get the default database path (~/.local/share/promisetrack/promisetrack.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let app_dir = data_dir.join("promisetrack");
    std::fs::create_dir_all(&app_dir).ok();
    app_dir.join("promisetrack.db")
}

fn open_store(db: Option<PathBuf>) -> Result<Arc<SqliteStore>, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let store =
        SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

fn load_config(path: Option<&PathBuf>) -> Result<LinkerConfig, String> {
    match path {
        Some(path) => LinkerConfig::from_yaml_file(path).map_err(|e| e.to_string()),
        None => Ok(LinkerConfig::default()),
    }
}

fn build_departments(config: &LinkerConfig) -> Result<DepartmentStandardizer, String> {
    match &config.department_aliases {
        Some(path) => {
            let table = AliasTable::from_yaml_file(path)
                .map_err(|e| format!("Failed to load alias table: {}", e))?;
            Ok(DepartmentStandardizer::new(table))
        }
        None => Ok(DepartmentStandardizer::builtin()),
    }
}

fn build_scorer(
    name: &str,
    generate_cmd: Option<&str>,
    config: &LinkerConfig,
) -> Result<Arc<dyn CandidateScorer>, String> {
    match name {
        "lexical" => Ok(Arc::new(LexicalScorer::new())),
        "llm" => {
            let cmd = generate_cmd
                .ok_or_else(|| "--generate-cmd is required with --scorer llm".to_string())?;
            let generator = promisetrack::generate::SubprocessGenerator::from_command_line(cmd)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(LlmBatchScorer::new(Arc::new(generator))))
        }
        #[cfg(feature = "embeddings")]
        "embedding" => {
            let embedder = promisetrack::scoring::FastEmbedEmbedder::default_model()
                .map_err(|e| format!("Failed to initialize embedding model: {}", e))?;
            Ok(Arc::new(
                promisetrack::EmbeddingScorer::new(Box::new(embedder))
                    .with_similarity_floor(config.embedding_floor),
            ))
        }
        #[cfg(not(feature = "embeddings"))]
        "embedding" => {
            let _ = config;
            Err("this build has no embedding support (enable the 'embeddings' feature)".to_string())
        }
        other => Err(format!(
            "unknown scorer '{}' (expected lexical, llm, or embedding)",
            other
        )),
    }
}

async fn cmd_link_run(
    store: Arc<SqliteStore>,
    session: &str,
    party: Option<String>,
    scorer_name: &str,
    generate_cmd: Option<&str>,
    limit: Option<usize>,
    config_path: Option<&PathBuf>,
) -> i32 {
    // Fail fast on bad config or a missing alias table, before any item.
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let departments = match build_departments(&config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let scorer = match build_scorer(scorer_name, generate_cmd, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut scope = RunScope::new(session);
    if let Some(party) = party {
        scope = scope.with_party(party);
    }
    if let Some(limit) = limit {
        scope = scope.with_limit(limit);
    }

    let orchestrator = LinkingOrchestrator::new(store, scorer, departments, config);
    match orchestrator.run(&scope).await {
        Ok(report) => {
            println!(
                "Run {}: {} processed, {} errored ({} links created, {} updated)",
                report.run_id,
                report.processed(),
                report.errored(),
                report.links_created(),
                report.links_updated()
            );
            for item in report.items.iter().filter(|i| i.error.is_some()) {
                eprintln!(
                    "  {}: {}",
                    item.evidence_id,
                    item.error.as_deref().unwrap_or("unknown error")
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_link_status(store: &SqliteStore, evidence_id: &str) -> i32 {
    use promisetrack::DocumentStore;
    match store.get_evidence(evidence_id) {
        Ok(Some(evidence)) => {
            println!("{}: {}", evidence.evidence_id, evidence.title_or_summary);
            println!("  status: {}", evidence.promise_linking_status);
            if let Some(error) = &evidence.linking_error {
                println!("  error: {}", error);
            }
            if evidence.promise_ids.is_empty() {
                println!("  links: none");
            } else {
                println!("  links: {}", evidence.promise_ids.join(", "));
            }
            0
        }
        Ok(None) => {
            eprintln!("Error: evidence '{}' not found", evidence_id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_integrity_check(store: Arc<SqliteStore>, session: Option<&str>, json: bool) -> i32 {
    let checker = IntegrityChecker::new(store);
    match checker.check(session) {
        Ok(report) => {
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return 1;
                    }
                }
            } else if report.is_clean() {
                println!(
                    "Clean: {} promises, {} evidence items, no discrepancies",
                    report.promises_scanned, report.evidence_scanned
                );
            } else {
                println!(
                    "{} discrepancies across {} promises and {} evidence items:",
                    report.total(),
                    report.promises_scanned,
                    report.evidence_scanned
                );
                for (kind, count) in &report.counts {
                    println!("  {:?}: {}", kind, count);
                }
                for sample in &report.samples {
                    println!(
                        "    {:?} promise={} evidence={}",
                        sample.kind, sample.promise_id, sample.evidence_id
                    );
                }
            }
            if report.is_clean() {
                0
            } else {
                2
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_integrity_repair(store: Arc<SqliteStore>, session: Option<&str>, apply: bool) -> i32 {
    let checker = IntegrityChecker::new(store);
    let plan = match checker.plan(session) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if plan.is_empty() {
        println!("Nothing to repair.");
        return 0;
    }
    match checker.apply(&plan, !apply) {
        Ok(outcome) => {
            if outcome.dry_run {
                println!("Dry run: {} fixes planned (use --apply to run them)", outcome.planned);
                for op in &plan.ops {
                    println!("  {:?}", op);
                }
            } else {
                println!("Applied {} of {} fixes", outcome.applied, outcome.planned);
                for failure in &outcome.failures {
                    eprintln!("  failed: {}", failure);
                }
            }
            if outcome.failures.is_empty() {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("promisetrack=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Link { action, db } => {
            let store = match open_store(db) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            match action {
                LinkAction::Run {
                    session,
                    party,
                    scorer,
                    generate_cmd,
                    limit,
                    config,
                } => {
                    cmd_link_run(
                        store,
                        &session,
                        party,
                        &scorer,
                        generate_cmd.as_deref(),
                        limit,
                        config.as_ref(),
                    )
                    .await
                }
                LinkAction::Status { evidence_id } => cmd_link_status(&store, &evidence_id),
            }
        }
        Commands::Integrity { action, db } => {
            let store = match open_store(db) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            match action {
                IntegrityAction::Check { session, json } => {
                    cmd_integrity_check(store, session.as_deref(), json)
                }
                IntegrityAction::Repair { session, apply } => {
                    cmd_integrity_repair(store, session.as_deref(), apply)
                }
            }
        }
    };
    std::process::exit(code);
}
