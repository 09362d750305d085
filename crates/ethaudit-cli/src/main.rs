//! ethaudit - AI ethics risk assessment CLI
//!
//! Runs the evaluation pipeline over local evidence and clause snapshots.
//!
//! ## Commands
//!
//! - `run`: assess a company in a domain and write a Markdown report
//! - `resume`: continue a persisted run from its latest checkpoint
//! - `show`: print a persisted run and its checkpoint history
//! - `runs`: list persisted runs
//! - `grade`: map a 0-100 ethics score to its letter grade

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use ethaudit_core::{
    Collaborators, EngineConfig, Grade, JsonFileCollector, LexicalClauseIndex,
    MarkdownReportRenderer, Pipeline, RuleJudge, RunStage, RunState, SourceType,
};
use ethaudit_state::{FsRunStore, RunStore};

#[derive(Parser)]
#[command(name = "ethaudit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evidence-based AI ethics risk assessment", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Engine configuration (TOML)
    #[arg(long, global = true, env = "ETHAUDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding run checkpoints
    #[arg(long, global = true, env = "ETHAUDIT_STATE_DIR", default_value = ".ethaudit/runs")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Offline evidence and clause snapshots.
#[derive(Args, Debug, Clone)]
struct Sources {
    /// Web documents (JSON array)
    #[arg(long, env = "ETHAUDIT_WEB_DOCS")]
    web_docs: PathBuf,

    /// Specialized-source documents (JSON array)
    #[arg(long, env = "ETHAUDIT_SPECIALIZED_DOCS")]
    specialized_docs: PathBuf,

    /// Regulatory clause snapshot (JSON array)
    #[arg(long, env = "ETHAUDIT_CLAUSES")]
    clauses: PathBuf,

    /// Directory reports are written to
    #[arg(long, env = "ETHAUDIT_REPORT_DIR", default_value = "reports")]
    report_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a company's AI systems in a domain
    Run {
        /// Company name
        #[arg(short, long)]
        company: String,

        /// Application domain (medical, finance, recruitment, ...)
        #[arg(short, long)]
        domain: String,

        #[command(flatten)]
        sources: Sources,

        /// Print the final run state as JSON
        #[arg(long)]
        output_json: bool,
    },

    /// Continue a persisted run from its latest checkpoint
    Resume {
        /// Run id
        run_id: String,

        #[command(flatten)]
        sources: Sources,

        /// Print the final run state as JSON
        #[arg(long)]
        output_json: bool,
    },

    /// Show a persisted run
    Show {
        /// Run id
        run_id: String,

        /// Also list every checkpoint
        #[arg(long)]
        history: bool,
    },

    /// List persisted runs
    Runs,

    /// Map an ethics score to its letter grade
    Grade {
        /// Score in 0..=100
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        score: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    ethaudit_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            company,
            domain,
            sources,
            output_json,
        } => {
            let pipeline = build_pipeline(cli.config.as_deref(), &cli.state_dir, &sources)?;
            let run = pipeline
                .run(&company, &domain)
                .await
                .context("Evaluation run aborted")?;
            finish(&run, output_json)
        }
        Commands::Resume {
            run_id,
            sources,
            output_json,
        } => {
            let pipeline = build_pipeline(cli.config.as_deref(), &cli.state_dir, &sources)?;
            let run = pipeline
                .resume(&run_id)
                .await
                .context(format!("Failed to resume run {run_id}"))?;
            finish(&run, output_json)
        }
        Commands::Show { run_id, history } => cmd_show(&cli.state_dir, &run_id, history).await,
        Commands::Runs => cmd_runs(&cli.state_dir).await,
        Commands::Grade { score } => {
            println!("{}", Grade::from_score(score));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .context(format!("Failed to load config from {:?}", path)),
        None => Ok(EngineConfig::default()),
    }
}

fn open_store(state_dir: &Path) -> Result<FsRunStore> {
    FsRunStore::new(state_dir).context(format!("Failed to open run store at {:?}", state_dir))
}

fn build_pipeline(config: Option<&Path>, state_dir: &Path, sources: &Sources) -> Result<Pipeline> {
    let config = load_config(config)?;
    let store = open_store(state_dir)?;
    let clauses = LexicalClauseIndex::load(&sources.clauses)
        .context(format!("Failed to load clause snapshot {:?}", sources.clauses))?;
    info!(clauses = clauses.len(), "clause snapshot loaded");

    let collaborators = Collaborators {
        web: Arc::new(JsonFileCollector::new(
            "web",
            SourceType::Web,
            &sources.web_docs,
        )),
        specialized: Arc::new(JsonFileCollector::new(
            "specialized",
            SourceType::Specialized,
            &sources.specialized_docs,
        )),
        clauses: Arc::new(clauses),
        judge: Arc::new(RuleJudge::new()),
        renderer: Arc::new(MarkdownReportRenderer::new(&sources.report_dir)),
    };
    Pipeline::new(collaborators, Arc::new(store), config).context("Invalid engine configuration")
}

/// One-screen view of a run.
#[derive(Debug, Serialize)]
struct RunSummary {
    run_id: String,
    company_name: String,
    domain: String,
    stage: RunStage,
    version: u64,
    retry_count: u32,
    documents: usize,
    ethics_score: Option<u8>,
    grade: Option<String>,
    risk_level: Option<String>,
    critical_issues: usize,
    report_path: Option<String>,
    limitations: Vec<String>,
}

impl RunSummary {
    fn of(run: &RunState) -> Self {
        let score = run.final_score.as_ref();
        Self {
            run_id: run.run_key(),
            company_name: run.company_name().to_string(),
            domain: run.domain().to_string(),
            stage: run.current_stage,
            version: run.version,
            retry_count: run.retry_count,
            documents: run.merged_documents.len(),
            ethics_score: score.map(|s| s.ethics_score),
            grade: score.map(|s| s.grade.to_string()),
            risk_level: score.map(|s| s.risk_level.to_string()),
            critical_issues: score.map(|s| s.critical_issues.len()).unwrap_or(0),
            report_path: run.report_path.clone(),
            limitations: run.limitations.clone(),
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("run      {}", summary.run_id);
    println!("company  {} ({})", summary.company_name, summary.domain);
    println!("stage    {} (v{})", summary.stage, summary.version);
    println!("retries  {}", summary.retry_count);
    println!("evidence {} documents", summary.documents);
    match summary.ethics_score {
        Some(score) => println!(
            "score    {score}/100 grade {} risk {}",
            summary.grade.as_deref().unwrap_or("-"),
            summary.risk_level.as_deref().unwrap_or("-")
        ),
        None => println!("score    -"),
    }
    if summary.critical_issues > 0 {
        println!("critical {} issue(s)", summary.critical_issues);
    }
    if let Some(path) = &summary.report_path {
        println!("report   {path}");
    }
    for limitation in &summary.limitations {
        println!("  limitation: {limitation}");
    }
}

fn finish(run: &RunState, output_json: bool) -> Result<()> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(run)?);
    } else {
        print_summary(&RunSummary::of(run));
    }
    if run.current_stage == RunStage::Failed {
        let reason = run
            .errors
            .iter()
            .rev()
            .find(|e| !e.recovered)
            .map(|e| e.error.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("run {} failed: {}", run.run_key(), reason);
    }
    Ok(())
}

async fn cmd_show(state_dir: &Path, run_id: &str, history: bool) -> Result<()> {
    let store = open_store(state_dir)?;
    let checkpoint = store
        .latest(run_id)
        .await
        .context(format!("Run not found: {run_id}"))?;
    let run: RunState = serde_json::from_value(checkpoint.state)
        .context(format!("Checkpoint for {run_id} is not a run state"))?;
    print_summary(&RunSummary::of(&run));

    if history {
        println!();
        for meta in store.history(run_id).await? {
            println!(
                "{:>4}  {:<10}  {}  {}",
                meta.seq,
                meta.stage,
                meta.digest.short(),
                meta.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
    Ok(())
}

async fn cmd_runs(state_dir: &Path) -> Result<()> {
    let store = open_store(state_dir)?;
    let runs = store.list_runs().await?;
    if runs.is_empty() {
        println!("No runs found in {:?}", state_dir);
        return Ok(());
    }
    for run_id in runs {
        let latest = store.latest(&run_id).await?;
        println!("{run_id}  {}", latest.meta.stage);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn grade_rejects_out_of_range_scores() {
        assert!(Cli::try_parse_from(["ethaudit", "grade", "101"]).is_err());
        assert!(Cli::try_parse_from(["ethaudit", "grade", "100"]).is_ok());
    }

    fn write_sources(dir: &Path) -> Sources {
        let web = dir.join("web.json");
        std::fs::write(
            &web,
            r#"[
              {"source_id": "w1", "url_or_ref": "https://acme.example/trust",
               "title": "Acme trust center", "reliability_score": 0.8,
               "excerpt": "We commit to human oversight and publish model documentation.",
               "topics": ["transparency", "human_oversight", "accountability"]}
            ]"#,
        )
        .unwrap();
        let specialized = dir.join("specialized.json");
        std::fs::write(&specialized, "[]").unwrap();
        let clauses = dir.join("clauses.json");
        std::fs::write(
            &clauses,
            r#"[
              {"clause_id": "art13", "text": "Transparency and provision of information to deployers", "category": "transparency"},
              {"clause_id": "art10", "text": "Data and data governance practices for training data", "category": "data_governance"},
              {"clause_id": "art17", "text": "Quality management system and accountability framework", "category": "accountability"},
              {"clause_id": "art15", "text": "Accuracy robustness and cybersecurity requirements", "category": "robustness"},
              {"clause_id": "art14", "text": "Human oversight requirements for high-risk AI systems", "category": "human_oversight"}
            ]"#,
        )
        .unwrap();
        Sources {
            web_docs: web,
            specialized_docs: specialized,
            clauses,
            report_dir: dir.join("reports"),
        }
    }

    #[tokio::test]
    async fn offline_run_writes_report_and_checkpoints() {
        let dir = tempdir().unwrap();
        let sources = write_sources(dir.path());
        let state_dir = dir.path().join("runs");

        let pipeline = build_pipeline(None, &state_dir, &sources).unwrap();
        let run = pipeline.run("Acme", "medical").await.unwrap();
        assert_eq!(run.current_stage, RunStage::Done);

        let report = PathBuf::from(run.report_path.clone().unwrap());
        assert!(report.starts_with(&sources.report_dir));
        let markdown = std::fs::read_to_string(report).unwrap();
        assert!(markdown.contains("Acme"));

        let store = open_store(&state_dir).unwrap();
        assert_eq!(store.list_runs().await.unwrap(), vec![run.run_key()]);
        finish(&run, false).unwrap();
    }

    #[test]
    fn missing_clause_snapshot_is_reported() {
        let dir = tempdir().unwrap();
        let mut sources = write_sources(dir.path());
        sources.clauses = dir.path().join("absent.json");
        let err = build_pipeline(None, &dir.path().join("runs"), &sources)
            .err()
            .unwrap();
        assert!(err.to_string().contains("clause snapshot"));
    }
}
