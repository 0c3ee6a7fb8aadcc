use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use counsel_agents::analyzer::Analyzer;
use counsel_agents::audit::AuditLog;
use counsel_agents::completion::OpenAiBackend;
use counsel_agents::config::ResearchConfig;
use counsel_agents::orchestrator::ResearchOrchestrator;
use counsel_agents::planner::Planner;
use counsel_agents::retrieval::{HttpSearchBackend, RetrievalGateway};
use counsel_agents::retriever::Retriever;
use counsel_agents::state_machine::RunStatus;
use counsel_agents::synthesizer::Synthesizer;
use evidence::Critic;

/// Evidence-gated legal research over a retrieval corpus.
#[derive(Parser, Debug)]
#[command(name = "counsel-agents", version, about)]
struct Cli {
    /// The research question to answer.
    question: String,

    /// Evaluate legal validity as of this date (YYYY-MM-DD, default today).
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Refinement iterations allowed after the first attempt.
    #[arg(long)]
    max_refinements: Option<u32>,

    /// Where to append the JSONL audit log.
    #[arg(long)]
    audit_path: Option<PathBuf>,

    /// Optional TOML config overlay.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ResearchConfig::load(cli.config.as_deref())?;
    if let Some(as_of) = cli.as_of {
        config.as_of_date = Some(as_of);
    }
    if let Some(max) = cli.max_refinements {
        config.max_refinement_iterations = max;
    }
    if let Some(path) = cli.audit_path {
        config.audit_path = path;
    }

    let as_of = config.as_of();
    info!(
        retrieval = %config.retrieval.url,
        completion = %config.completion.url,
        %as_of,
        "Counsel agents starting"
    );

    let completion: Arc<dyn counsel_agents::completion::CompletionBackend> =
        Arc::new(OpenAiBackend::new(
            config.completion.clone(),
            config.request_timeout_secs,
            config.max_backoff_attempts,
        ));
    let search = Arc::new(HttpSearchBackend::new(
        config.retrieval.clone(),
        config.request_timeout_secs,
    ));
    let audit = Arc::new(AuditLog::new(config.audit_path.clone()));

    let orchestrator = ResearchOrchestrator::new(
        Planner::new(config.filters()),
        Retriever::new(RetrievalGateway::new(search, config.max_backoff_attempts)),
        Analyzer::new(completion.clone()),
        Critic::default(),
        Synthesizer::new(completion),
        audit,
        as_of,
        config.max_refinement_iterations,
        CancellationToken::new(),
    );

    let outcome = orchestrator.run(&cli.question).await?;
    match (outcome.status, &outcome.report) {
        (RunStatus::Passed, Some(report)) => {
            println!("{}", report.render_markdown());
        }
        (status, _) => {
            warn!(%status, iterations = outcome.iterations, "Run did not pass");
            eprintln!("Run {} ended as {status} after {} iterations.", outcome.run_id, outcome.iterations);
            for violation in &outcome.violations {
                eprintln!("- [{}] {}: {}", violation.rule, violation.facet, violation.detail);
            }
            std::process::exit(1);
        }
    }

    Ok(())
}
