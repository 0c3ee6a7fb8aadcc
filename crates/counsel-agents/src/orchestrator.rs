//! Research loop — the evidence-gated Planner→Retriever→Analyzer→Critic
//! cycle with a bounded refinement budget.
//!
//! The loop is driven through the [`StateMachine`] so every transition
//! lands in the audit log. Synthesis runs only after a critic pass; a
//! run that exhausts its budget returns its best draft together with
//! the outstanding violations instead of an unvetted report.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use evidence::{Critic, DraftSection, RefinementDirective, Report, Violation};

use crate::analyzer::Analyzer;
use crate::audit::{AuditLog, AuditRecord, IterationRecord, PackSummary, RunSummary};
use crate::planner::Planner;
use crate::retriever::Retriever;
use crate::state_machine::{LoopState, RunStatus, StateMachine};
use crate::synthesizer::Synthesizer;

/// The outcome of one research run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    /// Present only when the critic passed.
    pub report: Option<Report>,
    /// The draft with the fewest violations seen across iterations.
    pub best_draft: Vec<DraftSection>,
    /// Violations outstanding on the best draft (empty on a pass).
    pub violations: Vec<Violation>,
    pub iterations: u32,
}

pub struct ResearchOrchestrator {
    planner: Planner,
    retriever: Retriever,
    analyzer: Analyzer,
    critic: Critic,
    synthesizer: Synthesizer,
    audit: Arc<AuditLog>,
    as_of: NaiveDate,
    /// How many refinement iterations may follow the first attempt.
    max_refinements: u32,
    cancel: CancellationToken,
}

impl ResearchOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        planner: Planner,
        retriever: Retriever,
        analyzer: Analyzer,
        critic: Critic,
        synthesizer: Synthesizer,
        audit: Arc<AuditLog>,
        as_of: NaiveDate,
        max_refinements: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            planner,
            retriever,
            analyzer,
            critic,
            synthesizer,
            audit,
            as_of,
            max_refinements,
            cancel,
        }
    }

    /// Run the research loop to a terminal state.
    pub async fn run(&self, question: &str) -> anyhow::Result<RunOutcome> {
        let run_id = Uuid::new_v4().to_string();
        info!(%run_id, question, as_of = %self.as_of, "Starting research run");
        self.audit.append(&AuditRecord::RunStarted {
            run_id: run_id.clone(),
            question: question.to_string(),
            as_of_date: self.as_of,
            prompt_version: crate::prompts::PROMPT_VERSION.to_string(),
        })?;

        let mut sm = StateMachine::new();
        let mut directive: Option<RefinementDirective> = None;
        let mut best_draft: Vec<DraftSection> = Vec::new();
        let mut best_violations: Vec<Violation> = Vec::new();
        let mut have_best = false;
        let mut report = None;
        let max_attempts = self.max_refinements + 1;

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                warn!(%run_id, "Run cancelled");
                sm.fail("cancelled")?;
                break;
            }
            sm.set_iteration(attempt);

            let plan = self.planner.plan(question, directive.as_ref());
            sm.advance(LoopState::Retrieving, None)?;

            let round = self.retriever.retrieve_all(&plan, self.as_of).await;
            if round.total_outage() {
                warn!(%run_id, "All retrieval facets unavailable, aborting run");
                self.audit.append(&AuditRecord::Iteration(IterationRecord {
                    iteration: attempt,
                    plan,
                    packs: round.packs.values().map(PackSummary::of).collect(),
                    draft: Vec::new(),
                    verdict: None,
                }))?;
                sm.fail("retrieval backend unavailable")?;
                break;
            }

            sm.advance(LoopState::Analyzing, None)?;
            let draft = self.analyzer.draft(question, &round.packs).await;

            sm.advance(LoopState::Critiquing, None)?;
            let verdict = self.critic.review(&draft, &round.packs);

            self.audit.append(&AuditRecord::Iteration(IterationRecord {
                iteration: attempt,
                plan,
                packs: round.packs.values().map(PackSummary::of).collect(),
                draft: draft.clone(),
                verdict: Some(verdict.clone()),
            }))?;

            if !have_best || verdict.violations.len() < best_violations.len() {
                best_draft = draft.clone();
                best_violations = verdict.violations.clone();
                have_best = true;
            }

            if verdict.passed {
                info!(%run_id, iteration = attempt, "Critic passed, synthesizing report");
                sm.advance(LoopState::Passed, Some("all gates clean"))?;
                report = Some(
                    self.synthesizer
                        .synthesize(question, self.as_of, draft, &round.packs)
                        .await,
                );
                break;
            }

            let rules: Vec<String> =
                verdict.violations.iter().map(|v| v.rule.to_string()).collect();
            if attempt < max_attempts {
                info!(
                    %run_id,
                    iteration = attempt,
                    violations = verdict.violations.len(),
                    rules = ?rules,
                    "Critic found violations, refining"
                );
                sm.advance(LoopState::Refining, Some(&rules.join(", ")))?;
                sm.advance(LoopState::Planning, None)?;
                directive = verdict.refinement_directive;
            } else {
                warn!(
                    %run_id,
                    iteration = attempt,
                    violations = verdict.violations.len(),
                    "Refinement budget exhausted"
                );
                sm.fail("refinement budget exhausted")?;
            }
        }

        let status = match sm.current() {
            LoopState::Passed => RunStatus::Passed,
            _ => RunStatus::FailedExhausted,
        };
        let iterations = sm.iteration();
        self.audit.append(&AuditRecord::RunFinished(RunSummary {
            run_id: run_id.clone(),
            question: question.to_string(),
            status,
            iterations,
        }))?;
        info!(%run_id, %status, iterations, history = %sm.summary(), "Research run finished");

        Ok(RunOutcome {
            run_id,
            status,
            report,
            best_draft,
            violations: if status == RunStatus::Passed {
                Vec::new()
            } else {
                best_violations
            },
            iterations,
        })
    }
}
