//! Multi-agent, evidence-gated legal research orchestrator.
//!
//! Turns a free-text legal question into a citation-backed report via a
//! bounded Planner → Retriever → Analyzer → Critic → Synthesizer loop.
//! Components exchange immutable snapshots and return new values; the
//! loop's `StateMachine` is the single piece of mutable run state.
//! Critic rejections are data, not errors — they drive the refinement
//! loop instead of aborting the run.

pub mod analyzer;
pub mod audit;
pub mod completion;
pub mod config;
pub mod contracts;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod retrieval;
pub mod retriever;
pub mod state_machine;
pub mod synthesizer;
