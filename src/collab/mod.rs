//! External collaborators
//!
//! The loop consumes four outside capabilities through narrow async traits:
//! the agents (plan, review, reflect, strategize), long-term memory, the
//! step executor and the self-repair agent. Production implementations talk
//! HTTP or spawn a process; `mock` holds recording stand-ins for tests.

mod executor;
mod http;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::domain::{ExecutionResult, MissionUpdate, Plan, Reflection, Review, ReviewedStep};
use crate::error::Result;

pub use executor::ScriptExecutor;
pub use http::{HttpAgents, HttpMemory, HttpSelfRepair, HttpService};

/// Planning, reviewing, reflecting and strategizing intelligence
#[async_trait]
pub trait Agents: Send + Sync {
    async fn plan(&self, context: &str) -> Result<Plan>;
    async fn review(&self, plan: &Plan) -> Result<Review>;
    async fn reflect(&self, prompt: &str) -> Result<Reflection>;
    async fn strategize(&self, prompt: &str) -> Result<MissionUpdate>;
}

/// Long-term semantic memory
#[async_trait]
pub trait Memory: Send + Sync {
    async fn add(&self, id: &str, text: &str) -> Result<()>;

    /// Up to `top_k` snippets ranked by relevance to `query`
    async fn query(&self, query: &str, top_k: usize) -> Result<Vec<String>>;
}

/// Batch shell-step executor
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, steps: &[ReviewedStep]) -> Result<ExecutionResult>;
}

/// Privileged self-repair agent
#[async_trait]
pub trait SelfRepair: Send + Sync {
    async fn improve(&self, trigger: &str) -> Result<Diagnosis>;
}

/// Self-repair answer; fields beyond `diagnosis` are passed through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The full set of collaborators one orchestrator works with
#[derive(Clone)]
pub struct Collaborators {
    pub agents: Arc<dyn Agents>,
    pub memory: Arc<dyn Memory>,
    pub executor: Arc<dyn StepExecutor>,
    pub self_repair: Arc<dyn SelfRepair>,
}

impl Collaborators {
    /// HTTP agents and memory, script executor, as configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoints = &config.collaborators;
        Ok(Self {
            agents: Arc::new(HttpAgents::new(
                &config.llm.model,
                HttpService::new("plan", &endpoints.plan)?,
                HttpService::new("review", &endpoints.review)?,
                HttpService::new("reflect", &endpoints.reflect)?,
                HttpService::new("strategize", &endpoints.strategize)?,
            )),
            memory: Arc::new(HttpMemory::new(&endpoints.memory)?),
            executor: Arc::new(ScriptExecutor::from_config(&config.executor)),
            self_repair: Arc::new(HttpSelfRepair::new(HttpService::new(
                "self_repair",
                &endpoints.self_repair,
            )?)),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
