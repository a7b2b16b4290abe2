//! Recording collaborators for tests and dry runs
//!
//! Each mock answers with a configured reply and records what it was asked.
//! Replies can be switched between calls, so one mock can serve a sequence
//! of loops.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{Agents, Diagnosis, Memory, SelfRepair, StepExecutor};
use crate::domain::{ExecutionResult, MissionUpdate, Plan, ProposedStep, Reflection, Review, ReviewedStep};
use crate::error::{KaizenError, Result};

/// What a mocked call answers with
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Timeout,
    ParseError,
    Unavailable,
}

impl<T: Clone> Reply<T> {
    fn resolve(&self, service: &str) -> Result<T> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Timeout => Err(KaizenError::timeout(service, 1)),
            Reply::ParseError => Err(KaizenError::parse(service, "unexpected response shape")),
            Reply::Unavailable => Err(KaizenError::collaborator(service, "connection refused")),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Agents with fixed replies
#[derive(Debug)]
pub struct MockAgents {
    plan: Mutex<Reply<Plan>>,
    review: Mutex<Reply<Review>>,
    reflection: Mutex<Reply<Reflection>>,
    mission: Mutex<Reply<MissionUpdate>>,
    plan_contexts: Mutex<Vec<String>>,
    reviewed_plans: Mutex<Vec<Plan>>,
    reflect_prompts: Mutex<Vec<String>>,
    strategize_prompts: Mutex<Vec<String>>,
}

impl Default for MockAgents {
    fn default() -> Self {
        Self {
            plan: Mutex::new(Reply::Ok(Plan {
                steps: vec![ProposedStep::new("List files", "ls")],
                spec_md: "Look around.".into(),
                todo_md: None,
            })),
            review: Mutex::new(Reply::Ok(Review {
                approved_steps: vec![ReviewedStep::new("List files", "ls", Some(0.1))],
                rejected: Vec::new(),
                summary_md: "Looks safe.".into(),
            })),
            reflection: Mutex::new(Reply::Ok(Reflection {
                reflection_md: "KEY LESSON: listing works.".into(),
            })),
            mission: Mutex::new(Reply::Ok(MissionUpdate {
                mission_md: "Keep the dashboard fast.".into(),
            })),
            plan_contexts: Mutex::new(Vec::new()),
            reviewed_plans: Mutex::new(Vec::new()),
            reflect_prompts: Mutex::new(Vec::new()),
            strategize_prompts: Mutex::new(Vec::new()),
        }
    }
}

impl MockAgents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, plan: Reply<Plan>) -> Self {
        *lock(&self.plan) = plan;
        self
    }

    pub fn with_review(self, review: Reply<Review>) -> Self {
        *lock(&self.review) = review;
        self
    }

    pub fn with_reflection(self, reflection: Reply<Reflection>) -> Self {
        *lock(&self.reflection) = reflection;
        self
    }

    pub fn with_mission(self, mission: Reply<MissionUpdate>) -> Self {
        *lock(&self.mission) = mission;
        self
    }

    pub fn set_plan(&self, plan: Reply<Plan>) {
        *lock(&self.plan) = plan;
    }

    pub fn set_review(&self, review: Reply<Review>) {
        *lock(&self.review) = review;
    }

    /// Contexts passed to `plan`, in call order
    pub fn plan_contexts(&self) -> Vec<String> {
        lock(&self.plan_contexts).clone()
    }

    pub fn reviewed_plans(&self) -> Vec<Plan> {
        lock(&self.reviewed_plans).clone()
    }

    pub fn reflect_prompts(&self) -> Vec<String> {
        lock(&self.reflect_prompts).clone()
    }

    pub fn strategize_prompts(&self) -> Vec<String> {
        lock(&self.strategize_prompts).clone()
    }
}

#[async_trait]
impl Agents for MockAgents {
    async fn plan(&self, context: &str) -> Result<Plan> {
        lock(&self.plan_contexts).push(context.to_string());
        lock(&self.plan).resolve("plan")
    }

    async fn review(&self, plan: &Plan) -> Result<Review> {
        lock(&self.reviewed_plans).push(plan.clone());
        lock(&self.review).resolve("review")
    }

    async fn reflect(&self, prompt: &str) -> Result<Reflection> {
        lock(&self.reflect_prompts).push(prompt.to_string());
        lock(&self.reflection).resolve("reflect")
    }

    async fn strategize(&self, prompt: &str) -> Result<MissionUpdate> {
        lock(&self.strategize_prompts).push(prompt.to_string());
        lock(&self.mission).resolve("strategize")
    }
}

/// In-memory long-term memory
#[derive(Debug, Default)]
pub struct MockMemory {
    entries: Mutex<Vec<(String, String)>>,
    snippets: Vec<String>,
    failing: bool,
}

impl MockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory whose queries return `snippets`
    pub fn with_snippets(snippets: Vec<String>) -> Self {
        Self {
            snippets,
            ..Default::default()
        }
    }

    /// Memory whose every call fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// `(id, text)` pairs added so far
    pub fn entries(&self) -> Vec<(String, String)> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl Memory for MockMemory {
    async fn add(&self, id: &str, text: &str) -> Result<()> {
        if self.failing {
            return Err(KaizenError::collaborator("memory", "connection refused"));
        }
        lock(&self.entries).push((id.to_string(), text.to_string()));
        Ok(())
    }

    async fn query(&self, _query: &str, top_k: usize) -> Result<Vec<String>> {
        if self.failing {
            return Err(KaizenError::collaborator("memory", "connection refused"));
        }
        Ok(self.snippets.iter().take(top_k).cloned().collect())
    }
}

/// Executor that records every batch it is given
#[derive(Debug)]
pub struct MockExecutor {
    reply: Mutex<Reply<ExecutionResult>>,
    batches: Mutex<Vec<Vec<ReviewedStep>>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new(Reply::Ok(ExecutionResult::not_executed("All steps succeeded.")))
    }
}

impl MockExecutor {
    pub fn new(reply: Reply<ExecutionResult>) -> Self {
        Self {
            reply: Mutex::new(reply),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: Reply<ExecutionResult>) {
        *lock(&self.reply) = reply;
    }

    pub fn batches(&self) -> Vec<Vec<ReviewedStep>> {
        lock(&self.batches).clone()
    }
}

#[async_trait]
impl StepExecutor for MockExecutor {
    async fn execute(&self, steps: &[ReviewedStep]) -> Result<ExecutionResult> {
        lock(&self.batches).push(steps.to_vec());
        lock(&self.reply).resolve("executor")
    }
}

/// Self-repair agent that records its triggers
#[derive(Debug, Default)]
pub struct MockSelfRepair {
    triggers: Mutex<Vec<String>>,
    failing: bool,
}

impl MockSelfRepair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn triggers(&self) -> Vec<String> {
        lock(&self.triggers).clone()
    }
}

#[async_trait]
impl SelfRepair for MockSelfRepair {
    async fn improve(&self, trigger: &str) -> Result<Diagnosis> {
        lock(&self.triggers).push(trigger.to_string());
        if self.failing {
            return Err(KaizenError::collaborator("self_repair", "connection refused"));
        }
        Ok(Diagnosis {
            diagnosis: format!("looked into {}", trigger),
            extra: Default::default(),
        })
    }
}
