//! Pipeline orchestrator
//!
//! One loop is `Start -> Plan -> Review -> Diff -> RiskGate -> Execute ->
//! Report -> Reflect -> Memorize -> SiteUpdate -> Retain -> End`. Each stage
//! writes its artifact before the next begins. The first stage error
//! abandons the rest: an error artifact is written and the loop goes
//! straight to End, which always releases the running slot.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use super::LoopRequest;
use super::context::{MEMORY_SNIPPETS, PlanningContext, RECENT_REFLECTIONS, RECENT_REPORTS, reflect_prompt};
use super::escalation::{EscalationPolicy, spawn_escalation};
use super::stage::Stage;
use super::strategist::{STRATEGY_REFLECTIONS, STRATEGY_REPORTS, accept_or_fallback, strategist_prompt};
use crate::collab::{Collaborators, Diagnosis};
use crate::config::Config;
use crate::daemon::{LoopStateManager, RecoveryAction, recover_interrupted};
use crate::domain::{ArtifactKind, ArtifactName, ExecutionResult, LoopRun, ReviewedStep, StatusRecord, plan_review_diff};
use crate::error::{KaizenError, Result};
use crate::failure::FailureStore;
use crate::gate::{AuditStep, GateAudit, RiskGate};
use crate::id::LoopId;
use crate::retention::{CleanupReport, RetentionPolicy};
use crate::site::{self, INDEX_LOOPS, IndexHeader, LoopPage};
use crate::storage::{ArtifactStore, JsonlStorage, LoopOutcome, LoopStore, Workspace};

const NO_STEPS_APPROVED: &str = "No steps passed the risk gate. Nothing was executed.";
const ALL_STEPS_SKIPPED: &str = "All steps skipped due to known failure patterns.";
const NO_REPORT: &str = "No execution report was generated.";

/// What one finished loop did
#[derive(Debug)]
pub struct LoopSummary {
    pub run: LoopRun,
    pub outcome: LoopOutcome,
    /// Last stage entered; the failing stage when the loop failed
    pub stage: Stage,
    /// Steps sent to the executor
    pub executed: usize,
    /// Steps held back by the failure store
    pub skipped: usize,
    /// Self-repair call started at End, if one was triggered
    pub escalation: Option<JoinHandle<Option<Diagnosis>>>,
}

impl LoopSummary {
    pub fn succeeded(&self) -> bool {
        self.outcome == LoopOutcome::Completed
    }
}

/// Result of a manual retention pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub cleanup: CleanupReport,
    pub purged: usize,
    /// Ledger entries dropped after their artifacts were purged
    pub compacted: usize,
}

/// Loop history counts over the loops the ledger still retains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub total: usize,
    pub unsuccessful: usize,
    /// Failed loops per stage, stages without failures omitted
    pub failed_by_stage: Vec<(Stage, usize)>,
}

#[derive(Debug)]
struct Progress {
    loop_id: LoopId,
    stage: Stage,
    executed: usize,
    skipped: usize,
}

impl Progress {
    fn new(loop_id: LoopId) -> Self {
        Self {
            loop_id,
            stage: Stage::Start,
            executed: 0,
            skipped: 0,
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        log::info!("Loop {}: {}", self.loop_id, stage);
    }
}

pub struct Orchestrator {
    workspace: Workspace,
    state: LoopStateManager,
    artifacts: ArtifactStore,
    ledger: JsonlStorage,
    failures: Mutex<FailureStore>,
    retention: RetentionPolicy,
    gate: RiskGate,
    escalation: EscalationPolicy,
    collab: Collaborators,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workspace", &self.workspace)
            .field("gate", &self.gate)
            .field("escalation", &self.escalation)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Open the workspace and every store in it
    pub fn new(config: &Config, collab: Collaborators) -> Result<Self> {
        let workspace = Workspace::from_config(&config.storage);
        workspace.ensure()?;

        let failures = FailureStore::open(
            workspace.failure_patterns_path(),
            workspace.requests_dir(),
            &config.failure,
        );
        log::info!(
            "Failure store: {} patterns, {} matcher",
            failures.len(),
            failures.strategy_name()
        );

        Ok(Self {
            state: LoopStateManager::open(workspace.status_path()),
            artifacts: ArtifactStore::new(workspace.clone()),
            ledger: JsonlStorage::new(&workspace.data_dir)?,
            failures: Mutex::new(failures),
            retention: RetentionPolicy::from_config(&config.retention),
            gate: RiskGate::from_config(&config.gate),
            escalation: EscalationPolicy::from_config(&config.escalation),
            workspace,
            collab,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    fn failures(&self) -> Result<MutexGuard<'_, FailureStore>> {
        self.failures.lock().map_err(|e| KaizenError::Storage(e.to_string()))
    }

    fn loops(&self) -> LoopStore<'_, JsonlStorage> {
        LoopStore::new(&self.ledger)
    }

    /// Reset a loop left running by a previous process
    pub fn recover(&self) -> Result<RecoveryAction> {
        recover_interrupted(&self.state, &self.artifacts, &self.ledger)
    }

    pub fn status(&self) -> Result<StatusRecord> {
        self.state.snapshot()
    }

    pub fn ledger_summary(&self) -> Result<LedgerSummary> {
        let loops = self.loops();
        let mut failed_by_stage = Vec::new();
        for stage in Stage::ALL {
            let count = loops.failed_at(stage.name())?.len();
            if count > 0 {
                failed_by_stage.push((stage, count));
            }
        }
        Ok(LedgerSummary {
            total: loops.list_all()?.len(),
            unsuccessful: loops.find_unsuccessful()?.len(),
            failed_by_stage,
        })
    }

    pub fn failure_summary(&self) -> Result<String> {
        Ok(self.failures()?.failure_summary())
    }

    /// Start a loop in the background unless one is running
    pub fn request_loop(self: &Arc<Self>) -> LoopRequest {
        match self.state.try_begin() {
            Ok(Some(run)) => {
                let id = run.id;
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    this.drive(run).await;
                });
                LoopRequest::Started(id)
            }
            Ok(None) => LoopRequest::AlreadyRunning,
            Err(e) => {
                log::error!("Could not start loop: {}", e);
                LoopRequest::Failed(e.to_string())
            }
        }
    }

    /// Run one loop in the foreground; None when another loop is running
    pub async fn run_once(&self) -> Result<Option<LoopSummary>> {
        let Some(run) = self.state.try_begin()? else {
            log::info!("Loop request rejected, a loop is already running");
            return Ok(None);
        };
        Ok(Some(self.drive(run).await))
    }

    async fn drive(&self, mut run: LoopRun) -> LoopSummary {
        let mut progress = Progress::new(run.id);
        log::info!("Loop {}: {} (ordinal {})", run.id, Stage::Start, run.ordinal);

        let cleanup = self.retention.cleanup(&self.workspace);
        if !cleanup.is_empty() {
            log::info!(
                "Loop {}: hard cap purged {} artifacts and {} pages",
                run.id,
                cleanup.artifacts_purged,
                cleanup.pages_purged
            );
        }
        if let Err(e) = self.loops().record_start(&run) {
            log::warn!("Loop {}: failed to record start in ledger: {}", run.id, e);
        }

        let result = self.run_stages(&run, &mut progress).await;
        let outcome = match &result {
            Ok(()) => LoopOutcome::Completed,
            Err(e) => {
                log::error!("Loop {} failed at {}: {}", run.id, progress.stage, e);
                self.write_error(run.id, progress.stage, e);
                LoopOutcome::Failed {
                    stage: progress.stage.to_string(),
                    message: e.to_string(),
                }
            }
        };

        log::info!("Loop {}: {}", run.id, Stage::End);
        if let Err(e) = self.state.end(&mut run) {
            log::error!("Loop {}: failed to persist idle status: {}", run.id, e);
        }
        if let Err(e) = self.loops().record_end(&run, outcome.clone()) {
            log::warn!("Loop {}: failed to record end in ledger: {}", run.id, e);
        }

        let escalation = self
            .escalation
            .trigger_for(run.ordinal, result.as_ref().err())
            .map(|trigger| spawn_escalation(Arc::clone(&self.collab.self_repair), run.id, trigger));

        LoopSummary {
            run,
            outcome,
            stage: progress.stage,
            executed: progress.executed,
            skipped: progress.skipped,
            escalation,
        }
    }

    async fn run_stages(&self, run: &LoopRun, progress: &mut Progress) -> Result<()> {
        let id = run.id;

        progress.enter(Stage::Plan);
        let context = self.planning_context(run).await?;
        let plan = self.collab.agents.plan(&context.render()).await?;
        self.artifacts.write_json(id, ArtifactKind::Plan, &plan)?;
        log::info!("Loop {}: planned {} steps", id, plan.steps.len());

        progress.enter(Stage::Review);
        let review = self.collab.agents.review(&plan).await?;
        self.artifacts.write_json(id, ArtifactKind::Review, &review)?;

        progress.enter(Stage::Diff);
        let diff = plan_review_diff(&plan, &review);
        self.artifacts.write_text(id, ArtifactKind::Diff, &diff)?;

        progress.enter(Stage::RiskGate);
        let gated = self.gate.apply(&review.approved_steps);
        let mut audit = GateAudit::new(&self.gate, &gated);
        let (batch, skipped) = self.screen_known_failures(id, &gated.approved)?;
        audit.skipped_known_failure = skipped;
        self.artifacts.write_json(id, ArtifactKind::Gate, &audit)?;
        log::info!(
            "Loop {}: gate approved {}, excluded {}, truncated {}, skipped {}",
            id,
            gated.approved.len(),
            gated.excluded.len(),
            gated.truncated.len(),
            audit.skipped_known_failure.len()
        );
        progress.skipped = audit.skipped_known_failure.len();

        progress.enter(Stage::Execute);
        let result = if batch.is_empty() {
            let report = if gated.approved.is_empty() { NO_STEPS_APPROVED } else { ALL_STEPS_SKIPPED };
            log::info!("Loop {}: executor not called: {}", id, report);
            ExecutionResult::not_executed(report)
        } else {
            progress.executed = batch.len();
            self.collab.executor.execute(&batch).await?
        };
        self.learn_failures(id, &batch, &result)?;

        progress.enter(Stage::Report);
        let report_md = if result.final_report_md.trim().is_empty() {
            NO_REPORT.to_string()
        } else {
            result.final_report_md.clone()
        };
        self.artifacts.write_text(id, ArtifactKind::Report, &report_md)?;

        progress.enter(Stage::Reflect);
        let prompt = reflect_prompt(&plan.spec_md, &review.summary_md, &report_md);
        let reflection = self.collab.agents.reflect(&prompt).await?;
        self.artifacts.write_text(id, ArtifactKind::Reflection, &reflection.reflection_md)?;

        progress.enter(Stage::Memorize);
        self.memorize(id, &report_md, &reflection.reflection_md).await;

        progress.enter(Stage::SiteUpdate);
        let page = LoopPage {
            loop_id: id,
            ordinal: run.ordinal,
            spec_md: plan.spec_md.clone(),
            diff,
            review_summary: review.summary_md.clone(),
            report_md,
            reflection_md: reflection.reflection_md,
        };
        let header = IndexHeader {
            ordinal: run.ordinal,
            escalation_runs: self.escalation.escalation_runs(run.ordinal),
            cadence: self.escalation.cadence,
        };
        let recent = self.loops().recent(INDEX_LOOPS)?;
        site::publish(&self.workspace, &page, header, &recent)?;

        progress.enter(Stage::Retain);
        let ordinals = self.loops().ordinals()?;
        let purged = self.retention.retain(&self.artifacts, &ordinals, run.ordinal);
        if !purged.is_empty() {
            log::info!("Loop {}: retention purged {} files", id, purged.len());
        }
        let compacted = self.compact_ledger(run.ordinal)?;
        if compacted > 0 {
            log::info!("Loop {}: dropped {} ledger entries", id, compacted);
        }

        Ok(())
    }

    /// Drop ledger entries for loops retention no longer keeps
    ///
    /// An entry stays while any of its loop's artifacts remain on disk, so
    /// a file that failed to purge can still be matched to its ordinal.
    fn compact_ledger(&self, latest: u64) -> Result<usize> {
        let on_disk: HashSet<LoopId> = self
            .artifacts
            .artifact_files()
            .iter()
            .filter_map(|path| path.file_name()?.to_str().and_then(ArtifactName::parse))
            .map(|name| name.loop_id)
            .collect();
        let policy = &self.retention.logarithmic;
        self.loops().compact(|entry| {
            policy.keeps(entry.ordinal, latest) || entry.loop_id().is_some_and(|id| on_disk.contains(&id))
        })
    }

    async fn planning_context(&self, run: &LoopRun) -> Result<PlanningContext> {
        let mission = PlanningContext::mission_or_default(self.artifacts.read_mission());
        let memories = match self.collab.memory.query(&mission, MEMORY_SNIPPETS).await {
            Ok(memories) => memories,
            Err(e) => {
                log::warn!("Loop {}: memory query failed, continuing without: {}", run.id, e);
                Vec::new()
            }
        };
        let failure_summary = self.failures()?.failure_summary();

        Ok(PlanningContext {
            mission,
            ordinal: run.ordinal,
            memories,
            reflections: self.artifacts.recent_reflections(RECENT_REFLECTIONS),
            reports: self.artifacts.recent_report_names(RECENT_REPORTS),
            failure_summary,
        })
    }

    /// Split gate-approved steps into the executor batch and known failures
    fn screen_known_failures(&self, id: LoopId, approved: &[ReviewedStep]) -> Result<(Vec<ReviewedStep>, Vec<AuditStep>)> {
        let failures = self.failures()?;
        let mut batch = Vec::with_capacity(approved.len());
        let mut skipped = Vec::new();

        for step in approved {
            match failures.should_skip(&step.bash) {
                Some(reason) => {
                    log::info!("Loop {}: skipping '{}': {}", id, step.title, reason);
                    skipped.push(AuditStep::new(step, Some(reason)));
                }
                None => batch.push(step.clone()),
            }
        }
        Ok((batch, skipped))
    }

    fn learn_failures(&self, id: LoopId, batch: &[ReviewedStep], result: &ExecutionResult) -> Result<()> {
        if !result.has_failures() {
            return Ok(());
        }
        let mut failures = self.failures()?;
        for failure in &result.failed {
            let command = if failure.bash.is_empty() {
                batch
                    .iter()
                    .find(|step| step.title == failure.title)
                    .map(|step| step.bash.as_str())
                    .unwrap_or_default()
            } else {
                failure.bash.as_str()
            };
            if command.is_empty() {
                log::warn!("Loop {}: failed step '{}' has no command, not learned", id, failure.title);
                continue;
            }
            failures.learn_failure(command, &failure.stderr, &failure.title)?;
        }
        Ok(())
    }

    async fn memorize(&self, id: LoopId, report_md: &str, reflection_md: &str) {
        let entries = [
            (format!("report_{}", id), report_md),
            (format!("reflection_{}", id), reflection_md),
        ];
        for (key, text) in entries {
            if let Err(e) = self.collab.memory.add(&key, text).await {
                log::warn!("Loop {}: memory add {} failed: {}", id, key, e);
            }
        }
    }

    fn write_error(&self, id: LoopId, stage: Stage, error: &KaizenError) {
        let text = format!("Loop {} failed at stage {}\n\n{}\n", id, stage, error);
        if let Err(e) = self.artifacts.write_text(id, ArtifactKind::Error, &text) {
            log::error!("Loop {}: failed to write error artifact: {}", id, e);
        }
    }

    /// Ask the strategist for a new mission and persist it
    pub async fn strategize(&self) -> Result<String> {
        let reflections = self.artifacts.recent_reflections(STRATEGY_REFLECTIONS);
        let reports = self.artifacts.recent_report_names(STRATEGY_REPORTS);
        let update = self
            .collab
            .agents
            .strategize(&strategist_prompt(&reflections, &reports))
            .await?;

        let mission = accept_or_fallback(&update.mission_md);
        self.artifacts.write_mission(&mission)?;
        log::info!("New mission: {}", mission);
        Ok(mission)
    }

    /// Invoke self-repair directly with `reason`
    pub async fn escalate(&self, reason: &str) -> Result<Diagnosis> {
        log::warn!("Manual escalation: {}", reason);
        self.collab.self_repair.improve(reason).await
    }

    /// Run both retention rules against the latest recorded ordinal
    pub fn apply_retention(&self) -> Result<RetentionReport> {
        let cleanup = self.retention.cleanup(&self.workspace);
        let latest = self.state.snapshot()?.ordinal;
        let ordinals = self.loops().ordinals()?;
        let purged = self.retention.retain(&self.artifacts, &ordinals, latest).len();
        let compacted = self.compact_ledger(latest)?;
        log::info!(
            "Retention: {} artifacts and {} pages over the hard cap, {} purged by ordinal, {} ledger entries dropped",
            cleanup.artifacts_purged,
            cleanup.pages_purged,
            purged,
            compacted
        );
        Ok(RetentionReport {
            cleanup,
            purged,
            compacted,
        })
    }
}
