//! Supervisor
//!
//! The control loop: scan for opportunities, evaluate them against the
//! registry, spawn accepted ones through the factory, then monitor every
//! tracked agent through the treasury. One cycle runs at a time.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};

use super::child::{ChildAgent, ChildStatus, ChildSummary};
use super::config::{Config, SupervisorConfig};
use super::error::MoltiError;
use super::evaluator::{Decision, Evaluator};
use super::events::{CycleReport, SupervisorEvent, SupervisorState};
use super::persistence::PersistenceManager;
use super::registry::AgentRegistry;
use super::shutdown::Shutdown;
use crate::chain::ChainClient;
use crate::factory::{
    sequence_of, AgentFactory, FsTemplateStore, Registrar, StubRegistrar, TemplateStore,
};
use crate::signals::{
    ChatListener, HttpPostSource, Opportunity, SignalAggregator, StaticPostSource,
    TokenVolumeSource,
};
use crate::treasury::Treasury;

/// Top-level orchestrator holding loop state and collaborator handles
pub struct Supervisor {
    /// Loop configuration
    config: SupervisorConfig,

    /// Chain access, used for the parent wallet
    chain: Arc<dyn ChainClient>,

    /// Discovery over every configured source
    aggregator: SignalAggregator,

    /// Child agent creation pipeline
    factory: AgentFactory,

    /// Wallet bookkeeping
    treasury: Arc<Treasury>,

    /// Every agent ever spawned, in creation order
    registry: Arc<RwLock<AgentRegistry>>,

    /// Registry snapshot store; `None` when persistence is disabled
    persistence: Option<PersistenceManager>,

    /// Dedup and scoring gate
    evaluator: Evaluator,

    /// Event stream sender
    events: broadcast::Sender<SupervisorEvent>,

    /// Cooperative cancellation
    shutdown: Shutdown,

    state: Mutex<SupervisorState>,
    cycle: AtomicU64,
    started: AtomicBool,
}

impl Supervisor {
    /// Build a supervisor with the default collaborators for `config`:
    /// the static post and token sources, one HTTP source per feed, the
    /// filesystem template store and the stub registrar.
    pub fn from_config(
        config: &Config,
        chain: Arc<dyn ChainClient>,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let mut aggregator = SignalAggregator::new(&config.scanner)
            .with_source(Arc::new(StaticPostSource::new(
                "posts",
                config.scanner.posts.clone(),
            )))
            .with_source(Arc::new(TokenVolumeSource::new(
                "tokens",
                config.scanner.tokens.clone(),
            )));

        let timeout = Duration::from_secs(config.scanner.request_timeout_secs);
        for feed in &config.scanner.feeds {
            let source = HttpPostSource::new(&feed.name, &feed.url, timeout)
                .with_context(|| format!("Failed to create feed source '{}'", feed.name))?;
            aggregator.add_source(Arc::new(source));
        }

        let templates: Arc<dyn TemplateStore> =
            Arc::new(FsTemplateStore::from_config(&config.factory));
        let registrar: Arc<dyn Registrar> = Arc::new(StubRegistrar);

        Self::new(config, chain, aggregator, templates, registrar, shutdown)
    }

    /// Build a supervisor around injected collaborators
    pub fn new(
        config: &Config,
        chain: Arc<dyn ChainClient>,
        aggregator: SignalAggregator,
        templates: Arc<dyn TemplateStore>,
        registrar: Arc<dyn Registrar>,
        shutdown: Shutdown,
    ) -> Result<Self> {
        config.validate()?;

        let treasury = Arc::new(Treasury::new(Arc::clone(&chain), config.treasury.clone()));
        let factory = AgentFactory::new(
            Arc::clone(&chain),
            Arc::clone(&treasury),
            templates,
            registrar,
            config.factory.seed_amount,
        );

        let persistence = if config.persistence.enabled {
            Some(
                PersistenceManager::new(&config.persistence.data_dir)
                    .context("Failed to create persistence manager")?,
            )
        } else {
            None
        };

        let (events, _) = broadcast::channel(config.supervisor.event_capacity);

        Ok(Self {
            config: config.supervisor.clone(),
            chain,
            aggregator,
            factory,
            treasury,
            registry: Arc::new(RwLock::new(AgentRegistry::new())),
            persistence,
            evaluator: Evaluator::new(config.supervisor.score_threshold),
            events,
            shutdown,
            state: Mutex::new(SupervisorState::Idle),
            cycle: AtomicU64::new(0),
            started: AtomicBool::new(false),
        })
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    /// Channel for a live chat adapter; run the returned listener alongside the loop
    pub fn chat_channel(&self, capacity: usize) -> (mpsc::Sender<String>, ChatListener) {
        self.aggregator.chat_channel(capacity)
    }

    /// Count one live chat message towards trends
    pub fn analyze_message(&self, text: &str) -> Option<String> {
        self.aggregator.analyze_message(text)
    }

    pub fn registry(&self) -> Arc<RwLock<AgentRegistry>> {
        Arc::clone(&self.registry)
    }

    pub fn treasury(&self) -> Arc<Treasury> {
        Arc::clone(&self.treasury)
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Read-only view of every registered agent
    pub async fn agents(&self) -> Vec<ChildSummary> {
        self.registry.read().await.summaries()
    }

    pub fn state(&self) -> SupervisorState {
        *self.lock_state()
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }

    /// Restore the registry snapshot and start tracking its wallets.
    /// Only the first call has any effect.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(persistence) = &self.persistence {
            let agents = persistence
                .load_agents()
                .map_err(|e| MoltiError::PersistenceError(format!("{:#}", e)))?;

            let mut registry = self.registry.write().await;
            registry.restore(agents);

            let mut last_sequence = 0;
            for agent in registry.iter() {
                if agent.status != ChildStatus::Terminated {
                    self.treasury.track(&agent.id, &agent.wallet_address);
                }
                if let Some(seq) = sequence_of(&agent.id) {
                    last_sequence = last_sequence.max(seq);
                }
            }
            self.factory.resume_sequence(last_sequence);

            if !registry.is_empty() {
                info!("Restored {} agents from snapshot", registry.len());
            }
        }

        let parent = self.chain.parent_address();
        match self.chain.get_balance(&parent).await {
            Ok(balance) => info!("Parent wallet {} balance: {}", parent, balance),
            Err(e) => warn!("Could not read parent balance for {}: {:#}", parent, e),
        }

        Ok(())
    }

    /// Loop until shutdown: run a cycle, then sleep the scan interval, or the
    /// error backoff when the cycle failed. A shutdown request wakes the sleep.
    pub async fn run(&self) -> Result<()> {
        self.start().await?;
        info!("Supervisor starting main loop");

        while !self.shutdown.is_triggered() {
            let pause = match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        "Cycle {} complete: {} opportunities, {} spawned",
                        report.cycle,
                        report.opportunities,
                        report.spawned.len()
                    );
                    self.config.scan_interval_secs
                }
                Err(e) => {
                    let err = MoltiError::LoopFailure(format!("{:#}", e));
                    error!("{}", err);
                    self.emit(SupervisorEvent::CycleFailed {
                        message: err.to_string(),
                        backoff_secs: self.config.error_backoff_secs,
                    });
                    self.config.error_backoff_secs
                }
            };

            if self.shutdown.is_triggered() {
                break;
            }

            self.transition(SupervisorState::Sleeping);
            debug!("Sleeping {}s", pause);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(pause)) => {}
                _ = self.shutdown.wait() => {
                    info!("Shutdown requested, waking early");
                }
            }
        }

        self.stop().await
    }

    /// Start, run a single cycle and stop
    pub async fn run_once(&self) -> Result<CycleReport> {
        self.start().await?;
        let result = self.run_cycle().await;
        self.stop().await?;
        result
    }

    /// Enter `Stopped` and save the registry snapshot
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping supervisor");
        self.transition(SupervisorState::Stopped);

        let registry = self.registry.read().await;
        self.persist(&registry)?;
        info!("Supervisor stopped with {} agents registered", registry.len());
        Ok(())
    }

    /// One scan → evaluate → spawn → monitor pass
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        self.transition(SupervisorState::Scanning);
        info!("Cycle {}: scanning for opportunities", cycle);
        let scan = self.aggregator.scan_report().await;

        report.source_failures = scan.failures.len();
        for failure in &scan.failures {
            self.emit(SupervisorEvent::SourceFailed {
                message: failure.to_string(),
            });
        }

        report.opportunities = scan.opportunities.len();
        info!("Found {} opportunities", report.opportunities);

        if !scan.opportunities.is_empty() {
            self.transition(SupervisorState::Evaluating);
            for opportunity in scan.opportunities {
                self.evaluate_and_spawn(opportunity, &mut report).await?;
            }
        }

        self.transition(SupervisorState::Monitoring);
        self.monitor(&mut report).await;

        self.emit(SupervisorEvent::CycleCompleted {
            report: report.clone(),
        });
        Ok(report)
    }

    async fn evaluate_and_spawn(
        &self,
        mut opportunity: Opportunity,
        report: &mut CycleReport,
    ) -> Result<()> {
        let decision = {
            let registry = self.registry.read().await;
            self.evaluator.evaluate(&mut opportunity, &registry)
        };
        self.emit(SupervisorEvent::OpportunityEvaluated {
            opportunity: opportunity.clone(),
            decision: decision.clone(),
        });

        match decision {
            Decision::Duplicate { .. } => report.duplicates += 1,
            Decision::Rejected { .. } => report.rejected += 1,
            Decision::Accepted { score } => {
                info!(
                    "Spawning {} agent (score {}): {}",
                    opportunity.agent_type, score, opportunity.description
                );
                self.transition(SupervisorState::Spawning);

                let parent = self.chain.parent_address();
                match self
                    .factory
                    .create_agent(&opportunity.agent_type, &opportunity.description, &parent)
                    .await
                {
                    Ok(agent) => {
                        let agent_id = self.register_spawned(agent).await?;
                        report.spawned.push(agent_id);
                    }
                    Err(e) => {
                        warn!("{}", e);
                        report.spawn_failures += 1;
                        self.emit(SupervisorEvent::SpawnFailed {
                            agent_type: opportunity.agent_type.clone(),
                            message: e.to_string(),
                        });
                    }
                }

                self.transition(SupervisorState::Evaluating);
            }
        }

        Ok(())
    }

    async fn register_spawned(&self, agent: ChildAgent) -> Result<String> {
        let summary = agent.summary();
        let funded = agent.funded;

        self.treasury.track(&agent.id, &agent.wallet_address);

        let mut registry = self.registry.write().await;
        registry.insert(agent)?;
        self.persist(&registry)?;
        drop(registry);

        info!("Spawned {} ({})", summary.name, summary.id);
        if !funded {
            self.emit(SupervisorEvent::AgentUnfunded {
                agent_id: summary.id.clone(),
            });
        }
        let agent_id = summary.id.clone();
        self.emit(SupervisorEvent::AgentSpawned { agent: summary });
        Ok(agent_id)
    }

    /// Poll metrics for every tracked agent, flag underperformers, top up
    /// and collect where configured, then value the fleet
    async fn monitor(&self, report: &mut CycleReport) {
        let registry = self.registry.read().await;
        let now = Utc::now();
        let age_limit = ChronoDuration::hours(self.config.underperform_age_hours);

        for agent in registry.iter().filter(|a| a.status != ChildStatus::Terminated) {
            let metrics = self.treasury.get_agent_metrics(&agent.wallet_address).await;
            let age = agent.age_at(now);

            if metrics.executions < self.config.underperform_min_executions && age > age_limit {
                warn!(
                    "Agent {} underperforming: {} executions after {}h",
                    agent.id,
                    metrics.executions,
                    age.num_hours()
                );
                report.underperforming.push(agent.id.clone());
                self.emit(SupervisorEvent::Underperforming {
                    agent_id: agent.id.clone(),
                    executions: metrics.executions,
                    age_hours: age.num_hours(),
                });
            }

            if !metrics.is_active {
                report.inactive.push(agent.id.clone());
            }

            if !agent.is_active() {
                continue;
            }

            if self.config.auto_refund {
                // A wallet without a held key can receive but never spend
                if agent.key_material.is_none() {
                    warn!("Skipping top-up for {}: no signing key held", agent.id);
                    report.unsigned.push(agent.id.clone());
                } else {
                    match self.treasury.ensure_funding(&agent.wallet_address).await {
                        Ok(Some(_)) => report.refunded.push(agent.id.clone()),
                        Ok(None) => {}
                        Err(e) => warn!("Top-up for {} failed: {:#}", agent.id, e),
                    }
                }
            }

            if self.config.collect_revenue {
                match self.treasury.collect_revenue(agent).await {
                    Ok(Some(receipt)) => report.collected += receipt.amount,
                    Ok(None) => {}
                    Err(e) => warn!("Revenue collection from {} failed: {:#}", agent.id, e),
                }
            }
        }
        drop(registry);

        match self.treasury.get_total_value().await {
            Ok(snapshot) => {
                info!(
                    "Treasury: parent {} + {} agents {} = {}",
                    snapshot.parent_balance,
                    snapshot.child_balances.len(),
                    snapshot.children,
                    snapshot.total
                );
                report.snapshot = Some(snapshot);
            }
            Err(e) => warn!("Could not value treasury: {:#}", e),
        }
    }

    /// Stop counting an agent as serving its type
    pub async fn pause_agent(&self, agent_id: &str) -> Result<()> {
        self.change_status(agent_id, ChildStatus::Paused).await
    }

    /// Reactivate a paused agent, unless another active agent took over its type
    pub async fn resume_agent(&self, agent_id: &str) -> Result<()> {
        self.change_status(agent_id, ChildStatus::Active).await
    }

    /// Retire an agent for good and drop its wallet from valuation
    pub async fn terminate_agent(&self, agent_id: &str) -> Result<()> {
        self.change_status(agent_id, ChildStatus::Terminated).await?;
        self.treasury.untrack(agent_id);
        Ok(())
    }

    async fn change_status(&self, agent_id: &str, status: ChildStatus) -> Result<()> {
        let mut registry = self.registry.write().await;
        registry.set_status(agent_id, status)?;
        self.persist(&registry)?;
        drop(registry);

        self.emit(SupervisorEvent::AgentStatusChanged {
            agent_id: agent_id.to_string(),
            status,
        });
        Ok(())
    }

    fn persist(&self, registry: &AgentRegistry) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            persistence
                .save_registry(registry)
                .map_err(|e| MoltiError::PersistenceError(format!("{:#}", e)))?;
        }
        Ok(())
    }

    fn transition(&self, to: SupervisorState) {
        let from = {
            let mut state = self.lock_state();
            std::mem::replace(&mut *state, to)
        };
        if from != to {
            debug!("Supervisor state {} -> {}", from, to);
            self.emit(SupervisorEvent::StateChanged { from, to });
        }
    }

    fn emit(&self, event: SupervisorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SupervisorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
