//! Main entry point for the application.
//!
//! Loads the configuration, builds the inference backends, starts the health
//! monitor and wires the router, planner, executors and checkpoint store into
//! a workflow manager.
//!
//! The application can be started in different modes:
//! - Interactive: `--request "<what to do>"` plans, asks for approval and runs one workflow
//! - Server: `--api-enabled` exposes the workflow interface over HTTP
//!
//! Both may be combined.

mod cli;

use clap::Parser;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use std::error::Error;
use std::sync::Arc;
use taskweave::config::{load_app_config, StorageKind};
use taskweave::core::{
    ApprovalDecision, CleanupService, ExecutorRegistry, FetchExecutor, LlmPlanner,
    ManagerSettings, ModelExecutor, ReviewDecision, WorkflowManager, WorkflowPhase,
};
use taskweave::db::{MemoryStore, SqliteStore, WorkflowStore};
use taskweave::event::Event;
use taskweave::health::HealthMonitor;
use taskweave::llm::build_backends;
use taskweave::router::ModelRouter;
use taskweave::utils::{self, new_spinner, pause_and_update, render_event, render_plan};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{error, info, warn};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = cli::Cli::parse();
    if let Err(e) = utils::init_logging(&cli.logging_level, cli.log_to_file) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = dotenvy::dotenv() {
        warn!("Failed to load .env file: {}", e);
    }

    let mut config = load_app_config(&cli.config)?;
    if cli.auto_approve {
        config.orchestrator.auto_approve = true;
    }

    let backends = build_backends(&config.backends)?;
    if backends.is_empty() {
        warn!("No backend configured; every model task will fail");
    }

    let monitor = HealthMonitor::from_config(backends.clone(), &config.health)?;
    // First routing decisions should see real health, not the optimistic default.
    monitor.probe_once().await;
    let (health, _monitor_task) = monitor.spawn();

    let router = Arc::new(ModelRouter::new(
        backends.clone(),
        health.clone(),
        config.router.max_retries,
    )
    .with_backend_retries(
        config
            .backends
            .iter()
            .filter_map(|b| b.retries.map(|r| (b.name.clone(), r))),
    ));
    let executors = ExecutorRegistry::new()
        .register("fetch", Arc::new(FetchExecutor::new()))
        .with_fallback(Arc::new(ModelExecutor::new(
            Arc::clone(&router),
            config.orchestrator.task_capabilities.clone(),
        )));
    let planner = Arc::new(LlmPlanner::new(
        Arc::clone(&router),
        config.orchestrator.planner_capabilities.clone(),
    )?);

    let store: Arc<dyn WorkflowStore> = match config.storage.kind {
        StorageKind::Memory => Arc::new(MemoryStore::new()),
        StorageKind::Sqlite => Arc::new(SqliteStore::open(&config.storage.path)?),
    };

    let (events_tx, events_rx) = unbounded_channel();
    let settings = ManagerSettings::from_config(&config.orchestrator, backends.len());
    let manager = Arc::new(
        WorkflowManager::new(planner, executors, Arc::clone(&store), settings)
            .with_events(events_tx),
    );

    let recovered = manager.recover().await?;
    if recovered > 0 {
        info!("Recovered {} unfinished workflow(s)", recovered);
    }

    if config.cleanup.enabled {
        CleanupService::from_config(Arc::clone(&store), Arc::clone(&manager), &config.cleanup)?
            .spawn();
    }

    if cli.api_enabled {
        info!("Starting API server on port {}", cli.api_port);
        let manager = Arc::clone(&manager);
        let health = health.clone();
        let port = cli.api_port;
        tokio::spawn(async move {
            if let Err(e) = taskweave::api::server::launch_server(port, manager, health).await {
                error!("Failed to start server: {}", e);
            }
        });
    }

    match cli.request {
        Some(request) => run_interactive(&manager, &request, events_rx).await?,
        None if cli.api_enabled => {
            drain_events(events_rx);
            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
        }
        None => error!("Nothing to do: pass --request or --api-enabled"),
    }
    Ok(())
}

/// Logs events when nobody watches a terminal
fn drain_events(mut events: UnboundedReceiver<Event>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Event::PhaseChanged { .. } | Event::TaskFinished { .. } = event {
                info!("[{}] {}", event.thread_id(), render_event(&event));
            }
        }
    });
}

/// Runs one workflow in the terminal, asking for decisions as they come up
async fn run_interactive(
    manager: &Arc<WorkflowManager>,
    request: &str,
    mut events: UnboundedReceiver<Event>,
) -> Result<(), BoxError> {
    println!("{}", "\n🤖 Welcome to taskweave!".bold().cyan());

    let spinner = new_spinner();
    let printer = spinner.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            printer.println(render_event(&event));
        }
    });

    pause_and_update(&spinner, "Planning...");
    let thread_id = manager.create_workflow(request).await?;

    loop {
        let state = manager.wait_until_settled(&thread_id).await?;
        match state.phase {
            WorkflowPhase::AwaitingApproval => {
                let (decision, feedback) =
                    spinner.suspend(|| ask_approval(&render_plan(&state)))?;
                pause_and_update(&spinner, "Working...");
                manager
                    .submit_approval(&thread_id, decision, feedback)
                    .await?;
            }
            WorkflowPhase::AwaitingHumanReview => {
                let task = state
                    .pending_review
                    .and_then(|id| state.plan.get(id))
                    .map(|t| format!("Task {} ({}): {}", t.id, t.task_type, t.description))
                    .unwrap_or_default();
                let (decision, feedback) = spinner.suspend(|| ask_review(&task))?;
                pause_and_update(&spinner, "Working...");
                manager.submit_review(&thread_id, decision, feedback).await?;
            }
            _ => {
                spinner.finish_and_clear();
                match (&state.final_report, &state.user_feedback) {
                    (Some(report), _) => println!("\n{}", report),
                    (None, Some(feedback)) => {
                        println!("{} {}", "Plan rejected:".red().bold(), feedback)
                    }
                    (None, None) => println!("{}", format!("Workflow {}", state.phase).red()),
                }
                return Ok(());
            }
        }
    }
}

fn ask_approval(plan: &str) -> Result<(ApprovalDecision, Option<String>), dialoguer::Error> {
    println!("\n{}", plan);
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What should happen with this plan?")
        .items(&["Approve", "Request changes", "Reject"])
        .default(0)
        .interact()?;
    let decision = match choice {
        0 => ApprovalDecision::Approve,
        1 => ApprovalDecision::Amend,
        _ => ApprovalDecision::Reject,
    };
    Ok((decision, ask_feedback(decision != ApprovalDecision::Approve)?))
}

fn ask_review(task: &str) -> Result<(ReviewDecision, Option<String>), dialoguer::Error> {
    println!("\n{} {}", "Review needed:".yellow().bold(), task);
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Run this task?")
        .items(&["Run it", "Skip it"])
        .default(0)
        .interact()?;
    let decision = if choice == 0 {
        ReviewDecision::Approve
    } else {
        ReviewDecision::Reject
    };
    Ok((decision, ask_feedback(decision == ReviewDecision::Reject)?))
}

fn ask_feedback(wanted: bool) -> Result<Option<String>, dialoguer::Error> {
    if !wanted {
        return Ok(None);
    }
    let text: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("📝 Feedback")
        .allow_empty(true)
        .interact_text()?;
    Ok((!text.trim().is_empty()).then_some(text))
}
