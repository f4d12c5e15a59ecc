use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use continuum::backend::{InMemoryBackend, JsonFileSessions};
use continuum::config::Config;
use continuum::engine::{Backends, ContinuityEngine};
use continuum::logging;
use continuum::notifications::{AlertService, ChannelSink};
use continuum::session::SessionContinuityStore;
use continuum::types::{
    ActorId, Artifact, SessionUpdate, WorkflowDefinition, LAST_ARTIFACT_KEY,
};
use continuum::workflow::WorkflowStepAdvancer;

#[derive(Parser)]
#[command(name = "continuum")]
#[command(about = "Session and workflow continuity engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the effective configuration to .continuum/config.toml
    Init,

    /// Inspect or update an actor's session record
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Run a simulated guided workflow against an in-memory backend
    Demo {
        /// Actor to run the workflow as
        #[arg(short, long, default_value = "demo-user")]
        actor: String,

        /// Number of workflow steps (at least 1)
        #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
        steps: u32,

        /// Override the artifact poll interval
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Print the stored record
    Show {
        #[arg(short, long)]
        actor: String,
    },

    /// Upsert fields of the record
    Set {
        #[arg(short, long)]
        actor: String,

        #[arg(long)]
        workflow_type: Option<String>,

        #[arg(long)]
        squad: Option<String>,

        #[arg(long)]
        context: Option<String>,

        #[arg(long)]
        tab: Option<String>,

        /// Free-form JSON payload
        #[arg(long)]
        payload: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Commands::Init => cmd_init(&config)?,
        Commands::Session { action } => cmd_session(&config, action).await?,
        Commands::Demo {
            actor,
            steps,
            interval_ms,
        } => cmd_demo(config, actor, steps, interval_ms).await?,
    }

    if let Some(log_path) = logging_handle.log_file_path {
        eprintln!("Session log: {}", log_path.display());
    }

    Ok(())
}

fn cmd_init(config: &Config) -> Result<()> {
    config.save()?;
    println!("Wrote {}", Config::project_config_path().display());
    Ok(())
}

async fn cmd_session(config: &Config, action: SessionAction) -> Result<()> {
    let store = SessionContinuityStore::new(Arc::new(JsonFileSessions::new(config.state_path())));

    match action {
        SessionAction::Show { actor } => {
            let actor = ActorId::new(actor);
            match store.read(&actor).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No session for {}", actor),
            }
        }
        SessionAction::Set {
            actor,
            workflow_type,
            squad,
            context,
            tab,
            payload,
        } => {
            let freeform_payload = payload
                .map(|p| serde_json::from_str(&p))
                .transpose()
                .context("--payload must be valid JSON")?;
            let update = SessionUpdate {
                last_workflow_type: workflow_type,
                last_squad_id: squad,
                last_context_id: context,
                last_tab: tab,
                freeform_payload,
                at: None,
            };
            let record = store.write(&ActorId::new(actor), update).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

async fn cmd_demo(
    mut config: Config,
    actor: String,
    steps: u32,
    interval_ms: Option<u64>,
) -> Result<()> {
    if let Some(ms) = interval_ms {
        config.watcher.poll_interval_ms = ms;
        config.validate()?;
    }

    let backend = InMemoryBackend::new();
    let backends = Backends::in_memory(&backend)
        .with_sessions(Arc::new(JsonFileSessions::new(config.state_path())));
    let (alert_tx, mut alerts) = mpsc::unbounded_channel();
    let alert_service = AlertService::from_config(&config.alerts)
        .with_sink(Arc::new(ChannelSink::new(alert_tx)));
    let engine = ContinuityEngine::new(config.clone(), backends).with_alerts(alert_service);
    let actor = ActorId::new(actor);

    let session = engine.session(actor.clone());
    session.load().await;
    if let Some(target) = session.resume_target() {
        println!(
            "Last session: {} (tab: {}) at {}",
            target.workflow_type,
            target.tab.as_deref().unwrap_or("-"),
            target.last_active_at
        );
    }

    let definition = WorkflowDefinition::new("demo", (1..=steps).map(|i| format!("step-{i}")).collect());
    let advancer = WorkflowStepAdvancer::new(definition).with_callback(|advance| {
        println!(
            "Step {} complete (artifact {})",
            advance.next_step, advance.context_delta[LAST_ARTIFACT_KEY]["id"]
        );
    });
    let workflow = engine.start_workflow(actor.clone(), advancer);
    let mut reviews = engine.mount_reviews(actor.clone()).await;
    let mut pending = reviews.pending_count();
    let mut progress = workflow.state();

    let generator = tokio::spawn(simulate_generation(
        backend.clone(),
        actor.clone(),
        steps,
        config.poll_interval(),
    ));

    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = progress.borrow_and_update().clone();
                session.record_workflow(&state).await;
                if !workflow.is_active() {
                    break;
                }
            }
            Some(alert) = alerts.recv() => {
                println!("Alert: {} - {}", alert.title, alert.message);
            }
            Ok(()) = pending.changed() => {
                println!("Pending reviews: {}", pending.borrow_and_update().display());
            }
        }
    }

    // Let the last completion land before tearing down
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(alert) = alerts.try_recv() {
        println!("Alert: {} - {}", alert.title, alert.message);
    }
    println!("Pending reviews: {}", reviews.current().display());

    generator.abort();
    workflow.deactivate();
    reviews.teardown();
    Ok(())
}

/// Stand-in for the content generator: one artifact and one completed
/// review run per step, with every completion delivered twice.
async fn simulate_generation(
    backend: InMemoryBackend,
    actor: ActorId,
    steps: u32,
    poll_interval: Duration,
) {
    for i in 1..=steps {
        let subject = format!("doc-{i}");
        let run = format!("run-{i}");
        backend.enqueue_review(&actor, &subject);
        tokio::time::sleep(poll_interval.mul_f32(1.5)).await;

        backend.add_artifact(
            &actor,
            Artifact::new(
                format!("artifact-{i}"),
                "document",
                serde_json::json!({ "title": format!("Generated document {i}") }),
            ),
        );
        backend.complete_review(&actor, &subject, &run);
        // At-least-once delivery
        backend.complete_review(&actor, &subject, &run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_demo_rejects_zero_steps() {
        let result = Cli::try_parse_from(["continuum", "demo", "--steps", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_demo_defaults() {
        let cli = Cli::try_parse_from(["continuum", "demo", "--steps", "1"]).unwrap();
        match cli.command {
            Commands::Demo { actor, steps, interval_ms } => {
                assert_eq!(actor, "demo-user");
                assert_eq!(steps, 1);
                assert!(interval_ms.is_none());
            }
            _ => panic!("expected demo command"),
        }
    }
}
