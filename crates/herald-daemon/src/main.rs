use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Parser;
use herald_core::{
    config::HeraldConfig, payload::Reminder, timefmt, Owner, TaskKind, TaskPayload, TaskRecord,
    TaskStatus,
};
use tokio::sync::watch;
use tracing::{info, warn};

mod app;
mod cli;

use app::App;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "herald_daemon=info,herald_scheduler=info,herald_dispatch=info,herald_queue=info"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > HERALD_CONFIG env > ~/.herald/herald.toml
    let config_path = cli.config.clone().or_else(|| std::env::var("HERALD_CONFIG").ok());
    let config = HeraldConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        HeraldConfig::default()
    });

    let app = App::open(config)?;

    match cli.command {
        Command::Scheduler => {
            app.ensure_subscription().await?;
            let shutdown = shutdown_on_ctrl_c();
            app.scheduler().run(shutdown).await;
        }
        Command::Consumer => {
            app.ensure_subscription().await?;
            app.run_consumer(shutdown_on_ctrl_c()).await?;
        }
        Command::Run => {
            app.ensure_subscription().await?;
            let shutdown = shutdown_on_ctrl_c();
            let engine = app.scheduler();
            let scheduler = tokio::spawn(engine.run(shutdown.clone()));
            app.run_consumer(shutdown).await?;
            scheduler.await.context("scheduler task panicked")?;
        }
        Command::AddReminder {
            user,
            destination,
            content,
            in_secs,
        } => {
            let secs = i64::try_from(in_secs).context("--in-secs out of range")?;
            let record = TaskRecord::new(
                TaskPayload::Reminder(Reminder {
                    user,
                    destination,
                    content,
                }),
                Utc::now() + Duration::seconds(secs),
            );
            app.tasks.add_task(&record).await?;
            println!("{}\t{}", record.id, timefmt::format(&record.due_at));
        }
        Command::Cancel { id } => {
            if app.tasks.remove_task(&id, TaskStatus::Cancelled).await? {
                println!("cancelled {id}");
            } else {
                println!("{id} is not pending");
            }
        }
        Command::Pending { owner, kind } => {
            let owner: Owner = owner.parse()?;
            let kind: TaskKind = kind.parse()?;
            for task in app.tasks.pending_tasks_for(&owner, kind).await? {
                println!("{}\t{}", task.id, timefmt::format(&task.due_at));
            }
        }
    }

    info!("herald exiting");
    Ok(())
}

/// Watch channel that flips to `true` on Ctrl-C.
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!("Ctrl-C handler failed ({e}), shutting down"),
        }
        let _ = tx.send(true);
    });
    rx
}
