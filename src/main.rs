//! Chat trivia bot entrypoint wiring configuration, storage, the chat connection and the session engine.

use std::{sync::Arc, time::Instant};

use anyhow::Context;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_trivia::{
    config::AppConfig,
    dao::{
        question_bank::QuestionBank,
        trivia_store::{JsonFileStore, TriviaStore},
    },
    services::{
        backup::BackupRecovery,
        engine::{EngineControl, SessionEngine},
        ledger::ScoreLedger,
    },
    transport::irc::IrcConnection,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load().context("loading configuration")?;
    let bank = QuestionBank::load(&config.trivia.question_file).with_context(|| {
        format!(
            "loading question bank {}",
            config.trivia.question_file.display()
        )
    })?;
    info!(questions = bank.len(), "question bank loaded");

    let store: Arc<dyn TriviaStore> = Arc::new(JsonFileStore::new(
        config.storage.scores_path.clone(),
        config.storage.backup_path.clone(),
    ));
    let ledger = ScoreLedger::load(store.clone())
        .await
        .context("loading score table")?;
    info!(users = ledger.len(), "score table loaded");

    let mut connection = IrcConnection::connect(&config.chat)
        .await
        .context("connecting to chat")?;
    let outbound = connection.outbound.clone();
    if outbound
        .send("Trivia bot loaded. Type !triviastart to play.".into())
        .is_err()
    {
        warn!("chat writer closed before the greeting was sent");
    }

    let engine = SessionEngine::new(
        config.trivia.clone(),
        config.admins.clone(),
        Arc::new(bank),
        ledger,
        BackupRecovery::new(store),
        outbound,
    );

    run(engine, &mut connection, &config).await;
    connection.shutdown().await;
    info!("trivia bot stopped");
    Ok(())
}

/// Poll loop: deadlines are evaluated on every tick and before each inbound message.
async fn run(mut engine: SessionEngine, connection: &mut IrcConnection, config: &AppConfig) {
    let mut ticker = interval(config.trivia.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => engine.tick(Instant::now()).await,
            message = connection.inbound.recv() => {
                let Some(message) = message else {
                    warn!("chat connection lost; shutting down");
                    break;
                };
                let now = Instant::now();
                engine.tick(now).await;
                if engine.handle_message(now, &message.sender, &message.text).await
                    == EngineControl::Shutdown
                {
                    info!(user = %message.sender, "stop requested from chat");
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                engine.stop();
                break;
            }
        }
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
