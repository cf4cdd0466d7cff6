// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator daemon binary: loads configuration, wires the engine to
//! an in-memory store and a TCP listener, and runs until interrupted.

use orc_core::SystemClock;
use orc_engine::Engine;
use orc_server::{RegistrySender, RobotSession, SessionCallbacks, SessionRegistry};
use orc_storage::InMemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:7770";

fn load_config() -> orc_engine::EngineConfig {
    match std::env::var("ORC_CONFIG_PATH") {
        Ok(path) => match std::fs::read_to_string(&path) {
            Ok(text) => match orc_engine::EngineConfig::from_toml(&text) {
                Ok(config) => config,
                Err(err) => {
                    tracing::error!(%path, %err, "failed to parse config, falling back to defaults");
                    orc_engine::EngineConfig::default()
                }
            },
            Err(err) => {
                tracing::error!(%path, %err, "failed to read config, falling back to defaults");
                orc_engine::EngineConfig::default()
            }
        },
        Err(_) => orc_engine::EngineConfig::default(),
    }
}

fn load_hmac_secret() -> Vec<u8> {
    std::env::var("ORC_HMAC_SECRET")
        .map(|s| s.into_bytes())
        .unwrap_or_else(|_| {
            tracing::warn!("ORC_HMAC_SECRET not set, using an insecure development default");
            b"orchestrator-dev-secret".to_vec()
        })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = load_config();
    let hmac_secret = load_hmac_secret();
    let clock = SystemClock;
    let storage = Arc::new(InMemoryStore::new());
    let registry = SessionRegistry::new();
    let sender: Arc<dyn orc_engine::JobSender> = Arc::new(RegistrySender::new(registry.clone()));

    let engine = Arc::new(Engine::new(clock, storage.clone(), config.clone(), hmac_secret, sender));
    engine.start();

    let callbacks = Arc::new(build_callbacks(engine.clone()));

    let listen_addr = std::env::var("ORC_LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());
    let listener = match TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%listen_addr, %err, "failed to bind listener");
            std::process::exit(1);
        }
    };
    tracing::info!(%listen_addr, "orchestrator daemon listening");

    loop {
        let (socket, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(%err, "failed to accept connection");
                continue;
            }
        };
        tracing::debug!(%peer_addr, "accepted connection");

        let session = RobotSession::new(
            SystemClock,
            storage.clone(),
            engine.security_manager(),
            engine.health_monitor(),
            engine.queue(),
            registry.clone(),
            callbacks.clone(),
            HANDSHAKE_TIMEOUT,
            config.dispatch_timeout,
        );
        tokio::spawn(async move {
            session.run(socket).await;
        });
    }
}

fn build_callbacks(engine: Arc<Engine<SystemClock, InMemoryStore>>) -> SessionCallbacks {
    let connected = engine.clone();
    let disconnected = engine.clone();
    let progress = engine.clone();
    let complete = engine.clone();
    let failed = engine.clone();
    let cancelled = engine;

    SessionCallbacks {
        on_robot_connected: Box::new(move |robot| connected.handle_robot_connected(robot)),
        on_robot_disconnected: Box::new(move |robot_id| {
            let engine = disconnected.clone();
            tokio::spawn(async move { engine.handle_robot_disconnected(robot_id).await });
        }),
        on_job_progress: Box::new(move |job_id, pct, node| progress.handle_job_progress(job_id, pct, node)),
        on_job_complete: Box::new(move |job_id, result| complete.handle_job_complete(job_id, result)),
        on_job_failed: Box::new(move |job_id, message| failed.handle_job_failed(job_id, message)),
        on_job_cancelled: Box::new(move |job_id| cancelled.handle_job_cancelled(job_id)),
    }
}
