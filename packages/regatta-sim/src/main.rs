//! main.rs — Regatta Sim driver
//!
//! Runs two concurrent tasks:
//!   1. Sim loop: ticks the simulation at update_rate_hz × speed, broadcasts
//!      telemetry, and appends finished results to the JSON-lines results file
//!   2. WebSocket server: control panel on ctrl_port (steer, pause, restart,
//!      timer jump, presets) plus `/health`
//!
//! The simulation core knows nothing about either; this file only adapts it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    extract::{State, WebSocketUpgrade, ws::{WebSocket, Message}},
    response::Response,
    routing::get,
};
use clap::Parser;
use serde::Deserialize;
use tokio::sync::{RwLock, broadcast};
use tokio::time::interval;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use regatta_sim::config::SimConfig;
use regatta_sim::leaderboard::{self, Leaderboard, DEFAULT_TOP_N};
use regatta_sim::persistence;
use regatta_sim::scenarios::Scenario;
use regatta_sim::simulation::{Simulation, TickResult};
use regatta_sim::RaceEvent;
use regatta_types::{ControlCommand, RaceResult};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "regatta-sim", about = "Regatta Suite single-boat race simulator")]
struct Args {
    /// Config file path (falls back to the built-in config when missing)
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Base RNG seed for the wind
    #[arg(long)]
    seed: Option<u64>,
    /// Simulation speed multiplier (1.0 = real-time)
    #[arg(long)]
    speed: Option<f64>,
    /// Wind/course preset applied on top of the config
    #[arg(long, value_enum)]
    preset: Option<Scenario>,
    /// Control panel WebSocket port
    #[arg(long)]
    ctrl_port: Option<u16>,
    /// JSON-lines results file
    #[arg(long)]
    results: Option<PathBuf>,
    /// Start the countdown immediately instead of waiting for `resume`
    #[arg(long)]
    autostart: bool,
    /// Name recorded in results
    #[arg(long)]
    player: Option<String>,
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct SimState {
    sim: Simulation,
    /// Config before any runtime preset, so presets don't stack
    base_config: SimConfig,
    speed: f64,
    leaderboard: Leaderboard,
    /// Last telemetry frame, sent to clients on connect
    last_telemetry: Option<String>,
}

type SharedState = Arc<RwLock<SimState>>;

/// Driver-level commands that don't touch race state directly
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", content = "args", rename_all = "snake_case")]
enum DriverCommand {
    SetSpeed { speed: f64 },
    Preset { name: Scenario },
    SetPlayer { name: String },
    Leaderboard,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Incoming {
    Control(ControlCommand),
    Driver(DriverCommand),
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regatta_sim=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut cfg = match std::fs::read_to_string(&args.config) {
        Ok(raw) => SimConfig::from_toml_str(&raw).with_context(|| format!("loading {}", args.config))?,
        Err(_) => {
            info!("No {} found, using built-in config", args.config);
            SimConfig::embedded()?
        }
    };
    if let Some(seed) = args.seed { cfg.simulation.seed = seed; }
    if let Some(port) = args.ctrl_port { cfg.simulation.ctrl_port = port; }
    if let Some(path) = &args.results { cfg.simulation.results_path = path.display().to_string(); }
    if let Some(name) = args.player.as_deref() {
        match leaderboard::sanitize_player_name(name) {
            Some(clean) => cfg.race.player_name = clean,
            None => warn!("Ignoring unusable player name {name:?}"),
        }
    }
    let base_config = cfg.clone();
    if let Some(preset) = args.preset {
        preset.apply(&mut cfg);
        info!("🎭 Preset '{preset:?}': {}", preset.describe());
    }

    let mut sim = Simulation::new(cfg.clone())?;
    if args.autostart {
        sim.set_paused(false);
    }

    let results_path = PathBuf::from(&cfg.simulation.results_path);
    let leaderboard = Leaderboard::new(persistence::load_results(&results_path).await);

    info!(
        "⛵ Regatta Sim starting: {:.0}s countdown, wind {:.0}→{:.0} kt, seed {}",
        cfg.race.timer_duration_s,
        cfg.wind.left_speed_knots,
        cfg.wind.right_speed_knots,
        cfg.simulation.seed
    );

    let speed = match args.speed {
        Some(raw) => sim_speed(raw).context("--speed must be a number")?,
        None => cfg.simulation.sim_speed.clamp(0.1, 20.0),
    };
    let first_frame = telemetry_frame(&sim);
    let shared: SharedState = Arc::new(RwLock::new(SimState {
        sim,
        base_config,
        speed,
        leaderboard,
        last_telemetry: Some(first_frame),
    }));

    // Broadcast channel for telemetry (web UI)
    let (telem_tx, _) = broadcast::channel::<String>(64);
    let telem_tx = Arc::new(telem_tx);

    let shared_loop = shared.clone();
    let telem_tx_loop = telem_tx.clone();
    let update_rate = cfg.simulation.update_rate_hz;
    let log_every = cfg.simulation.log_every_ticks.max(1);
    tokio::spawn(async move {
        sim_loop(shared_loop, telem_tx_loop, results_path, update_rate, log_every).await;
    });

    let ctrl_addr = format!("0.0.0.0:{}", cfg.simulation.ctrl_port);
    info!("🖥  Control panel WebSocket at ws://{ctrl_addr}/ws");

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "regatta-sim ok" }))
        .with_state((shared.clone(), telem_tx.clone()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let listener = tokio::net::TcpListener::bind(&ctrl_addr)
        .await
        .with_context(|| format!("binding {ctrl_addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Simulation loop ───────────────────────────────────────────────────────────

async fn sim_loop(
    state: SharedState,
    telem: Arc<broadcast::Sender<String>>,
    results_path: PathBuf,
    update_rate_hz: f64,
    log_every: u64,
) {
    let period = Duration::from_secs_f64(1.0 / update_rate_hz);
    let mut ticker = interval(period);

    info!("⚓ Sim loop running at {update_rate_hz} Hz ({}ms tick)", period.as_millis());

    loop {
        ticker.tick().await;

        let (telemetry_json, finished) = {
            let mut s = state.write().await;
            let dt = period.as_secs_f64() * s.speed;

            let events = match s.sim.tick(0.0, dt) {
                TickResult::Paused => Vec::new(),
                TickResult::Advanced(events) => events,
            };

            let finished = events
                .iter()
                .any(|e| matches!(e, RaceEvent::Finished { .. }))
                .then(|| s.sim.result().cloned())
                .flatten();

            if !events.is_empty() || (!s.sim.is_paused() && s.sim.tick_count() % log_every == 0) {
                let t = s.sim.telemetry();
                info!(
                    "⏱ {:?} | T-{:.0}s | race {:.1}s | {:.1} kt @ {:.0}° | line {:+.0} m",
                    t.phase, t.time_to_start_s, t.race_time_s, t.speed_knots, t.heading_deg, t.distance_to_line_m
                );
            }

            // Paused frames only go out when something changed
            let Some(json) = next_frame(&s.sim, s.last_telemetry.as_deref()) else { continue };
            s.last_telemetry = Some(json.clone());
            (json, finished)
        };

        let _ = telem.send(telemetry_json);

        if let Some(result) = finished {
            record_result(&state, &telem, &results_path, result).await;
        }
    }
}

fn telemetry_frame(sim: &Simulation) -> String {
    serde_json::json!({ "type": "telemetry", "data": sim.telemetry() }).to_string()
}

/// Frame to broadcast after a tick. None while paused and unchanged since `last`.
fn next_frame(sim: &Simulation, last: Option<&str>) -> Option<String> {
    let frame = telemetry_frame(sim);
    if sim.is_paused() && last == Some(frame.as_str()) {
        return None;
    }
    Some(frame)
}

/// Sim speed multiplier from user input, clamped to 0.1–20×. None for NaN.
fn sim_speed(raw: f64) -> Option<f64> {
    (!raw.is_nan()).then(|| raw.clamp(0.1, 20.0))
}

async fn record_result(
    state: &SharedState,
    telem: &broadcast::Sender<String>,
    path: &Path,
    result: RaceResult,
) {
    let (rank, top) = {
        let mut s = state.write().await;
        let top = s.leaderboard.qualifies(&result, DEFAULT_TOP_N);
        s.leaderboard.push(result.clone());
        (s.leaderboard.rank_of(&result), top)
    };

    info!(
        "🏆 {} finished in {} ({:.1}s late, {:.0}% speed), rank {:?}{}",
        result.player_name,
        leaderboard::format_race_time(result.race_time_seconds),
        result.seconds_late,
        result.speed_percentage,
        rank,
        if top { ", top 10" } else { "" }
    );

    let msg = serde_json::json!({ "type": "result", "data": &result, "rank": rank, "top10": top });
    let _ = telem.send(msg.to_string());

    if let Err(e) = persistence::append_result(path, &result).await {
        warn!("Failed to save result: {e:#}");
    }
}

// ── WebSocket control handler ─────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State((state, telem_tx)): State<(SharedState, Arc<broadcast::Sender<String>>)>,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state, telem_tx))
}

async fn handle_ws(
    mut socket: WebSocket,
    state: SharedState,
    telem_tx: Arc<broadcast::Sender<String>>,
) {
    let mut telem_rx = telem_tx.subscribe();

    // Course first, then the current frame
    let (course_json, last) = {
        let s = state.read().await;
        let course = serde_json::json!({ "type": "course", "data": s.sim.course() }).to_string();
        (course, s.last_telemetry.clone())
    };
    let _ = socket.send(Message::Text(course_json)).await;
    if let Some(telem) = last {
        let _ = socket.send(Message::Text(telem)).await;
    }

    loop {
        tokio::select! {
            Ok(msg) = telem_rx.recv() => {
                if socket.send(Message::Text(msg)).await.is_err() { break; }
            }
            Some(Ok(Message::Text(raw))) = socket.recv() => {
                if let Some(reply) = handle_command(&state, &raw).await {
                    if socket.send(Message::Text(reply)).await.is_err() { break; }
                }
            }
            else => break,
        }
    }
}

/// Commands are JSON: { "cmd": "...", "args": {...} }.
/// Returns a reply for commands that ask for one.
async fn handle_command(state: &SharedState, raw: &str) -> Option<String> {
    let incoming: Incoming = match serde_json::from_str(raw) {
        Ok(c) => c,
        Err(_) => {
            warn!("Unknown control command: {raw}");
            return None;
        }
    };

    match incoming {
        Incoming::Control(cmd) => {
            state.write().await.sim.apply(&cmd);
            None
        }
        Incoming::Driver(DriverCommand::SetSpeed { speed }) => {
            let Some(speed) = sim_speed(speed) else {
                warn!("Ignoring sim speed {speed}");
                return None;
            };
            state.write().await.speed = speed;
            info!("⚡ Sim speed set to {speed}×");
            None
        }
        Incoming::Driver(DriverCommand::Preset { name }) => {
            let mut s = state.write().await;
            let mut cfg = s.base_config.clone();
            cfg.race.player_name = s.sim.config().race.player_name.clone();
            name.apply(&mut cfg);
            match Simulation::new(cfg) {
                Ok(sim) => {
                    s.sim = sim;
                    info!("🎭 Preset '{name:?}' loaded: {}", name.describe());
                }
                Err(e) => warn!("Preset '{name:?}' rejected: {e}"),
            }
            None
        }
        Incoming::Driver(DriverCommand::SetPlayer { name }) => {
            match leaderboard::sanitize_player_name(&name) {
                Some(clean) => {
                    info!("👤 Player is now {clean}");
                    state.write().await.sim.set_player_name(clean);
                }
                None => warn!("Ignoring unusable player name {name:?}"),
            }
            None
        }
        Incoming::Driver(DriverCommand::Leaderboard) => {
            let s = state.read().await;
            let top: Vec<&RaceResult> = s.leaderboard.top(DEFAULT_TOP_N);
            Some(serde_json::json!({ "type": "leaderboard", "data": top }).to_string())
        }
    }
}
