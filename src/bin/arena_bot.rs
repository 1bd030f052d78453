//! Headless arena client: joins a session, drives a toy local simulation and logs what
//! it sees of everyone else.

use std::time::{Duration, Instant};

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use arena_server::client::{Interpolators, KinematicSample, SyncClient};
use arena_server::ws::protocol::{ClientMsg, Phase, Vec3};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session WebSocket endpoint
    #[arg(short, long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// Display name to join with
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Start (and restart) matches whenever this bot is host
    #[arg(long)]
    start: bool,
}

const FRAME_RATE: f32 = 60.0;
const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Wanders between random points inside the arena
struct ToySimulator {
    position: Vec3,
    velocity: Vec3,
    target: Vec3,
    rng: ChaCha8Rng,
}

impl ToySimulator {
    const SPEED: f32 = 3.0;

    fn new(seed: u64) -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 0.0),
            velocity: Vec3::ZERO,
            target: Vec3::new(0.0, 1.0, 0.0),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn respawn(&mut self, position: Vec3) {
        self.position = position;
        self.velocity = Vec3::ZERO;
        self.target = position;
    }

    fn step(&mut self, dt: f32, arena_radius: f32) -> KinematicSample {
        let to_target = self.target - self.position;
        let distance = to_target.length();
        if distance < 0.2 {
            let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
            let reach = self.rng.gen_range(0.0..arena_radius * 0.7);
            self.target = Vec3::new(angle.cos() * reach, 1.0, angle.sin() * reach);
            self.velocity = Vec3::ZERO;
        } else {
            self.velocity = to_target * (Self::SPEED / distance);
            self.position += self.velocity * dt;
        }
        KinematicSample {
            position: self.position,
            velocity: self.velocity,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    info!("Connecting to: {}", args.url);

    let mut client = SyncClient::connect(&args.url).await?;
    client.join(&args.name).await?;
    client
        .wait_for(Duration::from_secs(5), |v| {
            v.local_id.is_some() || v.join_error.is_some()
        })
        .await?;
    if let Some(message) = client.view().join_error {
        anyhow::bail!("join rejected: {}", message);
    }
    let view = client.view();
    info!(id = ?view.local_id, players = view.players.len(), "Joined session");

    let (sample_tx, sample_rx) = watch::channel(KinematicSample::default());
    let uploader = client.spawn_uploader(sample_rx);

    let state = client.state();
    let mut sim = ToySimulator::new(rand::random());
    let mut remotes = Interpolators::default();
    let mut last_phase = Phase::Lobby;
    let mut start_sent = false;
    let mut ended_at: Option<Instant> = None;

    let mut frame = interval(Duration::from_secs_f32(1.0 / FRAME_RATE));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report = interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = frame.tick() => {
                let (phase, radius, is_host, spawn, alive) = {
                    let view = state.read();
                    remotes.sync(&view);
                    (
                        view.phase,
                        view.arena_radius,
                        view.is_host(),
                        view.local_player().map(|p| p.position),
                        view.is_local_alive_in_play(),
                    )
                };
                remotes.advance(1.0 / FRAME_RATE);

                if phase != last_phase {
                    info!(from = ?last_phase, to = ?phase, "Phase change");
                    if let Some(spawn) = spawn {
                        if matches!(phase, Phase::Playing | Phase::Lobby) {
                            sim.respawn(spawn);
                        }
                    }
                    if phase == Phase::Lobby {
                        start_sent = false;
                    }
                    ended_at = (phase == Phase::Ended).then(Instant::now);
                    last_phase = phase;
                }

                if alive {
                    sample_tx.send_replace(sim.step(1.0 / FRAME_RATE, radius));
                }

                if args.start && is_host {
                    if phase == Phase::Lobby && !start_sent {
                        client.send(ClientMsg::StartGame).await?;
                        start_sent = true;
                    }
                    if ended_at.is_some_and(|at| at.elapsed() >= RESTART_DELAY) {
                        client.send(ClientMsg::PlayAgain).await?;
                        ended_at = None;
                    }
                }
            }
            _ = report.tick() => {
                for (id, position) in remotes.iter() {
                    info!(
                        participant_id = %id,
                        x = position.x,
                        y = position.y,
                        z = position.z,
                        "Remote participant"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, leaving session");
                break;
            }
        }

        if !client.is_connected() {
            warn!("Lost connection to server");
            break;
        }
    }

    uploader.abort();
    Ok(())
}
