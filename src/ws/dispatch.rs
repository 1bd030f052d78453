//! Inbound message dispatch - validates preconditions before touching the session store

use tracing::info;

use crate::game::elimination::{self, Elimination};
use crate::game::participant::sanitize_name;
use crate::game::scheduler::MatchScheduler;
use crate::ws::connections::Outbox;
use crate::ws::protocol::{ClientMsg, EliminationReason, Phase, ServerMsg, Vec3};

/// Why an inbound message was not applied. Only `ServerFull` ever reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Server is full")]
    ServerFull,

    #[error("Connection already joined")]
    AlreadyJoined,

    #[error("Unknown participant")]
    UnknownParticipant,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Not allowed in phase {0:?}")]
    WrongPhase(Phase),

    #[error("Participant is eliminated")]
    Eliminated,

    #[error("No participants")]
    NoParticipants,

    #[error("Participant collided with itself")]
    SelfCollision,
}

impl<O: Outbox> MatchScheduler<O> {
    /// Apply one client message from connection `sender`
    pub fn dispatch(&mut self, sender: &str, msg: ClientMsg, now: u64) -> Result<(), DispatchError> {
        match msg {
            ClientMsg::Join { name } => self.on_join(sender, &name, now),
            ClientMsg::Input { position, velocity } => self.on_input(sender, position, velocity, now),
            ClientMsg::Collision { other_id } => self.on_collision(sender, &other_id, now),
            ClientMsg::StartGame => self.on_start(sender, now),
            ClientMsg::Ready { ready } => self.on_ready(sender, ready),
            ClientMsg::KonamiCode => self.on_konami(sender, now),
            ClientMsg::PlayAgain => self.on_play_again(sender, now),
        }
    }

    fn on_join(&mut self, sender: &str, name: &str, now: u64) -> Result<(), DispatchError> {
        if self.store.contains(sender) {
            return Err(DispatchError::AlreadyJoined);
        }
        if self.store.is_full() {
            let err = DispatchError::ServerFull;
            self.outbox.send_to(
                sender,
                ServerMsg::JoinError {
                    message: err.to_string(),
                },
            );
            return Err(err);
        }

        let name = sanitize_name(name, self.store.len() + 1);
        self.store.add_participant(sender, &name, now);
        self.sync_player_count();

        // Joining mid-match means watching until the next round
        if self.store.phase() == Phase::Playing {
            if let Some(p) = self.store.participant_mut(sender) {
                p.is_eliminated = true;
            }
        }

        info!(
            participant_id = %sender,
            name = %name,
            participants = self.store.len(),
            "Participant joined"
        );

        self.outbox.send_to(
            sender,
            ServerMsg::Joined {
                id: sender.to_string(),
                snapshot: self.store.snapshot(now),
            },
        );
        if let Some(player) = self.store.view(sender, now) {
            self.outbox.broadcast(ServerMsg::PlayerJoined {
                player,
                host_id: self.store.host_id().map(str::to_string),
            });
        }
        self.broadcast_player_count();
        Ok(())
    }

    fn on_input(
        &mut self,
        sender: &str,
        position: Vec3,
        velocity: Vec3,
        now: u64,
    ) -> Result<(), DispatchError> {
        self.require_alive_in_play(sender)?;
        self.store.update_kinematics(sender, position, velocity, now);
        Ok(())
    }

    /// `sender` was hit by `other_id`
    fn on_collision(&mut self, sender: &str, other_id: &str, now: u64) -> Result<(), DispatchError> {
        if sender == other_id {
            return Err(DispatchError::SelfCollision);
        }
        self.require_alive_in_play(sender)?;
        match self.store.participant(other_id) {
            None => return Err(DispatchError::UnknownParticipant),
            Some(p) if p.is_eliminated => return Err(DispatchError::Eliminated),
            Some(_) => {}
        }
        elimination::record_collision(&mut self.store, sender, other_id, now);
        Ok(())
    }

    fn on_start(&mut self, sender: &str, now: u64) -> Result<(), DispatchError> {
        self.require_host(sender)?;
        self.require_phase(Phase::Lobby)?;
        if self.store.is_empty() {
            return Err(DispatchError::NoParticipants);
        }
        self.begin_countdown(now);
        Ok(())
    }

    fn on_ready(&mut self, sender: &str, ready: bool) -> Result<(), DispatchError> {
        if !self.store.set_ready(sender, ready) {
            return Err(DispatchError::UnknownParticipant);
        }
        self.outbox.broadcast(ServerMsg::PlayerReady {
            id: sender.to_string(),
            ready,
        });
        Ok(())
    }

    /// Sender wins outright: everyone else still standing goes down, nobody is credited
    fn on_konami(&mut self, sender: &str, now: u64) -> Result<(), DispatchError> {
        self.require_alive_in_play(sender)?;

        let (name, color) = match self.store.participant(sender) {
            Some(p) => (p.name.clone(), p.color().to_string()),
            None => return Err(DispatchError::UnknownParticipant),
        };
        info!(participant_id = %sender, "Konami code activated");
        self.outbox.broadcast(ServerMsg::KonamiActivated {
            id: sender.to_string(),
            name,
            color,
        });

        let others: Vec<String> = self
            .store
            .alive_ids()
            .into_iter()
            .filter(|id| id != sender)
            .collect();
        let eliminated: Vec<Elimination> = others
            .iter()
            .filter_map(|id| {
                elimination::eliminate(&mut self.store, id, EliminationReason::Konami, now)
            })
            .collect();
        for out in eliminated {
            self.announce_elimination(out);
        }

        self.end_match(Some(sender.to_string()), now);
        Ok(())
    }

    fn on_play_again(&mut self, sender: &str, now: u64) -> Result<(), DispatchError> {
        self.require_host(sender)?;
        self.require_phase(Phase::Ended)?;
        info!(participant_id = %sender, "Play again requested");
        self.reset_round(now);
        Ok(())
    }

    /// Remove a departed connection. Connections that never joined are ignored.
    pub fn on_disconnect(&mut self, id: &str, now: u64) {
        let Some(removed) = self.store.remove_participant(id) else {
            return;
        };
        self.sync_player_count();
        info!(
            participant_id = %id,
            name = %removed.name,
            participants = self.store.len(),
            "Participant left"
        );

        self.outbox.broadcast(ServerMsg::PlayerLeft {
            id: id.to_string(),
            host_id: self.store.host_id().map(str::to_string),
        });
        self.broadcast_player_count();

        if self.store.is_empty() {
            // Nobody left to play or watch: drop any running match and start clean
            self.stop_timers();
            self.store.reset_for_new_round(now);
            return;
        }
        self.check_match_end(now);
    }

    // ------------------------------------------------------------------
    // Preconditions
    // ------------------------------------------------------------------

    fn require_host(&self, sender: &str) -> Result<(), DispatchError> {
        if !self.store.contains(sender) {
            return Err(DispatchError::UnknownParticipant);
        }
        if !self.store.is_host(sender) {
            return Err(DispatchError::NotHost);
        }
        Ok(())
    }

    fn require_phase(&self, phase: Phase) -> Result<(), DispatchError> {
        let current = self.store.phase();
        if current != phase {
            return Err(DispatchError::WrongPhase(current));
        }
        Ok(())
    }

    fn require_alive_in_play(&self, sender: &str) -> Result<(), DispatchError> {
        self.require_phase(Phase::Playing)?;
        match self.store.participant(sender) {
            None => Err(DispatchError::UnknownParticipant),
            Some(p) if p.is_eliminated => Err(DispatchError::Eliminated),
            Some(_) => Ok(()),
        }
    }
}
