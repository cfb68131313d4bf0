//! Tokio driver of the scheduler
//!
//! One task owns the playlist and the scheduler. Timer expiries, arriving
//! messages and shutdown requests reach it as [`PlayerEvent`]s on a single
//! channel, so scenario state only ever has one mutator.

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::playlist::Playlist;
use crate::report::PlayerReport;
use crate::scheduler::{Flow, Scheduler};
use crate::timer::TokioTimers;
use scenario_core::{CredentialEngine, MessageBus, MessageCodec, TimerKey, WireMessage};
use scenario_script::Loader;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Input of the player loop
#[derive(Debug)]
pub enum PlayerEvent {
    TimerExpired(TimerKey),
    /// A message from the system under test
    Message(WireMessage),
    /// Stop playing and report
    Shutdown,
}

/// Sending side of the player's event channel
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlayerHandle {
    /// Hand a received message to the player
    pub fn deliver(&self, message: WireMessage) -> Result<()> {
        self.tx
            .send(PlayerEvent::Message(message))
            .map_err(|_| Error::ChannelClosed)
    }

    /// Ask the player to stop at its next wait
    pub fn shutdown(&self) -> Result<()> {
        self.tx
            .send(PlayerEvent::Shutdown)
            .map_err(|_| Error::ChannelClosed)
    }
}

/// Plays a playlist against the system under test
pub struct Player {
    playlist: Playlist,
    scheduler: Scheduler,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    handle: PlayerHandle,
}

impl Player {
    /// Create a player for already loaded scenarios
    pub fn new(playlist: Playlist, codec: Box<dyn MessageCodec>, bus: Box<dyn MessageBus>) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let timers = TokioTimers::new(tx.clone());
        Self {
            playlist,
            scheduler: Scheduler::new(codec, bus, Box::new(timers)),
            events,
            handle: PlayerHandle { tx },
        }
    }

    /// Load the configured scenario list and create a player for it
    pub fn from_config(
        config: &PlayerConfig,
        codec: Box<dyn MessageCodec>,
        bus: Box<dyn MessageBus>,
    ) -> Result<Self> {
        if !config.is_player_enabled() {
            return Err(Error::NotEnabled);
        }
        let scenarios = Loader::new(codec.as_ref())
            .continue_on_error(config.continue_on_load_error)
            .load_playlist(&config.scenario_list)?;
        Ok(Self::new(Playlist::new(scenarios), codec, bus))
    }

    pub fn with_credentials(mut self, credentials: Box<dyn CredentialEngine>) -> Self {
        self.scheduler = self.scheduler.with_credentials(credentials);
        self
    }

    /// Handle for feeding messages to the player while it runs
    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Play every scenario, then report
    ///
    /// Returns early with the current statuses on [`PlayerEvent::Shutdown`].
    pub async fn run(mut self) -> Result<PlayerReport> {
        info!("Starting player with {} scenario(s)", self.playlist.len());
        let mut flow = self.scheduler.run(&mut self.playlist, now())?;
        loop {
            flow = match flow {
                Flow::Finished => break,
                Flow::Sleep(remaining) => {
                    debug!("Sleeping {:?}", remaining);
                    tokio::time::sleep(remaining).await;
                    self.scheduler.run(&mut self.playlist, now())?
                }
                Flow::Waiting => match self.events.recv().await {
                    Some(PlayerEvent::TimerExpired(key)) => {
                        self.scheduler.on_timer(&mut self.playlist, key, now())?
                    }
                    Some(PlayerEvent::Message(wire)) => {
                        self.scheduler.on_message(&mut self.playlist, wire, now())?
                    }
                    Some(PlayerEvent::Shutdown) => {
                        warn!("Player shut down before the playlist ended");
                        break;
                    }
                    None => return Err(Error::ChannelClosed),
                },
            };
        }
        let report = PlayerReport::from_playlist(&self.playlist);
        info!("{}", report.summary());
        Ok(report)
    }
}

/// Current instant, following tokio's clock so paused-time tests work
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
