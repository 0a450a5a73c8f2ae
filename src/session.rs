//! The stateful playback-session core: tracks the currently open item,
//! polls its live position while playing, and persists or purges its resume
//! record when it closes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::identity::MediaReference;
use crate::policy;
use crate::store::{self, ResumeRecord};

/// Delay between checks for the player becoming seekable.
const SEEK_RETRY_DELAY: Duration = Duration::from_millis(50);
/// Give up on resuming if the player has not become seekable after this many
/// checks.
const SEEK_RETRY_LIMIT: u32 = 600;

/// Playback capability the host player exposes to the session core.
pub trait PlayerControl: Send + Sync + 'static {
    fn is_seekable(&self) -> bool;
    fn seek_to(&self, position_ms: u64, accurate: bool);
    fn current_time_ms(&self) -> u64;
    fn stream_length_ms(&self) -> u64;
    /// Replace the current playlist entry with `raw_path` and start playback.
    fn open_replace(&self, raw_path: &str);
}

/// Notifications delivered by the host player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    FileOpened(String),
    FileHasPlayed(String),
    FileClosed,
    /// Treated like a file close, and additionally cancels a pending restart.
    HostShuttingDown,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The host told us a file is playing that is not the file it opened.
    /// This means host and plugin have desynchronized.
    #[error("played file {played:?} does not match opened file {opened:?}")]
    ProtocolViolation { opened: String, played: String },
}

#[derive(Default)]
struct SessionState {
    current: Option<MediaReference>,
    current_time_ms: u64,
    stream_length_ms: u64,
}

/// Orchestrates identity resolution, the save policy and the record store
/// around the host player's lifecycle notifications.
///
/// Handlers spawn timer tasks, so the controller must live inside a tokio
/// runtime. All pending tasks are cancelled when the controller is dropped.
pub struct SessionController {
    player: Arc<dyn PlayerControl>,
    config: Config,
    base_dir: PathBuf,
    state: Arc<Mutex<SessionState>>,
    restart_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    seek_task: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(player: Arc<dyn PlayerControl>, config: Config, base_dir: PathBuf) -> Self {
        Self {
            player,
            config,
            base_dir,
            state: Arc::new(Mutex::new(SessionState::default())),
            restart_task: None,
            poll_task: None,
            seek_task: None,
        }
    }

    /// Activation hook. Schedules the one-shot reopen of the last played
    /// item when configured; a real file-opened event cancels it.
    pub fn start(&mut self) {
        if !self.config.restart_last {
            return;
        }
        let player = Arc::clone(&self.player);
        let base_dir = self.base_dir.clone();
        let delay = Duration::from_secs(self.config.restart_delay_secs);
        self.restart_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match store::read_last_played(&base_dir) {
                Ok(Some(raw_path)) => {
                    debug!("restarting last played item {raw_path:?}");
                    player.open_replace(&raw_path);
                }
                Ok(None) => {}
                Err(err) => warn!("failed to read last played pointer: {err}"),
            }
        }));
    }

    /// Dispatch one host notification.
    pub fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::FileOpened(raw_path) => self.on_file_opened(&raw_path),
            PlayerEvent::FileHasPlayed(raw_path) => {
                if let Err(err) = self.on_file_has_played(&raw_path) {
                    error!("{err}");
                }
            }
            PlayerEvent::FileClosed => self.on_file_closed(),
            PlayerEvent::HostShuttingDown => {
                cancel(&mut self.restart_task);
                self.on_file_closed();
            }
        }
    }

    /// A new item was opened. Restores its saved position into the session
    /// state; the actual seek waits for the playback confirmation since the
    /// engine may not be seekable right after opening.
    pub fn on_file_opened(&mut self, raw_path: &str) {
        cancel(&mut self.restart_task);

        let reference = MediaReference::resolve(raw_path);
        let record_path = store::record_path(&self.base_dir, reference.identity_hash());
        let resume_ms = match store::read_record(&record_path) {
            Ok(Some(record)) => record.time_ms,
            Ok(None) => 0,
            Err(err) => {
                warn!("ignoring unreadable resume record: {err}");
                0
            }
        };

        let mut state = self.state.lock();
        state.current = Some(reference);
        state.current_time_ms = resume_ms;
        state.stream_length_ms = 0;
    }

    /// The player confirmed the opened item actually plays. Seeks back to
    /// the saved position once the player is seekable and starts the
    /// periodic position poll.
    pub fn on_file_has_played(&mut self, raw_path: &str) -> Result<(), SessionError> {
        let resume_ms = {
            let state = self.state.lock();
            match state.current.as_ref() {
                Some(reference) if reference.raw_path() == raw_path => state.current_time_ms,
                current => {
                    return Err(SessionError::ProtocolViolation {
                        opened: current
                            .map(|reference| reference.raw_path().to_string())
                            .unwrap_or_default(),
                        played: raw_path.to_string(),
                    });
                }
            }
        };

        if resume_ms > 0 {
            self.schedule_seek(resume_ms);
        }
        self.start_polling();
        Ok(())
    }

    /// The item closed (or the host is shutting down): persist or purge its
    /// resume position and reset to idle. All record side effects are
    /// best-effort; a failed write never takes down playback.
    pub fn on_file_closed(&mut self) {
        cancel(&mut self.poll_task);
        cancel(&mut self.seek_task);

        let (reference, current_time_ms, stream_length_ms) = {
            let mut state = self.state.lock();
            let current = state.current.take();
            let snapshot = (current, state.current_time_ms, state.stream_length_ms);
            state.current_time_ms = 0;
            state.stream_length_ms = 0;
            snapshot
        };
        let Some(reference) = reference else {
            return;
        };

        let record_path = store::record_path(&self.base_dir, reference.identity_hash());
        match policy::savable_position(current_time_ms, stream_length_ms, &self.config) {
            Some(position_ms) if reference.source_path().exists() => {
                let record = ResumeRecord {
                    file: reference.relative_path().to_string(),
                    mountpoint: reference.mountpoint().to_string(),
                    time_ms: position_ms,
                    created_ms: Utc::now().timestamp_millis().max(0) as u64,
                };
                if let Err(err) = store::write_record(&record_path, &record) {
                    warn!("failed to write resume record: {err}");
                }
                if let Err(err) = store::write_last_played(&self.base_dir, reference.raw_path()) {
                    warn!("failed to write last played pointer: {err}");
                }
            }
            _ => {
                if let Err(err) = store::delete_record(&record_path) {
                    warn!("failed to delete resume record: {err}");
                }
                if let Err(err) = store::delete_last_played(&self.base_dir) {
                    warn!("failed to delete last played pointer: {err}");
                }
            }
        }
    }

    fn schedule_seek(&mut self, position_ms: u64) {
        cancel(&mut self.seek_task);
        let player = Arc::clone(&self.player);
        self.seek_task = Some(tokio::spawn(async move {
            for _ in 0..SEEK_RETRY_LIMIT {
                if player.is_seekable() {
                    player.seek_to(position_ms, true);
                    return;
                }
                tokio::time::sleep(SEEK_RETRY_DELAY).await;
            }
            warn!("player never became seekable, dropping resume to {position_ms}ms");
        }));
    }

    fn start_polling(&mut self) {
        cancel(&mut self.poll_task);
        let player = Arc::clone(&self.player);
        let state = Arc::clone(&self.state);
        // tokio intervals reject a zero period; the first tick is immediate.
        let period = Duration::from_secs(self.config.update_interval_secs.max(1));
        self.poll_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let current_time_ms = player.current_time_ms();
                let stream_length_ms = player.stream_length_ms();
                let mut state = state.lock();
                state.current_time_ms = current_time_ms;
                state.stream_length_ms = stream_length_ms;
            }
        }));
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        cancel(&mut self.restart_task);
        cancel(&mut self.poll_task);
        cancel(&mut self.seek_task);
    }
}

/// Cancel a pending task if one exists. Cancelling an already finished or
/// never scheduled task is a no-op.
fn cancel(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}
