//! Engine service: background control-rate driver around palette and player

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use motif_core::{GesturePalette, PaletteStats, ScaleMode};
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::player::{GesturePlayer, TriggerOptions, TriggerResult};
use crate::voice::VoiceSink;

/// Scheduler tick period. Coarse control-rate timing, not sample-accurate.
const TICK_PERIOD: Duration = Duration::from_millis(4);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine already running")]
    AlreadyRunning,
    #[error("Engine not running")]
    NotRunning,
}

/// State shared between the host-facing API and the tick thread
struct EngineState {
    palette: Mutex<GesturePalette>,
    player: Mutex<GesturePlayer>,
    clock: SystemClock,
}

/// Owns the palette, the player, and a background thread that ticks the
/// player at control rate. Host-facing calls (trigger, release, palette
/// edits) take effect immediately; the thread only advances time.
pub struct MotifEngine {
    state: Arc<EngineState>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MotifEngine {
    pub fn new(palette: GesturePalette, voice: Box<dyn VoiceSink>) -> Self {
        Self {
            state: Arc::new(EngineState {
                palette: Mutex::new(palette),
                player: Mutex::new(GesturePlayer::new(voice)),
                clock: SystemClock::new(),
            }),
            shutdown: None,
            handle: None,
        }
    }

    /// Start the tick thread
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.handle.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let (tx, rx) = bounded::<()>(1);
        let state = self.state.clone();

        let handle = thread::spawn(move || {
            loop {
                match rx.recv_timeout(TICK_PERIOD) {
                    Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                }

                let Ok(palette) = state.palette.lock() else { continue };
                let perf = palette.performance();
                drop(palette);

                if let Ok(mut player) = state.player.lock() {
                    player.tick(&perf, state.clock.now_ms());
                }
            }
        });

        self.shutdown = Some(tx);
        self.handle = Some(handle);
        info!("Gesture engine started");
        Ok(())
    }

    /// Stop the tick thread and silence everything
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let shutdown = self.shutdown.take().ok_or(EngineError::NotRunning)?;
        let _ = shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if let Ok(mut player) = self.state.player.lock() {
            player.release_all();
        }
        info!("Gesture engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    // ------------------------------------------------------------------
    // Player surface
    // ------------------------------------------------------------------

    pub fn trigger_slot(
        &self,
        slot: u8,
        velocity: f32,
        options: TriggerOptions,
    ) -> Option<TriggerResult> {
        let (Ok(palette), Ok(mut player)) =
            (self.state.palette.lock(), self.state.player.lock())
        else {
            warn!(slot, "trigger dropped: engine state unavailable");
            return None;
        };
        player.trigger_slot(&palette, slot, velocity, options, self.state.clock.now_ms())
    }

    pub fn release_slot(&self, slot: u8) {
        if let Ok(mut player) = self.state.player.lock() {
            player.release_slot(slot);
        }
    }

    pub fn release_all(&self) {
        if let Ok(mut player) = self.state.player.lock() {
            player.release_all();
        }
    }

    pub fn is_slot_active(&self, slot: u8) -> bool {
        self.state
            .player
            .lock()
            .map(|p| p.is_slot_active(slot))
            .unwrap_or(false)
    }

    pub fn active_slots(&self) -> Vec<u8> {
        self.state
            .player
            .lock()
            .map(|p| p.active_slots())
            .unwrap_or_default()
    }

    pub fn active_gesture_count(&self) -> usize {
        self.state
            .player
            .lock()
            .map(|p| p.active_gesture_count())
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Palette surface
    // ------------------------------------------------------------------

    /// Access the palette for modification (locks the mutex)
    pub fn with_palette<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut GesturePalette) -> R,
    {
        self.state.palette.lock().ok().map(|mut p| f(&mut p))
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.with_palette(|p| p.set_tempo(bpm));
    }

    pub fn set_harmony(&self, root: u8, mode: ScaleMode) {
        self.with_palette(|p| p.set_harmony(root, mode));
    }

    pub fn toggle_slot_lock(&self, slot: u8) -> bool {
        self.with_palette(|p| p.toggle_slot_lock(slot)).unwrap_or(false)
    }

    pub fn is_slot_locked(&self, slot: u8) -> bool {
        self.state
            .palette
            .lock()
            .map(|p| p.is_slot_locked(slot))
            .unwrap_or(false)
    }

    pub fn regenerate_all(&self) {
        self.with_palette(|p| p.regenerate_all(true));
    }

    pub fn randomize_distribution(&self) {
        self.with_palette(|p| p.randomize_distribution());
    }

    pub fn evolve_unlocked_slots(&self) {
        self.with_palette(|p| p.evolve_unlocked_slots());
    }

    pub fn stats(&self) -> PaletteStats {
        self.with_palette(|p| p.stats()).unwrap_or_default()
    }
}

impl Drop for MotifEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
