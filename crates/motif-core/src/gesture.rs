//! Gesture data model: timed note events and per-slot configuration

use serde::{Deserialize, Serialize};

use crate::styles::StyleId;

/// Advisory per-event label, consumed at playback time to reweight velocity
/// without touching the stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTag {
    Ghost,
    Grace,
    Accent,
    Pedal,
}

impl EventTag {
    /// Multiplicative velocity modifier applied at playback
    pub fn velocity_scale(&self) -> f32 {
        match self {
            Self::Ghost => 0.4,
            Self::Grace => 0.6,
            Self::Accent => 1.2,
            Self::Pedal => 0.7,
        }
    }
}

/// A single timed note event within a gesture.
///
/// `time` and `duration` are in beats from gesture start. Events within one
/// gesture need not be time-sorted; the player orders them by computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    pub pitch: u8,
    /// Velocity (0.0 to 1.0)
    pub velocity: f32,
    pub duration: f64,
    pub tag: Option<EventTag>,
}

impl Event {
    pub fn new(time: f64, pitch: u8, velocity: f32, duration: f64) -> Self {
        Self {
            time: time.max(0.0),
            pitch,
            velocity: velocity.clamp(0.0, 1.0),
            duration: duration.max(0.0),
            tag: None,
        }
    }

    pub fn tagged(time: f64, pitch: u8, velocity: f32, duration: f64, tag: EventTag) -> Self {
        Self {
            tag: Some(tag),
            ..Self::new(time, pitch, velocity, duration)
        }
    }
}

/// Voice role, advisory: influences register assignment only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Bass,
    Chords,
    Lead,
    Texture,
    Percussion,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bass => "Bass",
            Self::Chords => "Chords",
            Self::Lead => "Lead",
            Self::Texture => "Texture",
            Self::Percussion => "Percussion",
        }
    }
}

/// A generated, timed sequence of note events for one slot.
///
/// Immutable once generated; the palette replaces the whole object on
/// regeneration rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gesture {
    pub style: StyleId,
    pub slot: u8,
    pub role: Role,
    pub events: Vec<Event>,
    /// Repeat period in beats; None means one-shot. Generators choose a value
    /// at least as long as the gesture span; the player uses it as-is.
    pub loop_length_beats: Option<f64>,
    pub label: String,
}

impl Gesture {
    /// Well-defined empty gesture, used wherever generation cannot produce
    /// notes (empty register, misconfiguration). Degrades to silence.
    pub fn empty(style: StyleId, slot: u8, role: Role) -> Self {
        Self {
            style,
            slot,
            role,
            events: Vec::new(),
            loop_length_beats: None,
            label: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total span in beats: max over events of time + duration
    pub fn span_beats(&self) -> f64 {
        self.events
            .iter()
            .map(|e| e.time + e.duration)
            .fold(0.0, f64::max)
    }
}

/// Per-slot generative parameters.
///
/// Created by the palette; mutated only by explicit palette operations, never
/// by the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub slot: u8,
    pub style: StyleId,
    pub role: Role,
    /// All normalized to [0, 1]
    pub density: f32,
    pub complexity: f32,
    pub tension: f32,
    pub rhythm_loose: f32,
    pub motif_variation: f32,
    /// Octave bias applied to the slot's register center
    pub register_shift: i8,
    pub seed: u64,
}

impl SlotConfig {
    pub fn new(slot: u8, style: StyleId, role: Role, seed: u64) -> Self {
        Self {
            slot,
            style,
            role,
            density: 0.5,
            complexity: 0.5,
            tension: 0.3,
            rhythm_loose: 0.2,
            motif_variation: 0.4,
            register_shift: 0,
            seed,
        }
    }

    /// Clamp all normalized parameters into [0, 1]
    pub fn clamped(mut self) -> Self {
        self.density = self.density.clamp(0.0, 1.0);
        self.complexity = self.complexity.clamp(0.0, 1.0);
        self.tension = self.tension.clamp(0.0, 1.0);
        self.rhythm_loose = self.rhythm_loose.clamp(0.0, 1.0);
        self.motif_variation = self.motif_variation.clamp(0.0, 1.0);
        self
    }
}

/// Process-wide tempo context. The player reads it on every scheduling
/// action, so a tempo change applies to newly scheduled events and loop
/// iterations, never retroactively to events already armed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceContext {
    bpm: f64,
}

impl Default for PerformanceContext {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

impl PerformanceContext {
    pub fn new(bpm: f64) -> Self {
        Self { bpm: bpm.clamp(20.0, 300.0) }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm.clamp(20.0, 300.0);
    }

    pub fn ms_per_beat(&self) -> f64 {
        60_000.0 / self.bpm
    }
}
