//! Two-voice counterpoint style: a stepwise line shadowed by triad tones

use serde::{Deserialize, Serialize};

use crate::gesture::{Event, Gesture, PerformanceContext, SlotConfig};
use crate::harmony::HarmonicContext;
use crate::rng::SeededRandom;

use super::{jitter_time, register_center};

/// Which side of the melodic note the companion voice must stay on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceSide {
    Below,
    Above,
}

/// Nearest triad tone strictly on the requested side of `target`, searched
/// over the tonic triad's pitch classes realized into nearby octaves.
pub(super) fn closest_triad_tone(
    triad_classes: &[u8],
    target: u8,
    side: VoiceSide,
) -> Option<u8> {
    let mut best: Option<u8> = None;
    for &pc in triad_classes {
        for octave in 0..11u8 {
            let pitch = octave as i16 * 12 + pc as i16;
            if !(0..=127).contains(&pitch) {
                continue;
            }
            let pitch = pitch as u8;
            let on_side = match side {
                VoiceSide::Below => pitch < target,
                VoiceSide::Above => pitch > target,
            };
            if !on_side {
                continue;
            }
            match best {
                Some(b) if pitch.abs_diff(target) >= b.abs_diff(target) => {}
                _ => best = Some(pitch),
            }
        }
    }
    best
}

pub(super) fn generate(
    config: &SlotConfig,
    harmony: &HarmonicContext,
    _perf: &PerformanceContext,
) -> Gesture {
    let mut rng = SeededRandom::new(config.seed);
    let center = register_center(config);
    let window = harmony.pitches_in_window(center, 1.5 + config.complexity as f64);
    if window.is_empty() {
        return Gesture::empty(config.style, config.slot, config.role);
    }

    let triad_classes: Vec<u8> = harmony
        .tonic_triad()
        .map(|c| c.pitches.iter().map(|&p| p % 12).collect())
        .unwrap_or_default();
    let side = if rng.chance(0.5 + config.tension as f64 * 0.3) {
        VoiceSide::Below
    } else {
        VoiceSide::Above
    };

    // Stepwise melody: walk the window index by small degree steps
    let length = 8 + (config.density * 8.0) as usize;
    let mut idx = window
        .iter()
        .position(|&p| p >= center)
        .unwrap_or(window.len() / 2) as i64;

    let mut events = Vec::with_capacity(length * 2);
    let mut time = 0.0;
    for _ in 0..length {
        let step = match rng.int(0, 9) {
            0 => -2,
            1..=4 => -1,
            5..=8 => 1,
            _ => 2,
        };
        idx = (idx + step).clamp(0, window.len() as i64 - 1);
        let pitch = window[idx as usize];
        let long_note = rng.chance(1.0 - config.density as f64 * 0.7);
        let duration = if long_note { 0.9 } else { 0.45 };
        let beat = if long_note { 1.0 } else { 0.5 };
        let velocity = 0.5 + rng.range(0.0, 0.15) as f32;

        events.push(Event::new(time, pitch, velocity, duration));

        // Companion voice: nearest tonic-triad tone on the configured side
        if let Some(companion) = closest_triad_tone(&triad_classes, pitch, side) {
            events.push(Event::new(time, companion, velocity * 0.8, duration));
        }

        time += beat;
    }

    for event in &mut events {
        event.time = jitter_time(event.time, config.rhythm_loose * 0.4, &mut rng);
    }

    // Loop on a whole number of 4-beat bars covering the line
    let span = events
        .iter()
        .map(|e| e.time + e.duration)
        .fold(0.0, f64::max);
    let loop_length = (span / 4.0).ceil().max(1.0) * 4.0;

    Gesture {
        style: config.style,
        slot: config.slot,
        role: config.role,
        events,
        loop_length_beats: Some(loop_length),
        label: format!(
            "Counterpoint {}",
            if side == VoiceSide::Below { "under" } else { "over" }
        ),
    }
}
