//! Motif-mutation style: a seed motif replayed through perturbed generations

use crate::gesture::{Event, EventTag, Gesture, PerformanceContext, SlotConfig};
use crate::harmony::HarmonicContext;
use crate::rng::SeededRandom;

use super::register_center;

/// Irregular rhythm units in beats
const RHYTHM_UNITS: &[f64] = &[
    1.0 / 3.0, // triplet
    1.0 / 5.0, // quintuplet
    1.0 / 7.0, // septuplet
];

const STUTTER_STEP: f64 = 0.09;

pub(super) fn generate(
    config: &SlotConfig,
    harmony: &HarmonicContext,
    _perf: &PerformanceContext,
) -> Gesture {
    let mut rng = SeededRandom::new(config.seed);
    let center = register_center(config);
    let window = harmony.pitches_in_window(center, 1.0 + config.complexity as f64);
    if window.is_empty() {
        return Gesture::empty(config.style, config.slot, config.role);
    }

    let swing = rng.chance(0.35);
    let unit = *rng.choice(RHYTHM_UNITS).unwrap_or(&RHYTHM_UNITS[0]);

    // Seed motif with irregular rhythm
    let motif_len = 3 + (config.complexity * 3.0) as usize;
    let mut motif = Vec::with_capacity(motif_len);
    let mut time = 0.0;
    for i in 0..motif_len {
        let pitch = *rng.choice(&window).unwrap_or(&window[0]);
        let beat = if swing {
            if i % 2 == 0 { 0.66 } else { 0.34 }
        } else {
            unit * rng.int(1, 3) as f64
        };
        let velocity = 0.5 + rng.range(0.0, 0.2) as f32;
        motif.push(Event::new(time, pitch, velocity, beat * 0.9));
        time += beat;
    }

    let generations = 2 + (config.motif_variation * 3.0) as usize;
    let variation = config.motif_variation as f64;

    let mut events = Vec::new();
    let mut offset = 0.0;
    for _ in 0..generations {
        let mut span = 0.0f64;
        for &event in &motif {
            span = span.max(event.time + event.duration);
            emit(event, offset, variation, &mut events, &mut rng);
        }
        offset += span + rng.range(0.1, 0.4);
        mutate(&mut motif, &window, harmony, unit, variation, &mut rng);
    }

    Gesture {
        style: config.style,
        slot: config.slot,
        role: config.role,
        events,
        loop_length_beats: None,
        label: format!("Mutation x{}", generations),
    }
}

/// Emit one motif event at the given offset, possibly expanded into a
/// stutter cluster or preceded by a chromatic grace note.
fn emit(
    event: Event,
    offset: f64,
    variation: f64,
    out: &mut Vec<Event>,
    rng: &mut SeededRandom,
) {
    let placed = Event { time: event.time + offset, ..event };

    if rng.chance(variation * 0.35) {
        // Stutter: 2-4 rapid repeats with decaying velocity
        let repeats = rng.int(2, 4);
        let mut velocity = placed.velocity;
        for k in 0..repeats {
            let mut repeat = Event::new(
                placed.time + k as f64 * STUTTER_STEP,
                placed.pitch,
                velocity,
                STUTTER_STEP * 0.9,
            );
            if k > 0 {
                repeat.tag = Some(EventTag::Ghost);
            }
            out.push(repeat);
            velocity *= 0.75;
        }
        return;
    }

    if rng.chance(variation * 0.3) {
        // Chromatic grace into the note
        out.push(Event::tagged(
            (placed.time - 0.08).max(0.0),
            placed.pitch.saturating_sub(1),
            placed.velocity,
            0.07,
            EventTag::Grace,
        ));
    }
    out.push(placed);
}

/// Perturb the motif in place for the next generation
fn mutate(
    motif: &mut [Event],
    window: &[u8],
    harmony: &HarmonicContext,
    unit: f64,
    variation: f64,
    rng: &mut SeededRandom,
) {
    for event in motif.iter_mut() {
        if rng.chance(variation * 0.6) {
            let shift = rng.int(-2, 2) * 2;
            let moved = (event.pitch as i64 + shift).clamp(0, 127) as u8;
            let quantized = harmony.quantize(moved);
            event.pitch = if window.contains(&quantized) {
                quantized
            } else {
                *rng.choice(window).unwrap_or(&event.pitch)
            };
        }
        if rng.chance(variation * 0.4) {
            event.time = (event.time + rng.range(-unit / 2.0, unit / 2.0)).max(0.0);
        }
        if rng.chance(0.3) {
            event.velocity = (event.velocity + rng.range(-0.15, 0.15) as f32).clamp(0.1, 1.0);
        }
    }
}
