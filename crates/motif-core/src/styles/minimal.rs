//! Minimalist style: a small note pool cycled through a short rhythmic cell

use crate::gesture::{Event, EventTag, Gesture, PerformanceContext, SlotConfig};
use crate::harmony::HarmonicContext;
use crate::rng::SeededRandom;

use super::{jitter_time, register_center};

/// Note length for every cell step, in beats
const STEP_DURATION: f64 = 0.8;

/// Hand-authored beat cells (onset offsets in beats)
const CELLS: &[&[f64]] = &[
    &[0.0, 1.0, 2.0, 3.0],
    &[0.0, 0.5, 1.0, 1.5],
    &[0.0, 0.75, 1.5, 2.25, 3.0],
    &[0.0, 1.5, 2.0, 3.5],
    &[0.0, 0.5, 2.0, 2.5],
    &[0.0, 2.0],
    &[0.5, 1.0, 2.5, 3.0],
];

/// Build the events for one cell: pitch alternates through the pool by event
/// index (`pool[i % pool.len()]`), every note [`STEP_DURATION`] beats long.
/// Returns the events and the loop length: 2 beats when the cell span stays
/// within 2.5 beats, otherwise 4. An empty pool yields no events.
pub fn build_cell(pool: &[u8], cell: &[f64], velocity: f32) -> (Vec<Event>, f64) {
    if pool.is_empty() {
        return (Vec::new(), 2.0);
    }

    let events: Vec<Event> = cell
        .iter()
        .enumerate()
        .map(|(i, &time)| Event::new(time, pool[i % pool.len()], velocity, STEP_DURATION))
        .collect();

    let span = events
        .iter()
        .map(|e| e.time + e.duration)
        .fold(0.0, f64::max);
    let loop_length = if span <= 2.5 { 2.0 } else { 4.0 };

    (events, loop_length)
}

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

    let pool_size = (2 + (config.complexity * 2.0) as usize).min(window.len());
    let mut pool = window;
    rng.shuffle(&mut pool);
    pool.truncate(pool_size);

    let cell = *rng.choice(CELLS).unwrap_or(&CELLS[0]);
    let velocity = 0.45 + config.density * 0.3;
    let (mut events, loop_length) = build_cell(&pool, cell, velocity);

    // At most one ornament per gesture: either an asymmetric push on one
    // onset, or a grace note into the first event.
    if rng.chance(config.rhythm_loose as f64 * 0.6) && events.len() > 1 {
        let idx = rng.int(1, events.len() as i64 - 1) as usize;
        events[idx].time += rng.range(0.08, 0.18);
    } else if rng.chance(config.motif_variation as f64 * 0.5) {
        let first = events[0];
        let grace_pitch = harmony.quantize(first.pitch.saturating_sub(2));
        events.push(Event::tagged(
            (first.time - 0.12).max(0.0),
            grace_pitch,
            first.velocity,
            0.1,
            EventTag::Grace,
        ));
    }

    for event in &mut events {
        event.time = jitter_time(event.time, config.rhythm_loose * 0.5, &mut rng);
    }

    Gesture {
        style: config.style,
        slot: config.slot,
        role: config.role,
        events,
        loop_length_beats: Some(loop_length),
        label: format!("Minimal {}-note cell", pool_size),
    }
}
