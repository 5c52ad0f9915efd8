//! Cascade style: one-shot multi-bar runs across an extended register

use crate::gesture::{Event, EventTag, Gesture, PerformanceContext, SlotConfig};
use crate::harmony::HarmonicContext;
use crate::rng::SeededRandom;

use super::{jitter_time, register_center};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Ascending,
    Descending,
    Wave,
    Scatter,
}

const SHAPES: &[Shape] = &[Shape::Ascending, Shape::Descending, Shape::Wave, Shape::Scatter];

pub(super) fn generate(
    config: &SlotConfig,
    harmony: &HarmonicContext,
    _perf: &PerformanceContext,
) -> Gesture {
    let mut rng = SeededRandom::new(config.seed);
    let center = register_center(config);
    let window = harmony.pitches_in_window(center, 2.0 + config.complexity as f64 * 1.5);
    if window.is_empty() {
        return Gesture::empty(config.style, config.slot, config.role);
    }

    let shape = *rng.choice(SHAPES).unwrap_or(&Shape::Ascending);
    let count = 8 + (config.complexity * 24.0) as usize;
    let step = 0.12 + (1.0 - config.density as f64) * 0.13;
    let note_duration = 0.3 + config.tension as f64 * 0.2;
    let base_velocity = 0.5 + config.density * 0.2;
    let wave_cycles = 1.0 + config.complexity as f64 * 2.0;

    let last = window.len() - 1;
    let mut events: Vec<Event> = (0..count)
        .map(|i| {
            let phase = if count > 1 { i as f64 / (count - 1) as f64 } else { 0.0 };
            let idx = match shape {
                Shape::Ascending => (phase * last as f64).round() as usize,
                Shape::Descending => ((1.0 - phase) * last as f64).round() as usize,
                Shape::Wave => {
                    let s = (phase * wave_cycles * std::f64::consts::TAU).sin() * 0.5 + 0.5;
                    (s * last as f64).round() as usize
                }
                Shape::Scatter => rng.int(0, last as i64) as usize,
            };
            // Velocity swells toward the middle of the run
            let contour = 1.0 - (phase - 0.5).abs() as f32 * 0.4;
            Event::new(
                i as f64 * step,
                window[idx.min(last)],
                base_velocity * contour,
                note_duration,
            )
        })
        .collect();

    let run_span = (count - 1) as f64 * step + note_duration;

    if rng.chance(config.tension as f64 * 0.7) {
        // Sustained pedal underneath the whole run
        let pedal_pitch = window[0];
        events.push(Event::tagged(0.0, pedal_pitch, 0.5, run_span, EventTag::Pedal));
    }

    if rng.chance(config.complexity as f64 * 0.5) {
        // Stacked-fourths chord punctuating the end of the run
        let base = harmony.quantize(center);
        for k in 0..3u8 {
            let pitch = harmony.quantize(base.saturating_add(k * 5).min(127));
            events.push(Event::tagged(run_span, pitch, 0.6, 2.0, EventTag::Accent));
        }
    }

    for event in &mut events {
        event.time = jitter_time(event.time, config.rhythm_loose, &mut rng);
    }

    Gesture {
        style: config.style,
        slot: config.slot,
        role: config.role,
        events,
        loop_length_beats: None,
        label: format!("Cascade {} x{}", shape_name(shape), count),
    }
}

fn shape_name(shape: Shape) -> &'static str {
    match shape {
        Shape::Ascending => "rise",
        Shape::Descending => "fall",
        Shape::Wave => "wave",
        Shape::Scatter => "scatter",
    }
}
