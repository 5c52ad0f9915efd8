//! Style generators: pluggable algorithms that turn a slot config into a gesture

mod cascade;
mod counterpoint;
mod minimal;
mod mutation;

pub use counterpoint::VoiceSide;
pub use minimal::build_cell;

use serde::{Deserialize, Serialize};

use crate::gesture::{Gesture, PerformanceContext, Role, SlotConfig};
use crate::harmony::HarmonicContext;
use crate::rng::SeededRandom;

/// Style identifiers, resolved by a static dispatch table rather than a
/// runtime registry so the set of generators is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleId {
    Minimal,
    Cascade,
    Counterpoint,
    Mutation,
}

impl StyleId {
    pub const ALL: &'static [StyleId] = &[
        StyleId::Minimal,
        StyleId::Cascade,
        StyleId::Counterpoint,
        StyleId::Mutation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Minimal => "Minimal",
            Self::Cascade => "Cascade",
            Self::Counterpoint => "Counterpoint",
            Self::Mutation => "Mutation",
        }
    }
}

/// Generate a gesture for the given slot configuration.
///
/// Deterministic: the only randomness source is a fresh [`SeededRandom`] built
/// from `config.seed`. A register that yields no usable pitches produces an
/// explicit empty gesture, never an error.
pub fn generate(
    config: &SlotConfig,
    harmony: &HarmonicContext,
    perf: &PerformanceContext,
) -> Gesture {
    match config.style {
        StyleId::Minimal => minimal::generate(config, harmony, perf),
        StyleId::Cascade => cascade::generate(config, harmony, perf),
        StyleId::Counterpoint => counterpoint::generate(config, harmony, perf),
        StyleId::Mutation => mutation::generate(config, harmony, perf),
    }
}

/// Register center for a slot: the slot's own pitch shifted by the octave
/// bias, nudged by role, clamped to MIDI range.
pub(crate) fn register_center(config: &SlotConfig) -> u8 {
    let role_bias: i16 = match config.role {
        Role::Bass => -12,
        Role::Lead => 5,
        _ => 0,
    };
    let center = config.slot as i16 + config.register_shift as i16 * 12 + role_bias;
    center.clamp(0, 127) as u8
}

/// Perturb an event time by a bounded amount proportional to looseness.
/// Never goes negative.
pub(crate) fn jitter_time(time: f64, loose: f32, rng: &mut SeededRandom) -> f64 {
    if loose <= 0.0 {
        return time;
    }
    let window = loose as f64 * 0.08;
    (time + rng.range(-window, window)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::Role;
    use crate::harmony::ScaleMode;

    fn config_for(style: StyleId, seed: u64) -> SlotConfig {
        SlotConfig::new(60, style, Role::Lead, seed)
    }

    #[test]
    fn all_styles_are_deterministic() {
        let harmony = HarmonicContext::new(60, ScaleMode::Minor);
        let perf = PerformanceContext::default();
        for &style in StyleId::ALL {
            for seed in [1u64, 42, 9999, 123456789] {
                let config = config_for(style, seed);
                let a = generate(&config, &harmony, &perf);
                let b = generate(&config, &harmony, &perf);
                assert_eq!(a, b, "{} seed {} not deterministic", style.name(), seed);
            }
        }
    }

    #[test]
    fn determinism_is_bit_identical_via_json() {
        let harmony = HarmonicContext::new(57, ScaleMode::Dorian);
        let perf = PerformanceContext::default();
        let config = config_for(StyleId::Mutation, 777);
        let a = serde_json::to_string(&generate(&config, &harmony, &perf)).unwrap();
        let b = serde_json::to_string(&generate(&config, &harmony, &perf)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn generated_events_are_well_formed() {
        let harmony = HarmonicContext::new(60, ScaleMode::Major);
        let perf = PerformanceContext::default();
        for &style in StyleId::ALL {
            for seed in 0..50u64 {
                let mut config = config_for(style, seed);
                config.rhythm_loose = 0.9;
                config.motif_variation = 0.9;
                let g = generate(&config, &harmony, &perf);
                assert_eq!(g.slot, config.slot);
                assert_eq!(g.role, config.role);
                for e in &g.events {
                    assert!(e.time >= 0.0, "{} negative time", style.name());
                    assert!(e.duration >= 0.0);
                    assert!((0.0..=1.0).contains(&e.velocity));
                }
                if let Some(len) = g.loop_length_beats {
                    assert!(len > 0.0);
                }
            }
        }
    }

    #[test]
    fn empty_harmonic_context_degrades_to_silence() {
        let barren = HarmonicContext {
            root: 60,
            mode: ScaleMode::Major,
            scale_notes: Vec::new(),
            chords: Vec::new(),
        };
        let perf = PerformanceContext::default();
        for &style in StyleId::ALL {
            let g = generate(&config_for(style, 42), &barren, &perf);
            assert!(g.is_empty(), "{} should be empty", style.name());
            assert_eq!(g.slot, 60);
        }
    }

    #[test]
    fn register_center_applies_octave_shift() {
        let mut config = config_for(StyleId::Minimal, 1);
        config.role = Role::Texture;
        config.register_shift = -2;
        assert_eq!(register_center(&config), 36);
    }

    #[test]
    fn jitter_never_goes_negative() {
        let mut rng = SeededRandom::new(3);
        for _ in 0..1000 {
            assert!(jitter_time(0.01, 1.0, &mut rng) >= 0.0);
        }
    }
}
