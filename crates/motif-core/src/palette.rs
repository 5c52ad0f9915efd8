//! Keyboard gesture palette: per-slot configs and cached gestures across the
//! keyboard range

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MotifError, Result};
use crate::gesture::{Gesture, PerformanceContext, Role, SlotConfig};
use crate::harmony::{HarmonicContext, ScaleMode};
use crate::rng::SeededRandom;
use crate::styles::{self, StyleId};

/// Style subset for the low register band
const LOW_STYLES: &[StyleId] = &[StyleId::Minimal, StyleId::Counterpoint];
/// Style subset for the high register band
const HIGH_STYLES: &[StyleId] = &[StyleId::Cascade, StyleId::Mutation];

/// Aggregate distribution counts across all slots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaletteStats {
    pub style_distribution: HashMap<StyleId, usize>,
    pub role_distribution: HashMap<Role, usize>,
}

/// State machine over a contiguous range of keyboard slots.
///
/// Owns every slot's generative config and its cached gesture, the harmonic
/// and tempo contexts, and the lock set. Gestures are replaced wholesale on
/// regeneration, never mutated; the cache hands out `Arc` clones so a locked
/// slot's gesture stays reference-stable across bulk operations.
#[derive(Debug, Clone)]
pub struct GesturePalette {
    min_slot: u8,
    max_slot: u8,
    master_seed: u64,
    configs: HashMap<u8, SlotConfig>,
    gestures: HashMap<u8, Arc<Gesture>>,
    locked: HashSet<u8>,
    harmony: HarmonicContext,
    performance: PerformanceContext,
    style_weights: HashMap<StyleId, f32>,
    /// Session stream for randomize/evolve draws; seeded from the master seed
    /// so every palette operation is reproducible
    session_rng: SeededRandom,
}

impl GesturePalette {
    pub fn new(
        min_slot: u8,
        max_slot: u8,
        root: u8,
        mode: ScaleMode,
        master_seed: u64,
    ) -> Result<Self> {
        if min_slot > max_slot {
            return Err(MotifError::EmptyRange { min: min_slot, max: max_slot });
        }

        let mut palette = Self {
            min_slot,
            max_slot,
            master_seed,
            configs: HashMap::new(),
            gestures: HashMap::new(),
            locked: HashSet::new(),
            harmony: HarmonicContext::new(root, mode),
            performance: PerformanceContext::default(),
            style_weights: HashMap::new(),
            session_rng: SeededRandom::new(master_seed.wrapping_add(1)),
        };
        palette.initialize_slots();
        Ok(palette)
    }

    pub fn min_slot(&self) -> u8 {
        self.min_slot
    }

    pub fn max_slot(&self) -> u8 {
        self.max_slot
    }

    pub fn slot_count(&self) -> usize {
        (self.max_slot - self.min_slot) as usize + 1
    }

    pub fn harmony(&self) -> &HarmonicContext {
        &self.harmony
    }

    pub fn performance(&self) -> PerformanceContext {
        self.performance
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.performance.set_bpm(bpm);
    }

    /// Rebuild the whole layout from the master seed. Clears locks; running
    /// this twice with the same master seed yields identical configs.
    pub fn initialize_slots(&mut self) {
        let mut rng = SeededRandom::new(self.master_seed);
        self.style_weights = StyleId::ALL.iter().map(|&s| (s, 1.0)).collect();
        self.locked.clear();
        self.configs.clear();
        self.gestures.clear();

        let weights = self.style_weights.clone();
        for slot in self.min_slot..=self.max_slot {
            let config = self.derive_config(slot, &weights, &mut rng);
            self.configs.insert(slot, config);
        }
        self.regenerate_all(false);
    }

    /// Position-banded role/style/register assignment. Band boundaries are
    /// hard thresholds on position; no smoothing across them.
    fn derive_config(
        &self,
        slot: u8,
        weights: &HashMap<StyleId, f32>,
        rng: &mut SeededRandom,
    ) -> SlotConfig {
        let total = self.slot_count().max(2) as f32;
        let position = (slot - self.min_slot) as f32 / (total - 1.0);

        let (role, style, register_shift) = if position < 0.25 {
            let role = if rng.chance(0.7) { Role::Bass } else { Role::Texture };
            let style = weighted_style(LOW_STYLES, weights, rng);
            (role, style, -(rng.int(1, 2) as i8))
        } else if position < 0.5 {
            let role = if rng.chance(0.6) { Role::Chords } else { Role::Texture };
            let style = weighted_style(StyleId::ALL, weights, rng);
            (role, style, rng.int(-1, 0) as i8)
        } else if position < 0.75 {
            let role = if rng.chance(0.5) { Role::Lead } else { Role::Chords };
            let style = weighted_style(StyleId::ALL, weights, rng);
            (role, style, rng.int(0, 1) as i8)
        } else {
            let role = if rng.chance(0.6) { Role::Lead } else { Role::Texture };
            let style = weighted_style(HIGH_STYLES, weights, rng);
            (role, style, rng.int(1, 2) as i8)
        };

        SlotConfig {
            slot,
            style,
            role,
            density: rng.range(0.3, 0.9) as f32,
            complexity: rng.range(0.2, 0.8) as f32,
            tension: rng.range(0.1, 0.7) as f32,
            rhythm_loose: rng.range(0.0, 0.5) as f32,
            motif_variation: rng.range(0.2, 0.8) as f32,
            register_shift,
            seed: rng.int(1, 2_000_000_000) as u64,
        }
    }

    fn build_gesture(&self, config: &SlotConfig) -> Arc<Gesture> {
        Arc::new(styles::generate(config, &self.harmony, &self.performance))
    }

    /// Regenerate cached gestures. Locked slots keep their cached gesture
    /// untouched unless `respect_locks` is false.
    pub fn regenerate_all(&mut self, respect_locks: bool) {
        let slots: Vec<u8> = self.configs.keys().copied().collect();
        for slot in slots {
            if respect_locks && self.locked.contains(&slot) {
                continue;
            }
            if let Some(config) = self.configs.get(&slot) {
                let gesture = self.build_gesture(config);
                self.gestures.insert(slot, gesture);
            }
        }
    }

    /// Regenerate one slot; a locked slot returns its cached gesture
    /// unchanged.
    pub fn regenerate_slot(&mut self, slot: u8) -> Option<Arc<Gesture>> {
        if self.locked.contains(&slot) {
            return self.gestures.get(&slot).cloned();
        }
        let config = self.configs.get(&slot)?;
        let gesture = self.build_gesture(config);
        self.gestures.insert(slot, gesture.clone());
        Some(gesture)
    }

    /// Change root/scale. A no-op when unchanged; otherwise rebuilds the
    /// harmonic context and regenerates unlocked slots. Locked slots keep
    /// their cached gestures even though the harmony moved underneath them:
    /// locking freezes the exact performance, possibly out of key.
    pub fn set_harmony(&mut self, root: u8, mode: ScaleMode) {
        if self.harmony.root == root.min(127) && self.harmony.mode == mode {
            return;
        }
        self.harmony = HarmonicContext::new(root, mode);
        self.regenerate_all(true);
    }

    /// Draw a new random weighting over all styles and re-derive every
    /// unlocked slot's full config, then regenerate those slots.
    pub fn randomize_distribution(&mut self) {
        let mut weights = HashMap::new();
        for &style in StyleId::ALL {
            weights.insert(style, self.session_rng.range(0.1, 1.0) as f32);
        }
        self.style_weights = weights.clone();

        let mut rng = self.session_rng.clone();
        for slot in self.min_slot..=self.max_slot {
            if self.locked.contains(&slot) {
                continue;
            }
            let config = self.derive_config(slot, &weights, &mut rng);
            self.configs.insert(slot, config);
        }
        self.session_rng = rng;
        self.regenerate_all(true);
    }

    /// Guided mutation toward locked exemplars: each unlocked slot blends its
    /// config toward one of its (up to 3) nearest locked slots and
    /// regenerates. Falls back to plain regeneration when nothing is locked.
    pub fn evolve_unlocked_slots(&mut self) {
        if self.locked.is_empty() {
            self.regenerate_all(true);
            return;
        }

        let mut locked: Vec<u8> = self.locked.iter().copied().collect();
        let mut rng = self.session_rng.clone();

        for slot in self.min_slot..=self.max_slot {
            if self.locked.contains(&slot) {
                continue;
            }
            locked.sort_by_key(|&l| (l.abs_diff(slot), l));
            let nearest = &locked[..locked.len().min(3)];
            let Some(&reference_slot) = rng.choice(nearest) else {
                continue;
            };
            let (Some(base), Some(reference)) =
                (self.configs.get(&slot), self.configs.get(&reference_slot))
            else {
                continue;
            };

            let strength = rng.range(0.4, 0.8) as f32;
            let evolved = blend_configs(base, reference, strength, &mut rng);
            self.configs.insert(slot, evolved);
        }

        self.session_rng = rng;
        self.regenerate_all(true);
    }

    /// Toggle a slot's lock; returns the new locked state
    pub fn toggle_slot_lock(&mut self, slot: u8) -> bool {
        if self.locked.contains(&slot) {
            self.locked.remove(&slot);
            false
        } else {
            self.locked.insert(slot);
            true
        }
    }

    pub fn is_slot_locked(&self, slot: u8) -> bool {
        self.locked.contains(&slot)
    }

    pub fn get_gesture(&self, slot: u8) -> Option<Arc<Gesture>> {
        self.gestures.get(&slot).cloned()
    }

    pub fn get_slot_config(&self, slot: u8) -> Option<&SlotConfig> {
        self.configs.get(&slot)
    }

    /// Direct config update. Deliberately bypasses the lock (locking protects
    /// against bulk operations, not explicit edits) and regenerates the slot.
    pub fn update_slot_config(&mut self, config: SlotConfig) -> Result<()> {
        let slot = config.slot;
        if !(self.min_slot..=self.max_slot).contains(&slot) {
            return Err(MotifError::SlotOutOfRange(slot));
        }
        self.configs.insert(slot, config.clamped());
        if let Some(config) = self.configs.get(&slot) {
            let gesture = self.build_gesture(config);
            self.gestures.insert(slot, gesture);
        }
        Ok(())
    }

    pub fn stats(&self) -> PaletteStats {
        let mut stats = PaletteStats::default();
        for config in self.configs.values() {
            *stats.style_distribution.entry(config.style).or_insert(0) += 1;
            *stats.role_distribution.entry(config.role).or_insert(0) += 1;
        }
        stats
    }
}

/// Pick from `candidates` proportionally to their weights. An empty or
/// all-zero candidate pool falls back to the default style.
fn weighted_style(
    candidates: &[StyleId],
    weights: &HashMap<StyleId, f32>,
    rng: &mut SeededRandom,
) -> StyleId {
    let total: f32 = candidates
        .iter()
        .map(|s| weights.get(s).copied().unwrap_or(0.0))
        .sum();
    if total <= 0.0 {
        return StyleId::Minimal;
    }

    let mut remaining = rng.range(0.0, total as f64) as f32;
    for &style in candidates {
        remaining -= weights.get(&style).copied().unwrap_or(0.0);
        if remaining <= 0.0 {
            return style;
        }
    }
    *candidates.last().unwrap_or(&StyleId::Minimal)
}

/// Blend an unlocked slot's config toward a locked reference: weighted lerp
/// of the shape parameters plus jitter, style copied from the reference,
/// rhythm/motif parameters jittered, fresh seed. Jitter keeps evolved slots
/// from collapsing onto their exemplars.
pub fn blend_configs(
    base: &SlotConfig,
    reference: &SlotConfig,
    strength: f32,
    rng: &mut SeededRandom,
) -> SlotConfig {
    let lerp = |a: f32, b: f32, rng: &mut SeededRandom| -> f32 {
        a + (b - a) * strength + rng.range(-0.08, 0.08) as f32
    };

    SlotConfig {
        slot: base.slot,
        style: reference.style,
        role: base.role,
        density: lerp(base.density, reference.density, rng),
        complexity: lerp(base.complexity, reference.complexity, rng),
        tension: lerp(base.tension, reference.tension, rng),
        rhythm_loose: base.rhythm_loose + rng.range(-0.15, 0.15) as f32,
        motif_variation: base.motif_variation + rng.range(-0.15, 0.15) as f32,
        register_shift: base.register_shift,
        seed: rng.int(1, 2_000_000_000) as u64,
    }
    .clamped()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> GesturePalette {
        GesturePalette::new(36, 96, 60, ScaleMode::Major, 0xC0FFEE).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(GesturePalette::new(96, 36, 60, ScaleMode::Major, 1).is_err());
    }

    #[test]
    fn initialization_is_reproducible() {
        let a = palette();
        let b = palette();
        assert_eq!(a.configs, b.configs);
    }

    #[test]
    fn every_gesture_has_a_config() {
        let p = palette();
        assert_eq!(p.configs.len(), p.slot_count());
        for slot in p.gestures.keys() {
            assert!(p.configs.contains_key(slot));
        }
    }

    #[test]
    fn register_bands_restrict_styles() {
        let p = palette();
        for (slot, config) in &p.configs {
            let position = (slot - 36) as f32 / 60.0;
            if position < 0.25 {
                assert!(LOW_STYLES.contains(&config.style));
            } else if position >= 0.75 {
                assert!(HIGH_STYLES.contains(&config.style));
            }
        }
    }

    #[test]
    fn locked_slot_survives_bulk_operations() {
        let mut p = palette();
        assert!(p.toggle_slot_lock(60));
        let locked_gesture = p.get_gesture(60).unwrap();
        let locked_config = p.get_slot_config(60).unwrap().clone();

        p.regenerate_all(true);
        p.randomize_distribution();
        p.evolve_unlocked_slots();

        assert!(Arc::ptr_eq(&locked_gesture, &p.get_gesture(60).unwrap()));
        assert_eq!(&locked_config, p.get_slot_config(60).unwrap());
    }

    #[test]
    fn unlocking_releases_the_gesture() {
        let mut p = palette();
        p.toggle_slot_lock(60);
        let locked = p.get_gesture(60).unwrap();
        assert!(!p.toggle_slot_lock(60));
        p.regenerate_all(true);
        assert!(!Arc::ptr_eq(&locked, &p.get_gesture(60).unwrap()));
    }

    #[test]
    fn regenerate_slot_respects_lock() {
        let mut p = palette();
        p.toggle_slot_lock(40);
        let before = p.get_gesture(40).unwrap();
        let after = p.regenerate_slot(40).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn set_harmony_same_values_is_a_noop() {
        let mut p = palette();
        let before = p.get_gesture(60).unwrap();
        p.set_harmony(60, ScaleMode::Major);
        assert!(Arc::ptr_eq(&before, &p.get_gesture(60).unwrap()));
    }

    #[test]
    fn harmony_change_keeps_locked_gestures_stale() {
        let mut p = palette();
        p.toggle_slot_lock(48);
        let locked = p.get_gesture(48).unwrap();
        let unlocked = p.get_gesture(61).unwrap();

        p.set_harmony(62, ScaleMode::Dorian);

        assert!(Arc::ptr_eq(&locked, &p.get_gesture(48).unwrap()));
        assert!(!Arc::ptr_eq(&unlocked, &p.get_gesture(61).unwrap()));
    }

    #[test]
    fn evolve_copies_style_from_locked_reference() {
        let mut p = palette();
        p.toggle_slot_lock(60);
        let reference_style = p.get_slot_config(60).unwrap().style;

        p.evolve_unlocked_slots();

        // A single locked slot is every unlocked slot's only exemplar
        for slot in 36..=96u8 {
            if slot == 60 {
                continue;
            }
            assert_eq!(p.get_slot_config(slot).unwrap().style, reference_style);
        }
    }

    #[test]
    fn evolve_without_locks_still_regenerates() {
        let mut p = palette();
        let before = p.get_gesture(70).unwrap();
        p.evolve_unlocked_slots();
        assert!(!Arc::ptr_eq(&before, &p.get_gesture(70).unwrap()));
    }

    #[test]
    fn update_slot_config_bypasses_lock() {
        let mut p = palette();
        p.toggle_slot_lock(60);
        let before = p.get_gesture(60).unwrap();
        let mut config = p.get_slot_config(60).unwrap().clone();
        config.seed = 31337;
        p.update_slot_config(config).unwrap();
        assert!(!Arc::ptr_eq(&before, &p.get_gesture(60).unwrap()));
    }

    #[test]
    fn update_slot_config_out_of_range_fails() {
        let mut p = palette();
        let config = SlotConfig::new(20, StyleId::Minimal, Role::Bass, 1);
        assert!(p.update_slot_config(config).is_err());
    }

    #[test]
    fn stats_cover_every_slot() {
        let p = palette();
        let stats = p.stats();
        let styles: usize = stats.style_distribution.values().sum();
        let roles: usize = stats.role_distribution.values().sum();
        assert_eq!(styles, p.slot_count());
        assert_eq!(roles, p.slot_count());
    }

    #[test]
    fn empty_weight_pool_falls_back_to_minimal() {
        let mut rng = SeededRandom::new(1);
        let weights = HashMap::new();
        assert_eq!(
            weighted_style(StyleId::ALL, &weights, &mut rng),
            StyleId::Minimal
        );
    }

    #[test]
    fn blend_moves_toward_reference_but_not_onto_it() {
        let mut rng = SeededRandom::new(5);
        let mut base = SlotConfig::new(50, StyleId::Minimal, Role::Bass, 1);
        base.density = 0.1;
        let mut reference = SlotConfig::new(70, StyleId::Cascade, Role::Lead, 2);
        reference.density = 0.9;

        let blended = blend_configs(&base, &reference, 0.6, &mut rng);
        assert_eq!(blended.style, StyleId::Cascade);
        assert_eq!(blended.slot, 50);
        assert_eq!(blended.role, Role::Bass);
        assert!(blended.density > base.density);
        // Jitter bounds: strength 0.6 lands at 0.58 +/- 0.08
        assert!((blended.density - 0.58).abs() <= 0.08 + 1e-6);
    }
}
