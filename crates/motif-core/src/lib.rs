//! motif-core: Domain types for the motif gesture instrument

mod error;
pub mod gesture;
pub mod harmony;
pub mod palette;
mod rng;
pub mod styles;

pub use error::{MotifError, Result};
pub use gesture::{Event, EventTag, Gesture, PerformanceContext, Role, SlotConfig};
pub use harmony::{ChordQuality, DiatonicChord, HarmonicContext, ScaleMode};
pub use palette::{blend_configs, GesturePalette, PaletteStats};
pub use rng::SeededRandom;
pub use styles::StyleId;
