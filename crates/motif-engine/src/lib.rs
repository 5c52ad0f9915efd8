//! motif-engine: Gesture playback scheduling and the engine service layer

pub mod clock;
pub mod engine;
pub mod player;
pub mod voice;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineError, MotifEngine};
pub use player::{GesturePlayer, TriggerOptions, TriggerResult};
pub use voice::{ChannelVoice, NullVoice, VoiceCommand, VoiceSink};
