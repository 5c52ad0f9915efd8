//! Voice sink boundary: where scheduled notes leave the core

use crossbeam_channel::Sender;
use tracing::trace;

/// The synthesizer-facing contract. The engine treats the voice layer as an
/// opaque sink with its own polyphony management; calls never fail and an
/// unmatched `note_off` must be harmless.
pub trait VoiceSink: Send {
    fn note_on(&mut self, pitch: u8, velocity: f32);
    fn note_off(&mut self, pitch: u8);
    fn all_notes_off(&mut self);
}

/// Discards everything; useful for headless operation
#[derive(Debug, Default)]
pub struct NullVoice;

impl VoiceSink for NullVoice {
    fn note_on(&mut self, _pitch: u8, _velocity: f32) {}
    fn note_off(&mut self, _pitch: u8) {}
    fn all_notes_off(&mut self) {}
}

/// Note message for a channel-bridged voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceCommand {
    NoteOn { pitch: u8, velocity: f32 },
    NoteOff { pitch: u8 },
    AllNotesOff,
}

/// Forwards notes over a bounded channel to an audio thread. Sends never
/// block: a full channel drops the message.
pub struct ChannelVoice {
    tx: Sender<VoiceCommand>,
}

impl ChannelVoice {
    pub fn new(tx: Sender<VoiceCommand>) -> Self {
        Self { tx }
    }
}

impl VoiceSink for ChannelVoice {
    fn note_on(&mut self, pitch: u8, velocity: f32) {
        if self.tx.try_send(VoiceCommand::NoteOn { pitch, velocity }).is_err() {
            trace!(pitch, "voice channel full, note on dropped");
        }
    }

    fn note_off(&mut self, pitch: u8) {
        let _ = self.tx.try_send(VoiceCommand::NoteOff { pitch });
    }

    fn all_notes_off(&mut self) {
        let _ = self.tx.try_send(VoiceCommand::AllNotesOff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn channel_voice_forwards_commands() {
        let (tx, rx) = bounded(8);
        let mut voice = ChannelVoice::new(tx);
        voice.note_on(60, 0.8);
        voice.note_off(60);
        voice.all_notes_off();

        assert_eq!(rx.recv().unwrap(), VoiceCommand::NoteOn { pitch: 60, velocity: 0.8 });
        assert_eq!(rx.recv().unwrap(), VoiceCommand::NoteOff { pitch: 60 });
        assert_eq!(rx.recv().unwrap(), VoiceCommand::AllNotesOff);
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (tx, _rx) = bounded(1);
        let mut voice = ChannelVoice::new(tx);
        voice.note_on(60, 0.8);
        voice.note_on(61, 0.8); // must not block
    }
}
