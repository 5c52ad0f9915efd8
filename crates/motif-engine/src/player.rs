//! Event gesture player: arms gesture events against the clock and fires
//! them into the voice sink

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use motif_core::{EventTag, Gesture, GesturePalette, PerformanceContext};
use tracing::{trace, warn};

use crate::voice::VoiceSink;

/// Final velocities are clamped into this range; the floor keeps every
/// triggered note audible.
const VELOCITY_FLOOR: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerOptions {
    /// Play a looping gesture once through
    pub force_one_shot: bool,
}

/// What a successful trigger armed
#[derive(Debug, Clone)]
pub struct TriggerResult {
    pub gesture: Arc<Gesture>,
    pub is_looping: bool,
}

#[derive(Debug, Clone, Copy)]
enum ActionKind {
    NoteOn {
        pitch: u8,
        velocity: f32,
        tag: Option<EventTag>,
    },
    NoteOff {
        pitch: u8,
    },
    LoopRestart,
}

/// One armed timer. Cancellation is structural: an action fires only if its
/// slot is still active with a matching epoch.
#[derive(Debug)]
struct ScheduledAction {
    fire_at_ms: f64,
    /// Registration order; stable tie-break for equal fire times
    seq: u64,
    slot: u8,
    epoch: u64,
    kind: ActionKind,
}

impl PartialEq for ScheduledAction {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for ScheduledAction {}

impl PartialOrd for ScheduledAction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledAction {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest action surfaces
        other
            .fire_at_ms
            .total_cmp(&self.fire_at_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Playback state for one triggered slot
#[derive(Debug)]
struct SlotPlayback {
    epoch: u64,
    gesture: Arc<Gesture>,
    is_looping: bool,
    trigger_velocity: f32,
    loop_count: u64,
    sounding: HashSet<u8>,
}

/// The scheduler: at most one playback state per slot, a single time-ordered
/// schedule, and epoch tokens guarding against stale fires.
///
/// Single-threaded by design; an owner calls [`GesturePlayer::tick`] at
/// control rate with the current clock reading.
pub struct GesturePlayer {
    voice: Box<dyn VoiceSink>,
    active: HashMap<u8, SlotPlayback>,
    schedule: BinaryHeap<ScheduledAction>,
    next_epoch: u64,
    next_seq: u64,
}

impl GesturePlayer {
    pub fn new(voice: Box<dyn VoiceSink>) -> Self {
        Self {
            voice,
            active: HashMap::new(),
            schedule: BinaryHeap::new(),
            next_epoch: 0,
            next_seq: 0,
        }
    }

    /// Start playback for a slot from its cached gesture.
    ///
    /// Any existing playback for the slot is released first, so at most one
    /// playback state per slot ever exists and all previously armed timers
    /// are invalidated before new ones go in. A missing or empty gesture
    /// reports `None` and leaves prior state untouched.
    pub fn trigger_slot(
        &mut self,
        palette: &GesturePalette,
        slot: u8,
        velocity: f32,
        options: TriggerOptions,
        now_ms: f64,
    ) -> Option<TriggerResult> {
        let Some(gesture) = palette.get_gesture(slot) else {
            warn!(slot, "trigger ignored: no gesture cached");
            return None;
        };
        if gesture.is_empty() {
            warn!(slot, "trigger ignored: empty gesture");
            return None;
        }

        self.release_slot(slot);

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let is_looping = gesture.loop_length_beats.is_some() && !options.force_one_shot;
        let ms_per_beat = palette.performance().ms_per_beat();
        self.arm_gesture(slot, epoch, &gesture, now_ms, ms_per_beat, is_looping);

        self.active.insert(
            slot,
            SlotPlayback {
                epoch,
                gesture: gesture.clone(),
                is_looping,
                trigger_velocity: velocity.clamp(0.0, 1.0),
                loop_count: 0,
                sounding: HashSet::new(),
            },
        );

        trace!(slot, epoch, is_looping, events = gesture.events.len(), "slot triggered");
        Some(TriggerResult { gesture, is_looping })
    }

    /// Arm one pass of the gesture's events starting at `base_ms`, plus the
    /// next loop restart when looping. Beat offsets are converted with the
    /// millisecond rate in force right now; later tempo changes do not touch
    /// actions already armed.
    fn arm_gesture(
        &mut self,
        slot: u8,
        epoch: u64,
        gesture: &Gesture,
        base_ms: f64,
        ms_per_beat: f64,
        looping: bool,
    ) {
        for event in &gesture.events {
            let on_ms = base_ms + event.time * ms_per_beat;
            self.push_action(
                on_ms,
                slot,
                epoch,
                ActionKind::NoteOn {
                    pitch: event.pitch,
                    velocity: event.velocity,
                    tag: event.tag,
                },
            );
            if event.duration > 0.0 {
                let off_ms = on_ms + event.duration * ms_per_beat;
                self.push_action(off_ms, slot, epoch, ActionKind::NoteOff { pitch: event.pitch });
            }
        }

        if looping {
            if let Some(loop_beats) = gesture.loop_length_beats {
                let restart_ms = base_ms + loop_beats * ms_per_beat;
                self.push_action(restart_ms, slot, epoch, ActionKind::LoopRestart);
            }
        }
    }

    fn push_action(&mut self, fire_at_ms: f64, slot: u8, epoch: u64, kind: ActionKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.schedule.push(ScheduledAction { fire_at_ms, seq, slot, epoch, kind });
    }

    /// Fire every action due at `now_ms`. Stale actions (slot released or
    /// re-triggered since they were armed) are discarded silently.
    pub fn tick(&mut self, perf: &PerformanceContext, now_ms: f64) {
        while self
            .schedule
            .peek()
            .is_some_and(|action| action.fire_at_ms <= now_ms)
        {
            let action = match self.schedule.pop() {
                Some(action) => action,
                None => break,
            };

            let Some(state) = self.active.get_mut(&action.slot) else {
                trace!(slot = action.slot, "stale action for idle slot");
                continue;
            };
            if state.epoch != action.epoch {
                trace!(slot = action.slot, "stale action from superseded trigger");
                continue;
            }

            match action.kind {
                ActionKind::NoteOn { pitch, velocity, tag } => {
                    let tag_scale = tag.map_or(1.0, |t| t.velocity_scale());
                    let final_velocity =
                        (velocity * state.trigger_velocity * tag_scale).clamp(VELOCITY_FLOOR, 1.0);
                    state.sounding.insert(pitch);
                    self.voice.note_on(pitch, final_velocity);
                }
                ActionKind::NoteOff { pitch } => {
                    // Keyed by pitch, so stutter duplicates resolve to a
                    // single off and extra offs are no-ops
                    if state.sounding.remove(&pitch) {
                        self.voice.note_off(pitch);
                    }
                }
                ActionKind::LoopRestart => {
                    state.loop_count += 1;
                    let gesture = state.gesture.clone();
                    let epoch = state.epoch;
                    trace!(slot = action.slot, count = state.loop_count, "loop restart");
                    // Anchor at the scheduled restart time, not the tick
                    // time, so loops never drift at coarse tick rates; the
                    // tempo is re-read for the new iteration.
                    self.arm_gesture(
                        action.slot,
                        epoch,
                        &gesture,
                        action.fire_at_ms,
                        perf.ms_per_beat(),
                        true,
                    );
                }
            }
        }
    }

    /// Cancel a slot's playback entirely: every armed action for it becomes
    /// stale, every sounding pitch gets a note off. Releasing an idle slot
    /// is a no-op.
    pub fn release_slot(&mut self, slot: u8) {
        let Some(state) = self.active.remove(&slot) else {
            return;
        };
        for pitch in state.sounding {
            self.voice.note_off(pitch);
        }
        trace!(slot, "slot released");
    }

    /// Release every active slot, then a global all-notes-off as a backstop
    /// against any bookkeeping drift downstream.
    pub fn release_all(&mut self) {
        let slots: Vec<u8> = self.active.keys().copied().collect();
        for slot in slots {
            self.release_slot(slot);
        }
        self.voice.all_notes_off();
    }

    pub fn is_slot_active(&self, slot: u8) -> bool {
        self.active.contains_key(&slot)
    }

    pub fn active_slots(&self) -> Vec<u8> {
        let mut slots: Vec<u8> = self.active.keys().copied().collect();
        slots.sort();
        slots
    }

    pub fn active_gesture_count(&self) -> usize {
        self.active.len()
    }

    /// Pitches currently sounding for a slot
    pub fn sounding_pitches(&self, slot: u8) -> Vec<u8> {
        let mut pitches: Vec<u8> = self
            .active
            .get(&slot)
            .map(|s| s.sounding.iter().copied().collect())
            .unwrap_or_default();
        pitches.sort();
        pitches
    }

    /// Completed loop iterations for an active slot (diagnostics)
    pub fn loop_count(&self, slot: u8) -> Option<u64> {
        self.active.get(&slot).map(|s| s.loop_count)
    }

    pub fn is_slot_looping(&self, slot: u8) -> bool {
        self.active.get(&slot).is_some_and(|s| s.is_looping)
    }

    /// Earliest pending fire time, if any. Stale actions count; this is a
    /// lower bound for the next useful tick.
    pub fn next_fire_ms(&self) -> Option<f64> {
        self.schedule.peek().map(|a| a.fire_at_ms)
    }
}
