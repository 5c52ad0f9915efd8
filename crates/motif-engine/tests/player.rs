//! End-to-end scheduler behavior driven by a manual clock.
//!
//! Every test ticks the player at exact pending fire times, so recorded
//! timestamps can be compared against times derived from the gesture itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use motif_core::{
    GesturePalette, PerformanceContext, Role, ScaleMode, SlotConfig, StyleId,
};
use motif_engine::{
    Clock, GesturePlayer, ManualClock, TriggerOptions, VoiceCommand, VoiceSink,
};

struct RecordingVoice {
    log: Arc<Mutex<Vec<VoiceCommand>>>,
}

impl VoiceSink for RecordingVoice {
    fn note_on(&mut self, pitch: u8, velocity: f32) {
        self.log.lock().unwrap().push(VoiceCommand::NoteOn { pitch, velocity });
    }

    fn note_off(&mut self, pitch: u8) {
        self.log.lock().unwrap().push(VoiceCommand::NoteOff { pitch });
    }

    fn all_notes_off(&mut self) {
        self.log.lock().unwrap().push(VoiceCommand::AllNotesOff);
    }
}

fn recording_player() -> (GesturePlayer, Arc<Mutex<Vec<VoiceCommand>>>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let log = Arc::new(Mutex::new(Vec::new()));
    let player = GesturePlayer::new(Box::new(RecordingVoice { log: log.clone() }));
    (player, log)
}

/// Palette with one slot pinned to a known minimal-style config. Zero rhythm
/// looseness keeps onsets exactly on the cell grid.
fn palette_with_minimal_slot(slot: u8, seed: u64) -> GesturePalette {
    let mut palette = GesturePalette::new(36, 96, 60, ScaleMode::Major, 42).unwrap();
    let mut config = SlotConfig::new(slot, StyleId::Minimal, Role::Lead, seed);
    config.rhythm_loose = 0.0;
    palette.update_slot_config(config).unwrap();
    palette
}

fn drain(log: &Arc<Mutex<Vec<VoiceCommand>>>) -> Vec<VoiceCommand> {
    std::mem::take(&mut *log.lock().unwrap())
}

/// Advance the clock to each pending fire time in turn (up to `end_ms`),
/// tick, and label everything the voice received with that time.
fn run_until(
    player: &mut GesturePlayer,
    perf: &PerformanceContext,
    clock: &ManualClock,
    log: &Arc<Mutex<Vec<VoiceCommand>>>,
    end_ms: f64,
) -> Vec<(f64, VoiceCommand)> {
    let mut out = Vec::new();
    while let Some(t) = player.next_fire_ms() {
        if t > end_ms {
            break;
        }
        clock.set_ms(t);
        player.tick(perf, clock.now_ms());
        for cmd in drain(log) {
            out.push((t, cmd));
        }
    }
    clock.set_ms(end_ms);
    player.tick(perf, end_ms);
    for cmd in drain(log) {
        out.push((end_ms, cmd));
    }
    out
}

fn note_ons(timeline: &[(f64, VoiceCommand)]) -> Vec<(f64, u8, f32)> {
    timeline
        .iter()
        .filter_map(|&(t, cmd)| match cmd {
            VoiceCommand::NoteOn { pitch, velocity } => Some((t, pitch, velocity)),
            _ => None,
        })
        .collect()
}

#[test]
fn one_shot_pass_fires_every_event_at_its_scheduled_time() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();
    let clock = ManualClock::new();
    let perf = palette.performance();
    let ms_per_beat = perf.ms_per_beat();

    let result = player
        .trigger_slot(&palette, 60, 1.0, TriggerOptions { force_one_shot: true }, 0.0)
        .unwrap();
    assert!(!result.is_looping);

    let gesture = palette.get_gesture(60).unwrap();
    let end_ms = gesture.span_beats() * ms_per_beat + 1.0;
    let timeline = run_until(&mut player, &perf, &clock, &log, end_ms);

    let mut expected: Vec<(f64, u8, f32)> = gesture
        .events
        .iter()
        .map(|e| {
            let scale = e.tag.map_or(1.0, |tag| tag.velocity_scale());
            let velocity = (e.velocity * scale).clamp(0.1, 1.0);
            (e.time * ms_per_beat, e.pitch, velocity)
        })
        .collect();
    expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut actual = note_ons(&timeline);
    actual.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    assert_eq!(actual, expected);
}

#[test]
fn every_note_on_gets_a_note_off() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();
    let clock = ManualClock::new();
    let perf = palette.performance();

    player
        .trigger_slot(&palette, 60, 0.9, TriggerOptions { force_one_shot: true }, 0.0)
        .unwrap();
    let gesture = palette.get_gesture(60).unwrap();
    let end_ms = gesture.span_beats() * perf.ms_per_beat() + 1.0;
    let timeline = run_until(&mut player, &perf, &clock, &log, end_ms);

    let mut ons: HashMap<u8, usize> = HashMap::new();
    let mut offs: HashMap<u8, usize> = HashMap::new();
    for (_, cmd) in &timeline {
        match cmd {
            VoiceCommand::NoteOn { pitch, .. } => *ons.entry(*pitch).or_insert(0) += 1,
            VoiceCommand::NoteOff { pitch } => *offs.entry(*pitch).or_insert(0) += 1,
            VoiceCommand::AllNotesOff => {}
        }
    }
    assert_eq!(ons, offs);
    assert!(player.sounding_pitches(60).is_empty());
}

#[test]
fn trigger_velocity_scales_and_floors_the_output() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();
    let clock = ManualClock::new();
    let perf = palette.performance();

    // Zero trigger velocity: every product clamps up to the floor
    player
        .trigger_slot(&palette, 60, 0.0, TriggerOptions { force_one_shot: true }, 0.0)
        .unwrap();
    let gesture = palette.get_gesture(60).unwrap();
    let end_ms = gesture.span_beats() * perf.ms_per_beat() + 1.0;
    let timeline = run_until(&mut player, &perf, &clock, &log, end_ms);

    let ons = note_ons(&timeline);
    assert!(!ons.is_empty());
    for (_, _, velocity) in ons {
        assert_eq!(velocity, 0.1);
    }
}

#[test]
fn retrigger_supersedes_the_previous_schedule() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();
    let clock = ManualClock::new();
    let perf = palette.performance();

    // Two triggers before any event fires; the first trigger's timers must
    // all be invalidated, leaving exactly one pass worth of note ons.
    player
        .trigger_slot(&palette, 60, 1.0, TriggerOptions { force_one_shot: true }, 0.0)
        .unwrap();
    player
        .trigger_slot(&palette, 60, 1.0, TriggerOptions { force_one_shot: true }, 0.0)
        .unwrap();
    assert_eq!(player.active_gesture_count(), 1);

    let gesture = palette.get_gesture(60).unwrap();
    let end_ms = gesture.span_beats() * perf.ms_per_beat() + 1.0;
    let timeline = run_until(&mut player, &perf, &clock, &log, end_ms);
    assert_eq!(note_ons(&timeline).len(), gesture.events.len());
}

#[test]
fn release_slot_silences_sounding_pitches_and_cancels_the_rest() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();
    let clock = ManualClock::new();
    let perf = palette.performance();

    player
        .trigger_slot(&palette, 60, 1.0, TriggerOptions { force_one_shot: true }, 0.0)
        .unwrap();

    // Fire just the first onset, then cut the slot
    let first = player.next_fire_ms().unwrap();
    clock.set_ms(first);
    player.tick(&perf, clock.now_ms());
    let sounding = player.sounding_pitches(60);
    assert!(!sounding.is_empty());
    drain(&log);

    player.release_slot(60);
    let offs = drain(&log);
    assert_eq!(offs.len(), sounding.len());
    for pitch in sounding {
        assert!(offs.contains(&VoiceCommand::NoteOff { pitch }));
    }
    assert!(!player.is_slot_active(60));

    // Nothing left in the schedule may reach the voice
    let timeline = run_until(&mut player, &perf, &clock, &log, first + 60_000.0);
    assert!(timeline.is_empty());
}

#[test]
fn release_all_ends_with_a_global_all_notes_off() {
    let mut palette = palette_with_minimal_slot(60, 7);
    let mut other = SlotConfig::new(61, StyleId::Minimal, Role::Lead, 11);
    other.rhythm_loose = 0.0;
    palette.update_slot_config(other).unwrap();

    let (mut player, log) = recording_player();
    let perf = palette.performance();
    player.trigger_slot(&palette, 60, 1.0, TriggerOptions::default(), 0.0).unwrap();
    player.trigger_slot(&palette, 61, 1.0, TriggerOptions::default(), 0.0).unwrap();
    player.tick(&perf, 0.0);
    drain(&log);

    player.release_all();
    let commands = drain(&log);
    assert_eq!(commands.last(), Some(&VoiceCommand::AllNotesOff));
    assert_eq!(player.active_gesture_count(), 0);
    assert_eq!(player.active_slots(), Vec::<u8>::new());
}

#[test]
fn looping_playback_repeats_with_the_loop_period() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();
    let clock = ManualClock::new();
    let perf = palette.performance();
    let ms_per_beat = perf.ms_per_beat();

    let result = player
        .trigger_slot(&palette, 60, 1.0, TriggerOptions::default(), 0.0)
        .unwrap();
    assert!(result.is_looping);
    assert!(player.is_slot_looping(60));

    let gesture = palette.get_gesture(60).unwrap();
    let loop_ms = gesture.loop_length_beats.unwrap() * ms_per_beat;
    let end_ms = 2.0 * loop_ms - 0.5;
    let timeline = run_until(&mut player, &perf, &clock, &log, end_ms);

    let ons = note_ons(&timeline);
    let first_pass: Vec<_> = ons.iter().filter(|(t, _, _)| *t < loop_ms).collect();
    assert!(!first_pass.is_empty());
    for &&(t, pitch, velocity) in &first_pass {
        if t + loop_ms > end_ms {
            continue;
        }
        assert!(
            ons.iter().any(|&(t2, p2, v2)| {
                (t2 - (t + loop_ms)).abs() < 1e-6 && p2 == pitch && v2 == velocity
            }),
            "missing repeat of pitch {pitch} at {t} + {loop_ms}"
        );
    }
    assert!(player.loop_count(60).unwrap() >= 1);
}

#[test]
fn tempo_change_applies_from_the_next_loop_iteration() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();
    let clock = ManualClock::new();
    let slow = palette.performance(); // 120 bpm, 500 ms per beat
    let fast = PerformanceContext::new(240.0); // 250 ms per beat

    player.trigger_slot(&palette, 60, 1.0, TriggerOptions::default(), 0.0).unwrap();
    let gesture = palette.get_gesture(60).unwrap();
    let loop_ms = gesture.loop_length_beats.unwrap() * slow.ms_per_beat();

    // First pass at the slow tempo, stopping short of the loop restart
    let first = run_until(&mut player, &slow, &clock, &log, loop_ms - 0.5);
    // The restart and everything after run at the fast tempo, anchored at
    // the restart time computed under the old tempo
    let second = run_until(
        &mut player,
        &fast,
        &clock,
        &log,
        loop_ms + gesture.loop_length_beats.unwrap() * fast.ms_per_beat() - 0.5,
    );

    let first_ons = note_ons(&first);
    let second_ons = note_ons(&second);
    assert_eq!(first_ons.len(), second_ons.len());
    for event in &gesture.events {
        let t_new = loop_ms + event.time * fast.ms_per_beat();
        assert!(
            second_ons
                .iter()
                .any(|&(t, p, _)| (t - t_new).abs() < 1e-6 && p == event.pitch),
            "pitch {} not re-armed at the fast tempo",
            event.pitch
        );
    }
}

#[test]
fn trigger_without_a_cached_gesture_reports_none() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();

    // Slot 120 is outside the palette range, so nothing is cached for it
    let result = player.trigger_slot(&palette, 120, 1.0, TriggerOptions::default(), 0.0);
    assert!(result.is_none());
    assert!(!player.is_slot_active(120));
    assert!(drain(&log).is_empty());
}

#[test]
fn identical_seeds_produce_identical_playback() {
    let run = || {
        let palette = palette_with_minimal_slot(60, 7);
        let (mut player, log) = recording_player();
        let clock = ManualClock::new();
        let perf = palette.performance();
        player.trigger_slot(&palette, 60, 0.8, TriggerOptions::default(), 0.0).unwrap();
        run_until(&mut player, &perf, &clock, &log, 5_000.0)
    };
    assert_eq!(run(), run());
}

#[test]
fn sounding_pitches_stay_within_the_gesture() {
    let palette = palette_with_minimal_slot(60, 7);
    let (mut player, log) = recording_player();
    let clock = ManualClock::new();
    let perf = palette.performance();

    player.trigger_slot(&palette, 60, 1.0, TriggerOptions::default(), 0.0).unwrap();
    let gesture = palette.get_gesture(60).unwrap();
    let pitches: Vec<u8> = gesture.events.iter().map(|e| e.pitch).collect();

    for _ in 0..12 {
        let Some(t) = player.next_fire_ms() else { break };
        clock.set_ms(t);
        player.tick(&perf, clock.now_ms());
        for pitch in player.sounding_pitches(60) {
            assert!(pitches.contains(&pitch));
        }
    }
    drain(&log);
}
