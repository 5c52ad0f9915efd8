//! Harmonic context: scale and diatonic chord derivation

use serde::{Deserialize, Serialize};

/// Scale/mode types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleMode {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
    Pentatonic,
    Blues,
    Chromatic,
}

impl ScaleMode {
    /// Scale intervals (semitones from root)
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Self::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Self::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Self::Pentatonic => &[0, 2, 4, 7, 9],
            Self::Blues => &[0, 3, 5, 6, 7, 10],
            Self::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Dorian => "Dorian",
            Self::Phrygian => "Phrygian",
            Self::Lydian => "Lydian",
            Self::Mixolydian => "Mixolydian",
            Self::Locrian => "Locrian",
            Self::HarmonicMinor => "Harmonic Minor",
            Self::MelodicMinor => "Melodic Minor",
            Self::Pentatonic => "Pentatonic",
            Self::Blues => "Blues",
            Self::Chromatic => "Chromatic",
        }
    }
}

/// Chord quality for diatonic chords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
}

impl ChordQuality {
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 4, 7],
            Self::Minor => &[0, 3, 7],
            Self::Diminished => &[0, 3, 6],
            Self::Augmented => &[0, 4, 8],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Diminished => "Dim",
            Self::Augmented => "Aug",
        }
    }
}

/// A chord built on a scale degree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiatonicChord {
    pub root_pitch: u8,
    pub quality: ChordQuality,
    pub pitches: Vec<u8>,
}

/// Pitch material for the current root and scale.
///
/// Recomputed wholesale whenever root or scale changes; generators only read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonicContext {
    pub root: u8,
    pub mode: ScaleMode,
    /// Every pitch 0..=127 whose pitch class belongs to the scale, sorted
    pub scale_notes: Vec<u8>,
    /// Triads stacked on successive scale degrees around the root octave
    pub chords: Vec<DiatonicChord>,
}

impl HarmonicContext {
    pub fn new(root: u8, mode: ScaleMode) -> Self {
        let root = root.min(127);
        let root_pc = root % 12;
        let intervals = mode.intervals();

        let scale_notes: Vec<u8> = (0..=127u8)
            .filter(|p| intervals.contains(&((p + 12 - root_pc) % 12)))
            .collect();

        let chords = Self::build_diatonic_chords(root, intervals);

        Self { root, mode, scale_notes, chords }
    }

    /// Stack thirds (every other scale degree) on each degree of the scale
    fn build_diatonic_chords(root: u8, intervals: &[u8]) -> Vec<DiatonicChord> {
        let n = intervals.len();
        let mut chords = Vec::with_capacity(n);

        for degree in 0..n {
            let offset_at = |step: usize| -> i16 {
                let idx = (degree + step) % n;
                let wraps = ((degree + step) / n) as i16;
                intervals[idx] as i16 + 12 * wraps
            };

            let root_offset = offset_at(0);
            let third = offset_at(2) - root_offset;
            let fifth = offset_at(4) - root_offset;

            let quality = match (third, fifth) {
                (4, 7) => ChordQuality::Major,
                (3, 7) => ChordQuality::Minor,
                (3, 6) => ChordQuality::Diminished,
                (4, 8) => ChordQuality::Augmented,
                (t, _) if t >= 4 => ChordQuality::Major,
                _ => ChordQuality::Minor,
            };

            let root_pitch = (root as i16 + root_offset).clamp(0, 127) as u8;
            let pitches = quality
                .intervals()
                .iter()
                .map(|&iv| (root_pitch as i16 + iv as i16).clamp(0, 127) as u8)
                .collect();

            chords.push(DiatonicChord { root_pitch, quality, pitches });
        }

        chords
    }

    /// Chord on the first scale degree
    pub fn tonic_triad(&self) -> Option<&DiatonicChord> {
        self.chords.first()
    }

    /// Snap a pitch to the nearest pitch class in the scale, preserving octave
    /// as closely as possible. Equidistant candidates resolve to the lower one.
    pub fn quantize(&self, pitch: u8) -> u8 {
        let intervals = self.mode.intervals();
        let root_pc = self.root % 12;
        let relative = (pitch % 12 + 12 - root_pc) % 12;

        let mut nearest = 0u8;
        let mut min_dist = 12u8;
        for &iv in intervals {
            let direct = iv.abs_diff(relative);
            let dist = direct.min(12 - direct);
            if dist < min_dist {
                min_dist = dist;
                nearest = iv;
            }
        }

        // Realize the chosen pitch class in whichever octave lands closest to
        // the input while staying inside MIDI range. The in-octave realization
        // can be nearly an octave off (or past 127) when the class wrapped.
        let quantized_pc = (root_pc + nearest) as i16 % 12;
        let target = pitch as i16;
        let base = (pitch / 12) as i16 * 12 + quantized_pc;
        let mut best: Option<i16> = None;
        for candidate in [base - 12, base, base + 12] {
            if !(0..=127).contains(&candidate) {
                continue;
            }
            match best {
                Some(b) if (candidate - target).abs() >= (b - target).abs() => {}
                _ => best = Some(candidate),
            }
        }
        best.unwrap_or(0) as u8
    }

    /// Scale notes within a symmetric window of `octave_span` octaves around
    /// `center`. Narrow spans or sparse scales may yield few or zero pitches;
    /// callers must handle the empty case.
    pub fn pitches_in_window(&self, center: u8, octave_span: f64) -> Vec<u8> {
        let half = (octave_span * 6.0).round() as i16;
        let lo = (center as i16 - half).max(0);
        let hi = (center as i16 + half).min(127);
        self.scale_notes
            .iter()
            .copied()
            .filter(|&p| (p as i16) >= lo && (p as i16) <= hi)
            .collect()
    }
}
