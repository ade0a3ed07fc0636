//! Audible feedback for a classification result.
//!
//! The core only decides *what* to play; the shell owns the device. A tone is
//! a single beep whose pitch rises with the green share, a chord is a major
//! triad whose root rises with it.

use serde::{Deserialize, Serialize};

pub const TONE_MIN_HZ: u32 = 500;
pub const TONE_MAX_HZ: u32 = 2500;
/// Range accepted by common platform beep APIs.
pub const TONE_VALID_HZ: (u32, u32) = (37, 32_767);

pub const CHORD_ROOT_LOW: u8 = 60;
pub const CHORD_ROOT_HIGH: u8 = 108;
pub const CHORD_ROOT_CLAMP: (u8, u8) = (36, 96);
pub const MAJOR_THIRD: u8 = 4;
pub const PERFECT_FIFTH: u8 = 7;

pub const CUE_DURATION_MS: u32 = 1000;
pub const CHORD_VELOCITY: u8 = 100;
pub const CHORD_STAGGER_MS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioBackend {
    #[default]
    Tone,
    Midi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneCue {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordCue {
    /// Root, major third, perfect fifth.
    pub notes: [u8; 3],
    pub velocity: u8,
    pub duration_ms: u32,
    /// Delay between consecutive note-ons, and between consecutive note-offs.
    pub stagger_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiEvent {
    pub at_ms: u32,
    pub message: MidiMessage,
}

impl ChordCue {
    pub fn major(root: u8) -> Self {
        Self {
            notes: [
                root,
                root.saturating_add(MAJOR_THIRD).min(127),
                root.saturating_add(PERFECT_FIFTH).min(127),
            ],
            velocity: CHORD_VELOCITY,
            duration_ms: CUE_DURATION_MS,
            stagger_ms: CHORD_STAGGER_MS,
        }
    }

    pub fn root(&self) -> u8 {
        self.notes[0]
    }

    /// Timed messages for a MIDI port, ordered by time.
    ///
    /// Notes start `stagger_ms` apart, are held for `duration_ms`, and are
    /// released with the same stagger.
    pub fn schedule(&self) -> Vec<MidiEvent> {
        let ons = self.notes.iter().enumerate().map(|(i, &note)| MidiEvent {
            at_ms: self.stagger_ms * i as u32,
            message: MidiMessage::NoteOn {
                note,
                velocity: self.velocity,
            },
        });
        let release = self.stagger_ms * (self.notes.len() as u32 - 1) + self.duration_ms;
        let offs = self.notes.iter().enumerate().map(move |(i, &note)| MidiEvent {
            at_ms: release + self.stagger_ms * i as u32,
            message: MidiMessage::NoteOff { note },
        });
        ons.chain(offs).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCue {
    Tone(ToneCue),
    Chord(ChordCue),
}

impl AudioCue {
    /// No cue for an empty result.
    pub fn for_percentage(percentage: f64, backend: AudioBackend) -> Option<Self> {
        if percentage.is_nan() || percentage <= 0.0 {
            return None;
        }
        let share = percentage.min(100.0) / 100.0;

        Some(match backend {
            AudioBackend::Tone => AudioCue::Tone(ToneCue {
                frequency_hz: tone_frequency(share),
                duration_ms: CUE_DURATION_MS,
            }),
            AudioBackend::Midi => AudioCue::Chord(ChordCue::major(chord_root(share))),
        })
    }

    pub fn duration_ms(&self) -> u32 {
        match self {
            AudioCue::Tone(tone) => tone.duration_ms,
            AudioCue::Chord(chord) => chord.duration_ms,
        }
    }
}

fn tone_frequency(share: f64) -> u32 {
    let span = f64::from(TONE_MAX_HZ - TONE_MIN_HZ);
    let hz = (f64::from(TONE_MIN_HZ) + share * span) as u32;
    hz.clamp(TONE_VALID_HZ.0, TONE_VALID_HZ.1)
}

fn chord_root(share: f64) -> u8 {
    let span = f64::from(CHORD_ROOT_HIGH - CHORD_ROOT_LOW);
    let root = (f64::from(CHORD_ROOT_LOW) + share * span) as u32;
    root.clamp(u32::from(CHORD_ROOT_CLAMP.0), u32::from(CHORD_ROOT_CLAMP.1)) as u8
}
