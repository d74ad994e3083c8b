//! Scalar track parameters that live in the event stream.
//!
//! A parameter's value is whatever the last matching event carries. Writing
//! a parameter rewrites that event in place; with no matching event the write
//! is dropped and nothing is created.

use crate::events::{ChannelMessage, Event, EventKind, EventPatch, MetaMessage, Subtype};

pub const VOLUME_CONTROLLER: u8 = 7;
pub const PAN_CONTROLLER: u8 = 10;

const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

pub trait Parameter {
    type Value;

    fn matches(event: &Event) -> bool;

    fn read(event: &Event) -> Option<Self::Value>;

    /// `None` rejects the value and leaves the track untouched.
    fn write(value: &Self::Value) -> Option<EventPatch>;
}

pub struct TrackName;

impl Parameter for TrackName {
    type Value = String;

    fn matches(event: &Event) -> bool {
        event.subtype() == Subtype::TrackName
    }

    fn read(event: &Event) -> Option<String> {
        match &event.kind {
            EventKind::Meta(MetaMessage::TrackName { text }) => Some(text.clone()),
            _ => None,
        }
    }

    fn write(value: &String) -> Option<EventPatch> {
        Some(EventPatch::new().text(value.clone()))
    }
}

fn controller_value(event: &Event) -> Option<u8> {
    match &event.kind {
        EventKind::Channel {
            message: ChannelMessage::Controller { value, .. },
            ..
        } => Some(*value),
        _ => None,
    }
}

/// Controller #7.
pub struct Volume;

impl Parameter for Volume {
    type Value = u8;

    fn matches(event: &Event) -> bool {
        event.is_controller(VOLUME_CONTROLLER)
    }

    fn read(event: &Event) -> Option<u8> {
        controller_value(event)
    }

    fn write(value: &u8) -> Option<EventPatch> {
        Some(EventPatch::new().value(u16::from(*value)))
    }
}

/// Controller #10.
pub struct Pan;

impl Parameter for Pan {
    type Value = u8;

    fn matches(event: &Event) -> bool {
        event.is_controller(PAN_CONTROLLER)
    }

    fn read(event: &Event) -> Option<u8> {
        controller_value(event)
    }

    fn write(value: &u8) -> Option<EventPatch> {
        Some(EventPatch::new().value(u16::from(*value)))
    }
}

pub struct ProgramNumber;

impl Parameter for ProgramNumber {
    type Value = u8;

    fn matches(event: &Event) -> bool {
        event.subtype() == Subtype::ProgramChange
    }

    fn read(event: &Event) -> Option<u8> {
        match &event.kind {
            EventKind::Channel {
                message: ChannelMessage::ProgramChange { value },
                ..
            } => Some(*value),
            _ => None,
        }
    }

    fn write(value: &u8) -> Option<EventPatch> {
        Some(EventPatch::new().value(u16::from(*value)))
    }
}

/// Beats per minute, stored as microseconds per beat.
pub struct Tempo;

impl Parameter for Tempo {
    type Value = f64;

    fn matches(event: &Event) -> bool {
        event.subtype() == Subtype::SetTempo
    }

    fn read(event: &Event) -> Option<f64> {
        match &event.kind {
            EventKind::Meta(MetaMessage::SetTempo {
                microseconds_per_beat,
            }) if *microseconds_per_beat > 0 => {
                Some(MICROSECONDS_PER_MINUTE / f64::from(*microseconds_per_beat))
            }
            _ => None,
        }
    }

    fn write(bpm: &f64) -> Option<EventPatch> {
        if !bpm.is_finite() || *bpm <= 0.0 {
            tracing::warn!(bpm, "rejected tempo");
            return None;
        }
        let micros = (MICROSECONDS_PER_MINUTE / bpm).round();
        if micros < 1.0 || micros > f64::from(u32::MAX) {
            tracing::warn!(bpm, "tempo out of range");
            return None;
        }
        Some(EventPatch::new().microseconds_per_beat(micros as u32))
    }
}

/// Tick of the last end-of-track event.
pub struct EndOfTrack;

impl Parameter for EndOfTrack {
    type Value = u32;

    fn matches(event: &Event) -> bool {
        event.subtype() == Subtype::EndOfTrack
    }

    fn read(event: &Event) -> Option<u32> {
        Some(event.tick)
    }

    fn write(tick: &u32) -> Option<EventPatch> {
        Some(EventPatch::new().tick(*tick))
    }
}

/// The last event in `events` matching `P`.
pub fn last_match<P: Parameter>(events: &[Event]) -> Option<&Event> {
    events.iter().rev().find(|e| P::matches(e))
}
