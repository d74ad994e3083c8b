use serde::{Deserialize, Serialize};

/// Identity of an event within its track. Only the track's allocator hands
/// these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Channel,
    Meta,
    Sysex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subtype {
    NoteOn,
    NoteOff,
    NoteAftertouch,
    Controller,
    ProgramChange,
    ChannelAftertouch,
    PitchBend,
    SequenceNumber,
    Text,
    CopyrightNotice,
    TrackName,
    InstrumentName,
    Lyrics,
    Marker,
    CuePoint,
    ChannelPrefix,
    PortPrefix,
    EndOfTrack,
    SetTempo,
    TimeSignature,
    KeySignature,
    SequencerSpecific,
    Sysex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMessage {
    NoteOn {
        note_number: u8,
        velocity: u8,
        duration: Option<u32>,
    },
    NoteOff { note_number: u8, velocity: u8 },
    NoteAftertouch { note_number: u8, amount: u8 },
    Controller { controller_type: u8, value: u8 },
    ProgramChange { value: u8 },
    ChannelAftertouch { amount: u8 },
    /// 14-bit, centered on 8192
    PitchBend { value: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaMessage {
    SequenceNumber { number: u16 },
    Text { text: String },
    CopyrightNotice { text: String },
    TrackName { text: String },
    InstrumentName { text: String },
    Lyrics { text: String },
    Marker { text: String },
    CuePoint { text: String },
    ChannelPrefix { channel: u8 },
    PortPrefix { port: u8 },
    EndOfTrack,
    SetTempo { microseconds_per_beat: u32 },
    TimeSignature {
        numerator: u8,
        denominator: u8,
        metronome: u8,
        thirtyseconds: u8,
    },
    KeySignature { key: i8, scale: u8 },
    SequencerSpecific { data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Channel { channel: u8, message: ChannelMessage },
    Meta(MetaMessage),
    Sysex { data: Vec<u8> },
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Channel { .. } => EventType::Channel,
            EventKind::Meta(_) => EventType::Meta,
            EventKind::Sysex { .. } => EventType::Sysex,
        }
    }

    pub fn subtype(&self) -> Subtype {
        match self {
            EventKind::Channel { message, .. } => match message {
                ChannelMessage::NoteOn { .. } => Subtype::NoteOn,
                ChannelMessage::NoteOff { .. } => Subtype::NoteOff,
                ChannelMessage::NoteAftertouch { .. } => Subtype::NoteAftertouch,
                ChannelMessage::Controller { .. } => Subtype::Controller,
                ChannelMessage::ProgramChange { .. } => Subtype::ProgramChange,
                ChannelMessage::ChannelAftertouch { .. } => Subtype::ChannelAftertouch,
                ChannelMessage::PitchBend { .. } => Subtype::PitchBend,
            },
            EventKind::Meta(meta) => match meta {
                MetaMessage::SequenceNumber { .. } => Subtype::SequenceNumber,
                MetaMessage::Text { .. } => Subtype::Text,
                MetaMessage::CopyrightNotice { .. } => Subtype::CopyrightNotice,
                MetaMessage::TrackName { .. } => Subtype::TrackName,
                MetaMessage::InstrumentName { .. } => Subtype::InstrumentName,
                MetaMessage::Lyrics { .. } => Subtype::Lyrics,
                MetaMessage::Marker { .. } => Subtype::Marker,
                MetaMessage::CuePoint { .. } => Subtype::CuePoint,
                MetaMessage::ChannelPrefix { .. } => Subtype::ChannelPrefix,
                MetaMessage::PortPrefix { .. } => Subtype::PortPrefix,
                MetaMessage::EndOfTrack => Subtype::EndOfTrack,
                MetaMessage::SetTempo { .. } => Subtype::SetTempo,
                MetaMessage::TimeSignature { .. } => Subtype::TimeSignature,
                MetaMessage::KeySignature { .. } => Subtype::KeySignature,
                MetaMessage::SequencerSpecific { .. } => Subtype::SequencerSpecific,
            },
            EventKind::Sysex { .. } => Subtype::Sysex,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        match self {
            EventKind::Channel { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    pub fn note_on(channel: u8, note_number: u8, velocity: u8, duration: u32) -> Self {
        EventKind::Channel {
            channel,
            message: ChannelMessage::NoteOn {
                note_number,
                velocity,
                duration: Some(duration),
            },
        }
    }

    pub fn controller(channel: u8, controller_type: u8, value: u8) -> Self {
        EventKind::Channel {
            channel,
            message: ChannelMessage::Controller {
                controller_type,
                value,
            },
        }
    }

    pub fn program_change(channel: u8, value: u8) -> Self {
        EventKind::Channel {
            channel,
            message: ChannelMessage::ProgramChange { value },
        }
    }

    pub fn track_name(text: impl Into<String>) -> Self {
        EventKind::Meta(MetaMessage::TrackName { text: text.into() })
    }

    pub fn set_tempo(microseconds_per_beat: u32) -> Self {
        EventKind::Meta(MetaMessage::SetTempo {
            microseconds_per_beat,
        })
    }

    pub fn end_of_track() -> Self {
        EventKind::Meta(MetaMessage::EndOfTrack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    pub tick: u32,
    pub kind: EventKind,
}

impl Event {
    pub(crate) fn new(id: EventId, tick: u32, kind: EventKind) -> Self {
        Self { id, tick, kind }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    pub fn subtype(&self) -> Subtype {
        self.kind.subtype()
    }

    pub fn channel(&self) -> Option<u8> {
        self.kind.channel()
    }

    pub fn duration(&self) -> u32 {
        match &self.kind {
            EventKind::Channel {
                message: ChannelMessage::NoteOn { duration, .. },
                ..
            } => duration.unwrap_or(0),
            _ => 0,
        }
    }

    /// Last tick covered by this event's span.
    pub fn end_tick(&self) -> u32 {
        self.tick.saturating_add(self.duration())
    }

    pub fn is_controller(&self, controller_type: u8) -> bool {
        matches!(
            &self.kind,
            EventKind::Channel {
                message: ChannelMessage::Controller { controller_type: ct, .. },
                ..
            } if *ct == controller_type
        )
    }
}

/// An event as submitted for insertion. The id is assigned by the store.
///
/// When `tick` is absent the event is placed `delta_time` ticks after the
/// previously inserted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub tick: Option<u32>,
    pub delta_time: Option<u32>,
    pub kind: EventKind,
}

impl NewEvent {
    pub fn at(tick: u32, kind: EventKind) -> Self {
        Self {
            tick: Some(tick),
            delta_time: None,
            kind,
        }
    }

    pub fn after(delta_time: u32, kind: EventKind) -> Self {
        Self {
            tick: None,
            delta_time: Some(delta_time),
            kind,
        }
    }
}

const DATA_MAX: u16 = 127;
const PITCH_BEND_MAX: u16 = 16383;

/// Partial fields merged onto an existing event.
///
/// `kind` replaces the whole payload first, then the individual fields are
/// applied. Fields the event's variant doesn't carry are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    pub kind: Option<EventKind>,
    pub tick: Option<u32>,
    pub channel: Option<u8>,
    pub note_number: Option<u8>,
    pub velocity: Option<u8>,
    pub duration: Option<u32>,
    pub controller_type: Option<u8>,
    pub value: Option<u16>,
    pub text: Option<String>,
    pub microseconds_per_beat: Option<u32>,
}

impl EventPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn tick(mut self, tick: u32) -> Self {
        self.tick = Some(tick);
        self
    }

    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn note_number(mut self, note_number: u8) -> Self {
        self.note_number = Some(note_number);
        self
    }

    pub fn velocity(mut self, velocity: u8) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn controller_type(mut self, controller_type: u8) -> Self {
        self.controller_type = Some(controller_type);
        self
    }

    pub fn value(mut self, value: u16) -> Self {
        self.value = Some(value);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn microseconds_per_beat(mut self, microseconds_per_beat: u32) -> Self {
        self.microseconds_per_beat = Some(microseconds_per_beat);
        self
    }

    /// Returns `event` with this patch merged on top. The id never changes.
    pub fn apply(&self, event: &Event) -> Event {
        let mut merged = event.clone();
        if let Some(kind) = &self.kind {
            merged.kind = kind.clone();
        }
        if let Some(tick) = self.tick {
            merged.tick = tick;
        }

        match &mut merged.kind {
            EventKind::Channel { channel, message } => {
                if let Some(c) = self.channel {
                    *channel = c;
                }
                self.apply_channel_message(message);
            }
            EventKind::Meta(meta) => self.apply_meta(meta),
            EventKind::Sysex { .. } => {}
        }
        merged
    }

    fn apply_channel_message(&self, message: &mut ChannelMessage) {
        let data = self.value.map(|v| v.min(DATA_MAX) as u8);
        match message {
            ChannelMessage::NoteOn {
                note_number,
                velocity,
                duration,
            } => {
                if let Some(n) = self.note_number {
                    *note_number = n;
                }
                if let Some(v) = self.velocity {
                    *velocity = v;
                }
                if let Some(d) = self.duration {
                    *duration = Some(d);
                }
            }
            ChannelMessage::NoteOff {
                note_number,
                velocity,
            } => {
                if let Some(n) = self.note_number {
                    *note_number = n;
                }
                if let Some(v) = self.velocity {
                    *velocity = v;
                }
            }
            ChannelMessage::NoteAftertouch { note_number, .. } => {
                if let Some(n) = self.note_number {
                    *note_number = n;
                }
            }
            ChannelMessage::Controller {
                controller_type,
                value,
            } => {
                if let Some(ct) = self.controller_type {
                    *controller_type = ct;
                }
                if let Some(v) = data {
                    *value = v;
                }
            }
            ChannelMessage::ProgramChange { value } => {
                if let Some(v) = data {
                    *value = v;
                }
            }
            ChannelMessage::ChannelAftertouch { .. } => {}
            ChannelMessage::PitchBend { value } => {
                if let Some(v) = self.value {
                    *value = v.min(PITCH_BEND_MAX);
                }
            }
        }
    }

    fn apply_meta(&self, meta: &mut MetaMessage) {
        match meta {
            MetaMessage::Text { text }
            | MetaMessage::CopyrightNotice { text }
            | MetaMessage::TrackName { text }
            | MetaMessage::InstrumentName { text }
            | MetaMessage::Lyrics { text }
            | MetaMessage::Marker { text }
            | MetaMessage::CuePoint { text } => {
                if let Some(t) = &self.text {
                    *text = t.clone();
                }
            }
            MetaMessage::SetTempo {
                microseconds_per_beat,
            } => {
                if let Some(m) = self.microseconds_per_beat {
                    *microseconds_per_beat = m;
                }
            }
            _ => {}
        }
    }
}

impl From<NewEvent> for EventPatch {
    /// Full replacement of tick and payload, as used by merge-or-insert.
    fn from(event: NewEvent) -> Self {
        Self {
            kind: Some(event.kind),
            tick: event.tick,
            ..Self::default()
        }
    }
}
