mod params;
mod store;
mod transaction;

use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam::channel::{Receiver, Sender};

use crate::events::{Event, EventId, EventKind, EventPatch, NewEvent, Subtype};
use crate::instrument::InstrumentNames;
use crate::settings::TrackSettings;

pub use params::{
    EndOfTrack, PAN_CONTROLLER, Pan, Parameter, ProgramNumber, Tempo, TrackName,
    VOLUME_CONTROLLER, Volume,
};
pub use store::{EventStore, IdAllocator};
pub use transaction::Transaction;

/// Sent to subscribers once per completed mutation that changed the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackChange {
    pub version: u64,
}

/// One track of a song: a tick-ordered event list plus the parameters
/// derived from it.
#[derive(Debug)]
pub struct Track {
    store: EventStore,
    channel: Option<u8>,
    settings: TrackSettings,
    end_of_track: Option<u32>,
    version: u64,
    subscribers: Vec<Sender<TrackChange>>,
    snapshot: Arc<ArcSwap<Vec<Event>>>,
}

impl Track {
    /// A track without a channel is a conductor track.
    pub fn new(channel: Option<u8>) -> Self {
        Self::with_settings(channel, TrackSettings::default())
    }

    pub fn with_settings(channel: Option<u8>, settings: TrackSettings) -> Self {
        Self {
            store: EventStore::new(),
            channel,
            settings,
            end_of_track: None,
            version: 0,
            subscribers: Vec::new(),
            snapshot: Arc::new(ArcSwap::from_pointee(Vec::new())),
        }
    }

    pub fn events(&self) -> &[Event] {
        self.store.events()
    }

    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.store.lookup(id)
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    pub fn next_event_id(&self) -> EventId {
        self.store.next_id()
    }

    /// Bumped once per completed mutation that changed something.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn subscribe(&mut self) -> Receiver<TrackChange> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Sorted copy of the events, republished after every change. Safe to
    /// read from other threads while the track keeps mutating.
    pub fn snapshot_handle(&self) -> Arc<ArcSwap<Vec<Event>>> {
        Arc::clone(&self.snapshot)
    }

    pub fn transaction(&mut self) -> Transaction<'_> {
        Transaction::new(self)
    }

    pub fn insert_event(&mut self, event: NewEvent) -> Event {
        let inserted = self.transaction().insert(event);
        self.stored(inserted)
    }

    pub fn insert_events(&mut self, events: impl IntoIterator<Item = NewEvent>) -> Vec<Event> {
        let inserted = self.transaction().insert_many(events);
        inserted.into_iter().map(|e| self.stored(e)).collect()
    }

    pub fn update_event(&mut self, id: EventId, patch: &EventPatch) -> Option<Event> {
        let updated = self.transaction().update(id, patch);
        updated.map(|e| self.stored(e))
    }

    pub fn update_events<'p>(&mut self, updates: impl IntoIterator<Item = (EventId, &'p EventPatch)>) {
        self.transaction().update_many(updates);
    }

    pub fn remove_event(&mut self, id: EventId) {
        self.transaction().remove(id);
    }

    pub fn remove_events(&mut self, ids: &[EventId]) {
        self.transaction().remove_many(ids);
    }

    pub fn clear(&mut self) {
        let ids: Vec<EventId> = self.events().iter().map(Event::id).collect();
        self.remove_events(&ids);
    }

    /// Merge-or-insert keyed by `(type, subtype, tick)`. Every existing event
    /// with that key takes the new payload and keeps its id; the first of
    /// them is returned.
    pub fn create_or_update(&mut self, tick: u32, kind: EventKind) -> Event {
        let (event_type, subtype) = (kind.event_type(), kind.subtype());
        let matched: Vec<Event> = self
            .events()
            .iter()
            .filter(|e| e.tick == tick && e.event_type() == event_type && e.subtype() == subtype)
            .cloned()
            .collect();
        let Some(first) = matched.first().cloned() else {
            return self.insert_event(NewEvent::at(tick, kind));
        };

        let patch = EventPatch::new().kind(kind).tick(tick);
        self.update_events(matched.iter().map(|e| (e.id(), &patch)));
        self.stored(first)
    }

    pub fn change_channel(&mut self, channel: u8) {
        self.transaction().set_channel(channel);
    }

    pub fn is_conductor_track(&self) -> bool {
        self.channel.is_none()
    }

    pub fn is_rhythm_track(&self) -> bool {
        self.channel == Some(self.settings.rhythm_channel)
    }

    pub fn param<P: Parameter>(&self) -> Option<P::Value> {
        params::last_match::<P>(self.events()).and_then(P::read)
    }

    /// Rewrites the last event matching `P`. Without one, nothing happens.
    pub fn set_param<P: Parameter>(&mut self, value: P::Value) {
        let Some(id) = params::last_match::<P>(self.events()).map(Event::id) else {
            tracing::debug!(param = std::any::type_name::<P>(), "no event to carry parameter");
            return;
        };
        if let Some(patch) = P::write(&value) {
            self.update_event(id, &patch);
        }
    }

    pub fn name(&self) -> Option<String> {
        self.param::<TrackName>()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set_param::<TrackName>(name.into());
    }

    pub fn display_name(&self) -> String {
        match self.name() {
            Some(name) if !name.is_empty() => name,
            _ => match self.channel {
                Some(channel) => format!("{} {}", self.settings.untitled_prefix, channel),
                None => self.settings.conductor_name.clone(),
            },
        }
    }

    pub fn volume(&self) -> Option<u8> {
        self.param::<Volume>()
    }

    pub fn set_volume(&mut self, value: u8) {
        self.set_param::<Volume>(value);
    }

    pub fn pan(&self) -> Option<u8> {
        self.param::<Pan>()
    }

    pub fn set_pan(&mut self, value: u8) {
        self.set_param::<Pan>(value);
    }

    pub fn program_number(&self) -> Option<u8> {
        self.param::<ProgramNumber>()
    }

    pub fn set_program_number(&mut self, value: u8) {
        self.set_param::<ProgramNumber>(value);
    }

    /// Beats per minute of the last tempo event.
    pub fn tempo(&self) -> Option<f64> {
        self.param::<Tempo>()
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.set_param::<Tempo>(bpm);
    }

    /// Furthest tick covered by any event, `None` for an empty track.
    pub fn end_of_track(&self) -> Option<u32> {
        self.end_of_track
    }

    pub fn instrument_name(&self, names: &dyn InstrumentNames) -> Option<String> {
        if self.is_rhythm_track() {
            return Some(self.settings.rhythm_instrument_name.clone());
        }
        self.program_number().map(|program| names.instrument_name(program))
    }

    pub fn events_matching(&self, predicate: impl Fn(&Event) -> bool) -> Vec<&Event> {
        self.events().iter().filter(|e| predicate(e)).collect()
    }

    pub fn note_events(&self) -> Vec<&Event> {
        self.events_matching(|e| e.subtype() == Subtype::NoteOn)
    }

    pub fn controller_events(&self, controller_type: u8) -> Vec<&Event> {
        self.events_matching(|e| e.is_controller(controller_type))
    }

    pub fn tempo_events(&self) -> Vec<&Event> {
        self.events_matching(Tempo::matches)
    }

    pub fn program_change_events(&self) -> Vec<&Event> {
        self.events_matching(ProgramNumber::matches)
    }

    /// Recomputes the end-of-track extent and moves the end-of-track event
    /// (if any) onto it.
    pub fn update_end_of_track(&mut self) {
        self.settle();
    }

    /// The stored version of `event`, which closing a transaction may have
    /// moved (the end-of-track marker).
    fn stored(&self, event: Event) -> Event {
        self.event(event.id()).cloned().unwrap_or(event)
    }

    fn settle(&mut self) {
        self.end_of_track = self.store.extent();
        if let Some(end) = self.end_of_track {
            let marker = params::last_match::<EndOfTrack>(self.store.events()).map(Event::id);
            if let (Some(id), Some(patch)) = (marker, EndOfTrack::write(&end)) {
                self.store.update(id, &patch, self.channel);
            }
        }
        self.store.sort_by_tick();

        if self.store.take_dirty() {
            self.publish();
        }
    }

    fn publish(&mut self) {
        self.version += 1;
        self.snapshot.store(Arc::new(self.store.events().to_vec()));

        let change = TrackChange {
            version: self.version,
        };
        self.subscribers.retain(|s| s.send(change).is_ok());
        tracing::debug!(
            version = self.version,
            events = self.store.events().len(),
            "track changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelMessage, MetaMessage};

    fn note(tick: u32, duration: u32) -> NewEvent {
        NewEvent::at(tick, EventKind::note_on(0, 60, 100, duration))
    }

    fn ticks(track: &Track) -> Vec<u32> {
        track.events().iter().map(|e| e.tick).collect()
    }

    #[test]
    fn single_insert_sorts_and_notifies_once() {
        crate::init_tracing();
        let mut track = Track::new(Some(0));
        let rx = track.subscribe();

        track.insert_event(note(30, 0));
        track.insert_event(note(10, 0));
        assert_eq!(ticks(&track), vec![10, 30]);
        assert_eq!(rx.try_iter().count(), 2);
        assert_eq!(track.version(), 2);
    }

    #[test]
    fn transaction_coalesces_notifications() {
        let mut track = Track::new(Some(0));
        let rx = track.subscribe();

        let mut tx = track.transaction();
        let a = tx.insert(note(50, 0));
        tx.insert(note(10, 0));
        tx.update(a.id(), &EventPatch::new().tick(5));
        assert_eq!(tx.events().iter().map(|e| e.tick).collect::<Vec<_>>(), vec![5, 10]);
        tx.commit();

        assert_eq!(rx.try_recv(), Ok(TrackChange { version: 1 }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clean_transaction_stays_silent() {
        let mut track = Track::new(Some(0));
        let e = track.insert_event(NewEvent::at(0, EventKind::controller(0, 7, 100)));
        let rx = track.subscribe();

        let patch = EventPatch::new().value(100);
        track.update_events([(e.id(), &patch), (e.id(), &patch)]);
        track.remove_event(EventId::new(77));
        assert!(rx.try_recv().is_err());
        assert_eq!(track.version(), 1);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut track = Track::new(Some(0));
        let rx = track.subscribe();
        drop(rx);
        track.insert_event(note(0, 0));
        assert!(track.subscribers.is_empty());
    }

    #[test]
    fn snapshot_follows_commits() {
        let mut track = Track::new(Some(0));
        let handle = track.snapshot_handle();
        track.insert_events([note(20, 0), note(5, 0)]);

        let snapshot = handle.load();
        let snapshot_ticks: Vec<u32> = snapshot.iter().map(|e| e.tick).collect();
        assert_eq!(snapshot_ticks, vec![5, 20]);
    }

    #[test]
    fn end_of_track_event_tracks_extent() {
        let mut track = Track::new(Some(0));
        let marker = track.insert_event(NewEvent::at(0, EventKind::end_of_track()));
        track.insert_event(note(10, 6));

        assert_eq!(track.end_of_track(), Some(16));
        assert_eq!(track.param::<EndOfTrack>(), Some(16));
        assert_eq!(track.events().last().map(Event::id), Some(marker.id()));
    }

    #[test]
    fn returned_events_match_what_is_stored() {
        let mut track = Track::new(Some(0));
        track.insert_event(note(10, 6));
        let marker = track.insert_event(NewEvent::at(0, EventKind::end_of_track()));
        assert_eq!(marker.tick, 16);
        assert_eq!(Some(&marker), track.event(marker.id()));

        let moved = track
            .update_event(marker.id(), &EventPatch::new().tick(2))
            .unwrap();
        assert_eq!(moved.tick, 16);
        assert_eq!(Some(&moved), track.event(moved.id()));

        let merged = track.create_or_update(16, EventKind::end_of_track());
        assert_eq!(merged.id(), marker.id());
        assert_eq!(Some(&merged), track.event(merged.id()));

        for e in track.insert_events([note(20, 1), NewEvent::after(0, EventKind::end_of_track())]) {
            assert_eq!(Some(&e), track.event(e.id()));
        }
    }

    #[test]
    fn delta_insert_follows_moved_end_of_track() {
        let mut track = Track::new(Some(0));
        track.insert_event(note(10, 6));
        track.insert_event(NewEvent::at(0, EventKind::end_of_track()));
        let next = track.insert_event(NewEvent::after(5, EventKind::track_name("x")));
        assert_eq!(next.tick, 21);
    }

    #[test]
    fn end_of_track_absent_iff_empty() {
        let mut track = Track::new(Some(0));
        assert_eq!(track.end_of_track(), None);
        let e = track.insert_event(note(3, 1));
        assert_eq!(track.end_of_track(), Some(4));
        track.remove_event(e.id());
        assert_eq!(track.end_of_track(), None);
    }

    #[test]
    fn tempo_reads_last_event() {
        let mut track = Track::new(None);
        assert_eq!(track.tempo(), None);

        track.insert_events([
            NewEvent::at(0, EventKind::set_tempo(500_000)),
            NewEvent::at(100, EventKind::set_tempo(400_000)),
        ]);
        assert_eq!(track.tempo(), Some(150.0));

        track.set_tempo(100.0);
        assert_eq!(track.tempo_events()[0].kind, EventKind::set_tempo(500_000));
        assert_eq!(track.tempo_events()[1].kind, EventKind::set_tempo(600_000));
    }

    #[test]
    fn rejected_tempo_leaves_track_alone() {
        let mut track = Track::new(None);
        track.insert_event(NewEvent::at(0, EventKind::set_tempo(500_000)));
        let version = track.version();
        track.set_tempo(f64::INFINITY);
        assert_eq!(track.version(), version);
        assert_eq!(track.tempo(), Some(120.0));
    }

    #[test]
    fn name_and_display_name() {
        let mut track = Track::new(Some(3));
        assert_eq!(track.display_name(), "Track 3");

        track.insert_event(NewEvent::at(0, EventKind::track_name("")));
        assert_eq!(track.display_name(), "Track 3");

        track.set_name("Bass");
        assert_eq!(track.name().as_deref(), Some("Bass"));
        assert_eq!(track.display_name(), "Bass");

        assert_eq!(Track::new(None).display_name(), "Conductor");
    }

    #[test]
    fn instrument_name_uses_lookup_unless_rhythm() {
        let names = |program: u8| format!("Program {program}");
        let mut track = Track::new(Some(0));
        assert_eq!(track.instrument_name(&names), None);

        track.insert_event(NewEvent::at(0, EventKind::program_change(0, 33)));
        assert_eq!(track.instrument_name(&names).as_deref(), Some("Program 33"));

        track.change_channel(9);
        assert!(track.is_rhythm_track());
        assert_eq!(
            track.instrument_name(&names).as_deref(),
            Some("Standard Drum Kit")
        );
    }

    #[test]
    fn pan_and_program_views() {
        let mut track = Track::new(Some(1));
        track.insert_events([
            NewEvent::at(0, EventKind::controller(1, PAN_CONTROLLER, 64)),
            NewEvent::at(0, EventKind::controller(1, VOLUME_CONTROLLER, 100)),
            NewEvent::at(0, EventKind::program_change(1, 0)),
        ]);
        track.set_pan(20);
        track.set_program_number(5);
        assert_eq!(track.pan(), Some(20));
        assert_eq!(track.volume(), Some(100));
        assert_eq!(track.program_number(), Some(5));
        assert_eq!(track.controller_events(PAN_CONTROLLER).len(), 1);
        assert_eq!(track.program_change_events().len(), 1);
    }

    #[test]
    fn create_or_update_rewrites_every_match() {
        let mut track = Track::new(Some(0));
        // two identical-key events can come in through plain insertion
        let first = track.insert_event(NewEvent::at(0, EventKind::track_name("a")));
        let second = track.insert_event(NewEvent::at(0, EventKind::track_name("b")));

        let merged = track.create_or_update(0, EventKind::track_name("c"));
        assert_eq!(merged.id(), first.id());
        for id in [first.id(), second.id()] {
            assert_eq!(
                track.event(id).map(|e| &e.kind),
                Some(&EventKind::Meta(MetaMessage::TrackName { text: "c".into() }))
            );
        }
        assert_eq!(track.events().len(), 2);
    }

    #[test]
    fn create_or_update_inserts_when_key_differs() {
        let mut track = Track::new(Some(0));
        track.create_or_update(0, EventKind::track_name("a"));
        track.create_or_update(10, EventKind::track_name("b"));
        assert_eq!(track.events().len(), 2);
    }

    #[test]
    fn clear_keeps_counting_ids() {
        let mut track = Track::new(Some(0));
        track.insert_events([note(0, 0), note(1, 0)]);
        track.clear();
        assert!(track.events().is_empty());
        let e = track.insert_event(note(0, 0));
        assert_eq!(e.id().get(), 2);
    }

    #[test]
    fn change_channel_skips_non_channel_events() {
        let mut track = Track::new(Some(0));
        track.insert_events([
            note(0, 1),
            NewEvent::at(0, EventKind::track_name("Lead")),
        ]);
        let rx = track.subscribe();

        track.change_channel(4);
        assert_eq!(track.channel(), Some(4));
        assert_eq!(rx.try_iter().count(), 1);
        for e in track.events() {
            match &e.kind {
                EventKind::Channel { channel, message } => {
                    assert_eq!(*channel, 4);
                    assert!(matches!(message, ChannelMessage::NoteOn { .. }));
                }
                other => assert_eq!(other, &EventKind::track_name("Lead")),
            }
        }
    }

    #[test]
    fn conductor_becomes_channel_track() {
        let mut track = Track::new(None);
        assert!(track.is_conductor_track());
        track.change_channel(2);
        assert!(!track.is_conductor_track());
        assert_eq!(track.version(), 1);
    }
}
