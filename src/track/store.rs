use std::collections::HashSet;

use crate::events::{Event, EventId, EventKind, EventPatch, NewEvent};

/// Hands out event ids in increasing order. Ids are never reused, even after
/// the event they were given to has been removed.
///
/// The counter is 64-bit, so a track cannot exhaust it.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn allocate(&mut self) -> EventId {
        let id = EventId::new(self.next);
        self.next += 1;
        id
    }

    pub fn peek(&self) -> EventId {
        EventId::new(self.next)
    }
}

/// Unsorted primitives over a track's events. Sorting and end-of-track
/// upkeep are left to the transaction that wraps these calls.
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
    ids: IdAllocator,
    last_inserted: Option<(EventId, u32)>,
    dirty: bool,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn next_id(&self) -> EventId {
        self.ids.peek()
    }

    pub fn lookup(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|e| e.id() == id)
    }

    /// `channel` is the owning track's channel; channel-tagged events are
    /// stamped with it.
    pub fn insert(&mut self, event: NewEvent, channel: Option<u8>) -> Event {
        let id = self.ids.allocate();
        let tick = match event.tick {
            Some(tick) => tick,
            None => self
                .previous_tick()
                .saturating_add(event.delta_time.unwrap_or(0)),
        };

        let mut kind = event.kind;
        stamp_channel(&mut kind, channel);

        let stored = Event::new(id, tick, kind);
        self.events.push(stored.clone());
        self.last_inserted = Some((id, tick));
        self.dirty = true;
        stored
    }

    /// Current tick of the previously inserted event, or the tick it had
    /// when it was removed.
    fn previous_tick(&self) -> u32 {
        match self.last_inserted {
            Some((id, inserted_tick)) => self.lookup(id).map_or(inserted_tick, |e| e.tick),
            None => 0,
        }
    }

    /// Merges `patch` onto the event with `id`. A merge that leaves the event
    /// unchanged doesn't count as a mutation.
    pub fn update(&mut self, id: EventId, patch: &EventPatch, channel: Option<u8>) -> Option<Event> {
        let Some(index) = self.events.iter().position(|e| e.id() == id) else {
            tracing::warn!(%id, "update of unknown event ignored");
            return None;
        };

        let current = &self.events[index];
        let mut merged = patch.apply(current);
        stamp_channel(&mut merged.kind, channel);

        if merged == *current {
            tracing::trace!(%id, "update is a no-op");
            return Some(merged);
        }

        self.events[index] = merged.clone();
        self.dirty = true;
        Some(merged)
    }

    pub fn remove(&mut self, id: EventId) -> bool {
        let Some(index) = self.events.iter().position(|e| e.id() == id) else {
            return false;
        };
        self.events.remove(index);
        self.dirty = true;
        true
    }

    pub fn remove_many(&mut self, ids: &[EventId]) -> usize {
        let ids: HashSet<EventId> = ids.iter().copied().collect();
        let before = self.events.len();
        self.events.retain(|e| !ids.contains(&e.id()));
        let removed = before - self.events.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Stable, so equal-tick events keep their relative order.
    pub fn sort_by_tick(&mut self) {
        self.events.sort_by_key(|e| e.tick);
    }

    /// `max(tick + duration)` over all events, or `None` when empty.
    pub fn extent(&self) -> Option<u32> {
        self.events.iter().map(Event::end_tick).max()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

fn stamp_channel(kind: &mut EventKind, track_channel: Option<u8>) {
    if let (EventKind::Channel { channel, .. }, Some(track_channel)) = (kind, track_channel) {
        *channel = track_channel;
    }
}
