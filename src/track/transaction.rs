use super::Track;
use crate::events::{Event, EventId, EventPatch, NewEvent};

/// A batch of mutations on one track.
///
/// Inside the batch `events()` may be unsorted. Closing it (by `commit` or by
/// dropping the guard) recomputes end-of-track, re-sorts, and notifies
/// subscribers once if anything changed.
pub struct Transaction<'a> {
    track: &'a mut Track,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(track: &'a mut Track) -> Self {
        Self { track }
    }

    pub fn events(&self) -> &[Event] {
        self.track.store.events()
    }

    pub fn lookup(&self, id: EventId) -> Option<&Event> {
        self.track.store.lookup(id)
    }

    pub fn insert(&mut self, event: NewEvent) -> Event {
        let channel = self.track.channel;
        self.track.store.insert(event, channel)
    }

    /// Ids come out in input order.
    pub fn insert_many(&mut self, events: impl IntoIterator<Item = NewEvent>) -> Vec<Event> {
        events.into_iter().map(|e| self.insert(e)).collect()
    }

    pub fn update(&mut self, id: EventId, patch: &EventPatch) -> Option<Event> {
        let channel = self.track.channel;
        self.track.store.update(id, patch, channel)
    }

    pub fn update_many<'p>(&mut self, updates: impl IntoIterator<Item = (EventId, &'p EventPatch)>) {
        for (id, patch) in updates {
            self.update(id, patch);
        }
    }

    pub fn remove(&mut self, id: EventId) {
        self.track.store.remove(id);
    }

    pub fn remove_many(&mut self, ids: &[EventId]) {
        self.track.store.remove_many(ids);
    }

    /// Moves the track and every channel-tagged event to `channel`.
    pub fn set_channel(&mut self, channel: u8) {
        if self.track.channel != Some(channel) {
            self.track.channel = Some(channel);
            self.track.store.mark_dirty();
        }

        let ids: Vec<EventId> = self
            .events()
            .iter()
            .filter(|e| e.channel().is_some())
            .map(Event::id)
            .collect();
        let patch = EventPatch::new().channel(channel);
        for id in ids {
            self.update(id, &patch);
        }
    }

    pub fn commit(self) {}
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.track.settle();
    }
}
