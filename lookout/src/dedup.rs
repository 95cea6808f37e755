use std::collections::HashMap;

use time::{Duration, OffsetDateTime};

/// Remembers which broadcast sessions already produced a notification.
///
/// The catalog is re-polled from scratch every cycle, so this is the only
/// state that stops a stream staying live across polls from notifying twice.
/// Keys are session keys, not broadcaster ids: a broadcaster going live again
/// later is a new notifiable event.
#[derive(Default)]
pub struct NotifiedStore {
    seen: HashMap<String, OffsetDateTime>,
}

impl NotifiedStore {
    /// Test-and-set: true exactly once per session key.
    ///
    /// A `true` return also records the session, so a repeated call can never
    /// hand out a second notification.
    pub fn should_notify(&mut self, session_key: &str, now: OffsetDateTime) -> bool {
        use std::collections::hash_map::Entry;
        match self.seen.entry(session_key.to_string()) {
            Entry::Occupied(..) => false,
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Un-records a session so a later cycle may notify for it again.
    pub fn forget(&mut self, session_key: &str) {
        self.seen.remove(session_key);
    }

    /// Drops entries older than the retention horizon.
    ///
    /// Entries at or under the horizon always survive; sessions are bounded
    /// by the platform, so anything older cannot still be the same broadcast.
    pub fn prune(&mut self, now: OffsetDateTime, retention: Duration) {
        let before = self.seen.len();
        self.seen.retain(|_, first_notified| now - *first_notified <= retention);

        let dropped = before - self.seen.len();
        if dropped > 0 {
            log::trace!("pruned {dropped} stale dedup entries, {} left", self.seen.len());
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
