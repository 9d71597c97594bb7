//! Trailing debounce for text commits, one slot per entry.
//!
//! The debouncer only tracks *which* timer is current. Hosts arm a real timer (or advance a
//! virtual clock) per `Ticket` and hand the ticket back when it fires; a ticket that was
//! rescheduled or cancelled in the meantime is simply stale.

use crate::models::EntryId;
use std::collections::HashMap;

pub(crate) const DEFAULT_QUIET_MS: u64 = 300;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub id: EntryId,
    pub generation: u64,
    pub deadline_ms: u64,
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    generation: u64,
    deadline_ms: u64,
}

#[derive(Clone, Debug)]
pub(crate) struct Debouncer {
    quiet_ms: u64,
    next_generation: u64,
    pending: HashMap<EntryId, Pending>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_MS)
    }
}

impl Debouncer {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            quiet_ms,
            next_generation: 1,
            pending: HashMap::new(),
        }
    }

    pub fn quiet_ms(&self) -> u64 {
        self.quiet_ms
    }

    /// (Re)starts the quiet period for `id`. Any earlier ticket for `id` becomes stale.
    pub fn schedule(&mut self, id: &EntryId, now_ms: u64) -> Ticket {
        let generation = self.next_generation;
        self.next_generation += 1;
        let deadline_ms = now_ms + self.quiet_ms;
        self.pending.insert(
            id.clone(),
            Pending {
                generation,
                deadline_ms,
            },
        );
        Ticket {
            id: id.clone(),
            generation,
            deadline_ms,
        }
    }

    /// Drops the pending commit for `id`. Returns whether one was pending.
    pub fn cancel(&mut self, id: &EntryId) -> bool {
        self.pending.remove(id).is_some()
    }

    pub fn is_pending(&self, id: &EntryId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ids with a commit still waiting, in id order.
    pub fn pending_ids(&self) -> Vec<EntryId> {
        let mut ids = self.pending.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.pending
            .get(&ticket.id)
            .is_some_and(|p| p.generation == ticket.generation)
    }

    /// Consumes a fired ticket. Returns `false` (and leaves state alone) when it is stale.
    pub fn complete(&mut self, ticket: &Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.pending.remove(&ticket.id);
        true
    }

    /// Current tickets whose quiet period has elapsed at `now_ms`, earliest first.
    pub fn due(&self, now_ms: u64) -> Vec<Ticket> {
        let mut out = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline_ms <= now_ms)
            .map(|(id, p)| Ticket {
                id: id.clone(),
                generation: p.generation,
                deadline_ms: p.deadline_ms,
            })
            .collect::<Vec<_>>();
        out.sort_by_key(|t| t.deadline_ms);
        out
    }
}
