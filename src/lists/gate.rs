//! Last-initiated-wins bookkeeping for overlapping loads.

/// Identifies one load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoadTicket(u64);

/// Issues tickets in start order; only the newest ticket may apply its result.
///
/// Lives inside the owner's state mutex so issuing and checking never race.
#[derive(Debug, Default)]
pub(crate) struct LoadGate {
    latest: u64,
}

impl LoadGate {
    pub(crate) fn issue(&mut self) -> LoadTicket {
        self.latest += 1;
        LoadTicket(self.latest)
    }

    pub(crate) fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.latest
    }
}
