use crate::{
    controller::policy::AdvancePolicy,
    message::FetchRequest,
};
use model::pagination::cursor::Cursor;
use tracing::debug;

pub mod policy;

/// Owns the pagination cursor and the completion flag.
///
/// The controller is driven by a single owner and never shared. Every cursor
/// it hands out is `batch_size` past the previous one.
#[derive(Debug)]
pub struct OffsetController {
    policy: Box<dyn AdvancePolicy>,
    batch_size: usize,
    max_queue_size: usize,

    next: Cursor,
    issued: Vec<Cursor>,
    /// Records asked for so far, corrected down when pages come back short.
    requested: u64,
    exhausted: bool,
    halted: bool,
}

impl OffsetController {
    pub fn new(policy: Box<dyn AdvancePolicy>, batch_size: usize, max_queue_size: usize) -> Self {
        Self {
            policy,
            batch_size,
            max_queue_size,
            next: Cursor::start(),
            issued: Vec::new(),
            requested: 0,
            exhausted: false,
            halted: false,
        }
    }

    pub fn policy(&self) -> &dyn AdvancePolicy {
        self.policy.as_ref()
    }

    /// Issues the first page request at cursor 0. Later calls issue nothing.
    pub fn start(&mut self) -> Option<FetchRequest> {
        if !self.issued.is_empty() || !self.accepting() {
            return None;
        }
        Some(self.issue())
    }

    /// Requests pages until the policy refuses, given the number of records
    /// settled (delivered or lost) so far. May issue zero or many requests.
    pub fn advance(&mut self, settled: u64) -> Vec<FetchRequest> {
        let mut requests = Vec::new();
        while self.may_advance(settled) {
            requests.push(self.issue());
        }
        requests
    }

    pub fn may_advance(&self, settled: u64) -> bool {
        self.accepting()
            && self.policy.may_advance(
                self.optimistic_depth(settled),
                self.batch_size as u64,
                self.max_queue_size as u64,
            )
    }

    /// Corrects the requested count once a page has returned `count` records.
    pub fn on_page(&mut self, count: usize) {
        let shortfall = self.batch_size.saturating_sub(count) as u64;
        self.requested = self.requested.saturating_sub(shortfall);
    }

    /// Marks the source exhausted. No cursor is issued after this.
    pub fn mark_exhausted(&mut self, cursor: Cursor) {
        if !self.exhausted {
            debug!(cursor = %cursor, "Source exhausted");
        }
        self.exhausted = true;
    }

    /// Suppresses every further request after a fatal error or cancellation.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn accepting(&self) -> bool {
        !self.exhausted && !self.halted
    }

    pub fn optimistic_depth(&self, settled: u64) -> u64 {
        self.requested.saturating_sub(settled)
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cursor_sequence(&self) -> &[Cursor] {
        &self.issued
    }

    pub fn last_cursor(&self) -> Option<Cursor> {
        self.issued.last().copied()
    }

    fn issue(&mut self) -> FetchRequest {
        let cursor = self.next;
        self.next = cursor.advance(self.batch_size);
        self.requested += self.batch_size as u64;
        self.issued.push(cursor);

        FetchRequest {
            cursor,
            limit: self.batch_size,
        }
    }
}
