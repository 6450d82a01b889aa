//! Debounced suggestion search with response sequencing.
//!
//! Input arms a debounce deadline; new input replaces a pending deadline.
//! Each fired query gets a monotonically increasing sequence number and a
//! response is applied only if it answers the latest request, so a slow reply
//! to an older query cannot overwrite newer suggestions.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::board::ItemPayload;
use crate::provider::{ItemProvider, LookupError};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

/// An issued suggestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub seq: u64,
    pub query: String,
}

#[derive(Debug, Clone)]
struct PendingQuery {
    query: String,
    due: Instant,
}

/// What a key press did to the suggestion list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Moved(usize),
    Chosen(ItemPayload),
    Dismissed,
}

#[derive(Debug, Clone)]
pub struct SearchSession {
    debounce: Duration,
    limit: usize,
    pending: Option<PendingQuery>,
    latest_seq: u64,
    suggestions: Vec<ItemPayload>,
    selected: usize,
    visible: bool,
    no_results: bool,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, DEFAULT_SUGGESTION_LIMIT)
    }
}

impl SearchSession {
    pub fn new(debounce: Duration, limit: usize) -> Self {
        Self {
            debounce,
            limit,
            pending: None,
            latest_seq: 0,
            suggestions: Vec::new(),
            selected: 0,
            visible: false,
            no_results: false,
        }
    }

    /// Record new input text. Blank input clears everything immediately and
    /// makes every ticket issued so far stale.
    pub fn input(&mut self, text: &str, now: Instant) {
        let query = text.trim();
        if query.is_empty() {
            self.pending = None;
            self.latest_seq += 1;
            self.clear();
            return;
        }
        self.pending = Some(PendingQuery {
            query: query.to_string(),
            due: now + self.debounce,
        });
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Fire the pending query once its debounce deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<RequestTicket> {
        match &self.pending {
            Some(pending) if now >= pending.due => {}
            _ => return None,
        }
        let pending = self.pending.take()?;
        self.latest_seq += 1;
        Some(RequestTicket {
            seq: self.latest_seq,
            query: pending.query,
        })
    }

    /// Apply a response. Returns false (and changes nothing) when the ticket
    /// is older than the latest issued request.
    pub fn apply(
        &mut self,
        ticket: &RequestTicket,
        response: Result<Vec<ItemPayload>, LookupError>,
    ) -> bool {
        if ticket.seq != self.latest_seq {
            return false;
        }
        match response {
            Ok(mut found) => {
                found.truncate(self.limit);
                self.no_results = found.is_empty();
                self.visible = !found.is_empty();
                self.suggestions = found;
                self.selected = 0;
            }
            Err(_) => {
                self.suggestions.clear();
                self.selected = 0;
                self.visible = false;
                self.no_results = false;
            }
        }
        true
    }

    /// Run a ticket against a synchronous provider and apply the result.
    pub fn resolve(&mut self, provider: &dyn ItemProvider, ticket: &RequestTicket) -> bool {
        let response = provider.search_suggestions(&ticket.query);
        self.apply(ticket, response)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if !self.visible || self.suggestions.is_empty() || key.kind == KeyEventKind::Release {
            return KeyOutcome::Ignored;
        }
        let count = self.suggestions.len();
        match key.code {
            KeyCode::Down => {
                self.selected = (self.selected + 1) % count;
                KeyOutcome::Moved(self.selected)
            }
            KeyCode::Up => {
                self.selected = (self.selected + count - 1) % count;
                KeyOutcome::Moved(self.selected)
            }
            KeyCode::Enter => match self.selected_suggestion().cloned() {
                Some(choice) => {
                    self.clear();
                    KeyOutcome::Chosen(choice)
                }
                None => KeyOutcome::Ignored,
            },
            KeyCode::Esc => {
                self.visible = false;
                KeyOutcome::Dismissed
            }
            _ => KeyOutcome::Ignored,
        }
    }

    pub fn clear(&mut self) {
        self.suggestions.clear();
        self.selected = 0;
        self.visible = false;
        self.no_results = false;
    }

    pub fn suggestions(&self) -> &[ItemPayload] {
        &self.suggestions
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_suggestion(&self) -> Option<&ItemPayload> {
        self.suggestions.get(self.selected)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn no_results(&self) -> bool {
        self.no_results
    }
}
