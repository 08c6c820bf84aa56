//! Debounced sync of one free-text field (the loaded VOD clip's notes).

use std::time::{Duration, Instant};

pub const NOTES_DEBOUNCE: Duration = Duration::from_millis(500);
pub const SAVED_INDICATOR_HOLD: Duration = Duration::from_millis(1500);

pub const IDLE_LABEL: &str = "Notes auto-save.";
pub const SAVED_LABEL: &str = "Saved.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub entity_id: String,
    pub value: String,
    pub due: Instant,
}

/// A write that came due; handed to the writer by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub entity_id: String,
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct DebouncedFieldSync {
    field: &'static str,
    delay: Duration,
    tracked: Option<String>,
    pending: Option<PendingWrite>,
    saved_until: Option<Instant>,
}

impl DebouncedFieldSync {
    pub fn new(field: &'static str, delay: Duration) -> Self {
        Self {
            field,
            delay,
            tracked: None,
            pending: None,
            saved_until: None,
        }
    }

    pub fn notes() -> Self {
        Self::new("notes", NOTES_DEBOUNCE)
    }

    pub fn tracked(&self) -> Option<&str> {
        self.tracked.as_deref()
    }

    pub fn pending(&self) -> Option<&PendingWrite> {
        self.pending.as_ref()
    }

    /// Switch the tracked entity. A pending write for a different entity is dropped.
    pub fn track(&mut self, entity_id: Option<String>) {
        if self.tracked != entity_id {
            if let Some(p) = self.pending.take() {
                tracing::debug!(entity = %p.entity_id, "pending notes write cancelled by switch");
            }
        }
        self.tracked = entity_id;
    }

    /// Record a keystroke. Returns false when nothing is loaded.
    pub fn on_edit(&mut self, value: impl Into<String>, now: Instant) -> bool {
        let Some(entity_id) = self.tracked.clone() else {
            return false;
        };
        self.pending = Some(PendingWrite {
            entity_id,
            value: value.into(),
            due: now + self.delay,
        });
        true
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Fire the pending write if its window elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<FieldWrite> {
        if self.pending.as_ref().is_some_and(|p| now >= p.due) {
            let p = self.pending.take()?;
            return Some(FieldWrite {
                entity_id: p.entity_id,
                field: self.field,
                value: p.value,
            });
        }
        None
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let pending = self.pending.as_ref().map(|p| p.due);
        match (pending, self.saved_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn mark_saved(&mut self, now: Instant) {
        self.saved_until = Some(now + SAVED_INDICATOR_HOLD);
    }

    pub fn indicator(&self, now: Instant) -> &'static str {
        match self.saved_until {
            Some(until) if now < until => SAVED_LABEL,
            _ => IDLE_LABEL,
        }
    }

    /// Clears an expired indicator; true when the label changed back to idle.
    pub fn expire_indicator(&mut self, now: Instant) -> bool {
        if self.saved_until.is_some_and(|until| now >= until) {
            self.saved_until = None;
            return true;
        }
        false
    }
}
