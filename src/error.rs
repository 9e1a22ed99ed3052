//! # Error handling for the interpreter
//!
//! The language surfaces exactly one diagnostic per command: the first
//! [`Complaint`] raised wins, and everything after it is suppressed until
//! the driver clears it at the start of the next command. [`ComplaintKind`]
//! groups complaints by origin (lexical, syntactic, semantic, resource) so
//! callers can match on category while [`Complaint::message`] still carries
//! the exact diagnostic text.

use std::fmt;

/// Coarse category of a [`Complaint`], mirroring where in the pipeline it
/// was raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComplaintKind {
    /// Bad character, overflowing literal, unterminated string, overlong name.
    Lexical,
    /// Malformed command: expected factor/then/else/`)`/`=`/identifier, not
    /// an l-value, trailing garbage after a command.
    Syntactic,
    /// Unknown identifier, `forget` of a non-definition.
    Semantic,
    /// Store exhausted, dictionary corrupted, stack overflow.
    Resource,
}

/// A single latched diagnostic.
///
/// Only the first complaint raised during a command is kept; later calls to
/// [`Complaint::raise`] on an already-latched cell are no-ops. This matches
/// the original's `complain()`/`complaint` global exactly, just scoped to an
/// owned field instead of a process-wide static.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Complaint {
    pub kind: ComplaintKind,
    pub message: &'static str,
}

impl Complaint {
    pub fn new(kind: ComplaintKind, message: &'static str) -> Self {
        Complaint { kind, message }
    }
}

impl fmt::Display for Complaint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Complaint {}

/// Holds at most one [`Complaint`] per command, latched on first write.
#[derive(Default, Debug)]
pub struct Latch {
    complaint: Option<Complaint>,
}

impl Latch {
    pub fn new() -> Self {
        Latch { complaint: None }
    }

    /// Record `c` unless a complaint is already latched.
    pub fn raise(&mut self, c: Complaint) {
        if self.complaint.is_none() {
            self.complaint = Some(c);
        }
    }

    pub fn is_raised(&self) -> bool {
        self.complaint.is_some()
    }

    pub fn get(&self) -> Option<&Complaint> {
        self.complaint.as_ref()
    }

    /// Clear the latch; called by the driver between commands.
    pub fn clear(&mut self) {
        self.complaint = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_complaint_wins() {
        let mut latch = Latch::new();
        latch.raise(Complaint::new(ComplaintKind::Lexical, "Lexical error"));
        latch.raise(Complaint::new(ComplaintKind::Resource, "Store exhausted"));
        assert_eq!(latch.get().unwrap().message, "Lexical error");
    }

    #[test]
    fn clear_allows_new_complaint() {
        let mut latch = Latch::new();
        latch.raise(Complaint::new(ComplaintKind::Lexical, "Lexical error"));
        latch.clear();
        assert!(!latch.is_raised());
        latch.raise(Complaint::new(ComplaintKind::Semantic, "Unknown identifier"));
        assert_eq!(latch.get().unwrap().message, "Unknown identifier");
    }
}
