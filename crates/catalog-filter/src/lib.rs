//! Catalog blacklist filter
//!
//! [`RuleSet::evaluate`] is a pure predicate over a [`Candidate`]; an item is
//! rejected when any enabled rule matches it. [`Blacklist`] wraps a rule set
//! behind a lock so mutations are visible to the very next evaluation, and
//! persists every mutation to a JSON file.

mod blacklist;
mod error;
mod origin;
mod rules;

pub use blacklist::Blacklist;
pub use error::{FilterError, Result};
pub use rules::{Candidate, RejectReason, RuleKind, RuleList, RuleSet, Verdict};
