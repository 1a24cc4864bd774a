//! Shared machinery for the fixed status tables of matches and player requests.
//!
//! Every mutating operation consults [`Lifecycle::check`] before touching storage and
//! then performs a compare-and-set keyed on [`Lifecycle::sources_into`], so the table
//! below each status enum is the only place where legal moves are spelled out.

use std::fmt;

/// A status enum backed by an explicit edge table.
pub trait Lifecycle: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Human readable name of the record kind, used in error messages.
    const KIND: &'static str;
    /// Allowed `(from, to)` pairs. Anything absent is illegal.
    const EDGES: &'static [(Self, Self)];

    /// Source states from which `target` may be entered.
    fn sources_into(target: Self) -> Vec<Self> {
        Self::EDGES
            .iter()
            .filter(|(_, to)| *to == target)
            .map(|(from, _)| *from)
            .collect()
    }

    /// Validate a single move against the edge table.
    fn check(from: Self, to: Self) -> Result<(), InvalidTransition<Self>> {
        if Self::EDGES.contains(&(from, to)) {
            Ok(())
        } else {
            Err(InvalidTransition { from, to })
        }
    }
}

/// Error returned when a move is not part of the edge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition<S> {
    /// State the record was in.
    pub from: S,
    /// State the caller asked for.
    pub to: S,
}

impl<S: Lifecycle> fmt::Display for InvalidTransition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources = S::sources_into(self.to);
        if sources.is_empty() {
            return write!(
                f,
                "{} is {}; no transition leads to {}",
                S::KIND,
                self.from,
                self.to
            );
        }

        let required = sources
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "{} is {}; moving to {} requires one of [{}]",
            S::KIND,
            self.from,
            self.to,
            required
        )
    }
}

impl<S: Lifecycle> std::error::Error for InvalidTransition<S> {}
