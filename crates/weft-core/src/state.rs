use crate::TimeSpan;
use serde::{Deserialize, Serialize};

/// Query context: the span being asked for plus the ambient random seed.
///
/// The seed travels with the query so that the random operators stay pure;
/// `Pattern::seed` re-pins it for everything below that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub span: TimeSpan,
    pub seed: u64,
}

impl State {
    pub fn new(span: TimeSpan) -> Self {
        State { span, seed: 0 }
    }

    pub fn with_seed(span: TimeSpan, seed: u64) -> Self {
        State { span, seed }
    }

    /// Same seed, different span.
    pub fn set_span(&self, span: TimeSpan) -> State {
        State {
            span,
            seed: self.seed,
        }
    }

    pub fn with_span<F>(&self, func: F) -> State
    where
        F: FnOnce(&TimeSpan) -> TimeSpan,
    {
        self.set_span(func(&self.span))
    }

    pub fn set_seed(&self, seed: u64) -> State {
        State {
            span: self.span,
            seed,
        }
    }
}
