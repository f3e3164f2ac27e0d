//! Cycle-based pattern algebra for live coding.
//!
//! A pattern is a pure function from a time span to the events active in
//! it. This crate provides the exact-rational time model, the `Pattern`
//! abstraction, the combinator library (concatenation, stacking, time
//! transforms, structure operators, joins), deterministic seeded
//! randomness, continuous signals, and the voice-payload control layer.
//!
//! # Examples
//!
//! ```
//! use weft_core::{fastcat, pure, Value};
//!
//! let pattern = fastcat(vec![
//!     pure(Value::from("bd")),
//!     pure(Value::from("sd")),
//! ]);
//! let events = pattern.query_arc(0.0, 1.0);
//! assert_eq!(events.len(), 2);
//! ```
//!
//! Notation-string parsing lives in the companion `weft-mini` crate;
//! everything here works on already-built patterns.

pub mod combinators;
pub mod control;
pub mod error;
pub mod euclid;
pub mod fraction;
pub mod hap;
pub mod joins;
pub mod ops;
pub mod pattern;
pub mod random;
pub mod signal;
pub mod state;
pub mod structure;
pub mod timespan;
pub mod value;

pub use combinators::{
    arrange, cat, compress, fastcat, overlay, polymeter, polymeter_steps, polyrhythm, sequence,
    slowcat, stack, stack_by, stack_centre, stack_left, stack_right, timecat,
};
pub use control::{
    ctrl_f64, ctrl_value, note_of, sound_of, value_of, FilterDef, FilterEnv, FormantBand,
    VoiceData,
};
pub use error::{PatternError, Result};
pub use euclid::bjorklund;
pub use fraction::Fraction;
pub use hap::Hap;
pub use joins::{pickmod, pickmod_out};
pub use ops::{every, fast, iter, rev, slow, superimpose, zoom};
pub use pattern::{pure, signal, silence, steady, Pattern};
pub use random::{
    brand, choose, choose_cycles, choose_cycles_site, choose_with, rand, rand_cycle, wchoose,
    wchoose_cycles_site,
};
pub use signal::{isaw, saw, sine, square, tri};
pub use state::State;
pub use structure::boolean_steps;
pub use timespan::TimeSpan;
pub use value::Value;
