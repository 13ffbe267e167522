//! The interactive proof-state engine of a dependently typed core
//! language: a proof term with typed holes, refined tactic by tactic until
//! it closes.
//!
//! [`new_proof`] starts a proof from a goal type; [`ProofState::process_tactic`]
//! interprets one [`Tactic`] against the focused hole, either advancing the
//! state or failing and leaving it untouched.

pub mod context;
pub mod error;
pub mod eval;
pub mod proofstate;
pub mod tt;
pub mod typecheck;
pub mod unify;

pub use context::{Context, DataMI, Def, MetaInformation};
pub use error::{Error, Result};
pub use proofstate::{drop_given, keep_given, new_proof, Problem, ProofState, Tactic};
pub use tt::{Binder, Env, Name, Raw, RefKind, Term};
pub use unify::UnifyMode;
