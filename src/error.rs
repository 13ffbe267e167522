use thiserror::Error;

use crate::tt::{Name, Term};

/// Failures raised by the engine and its collaborators.
///
/// Structural tactic failures use [`Error::Tactic`] with the message the
/// driver shows verbatim; the remaining variants are the typed errors that
/// propagate unchanged through tactic interpreters.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("can't unify {left} with {right}")]
    CantUnify { left: Term, right: Term },
    #[error("can't convert {left} with {right}")]
    CantConvert { left: Term, right: Term },
    #[error("can't infer type of {0}")]
    CantInferType(String),
    #[error("can't introduce: {0} is not a function type")]
    CantIntroduce(Term),
    #[error("{0} is not an equality type")]
    NotEquality(Term),
    #[error("{0} is not applicable")]
    NotAFunction(Term),
    #[error("{0} is not a type")]
    NotAType(Term),
    #[error("no such variable {0}")]
    NoSuchVariable(Name),
    #[error("can't find hole {0}")]
    CantFindHole(Name),
    #[error("no eliminator for {0}")]
    NoEliminator(Name),
    #[error("more than one eliminator for {0}")]
    AmbiguousEliminator(Name),
    #[error("{0}")]
    Tactic(String),
}

pub type Result<T> = std::result::Result<T, Error>;
