use thiserror::Error;

use crate::forwards::Dual;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutodiffError {
    /// The divisor has a zero real part but the dividend does not.
    #[error("division not defined for divisor {divisor} (dividend {dividend})")]
    DivisionUndefined { dividend: Dual, divisor: Dual },

    /// Both real parts are zero, so every `x + yε` solves the quotient.
    #[error("infinitely many solutions dividing {dividend} by {divisor}")]
    DivisionIndeterminate { dividend: Dual, divisor: Dual },

    #[error("`{operator}` expects {expected} argument(s), got {found}")]
    InvalidArity {
        operator: String,
        expected: &'static str,
        found: usize,
    },

    #[error("unbound variables: {}", variables.join(", "))]
    Unbound { variables: Vec<String> },
}

pub type Result<T> = std::result::Result<T, AutodiffError>;
