//! Forward-mode automatic differentiation over dual numbers, driven by
//! symbolic expression trees that support partial evaluation.
//!
//! ```
//! use dualexpr::{plus, sin, terms, Bindings, Variable};
//!
//! let f = plus(terms![sin(Variable::new("x")), -1.0]);
//! assert_eq!(f.to_string(), "Sin(x)-1.0");
//!
//! let (value, slope) = f.derivative("x", 0.0, &Bindings::new()).unwrap();
//! assert_eq!((value, slope), (-1.0, 1.0));
//! ```

pub mod error;
pub mod expr;
pub mod forwards;
pub mod render;
pub mod taylor;

pub use error::{AutodiffError, Result};
pub use expr::{divide, minus, multiply, plus, sin, Bindings, ElementaryFn, Expr, Notation, Term, Variable};
pub use forwards::Dual;
pub use render::fold_signs;

/// Builds a `Vec<Term>` from a mix of expressions, variables and numbers.
#[macro_export]
macro_rules! terms {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::Term::from($arg)),*]
    };
}
