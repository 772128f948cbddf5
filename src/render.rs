use std::fmt::{self, Display, Formatter};

use crate::expr::{Expr, Notation, Term, Variable};

/// Collapses adjacent sign pairs in rendered infix text: `+-` becomes `-`,
/// then `--` becomes `+`.
///
/// This is a plain substring rewrite, applied in that order. It does not know
/// about tokens, so an identifier that itself contains `+-` or `--` is folded
/// too.
pub fn fold_signs(text: &str) -> String {
    text.replace("+-", "-").replace("--", "+")
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_negated() {
            write!(f, "-")?;
        }
        write!(f, "{}", self.identifier())
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Term::Variable(var) => var.fmt(f),
            // a plain number prints like a float literal
            Term::Constant(value) if value.eps == 0.0 => write!(f, "{:?}", value.real),
            Term::Constant(value) => value.fmt(f),
            Term::Expr(expr) => expr.fmt(f),
        }
    }
}

// nested infix nodes and dual constants are always bracketed, no precedence
fn infix_operand(arg: &Term) -> String {
    match arg {
        Term::Expr(expr) if expr.notation() == Notation::Infix => format!("({})", arg),
        Term::Constant(value) if value.eps != 0.0 => format!("({})", arg),
        _ => arg.to_string(),
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.notation() {
            Notation::Prefix => {
                let args: Vec<String> = self.args().iter().map(Term::to_string).collect();
                let sign = if self.is_negated() { "-" } else { "" };
                write!(f, "{}{}({})", sign, self.name(), args.join(","))
            }
            Notation::Infix => {
                let operands: Vec<String> = self.args().iter().map(infix_operand).collect();
                let joined = operands.join(self.name());
                let text = if self.is_negated() {
                    format!("-({})", joined)
                } else {
                    joined
                };
                f.write_str(&fold_signs(&text))
            }
        }
    }
}
