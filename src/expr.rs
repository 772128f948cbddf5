//! Symbolic expressions that evaluate through dual arithmetic.
//!
//! A tree is built from [`Variable`]s, constants and [`Expr`] nodes. Calling
//! [`Term::eval`] with a partial set of [`Bindings`] substitutes what is bound
//! and returns either a fully reduced [`Term::Constant`] or a new, smaller
//! tree that can be evaluated again later. Trees are never mutated: negation
//! and evaluation always build new values.

use std::collections::HashMap;
use std::fmt;
use std::ops::Neg;

use log::{debug, trace};
use num_traits::{One, Zero};

use crate::{
    error::{AutodiffError, Result},
    forwards::Dual,
    taylor,
};

/// The function a node applies once all of its arguments are constants.
pub type ElementaryFn = fn(&[Dual]) -> Result<Dual>;

/// How a node is written out: `name(a,b)` or `a name b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    Prefix,
    Infix,
}

fn sign(negated: bool) -> f64 {
    if negated {
        -1.0
    } else {
        1.0
    }
}

/// Identifier to value map used when evaluating a tree.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, Dual>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`; a float is lifted to a dual with zero derivative.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Dual>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Binds `name` to `at` with a unit derivative, selecting `d/dname`.
    pub fn seed(self, name: impl Into<String>, at: f64) -> Self {
        self.bind(name, Dual::variable(at))
    }

    pub fn get(&self, name: &str) -> Option<Dual> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Dual>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Bindings {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// A named, possibly negated, free slot in an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    identifier: String,
    negated: bool,
}

impl Variable {
    pub fn new(identifier: impl Into<String>) -> Self {
        Variable {
            identifier: identifier.into(),
            negated: false,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn negate(&self) -> Self {
        Variable {
            identifier: self.identifier.clone(),
            negated: !self.negated,
        }
    }

    /// Returns the bound value (sign applied) or the variable itself.
    pub fn eval(&self, bindings: &Bindings) -> Term {
        match bindings.get(&self.identifier) {
            Some(value) => Term::Constant(value.scale(sign(self.negated))),
            None => Term::Variable(self.clone()),
        }
    }
}

impl Neg for Variable {
    type Output = Variable;

    fn neg(self) -> Variable {
        Variable {
            negated: !self.negated,
            ..self
        }
    }
}

impl Neg for &Variable {
    type Output = Variable;

    fn neg(self) -> Variable {
        self.negate()
    }
}

/// An elementary function applied to an ordered list of arguments.
#[derive(Clone)]
pub struct Expr {
    name: String,
    notation: Notation,
    func: ElementaryFn,
    args: Vec<Term>,
    negated: bool,
}

impl Expr {
    /// Builds a node. `func` is not called here, so arity problems only
    /// surface once the node is fully evaluated.
    pub fn new<I>(name: impl Into<String>, notation: Notation, func: ElementaryFn, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Term>,
    {
        Expr {
            name: name.into(),
            notation,
            func,
            args: args.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notation(&self) -> Notation {
        self.notation
    }

    pub fn args(&self) -> &[Term] {
        &self.args
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Flips the sign flag; children are copied unchanged.
    pub fn negate(&self) -> Self {
        Expr {
            negated: !self.negated,
            ..self.clone()
        }
    }

    /// Substitutes `bindings` throughout the tree.
    ///
    /// When every argument reduces to a constant the elementary function runs
    /// and the signed result is returned as [`Term::Constant`]. Otherwise a new
    /// node with the partially reduced arguments is returned, keeping this
    /// node's sign.
    pub fn eval(&self, bindings: &Bindings) -> Result<Term> {
        let mut reduced = true;
        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let arg = arg.eval(bindings)?;
            reduced &= arg.is_constant();
            args.push(arg);
        }

        if !reduced {
            trace!("`{}` left partially evaluated", self.name);
            return Ok(Term::Expr(Expr {
                name: self.name.clone(),
                notation: self.notation,
                func: self.func,
                args,
                negated: self.negated,
            }));
        }

        let values: Vec<Dual> = args.iter().filter_map(Term::constant).collect();
        let value = (self.func)(&values)?.scale(sign(self.negated));
        debug!("`{}` reduced to {}", self.name, value);
        Ok(Term::Constant(value))
    }

    /// Seeds `var` at `at`, evaluates, and returns `(value, derivative)`.
    pub fn derivative(&self, var: &str, at: f64, bindings: &Bindings) -> Result<(f64, f64)> {
        value_and_derivative(self.eval(&bindings.clone().seed(var, at))?)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("name", &self.name)
            .field("notation", &self.notation)
            .field("args", &self.args)
            .field("negated", &self.negated)
            .finish()
    }
}

impl PartialEq for Expr {
    // the name identifies the elementary function
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.notation == other.notation
            && self.negated == other.negated
            && self.args == other.args
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr {
            negated: !self.negated,
            ..self
        }
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self.negate()
    }
}

/// One argument slot of an expression, and the result of evaluating one.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Variable(Variable),
    Constant(Dual),
    Expr(Expr),
}

impl Term {
    pub fn eval(&self, bindings: &Bindings) -> Result<Term> {
        match self {
            Term::Variable(var) => Ok(var.eval(bindings)),
            Term::Constant(value) => Ok(Term::Constant(*value)),
            Term::Expr(expr) => expr.eval(bindings),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    pub fn constant(&self) -> Option<Dual> {
        match self {
            Term::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn derivative(&self, var: &str, at: f64, bindings: &Bindings) -> Result<(f64, f64)> {
        value_and_derivative(self.eval(&bindings.clone().seed(var, at))?)
    }

    /// Identifiers still unbound, in first-occurrence order.
    pub fn free_variables(&self) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_free(&mut found);
        found
    }

    fn collect_free(&self, found: &mut Vec<String>) {
        match self {
            Term::Variable(var) => {
                if !found.iter().any(|name| name == var.identifier()) {
                    found.push(var.identifier.clone());
                }
            }
            Term::Constant(_) => {}
            Term::Expr(expr) => {
                for arg in &expr.args {
                    arg.collect_free(found);
                }
            }
        }
    }
}

fn value_and_derivative(term: Term) -> Result<(f64, f64)> {
    match term {
        Term::Constant(value) => Ok((value.real, value.eps)),
        partial => Err(AutodiffError::Unbound {
            variables: partial.free_variables(),
        }),
    }
}

impl Neg for Term {
    type Output = Term;

    fn neg(self) -> Term {
        match self {
            Term::Variable(var) => Term::Variable(-var),
            Term::Constant(value) => Term::Constant(-value),
            Term::Expr(expr) => Term::Expr(-expr),
        }
    }
}

impl From<f64> for Term {
    fn from(value: f64) -> Self {
        Term::Constant(Dual::constant(value))
    }
}

impl From<Dual> for Term {
    fn from(value: Dual) -> Self {
        Term::Constant(value)
    }
}

impl From<Variable> for Term {
    fn from(var: Variable) -> Self {
        Term::Variable(var)
    }
}

impl From<Expr> for Term {
    fn from(expr: Expr) -> Self {
        Term::Expr(expr)
    }
}

fn sum(args: &[Dual]) -> Result<Dual> {
    Ok(args.iter().fold(Dual::zero(), |acc, &a| acc + a))
}

fn difference(args: &[Dual]) -> Result<Dual> {
    match args.split_first() {
        Some((&first, rest)) => Ok(rest.iter().fold(first, |acc, &a| acc - a)),
        None => Ok(Dual::zero()),
    }
}

fn product(args: &[Dual]) -> Result<Dual> {
    Ok(args.iter().fold(Dual::one(), |acc, &a| acc * a))
}

fn quotient(args: &[Dual]) -> Result<Dual> {
    let (&first, rest) = args.split_first().ok_or_else(|| AutodiffError::InvalidArity {
        operator: "/".to_string(),
        expected: "at least 1",
        found: 0,
    })?;
    rest.iter().try_fold(first, |acc, &a| acc.try_div(a))
}

fn sine(args: &[Dual]) -> Result<Dual> {
    match args {
        [x] => Ok(taylor::sin(*x)),
        _ => Err(AutodiffError::InvalidArity {
            operator: "Sin".to_string(),
            expected: "exactly 1",
            found: args.len(),
        }),
    }
}

/// `a + b + ...`; the empty sum is zero.
pub fn plus<I>(args: I) -> Expr
where
    I: IntoIterator,
    I::Item: Into<Term>,
{
    Expr::new("+", Notation::Infix, sum, args)
}

/// `a - b - ...`; the empty difference is zero.
pub fn minus<I>(args: I) -> Expr
where
    I: IntoIterator,
    I::Item: Into<Term>,
{
    Expr::new("-", Notation::Infix, difference, args)
}

pub fn multiply<I>(args: I) -> Expr
where
    I: IntoIterator,
    I::Item: Into<Term>,
{
    Expr::new("*", Notation::Infix, product, args)
}

/// `a / b / ...`; fails with `InvalidArity` on evaluation when empty.
pub fn divide<I>(args: I) -> Expr
where
    I: IntoIterator,
    I::Item: Into<Term>,
{
    Expr::new("/", Notation::Infix, quotient, args)
}

pub fn sin(arg: impl Into<Term>) -> Expr {
    let arg: Term = arg.into();
    Expr::new("Sin", Notation::Prefix, sine, [arg])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms;
    use approx::assert_abs_diff_eq;
    use proptest::{prelude::*, test_runner::Config};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::{FRAC_PI_2, PI};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn xyz() -> Expr {
        plus([Variable::new("x"), Variable::new("y"), Variable::new("z")])
    }

    #[test]
    fn test_variable_binding() {
        let x = Variable::new("x");
        let bindings = Bindings::new().bind("x", 1.2);
        assert_eq!(x.eval(&bindings), Term::Constant(Dual::new(1.2, 0.0)));
        assert_eq!((-&x).eval(&bindings), Term::Constant(Dual::new(-1.2, -0.0)));
        assert_eq!(x.eval(&Bindings::new()), Term::Variable(x.clone()));
        assert!(!x.is_negated());
    }

    #[test]
    fn test_bound_dual_keeps_derivative() {
        let x = Variable::new("x");
        let bindings = Bindings::new().seed("x", 2.0);
        assert_eq!(x.eval(&bindings).constant(), Some(Dual::new(2.0, 1.0)));
        assert_eq!((-x).eval(&bindings).constant(), Some(Dual::new(-2.0, -1.0)));
    }

    #[test]
    fn test_full_evaluation() {
        init();
        let bindings: Bindings = [("x", 0.0), ("y", 1.0), ("z", 2.0)].into_iter().collect();
        assert_eq!(xyz().eval(&bindings).unwrap(), Term::Constant(Dual::new(3.0, 0.0)));
    }

    #[test]
    fn test_partial_evaluation_keeps_unbound() {
        init();
        let partial = xyz().eval(&Bindings::new().bind("x", 0.0)).unwrap();
        let Term::Expr(node) = &partial else {
            panic!("expected a partial node, got {:?}", partial);
        };
        assert_eq!(node.name(), "+");
        assert_eq!(node.args()[0], Term::Constant(Dual::constant(0.0)));
        assert_eq!(node.args()[1], Term::Variable(Variable::new("y")));
        assert_eq!(partial.free_variables(), vec!["y", "z"]);

        let rest = Bindings::new().bind("y", 1.0).bind("z", 2.0);
        assert_eq!(partial.eval(&rest).unwrap().constant(), Some(Dual::new(3.0, 0.0)));
    }

    #[test]
    fn test_partial_evaluation_preserves_sign() {
        let partial = (-xyz()).eval(&Bindings::new().bind("x", 1.0)).unwrap();
        let Term::Expr(node) = &partial else {
            panic!("expected a partial node, got {:?}", partial);
        };
        assert!(node.is_negated());
        let rest = Bindings::new().bind("y", 2.0).bind("z", 3.0);
        assert_eq!(partial.eval(&rest).unwrap().constant(), Some(Dual::new(-6.0, -0.0)));
    }

    #[test]
    fn test_negation_does_not_mutate() {
        let expr = xyz();
        let negated = expr.negate();
        assert!(!expr.is_negated());
        assert!(negated.is_negated());
        assert_eq!(negated.negate(), expr);
    }

    #[test]
    fn test_elementary_functions() {
        let none = Bindings::new();
        let eval = |expr: Expr| expr.eval(&none).unwrap().constant().unwrap();

        assert_eq!(eval(minus([5.0, 2.0, 1.0])), Dual::constant(2.0));
        assert_eq!(eval(minus(Vec::<f64>::new())), Dual::zero());
        assert_eq!(eval(multiply([2.0, 3.0, 4.0])), Dual::constant(24.0));
        assert_eq!(eval(multiply(Vec::<f64>::new())), Dual::one());
        assert_eq!(eval(plus(Vec::<f64>::new())), Dual::zero());
        assert_abs_diff_eq!(eval(divide([1.0, 2.0, 3.0])).real, 1.0 / 6.0, epsilon = 1e-15);
        assert_eq!(eval(divide([7.0])), Dual::constant(7.0));
    }

    #[test]
    fn test_divide_without_arguments() {
        let err = divide(Vec::<Term>::new()).eval(&Bindings::new()).unwrap_err();
        assert!(matches!(err, AutodiffError::InvalidArity { found: 0, .. }));
    }

    #[test]
    fn test_arity_checked_only_on_full_evaluation() {
        let custom = Expr::new("Sin", Notation::Prefix, sine, [Variable::new("a"), Variable::new("b")]);
        let partial = custom.eval(&Bindings::new().bind("a", 1.0)).unwrap();
        assert!(!partial.is_constant());
        let err = partial.eval(&Bindings::new().bind("b", 1.0)).unwrap_err();
        assert!(matches!(err, AutodiffError::InvalidArity { found: 2, .. }));
    }

    #[test]
    fn test_division_errors_propagate() {
        let expr = divide(terms![Variable::new("x"), Variable::new("y")]);
        let err = expr
            .eval(&Bindings::new().bind("x", 1.0).bind("y", 0.0))
            .unwrap_err();
        assert!(matches!(err, AutodiffError::DivisionUndefined { .. }));
        let err = expr
            .eval(&Bindings::new().bind("x", 0.0).bind("y", 0.0))
            .unwrap_err();
        assert!(matches!(err, AutodiffError::DivisionIndeterminate { .. }));
    }

    #[test]
    fn test_sin_derivative() {
        let expr = sin(Variable::new("x"));
        for (x, value, slope) in [(0.0, 0.0, 1.0), (FRAC_PI_2, 1.0, 0.0), (PI, 0.0, -1.0)] {
            let (v, d) = expr.derivative("x", x, &Bindings::new()).unwrap();
            assert_abs_diff_eq!(v, value, epsilon = 1e-6);
            assert_abs_diff_eq!(d, slope, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_plus_sin_at_pi() {
        let expr = plus(terms![sin(Variable::new("x")), -1.0]);
        let value = expr.eval(&Bindings::new().bind("x", PI)).unwrap().constant().unwrap();
        assert_abs_diff_eq!(value.real, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_derivative_of_product_and_quotient() {
        // d/dx (x * y) / x = 0, value y
        let x = Variable::new("x");
        let y = Variable::new("y");
        let expr = divide(terms![multiply([x.clone(), y]), x]);
        let (value, slope) = expr
            .derivative("x", 3.0, &Bindings::new().bind("y", 4.0))
            .unwrap();
        assert_abs_diff_eq!(value, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(slope, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_derivative_reports_unbound() {
        let err = xyz().derivative("x", 1.0, &Bindings::new()).unwrap_err();
        assert_eq!(
            err,
            AutodiffError::Unbound {
                variables: vec!["y".to_string(), "z".to_string()]
            }
        );
    }

    #[test]
    fn test_currying_random_splits() {
        init();
        let names = ["a", "b", "c", "d"];
        let expr = plus(terms![
            multiply([Variable::new("a"), Variable::new("b")]),
            -sin(minus([Variable::new("c"), Variable::new("d")])),
            divide(terms![Variable::new("d"), 2.0]),
        ]);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let values: Vec<f64> = names.iter().map(|_| rng.gen_range(-3.0..3.0)).collect();
            let all: Bindings = names.iter().copied().zip(values.iter().copied()).collect();
            let (first, second): (Vec<_>, Vec<_>) = names
                .iter()
                .copied()
                .zip(values.iter().copied())
                .partition(|_| rng.gen_bool(0.5));
            let first: Bindings = first.into_iter().collect();
            let second: Bindings = second.into_iter().collect();

            let staged = expr.eval(&first).unwrap().eval(&second).unwrap();
            let direct = expr.eval(&all).unwrap();
            assert_eq!(staged, direct);
        }
    }

    proptest! {
        #![proptest_config(Config {
            cases: 256,
            ..Config::default()
        })]

        #[test]
        fn test_negation_involution(x in -10.0..10.0f64, y in -10.0..10.0f64) {
            let expr = multiply(terms![minus([Variable::new("x"), Variable::new("y")]), sin(Variable::new("x"))]);
            let bindings = Bindings::new().seed("x", x).bind("y", y);
            prop_assert_eq!(
                expr.negate().negate().eval(&bindings).unwrap(),
                expr.eval(&bindings).unwrap()
            );
            let twice = -(-Variable::new("x"));
            prop_assert_eq!(twice.eval(&bindings), Variable::new("x").eval(&bindings));
        }

        #[test]
        fn test_negated_node_scales_result(x in -10.0..10.0f64) {
            let expr = multiply(terms![Variable::new("x"), 3.0]);
            let bindings = Bindings::new().seed("x", x);
            let value = expr.eval(&bindings).unwrap().constant().unwrap();
            let negated = (-expr).eval(&bindings).unwrap().constant().unwrap();
            prop_assert_eq!(negated, -value);
        }
    }
}
