//! Boolean expression trees over arbitrary terms.
//!
//! Network functions use multi-valued literals as terms, formulas use
//! indexed variable copies. Both are lowered to the manager with
//! [`Expr::to_bdd`], given a lowering for the terms.

use crate::bdd::Bdd;
use crate::reference::Ref;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Expr<T> {
    Const(bool),
    Term(T),
    Not(Box<Expr<T>>),
    And(Box<Expr<T>>, Box<Expr<T>>),
    Or(Box<Expr<T>>, Box<Expr<T>>),
    Xor(Box<Expr<T>>, Box<Expr<T>>),
    Ite(Box<Expr<T>>, Box<Expr<T>>, Box<Expr<T>>),
}

impl<T> Expr<T> {
    pub fn term(value: T) -> Self {
        Expr::Term(value)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(value: Self) -> Self {
        match value {
            Expr::Const(b) => Expr::Const(!b),
            Expr::Not(inner) => *inner,
            _ => Expr::Not(Box::new(value)),
        }
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        Expr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        Expr::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn xor(lhs: Self, rhs: Self) -> Self {
        Expr::Xor(Box::new(lhs), Box::new(rhs))
    }

    pub fn ite(cond: Self, then: Self, else_: Self) -> Self {
        Expr::Ite(Box::new(cond), Box::new(then), Box::new(else_))
    }

    /// Conjunction of all items; `true` for none.
    pub fn all(items: impl IntoIterator<Item = Self>) -> Self {
        items
            .into_iter()
            .reduce(Expr::and)
            .unwrap_or(Expr::Const(true))
    }

    /// Disjunction of all items; `false` for none.
    pub fn any(items: impl IntoIterator<Item = Self>) -> Self {
        items
            .into_iter()
            .reduce(Expr::or)
            .unwrap_or(Expr::Const(false))
    }

    /// Visit every term, left to right.
    pub fn for_each_term<'a>(&'a self, f: &mut impl FnMut(&'a T)) {
        match self {
            Expr::Const(_) => {}
            Expr::Term(t) => f(t),
            Expr::Not(a) => a.for_each_term(f),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Xor(a, b) => {
                a.for_each_term(f);
                b.for_each_term(f);
            }
            Expr::Ite(a, b, c) => {
                a.for_each_term(f);
                b.for_each_term(f);
                c.for_each_term(f);
            }
        }
    }

    /// Map every term, keeping the shape.
    pub fn map<U>(&self, f: &mut impl FnMut(&T) -> U) -> Expr<U> {
        match self {
            Expr::Const(b) => Expr::Const(*b),
            Expr::Term(t) => Expr::Term(f(t)),
            Expr::Not(a) => Expr::Not(Box::new(a.map(f))),
            Expr::And(a, b) => Expr::and(a.map(f), b.map(f)),
            Expr::Or(a, b) => Expr::or(a.map(f), b.map(f)),
            Expr::Xor(a, b) => Expr::xor(a.map(f), b.map(f)),
            Expr::Ite(a, b, c) => Expr::ite(a.map(f), b.map(f), c.map(f)),
        }
    }

    /// Lower the expression into the manager.
    ///
    /// The term lowering may fail (unknown signal, bad index); the first
    /// failure aborts the whole lowering.
    pub fn to_bdd<E>(&self, bdd: &Bdd, leaf: &mut impl FnMut(&T) -> Result<Ref, E>) -> Result<Ref, E> {
        Ok(match self {
            Expr::Const(true) => bdd.one(),
            Expr::Const(false) => bdd.zero(),
            Expr::Term(t) => leaf(t)?,
            Expr::Not(a) => -a.to_bdd(bdd, leaf)?,
            Expr::And(a, b) => {
                let a = a.to_bdd(bdd, leaf)?;
                let b = b.to_bdd(bdd, leaf)?;
                bdd.apply_and(a, b)
            }
            Expr::Or(a, b) => {
                let a = a.to_bdd(bdd, leaf)?;
                let b = b.to_bdd(bdd, leaf)?;
                bdd.apply_or(a, b)
            }
            Expr::Xor(a, b) => {
                let a = a.to_bdd(bdd, leaf)?;
                let b = b.to_bdd(bdd, leaf)?;
                bdd.apply_xor(a, b)
            }
            Expr::Ite(a, b, c) => {
                let a = a.to_bdd(bdd, leaf)?;
                let b = b.to_bdd(bdd, leaf)?;
                let c = c.to_bdd(bdd, leaf)?;
                bdd.apply_ite(a, b, c)
            }
        })
    }
}

impl<T> From<bool> for Expr<T> {
    fn from(value: bool) -> Self {
        Expr::Const(value)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use test_log::test;

    use super::*;
    use crate::types::Var;

    #[test]
    fn test_double_negation_collapses() {
        let e = Expr::not(Expr::not(Expr::term(1)));
        assert_eq!(e, Expr::term(1));
        assert_eq!(Expr::<u32>::not(Expr::Const(true)), Expr::Const(false));
    }

    #[test]
    fn test_lowering() {
        let bdd = Bdd::default();
        let vars: Vec<Var> = (0..3).map(|_| bdd.allocate_variable()).collect();

        // ite(x0, x1 ^ x2, !x1)
        let e = Expr::ite(
            Expr::term(0usize),
            Expr::xor(Expr::term(1), Expr::term(2)),
            Expr::not(Expr::term(1)),
        );
        let f = e
            .to_bdd::<Infallible>(&bdd, &mut |&i| Ok(bdd.mk_var(vars[i])))
            .unwrap();

        let x0 = bdd.mk_var(vars[0]);
        let x1 = bdd.mk_var(vars[1]);
        let x2 = bdd.mk_var(vars[2]);
        assert_eq!(f, bdd.apply_ite(x0, bdd.apply_xor(x1, x2), -x1));
    }

    #[test]
    fn test_terms_and_map() {
        let e = Expr::all([Expr::term("a"), Expr::or(Expr::term("b"), Expr::term("a"))]);
        let mut seen = Vec::new();
        e.for_each_term(&mut |t| seen.push(*t));
        assert_eq!(seen, vec!["a", "b", "a"]);

        let lengths = e.map(&mut |t| t.len());
        let mut total = 0;
        lengths.for_each_term(&mut |n| total += n);
        assert_eq!(total, 3);

        assert_eq!(Expr::<u8>::any([]), Expr::Const(false));
    }
}
