//! Numeric series expressions: lagged columns, counts and their arithmetic.
//!
//! A [`Series`] evaluates to one `f64` per row. `Count` yields whole numbers:
//! the number of member conditions true on each row.

use crate::domain::condition::{Comparison, Direction, Expr, Level};
use crate::domain::error::{ConditionError, EvalError};
use crate::domain::registry::{Registry, Tables};
use crate::domain::table::{Table, shift};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArithOp {
    Add,
    Sub,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
        }
    }
}

/// Right-hand side of an arithmetic node.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Series(Series),
    Constant(f64),
}

impl From<f64> for Term {
    fn from(v: f64) -> Self {
        Term::Constant(v)
    }
}

impl From<Series> for Term {
    fn from(s: Series) -> Self {
        Term::Series(s)
    }
}

impl From<&Series> for Term {
    fn from(s: &Series) -> Self {
        Term::Series(s.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TermKey {
    Series(u64),
    Constant(u64),
}

impl Term {
    pub(crate) fn key(&self) -> TermKey {
        match self {
            Term::Series(s) => TermKey::Series(s.id()),
            Term::Constant(v) => TermKey::Constant(v.to_bits()),
        }
    }

    fn total_cmp(&self, other: &Term) -> Ordering {
        match (self, other) {
            (Term::Constant(a), Term::Constant(b)) => a.total_cmp(b),
            (Term::Series(a), Term::Series(b)) => a.cmp(b),
            (Term::Constant(_), Term::Series(_)) => Ordering::Less,
            (Term::Series(_), Term::Constant(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(v) => write!(f, "{}", v),
            Term::Series(s) if matches!(s.kind(), SeriesKind::Arithmetic { .. }) => {
                write!(f, "({})", s)
            }
            Term::Series(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SeriesKind {
    /// A table column read `lag` rows back (forward when negative).
    Column { name: String, lag: i64 },
    /// Number of member conditions holding on each row.
    Count(Vec<Expr>),
    Arithmetic {
        op: ArithOp,
        left: Series,
        right: Term,
    },
}

impl SeriesKind {
    fn rank(&self) -> u8 {
        match self {
            SeriesKind::Column { .. } => 0,
            SeriesKind::Count(_) => 1,
            SeriesKind::Arithmetic { .. } => 2,
        }
    }
}

pub(crate) struct SeriesNode {
    id: u64,
    kind: SeriesKind,
    origin: Weak<Tables>,
}

/// Handle to an interned numeric series.
#[derive(Clone)]
pub struct Series(Arc<SeriesNode>);

impl Series {
    pub(crate) fn from_parts(id: u64, kind: SeriesKind, origin: Weak<Tables>) -> Self {
        Series(Arc::new(SeriesNode { id, kind, origin }))
    }

    pub(crate) fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> &SeriesKind {
        &self.0.kind
    }

    pub fn same(&self, other: &Series) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn registry(&self) -> Registry {
        Registry::from_weak(&self.0.origin)
    }

    /// `(name, lag)` when this series is a plain column read.
    pub fn as_column(&self) -> Option<(&str, i64)> {
        match self.kind() {
            SeriesKind::Column { name, lag } => Some((name.as_str(), *lag)),
            _ => None,
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(self.kind(), SeriesKind::Count(_))
    }

    /// The same series read `n` more rows back. Counts cannot be shifted.
    pub fn shifted(&self, n: i64) -> Result<Series, ConditionError> {
        let registry = self.registry();
        match self.kind() {
            SeriesKind::Column { name, lag } => {
                let lag = lag.checked_add(n).ok_or_else(|| ConditionError::LagOverflow {
                    expr: self.to_string(),
                    rows: n,
                })?;
                Ok(registry.lagged(name, lag))
            }
            SeriesKind::Arithmetic { op, left, right } => {
                let left = left.shifted(n)?;
                let right = match right {
                    Term::Series(s) => Term::Series(s.shifted(n)?),
                    Term::Constant(v) => Term::Constant(*v),
                };
                Ok(registry.arithmetic(*op, &left, right))
            }
            SeriesKind::Count(_) => Err(ConditionError::UnsupportedShift {
                expr: self.to_string(),
            }),
        }
    }

    pub fn evaluate(&self, table: &Table) -> Result<Vec<f64>, EvalError> {
        match self.kind() {
            SeriesKind::Column { name, lag } => {
                let values = table.numeric(name)?;
                Ok(if *lag == 0 { values } else { shift(&values, *lag) })
            }
            SeriesKind::Count(members) => {
                let mut totals = vec![0.0; table.len()];
                for member in members {
                    for (total, hit) in totals.iter_mut().zip(member.evaluate(table)?) {
                        if hit {
                            *total += 1.0;
                        }
                    }
                }
                Ok(totals)
            }
            SeriesKind::Arithmetic { op, left, right } => {
                let lhs = left.evaluate(table)?;
                match right {
                    Term::Constant(c) => Ok(lhs.into_iter().map(|a| op.apply(a, *c)).collect()),
                    Term::Series(s) => {
                        let rhs = s.evaluate(table)?;
                        Ok(lhs
                            .into_iter()
                            .zip(rhs)
                            .map(|(a, b)| op.apply(a, b))
                            .collect())
                    }
                }
            }
        }
    }

    pub fn columns(&self) -> Vec<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out.into_iter().collect()
    }

    pub(crate) fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            SeriesKind::Column { name, .. } => {
                out.insert(name.clone());
            }
            SeriesKind::Count(members) => {
                for m in members {
                    m.collect_columns(out);
                }
            }
            SeriesKind::Arithmetic { left, right, .. } => {
                left.collect_columns(out);
                if let Term::Series(s) = right {
                    s.collect_columns(out);
                }
            }
        }
    }

    pub fn status(
        &self,
        comparison: Comparison,
        level: impl Into<Level>,
    ) -> Result<Expr, ConditionError> {
        self.registry().status(self, comparison, level)
    }

    pub fn action(
        &self,
        direction: Direction,
        level: impl Into<Level>,
    ) -> Result<Expr, ConditionError> {
        self.registry().action(self, direction, level)
    }

    pub fn lt(&self, level: impl Into<Level>) -> Result<Expr, ConditionError> {
        self.status(Comparison::Lt, level)
    }

    pub fn le(&self, level: impl Into<Level>) -> Result<Expr, ConditionError> {
        self.status(Comparison::Le, level)
    }

    pub fn gt(&self, level: impl Into<Level>) -> Result<Expr, ConditionError> {
        self.status(Comparison::Gt, level)
    }

    pub fn ge(&self, level: impl Into<Level>) -> Result<Expr, ConditionError> {
        self.status(Comparison::Ge, level)
    }

    pub fn equal_to(&self, level: impl Into<Level>) -> Result<Expr, ConditionError> {
        self.status(Comparison::Eq, level)
    }

    pub fn cross_up(&self, level: impl Into<Level>) -> Result<Expr, ConditionError> {
        self.action(Direction::CrossUp, level)
    }

    pub fn cross_down(&self, level: impl Into<Level>) -> Result<Expr, ConditionError> {
        self.action(Direction::CrossDown, level)
    }

    fn structural_cmp(&self, other: &Series) -> Ordering {
        match (self.kind(), other.kind()) {
            (
                SeriesKind::Column { name: a, lag: la },
                SeriesKind::Column { name: b, lag: lb },
            ) => a.cmp(b).then(la.cmp(lb)),
            (SeriesKind::Count(a), SeriesKind::Count(b)) => a.cmp(b),
            (
                SeriesKind::Arithmetic {
                    op: oa,
                    left: la,
                    right: ra,
                },
                SeriesKind::Arithmetic {
                    op: ob,
                    left: lb,
                    right: rb,
                },
            ) => oa
                .cmp(ob)
                .then_with(|| la.cmp(lb))
                .then_with(|| ra.total_cmp(rb)),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialEq for Series {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Series {}

impl Hash for Series {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Ord for Series {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.same(other) {
            return Ordering::Equal;
        }
        self.structural_cmp(other)
            .then_with(|| self.id().cmp(&other.id()))
    }
}

impl PartialOrd for Series {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            SeriesKind::Column { name, lag: 0 } => f.write_str(name),
            SeriesKind::Column { name, lag } => write!(f, "{}[{}]", name, lag),
            SeriesKind::Count(members) => {
                f.write_str("COUNT(")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                f.write_str(")")
            }
            SeriesKind::Arithmetic { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
        }
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Series").field(&format_args!("{}", self)).finish()
    }
}

impl std::ops::Add for Series {
    type Output = Series;

    fn add(self, rhs: Series) -> Series {
        self.registry().arithmetic(ArithOp::Add, &self, rhs)
    }
}

impl std::ops::Add for &Series {
    type Output = Series;

    fn add(self, rhs: &Series) -> Series {
        self.registry().arithmetic(ArithOp::Add, self, rhs)
    }
}

impl std::ops::Add<f64> for Series {
    type Output = Series;

    fn add(self, rhs: f64) -> Series {
        self.registry().arithmetic(ArithOp::Add, &self, rhs)
    }
}

impl std::ops::Sub for Series {
    type Output = Series;

    fn sub(self, rhs: Series) -> Series {
        self.registry().arithmetic(ArithOp::Sub, &self, rhs)
    }
}

impl std::ops::Sub for &Series {
    type Output = Series;

    fn sub(self, rhs: &Series) -> Series {
        self.registry().arithmetic(ArithOp::Sub, self, rhs)
    }
}

impl std::ops::Sub<f64> for Series {
    type Output = Series;

    fn sub(self, rhs: f64) -> Series {
        self.registry().arithmetic(ArithOp::Sub, &self, rhs)
    }
}
