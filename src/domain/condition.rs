//! Condition expressions: leaf predicates, set combinators and sentinels.
//!
//! Every [`Expr`] is interned by a [`Registry`], so two structurally equal
//! expressions built through the same registry are the same object. Equality
//! and hashing are identity based; ordering is structural and is what the
//! registry uses to put set members into canonical order.
//!
//! # Evaluation Semantics
//!
//! - `Status`: compares the current row only
//! - `Action`: compares the previous row with `prev_op` and the current row
//!   with `curr_op`; row 0 has no previous row and is always false
//! - Missing values (`NaN`) fail every comparison
//! - `All` / `Any` / `Not`: row-wise AND / OR / NOT of their members

use crate::domain::error::{ConditionError, EvalError};
use crate::domain::interval::{Closed, Interval};
use crate::domain::registry::{Registry, Tables};
use crate::domain::series::Series;
use crate::domain::table::{Table, shift};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }

    /// Compare `x` against a scalar or interval level. Missing values never hold.
    pub fn holds(self, x: f64, level: LevelPoint<'_>) -> bool {
        match level {
            LevelPoint::Scalar(y) => {
                if x.is_nan() || y.is_nan() {
                    return false;
                }
                match self {
                    Comparison::Lt => x < y,
                    Comparison::Le => x <= y,
                    Comparison::Gt => x > y,
                    Comparison::Ge => x >= y,
                    Comparison::Eq => x == y,
                    Comparison::Ne => x != y,
                }
            }
            LevelPoint::Interval(interval) => {
                if x.is_nan() {
                    return false;
                }
                match self {
                    Comparison::Lt => interval.is_below(x),
                    Comparison::Le => !interval.is_above(x),
                    Comparison::Gt => interval.is_above(x),
                    Comparison::Ge => !interval.is_below(x),
                    Comparison::Eq => interval.contains(x),
                    Comparison::Ne => !interval.contains(x),
                }
            }
        }
    }
}

impl FromStr for Comparison {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lt" | "<" => Ok(Comparison::Lt),
            "le" | "<=" => Ok(Comparison::Le),
            "gt" | ">" => Ok(Comparison::Gt),
            "ge" | ">=" => Ok(Comparison::Ge),
            "eq" | "==" => Ok(Comparison::Eq),
            "ne" | "!=" => Ok(Comparison::Ne),
            _ => Err(ConditionError::UnknownComparison { token: s.into() }),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    CrossUp,
    TouchUp,
    CrossDown,
    TouchDown,
}

impl Direction {
    /// `(prev_op, curr_op)` applied to the previous and the current row.
    pub fn operators(self) -> (Comparison, Comparison) {
        match self {
            Direction::CrossUp => (Comparison::Le, Comparison::Gt),
            Direction::TouchUp => (Comparison::Lt, Comparison::Ge),
            Direction::CrossDown => (Comparison::Ge, Comparison::Lt),
            Direction::TouchDown => (Comparison::Gt, Comparison::Le),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::CrossUp => "cross_up",
            Direction::TouchUp => "touch_up",
            Direction::CrossDown => "cross_down",
            Direction::TouchDown => "touch_down",
        }
    }
}

impl FromStr for Direction {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cross_up" | "cross up" | "sc" => Ok(Direction::CrossUp),
            "touch_up" | "touch up" | "sp" => Ok(Direction::TouchUp),
            "cross_down" | "cross down" | "xc" => Ok(Direction::CrossDown),
            "touch_down" | "touch down" | "xp" => Ok(Direction::TouchDown),
            _ => Err(ConditionError::UnknownDirection { token: s.into() }),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a predicate compares its operand against.
#[derive(Debug, Clone, PartialEq)]
pub enum Level {
    Constant(f64),
    Interval(Interval),
    Column(String),
    Aggregate(Series),
}

impl From<f64> for Level {
    fn from(v: f64) -> Self {
        Level::Constant(v)
    }
}

impl From<Interval> for Level {
    fn from(i: Interval) -> Self {
        Level::Interval(i)
    }
}

impl From<&str> for Level {
    fn from(name: &str) -> Self {
        Level::Column(name.to_string())
    }
}

impl From<Series> for Level {
    fn from(s: Series) -> Self {
        Level::Aggregate(s)
    }
}

impl From<&Series> for Level {
    fn from(s: &Series) -> Self {
        Level::Aggregate(s.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LevelKey {
    Constant(u64),
    Interval(u64, u64, Closed),
    Column(String),
    Aggregate(u64),
}

impl Level {
    /// Reject non-finite constants and collapse plain columns to `Level::Column`.
    pub(crate) fn canonical(self) -> Result<Level, ConditionError> {
        match self {
            Level::Constant(v) if !v.is_finite() => Err(ConditionError::NonNumericLevel { value: v }),
            Level::Constant(v) => Ok(Level::Constant(v + 0.0)),
            Level::Aggregate(series) => match series.as_column() {
                Some((name, 0)) => Ok(Level::Column(name.to_string())),
                _ => Ok(Level::Aggregate(series)),
            },
            other => Ok(other),
        }
    }

    pub(crate) fn key(&self) -> LevelKey {
        match self {
            Level::Constant(v) => LevelKey::Constant(v.to_bits()),
            Level::Interval(i) => {
                let (l, r, c) = i.key();
                LevelKey::Interval(l, r, c)
            }
            Level::Column(name) => LevelKey::Column(name.clone()),
            Level::Aggregate(s) => LevelKey::Aggregate(s.id()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Level::Constant(_) => 0,
            Level::Interval(_) => 1,
            Level::Column(_) => 2,
            Level::Aggregate(_) => 3,
        }
    }

    pub(crate) fn total_cmp(&self, other: &Level) -> Ordering {
        match (self, other) {
            (Level::Constant(a), Level::Constant(b)) => a.total_cmp(b),
            (Level::Interval(a), Level::Interval(b)) => a.total_cmp(b),
            (Level::Column(a), Level::Column(b)) => a.cmp(b),
            (Level::Aggregate(a), Level::Aggregate(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn resolve(&self, table: &Table) -> Result<ResolvedLevel, EvalError> {
        match self {
            Level::Constant(v) => Ok(ResolvedLevel::Scalar(*v)),
            Level::Interval(i) => Ok(ResolvedLevel::Interval(*i)),
            Level::Column(name) => Ok(ResolvedLevel::Rows(table.numeric(name)?)),
            Level::Aggregate(series) => Ok(ResolvedLevel::Rows(series.evaluate(table)?)),
        }
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Level::Column(name) => {
                out.insert(name.clone());
            }
            Level::Aggregate(series) => series.collect_columns(out),
            Level::Constant(_) | Level::Interval(_) => {}
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Constant(v) => write!(f, "{}", v),
            Level::Interval(i) => write!(f, "{}", i),
            Level::Column(name) => f.write_str(name),
            Level::Aggregate(series) => write!(f, "{}", series),
        }
    }
}

/// A level value at a single row.
#[derive(Debug, Clone, Copy)]
pub enum LevelPoint<'a> {
    Scalar(f64),
    Interval(&'a Interval),
}

enum ResolvedLevel {
    Scalar(f64),
    Interval(Interval),
    Rows(Vec<f64>),
}

impl ResolvedLevel {
    fn at(&self, row: usize) -> LevelPoint<'_> {
        match self {
            ResolvedLevel::Scalar(v) => LevelPoint::Scalar(*v),
            ResolvedLevel::Interval(i) => LevelPoint::Interval(i),
            ResolvedLevel::Rows(values) => LevelPoint::Scalar(values[row]),
        }
    }

    /// The level as seen from the following row.
    fn previous(&self) -> ResolvedLevel {
        match self {
            ResolvedLevel::Scalar(v) => ResolvedLevel::Scalar(*v),
            ResolvedLevel::Interval(i) => ResolvedLevel::Interval(*i),
            ResolvedLevel::Rows(values) => ResolvedLevel::Rows(shift(values, 1)),
        }
    }
}

/// Current-row comparison of an operand against a level.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub operand: Series,
    pub comparison: Comparison,
    pub level: Level,
}

impl Status {
    fn evaluate(&self, table: &Table) -> Result<Vec<bool>, EvalError> {
        let target = self.operand.evaluate(table)?;
        let level = self.level.resolve(table)?;
        Ok(target
            .iter()
            .enumerate()
            .map(|(i, &x)| self.comparison.holds(x, level.at(i)))
            .collect())
    }
}

/// Two-row transition of an operand across a level.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub operand: Series,
    pub direction: Direction,
    pub level: Level,
}

impl Action {
    fn evaluate(&self, table: &Table) -> Result<Vec<bool>, EvalError> {
        let (prev_op, curr_op) = self.direction.operators();
        let target = self.operand.evaluate(table)?;
        let previous = shift(&target, 1);
        let level = self.level.resolve(table)?;
        let level_prev = level.previous();
        Ok((0..target.len())
            .map(|i| {
                curr_op.holds(target[i], level.at(i))
                    && prev_op.holds(previous[i], level_prev.at(i))
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Always true; the identity of `All`.
    AnyTime,
    /// Always false; the identity of `Any`.
    NoTime,
    Status(Status),
    Action(Action),
    /// A boolean column read directly.
    Flag(String),
    All(Vec<Expr>),
    Any(Vec<Expr>),
    Not(Expr),
}

impl ExprKind {
    fn rank(&self) -> u8 {
        match self {
            ExprKind::AnyTime => 0,
            ExprKind::NoTime => 1,
            ExprKind::Flag(_) => 2,
            ExprKind::Status(_) => 3,
            ExprKind::Action(_) => 4,
            ExprKind::Not(_) => 5,
            ExprKind::All(_) => 6,
            ExprKind::Any(_) => 7,
        }
    }
}

pub(crate) struct ExprNode {
    id: u64,
    kind: ExprKind,
    origin: Weak<Tables>,
}

/// Handle to an interned condition expression.
#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    pub(crate) fn from_parts(id: u64, kind: ExprKind, origin: Weak<Tables>) -> Self {
        Expr(Arc::new(ExprNode { id, kind, origin }))
    }

    pub(crate) fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn is_any_time(&self) -> bool {
        matches!(self.kind(), ExprKind::AnyTime)
    }

    pub fn is_no_time(&self) -> bool {
        matches!(self.kind(), ExprKind::NoTime)
    }

    /// Identity comparison.
    pub fn same(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The registry that built this expression, or a fresh one if it is gone.
    pub fn registry(&self) -> Registry {
        Registry::from_weak(&self.0.origin)
    }

    /// True if `other` is exactly `Not(self)` or `self` is `Not(other)`.
    pub fn is_negation_of(&self, other: &Expr) -> bool {
        match (self.kind(), other.kind()) {
            (ExprKind::Not(inner), _) if inner == other => true,
            (_, ExprKind::Not(inner)) if inner == self => true,
            (ExprKind::AnyTime, ExprKind::NoTime) | (ExprKind::NoTime, ExprKind::AnyTime) => true,
            _ => false,
        }
    }

    /// Row-aligned boolean sequence for `table`.
    pub fn evaluate(&self, table: &Table) -> Result<Vec<bool>, EvalError> {
        let rows = table.len();
        match self.kind() {
            ExprKind::AnyTime => Ok(vec![true; rows]),
            ExprKind::NoTime => Ok(vec![false; rows]),
            ExprKind::Flag(name) => Ok(table
                .numeric(name)?
                .into_iter()
                .map(|v| !v.is_nan() && v != 0.0)
                .collect()),
            ExprKind::Status(status) => status.evaluate(table),
            ExprKind::Action(action) => action.evaluate(table),
            ExprKind::All(members) => {
                let mut acc = vec![true; rows];
                for member in members {
                    for (a, b) in acc.iter_mut().zip(member.evaluate(table)?) {
                        *a &= b;
                    }
                }
                Ok(acc)
            }
            ExprKind::Any(members) => {
                let mut acc = vec![false; rows];
                for member in members {
                    for (a, b) in acc.iter_mut().zip(member.evaluate(table)?) {
                        *a |= b;
                    }
                }
                Ok(acc)
            }
            ExprKind::Not(inner) => Ok(inner.evaluate(table)?.into_iter().map(|b| !b).collect()),
        }
    }

    /// Every column this expression reads, sorted.
    pub fn columns(&self) -> Vec<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out.into_iter().collect()
    }

    pub(crate) fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            ExprKind::AnyTime | ExprKind::NoTime => {}
            ExprKind::Flag(name) => {
                out.insert(name.clone());
            }
            ExprKind::Status(Status { operand, level, .. })
            | ExprKind::Action(Action { operand, level, .. }) => {
                operand.collect_columns(out);
                level.collect_columns(out);
            }
            ExprKind::All(members) | ExprKind::Any(members) => {
                for m in members {
                    m.collect_columns(out);
                }
            }
            ExprKind::Not(inner) => inner.collect_columns(out),
        }
    }

    fn structural_cmp(&self, other: &Expr) -> Ordering {
        match (self.kind(), other.kind()) {
            (ExprKind::Flag(a), ExprKind::Flag(b)) => a.cmp(b),
            (ExprKind::Status(a), ExprKind::Status(b)) => a
                .operand
                .cmp(&b.operand)
                .then(a.comparison.cmp(&b.comparison))
                .then_with(|| a.level.total_cmp(&b.level)),
            (ExprKind::Action(a), ExprKind::Action(b)) => a
                .operand
                .cmp(&b.operand)
                .then(a.direction.cmp(&b.direction))
                .then_with(|| a.level.total_cmp(&b.level)),
            (ExprKind::All(a), ExprKind::All(b)) | (ExprKind::Any(a), ExprKind::Any(b)) => a.cmp(b),
            (ExprKind::Not(a), ExprKind::Not(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.same(other) {
            return Ordering::Equal;
        }
        self.structural_cmp(other)
            .then_with(|| self.id().cmp(&other.id()))
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::AnyTime => f.write_str("ANYTIME"),
            ExprKind::NoTime => f.write_str("NOTIME"),
            ExprKind::Flag(name) => write!(f, "FLAG({})", name),
            ExprKind::Status(s) => write!(f, "{} {} {}", s.operand, s.comparison, s.level),
            ExprKind::Action(a) => write!(f, "{} {} {}", a.operand, a.direction, a.level),
            ExprKind::All(members) => write_joined(f, members, " & "),
            ExprKind::Any(members) => write_joined(f, members, " | "),
            ExprKind::Not(inner) => match inner.kind() {
                ExprKind::All(_) | ExprKind::Any(_) => write!(f, "~{}", inner),
                _ => write!(f, "~({})", inner),
            },
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, members: &[Expr], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, m) in members.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", m)?;
    }
    f.write_str(")")
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expr").field(&format_args!("{}", self)).finish()
    }
}

impl std::ops::BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.registry().and_of([self, rhs])
    }
}

impl std::ops::BitAnd for &Expr {
    type Output = Expr;

    fn bitand(self, rhs: &Expr) -> Expr {
        self.registry().and_of([self.clone(), rhs.clone()])
    }
}

impl std::ops::BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.registry().or_of([self, rhs])
    }
}

impl std::ops::BitOr for &Expr {
    type Output = Expr;

    fn bitor(self, rhs: &Expr) -> Expr {
        self.registry().or_of([self.clone(), rhs.clone()])
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.registry().negate(&self)
    }
}

impl std::ops::Not for &Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.registry().negate(self)
    }
}
