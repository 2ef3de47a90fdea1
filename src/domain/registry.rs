//! Interning registry for expressions.
//!
//! A `Registry` hands out one shared instance per structurally distinct
//! expression. Each expression kind has its own table behind its own lock;
//! keys are built from the ids of already-interned children, so a lookup
//! never recurses while a lock is held.
//!
//! Registries are cheap to clone (shared handle). Expressions remember the
//! registry that built them so operator sugar (`&`, `|`, `!`, `+`, `-`) keeps
//! interning into the same tables.

use crate::domain::condition::{
    Action, Comparison, Direction, Expr, ExprKind, Level, LevelKey, Status,
};
use crate::domain::error::ConditionError;
use crate::domain::series::{ArithOp, Series, SeriesKind, Term, TermKey};
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct Interner<K, V> {
    name: &'static str,
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> Interner<K, V> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the entry for `key`, building it first if absent. The flag is
    /// true when the entry was built by this call.
    pub(crate) fn intern(&self, key: K, build: impl FnOnce() -> V) -> (V, bool) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(&key) {
            return (existing.clone(), false);
        }
        let value = build();
        entries.insert(key, value.clone());
        (value, true)
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PredicateKey {
    Status(u64, Comparison, LevelKey),
    Action(u64, Direction, LevelKey),
    Flag(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CombinatorKey {
    AnyTime,
    NoTime,
    All(Vec<u64>),
    Any(Vec<u64>),
    Not(u64),
}

pub(crate) struct Tables {
    indicators: Interner<(String, i64), Series>,
    counts: Interner<Vec<u64>, Series>,
    arithmetic: Interner<(ArithOp, u64, TermKey), Series>,
    predicates: Interner<PredicateKey, Expr>,
    pub(crate) combinators: Interner<CombinatorKey, Expr>,
}

impl Tables {
    fn new() -> Self {
        Self {
            indicators: Interner::new("indicator"),
            counts: Interner::new("count"),
            arithmetic: Interner::new("arithmetic"),
            predicates: Interner::new("predicate"),
            combinators: Interner::new("combinator"),
        }
    }
}

/// Sizes of each interning table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub indicators: usize,
    pub counts: usize,
    pub arithmetic: usize,
    pub predicates: usize,
    pub combinators: usize,
}

#[derive(Clone)]
pub struct Registry {
    tables: Arc<Tables>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("stats", &self.stats())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Tables::new()),
        }
    }

    pub(crate) fn from_weak(origin: &Weak<Tables>) -> Self {
        match origin.upgrade() {
            Some(tables) => Self { tables },
            None => Self::new(),
        }
    }

    pub(crate) fn tables(&self) -> &Tables {
        &self.tables
    }

    /// True if both handles share the same tables.
    pub fn same(&self, other: &Registry) -> bool {
        Arc::ptr_eq(&self.tables, &other.tables)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            indicators: self.tables.indicators.len(),
            counts: self.tables.counts.len(),
            arithmetic: self.tables.arithmetic.len(),
            predicates: self.tables.predicates.len(),
            combinators: self.tables.combinators.len(),
        }
    }

    fn origin(&self) -> Weak<Tables> {
        Arc::downgrade(&self.tables)
    }

    fn intern_series<K: Eq + Hash>(
        &self,
        table: &Interner<K, Series>,
        key: K,
        kind: SeriesKind,
    ) -> Series {
        let (series, created) =
            table.intern(key, || Series::from_parts(next_id(), kind, self.origin()));
        if created {
            debug!("interned {} #{}: {}", table.name, series.id(), series);
        } else {
            trace!("{} cache hit #{}", table.name, series.id());
        }
        series
    }

    pub(crate) fn intern_expr<K: Eq + Hash>(
        &self,
        table: &Interner<K, Expr>,
        key: K,
        kind: ExprKind,
    ) -> Expr {
        let (expr, created) = table.intern(key, || Expr::from_parts(next_id(), kind, self.origin()));
        if created {
            debug!("interned {} #{}: {}", table.name, expr.id(), expr);
        } else {
            trace!("{} cache hit #{}", table.name, expr.id());
        }
        expr
    }

    /// Column `name` on the current row.
    pub fn indicator(&self, name: &str) -> Series {
        self.lagged(name, 0)
    }

    /// Column `name` read `lag` rows back; a negative lag reads ahead.
    pub fn lagged(&self, name: &str, lag: i64) -> Series {
        self.intern_series(
            &self.tables.indicators,
            (name.to_string(), lag),
            SeriesKind::Column {
                name: name.to_string(),
                lag,
            },
        )
    }

    /// Number of `members` true on each row. Members are deduplicated and
    /// put into canonical order.
    pub fn count<I>(&self, members: I) -> Result<Series, ConditionError>
    where
        I: IntoIterator<Item = Expr>,
    {
        let mut members: Vec<Expr> = members.into_iter().collect();
        if members.is_empty() {
            return Err(ConditionError::EmptyCount);
        }
        members.sort();
        members.dedup();
        let key = members.iter().map(Expr::id).collect();
        Ok(self.intern_series(&self.tables.counts, key, SeriesKind::Count(members)))
    }

    pub fn arithmetic(&self, op: ArithOp, left: &Series, right: impl Into<Term>) -> Series {
        let right = match right.into() {
            Term::Constant(v) => Term::Constant(v + 0.0),
            other => other,
        };
        let key = (op, left.id(), right.key());
        self.intern_series(
            &self.tables.arithmetic,
            key,
            SeriesKind::Arithmetic {
                op,
                left: left.clone(),
                right,
            },
        )
    }

    pub fn status(
        &self,
        operand: &Series,
        comparison: Comparison,
        level: impl Into<Level>,
    ) -> Result<Expr, ConditionError> {
        let level = level.into().canonical()?;
        let key = PredicateKey::Status(operand.id(), comparison, level.key());
        Ok(self.intern_expr(
            &self.tables.predicates,
            key,
            ExprKind::Status(Status {
                operand: operand.clone(),
                comparison,
                level,
            }),
        ))
    }

    pub fn action(
        &self,
        operand: &Series,
        direction: Direction,
        level: impl Into<Level>,
    ) -> Result<Expr, ConditionError> {
        let level = level.into().canonical()?;
        let key = PredicateKey::Action(operand.id(), direction, level.key());
        Ok(self.intern_expr(
            &self.tables.predicates,
            key,
            ExprKind::Action(Action {
                operand: operand.clone(),
                direction,
                level,
            }),
        ))
    }

    /// A boolean column used directly as a condition.
    pub fn flag(&self, name: &str) -> Expr {
        self.intern_expr(
            &self.tables.predicates,
            PredicateKey::Flag(name.to_string()),
            ExprKind::Flag(name.to_string()),
        )
    }

    pub fn any_time(&self) -> Expr {
        self.intern_expr(&self.tables.combinators, CombinatorKey::AnyTime, ExprKind::AnyTime)
    }

    pub fn no_time(&self) -> Expr {
        self.intern_expr(&self.tables.combinators, CombinatorKey::NoTime, ExprKind::NoTime)
    }
}
