//! Construction and simplification of `All` / `Any` / `Not`.
//!
//! Building a combinator is a pure function of its member set. The result is
//! a sentinel, a single member, or an interned combinator whose members are
//! distinct and canonically ordered. Rules, in order:
//!
//! 1. The identity sentinel is dropped (`AnyTime` in `All`, `NoTime` in
//!    `Any`); the absorbing one wins outright.
//! 2. Nested combinators of the same kind are flattened into the outer set.
//! 3. Members are deduplicated; no members left gives the identity sentinel,
//!    one member is returned unwrapped.
//! 4. A member next to its own negation collapses the set to the absorbing
//!    sentinel. This includes the negation of a flattened combinator whose
//!    members are all present.
//! 5. Nested combinators of the dual kind ("branches") are reduced against
//!    the plain members: a branch sharing a plain member is dropped
//!    (`x & (x | y) == x`), branch members negating a plain member are removed
//!    (`x & (~x | y) == x & y`), a branch left with one member is folded into
//!    the plain members, and a branch that is a superset of another branch is
//!    dropped.

use crate::domain::condition::{Expr, ExprKind};
use crate::domain::error::ConditionError;
use crate::domain::registry::{CombinatorKey, Registry};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Junction {
    All,
    Any,
}

impl Junction {
    fn dual(self) -> Junction {
        match self {
            Junction::All => Junction::Any,
            Junction::Any => Junction::All,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Junction::All => "All",
            Junction::Any => "Any",
        }
    }

    fn is_identity(self, expr: &Expr) -> bool {
        match self {
            Junction::All => expr.is_any_time(),
            Junction::Any => expr.is_no_time(),
        }
    }

    fn is_absorbing(self, expr: &Expr) -> bool {
        match self {
            Junction::All => expr.is_no_time(),
            Junction::Any => expr.is_any_time(),
        }
    }

    fn identity(self, registry: &Registry) -> Expr {
        match self {
            Junction::All => registry.any_time(),
            Junction::Any => registry.no_time(),
        }
    }

    fn absorbing(self, registry: &Registry) -> Expr {
        match self {
            Junction::All => registry.no_time(),
            Junction::Any => registry.any_time(),
        }
    }

    /// Members of `expr` if it is a combinator of this kind.
    fn members_of(self, expr: &Expr) -> Option<&[Expr]> {
        match (self, expr.kind()) {
            (Junction::All, ExprKind::All(members)) | (Junction::Any, ExprKind::Any(members)) => {
                Some(members)
            }
            _ => None,
        }
    }

    fn key(self, members: &[Expr]) -> CombinatorKey {
        let ids = members.iter().map(Expr::id).collect();
        match self {
            Junction::All => CombinatorKey::All(ids),
            Junction::Any => CombinatorKey::Any(ids),
        }
    }

    fn wrap(self, members: Vec<Expr>) -> ExprKind {
        match self {
            Junction::All => ExprKind::All(members),
            Junction::Any => ExprKind::Any(members),
        }
    }

    /// `expr` is settled the same way as the plain members: present among
    /// them, or a same-kind combinator whose members all are.
    fn settles(self, expr: &Expr, plain: &[Expr]) -> bool {
        plain.contains(expr) || self.members_of(expr).is_some_and(|ms| is_subset(ms, plain))
    }

    /// `expr` is settled opposite to the plain members.
    fn contradicts(self, expr: &Expr, plain: &[Expr]) -> bool {
        let negated_inner = match expr.kind() {
            ExprKind::Not(inner) => self.settles(inner, plain),
            _ => false,
        };
        negated_inner || plain.iter().any(|p| p.is_negation_of(expr))
    }

    fn has_complement(self, members: &[Expr]) -> bool {
        members.iter().any(|m| self.contradicts(m, members))
    }
}

fn normalize(members: &mut Vec<Expr>) {
    members.sort();
    members.dedup();
}

fn is_subset(small: &[Expr], large: &[Expr]) -> bool {
    small.iter().all(|m| large.contains(m))
}

impl Registry {
    /// Conjunction of `members`.
    pub fn and_of<I>(&self, members: I) -> Expr
    where
        I: IntoIterator<Item = Expr>,
    {
        self.combine(Junction::All, members.into_iter().collect())
    }

    /// Disjunction of `members`.
    pub fn or_of<I>(&self, members: I) -> Expr
    where
        I: IntoIterator<Item = Expr>,
    {
        self.combine(Junction::Any, members.into_iter().collect())
    }

    /// Negation of the conjunction of `members`.
    pub fn not_of<I>(&self, members: I) -> Result<Expr, ConditionError>
    where
        I: IntoIterator<Item = Expr>,
    {
        let members: Vec<Expr> = members.into_iter().collect();
        match members.as_slice() {
            [] => Err(ConditionError::EmptyNegation),
            [single] => Ok(self.negate(single)),
            _ => Ok(self.negate(&self.and_of(members))),
        }
    }

    pub fn negate(&self, expr: &Expr) -> Expr {
        match expr.kind() {
            ExprKind::AnyTime => self.no_time(),
            ExprKind::NoTime => self.any_time(),
            ExprKind::Not(inner) => inner.clone(),
            _ => self.intern_expr(
                &self.tables().combinators,
                CombinatorKey::Not(expr.id()),
                ExprKind::Not(expr.clone()),
            ),
        }
    }

    fn combine(&self, junction: Junction, members: Vec<Expr>) -> Expr {
        let dual = junction.dual();
        let mut plain: Vec<Expr> = Vec::new();
        let mut branches: Vec<Vec<Expr>> = Vec::new();

        let mut pending = members;
        while let Some(member) = pending.pop() {
            if junction.is_identity(&member) {
                continue;
            }
            if junction.is_absorbing(&member) {
                return junction.absorbing(self);
            }
            if let Some(inner) = junction.members_of(&member) {
                pending.extend(inner.iter().cloned());
            } else if let Some(inner) = dual.members_of(&member) {
                branches.push(inner.to_vec());
            } else {
                plain.push(member);
            }
        }

        loop {
            normalize(&mut plain);
            if junction.has_complement(&plain) {
                debug!("{} contains a member and its negation", junction.name());
                return junction.absorbing(self);
            }
            let mut folded = false;
            let mut kept = Vec::with_capacity(branches.len());
            for branch in branches.drain(..) {
                if branch.iter().any(|b| junction.settles(b, &plain)) {
                    continue;
                }
                let mut reduced: Vec<Expr> = branch
                    .into_iter()
                    .filter(|b| !junction.contradicts(b, &plain))
                    .collect();
                match reduced.len() {
                    0 => return junction.absorbing(self),
                    1 => {
                        let single = reduced.remove(0);
                        // A lone member of the same kind is spliced in, not nested.
                        match junction.members_of(&single) {
                            Some(inner) => {
                                for member in inner {
                                    match dual.members_of(member) {
                                        Some(nested) => kept.push(nested.to_vec()),
                                        None => plain.push(member.clone()),
                                    }
                                }
                            }
                            None => plain.push(single),
                        }
                        folded = true;
                    }
                    _ => kept.push(reduced),
                }
            }
            branches = kept;
            if !folded {
                break;
            }
        }

        for branch in branches.iter_mut() {
            normalize(branch);
        }
        branches.sort();
        branches.dedup();
        let branches: Vec<Vec<Expr>> = branches
            .iter()
            .filter(|b| {
                !branches
                    .iter()
                    .any(|other| other.len() < b.len() && is_subset(other, b))
            })
            .cloned()
            .collect();

        let mut settled = true;
        let mut rebuilt = Vec::with_capacity(branches.len());
        for branch in branches {
            let expr = self.combine(dual, branch.clone());
            // A branch that simplified further may now interact with `plain`.
            settled &= dual.members_of(&expr) == Some(branch.as_slice());
            rebuilt.push(expr);
        }
        if !settled {
            plain.extend(rebuilt);
            return self.combine(junction, plain);
        }

        let mut members = plain;
        members.extend(rebuilt);
        normalize(&mut members);
        if junction.has_complement(&members) {
            return junction.absorbing(self);
        }
        match members.as_slice() {
            [] => junction.identity(self),
            [single] => single.clone(),
            _ => {
                let key = junction.key(&members);
                self.intern_expr(&self.tables().combinators, key, junction.wrap(members))
            }
        }
    }
}
