//! Property tests for combinator construction.
//!
//! Random formulas over a handful of predicates are built through the
//! registry and compared against a direct boolean evaluation of the same
//! formula, so every simplification has to preserve row-wise truth.

use barsignal::domain::condition::Expr;
use barsignal::domain::condition_parser::parse;
use barsignal::domain::registry::Registry;
use barsignal::domain::table::Table;
use proptest::prelude::*;

const ATOMS: usize = 5;

#[derive(Debug, Clone)]
enum Formula {
    Atom(usize),
    Not(Box<Formula>),
    All(Vec<Formula>),
    Any(Vec<Formula>),
}

fn formula() -> impl Strategy<Value = Formula> {
    let leaf = (0..ATOMS).prop_map(Formula::Atom);
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|f| Formula::Not(Box::new(f))),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Formula::All),
            prop::collection::vec(inner, 0..4).prop_map(Formula::Any),
        ]
    })
}

fn value() -> impl Strategy<Value = f64> {
    prop::sample::select(vec![-2.0, -1.0, 0.0, 1.0, 2.0, f64::NAN])
}

fn table() -> impl Strategy<Value = Table> {
    (1usize..10).prop_flat_map(|rows| {
        (
            prop::collection::vec(value(), rows),
            prop::collection::vec(value(), rows),
            prop::collection::vec(any::<bool>(), rows),
        )
            .prop_map(|(a, b, f)| {
                Table::new()
                    .with_numeric("a", a)
                    .unwrap()
                    .with_numeric("b", b)
                    .unwrap()
                    .with_boolean("f", f)
                    .unwrap()
            })
    })
}

fn atoms(reg: &Registry) -> Vec<Expr> {
    ["a > 0", "b < 0", "a >= b", "FLAG(f)", "a cross_up b"]
        .iter()
        .map(|text| parse(text, reg).unwrap())
        .collect()
}

fn build(f: &Formula, reg: &Registry, atoms: &[Expr]) -> Expr {
    match f {
        Formula::Atom(i) => atoms[*i].clone(),
        Formula::Not(inner) => reg.negate(&build(inner, reg, atoms)),
        Formula::All(members) => reg.and_of(members.iter().map(|m| build(m, reg, atoms))),
        Formula::Any(members) => reg.or_of(members.iter().map(|m| build(m, reg, atoms))),
    }
}

fn truth(f: &Formula, atom_rows: &[Vec<bool>], row: usize) -> bool {
    match f {
        Formula::Atom(i) => atom_rows[*i][row],
        Formula::Not(inner) => !truth(inner, atom_rows, row),
        Formula::All(members) => members.iter().all(|m| truth(m, atom_rows, row)),
        Formula::Any(members) => members.iter().any(|m| truth(m, atom_rows, row)),
    }
}

proptest! {
    #[test]
    fn simplification_preserves_truth(f in formula(), t in table()) {
        let reg = Registry::new();
        let atoms = atoms(&reg);
        let atom_rows: Vec<Vec<bool>> = atoms.iter().map(|a| a.evaluate(&t).unwrap()).collect();

        let expr = build(&f, &reg, &atoms);
        let hits = expr.evaluate(&t).unwrap();
        prop_assert_eq!(hits.len(), t.len());
        for (row, hit) in hits.iter().enumerate() {
            prop_assert_eq!(*hit, truth(&f, &atom_rows, row), "row {} of {}", row, expr);
        }
    }

    #[test]
    fn member_order_does_not_matter(
        (members, shuffled) in prop::collection::vec(formula(), 0..5)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let reg = Registry::new();
        let atoms = atoms(&reg);
        let built: Vec<Expr> = members.iter().map(|m| build(m, &reg, &atoms)).collect();
        let reordered: Vec<Expr> = shuffled.iter().map(|m| build(m, &reg, &atoms)).collect();

        prop_assert!(reg.and_of(built.clone()).same(&reg.and_of(reordered.clone())));
        prop_assert!(reg.or_of(built).same(&reg.or_of(reordered)));
    }

    #[test]
    fn construction_is_idempotent(f in formula()) {
        let reg = Registry::new();
        let atoms = atoms(&reg);
        let first = build(&f, &reg, &atoms);
        let second = build(&f, &reg, &atoms);
        prop_assert!(first.same(&second));
        prop_assert!(reg.and_of([first.clone(), second.clone()]).same(&first));
        prop_assert!(reg.or_of([first.clone(), second]).same(&first));
        prop_assert!((!!first.clone()).same(&first));
    }

    #[test]
    fn rendering_parses_back_to_same_instance(f in formula()) {
        let reg = Registry::new();
        let atoms = atoms(&reg);
        let expr = build(&f, &reg, &atoms);
        let text = expr.to_string();
        let reparsed = parse(&text, &reg).unwrap();
        prop_assert!(reparsed.same(&expr), "{} reparsed as {}", text, reparsed);
    }

    #[test]
    fn complements_collapse(f in formula()) {
        let reg = Registry::new();
        let atoms = atoms(&reg);
        let x = build(&f, &reg, &atoms);
        let not_x = !&x;
        prop_assert!(reg.and_of([x.clone(), not_x.clone()]).is_no_time());
        prop_assert!(reg.or_of([x, not_x]).is_any_time());
    }
}
