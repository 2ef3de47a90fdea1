//! End-to-end tests across the registry, parser, signal sets and adapters.

mod common;

use barsignal::adapters::csv_adapter::CsvAdapter;
use barsignal::adapters::file_config_adapter::FileConfigAdapter;
use barsignal::domain::aliases::Vocabulary;
use barsignal::domain::condition::{Comparison, Direction, ExprKind};
use barsignal::domain::condition_parser::parse;
use barsignal::domain::error::{BarsignalError, EvalError};
use barsignal::domain::interval::{Closed, Interval};
use barsignal::domain::registry::Registry;
use barsignal::domain::signal_set::SignalSet;
use barsignal::ports::data_port::DataPort;
use common::*;

mod leaf_predicates {
    use super::*;

    #[test]
    fn status_and_action_over_j() {
        let reg = Registry::new();
        let t = j_table(&[-1.0, 0.0, 0.0, 1.0, 0.0, 0.0, -1.0]);
        let j = reg.indicator("J");

        let cases = [
            (Direction::TouchUp, vec![1]),
            (Direction::CrossUp, vec![3]),
            (Direction::TouchDown, vec![4]),
            (Direction::CrossDown, vec![6]),
        ];
        for (direction, expected) in cases {
            let hits = j.action(direction, 0.0).unwrap().evaluate(&t).unwrap();
            assert_eq!(hit_rows(&hits), expected, "{direction}");
        }

        let ge = j.status(Comparison::Ge, 0.0).unwrap().evaluate(&t).unwrap();
        assert_eq!(hit_rows(&ge), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn missing_values_never_match() {
        let reg = Registry::new();
        let t = j_table(&[f64::NAN, 1.0, f64::NAN, -1.0]);
        let j = reg.indicator("J");
        let above = j.gt(0.0).unwrap();
        let not_above = j.le(0.0).unwrap();
        assert_eq!(hit_rows(&above.evaluate(&t).unwrap()), vec![1]);
        assert_eq!(hit_rows(&not_above.evaluate(&t).unwrap()), vec![3]);
        let cross = j.cross_up(0.0).unwrap();
        assert!(hit_rows(&cross.evaluate(&t).unwrap()).is_empty());
    }

    fn count_table() -> barsignal::domain::table::Table {
        j_table(&[0.0, 2.0, 1.0, 3.0])
            .with_numeric("K", vec![5.0, -1.0, 2.0, 4.0])
            .unwrap()
    }

    #[test]
    fn count_over_status_and_action() {
        let reg = Registry::new();
        let t = count_table();
        let j_ge_1 = reg.indicator("J").ge(1.0).unwrap();
        let k_up = reg.indicator("K").cross_up(0.0).unwrap();
        assert_eq!(hit_rows(&j_ge_1.evaluate(&t).unwrap()), vec![1, 2, 3]);
        assert_eq!(hit_rows(&k_up.evaluate(&t).unwrap()), vec![2]);

        let count = reg.count([j_ge_1, k_up]).unwrap();
        assert_eq!(count.evaluate(&t).unwrap(), vec![0.0, 1.0, 2.0, 1.0]);

        let j_minus_count = &reg.indicator("J") - &count;
        assert_eq!(j_minus_count.evaluate(&t).unwrap(), vec![0.0, 1.0, -1.0, 2.0]);
    }

    #[test]
    fn count_as_level_and_as_action_operand() {
        let reg = Registry::new();
        let t = count_table();
        // COUNT(...) per row: 0, 1, 2, 1
        let cases = [
            ("J > COUNT(J >= 1, K cross_up 0)", vec![1, 3]),
            ("COUNT(J >= 1, K cross_up 0) cross_up 1", vec![2]),
            ("COUNT(J >= 1, K cross_up 0) touch_down 1", vec![3]),
            ("J - COUNT(J >= 1, K cross_up 0) > 0", vec![1, 3]),
        ];
        for (text, expected) in cases {
            let hits = parse(text, &reg).unwrap().evaluate(&t).unwrap();
            assert_eq!(hit_rows(&hits), expected, "{text}");
        }
    }

    #[test]
    fn interval_band_semantics() {
        let reg = Registry::new();
        let t = j_table(&[10.0, 20.0, 50.0, 80.0, 90.0]);
        let j = reg.indicator("J");
        let band = Interval::new(20.0, 80.0, Closed::Left).unwrap();

        let above = j.gt(band).unwrap().evaluate(&t).unwrap();
        assert_eq!(hit_rows(&above), vec![3, 4]);
        let below = j.lt(band).unwrap().evaluate(&t).unwrap();
        assert_eq!(hit_rows(&below), vec![0]);
        let inside = j.equal_to(band).unwrap().evaluate(&t).unwrap();
        assert_eq!(hit_rows(&inside), vec![1, 2]);
    }
}

mod algebra {
    use super::*;

    #[test]
    fn textual_and_programmatic_construction_agree() {
        let reg = Registry::new();
        let j = reg.indicator("J");
        let k = reg.indicator("K");
        let built = j.cross_up(&k).unwrap() & !k.gt(80.0).unwrap();
        let parsed = parse("~(K > 80) & J cross_up K", &reg).unwrap();
        assert!(built.same(&parsed));
    }

    #[test]
    fn laws_hold_for_parsed_conditions() {
        let reg = Registry::new();
        let x = parse("J > 0", &reg).unwrap();
        let y = parse("K < 20", &reg).unwrap();

        assert!(parse("J > 0 & (J > 0 | K < 20)", &reg).unwrap().same(&x));
        assert!(parse("J > 0 | ~(J > 0)", &reg).unwrap().is_any_time());
        assert!(parse("J > 0 & ~(J > 0)", &reg).unwrap().is_no_time());
        assert!(parse("~~(K < 20)", &reg).unwrap().same(&y));
        assert!((reg.and_of([]) & y.clone()).same(&y));
    }

    #[test]
    fn combinators_keep_canonical_member_order() {
        let reg = Registry::new();
        let a = parse("B > 1 & A > 1 & FLAG(first)", &reg).unwrap();
        match a.kind() {
            ExprKind::All(members) => {
                let rendered: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                assert_eq!(rendered, vec!["FLAG(first)", "A > 1", "B > 1"]);
            }
            other => panic!("expected All, got {other:?}"),
        }
    }

    #[test]
    fn expressions_from_separate_registries_stay_separate() {
        let r1 = Registry::new();
        let r2 = Registry::new();
        let a = parse("J > 0", &r1).unwrap();
        let b = parse("J > 0", &r2).unwrap();
        assert!(!a.same(&b));
        assert_eq!(a.to_string(), b.to_string());
        let t = j_table(&[1.0, -1.0]);
        assert_eq!(a.evaluate(&t).unwrap(), b.evaluate(&t).unwrap());
    }
}

mod signal_pipeline {
    use super::*;

    const SIGNALS: &str = r#"
[data]
path = rb.csv
date_column = date

[signals]
rebound = $oversold & J cross_up 0
oversold = J[1] < 0
bearish = $black
momentum = COUNT(close > close[1], J > 0) >= 2
"#;

    #[test]
    fn signals_evaluate_against_mock_data() {
        let config = FileConfigAdapter::from_string(SIGNALS).unwrap();
        let reg = Registry::new();
        let set = SignalSet::from_config(&config, &reg).unwrap();
        assert_eq!(set.names(), vec!["rebound", "oversold", "bearish", "momentum"]);

        let mut t = make_bars(&[10.0, 9.0, 9.5, 10.5, 10.0]);
        t = t
            .with_numeric("J", vec![5.0, -2.0, 3.0, 8.0, -1.0])
            .unwrap();
        let port = MockDataPort::new().with_table("rb", t);
        let table = port.fetch_table("rb").unwrap();

        let results = set.evaluate_all(&table).unwrap();
        let rows: Vec<(String, Vec<usize>)> = results
            .into_iter()
            .map(|(name, hits)| (name, hit_rows(&hits)))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("rebound".to_string(), vec![2]),
                ("oversold".to_string(), vec![2]),
                ("bearish".to_string(), vec![1, 3]),
                ("momentum".to_string(), vec![2, 3]),
            ]
        );
    }

    #[test]
    fn missing_column_surfaces_as_eval_error() {
        let config = FileConfigAdapter::from_string("[signals]\nhot = RSI > 70\n").unwrap();
        let reg = Registry::new();
        let set = SignalSet::from_config(&config, &reg).unwrap();
        let table = make_bars(&[1.0, 2.0]);
        assert_eq!(set.columns(), vec!["RSI"]);
        assert_eq!(
            set.evaluate_all(&table).unwrap_err(),
            EvalError::MissingColumn { name: "RSI".into() }
        );
    }

    #[test]
    fn data_port_errors_propagate() {
        let port = MockDataPort::new().with_error("rb", "connection refused");
        let err = port.fetch_table("rb").unwrap_err();
        assert!(matches!(err, BarsignalError::Data { .. }));
        assert!(port.fetch_table("other").is_err());
    }

    #[test]
    fn csv_adapter_feeds_vocabulary() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("rb.csv"), BAR_CSV).unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf()).with_date_column("date");
        let table = adapter.fetch_table("rb").unwrap();

        let reg = Registry::new();
        let v = Vocabulary::new(&reg).unwrap();
        let black = hit_rows(&v.black.evaluate(&table).unwrap());
        assert_eq!(black, vec![0, 4]);

        let rebound = parse("J cross_up 0", &reg).unwrap();
        let hits = rebound.evaluate(&table).unwrap();
        let labels: Vec<String> = hit_rows(&hits)
            .into_iter()
            .map(|row| table.row_label(row, Some("date")))
            .collect();
        assert_eq!(labels, vec!["2024-01-04"]);

        let matched = table.filter(&hits);
        assert_eq!(matched.numeric("close").unwrap(), vec![11.0]);
    }
}
