//! Named conditions loaded from the `[signals]` section of a config.
//!
//! Each key is a signal name, each value a condition in text syntax. A
//! signal may reference another as `$name`, in any order in the file;
//! references are resolved depth first and cycles are rejected. The bar
//! vocabulary conditions (`$doji`, `$black`, `$white`, `$first`, `$last`)
//! are available unless the file defines a signal of the same name.

use crate::domain::aliases::Vocabulary;
use crate::domain::condition::Expr;
use crate::domain::condition_parser::{parse_with_references, references};
use crate::domain::error::{BarsignalError, EvalError};
use crate::domain::registry::Registry;
use crate::domain::table::Table;
use crate::ports::config_port::ConfigPort;
use log::debug;
use std::collections::{BTreeSet, HashMap};

pub const SIGNALS_SECTION: &str = "signals";

#[derive(Debug, Clone)]
pub struct SignalSet {
    signals: Vec<(String, Expr)>,
}

// Keys are lowercased; config keys arrive that way and `$Name` must match them.
struct Resolver<'a> {
    sources: HashMap<String, &'a str>,
    predefined: HashMap<String, Expr>,
    resolved: HashMap<String, Expr>,
    visiting: Vec<String>,
    registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    fn resolve(&mut self, name: &str, referrer: &str) -> Result<Expr, BarsignalError> {
        let name = name.to_lowercase();
        let name = name.as_str();
        if let Some(expr) = self.resolved.get(name) {
            return Ok(expr.clone());
        }
        let Some(text) = self.sources.get(name).copied() else {
            return match self.predefined.get(name) {
                Some(expr) => {
                    self.resolved.insert(name.to_string(), expr.clone());
                    Ok(expr.clone())
                }
                None => Err(invalid(referrer, format!("unknown reference '${}'", name))),
            };
        };
        if self.visiting.iter().any(|v| v == name) {
            let mut path = self.visiting.clone();
            path.push(name.to_string());
            return Err(invalid(
                referrer,
                format!("reference cycle {}", path.join(" -> ")),
            ));
        }

        self.visiting.push(name.to_string());
        for dependency in references(text) {
            self.resolve(&dependency, name)?;
        }
        self.visiting.pop();

        let expr = parse_with_references(text, self.registry, &self.resolved)
            .map_err(|e| invalid(name, e.to_string()))?;
        debug!("signal {} = {}", name, expr);
        self.resolved.insert(name.to_string(), expr.clone());
        Ok(expr)
    }
}

fn invalid(key: &str, reason: String) -> BarsignalError {
    BarsignalError::ConfigInvalid {
        section: SIGNALS_SECTION.to_string(),
        key: key.to_string(),
        reason,
    }
}

impl SignalSet {
    /// Build every signal in `[signals]`, in file order.
    pub fn from_config(config: &dyn ConfigPort, registry: &Registry) -> Result<Self, BarsignalError> {
        let names = config.keys(SIGNALS_SECTION);
        if names.is_empty() {
            return Err(BarsignalError::ConfigMissing {
                section: SIGNALS_SECTION.to_string(),
                key: "<any signal>".to_string(),
            });
        }

        let mut texts = Vec::with_capacity(names.len());
        for name in &names {
            let text = config
                .get_string(SIGNALS_SECTION, name)
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| invalid(name, "empty condition".to_string()))?;
            texts.push(text);
        }

        let predefined = Vocabulary::new(registry)?
            .conditions()
            .into_iter()
            .map(|(name, expr)| (name.to_string(), expr))
            .collect();

        let mut resolver = Resolver {
            sources: names
                .iter()
                .map(|n| n.to_lowercase())
                .zip(texts.iter().map(String::as_str))
                .collect(),
            predefined,
            resolved: HashMap::new(),
            visiting: Vec::new(),
            registry,
        };

        let mut signals = Vec::with_capacity(names.len());
        for name in &names {
            let expr = resolver.resolve(name, name)?;
            signals.push((name.clone(), expr));
        }
        debug!("loaded {} signals", signals.len());
        Ok(Self { signals })
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.signals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, expr)| expr)
    }

    pub fn names(&self) -> Vec<&str> {
        self.signals.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Every column read by any signal.
    pub fn columns(&self) -> Vec<String> {
        let mut out = BTreeSet::new();
        for (_, expr) in &self.signals {
            expr.collect_columns(&mut out);
        }
        out.into_iter().collect()
    }

    pub fn evaluate_all(&self, table: &Table) -> Result<Vec<(String, Vec<bool>)>, EvalError> {
        self.signals
            .iter()
            .map(|(name, expr)| expr.evaluate(table).map(|hits| (name.clone(), hits)))
            .collect()
    }
}
