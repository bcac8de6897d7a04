//! Skeleton evaluation: the abstract capability that judges `enable`,
//! `reflect`, `prefer`/`accept` and `require` clauses on a dependency
//! alternative (spec.md §4, §6.6, §9 "Dynamic dispatch over dependency
//! alternative clauses").

use std::collections::BTreeMap;
use std::fmt;

/// A clause attached to one dependency alternative. Represented as a
/// tagged variant rather than a trait object, per spec.md §9: the
/// skeleton evaluator is the only place that interprets the embedded
/// expression text.
#[derive(Debug, Clone)]
pub enum Clause {
    /// Guards whether the alternative is considered at all.
    Enable(String),
    /// Runs after the alternative is committed, to record derived facts
    /// (e.g. which configuration variable a dependency should reflect)
    /// into the skeleton.
    Reflect(String),
    /// A soft preference plus a fallback acceptance predicate; triggers
    /// dependent-driven configuration negotiation (spec.md §4.3 step e).
    PreferAccept { prefer: String, accept: String },
    /// A hard requirement on the dependency's negotiated configuration;
    /// also triggers negotiation.
    Require(String),
}

impl Clause {
    /// Whether this clause makes the alternative a "configuration clause"
    /// alternative (spec.md §4.3 step e / glossary "Configuration clause").
    #[must_use]
    pub fn is_configuration_clause(&self) -> bool {
        matches!(self, Self::PreferAccept { .. } | Self::Require(_))
    }
}

/// A named configuration variable and its value, as assigned either by the
/// user, a default, or a `reflect` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigVar {
    pub name: String,
    pub value: String,
}

impl fmt::Display for ConfigVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Per-package evaluation context: the configuration variables visible
/// while evaluating this package's `enable`/`reflect`/`prefer`/`accept`/
/// `require` clauses (spec.md §3 build-package entry, `skeleton`).
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    vars: BTreeMap<String, String>,
}

impl Skeleton {
    #[must_use]
    pub fn new(vars: impl IntoIterator<Item = ConfigVar>) -> Self {
        let mut s = Self::default();
        for v in vars {
            s.vars.insert(v.name, v.value);
        }
        s
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

/// The abstract capability consumed by the collector to interpret clauses,
/// and by the negotiator to merge configuration requirements (spec.md §6.6).
pub trait SkeletonEvaluator {
    /// Evaluate an `Enable(expr)` clause against the skeleton at a given
    /// dependency-group position.
    fn evaluate_enable(&self, skeleton: &Skeleton, expr: &str, position: usize) -> bool;

    /// Run a `Reflect(expr)` clause's side effects into the skeleton after
    /// an alternative has been committed.
    fn evaluate_reflect(&self, skeleton: &mut Skeleton, expr: &str, position: usize);

    /// Negotiate a shared configuration for a postponed cluster: given the
    /// `prefer`/`accept`/`require` clauses of every dependent in the
    /// cluster, produce the agreed variable assignments. Must be
    /// idempotent (spec.md §4.7 step 1).
    fn negotiate(&self, clauses: &[Clause]) -> Vec<ConfigVar>;

    /// Whether any of `deps`' alternatives carry a buildfile-level clause
    /// that would force reconsideration even for an already-configured,
    /// non-system package (spec.md §4.3 "has_buildfile_clause").
    fn has_buildfile_clause(&self, deps: &[Vec<Clause>]) -> bool {
        deps.iter().flatten().any(Clause::is_configuration_clause)
    }
}

/// A deterministic evaluator used by tests and the reference CLI: `enable`
/// expressions are literal `true`/`false`, `reflect` sets `name=value`
/// pairs verbatim, and negotiation takes the union of all `require`
/// assignments (last writer wins, in source order).
#[derive(Debug, Default)]
pub struct LiteralSkeletonEvaluator;

impl SkeletonEvaluator for LiteralSkeletonEvaluator {
    fn evaluate_enable(&self, _skeleton: &Skeleton, expr: &str, _position: usize) -> bool {
        expr.trim() != "false"
    }

    fn evaluate_reflect(&self, skeleton: &mut Skeleton, expr: &str, _position: usize) {
        if let Some((k, v)) = expr.split_once('=') {
            skeleton.set(k.trim(), v.trim());
        }
    }

    fn negotiate(&self, clauses: &[Clause]) -> Vec<ConfigVar> {
        let mut out: BTreeMap<String, String> = BTreeMap::new();
        for c in clauses {
            let expr = match c {
                Clause::Require(e) | Clause::PreferAccept { accept: e, .. } => e,
                _ => continue,
            };
            if let Some((k, v)) = expr.split_once('=') {
                out.insert(k.trim().to_string(), v.trim().to_string());
            }
        }
        out.into_iter().map(|(name, value)| ConfigVar { name, value }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_enable_treats_anything_but_false_as_true() {
        let ev = LiteralSkeletonEvaluator;
        let sk = Skeleton::default();
        assert!(ev.evaluate_enable(&sk, "true", 0));
        assert!(ev.evaluate_enable(&sk, "config.foo.bar", 0));
        assert!(!ev.evaluate_enable(&sk, "false", 0));
    }

    #[test]
    fn negotiate_merges_require_clauses() {
        let ev = LiteralSkeletonEvaluator;
        let clauses = vec![
            Clause::Require("c.feature=true".into()),
            Clause::PreferAccept { prefer: "c.feature=true".into(), accept: "c.feature=true".into() },
        ];
        let vars = ev.negotiate(&clauses);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "c.feature");
        assert_eq!(vars[0].value, "true");
    }
}
