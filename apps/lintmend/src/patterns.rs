//! Pattern Store: confidence-ranked correction templates per violation kind.
//!
//! Every kind is seeded with its built-in templates at confidence 0.8.
//! Outcomes move confidence toward 1.0 on success (`c += step * (1 - c)`)
//! and toward 0.0 on failure (`c -= step * c`), so the score stays in
//! `[0, 1]` without clamping drift. Ranking: confidence desc, usage desc,
//! template id asc.

use crate::models::{CorrectionPattern, ViolationKind};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

pub const INITIAL_CONFIDENCE: f64 = 0.8;
pub const DEFAULT_LEARNING_STEP: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A ranked template selection for one kind.
pub struct Template {
    pub kind: ViolationKind,
    pub id: String,
}

type Key = (String, String);

#[derive(Debug)]
pub struct PatternStore {
    inner: Mutex<BTreeMap<Key, CorrectionPattern>>,
    step: f64,
}

impl PatternStore {
    /// Store holding only the built-in templates.
    pub fn with_builtin(step: f64) -> Self {
        let mut map = BTreeMap::new();
        for kind in ViolationKind::ALL {
            for id in kind.templates() {
                map.insert(
                    (kind.code().to_string(), id.to_string()),
                    seed(kind.code(), id),
                );
            }
        }
        Self {
            inner: Mutex::new(map),
            step,
        }
    }

    /// Built-in templates overlaid with persisted rows.
    ///
    /// Persisted rows for unknown kinds are kept so exporting the table
    /// again does not lose them.
    pub fn from_patterns(persisted: Vec<CorrectionPattern>, step: f64) -> Self {
        let store = Self::with_builtin(step);
        {
            let mut map = store.lock();
            for mut p in persisted {
                p.confidence = p.confidence.clamp(0.0, 1.0);
                map.insert((p.kind_code.clone(), p.template.clone()), p);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Key, CorrectionPattern>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Highest-ranked template for `kind`.
    pub fn get_best_template(&self, kind: ViolationKind) -> Option<Template> {
        self.ranked_templates(kind).into_iter().next()
    }

    /// Templates for `kind` that the dispatch table understands, best first.
    pub fn ranked_templates(&self, kind: ViolationKind) -> Vec<Template> {
        let map = self.lock();
        let mut rows: Vec<&CorrectionPattern> = map
            .values()
            .filter(|p| p.kind_code == kind.code() && kind.templates().contains(&p.template.as_str()))
            .collect();
        rows.sort_by(|a, b| rank(a, b));
        rows.into_iter()
            .map(|p| Template {
                kind,
                id: p.template.clone(),
            })
            .collect()
    }

    /// Rows for `code` (or all rows), in rank order.
    pub fn snapshot(&self, code: Option<&str>) -> Vec<CorrectionPattern> {
        let map = self.lock();
        let mut rows: Vec<CorrectionPattern> = map
            .values()
            .filter(|p| code.map_or(true, |c| p.kind_code.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.kind_code.cmp(&b.kind_code).then_with(|| rank(a, b)));
        rows
    }

    pub fn get(&self, kind: ViolationKind, template: &str) -> Option<CorrectionPattern> {
        self.lock()
            .get(&(kind.code().to_string(), template.to_string()))
            .cloned()
    }

    /// Fold one fix result into the template's score.
    pub fn record_outcome(&self, kind: ViolationKind, template: &str, success: bool) {
        let step = self.step;
        let mut map = self.lock();
        let entry = map
            .entry((kind.code().to_string(), template.to_string()))
            .or_insert_with(|| seed(kind.code(), template));
        if success {
            entry.confidence += step * (1.0 - entry.confidence);
            entry.success_count += 1;
        } else {
            entry.confidence -= step * entry.confidence;
        }
        entry.confidence = entry.confidence.clamp(0.0, 1.0);
        entry.usage_count += 1;
        entry.success_rate = entry.success_count as f64 / entry.usage_count as f64;
        entry.last_used = Some(Utc::now());
        tracing::debug!(
            code = kind.code(),
            template,
            success,
            confidence = entry.confidence,
            "pattern updated"
        );
    }
}

fn seed(code: &str, template: &str) -> CorrectionPattern {
    CorrectionPattern {
        kind_code: code.to_string(),
        template: template.to_string(),
        confidence: INITIAL_CONFIDENCE,
        usage_count: 0,
        success_count: 0,
        success_rate: 0.0,
        last_used: None,
    }
}

fn rank(a: &CorrectionPattern, b: &CorrectionPattern) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.usage_count.cmp(&a.usage_count))
        .then_with(|| a.template.cmp(&b.template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::kind::{SPLIT_STRING_LITERAL, WRAP_FROM_IMPORT};

    #[test]
    fn test_builtin_seed_and_tie_break_by_id() {
        let store = PatternStore::with_builtin(DEFAULT_LEARNING_STEP);
        let ranked = store.ranked_templates(ViolationKind::OverlongLine);
        let ids: Vec<&str> = ranked.iter().map(|t| t.id.as_str()).collect();
        // equal confidence and usage: lexical order
        assert_eq!(ids, vec![SPLIT_STRING_LITERAL, WRAP_FROM_IMPORT]);
        let p = store
            .get(ViolationKind::TrailingWhitespace, "strip-trailing-whitespace")
            .unwrap();
        assert_eq!(p.confidence, INITIAL_CONFIDENCE);
        assert_eq!(p.usage_count, 0);
    }

    #[test]
    fn test_failures_demote_a_template() {
        let store = PatternStore::with_builtin(DEFAULT_LEARNING_STEP);
        store.record_outcome(ViolationKind::OverlongLine, SPLIT_STRING_LITERAL, false);
        let best = store.get_best_template(ViolationKind::OverlongLine).unwrap();
        assert_eq!(best.id, WRAP_FROM_IMPORT);
        let p = store.get(ViolationKind::OverlongLine, SPLIT_STRING_LITERAL).unwrap();
        assert!((p.confidence - 0.72).abs() < 1e-9);
        assert_eq!(p.usage_count, 1);
        assert_eq!(p.success_rate, 0.0);
        assert!(p.last_used.is_some());
    }

    #[test]
    fn test_usage_breaks_confidence_ties() {
        let persisted = vec![
            CorrectionPattern {
                usage_count: 5,
                ..seed("E501", WRAP_FROM_IMPORT)
            },
            seed("E501", SPLIT_STRING_LITERAL),
        ];
        let store = PatternStore::from_patterns(persisted, DEFAULT_LEARNING_STEP);
        let best = store.get_best_template(ViolationKind::OverlongLine).unwrap();
        assert_eq!(best.id, WRAP_FROM_IMPORT);
    }

    #[test]
    fn test_confidence_converges_monotonically_within_bounds() {
        let store = PatternStore::with_builtin(0.25);
        let kind = ViolationKind::WhitespaceBlankLine;
        let mut last = INITIAL_CONFIDENCE;
        for _ in 0..200 {
            store.record_outcome(kind, "clear-blank-line", true);
            let c = store.get(kind, "clear-blank-line").unwrap().confidence;
            assert!(c >= last && c <= 1.0);
            last = c;
        }
        assert!(last > 0.999);
        for _ in 0..200 {
            store.record_outcome(kind, "clear-blank-line", false);
            let c = store.get(kind, "clear-blank-line").unwrap().confidence;
            assert!(c <= last && c >= 0.0);
            last = c;
        }
        assert!(last < 0.001);
        let p = store.get(kind, "clear-blank-line").unwrap();
        assert_eq!(p.usage_count, 400);
        assert!((p.success_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_persisted_rows_survive_but_are_not_ranked() {
        let persisted = vec![seed("E501", "reflow"), seed("X100", "anything")];
        let store = PatternStore::from_patterns(persisted, DEFAULT_LEARNING_STEP);
        let ranked = store.ranked_templates(ViolationKind::OverlongLine);
        assert!(ranked.iter().all(|t| t.id != "reflow"));
        assert_eq!(store.snapshot(Some("x100")).len(), 1);
        assert_eq!(store.snapshot(Some("E501")).len(), 3);
    }
}
