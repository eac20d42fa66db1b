//! Built-in metric scorers.
//!
//! A scorer maps a metric's parsed values to a point value and a
//! descriptive state label by matching them against the metric's
//! ordered rules. The two built-ins deliberately differ in matching
//! strategy: the single-field scorer takes the *first* matching rule,
//! the blood-pressure scorer takes the *highest-scoring* matching rule.
//! That asymmetry is clinical domain behaviour and must be preserved.

use crate::parsers::ParsedValues;
use triage_types::{Logic, MetricRule, RangeRule};

/// Result of scoring one metric for one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub points: i32,
    pub state: Option<String>,
    pub matched_rule_index: Option<usize>,
}

impl ScoreResult {
    fn no_match() -> Self {
        Self {
            points: 0,
            state: None,
            matched_rule_index: None,
        }
    }
}

pub type ScorerFn = fn(&[MetricRule], &ParsedValues) -> ScoreResult;

/// Resolves a `scorerId` against the fixed registry.
pub fn lookup_scorer(id: &str) -> Option<ScorerFn> {
    match id {
        "singleFieldRangeFirstMatch" => Some(single_field_range_first_match),
        "bpCategoryMaxScorer" => Some(bp_category_max_scorer),
        _ => None,
    }
}

/// Tests a value against a range. A bound that is absent excludes
/// nothing, so a rule with no bounds matches every value.
pub fn matches_range(value: f64, range: &RangeRule) -> bool {
    if let Some(min) = range.min_inclusive {
        if value < min {
            return false;
        }
    }
    if let Some(min) = range.min_exclusive {
        if value <= min {
            return false;
        }
    }
    if let Some(max) = range.max_inclusive {
        if value > max {
            return false;
        }
    }
    if let Some(max) = range.max_exclusive {
        if value >= max {
            return false;
        }
    }
    true
}

/// `singleFieldRangeFirstMatch`: the first rule, in declared order,
/// whose range matches the single parsed field wins. No match scores
/// zero points with no state.
fn single_field_range_first_match(rules: &[MetricRule], values: &ParsedValues) -> ScoreResult {
    let Some((field, value)) = values.first() else {
        return ScoreResult::no_match();
    };

    for (index, rule) in rules.iter().enumerate() {
        let Some(range) = rule.rule.get(field) else {
            continue;
        };
        if matches_range(value, range) {
            return ScoreResult {
                points: rule.points,
                state: Some(rule.state.clone()),
                matched_rule_index: Some(index),
            };
        }
    }

    ScoreResult::no_match()
}

/// `bpCategoryMaxScorer`: evaluates every rule against both the
/// systolic and diastolic ranges, combining the two matches with the
/// rule's logic (`AND` requires both, `OR` either), and keeps the
/// highest-scoring match across all matching rules.
fn bp_category_max_scorer(rules: &[MetricRule], values: &ParsedValues) -> ScoreResult {
    let (Some(systolic), Some(diastolic)) = (values.get("systolic"), values.get("diastolic"))
    else {
        return ScoreResult::no_match();
    };

    let mut best = ScoreResult::no_match();

    for (index, rule) in rules.iter().enumerate() {
        let (Some(sys_range), Some(dia_range)) =
            (rule.rule.get("systolic"), rule.rule.get("diastolic"))
        else {
            continue;
        };

        let sys_ok = matches_range(systolic, sys_range);
        let dia_ok = matches_range(diastolic, dia_range);
        let matched = match rule.logic() {
            Logic::And => sys_ok && dia_ok,
            Logic::Or => sys_ok || dia_ok,
        };

        if matched && rule.points > best.points {
            best = ScoreResult {
                points: rule.points,
                state: Some(rule.state.clone()),
                matched_rule_index: Some(index),
            };
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn range(min_inc: Option<f64>, max_inc: Option<f64>) -> RangeRule {
        RangeRule {
            min_inclusive: min_inc,
            max_inclusive: max_inc,
            ..RangeRule::default()
        }
    }

    fn single_field_rule(state: &str, points: i32, field: &str, rr: RangeRule) -> MetricRule {
        let mut map = BTreeMap::new();
        map.insert(field.to_owned(), rr);
        MetricRule {
            state: state.to_owned(),
            points,
            logic: None,
            rule: map,
        }
    }

    fn bp_rule(
        state: &str,
        points: i32,
        logic: Option<Logic>,
        sys: RangeRule,
        dia: RangeRule,
    ) -> MetricRule {
        let mut map = BTreeMap::new();
        map.insert("systolic".to_owned(), sys);
        map.insert("diastolic".to_owned(), dia);
        MetricRule {
            state: state.to_owned(),
            points,
            logic,
            rule: map,
        }
    }

    #[test]
    fn range_bounds_are_honoured_per_kind() {
        let inc = range(Some(10.0), Some(20.0));
        assert!(matches_range(10.0, &inc));
        assert!(matches_range(20.0, &inc));
        assert!(!matches_range(9.99, &inc));
        assert!(!matches_range(20.01, &inc));

        let exc = RangeRule {
            min_exclusive: Some(10.0),
            max_exclusive: Some(20.0),
            ..RangeRule::default()
        };
        assert!(!matches_range(10.0, &exc));
        assert!(!matches_range(20.0, &exc));
        assert!(matches_range(10.01, &exc));
        assert!(matches_range(19.99, &exc));
    }

    #[test]
    fn empty_range_matches_everything() {
        let any = RangeRule::default();
        assert!(matches_range(f64::MIN, &any));
        assert!(matches_range(0.0, &any));
        assert!(matches_range(f64::MAX, &any));
    }

    #[test]
    fn first_match_wins_in_declared_order() {
        let rules = vec![
            single_field_rule("critical", 3, "temperature", range(Some(39.0), None)),
            single_field_rule("elevated", 1, "temperature", range(Some(38.0), None)),
        ];
        let values = ParsedValues(vec![("temperature".to_owned(), 39.5)]);

        // 39.5 matches both branches; declared order decides.
        let result = single_field_range_first_match(&rules, &values);
        assert_eq!(result.points, 3);
        assert_eq!(result.state.as_deref(), Some("critical"));
        assert_eq!(result.matched_rule_index, Some(0));
    }

    #[test]
    fn first_match_scorer_defaults_to_zero_on_no_match() {
        let rules = vec![single_field_rule(
            "elevated",
            1,
            "temperature",
            range(Some(38.0), None),
        )];
        let values = ParsedValues(vec![("temperature".to_owned(), 36.5)]);

        let result = single_field_range_first_match(&rules, &values);
        assert_eq!(result.points, 0);
        assert_eq!(result.state, None);
        assert_eq!(result.matched_rule_index, None);
    }

    #[test]
    fn first_match_scorer_skips_rules_without_the_field() {
        let rules = vec![
            single_field_rule("other", 9, "age", range(None, None)),
            single_field_rule("elevated", 1, "temperature", range(Some(38.0), None)),
        ];
        let values = ParsedValues(vec![("temperature".to_owned(), 38.4)]);

        let result = single_field_range_first_match(&rules, &values);
        assert_eq!(result.state.as_deref(), Some("elevated"));
        assert_eq!(result.matched_rule_index, Some(1));
    }

    #[test]
    fn bp_scorer_keeps_highest_scoring_match_not_first() {
        let rules = vec![
            bp_rule(
                "stage1",
                1,
                Some(Logic::Or),
                range(Some(130.0), Some(139.0)),
                range(Some(80.0), Some(89.0)),
            ),
            bp_rule(
                "stage2",
                3,
                Some(Logic::Or),
                range(Some(140.0), None),
                range(Some(90.0), None),
            ),
        ];
        // Systolic sits in stage1, diastolic in stage2; best match wins.
        let values = ParsedValues(vec![
            ("systolic".to_owned(), 135.0),
            ("diastolic".to_owned(), 95.0),
        ]);

        let result = bp_category_max_scorer(&rules, &values);
        assert_eq!(result.points, 3);
        assert_eq!(result.state.as_deref(), Some("stage2"));
        assert_eq!(result.matched_rule_index, Some(1));
    }

    #[test]
    fn bp_scorer_and_logic_requires_both_ranges() {
        let rules = vec![bp_rule(
            "crisis",
            4,
            Some(Logic::And),
            range(Some(180.0), None),
            range(Some(120.0), None),
        )];

        let one_side = ParsedValues(vec![
            ("systolic".to_owned(), 185.0),
            ("diastolic".to_owned(), 110.0),
        ]);
        assert_eq!(bp_category_max_scorer(&rules, &one_side).points, 0);

        let both = ParsedValues(vec![
            ("systolic".to_owned(), 185.0),
            ("diastolic".to_owned(), 125.0),
        ]);
        assert_eq!(bp_category_max_scorer(&rules, &both).points, 4);
    }

    #[test]
    fn bp_scorer_defaults_to_or_logic() {
        let rules = vec![bp_rule(
            "elevated",
            2,
            None,
            range(Some(140.0), None),
            range(Some(90.0), None),
        )];
        let values = ParsedValues(vec![
            ("systolic".to_owned(), 150.0),
            ("diastolic".to_owned(), 70.0),
        ]);
        assert_eq!(bp_category_max_scorer(&rules, &values).points, 2);
    }

    #[test]
    fn bp_scorer_ignores_rules_missing_either_range() {
        let mut only_sys = BTreeMap::new();
        only_sys.insert("systolic".to_owned(), range(Some(0.0), None));
        let rules = vec![MetricRule {
            state: "broken".to_owned(),
            points: 9,
            logic: None,
            rule: only_sys,
        }];
        let values = ParsedValues(vec![
            ("systolic".to_owned(), 120.0),
            ("diastolic".to_owned(), 80.0),
        ]);
        assert_eq!(bp_category_max_scorer(&rules, &values).points, 0);
    }

    #[test]
    fn registry_resolves_known_ids_only() {
        assert!(lookup_scorer("singleFieldRangeFirstMatch").is_some());
        assert!(lookup_scorer("bpCategoryMaxScorer").is_some());
        assert!(lookup_scorer("imaginaryScorer").is_none());
    }
}
