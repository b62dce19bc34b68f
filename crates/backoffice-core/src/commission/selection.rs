//! # Rule Selection
//!
//! Picks the single commission rule that applies to a sale.
//!
//! ## Selection Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  airline rules                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  filter: is_active                                                      │
//! │          starts_at <= now <= ends_at (open end allowed)                 │
//! │          travel_class is None or == sale class                         │
//! │          route_pattern matches sale route                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  score: +100 if travel_class is set                                    │
//! │         + literal characters in the pattern (wildcards stripped)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  highest score wins, ties go to the latest starts_at                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use backoffice_core::commission::RoutePattern;
//!
//! let pattern = RoutePattern::new("BZV-*");
//! assert!(pattern.matches("bzv-dkr"));
//! assert!(!pattern.matches("DKR-BZV"));
//! ```

use chrono::{DateTime, Utc};
use regex::RegexBuilder;

use crate::types::{CommissionRule, TravelClass};

/// Score bonus for rules narrowed to a travel class.
pub const TRAVEL_CLASS_SCORE: usize = 100;

// =============================================================================
// Route Pattern
// =============================================================================

/// A glob-style route pattern where `*` matches any run of characters.
///
/// Everything else is literal and the match is case-insensitive over the
/// whole route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern<'a> {
    raw: &'a str,
}

impl<'a> RoutePattern<'a> {
    pub fn new(raw: &'a str) -> Self {
        RoutePattern { raw }
    }

    /// Checks the pattern against a route.
    ///
    /// Both sides are trimmed first. A bare `*` matches every route,
    /// including an empty one; an empty pattern matches only an empty route.
    pub fn matches(&self, route: &str) -> bool {
        let pattern = self.raw.trim();
        if pattern == "*" {
            return true;
        }

        let route = route.trim().to_uppercase();
        let expression = format!(
            "^{}$",
            pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        );

        // An escaped pattern always compiles; a failure here can only mean the
        // size limit was hit, in which case nothing matches.
        match RegexBuilder::new(&expression).case_insensitive(true).build() {
            Ok(re) => re.is_match(&route),
            Err(_) => false,
        }
    }

    /// Number of literal characters in the pattern.
    pub fn literal_len(&self) -> usize {
        self.raw.trim().chars().filter(|c| *c != '*').count()
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Specificity score used to rank matching rules.
pub fn specificity(rule: &CommissionRule) -> usize {
    let class_bonus = if rule.travel_class.is_some() {
        TRAVEL_CLASS_SCORE
    } else {
        0
    };
    class_bonus + RoutePattern::new(&rule.route_pattern).literal_len()
}

/// Checks whether a rule may be applied to a sale at `now`.
pub fn rule_applies(
    rule: &CommissionRule,
    route: &str,
    travel_class: TravelClass,
    now: DateTime<Utc>,
) -> bool {
    rule.is_active
        && rule.is_in_window(now)
        && rule.travel_class.map_or(true, |class| class == travel_class)
        && RoutePattern::new(&rule.route_pattern).matches(route)
}

/// Selects the applicable rule for a sale, or `None` when no rule applies.
///
/// `None` must block the sale: the caller turns it into
/// [`CoreError::NoApplicableRule`](crate::error::CoreError::NoApplicableRule).
pub fn pick_commission_rule<'r>(
    rules: &'r [CommissionRule],
    route: &str,
    travel_class: TravelClass,
    now: DateTime<Utc>,
) -> Option<&'r CommissionRule> {
    rules
        .iter()
        .filter(|rule| rule_applies(rule, route, travel_class, now))
        .max_by(|a, b| {
            specificity(a)
                .cmp(&specificity(b))
                .then_with(|| a.starts_at.cmp(&b.starts_at))
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommissionMode;
    use chrono::Duration;
    use proptest::prelude::*;

    fn rule(id: &str, pattern: &str, class: Option<TravelClass>) -> CommissionRule {
        let now = Utc::now();
        CommissionRule {
            id: id.to_string(),
            airline_id: "airline".to_string(),
            route_pattern: pattern.to_string(),
            travel_class: class,
            commission_mode: CommissionMode::Immediate,
            system_rate_bps: 500,
            markup_rate_bps: 0,
            rate_bps: 0,
            default_base_fare_ratio_bps: None,
            deposit_stock_target_cents: 0,
            deposit_stock_consumed_cents: 0,
            batch_commission_cents: 0,
            starts_at: now - Duration::days(30),
            ends_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_star_matches_everything() {
        let pattern = RoutePattern::new("*");
        assert!(pattern.matches("BZV-DKR"));
        assert!(pattern.matches(""));
        assert!(pattern.matches("anything at all"));
    }

    #[test]
    fn test_empty_pattern_matches_only_empty_route() {
        let pattern = RoutePattern::new("  ");
        assert!(pattern.matches(""));
        assert!(pattern.matches("   "));
        assert!(!pattern.matches("BZV-DKR"));
        assert_eq!(pattern.literal_len(), 0);
    }

    #[test]
    fn test_prefix_pattern() {
        let pattern = RoutePattern::new("BZV-*");
        assert!(pattern.matches("BZV-DKR"));
        assert!(!pattern.matches("DKR-BZV"));
        assert!(pattern.matches("bzv-dkr"));
        assert!(pattern.matches("  bzv-pnr  "));
    }

    #[test]
    fn test_pattern_is_anchored_and_literal() {
        assert!(!RoutePattern::new("BZV-DKR").matches("BZV-DKR-CDG"));
        assert!(RoutePattern::new("*-CDG").matches("BZV-DKR-CDG"));
        // Regex metacharacters are literals
        assert!(!RoutePattern::new("BZV.DKR").matches("BZVXDKR"));
        assert!(RoutePattern::new("BZV.DKR").matches("BZV.DKR"));
        assert!(RoutePattern::new("(BZV)+*").matches("(BZV)+DKR"));
    }

    #[test]
    fn test_literal_len() {
        assert_eq!(RoutePattern::new("*").literal_len(), 0);
        assert_eq!(RoutePattern::new("BZV-*").literal_len(), 4);
        assert_eq!(RoutePattern::new("BZV-DKR").literal_len(), 7);
    }

    #[test]
    fn test_no_rule_when_nothing_matches() {
        let now = Utc::now();
        let rules = vec![rule("a", "DKR-*", None)];
        assert!(pick_commission_rule(&rules, "BZV-DKR", TravelClass::Economy, now).is_none());
        assert!(pick_commission_rule(&[], "BZV-DKR", TravelClass::Economy, now).is_none());
    }

    #[test]
    fn test_travel_class_filter_wins() {
        let now = Utc::now();
        let rules = vec![
            rule("generic", "BZV-DKR", None),
            rule("business", "*", Some(TravelClass::Business)),
        ];

        let picked = pick_commission_rule(&rules, "BZV-DKR", TravelClass::Business, now).unwrap();
        assert_eq!(picked.id, "business");

        // The class-restricted rule never applies to another class
        let picked = pick_commission_rule(&rules, "BZV-DKR", TravelClass::Economy, now).unwrap();
        assert_eq!(picked.id, "generic");
    }

    #[test]
    fn test_more_literal_pattern_wins() {
        let now = Utc::now();
        let rules = vec![
            rule("any", "*", None),
            rule("from-bzv", "BZV-*", None),
            rule("exact", "BZV-DKR", None),
        ];
        let picked = pick_commission_rule(&rules, "bzv-dkr", TravelClass::Economy, now).unwrap();
        assert_eq!(picked.id, "exact");

        let picked = pick_commission_rule(&rules, "BZV-PNR", TravelClass::Economy, now).unwrap();
        assert_eq!(picked.id, "from-bzv");
    }

    #[test]
    fn test_tie_goes_to_latest_start() {
        let now = Utc::now();
        let mut older = rule("older", "BZV-*", None);
        older.starts_at = now - Duration::days(60);
        let mut newer = rule("newer", "BZV-*", None);
        newer.starts_at = now - Duration::days(1);

        let rules = vec![newer.clone(), older.clone()];
        let picked = pick_commission_rule(&rules, "BZV-DKR", TravelClass::Economy, now).unwrap();
        assert_eq!(picked.id, "newer");

        let rules = vec![older, newer];
        let picked = pick_commission_rule(&rules, "BZV-DKR", TravelClass::Economy, now).unwrap();
        assert_eq!(picked.id, "newer");
    }

    #[test]
    fn test_window_and_active_flag_respected() {
        let now = Utc::now();
        let mut expired = rule("expired", "BZV-DKR", Some(TravelClass::Economy));
        expired.ends_at = Some(now - Duration::days(1));
        let mut future = rule("future", "BZV-DKR", Some(TravelClass::Economy));
        future.starts_at = now + Duration::days(1);
        let mut inactive = rule("inactive", "BZV-DKR", Some(TravelClass::Economy));
        inactive.is_active = false;
        let fallback = rule("fallback", "*", None);

        let rules = vec![expired, future, inactive, fallback];
        let picked = pick_commission_rule(&rules, "BZV-DKR", TravelClass::Economy, now).unwrap();
        assert_eq!(picked.id, "fallback");
    }

    fn travel_class() -> impl Strategy<Value = TravelClass> {
        prop_oneof![
            Just(TravelClass::Economy),
            Just(TravelClass::PremiumEconomy),
            Just(TravelClass::Business),
            Just(TravelClass::First),
        ]
    }

    fn route_pattern() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("*".to_string()),
            "[A-C]{1,2}-[A-C]{1,2}",
            "[A-C]{1,2}-\\*",
            "\\*-[A-C]{1,2}",
        ]
    }

    /// Rules over a small alphabet so that generated routes often match.
    fn rule_set() -> impl Strategy<Value = Vec<CommissionRule>> {
        prop::collection::vec(
            (
                route_pattern(),
                prop::option::of(travel_class()),
                -5_i64..5,
                prop::option::of(-5_i64..5),
                any::<bool>(),
            ),
            0..8,
        )
        .prop_map(|specs| {
            let now = Utc::now();
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (pattern, class, start, end, active))| {
                    let mut r = rule(&format!("r{i}"), &pattern, class);
                    r.starts_at = now + Duration::days(start);
                    r.ends_at = end.map(|days| now + Duration::days(days));
                    r.is_active = active;
                    r
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn picked_rule_always_applies_and_is_most_specific(
            rules in rule_set(),
            route in "[A-C]{1,2}-[A-C]{1,2}",
            class in travel_class(),
        ) {
            let now = Utc::now();
            let applicable: Vec<&CommissionRule> = rules
                .iter()
                .filter(|r| rule_applies(r, &route, class, now))
                .collect();

            match pick_commission_rule(&rules, &route, class, now) {
                Some(picked) => {
                    prop_assert!(rule_applies(picked, &route, class, now));
                    for other in &applicable {
                        prop_assert!(specificity(other) <= specificity(picked));
                    }
                }
                None => prop_assert!(applicable.is_empty()),
            }
        }
    }
}
