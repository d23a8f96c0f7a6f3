//! Priority insertion protocol for ordered policy rules.
//!
//! The platform keeps rule priorities a contiguous 1..N per policy and
//! renumbers neighbours when a rule is inserted, moved or removed. After
//! every mutation the caller re-lists the policy and reports each
//! sibling's observed priority so state follows the server's numbering.

use oktaform_client::ApiRequest;
use oktaform_core::api_paths;
use oktaform_core::models::policy_rule::PolicyRule;
use serde_json::Value;

use crate::context::{OpContext, SiblingObservation};
use crate::error::ProvisionerError;

pub const PRIORITY: &str = "priority";

/// Stable sort by priority ascending; unprioritised entries go last in
/// their original order.
pub fn sort_by_priority<T>(items: &mut [T], priority: impl Fn(&T) -> Option<i64>) {
    items.sort_by_key(|item| priority(item).unwrap_or(i64::MAX));
}

/// Names ordered by priority, ties kept in input order.
pub fn relative_order<'a, I>(entries: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut entries: Vec<(&str, i64)> = entries.into_iter().collect();
    entries.sort_by_key(|(_, p)| *p);
    entries.into_iter().map(|(name, _)| name).collect()
}

/// True when the names both lists share appear in the same relative
/// order. Absolute numbers are ignored.
pub fn relative_order_matches(declared: &[(&str, i64)], observed: &[(&str, i64)]) -> bool {
    fn contains(list: &[(&str, i64)], name: &str) -> bool {
        list.iter().any(|(n, _)| *n == name)
    }
    let want: Vec<&str> = relative_order(declared.iter().copied())
        .into_iter()
        .filter(|n| contains(observed, n))
        .collect();
    let have: Vec<&str> = relative_order(observed.iter().copied())
        .into_iter()
        .filter(|n| contains(declared, n))
        .collect();
    want == have
}

/// True when `priorities` are exactly 1..=N in some order.
pub fn is_contiguous(priorities: impl IntoIterator<Item = i64>) -> bool {
    let mut all: Vec<i64> = priorities.into_iter().collect();
    all.sort_unstable();
    all.iter().zip(1..).all(|(p, expected)| *p == expected)
}

/// Re-list every rule of `policy_id` and record the observed priority of
/// each one other than `except_id` as a sibling observation.
pub async fn observe_siblings(
    ctx: &OpContext,
    resource_type: &str,
    policy_id: &str,
    except_id: Option<&str>,
) -> Result<Vec<PolicyRule>, ProvisionerError> {
    let rules: Vec<PolicyRule> = ctx
        .list(ApiRequest::get(api_paths::policy_rules(policy_id)))
        .await?;

    if !is_contiguous(rules.iter().filter_map(|r| r.priority)) {
        tracing::warn!(policy_id = %policy_id, "rule priorities are not contiguous");
    }

    for rule in &rules {
        let (Some(id), Some(priority)) = (rule.id.as_deref(), rule.priority) else {
            continue;
        };
        if Some(id) == except_id {
            continue;
        }
        ctx.observe_sibling(SiblingObservation {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            attribute: PRIORITY.to_string(),
            value: Value::from(priority),
        });
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifted_numbers_keep_relative_order() {
        let declared = [("a", 1), ("b", 2), ("c", 3)];
        let observed = [("a", 2), ("b", 3), ("c", 4), ("catch-all", 5)];
        assert!(relative_order_matches(&declared, &observed));
    }

    #[test]
    fn swapped_rules_break_relative_order() {
        let declared = [("a", 1), ("b", 2)];
        let observed = [("b", 1), ("a", 2)];
        assert!(!relative_order_matches(&declared, &observed));
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let mut rules = vec![("x", Some(2)), ("y", None), ("z", Some(1)), ("w", Some(2))];
        sort_by_priority(&mut rules, |r| r.1);
        let names: Vec<_> = rules.iter().map(|r| r.0).collect();
        assert_eq!(names, ["z", "x", "w", "y"]);
    }

    #[test]
    fn contiguity() {
        assert!(is_contiguous([3, 1, 2]));
        assert!(!is_contiguous([1, 3]));
        assert!(is_contiguous(std::iter::empty()));
    }

    /// Moving one rule never reorders the others.
    #[test]
    fn moving_one_rule_preserves_the_rest() {
        let before = ["r1", "r2", "r3", "r4", "r5"];
        for from in 0..before.len() {
            for to in 0..before.len() {
                let mut after: Vec<&str> = before.to_vec();
                let moved = after.remove(from);
                after.insert(to, moved);

                let declared: Vec<(&str, i64)> = before
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != from)
                    .map(|(i, n)| (*n, i as i64 + 1))
                    .collect();
                let observed: Vec<(&str, i64)> = after
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| **n != moved)
                    .map(|(i, n)| (*n, i as i64 + 1))
                    .collect();
                assert!(relative_order_matches(&declared, &observed), "{from}->{to}");
            }
        }
    }
}
