//! Rule condition matching.
//!
//! Conditions are compared structurally: the `Field` discriminator and any
//! scalar sub-field (`HttpHeaderName`) must match exactly, while value lists
//! are compared as sets.

use super::types::{Condition, ConditionValues, HttpHeaderConfig, QueryStringConfig};

/// Whether two single conditions are interchangeable
pub fn condition_matches(current: &Condition, declared: &Condition) -> bool {
    current.field == declared.field
        && current.http_header_name() == declared.http_header_name()
        && current.value_set() == declared.value_set()
}

/// Whether `current` holds at least one condition matching `declared`.
///
/// Unrelated extra conditions in `current` do not affect the result.
pub fn has_matching_condition(current: &[Condition], declared: &Condition) -> bool {
    current
        .iter()
        .any(|candidate| condition_matches(candidate, declared))
}

/// Full equality of two condition lists, ignoring order
pub fn condition_lists_equal(current: &[Condition], declared: &[Condition]) -> bool {
    declared
        .iter()
        .all(|condition| has_matching_condition(current, condition))
        && current
            .iter()
            .all(|condition| has_matching_condition(declared, condition))
}

/// The condition in one wire shape, values sorted and deduplicated.
///
/// Used to render rules for diffs, where AWS's echo of both the flat and the
/// nested value list would otherwise show up as a change.
pub fn canonical(condition: &Condition) -> Condition {
    let mut canonical = Condition {
        field: condition.field.clone(),
        ..Condition::default()
    };

    match condition.value_set() {
        ConditionValues::Pairs(pairs) => {
            canonical.query_string_config = Some(QueryStringConfig {
                values: pairs.into_iter().cloned().collect(),
            });
        }
        ConditionValues::Strings(values) => {
            let values: Vec<String> = values.into_iter().map(str::to_string).collect();
            match condition.http_header_name() {
                Some(name) => {
                    canonical.http_header_config = Some(HttpHeaderConfig {
                        http_header_name: Some(name.to_string()),
                        values,
                    });
                }
                None => canonical.values = Some(values),
            }
        }
    }

    canonical
}
