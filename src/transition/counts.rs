//! Per-subject transition and frequency counting
//!
//! Turns one [`ObservationSequence`] into raw count tables keyed by the active
//! grouping policy. Probabilities are not computed here; see the normalizer.

use crate::error::EthoError;
use crate::transition::types::{
    BehaviorEvent, CountTables, FrequencyKey, GroupKey, GroupingPolicy, ObservationSequence,
    TransitionKey,
};

/// Events that take part in counting, with their index in the original sequence.
///
/// Dropping the sentinel here makes its neighbours adjacent.
pub fn retained_events(
    sequence: &ObservationSequence,
) -> impl Iterator<Item = (usize, &BehaviorEvent)> {
    sequence
        .events
        .iter()
        .enumerate()
        .filter(|(_, event)| !event.behavior.is_out_of_view())
}

/// Group key of an event under a policy
pub fn group_key(
    policy: GroupingPolicy,
    sequence: &ObservationSequence,
    index: usize,
    event: &BehaviorEvent,
) -> Result<GroupKey, EthoError> {
    match policy {
        GroupingPolicy::Basic => Ok(GroupKey::Basic),
        GroupingPolicy::Time => Ok(GroupKey::ByHour(event.hour())),
        GroupingPolicy::Category => event
            .category
            .clone()
            .map(GroupKey::ByCategory)
            .ok_or_else(|| EthoError::MissingCategory {
                sequence: sequence.name.clone(),
                index,
            }),
    }
}

/// Count behaviors and first-order transitions in one sequence.
///
/// Every retained event adds one frequency count. Each pair of consecutive
/// retained events adds one transition count keyed by the group of the source
/// event; the final event has no successor and adds none.
pub fn count_sequence(
    sequence: &ObservationSequence,
    policy: GroupingPolicy,
) -> Result<CountTables, EthoError> {
    let keyed: Vec<(&BehaviorEvent, GroupKey)> = retained_events(sequence)
        .map(|(index, event)| {
            group_key(policy, sequence, index, event).map(|group| (event, group))
        })
        .collect::<Result<_, EthoError>>()?;

    let mut tables = CountTables::default();

    for (event, group) in &keyed {
        let key = FrequencyKey {
            behavior: event.behavior.clone(),
            group: group.clone(),
        };
        *tables.behavior_counts.entry(key).or_insert(0) += 1;
    }

    for pair in keyed.windows(2) {
        let (from, group) = &pair[0];
        let (to, _) = &pair[1];
        let key = TransitionKey {
            from: from.behavior.clone(),
            to: to.behavior.clone(),
            group: group.clone(),
        };
        *tables.transition_counts.entry(key).or_insert(0) += 1;
    }

    Ok(tables)
}
