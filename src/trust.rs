//! Mutual trust and the status tiers it unlocks.

use crate::catalog::{Action, Status};

/// Upper bound for the trust points one side can give.
pub const MAX_TRUST_POINTS: u32 = 100;

/// Floor of the average of both sides' trust points.
pub fn mutual_trust(a: u32, b: u32) -> u32 {
    ((a as u64 + b as u64) / 2) as u32
}

/// The highest status whose threshold is met. `statuses` must be sorted
/// ascending by `min_trust`.
pub fn unlocked_status(statuses: &[Status], mutual: u32) -> Option<&Status> {
    statuses.iter().take_while(|s| s.min_trust <= mutual).last()
}

/// Every action belonging to a status whose threshold is met.
pub fn unlockable_actions(statuses: &[Status], mutual: u32) -> impl Iterator<Item = &Action> {
    statuses
        .iter()
        .filter(move |s| s.min_trust <= mutual)
        .flat_map(|s| s.actions.iter())
}

pub fn is_action_unlocked(statuses: &[Status], mutual: u32, action_id: i64) -> bool {
    unlockable_actions(statuses, mutual).any(|a| a.id == action_id)
}

/// Apply a signed change to one side's trust points, clamped to
/// `0..=MAX_TRUST_POINTS`.
pub fn apply_trust_delta(current: u32, delta: i64) -> u32 {
    let next = (current as i64).saturating_add(delta);
    next.clamp(0, MAX_TRUST_POINTS as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Status> {
        let mk = |id: i64, name: &str, min_trust: u32, actions: &[(i64, &str)]| Status {
            id,
            name: name.to_string(),
            min_trust,
            actions: actions
                .iter()
                .enumerate()
                .map(|(i, (aid, aname))| Action {
                    id: *aid,
                    status_id: id,
                    name: aname.to_string(),
                    position: i as u32,
                })
                .collect(),
        };
        vec![
            mk(1, "Stranger", 0, &[(11, "Wave")]),
            mk(2, "Friend", 10, &[(21, "Coffee")]),
            mk(3, "Close", 50, &[(31, "Coffee"), (32, "Keys")]),
        ]
    }

    #[test]
    fn test_mutual_trust_floors_average() {
        assert_eq!(mutual_trust(3, 4), 3);
        assert_eq!(mutual_trust(0, 0), 0);
        assert_eq!(mutual_trust(100, 100), 100);
        assert_eq!(mutual_trust(u32::MAX, u32::MAX), u32::MAX);
    }

    #[test]
    fn test_unlocked_status_selection() {
        let statuses = catalog();
        assert_eq!(unlocked_status(&statuses, 25).map(|s| s.name.as_str()), Some("Friend"));
        assert_eq!(unlocked_status(&statuses, 5).map(|s| s.name.as_str()), Some("Stranger"));
        assert_eq!(unlocked_status(&statuses, 50).map(|s| s.name.as_str()), Some("Close"));
        assert!(unlocked_status(&[], 25).is_none());
    }

    #[test]
    fn test_no_status_when_threshold_unmet() {
        let statuses: Vec<Status> = catalog().into_iter().skip(1).collect();
        assert!(unlocked_status(&statuses, 9).is_none());
    }

    #[test]
    fn test_unlockable_actions_include_lower_tiers() {
        let statuses = catalog();
        let ids: Vec<i64> = unlockable_actions(&statuses, 25).map(|a| a.id).collect();
        assert_eq!(ids, vec![11, 21]);
        assert!(is_action_unlocked(&statuses, 25, 21));
        assert!(!is_action_unlocked(&statuses, 25, 32));
    }

    #[test]
    fn test_trust_delta_is_clamped() {
        assert_eq!(apply_trust_delta(5, 3), 8);
        assert_eq!(apply_trust_delta(5, -10), 0);
        assert_eq!(apply_trust_delta(95, 10), MAX_TRUST_POINTS);
        assert_eq!(apply_trust_delta(0, i64::MIN), 0);
    }
}
