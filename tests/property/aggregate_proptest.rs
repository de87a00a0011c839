//! Property-based tests for derived aggregate progress

use progress_sync::shared::aggregate::{get_progress, remove_child, update_progress, AggregateTrackable, ChildRemoval};
use progress_sync::shared::trackable::PrimitiveTrackable;
use proptest::prelude::*;

fn goals() -> impl Strategy<Value = Vec<PrimitiveTrackable>> {
    prop::collection::vec((0.0f64..200.0, 0.0f64..100.0), 1..8).prop_map(|values| {
        values
            .into_iter()
            .enumerate()
            .map(|(index, (progress, max))| PrimitiveTrackable::goal(format!("g{}", index), progress, max))
            .collect()
    })
}

fn counters() -> impl Strategy<Value = Vec<PrimitiveTrackable>> {
    prop::collection::vec(0.0f64..1000.0, 1..8).prop_map(|values| {
        values
            .into_iter()
            .enumerate()
            .map(|(index, progress)| PrimitiveTrackable::counter(format!("c{}", index), progress))
            .collect()
    })
}

proptest! {
    #[test]
    fn test_goal_progress_is_mean_ratio(children in goals()) {
        let progress = get_progress(&children);
        let expected = children.iter().map(|child| child.ratio()).sum::<f64>() / children.len() as f64;

        prop_assert_eq!(progress.max, Some(1.0));
        prop_assert!((progress.current - expected).abs() < 1e-9);
        prop_assert!(progress.current.is_finite());
    }

    #[test]
    fn test_counter_progress_is_sum(children in counters()) {
        let progress = get_progress(&children);
        let expected: f64 = children.iter().map(|child| child.progress).sum();

        prop_assert_eq!(progress.max, None);
        prop_assert!((progress.current - expected).abs() < 1e-6);
    }

    #[test]
    fn test_progress_matches_children_after_update(children in counters(), value in 0.0f64..1000.0) {
        let mut aggregate = AggregateTrackable::new("agg", children);
        update_progress(&mut aggregate, Some(("c0", value)));

        let recomputed = get_progress(aggregate.children());
        prop_assert_eq!(aggregate.progress(), recomputed.current);
        prop_assert_eq!(aggregate.children()[0].progress, value);
    }

    #[test]
    fn test_removing_every_child_empties_aggregate(children in goals()) {
        let ids: Vec<String> = children.iter().map(|child| child.id.clone()).collect();
        let mut aggregate = AggregateTrackable::new("agg", children);

        for (index, id) in ids.iter().enumerate() {
            let outcome = remove_child(id, &mut aggregate);
            if index + 1 == ids.len() {
                prop_assert_eq!(outcome, ChildRemoval::NowEmpty);
            } else {
                prop_assert_eq!(outcome, ChildRemoval::StillHasChildren);
                prop_assert_eq!(aggregate.progress(), get_progress(aggregate.children()).current);
            }
        }
        prop_assert!(aggregate.children().is_empty());
    }
}
