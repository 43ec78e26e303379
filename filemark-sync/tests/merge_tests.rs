mod support;

use filemark_sync::{SyncSnapshot, TOMBSTONE_RETENTION, merge, merge_with_retention};
use filemark_types::SyncMetadata;
use pretty_assertions::assert_eq;
use std::time::Duration;
use support::{T0, bookmark, tombstone};

const DAY: i64 = 24 * 60 * 60 * 1000;

fn snapshot(bookmarks: Vec<filemark_types::Bookmark>, version: u32) -> SyncSnapshot {
    let mut metadata = SyncMetadata::create(0);
    metadata.version = version;
    SyncSnapshot {
        bookmarks,
        metadata,
    }
}

fn ids(s: &SyncSnapshot) -> Vec<&str> {
    s.bookmarks.iter().map(|b| b.id.as_str()).collect()
}

// ── Basics ──────────────────────────────────────────────────────

#[test]
fn absent_remote_is_identity() {
    let local = snapshot(vec![bookmark("a", 10), tombstone("old", 1)], 1);
    assert_eq!(merge(&local, None, T0), local);
}

#[test]
fn equal_timestamps_keep_local() {
    let mut ours = bookmark("a", 100);
    ours.name = "local".into();
    let mut theirs = bookmark("a", 100);
    theirs.name = "remote".into();

    let out = merge(&snapshot(vec![ours], 1), Some(&snapshot(vec![theirs], 1)), T0);
    assert_eq!(out.bookmarks[0].name, "local");
}

#[test]
fn strictly_newer_remote_wins() {
    let mut ours = bookmark("a", 100);
    ours.name = "local".into();
    let mut theirs = bookmark("a", 101);
    theirs.name = "remote".into();

    let out = merge(&snapshot(vec![ours], 1), Some(&snapshot(vec![theirs], 1)), T0);
    assert_eq!(out.bookmarks[0].name, "remote");
}

#[test]
fn newer_local_wins() {
    let ours = bookmark("a", 300);
    let theirs = tombstone("a", 200);
    let out = merge(&snapshot(vec![ours.clone()], 1), Some(&snapshot(vec![theirs], 1)), T0);
    assert_eq!(out.bookmarks, vec![ours]);
}

#[test]
fn new_remote_bookmark_is_added() {
    let out = merge(
        &snapshot(vec![], 1),
        Some(&snapshot(vec![bookmark("b", 50)], 1)),
        T0,
    );
    assert_eq!(ids(&out), vec!["b"]);
}

#[test]
fn new_remote_tombstone_is_not_resurrected() {
    let out = merge(
        &snapshot(vec![], 1),
        Some(&snapshot(vec![tombstone("gone", T0 - DAY)], 1)),
        T0,
    );
    assert!(out.bookmarks.is_empty());
}

#[test]
fn remote_order_then_local_only_in_local_order() {
    let local = snapshot(vec![bookmark("x", 1), bookmark("b", 1), bookmark("y", 1)], 1);
    let remote = snapshot(vec![bookmark("c", 1), bookmark("b", 1), bookmark("a", 1)], 1);
    let out = merge(&local, Some(&remote), T0);
    assert_eq!(ids(&out), vec!["c", "b", "a", "x", "y"]);
}

#[test]
fn duplicate_remote_ids_first_wins() {
    let mut first = bookmark("a", 10);
    first.name = "first".into();
    let mut second = bookmark("a", 99);
    second.name = "second".into();
    let out = merge(&snapshot(vec![], 1), Some(&snapshot(vec![first, second], 1)), T0);
    assert_eq!(out.bookmarks.len(), 1);
    assert_eq!(out.bookmarks[0].name, "first");
}

// ── Tombstones ──────────────────────────────────────────────────

#[test]
fn tombstone_older_than_retention_is_dropped() {
    let local = snapshot(vec![tombstone("old", T0 - 31 * DAY)], 1);
    let out = merge(&local, Some(&snapshot(vec![], 1)), T0);
    assert!(out.bookmarks.is_empty());
}

#[test]
fn tombstone_inside_retention_is_kept() {
    let local = snapshot(vec![tombstone("recent", T0 - 29 * DAY)], 1);
    let out = merge(&local, Some(&snapshot(vec![], 1)), T0);
    assert_eq!(ids(&out), vec!["recent"]);
}

#[test]
fn tombstone_exactly_at_cutoff_is_dropped() {
    let local = snapshot(vec![tombstone("edge", T0 - 30 * DAY)], 1);
    let out = merge(&local, Some(&snapshot(vec![], 1)), T0);
    assert!(out.bookmarks.is_empty());
}

#[test]
fn winning_remote_tombstone_propagates_within_retention() {
    let local = snapshot(vec![bookmark("a", T0 - 2 * DAY)], 1);
    let remote = snapshot(vec![tombstone("a", T0 - DAY)], 1);
    let out = merge(&local, Some(&remote), T0);
    assert_eq!(out.bookmarks, vec![tombstone("a", T0 - DAY)]);
}

#[test]
fn active_bookmarks_never_expire() {
    let local = snapshot(vec![bookmark("ancient", 1)], 1);
    let out = merge(&local, Some(&snapshot(vec![], 1)), T0);
    assert_eq!(ids(&out), vec!["ancient"]);
}

#[test]
fn custom_retention_is_honoured() {
    let local = snapshot(vec![tombstone("t", T0 - 2 * DAY)], 1);
    let remote = snapshot(vec![], 1);
    assert!(
        merge_with_retention(&local, Some(&remote), T0, Duration::from_secs(24 * 60 * 60))
            .bookmarks
            .is_empty()
    );
    assert_eq!(
        merge_with_retention(&local, Some(&remote), T0, TOMBSTONE_RETENTION).bookmarks.len(),
        1
    );
}

#[test]
fn scenario_remote_tombstone_beats_local_and_new_remote_is_added() {
    let local = snapshot(vec![bookmark("A", 100)], 1);
    let remote = snapshot(vec![tombstone("A", 200), bookmark("B", 50)], 1);
    let out = merge(&local, Some(&remote), T0);
    assert_eq!(out.bookmarks, vec![bookmark("B", 50)]);
}

// ── Metadata ────────────────────────────────────────────────────

#[test]
fn metadata_takes_max_version_and_stamps_now() {
    let local = snapshot(vec![], 1);
    let remote = snapshot(vec![], 3);
    let out = merge(&local, Some(&remote), T0);

    assert_eq!(out.metadata.version, 3);
    assert_eq!(out.metadata.last_modified_time, T0);
    assert_eq!(out.metadata.device_id, local.metadata.device_id);
    assert_eq!(out.metadata.last_sync_time, local.metadata.last_sync_time);
}

#[test]
fn inputs_are_not_mutated() {
    let local = snapshot(vec![bookmark("a", 1)], 1);
    let remote = snapshot(vec![bookmark("a", 2)], 2);
    let (local_before, remote_before) = (local.clone(), remote.clone());
    let _ = merge(&local, Some(&remote), T0);
    assert_eq!(local, local_before);
    assert_eq!(remote, remote_before);
}

mod proptests {
    use super::*;
    use filemark_types::Bookmark;
    use proptest::prelude::*;

    fn arb_side() -> impl Strategy<Value = Vec<Bookmark>> {
        proptest::collection::vec(
            ("[a-e]", 0i64..(T0 + DAY), any::<bool>()).prop_map(|(id, modified_at, deleted)| {
                if deleted {
                    tombstone(&id, modified_at)
                } else {
                    bookmark(&id, modified_at)
                }
            }),
            0..8,
        )
    }

    proptest! {
        #[test]
        fn merge_is_deterministic(local in arb_side(), remote in arb_side()) {
            let local = snapshot(local, 1);
            let remote = snapshot(remote, 2);
            prop_assert_eq!(merge(&local, Some(&remote), T0), merge(&local, Some(&remote), T0));
        }

        #[test]
        fn merged_ids_are_unique(local in arb_side(), remote in arb_side()) {
            let out = merge(&snapshot(local, 1), Some(&snapshot(remote, 1)), T0);
            let mut seen = std::collections::HashSet::new();
            for b in &out.bookmarks {
                prop_assert!(seen.insert(b.id.clone()));
            }
        }

        #[test]
        fn no_expired_tombstone_survives(local in arb_side(), remote in arb_side()) {
            let out = merge(&snapshot(local, 1), Some(&snapshot(remote, 1)), T0);
            let cutoff = T0 - 30 * DAY;
            prop_assert!(out.bookmarks.iter().all(|b| !b.is_deleted || b.modified_at > cutoff));
        }
    }
}
