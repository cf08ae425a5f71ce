use super::*;
use catalog_controller_core::{
    catalog::{node_type, service_type, workload_type},
    Request, ResourceId, Tenancy,
};
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rstest::rstest;
use std::collections::BTreeMap;

fn mk_index() -> DependencyIndex {
    DependencyIndex::new(IndexMetrics::register(&mut Default::default()))
}

fn node(name: &str) -> ResourceId {
    ResourceId::new(node_type(), Tenancy::default(), name)
}

fn workload(name: &str) -> ResourceId {
    ResourceId::new(workload_type(), Tenancy::default(), name)
}

/// Returns the names of the dependents tracked under `owner`, sorted.
#[track_caller]
fn tracked(index: &DependencyIndex, owner: &ResourceId) -> Vec<String> {
    index.assert_consistent();
    let mut names = index
        .query(owner)
        .into_iter()
        .map(|Request { id }| id.name)
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn unknown_owner_has_no_dependents() {
    let index = mk_index();
    assert!(index.query(&node("node-0")).is_empty());
    assert!(index.is_empty());
}

#[test]
fn track_is_idempotent() {
    let index = mk_index();
    for _ in 0..3 {
        index.track(workload("w1"), &node("n1"));
    }

    assert_eq!(index.query(&node("n1")), vec![Request::from(workload("w1"))]);
    assert_eq!(index.len(), 1);
    assert_eq!(index.owner_count(), 1);
}

#[test]
fn track_moves_between_owners() {
    let index = mk_index();
    index.track(workload("w1"), &node("n1"));
    index.track(workload("w1"), &node("n2"));

    assert_eq!(tracked(&index, &node("n1")), Vec::<String>::new());
    assert_eq!(tracked(&index, &node("n2")), vec!["w1"]);
    // The first owner's entry is dropped along with its last dependent.
    assert_eq!(index.owner_count(), 1);
}

#[test]
fn untrack_unknown_dependent() {
    let index = mk_index();
    index.track(workload("w1"), &node("n1"));
    index.untrack(&workload("w2"));
    assert_eq!(tracked(&index, &node("n1")), vec!["w1"]);
}

/// Walks through tracking, moving, and removing dependents from every position.
#[test]
fn track_move_untrack() {
    let index = mk_index();
    let (n1, n2) = (node("n1"), node("n2"));

    index.track(workload("w1"), &n1);
    index.track(workload("w2"), &n1);
    index.track(workload("w3"), &n2);
    index.track(workload("w4"), &n2);
    assert_eq!(tracked(&index, &n1), vec!["w1", "w2"]);
    assert_eq!(tracked(&index, &n2), vec!["w3", "w4"]);

    index.track(workload("w2"), &n2);
    assert_eq!(tracked(&index, &n1), vec!["w1"]);
    assert_eq!(tracked(&index, &n2), vec!["w2", "w3", "w4"]);

    index.untrack(&workload("w1"));
    assert_eq!(tracked(&index, &n1), Vec::<String>::new());

    // Moved dependents are appended, so n2 now holds [w3, w4, w2].
    let order = index
        .query(&n2)
        .into_iter()
        .map(|r| r.id.name)
        .collect::<Vec<_>>();
    assert_eq!(order, vec!["w3", "w4", "w2"]);

    // Middle.
    index.untrack(&workload("w4"));
    assert_eq!(tracked(&index, &n2), vec!["w2", "w3"]);

    // End.
    index.untrack(&workload("w2"));
    assert_eq!(tracked(&index, &n2), vec!["w3"]);

    // Sole.
    index.untrack(&workload("w3"));
    assert_eq!(tracked(&index, &n2), Vec::<String>::new());
    assert_eq!(index.owner_count(), 0);
    assert!(index.is_empty());
}

#[rstest]
#[case::first(&["w1", "w2", "w3"], "w1", &["w2", "w3"])]
#[case::middle(&["w1", "w2", "w3"], "w2", &["w1", "w3"])]
#[case::last(&["w1", "w2", "w3"], "w3", &["w1", "w2"])]
#[case::sole(&["w1"], "w1", &[])]
fn untrack_preserves_order_of_remaining(
    #[case] dependents: &[&str],
    #[case] removed: &str,
    #[case] expected: &[&str],
) {
    let index = mk_index();
    for name in dependents {
        index.track(workload(name), &node("n1"));
    }

    index.untrack(&workload(removed));

    let remaining = index
        .query(&node("n1"))
        .into_iter()
        .map(|r| r.id.name)
        .collect::<Vec<_>>();
    assert_eq!(remaining, expected);
    assert_eq!(index.owner_count(), usize::from(!expected.is_empty()));
    index.assert_consistent();
}

#[test]
fn query_returns_a_snapshot() {
    let index = mk_index();
    index.track(workload("w1"), &node("n1"));

    let mut snapshot = index.query(&node("n1"));
    snapshot.push(Request::from(workload("bogus")));
    index.track(workload("w2"), &node("n1"));
    index.untrack(&workload("w1"));

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0], Request::from(workload("w1")));
    assert_eq!(tracked(&index, &node("n1")), vec!["w2"]);
}

#[test]
fn owners_are_scoped_by_tenancy() {
    let index = mk_index();
    let other = Tenancy::new("other", "default", "local");
    let n1_other = ResourceId::new(node_type(), other.clone(), "n1");

    index.track(workload("w1"), &node("n1"));
    index.track(ResourceId::new(workload_type(), other, "w1"), &n1_other);

    assert_eq!(index.query(&node("n1")), vec![Request::from(workload("w1"))]);
    assert_eq!(index.query(&n1_other).len(), 1);
    assert_eq!(index.owner_count(), 2);
}

#[test]
fn owners_are_scoped_by_type() {
    let index = mk_index();
    let svc = ResourceId::new(service_type(), Tenancy::default(), "n1");

    index.track(workload("w1"), &node("n1"));

    assert!(index.query(&svc).is_empty());
    assert_eq!(index.query(&node("n1")), vec![Request::from(workload("w1"))]);

    index.track(workload("w2"), &svc);
    assert_eq!(index.query(&svc), vec![Request::from(workload("w2"))]);
    assert_eq!(index.owner_count(), 2);
}

#[test]
fn dependents_differing_only_by_tenancy_are_distinct() {
    let index = mk_index();
    let other = ResourceId::new(
        workload_type(),
        Tenancy::new("default", "other", "local"),
        "w1",
    );

    index.track(workload("w1"), &node("n1"));
    index.track(other.clone(), &node("n1"));
    assert_eq!(index.len(), 2);

    index.untrack(&other);
    assert_eq!(index.query(&node("n1")), vec![Request::from(workload("w1"))]);
}

#[test]
fn reset_replaces_all_state() {
    let index = mk_index();
    index.track(workload("w1"), &node("n1"));
    index.track(workload("w2"), &node("n1"));

    index.reset(vec![
        (workload("w2"), node("n2")),
        (workload("w3"), node("n2")),
        (workload("w3"), node("n3")),
    ]);

    assert_eq!(tracked(&index, &node("n1")), Vec::<String>::new());
    assert_eq!(tracked(&index, &node("n2")), vec!["w2"]);
    assert_eq!(tracked(&index, &node("n3")), vec!["w3"]);
    assert_eq!(index.len(), 2);
}

#[test]
#[should_panic(expected = "invalid owner resource id")]
fn track_rejects_unnamed_owner() {
    mk_index().track(workload("w1"), &node(""));
}

#[test]
#[should_panic(expected = "invalid dependent resource id")]
fn untrack_rejects_unnamed_dependent() {
    mk_index().untrack(&workload(""));
}

#[test]
fn rejected_reset_leaves_index_untouched() {
    let index = std::sync::Arc::new(mk_index());
    index.track(workload("w1"), &node("n1"));

    let idx = index.clone();
    let res = std::thread::spawn(move || {
        idx.reset(vec![(workload("w2"), node("n1")), (workload("w3"), node(""))]);
    })
    .join();

    assert!(res.is_err());
    assert_eq!(tracked(&index, &node("n1")), vec!["w1"]);
}

#[test]
fn metrics() {
    let mut prom = prometheus_client::registry::Registry::default();
    let index = DependencyIndex::shared(IndexMetrics::register(&mut prom));
    metrics::register_size(&mut prom, index.clone());

    index.track(workload("w1"), &node("n1"));
    index.track(workload("w1"), &node("n1"));
    index.track(workload("w1"), &node("n2"));
    index.track(workload("w2"), &node("n2"));
    index.untrack(&workload("w2"));
    index.untrack(&workload("w2"));
    index.query(&node("n2"));

    let mut buf = String::new();
    prometheus_client::encoding::text::encode(&mut buf, &prom).unwrap();
    for line in [
        "dependency_index_tracks_total 3",
        "dependency_index_moves_total 1",
        "dependency_index_untracks_total 1",
        "dependency_index_queries_total 1",
        "dependency_index_owners 1",
        "dependency_index_dependents 1",
    ] {
        assert!(buf.lines().any(|l| l == line), "missing {line:?} in:\n{buf}");
    }
}

/// Workers own disjoint dependents but share owners. Each worker's final view of its own
/// dependents must be reflected exactly by the index.
#[test]
fn concurrent_workers_converge() {
    const WORKERS: usize = 8;
    const DEPENDENTS: usize = 16;
    const OPS: usize = 2_000;

    let index = mk_index();
    let owners = (0..4).map(|i| node(&format!("n{i}"))).collect::<Vec<_>>();

    let expected = std::thread::scope(|s| {
        let handles = (0..WORKERS)
            .map(|w| {
                let index = &index;
                let owners = &owners;
                s.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(w as u64);
                    let mut model = BTreeMap::<ResourceId, Option<ResourceId>>::new();
                    for _ in 0..OPS {
                        let d = rng.random_range(0..DEPENDENTS);
                        let dependent = workload(&format!("w{w}-{d}"));
                        if rng.random_bool(0.25) {
                            index.untrack(&dependent);
                            model.insert(dependent, None);
                        } else {
                            let owner = &owners[rng.random_range(0..owners.len())];
                            index.track(dependent.clone(), owner);
                            model.insert(dependent, Some(owner.clone()));
                        }
                    }
                    model
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<BTreeMap<_, _>>()
    });

    index.assert_consistent();
    for owner in &owners {
        let mut actual = index
            .query(owner)
            .into_iter()
            .map(|r| r.id)
            .collect::<Vec<_>>();
        actual.sort();
        let want = expected
            .iter()
            .filter(|(_, o)| o.as_ref() == Some(owner))
            .map(|(d, _)| d.clone())
            .collect::<Vec<_>>();
        assert_eq!(actual, want, "owner {owner}");
    }
    assert_eq!(index.len(), expected.values().flatten().count());
}

/// Workers race over the same dependents. Whatever the interleaving, no dependent may end up
/// with two owners or twice under one owner.
#[test]
fn concurrent_workers_share_dependents() {
    const WORKERS: u64 = 8;

    let index = mk_index();
    let owners = (0..3).map(|i| node(&format!("n{i}"))).collect::<Vec<_>>();
    let dependents = (0..6).map(|i| workload(&format!("w{i}"))).collect::<Vec<_>>();

    std::thread::scope(|s| {
        for w in 0..WORKERS {
            let (index, owners, dependents) = (&index, &owners, &dependents);
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(100 + w);
                for _ in 0..2_000 {
                    let dependent = &dependents[rng.random_range(0..dependents.len())];
                    match rng.random_range(0..4) {
                        0 => index.untrack(dependent),
                        1 => {
                            let owner = &owners[rng.random_range(0..owners.len())];
                            let reqs = index.query(owner);
                            let mut ids = reqs.iter().map(|r| &r.id).collect::<Vec<_>>();
                            ids.sort();
                            ids.dedup();
                            assert_eq!(ids.len(), reqs.len(), "duplicate dependents");
                        }
                        _ => {
                            let owner = &owners[rng.random_range(0..owners.len())];
                            index.track(dependent.clone(), owner);
                        }
                    }
                }
            });
        }
    });

    index.assert_consistent();
    assert!(index.len() <= dependents.len());
    let total = owners.iter().map(|o| index.query(o).len()).sum::<usize>();
    assert_eq!(total, index.len());
}
