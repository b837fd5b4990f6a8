use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use proptest::prelude::*;
use utub_core::deck::{ExitTransition, Urls, diff};
use utub_core::model::{UrlId, UrlPayload};

#[path = "generators.rs"]
mod generators;
use generators::*;

fn url_ids(ids: &BTreeSet<u64>) -> BTreeSet<UrlId> {
    ids.iter().copied().map(UrlId).collect()
}

/// Valid ids, plus ids of malformed entries whose element was already shown.
fn expected_after(before: &BTreeSet<UrlId>, payloads: &[UrlPayload]) -> BTreeSet<UrlId> {
    let listed = url_ids(&listed_url_ids(payloads));
    let mut expected = url_ids(&valid_url_ids(payloads));
    expected.extend(before.intersection(&listed).copied());
    expected
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn delta_halves_are_disjoint(old in arb_id_set(), new in arb_id_set()) {
        let delta = diff(&old, &new);
        prop_assert!(delta.to_remove.is_disjoint(&delta.to_add));
        prop_assert!(delta.to_remove.is_subset(&old));
        prop_assert!(delta.to_add.is_subset(&new));
    }

    #[test]
    fn delta_applied_to_old_yields_new(old in arb_id_set(), new in arb_id_set()) {
        prop_assert_eq!(diff(&old, &new).apply(&old), new);
    }

    #[test]
    fn reconcile_matches_valid_payload_ids(
        first in arb_url_payloads(),
        second in arb_url_payloads(),
    ) {
        let mut h = Harness::<Urls>::new(ExitTransition::Instant);
        let now = Instant::now();

        h.reconcile(&first, now);
        let on_screen: BTreeSet<UrlId> = h.ids().into_iter().collect();
        prop_assert_eq!(on_screen.clone(), url_ids(&valid_url_ids(&first)));

        let before = on_screen;
        h.reconcile(&second, now);
        let on_screen: BTreeSet<UrlId> = h.ids().into_iter().collect();
        prop_assert_eq!(on_screen, expected_after(&before, &second));
    }

    #[test]
    fn second_identical_pass_mutates_nothing(payloads in arb_url_payloads()) {
        let mut h = Harness::<Urls>::new(ExitTransition::Instant);
        let now = Instant::now();

        h.reconcile(&payloads, now);
        let mutations = h.doc.mutation_count();
        let report = h.reconcile(&payloads, now);

        prop_assert_eq!(h.doc.mutation_count(), mutations);
        prop_assert!(report.is_unchanged());
    }

    #[test]
    fn retained_elements_keep_handle_and_relative_order(
        first in arb_url_payloads(),
        second in arb_url_payloads(),
    ) {
        let mut h = Harness::<Urls>::new(ExitTransition::Instant);
        let now = Instant::now();
        h.reconcile(&first, now);

        let before: BTreeMap<UrlId, _> = h
            .ids()
            .into_iter()
            .map(|id| (id, h.deck.find(&h.doc, id).expect("find").expect("present").handle))
            .collect();
        let order_before = h.ids();

        let report = h.reconcile(&second, now);

        for id in &report.retained {
            let found = h.deck.find(&h.doc, *id).expect("find").expect("retained");
            prop_assert_eq!(Some(&found.handle), before.get(id));
        }
        let retained: BTreeSet<UrlId> = report.retained.iter().copied().collect();
        let kept_before: Vec<UrlId> = order_before.into_iter().filter(|id| retained.contains(id)).collect();
        let kept_after: Vec<UrlId> = h.ids().into_iter().filter(|id| retained.contains(id)).collect();
        prop_assert_eq!(kept_before, kept_after);
    }

    #[test]
    fn faded_removals_converge_once_exits_complete(
        first in arb_url_payloads(),
        second in arb_url_payloads(),
    ) {
        let mut h = Harness::<Urls>::new(ExitTransition::Fade(Duration::from_millis(50)));
        let t0 = Instant::now();
        h.reconcile(&first, t0);
        h.reconcile(&first, t0);
        let removing = h.reconcile(&second, t0);
        prop_assert!(removing.deferred.is_empty());

        // A refresh listing the removed ids again while they are exiting
        // defers them instead of resurrecting the element.
        let again = h.reconcile(&first, t0 + Duration::from_millis(10));
        let expected: BTreeSet<UrlId> = removing
            .removed
            .iter()
            .copied()
            .filter(|id| url_ids(&listed_url_ids(&first)).contains(id))
            .collect();
        let deferred: BTreeSet<UrlId> = again.deferred.iter().copied().collect();
        prop_assert_eq!(deferred, expected);

        h.deck.tick(&mut h.doc, t0 + Duration::from_millis(60));
        prop_assert_eq!(h.deck.pending_exits(), 0);
        let before: BTreeSet<UrlId> = h.ids().into_iter().collect();
        h.reconcile(&second, t0 + Duration::from_millis(70));
        let on_screen: BTreeSet<UrlId> = h.ids().into_iter().collect();
        prop_assert_eq!(on_screen, expected_after(&before, &second));
    }
}
