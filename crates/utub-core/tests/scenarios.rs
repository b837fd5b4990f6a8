use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use utub_core::deck::render::URL_DELETE_CLASS;
use utub_core::deck::{EXITING_CLASS, ExitTransition, Members, Tags, Urls, render};
use utub_core::model::{MemberId, MemberPayload, TagId, TagPayload, UrlId, UrlPayload};
use utub_core::view::EventKind;

#[path = "generators.rs"]
mod generators;
use generators::Harness;

fn urls(ids: &[u64]) -> Vec<UrlPayload> {
    ids.iter()
        .map(|id| UrlPayload::new(*id, &format!("url {id}"), &format!("https://example.test/{id}"), &[]))
        .collect()
}

fn handle_of(h: &Harness<Urls>, id: u64) -> utub_core::view::ElementHandle {
    h.deck
        .find(&h.doc, UrlId(id))
        .expect("find")
        .expect("element present")
        .handle
}

#[test]
fn overlapping_refresh_removes_one_and_appends_one() {
    let mut h = Harness::<Urls>::new(ExitTransition::Instant);
    let now = Instant::now();
    h.reconcile(&urls(&[1, 2, 3]), now);
    let two = handle_of(&h, 2);
    let three = handle_of(&h, 3);

    let report = h.reconcile(&urls(&[2, 3, 4]), now);

    assert_eq!(report.removed, [UrlId(1)]);
    assert_eq!(report.added, [UrlId(4)]);
    assert_eq!(report.retained, [UrlId(2), UrlId(3)]);
    assert_eq!(h.ids(), [UrlId(2), UrlId(3), UrlId(4)]);
    assert_eq!(handle_of(&h, 2), two);
    assert_eq!(handle_of(&h, 3), three);
}

#[test]
fn empty_deck_appends_in_payload_order() {
    let mut h = Harness::<Urls>::new(ExitTransition::Instant);
    let report = h.reconcile(&urls(&[6, 5]), Instant::now());

    assert_eq!(report.added, [UrlId(6), UrlId(5)]);
    assert_eq!(h.ids(), [UrlId(6), UrlId(5)]);

    let mut h = Harness::<Urls>::new(ExitTransition::Instant);
    h.reconcile(&urls(&[5, 6]), Instant::now());
    assert_eq!(h.ids(), [UrlId(5), UrlId(6)]);
}

#[test]
fn reordered_payload_changes_nothing() {
    let mut h = Harness::<Urls>::new(ExitTransition::Instant);
    let now = Instant::now();
    h.reconcile(&urls(&[1, 2]), now);
    let mutations = h.doc.mutation_count();

    let report = h.reconcile(&urls(&[2, 1]), now);

    assert!(report.is_unchanged());
    assert_eq!(h.doc.mutation_count(), mutations);
    assert_eq!(h.ids(), [UrlId(1), UrlId(2)]);
}

#[test]
fn entity_without_id_is_skipped() {
    let mut h = Harness::<Urls>::new(ExitTransition::Instant);
    let mut payloads = urls(&[1, 2]);
    payloads.insert(1, UrlPayload { id: None, ..UrlPayload::new(0, "no id", "https://example.test", &[]) });

    let report = h.reconcile(&payloads, Instant::now());

    assert_eq!(report.malformed, 1);
    assert_eq!(h.ids(), [UrlId(1), UrlId(2)]);
}

#[test]
fn shown_entity_whose_entry_turns_malformed_is_kept() {
    let mut h = Harness::<Urls>::new(ExitTransition::Instant);
    let now = Instant::now();
    h.reconcile(&urls(&[1, 2]), now);
    let two = handle_of(&h, 2);
    let mutations = h.doc.mutation_count();

    let mut payloads = urls(&[1, 2]);
    payloads[1].title = None;
    let report = h.reconcile(&payloads, now);

    assert!(report.removed.is_empty());
    assert_eq!(report.retained, [UrlId(1), UrlId(2)]);
    assert_eq!(report.malformed, 1);
    assert_eq!(h.ids(), [UrlId(1), UrlId(2)]);
    assert_eq!(handle_of(&h, 2), two);
    assert_eq!(h.doc.mutation_count(), mutations);

    // An unseen id on a malformed entry is still never rendered.
    let mut payloads = urls(&[1, 2, 3]);
    payloads[2].href = Some("  ".to_string());
    let report = h.reconcile(&payloads, now);
    assert!(report.added.is_empty());
    assert_eq!(h.ids(), [UrlId(1), UrlId(2)]);
}

#[test]
fn exiting_id_listed_again_is_deferred_then_readded() {
    let mut h = Harness::<Urls>::new(ExitTransition::from_millis(300));
    let t0 = Instant::now();
    h.reconcile(&urls(&[7, 8]), t0);
    let seven = handle_of(&h, 7);

    let removing = h.reconcile(&urls(&[8]), t0);
    assert_eq!(removing.removed, [UrlId(7)]);
    assert_eq!(h.doc.has_class(seven, EXITING_CLASS), Ok(true));

    let refresh = h.reconcile(&urls(&[7, 8]), t0 + Duration::from_millis(100));
    assert_eq!(refresh.deferred, [UrlId(7)]);
    assert!(refresh.added.is_empty());
    assert_eq!(h.doc.has_class(seven, EXITING_CLASS), Ok(true));

    assert_eq!(h.deck.tick(&mut h.doc, t0 + Duration::from_millis(300)), 1);
    assert!(!h.doc.contains(seven));
    assert_eq!(h.ids(), [UrlId(8)]);

    let readded = h.reconcile(&urls(&[7, 8]), t0 + Duration::from_millis(400));
    assert_eq!(readded.added, [UrlId(7)]);
    assert_ne!(handle_of(&h, 7), seven);
}

#[test]
fn second_removal_while_exiting_is_a_no_op() {
    let mut h = Harness::<Urls>::new(ExitTransition::from_millis(300));
    let t0 = Instant::now();
    h.reconcile(&urls(&[1, 2]), t0);
    h.reconcile(&urls(&[2]), t0);
    let mutations = h.doc.mutation_count();

    let outcome = h.deck.remove(&mut h.doc, UrlId(1), t0 + Duration::from_millis(10)).expect("remove");
    assert_eq!(outcome, utub_core::deck::RemoveOutcome::AlreadyExiting);
    assert_eq!(h.doc.mutation_count(), mutations);
    assert_eq!(h.deck.pending_exits(), 1);
}

#[test]
fn removed_elements_release_their_subscriptions() {
    let mut h = Harness::<Urls>::new(ExitTransition::Instant);
    let opened = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&opened);
    h.hooks.on_url_open = Some(Rc::new(move |id| sink.borrow_mut().push(id)));
    h.hooks.on_url_delete = Some(Rc::new(|_| {}));
    let now = Instant::now();

    h.reconcile(&urls(&[1, 2]), now);
    // Click and focus on the row, click on the delete button.
    assert_eq!(h.doc.live_subscriptions(), 6);

    let row = handle_of(&h, 2);
    h.doc.dispatch(row, EventKind::Click).expect("click");
    assert_eq!(*opened.borrow(), [UrlId(2)]);

    h.reconcile(&urls(&[1]), now);
    assert_eq!(h.doc.live_subscriptions(), 3);

    let one = handle_of(&h, 1);
    let delete = render::child_with_class(&h.doc, one, URL_DELETE_CLASS).expect("delete button");
    h.reconcile(&urls(&[]), now);
    assert_eq!(h.doc.live_subscriptions(), 0);
    assert!(h.doc.dispatch(delete, EventKind::Click).is_err());
}

#[test]
fn tag_deck_mirrors_server_list_including_unused_tags() {
    let mut h = Harness::<Tags>::new(ExitTransition::Instant);
    let now = Instant::now();
    let tags = vec![TagPayload::new(1, "rust"), TagPayload::new(2, "unused")];

    h.reconcile(&tags, now);
    assert_eq!(h.ids(), [TagId(1), TagId(2)]);

    let report = h.reconcile(&tags[..1], now);
    assert_eq!(report.removed, [TagId(2)]);
}

#[test]
fn member_deck_rejects_owner_without_blocking_others() {
    let mut h = Harness::<Members>::new(ExitTransition::Instant);
    let members = vec![
        MemberPayload::new(1, "owner", true),
        MemberPayload::new(2, "ada", false),
        MemberPayload::new(3, "   ", false),
    ];

    let report = h.reconcile(&members, Instant::now());
    assert_eq!(report.added, [MemberId(2)]);
    assert_eq!(report.malformed, 2);
}
