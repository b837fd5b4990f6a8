#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use proptest::prelude::*;
use utub_core::deck::{Deck, DeckKind, DeckReport, ExitTransition, RenderContext, RenderHooks};
use utub_core::model::{TagId, UrlPayload};
use utub_core::view::Document;

/// Small id space so that generated lists overlap often.
pub fn arb_id_set() -> impl Strategy<Value = BTreeSet<u64>> {
    prop::collection::btree_set(1u64..24, 0..12)
}

/// URL payloads for a shuffled id list, with a chance of a malformed entry
/// (missing id or blank href) mixed in.
pub fn arb_url_payloads() -> impl Strategy<Value = Vec<UrlPayload>> {
    prop::collection::vec((1u64..24, any::<bool>(), 0u8..10), 0..14).prop_map(|rows| {
        rows.into_iter()
            .map(|(id, tagged, noise)| match noise {
                0 => UrlPayload {
                    id: None,
                    ..UrlPayload::new(id, "orphan", "https://example.test", &[])
                },
                1 => UrlPayload::new(id, "blank", "   ", &[]),
                _ => {
                    let tags = if tagged { vec![1] } else { Vec::new() };
                    UrlPayload::new(
                        id,
                        &format!("url {id}"),
                        &format!("https://example.test/{id}"),
                        &tags,
                    )
                }
            })
            .collect()
    })
}

/// Ids a payload list resolves to after malformed entries are skipped.
pub fn valid_url_ids(payloads: &[UrlPayload]) -> BTreeSet<u64> {
    payloads
        .iter()
        .filter(|p| p.href.as_deref().is_some_and(|href| !href.trim().is_empty()))
        .filter_map(|p| p.id)
        .collect()
}

/// Every id a payload list names, valid entry or not. A malformed entry
/// with an id keeps an element that is already on screen.
pub fn listed_url_ids(payloads: &[UrlPayload]) -> BTreeSet<u64> {
    payloads.iter().filter_map(|p| p.id).collect()
}

/// A document with one mounted deck and an empty render context.
pub struct Harness<K: DeckKind> {
    pub doc: Document,
    pub deck: Deck<K>,
    pub tag_names: BTreeMap<TagId, String>,
    pub selected: BTreeSet<TagId>,
    pub hooks: RenderHooks,
}

impl<K: DeckKind> Harness<K> {
    pub fn new(transition: ExitTransition) -> Self {
        let mut doc = Document::new();
        let body = doc.body();
        let deck = Deck::mount(&mut doc, body, transition).expect("mount deck");
        Self {
            doc,
            deck,
            tag_names: BTreeMap::from([(TagId(1), "rust".to_string())]),
            selected: BTreeSet::new(),
            hooks: RenderHooks::default(),
        }
    }

    pub fn reconcile(&mut self, payloads: &[K::Payload], now: Instant) -> DeckReport<K::Id> {
        let ctx = RenderContext {
            active_utub: None,
            tag_names: &self.tag_names,
            selected_tags: &self.selected,
            hooks: &self.hooks,
        };
        self.deck
            .reconcile(&mut self.doc, payloads, &ctx, now)
            .expect("reconcile")
    }

    pub fn ids(&self) -> Vec<K::Id> {
        self.deck.ids(&self.doc).expect("ids")
    }
}
