use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use tagscout_core::{Account, DedupAggregator, DiscoveryItem, Insertion, Post};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

fn item(identity: &str, post_id: &str, seconds: i64) -> DiscoveryItem {
    DiscoveryItem::new(
        Account {
            identity: identity.to_string(),
            id: None,
            display: serde_json::Value::Null,
            discoverable: Some(true),
        },
        Post {
            id: post_id.to_string(),
            created_at: at(seconds),
            url: None,
        },
    )
}

#[test]
fn later_post_wins_for_same_identity() {
    let mut aggregator = DedupAggregator::new();
    assert_eq!(
        aggregator.insert(item("bob@example.social", "1", 1)),
        Insertion::Inserted
    );
    assert_eq!(
        aggregator.insert(item("Bob@Example.Social", "2", 2)),
        Insertion::Replaced
    );

    let items = aggregator.into_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].post.id, "2");
    assert_eq!(items[0].post.created_at, at(2));
}

#[test]
fn older_or_equal_post_keeps_existing_entry() {
    let mut aggregator = DedupAggregator::new();
    aggregator.insert(item("bob@example.social", "first", 5));

    assert_eq!(
        aggregator.insert(item("bob@example.social", "tie", 5)),
        Insertion::Kept
    );
    assert_eq!(
        aggregator.insert(item("bob@example.social", "older", 4)),
        Insertion::Kept
    );
    assert_eq!(aggregator.into_items()[0].post.id, "first");
}

#[test]
fn sorted_output_is_newest_first_and_stable_on_ties() {
    let aggregator: DedupAggregator = vec![
        item("a@x.example", "a", 10),
        item("b@x.example", "b", 30),
        item("c@x.example", "c", 10),
        item("d@x.example", "d", 20),
    ]
    .into_iter()
    .collect();

    let order: Vec<_> = aggregator
        .into_sorted()
        .into_iter()
        .map(|item| item.post.id)
        .collect();
    assert_eq!(order, vec!["b", "d", "a", "c"]);
}

#[test]
fn replacement_keeps_first_seen_position() {
    let mut aggregator = DedupAggregator::new();
    aggregator.insert(item("alice@a.example", "old", 10));
    aggregator.insert(item("bob@a.example", "bob", 20));
    aggregator.insert(item("alice@a.example", "new", 30));

    let ids: Vec<_> = aggregator
        .into_items()
        .into_iter()
        .map(|item| item.post.id)
        .collect();
    assert_eq!(ids, vec!["new", "bob"]);
}
