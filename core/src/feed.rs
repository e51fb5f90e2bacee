/// Bounded ordered store: the in-memory feed and its single merge operation
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// How the feed is ordered. Fixed when the feed is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Oldest first, new messages at the end (standard chat)
    #[default]
    Chronological,
    /// Newest first (feed style)
    NewestFirst,
}

impl OrderingPolicy {
    /// Comparator placing `a` relative to `b` under this policy
    pub fn compare(self, a: &Message, b: &Message) -> Ordering {
        match self {
            OrderingPolicy::Chronological => a.timestamp.cmp(&b.timestamp),
            OrderingPolicy::NewestFirst => b.timestamp.cmp(&a.timestamp),
        }
    }
}

/// Capacity-bounded, deduplicated, ordered collection of messages.
///
/// A `Feed` is a value: [`Feed::merge`] never mutates it and returns the next state instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    policy: OrderingPolicy,
    capacity: usize,
    messages: Vec<Message>,
}

impl Feed {
    /// Create an empty feed. A capacity of 0 is raised to 1.
    pub fn new(policy: OrderingPolicy, capacity: usize) -> Self {
        Self {
            policy,
            capacity: capacity.max(1),
            messages: Vec::new(),
        }
    }

    /// Merge incoming messages into the feed.
    ///
    /// Messages whose id is already present (or repeated earlier in `incoming`) are dropped and
    /// the remainder is unioned with the current contents. Which entries survive is decided by
    /// one relevance order for every policy: newest first, earlier insertion winning ties. The
    /// `capacity` most relevant are then laid out in the policy's display order.
    pub fn merge<I>(&self, incoming: I) -> Feed
    where
        I: IntoIterator<Item = Message>,
    {
        let mut known: HashSet<String> = self.messages.iter().map(|m| m.id.clone()).collect();
        let mut combined = self.messages.clone();

        for msg in incoming {
            if known.insert(msg.id.clone()) {
                combined.push(msg);
            }
        }

        if combined.len() == self.messages.len() {
            return self.clone();
        }

        // Position in `combined` is the observed insertion order
        let mut ranked: Vec<(usize, Message)> = combined.into_iter().enumerate().collect();
        ranked.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ia.cmp(ib)));
        ranked.truncate(self.capacity);

        let policy = self.policy;
        ranked.sort_by(|(ia, a), (ib, b)| policy.compare(a, b).then(ia.cmp(ib)));

        Feed {
            policy,
            capacity: self.capacity,
            messages: ranked.into_iter().map(|(_, m)| m).collect(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Most recent message regardless of policy
    pub fn latest(&self) -> Option<&Message> {
        match self.policy {
            OrderingPolicy::Chronological => self.messages.last(),
            OrderingPolicy::NewestFirst => self.messages.first(),
        }
    }

    /// Ids in feed order
    pub fn ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, Origin, SenderProfile};

    fn msg(id: &str, timestamp: i64) -> Message {
        Message {
            id: id.to_string(),
            text: format!("text {}", id),
            origin: Origin::Peer,
            sender_id: "peer-a".to_string(),
            sender_display: SenderProfile::new("alice"),
            timestamp,
            kind: MessageKind::Text,
        }
    }

    fn is_sorted(feed: &Feed) -> bool {
        feed.messages()
            .windows(2)
            .all(|w| feed.policy().compare(&w[0], &w[1]) != Ordering::Greater)
    }

    #[test]
    fn test_merge_sorts_chronologically() {
        let feed = Feed::new(OrderingPolicy::Chronological, 10)
            .merge(vec![msg("b", 200), msg("a", 100), msg("c", 300)]);
        assert_eq!(feed.ids(), vec!["a", "b", "c"]);
        assert_eq!(feed.latest().unwrap().id, "c");
    }

    #[test]
    fn test_merge_newest_first() {
        let feed = Feed::new(OrderingPolicy::NewestFirst, 10)
            .merge(vec![msg("a", 100), msg("c", 300), msg("b", 200)]);
        assert_eq!(feed.ids(), vec!["c", "b", "a"]);
        assert_eq!(feed.latest().unwrap().id, "c");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = vec![msg("a", 100), msg("b", 50)];
        let once = Feed::new(OrderingPolicy::Chronological, 5).merge(batch.clone());
        let twice = once.merge(batch);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_duplicate_id_keeps_first_record() {
        let mut later = msg("a", 999);
        later.text = "rewritten".to_string();
        later.origin = Origin::Local;

        let feed = Feed::new(OrderingPolicy::Chronological, 5)
            .merge(vec![msg("a", 100)])
            .merge(vec![later]);
        assert_eq!(feed.len(), 1);
        let kept = feed.get("a").unwrap();
        assert_eq!(kept.text, "text a");
        assert_eq!(kept.origin, Origin::Peer);
        assert_eq!(kept.timestamp, 100);
    }

    #[test]
    fn test_duplicates_within_one_batch() {
        let mut second = msg("x", 5);
        second.text = "second".to_string();
        let feed = Feed::new(OrderingPolicy::NewestFirst, 5).merge(vec![msg("x", 5), second]);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.get("x").unwrap().text, "text x");
    }

    #[test]
    fn test_capacity_evicts_oldest_under_both_policies() {
        let batch: Vec<Message> = (0..8).map(|i| msg(&i.to_string(), i * 10)).collect();

        let chrono = Feed::new(OrderingPolicy::Chronological, 3).merge(batch.clone());
        assert_eq!(chrono.ids(), vec!["5", "6", "7"]);

        let newest = Feed::new(OrderingPolicy::NewestFirst, 3).merge(batch);
        assert_eq!(newest.ids(), vec!["7", "6", "5"]);
    }

    #[test]
    fn test_old_message_arriving_into_full_feed_is_evicted() {
        let feed = Feed::new(OrderingPolicy::Chronological, 2)
            .merge(vec![msg("a", 100), msg("b", 200)])
            .merge(vec![msg("stale", 1)]);
        assert_eq!(feed.ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let feed = Feed::new(OrderingPolicy::Chronological, 10)
            .merge(vec![msg("first", 100)])
            .merge(vec![msg("second", 100), msg("early", 50)]);
        assert_eq!(feed.ids(), vec!["early", "first", "second"]);

        let feed = Feed::new(OrderingPolicy::NewestFirst, 10)
            .merge(vec![msg("first", 100)])
            .merge(vec![msg("second", 100)]);
        assert_eq!(feed.ids(), vec!["first", "second"]);
    }

    #[test]
    fn test_arrival_order_does_not_change_result() {
        let history = vec![msg("h1", 100), msg("h2", 400)];
        let live = vec![msg("l1", 250), msg("h2", 400)];
        let local = vec![msg("s1", 500)];

        for policy in [OrderingPolicy::Chronological, OrderingPolicy::NewestFirst] {
            let empty = Feed::new(policy, 3);
            let a = empty
                .merge(history.clone())
                .merge(live.clone())
                .merge(local.clone());
            let b = empty
                .merge(local.clone())
                .merge(live.clone())
                .merge(history.clone());
            let c = empty
                .merge(live.clone())
                .merge(history.clone())
                .merge(local.clone());
            assert_eq!(a, b);
            assert_eq!(b, c);
            assert!(is_sorted(&a));
            assert_eq!(a.len(), 3);
        }
    }

    #[test]
    fn test_history_live_and_local_walkthrough() {
        let feed = Feed::new(OrderingPolicy::NewestFirst, 3)
            .merge(vec![msg("1", 100), msg("2", 200)])
            .merge(vec![msg("3", 150)]);
        assert_eq!(feed.ids(), vec!["2", "3", "1"]);

        let mut local = msg("4", 300);
        local.origin = Origin::Local;
        let feed = feed.merge(vec![local]);
        assert_eq!(feed.ids(), vec!["4", "2", "3"]);
        assert_eq!(feed.get("4").unwrap().origin, Origin::Local);
    }

    #[test]
    fn test_tie_at_capacity_boundary_is_idempotent() {
        for policy in [OrderingPolicy::Chronological, OrderingPolicy::NewestFirst] {
            let batch = vec![msg("x", 100), msg("y", 100)];
            let once = Feed::new(policy, 1).merge(batch.clone());
            let twice = once.merge(batch);
            assert_eq!(once.ids(), vec!["x"]);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_redelivered_evicted_message_changes_nothing() {
        for policy in [OrderingPolicy::Chronological, OrderingPolicy::NewestFirst] {
            let feed = Feed::new(policy, 2)
                .merge(vec![msg("a", 100), msg("b", 100)])
                .merge(vec![msg("c", 200)]);
            let mut kept = feed.ids();
            kept.sort();
            assert_eq!(kept, vec!["a", "c"]);

            // An evicted tie and an evicted older message both lose again
            assert_eq!(feed.merge(vec![msg("b", 100)]), feed);
            let older = Feed::new(policy, 2)
                .merge(vec![msg("old", 10), msg("n1", 20), msg("n2", 30)]);
            assert!(!older.contains("old"));
            assert_eq!(older.merge(vec![msg("old", 10)]), older);
        }
    }

    #[test]
    fn test_empty_merge_is_noop_and_zero_capacity_clamped() {
        let feed = Feed::new(OrderingPolicy::Chronological, 0);
        assert_eq!(feed.capacity(), 1);
        let merged = feed.merge(Vec::new());
        assert!(merged.is_empty());
        assert_eq!(merged, feed);
    }
}
