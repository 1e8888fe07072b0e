//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache handle against its documented guarantees.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::{CacheHandle, CacheItem, ExpirationMode, FileCacheHandle};
use crate::config::HandleConfig;
use crate::serialization::SerializerKind;
use crate::store::{MemoryStore, PersistentStore};

// == Test Helpers ==
fn handle_for<V>(json: bool) -> FileCacheHandle<V>
where
    V: Clone + Send + Sync + Serialize + for<'de> Deserialize<'de> + 'static,
{
    let mut config = HandleConfig::new("prop");
    if json {
        config = config.with_serializer(SerializerKind::Json);
    }
    let store: Arc<dyn PersistentStore<V>> =
        Arc::new(MemoryStore::<V>::new(config.store_config()));
    FileCacheHandle::from_config(config, store).unwrap()
}

// == Strategies ==
/// Generates valid cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

/// Generates cache values
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,256}".prop_map(|s| s)
}

/// Generates region names, `None` being the default region
fn region_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), "[a-z]{1,8}".prop_map(Some)]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Address {
    street_number: u32,
    street_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Person {
    first_name: String,
    last_name: String,
    identifier: i64,
    nicknames: Vec<String>,
    scores: HashMap<String, u32>,
    address: Option<Address>,
}

fn person_strategy() -> impl Strategy<Value = Person> {
    (
        "[A-Za-z]{1,16}",
        "[A-Za-z]{1,16}",
        any::<i64>(),
        prop::collection::vec("[a-z]{1,8}", 0..4),
        prop::collection::hash_map("[a-z]{1,8}", any::<u32>(), 0..4),
        prop::option::of((any::<u32>(), "[A-Za-z ]{1,24}")),
    )
        .prop_map(
            |(first_name, last_name, identifier, nicknames, scores, address)| Person {
                first_name,
                last_name,
                identifier,
                nicknames,
                scores,
                address: address.map(|(street_number, street_name)| Address {
                    street_number,
                    street_name,
                }),
            },
        )
}

fn item_for(key: &str, region: &Option<String>, value: String) -> CacheItem<String> {
    match region {
        Some(region) => CacheItem::in_region(key, region.as_str(), value),
        None => CacheItem::new(key, value),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Adding an absent key succeeds and reads back; a second add is refused
    // and keeps the first value.
    #[test]
    fn prop_add_exclusivity(
        json in any::<bool>(),
        key in valid_key_strategy(),
        region in region_strategy(),
        first in valid_value_strategy(),
        second in valid_value_strategy()
    ) {
        let handle = handle_for::<String>(json);

        prop_assert!(handle.add(item_for(&key, &region, first.clone())).unwrap());
        prop_assert!(!handle.add(item_for(&key, &region, second)).unwrap());

        let stored = handle.get(&key, region.as_deref()).unwrap();
        prop_assert_eq!(stored.map(|item| item.into_value()), Some(first));
    }

    // Whatever happened before, the last put wins.
    #[test]
    fn prop_put_overwrite(
        json in any::<bool>(),
        key in valid_key_strategy(),
        values in prop::collection::vec(valid_value_strategy(), 1..10)
    ) {
        let handle = handle_for::<String>(json);

        for value in &values {
            handle.put(CacheItem::new(key.as_str(), value.clone())).unwrap();
        }

        let stored = handle.get(&key, None).unwrap().map(|item| item.into_value());
        prop_assert_eq!(stored.as_ref(), values.last());
        prop_assert_eq!(handle.count().unwrap(), 1);
    }

    // Clearing one region leaves every other region untouched.
    #[test]
    fn prop_region_isolation(
        entries in prop::collection::vec(
            (valid_key_strategy(), region_strategy(), valid_value_strategy()),
            1..40
        ),
        cleared in "[a-z]{1,8}"
    ) {
        let handle = handle_for::<String>(true);
        let mut slots = HashSet::new();

        for (key, region, value) in &entries {
            handle.put(item_for(key, region, value.clone())).unwrap();
            slots.insert((key.clone(), region.clone()));
        }

        handle.clear_region(&cleared).unwrap();

        for (key, region) in &slots {
            let exists = handle.exists(key, region.as_deref()).unwrap();
            if region.as_deref() == Some(cleared.as_str()) {
                prop_assert!(!exists, "key {} survived clearing its region", key);
            } else {
                prop_assert!(exists, "key {} in {:?} was cleared", key, region);
            }
        }
    }

    // Clear removes every key in every region.
    #[test]
    fn prop_clear_all(
        entries in prop::collection::vec(
            (valid_key_strategy(), region_strategy(), valid_value_strategy()),
            1..40
        )
    ) {
        let handle = handle_for::<String>(false);

        for (key, region, value) in &entries {
            handle.add(item_for(key, region, value.clone())).unwrap();
        }
        handle.clear().unwrap();

        for (key, region, _) in &entries {
            prop_assert!(!handle.exists(key, region.as_deref()).unwrap());
        }
        prop_assert_eq!(handle.count().unwrap(), 0);
    }

    // Structured values survive the codec unchanged.
    #[test]
    fn prop_structured_roundtrip(key in valid_key_strategy(), person in person_strategy()) {
        let handle = handle_for::<Person>(true);

        handle.put(CacheItem::new(key.as_str(), person.clone())).unwrap();

        let stored = handle.get(&key, None).unwrap().map(|item| item.into_value());
        prop_assert_eq!(stored, Some(person));
    }

    // Gets are split exactly into hits and misses.
    #[test]
    fn prop_statistics_accuracy(
        keys in prop::collection::vec(valid_key_strategy(), 1..20),
        lookups in prop::collection::vec(valid_key_strategy(), 1..20)
    ) {
        let handle = handle_for::<String>(true);
        let stored: HashSet<String> = keys.iter().cloned().collect();

        for key in &keys {
            handle.put(CacheItem::new(key.as_str(), "v".to_string())).unwrap();
        }

        let mut expected_hits = 0;
        for key in &lookups {
            if handle.get(key, None).unwrap().is_some() {
                expected_hits += 1;
            }
            prop_assert_eq!(handle.get(key, None).unwrap().is_some(), stored.contains(key));
        }

        let stats = handle.stats();
        prop_assert_eq!(stats.gets, lookups.len() as u64 * 2);
        prop_assert_eq!(stats.hits, expected_hits * 2);
        prop_assert_eq!(stats.hits + stats.misses, stats.gets);
    }
}

// Separate proptest block with fewer cases for time-sensitive expiration tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(3))]

    // An absolute item read after its timeout is a miss and no longer exists.
    #[test]
    fn prop_absolute_expiration(json in any::<bool>(), key in valid_key_strategy()) {
        let handle = handle_for::<String>(json);
        let item = CacheItem::new(key.as_str(), "v".to_string())
            .with_expiration(ExpirationMode::Absolute, Duration::from_millis(300));

        prop_assert!(handle.add(item).unwrap());
        sleep(Duration::from_millis(450));

        prop_assert!(handle.get(&key, None).unwrap().is_none());
        prop_assert!(!handle.exists(&key, None).unwrap());
    }

    // Reads spaced closer than the window keep a sliding item alive.
    #[test]
    fn prop_sliding_refresh(json in any::<bool>(), key in valid_key_strategy()) {
        let handle = handle_for::<String>(json);
        let item = CacheItem::new(key.as_str(), "v".to_string())
            .with_expiration(ExpirationMode::Sliding, Duration::from_millis(300));

        handle.put(item).unwrap();
        for _ in 0..3 {
            sleep(Duration::from_millis(150));
            prop_assert!(handle.get(&key, None).unwrap().is_some());
        }
    }
}
