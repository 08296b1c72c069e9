use proptest::prelude::*;
use serde_json::{json, Map, Value};
use sideload::{ModelDescription, Registry, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashSet};

fn registry() -> Registry {
    Registry::new()
        .with_model(
            "Author",
            ModelDescription::new().property("name").has_many("books", "Book"),
        )
        .with_model(
            "Book",
            ModelDescription::new().property("title").belongs_to("author", "Author"),
        )
        .with_model(
            "Post",
            ModelDescription::new()
                .property("title")
                .has_many_through("tags", "Tag", "tagging"),
        )
        .with_model(
            "Tag",
            ModelDescription::new()
                .property("label")
                .has_many_through("posts", "Post", "tagging"),
        )
}

fn word() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z]{1,8}").unwrap()
}

fn ids(max: i64, len: usize) -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(1..=max, 0..=len)
}

/// Flat records with distinct identities; relationships are stated from
/// one side or the other, never nested.
fn graph() -> impl Strategy<Value = Vec<Value>> {
    (
        proptest::collection::btree_map(1i64..=5, word(), 0..4),
        proptest::collection::btree_map(1i64..=10, (proptest::option::of(1i64..=5), word()), 0..8),
        proptest::collection::btree_map(1i64..=6, (word(), ids(6, 4)), 0..5),
        proptest::collection::btree_map(1i64..=6, ids(6, 4), 0..5),
    )
        .prop_map(|(authors, books, posts, tags)| {
            let mut records = Vec::new();
            for (id, name) in authors {
                records.push(json!({"type": "Author", "id": id, "name": name}));
            }
            for (id, (author, title)) in books {
                let mut record = Map::new();
                record.insert("type".into(), json!("Book"));
                record.insert("id".into(), json!(id));
                record.insert("title".into(), json!(title));
                if let Some(author) = author {
                    record.insert("authorId".into(), json!(author));
                }
                records.push(Value::Object(record));
            }
            for (id, (title, tags)) in posts {
                records.push(json!({"type": "Post", "id": id, "title": title, "tags": tags}));
            }
            for (id, posts) in tags {
                records.push(json!({"type": "Tag", "id": id, "posts": posts}));
            }
            records
        })
}

fn serialize(records: &[Value]) -> Map<String, Value> {
    let mut serializer = Serializer::new(registry()).unwrap();
    serializer.ingest_all(records.iter().cloned()).unwrap();
    serializer.serialize()
}

/// Collection -> id -> record with every array turned into a set.
fn canonical(document: &Map<String, Value>) -> BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>> {
    document
        .iter()
        .map(|(key, records)| {
            let by_id = records
                .as_array()
                .unwrap()
                .iter()
                .map(|record| {
                    let fields = record
                        .as_object()
                        .unwrap()
                        .iter()
                        .map(|(name, value)| {
                            let rendered = match value {
                                Value::Array(items) => format!(
                                    "{:?}",
                                    items.iter().map(Value::to_string).collect::<BTreeSet<_>>()
                                ),
                                other => other.to_string(),
                            };
                            (name.clone(), rendered)
                        })
                        .collect();
                    (record["id"].to_string(), fields)
                })
                .collect();
            (key.clone(), by_id)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_ingest_twice_matches_once(records in graph()) {
        let mut doubled = records.clone();
        doubled.extend(records.iter().cloned());
        prop_assert_eq!(serialize(&records), serialize(&doubled));
    }

    #[test]
    fn prop_arrays_unique_after_serialize(records in graph()) {
        let mut doubled = records.clone();
        doubled.extend(records.iter().cloned());

        for (_, collection) in serialize(&doubled) {
            for record in collection.as_array().unwrap() {
                for (_, value) in record.as_object().unwrap() {
                    if let Value::Array(items) = value {
                        let distinct: HashSet<String> = items.iter().map(Value::to_string).collect();
                        prop_assert_eq!(distinct.len(), items.len());
                    }
                }
            }
        }
    }

    #[test]
    fn prop_order_independent(
        (records, shuffled) in graph().prop_flat_map(|records| {
            let shuffled = Just(records.clone()).prop_shuffle();
            (Just(records), shuffled)
        })
    ) {
        prop_assert_eq!(canonical(&serialize(&records)), canonical(&serialize(&shuffled)));
    }

    #[test]
    fn prop_through_links_are_symmetric(records in graph()) {
        let document = serialize(&records);
        let empty = Vec::new();
        let posts = document.get("posts").and_then(Value::as_array).unwrap_or(&empty);
        let tags = document.get("tags").and_then(Value::as_array).unwrap_or(&empty);

        for post in posts {
            for tag_id in post["tags"].as_array().unwrap() {
                let tag = tags.iter().find(|tag| &tag["id"] == tag_id).unwrap();
                prop_assert!(tag["posts"].as_array().unwrap().contains(&post["id"]));
            }
        }
        for tag in tags {
            for post_id in tag["posts"].as_array().unwrap() {
                let post = posts.iter().find(|post| &post["id"] == post_id).unwrap();
                prop_assert!(post["tags"].as_array().unwrap().contains(&tag["id"]));
            }
        }
    }

    #[test]
    fn prop_foreign_keys_listed_by_parent(records in graph()) {
        let document = serialize(&records);
        let empty = Vec::new();
        let authors = document.get("authors").and_then(Value::as_array).unwrap_or(&empty);
        let books = document.get("books").and_then(Value::as_array).unwrap_or(&empty);

        for book in books {
            let Some(author_id) = book.get("authorId") else { continue };
            if let Some(author) = authors.iter().find(|author| &author["id"] == author_id) {
                prop_assert!(author["books"].as_array().unwrap().contains(&book["id"]));
            }
        }
    }
}
