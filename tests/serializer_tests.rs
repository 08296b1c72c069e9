use serde_json::{json, Value};
use sideload::{Error, ModelDescription, Registry, Serializer, SerializerConfig};

fn library() -> Registry {
    Registry::from_json_str(
        r#"{
            "Author": {
                "properties": ["name"],
                "associations": [{"kind": "hasMany", "name": "books", "model": "Book"}]
            },
            "Book": {
                "properties": ["title", "year"],
                "associations": [
                    {"kind": "belongsTo", "name": "author", "model": "Author"},
                    {"kind": "hasMany", "name": "tags", "model": "Tag", "through": "tagging"}
                ]
            },
            "Tag": {
                "properties": ["label"],
                "associations": [
                    {"kind": "hasMany", "name": "books", "model": "Book", "through": "tagging"}
                ]
            }
        }"#,
    )
    .unwrap()
}

fn blog() -> Registry {
    Registry::new()
        .with_model(
            "Tag",
            ModelDescription::new().has_many_through("posts", "Post", "tagging"),
        )
        .with_model(
            "Post",
            ModelDescription::new().has_many_through("tags", "Tag", "tagging"),
        )
}

fn serialized(registry: Registry, inputs: Vec<Value>) -> Value {
    let mut serializer = Serializer::new(registry).unwrap();
    serializer.ingest_all(inputs).unwrap();
    Value::Object(serializer.serialize())
}

/// Sort collections by id and every array field, so documents built from
/// differently ordered input compare equal.
fn canonical(document: &Value) -> Value {
    let mut out = serde_json::Map::new();
    for (key, records) in document.as_object().unwrap() {
        let mut records: Vec<Value> = records.as_array().unwrap().clone();
        for record in &mut records {
            for value in record.as_object_mut().unwrap().values_mut() {
                if let Value::Array(items) = value {
                    items.sort_by_key(|item| item.to_string());
                }
            }
        }
        records.sort_by_key(|record| record["id"].to_string());
        out.insert(key.clone(), Value::Array(records));
    }
    Value::Object(out)
}

#[test]
fn test_idempotent_ingest() {
    let record = json!({"type": "Book", "id": 1, "title": "Dune", "year": 1965, "authorId": 2});

    let once = serialized(library(), vec![record.clone()]);
    let twice = serialized(library(), vec![record.clone(), record]);
    assert_eq!(once, twice);
}

#[test]
fn test_merge_by_identity() {
    let document = serialized(
        library(),
        vec![
            json!({"type": "Book", "id": 1, "title": "Dune", "year": 1964}),
            json!({"type": "Book", "id": "1", "title": "Dune", "year": 1965}),
        ],
    );

    let books = document["books"].as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["year"], 1965);
}

#[test]
fn test_arrays_unique_after_serialize() {
    let author = json!({
        "type": "Author",
        "id": 2,
        "books": [{"id": 1, "tags": [5, 5]}, {"id": 1}, {"id": 3}]
    });
    let document = serialized(
        library(),
        vec![author.clone(), author, json!({"type": "Book", "id": 3, "authorId": 2})],
    );

    assert_eq!(document["authors"][0]["books"], json!([1, 3]));
    assert_eq!(document["books"][0]["tags"], json!([5]));
    assert_eq!(document["tags"][0]["books"], json!([1]));
}

#[test]
fn test_belongs_to_has_many_symmetry() {
    let document = serialized(
        library(),
        vec![
            json!({"type": "Book", "id": 1, "authorId": 2}),
            json!({"type": "Author", "id": 2}),
        ],
    );

    assert_eq!(document["authors"][0]["books"], json!([1]));
    assert_eq!(document["books"][0]["authorId"], 2);
}

#[test]
fn test_many_to_many_symmetry() {
    let document = serialized(blog(), vec![json!({"type": "Post", "id": 1, "tags": [5]})]);

    assert_eq!(
        document,
        json!({
            "posts": [{"id": 1, "type": "Post", "tags": [5]}],
            "tags": [{"id": 5, "type": "Tag", "posts": [1]}]
        })
    );
}

#[test]
fn test_order_independence() {
    let author = json!({"type": "Author", "id": 2, "name": "Frank Herbert"});
    let books = vec![
        json!({"type": "Book", "id": 1, "title": "Dune", "authorId": 2, "tags": [{"id": 9, "label": "sf"}]}),
        json!({"type": "Book", "id": 3, "title": "Dune Messiah", "authorId": 2}),
    ];

    let mut parent_first = vec![author.clone()];
    parent_first.extend(books.iter().cloned());
    let mut children_first = books;
    children_first.push(author);

    assert_eq!(
        canonical(&serialized(library(), parent_first)),
        canonical(&serialized(library(), children_first))
    );
}

#[test]
fn test_nested_and_flat_input_agree() {
    let nested = serialized(
        library(),
        vec![json!({
            "type": "Author",
            "id": 2,
            "name": "Frank Herbert",
            "books": [{"id": 1, "title": "Dune"}]
        })],
    );
    let flat = serialized(
        library(),
        vec![
            json!({"type": "Book", "id": 1, "title": "Dune", "authorId": 2}),
            json!({"type": "Author", "id": 2, "name": "Frank Herbert"}),
        ],
    );

    assert_eq!(canonical(&nested), canonical(&flat));
}

#[test]
fn test_reset_isolation() {
    let mut serializer = Serializer::new(library()).unwrap();
    serializer.ingest(json!({"type": "Author", "id": 1, "books": [{"id": 4}]})).unwrap();
    serializer.serialize();

    serializer.init(None).unwrap();
    serializer.ingest(json!({"type": "Tag", "id": 7, "label": "classic"})).unwrap();

    let document = Value::Object(serializer.serialize());
    assert_eq!(
        document,
        json!({"tags": [{"id": 7, "type": "Tag", "label": "classic", "books": []}]})
    );
}

#[test]
fn test_independent_sessions() {
    let mut first = Serializer::new(library()).unwrap();
    let mut second = Serializer::new(library()).unwrap();
    first.ingest(json!({"type": "Tag", "id": 1})).unwrap();

    assert_eq!(first.store().len(), 1);
    assert!(second.store().is_empty());
    assert!(second.serialize().is_empty());
}

#[test]
fn test_repeated_serialize_is_stable() {
    let mut serializer = Serializer::new(library()).unwrap();
    serializer
        .ingest(json!([
            {"type": "Author", "id": 2, "books": [{"id": 1, "tags": [5]}]},
            {"type": "Book", "id": 3, "authorId": 2},
            {"type": "Tag", "id": 6, "books": [3]}
        ]))
        .unwrap();

    let first = serializer.serialize();
    let second = serializer.serialize();
    assert_eq!(first, second);
    assert_eq!(first["authors"][0]["books"], json!([1, 3]));
    assert_eq!(first["books"][1]["tags"], json!([6]));
}

#[test]
fn test_store_inspection() {
    let mut serializer = Serializer::new(library()).unwrap();
    serializer.ingest(json!({"type": "Book", "id": 1, "title": "Dune", "tags": [5]})).unwrap();

    let dump = serde_json::to_value(serializer.store()).unwrap();
    assert_eq!(dump["Book"]["1"]["title"], "Dune");
    assert_eq!(dump["Tag"]["5"], json!({"id": 5, "type": "Tag", "books": []}));

    // Resolution writes inverse links into the store in place.
    serializer.serialize();
    let dump = serde_json::to_value(serializer.store()).unwrap();
    assert_eq!(dump["Tag"]["5"]["books"], json!([1]));
}

#[test]
fn test_error_conditions() {
    let mut serializer = Serializer::new(library()).unwrap();

    assert!(matches!(serializer.ingest(Value::Null), Err(Error::InvalidInput(_))));
    assert!(matches!(
        serializer.ingest(json!({"type": "Publisher", "id": 1})),
        Err(Error::UnknownType(_))
    ));
    assert!(matches!(
        serializer.ingest(json!({"type": "Book", "title": "no id"})),
        Err(Error::MissingIdentity { missing: "id", .. })
    ));
    assert!(serializer.store().is_empty());
}

#[test]
fn test_undeclared_field_is_an_error() {
    let mut serializer = Serializer::new(library()).unwrap();

    let err = serializer
        .ingest(json!({"type": "Book", "id": 1, "isbn": "0441013597"}))
        .unwrap_err();
    assert_eq!(err.to_string(), "field `isbn` is not declared on type `Book`");
    assert!(serializer.store().is_empty());

    let config = SerializerConfig {
        strict: false,
        ..SerializerConfig::default()
    };
    let mut lenient = Serializer::with_config(library(), config).unwrap();
    lenient
        .ingest(json!({"type": "Book", "id": 1, "isbn": "0441013597"}))
        .unwrap();
    assert_eq!(
        Value::Object(lenient.serialize()),
        json!({"books": [{"id": 1, "type": "Book", "tags": []}]})
    );
}

#[test]
fn test_custom_foreign_key_suffix() {
    let config = SerializerConfig {
        foreign_key_suffix: String::from("_id"),
        ..SerializerConfig::default()
    };
    let mut serializer = Serializer::with_config(library(), config).unwrap();
    serializer.ingest(json!({"type": "Book", "id": 1, "author_id": 2})).unwrap();
    serializer.ingest(json!({"type": "Author", "id": 2})).unwrap();

    let document = serializer.serialize();
    assert_eq!(document["books"][0]["author_id"], 2);
    assert_eq!(document["authors"][0]["books"], json!([1]));
}
