/// Quickstart example - the simplest possible usage
use serde_json::json;
use sideload::{ModelDescription, Registry, Serializer};

fn main() -> anyhow::Result<()> {
    println!("=== Sideload Quick Start ===\n");

    // Step 1: Describe your types
    let registry = Registry::new()
        .with_model(
            "Author",
            ModelDescription::new().property("name").has_many("books", "Book"),
        )
        .with_model(
            "Book",
            ModelDescription::new()
                .property("title")
                .belongs_to("author", "Author")
                .has_many_through("tags", "Tag", "tagging"),
        )
        .with_model(
            "Tag",
            ModelDescription::new()
                .property("label")
                .has_many_through("books", "Book", "tagging"),
        );

    // Step 2: Your nested records
    let my_data = json!({
        "type": "Author",
        "id": 1,
        "name": "Ursula K. Le Guin",
        "books": [
            {
                "id": 100,
                "title": "The Left Hand of Darkness",
                "tags": [{"id": 7, "label": "science fiction"}]
            },
            {
                "id": 101,
                "title": "A Wizard of Earthsea",
                "tags": [{"id": 8, "label": "fantasy"}, 7]
            }
        ]
    });

    println!("Nested input:");
    println!("{}\n", serde_json::to_string_pretty(&my_data)?);

    // Step 3: Ingest it
    let mut serializer = Serializer::new(registry)?;
    serializer.ingest(my_data)?;

    // Step 4: Serialize into a side-loaded document
    let document = serializer.serialize();

    println!("Side-loaded document:");
    println!("{}\n", serde_json::to_string_pretty(&document)?);

    for (collection, records) in &document {
        let count = records.as_array().map_or(0, Vec::len);
        println!("  {}: {} record(s)", collection, count);
    }

    Ok(())
}
