use docstore::collection::Collection;
use docstore::document::Document;
use docstore::driver::memory::InMemoryDriver;
use docstore::driver::{IndexSchema, Projection, TableSchema};
use docstore::errors::DocResult;
use docstore_derive::DocumentObject;

#[derive(Debug, Default, DocumentObject)]
pub struct StressRecord {
    pub id: String,
    pub first_name: Option<String>,
    pub processed: bool,
    pub last_name: Option<String>,
    pub failed: bool,
    pub note: Option<String>,
}

fn main() -> DocResult<()> {
    println!("Starting stress test...");
    let schema = TableSchema::new("stress", "id").with_global_index(
        IndexSchema::new("by_last_name", "last_name").with_projection(Projection::All),
    );
    let collection = Collection::builder(InMemoryDriver::new(schema))
        .max_outstanding_action_calls(8)
        .build()?;

    let count = 100_000;
    let batch = 500;

    let start = std::time::Instant::now();
    for _ in 0..count / batch {
        let mut docs: Vec<Document> = (0..batch)
            .map(|_| {
                Document::from_object(StressRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    first_name: Some(uuid::Uuid::new_v4().to_string()),
                    last_name: Some(uuid::Uuid::new_v4().to_string()),
                    ..Default::default()
                })
            })
            .collect();
        let mut actions = collection.actions();
        for doc in docs.iter_mut() {
            actions = actions.create(doc);
        }
        actions.run().map_err(|e| e.into_first())?;
    }
    println!("Inserted {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let mut iter = collection.query().filter("failed", "=", false).get()?;
    let mut record = Document::from_object(StressRecord::default());
    let mut processed = 0;
    while iter.has_next()? {
        iter.next(&mut record)?;
        if let Some(record) = record.as_object_mut::<StressRecord>() {
            record.processed = true;
        }
        processed += 1;
    }
    println!("Processed {} records in {:?}", processed, start.elapsed());
    Ok(())
}
