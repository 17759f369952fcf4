use docstore::collection::Collection;
use docstore::common::{SortOrder, Value};
use docstore::document::Document;
use docstore::errors::{DocResult, DocStoreError, ErrorKind};
use docstore::query::{AccessPath, DocumentIterator};
use docstore_derive::DocumentObject;
use docstore::driver::memory::InMemoryDriver;
use docstore_int_test::test_util::{
    books_schema, cleanup, create_test_context, insert_test_documents, is_sorted, run_test,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[derive(Debug, Clone, Default, PartialEq, DocumentObject)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub price: f64,
    pub pages: i64,
}

fn drain(mut iter: DocumentIterator) -> DocResult<Vec<Document>> {
    let mut docs = Vec::new();
    while iter.has_next()? {
        let mut doc = Document::new();
        iter.next(&mut doc)?;
        docs.push(doc);
    }
    Ok(docs)
}

fn titles(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .filter_map(|doc| doc.get_field("title").ok().flatten())
        .filter_map(|title| title.as_str().map(str::to_string))
        .collect()
}

fn seeded(collection: &Collection) -> DocResult<()> {
    insert_test_documents(collection).map(|_| ())
}

#[test]
fn test_global_index_query_reads_in_sort_key_order() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let query = collection.query().filter("author", "=", "Austen");
            assert_eq!(query.plan()?, "Index: \"by_author\"");

            let docs = drain(query.get()?)?;
            assert_eq!(titles(&docs), vec!["Persuasion", "Emma", "Sanditon"]);
            let prices: Vec<f64> = docs
                .iter()
                .filter_map(|doc| doc.get_field("price").ok().flatten())
                .filter_map(|price| price.as_float())
                .collect();
            assert!(is_sorted(prices, true));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_descending_order_on_index_sort_key() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let docs = drain(
                collection
                    .query()
                    .filter("author", "=", "Austen")
                    .order_by("price", SortOrder::Descending)
                    .get()?,
            )?;
            assert_eq!(titles(&docs), vec!["Sanditon", "Emma", "Persuasion"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_projection_decides_index_coverage() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let covered = collection
                .query()
                .filter("publisher", "=", "Murray")
                .fields(&["pages"]);
            assert_eq!(covered.plan()?, "Index: \"by_publisher\"");
            let docs = drain(covered.get()?)?;
            assert_eq!(titles(&docs), vec!["Emma", "Persuasion"]);
            for doc in &docs {
                assert!(doc.get_field("pages")?.is_some());
                assert!(doc.get_field("author")?.is_none());
            }

            // the index does not carry whole documents
            let uncovered = collection.query().filter("publisher", "=", "Murray");
            assert_eq!(uncovered.plan()?, "Scan");
            let docs = drain(uncovered.get()?)?;
            assert_eq!(titles(&docs), vec!["Emma", "Persuasion"]);
            assert!(docs.iter().all(|doc| doc.get_field("author").unwrap().is_some()));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_table_lookup_on_partition_key() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let query = collection.query().filter("title", "=", "Dune");
            assert_eq!(query.plan()?, "Table");

            let (tx, rx) = std::sync::mpsc::channel();
            let iter = query
                .before_query(move |plan| {
                    let _ = tx.send((plan.access().clone(), plan.statement().to_string()));
                    Ok(())
                })
                .get()?;
            assert_eq!(
                rx.try_recv().ok(),
                Some((AccessPath::Table, "SELECT * FROM books WHERE title = 'Dune';".to_string()))
            );

            let docs = drain(iter)?;
            assert_eq!(titles(&docs), vec!["Dune"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_before_query_hook_can_abort() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            let err = collection
                .query()
                .filter("title", "=", "Dune")
                .before_query(|_| Err(DocStoreError::new("read budget exhausted", ErrorKind::Unauthorized)))
                .get()
                .err()
                .unwrap();
            assert_eq!(err.kind(), &ErrorKind::Unauthorized);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_scans() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let query = collection.query().filter("pages", ">", 400);
            assert_eq!(query.plan()?, "Scan");
            let docs = drain(query.get()?)?;
            assert_eq!(titles(&docs), vec!["Dune", "Emma", "Ulysses"]);

            let authors = vec![Value::from("Joyce"), Value::from("Herbert")];
            let query = collection.query().filter("author", "in", authors).fields(&["pages"]);
            let docs = drain(query.get()?)?;
            assert_eq!(titles(&docs), vec!["Dune", "Ulysses"]);

            let err = collection
                .query()
                .filter("pages", ">", 400)
                .order_by("pages", SortOrder::Ascending)
                .get()
                .err()
                .unwrap();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_scans_can_be_disabled() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = Collection::builder(ctx.driver().clone()).allow_scans(false).build()?;
            seeded(&collection)?;

            let err = collection.query().filter("pages", ">", 400).get().err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);

            // indexed queries still run
            let docs = drain(collection.query().filter("author", "=", "Joyce").get()?)?;
            assert_eq!(titles(&docs), vec!["Ulysses"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_limit_and_resume() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let mut iter = collection.query().limit(2).get()?;
            let mut doc = Document::new();
            let mut first = Vec::new();
            while iter.has_next()? {
                iter.next(&mut doc)?;
                first.push(doc.get_field("title")?.unwrap());
            }
            assert_eq!(first, vec![Value::from("Dune"), Value::from("Emma")]);
            assert_eq!(iter.next(&mut doc).unwrap_err().kind(), &ErrorKind::NotFound);

            let token = iter.pagination_token().expect("more pages");
            let rest = drain(collection.query().pagination_token(&token).get()?)?;
            assert_eq!(titles(&rest), vec!["Persuasion", "Sanditon", "Ulysses"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_resume_when_limit_stops_inside_a_page() {
    run_test(
        create_test_context,
        |_| {
            for page_size in [3, 10] {
                let driver = InMemoryDriver::builder(books_schema()).page_size(page_size).build()?;
                let collection = Collection::new(driver);
                seeded(&collection)?;

                let mut iter = collection.query().limit(2).get()?;
                let mut doc = Document::new();
                let mut first = Vec::new();
                while iter.has_next()? {
                    iter.next(&mut doc)?;
                    first.push(doc.get_field("title")?.unwrap());
                }
                assert_eq!(first, vec![Value::from("Dune"), Value::from("Emma")]);

                let token = iter.pagination_token().expect("rows left");
                let rest = drain(collection.query().pagination_token(&token).get()?)?;
                assert_eq!(titles(&rest), vec!["Persuasion", "Sanditon", "Ulysses"]);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_malformed_pagination_token() {
    run_test(
        create_test_context,
        |ctx| {
            let err = ctx.collection().query().pagination_token("next").get().err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_offset() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let docs = drain(collection.query().offset(3).get()?)?;
            assert_eq!(titles(&docs), vec!["Sanditon", "Ulysses"]);

            let docs = drain(collection.query().offset(1).limit(2).get()?)?;
            assert_eq!(titles(&docs), vec!["Emma", "Persuasion"]);

            let err = collection.query().offset(1).pagination_token("2").get().err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_empty_result() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            let mut iter = collection.query().filter("author", "=", "Nobody").get()?;
            assert!(!iter.has_next()?);
            assert!(iter.pagination_token().is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_typed_target_is_reused() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let mut iter = collection.query().filter("author", "=", "Austen").get()?;
            let mut target = Document::from_object(Book::default());
            let mut publishers = Vec::new();
            while iter.has_next()? {
                iter.next(&mut target)?;
                let book = target.as_object::<Book>().unwrap();
                assert_eq!(book.author, "Austen");
                publishers.push(book.publisher.clone());
            }
            // a missing field does not leak over from the previous row
            assert_eq!(
                publishers,
                vec![Some("Murray".to_string()), Some("Murray".to_string()), None]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_documents_adapter() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            seeded(&collection)?;

            let docs = collection
                .query()
                .filter("pages", "<", 300)
                .get()?
                .documents()
                .collect::<DocResult<Vec<Document>>>()?;
            assert_eq!(titles(&docs), vec!["Persuasion", "Sanditon"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_queries() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            let cases = vec![
                collection.query().filter("title", "like", "D%"),
                collection.query().filter("", "=", 1),
                collection.query().filter("author", "in", 1),
                collection.query().limit(0),
                collection
                    .query()
                    .order_by("price", SortOrder::Ascending)
                    .order_by("pages", SortOrder::Ascending),
                collection.query().fields(&["a..b"]),
            ];
            for query in cases {
                let err = query.get().err().unwrap();
                assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            }
            Ok(())
        },
        cleanup,
    )
}
