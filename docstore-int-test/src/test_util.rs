use docstore::collection::Collection;
use docstore::document::Document;
use docstore::driver::memory::InMemoryDriver;
use docstore::driver::{IndexSchema, Projection, TableSchema};
use docstore::errors::DocResult;
use docstore::value_map;
use std::backtrace::Backtrace;
use std::time::{Duration, Instant};
use std::thread;

/// Runs a test with retry logic and error handling.
/// Tests run on the current thread; `after` runs whether or not the test
/// body succeeded.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DocResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> DocResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> DocResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx).map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                eprintln!(
                    "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                    attempt, MAX_RETRIES, elapsed
                );
                eprintln!("Panic: {}", err_msg);
                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());
                if attempt < MAX_RETRIES {
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
            }
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// A fresh collection over an in-memory driver, plus a handle on the driver
/// for inspecting stored rows.
#[derive(Clone)]
pub struct TestContext {
    collection: Collection,
    driver: InMemoryDriver,
}

impl TestContext {
    pub fn new(collection: Collection, driver: InMemoryDriver) -> Self {
        Self { collection, driver }
    }

    pub fn collection(&self) -> Collection {
        self.collection.clone()
    }

    pub fn driver(&self) -> &InMemoryDriver {
        &self.driver
    }
}

/// The `books` table used across the integration tests.
///
/// - primary key: `title`
/// - `by_author`: global index on `author`, sorted by `price`, carrying
///   every attribute
/// - `by_publisher`: global index on `publisher`, carrying only `pages`
pub fn books_schema() -> TableSchema {
    TableSchema::new("books", "title")
        .with_global_index(
            IndexSchema::new("by_author", "author")
                .with_sort_key("price")
                .with_projection(Projection::All),
        )
        .with_global_index(
            IndexSchema::new("by_publisher", "publisher")
                .with_projection(Projection::Include(vec!["pages".into()])),
        )
}

pub fn create_test_context() -> DocResult<TestContext> {
    let driver = InMemoryDriver::builder(books_schema()).page_size(2).build()?;
    let collection = Collection::new(driver.clone());
    Ok(TestContext::new(collection, driver))
}

pub fn cleanup(ctx: TestContext) -> DocResult<()> {
    log::debug!("Test finished with {} stored row(s)", ctx.driver().len());
    Ok(())
}

pub fn create_test_docs() -> Vec<Document> {
    let rows = vec![
        value_map! { "title": "Dune", "author": "Herbert", "publisher": "Chilton", "price": 9.99, "pages": 412 },
        value_map! { "title": "Emma", "author": "Austen", "publisher": "Murray", "price": 4.5, "pages": 474 },
        value_map! { "title": "Persuasion", "author": "Austen", "publisher": "Murray", "price": 3.25, "pages": 249 },
        value_map! { "title": "Sanditon", "author": "Austen", "price": 7.0, "pages": 120 },
        value_map! { "title": "Ulysses", "author": "Joyce", "publisher": "Shakespeare and Company", "price": 12.0, "pages": 730 },
    ];
    rows.into_iter().filter_map(|row| Document::from_value(row).ok()).collect()
}

pub fn insert_test_documents(collection: &Collection) -> DocResult<Vec<Document>> {
    let mut docs = create_test_docs();
    let mut actions = collection.actions();
    for doc in docs.iter_mut() {
        actions = actions.create(doc);
    }
    actions.run().map_err(|e| e.into_first())?;
    Ok(docs)
}

pub fn is_sorted<T: PartialOrd>(iterable: impl IntoIterator<Item = T>, ascending: bool) -> bool {
    let mut iter = iterable.into_iter();
    if let Some(mut prev) = iter.next() {
        for current in iter {
            if ascending {
                if prev > current {
                    return false;
                }
            } else if prev < current {
                return false;
            }
            prev = current;
        }
    }
    true
}
