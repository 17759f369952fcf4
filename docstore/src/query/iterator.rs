use crate::codec::FieldCache;
use crate::common::Value;
use crate::document::Document;
use crate::driver::QueryRunner;
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

/// A forward-only, lazily paged sequence of query results.
///
/// # Purpose
/// Pulls pages from the driver only when the buffered rows run out, and
/// decodes each row into a caller-supplied [Document] so one instance can be
/// reused across the whole iteration.
///
/// # Characteristics
/// - **Lazy**: no page is fetched before the first [DocumentIterator::has_next]
/// - **Bounded**: the query's limit caps the rows produced, whatever the
///   driver's page size
/// - **Resumable**: [DocumentIterator::pagination_token] marks the row
///   right after the last one handed out
///
/// # Usage
/// ```rust
/// use docstore::collection::Collection;
/// use docstore::document::Document;
/// use docstore::driver::memory::InMemoryDriver;
/// use docstore::driver::TableSchema;
/// use docstore::value_map;
///
/// let collection = Collection::new(InMemoryDriver::new(TableSchema::new("books", "title")));
/// for title in ["Dune", "Emma", "Ulysses"] {
///     let mut doc = Document::from_value(value_map! { "title": title }).unwrap();
///     collection.put(&mut doc).unwrap();
/// }
///
/// let mut iter = collection.query().limit(2).get().unwrap();
/// let mut doc = Document::new();
/// let mut seen = 0;
/// while iter.has_next().unwrap() {
///     iter.next(&mut doc).unwrap();
///     seen += 1;
/// }
/// assert_eq!(seen, 2);
/// ```
pub struct DocumentIterator {
    runner: Box<dyn QueryRunner>,
    buffer: VecDeque<Value>,
    /// Driver token of the next page to fetch.
    token: Option<String>,
    /// Driver token the buffered page was fetched with.
    page_token: Option<String>,
    /// Rows taken off the buffered page so far.
    taken: usize,
    exhausted: bool,
    limit: Option<usize>,
    to_skip: usize,
    produced: usize,
    cache: FieldCache,
    revision_field: Option<String>,
}

impl DocumentIterator {
    pub(crate) fn new(
        runner: Box<dyn QueryRunner>,
        resume: ResumePoint,
        limit: Option<usize>,
        offset: Option<usize>,
        cache: FieldCache,
        revision_field: Option<String>,
    ) -> Self {
        let offset = if runner.applies_offset() { 0 } else { offset.unwrap_or(0) };
        DocumentIterator {
            runner,
            buffer: VecDeque::new(),
            token: resume.token,
            page_token: None,
            taken: 0,
            exhausted: false,
            limit,
            to_skip: resume.skip + offset,
            produced: 0,
            cache,
            revision_field,
        }
    }

    /// Whether another document is available, fetching pages as needed.
    pub fn has_next(&mut self) -> DocResult<bool> {
        loop {
            if self.limit.is_some_and(|limit| self.produced >= limit) {
                return Ok(false);
            }

            while self.to_skip > 0 && self.buffer.pop_front().is_some() {
                self.to_skip -= 1;
                self.taken += 1;
            }
            if !self.buffer.is_empty() {
                return Ok(true);
            }
            if self.exhausted {
                return Ok(false);
            }
            self.fetch_page()?;
        }
    }

    /// Decodes the next document into `target`, replacing its contents.
    ///
    /// Fails with `NotFound` once the results are exhausted.
    pub fn next(&mut self, target: &mut Document) -> DocResult<()> {
        if !self.has_next()? {
            log::error!("Query iterator has no more documents");
            return Err(DocStoreError::new("no more documents", ErrorKind::NotFound));
        }

        let row = match self.buffer.pop_front() {
            Some(row) => row,
            None => return Err(DocStoreError::new("query buffer is empty", ErrorKind::Internal)),
        };
        self.taken += 1;
        self.produced += 1;

        target.attach_cache(&self.cache);
        target.clear()?;
        target.decode_stored(&row, self.revision_field.as_deref())
    }

    /// Where a new query should resume to continue right after the last
    /// document handed out, or `None` once nothing is left.
    ///
    /// Rows already fetched but not handed out, e.g. because the limit was
    /// reached, are covered by the token.
    pub fn pagination_token(&self) -> Option<String> {
        if !self.buffer.is_empty() {
            let resume = ResumePoint {
                token: self.page_token.clone(),
                skip: self.taken,
            };
            return Some(resume.to_string());
        }
        if self.exhausted {
            return None;
        }
        let resume = ResumePoint {
            token: self.token.clone(),
            skip: self.to_skip,
        };
        Some(resume.to_string())
    }

    /// Adapts the iterator into a std [Iterator] of map-backed documents.
    pub fn documents(self) -> Documents {
        Documents { inner: self }
    }

    fn fetch_page(&mut self) -> DocResult<()> {
        let page = self.runner.run_page(self.token.as_deref())?;
        log::trace!(
            "Fetched a page of {} row(s), {}",
            page.rows.len(),
            if page.next_token.is_some() { "more to come" } else { "last page" }
        );
        self.buffer.extend(page.rows);
        self.page_token = self.token.take();
        self.taken = 0;
        self.exhausted = page.next_token.is_none();
        self.token = page.next_token;
        Ok(())
    }
}

/// A row-level position in a query's results: the driver token of a page
/// plus the rows to skip inside it.
///
/// Rendered as `<skip>` for the first page, `<skip>:<driver token>`
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResumePoint {
    pub token: Option<String>,
    pub skip: usize,
}

impl ResumePoint {
    pub fn parse(token: &str) -> DocResult<Self> {
        let (skip, page) = match token.split_once(':') {
            Some((skip, page)) => (skip, Some(page.to_string())),
            None => (token, None),
        };
        match skip.parse::<usize>() {
            Ok(skip) => Ok(ResumePoint { token: page, skip }),
            Err(_) => {
                log::error!("Invalid pagination token {}", token);
                Err(DocStoreError::new(
                    &format!("invalid pagination token {}", token),
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }
}

impl Display for ResumePoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.token {
            Some(token) => write!(f, "{}:{}", self.skip, token),
            None => write!(f, "{}", self.skip),
        }
    }
}

/// A std [Iterator] over the results of a query. See
/// [DocumentIterator::documents].
pub struct Documents {
    inner: DocumentIterator,
}

impl Iterator for Documents {
    type Item = DocResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.has_next() {
            Ok(true) => {
                let mut doc = Document::new();
                Some(self.inner.next(&mut doc).map(|_| doc))
            }
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::QueryPage;
    use crate::value_map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct PagedRunner {
        pages: Vec<QueryPage>,
        calls: Arc<AtomicUsize>,
    }

    impl QueryRunner for PagedRunner {
        fn run_page(&mut self, token: Option<&str>) -> DocResult<QueryPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let index = token.map(|t| t.parse::<usize>().unwrap()).unwrap_or(0);
            Ok(self.pages[index].clone())
        }
    }

    fn row(n: i64) -> Value {
        value_map! { "n": n }
    }

    fn page(rows: Vec<Value>, next: Option<&str>) -> QueryPage {
        QueryPage {
            rows,
            next_token: next.map(str::to_string),
        }
    }

    fn iterator(pages: Vec<QueryPage>, limit: Option<usize>, offset: Option<usize>) -> (DocumentIterator, Arc<AtomicUsize>) {
        resumed(pages, ResumePoint::default(), limit, offset)
    }

    fn resumed(
        pages: Vec<QueryPage>,
        resume: ResumePoint,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> (DocumentIterator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = PagedRunner {
            pages,
            calls: calls.clone(),
        };
        (
            DocumentIterator::new(Box::new(runner), resume, limit, offset, FieldCache::new(), None),
            calls,
        )
    }

    fn numbers(iter: DocumentIterator) -> Vec<i64> {
        iter.documents()
            .map(|doc| doc.unwrap().get_field("n").unwrap().unwrap().as_int().unwrap())
            .collect()
    }

    #[test]
    fn test_empty_first_page_without_token() {
        let (mut iter, calls) = iterator(vec![page(vec![], None)], None, None);
        assert!(!iter.has_next().unwrap());
        assert!(!iter.has_next().unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let err = iter.next(&mut Document::new()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn test_pages_are_followed() {
        let pages = vec![
            page(vec![row(1), row(2)], Some("1")),
            page(vec![], Some("2")),
            page(vec![row(3)], None),
        ];
        let (iter, calls) = iterator(pages, None, None);
        let numbers: Vec<i64> = iter
            .documents()
            .map(|doc| doc.unwrap().get_field("n").unwrap().unwrap().as_int().unwrap())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_limit_caps_results() {
        let pages = vec![page(vec![row(1), row(2), row(3)], Some("1")), page(vec![row(4)], None)];
        let (mut iter, calls) = iterator(pages, Some(2), None);
        let mut doc = Document::new();
        let mut produced = 0;
        while iter.has_next().unwrap() {
            iter.next(&mut doc).unwrap();
            produced += 1;
        }
        assert_eq!(produced, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // the third row was fetched but not handed out
        assert_eq!(iter.pagination_token().as_deref(), Some("2"));
    }

    fn three_and_one() -> Vec<QueryPage> {
        vec![page(vec![row(1), row(2), row(3)], Some("1")), page(vec![row(4)], None)]
    }

    #[test]
    fn test_resume_after_limit_inside_a_page() {
        let (mut iter, _) = iterator(three_and_one(), Some(2), None);
        let mut doc = Document::new();
        while iter.has_next().unwrap() {
            iter.next(&mut doc).unwrap();
        }
        let token = iter.pagination_token().unwrap();

        let (rest, _) = resumed(three_and_one(), ResumePoint::parse(&token).unwrap(), None, None);
        assert_eq!(numbers(rest), vec![3, 4]);
    }

    #[test]
    fn test_resume_on_a_page_boundary() {
        let (mut iter, _) = iterator(three_and_one(), Some(3), None);
        let mut doc = Document::new();
        while iter.has_next().unwrap() {
            iter.next(&mut doc).unwrap();
        }
        let token = iter.pagination_token().unwrap();
        assert_eq!(token, "0:1");

        let (rest, calls) = resumed(three_and_one(), ResumePoint::parse(&token).unwrap(), None, None);
        assert_eq!(numbers(rest), vec![4]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resume_point_format() {
        let first = ResumePoint { token: None, skip: 3 };
        assert_eq!(first.to_string(), "3");
        assert_eq!(ResumePoint::parse("3").unwrap(), first);

        let later = ResumePoint::parse("2:after:b").unwrap();
        assert_eq!(later.skip, 2);
        assert_eq!(later.token.as_deref(), Some("after:b"));

        let err = ResumePoint::parse("x").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_offset_skips_across_pages() {
        let pages = vec![page(vec![row(1), row(2)], Some("1")), page(vec![row(3), row(4)], None)];
        let (iter, _) = iterator(pages, Some(1), Some(3));
        let docs: Vec<Document> = iter.documents().map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_field("n").unwrap(), Some(Value::Int(4)));
    }

    #[test]
    fn test_reused_target_is_replaced() {
        let pages = vec![page(vec![value_map! { "a": 1 }, value_map! { "b": 2 }], None)];
        let (mut iter, _) = iterator(pages, None, None);
        let mut doc = Document::new();
        iter.next(&mut doc).unwrap();
        iter.next(&mut doc).unwrap();
        assert_eq!(doc.field_names(), vec!["b".to_string()]);
        assert!(iter.pagination_token().is_none());
    }
}
