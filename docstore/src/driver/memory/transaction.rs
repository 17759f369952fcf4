use crate::common::Value;
use crate::driver::memory::rows::apply_write;
use crate::driver::memory::store::InMemoryDriverInner;
use crate::driver::{CommitError, Transaction, WriteRequest};
use crate::errors::DocResult;
use std::collections::BTreeMap;

/// Stages writes and applies them under the driver's write lock on commit.
pub(crate) struct InMemoryTransaction<'a> {
    driver: &'a InMemoryDriverInner,
    staged: Vec<WriteRequest>,
}

impl<'a> InMemoryTransaction<'a> {
    pub(crate) fn new(driver: &'a InMemoryDriverInner) -> Self {
        InMemoryTransaction {
            driver,
            staged: Vec::new(),
        }
    }
}

impl Transaction for InMemoryTransaction<'_> {
    fn write(&mut self, request: &WriteRequest) -> DocResult<()> {
        self.staged.push(request.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), CommitError> {
        let InMemoryTransaction { driver, staged } = *self;
        log::trace!("Committing {} staged write(s)", staged.len());

        driver.locked(|inner| {
            // later writes of the transaction see the effect of earlier ones
            let mut pending: BTreeMap<Value, Option<Value>> = BTreeMap::new();
            for (position, request) in staged.iter().enumerate() {
                let current = match pending.get(&request.key) {
                    Some(row) => row.clone(),
                    None => inner.current(&request.key),
                };
                let row = apply_write(request, current.as_ref()).map_err(|e| CommitError::at(position, e))?;
                pending.insert(request.key.clone(), row);
            }

            for (key, row) in pending {
                inner.store(key, row);
            }
            Ok(())
        })
    }
}
