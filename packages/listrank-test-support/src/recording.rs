use listrank_core::{ListEntry, ListStore, ListTable, Plan, Result, ScopeCondition, Window};

/// Passes everything through to `inner` and records each plan handed to `write_positions`.
pub struct Recording<'a, S: ListStore> {
    pub inner: &'a mut S,
    pub batches: Vec<Plan>,
}

impl<'a, S: ListStore> Recording<'a, S> {
    pub fn new(inner: &'a mut S) -> Self {
        Self {
            inner,
            batches: Vec::new(),
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.batches.iter().map(Plan::rows).sum()
    }

    pub fn reset(&mut self) {
        self.batches.clear();
    }
}

impl<S: ListStore> ListStore for Recording<'_, S> {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn lock_ordered_ids(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
    ) -> Result<Vec<ListEntry>> {
        self.inner.lock_ordered_ids(table, scope)
    }

    fn entries(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        window: Window,
    ) -> Result<Vec<ListEntry>> {
        self.inner.entries(table, scope, window)
    }

    fn write_positions(
        &mut self,
        table: &ListTable,
        scope: &ScopeCondition,
        plan: &Plan,
    ) -> Result<u64> {
        self.batches.push(plan.clone());
        self.inner.write_positions(table, scope, plan)
    }
}
