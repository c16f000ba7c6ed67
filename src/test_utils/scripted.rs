//! An in-memory [`Store`] that replays scripted results and records every step.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{DaoError, StoreError, check_param_count};
use crate::row::RowShape;
use crate::store::{InsertOutcome, RowVisitor, Store, StoreConnection, Visit};
use crate::types::RowValues;

/// One observable step taken against a [`ScriptedStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Connect,
    Prepare(String),
    /// `position` is 1-based.
    Bind { position: usize, value: RowValues },
    Execute,
    /// Row `index` of the scripted result was handed to the visitor.
    Fetch(usize),
    Close,
}

#[derive(Debug, Clone, Default)]
struct Script {
    columns: Vec<String>,
    rows: Vec<Vec<RowValues>>,
    rows_affected: u64,
    batch_counts: Option<Vec<u64>>,
    generated_key: Option<i64>,
    connect_error: Option<String>,
    execute_error: Option<String>,
    close_error: Option<String>,
}

#[derive(Debug, Default)]
struct Journal {
    events: Vec<StoreEvent>,
    open: usize,
}

/// Scripted stand-in for a database.
///
/// Placeholders are counted as `?` characters in the statement text, so binding
/// mismatches fail the same way a real driver would.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStore {
    script: Script,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows every query returns, in this order.
    #[must_use]
    pub fn with_rows(mut self, columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        self.script.columns = columns.iter().map(|c| (*c).to_owned()).collect();
        self.script.rows = rows;
        self
    }

    /// Affected-row count reported by execute and insert.
    #[must_use]
    pub fn with_rows_affected(mut self, rows_affected: u64) -> Self {
        self.script.rows_affected = rows_affected;
        self
    }

    /// Per-unit counts reported by a batch; defaults to `rows_affected` for every unit.
    #[must_use]
    pub fn with_batch_counts(mut self, counts: Vec<u64>) -> Self {
        self.script.batch_counts = Some(counts);
        self
    }

    #[must_use]
    pub fn with_generated_key(mut self, key: Option<i64>) -> Self {
        self.script.generated_key = key;
        self
    }

    #[must_use]
    pub fn failing_connect(mut self, message: &str) -> Self {
        self.script.connect_error = Some(message.to_owned());
        self
    }

    #[must_use]
    pub fn failing_execute(mut self, message: &str) -> Self {
        self.script.execute_error = Some(message.to_owned());
        self
    }

    #[must_use]
    pub fn failing_close(mut self, message: &str) -> Self {
        self.script.close_error = Some(message.to_owned());
        self
    }

    /// Everything recorded so far, across all connections.
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        lock(&self.journal).events.clone()
    }

    /// Values bound so far, as `(position, value)` pairs.
    #[must_use]
    pub fn bindings(&self) -> Vec<(usize, RowValues)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::Bind { position, value } => Some((position, value)),
                _ => None,
            })
            .collect()
    }

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        lock(&self.journal).open
    }
}

fn lock(journal: &Mutex<Journal>) -> MutexGuard<'_, Journal> {
    match journal.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn scripted_failure(context: &str, message: &str) -> DaoError {
    DaoError::execution(format!("{context}: {message}"))
        .with_source(StoreError::Other(message.to_owned()))
}

#[async_trait]
impl Store for ScriptedStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, DaoError> {
        if let Some(message) = &self.script.connect_error {
            return Err(scripted_failure("cannot connect", message));
        }
        let mut journal = lock(&self.journal);
        journal.events.push(StoreEvent::Connect);
        journal.open += 1;
        Ok(Box::new(ScriptedConnection {
            script: self.script.clone(),
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct ScriptedConnection {
    script: Script,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedConnection {
    fn record(&self, event: StoreEvent) {
        lock(&self.journal).events.push(event);
    }

    fn bind(&self, sql: &str, values: &[RowValues]) -> Result<(), DaoError> {
        let placeholders = sql.chars().filter(|c| *c == '?').count();
        check_param_count(placeholders, values.len())?;
        for (idx, value) in values.iter().enumerate() {
            self.record(StoreEvent::Bind {
                position: idx + 1,
                value: value.clone(),
            });
        }
        Ok(())
    }

    fn run(&self) -> Result<(), DaoError> {
        if let Some(message) = &self.script.execute_error {
            return Err(scripted_failure("execution failed", message));
        }
        self.record(StoreEvent::Execute);
        Ok(())
    }
}

#[async_trait]
impl StoreConnection for ScriptedConnection {
    async fn query(
        &mut self,
        sql: &str,
        values: &[RowValues],
        visitor: &mut RowVisitor<'_>,
    ) -> Result<(), DaoError> {
        self.record(StoreEvent::Prepare(sql.to_owned()));
        self.bind(sql, values)?;
        self.run()?;
        let shape = RowShape::new(self.script.columns.clone());
        for (idx, values) in self.script.rows.iter().enumerate() {
            self.record(StoreEvent::Fetch(idx));
            if visitor(&shape.row(values.clone()))? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, values: &[RowValues]) -> Result<u64, DaoError> {
        self.record(StoreEvent::Prepare(sql.to_owned()));
        self.bind(sql, values)?;
        self.run()?;
        Ok(self.script.rows_affected)
    }

    async fn insert(
        &mut self,
        sql: &str,
        values: &[RowValues],
    ) -> Result<InsertOutcome, DaoError> {
        self.record(StoreEvent::Prepare(sql.to_owned()));
        self.bind(sql, values)?;
        self.run()?;
        Ok(InsertOutcome {
            rows_affected: self.script.rows_affected,
            generated_key: self.script.generated_key,
        })
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        units: &[Vec<RowValues>],
    ) -> Result<Vec<u64>, DaoError> {
        self.record(StoreEvent::Prepare(sql.to_owned()));
        for unit in units {
            self.bind(sql, unit)?;
        }
        for _ in units {
            self.run()?;
        }
        Ok(self
            .script
            .batch_counts
            .clone()
            .unwrap_or_else(|| vec![self.script.rows_affected; units.len()]))
    }

    async fn close(self: Box<Self>) -> Result<(), DaoError> {
        {
            let mut journal = lock(&self.journal);
            journal.events.push(StoreEvent::Close);
            journal.open = journal.open.saturating_sub(1);
        }
        match &self.script.close_error {
            Some(message) => Err(scripted_failure("cannot close", message)),
            None => Ok(()),
        }
    }
}
