use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
};

use serde_json::Value;

use super::{Error, Filters, RecordStore, Table, IMPORT_KEY};

struct Rejection {
    table: Table,
    column: String,
    value: Value,
    msg: String,
}

/// A backend held in memory. Used for dry runs, and by tests.
///
/// Ids are integers, unique within the store. Rows are upserted on
/// `import_key` the way the hosted backend is configured to.
pub struct InMemoryRecordStore {
    tables: RefCell<BTreeMap<Table, Vec<Value>>>,
    next_id: Cell<i64>,
    rejections: RefCell<Vec<Rejection>>,
    echo_limits: RefCell<BTreeMap<Table, usize>>,
    /// Number of insert calls made per table, including refused ones.
    pub insert_calls: RefCell<BTreeMap<Table, usize>>,
}

impl InMemoryRecordStore {
    pub fn new() -> InMemoryRecordStore {
        InMemoryRecordStore {
            tables: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
            rejections: RefCell::new(Vec::new()),
            echo_limits: RefCell::new(BTreeMap::new()),
            insert_calls: RefCell::new(BTreeMap::new()),
        }
    }

    /// Makes the store refuse any row of `table` whose `column` equals
    /// `value`, the way a constraint violation would.
    pub fn reject_where(&self, table: Table, column: &str, value: Value, msg: &str) {
        self.rejections.borrow_mut().push(Rejection {
            table,
            column: column.to_string(),
            value,
            msg: msg.to_string(),
        });
    }

    pub fn clear_rejections(&self) {
        self.rejections.borrow_mut().clear();
    }

    /// Makes inserts into `table` save every row but echo back at most
    /// `max_rows` of them.
    pub fn limit_echo(&self, table: Table, max_rows: usize) {
        self.echo_limits.borrow_mut().insert(table, max_rows);
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables.borrow().get(&table).cloned().unwrap_or_default()
    }

    fn check(&self, table: Table, row: &Value) -> Result<(), Error> {
        if !row.is_object() {
            return Err(format!("{}: row is not an object", table.name()));
        }
        for r in self.rejections.borrow().iter() {
            if r.table == table && row.get(&r.column) == Some(&r.value) {
                return Err(format!("{}: {}", table.name(), r.msg));
            }
        }
        Ok(())
    }

    fn upsert(&self, rows: &mut Vec<Value>, mut row: Value) -> Value {
        let key = row.get(IMPORT_KEY).cloned();
        let existing = key
            .filter(|k| !k.is_null())
            .and_then(|k| rows.iter().position(|r| r.get(IMPORT_KEY) == Some(&k)));

        match existing {
            Some(i) => {
                if let (Some(dst), Value::Object(src)) = (rows[i].as_object_mut(), row) {
                    for (k, v) in src {
                        if k != "id" {
                            dst.insert(k, v);
                        }
                    }
                }
                rows[i].clone()
            }
            None => {
                let id = self.next_id.get();
                self.next_id.set(id + 1);
                if let Some(obj) = row.as_object_mut() {
                    obj.insert("id".to_string(), Value::from(id));
                }
                rows.push(row.clone());
                row
            }
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn column_matches(row: &Value, column: &str, expected: &str) -> bool {
    match row.get(column) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Null) | None => false,
        Some(v) => v.to_string() == expected,
    }
}

#[async_trait::async_trait(?Send)]
impl RecordStore for InMemoryRecordStore {
    async fn insert_rows(&self, table: Table, rows: &[Value]) -> Result<Vec<Value>, Error> {
        *self.insert_calls.borrow_mut().entry(table).or_insert(0) += 1;
        for row in rows {
            self.check(table, row)?;
        }
        let mut tables = self.tables.borrow_mut();
        let stored = tables.entry(table).or_default();
        let mut echoed: Vec<Value> =
            rows.iter().map(|row| self.upsert(stored, row.clone())).collect();
        if let Some(&max_rows) = self.echo_limits.borrow().get(&table) {
            echoed.truncate(max_rows);
        }
        Ok(echoed)
    }

    async fn select_rows(&self, table: Table, filters: &Filters) -> Result<Vec<Value>, Error> {
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|row| filters.iter().all(|(col, val)| column_matches(row, col, val)))
            .collect())
    }
}
