//! The hosted backend the import is saved into, seen as a set of tables
//! that accept JSON rows and echo them back with generated ids.

mod memory;
mod rest;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::registry::{RecordId, StoredIssuer};

pub type Error = String;

// Exports
pub use self::memory::*;
pub use self::rest::*;

/// Column every saved row carries, so a repeated insert updates the earlier
/// row instead of adding another.
pub const IMPORT_KEY: &str = "import_key";
pub const ISSUER_ID: &str = "issuer_id";

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub enum Table {
    Issuers,
    Securities,
    Officers,
    Shareholders,
    Transactions,
    Restrictions,
    AppliedRestrictions,
    Recordkeeping,
    Documents,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Issuers => "issuers",
            Table::Securities => "securities",
            Table::Officers => "officers",
            Table::Shareholders => "shareholders",
            Table::Transactions => "transactions",
            Table::Restrictions => "restrictions",
            Table::AppliedRestrictions => "applied_restrictions",
            Table::Recordkeeping => "recordkeeping",
            Table::Documents => "documents",
        }
    }
}

/// Equality filters on columns.
pub type Filters = Vec<(String, String)>;

#[async_trait::async_trait(?Send)]
pub trait RecordStore {
    /// Inserts `rows` as one batch, updating rows whose `import_key`
    /// already exists. Returns the stored rows, including generated ids,
    /// in the order given.
    ///
    /// A batch is all or nothing: if any row is refused, none are saved.
    async fn insert_rows(&self, table: Table, rows: &[Value]) -> Result<Vec<Value>, Error>;

    async fn select_rows(&self, table: Table, filters: &Filters) -> Result<Vec<Value>, Error>;
}

/// Serializes an entity as a row owned by `issuer_id`.
pub fn to_row<T: Serialize>(
    entity: &T,
    issuer_id: Option<&RecordId>,
    import_key: &str,
) -> Result<Value, Error> {
    let mut v = serde_json::to_value(entity).map_err(|e| format!("{e}"))?;
    let obj = v
        .as_object_mut()
        .ok_or_else(|| "Entity did not serialize to an object".to_string())?;
    if let Some(id) = issuer_id {
        obj.insert(ISSUER_ID.to_string(), id.0.clone());
    }
    obj.insert(IMPORT_KEY.to_string(), Value::String(import_key.to_string()));
    Ok(v)
}

/// Deserializes a stored row. Null columns are treated as absent, so they
/// take the entity's defaults.
pub fn from_row<T: DeserializeOwned>(row: &Value) -> Result<T, Error> {
    let cleaned = match row {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => return Err(format!("Row was not an object: {other}")),
    };
    serde_json::from_value(cleaned).map_err(|e| format!("Malformed row: {e}"))
}

pub async fn find_issuer_by_name(
    store: &dyn RecordStore,
    name: &str,
) -> Result<Option<StoredIssuer>, Error> {
    let rows = store
        .select_rows(Table::Issuers, &vec![("name".to_string(), name.to_string())])
        .await?;
    match rows.first() {
        Some(row) => Ok(Some(from_row(row)?)),
        None => Ok(None),
    }
}

/// Every row of `table` owned by `issuer_id`, deserialized.
pub async fn load_issuer_rows<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    issuer_id: &RecordId,
    extra_filters: Filters,
) -> Result<Vec<T>, Error> {
    let mut filters = vec![(ISSUER_ID.to_string(), issuer_id.to_string())];
    filters.extend(extra_filters);
    let rows = store.select_rows(table, &filters).await?;
    rows.iter().map(|r| from_row::<T>(r)).collect()
}

/// Id of the holder with `account_number`, if the issuer has one.
pub async fn find_shareholder_id(
    store: &dyn RecordStore,
    issuer_id: &RecordId,
    account_number: &str,
) -> Result<Option<RecordId>, Error> {
    let rows = store
        .select_rows(
            Table::Shareholders,
            &vec![
                (ISSUER_ID.to_string(), issuer_id.to_string()),
                ("account_number".to_string(), account_number.trim().to_string()),
            ],
        )
        .await?;
    Ok(rows.first().and_then(RecordId::from_row))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::registry::{RecordId, Security, TransferTx, TxType};

    use super::{from_row, to_row};

    #[test]
    fn test_to_row() {
        let sec = Security { cusip: "123456789".to_string(), ..Security::default() };
        let row = to_row(&sec, Some(&RecordId::from(4)), "job:security:123456789").unwrap();
        assert_eq!(row["issuer_id"], json!(4));
        assert_eq!(row["import_key"], json!("job:security:123456789"));
        assert_eq!(row["cusip"], json!("123456789"));
    }

    #[test]
    fn test_from_row_tolerates_nulls() {
        let row = json!({
            "id": 10,
            "issuer_id": 4,
            "cusip": "123456789",
            "issue_name": null,
            "transaction_type": "Transfer Debit",
            "quantity": 30,
            "transaction_date": "2024-01-05",
            "shareholder_id": null,
            "created_at": "2024-01-06T00:00:00Z",
        });
        let tx: TransferTx = from_row(&row).unwrap();
        assert_eq!(tx.issue_name, "");
        assert_eq!(tx.transaction_type, TxType::TransferDebit);
        assert_eq!(tx.signed_quantity(), -30);
        assert_eq!(tx.shareholder_id, None);

        assert!(from_row::<TransferTx>(&json!([1])).is_err());
    }
}
