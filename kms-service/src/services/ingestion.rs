//! Applies change-feed batches to the local replica.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::models::table::{CHANGE_SELECTOR_COLUMN, TENANT_COLUMN};
use crate::models::{AppParent, ChangeBatch, ChangeRecord, ColumnKind, KmsTable, Operation, Row};
use crate::services::database::{BoundValue, KmsDatabase};
use crate::services::error::ServiceError;
use crate::services::metrics;

/// Columns that may carry an attribute's owning entity id, in preference order.
const ATTRIBUTE_OWNER_COLUMNS: [&str; 7] = [
    "entity_id",
    "appcred_id",
    "app_id",
    "apiprdt_id",
    "dev_id",
    "developer_id",
    "comp_id",
];
const ATTRIBUTE_OWNER_FALLBACK: &str = "company_id";

type Key = Vec<(&'static str, String)>;

/// A validated change, ready to be written.
#[derive(Debug, Clone, PartialEq)]
enum Change {
    Upsert {
        table: KmsTable,
        values: Vec<(&'static str, BoundValue)>,
        /// Key of the old image when an update moved the row.
        replaced: Option<(String, Key)>,
    },
    Delete {
        table: KmsTable,
        tenant_id: String,
        key: Key,
    },
}

impl Change {
    fn table(&self) -> KmsTable {
        match self {
            Change::Upsert { table, .. } | Change::Delete { table, .. } => *table,
        }
    }
}

/// Progress counters exposed on the health endpoint.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    pub batches_applied: u64,
    pub records_applied: u64,
    pub heartbeats: u64,
    pub failed_batches: u64,
    pub last_applied_at: Option<DateTime<Utc>>,
}

/// Sole writer of the replica. Batches are applied one at a time.
pub struct ChangeProcessor {
    db: KmsDatabase,
    apply_lock: Mutex<()>,
    stats: RwLock<FeedStats>,
}

impl ChangeProcessor {
    pub fn new(db: KmsDatabase) -> Self {
        Self {
            db,
            apply_lock: Mutex::new(()),
            stats: RwLock::new(FeedStats::default()),
        }
    }

    pub async fn stats(&self) -> FeedStats {
        self.stats.read().await.clone()
    }

    /// Apply a batch atomically. Returns the number of records applied.
    pub async fn apply_batch(&self, batch: &ChangeBatch) -> Result<usize, ServiceError> {
        let _guard = self.apply_lock.lock().await;

        if batch.is_empty() {
            debug!("Received empty change batch");
            metrics::record_batch("heartbeat");
            self.stats.write().await.heartbeats += 1;
            return Ok(0);
        }

        match self.apply_in_transaction(batch).await {
            Ok(applied) => {
                for (table, operation) in &applied {
                    metrics::record_change(table.table_name(), operation.as_str());
                }
                metrics::record_batch("applied");
                let applied = applied.len();

                let mut stats = self.stats.write().await;
                stats.batches_applied += 1;
                stats.records_applied += applied as u64;
                stats.last_applied_at = Some(Utc::now());

                info!(records = applied, "Applied change batch");
                Ok(applied)
            }
            Err(e) => {
                metrics::record_batch("failed");
                self.stats.write().await.failed_batches += 1;
                warn!(error = %e, records = batch.len(), "Change batch rejected");
                Err(e)
            }
        }
    }

    async fn apply_in_transaction(
        &self,
        batch: &ChangeBatch,
    ) -> Result<Vec<(KmsTable, Operation)>, ServiceError> {
        // Validate everything before touching the store.
        let changes = batch
            .changes
            .iter()
            .enumerate()
            .map(|(index, record)| decode(index, record))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.db.begin().await?;
        for change in &changes {
            self.write(&mut tx, change).await?;
        }
        tx.commit().await?;

        Ok(batch
            .changes
            .iter()
            .zip(&changes)
            .map(|(record, change)| (change.table(), record.operation))
            .collect())
    }

    async fn write(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        change: &Change,
    ) -> Result<(), ServiceError> {
        match change {
            Change::Upsert {
                table,
                values,
                replaced,
            } => {
                if let Some((tenant_id, key)) = replaced {
                    self.remove(tx, *table, tenant_id, key).await?;
                }
                self.db.upsert_row(tx, *table, values).await
            }
            Change::Delete {
                table,
                tenant_id,
                key,
            } => self.remove(tx, *table, tenant_id, key).await,
        }
    }

    /// Delete a row and the rows that only exist on its behalf.
    async fn remove(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        table: KmsTable,
        tenant_id: &str,
        key: &Key,
    ) -> Result<(), ServiceError> {
        let removed = self.db.delete_row(tx, table, key).await?;
        if removed == 0 {
            debug!(table = %table, "Delete matched no row");
        }

        if let Some((_, id)) = key.iter().find(|(column, _)| *column == "id") {
            if table.owns_attributes() {
                self.db.delete_attributes(tx, tenant_id, id).await?;
            }
            if table == KmsTable::AppCredential {
                self.db.delete_credential_mappings(tx, tenant_id, id).await?;
            }
        }
        Ok(())
    }
}

fn decode(index: usize, record: &ChangeRecord) -> Result<Change, ServiceError> {
    let malformed = |reason: String| ServiceError::MalformedChange {
        index,
        table: record.table.clone(),
        reason,
    };

    let table = KmsTable::from_feed_name(&record.table)
        .ok_or_else(|| malformed("unknown table".to_string()))?;

    match record.operation {
        Operation::Insert | Operation::Update => {
            let new_row = record
                .new_row
                .as_ref()
                .ok_or_else(|| malformed(format!("{} without a new row", record.operation)))?;
            let values = row_values(table, new_row).map_err(&malformed)?;

            let replaced = match (&record.operation, &record.old_row) {
                (Operation::Update, Some(old_row)) => {
                    let new_key = key_of(table, new_row).map_err(&malformed)?;
                    match (tenant_of(old_row), key_of(table, old_row)) {
                        (Ok(tenant_id), Ok(old_key)) if old_key != new_key => {
                            Some((tenant_id, old_key))
                        }
                        _ => None,
                    }
                }
                _ => None,
            };

            Ok(Change::Upsert {
                table,
                values,
                replaced,
            })
        }
        Operation::Delete => {
            let row = record
                .old_row
                .as_ref()
                .or(record.new_row.as_ref())
                .ok_or_else(|| malformed("DELETE without a row image".to_string()))?;
            Ok(Change::Delete {
                table,
                tenant_id: tenant_of(row).map_err(&malformed)?,
                key: key_of(table, row).map_err(&malformed)?,
            })
        }
    }
}

fn required(row: &Row, column: &str) -> Result<String, String> {
    row.non_empty(column)
        .ok_or_else(|| format!("missing required column {}", column))
}

fn tenant_of(row: &Row) -> Result<String, String> {
    required(row, TENANT_COLUMN)
}

fn attribute_owner(row: &Row) -> Result<String, String> {
    ATTRIBUTE_OWNER_COLUMNS
        .iter()
        .find_map(|column| row.non_empty(column))
        .map(Ok)
        .unwrap_or_else(|| required(row, ATTRIBUTE_OWNER_FALLBACK))
}

fn key_of(table: KmsTable, row: &Row) -> Result<Key, String> {
    table
        .key_columns()
        .iter()
        .map(|column| -> Result<(&'static str, String), String> {
            let value = if table == KmsTable::Attribute && *column == "entity_id" {
                attribute_owner(row)?
            } else {
                required(row, column)?
            };
            Ok((*column, value))
        })
        .collect()
}

/// Owner of an app row, from explicit owner columns or the generic pair.
fn app_parent(row: &Row) -> Result<AppParent, String> {
    match (row.non_empty("developer_id"), row.non_empty("company_id")) {
        (Some(developer_id), None) => Ok(AppParent::Developer(developer_id)),
        (None, Some(company_id)) => Ok(AppParent::Company(company_id)),
        (Some(_), Some(_)) => Err("app names both a developer and a company".to_string()),
        (None, None) => {
            let parent_id = required(row, "parent_id")?;
            let kind = row
                .non_empty("type")
                .or_else(|| row.non_empty("parent_type"))
                .ok_or_else(|| "app has no parent".to_string())?;
            AppParent::from_parts(&kind, parent_id)
                .ok_or_else(|| format!("unknown app parent type {}", kind))
        }
    }
}

fn integer(row: &Row, column: &str) -> Result<i64, String> {
    match row.non_empty(column) {
        None => Ok(0),
        Some(text) => text
            .trim()
            .parse()
            .map_err(|_| format!("column {} is not an integer: {}", column, text)),
    }
}

/// Full column image for an upsert; absent columns reset to their defaults.
fn row_values(table: KmsTable, row: &Row) -> Result<Vec<(&'static str, BoundValue)>, String> {
    let mut values: Vec<(&'static str, BoundValue)> = key_of(table, row)?
        .into_iter()
        .map(|(column, value)| (column, BoundValue::Text(value)))
        .collect();

    if !table.tenant_in_key() {
        values.push((TENANT_COLUMN, BoundValue::Text(tenant_of(row)?)));
    }

    let parent = match table {
        KmsTable::App => Some(app_parent(row)?),
        _ => None,
    };

    for (column, kind) in table.data_columns() {
        let value = match (*column, &parent, kind) {
            ("parent_id", Some(parent), _) => BoundValue::Text(parent.id().to_string()),
            ("parent_type", Some(parent), _) => BoundValue::Text(parent.kind().to_string()),
            (_, _, ColumnKind::Integer) => BoundValue::Integer(integer(row, column)?),
            (_, _, ColumnKind::Text) => BoundValue::Text(row.text(column).unwrap_or_default()),
        };
        values.push((*column, value));
    }

    values.push((
        CHANGE_SELECTOR_COLUMN,
        BoundValue::Text(row.text(CHANGE_SELECTOR_COLUMN).unwrap_or_default()),
    ));

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn developer_row(id: &str) -> Row {
        Row::new()
            .with("id", id)
            .with("tenant_id", "t1")
            .with("email", "d@example.com")
            .with("status", "Active")
            .with("_change_selector", "org1")
    }

    fn value<'a>(values: &'a [(&'static str, BoundValue)], column: &str) -> Option<&'a BoundValue> {
        values.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    #[test]
    fn insert_decodes_full_column_image() {
        let change = decode(0, &ChangeRecord::insert("kms.developer", developer_row("d1"))).unwrap();
        let Change::Upsert { table, values, replaced } = change else {
            panic!("expected upsert");
        };
        assert_eq!(table, KmsTable::Developer);
        assert_eq!(replaced, None);
        assert_eq!(value(&values, "id"), Some(&BoundValue::Text("d1".into())));
        assert_eq!(value(&values, "tenant_id"), Some(&BoundValue::Text("t1".into())));
        assert_eq!(value(&values, "first_name"), Some(&BoundValue::Text(String::new())));
        assert_eq!(
            value(&values, CHANGE_SELECTOR_COLUMN),
            Some(&BoundValue::Text("org1".into()))
        );
    }

    #[test]
    fn unknown_table_is_malformed() {
        let err = decode(3, &ChangeRecord::insert("kms.widgets", developer_row("d1"))).unwrap_err();
        assert!(matches!(err, ServiceError::MalformedChange { index: 3, .. }));
    }

    #[test]
    fn missing_key_or_tenant_is_malformed() {
        let no_id = Row::new().with("tenant_id", "t1");
        assert!(decode(0, &ChangeRecord::insert("kms_developer", no_id)).is_err());

        let no_tenant = Row::new().with("id", "d1");
        assert!(decode(0, &ChangeRecord::delete("kms_developer", no_tenant)).is_err());
    }

    #[test]
    fn app_parent_comes_from_owner_columns() {
        let row = Row::new()
            .with("id", "a1")
            .with("tenant_id", "t1")
            .with("company_id", "c1");
        assert_eq!(app_parent(&row), Ok(AppParent::Company("c1".into())));

        let generic = Row::new().with("parent_id", "d1").with("type", "developer");
        assert_eq!(app_parent(&generic), Ok(AppParent::Developer("d1".into())));
    }

    #[test]
    fn app_with_both_or_no_parent_is_malformed() {
        let both = Row::new()
            .with("id", "a1")
            .with("tenant_id", "t1")
            .with("developer_id", "d1")
            .with("company_id", "c1");
        assert!(decode(0, &ChangeRecord::insert("kms.app", both)).is_err());

        let neither = Row::new().with("id", "a1").with("tenant_id", "t1");
        assert!(decode(0, &ChangeRecord::insert("kms.app", neither)).is_err());
    }

    #[test]
    fn update_with_changed_key_replaces_old_row() {
        let change = decode(
            0,
            &ChangeRecord::update("kms.developer", developer_row("d1"), developer_row("d2")),
        )
        .unwrap();
        let Change::Upsert { replaced, .. } = change else {
            panic!("expected upsert");
        };
        assert_eq!(replaced, Some(("t1".to_string(), vec![("id", "d1".to_string())])));
    }

    #[test]
    fn attribute_owner_falls_back_through_entity_columns() {
        let row = Row::new()
            .with("tenant_id", "t1")
            .with("app_id", "a1")
            .with("name", "tier");
        let key = key_of(KmsTable::Attribute, &row).unwrap();
        assert_eq!(
            key,
            vec![
                ("tenant_id", "t1".to_string()),
                ("entity_id", "a1".to_string()),
                ("name", "tier".to_string()),
            ]
        );
    }

    #[test]
    fn non_numeric_integer_column_is_malformed() {
        let row = Row::new()
            .with("id", "p1")
            .with("tenant_id", "t1")
            .with("quota_interval", "often");
        assert!(decode(0, &ChangeRecord::insert("kms.api_product", row)).is_err());
    }
}
