//! SQLite access to the local KMS replica.
//!
//! Reads run against the pool. Writes are only issued by change ingestion,
//! inside the transaction of the batch being applied.

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{FromRow, Sqlite, Transaction};

use crate::models::{
    ApiProduct, App, AppCredential, AppParent, Attribute, Company, CompanyDeveloper, Developer,
    KmsTable,
};
use crate::services::error::ServiceError;
use crate::services::identifiers::{IdentifierType, ResolvedIdentifiers};

/// A typed column value ready for binding.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Text(String),
    Integer(i64),
}

/// SQL text plus its positional parameters.
struct Select {
    sql: String,
    binds: Vec<String>,
}

impl Select {
    fn new(sql: impl Into<String>, first: &str) -> Self {
        Self {
            sql: sql.into(),
            binds: vec![first.to_string()],
        }
    }

    fn and(mut self, clause: &str, value: &str) -> Self {
        self.sql.push_str(clause);
        self.binds.push(value.to_string());
        self
    }

    fn order_by(mut self, columns: &str) -> Self {
        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(columns);
        self
    }

    async fn fetch_all<T>(self, pool: &SqlitePool) -> Result<Vec<T>, ServiceError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut query = sqlx::query_as::<_, T>(&self.sql);
        for value in &self.binds {
            query = query.bind(value);
        }
        Ok(query.fetch_all(pool).await?)
    }
}

const PRODUCTS_BY_CREDENTIAL: &str = "SELECT DISTINCT p.* FROM kms_api_product p \
     JOIN kms_app_credential_apiproduct_mapper m ON m.apiprdt_id = p.id AND m.tenant_id = p.tenant_id \
     JOIN kms_app_credential c ON c.id = m.appcred_id AND c.tenant_id = m.tenant_id";

const PRODUCTS_BY_APP: &str = "SELECT DISTINCT p.* FROM kms_api_product p \
     JOIN kms_app_credential_apiproduct_mapper m ON m.apiprdt_id = p.id AND m.tenant_id = p.tenant_id \
     JOIN kms_app_credential c ON c.id = m.appcred_id AND c.tenant_id = m.tenant_id \
     JOIN kms_app a ON a.id = c.app_id AND a.tenant_id = c.tenant_id";

/// Narrow `a` (kms_app) to apps owned by the developer or company named by a secondary.
fn owner_clause(secondary: Option<IdentifierType>) -> Option<&'static str> {
    match secondary {
        Some(IdentifierType::DeveloperId) => {
            Some(" AND a.parent_type = 'DEVELOPER' AND a.parent_id = ?")
        }
        Some(IdentifierType::DeveloperEmail) => Some(
            " AND a.parent_type = 'DEVELOPER' AND a.parent_id IN \
             (SELECT d.id FROM kms_developer d WHERE d.email = ? AND d.tenant_id = a.tenant_id)",
        ),
        Some(IdentifierType::CompanyName) => Some(
            " AND a.parent_type = 'COMPANY' AND a.parent_id IN \
             (SELECT co.id FROM kms_company co WHERE co.name = ? AND co.tenant_id = a.tenant_id)",
        ),
        _ => None,
    }
}

fn unsupported(kind: &str, ids: &ResolvedIdentifiers) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!(
        "no {} lookup for primary identifier {}",
        kind,
        ids.primary_type
    ))
}

/// Local replica database wrapper.
#[derive(Clone)]
pub struct KmsDatabase {
    pool: SqlitePool,
}

impl KmsDatabase {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Storage(e)
            })?;
        Ok(())
    }

    /// Start the transaction a change batch is applied in.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, ServiceError> {
        Ok(self.pool.begin().await?)
    }

    // ==================== Ingestion writes ====================

    /// Insert a row, replacing every non-key column when the key exists.
    pub async fn upsert_row(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        table: KmsTable,
        values: &[(&'static str, BoundValue)],
    ) -> Result<(), ServiceError> {
        let keys = table.key_columns();
        let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let assignments: Vec<String> = columns
            .iter()
            .filter(|column| !keys.contains(column))
            .map(|column| format!("{column} = excluded.{column}"))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            table.table_name(),
            columns.join(", "),
            placeholders,
            keys.join(", "),
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in values {
            query = match value {
                BoundValue::Text(text) => query.bind(text.as_str()),
                BoundValue::Integer(number) => query.bind(*number),
            };
        }
        query.execute(&mut **tx).await?;
        Ok(())
    }

    /// Delete by key. Returns the number of rows removed.
    pub async fn delete_row(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        table: KmsTable,
        key: &[(&'static str, String)],
    ) -> Result<u64, ServiceError> {
        let predicate: Vec<String> = key.iter().map(|(column, _)| format!("{column} = ?")).collect();
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            table.table_name(),
            predicate.join(" AND ")
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in key {
            query = query.bind(value.as_str());
        }
        let result = query.execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_attributes(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM kms_attributes WHERE tenant_id = ? AND entity_id = ?")
            .bind(tenant_id)
            .bind(entity_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_credential_mappings(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "DELETE FROM kms_app_credential_apiproduct_mapper WHERE tenant_id = ? AND appcred_id = ?",
        )
        .bind(tenant_id)
        .bind(credential_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    // ==================== Lookups by identifiers ====================

    pub async fn find_api_products(
        &self,
        ids: &ResolvedIdentifiers,
    ) -> Result<Vec<ApiProduct>, ServiceError> {
        let value = ids.primary_value.as_str();
        let select = match ids.primary_type {
            IdentifierType::ApiProductName => {
                Select::new("SELECT p.* FROM kms_api_product p WHERE p.name = ?", value)
            }
            IdentifierType::ConsumerKey => {
                Select::new(format!("{PRODUCTS_BY_CREDENTIAL} WHERE c.id = ?"), value)
            }
            IdentifierType::AppId => {
                Select::new(format!("{PRODUCTS_BY_CREDENTIAL} WHERE c.app_id = ?"), value)
            }
            IdentifierType::AppName => {
                let select = Select::new(format!("{PRODUCTS_BY_APP} WHERE a.name = ?"), value);
                match owner_clause(ids.secondary_type) {
                    Some(clause) => select.and(clause, &ids.secondary_value),
                    None => select,
                }
            }
            _ => return Err(unsupported("api product", ids)),
        };

        let products: Vec<ApiProduct> = select.order_by("p.id").fetch_all(&self.pool).await?;

        if ids.secondary_type == Some(IdentifierType::ApiResource) {
            return Ok(products
                .into_iter()
                .filter(|p| p.resources().iter().any(|r| r == &ids.secondary_value))
                .collect());
        }
        Ok(products)
    }

    pub async fn find_apps(&self, ids: &ResolvedIdentifiers) -> Result<Vec<App>, ServiceError> {
        let value = ids.primary_value.as_str();
        let select = match ids.primary_type {
            IdentifierType::AppId => Select::new("SELECT a.* FROM kms_app a WHERE a.id = ?", value),
            IdentifierType::AppName => {
                let select = Select::new("SELECT a.* FROM kms_app a WHERE a.name = ?", value);
                match owner_clause(ids.secondary_type) {
                    Some(clause) => select.and(clause, &ids.secondary_value),
                    None => select,
                }
            }
            IdentifierType::ConsumerKey => Select::new(
                "SELECT a.* FROM kms_app a \
                 JOIN kms_app_credential c ON c.app_id = a.id AND c.tenant_id = a.tenant_id \
                 WHERE c.id = ?",
                value,
            ),
            _ => return Err(unsupported("app", ids)),
        };
        select.order_by("a.id").fetch_all(&self.pool).await
    }

    pub async fn find_companies(
        &self,
        ids: &ResolvedIdentifiers,
    ) -> Result<Vec<Company>, ServiceError> {
        let value = ids.primary_value.as_str();
        let select = match ids.primary_type {
            IdentifierType::CompanyName => {
                Select::new("SELECT co.* FROM kms_company co WHERE co.name = ?", value)
            }
            IdentifierType::AppId => Select::new(
                "SELECT co.* FROM kms_company co \
                 JOIN kms_app a ON a.parent_id = co.id AND a.parent_type = 'COMPANY' AND a.tenant_id = co.tenant_id \
                 WHERE a.id = ?",
                value,
            ),
            IdentifierType::ConsumerKey => Select::new(
                "SELECT co.* FROM kms_company co \
                 JOIN kms_app a ON a.parent_id = co.id AND a.parent_type = 'COMPANY' AND a.tenant_id = co.tenant_id \
                 JOIN kms_app_credential c ON c.app_id = a.id AND c.tenant_id = a.tenant_id \
                 WHERE c.id = ?",
                value,
            ),
            _ => return Err(unsupported("company", ids)),
        };
        select.order_by("co.id").fetch_all(&self.pool).await
    }

    pub async fn find_company_developers(
        &self,
        ids: &ResolvedIdentifiers,
    ) -> Result<Vec<CompanyDeveloper>, ServiceError> {
        let select = match ids.primary_type {
            IdentifierType::CompanyName => Select::new(
                "SELECT cd.* FROM kms_company_developer cd \
                 JOIN kms_company co ON co.id = cd.company_id AND co.tenant_id = cd.tenant_id \
                 WHERE co.name = ?",
                &ids.primary_value,
            ),
            _ => return Err(unsupported("company developer", ids)),
        };
        select
            .order_by("cd.company_id, cd.developer_id")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn find_developers(
        &self,
        ids: &ResolvedIdentifiers,
    ) -> Result<Vec<Developer>, ServiceError> {
        let value = ids.primary_value.as_str();
        let select = match ids.primary_type {
            IdentifierType::DeveloperId => {
                Select::new("SELECT d.* FROM kms_developer d WHERE d.id = ?", value)
            }
            IdentifierType::DeveloperEmail => {
                Select::new("SELECT d.* FROM kms_developer d WHERE d.email = ?", value)
            }
            IdentifierType::AppId => Select::new(
                "SELECT d.* FROM kms_developer d \
                 JOIN kms_app a ON a.parent_id = d.id AND a.parent_type = 'DEVELOPER' AND a.tenant_id = d.tenant_id \
                 WHERE a.id = ?",
                value,
            ),
            IdentifierType::ConsumerKey => Select::new(
                "SELECT d.* FROM kms_developer d \
                 JOIN kms_app a ON a.parent_id = d.id AND a.parent_type = 'DEVELOPER' AND a.tenant_id = d.tenant_id \
                 JOIN kms_app_credential c ON c.app_id = a.id AND c.tenant_id = a.tenant_id \
                 WHERE c.id = ?",
                value,
            ),
            _ => return Err(unsupported("developer", ids)),
        };
        select.order_by("d.id").fetch_all(&self.pool).await
    }

    pub async fn find_app_credentials(
        &self,
        ids: &ResolvedIdentifiers,
    ) -> Result<Vec<AppCredential>, ServiceError> {
        let select = match ids.primary_type {
            IdentifierType::ConsumerKey => Select::new(
                "SELECT c.* FROM kms_app_credential c WHERE c.id = ?",
                &ids.primary_value,
            ),
            _ => return Err(unsupported("app credential", ids)),
        };
        select.order_by("c.id").fetch_all(&self.pool).await
    }

    // ==================== Cross-references ====================

    pub async fn find_attributes(
        &self,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<Vec<Attribute>, ServiceError> {
        Ok(sqlx::query_as::<_, Attribute>(
            "SELECT name, value FROM kms_attributes WHERE tenant_id = ? AND entity_id = ? ORDER BY name",
        )
        .bind(tenant_id)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Status of an app's owner, `None` when the owner row is missing.
    pub async fn find_parent_status(
        &self,
        tenant_id: &str,
        parent: &AppParent,
    ) -> Result<Option<String>, ServiceError> {
        let sql = match parent {
            AppParent::Developer(_) => {
                "SELECT status FROM kms_developer WHERE tenant_id = ? AND id = ?"
            }
            AppParent::Company(_) => "SELECT status FROM kms_company WHERE tenant_id = ? AND id = ?",
        };
        Ok(sqlx::query_scalar::<_, String>(sql)
            .bind(tenant_id)
            .bind(parent.id())
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_api_product_names_for_app(
        &self,
        tenant_id: &str,
        app_id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT p.name FROM kms_api_product p \
             JOIN kms_app_credential_apiproduct_mapper m ON m.apiprdt_id = p.id AND m.tenant_id = p.tenant_id \
             JOIN kms_app_credential c ON c.id = m.appcred_id AND c.tenant_id = m.tenant_id \
             WHERE c.tenant_id = ? AND c.app_id = ? ORDER BY p.name",
        )
        .bind(tenant_id)
        .bind(app_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn find_api_product_names_for_credential(
        &self,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT p.name FROM kms_api_product p \
             JOIN kms_app_credential_apiproduct_mapper m ON m.apiprdt_id = p.id AND m.tenant_id = p.tenant_id \
             WHERE m.tenant_id = ? AND m.appcred_id = ? ORDER BY p.name",
        )
        .bind(tenant_id)
        .bind(credential_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn find_credentials_for_app(
        &self,
        tenant_id: &str,
        app_id: &str,
    ) -> Result<Vec<AppCredential>, ServiceError> {
        Ok(sqlx::query_as::<_, AppCredential>(
            "SELECT * FROM kms_app_credential WHERE tenant_id = ? AND app_id = ? ORDER BY id",
        )
        .bind(tenant_id)
        .bind(app_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Names of the apps owned by a developer or company.
    pub async fn find_app_names_for_parent(
        &self,
        tenant_id: &str,
        parent: &AppParent,
    ) -> Result<Vec<String>, ServiceError> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT name FROM kms_app WHERE tenant_id = ? AND parent_type = ? AND parent_id = ? ORDER BY name",
        )
        .bind(tenant_id)
        .bind(parent.kind())
        .bind(parent.id())
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn find_company_names_for_developer(
        &self,
        tenant_id: &str,
        developer_id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT co.name FROM kms_company co \
             JOIN kms_company_developer cd ON cd.company_id = co.id AND cd.tenant_id = co.tenant_id \
             WHERE cd.tenant_id = ? AND cd.developer_id = ? ORDER BY co.name",
        )
        .bind(tenant_id)
        .bind(developer_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn find_company_name(
        &self,
        tenant_id: &str,
        company_id: &str,
    ) -> Result<Option<String>, ServiceError> {
        Ok(
            sqlx::query_scalar::<_, String>(
                "SELECT name FROM kms_company WHERE tenant_id = ? AND id = ?",
            )
            .bind(tenant_id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?,
        )
    }

    pub async fn find_developer_email(
        &self,
        tenant_id: &str,
        developer_id: &str,
    ) -> Result<Option<String>, ServiceError> {
        Ok(
            sqlx::query_scalar::<_, String>(
                "SELECT email FROM kms_developer WHERE tenant_id = ? AND id = ?",
            )
            .bind(tenant_id)
            .bind(developer_id)
            .fetch_optional(&self.pool)
            .await?,
        )
    }

    // ==================== Verification ====================

    /// Credential by consumer key, across tenants.
    pub async fn find_app_credential_by_key(
        &self,
        key: &str,
    ) -> Result<Option<AppCredential>, ServiceError> {
        Ok(sqlx::query_as::<_, AppCredential>(
            "SELECT * FROM kms_app_credential WHERE id = ? ORDER BY tenant_id LIMIT 1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn find_app_by_id(
        &self,
        tenant_id: &str,
        app_id: &str,
    ) -> Result<Option<App>, ServiceError> {
        Ok(
            sqlx::query_as::<_, App>("SELECT * FROM kms_app WHERE tenant_id = ? AND id = ?")
                .bind(tenant_id)
                .bind(app_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Products granted to a credential through non-revoked mappings.
    pub async fn find_granted_api_products(
        &self,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<Vec<ApiProduct>, ServiceError> {
        Ok(sqlx::query_as::<_, ApiProduct>(
            "SELECT p.* FROM kms_api_product p \
             JOIN kms_app_credential_apiproduct_mapper m ON m.apiprdt_id = p.id AND m.tenant_id = p.tenant_id \
             WHERE m.tenant_id = ? AND m.appcred_id = ? AND LOWER(m.status) <> 'revoked' \
             ORDER BY p.id",
        )
        .bind(tenant_id)
        .bind(credential_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
