//! Static description of the replicated tables.

use std::fmt;

/// Storage class of a replicated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

pub const CHANGE_SELECTOR_COLUMN: &str = "_change_selector";
pub const TENANT_COLUMN: &str = "tenant_id";

const AUDIT_COLUMNS: [(&str, ColumnKind); 4] = [
    ("created_at", ColumnKind::Text),
    ("created_by", ColumnKind::Text),
    ("updated_at", ColumnKind::Text),
    ("updated_by", ColumnKind::Text),
];

const API_PRODUCT_COLUMNS: &[(&str, ColumnKind)] = &[
    ("name", ColumnKind::Text),
    ("display_name", ColumnKind::Text),
    ("description", ColumnKind::Text),
    ("api_resources", ColumnKind::Text),
    ("approval_type", ColumnKind::Text),
    ("scopes", ColumnKind::Text),
    ("proxies", ColumnKind::Text),
    ("environments", ColumnKind::Text),
    ("quota", ColumnKind::Text),
    ("quota_time_unit", ColumnKind::Text),
    ("quota_interval", ColumnKind::Integer),
    AUDIT_COLUMNS[0],
    AUDIT_COLUMNS[1],
    AUDIT_COLUMNS[2],
    AUDIT_COLUMNS[3],
];

const APP_COLUMNS: &[(&str, ColumnKind)] = &[
    ("name", ColumnKind::Text),
    ("display_name", ColumnKind::Text),
    ("access_type", ColumnKind::Text),
    ("callback_url", ColumnKind::Text),
    ("status", ColumnKind::Text),
    ("app_family", ColumnKind::Text),
    ("parent_id", ColumnKind::Text),
    ("parent_type", ColumnKind::Text),
    AUDIT_COLUMNS[0],
    AUDIT_COLUMNS[1],
    AUDIT_COLUMNS[2],
    AUDIT_COLUMNS[3],
];

const APP_CREDENTIAL_COLUMNS: &[(&str, ColumnKind)] = &[
    ("consumer_secret", ColumnKind::Text),
    ("app_id", ColumnKind::Text),
    ("method_type", ColumnKind::Text),
    ("status", ColumnKind::Text),
    ("issued_at", ColumnKind::Text),
    ("expires_at", ColumnKind::Text),
    ("app_status", ColumnKind::Text),
    ("scopes", ColumnKind::Text),
    AUDIT_COLUMNS[0],
    AUDIT_COLUMNS[1],
    AUDIT_COLUMNS[2],
    AUDIT_COLUMNS[3],
];

const DEVELOPER_COLUMNS: &[(&str, ColumnKind)] = &[
    ("username", ColumnKind::Text),
    ("first_name", ColumnKind::Text),
    ("last_name", ColumnKind::Text),
    ("password", ColumnKind::Text),
    ("email", ColumnKind::Text),
    ("status", ColumnKind::Text),
    ("encrypted_password", ColumnKind::Text),
    ("salt", ColumnKind::Text),
    AUDIT_COLUMNS[0],
    AUDIT_COLUMNS[1],
    AUDIT_COLUMNS[2],
    AUDIT_COLUMNS[3],
];

const COMPANY_COLUMNS: &[(&str, ColumnKind)] = &[
    ("name", ColumnKind::Text),
    ("display_name", ColumnKind::Text),
    ("status", ColumnKind::Text),
    AUDIT_COLUMNS[0],
    AUDIT_COLUMNS[1],
    AUDIT_COLUMNS[2],
    AUDIT_COLUMNS[3],
];

const COMPANY_DEVELOPER_COLUMNS: &[(&str, ColumnKind)] = &[
    ("roles", ColumnKind::Text),
    AUDIT_COLUMNS[0],
    AUDIT_COLUMNS[1],
    AUDIT_COLUMNS[2],
    AUDIT_COLUMNS[3],
];

const MAPPING_COLUMNS: &[(&str, ColumnKind)] =
    &[("app_id", ColumnKind::Text), ("status", ColumnKind::Text)];

const ATTRIBUTE_COLUMNS: &[(&str, ColumnKind)] =
    &[("value", ColumnKind::Text), ("type", ColumnKind::Text)];

/// The closed set of tables maintained by change ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KmsTable {
    ApiProduct,
    App,
    AppCredential,
    Developer,
    Company,
    CompanyDeveloper,
    CredentialProductMapping,
    Attribute,
}

impl KmsTable {
    pub const ALL: [KmsTable; 8] = [
        KmsTable::ApiProduct,
        KmsTable::App,
        KmsTable::AppCredential,
        KmsTable::Developer,
        KmsTable::Company,
        KmsTable::CompanyDeveloper,
        KmsTable::CredentialProductMapping,
        KmsTable::Attribute,
    ];

    /// Resolve a feed table name: `kms.app` upstream, `kms_app` locally.
    pub fn from_feed_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replacen("kms.", "kms_", 1);
        Self::ALL
            .into_iter()
            .find(|table| table.table_name() == normalized)
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            KmsTable::ApiProduct => "kms_api_product",
            KmsTable::App => "kms_app",
            KmsTable::AppCredential => "kms_app_credential",
            KmsTable::Developer => "kms_developer",
            KmsTable::Company => "kms_company",
            KmsTable::CompanyDeveloper => "kms_company_developer",
            KmsTable::CredentialProductMapping => "kms_app_credential_apiproduct_mapper",
            KmsTable::Attribute => "kms_attributes",
        }
    }

    /// Columns forming the row identity.
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            KmsTable::CompanyDeveloper => &["tenant_id", "company_id", "developer_id"],
            KmsTable::CredentialProductMapping => &["tenant_id", "appcred_id", "apiprdt_id"],
            KmsTable::Attribute => &["tenant_id", "entity_id", "name"],
            _ => &["id"],
        }
    }

    /// Replicated columns outside the key, excluding tenant and selector.
    pub fn data_columns(&self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            KmsTable::ApiProduct => API_PRODUCT_COLUMNS,
            KmsTable::App => APP_COLUMNS,
            KmsTable::AppCredential => APP_CREDENTIAL_COLUMNS,
            KmsTable::Developer => DEVELOPER_COLUMNS,
            KmsTable::Company => COMPANY_COLUMNS,
            KmsTable::CompanyDeveloper => COMPANY_DEVELOPER_COLUMNS,
            KmsTable::CredentialProductMapping => MAPPING_COLUMNS,
            KmsTable::Attribute => ATTRIBUTE_COLUMNS,
        }
    }

    /// Whether the key includes the tenant column.
    pub fn tenant_in_key(&self) -> bool {
        self.key_columns().contains(&TENANT_COLUMN)
    }

    /// Entity tables whose rows may own attribute rows.
    pub fn owns_attributes(&self) -> bool {
        matches!(
            self,
            KmsTable::ApiProduct
                | KmsTable::App
                | KmsTable::AppCredential
                | KmsTable::Developer
                | KmsTable::Company
        )
    }
}

impl fmt::Display for KmsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_qualified_and_local_names() {
        assert_eq!(KmsTable::from_feed_name("kms.app"), Some(KmsTable::App));
        assert_eq!(KmsTable::from_feed_name("kms_app"), Some(KmsTable::App));
        assert_eq!(
            KmsTable::from_feed_name("kms.app_credential_apiproduct_mapper"),
            Some(KmsTable::CredentialProductMapping)
        );
        assert_eq!(KmsTable::from_feed_name("KMS.API_PRODUCT"), Some(KmsTable::ApiProduct));
    }

    #[test]
    fn rejects_unknown_tables() {
        assert_eq!(KmsTable::from_feed_name("edgex.data_scope"), None);
        assert_eq!(KmsTable::from_feed_name("app"), None);
    }

    #[test]
    fn data_columns_never_repeat_key_columns() {
        for table in KmsTable::ALL {
            for (column, _) in table.data_columns() {
                assert!(!table.key_columns().contains(column), "{table}.{column}");
                assert_ne!(*column, TENANT_COLUMN);
            }
        }
    }
}
