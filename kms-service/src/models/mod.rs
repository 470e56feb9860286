//! Row models for the locally replicated KMS catalog and the change feed
//! that maintains it.

pub mod api_product;
pub mod app;
pub mod app_credential;
pub mod attribute;
pub mod change;
pub mod company;
pub mod company_developer;
pub mod developer;
pub mod table;

pub use api_product::ApiProduct;
pub use app::{App, AppParent};
pub use app_credential::AppCredential;
pub use attribute::Attribute;
pub use change::{ChangeBatch, ChangeRecord, ColumnValue, Operation, Row};
pub use company::Company;
pub use company_developer::CompanyDeveloper;
pub use developer::Developer;
pub use table::{ColumnKind, KmsTable};

/// Parse a replicated list column.
///
/// Upstream sends Postgres array literals (`{a,"b c"}`); JSON arrays are
/// accepted as well. Anything else is treated as a single element.
pub fn parse_text_array(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
            return values;
        }
    }

    let inner = match trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(inner) => inner,
        None => return vec![trimmed.to_string()],
    };

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                was_quoted = true;
            }
            '\\' if quoted => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' if !quoted => {
                push_element(&mut items, &current, was_quoted);
                current.clear();
                was_quoted = false;
            }
            _ => current.push(c),
        }
    }
    push_element(&mut items, &current, was_quoted);

    items
}

fn push_element(items: &mut Vec<String>, raw: &str, was_quoted: bool) {
    let value = if was_quoted { raw } else { raw.trim() };
    if was_quoted || !value.is_empty() {
        items.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_postgres_array_literal() {
        assert_eq!(parse_text_array("{Env_0, Env_1}"), vec!["Env_0", "Env_1"]);
    }

    #[test]
    fn parses_quoted_elements() {
        assert_eq!(
            parse_text_array(r#"{"/a/**","with, comma",plain}"#),
            vec!["/a/**", "with, comma", "plain"]
        );
    }

    #[test]
    fn parses_json_array() {
        assert_eq!(parse_text_array(r#"["XYZ","ABC"]"#), vec!["XYZ", "ABC"]);
    }

    #[test]
    fn empty_inputs_yield_no_elements() {
        assert!(parse_text_array("").is_empty());
        assert!(parse_text_array("{}").is_empty());
        assert!(parse_text_array("   ").is_empty());
    }

    #[test]
    fn bare_value_is_a_single_element() {
        assert_eq!(parse_text_array("/test"), vec!["/test"]);
    }
}
