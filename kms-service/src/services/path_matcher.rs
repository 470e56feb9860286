use regex::Regex;
use tracing::warn;

/// Returns true when `path` matches any of `patterns`.
///
/// `**` matches any remaining characters, `*` matches one segment, anything
/// else must match exactly. An empty pattern list matches every path.
pub fn matches<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    if patterns.is_empty() {
        return true;
    }
    patterns
        .iter()
        .any(|pattern| pattern_matches(pattern.as_ref(), path))
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == path;
    }

    let expression = to_expression(pattern);
    match Regex::new(&expression) {
        Ok(re) => re.is_match(path),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Skipping unusable resource pattern");
            false
        }
    }
}

fn to_expression(pattern: &str) -> String {
    let mut expression = String::with_capacity(pattern.len() + 8);
    expression.push('^');

    if pattern.contains("**") {
        let parts: Vec<String> = pattern.split("**").map(regex::escape).collect();
        expression.push_str(&parts.join(".*"));
    } else {
        let parts: Vec<String> = pattern.split('*').map(regex::escape).collect();
        expression.push_str(&parts.join("[^/]+"));
    }

    expression.push('$');
    expression
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_matches_any_suffix() {
        assert!(matches(&["/a/**"], "/a/b/c"));
        assert!(matches(&["/a/**"], "/a/"));
        assert!(!matches(&["/a/**"], "/b/c"));
    }

    #[test]
    fn single_star_matches_one_segment() {
        assert!(matches(&["/a/*"], "/a/b"));
        assert!(!matches(&["/a/*"], "/a/b/c"));
        assert!(!matches(&["/a/*"], "/a/"));
        assert!(matches(&["/a/*/d"], "/a/bc/d"));
    }

    #[test]
    fn literal_pattern_requires_exact_equality() {
        assert!(matches(&["/test"], "/test"));
        assert!(!matches(&["/test"], "/test/"));
        assert!(!matches(&["/te.t"], "/test"));
    }

    #[test]
    fn empty_pattern_list_is_unrestricted() {
        let none: [&str; 0] = [];
        assert!(matches(&none, "/anything"));
        assert!(matches(&none, ""));
    }

    #[test]
    fn any_pattern_in_list_suffices() {
        let patterns = vec!["/orders".to_string(), "/items/**".to_string()];
        assert!(matches(&patterns, "/items/1/detail"));
        assert!(matches(&patterns, "/orders"));
        assert!(!matches(&patterns, "/customers"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(matches(&["/v1.0/*"], "/v1.0/x"));
        assert!(!matches(&["/v1.0/*"], "/v1x0/x"));
    }
}
