//! Index-name discovery from the plain-text index catalog.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

/// Collect the index names matching each prefix, in catalog order.
///
/// `catalog` is the text table served by `_cat/indices?v&s=index`.
///
/// An index matches `prefix` when a whitespace-delimited column of a catalog
/// line reads `<prefix>-<digits>`. The prefix is used as a regular expression
/// fragment; one that does not compile yields no matches. Prefixes without
/// matches are left out of the map.
pub fn parse_index_catalog<S: AsRef<str>>(catalog: &str, prefixes: &[S]) -> HashMap<String, Vec<String>> {
    let lines: Vec<&str> = catalog.lines().collect();
    let mut result: HashMap<String, Vec<String>> = HashMap::new();

    for prefix in prefixes {
        let prefix = prefix.as_ref();
        let pattern = match Regex::new(&format!(r"(?:^|\s)({}-\d*)(?:\s|$)", prefix)) {
            Ok(pattern) => pattern,
            Err(e) => {
                debug!(prefix, error = %e, "Skipping index prefix with invalid pattern");
                continue;
            }
        };

        for line in &lines {
            if let Some(name) = pattern.captures(line).and_then(|caps| caps.get(1)) {
                result
                    .entry(prefix.to_string())
                    .or_default()
                    .push(name.as_str().to_string());
            }
        }
    }

    result
}
