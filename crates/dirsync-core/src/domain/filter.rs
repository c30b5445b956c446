//! Directory search filter construction (RFC 4515 string form)
//!
//! Filters are assembled from independently configured fragments: the
//! profile's user list filter, a presence test for the display name, and an
//! optional search term. Empty fragments are dropped.

/// Escapes special characters in a filter assertion value (RFC 4515)
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Combines filter fragments with the given operator (`&` or `|`)
///
/// Fragments that are empty are skipped; fragments not already wrapped in
/// parentheses are wrapped. Returns an empty string when nothing is left.
fn combine_filter(operator: char, parts: &[String]) -> String {
    let parts: Vec<String> = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.starts_with('(') {
                p.to_string()
            } else {
                format!("({p})")
            }
        })
        .collect();

    if parts.is_empty() {
        return String::new();
    }
    format!("({operator}{})", parts.join(""))
}

/// Combines fragments with AND
///
/// ```
/// use dirsync_core::domain::filter::combine_filter_with_and;
///
/// let filter = combine_filter_with_and(&[
///     "(objectClass=inetOrgPerson)".to_string(),
///     "displayName=*".to_string(),
///     String::new(),
/// ]);
/// assert_eq!(filter, "(&(objectClass=inetOrgPerson)(displayName=*))");
/// ```
#[must_use]
pub fn combine_filter_with_and(parts: &[String]) -> String {
    combine_filter('&', parts)
}

/// Combines fragments with OR
#[must_use]
pub fn combine_filter_with_or(parts: &[String]) -> String {
    combine_filter('|', parts)
}

/// Builds the filter part for a free-text user search
///
/// An empty term yields an empty part (the whole population). Otherwise
/// each search attribute is matched as a substring, OR-combined.
#[must_use]
pub fn user_search_filter(term: &str, search_attributes: &[String]) -> String {
    let term = term.trim();
    if term.is_empty() || search_attributes.is_empty() {
        return String::new();
    }

    let escaped = escape_filter_value(term);
    let parts: Vec<String> = search_attributes
        .iter()
        .map(|attr| format!("({attr}=*{escaped}*)"))
        .collect();

    if parts.len() == 1 {
        return parts.into_iter().next().unwrap_or_default();
    }
    combine_filter_with_or(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape_filter_value("a*b"), "a\\2ab");
        assert_eq!(escape_filter_value("(x)"), "\\28x\\29");
        assert_eq!(escape_filter_value("back\\slash"), "back\\5cslash");
        assert_eq!(escape_filter_value("plain"), "plain");
    }

    #[test]
    fn test_combine_wraps_bare_fragments() {
        let filter = combine_filter_with_and(&[
            "objectClass=person".to_string(),
            "(cn=*)".to_string(),
        ]);
        assert_eq!(filter, "(&(objectClass=person)(cn=*))");
    }

    #[test]
    fn test_combine_skips_empty_fragments() {
        let filter = combine_filter_with_and(&[
            String::new(),
            "  ".to_string(),
            "(uid=*)".to_string(),
        ]);
        assert_eq!(filter, "(&(uid=*))");
        assert_eq!(combine_filter_with_and(&[]), "");
    }

    #[test]
    fn test_user_search_empty_term() {
        let attrs = vec!["displayName".to_string()];
        assert_eq!(user_search_filter("", &attrs), "");
        assert_eq!(user_search_filter("   ", &attrs), "");
    }

    #[test]
    fn test_user_search_single_attribute() {
        let attrs = vec!["displayName".to_string()];
        assert_eq!(user_search_filter("ali", &attrs), "(displayName=*ali*)");
    }

    #[test]
    fn test_user_search_multiple_attributes_escaped() {
        let attrs = vec!["cn".to_string(), "mail".to_string()];
        assert_eq!(
            user_search_filter("a*", &attrs),
            "(|(cn=*a\\2a*)(mail=*a\\2a*))"
        );
    }
}
