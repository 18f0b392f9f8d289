// Event-name pattern matching
//
// Three glob forms over colon-namespaced event names:
// - exact string equality
// - "*" matches every name
// - "prefix:*" matches names starting with "prefix:"
// - "*:suffix" matches names ending with ":suffix"
//
// A multi-pattern filter is the logical OR of its patterns; an empty filter
// matches nothing.

/// Check whether a single pattern matches an event name
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(":*") {
        return name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(':'));
    }
    if let Some(suffix) = pattern.strip_prefix("*:") {
        return name
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with(':'));
    }
    pattern == name
}

/// Check whether any pattern in a filter matches an event name
pub fn matches_any(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|p| matches_pattern(p, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_pattern("task:created", "task:created"));
        assert!(!matches_pattern("task:created", "task:updated"));
    }

    #[test]
    fn test_wildcard_matches_everything() {
        assert!(matches_pattern("*", "task:created"));
        assert!(matches_pattern("*", "anything"));
    }

    #[test]
    fn test_prefix_pattern() {
        assert!(matches_pattern("task:*", "task:created"));
        assert!(matches_pattern("task:*", "task:sub:created"));
        assert!(!matches_pattern("task:*", "taskforce:created"));
        assert!(!matches_pattern("task:*", "job:created"));
    }

    #[test]
    fn test_suffix_pattern() {
        assert!(matches_pattern("*:created", "task:created"));
        assert!(matches_pattern("*:created", "agent:task:created"));
        assert!(!matches_pattern("*:created", "task:recreated"));
        assert!(!matches_pattern("*:created", "created"));
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        assert!(!matches_any(&[], "task:created"));
    }

    #[test]
    fn test_multi_pattern_is_or() {
        let patterns = vec!["task:*".to_string(), "*:failed".to_string()];
        assert!(matches_any(&patterns, "task:created"));
        assert!(matches_any(&patterns, "job:failed"));
        assert!(!matches_any(&patterns, "job:created"));
    }
}
