/// Most of the crate reports errors as plain, user-presentable text.
pub type SError = String;

/// Trims and lowercases `s`, for case/whitespace-insensitive comparisons.
pub fn fold_str(s: &str) -> String {
    s.trim().to_lowercase()
}

/// True if the environment variable is set to something other than "".
pub fn env_var_non_empty(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::fold_str;

    #[test]
    fn test_fold_str() {
        assert_eq!(fold_str("  Transfer DEBIT "), "transfer debit");
        assert_eq!(fold_str(""), "");
    }
}
