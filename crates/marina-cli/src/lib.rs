/// Truncate a string to at most max_len bytes, appending "..." if truncated.
/// The cut lands on a char boundary, so multibyte URLs never panic.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len.saturating_sub(3);
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("https://cdn.example.com/a.jpg", 15), "https://cdn....");
        assert_eq!(truncate_string("ab", 2), "ab");
    }

    #[test]
    fn truncate_string_multibyte_url() {
        let url = format!("https://cdn.example.com/{}.jpg", "яхта".repeat(8));
        let out = truncate_string(&url, 48);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 48);
    }
}

/// Initialize tracing for CLI binaries.
///
/// Production runs emit JSON lines for log shippers; everything else gets the
/// human-readable formatter.
pub fn init_tracing(production: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if production {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
