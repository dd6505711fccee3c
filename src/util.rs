use std::collections::BTreeSet;

/// Split on `delimiter`, trim every piece and drop empty ones.
/// Order is preserved and duplicates pass through.
pub fn split_lines(input: &str, delimiter: char) -> Vec<String> {
    input
        .split(delimiter)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Newline-separated list normalization used everywhere in the compiler
pub fn process_lines(input: &str) -> Vec<String> {
    split_lines(input, '\n')
}

/// Deduplicate and sort a newline-separated domain list for storage
pub fn process_domain(input: &str) -> String {
    dedup_sorted(process_lines(input))
}

/// Deduplicate and sort a newline-separated IP/CIDR list for storage
pub fn process_ip(input: &str) -> String {
    dedup_sorted(process_lines(input))
}

/// Keep only valid ports (`443`) and ranges (`1000-2000`), deduplicated and sorted
pub fn process_port(input: &str) -> String {
    dedup_sorted(
        process_lines(input)
            .into_iter()
            .filter(|p| is_valid_port_entry(p))
            .collect(),
    )
}

fn is_valid_port_entry(entry: &str) -> bool {
    let in_range = |n: u32| (1..=65535).contains(&n);

    if let Some((start, end)) = entry.split_once('-') {
        if !is_digits(start) || !is_digits(end) {
            return false;
        }
        return match (start.parse::<u32>(), end.parse::<u32>()) {
            (Ok(s), Ok(e)) => in_range(s) && in_range(e) && s <= e,
            _ => false,
        };
    }

    is_digits(entry) && entry.parse::<u32>().map(in_range).unwrap_or(false)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn dedup_sorted(items: Vec<String>) -> String {
    items
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Time-based identifier: milliseconds * 10000 + random suffix, in base 36
pub fn generate_unique_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let suffix: u64 = rand::random_range(0..10_000);
    to_base36(millis * 10_000 + suffix)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_lines_keeps_order_and_duplicates() {
        let lines = process_lines("  b.com \n\n a.com\nb.com\n   \n");
        assert_eq!(lines, vec!["b.com", "a.com", "b.com"]);
    }

    #[test]
    fn test_split_lines_with_comma() {
        assert_eq!(split_lines("http, tls,,bittorrent", ','), vec!["http", "tls", "bittorrent"]);
    }

    #[test]
    fn test_process_domain_dedups_and_sorts() {
        assert_eq!(process_domain("b.com\na.com\nb.com\n"), "a.com\nb.com");
        assert_eq!(process_domain("   "), "");
    }

    #[test]
    fn test_process_port_filters_invalid() {
        let ports = process_port("443\n0\n70000\n1000-2000\n2000-1000\nabc\n53");
        assert_eq!(ports, "1000-2000\n443\n53");
    }

    #[test]
    fn test_unique_ids_are_base36() {
        let id = generate_unique_id();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
