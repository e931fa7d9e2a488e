//! Candidate extraction from proxy-listing pages
//!
//! Listing sites publish endpoints in wildly different shapes: bare
//! `ip:port` text, table rows, anchor-wrapped ports, JSON blobs with
//! hex-encoded ports, and markup deliberately split to defeat naive
//! matching. Each shape gets its own extractor; all of them run over every
//! page and their outputs are unioned. Malformed input never fails — the
//! worst case is an empty set.

use std::collections::BTreeSet;

use regex::Regex;

/// IPv4 dotted quad with range-checked octets
const IPV4: &str = r"(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)";

/// Markup substring some listing sites splice into addresses
const SPAN_SPLICE: &str = "</span><span>";

/// Multi-pattern endpoint extractor
pub struct Scraper {
    /// `ip:port` anywhere in the text
    bare: Regex,
    /// `ip</td><td>port` table rows
    cell: Regex,
    /// `ip</td><td><a ...>port` anchor-wrapped ports
    anchor: Regex,
    /// JSON-ish `"PROXY_IP":"a.b.c.d" ... "PROXY_PORT":"1F90"` (hex port)
    json_hex: Regex,
    /// `ip` and `port` separated by up to three short markup fragments,
    /// matched after stripping the span splice
    spaced: Regex,
}

impl Scraper {
    pub fn new() -> Self {
        Self {
            bare: pattern(&format!(r"\b({IPV4}):(\d{{1,5}})\b")),
            cell: pattern(&format!(r"({IPV4})\s*</td>\s*<td[^>]*>\s*(\d{{1,5}})")),
            anchor: pattern(&format!(
                r"({IPV4})\s*</td>\s*<td[^>]*>\s*<a[^>]*>\s*(\d{{1,5}})"
            )),
            json_hex: pattern(&format!(
                r#"(?s)PROXY_IP\\?"\s*:\s*\\?"({IPV4})\\?".*?PROXY_PORT\\?"\s*:\s*\\?"([0-9A-Fa-f]{{1,4}})\\?""#
            )),
            spaced: pattern(&format!(
                r"({IPV4})\s*(?:<[^>]{{0,32}}>\s*){{1,3}}(\d{{1,5}})"
            )),
        }
    }

    /// Extract `ip:port` candidates from scraped page text
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();

        for caps in self.bare.captures_iter(text) {
            push_candidate(&mut found, &caps[1], &caps[2], 10);
        }
        for caps in self.cell.captures_iter(text) {
            push_candidate(&mut found, &caps[1], &caps[2], 10);
        }
        for caps in self.anchor.captures_iter(text) {
            push_candidate(&mut found, &caps[1], &caps[2], 10);
        }
        for caps in self.json_hex.captures_iter(text) {
            push_candidate(&mut found, &caps[1], &caps[2], 16);
        }

        let stripped = text.replace(SPAN_SPLICE, "");
        for caps in self.spaced.captures_iter(&stripped) {
            push_candidate(&mut found, &caps[1], &caps[2], 10);
        }

        found
    }
}

impl Default for Scraper {
    fn default() -> Self {
        Self::new()
    }
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("hardcoded scraper pattern")
}

/// Validate the port and record the candidate
///
/// `u16` parsing discards out-of-range ports; port zero is useless.
fn push_candidate(found: &mut BTreeSet<String>, ip: &str, port: &str, radix: u32) {
    if let Ok(port) = u16::from_str_radix(port, radix) {
        if port > 0 {
            found.insert(format!("{}:{}", ip, port));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_one(text: &str) -> Vec<String> {
        Scraper::new().extract(text).into_iter().collect()
    }

    #[test]
    fn test_bare_token() {
        assert_eq!(extract_one("5.2.75.170:1080"), vec!["5.2.75.170:1080"]);
    }

    #[test]
    fn test_table_cell() {
        assert_eq!(
            extract_one("5.2.75.170</td><td>1080</td>"),
            vec!["5.2.75.170:1080"]
        );
    }

    #[test]
    fn test_anchor_wrapped_port() {
        assert_eq!(
            extract_one(r#"<td>124.88.67.54</td><td><a href="/x">81</a>"#),
            vec!["124.88.67.54:81"]
        );
    }

    #[test]
    fn test_json_hex_port() {
        let fragment =
            r#"PROXY_IP":"1.2.3.4","PROXY_LAST_UPDATE":"...","PROXY_PORT":"1F90""#;
        assert_eq!(extract_one(fragment), vec!["1.2.3.4:8080"]);
    }

    #[test]
    fn test_json_hex_port_with_escaped_quotes() {
        let fragment =
            r#"PROXY_IP\":\"1.2.3.4\",\"PROXY_LAST_UPDATE\":\"...\",\"PROXY_PORT\":\"1F90\""#;
        assert_eq!(extract_one(fragment), vec!["1.2.3.4:8080"]);
    }

    #[test]
    fn test_span_splice_stripped_before_matching() {
        assert_eq!(
            extract_one("88.99.100.101</span><span><i>8080"),
            vec!["88.99.100.101:8080"]
        );
    }

    #[test]
    fn test_markup_fragments_between_ip_and_port() {
        assert_eq!(
            extract_one("88.99.100.101<b></b>3128"),
            vec!["88.99.100.101:3128"]
        );
    }

    #[test]
    fn test_union_over_mixed_page() {
        let page = concat!(
            "<tr><td>5.2.75.170</td><td>1080</td></tr>",
            " plain 9.9.9.9:53 text ",
            r#"<td>124.88.67.54</td><td><a href="/x">81</a>"#,
        );
        let found = Scraper::new().extract(page);
        assert!(found.contains("5.2.75.170:1080"));
        assert!(found.contains("9.9.9.9:53"));
        assert!(found.contains("124.88.67.54:81"));
    }

    #[test]
    fn test_invalid_ports_discarded() {
        assert!(extract_one("1.2.3.4:0").is_empty());
        assert!(extract_one("1.2.3.4:70000").is_empty());
    }

    #[test]
    fn test_malformed_input_yields_empty_set() {
        assert!(extract_one("").is_empty());
        assert!(extract_one("<html><body>no proxies here</body></html>").is_empty());
        assert!(extract_one("999.999.999.999:8080 not an ip").is_empty());
    }
}
