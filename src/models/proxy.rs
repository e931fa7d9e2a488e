use std::collections::VecDeque;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches an `a.b.c.d:port` endpoint with an optional trailing run of
/// `+`/`-` mark characters, anywhere in a line.
static ENDPOINT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b((?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)):(\d{1,5})([+-]*)",
    )
    .expect("hardcoded endpoint pattern")
});

/// Bounded history of signed outcome marks for one proxy
///
/// Each mark of magnitude `m` is stored as `m` unit entries of its sign, so
/// the persisted form is a plain run of `+`/`-` characters appended to the
/// endpoint. The health score is negative count minus positive count: higher
/// means worse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    marks: VecDeque<i8>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from its persisted `+`/`-` suffix
    ///
    /// Characters other than `+` and `-` are ignored.
    pub fn from_suffix(suffix: &str) -> Self {
        let marks = suffix
            .chars()
            .filter_map(|c| match c {
                '+' => Some(1),
                '-' => Some(-1),
                _ => None,
            })
            .collect();
        Self { marks }
    }

    /// Append a signed mark; magnitude `m` contributes `m` unit entries
    pub fn record(&mut self, mark: i8) {
        let unit = mark.signum();
        for _ in 0..mark.unsigned_abs() {
            self.marks.push_back(unit);
        }
    }

    /// Health score: negative count minus positive count
    pub fn score(&self) -> i32 {
        self.marks.iter().map(|&m| -i32::from(m)).sum()
    }

    /// Total number of unit marks currently held
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Drop all history except the marks of the most recent report
    ///
    /// Bounds ledger growth while keeping the sign of the latest trend.
    pub fn compact(&mut self, latest: i8) {
        self.marks.clear();
        self.record(latest);
    }

    /// Persisted form: one character per unit mark
    pub fn suffix(&self) -> String {
        self.marks
            .iter()
            .map(|&m| if m > 0 { '+' } else { '-' })
            .collect()
    }
}

/// One proxy endpoint plus its health history
///
/// `endpoint` is the normalized `host:port` string and the dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    pub endpoint: String,
    pub ledger: Ledger,
}

impl ProxyRecord {
    /// Create a fresh record with an empty ledger
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ledger: Ledger::new(),
        }
    }

    /// Parse a candidate line into a record
    ///
    /// Accepts `ip:port` with an optional trailing run of `+`/`-` marks
    /// (the persisted restart state). Returns `None` for anything else,
    /// including out-of-range ports.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = ENDPOINT_LINE.captures(line)?;
        let ip = caps.get(1)?.as_str();
        let port: u16 = caps.get(2)?.as_str().parse().ok()?;
        if port == 0 {
            return None;
        }
        let suffix = caps.get(3).map_or("", |m| m.as_str());
        Some(Self {
            endpoint: format!("{}:{}", ip, port),
            ledger: Ledger::from_suffix(suffix),
        })
    }

    /// Storage form: endpoint plus the ledger's mark suffix
    pub fn storage_line(&self) -> String {
        format!("{}{}", self.endpoint, self.ledger.suffix())
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_line())
    }
}
