//! Ignore-list parsing: exact addresses, dashed ranges, and CIDR blocks.
//!
//! Consumers of the probe collection (rendering and reporting tools) use
//! this to mask reserved or opted-out address space. The sweep itself never
//! consults it; every address in range is probed and recorded.

use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use cidr_utils::cidr::Ipv4Cidr;
use thiserror::Error;

/// An ignore file that could not be loaded.
#[derive(Debug, Error)]
pub enum IgnoreError {
    #[error("could not read ignore list: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: unrecognized ignore entry {entry:?}")]
    Parse { line: usize, entry: String },
}

enum Entry {
    Exact(u32),
    Range(u32, u32),
}

/// Membership table built from a plain-text ignore file.
///
/// One entry per line: an exact address (`192.0.2.1`), a dashed range
/// (`10.0.0.0-10.0.0.255`), or a CIDR block (`198.18.0.0/15`). Blank lines
/// and `#` comments are skipped.
#[derive(Debug, Default)]
pub struct IgnoreList {
    exact: HashSet<u32>,
    ranges: Vec<(u32, u32)>,
}

impl IgnoreList {
    /// Load and parse the ignore file at `path`.
    pub fn load(path: &Path) -> Result<Self, IgnoreError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Parse ignore entries from text.
    pub fn parse(input: &str) -> Result<Self, IgnoreError> {
        let mut list = Self::default();
        for (idx, raw) in input.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_entry(line) {
                Some(Entry::Exact(ip)) => {
                    list.exact.insert(ip);
                }
                Some(Entry::Range(start, end)) => list.ranges.push((start, end)),
                None => {
                    return Err(IgnoreError::Parse {
                        line: idx + 1,
                        entry: line.to_owned(),
                    })
                }
            }
        }
        Ok(list)
    }

    /// Whether `addr` is covered by any entry.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let ip = u32::from(addr);
        self.exact.contains(&ip)
            || self
                .ranges
                .iter()
                .any(|&(start, end)| (start..=end).contains(&ip))
    }

    /// Every ignored address: exact entries first, then ranges expanded in
    /// order of appearance.
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        let exact = self.exact.iter().copied();
        let ranged = self.ranges.iter().flat_map(|&(start, end)| start..=end);
        exact.chain(ranged).map(Ipv4Addr::from)
    }
}

fn parse_entry(entry: &str) -> Option<Entry> {
    if let Some((start, end)) = entry.split_once('-') {
        let start = u32::from(Ipv4Addr::from_str(start.trim()).ok()?);
        let end = u32::from(Ipv4Addr::from_str(end.trim()).ok()?);
        if start > end {
            return None;
        }
        Some(Entry::Range(start, end))
    } else if entry.contains('/') {
        let cidr = Ipv4Cidr::from_str(entry).ok()?;
        Some(Entry::Range(
            cidr.first_address().into(),
            cidr.last_address().into(),
        ))
    } else {
        Some(Entry::Exact(Ipv4Addr::from_str(entry).ok()?.into()))
    }
}
