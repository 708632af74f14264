//! Nodes excluded from writer election unless nothing else is viable.

use crate::net::endpoint::parse_host_list_lenient;
use crate::net::NodeAddr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterBlacklist {
    entries: Vec<NodeAddr>,
}

impl WriterBlacklist {
    pub fn new(entries: Vec<NodeAddr>) -> Self {
        Self { entries }
    }

    /// Parse "host:port,host:port". Malformed entries are skipped with a warning.
    pub fn parse(list: &str) -> Self {
        Self::new(parse_host_list_lenient(list))
    }

    pub fn contains(&self, addr: &NodeAddr) -> bool {
        self.entries.contains(addr)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeAddr> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_malformed() {
        let blacklist = WriterBlacklist::parse("db1:3306, nope ,db2:3307");
        assert!(blacklist.contains(&NodeAddr::new("db1", 3306)));
        assert!(blacklist.contains(&NodeAddr::new("db2", 3307)));
        assert!(!blacklist.contains(&NodeAddr::new("db2", 3306)));
        assert_eq!(blacklist.iter().count(), 2);
    }

    #[test]
    fn test_empty() {
        assert!(WriterBlacklist::parse("").is_empty());
        assert!(WriterBlacklist::default().is_empty());
    }
}
