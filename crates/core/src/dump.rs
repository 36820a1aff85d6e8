//! Snapshots of committed values, produced by the dump commands.

use repldb_types::{ItemId, SiteId, Value};
use std::fmt;

/// One copy of one item at one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyDump {
    pub site: SiteId,
    pub item: ItemId,
    /// Last committed value.
    pub value: Value,
    /// False while a recovered replica waits for its first committed write.
    pub available: bool,
}

impl fmt::Display for CopyDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} = {}", self.item, self.site, self.value)?;
        if !self.available {
            write!(f, " not available for read until a write command is committed")?;
        }
        Ok(())
    }
}

/// Every copy held by one running site, in item order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDump {
    pub site: SiteId,
    pub copies: Vec<CopyDump>,
}

impl SiteDump {
    /// The copy of `item`, if this site hosts one.
    pub fn copy(&self, item: ItemId) -> Option<&CopyDump> {
        self.copies.iter().find(|c| c.item == item)
    }
}

impl fmt::Display for SiteDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, copy) in self.copies.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", copy)?;
        }
        Ok(())
    }
}
