//! Placement trait and its implementations.
//!
//! A placement decides, once at startup, which sites host a copy of each
//! item and what value every copy starts with. Site failures never change
//! the placement; a failed site still "hosts" its items, it just cannot
//! serve them until it recovers.

use crate::{ItemId, SiteId, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Item → hosting-sites policy, fixed for the lifetime of a simulation.
pub trait Placement: Send + Sync {
    /// Total number of sites. Sites are numbered `1..=num_sites()`.
    fn num_sites(&self) -> u32;

    /// Every item known to the placement, in ascending order.
    fn items(&self) -> Vec<ItemId>;

    /// Sites hosting a copy of `item`, in ascending order.
    ///
    /// Returns `Cow` so table-driven placements can lend their storage while
    /// rule-driven placements compute the list on demand. An unknown item is
    /// hosted nowhere.
    fn hosts(&self, item: ItemId) -> Cow<'_, [SiteId]>;

    /// Value every copy of `item` holds before any commit.
    fn initial_value(&self, item: ItemId) -> Value;

    // Derived methods

    /// Whether `item` has copies on more than one site.
    fn is_replicated(&self, item: ItemId) -> bool {
        self.hosts(item).len() > 1
    }

    /// Whether `site` hosts a copy of `item`.
    fn is_hosted_on(&self, item: ItemId, site: SiteId) -> bool {
        self.hosts(item).contains(&site)
    }

    /// Items hosted by `site`, in ascending order.
    fn items_on(&self, site: SiteId) -> Vec<ItemId> {
        self.items()
            .into_iter()
            .filter(|item| self.is_hosted_on(*item, site))
            .collect()
    }

    /// All site ids, in ascending order.
    fn site_ids(&self) -> Vec<SiteId> {
        (1..=self.num_sites()).map(SiteId).collect()
    }
}

/// Errors raised while building a placement table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    /// A host id is outside `1..=num_sites`.
    #[error("site {site} is out of range for a {num_sites}-site placement")]
    SiteOutOfRange { site: SiteId, num_sites: u32 },

    /// An item was declared with no hosting site.
    #[error("item {0} must be hosted by at least one site")]
    NoHosts(ItemId),
}

/// The reference layout.
///
/// Items are numbered `1..=num_items`. Even-numbered items are replicated on
/// every site; odd-numbered items live only on site `(item mod num_sites) + 1`.
/// Item `i` starts with value `10 * i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuloPlacement {
    num_sites: u32,
    num_items: u32,
}

impl ModuloPlacement {
    /// Default number of sites.
    pub const DEFAULT_SITES: u32 = 10;

    /// Default number of items.
    pub const DEFAULT_ITEMS: u32 = 20;

    /// Create a modulo placement. `num_sites` is clamped to at least one.
    pub fn new(num_sites: u32, num_items: u32) -> Self {
        Self {
            num_sites: num_sites.max(1),
            num_items,
        }
    }

    /// Number of items in the layout.
    pub fn num_items(&self) -> u32 {
        self.num_items
    }
}

impl Default for ModuloPlacement {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SITES, Self::DEFAULT_ITEMS)
    }
}

impl Placement for ModuloPlacement {
    fn num_sites(&self) -> u32 {
        self.num_sites
    }

    fn items(&self) -> Vec<ItemId> {
        (1..=self.num_items).map(ItemId).collect()
    }

    fn hosts(&self, item: ItemId) -> Cow<'_, [SiteId]> {
        if item.0 == 0 || item.0 > self.num_items {
            return Cow::Borrowed(&[]);
        }
        if item.0 % 2 == 0 {
            Cow::Owned(self.site_ids())
        } else {
            Cow::Owned(vec![SiteId(item.0 % self.num_sites + 1)])
        }
    }

    fn initial_value(&self, item: ItemId) -> Value {
        10 * Value::from(item.0)
    }
}

#[derive(Debug, Clone)]
struct ItemLayout {
    hosts: Vec<SiteId>,
    initial: Value,
}

/// An explicit item → sites table.
#[derive(Debug, Clone)]
pub struct StaticPlacement {
    num_sites: u32,
    layout: BTreeMap<ItemId, ItemLayout>,
}

impl StaticPlacement {
    /// Create an empty table over `num_sites` sites.
    pub fn new(num_sites: u32) -> Self {
        Self {
            num_sites: num_sites.max(1),
            layout: BTreeMap::new(),
        }
    }

    /// Declare `item`, hosted on `hosts`, starting at `initial`.
    ///
    /// Hosts are sorted and deduplicated. Redeclaring an item replaces it.
    pub fn with_item(
        mut self,
        item: ItemId,
        hosts: impl IntoIterator<Item = SiteId>,
        initial: Value,
    ) -> Result<Self, PlacementError> {
        let mut hosts: Vec<SiteId> = hosts.into_iter().collect();
        hosts.sort();
        hosts.dedup();
        if hosts.is_empty() {
            return Err(PlacementError::NoHosts(item));
        }
        if let Some(bad) = hosts.iter().find(|s| s.0 == 0 || s.0 > self.num_sites) {
            return Err(PlacementError::SiteOutOfRange {
                site: *bad,
                num_sites: self.num_sites,
            });
        }
        self.layout.insert(item, ItemLayout { hosts, initial });
        Ok(self)
    }
}

impl Placement for StaticPlacement {
    fn num_sites(&self) -> u32 {
        self.num_sites
    }

    fn items(&self) -> Vec<ItemId> {
        self.layout.keys().copied().collect()
    }

    fn hosts(&self, item: ItemId) -> Cow<'_, [SiteId]> {
        self.layout
            .get(&item)
            .map(|l| Cow::Borrowed(l.hosts.as_slice()))
            .unwrap_or(Cow::Borrowed(&[]))
    }

    fn initial_value(&self, item: ItemId) -> Value {
        self.layout.get(&item).map(|l| l.initial).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modulo_layout() {
        let placement = ModuloPlacement::default();

        assert_eq!(placement.items().len(), 20);
        assert!(placement.is_replicated(ItemId(2)));
        assert_eq!(placement.hosts(ItemId(2)).len(), 10);

        assert_eq!(placement.hosts(ItemId(1)).as_ref(), &[SiteId(2)]);
        assert_eq!(placement.hosts(ItemId(9)).as_ref(), &[SiteId(10)]);
        assert_eq!(placement.hosts(ItemId(11)).as_ref(), &[SiteId(2)]);
        assert!(!placement.is_replicated(ItemId(11)));

        assert_eq!(placement.initial_value(ItemId(7)), 70);
        assert!(placement.hosts(ItemId(21)).is_empty());
        assert!(placement.hosts(ItemId(0)).is_empty());
    }

    #[test]
    fn test_items_on_site() {
        let placement = ModuloPlacement::default();
        let on_two = placement.items_on(SiteId(2));

        // x1 and x11 live only on site 2; every even item is everywhere.
        assert!(on_two.contains(&ItemId(1)));
        assert!(on_two.contains(&ItemId(11)));
        assert!(!on_two.contains(&ItemId(3)));
        assert_eq!(on_two.len(), 12);
    }

    #[test]
    fn test_static_placement() {
        let placement = StaticPlacement::new(3)
            .with_item(ItemId(1), [SiteId(3), SiteId(1), SiteId(3)], 5)
            .unwrap()
            .with_item(ItemId(2), [SiteId(2)], 7)
            .unwrap();

        assert_eq!(placement.hosts(ItemId(1)).as_ref(), &[SiteId(1), SiteId(3)]);
        assert!(placement.is_replicated(ItemId(1)));
        assert!(!placement.is_replicated(ItemId(2)));
        assert_eq!(placement.initial_value(ItemId(2)), 7);
        assert_eq!(placement.items(), vec![ItemId(1), ItemId(2)]);
    }

    #[test]
    fn test_static_placement_rejects_bad_hosts() {
        let err = StaticPlacement::new(2)
            .with_item(ItemId(1), [SiteId(3)], 0)
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::SiteOutOfRange {
                site: SiteId(3),
                num_sites: 2
            }
        );

        let err = StaticPlacement::new(2)
            .with_item(ItemId(1), Vec::new(), 0)
            .unwrap_err();
        assert_eq!(err, PlacementError::NoHosts(ItemId(1)));
    }
}
