//! The set of all sites in a simulation.

use crate::{Site, SiteError};
use repldb_types::{ItemId, Placement, SiteId, Timestamp, TxnId};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// All sites, indexed by id, plus the placement they were built from.
pub struct SiteRegistry {
    sites: Vec<Site>,
    placement: Arc<dyn Placement>,
}

impl fmt::Debug for SiteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteRegistry")
            .field("sites", &self.sites.len())
            .field(
                "running",
                &self.sites.iter().filter(|s| s.is_running()).count(),
            )
            .finish()
    }
}

impl SiteRegistry {
    /// Build every site and populate it according to `placement`.
    pub fn new(placement: Arc<dyn Placement>) -> Self {
        let mut sites: Vec<Site> = placement.site_ids().into_iter().map(Site::new).collect();
        for item in placement.items() {
            let value = placement.initial_value(item);
            for host in placement.hosts(item).iter() {
                if let Some(site) = host.index().and_then(|i| sites.get_mut(i)) {
                    site.add_item(item, value, Timestamp::ZERO);
                }
            }
        }
        Self { sites, placement }
    }

    pub fn placement(&self) -> &Arc<dyn Placement> {
        &self.placement
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, id: SiteId) -> Option<&Site> {
        id.index().and_then(|i| self.sites.get(i))
    }

    pub fn get_mut(&mut self, id: SiteId) -> Option<&mut Site> {
        id.index().and_then(move |i| self.sites.get_mut(i))
    }

    /// Like [`get`](Self::get), but an unknown id is an error.
    pub fn site(&self, id: SiteId) -> Result<&Site, SiteError> {
        self.get(id).ok_or(SiteError::UnknownSite(id))
    }

    /// Like [`get_mut`](Self::get_mut), but an unknown id is an error.
    pub fn site_mut(&mut self, id: SiteId) -> Result<&mut Site, SiteError> {
        self.get_mut(id).ok_or(SiteError::UnknownSite(id))
    }

    /// Sites in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    /// Running sites hosting `item`, in id order.
    pub fn running_hosts(&self, item: ItemId) -> Vec<SiteId> {
        self.placement
            .hosts(item)
            .iter()
            .filter(|id| self.get(**id).is_some_and(Site::is_running))
            .copied()
            .collect()
    }

    /// Release every lock and staged value `txn` has at any site.
    pub fn release_all(&mut self, txn: TxnId) {
        for site in &mut self.sites {
            site.release_all(txn);
        }
    }

    /// Fail `id`. Returns `Ok(false)` if it was already failed.
    pub fn fail(&mut self, id: SiteId) -> Result<bool, SiteError> {
        let failed = self.site_mut(id)?.fail();
        if failed {
            info!(site = id.0, "Site failed");
        }
        Ok(failed)
    }

    /// Recover `id`. Returns `Ok(false)` if it was already running.
    ///
    /// Whether a copy is replicated comes from the placement, so a copy whose
    /// other hosts are all down still waits for a fresh committed write.
    pub fn recover(&mut self, id: SiteId, now: Timestamp) -> Result<bool, SiteError> {
        let placement = Arc::clone(&self.placement);
        let recovered = self
            .site_mut(id)?
            .recover(now, |item| placement.is_replicated(item));
        if recovered {
            info!(site = id.0, "Site recovered");
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repldb_types::{ModuloPlacement, StaticPlacement};

    #[test]
    fn test_registry_follows_placement() {
        let registry = SiteRegistry::new(Arc::new(ModuloPlacement::default()));

        assert_eq!(registry.len(), 10);
        assert_eq!(registry.get(SiteId(2)).unwrap().value(ItemId(1)), Some(10));
        assert!(!registry.get(SiteId(3)).unwrap().hosts(ItemId(1)));
        assert_eq!(registry.running_hosts(ItemId(4)).len(), 10);
        assert!(registry.get(SiteId(11)).is_none());
        assert_eq!(
            registry.site(SiteId(0)).unwrap_err(),
            SiteError::UnknownSite(SiteId(0))
        );
    }

    #[test]
    fn test_running_hosts_skip_failed_sites() {
        let mut registry = SiteRegistry::new(Arc::new(ModuloPlacement::default()));

        assert!(registry.fail(SiteId(2)).unwrap());
        assert!(!registry.fail(SiteId(2)).unwrap());

        assert!(registry.running_hosts(ItemId(1)).is_empty());
        assert!(!registry.running_hosts(ItemId(2)).contains(&SiteId(2)));
    }

    #[test]
    fn test_sole_copy_is_available_after_recovery() {
        let placement = StaticPlacement::new(2)
            .with_item(ItemId(1), [SiteId(1)], 10)
            .unwrap()
            .with_item(ItemId(2), [SiteId(1), SiteId(2)], 20)
            .unwrap();
        let mut registry = SiteRegistry::new(Arc::new(placement));

        registry.fail(SiteId(1)).unwrap();
        // Even with the other replica down, x2 must wait for a fresh write.
        registry.fail(SiteId(2)).unwrap();
        assert!(registry.recover(SiteId(1), Timestamp(3)).unwrap());

        let site = registry.get(SiteId(1)).unwrap();
        assert!(site.can_serve_read(ItemId(1)));
        assert!(!site.can_serve_read(ItemId(2)));
    }
}
