//! Simulation configuration.

use repldb_types::ModuloPlacement;

/// Size of the simulated database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of sites, numbered from 1.
    pub num_sites: u32,
    /// Number of items, numbered from 1.
    pub num_items: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_sites: ModuloPlacement::DEFAULT_SITES,
            num_items: ModuloPlacement::DEFAULT_ITEMS,
        }
    }
}

impl SimulationConfig {
    pub fn with_sites(mut self, num_sites: u32) -> Self {
        self.num_sites = num_sites;
        self
    }

    pub fn with_items(mut self, num_items: u32) -> Self {
        self.num_items = num_items;
        self
    }

    /// Even items everywhere, odd items on a single site.
    pub fn placement(&self) -> ModuloPlacement {
        ModuloPlacement::new(self.num_sites, self.num_items)
    }
}
