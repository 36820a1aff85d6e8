//! Errors that halt a simulation run.

use crate::ScriptError;
use repldb_site::SiteError;

/// A fatal error. Lock conflicts, deadlocks and unavailable sites are not
/// errors; they are resolved inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Site(#[from] SiteError),

    #[error(transparent)]
    Script(#[from] ScriptError),
}
