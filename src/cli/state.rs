// Application State Module

use super::config::Config;
use crate::generator::Generator;
use crate::stats::SharedStats;

/// Shared application state.
///
/// Everything except `stats` is read-only once the server starts.
pub struct AppState {
    pub config: Config,
    pub generator: Generator,
    pub stats: SharedStats,
}

impl AppState {
    pub fn new(config: Config, generator: Generator, stats: SharedStats) -> Self {
        Self {
            config,
            generator,
            stats,
        }
    }
}
