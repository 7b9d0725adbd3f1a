// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    engine::{
        clock::{Clock, SystemClock},
        notify::{Broadcaster, LogNotifier, Notifier},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub broadcaster: Broadcaster,
}

impl AppState {
    /// State with the wall clock and the logging notifier.
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            pool,
            config,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            broadcaster: Broadcaster::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
