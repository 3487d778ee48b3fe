use std::sync::RwLock;

use crate::config::DATA_RETENTION;
use crate::dashboard_config::DashboardConfig;
use crate::readings::ReadingStore;
use crate::settings::{ChartSettings, SettingsStore};

pub struct AppState {
    pub readings: RwLock<ReadingStore>,
    pub settings: SettingsStore,
    pub layout: DashboardConfig,
}

impl AppState {
    pub fn new(layout: DashboardConfig) -> Self {
        AppState {
            readings: RwLock::new(ReadingStore::new(DATA_RETENTION)),
            settings: SettingsStore::new(ChartSettings::from(&layout)),
            layout,
        }
    }
}
