use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::charts::{MetricAggregations, clamp_selected_days};
use crate::dashboard_config::DashboardConfig;

/// Chart settings shared by every view: how much history to show and how
/// each metric is aggregated when a request does not say.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSettings {
    pub selected_days: u32,
    pub metrics: MetricAggregations,
}

impl From<&DashboardConfig> for ChartSettings {
    fn from(config: &DashboardConfig) -> Self {
        ChartSettings {
            selected_days: clamp_selected_days(f64::from(config.default_days)),
            metrics: config.metric_aggregations(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&ChartSettings) + Send + Sync>;

/// Observable settings holder. Observers run after every update with the
/// new settings, in subscription order.
pub struct SettingsStore {
    current: RwLock<ChartSettings>,
    observers: RwLock<Vec<(SubscriptionId, Observer)>>,
    next_id: AtomicU64,
}

impl SettingsStore {
    pub fn new(initial: ChartSettings) -> Self {
        SettingsStore {
            current: RwLock::new(initial),
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> ChartSettings {
        self.current.read().unwrap().clone()
    }

    pub fn subscribe(
        &self,
        observer: impl Fn(&ChartSettings) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap()
            .push((id, Arc::new(observer)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write().unwrap();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    /// Applies `change`, re-clamps the day count, and notifies observers if
    /// anything changed. Returns the resulting settings.
    pub fn update(&self, change: impl FnOnce(&mut ChartSettings)) -> ChartSettings {
        let (updated, changed) = {
            let mut current = self.current.write().unwrap();
            let before = current.clone();
            change(&mut *current);
            current.selected_days = clamp_selected_days(f64::from(current.selected_days));
            (current.clone(), *current != before)
        };

        if changed {
            // Observers may read the store or (un)subscribe, so no lock is
            // held while they run.
            let observers: Vec<Observer> = self
                .observers
                .read()
                .unwrap()
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();
            for observer in observers {
                observer(&updated);
            }
        }
        updated
    }
}
