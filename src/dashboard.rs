//! Dashboard - wiring and lifecycle for the polled views
//!
//! Builds the shared pieces once (API client, coalescing cache, view store,
//! event bus) and mounts views on demand. Each mount returns a
//! [`PollerHandle`]; dropping or stopping it unmounts the view while its
//! last snapshot stays in the store for the next mount.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::types::{ContainerAction, ServiceLink};
use crate::api::{paths, ApiClient, ApiError, Fetch};
use crate::bus::{BusEvent, SharedBus};
use crate::config::{Config, ViewConfig, ViewsConfig};
use crate::settings::{SettingsSync, UserAdmin};
use crate::sync::coalesce::{CoalescingCache, SharedCoalescingCache};
use crate::sync::history::{History, MetricSample};
use crate::sync::poller::{Poller, PollerHandle, ViewSource};
use crate::sync::store::{SharedViewStore, ViewStore};
use crate::views::{
    ContainersSnapshot, ContainersView, ModemSnapshot, ModemView, OverviewSnapshot, OverviewView,
    SystemSnapshot, SystemView, OVERVIEW_VIEW,
};

/// Wait before refreshing containers after a lifecycle action, giving the
/// daemon time to settle
pub const ACTION_REFRESH_DELAY: Duration = Duration::from_secs(1);

pub struct Dashboard {
    client: ApiClient,
    fetcher: Arc<dyn Fetch>,
    cache: SharedCoalescingCache,
    store: SharedViewStore,
    bus: SharedBus,
    views: ViewsConfig,
    history_capacity: usize,
    page_host: String,
    settings: Arc<SettingsSync>,
    users: Arc<UserAdmin>,
}

impl Dashboard {
    pub fn new(config: &Config, bus: SharedBus) -> Result<Self, ApiError> {
        Self::with_store(
            config,
            bus,
            Arc::new(CoalescingCache::new()),
            Arc::new(ViewStore::new()),
        )
    }

    /// Build around an existing cache and store (tests, or several dashboards
    /// sharing one session)
    pub fn with_store(
        config: &Config,
        bus: SharedBus,
        cache: SharedCoalescingCache,
        store: SharedViewStore,
    ) -> Result<Self, ApiError> {
        let client = ApiClient::new(
            config.api_url.clone(),
            config.token.clone(),
            config.request_timeout(),
        )?;

        Ok(Self {
            fetcher: Arc::new(client.clone()),
            settings: Arc::new(SettingsSync::new(client.clone(), bus.clone())),
            users: Arc::new(UserAdmin::new(client.clone(), bus.clone())),
            client,
            cache,
            store,
            bus,
            views: config.views.clone(),
            history_capacity: config.history_capacity,
            page_host: config.page_host(),
        })
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    pub fn store(&self) -> &SharedViewStore {
        &self.store
    }

    pub fn settings(&self) -> &Arc<SettingsSync> {
        &self.settings
    }

    pub fn users(&self) -> &Arc<UserAdmin> {
        &self.users
    }

    pub fn page_host(&self) -> &str {
        &self.page_host
    }

    /// Quick links for the dashboard, pointed at this page's host
    pub fn dashboard_links(&self) -> Vec<ServiceLink> {
        self.settings.dashboard_links(&self.page_host)
    }

    fn mount<V: ViewSource>(&self, view: V, config: &ViewConfig) -> PollerHandle<V::Snapshot> {
        Poller::new(
            view,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.cache),
            Arc::clone(&self.store),
            Arc::clone(&self.bus),
            config.poller_config(),
        )
        .start()
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Mount the overview. The first mount of a session seeds the chart from
    /// the server-kept history; later mounts continue from the stored
    /// snapshot. Runs at the settings refresh rate once settings are loaded.
    pub async fn mount_overview(&self) -> PollerHandle<OverviewSnapshot> {
        let view = if self.store.contains(OVERVIEW_VIEW) {
            OverviewView::new(self.history_capacity)
        } else {
            OverviewView::with_seed(self.fetch_history().await)
        };
        let handle = self.mount(view, &self.views.overview);
        self.apply_refresh_rate(&handle);
        handle
    }

    /// Move a mounted overview to the refresh rate in the loaded settings,
    /// e.g. after they were saved. Returns the period in effect.
    pub fn apply_refresh_rate(&self, overview: &PollerHandle<OverviewSnapshot>) -> Duration {
        match self.settings.refresh_interval() {
            Some(rate) => overview.set_refresh_interval(rate),
            None => overview.refresh_interval(),
        }
    }

    async fn fetch_history(&self) -> History {
        match self
            .client
            .get_json::<Vec<MetricSample>>(paths::METRICS_HISTORY)
            .await
        {
            Ok(samples) => {
                debug!(samples = samples.len(), "Seeding history from backend");
                History::seeded(self.history_capacity, samples)
            }
            Err(e) => {
                debug!("No server history, starting empty: {}", e);
                History::new(self.history_capacity)
            }
        }
    }

    pub fn mount_system(&self) -> PollerHandle<SystemSnapshot> {
        self.mount(SystemView, &self.views.system)
    }

    pub fn mount_containers(&self) -> PollerHandle<ContainersSnapshot> {
        self.mount(ContainersView, &self.views.containers)
    }

    pub fn mount_modem(&self) -> PollerHandle<ModemSnapshot> {
        self.mount(ModemView, &self.views.modem)
    }

    // =========================================================================
    // Actions that change polled state
    // =========================================================================

    /// Start, stop or restart a container, then refresh the containers view
    /// once the daemon has had a moment to apply it
    pub async fn container_action(
        &self,
        containers: &PollerHandle<ContainersSnapshot>,
        container_id: &str,
        action: ContainerAction,
    ) -> Result<(), ApiError> {
        match self.client.container_action(container_id, action).await {
            Ok(ack) => {
                info!(container_id, action = action.as_str(), "Container action accepted");
                if !ack.message.is_empty() {
                    debug!("Backend: {}", ack.message);
                }
                self.bus.publish(BusEvent::success(format!(
                    "Container {} successfully",
                    action.past_tense()
                )));

                let refresher = containers.refresher();
                tokio::spawn(async move {
                    tokio::time::sleep(ACTION_REFRESH_DELAY).await;
                    refresher.refresh_now();
                });
                Ok(())
            }
            Err(e) => {
                warn!(container_id, action = action.as_str(), "Container action failed: {}", e);
                self.bus.publish(BusEvent::error(format!(
                    "Failed to {} container",
                    action.as_str()
                )));
                Err(e)
            }
        }
    }

    /// Delete an SMS from the modem inbox and refresh right away
    pub async fn delete_sms(
        &self,
        modem: &PollerHandle<ModemSnapshot>,
        index: &str,
    ) -> Result<(), ApiError> {
        match self.client.delete_sms(index).await {
            Ok(()) => {
                info!(index, "SMS deleted");
                self.bus.publish(BusEvent::success("SMS deleted successfully"));
                modem.refresh_now();
                Ok(())
            }
            Err(e) => {
                warn!(index, "SMS delete failed: {}", e);
                self.bus.publish(BusEvent::error("Failed to delete SMS"));
                Err(e)
            }
        }
    }
}
