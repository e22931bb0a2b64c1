//! Settings synchronizer.
//!
//! Holds a local mirror of the backend settings resource. Service-link
//! toggles are applied to the mirror immediately and persisted in the
//! background; a rejected save reverts only the link it touched, so other
//! edits still in flight keep their optimistic state.

pub mod users;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::types::{
    Ack, ApiKeys, AppSettings, NewServiceLink, ResolvedLinks, ServiceLink, SmtpSettings,
    SmtpStatus,
};
use crate::api::{decode_ack, paths, ApiClient, ApiError};
use crate::bus::{BusEvent, SharedBus};
use crate::links::normalize_link_url;

pub use users::UserAdmin;

#[derive(Debug, Error)]
pub enum SettingsError {
    /// Rejected locally, before any request was sent
    #[error("{0}")]
    Validation(String),

    /// The backend refused an optimistic change; the entity was reverted
    #[error("update of {id} was rejected: {source}")]
    PartialUpdate {
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("settings have not been loaded")]
    NotLoaded,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Fields to overwrite on a service link; `None` keeps the current value
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceLinkPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub enabled: Option<bool>,
    pub show_on_dashboard: Option<bool>,
    pub container_name: Option<String>,
    pub description: Option<String>,
}

impl ServiceLinkPatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn show_on_dashboard(show: bool) -> Self {
        Self {
            show_on_dashboard: Some(show),
            ..Self::default()
        }
    }

    /// `{...current, ...patch}`
    pub fn apply(&self, current: &ServiceLink) -> ServiceLink {
        let mut merged = current.clone();
        if let Some(name) = &self.name {
            merged.name = name.clone();
        }
        if let Some(url) = &self.url {
            merged.url = url.clone();
        }
        if let Some(icon) = &self.icon {
            merged.icon = Some(icon.clone());
        }
        if let Some(enabled) = self.enabled {
            merged.enabled = enabled;
        }
        if let Some(show) = self.show_on_dashboard {
            merged.show_on_dashboard = show;
        }
        if let Some(container) = &self.container_name {
            merged.container_name = Some(container.clone());
        }
        if let Some(description) = &self.description {
            merged.description = Some(description.clone());
        }
        merged
    }
}

/// Loaded settings. `settings.service_links` is always empty; the links live
/// in `links` so a single element can be swapped without copying the rest.
#[derive(Clone)]
struct Mirror {
    settings: Arc<AppSettings>,
    links: Arc<Vec<Arc<ServiceLink>>>,
    /// Links with a save outstanding, by id
    edits: HashMap<String, LinkEdits>,
}

/// Save bookkeeping for one link. A rejected save falls back to the newest
/// value still in flight, else to the last value the backend accepted.
#[derive(Clone)]
struct LinkEdits {
    confirmed: Arc<ServiceLink>,
    /// Optimistic values awaiting a response, oldest first
    in_flight: Vec<Arc<ServiceLink>>,
}

impl LinkEdits {
    fn settle(&mut self, applied: &Arc<ServiceLink>) {
        self.in_flight.retain(|l| !Arc::ptr_eq(l, applied));
    }

    fn fallback(&self) -> Arc<ServiceLink> {
        self.in_flight
            .last()
            .map_or_else(|| Arc::clone(&self.confirmed), Arc::clone)
    }
}

impl Mirror {
    fn new(mut settings: AppSettings) -> Self {
        let links = std::mem::take(&mut settings.service_links)
            .into_iter()
            .map(Arc::new)
            .collect();
        Self {
            settings: Arc::new(settings),
            links: Arc::new(links),
            edits: HashMap::new(),
        }
    }

    fn to_settings(&self) -> AppSettings {
        AppSettings {
            service_links: self.links.iter().map(|l| (**l).clone()).collect(),
            ..(*self.settings).clone()
        }
    }
}

fn link_path(id: &str) -> String {
    format!("{}/{}", paths::SERVICE_LINKS, urlencoding::encode(id))
}

pub struct SettingsSync {
    client: ApiClient,
    bus: SharedBus,
    mirror: RwLock<Option<Mirror>>,
}

impl SettingsSync {
    pub fn new(client: ApiClient, bus: SharedBus) -> Self {
        Self {
            client,
            bus,
            mirror: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Mirror>> {
        self.mirror.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Mirror>> {
        self.mirror.write().unwrap_or_else(|e| e.into_inner())
    }

    fn install(&self, settings: AppSettings) {
        *self.write() = Some(Mirror::new(settings));
    }

    fn notify_ok(&self, message: &str) {
        self.bus.publish(BusEvent::success(message));
    }

    fn notify_err(&self, message: &str, error: &ApiError) {
        warn!("{}: {}", message, error);
        self.bus.publish(BusEvent::error(message));
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Fetch `/api/settings/` and replace the local mirror
    pub async fn load(&self) -> Result<AppSettings, SettingsError> {
        match self.client.get_json::<AppSettings>(paths::SETTINGS).await {
            Ok(settings) => {
                debug!(links = settings.service_links.len(), "Settings loaded");
                self.install(settings.clone());
                Ok(settings)
            }
            Err(e) => {
                self.notify_err("Failed to fetch settings", &e);
                Err(e.into())
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.read().is_some()
    }

    /// Current mirror, including optimistic edits
    pub fn current(&self) -> Option<AppSettings> {
        self.read().as_ref().map(Mirror::to_settings)
    }

    /// Overview refresh rate chosen in settings, once loaded
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.read()
            .as_ref()
            .map(|m| Duration::from_secs(m.settings.refresh_rate))
    }

    /// The link collection; unchanged links keep their `Arc` across updates
    pub fn links(&self) -> Arc<Vec<Arc<ServiceLink>>> {
        self.read()
            .as_ref()
            .map(|m| Arc::clone(&m.links))
            .unwrap_or_default()
    }

    pub fn link(&self, id: &str) -> Option<Arc<ServiceLink>> {
        self.read()
            .as_ref()?
            .links
            .iter()
            .find(|l| l.id == id)
            .cloned()
    }

    /// Enabled links meant for the dashboard, loopback URLs pointed at
    /// `page_host`
    pub fn dashboard_links(&self, page_host: &str) -> Vec<ServiceLink> {
        self.links()
            .iter()
            .filter(|l| l.enabled && l.show_on_dashboard)
            .map(|l| ServiceLink {
                url: normalize_link_url(&l.url, page_host),
                ..(**l).clone()
            })
            .collect()
    }

    /// Links as resolved by the backend for a given client hostname
    pub async fn resolved_links(&self, hostname: &str) -> Result<Vec<ServiceLink>, SettingsError> {
        let path = format!("/api/settings/resolved/{}", urlencoding::encode(hostname));
        let resolved: ResolvedLinks = self.client.get_json(&path).await?;
        Ok(resolved.into_links())
    }

    // =========================================================================
    // Service links
    // =========================================================================

    /// Optimistically merge `patch` into link `id` and persist the merged link.
    ///
    /// An id that is no longer in the mirror is ignored. If the backend
    /// rejects the save, that one link goes back to its previous value.
    pub async fn update_link(&self, id: &str, patch: ServiceLinkPatch) -> Result<(), SettingsError> {
        let merged = {
            let mut guard = self.write();
            let mirror = guard.as_mut().ok_or(SettingsError::NotLoaded)?;
            let Some(pos) = mirror.links.iter().position(|l| l.id == id) else {
                debug!(id, "Link not in mirror, ignoring update");
                return Ok(());
            };

            let previous = Arc::clone(&mirror.links[pos]);
            let merged = Arc::new(patch.apply(&previous));
            let mut next = mirror.links.as_ref().clone();
            next[pos] = Arc::clone(&merged);
            mirror.links = Arc::new(next);
            mirror
                .edits
                .entry(id.to_string())
                .or_insert_with(|| LinkEdits {
                    confirmed: previous,
                    in_flight: Vec::new(),
                })
                .in_flight
                .push(Arc::clone(&merged));
            merged
        };

        match self
            .client
            .put_json::<_, Value>(&link_path(id), merged.as_ref())
            .await
        {
            Ok(_) => {
                self.confirm_link(id, &merged);
                debug!(id, "Link update saved");
                Ok(())
            }
            Err(source) => {
                let reverted = self.revert_link(id, &merged);
                warn!(id, reverted, "Link update rejected: {}", source);
                self.bus
                    .publish(BusEvent::error(format!("Failed to update {}", merged.name)));
                Err(SettingsError::PartialUpdate {
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    fn confirm_link(&self, id: &str, applied: &Arc<ServiceLink>) {
        let mut guard = self.write();
        let Some(mirror) = guard.as_mut() else {
            return;
        };
        let Some(edits) = mirror.edits.get_mut(id) else {
            return;
        };
        edits.settle(applied);
        edits.confirmed = Arc::clone(applied);
        if edits.in_flight.is_empty() {
            mirror.edits.remove(id);
        }
    }

    /// Drop a rejected save. The shown link only changes when `applied` is
    /// still the newest edit; otherwise the later edit's own response decides.
    fn revert_link(&self, id: &str, applied: &Arc<ServiceLink>) -> bool {
        let mut guard = self.write();
        let Some(mirror) = guard.as_mut() else {
            return false;
        };
        let Some(edits) = mirror.edits.get_mut(id) else {
            return false;
        };
        edits.settle(applied);
        let fallback = edits.fallback();
        if edits.in_flight.is_empty() {
            mirror.edits.remove(id);
        }

        let Some(pos) = mirror
            .links
            .iter()
            .position(|l| l.id == id && Arc::ptr_eq(l, applied))
        else {
            return false;
        };
        let mut next = mirror.links.as_ref().clone();
        next[pos] = fallback;
        mirror.links = Arc::new(next);
        true
    }

    pub async fn toggle_enabled(&self, id: &str) -> Result<(), SettingsError> {
        match self.link(id) {
            Some(link) => self.update_link(id, ServiceLinkPatch::enabled(!link.enabled)).await,
            None => Ok(()),
        }
    }

    pub async fn toggle_show_on_dashboard(&self, id: &str) -> Result<(), SettingsError> {
        match self.link(id) {
            Some(link) => {
                self.update_link(id, ServiceLinkPatch::show_on_dashboard(!link.show_on_dashboard))
                    .await
            }
            None => Ok(()),
        }
    }

    pub async fn add_link(&self, link: NewServiceLink) -> Result<(), SettingsError> {
        if link.name.trim().is_empty() || link.url.trim().is_empty() {
            let message = "Name and URL are required";
            self.bus.publish(BusEvent::error(message));
            return Err(SettingsError::Validation(message.to_string()));
        }

        if let Err(e) = self
            .client
            .post_json::<_, Value>(paths::SERVICE_LINKS, &link)
            .await
        {
            self.notify_err("Failed to add service", &e);
            return Err(e.into());
        }

        info!(name = %link.name, "Service link added");
        self.notify_ok("Service added successfully");
        // The backend assigns the id; pick it up with a reload
        self.load().await?;
        Ok(())
    }

    pub async fn delete_link(&self, id: &str) -> Result<(), SettingsError> {
        if let Err(e) = self.client.delete(&link_path(id)).await {
            self.notify_err("Failed to delete service", &e);
            return Err(e.into());
        }

        info!(id, "Service link deleted");
        self.notify_ok("Service deleted successfully");
        self.load().await?;
        Ok(())
    }

    // =========================================================================
    // Whole-resource saves
    // =========================================================================

    /// `PUT /api/settings/` with the full settings document
    pub async fn save_settings(&self, settings: AppSettings) -> Result<(), SettingsError> {
        if let Err(e) = self
            .client
            .put_json::<_, Value>(paths::SETTINGS, &settings)
            .await
        {
            self.notify_err("Failed to save settings", &e);
            return Err(e.into());
        }

        self.install(settings);
        self.notify_ok("Settings saved successfully");
        Ok(())
    }

    pub async fn save_smtp(&self, smtp: SmtpSettings) -> Result<(), SettingsError> {
        if let Err(e) = self.client.put_json::<_, Value>(paths::SMTP, &smtp).await {
            self.notify_err("Failed to save SMTP settings", &e);
            return Err(e.into());
        }

        if let Some(mirror) = self.write().as_mut() {
            mirror.settings = Arc::new(AppSettings {
                smtp_settings: smtp,
                ..(*mirror.settings).clone()
            });
        }
        self.notify_ok("SMTP settings saved successfully");
        Ok(())
    }

    pub async fn save_api_keys(&self, api_keys: ApiKeys) -> Result<(), SettingsError> {
        if let Err(e) = self
            .client
            .put_json::<_, Value>(paths::API_KEYS, &api_keys)
            .await
        {
            self.notify_err("Failed to save API keys", &e);
            return Err(e.into());
        }

        if let Some(mirror) = self.write().as_mut() {
            mirror.settings = Arc::new(AppSettings {
                api_keys,
                ..(*mirror.settings).clone()
            });
        }
        self.notify_ok("API keys saved successfully");
        Ok(())
    }

    // =========================================================================
    // SMS-to-email forwarder
    // =========================================================================

    pub async fn smtp_status(&self) -> Result<SmtpStatus, SettingsError> {
        Ok(self.client.get_json(paths::SMTP_STATUS).await?)
    }

    /// Ask the backend to send a test email with the saved SMTP settings
    pub async fn test_smtp(&self) -> Result<Ack, SettingsError> {
        match self
            .client
            .post_json::<_, Value>(paths::SMTP_TEST, &serde_json::json!({}))
            .await
        {
            Ok(value) => {
                let ack = decode_ack(paths::SMTP_TEST, value);
                self.notify_ok("Test email sent");
                Ok(ack)
            }
            Err(e) => {
                self.notify_err("Failed to send test email", &e);
                Err(e.into())
            }
        }
    }
}
