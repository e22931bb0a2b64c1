//! pidash - headless live-metrics client
//!
//! Mounts every dashboard view against the configured appliance and logs
//! committed snapshots and notifications until interrupted.

use pidash::bus::{BusEvent, NotificationLevel, SharedBus};
use pidash::sync::PollerHandle;
use pidash::{bus, config, dashboard::Dashboard};

use anyhow::Result;
use tokio::signal;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pidash=debug,reqwest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting pidash v{} ({})",
        env!("PIDASH_VERSION"),
        env!("PIDASH_GIT_SHA")
    );

    // Load configuration
    let config = config::load_config()?;
    tracing::info!("Configuration loaded, api: {}", config.api_url);

    // Create event bus
    let bus = bus::create_bus();
    let notifications = tokio::spawn(log_notifications(bus.clone()));

    let dashboard = Dashboard::new(&config, bus.clone())?;

    if let Err(e) = dashboard.settings().load().await {
        tracing::warn!("Settings unavailable: {}", e);
    } else {
        for link in dashboard.dashboard_links() {
            tracing::info!("Quick link: {} -> {}", link.name, link.url);
        }
    }

    // Mount all views
    let overview = dashboard.mount_overview().await;
    let system = dashboard.mount_system();
    let containers = dashboard.mount_containers();
    let modem = dashboard.mount_modem();

    let watchers = vec![
        watch_view(&overview, |s| {
            format!(
                "cpu {:.1}% mem {:.1}% temp {:.1}°{} health {:?} ({} samples)",
                s.summary.cpu.overall_usage,
                s.summary.memory.percent,
                s.summary.temperature.cpu_temp,
                s.summary.temperature.unit,
                s.health_status(),
                s.history.len()
            )
        }),
        watch_view(&system, |s| {
            format!(
                "root {:.1}%, {} filesystems, {} usb devices",
                s.disk.root_percent(),
                s.disk.filesystems.len(),
                s.usb.devices.len()
            )
        }),
        watch_view(&containers, |s| {
            format!(
                "{}/{} containers running",
                s.running_count(),
                s.containers.len()
            )
        }),
        watch_view(&modem, |s| {
            let bars = s.signal_bars().iter().filter(|lit| **lit).count();
            format!(
                "connected {}, signal {}/5, {} unread sms",
                s.status.connected,
                bars,
                s.status.unread_count()
            )
        }),
    ];

    tracing::info!("All views mounted, press Ctrl+C to stop");
    shutdown_signal().await;

    tracing::info!("Unmounting views...");
    overview.join().await;
    system.join().await;
    containers.join().await;
    modem.join().await;

    for watcher in watchers {
        watcher.abort();
    }
    notifications.abort();
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Log one line per committed snapshot of a view
fn watch_view<S, F>(handle: &PollerHandle<S>, describe: F) -> tokio::task::JoinHandle<()>
where
    S: Clone + Send + Sync + 'static,
    F: Fn(&S) -> String + Send + 'static,
{
    let view = handle.view();
    let mut states = WatchStream::new(handle.subscribe());
    tokio::spawn(async move {
        while let Some(state) = states.next().await {
            if let Some(snapshot) = &state.data {
                tracing::info!("[{}] {}", view, describe(snapshot));
            }
        }
    })
}

async fn log_notifications(bus: SharedBus) {
    let mut events = BroadcastStream::new(bus.subscribe());
    while let Some(event) = events.next().await {
        match event {
            Ok(BusEvent::Notification { level, message }) => match level {
                NotificationLevel::Error => tracing::error!("{}", message),
                NotificationLevel::Success | NotificationLevel::Info => {
                    tracing::info!("{}", message)
                }
            },
            Ok(other) => tracing::debug!("Bus event: {:?}", other),
            Err(e) => tracing::warn!("Notification log lagged: {}", e),
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
