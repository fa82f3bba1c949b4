//! `kennel-monitor` -- enclosure climate monitor.
//!
//! Reads JSON-lines commands (samples, subject selection, state changes,
//! status queries) from stdin and writes responses and notifications as JSON
//! lines to stdout. Logs go to stderr.
//!
//! # Environment variables
//!
//! | Variable                      | Default          | Description                        |
//! |-------------------------------|------------------|------------------------------------|
//! | `LIVENESS_TIMEOUT_SECS`       | `60`             | Silence before a source is offline |
//! | `WATCHDOG_POLL_INTERVAL_SECS` | timeout / 4      | Watchdog tick period               |
//! | `MAX_FUTURE_SKEW_SECS`        | `300`            | Max accepted sample clock lead     |
//! | `RULE_TABLE_PATH`             | --               | JSON rule table rows               |

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kennel_events::{handler_fn, Notification, NotificationFanout};
use kennel_monitor::rule_source::load_rule_table;
use kennel_monitor::{feed, spawn_watchdog, Monitor, MonitorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kennel_monitor=info,kennel_events=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = MonitorConfig::from_env()?;
    tracing::info!(
        liveness_timeout_secs = config.liveness_timeout.as_secs(),
        watchdog_poll_interval_secs = config.watchdog_poll_interval.as_secs(),
        max_future_skew_secs = config.max_future_skew.as_secs(),
        "Loaded configuration"
    );

    let rules = load_rule_table(config.rule_table_path.as_deref())?;
    let fanout = Arc::new(NotificationFanout::new());
    let monitor = Arc::new(Monitor::new(config, rules, Arc::clone(&fanout)));

    monitor.subscribe(handler_fn(|notification: &Notification| {
        println!(
            "{}",
            serde_json::json!({ "type": "notification", "notification": notification })
        );
        Ok(())
    }));

    let watchdog_cancel = CancellationToken::new();
    let watchdog_handle = spawn_watchdog(Arc::clone(&monitor), watchdog_cancel.clone());

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = feed::run(&monitor, stdin, |response| println!("{response}")) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to read feed");
            }
        }
        () = shutdown_signal() => {}
    }

    // --- Shutdown ---
    watchdog_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), watchdog_handle).await;
    tracing::info!("Liveness watchdog stopped");

    // Deliver what is already queued, then cancel anything still stuck.
    if tokio::time::timeout(Duration::from_secs(5), fanout.close())
        .await
        .is_err()
    {
        tracing::warn!("Notification subscribers did not drain in time");
    }
    fanout.shutdown();

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
