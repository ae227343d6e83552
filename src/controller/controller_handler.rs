use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::configuration::config::Config;
use crate::decoys;
use crate::error_handling::types::*;
use crate::events::recorder::{EventRecorder, EventSink};
use crate::geoip::{GeoIpDatabase, GeoLocator};
use crate::network::NetworkListener;
use crate::storage;
use crate::web_interface::WebServer;

/// Owns the validated configuration and runs the whole service.
///
/// Startup order is storage, event writer, GeoIP, listeners, web interface.
/// Shutdown runs the other way: listeners stop accepting and let their open
/// sessions finish on their own timeouts, the event queue is flushed within
/// `general.shutdown_grace_secs`, then storage is closed.
pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate().map_err(|err| {
            error!("[!] Invalid configuration: {}", err);
            ControllerError::ConfigurationError(err)
        })?;
        Ok(Self { config })
    }

    /// Runs until Ctrl-C or SIGTERM.
    pub async fn run(&self) -> Result<(), ControllerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs until `stop` completes.
    pub async fn run_until<F>(&self, stop: F) -> Result<(), ControllerError>
    where
        F: Future<Output = ()>,
    {
        let storage = storage::open(&self.config.storage).await?;
        let (recorder, writer) = EventRecorder::spawn(Arc::clone(&storage));
        let sink: Arc<dyn EventSink> = Arc::new(recorder);
        let geo: Arc<dyn GeoLocator> = Arc::new(GeoIpDatabase::load(&self.config.geoip));

        // Bind everything before serving anything
        let mut listeners = Vec::with_capacity(self.config.listeners.len());
        for config in &self.config.listeners {
            let decoy = decoys::build(config, Arc::clone(&sink), Arc::clone(&geo))?;
            listeners.push(NetworkListener::bind(config, decoy)?);
        }
        let web = if self.config.web_ui.enabled {
            Some(WebServer::new(Arc::clone(&storage), &self.config.web_ui)?)
        } else {
            None
        };
        drop(sink);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener_tasks: Vec<JoinHandle<usize>> = listeners
            .into_iter()
            .map(|listener| tokio::spawn(listener.run(shutdown_rx.clone())))
            .collect();
        let web_task = web.map(|server| {
            let rx = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = server.run(rx).await {
                    error!("[!] {}", e);
                }
            })
        });
        info!(
            "Leurre started with {} listener(s)",
            listener_tasks.len()
        );

        stop.await;
        info!("Shutting down");
        let _ = shutdown_tx.send(true);

        // Every session is bounded by its listener's timeouts, so this ends.
        let mut accepted = 0;
        for task in listener_tasks {
            match task.await {
                Ok(count) => accepted += count,
                Err(e) => error!("[!] Listener task failed: {}", e),
            }
        }
        info!("Listeners stopped after {} connections", accepted);
        if let Some(task) = web_task {
            let _ = task.await;
        }

        let grace = Duration::from_secs(self.config.general.shutdown_grace_secs);
        match timeout(grace, writer).await {
            Ok(Ok(stored)) => info!("{} events written this run", stored),
            Ok(Err(e)) => error!("[!] Event writer failed: {}", e),
            Err(_) => warn!("Event queue not drained after {:?}", grace),
        }
        storage.close().await?;
        info!("Storage closed");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("[!] Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("[!] Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
