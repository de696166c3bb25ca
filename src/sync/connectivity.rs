use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::database::RemoteStore;

/// Probes the backend on an interval and publishes the latest online/offline
/// state on a watch channel. The app compares readings across loop turns to
/// spot the offline-to-online transition that triggers an automatic drain.
pub struct ConnectivityMonitor {
    rx: watch::Receiver<bool>,
}

impl ConnectivityMonitor {
    pub fn start(store: Arc<dyn RemoteStore>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            loop {
                let online = store.ping().await;
                if *tx.borrow() != online {
                    log::info!(
                        "Connectivity changed: {}",
                        if online { "online" } else { "offline" }
                    );
                }
                if tx.send(online).is_err() {
                    break; // nobody is listening anymore
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self { rx }
    }

    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }
}
