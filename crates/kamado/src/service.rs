//! One-time initialization of the resource behind a coordinator.
//!
//! A [`ServiceCell`] is created by process startup, initialized once, and then
//! handed to whoever needs the service. Until initialization completes every
//! lookup fails with [`Error::NotReady`].

use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::error::{Error, Result};

/// A slot for a lazily built, shared service.
///
/// At most one initializer runs, even when several tasks call
/// [`init`](ServiceCell::init) concurrently; the others wait for it and then
/// share its result.
pub struct ServiceCell<S> {
    cell: OnceCell<Arc<S>>,
}

impl<S> Default for ServiceCell<S> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<S> ServiceCell<S>
where
    S: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the service with `init` unless that already happened.
    ///
    /// # Errors
    ///
    /// [`Error::Init`] if `init` fails. The cell stays empty, so a later call
    /// may try again.
    pub async fn init<F, Fut>(&self, init: F) -> Result<Arc<S>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<S>>,
    {
        self.cell
            .get_or_try_init(|| async {
                info!("initializing service");
                match init().await {
                    Ok(service) => {
                        info!("service ready");
                        Ok(Arc::new(service))
                    }
                    Err(e) => {
                        error!(error = %e, "service initialization failed");
                        Err(Error::Init(format!("{e:#}")))
                    }
                }
            })
            .await
            .cloned()
    }

    /// Like [`init`](ServiceCell::init), but runs a blocking loader on the
    /// blocking pool, e.g. to read model weights from disk.
    pub async fn init_blocking<F>(&self, load: F) -> Result<Arc<S>>
    where
        F: FnOnce() -> anyhow::Result<S> + Send + 'static,
    {
        self.init(|| async move {
            tokio::task::spawn_blocking(load)
                .await
                .map_err(|e| anyhow::anyhow!("loader did not complete: {e}"))?
        })
        .await
    }

    /// Returns the service if it is ready.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] before initialization has completed.
    pub fn get(&self) -> Result<Arc<S>> {
        self.cell.get().cloned().ok_or(Error::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }
}
