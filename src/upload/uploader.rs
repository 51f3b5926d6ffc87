//! Demo uploader module - lifecycle, configuration and dispatch

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use reqwest::Client;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{bound_destination, Config};
use crate::error::{UploadError, INIT_NO_RUNTIME};
use crate::host::{ModuleBase, ModuleState, OperatorLog};

use super::client::{ClientFactory, ReqwestClientFactory};
use super::task::{run_upload_task, UploadTaskArgs};

/// Result of a dispatch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A background task was started for this upload
    Spawned(Uuid),
    /// No destination configured; nothing was done
    Skipped,
}

/// State that only exists between init and shutdown
#[derive(Default)]
struct Lifecycle {
    base: ModuleBase,
    client: Option<Client>,
    runtime: Option<Handle>,
    tasks: JoinSet<()>,
}

impl Lifecycle {
    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                warn!("Upload task ended abnormally: {}", e);
            }
        }
    }
}

/// Uploads finished demo recordings in the background
pub struct Uploader {
    config: Arc<Config>,
    destination: RwLock<String>,
    factory: Box<dyn ClientFactory>,
    log: Arc<dyn OperatorLog>,
    lifecycle: Mutex<Lifecycle>,
}

impl Uploader {
    pub fn new(config: Arc<Config>, log: Arc<dyn OperatorLog>) -> Self {
        Self::with_factory(config, log, Box::new(ReqwestClientFactory))
    }

    /// Create an uploader with a custom HTTP client factory
    pub fn with_factory(
        config: Arc<Config>,
        log: Arc<dyn OperatorLog>,
        factory: Box<dyn ClientFactory>,
    ) -> Self {
        Self {
            destination: RwLock::new(config.destination.clone()),
            config,
            factory,
            log,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initialize the module and its HTTP client.
    ///
    /// Must be called from within a tokio runtime; uploads are spawned on
    /// that runtime. On failure the module stays disconnected.
    pub fn initialize(&self, serial: u32, name: &str) -> Result<(), UploadError> {
        let mut lifecycle = self.lock();
        if !lifecycle.base.init(serial, name) {
            return Err(UploadError::AlreadyInitialized);
        }

        match self.start_client() {
            Ok((runtime, client)) => {
                lifecycle.runtime = Some(runtime);
                lifecycle.client = Some(client);
                lifecycle.base.set_running();
                info!(serial, module = name, "Demo upload module running");
                self.log.print("Demo upload initialized.");
                Ok(())
            }
            Err(e) => {
                lifecycle.base.abort_init();
                error!("Demo upload initialization failed: {}", e);
                self.log.print(&format!(
                    "ERROR: Demo upload failed to initialize HTTP client: {}",
                    e.code().unwrap_or_default()
                ));
                Err(e)
            }
        }
    }

    fn start_client(&self) -> Result<(Handle, Client), UploadError> {
        let runtime = Handle::try_current().map_err(|e| UploadError::Initialization {
            code: INIT_NO_RUNTIME,
            reason: e.to_string(),
        })?;
        let client = self.factory.create(&self.config)?;
        Ok((runtime, client))
    }

    /// Shut the module down.
    ///
    /// Waits for every in-flight upload before returning. Does nothing if the
    /// module is not initialized, so repeated calls are harmless.
    pub async fn shutdown(&self) {
        let mut tasks = {
            let mut lifecycle = self.lock();
            if lifecycle.base.state() == ModuleState::Disconnected {
                return;
            }
            lifecycle.client = None;
            lifecycle.runtime = None;
            lifecycle.base.shutdown();
            std::mem::take(&mut lifecycle.tasks)
        };

        if !tasks.is_empty() {
            info!(pending = tasks.len(), "Waiting for in-flight demo uploads");
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Upload task ended abnormally: {}", e);
            }
        }

        self.log.print("Demo upload shutdown.");
    }

    /// Replace the push URL. No validation happens here.
    pub fn set_destination(&self, url: &str) {
        let bounded = bound_destination(url);
        if bounded.len() < url.len() {
            warn!(
                "Push URL truncated from {} to {} bytes",
                url.len(),
                bounded.len()
            );
        }
        *self.destination.write().unwrap_or_else(|e| e.into_inner()) = bounded;
    }

    /// Current push URL (empty when unset)
    pub fn destination(&self) -> String {
        self.destination
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Start a background upload of a recorded demo.
    ///
    /// Returns `Dispatch::Skipped` without logging when no destination is
    /// set. The caller never learns how the upload itself went.
    pub fn upload(&self, demo_file_path: impl AsRef<Path>) -> Result<Dispatch, UploadError> {
        let demo_file_path = demo_file_path.as_ref();
        let push_url = self.destination();
        if push_url.is_empty() {
            debug!("No push URL configured, skipping demo upload");
            return Ok(Dispatch::Skipped);
        }
        if demo_file_path.as_os_str().is_empty() {
            return Err(UploadError::EmptyPath);
        }

        let mut lifecycle = self.lock();
        if lifecycle.base.state() != ModuleState::Running {
            return Err(UploadError::NotRunning);
        }
        let (Some(client), Some(runtime)) = (lifecycle.client.clone(), lifecycle.runtime.clone())
        else {
            return Err(UploadError::NotRunning);
        };

        self.log.print(&format!(
            "Beginning background upload of demo {}",
            demo_file_path.display()
        ));

        let args = UploadTaskArgs::snapshot(demo_file_path, &push_url)
            .with_max_redirects(self.config.max_redirects);
        let upload_id = args.upload_id();
        let log = Arc::clone(&self.log);

        lifecycle.reap_finished();
        lifecycle.tasks.spawn_on(
            async move {
                run_upload_task(client, args, log.as_ref()).await;
            },
            &runtime,
        );
        debug!(%upload_id, in_flight = lifecycle.tasks.len(), "Demo upload dispatched");

        Ok(Dispatch::Spawned(upload_id))
    }

    /// Number of uploads still running
    pub fn in_flight(&self) -> usize {
        let mut lifecycle = self.lock();
        lifecycle.reap_finished();
        lifecycle.tasks.len()
    }

    pub fn state(&self) -> ModuleState {
        self.lock().base.state()
    }

    /// One-line status summary for the host console
    pub fn status_line(&self) -> String {
        let destination = if self.destination().is_empty() {
            "unset"
        } else {
            "set"
        };
        let state = self.state();
        format!(
            "Demo upload: {}, push URL {}, {} upload(s) in flight",
            state,
            destination,
            self.in_flight()
        )
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        // Uploads outlive the uploader unless shutdown() joined them.
        self.lock().tasks.detach_all();
    }
}
