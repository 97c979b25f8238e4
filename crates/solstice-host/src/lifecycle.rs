//! The plugin lifecycle engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::binding::PluginBinding;
use crate::config::PluginHostConfig;
use crate::debounce::Debouncer;
use crate::disposal::DisposalQueue;
use crate::domain::PluginDomain;
use crate::error::{HostError, HostResult};
use crate::path::{file_label, is_watched_artifact, CanonicalKey};
use crate::watcher::{ArtifactEvent, PluginWatcher};

/// A successfully loaded plugin as tracked by the registry.
pub struct PluginHandle<I: ?Sized> {
    /// Published plugin name.
    pub name: String,

    /// The watched artifact the plugin was loaded from.
    pub source_path: PathBuf,

    /// The live instance.
    pub instance: Arc<I>,

    /// The instance's domain; kept alongside so the mapped code outlives
    /// every holder of the instance.
    pub domain: Arc<PluginDomain>,
}

/// A hot-swapped instance awaiting its grace deadline.
struct Retired<I: ?Sized> {
    name: String,
    instance: Arc<I>,
    // Held only to pin the mapped code until disposal.
    _domain: Arc<PluginDomain>,
}

/// Orchestrates load, unload and hot-swap of plugin artifacts.
///
/// Cheap to clone; clones share the same engine. Owns the watcher and
/// debouncer, drives domains and the binding.
///
/// Locking: the registry lock guards the loaded map and is held across
/// `reload`/`unload`/`dispose` including the plugin's own
/// `start`/`register`/`dispose` calls; the pending-disposal lock is only
/// ever acquired inside the registry lock, never the reverse.
pub struct PluginHost<B: PluginBinding> {
    inner: Arc<HostInner<B>>,
}

impl<B: PluginBinding> Clone for PluginHost<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct HostInner<B: PluginBinding> {
    config: PluginHostConfig,
    binding: B,
    loaded: Mutex<HashMap<CanonicalKey, PluginHandle<B::Instance>>>,
    pending: Mutex<DisposalQueue<Retired<B::Instance>>>,
    debouncer: Debouncer,
    watcher: Mutex<Option<PluginWatcher>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    disposed: AtomicBool,
}

impl<B: PluginBinding> PluginHost<B> {
    /// Create a host. Call [`start`](Self::start) to begin watching.
    pub fn new(config: PluginHostConfig, binding: B) -> Self {
        let debouncer = Debouncer::new(config.debounce());
        Self {
            inner: Arc::new(HostInner {
                config,
                binding,
                loaded: Mutex::new(HashMap::new()),
                pending: Mutex::new(DisposalQueue::new()),
                debouncer,
                watcher: Mutex::new(None),
                pump: Mutex::new(None),
                started: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &PluginHostConfig {
        &self.inner.config
    }

    /// Begin watching the plugin directory. Idempotent. Creates the
    /// directory if missing, schedules a reload for every artifact
    /// already present and attaches the watcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> HostResult<()> {
        self.ensure_live()?;
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let directory = &self.inner.config.directory;
        std::fs::create_dir_all(directory).map_err(|e| HostError::ResourceUnavailable {
            path: directory.clone(),
            source: e,
        })?;

        let (watcher, events) = PluginWatcher::watch(directory)?;
        *self.inner.watcher.lock() = Some(watcher);

        let entries =
            std::fs::read_dir(directory).map_err(|e| HostError::io(directory, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && is_watched_artifact(&path) {
                self.schedule_reload(path);
            }
        }

        *self.inner.pump.lock() = Some(self.spawn_pump(events));

        tracing::info!(
            directory = %directory.display(),
            hot_swap = self.inner.config.enable_hot_swap,
            "plugin host started"
        );
        Ok(())
    }

    /// Snapshot of `{plugin name → artifact file name}`.
    pub fn loaded_plugins(&self) -> HostResult<HashMap<String, String>> {
        self.ensure_live()?;
        let loaded = self.inner.loaded.lock();
        Ok(loaded
            .values()
            .map(|handle| (handle.name.clone(), file_label(&handle.source_path)))
            .collect())
    }

    /// Number of loaded plugins.
    pub fn loaded_count(&self) -> usize {
        self.inner.loaded.lock().len()
    }

    /// Number of retired instances awaiting their grace deadline.
    pub fn pending_disposal_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Load or replace the plugin at `path`.
    ///
    /// With hot-swap enabled, a previously loaded instance is withdrawn
    /// from the host surface immediately but disposed only after the
    /// grace period, so in-flight consumers that captured it keep
    /// working. Without hot-swap the previous instance is disposed on
    /// the spot.
    ///
    /// Blocking; run on a background worker.
    pub fn reload(&self, path: &Path) -> HostResult<()> {
        self.ensure_live()?;
        let key = CanonicalKey::for_path(path);
        let mut loaded = self.inner.loaded.lock();

        if let Some(previous) = loaded.remove(&key) {
            self.inner.binding.unpublish(&previous.name);

            if self.inner.config.enable_hot_swap {
                tracing::info!(
                    plugin = %previous.name,
                    grace_secs = self.inner.config.grace_period_secs,
                    "retiring replaced instance"
                );
                let deadline = Instant::now() + self.inner.config.grace_period();
                // Pending-disposal lock nests inside the registry lock.
                self.inner.pending.lock().push(
                    deadline,
                    vec![Retired {
                        name: previous.name.clone(),
                        instance: previous.instance,
                        _domain: previous.domain,
                    }],
                );
            } else {
                self.inner.binding.dispose(&previous.name, &previous.instance);
            }
        }

        let result = self.try_load(&mut loaded, &key, path);
        self.process_pending_locked();
        result
    }

    /// Immediately unload the plugin at `path`. Returns whether a
    /// loaded handle existed. Unloading an unknown path is a no-op.
    pub fn unload(&self, path: &Path) -> HostResult<bool> {
        self.ensure_live()?;
        let key = CanonicalKey::for_path(path);
        let mut loaded = self.inner.loaded.lock();

        match loaded.remove(&key) {
            Some(handle) => {
                self.inner.binding.unpublish(&handle.name);
                self.inner.binding.dispose(&handle.name, &handle.instance);
                tracing::info!(plugin = %handle.name, "plugin unloaded");
                // Dropping the handle releases the registry's domain
                // reference; the code unmaps once in-flight holders
                // drain.
                drop(handle);
                Ok(true)
            }
            None => {
                tracing::debug!(
                    artifact = %file_label(path),
                    "unload requested for an artifact that is not loaded"
                );
                Ok(false)
            }
        }
    }

    /// Dispose every retired instance whose grace deadline has passed.
    pub fn process_pending_disposals(&self) {
        self.process_pending_locked();
    }

    /// Irreversible shutdown: stop the watcher, dispose every loaded
    /// instance, dispose every retired instance regardless of deadline.
    /// Idempotent; a second call is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("plugin host shutting down");

        *self.inner.watcher.lock() = None;
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
        self.inner.debouncer.clear();

        {
            let mut loaded = self.inner.loaded.lock();
            for (_, handle) in loaded.drain() {
                self.inner.binding.unpublish(&handle.name);
                self.inner.binding.dispose(&handle.name, &handle.instance);
            }
        }

        let retired = self.inner.pending.lock().drain_all();
        for entry in retired {
            self.inner.binding.dispose(&entry.name, &entry.instance);
        }

        tracing::info!("plugin host disposed");
    }

    /// Debounce a reload of `path`; bursts within the window collapse to
    /// one load attempt.
    fn schedule_reload(&self, path: PathBuf) {
        let key = CanonicalKey::for_path(&path);
        let host = self.clone();

        self.inner.debouncer.schedule(key, async move {
            let label = file_label(&path);
            let outcome = tokio::task::spawn_blocking(move || host.reload(&path)).await;
            match outcome {
                Ok(Ok(())) => {}
                // Per-artifact failures stay local: log and keep
                // serving the other plugins.
                Ok(Err(error)) => {
                    tracing::warn!(artifact = %label, %error, "plugin load failed")
                }
                Err(error) => {
                    tracing::error!(artifact = %label, %error, "plugin load worker failed")
                }
            }
        });
    }

    fn spawn_pump(&self, mut events: UnboundedReceiver<ArtifactEvent>) -> JoinHandle<()> {
        let host = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ArtifactEvent::Reload(path) => host.schedule_reload(path),
                    ArtifactEvent::Unload(path) => {
                        let worker = host.clone();
                        let label = file_label(&path);
                        let outcome =
                            tokio::task::spawn_blocking(move || worker.unload(&path)).await;
                        if let Ok(Err(error)) = outcome {
                            tracing::warn!(artifact = %label, %error, "plugin unload failed");
                        }
                    }
                }
            }
        })
    }

    /// The load pipeline, executed under the registry lock.
    fn try_load(
        &self,
        loaded: &mut HashMap<CanonicalKey, PluginHandle<B::Instance>>,
        key: &CanonicalKey,
        path: &Path,
    ) -> HostResult<()> {
        self.wait_until_readable(path)?;

        // A failure anywhere below drops the partially built domain and
        // leaves no side effects behind.
        let domain = PluginDomain::load(path)?;
        let instance = self.inner.binding.instantiate(&domain)?;
        let name = self.inner.binding.publish(&instance, path)?;
        let version = domain.declared_version().to_string();

        loaded.insert(
            key.clone(),
            PluginHandle {
                name: name.clone(),
                source_path: path.to_path_buf(),
                instance,
                domain: Arc::new(domain),
            },
        );

        tracing::info!(
            plugin = %name,
            version = %version,
            artifact = %file_label(path),
            "plugin loaded"
        );
        Ok(())
    }

    /// Bounded readiness probe: covers transient write locks while the
    /// artifact is still being copied. A missing file aborts immediately
    /// (the artifact was deleted while its reload was pending).
    fn wait_until_readable(&self, path: &Path) -> HostResult<()> {
        let attempts = self.inner.config.load_retry_attempts.max(1);

        for attempt in 1..=attempts {
            match std::fs::File::open(path) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(HostError::io(path, e));
                }
                Err(e) => {
                    tracing::debug!(
                        artifact = %file_label(path),
                        attempt,
                        error = %e,
                        "artifact not readable yet"
                    );
                    if attempt < attempts {
                        std::thread::sleep(self.inner.config.load_retry_delay());
                    }
                }
            }
        }

        Err(HostError::FileBusy {
            path: path.to_path_buf(),
            attempts,
        })
    }

    fn process_pending_locked(&self) {
        let expired = self.inner.pending.lock().drain_expired(Instant::now());
        for entry in expired {
            tracing::info!(plugin = %entry.name, "disposing retired instance after grace period");
            self.inner.binding.dispose(&entry.name, &entry.instance);
        }
    }

    fn ensure_live(&self) -> HostResult<()> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            Err(HostError::AlreadyDisposed)
        } else {
            Ok(())
        }
    }
}

impl<B: PluginBinding> Drop for HostInner<B> {
    fn drop(&mut self) {
        // Usually a no-op: hosts are disposed explicitly.
        if !self.disposed.load(Ordering::SeqCst) {
            tracing::debug!("plugin host dropped without dispose");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::FeatureBinding;
    use crate::path::loadable_extension;
    use std::time::Duration;

    fn test_config(dir: &Path) -> PluginHostConfig {
        PluginHostConfig {
            directory: dir.to_path_buf(),
            debounce_ms: 30,
            load_retry_attempts: 2,
            load_retry_delay_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn start_creates_the_directory_and_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("plugins");
        let host = PluginHost::new(test_config(&dir), FeatureBinding);

        host.start().unwrap();
        assert!(dir.is_dir());

        // Second start is a no-op.
        host.start().unwrap();

        host.dispose();
    }

    #[tokio::test]
    async fn start_fails_when_the_directory_cannot_be_created() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let host = PluginHost::new(test_config(&blocker.join("plugins")), FeatureBinding);
        let result = host.start();
        assert!(matches!(result, Err(HostError::ResourceUnavailable { .. })));
    }

    #[tokio::test]
    async fn a_bad_artifact_fails_locally_and_leaves_no_handle() {
        let root = tempfile::tempdir().unwrap();
        let host = PluginHost::new(test_config(root.path()), FeatureBinding);

        let artifact = root.path().join(format!("bad.{}", loadable_extension()));
        std::fs::write(&artifact, b"not a library").unwrap();

        let result = host.reload(&artifact);
        assert!(matches!(result, Err(HostError::CorruptModule { .. })));
        assert_eq!(host.loaded_count(), 0);

        // The host keeps going; further operations still work.
        assert!(host.loaded_plugins().unwrap().is_empty());
        host.dispose();
    }

    #[tokio::test]
    async fn reload_of_a_deleted_artifact_aborts_cleanly() {
        let root = tempfile::tempdir().unwrap();
        let host = PluginHost::new(test_config(root.path()), FeatureBinding);

        let ghost = root.path().join(format!("gone.{}", loadable_extension()));
        let result = host.reload(&ghost);
        assert!(matches!(result, Err(HostError::Io { .. })));
        assert_eq!(host.loaded_count(), 0);
        host.dispose();
    }

    #[tokio::test]
    async fn unload_of_an_unknown_path_is_a_noop() {
        let root = tempfile::tempdir().unwrap();
        let host = PluginHost::new(test_config(root.path()), FeatureBinding);

        let never_loaded = root.path().join(format!("a.{}", loadable_extension()));
        assert!(!host.unload(&never_loaded).unwrap());
        host.dispose();
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_fences_later_calls() {
        let root = tempfile::tempdir().unwrap();
        let host = PluginHost::new(test_config(root.path()), FeatureBinding);
        host.start().unwrap();

        host.dispose();
        host.dispose();

        let artifact = root.path().join(format!("a.{}", loadable_extension()));
        assert!(matches!(
            host.reload(&artifact),
            Err(HostError::AlreadyDisposed)
        ));
        assert!(matches!(
            host.unload(&artifact),
            Err(HostError::AlreadyDisposed)
        ));
        assert!(matches!(
            host.loaded_plugins(),
            Err(HostError::AlreadyDisposed)
        ));
        assert!(matches!(host.start(), Err(HostError::AlreadyDisposed)));
    }

    #[tokio::test]
    async fn watcher_driven_failures_do_not_stop_the_host() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("plugins");
        let host = PluginHost::new(test_config(&dir), FeatureBinding);
        host.start().unwrap();

        // A garbage artifact appears; the debounced load fails and is
        // logged, the host stays alive.
        let artifact = dir.join(format!("bad.{}", loadable_extension()));
        std::fs::write(&artifact, b"junk").unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(host.loaded_count(), 0);
        assert!(host.loaded_plugins().unwrap().is_empty());

        host.dispose();
    }
}
