//! Isolated per-plugin load containers.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use solstice_contracts::{AbiVersionFn, PluginVersionFn, ABI_VERSION, ABI_VERSION_SYMBOL, PLUGIN_VERSION_SYMBOL};

use crate::error::{HostError, HostResult};
use crate::path::{file_label, is_contracts_module, is_loadable_module};

/// An execution-scoped container for one plugin artifact.
///
/// The artifact and its private transitive dependencies are copied into a
/// per-domain staging directory and the library is mapped from there, so
/// the watched file itself is never locked and stays replaceable while
/// the plugin runs.
///
/// Resolution policy, applied while staging:
///
/// 1. A sibling named like the contracts module is **never** staged; the
///    host's statically linked copy satisfies the reference, which is
///    what keeps trait objects castable across the boundary.
/// 2. Any other sibling loadable module in the artifact's directory is
///    staged as a private dependency of this domain.
/// 3. Everything else resolves through the process and system loader.
///
/// The domain is collectible: the registry handle, pending-disposal
/// batches and in-flight request snapshots each hold an `Arc` clone, and
/// the mapped code is released when the last clone drops.
pub struct PluginDomain {
    artifact: PathBuf,
    staging: PathBuf,
    library: Option<Library>,
    declared_version: String,
}

impl PluginDomain {
    /// Load an artifact into a fresh domain.
    pub fn load(artifact: &Path) -> HostResult<Self> {
        let staging = staging_root().join(uuid::Uuid::new_v4().simple().to_string());
        std::fs::create_dir_all(&staging).map_err(|e| HostError::io(&staging, e))?;

        match Self::load_into_staging(artifact, &staging) {
            Ok(domain) => Ok(domain),
            Err(error) => {
                // Partial domains leave nothing behind.
                let _ = std::fs::remove_dir_all(&staging);
                Err(error)
            }
        }
    }

    fn load_into_staging(artifact: &Path, staging: &Path) -> HostResult<Self> {
        let file_name = artifact
            .file_name()
            .ok_or_else(|| HostError::io(artifact, std::io::Error::other("no file name")))?;

        let staged_root = staging.join(file_name);
        std::fs::copy(artifact, &staged_root).map_err(|e| HostError::io(artifact, e))?;

        stage_private_dependencies(artifact, staging)?;

        let library = unsafe { Library::new(&staged_root) }
            .map_err(|e| classify_load_error(artifact, e))?;

        let abi: Symbol<AbiVersionFn> = unsafe { library.get(ABI_VERSION_SYMBOL) }
            .map_err(|_| HostError::NoCompatibleType {
                path: artifact.to_path_buf(),
            })?;
        let found = abi();
        if found != ABI_VERSION {
            return Err(HostError::AbiMismatch {
                path: artifact.to_path_buf(),
                expected: ABI_VERSION,
                found,
            });
        }

        let declared_version = unsafe { library.get::<PluginVersionFn>(PLUGIN_VERSION_SYMBOL) }
            .map(|version| version().to_string())
            .unwrap_or_else(|_| "0.0.0".to_string());

        if semver::Version::parse(&declared_version).is_err() {
            tracing::debug!(
                artifact = %file_label(artifact),
                version = %declared_version,
                "plugin declares a non-semver version"
            );
        }

        Ok(Self {
            artifact: artifact.to_path_buf(),
            staging: staging.to_path_buf(),
            library: Some(library),
            declared_version,
        })
    }

    /// Typed symbol lookup.
    ///
    /// # Safety
    ///
    /// `T` must match the symbol's real signature; the caller must not
    /// let anything derived from the symbol outlive this domain.
    pub unsafe fn get<T>(&self, symbol: &[u8]) -> Result<Symbol<'_, T>, libloading::Error> {
        match &self.library {
            Some(library) => library.get(symbol),
            None => Err(libloading::Error::DlSymUnknown),
        }
    }

    /// The watched artifact this domain was loaded from.
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// The plugin crate's self-declared version string.
    pub fn declared_version(&self) -> &str {
        &self.declared_version
    }

    /// Close the library and delete the staging directory. Also runs on
    /// drop; calling it twice is a no-op.
    pub fn unload(&mut self) {
        if let Some(library) = self.library.take() {
            drop(library);
        }
        if self.staging.exists() {
            if let Err(error) = std::fs::remove_dir_all(&self.staging) {
                tracing::debug!(
                    staging = %self.staging.display(),
                    %error,
                    "failed to remove domain staging directory"
                );
            }
        }
    }
}

impl Drop for PluginDomain {
    fn drop(&mut self) {
        self.unload();
    }
}

impl std::fmt::Debug for PluginDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDomain")
            .field("artifact", &self.artifact)
            .field("staging", &self.staging)
            .field("declared_version", &self.declared_version)
            .field("loaded", &self.library.is_some())
            .finish()
    }
}

fn staging_root() -> PathBuf {
    std::env::temp_dir().join("solstice-domains")
}

/// Copy the artifact's private sibling dependencies into the staging
/// directory; see the resolution policy on [`PluginDomain`].
fn stage_private_dependencies(artifact: &Path, staging: &Path) -> HostResult<()> {
    let Some(parent) = artifact.parent() else {
        return Ok(());
    };

    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        // The directory vanished between the event and the load; the
        // root copy already succeeded, so continue without siblings.
        Err(_) => return Ok(()),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path == artifact {
            continue;
        }
        if !is_loadable_module(&path) || is_contracts_module(&path) {
            continue;
        }

        let Some(name) = path.file_name() else {
            continue;
        };
        if let Err(error) = std::fs::copy(&path, staging.join(name)) {
            // A half-written sibling is not fatal; the loader will
            // complain if the dependency is actually needed.
            tracing::debug!(
                dependency = %file_label(&path),
                %error,
                "failed to stage private dependency"
            );
        }
    }

    Ok(())
}

/// Split loader failures into corrupt-module and unresolved-symbol
/// cases, keeping the nested loader messages (deduplicated).
fn classify_load_error(artifact: &Path, error: libloading::Error) -> HostError {
    let message = error.to_string();
    let lowered = message.to_lowercase();

    if lowered.contains("undefined symbol") || lowered.contains("symbol not found") {
        let mut reasons: Vec<String> = message
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        reasons.dedup();

        HostError::SymbolResolution {
            path: artifact.to_path_buf(),
            reasons,
        }
    } else {
        HostError::CorruptModule {
            path: artifact.to_path_buf(),
            reason: message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::loadable_extension;

    #[test]
    fn garbage_artifacts_are_corrupt_modules() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join(format!("bad.{}", loadable_extension()));
        std::fs::write(&artifact, b"this is not a shared library").unwrap();

        let result = PluginDomain::load(&artifact);
        assert!(matches!(result, Err(HostError::CorruptModule { .. })));
    }

    #[test]
    fn missing_artifacts_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join(format!("gone.{}", loadable_extension()));

        let result = PluginDomain::load(&artifact);
        assert!(matches!(result, Err(HostError::Io { .. })));
    }

    #[test]
    fn failed_loads_leave_no_staging_behind() {
        let dir = tempfile::tempdir().unwrap();
        let name = format!("staging_cleanup_probe.{}", loadable_extension());
        let artifact = dir.path().join(&name);
        std::fs::write(&artifact, b"junk").unwrap();

        assert!(PluginDomain::load(&artifact).is_err());
        assert!(!staging_holds_artifact(&name));
    }

    fn staging_holds_artifact(name: &str) -> bool {
        let Ok(domains) = std::fs::read_dir(staging_root()) else {
            return false;
        };
        domains
            .flatten()
            .any(|domain| domain.path().join(name).exists())
    }
}
