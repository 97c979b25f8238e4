//! Canonical path keys and platform-specific artifact filters.

use std::fmt;
use std::path::Path;

use solstice_contracts::CONTRACTS_MODULE_STEM;

/// Absolute, OS-normalized path used as the stable registry key for an
/// artifact. Case-folded on platforms with case-insensitive filesystems
/// so `A.DLL` and `a.dll` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Build the key for a path. The file itself may no longer exist
    /// (unload events race deletion), so canonicalization falls back to
    /// the parent directory plus file name, and finally to the absolute
    /// lexical path.
    pub fn for_path(path: &Path) -> Self {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };

        let resolved = std::fs::canonicalize(&absolute).unwrap_or_else(|_| {
            match (absolute.parent(), absolute.file_name()) {
                (Some(parent), Some(name)) => std::fs::canonicalize(parent)
                    .map(|p| p.join(name))
                    .unwrap_or(absolute.clone()),
                _ => absolute.clone(),
            }
        });

        let text = resolved.to_string_lossy();

        #[cfg(windows)]
        let text = text.to_lowercase();

        Self(text.into_owned())
    }

    /// The normalized key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform suffix of loadable modules.
pub fn loadable_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dll"
    }

    #[cfg(target_os = "macos")]
    {
        "dylib"
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "so"
    }
}

/// Whether a file looks like a loadable module on this platform.
pub fn is_loadable_module(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase() == loadable_extension())
        .unwrap_or(false)
}

/// Whether a file is the shared contracts library. It is never treated
/// as a plugin and never staged into a domain: the host's statically
/// linked copy is the single source of type identity.
pub fn is_contracts_module(path: &Path) -> bool {
    let Some(stem) = path.file_stem() else {
        return false;
    };
    let stem = stem.to_string_lossy().to_lowercase();
    let stem = stem.strip_prefix("lib").unwrap_or(&stem);
    stem == CONTRACTS_MODULE_STEM
}

/// Whether a path is a candidate plugin artifact: correct suffix and not
/// the contracts module.
pub fn is_watched_artifact(path: &Path) -> bool {
    is_loadable_module(path) && !is_contracts_module(path)
}

/// Display name for logs: file name only.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// File stem used as the fallback plugin name.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_for_the_same_file_collide() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.so");
        std::fs::write(&file, b"x").unwrap();

        let direct = CanonicalKey::for_path(&file);
        let dotted = CanonicalKey::for_path(&dir.path().join(".").join("a.so"));
        assert_eq!(direct, dotted);
    }

    #[test]
    fn missing_files_still_get_stable_keys() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = dir.path().join("gone.so");

        let before = CanonicalKey::for_path(&ghost);
        std::fs::write(&ghost, b"x").unwrap();
        let after = CanonicalKey::for_path(&ghost);
        assert_eq!(before, after);
    }

    #[test]
    fn suffix_filter_is_platform_specific() {
        let name = format!("plugin.{}", loadable_extension());
        assert!(is_loadable_module(Path::new(&name)));
        assert!(!is_loadable_module(Path::new("plugin.txt")));
        assert!(!is_loadable_module(Path::new("plugin")));
    }

    #[test]
    fn contracts_module_is_filtered() {
        let ext = loadable_extension();
        assert!(is_contracts_module(Path::new(&format!(
            "solstice_contracts.{ext}"
        ))));
        assert!(is_contracts_module(Path::new(&format!(
            "libsolstice_contracts.{ext}"
        ))));
        assert!(!is_contracts_module(Path::new(&format!("a_plugin.{ext}"))));

        assert!(!is_watched_artifact(Path::new(&format!(
            "libsolstice_contracts.{ext}"
        ))));
        assert!(is_watched_artifact(Path::new(&format!("a_plugin.{ext}"))));
    }
}
