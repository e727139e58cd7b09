//! Filesystem sandbox: confines tool path arguments to an allowlisted set of
//! roots and rejects a fixed denylist of sensitive prefixes (spec §4.5).
//!
//! Resolution order mirrors a normalize-then-canonicalize path pipeline:
//! expand `~`, make absolute against the primary root if relative, resolve
//! symlinks via `canonicalize`, then check against the denylist and every
//! allowlist root. Canonicalizing after joining means a symlink inside a root
//! that points outside of it is still caught.

use gatecode_core::{Error, Result};
use std::path::{Path, PathBuf};

const DENYLIST_PREFIXES: &[&str] = &["/proc", "/sys", "/dev"];

/// Allowlist = `[cwd] ∪ operator-supplied extra directories` (spec §4.5).
/// The first root (`cwd`) is also the base relative paths resolve against.
pub struct Sandbox {
    roots: Vec<PathBuf>,
}

impl Sandbox {
    /// `root` need not exist yet; it is canonicalized lazily per-resolve so a
    /// sandbox can be constructed before its directory is created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// Builds a sandbox with `cwd` as the primary root plus additional
    /// operator-supplied allowlist directories.
    pub fn with_extra_roots(cwd: impl Into<PathBuf>, extra: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut roots = vec![cwd.into()];
        roots.extend(extra);
        Self { roots }
    }

    /// The primary root (`cwd`), used as the base for relative-path resolution.
    pub fn root(&self) -> &Path {
        &self.roots[0]
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolves `path` (absolute, relative, or `~`-prefixed) against the
    /// sandbox root and rejects it if it escapes every allowlist root or
    /// falls under a denylisted system prefix.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let canonical = self.resolve_uncheck_existence(path);
        self.check(&canonical)?;
        Ok(canonical)
    }

    /// Like `resolve`, but additionally requires the path to already exist
    /// ("require-existing requests must stat the path first", spec §4.5).
    pub fn resolve_existing(&self, path: &str) -> Result<PathBuf> {
        let canonical = self.resolve(path)?;
        if !canonical.exists() {
            return Err(Error::SandboxViolation(format!(
                "path {} does not exist",
                canonical.display()
            )));
        }
        Ok(canonical)
    }

    fn resolve_uncheck_existence(&self, path: &str) -> PathBuf {
        let expanded = expand_tilde(path);
        let joined = if expanded.is_absolute() {
            expanded
        } else {
            self.root().join(expanded)
        };
        canonicalize_best_effort(&joined)
    }

    fn check(&self, canonical: &Path) -> Result<()> {
        let ssh_dir = dirs::home_dir().map(|h| h.join(".ssh"));

        for prefix in DENYLIST_PREFIXES {
            if canonical.starts_with(prefix) {
                return Err(Error::SandboxViolation(format!(
                    "path {} falls under denied prefix {}",
                    canonical.display(),
                    prefix
                )));
            }
        }
        if let Some(ssh_dir) = &ssh_dir {
            if canonical.starts_with(ssh_dir) {
                return Err(Error::SandboxViolation(format!(
                    "path {} falls under denied prefix {}",
                    canonical.display(),
                    ssh_dir.display()
                )));
            }
        }

        let inside_any_root = self.roots.iter().any(|root| {
            let root_canonical = canonicalize_best_effort(root);
            *canonical == root_canonical || canonical.starts_with(&root_canonical)
        });
        if !inside_any_root {
            return Err(Error::SandboxViolation(format!(
                "path {} escapes every sandbox root",
                canonical.display(),
            )));
        }

        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn canonicalize_best_effort(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
