//! Activation runtime lifecycle
//!
//! The activation subsystem is process-wide state: it must be initialized
//! once before any resolution path runs and torn down once after the result
//! has been reported. [`ActivationRuntime`] makes that bracket explicit as a
//! scoped guard: teardown runs on drop, so it happens even when resolution
//! fails.

use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::core::error::{LoaderError, LoaderResult};
use crate::registry::ManifestRegistry;

/// Environment variable naming the registration manifest
pub const REGISTRY_ENV: &str = "VCLOAD_REGISTRY";

/// Manifest locations probed when the environment variable is unset
const DEFAULT_MANIFEST_PATHS: &[&str] = &[
    "./vcload-registry.yaml",
    "/etc/vcload/registry.yaml",
    "/usr/local/share/vcload/registry.yaml",
];

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Scoped ownership of the process-wide activation subsystem
///
/// Holds the activation registry for the duration of one resolution flow.
/// Only one runtime may be active at a time; dropping it tears the
/// subsystem down and permits a fresh initialization.
pub struct ActivationRuntime {
    registry: ManifestRegistry,
}

impl ActivationRuntime {
    /// Initialize the activation subsystem
    ///
    /// Locates the registration manifest via [`REGISTRY_ENV`], then the
    /// fixed default paths; with no manifest present the registry starts
    /// empty and every direct activation fails as unregistered.
    pub fn initialize() -> LoaderResult<Self> {
        if ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(LoaderError::AlreadyInitialized);
        }
        match Self::locate_registry() {
            Ok(registry) => {
                info!(registrations = registry.len(), "activation runtime initialized");
                Ok(Self { registry })
            }
            Err(err) => {
                ACTIVE.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Initialize the subsystem around an explicit registry
    pub fn with_registry(registry: ManifestRegistry) -> LoaderResult<Self> {
        if ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(LoaderError::AlreadyInitialized);
        }
        Ok(Self { registry })
    }

    /// The registry owned by this runtime
    pub fn registry(&self) -> &ManifestRegistry {
        &self.registry
    }

    fn locate_registry() -> LoaderResult<ManifestRegistry> {
        if let Some(path) = env::var_os(REGISTRY_ENV) {
            debug!(path = %Path::new(&path).display(), "registration manifest from environment");
            return ManifestRegistry::from_file(&path);
        }
        for candidate in DEFAULT_MANIFEST_PATHS {
            if Path::new(candidate).exists() {
                debug!(path = candidate, "registration manifest found");
                return ManifestRegistry::from_file(candidate);
            }
        }
        debug!("no registration manifest, starting with an empty registry");
        Ok(ManifestRegistry::empty())
    }
}

impl Drop for ActivationRuntime {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::SeqCst);
        debug!("activation runtime torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A single test keeps every touch of the process-wide flag sequential.
    #[test]
    fn test_runtime_brackets_initialization() {
        let runtime = ActivationRuntime::with_registry(ManifestRegistry::empty()).unwrap();
        assert!(runtime.registry().is_empty());

        // A second runtime is rejected while the first is live.
        assert!(matches!(
            ActivationRuntime::with_registry(ManifestRegistry::empty()),
            Err(LoaderError::AlreadyInitialized)
        ));

        // Teardown re-arms initialization.
        drop(runtime);
        let runtime = ActivationRuntime::with_registry(ManifestRegistry::empty()).unwrap();
        drop(runtime);
    }
}
