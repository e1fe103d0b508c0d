//! Class activation registry
//!
//! Module handles direct activation of a bare class identifier. The seam is
//! the [`ActivationRegistry`] trait; the production implementation is a
//! registration manifest (YAML) mapping each class identifier to the library
//! that serves it, activated through that library's class-factory export,
//! the same handshake an in-process object-activation service performs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::com::{ClassId, Guid, PluginHandle};
use crate::core::error::{LoaderError, LoaderResult};
use crate::module::{ModuleLoader, NativeLoader};
use crate::resolver::create_instance_via_factory;

/// Constructs instances of registered classes
pub trait ActivationRegistry {
    /// Create one instance of `class_id` implementing `iid`
    ///
    /// Runs in an unrestricted execution context. A non-success status from
    /// the underlying activation is reported as-is; there is no fallback.
    fn create_instance(&self, class_id: &ClassId, iid: &Guid) -> LoaderResult<PluginHandle>;
}

impl<R: ActivationRegistry + ?Sized> ActivationRegistry for &R {
    fn create_instance(&self, class_id: &ClassId, iid: &Guid) -> LoaderResult<PluginHandle> {
        (**self).create_instance(class_id, iid)
    }
}

/// Registration manifest (registry YAML file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryManifest {
    /// Registered classes
    #[serde(default)]
    pub registrations: Vec<Registration>,
}

/// One class registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    /// The class identifier, in braced literal form
    pub class: ClassId,

    /// Library serving the class through its class-object export
    pub library: PathBuf,

    /// Free-form note about the registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Manifest-backed activation registry
///
/// Later registrations of the same class shadow earlier ones.
pub struct ManifestRegistry<L = NativeLoader> {
    entries: HashMap<ClassId, PathBuf>,
    loader: L,
}

impl ManifestRegistry {
    /// Load a registry from a manifest file
    pub fn from_file(path: impl AsRef<Path>) -> LoaderResult<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| LoaderError::manifest(path, e))?;
        let manifest: RegistryManifest =
            serde_yaml::from_str(&content).map_err(|e| LoaderError::manifest(path, e))?;
        Ok(Self::from_manifest(manifest))
    }

    /// Build a registry from an in-memory manifest
    pub fn from_manifest(manifest: RegistryManifest) -> Self {
        Self::with_loader(manifest, NativeLoader)
    }

    /// A registry with no registrations
    ///
    /// Every direct activation against it fails with
    /// [`LoaderError::ClassNotRegistered`].
    pub fn empty() -> Self {
        Self::from_manifest(RegistryManifest::default())
    }
}

impl<L> ManifestRegistry<L> {
    /// Build a registry activating through a specific module loader
    pub fn with_loader(manifest: RegistryManifest, loader: L) -> Self {
        let entries = manifest
            .registrations
            .into_iter()
            .map(|registration| (registration.class, registration.library))
            .collect();
        Self { entries, loader }
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no registrations
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Library registered for `class_id`, if any
    pub fn lookup(&self, class_id: &ClassId) -> Option<&Path> {
        self.entries.get(class_id).map(PathBuf::as_path)
    }
}

impl<L: ModuleLoader> ActivationRegistry for ManifestRegistry<L> {
    fn create_instance(&self, class_id: &ClassId, iid: &Guid) -> LoaderResult<PluginHandle> {
        let library = self
            .entries
            .get(class_id)
            .ok_or(LoaderError::ClassNotRegistered(*class_id))?;
        info!(class = %class_id, library = %library.display(), "activating registered class");
        let module = self.loader.load(&library.to_string_lossy())?;
        create_instance_via_factory(&module, class_id, iid)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::com::IID_WTS_PLUGIN;
    use crate::com::abi::S_OK;
    use crate::test_support::{FakeClassObject, FakeLoader, FakeModule};

    const CLSID: &str = "{12345678-1234-1234-1234-1234567890AB}";

    fn manifest_for(class: &str, library: &str) -> RegistryManifest {
        RegistryManifest {
            registrations: vec![Registration {
                class: class.parse().unwrap(),
                library: PathBuf::from(library),
                description: None,
            }],
        }
    }

    #[test]
    fn test_manifest_parses_from_yaml() {
        let yaml = r#"
registrations:
  - class: "{12345678-1234-1234-1234-1234567890AB}"
    library: /usr/lib/plugins/sample.so
    description: sample plugin
"#;
        let manifest: RegistryManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.registrations.len(), 1);
        assert_eq!(
            manifest.registrations[0].class,
            CLSID.parse().unwrap()
        );

        let registry = ManifestRegistry::from_manifest(manifest);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup(&CLSID.parse().unwrap()),
            Some(Path::new("/usr/lib/plugins/sample.so"))
        );
    }

    #[test]
    fn test_manifest_rejects_malformed_class() {
        let yaml = r#"
registrations:
  - class: "not-a-class-id"
    library: sample.so
"#;
        assert!(serde_yaml::from_str::<RegistryManifest>(yaml).is_err());
    }

    #[test]
    fn test_unregistered_class_fails() {
        let registry = ManifestRegistry::empty();
        let class: ClassId = CLSID.parse().unwrap();
        let result = registry.create_instance(&class, &IID_WTS_PLUGIN);
        assert!(matches!(
            result,
            Err(LoaderError::ClassNotRegistered(missing)) if missing == class
        ));
    }

    #[test]
    fn test_registered_class_activates_through_factory() {
        let factory_releases = Arc::new(AtomicU32::new(0));
        let instance_releases = Arc::new(AtomicU32::new(0));
        let module = FakeModule {
            discovery: None,
            class_object: Some(FakeClassObject {
                status: S_OK,
                create_status: S_OK,
                factory_releases: Arc::clone(&factory_releases),
                instance_releases: Arc::clone(&instance_releases),
            }),
            unloads: Arc::new(AtomicU32::new(0)),
        };
        let unloads = Arc::clone(&module.unloads);

        let registry = ManifestRegistry::with_loader(
            manifest_for(CLSID, "sample.so"),
            FakeLoader::with_module(module),
        );

        let class: ClassId = CLSID.parse().unwrap();
        let handle = registry.create_instance(&class, &IID_WTS_PLUGIN).unwrap();

        // The factory is gone, the library is unloaded, the instance lives.
        assert_eq!(factory_releases.load(Ordering::SeqCst), 1);
        assert_eq!(unloads.load(Ordering::SeqCst), 1);
        assert_eq!(instance_releases.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(instance_releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_manifest_file_is_manifest_error() {
        let result = ManifestRegistry::from_file("/nonexistent/registry.yaml");
        assert!(matches!(result, Err(LoaderError::Manifest { .. })));
    }
}
