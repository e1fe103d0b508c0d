//! Plugin resolution
//!
//! Module turns a classified [`PluginAddress`] into exactly one live plugin
//! handle. Each address form maps to its own resolution path; exactly one
//! path runs per invocation and there is no fallback between them (the only
//! fallback in the whole flow is the parser-level one in
//! [`crate::address`]).
//!
//! Every resource acquired along the way (library, instance buffer, surplus
//! instances, factory) is scoped, so partial failures release everything
//! acquired so far and a loaded library is unloaded exactly once on every
//! exit path.

use std::ptr;

use tracing::{debug, info};

use crate::address::PluginAddress;
use crate::com::abi::Unknown;
use crate::com::{ClassId, Guid, IID_CLASS_FACTORY, IID_WTS_PLUGIN, PluginHandle};
use crate::core::error::{LoaderError, LoaderResult};
use crate::module::{ModuleLoader, PluginModule};
use crate::registry::ActivationRegistry;

/// Resolves plugin addresses against a loader and an activation registry
pub struct Resolver<L, R> {
    loader: L,
    registry: R,
    target_iid: Guid,
}

impl<L: ModuleLoader, R: ActivationRegistry> Resolver<L, R> {
    /// Create a resolver producing instances of `target_iid`
    pub fn new(loader: L, registry: R, target_iid: Guid) -> Self {
        Self {
            loader,
            registry,
            target_iid,
        }
    }

    /// Create a resolver for the virtual channel plugin interface
    pub fn for_plugins(loader: L, registry: R) -> Self {
        Self::new(loader, registry, IID_WTS_PLUGIN)
    }

    /// Resolve `address` to a single owned plugin handle
    ///
    /// At most one handle is ever returned; instances beyond the first that
    /// a module hands out during discovery are released before returning.
    pub fn resolve(&self, address: &PluginAddress) -> LoaderResult<PluginHandle> {
        match address {
            PluginAddress::Class(class) => {
                info!(class = %class, "activating through the registry");
                self.registry.create_instance(class, &self.target_iid)
            }
            PluginAddress::Library(library) => {
                info!(library = %library, "resolving through the discovery export");
                let module = self.loader.load(library)?;
                discover_instance(&module, &self.target_iid)
            }
            PluginAddress::LibraryClass { library, class } => {
                info!(library = %library, class = %class, "resolving through the factory export");
                let module = self.loader.load(library)?;
                create_instance_via_factory(&module, class, &self.target_iid)
            }
        }
    }
}

/// Obtain one instance from a module's discovery export
///
/// The export is called twice: a null-array probe for the instance count,
/// then a fill into a buffer of that size. The first instance is adopted;
/// every other instance is released before returning.
pub fn discover_instance<M: PluginModule>(module: &M, iid: &Guid) -> LoaderResult<PluginHandle> {
    let discovery = module.discovery()?;

    let advertised = discovery.probe(iid)?;
    if advertised == 0 {
        return Err(LoaderError::NoInstances);
    }
    debug!(count = advertised, "discovery export advertised instances");

    let mut slots = vec![ptr::null_mut::<Unknown>(); advertised as usize];
    let filled = discovery.fill(iid, &mut slots)? as usize;

    // Only the first instance is kept. The others are adopted into scoped
    // handles and dropped on the spot, which releases them.
    let mut slots = slots.into_iter().take(filled);
    let adopted = slots
        .next()
        .and_then(|raw| unsafe { PluginHandle::from_raw(raw) });

    let mut surplus = 0usize;
    for raw in slots {
        if let Some(extra) = unsafe { PluginHandle::from_raw(raw) } {
            drop(extra);
            surplus += 1;
        }
    }
    if surplus > 0 {
        debug!(surplus, "released surplus discovery instances");
    }

    adopted.ok_or(LoaderError::NoInstances)
}

/// Create one instance of `class_id` through a module's class-object export
///
/// The factory is requested as the class-factory interface and released
/// exactly once when this function returns, whether or not creation
/// succeeded.
pub fn create_instance_via_factory<M: PluginModule>(
    module: &M,
    class_id: &ClassId,
    iid: &Guid,
) -> LoaderResult<PluginHandle> {
    let entry = module.class_object()?;
    let factory = entry.class_object(class_id, &IID_CLASS_FACTORY)?;
    factory.create_instance(iid)
}
