//! Dynamic plugin modules
//!
//! Module handles the low-level loading of plugin libraries from disk and
//! the typed binding of their two well-known exports. The seams are traits
//! so the resolution paths can be exercised against fake modules; the
//! production implementation sits on `libloading`.

use std::ffi::c_void;
use std::ptr;

use libloading::{Library, Symbol};
use tracing::{debug, error};

use crate::com::abi::{
    DllGetClassObjectFn, E_POINTER, S_OK, Unknown, VirtualChannelGetInstanceFn,
};
use crate::com::{ClassId, FactoryHandle, Guid};
use crate::core::error::{LoaderError, LoaderResult};

/// Name of the discovery export every self-enumerating module carries
pub const DISCOVERY_EXPORT: &str = "VirtualChannelGetInstance";

/// Name of the class-object export factory-style modules carry
pub const CLASS_OBJECT_EXPORT: &str = "DllGetClassObject";

/// Opens plugin modules by name or path
///
/// Unloading is tied to the returned module's `Drop`, so a loaded module is
/// released exactly once on every exit path, and never without a successful
/// load.
pub trait ModuleLoader {
    type Module: PluginModule;

    /// Load the module at `path`
    fn load(&self, path: &str) -> LoaderResult<Self::Module>;
}

/// A loaded plugin module exposing the two well-known exports
pub trait PluginModule {
    /// Bind the discovery export by its fixed name
    ///
    /// Absence of the export is a bind error, reported before any call is
    /// made through it.
    fn discovery(&self) -> LoaderResult<Box<dyn DiscoveryExport + '_>>;

    /// Bind the class-object export by its fixed name
    fn class_object(&self) -> LoaderResult<Box<dyn ClassObjectExport + '_>>;
}

/// Typed binding of the discovery export
pub trait DiscoveryExport {
    /// Query how many instances the module offers for `iid`
    ///
    /// This is the null-array form of the export call.
    fn probe(&self, iid: &Guid) -> LoaderResult<u32>;

    /// Fill `slots` with one owned instance pointer each
    ///
    /// Returns the number of slots actually written. Ownership of every
    /// written reference transfers to the caller.
    fn fill(&self, iid: &Guid, slots: &mut [*mut Unknown]) -> LoaderResult<u32>;
}

/// Typed binding of the class-object export
pub trait ClassObjectExport {
    /// Obtain the factory serving `class_id`, requested as interface `iid`
    fn class_object(&self, class_id: &ClassId, iid: &Guid) -> LoaderResult<FactoryHandle>;
}

/// Production loader over the host's dynamic library loader
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

/// A dynamically loaded plugin module
///
/// The underlying library is unloaded when the module is dropped.
#[derive(Debug)]
pub struct NativeModule {
    library: Library,
    path: String,
}

impl ModuleLoader for NativeLoader {
    type Module = NativeModule;

    fn load(&self, path: &str) -> LoaderResult<NativeModule> {
        debug!(path, "loading plugin module");
        let library = unsafe {
            Library::new(path).map_err(|e| {
                error!("failed to load library: {e}");
                LoaderError::load_failed(path, e)
            })?
        };
        Ok(NativeModule {
            library,
            path: path.to_string(),
        })
    }
}

impl NativeModule {
    /// Path the module was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl PluginModule for NativeModule {
    fn discovery(&self) -> LoaderResult<Box<dyn DiscoveryExport + '_>> {
        let entry: Symbol<'_, VirtualChannelGetInstanceFn> = unsafe {
            self.library
                .get(b"VirtualChannelGetInstance\0")
                .map_err(|_| LoaderError::export_missing(DISCOVERY_EXPORT))?
        };
        debug!(path = %self.path, export = DISCOVERY_EXPORT, "bound export");
        Ok(Box::new(NativeDiscovery { entry }))
    }

    fn class_object(&self) -> LoaderResult<Box<dyn ClassObjectExport + '_>> {
        let entry: Symbol<'_, DllGetClassObjectFn> = unsafe {
            self.library
                .get(b"DllGetClassObject\0")
                .map_err(|_| LoaderError::export_missing(CLASS_OBJECT_EXPORT))?
        };
        debug!(path = %self.path, export = CLASS_OBJECT_EXPORT, "bound export");
        Ok(Box::new(NativeClassObject { entry }))
    }
}

impl Drop for NativeModule {
    fn drop(&mut self) {
        debug!(path = %self.path, "module unloaded");
    }
}

struct NativeDiscovery<'lib> {
    entry: Symbol<'lib, VirtualChannelGetInstanceFn>,
}

impl DiscoveryExport for NativeDiscovery<'_> {
    fn probe(&self, iid: &Guid) -> LoaderResult<u32> {
        let mut count = 0u32;
        let status = unsafe { (*self.entry)(iid, &mut count, ptr::null_mut()) };
        if status != S_OK {
            return Err(LoaderError::call_failed(DISCOVERY_EXPORT, status));
        }
        Ok(count)
    }

    fn fill(&self, iid: &Guid, slots: &mut [*mut Unknown]) -> LoaderResult<u32> {
        let mut count = slots.len() as u32;
        let status = unsafe { (*self.entry)(iid, &mut count, slots.as_mut_ptr()) };
        if status != S_OK {
            return Err(LoaderError::call_failed(DISCOVERY_EXPORT, status));
        }
        Ok(count.min(slots.len() as u32))
    }
}

struct NativeClassObject<'lib> {
    entry: Symbol<'lib, DllGetClassObjectFn>,
}

impl ClassObjectExport for NativeClassObject<'_> {
    fn class_object(&self, class_id: &ClassId, iid: &Guid) -> LoaderResult<FactoryHandle> {
        let mut out: *mut c_void = ptr::null_mut();
        let status = unsafe { (*self.entry)(class_id.as_guid(), iid, &mut out) };
        if status != S_OK {
            return Err(LoaderError::call_failed(CLASS_OBJECT_EXPORT, status));
        }
        unsafe { FactoryHandle::from_raw(out.cast()) }
            .ok_or(LoaderError::call_failed(CLASS_OBJECT_EXPORT, E_POINTER))
    }
}
