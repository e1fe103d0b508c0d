//! Shared test doubles
//!
//! Real vtable-backed objects with observable reference counts, plus fake
//! loader/module/registry collaborators. Everything releases through the
//! same ABI the production code uses, so the tests measure actual `Release`
//! traffic rather than mock expectations.

use std::cell::RefCell;
use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::com::abi::{
    ClassFactory, ClassFactoryVtbl, E_NOINTERFACE, Hresult, S_OK, Unknown, UnknownVtbl,
};
use crate::com::{ClassId, FactoryHandle, Guid, PluginHandle};
use crate::core::error::{LoaderError, LoaderResult};
use crate::module::{
    CLASS_OBJECT_EXPORT, ClassObjectExport, DISCOVERY_EXPORT, DiscoveryExport, ModuleLoader,
    PluginModule,
};
use crate::registry::ActivationRegistry;

/// A heap-allocated reference-counted object behind a real vtable
///
/// Every `Release` call is recorded in the shared counter; the object frees
/// itself when its count reaches zero.
#[repr(C)]
pub(crate) struct TestInstance {
    raw: Unknown,
    refs: AtomicU32,
    releases: Arc<AtomicU32>,
}

static INSTANCE_VTBL: UnknownVtbl = UnknownVtbl {
    query_interface: instance_query_interface,
    add_ref: instance_add_ref,
    release: instance_release,
};

unsafe extern "system" fn instance_query_interface(
    _this: *mut Unknown,
    _iid: *const Guid,
    _out: *mut *mut c_void,
) -> Hresult {
    E_NOINTERFACE
}

unsafe extern "system" fn instance_add_ref(this: *mut Unknown) -> u32 {
    let this = this.cast::<TestInstance>();
    unsafe { (*this).refs.fetch_add(1, Ordering::SeqCst) + 1 }
}

unsafe extern "system" fn instance_release(this: *mut Unknown) -> u32 {
    let this = this.cast::<TestInstance>();
    let remaining = unsafe { (*this).refs.fetch_sub(1, Ordering::SeqCst) } - 1;
    unsafe { (*this).releases.fetch_add(1, Ordering::SeqCst) };
    if remaining == 0 {
        drop(unsafe { Box::from_raw(this) });
    }
    remaining
}

impl TestInstance {
    /// Spawn an object with one outstanding reference
    pub(crate) fn spawn(releases: &Arc<AtomicU32>) -> *mut Unknown {
        Box::into_raw(Box::new(TestInstance {
            raw: Unknown {
                vtbl: &INSTANCE_VTBL,
            },
            refs: AtomicU32::new(1),
            releases: Arc::clone(releases),
        }))
        .cast()
    }
}

/// A class factory whose `CreateInstance` yields [`TestInstance`] objects
#[repr(C)]
pub(crate) struct TestFactory {
    raw: ClassFactory,
    refs: AtomicU32,
    create_status: Hresult,
    releases: Arc<AtomicU32>,
    instance_releases: Arc<AtomicU32>,
}

static FACTORY_VTBL: ClassFactoryVtbl = ClassFactoryVtbl {
    base: UnknownVtbl {
        query_interface: factory_query_interface,
        add_ref: factory_add_ref,
        release: factory_release,
    },
    create_instance: factory_create_instance,
    lock_server: factory_lock_server,
};

unsafe extern "system" fn factory_query_interface(
    _this: *mut Unknown,
    _iid: *const Guid,
    _out: *mut *mut c_void,
) -> Hresult {
    E_NOINTERFACE
}

unsafe extern "system" fn factory_add_ref(this: *mut Unknown) -> u32 {
    let this = this.cast::<TestFactory>();
    unsafe { (*this).refs.fetch_add(1, Ordering::SeqCst) + 1 }
}

unsafe extern "system" fn factory_release(this: *mut Unknown) -> u32 {
    let this = this.cast::<TestFactory>();
    let remaining = unsafe { (*this).refs.fetch_sub(1, Ordering::SeqCst) } - 1;
    unsafe { (*this).releases.fetch_add(1, Ordering::SeqCst) };
    if remaining == 0 {
        drop(unsafe { Box::from_raw(this) });
    }
    remaining
}

unsafe extern "system" fn factory_create_instance(
    this: *mut ClassFactory,
    _outer: *mut Unknown,
    _iid: *const Guid,
    out: *mut *mut c_void,
) -> Hresult {
    let this = this.cast::<TestFactory>();
    let status = unsafe { (*this).create_status };
    if status != S_OK {
        return status;
    }
    let instance = TestInstance::spawn(unsafe { &(*this).instance_releases });
    unsafe { *out = instance.cast() };
    S_OK
}

unsafe extern "system" fn factory_lock_server(_this: *mut ClassFactory, _lock: i32) -> Hresult {
    S_OK
}

impl TestFactory {
    /// Spawn a factory with one outstanding reference
    pub(crate) fn spawn(
        create_status: Hresult,
        releases: &Arc<AtomicU32>,
        instance_releases: &Arc<AtomicU32>,
    ) -> *mut ClassFactory {
        Box::into_raw(Box::new(TestFactory {
            raw: ClassFactory {
                vtbl: &FACTORY_VTBL,
            },
            refs: AtomicU32::new(1),
            create_status,
            releases: Arc::clone(releases),
            instance_releases: Arc::clone(instance_releases),
        }))
        .cast()
    }
}

/// Fake discovery export with scripted statuses
#[derive(Clone)]
pub(crate) struct FakeDiscovery {
    pub probe_status: Hresult,
    pub advertised: u32,
    pub fill_status: Hresult,
    pub releases: Arc<AtomicU32>,
}

impl FakeDiscovery {
    pub(crate) fn advertising(advertised: u32, releases: &Arc<AtomicU32>) -> Self {
        Self {
            probe_status: S_OK,
            advertised,
            fill_status: S_OK,
            releases: Arc::clone(releases),
        }
    }
}

impl DiscoveryExport for FakeDiscovery {
    fn probe(&self, _iid: &Guid) -> LoaderResult<u32> {
        if self.probe_status != S_OK {
            return Err(LoaderError::call_failed(DISCOVERY_EXPORT, self.probe_status));
        }
        Ok(self.advertised)
    }

    fn fill(&self, _iid: &Guid, slots: &mut [*mut Unknown]) -> LoaderResult<u32> {
        if self.fill_status != S_OK {
            return Err(LoaderError::call_failed(DISCOVERY_EXPORT, self.fill_status));
        }
        for slot in slots.iter_mut() {
            *slot = TestInstance::spawn(&self.releases);
        }
        Ok(slots.len() as u32)
    }
}

/// Fake class-object export handing out [`TestFactory`] objects
#[derive(Clone)]
pub(crate) struct FakeClassObject {
    pub status: Hresult,
    pub create_status: Hresult,
    pub factory_releases: Arc<AtomicU32>,
    pub instance_releases: Arc<AtomicU32>,
}

impl ClassObjectExport for FakeClassObject {
    fn class_object(&self, _class_id: &ClassId, _iid: &Guid) -> LoaderResult<FactoryHandle> {
        if self.status != S_OK {
            return Err(LoaderError::call_failed(CLASS_OBJECT_EXPORT, self.status));
        }
        let raw = TestFactory::spawn(
            self.create_status,
            &self.factory_releases,
            &self.instance_releases,
        );
        Ok(unsafe { FactoryHandle::from_raw(raw) }.expect("test factory pointer"))
    }
}

/// Fake module; unloads are counted when it drops
#[derive(Default)]
pub(crate) struct FakeModule {
    pub discovery: Option<FakeDiscovery>,
    pub class_object: Option<FakeClassObject>,
    pub unloads: Arc<AtomicU32>,
}

impl Drop for FakeModule {
    fn drop(&mut self) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

impl PluginModule for FakeModule {
    fn discovery(&self) -> LoaderResult<Box<dyn DiscoveryExport + '_>> {
        match &self.discovery {
            Some(fake) => Ok(Box::new(fake.clone())),
            None => Err(LoaderError::export_missing(DISCOVERY_EXPORT)),
        }
    }

    fn class_object(&self) -> LoaderResult<Box<dyn ClassObjectExport + '_>> {
        match &self.class_object {
            Some(fake) => Ok(Box::new(fake.clone())),
            None => Err(LoaderError::export_missing(CLASS_OBJECT_EXPORT)),
        }
    }
}

/// Fake loader serving a single prepared module
pub(crate) struct FakeLoader {
    module: RefCell<Option<FakeModule>>,
    pub loads: Arc<AtomicU32>,
}

impl FakeLoader {
    pub(crate) fn with_module(module: FakeModule) -> Self {
        Self {
            module: RefCell::new(Some(module)),
            loads: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            module: RefCell::new(None),
            loads: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl ModuleLoader for FakeLoader {
    type Module = FakeModule;

    fn load(&self, path: &str) -> LoaderResult<FakeModule> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.module
            .borrow_mut()
            .take()
            .ok_or_else(|| LoaderError::load_failed(path, "no such module"))
    }
}

/// Fake activation registry with scripted outcome
#[derive(Default)]
pub(crate) struct FakeRegistry {
    pub calls: Arc<AtomicU32>,
    pub releases: Arc<AtomicU32>,
    pub fail_status: Option<Hresult>,
}

impl ActivationRegistry for FakeRegistry {
    fn create_instance(&self, _class_id: &ClassId, _iid: &Guid) -> LoaderResult<PluginHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_status {
            return Err(LoaderError::call_failed("ActivationRegistry::create_instance", status));
        }
        let raw = TestInstance::spawn(&self.releases);
        Ok(unsafe { PluginHandle::from_raw(raw) }.expect("test instance pointer"))
    }
}
