//! Raw ABI shared with loaded plugin modules
//!
//! Vtable layouts and status codes for the reference-counted object model
//! plugin modules implement. Everything here is `repr(C)`; the safe wrappers
//! live in [`super::handle`].

use std::ffi::c_void;

use super::guid::Guid;

/// Status code returned by every foreign call
pub type Hresult = i32;

/// The call completed successfully
pub const S_OK: Hresult = 0;

/// Unspecified failure
pub const E_FAIL: Hresult = 0x8000_4005_u32 as Hresult;

/// An output pointer was null or invalid
pub const E_POINTER: Hresult = 0x8000_4003_u32 as Hresult;

/// The requested interface is not implemented
pub const E_NOINTERFACE: Hresult = 0x8000_4002_u32 as Hresult;

/// The requested class is not served by this module
pub const CLASS_E_CLASSNOTAVAILABLE: Hresult = 0x8004_0111_u32 as Hresult;

/// Vtable of the base reference-counted object interface
#[repr(C)]
pub struct UnknownVtbl {
    pub query_interface:
        unsafe extern "system" fn(this: *mut Unknown, iid: *const Guid, out: *mut *mut c_void) -> Hresult,
    pub add_ref: unsafe extern "system" fn(this: *mut Unknown) -> u32,
    pub release: unsafe extern "system" fn(this: *mut Unknown) -> u32,
}

/// A reference-counted plugin object, seen as its base interface
#[repr(C)]
pub struct Unknown {
    pub vtbl: *const UnknownVtbl,
}

/// Vtable of the class-factory interface
#[repr(C)]
pub struct ClassFactoryVtbl {
    pub base: UnknownVtbl,
    pub create_instance: unsafe extern "system" fn(
        this: *mut ClassFactory,
        outer: *mut Unknown,
        iid: *const Guid,
        out: *mut *mut c_void,
    ) -> Hresult,
    pub lock_server: unsafe extern "system" fn(this: *mut ClassFactory, lock: i32) -> Hresult,
}

/// A class-factory object handed out by a module's class-object export
#[repr(C)]
pub struct ClassFactory {
    pub vtbl: *const ClassFactoryVtbl,
}

/// Signature of the discovery export (`VirtualChannelGetInstance`)
///
/// Called twice per resolution: once with a null `objects` array to probe the
/// instance count, then again with a buffer of that size to fill it.
pub type VirtualChannelGetInstanceFn = unsafe extern "system" fn(
    iid: *const Guid,
    count: *mut u32,
    objects: *mut *mut Unknown,
) -> Hresult;

/// Signature of the class-object export (`DllGetClassObject`)
pub type DllGetClassObjectFn = unsafe extern "system" fn(
    class_id: *const Guid,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> Hresult;
