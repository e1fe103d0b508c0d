//! Owned handles over reference-counted plugin objects
//!
//! Module wraps the raw interface pointers of [`super::abi`] in ownership
//! types that issue exactly one `Release` through the object's vtable when
//! dropped, on every exit path. Manual increment/decrement pairing never
//! appears outside this file.

use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};

use crate::com::abi::{ClassFactory, E_POINTER, S_OK, Unknown};
use crate::com::guid::Guid;
use crate::core::error::{LoaderError, LoaderResult};

/// An owned reference to a plugin capability instance
///
/// Holds one reference to the underlying object; dropping the handle
/// releases it. Ownership transfers out via [`PluginHandle::into_raw`].
pub struct PluginHandle {
    ptr: NonNull<Unknown>,
}

impl PluginHandle {
    /// Take ownership of one reference to a raw interface pointer
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `raw`, when non-null, must point to a live object laid out per
    /// [`Unknown`], and the caller must own the reference being transferred.
    pub unsafe fn from_raw(raw: *mut Unknown) -> Option<Self> {
        NonNull::new(raw).map(|ptr| Self { ptr })
    }

    /// Borrow the raw interface pointer without affecting ownership
    pub fn as_ptr(&self) -> *mut Unknown {
        self.ptr.as_ptr()
    }

    /// Transfer ownership of the reference to the caller
    ///
    /// The handle is consumed without releasing; the caller becomes
    /// responsible for the reference.
    pub fn into_raw(self) -> *mut Unknown {
        let raw = self.ptr.as_ptr();
        mem::forget(self);
        raw
    }
}

impl Drop for PluginHandle {
    fn drop(&mut self) {
        let raw = self.ptr.as_ptr();
        unsafe {
            ((*(*raw).vtbl).release)(raw);
        }
    }
}

impl fmt::Display for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.ptr)
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginHandle").field(&self.ptr).finish()
    }
}

/// An owned reference to a class-factory object
///
/// Released exactly once when dropped, whether or not instance creation
/// succeeded.
pub struct FactoryHandle {
    ptr: NonNull<ClassFactory>,
}

impl FactoryHandle {
    /// Take ownership of one reference to a raw class-factory pointer
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `raw`, when non-null, must point to a live object laid out per
    /// [`ClassFactory`], and the caller must own the reference being
    /// transferred.
    pub unsafe fn from_raw(raw: *mut ClassFactory) -> Option<Self> {
        NonNull::new(raw).map(|ptr| Self { ptr })
    }

    /// Ask the factory for one instance implementing `iid`
    ///
    /// No aggregation: the outer-object parameter is always null.
    pub fn create_instance(&self, iid: &Guid) -> LoaderResult<PluginHandle> {
        let raw = self.ptr.as_ptr();
        let mut out: *mut c_void = ptr::null_mut();
        let status = unsafe {
            ((*(*raw).vtbl).create_instance)(raw, ptr::null_mut(), iid, &mut out)
        };
        if status != S_OK {
            return Err(LoaderError::call_failed(
                "IClassFactory::CreateInstance",
                status,
            ));
        }
        unsafe { PluginHandle::from_raw(out.cast()) }.ok_or(LoaderError::call_failed(
            "IClassFactory::CreateInstance",
            E_POINTER,
        ))
    }
}

impl Drop for FactoryHandle {
    fn drop(&mut self) {
        let raw = self.ptr.as_ptr();
        unsafe {
            ((*(*raw).vtbl).base.release)(raw.cast::<Unknown>());
        }
    }
}

impl fmt::Debug for FactoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FactoryHandle").field(&self.ptr).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::com::abi::E_FAIL;
    use crate::com::guid::IID_WTS_PLUGIN;
    use crate::test_support::{TestFactory, TestInstance};

    #[test]
    fn test_drop_releases_exactly_once() {
        let releases = Arc::new(AtomicU32::new(0));
        let handle = unsafe { PluginHandle::from_raw(TestInstance::spawn(&releases)) }.unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_into_raw_does_not_release() {
        let releases = Arc::new(AtomicU32::new(0));
        let handle = unsafe { PluginHandle::from_raw(TestInstance::spawn(&releases)) }.unwrap();
        let raw = handle.into_raw();
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        // Re-adopt so the object is not leaked.
        drop(unsafe { PluginHandle::from_raw(raw) }.unwrap());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_raw_null_is_none() {
        assert!(unsafe { PluginHandle::from_raw(ptr::null_mut()) }.is_none());
        assert!(unsafe { FactoryHandle::from_raw(ptr::null_mut()) }.is_none());
    }

    #[test]
    fn test_factory_creates_instance_and_releases_on_drop() {
        let factory_releases = Arc::new(AtomicU32::new(0));
        let instance_releases = Arc::new(AtomicU32::new(0));
        let raw = TestFactory::spawn(S_OK, &factory_releases, &instance_releases);
        let factory = unsafe { FactoryHandle::from_raw(raw) }.unwrap();

        let instance = factory.create_instance(&IID_WTS_PLUGIN).unwrap();
        drop(instance);
        assert_eq!(instance_releases.load(Ordering::SeqCst), 1);

        drop(factory);
        assert_eq!(factory_releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_create_failure_reports_status() {
        let factory_releases = Arc::new(AtomicU32::new(0));
        let instance_releases = Arc::new(AtomicU32::new(0));
        let raw = TestFactory::spawn(E_FAIL, &factory_releases, &instance_releases);
        let factory = unsafe { FactoryHandle::from_raw(raw) }.unwrap();

        let result = factory.create_instance(&IID_WTS_PLUGIN);
        assert!(matches!(
            result,
            Err(LoaderError::CallFailed { status, .. }) if status == E_FAIL
        ));
        assert_eq!(instance_releases.load(Ordering::SeqCst), 0);
    }
}
