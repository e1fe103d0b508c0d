//! Error types for the loader
//!
//! Module defines all error types that can occur while resolving a plugin
//! address, providing structured error handling with detailed context.

use std::path::PathBuf;

use thiserror::Error;

use crate::com::{ClassId, Hresult};

/// The main error type for plugin resolution
#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    /// Library not found or not loadable
    #[error("could not load '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    /// Required export absent from the loaded module
    #[error("could not retrieve {symbol} entry point")]
    ExportMissing { symbol: &'static str },

    /// Non-success status returned by a foreign call
    #[error("error calling {call} (hr={status:#010x})")]
    CallFailed { call: &'static str, status: Hresult },

    /// Discovery export reported no plugin instances
    #[error("discovery returned no plugin instances")]
    NoInstances,

    /// Class id missing from the activation registry
    #[error("class {0} is not registered with the activation runtime")]
    ClassNotRegistered(ClassId),

    /// Registration manifest could not be read or parsed
    #[error("invalid registration manifest '{}': {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    /// A second activation runtime was initialized while one was active
    #[error("activation runtime is already initialized")]
    AlreadyInitialized,
}

/// Result type alias for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;

impl LoaderError {
    /// Create a new load error
    pub fn load_failed(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::LoadFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new missing-export error
    pub fn export_missing(symbol: &'static str) -> Self {
        Self::ExportMissing { symbol }
    }

    /// Create a new foreign-call error carrying the returned status
    pub fn call_failed(call: &'static str, status: Hresult) -> Self {
        Self::CallFailed { call, status }
    }

    /// Create a new manifest error
    pub fn manifest(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            LoaderError::LoadFailed { .. } => "load",
            LoaderError::ExportMissing { .. } => "export",
            LoaderError::CallFailed { .. } => "activation",
            LoaderError::NoInstances => "discovery",
            LoaderError::ClassNotRegistered(_) => "registry",
            LoaderError::Manifest { .. } => "manifest",
            LoaderError::AlreadyInitialized => "runtime",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LoaderError::load_failed("plugin.so", "file not found");
        assert_eq!(
            error.to_string(),
            "could not load 'plugin.so': file not found"
        );
        assert_eq!(error.category(), "load");
    }

    #[test]
    fn test_status_rendered_in_hex() {
        let error = LoaderError::call_failed("DllGetClassObject", 0x8004_0111_u32 as Hresult);
        assert_eq!(
            error.to_string(),
            "error calling DllGetClassObject (hr=0x80040111)"
        );
        assert_eq!(error.category(), "activation");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(LoaderError::NoInstances.category(), "discovery");
        assert_eq!(
            LoaderError::export_missing("VirtualChannelGetInstance").category(),
            "export"
        );
        assert_eq!(
            LoaderError::manifest("registry.yaml", "bad yaml").category(),
            "manifest"
        );
        assert_eq!(LoaderError::AlreadyInitialized.category(), "runtime");
    }
}
