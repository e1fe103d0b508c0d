//! COM-style object model shared with plugin modules
//!
//! Plugin modules hand out reference-counted objects through C vtables. This
//! module holds the raw ABI ([`abi`]), the identifier grammar ([`guid`]), and
//! the owned handle wrappers that guarantee release on every exit path
//! ([`handle`]).

pub mod abi;
pub mod guid;
pub mod handle;

pub use abi::{Hresult, S_OK};
pub use guid::{ClassId, ClassIdParseError, Guid, IID_CLASS_FACTORY, IID_UNKNOWN, IID_WTS_PLUGIN};
pub use handle::{FactoryHandle, PluginHandle};
