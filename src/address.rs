//! Plugin address classification
//!
//! A plugin is addressed by a single opaque string that takes one of three
//! forms, each mapped to its own resolution path:
//!
//! 1. `{CLSID}`: activate the registered class directly.
//! 2. `library`: load the library and call its discovery export.
//! 3. `library:{CLSID}`: load the library and create the class through its
//!    class-factory export.
//!
//! Classification is infallible: a string that parses as no identifier is a
//! library name, separator included.

use std::fmt;

use crate::com::ClassId;

/// The classified form of a plugin address string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginAddress {
    /// A bare class identifier, activated through the registry
    Class(ClassId),

    /// A library name or path, resolved through the discovery export
    Library(String),

    /// A library plus the class to create through its factory export
    LibraryClass { library: String, class: ClassId },
}

impl PluginAddress {
    /// Classify a raw address string
    ///
    /// The split happens at the **last** separator so that identifier tails
    /// win over colons embedded in the name. A tail that is not a
    /// well-formed identifier abandons the split entirely: the whole input,
    /// separator included, is the library name (this is what keeps
    /// `C:\path\to\plugin.so` addressable).
    pub fn parse(input: &str) -> Self {
        match input.rsplit_once(':') {
            Some((library, tail)) => match tail.parse::<ClassId>() {
                Ok(class) => Self::LibraryClass {
                    library: library.to_string(),
                    class,
                },
                Err(_) => Self::Library(input.to_string()),
            },
            None => match input.parse::<ClassId>() {
                Ok(class) => Self::Class(class),
                Err(_) => Self::Library(input.to_string()),
            },
        }
    }
}

impl fmt::Display for PluginAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(class) => write!(f, "class {class}"),
            Self::Library(library) => write!(f, "library '{library}'"),
            Self::LibraryClass { library, class } => {
                write!(f, "library '{library}' class {class}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const CLSID: &str = "{12345678-1234-1234-1234-1234567890AB}";

    #[test]
    fn test_bare_identifier_is_class() {
        let address = PluginAddress::parse(CLSID);
        assert_eq!(address, PluginAddress::Class(CLSID.parse().unwrap()));
    }

    #[test]
    fn test_plain_name_is_library() {
        assert_eq!(
            PluginAddress::parse("plugin.so"),
            PluginAddress::Library("plugin.so".to_string())
        );
    }

    #[test]
    fn test_name_with_identifier_tail_is_library_class() {
        let address = PluginAddress::parse(&format!("plugin.so:{CLSID}"));
        assert_eq!(
            address,
            PluginAddress::LibraryClass {
                library: "plugin.so".to_string(),
                class: CLSID.parse().unwrap(),
            }
        );
    }

    #[test]
    fn test_non_identifier_tail_keeps_whole_string() {
        // The colon is part of a path, not a separator.
        let input = r"C:\path\to\plugin.so";
        assert_eq!(
            PluginAddress::parse(input),
            PluginAddress::Library(input.to_string())
        );
    }

    #[test]
    fn test_split_happens_at_last_separator() {
        let input = format!("dir:with:colons/plugin.so:{CLSID}");
        assert_eq!(
            PluginAddress::parse(&input),
            PluginAddress::LibraryClass {
                library: "dir:with:colons/plugin.so".to_string(),
                class: CLSID.parse().unwrap(),
            }
        );
    }

    #[test]
    fn test_malformed_identifier_alone_is_library() {
        // Unbraced or truncated identifiers are just odd file names.
        let input = "12345678-1234-1234-1234-1234567890AB";
        assert_eq!(
            PluginAddress::parse(input),
            PluginAddress::Library(input.to_string())
        );
    }

    #[test]
    fn test_empty_library_name_is_kept_verbatim() {
        // ":{CLSID}" classifies as a factory address with an empty library
        // name; the load fails downstream, which is the faithful behavior.
        let address = PluginAddress::parse(&format!(":{CLSID}"));
        assert_eq!(
            address,
            PluginAddress::LibraryClass {
                library: String::new(),
                class: CLSID.parse().unwrap(),
            }
        );
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(
            PluginAddress::parse("plugin.so").to_string(),
            "library 'plugin.so'"
        );
        assert_eq!(
            PluginAddress::parse(CLSID).to_string(),
            format!("class {CLSID}")
        );
    }
}
