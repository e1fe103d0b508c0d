//! Globally unique identifiers
//!
//! Module defines the binary `Guid` layout shared with loaded plugin modules
//! and the braced textual class-identifier grammar the activation runtime
//! accepts, e.g. `{12345678-1234-1234-1234-1234567890AB}`.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Binary identifier layout used across the plugin ABI
///
/// Field order and sizes match the wire layout plugin modules expect when an
/// identifier is passed by pointer through an export.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

/// Interface id of the base reference-counted object interface
pub const IID_UNKNOWN: Guid = Guid::new(
    0x0000_0000,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

/// Interface id of the class-factory interface
pub const IID_CLASS_FACTORY: Guid = Guid::new(
    0x0000_0001,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

/// Interface id of the virtual channel plugin capability interface
pub const IID_WTS_PLUGIN: Guid = Guid::new(
    0xA123_0201,
    0x1439,
    0x4E62,
    [0xA4, 0x14, 0x19, 0x0D, 0x0A, 0xC3, 0xD4, 0x0E],
);

impl Guid {
    /// Create an identifier from its four binary fields
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    fn from_uuid(uuid: Uuid) -> Self {
        let (data1, data2, data3, data4) = uuid.as_fields();
        Self::new(data1, data2, data3, *data4)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A class identifier in the braced literal form
///
/// Parsing accepts exactly the grammar the activation runtime accepts:
/// braces mandatory, hyphenated hex interior, 38 characters total. Anything
/// else fails to parse, which callers treat as "this is a library name", not
/// as an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(Guid);

/// Input was not a well-formed braced class-identifier literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIdParseError;

impl fmt::Display for ClassIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "class identifiers use the braced form {{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}}"
        )
    }
}

impl std::error::Error for ClassIdParseError {}

impl ClassId {
    /// The identifier's binary form, as passed through plugin exports
    pub fn as_guid(&self) -> &Guid {
        &self.0
    }
}

impl From<Guid> for ClassId {
    fn from(guid: Guid) -> Self {
        Self(guid)
    }
}

impl FromStr for ClassId {
    type Err = ClassIdParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let interior = input
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or(ClassIdParseError)?;

        // 36 chars forces the hyphenated form; the simple 32-char form is
        // not a valid class-identifier literal.
        if interior.len() != 36 {
            return Err(ClassIdParseError);
        }

        let uuid = Uuid::parse_str(interior).map_err(|_| ClassIdParseError)?;
        Ok(Self(Guid::from_uuid(uuid)))
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for ClassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClassId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        literal
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid class identifier '{literal}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_braced_literal() {
        let class: ClassId = "{12345678-1234-1234-1234-1234567890AB}".parse().unwrap();
        assert_eq!(class.as_guid().data1, 0x1234_5678);
        assert_eq!(class.as_guid().data2, 0x1234);
        assert_eq!(class.as_guid().data4[7], 0xAB);
    }

    #[test]
    fn test_parse_accepts_mixed_case() {
        let upper: ClassId = "{A1230201-1439-4E62-A414-190D0AC3D40E}".parse().unwrap();
        let lower: ClassId = "{a1230201-1439-4e62-a414-190d0ac3d40e}".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(*upper.as_guid(), IID_WTS_PLUGIN);
    }

    #[test]
    fn test_parse_rejects_unbraced() {
        assert!("12345678-1234-1234-1234-1234567890AB".parse::<ClassId>().is_err());
    }

    #[test]
    fn test_parse_rejects_unhyphenated_interior() {
        assert!("{123456781234123412341234567890AB}".parse::<ClassId>().is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("plugin.so".parse::<ClassId>().is_err());
        assert!("{}".parse::<ClassId>().is_err());
        assert!("{12345678-1234-1234-1234-1234567890}".parse::<ClassId>().is_err());
        assert!("\\path\\to\\plugin.so".parse::<ClassId>().is_err());
    }

    #[test]
    fn test_display_round_trips_braced_uppercase() {
        let literal = "{A1230201-1439-4E62-A414-190D0AC3D40E}";
        let class: ClassId = literal.to_lowercase().parse().unwrap();
        assert_eq!(class.to_string(), literal);
        assert_eq!(class.to_string().parse::<ClassId>().unwrap(), class);
    }

    #[test]
    fn test_well_known_iids_differ() {
        assert_ne!(IID_UNKNOWN, IID_CLASS_FACTORY);
        assert_ne!(IID_CLASS_FACTORY, IID_WTS_PLUGIN);
        assert_eq!(
            IID_CLASS_FACTORY.to_string(),
            "{00000001-0000-0000-C000-000000000046}"
        );
    }
}
