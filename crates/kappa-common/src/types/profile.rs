//! Profile model
//!
//! A profile names the target process and lists the resources to track, in
//! the order they are resolved and displayed.

use super::data_type::TypeDescriptor;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Read from memory, shown as-is
    Static,
    /// Counts accepted transitions between successive readings
    Counter,
    /// Computed by a script function from other resources
    Custom,
}

impl ResourceKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Static" => Some(ResourceKind::Static),
            "Counter" => Some(ResourceKind::Counter),
            "Custom" => Some(ResourceKind::Custom),
            _ => None,
        }
    }

    /// Whether the resource is read from process memory
    pub fn reads_memory(self) -> bool {
        matches!(self, ResourceKind::Static | ResourceKind::Counter)
    }

    /// Whether a script function named after the resource is required
    pub fn needs_function(self) -> bool {
        matches!(self, ResourceKind::Counter | ResourceKind::Custom)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Static => "Static",
            ResourceKind::Counter => "Counter",
            ResourceKind::Custom => "Custom",
        };
        f.write_str(name)
    }
}

/// Pointer width of the target process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub fn from_bits(bits: i64) -> Option<Self> {
        match bits {
            32 => Some(PointerWidth::Bits32),
            64 => Some(PointerWidth::Bits64),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            PointerWidth::Bits32 => 32,
            PointerWidth::Bits64 => 64,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Raw value text to label, kept in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayMap {
    entries: Vec<(String, String)>,
}

impl DisplayMap {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label for a stringified value. An exact key wins; otherwise the first
    /// key in document order that matches ignoring ASCII case.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| self.entries.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)))
            .map(|(_, label)| label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    /// Unique key, also the name of the resource's script function
    pub key: String,
    /// Display label
    pub name: String,
    pub kind: ResourceKind,
    pub data_type: TypeDescriptor,
    pub description: Option<String>,
    /// Hex offsets, required for Static and Counter
    pub address: Vec<String>,
    /// Resource keys passed to the script function, required for Custom
    pub parameters: Vec<String>,
    /// Presence (even empty) means the resource is emitted in snapshots
    pub display: Option<DisplayMap>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub version: semver::Version,
    pub target: String,
    pub platform: PointerWidth,
    /// Script paths as written, relative to the profile directory
    pub imports: Vec<String>,
    /// `Some` when a `Reset` object is present
    pub reset_parameters: Option<Vec<String>>,
    /// In document order
    pub resources: Vec<ResourceDefinition>,
}

impl Profile {
    pub fn position(&self, key: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.key == key)
    }
}

/// A validated profile together with its script modules resolved against the
/// profile's directory.
#[derive(Debug, Clone)]
pub struct LoadedProfile {
    pub profile: Profile,
    pub script_paths: Vec<PathBuf>,
}
