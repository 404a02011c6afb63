//! Profile loading and validation
//!
//! Profiles are JSON objects read in document order. Reserved top-level keys
//! carry metadata; every other key defines a resource. Loading fails closed:
//! either a fully validated [`Profile`] comes back or a [`ProfileError`].

use crate::memory::parse_offset;
use kappa_common::{
    DisplayMap, LoadedProfile, PointerWidth, Profile, ProfileError, ResourceDefinition,
    ResourceKind, TypeDescriptor,
};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

const VERSION: &str = "Version";
const TARGET: &str = "Target";
const PLATFORM: &str = "Platform";
const IMPORT: &str = "Import";
const RESET: &str = "Reset";

const PROFILE_SCOPE: &str = "profile";

/// JSON tree that keeps object entries in document order, duplicates included
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::UInt(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Node>()? {
            entries.push((key, value));
        }
        Ok(Node::Object(entries))
    }
}

impl Node {
    /// Text form of a scalar node, as a display map or platform would accept it
    fn scalar_text(&self) -> Option<String> {
        match self {
            Node::String(s) => Some(s.clone()),
            Node::Bool(b) => Some(b.to_string()),
            Node::Int(i) => Some(i.to_string()),
            Node::UInt(u) => Some(u.to_string()),
            Node::Float(f) => Some(f.to_string()),
            _ => None,
        }
    }
}

fn invalid(field: &str, scope: &str) -> ProfileError {
    ProfileError::InvalidField {
        field: field.to_string(),
        scope: scope.to_string(),
    }
}

fn object<'a>(
    node: &'a Node,
    field: &str,
    scope: &str,
) -> Result<&'a [(String, Node)], ProfileError> {
    let Node::Object(entries) = node else {
        return Err(invalid(field, scope));
    };
    let mut seen = HashSet::new();
    for (key, _) in entries {
        if !seen.insert(key.as_str()) {
            return Err(ProfileError::DuplicateKey(key.clone()));
        }
    }
    Ok(entries)
}

fn string(node: &Node, field: &str, scope: &str) -> Result<String, ProfileError> {
    match node {
        Node::String(s) => Ok(s.clone()),
        _ => Err(invalid(field, scope)),
    }
}

fn string_list(node: &Node, field: &str, scope: &str) -> Result<Vec<String>, ProfileError> {
    let Node::Array(items) = node else {
        return Err(invalid(field, scope));
    };
    items.iter().map(|item| string(item, field, scope)).collect()
}

fn string_map(node: &Node, field: &str, scope: &str) -> Result<DisplayMap, ProfileError> {
    let entries = object(node, field, scope)?
        .iter()
        .map(|(key, value)| {
            value
                .scalar_text()
                .map(|text| (key.clone(), text))
                .ok_or_else(|| invalid(field, scope))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DisplayMap::new(entries))
}

/// Parse and validate profile text. Script imports are resolved against
/// `base_dir`.
pub fn load(raw: &str, base_dir: &Path) -> Result<LoadedProfile, ProfileError> {
    let root: Node = serde_json::from_str(raw).map_err(|e| ProfileError::Syntax(e.to_string()))?;
    let Node::Object(_) = root else {
        return Err(ProfileError::NotAnObject);
    };
    let entries = object(&root, "root", PROFILE_SCOPE)?;

    let resource_keys: HashSet<&str> = entries
        .iter()
        .map(|(key, _)| key.as_str())
        .filter(|key| !is_reserved(key))
        .collect();

    let mut version = None;
    let mut target = None;
    let mut platform = None;
    let mut imports = None;
    let mut reset_parameters = None;
    let mut resources = Vec::new();
    let mut errors = Vec::new();

    for (key, node) in entries {
        let outcome = match key.as_str() {
            VERSION => string(node, VERSION, PROFILE_SCOPE)
                .and_then(|raw| parse_version(&raw))
                .map(|v| version = Some(v)),
            TARGET => string(node, TARGET, PROFILE_SCOPE).map(|t| target = Some(t)),
            PLATFORM => parse_platform(node).map(|p| platform = Some(p)),
            IMPORT => string_list(node, IMPORT, PROFILE_SCOPE).map(|i| imports = Some(i)),
            RESET => parse_reset(node).map(|r| reset_parameters = Some(r)),
            _ => parse_resource(key, node)
                .and_then(|resource| check_parameters(&resource, &resource_keys).map(|_| resource))
                .map(|resource| resources.push(resource)),
        };
        if let Err(err) = outcome {
            debug!(target: "kappa_core::profile", "Rejected \"{}\": {}", key, err);
            errors.push(err);
        }
    }

    match errors.len() {
        0 => {}
        1 => return Err(errors.remove(0)),
        _ => return Err(ProfileError::Many(errors)),
    }

    let version = version.ok_or(ProfileError::MissingVersion)?;
    let target = target.ok_or(ProfileError::MissingTarget)?;
    let platform = platform.ok_or(ProfileError::MissingPlatform)?;
    let imports: Vec<String> = imports.ok_or(ProfileError::MissingImport)?;

    if let Some(parameters) = &reset_parameters {
        for parameter in parameters {
            if !resource_keys.contains(parameter.as_str()) {
                return Err(ProfileError::UnknownParameter {
                    parameter: parameter.clone(),
                    resource: RESET.to_string(),
                });
            }
        }
    }

    let script_paths = imports.iter().map(|import| base_dir.join(import)).collect();

    debug!(
        target: "kappa_core::profile",
        "Loaded profile for {} v{} ({} resources)",
        target,
        version,
        resources.len()
    );

    Ok(LoadedProfile {
        profile: Profile {
            version,
            target,
            platform,
            imports,
            reset_parameters,
            resources,
        },
        script_paths,
    })
}

/// Read and validate a profile file; imports resolve against its directory
pub fn load_file(path: impl AsRef<Path>) -> Result<LoadedProfile, ProfileError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| ProfileError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load(&raw, base_dir)
}

fn is_reserved(key: &str) -> bool {
    matches!(key, VERSION | TARGET | PLATFORM | IMPORT | RESET)
}

/// `major.minor` is accepted and read as `major.minor.0`
fn parse_version(raw: &str) -> Result<semver::Version, ProfileError> {
    let trimmed = raw.trim();
    let normalised = if trimmed.split('.').count() == 2 {
        format!("{}.0", trimmed)
    } else {
        trimmed.to_string()
    };
    semver::Version::parse(&normalised).map_err(|_| ProfileError::InvalidVersion(raw.to_string()))
}

fn parse_platform(node: &Node) -> Result<PointerWidth, ProfileError> {
    let bits = match node {
        Node::Int(i) => Some(*i),
        Node::UInt(u) => i64::try_from(*u).ok(),
        Node::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    bits.and_then(PointerWidth::from_bits).ok_or_else(|| {
        ProfileError::InvalidPlatform(node.scalar_text().unwrap_or_else(|| "?".to_string()))
    })
}

fn parse_reset(node: &Node) -> Result<Vec<String>, ProfileError> {
    let entries = object(node, RESET, PROFILE_SCOPE)?;
    let parameters = entries
        .iter()
        .find(|(key, _)| key == "Parameters")
        .ok_or(ProfileError::MissingResetParameters)?;
    string_list(&parameters.1, "Parameters", RESET)
}

fn parse_resource(key: &str, node: &Node) -> Result<ResourceDefinition, ProfileError> {
    let entries = object(node, key, PROFILE_SCOPE)?;

    let mut name = None;
    let mut description = None;
    let mut data_type = None;
    let mut kind = None;
    let mut address = None;
    let mut display = None;
    let mut parameters = None;

    for (attribute, value) in entries {
        match attribute.as_str() {
            "Name" => name = Some(string(value, attribute, key)?),
            "Description" => description = Some(string(value, attribute, key)?),
            "DataType" => data_type = Some(string(value, attribute, key)?),
            "Type" => kind = Some(string(value, attribute, key)?),
            "Address" => address = Some(string_list(value, attribute, key)?),
            "Display" => display = Some(string_map(value, attribute, key)?),
            "Parameters" => parameters = Some(string_list(value, attribute, key)?),
            _ => {
                return Err(ProfileError::UnknownAttribute {
                    attribute: attribute.clone(),
                    resource: key.to_string(),
                })
            }
        }
    }

    let name = name.ok_or_else(|| ProfileError::MissingName(key.to_string()))?;
    let data_type = data_type.ok_or_else(|| ProfileError::MissingDataType(key.to_string()))?;
    let kind_name = kind.ok_or_else(|| ProfileError::MissingType(key.to_string()))?;
    let kind =
        ResourceKind::from_name(&kind_name).ok_or_else(|| ProfileError::UnknownResourceType {
            value: kind_name.clone(),
            resource: key.to_string(),
        })?;
    if kind.reads_memory() && address.is_none() {
        return Err(ProfileError::MissingAddress(key.to_string()));
    }
    if kind == ResourceKind::Custom && parameters.is_none() {
        return Err(ProfileError::MissingParameters(key.to_string()));
    }

    let data_type: TypeDescriptor =
        data_type
            .parse()
            .map_err(|source| ProfileError::InvalidDataType {
                resource: key.to_string(),
                source,
            })?;

    let address = address.unwrap_or_default();
    if kind.reads_memory() && address.is_empty() {
        return Err(invalid("Address", key));
    }
    for offset in &address {
        parse_offset(offset).map_err(|_| ProfileError::InvalidOffset {
            offset: offset.clone(),
            resource: key.to_string(),
        })?;
    }

    Ok(ResourceDefinition {
        key: key.to_string(),
        name,
        kind,
        data_type,
        description,
        address,
        parameters: parameters.unwrap_or_default(),
        display,
    })
}

fn check_parameters(
    resource: &ResourceDefinition,
    keys: &HashSet<&str>,
) -> Result<(), ProfileError> {
    match resource
        .parameters
        .iter()
        .find(|parameter| !keys.contains(parameter.as_str()))
    {
        Some(parameter) => Err(ProfileError::UnknownParameter {
            parameter: parameter.clone(),
            resource: resource.key.clone(),
        }),
        None => Ok(()),
    }
}
