//! Resource engine
//!
//! Owns the profile, the script state, the process handle and the per-resource
//! runtime state. Each [`Engine::poll`] runs four phases in order:
//!
//! 1. reset check
//! 2. resolve every resource to its current value
//! 3. diff current against previous values, updating displayed values
//! 4. print the resources that carry a display map
//!
//! A poll works on a copy of the runtime state and commits it only when every
//! phase succeeded, so a failed poll leaves the engine as it was.

use crate::codec;
use crate::memory::{parse_chain, resolve_pointer_chain, ProcessMemory};
use crate::profile;
use crate::script::{ScriptBridge, ScriptFunction};
use crate::traits::MemoryAccess;
use kappa_common::{
    DisplayValue, Error, MemoryError, PointerWidth, Profile, ProfileError, ResourceDefinition,
    ResourceKind, Result, Scalar, SnapshotRow, Value,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace};

const RESET_FUNCTION: &str = "Reset";

/// Values carried between polls for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState {
    /// Value decoded or computed on the last successful poll
    pub previous: Value,
    /// Value shown to the user; an Int32 count for counters
    pub displayed: Value,
}

pub struct Engine {
    profile: Profile,
    scripts: ScriptBridge,
    functions: HashMap<String, ScriptFunction>,
    reset: Option<ScriptFunction>,
    /// Resource indices passed to `Reset`
    reset_indices: Vec<usize>,
    /// Resource indices passed to each Custom function, empty otherwise
    parameter_indices: Vec<Vec<usize>>,
    /// Parsed address chain per resource, empty for Custom
    chains: Vec<Vec<u64>>,
    memory: Option<Box<dyn MemoryAccess>>,
    states: Vec<ResourceState>,
}

fn counter_zero() -> Value {
    Value::Scalar(Scalar::Int32(0))
}

/// Map parameter keys to resource positions
fn indices_of(profile: &Profile, keys: &[String], owner: &str) -> Result<Vec<usize>> {
    keys.iter()
        .map(|key| {
            profile.position(key).ok_or_else(|| {
                Error::from(ProfileError::UnknownParameter {
                    parameter: key.clone(),
                    resource: owner.to_string(),
                })
            })
        })
        .collect()
}

impl Engine {
    /// Load a profile file and its script modules
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let loaded = profile::load_file(path)?;
        let scripts = ScriptBridge::load_modules(&loaded.script_paths)?;
        Self::new(loaded.profile, scripts)
    }

    /// Build an engine from a validated profile and a script state that
    /// already holds its modules. Every function the profile needs is
    /// resolved here.
    pub fn new(profile: Profile, scripts: ScriptBridge) -> Result<Self> {
        let mut functions = HashMap::new();
        for resource in &profile.resources {
            if resource.kind.needs_function() {
                functions.insert(resource.key.clone(), scripts.resolve(&resource.key)?);
            }
        }

        let (reset, reset_indices) = match &profile.reset_parameters {
            Some(keys) => (
                Some(scripts.resolve(RESET_FUNCTION)?),
                indices_of(&profile, keys, RESET_FUNCTION)?,
            ),
            None => (None, Vec::new()),
        };

        let parameter_indices = profile
            .resources
            .iter()
            .map(|resource| indices_of(&profile, &resource.parameters, &resource.key))
            .collect::<Result<Vec<_>>>()?;

        let chains = profile
            .resources
            .iter()
            .map(|resource| {
                parse_chain(&resource.address)
                    .map_err(|e| Error::from(e).in_resource(&resource.key))
            })
            .collect::<Result<Vec<_>>>()?;

        let states = profile
            .resources
            .iter()
            .map(|resource| {
                let zero = codec::default_value(&resource.data_type);
                ResourceState {
                    displayed: match resource.kind {
                        ResourceKind::Counter => counter_zero(),
                        _ => zero.clone(),
                    },
                    previous: zero,
                }
            })
            .collect();

        debug!(
            target: "kappa_core::engine",
            "Engine ready for {} with {} resources",
            profile.target,
            profile.resources.len()
        );

        Ok(Self {
            profile,
            scripts,
            functions,
            reset,
            reset_indices,
            parameter_indices,
            chains,
            memory: None,
            states,
        })
    }

    /// Attach to the profile's target if it is running. Returns whether the
    /// engine is attached afterwards.
    pub fn try_attach(&mut self) -> bool {
        if self.is_target_running() {
            return true;
        }
        match ProcessMemory::open(&self.profile.target) {
            Ok(process) => {
                debug!(
                    target: "kappa_core::engine",
                    "Found {} as PID {}",
                    process.name(),
                    process.pid()
                );
                self.attach(Box::new(process));
                true
            }
            Err(e) => {
                trace!(target: "kappa_core::engine", "Attach failed: {}", e);
                false
            }
        }
    }

    /// Use `memory` for all subsequent reads
    pub fn attach(&mut self, memory: Box<dyn MemoryAccess>) {
        debug!(target: "kappa_core::engine", "Attached to {}", self.profile.target);
        self.memory = Some(memory);
    }

    pub fn detach(&mut self) {
        self.memory = None;
    }

    /// Attached and the target has not exited
    pub fn is_target_running(&self) -> bool {
        self.memory.as_ref().map(|m| m.is_alive()).unwrap_or(false)
    }

    pub fn target_name(&self) -> &str {
        &self.profile.target
    }

    pub fn profile_version(&self) -> &semver::Version {
        &self.profile.version
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.profile.platform
    }

    /// Resource definitions in resolution order
    pub fn resources(&self) -> &[ResourceDefinition] {
        &self.profile.resources
    }

    pub fn state(&self, key: &str) -> Option<&ResourceState> {
        self.profile.position(key).map(|i| &self.states[i])
    }

    /// Run one poll cycle and return the rows to display, in profile order
    pub fn poll(&mut self) -> Result<Vec<SnapshotRow>> {
        let mut states = self.states.clone();

        self.check_reset(&mut states)?;
        let current = self.resolve_all(&states)?;
        self.apply_changes(&mut states, current)?;
        let rows = self.print(&states);

        self.states = states;
        Ok(rows)
    }

    fn check_reset(&self, states: &mut [ResourceState]) -> Result<()> {
        let Some(reset) = &self.reset else {
            return Ok(());
        };

        let args = displayed_of(states, &self.reset_indices);
        let fire = self
            .scripts
            .call(reset, &args)
            .map_err(Error::from)
            .and_then(|result| codec::truthy(&result).map_err(Error::from))
            .map_err(|e| e.in_resource(RESET_FUNCTION))?;

        if fire {
            debug!(target: "kappa_core::engine", "Reset fired, zeroing counters");
            for (resource, state) in self.profile.resources.iter().zip(states.iter_mut()) {
                if resource.kind == ResourceKind::Counter {
                    state.displayed = counter_zero();
                }
            }
        }
        Ok(())
    }

    fn resolve_all(&self, states: &[ResourceState]) -> Result<Vec<Value>> {
        self.profile
            .resources
            .iter()
            .enumerate()
            .map(|(i, resource)| {
                self.resolve(i, resource, states)
                    .map_err(|e| e.in_resource(&resource.key))
            })
            .collect()
    }

    fn resolve(
        &self,
        index: usize,
        resource: &ResourceDefinition,
        states: &[ResourceState],
    ) -> Result<Value> {
        match resource.kind {
            ResourceKind::Static | ResourceKind::Counter => {
                let memory = self.memory.as_deref().ok_or(MemoryError::NotAttached)?;
                let address =
                    resolve_pointer_chain(memory, &self.chains[index], self.profile.platform)?;
                let buffer = memory.read(address, codec::size(&resource.data_type))?;
                Ok(codec::decode(&resource.data_type, &buffer)?)
            }
            ResourceKind::Custom => {
                let function = self.function(&resource.key)?;
                let args = displayed_of(states, &self.parameter_indices[index]);
                let result = self.scripts.call(function, &args)?;
                Ok(codec::convert(&resource.data_type, &result)?)
            }
        }
    }

    fn function(&self, key: &str) -> Result<&ScriptFunction> {
        self.functions
            .get(key)
            .ok_or_else(|| Error::from(kappa_common::ScriptError::MissingFunction(key.to_string())))
    }

    fn apply_changes(&self, states: &mut [ResourceState], current: Vec<Value>) -> Result<()> {
        for ((resource, state), value) in self
            .profile
            .resources
            .iter()
            .zip(states.iter_mut())
            .zip(current)
        {
            if value != state.previous {
                match resource.kind {
                    ResourceKind::Counter => {
                        if self
                            .accepts_transition(resource, &state.previous, &value)
                            .map_err(|e| e.in_resource(&resource.key))?
                        {
                            state.displayed = increment(&state.displayed);
                            trace!(
                                target: "kappa_core::engine",
                                "{} -> {}",
                                resource.key,
                                state.displayed
                            );
                        }
                    }
                    ResourceKind::Static | ResourceKind::Custom => {
                        state.displayed = value.clone();
                    }
                }
            }
            state.previous = value;
        }
        Ok(())
    }

    fn accepts_transition(
        &self,
        resource: &ResourceDefinition,
        old: &Value,
        new: &Value,
    ) -> Result<bool> {
        let args = [
            codec::convert(&resource.data_type, old)?,
            codec::convert(&resource.data_type, new)?,
        ];
        let result = self.scripts.call(self.function(&resource.key)?, &args)?;
        Ok(codec::truthy(&result)?)
    }

    fn print(&self, states: &[ResourceState]) -> Vec<SnapshotRow> {
        self.profile
            .resources
            .iter()
            .zip(states)
            .filter_map(|(resource, state)| {
                let display = resource.display.as_ref()?;
                let value = match display.lookup(&state.displayed.to_string()) {
                    Some(label) => DisplayValue::Label(label.to_string()),
                    None => DisplayValue::Raw(state.displayed.clone()),
                };
                Some(SnapshotRow {
                    label: resource.name.clone(),
                    value,
                })
            })
            .collect()
    }
}

fn increment(count: &Value) -> Value {
    match count {
        Value::Scalar(Scalar::Int32(n)) => Value::Scalar(Scalar::Int32(n.wrapping_add(1))),
        _ => Value::Scalar(Scalar::Int32(1)),
    }
}

fn displayed_of(states: &[ResourceState], indices: &[usize]) -> Vec<Value> {
    indices.iter().map(|&i| states[i].displayed.clone()).collect()
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("target", &self.profile.target)
            .field("resources", &self.profile.resources.len())
            .field("attached", &self.memory.is_some())
            .finish()
    }
}
