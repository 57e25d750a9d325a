//! Synthesis context
//!
//! [`App`] owns every scope, function policy and construct of one synthesis
//! pass. Units are registered in order; a unit may only reference resources
//! of units registered (and populated) before the reference is resolved.

use crate::error::{CrossUnitReferenceError, SynthError, SynthResult, UnitRenderedError};
use crate::permissions::{
    AwsEnv, PermissionDescriptor, Permissions, PolicyOptions, ResourceHandle, ResourceKind,
    ResourcePolicy,
};
use crate::props::{FunctionProps, LayerRef, merge_props};
use crate::scope::{LayerArena, LayerBinding, ScopeDefaults, UnitInfo};
use crate::synth::construct::Construct;
use crate::synth::output::{FunctionOutput, SynthOutput, UnitOutput};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

/// Index of a function within its [`App`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionId(pub(crate) usize);

/// Index of a compound construct within its [`App`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConstructId(pub(crate) usize);

/// A constructed function: merged config plus its access policy
#[derive(Debug)]
pub struct FunctionRecord {
    pub(crate) unit: String,
    pub(crate) id: String,
    pub(crate) handle: ResourceHandle,
    pub(crate) config: FunctionProps,
    pub(crate) layers: Vec<(LayerRef, LayerBinding)>,
    pub(crate) policy: ResourcePolicy,
}

impl FunctionRecord {
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Final configuration after the defaults cascade
    pub fn config(&self) -> &FunctionProps {
        &self.config
    }

    pub fn layers(&self) -> &[(LayerRef, LayerBinding)] {
        &self.layers
    }

    pub fn policy(&self) -> &ResourcePolicy {
        &self.policy
    }
}

/// Anything registered under a logical id in a unit
#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Resource(ResourceHandle),
    Function(FunctionId),
    Construct(ConstructId),
}

#[derive(Debug)]
pub(crate) struct Unit {
    pub(crate) info: UnitInfo,
    pub(crate) defaults: ScopeDefaults,
    pub(crate) entries: IndexMap<String, Entry>,
    /// Local ids referenced from other units
    pub(crate) exports: BTreeSet<String>,
    /// `unit/id` of resources referenced from other units
    pub(crate) imports: BTreeSet<String>,
    pub(crate) rendered: bool,
}

/// One synthesis pass over an application
pub struct App {
    pub(crate) name: String,
    pub(crate) stage: String,
    pub(crate) env: AwsEnv,
    pub(crate) options: PolicyOptions,
    pub(crate) defaults: ScopeDefaults,
    pub(crate) units: IndexMap<String, Unit>,
    pub(crate) functions: Vec<FunctionRecord>,
    pub(crate) constructs: Vec<Construct>,
    pub(crate) layers: LayerArena,
}

impl App {
    pub fn new(name: impl Into<String>, stage: impl Into<String>, env: AwsEnv) -> Self {
        let name = name.into();
        Self {
            defaults: ScopeDefaults::new(format!("app '{}'", name)),
            name,
            stage: stage.into(),
            env,
            options: PolicyOptions::default(),
            units: IndexMap::new(),
            functions: Vec::new(),
            constructs: Vec::new(),
            layers: LayerArena::new(),
        }
    }

    pub fn with_options(mut self, options: PolicyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn env(&self) -> &AwsEnv {
        &self.env
    }

    pub fn options(&self) -> PolicyOptions {
        self.options
    }

    /// App-level defaults, applied to every unit
    pub fn defaults(&self) -> &ScopeDefaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut ScopeDefaults {
        &mut self.defaults
    }

    /// Register a deployment unit
    pub fn add_unit(&mut self, name: &str) -> SynthResult<&UnitInfo> {
        if self.units.contains_key(name) {
            return Err(SynthError::DuplicateResource {
                unit: self.name.clone(),
                id: name.to_string(),
            });
        }

        let info = UnitInfo::new(&self.name, &self.stage, name, &self.env);
        debug!(unit = name, stack = %info.stack_name(), "Adding unit");

        let unit = Unit {
            defaults: ScopeDefaults::new(format!("unit '{}'", name)),
            info,
            entries: IndexMap::new(),
            exports: BTreeSet::new(),
            imports: BTreeSet::new(),
            rendered: false,
        };
        let entry = self.units.entry(name.to_string()).or_insert(unit);
        Ok(&entry.info)
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitInfo> {
        self.units.values().map(|u| &u.info)
    }

    pub fn unit_info(&self, unit: &str) -> SynthResult<&UnitInfo> {
        self.unit(unit).map(|u| &u.info)
    }

    pub fn unit_defaults(&self, unit: &str) -> SynthResult<&ScopeDefaults> {
        self.unit(unit).map(|u| &u.defaults)
    }

    /// Unit-level defaults; rejected once the unit has been rendered
    pub fn unit_defaults_mut(&mut self, unit: &str) -> SynthResult<&mut ScopeDefaults> {
        self.ensure_unrendered(unit)?;
        self.unit_mut(unit).map(|u| &mut u.defaults)
    }

    pub fn is_rendered(&self, unit: &str) -> SynthResult<bool> {
        self.unit(unit).map(|u| u.rendered)
    }

    pub(crate) fn unit(&self, unit: &str) -> SynthResult<&Unit> {
        self.units
            .get(unit)
            .ok_or_else(|| SynthError::UnknownUnit(unit.to_string()))
    }

    pub(crate) fn unit_mut(&mut self, unit: &str) -> SynthResult<&mut Unit> {
        self.units
            .get_mut(unit)
            .ok_or_else(|| SynthError::UnknownUnit(unit.to_string()))
    }

    /// New entries may only land in units that have not been rendered yet
    pub(crate) fn ensure_unrendered(&self, unit: &str) -> SynthResult<()> {
        if self.unit(unit)?.rendered {
            return Err(UnitRenderedError::new(unit).into());
        }
        Ok(())
    }

    pub(crate) fn ensure_free(&self, unit: &str, id: &str) -> SynthResult<()> {
        self.ensure_unrendered(unit)?;
        if self.unit(unit)?.entries.contains_key(id) {
            return Err(SynthError::DuplicateResource {
                unit: unit.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn insert_entry(&mut self, unit: &str, id: &str, entry: Entry) -> SynthResult<()> {
        self.unit_mut(unit)?.entries.insert(id.to_string(), entry);
        Ok(())
    }

    /// Register a plain resource whose physical name follows the unit prefix.
    ///
    /// Plain resources never read the defaults and do not lock any scope.
    pub fn add_resource(
        &mut self,
        unit: &str,
        kind: ResourceKind,
        id: &str,
    ) -> SynthResult<ResourceHandle> {
        let name = self.unit(unit)?.info.logical_prefixed_name(id);
        let handle = ResourceHandle::new(&self.env, kind, id, &name);
        self.add_handle(unit, handle)
    }

    /// Register an existing handle (imported by ARN, or carrying extra identity)
    pub fn add_handle(&mut self, unit: &str, handle: ResourceHandle) -> SynthResult<ResourceHandle> {
        self.ensure_free(unit, &handle.id)?;
        debug!(unit, id = %handle.id, kind = %handle.kind, arn = handle.arn(), "Adding resource");
        self.insert_entry(unit, &handle.id.clone(), Entry::Resource(handle.clone()))?;
        Ok(handle)
    }

    /// Run the defaults cascade for a function in `unit`:
    /// app ⊕ unit ⊕ resource defaults ⊕ inline
    pub fn resolve_config(
        &self,
        unit: &str,
        resource_defaults: Option<&FunctionProps>,
        inline: &FunctionProps,
    ) -> SynthResult<FunctionProps> {
        let unit = self.unit(unit)?;
        let app = self.defaults.snapshot(&unit.info);
        let scoped = unit.defaults.snapshot(&unit.info);

        let mut config = merge_props(&app, &scoped);
        if let Some(resource_defaults) = resource_defaults {
            config = merge_props(&config, resource_defaults);
        }
        Ok(merge_props(&config, inline))
    }

    /// Construct a function from inline props
    pub fn add_function(
        &mut self,
        unit: &str,
        id: &str,
        props: &FunctionProps,
    ) -> SynthResult<FunctionId> {
        self.build_function(unit, id, None, props)
    }

    pub(crate) fn build_function(
        &mut self,
        unit: &str,
        id: &str,
        resource_defaults: Option<&FunctionProps>,
        inline: &FunctionProps,
    ) -> SynthResult<FunctionId> {
        self.ensure_free(unit, id)?;
        let config = self.resolve_config(unit, resource_defaults, inline)?;

        let name = self.unit(unit)?.info.logical_prefixed_name(id);
        let handle = ResourceHandle::new(&self.env, ResourceKind::Function, id, &name);

        let mut policy = ResourcePolicy::new(unit, id, self.options);
        if let Some(permissions) = &config.permissions {
            policy.attach(permissions)?;
        }
        if let Some(bind) = config.bind.as_ref().filter(|bind| !bind.is_empty()) {
            let bound = bind.iter().cloned().map(PermissionDescriptor::Resource).collect();
            policy.attach(&Permissions::List(bound))?;
        }

        // Nothing below can fail
        let layers = self
            .layers
            .bind_all(unit, config.layers.as_deref().unwrap_or_default());
        self.defaults.lock(&format!("{}/{}", unit, id));
        self.unit_mut(unit)?.defaults.lock(id);

        let fid = FunctionId(self.functions.len());
        info!(
            unit,
            function = id,
            statements = policy.len(),
            layers = layers.len(),
            "Constructed function"
        );
        self.functions.push(FunctionRecord {
            unit: unit.to_string(),
            id: id.to_string(),
            handle,
            config,
            layers,
            policy,
        });
        self.insert_entry(unit, id, Entry::Function(fid))?;
        Ok(fid)
    }

    /// # Panics
    ///
    /// Panics if `fid` was returned by a different [`App`].
    pub fn function(&self, fid: FunctionId) -> &FunctionRecord {
        &self.functions[fid.0]
    }

    pub(crate) fn checked_function(&self, fid: FunctionId) -> SynthResult<&FunctionRecord> {
        self.functions
            .get(fid.0)
            .ok_or_else(|| SynthError::UnknownId(format!("function #{}", fid.0)))
    }

    pub(crate) fn function_mut(&mut self, fid: FunctionId) -> SynthResult<&mut FunctionRecord> {
        self.functions
            .get_mut(fid.0)
            .ok_or_else(|| SynthError::UnknownId(format!("function #{}", fid.0)))
    }

    /// Look up a function by logical id
    pub fn function_id(&self, unit: &str, id: &str) -> Option<FunctionId> {
        match self.units.get(unit)?.entries.get(id)? {
            Entry::Function(fid) => Some(*fid),
            _ => None,
        }
    }

    /// Resolve `permissions` and append them to the function's policy
    pub fn attach_permissions(
        &mut self,
        fid: FunctionId,
        permissions: &Permissions,
    ) -> SynthResult<usize> {
        self.function_mut(fid)?.policy.attach(permissions)
    }

    /// Resolve a reference from `from_unit` to resource `id` of `unit`.
    ///
    /// Cross-unit references are recorded in the export table of `unit` and
    /// the import table of `from_unit`.
    pub fn reference(&mut self, from_unit: &str, unit: &str, id: &str) -> SynthResult<ResourceHandle> {
        self.unit(from_unit)?;

        let handle = self
            .units
            .get(unit)
            .and_then(|u| u.entries.get(id))
            .map(|entry| self.entry_handle(entry))
            .ok_or_else(|| CrossUnitReferenceError::new(unit, id, from_unit))?;

        if from_unit != unit {
            self.record_import(from_unit, unit, id)?;
        }
        Ok(handle)
    }

    pub(crate) fn record_import(&mut self, from_unit: &str, unit: &str, id: &str) -> SynthResult<()> {
        let exported = self.unit_mut(unit)?.exports.insert(id.to_string());
        self.unit_mut(from_unit)?
            .imports
            .insert(format!("{}/{}", unit, id));
        if exported {
            debug!(unit, resource = id, importer = from_unit, "Exported resource");
        }
        Ok(())
    }

    pub(crate) fn entry_handle(&self, entry: &Entry) -> ResourceHandle {
        match entry {
            Entry::Resource(handle) => handle.clone(),
            Entry::Function(fid) => self.functions[fid.0].handle.clone(),
            Entry::Construct(cid) => self.constructs[cid.0].handle.clone(),
        }
    }

    /// Render one unit and freeze every policy it owns
    pub fn render_unit(&mut self, unit: &str) -> SynthResult<UnitOutput> {
        let state = self.unit(unit)?;
        let info = state.info.clone();
        let resources = state
            .entries
            .values()
            .filter_map(|entry| match entry {
                Entry::Resource(handle) => Some(handle.clone()),
                _ => None,
            })
            .collect();
        let exports = state.exports.iter().cloned().collect();
        let imports = state.imports.iter().cloned().collect();

        let functions: Vec<FunctionOutput> = self
            .functions
            .iter_mut()
            .filter(|record| record.unit == unit)
            .map(|record| {
                let statements = record.policy.render();
                FunctionOutput::new(record, &statements)
            })
            .collect();

        let constructs = self
            .constructs
            .iter()
            .filter(|construct| construct.unit == unit)
            .map(|construct| construct.output(&self.functions))
            .collect();

        let layers = self.layers.exports(unit);
        let layer_imports = self.layers.imports(unit);

        self.unit_mut(unit)?.rendered = true;
        info!(unit, functions = functions.len(), "Rendered unit");

        Ok(UnitOutput::new(
            &info,
            resources,
            functions,
            constructs,
            exports,
            imports,
            layers,
            layer_imports,
        ))
    }

    /// Render every unit in registration order
    pub fn synthesize(&mut self) -> SynthResult<SynthOutput> {
        let names: Vec<String> = self.units.keys().cloned().collect();
        let units = names
            .iter()
            .map(|name| self.render_unit(name))
            .collect::<SynthResult<Vec<_>>>()?;

        info!(app = %self.name, stage = %self.stage, units = units.len(), "Synthesized app");
        Ok(SynthOutput {
            app: self.name.clone(),
            stage: self.stage.clone(),
            region: self.env.region.clone(),
            account: self.env.account.clone(),
            units,
        })
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("env", &self.env)
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.len())
            .field("constructs", &self.constructs.len())
            .finish()
    }
}
