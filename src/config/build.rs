//! Manifest -> App
//!
//! Units are built in manifest order. Within a unit: resources, unit
//! defaults, functions, constructs, extensions of earlier constructs, then
//! attachments. Each unit is rendered as soon as it is built, so a later unit
//! can no longer change the policies of an earlier one.

use crate::config::types::{
    AttachManifest, ConstructManifest, DefaultsManifest, Manifest, ResourceManifest,
    SubResourceManifest, UnitManifest,
};
use crate::error::{CrossUnitReferenceError, SynthError, SynthResult, UnsupportedPermissionError};
use crate::permissions::{PermissionDescriptor, Permissions, PolicyOptions, ResourceHandle};
use crate::props::FunctionProps;
use crate::synth::{App, FunctionDefinition};
use serde_json::Value;
use tracing::debug;

/// Build every unit of `manifest` into a fresh [`App`]
pub fn build_app(manifest: &Manifest) -> SynthResult<App> {
    let options = PolicyOptions {
        dedupe_statements: manifest.app.dedupe_statements,
    };
    let mut app = App::new(&manifest.app.name, &manifest.app.stage, manifest.app.env())
        .with_options(options);

    if !manifest.defaults.is_empty() {
        let mut props = manifest.defaults.props.clone();
        if let Some(permissions) = &manifest.defaults.permissions {
            props.permissions = Some(Permissions::from_value(permissions)?);
        }
        app.defaults_mut().set_defaults(props)?;
    }

    for unit in &manifest.units {
        build_unit(&mut app, unit)?;
        app.render_unit(&unit.name)?;
    }

    Ok(app)
}

fn build_unit(app: &mut App, unit: &UnitManifest) -> SynthResult<()> {
    let name = unit.name.as_str();
    app.add_unit(name)?;

    for resource in &unit.resources {
        add_resource(app, name, resource)?;
    }

    if !unit.defaults.is_empty() {
        let props = resolve_body(app, name, &unit.defaults)?;
        app.unit_defaults_mut(name)?.set_defaults(props)?;
    }

    for function in &unit.functions {
        let props = resolve_body(app, name, &function.body)?;
        app.add_function(name, &function.id, &props)?;
    }

    for construct in &unit.constructs {
        add_construct(app, name, construct)?;
    }

    for extend in &unit.extend {
        let cid = app
            .construct_id(&extend.unit, &extend.construct)
            .ok_or_else(|| CrossUnitReferenceError::new(&extend.unit, &extend.construct, name))?;
        let definition = resolve_definition(app, name, &extend.target)?;
        app.add_sub_resource(name, cid, &extend.key, definition)?;
    }

    for attach in &unit.attach {
        apply_attach(app, name, attach)?;
    }

    debug!(unit = name, "Built unit");
    Ok(())
}

fn add_resource(app: &mut App, unit: &str, resource: &ResourceManifest) -> SynthResult<()> {
    let mut handle = match &resource.arn {
        Some(arn) => ResourceHandle::imported(resource.kind, &resource.id, arn),
        None => {
            let name = app.unit_info(unit)?.logical_prefixed_name(&resource.id);
            ResourceHandle::new(app.env(), resource.kind, &resource.id, &name)
        }
    };
    if let Some(secret) = &resource.secret_arn {
        handle = handle.with_secret(secret);
    }
    if let Some(key) = &resource.key_arn {
        handle = handle.with_key(key);
    }
    app.add_handle(unit, handle)?;
    Ok(())
}

fn add_construct(app: &mut App, unit: &str, construct: &ConstructManifest) -> SynthResult<()> {
    let defaults = construct
        .defaults
        .function
        .as_ref()
        .map(|body| resolve_body(app, unit, body))
        .transpose()?;

    let cid = app.add_construct(unit, &construct.id, construct.kind, defaults)?;

    if let Some(permissions) = &construct.permissions {
        let permissions = resolve_permissions(app, unit, permissions)?;
        app.attach_permissions_to_construct(cid, &permissions)?;
    }

    for (key, target) in &construct.routes {
        let definition = resolve_definition(app, unit, target)?;
        app.add_sub_resource(unit, cid, key, definition)?;
    }
    Ok(())
}

fn apply_attach(app: &mut App, unit: &str, attach: &AttachManifest) -> SynthResult<()> {
    let target_unit = attach.unit.as_deref().unwrap_or(unit);
    let permissions = resolve_permissions(app, unit, &attach.permissions)?;

    if let Some(function) = &attach.function {
        let fid = app
            .function_id(target_unit, function)
            .ok_or_else(|| CrossUnitReferenceError::new(target_unit, function, unit))?;
        app.attach_permissions(fid, &permissions)?;
    } else if let Some(construct) = &attach.construct {
        let cid = app
            .construct_id(target_unit, construct)
            .ok_or_else(|| CrossUnitReferenceError::new(target_unit, construct, unit))?;
        match &attach.key {
            Some(key) => {
                app.attach_permissions_to(cid, key, &permissions)?;
            }
            None => app.attach_permissions_to_construct(cid, &permissions)?,
        }
    } else {
        return Err(SynthError::MissingAttachTarget(unit.to_string()));
    }
    Ok(())
}

fn resolve_definition(
    app: &mut App,
    unit: &str,
    target: &SubResourceManifest,
) -> SynthResult<FunctionDefinition> {
    Ok(match target {
        SubResourceManifest::Handler(handler) => FunctionDefinition::Props(FunctionProps {
            handler: Some(handler.clone()),
            ..Default::default()
        }),
        SubResourceManifest::Existing {
            function,
            unit: target_unit,
        } => {
            let target_unit = target_unit.as_deref().unwrap_or(unit);
            let fid = app
                .function_id(target_unit, function)
                .ok_or_else(|| CrossUnitReferenceError::new(target_unit, function, unit))?;
            FunctionDefinition::Existing(fid)
        }
        SubResourceManifest::Props(body) => FunctionDefinition::Props(resolve_body(app, unit, body)?),
    })
}

/// Function props with manifest references resolved from `unit`
fn resolve_body(app: &mut App, unit: &str, body: &DefaultsManifest) -> SynthResult<FunctionProps> {
    let mut props = body.props.clone();
    if let Some(permissions) = &body.permissions {
        props.permissions = Some(resolve_permissions(app, unit, permissions)?);
    }
    if let Some(bind) = &body.bind {
        props.bind = Some(resolve_bind(app, unit, bind)?);
    }
    Ok(props)
}

/// Resolve a `bind` list of `{ resource = ... }` references
fn resolve_bind(app: &mut App, unit: &str, value: &Value) -> SynthResult<Vec<ResourceHandle>> {
    let items = value.as_array().ok_or_else(|| {
        UnsupportedPermissionError::new(value.to_string(), "bind expects a list of resource references")
    })?;

    items
        .iter()
        .map(|item| -> SynthResult<ResourceHandle> {
            let resource = item.get("resource").and_then(Value::as_str).ok_or_else(|| {
                UnsupportedPermissionError::new(item.to_string(), "bind entries must name a resource")
            })?;
            let target_unit = item.get("unit").and_then(Value::as_str).unwrap_or(unit);
            app.reference(unit, target_unit, resource)
        })
        .collect()
}

/// Parse a permission list, resolving `{ resource = ... }` references
pub fn resolve_permissions(app: &mut App, unit: &str, value: &Value) -> SynthResult<Permissions> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_descriptor(app, unit, item))
            .collect::<SynthResult<Vec<_>>>()
            .map(Permissions::List),
        other => Ok(Permissions::from_value(other)?),
    }
}

fn resolve_descriptor(app: &mut App, unit: &str, item: &Value) -> SynthResult<PermissionDescriptor> {
    let Some(resource) = item.get("resource").and_then(Value::as_str) else {
        return Ok(PermissionDescriptor::from_value(item)?);
    };

    let target_unit = item.get("unit").and_then(Value::as_str).unwrap_or(unit);
    let handle = app.reference(unit, target_unit, resource)?;

    Ok(match item.get("grant").and_then(Value::as_str) {
        Some(method) => PermissionDescriptor::grant(handle, method),
        None => PermissionDescriptor::Resource(handle),
    })
}
