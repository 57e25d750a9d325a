//! Rendered object graph
//!
//! The output of a synthesis pass, serializable to JSON. Policies are
//! rendered as IAM-style policy documents.

use crate::permissions::{Effect, GrantRecord, ResourceHandle};
use crate::props::{FunctionProps, LayerRef};
use crate::scope::{LayerBinding, UnitInfo};
use crate::synth::app::FunctionRecord;
use crate::synth::construct::ConstructKind;
use serde::Serialize;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Serialize)]
pub struct SynthOutput {
    pub app: String,
    pub stage: String,
    pub region: String,
    pub account: String,
    pub units: Vec<UnitOutput>,
}

impl SynthOutput {
    pub fn unit(&self, name: &str) -> Option<&UnitOutput> {
        self.units.iter().find(|u| u.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutput {
    pub name: String,
    pub stack_name: String,
    pub resources: Vec<ResourceHandle>,
    pub functions: Vec<FunctionOutput>,
    pub constructs: Vec<ConstructOutput>,
    /// Local ids referenced by other units
    pub exports: Vec<String>,
    /// `unit/id` references into other units
    pub imports: Vec<String>,
    pub layers: LayerTable,
}

impl UnitOutput {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        info: &UnitInfo,
        resources: Vec<ResourceHandle>,
        functions: Vec<FunctionOutput>,
        constructs: Vec<ConstructOutput>,
        exports: Vec<String>,
        imports: Vec<String>,
        layer_exports: Vec<LayerRef>,
        layer_imports: Vec<(LayerRef, String)>,
    ) -> Self {
        Self {
            name: info.name.clone(),
            stack_name: info.stack_name(),
            resources,
            functions,
            constructs,
            exports,
            imports,
            layers: LayerTable {
                exports: layer_exports,
                imports: layer_imports
                    .into_iter()
                    .map(|(layer, owner)| LayerImport { layer, owner })
                    .collect(),
            },
        }
    }

    pub fn function(&self, id: &str) -> Option<&FunctionOutput> {
        self.functions.iter().find(|f| f.id == id)
    }
}

/// Layers a unit owns and layers it imports from their owners
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayerTable {
    pub exports: Vec<LayerRef>,
    pub imports: Vec<LayerImport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerImport {
    pub layer: LayerRef,
    pub owner: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionOutput {
    pub id: String,
    pub arn: String,
    pub config: FunctionProps,
    pub layers: Vec<FunctionLayer>,
    pub policy: PolicyDocument,
}

impl FunctionOutput {
    pub(crate) fn new(record: &FunctionRecord, statements: &[GrantRecord]) -> Self {
        Self {
            id: record.id.clone(),
            arn: record.handle.arn().to_string(),
            config: record.config.clone(),
            layers: record
                .layers
                .iter()
                .map(|(layer, binding)| FunctionLayer {
                    layer: layer.clone(),
                    binding: binding.clone(),
                })
                .collect(),
            policy: PolicyDocument::from(statements),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionLayer {
    pub layer: LayerRef,
    #[serde(flatten)]
    pub binding: LayerBinding,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstructOutput {
    pub id: String,
    pub kind: ConstructKind,
    pub arn: String,
    pub sub_resources: Vec<SubResourceOutput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubResourceOutput {
    pub key: String,
    pub unit: String,
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    pub action: Vec<String>,
    pub resource: Vec<String>,
}

impl From<&[GrantRecord]> for PolicyDocument {
    fn from(records: &[GrantRecord]) -> Self {
        Self {
            version: POLICY_VERSION,
            statement: records
                .iter()
                .map(|record| PolicyStatement {
                    effect: record.effect,
                    action: record.actions.clone(),
                    resource: record.resources.clone(),
                })
                .collect(),
        }
    }
}
