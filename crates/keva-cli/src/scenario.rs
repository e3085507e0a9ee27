//! Scripted multi-node scenarios.
//!
//! A scenario is a JSON document listing a number of nodes sharing one
//! chain and the steps to run against them:
//!
//! ```json
//! {
//!   "nodes": 2,
//!   "steps": [
//!     { "step": "namespace", "node": 0, "name": "notes", "as": "n" },
//!     { "step": "put", "node": 0, "namespace": "n", "key": "a", "value": "1" },
//!     { "step": "mine", "node": 0 },
//!     { "step": "get", "node": 1, "namespace": "n", "key": "a" }
//!   ]
//! }
//! ```
//!
//! Namespaces are referenced by the alias given at creation or by their
//! `ns:<hex>` id. Write steps that the node refuses are reported and the
//! run continues; a malformed script stops it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};

use keva_node::{FilterOptions, KevaNode, NamespaceId, NodeConfig, NodeResult};

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    #[serde(default = "one")]
    pub nodes: usize,
    pub steps: Vec<Step>,
}

fn one() -> usize {
    1
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Namespace {
        #[serde(default)]
        node: usize,
        name: String,
        #[serde(rename = "as")]
        alias: Option<String>,
    },
    Put {
        #[serde(default)]
        node: usize,
        namespace: String,
        key: String,
        value: String,
    },
    Delete {
        #[serde(default)]
        node: usize,
        namespace: String,
        key: String,
    },
    /// Mine the node's pool into the next block and connect it everywhere.
    Mine {
        #[serde(default)]
        node: usize,
    },
    /// Disconnect the tip block on every node.
    Disconnect,
    Get {
        #[serde(default)]
        node: usize,
        namespace: String,
        key: String,
    },
    Filter {
        #[serde(default)]
        node: usize,
        namespace: String,
        #[serde(default)]
        prefix: String,
        #[serde(flatten)]
        options: FilterOptions,
    },
    Pending {
        #[serde(default)]
        node: usize,
        namespace: Option<String>,
    },
    Namespaces {
        #[serde(default)]
        node: usize,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Namespace { .. } => "namespace",
            Step::Put { .. } => "put",
            Step::Delete { .. } => "delete",
            Step::Mine { .. } => "mine",
            Step::Disconnect => "disconnect",
            Step::Get { .. } => "get",
            Step::Filter { .. } => "filter",
            Step::Pending { .. } => "pending",
            Step::Namespaces { .. } => "namespaces",
        }
    }

    fn node(&self) -> usize {
        match self {
            Step::Namespace { node, .. }
            | Step::Put { node, .. }
            | Step::Delete { node, .. }
            | Step::Mine { node }
            | Step::Get { node, .. }
            | Step::Filter { node, .. }
            | Step::Pending { node, .. }
            | Step::Namespaces { node } => *node,
            Step::Disconnect => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryRow {
    pub key: String,
    pub value: String,
    pub height: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingRow {
    pub seq: u64,
    pub kind: String,
    pub namespace: String,
    pub key: String,
    pub value: String,
    pub op_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamespaceRow {
    pub namespace: String,
    pub display_name: String,
    pub pending: bool,
}

/// What one step produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Created { namespace: String, op_id: String },
    Submitted { op_id: String },
    Mined { height: u64, ops: usize, evicted: usize },
    Disconnected { height: u64, new_tip: u64 },
    Value { key: String, value: String },
    Entries { entries: Vec<EntryRow> },
    Pending { ops: Vec<PendingRow> },
    Namespaces { namespaces: Vec<NamespaceRow> },
    Refused { error: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: &'static str,
    pub node: usize,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// In-memory nodes sharing one chain, plus the namespace aliases a script
/// has defined.
pub struct Runner {
    nodes: Vec<KevaNode>,
    aliases: HashMap<String, NamespaceId>,
}

impl Runner {
    /// Node `i` gets `config.node_id + i` as its id.
    pub fn new(count: usize, config: &NodeConfig) -> anyhow::Result<Self> {
        if count == 0 {
            bail!("a scenario needs at least one node");
        }
        let nodes = (0..count)
            .map(|i| -> anyhow::Result<KevaNode> {
                let node_id = u16::try_from(i)
                    .ok()
                    .and_then(|i| config.node_id.checked_add(i))
                    .ok_or_else(|| anyhow!("too many nodes"))?;
                Ok(KevaNode::new(NodeConfig {
                    node_id,
                    ..config.clone()
                }))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            nodes,
            aliases: HashMap::new(),
        })
    }

    pub fn node(&self, index: usize) -> anyhow::Result<&KevaNode> {
        self.nodes
            .get(index)
            .ok_or_else(|| anyhow!("no node {index} (scenario has {})", self.nodes.len()))
    }

    fn resolve(&self, reference: &str) -> anyhow::Result<NamespaceId> {
        if let Some(ns) = self.aliases.get(reference) {
            return Ok(*ns);
        }
        reference
            .parse::<NamespaceId>()
            .with_context(|| format!("unknown namespace `{reference}`"))
    }

    pub fn run(&mut self, scenario: &Scenario) -> anyhow::Result<Vec<StepReport>> {
        scenario
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let outcome = self
                    .apply(step)
                    .with_context(|| format!("step {index} ({})", step.name()))?;
                Ok(StepReport {
                    index,
                    step: step.name(),
                    node: step.node(),
                    outcome,
                })
            })
            .collect()
    }

    fn apply(&mut self, step: &Step) -> anyhow::Result<Outcome> {
        let node = self.node(step.node())?;
        let outcome = match step {
            Step::Namespace { name, alias, .. } => match node.create_namespace(name) {
                Ok(created) => {
                    if let Some(alias) = alias {
                        self.aliases.insert(alias.clone(), created.namespace);
                    }
                    Outcome::Created {
                        namespace: created.namespace.to_string(),
                        op_id: created.op_id.to_hex(),
                    }
                }
                Err(e) => refused(e),
            },
            Step::Put {
                namespace,
                key,
                value,
                ..
            } => {
                let ns = self.resolve(namespace)?;
                submitted(node.put(&ns, key, value))
            }
            Step::Delete { namespace, key, .. } => {
                let ns = self.resolve(namespace)?;
                submitted(node.delete(&ns, key))
            }
            Step::Mine { .. } => {
                let block = node.next_block()?;
                let mut evicted = 0;
                for peer in &self.nodes {
                    evicted += peer.block_connected(&block)?.evicted.len();
                }
                Outcome::Mined {
                    height: block.height,
                    ops: block.ops.len(),
                    evicted,
                }
            }
            Step::Disconnect => {
                let mut last = None;
                for peer in &self.nodes {
                    last = Some(peer.block_disconnected()?);
                }
                let report = last.ok_or_else(|| anyhow!("no nodes"))?;
                Outcome::Disconnected {
                    height: report.height,
                    new_tip: report.new_tip,
                }
            }
            Step::Get { namespace, key, .. } => {
                let ns = self.resolve(namespace)?;
                Outcome::Value {
                    key: key.clone(),
                    value: node.get(&ns, key)?,
                }
            }
            Step::Filter {
                namespace,
                prefix,
                options,
                ..
            } => {
                let ns = self.resolve(namespace)?;
                let entries = node
                    .filter(&ns, prefix, options)?
                    .into_iter()
                    .map(|kv| EntryRow {
                        key: kv.key,
                        value: kv.value,
                        height: kv.modified.height(),
                    })
                    .collect();
                Outcome::Entries { entries }
            }
            Step::Pending { namespace, .. } => {
                let filter = namespace.as_deref().map(|r| self.resolve(r)).transpose()?;
                let ops = node
                    .list_pending(filter.as_ref())?
                    .into_iter()
                    .map(|p| PendingRow {
                        seq: p.seq,
                        kind: p.kind.label().to_string(),
                        namespace: p.namespace.to_string(),
                        key: p.key,
                        value: p.value,
                        op_id: p.op_id.to_hex(),
                    })
                    .collect();
                Outcome::Pending { ops }
            }
            Step::Namespaces { .. } => {
                let namespaces = node
                    .list_namespaces()?
                    .into_iter()
                    .map(|n| NamespaceRow {
                        namespace: n.namespace.to_string(),
                        display_name: n.display_name,
                        pending: n.pending,
                    })
                    .collect();
                Outcome::Namespaces { namespaces }
            }
        };
        Ok(outcome)
    }
}

fn refused(err: keva_node::NodeError) -> Outcome {
    Outcome::Refused {
        error: err.to_string(),
    }
}

fn submitted(result: NodeResult<keva_node::OpId>) -> Outcome {
    match result {
        Ok(op_id) => Outcome::Submitted {
            op_id: op_id.to_hex(),
        },
        Err(e) => refused(e),
    }
}

pub fn load(path: &Path) -> anyhow::Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
}
