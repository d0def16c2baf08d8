//! Structural simplification of a circuit's device graph
//!
//! Two rewrites, applied to the top circuit and every subcircuit:
//! - `Repeater` devices are bypassed: their consumers read the repeater's driver.
//! - A `Not` that is the only consumer of an `And`/`Or`/`Xor` of the same
//!   width is merged into it, giving `Nand`/`Nor`/`Xnor`. An unlabelled
//!   gate keeps the `Not`'s label.

use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::{Circuit, Connector, Device, DeviceKind, Endpoint};

/// Counts of applied rewrites
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub repeaters_bypassed: usize,
    pub negations_folded: usize,
}

impl std::ops::AddAssign for TransformStats {
    fn add_assign(&mut self, other: Self) {
        self.repeaters_bypassed += other.repeaters_bypassed;
        self.negations_folded += other.negations_folded;
    }
}

pub fn simplify(circuit: &mut Circuit) -> TransformStats {
    let mut stats = TransformStats::default();

    let mut graph = DeviceGraph::build(circuit);
    stats.repeaters_bypassed = graph.bypass_repeaters(&mut circuit.devices);
    stats.negations_folded = graph.fold_negations(&mut circuit.devices);
    circuit.connectors = graph.into_connectors();

    for sub in circuit.subcircuits.values_mut() {
        stats += simplify(sub);
    }
    stats
}

/// Devices as nodes, connectors as edges
struct DeviceGraph {
    graph: StableDiGraph<String, Connector>,
    nodes: HashMap<String, NodeIndex>,
    /// Connectors whose ends name no device; passed through untouched
    dangling: Vec<Connector>,
}

impl DeviceGraph {
    fn build(circuit: &Circuit) -> Self {
        let mut graph = StableDiGraph::new();
        let mut nodes = HashMap::new();
        for id in circuit.devices.keys() {
            nodes.insert(id.clone(), graph.add_node(id.clone()));
        }

        let mut dangling = Vec::new();
        for connector in &circuit.connectors {
            match (nodes.get(&connector.from.id), nodes.get(&connector.to.id)) {
                (Some(&from), Some(&to)) => {
                    graph.add_edge(from, to, connector.clone());
                }
                _ => {
                    tracing::warn!(
                        "Connector {}.{} -> {}.{} references a missing device",
                        connector.from.id,
                        connector.from.port,
                        connector.to.id,
                        connector.to.port
                    );
                    dangling.push(connector.clone());
                }
            }
        }

        Self {
            graph,
            nodes,
            dangling,
        }
    }

    fn edges_into(&self, node: NodeIndex, port: &str) -> Vec<EdgeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .filter(|e| e.weight().to.port == port)
            .map(|e| e.id())
            .collect()
    }

    fn edges_from(&self, node: NodeIndex, port: &str) -> Vec<EdgeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|e| e.weight().from.port == port)
            .map(|e| e.id())
            .collect()
    }

    /// Point every connector leaving `node.port` at `source` instead.
    fn reroute_outputs(&mut self, node: NodeIndex, port: &str, source_node: NodeIndex, source: &Endpoint) {
        for edge in self.edges_from(node, port) {
            let Some((_, target)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            if let Some(mut connector) = self.graph.remove_edge(edge) {
                connector.from = source.clone();
                self.graph.add_edge(source_node, target, connector);
            }
        }
    }

    fn remove_device(&mut self, node: NodeIndex, devices: &mut IndexMap<String, Device>) {
        if let Some(id) = self.graph.remove_node(node) {
            self.nodes.remove(&id);
            devices.shift_remove(&id);
        }
    }

    fn nodes_of(&self, devices: &IndexMap<String, Device>, kind: DeviceKind) -> Vec<NodeIndex> {
        devices
            .iter()
            .filter(|(_, d)| d.kind == kind)
            .filter_map(|(id, _)| self.nodes.get(id).copied())
            .collect()
    }

    fn bypass_repeaters(&mut self, devices: &mut IndexMap<String, Device>) -> usize {
        let mut bypassed = 0;

        for node in self.nodes_of(devices, DeviceKind::Repeater) {
            let inputs = self.edges_into(node, "in");
            let [input] = inputs.as_slice() else {
                continue;
            };
            let Some((source_node, _)) = self.graph.edge_endpoints(*input) else {
                continue;
            };
            let source = self.graph[*input].from.clone();

            self.reroute_outputs(node, "out", source_node, &source);
            self.remove_device(node, devices);
            bypassed += 1;
        }

        bypassed
    }

    fn fold_negations(&mut self, devices: &mut IndexMap<String, Device>) -> usize {
        let mut folded = 0;

        for node in self.nodes_of(devices, DeviceKind::Not) {
            let inputs = self.edges_into(node, "in");
            let [input] = inputs.as_slice() else {
                continue;
            };
            let Some((gate_node, _)) = self.graph.edge_endpoints(*input) else {
                continue;
            };
            let from = self.graph[*input].from.clone();
            if from.port != "out" || self.edges_from(gate_node, "out").len() != 1 {
                continue;
            }

            let not_id = &self.graph[node];
            let gate_id = &self.graph[gate_node];
            let (Some(not), Some(gate)) = (devices.get(not_id), devices.get(gate_id)) else {
                continue;
            };
            let Some(negated) = gate.kind.negated() else {
                continue;
            };
            if not.bits != gate.bits {
                continue;
            }
            let gate_id = gate_id.clone();
            let not_label = not.label.clone();

            self.reroute_outputs(node, "out", gate_node, &from);
            self.remove_device(node, devices);
            if let Some(gate) = devices.get_mut(&gate_id) {
                gate.kind = negated;
                if gate.label.is_none() {
                    gate.label = not_label;
                }
            }
            folded += 1;
        }

        folded
    }

    fn into_connectors(self) -> Vec<Connector> {
        let mut connectors: Vec<Connector> = self
            .graph
            .edge_indices()
            .map(|e| self.graph[e].clone())
            .collect();
        connectors.extend(self.dangling);
        connectors
    }
}
