// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The credential dependency graph.
//!
//! Vertices are registration requests (one per input, one per output, plus
//! reissuance nodes the resolver inserts); edges carry credentials from the
//! request that obtains them to the request that presents them, one edge
//! set per credential type. Vertices live in an index-addressed arena and
//! resolve passes mutate the graph in place; the finished value is handed
//! to the runtime read-only.

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialType;
use crate::errors::GraphError;
use crate::K;

pub mod resolver;
pub mod runtime;

/// Number of credential types every request and edge set is duplicated
/// over.
pub const TYPE_COUNT: usize = CredentialType::ALL.len();

/// Stable index of a vertex in the graph's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub(crate) usize);

impl VertexId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a vertex does when the runtime fires it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexKind {
    /// Registers an input and converts its value into credentials.
    /// Sources only: in-degree 0.
    Input,
    /// Registers an output funded by its in-edges. Sinks only.
    Output,
    /// Absorbs credentials and emits recombined ones, keeping fan-in and
    /// fan-out within bounds.
    Reissuance,
}

impl VertexKind {
    /// Maximum number of in-edges per credential type.
    pub fn max_in_degree(self) -> usize {
        match self {
            VertexKind::Input => 0,
            VertexKind::Output | VertexKind::Reissuance => K,
        }
    }

    /// Maximum number of value-carrying out-edges per credential type.
    pub fn max_out_degree(self) -> usize {
        match self {
            VertexKind::Output => 0,
            VertexKind::Input | VertexKind::Reissuance => K,
        }
    }

    /// Maximum number of zero-valued out-edges per credential type.
    ///
    /// Reissuance nodes get `k·(k−1)`, which is exactly what the zero-fill
    /// pass needs to terminate.
    pub fn max_zero_out_degree(self) -> usize {
        match self {
            VertexKind::Input => K,
            VertexKind::Output => 0,
            VertexKind::Reissuance => K * (K - 1),
        }
    }
}

#[derive(Clone, Debug)]
struct Vertex {
    kind: VertexKind,
    /// Signed starting balance per credential type: positive for inputs,
    /// negative for outputs, zero for reissuance nodes.
    initial: [i64; TYPE_COUNT],
}

/// A directed credential transfer between two requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: VertexId,
    pub target: VertexId,
    pub value: u64,
}

/// The per-type values an input provides or an output consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistrationValues {
    pub amount: u64,
    pub vsize: u64,
}

impl RegistrationValues {
    pub(crate) fn get(&self, credential_type: CredentialType) -> u64 {
        match credential_type {
            CredentialType::Amount => self.amount,
            CredentialType::Vsize => self.vsize,
        }
    }
}

/// The resolved request graph for one round.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    vertices: Vec<Vertex>,
    edges: [Vec<Edge>; TYPE_COUNT],
    input_count: usize,
    output_count: usize,
}

impl DependencyGraph {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn kind(&self, vertex: VertexId) -> VertexKind {
        self.vertices[vertex.0].kind
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> {
        (0..self.vertices.len()).map(VertexId)
    }

    /// Input vertices, in registration order; they occupy the first arena
    /// slots.
    pub fn inputs(&self) -> impl Iterator<Item = VertexId> {
        (0..self.input_count).map(VertexId)
    }

    /// Output vertices, following the inputs.
    pub fn outputs(&self) -> impl Iterator<Item = VertexId> {
        (self.input_count..self.input_count + self.output_count).map(VertexId)
    }

    /// Reissuance vertices, in insertion order.
    pub fn reissuances(&self) -> impl Iterator<Item = VertexId> + '_ {
        (self.input_count + self.output_count..self.vertices.len()).map(VertexId)
    }

    pub fn edges(&self, credential_type: CredentialType) -> &[Edge] {
        &self.edges[credential_type.index()]
    }

    pub fn in_edges<'a>(
        &'a self,
        credential_type: CredentialType,
        vertex: VertexId,
    ) -> impl Iterator<Item = (usize, &'a Edge)> {
        self.edges[credential_type.index()]
            .iter()
            .enumerate()
            .filter(move |(_, edge)| edge.target == vertex)
    }

    pub fn out_edges<'a>(
        &'a self,
        credential_type: CredentialType,
        vertex: VertexId,
    ) -> impl Iterator<Item = (usize, &'a Edge)> {
        self.edges[credential_type.index()]
            .iter()
            .enumerate()
            .filter(move |(_, edge)| edge.source == vertex)
    }

    /// `initial + Σ in − Σ out` for one vertex and type.
    pub fn balance(&self, credential_type: CredentialType, vertex: VertexId) -> i64 {
        let initial = self.vertices[vertex.0].initial[credential_type.index()];
        let incoming: i64 = self
            .in_edges(credential_type, vertex)
            .map(|(_, e)| e.value as i64)
            .sum();
        let outgoing: i64 = self
            .out_edges(credential_type, vertex)
            .map(|(_, e)| e.value as i64)
            .sum();
        initial + incoming - outgoing
    }

    pub fn in_degree(&self, credential_type: CredentialType, vertex: VertexId) -> usize {
        self.in_edges(credential_type, vertex).count()
    }

    /// Count of value-carrying out-edges.
    pub fn out_degree(&self, credential_type: CredentialType, vertex: VertexId) -> usize {
        self.out_edges(credential_type, vertex)
            .filter(|(_, e)| e.value > 0)
            .count()
    }

    pub fn zero_out_degree(&self, credential_type: CredentialType, vertex: VertexId) -> usize {
        self.out_edges(credential_type, vertex)
            .filter(|(_, e)| e.value == 0)
            .count()
    }

    pub(crate) fn remaining_in_degree(
        &self,
        credential_type: CredentialType,
        vertex: VertexId,
    ) -> usize {
        self.kind(vertex).max_in_degree() - self.in_degree(credential_type, vertex)
    }

    pub(crate) fn remaining_out_degree(
        &self,
        credential_type: CredentialType,
        vertex: VertexId,
    ) -> usize {
        self.kind(vertex).max_out_degree() - self.out_degree(credential_type, vertex)
    }

    pub(crate) fn remaining_zero_out_degree(
        &self,
        credential_type: CredentialType,
        vertex: VertexId,
    ) -> usize {
        self.kind(vertex).max_zero_out_degree() - self.zero_out_degree(credential_type, vertex)
    }

    pub(crate) fn add_vertex(&mut self, kind: VertexKind, initial: [i64; TYPE_COUNT]) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex { kind, initial });
        id
    }

    /// Adds an edge, enforcing the degree bounds of both endpoints.
    pub(crate) fn add_edge(
        &mut self,
        credential_type: CredentialType,
        source: VertexId,
        target: VertexId,
        value: u64,
    ) -> Result<(), GraphError> {
        if value > 0 && self.remaining_out_degree(credential_type, source) == 0 {
            return Err(GraphError::DegreeExceeded {
                vertex: source.0,
                bound: "out-degree",
            });
        }
        if value == 0 && self.remaining_zero_out_degree(credential_type, source) == 0 {
            return Err(GraphError::DegreeExceeded {
                vertex: source.0,
                bound: "zero out-degree",
            });
        }
        if self.remaining_in_degree(credential_type, target) == 0 {
            return Err(GraphError::DegreeExceeded {
                vertex: target.0,
                bound: "in-degree",
            });
        }
        self.edges[credential_type.index()].push(Edge {
            source,
            target,
            value,
        });
        Ok(())
    }

    /// A topological order over the union of all edge sets.
    ///
    /// The graph is acyclic by construction (every resolve pass only adds
    /// edges forward along an existing order), so this always covers every
    /// vertex; the runtime and the zero-fill pass both walk it.
    pub fn topological_order(&self) -> Vec<VertexId> {
        let count = self.vertices.len();
        let mut in_degrees = vec![0usize; count];
        for edges in &self.edges {
            for edge in edges {
                in_degrees[edge.target.0] += 1;
            }
        }
        let mut ready: Vec<usize> = (0..count).filter(|&v| in_degrees[v] == 0).collect();
        let mut order = Vec::with_capacity(count);
        let mut cursor = 0;
        while cursor < ready.len() {
            let vertex = ready[cursor];
            cursor += 1;
            order.push(VertexId(vertex));
            for edges in &self.edges {
                for edge in edges {
                    if edge.source.0 == vertex {
                        in_degrees[edge.target.0] -= 1;
                        if in_degrees[edge.target.0] == 0 {
                            ready.push(edge.target.0);
                        }
                    }
                }
            }
        }
        debug_assert_eq!(order.len(), count, "dependency graph must be acyclic");
        order
    }

    /// Verifies the sum and degree laws after resolution.
    ///
    /// Every vertex must be exactly balanced, except that an input or
    /// reissuance vertex may keep a positive remainder as long as a change
    /// slot remains for it; degree bounds must hold everywhere.
    pub fn assert_resolved(&self) -> Result<(), GraphError> {
        for vertex in self.vertices() {
            let kind = self.kind(vertex);
            for credential_type in CredentialType::ALL {
                let balance = self.balance(credential_type, vertex);
                let discharged = balance == 0
                    || (balance > 0
                        && kind != VertexKind::Output
                        && self.remaining_out_degree(credential_type, vertex) > 0);
                if !discharged {
                    return Err(GraphError::BalanceNotDischarged {
                        vertex: vertex.0,
                        credential_type,
                        balance,
                    });
                }
                if self.in_degree(credential_type, vertex) > kind.max_in_degree() {
                    return Err(GraphError::DegreeExceeded {
                        vertex: vertex.0,
                        bound: "in-degree",
                    });
                }
                if self.out_degree(credential_type, vertex) > kind.max_out_degree() {
                    return Err(GraphError::DegreeExceeded {
                        vertex: vertex.0,
                        bound: "out-degree",
                    });
                }
                if self.zero_out_degree(credential_type, vertex) > kind.max_zero_out_degree() {
                    return Err(GraphError::DegreeExceeded {
                        vertex: vertex.0,
                        bound: "zero out-degree",
                    });
                }
            }
        }
        Ok(())
    }
}
