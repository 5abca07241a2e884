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

//! Turns inputs and an output decomposition into a resolved request graph.
//!
//! Per credential type, the negative-balance pass discharges every output
//! by routing value from inputs, inserting reissuance vertices wherever a
//! transfer would exceed a fan-in or fan-out bound. The zero-credential
//! pass then fills every remaining presentation slot with zero-valued
//! edges, so each request can present exactly `k` credentials. Candidate
//! ordering is strict, making the produced graph deterministic.

use crate::credentials::CredentialType;
use crate::errors::GraphError;
use crate::graph::{DependencyGraph, RegistrationValues, VertexId, VertexKind, TYPE_COUNT};
use crate::K;

impl DependencyGraph {
    /// Builds and fully resolves the request graph for one round.
    ///
    /// Inputs provide per-type value, outputs consume it; the sum of
    /// inputs must cover the sum of outputs for each type. Input vertices
    /// occupy the first arena slots in registration order, then outputs,
    /// then any reissuance vertices the resolver inserts.
    pub fn resolve(
        inputs: &[RegistrationValues],
        outputs: &[RegistrationValues],
    ) -> Result<DependencyGraph, GraphError> {
        let mut graph = DependencyGraph::default();
        for values in inputs {
            graph.add_vertex(
                VertexKind::Input,
                [values.amount as i64, values.vsize as i64],
            );
        }
        for values in outputs {
            graph.add_vertex(
                VertexKind::Output,
                [-(values.amount as i64), -(values.vsize as i64)],
            );
        }
        graph.input_count = inputs.len();
        graph.output_count = outputs.len();

        for credential_type in CredentialType::ALL {
            let provided: i64 = inputs.iter().map(|v| v.get(credential_type) as i64).sum();
            let consumed: i64 = outputs.iter().map(|v| v.get(credential_type) as i64).sum();
            if provided < consumed {
                return Err(GraphError::InsufficientFunds { credential_type });
            }
        }

        for credential_type in CredentialType::ALL {
            graph.resolve_negative_balance_nodes(credential_type)?;
        }
        for credential_type in CredentialType::ALL {
            graph.resolve_zero_credentials(credential_type)?;
        }
        graph.assert_resolved()?;
        Ok(graph)
    }

    fn magnitude(&self, credential_type: CredentialType, vertex: VertexId) -> u64 {
        self.balance(credential_type, vertex).unsigned_abs()
    }

    fn with_balance(
        &self,
        credential_type: CredentialType,
        predicate: impl Fn(i64) -> bool,
    ) -> Vec<VertexId> {
        self.vertices()
            .filter(|&v| predicate(self.balance(credential_type, v)))
            .collect()
    }

    /// Discharges every negative balance of one credential type.
    fn resolve_negative_balance_nodes(
        &mut self,
        credential_type: CredentialType,
    ) -> Result<(), GraphError> {
        self.try_fast_paths(credential_type)?;
        while self.discharge_largest(credential_type)? {}
        Ok(())
    }

    /// The uniform-input fast paths: a breadth-first reissuance forest when
    /// many small outputs face equal unconstrained inputs, or a direct 1:1
    /// drain when the inputs pairwise dominate the outputs.
    fn try_fast_paths(&mut self, credential_type: CredentialType) -> Result<(), GraphError> {
        let positives = self.with_balance(credential_type, |b| b > 0);
        let negatives = self.with_balance(credential_type, |b| b < 0);
        if positives.is_empty() || negatives.is_empty() {
            return Ok(());
        }

        let unconstrained = positives
            .iter()
            .all(|&v| self.remaining_out_degree(credential_type, v) > 1);
        let value = self.magnitude(credential_type, positives[0]);
        let uniform = unconstrained
            && positives
                .iter()
                .all(|&v| self.magnitude(credential_type, v) == value);
        let capacity: usize = positives
            .iter()
            .map(|&v| self.remaining_out_degree(credential_type, v))
            .sum();
        if uniform
            && negatives
                .iter()
                .all(|&n| self.magnitude(credential_type, n) < value)
            && negatives.len() > capacity
        {
            return self.reduce_to_forest(credential_type, value, &positives, negatives);
        }

        if positives.len() >= negatives.len() {
            let mut by_size = positives.clone();
            by_size.sort_by_key(|&v| std::cmp::Reverse(self.magnitude(credential_type, v)));
            let mut targets = negatives.clone();
            targets.sort_by_key(|&v| std::cmp::Reverse(self.magnitude(credential_type, v)));
            let dominates = by_size
                .iter()
                .zip(&targets)
                .all(|(&p, &n)| {
                    self.magnitude(credential_type, p) >= self.magnitude(credential_type, n)
                });
            if dominates {
                for (&source, &target) in by_size.iter().zip(&targets) {
                    let value = self.magnitude(credential_type, target);
                    self.add_edge(credential_type, source, target, value)?;
                }
            }
        }
        Ok(())
    }

    /// Folds negatives breadth-first, `k` at a time, into reissuance nodes
    /// until their count matches the positives, then matches 1:1.
    fn reduce_to_forest(
        &mut self,
        credential_type: CredentialType,
        value: u64,
        positives: &[VertexId],
        mut queue: Vec<VertexId>,
    ) -> Result<(), GraphError> {
        queue.sort_by_key(|&v| self.magnitude(credential_type, v));
        while queue.len() > positives.len() {
            let mut group = vec![queue[0]];
            let mut sum = self.magnitude(credential_type, queue[0]);
            while group.len() < K && group.len() < queue.len() {
                let next = queue[group.len()];
                let magnitude = self.magnitude(credential_type, next);
                if sum + magnitude > value {
                    break;
                }
                group.push(next);
                sum += magnitude;
            }
            if group.len() < 2 {
                // No pair fits under the input value; the general pass
                // handles what remains.
                break;
            }
            let node = self.add_vertex(VertexKind::Reissuance, [0; TYPE_COUNT]);
            for &member in &group {
                let magnitude = self.magnitude(credential_type, member);
                self.add_edge(credential_type, node, member, magnitude)?;
            }
            queue.drain(..group.len());
            let position = queue
                .partition_point(|&v| self.magnitude(credential_type, v) < sum);
            queue.insert(position, node);
        }
        if queue.len() <= positives.len() {
            for (&source, &target) in positives.iter().zip(&queue) {
                let value = self
                    .magnitude(credential_type, source)
                    .min(self.magnitude(credential_type, target));
                self.add_edge(credential_type, source, target, value)?;
            }
        }
        Ok(())
    }

    /// One step of the general pass: picks the largest-magnitude
    /// unsatisfied node and discharges it against the opposite side.
    /// Returns false once no negative balance remains.
    fn discharge_largest(
        &mut self,
        credential_type: CredentialType,
    ) -> Result<bool, GraphError> {
        if self.with_balance(credential_type, |b| b < 0).is_empty() {
            return Ok(false);
        }
        let mut candidates = self.with_balance(credential_type, |b| b != 0);
        candidates.sort_by(|&a, &b| {
            self.magnitude(credential_type, b)
                .cmp(&self.magnitude(credential_type, a))
                .then(
                    self.balance(credential_type, b)
                        .cmp(&self.balance(credential_type, a)),
                )
                .then(
                    self.remaining_out_degree(credential_type, b)
                        .cmp(&self.remaining_out_degree(credential_type, a)),
                )
                .then(
                    self.remaining_zero_out_degree(credential_type, b)
                        .cmp(&self.remaining_zero_out_degree(credential_type, a)),
                )
                .then(a.cmp(&b))
        });
        let largest = candidates[0];
        if self.balance(credential_type, largest) > 0 {
            self.drain_positive(credential_type, largest)?;
        } else {
            self.fill_negative(credential_type, largest)?;
        }
        Ok(true)
    }

    /// Opposite-sign nodes in ascending magnitude, collected until their
    /// sum exceeds the target's magnitude or the list is exhausted.
    fn select_opposite(
        &self,
        credential_type: CredentialType,
        largest: VertexId,
    ) -> (Vec<VertexId>, u64) {
        let sign = self.balance(credential_type, largest).signum();
        let mut opposite = self.with_balance(credential_type, |b| b.signum() == -sign);
        opposite.sort_by_key(|&v| self.magnitude(credential_type, v));
        let target = self.magnitude(credential_type, largest);
        let mut selection = Vec::new();
        let mut sum = 0u64;
        for vertex in opposite {
            selection.push(vertex);
            sum += self.magnitude(credential_type, vertex);
            if sum > target {
                break;
            }
        }
        (selection, sum)
    }

    /// Discharges a positive node into the selected negatives, reserving
    /// one out-slot for change when it cannot be fully drained.
    fn drain_positive(
        &mut self,
        credential_type: CredentialType,
        largest: VertexId,
    ) -> Result<(), GraphError> {
        let (mut selection, sum) = self.select_opposite(credential_type, largest);
        let target = self.magnitude(credential_type, largest);
        let available = self.remaining_out_degree(credential_type, largest);
        if available == 0 {
            return Err(GraphError::DegreeExceeded {
                vertex: largest.index(),
                bound: "out-degree",
            });
        }
        let mut usable = available;
        if sum < target {
            usable = available - 1;
            if usable == 0 {
                // A single slot cannot both drain and hold change: park
                // the whole balance on a reissuance node with fresh slots.
                let node = self.add_vertex(VertexKind::Reissuance, [0; TYPE_COUNT]);
                self.add_edge(credential_type, largest, node, target)?;
                return Ok(());
            }
        }
        self.reduce_selection(credential_type, &mut selection, usable, Direction::FanOut)?;

        let mut remaining = target;
        for &member in &selection {
            if remaining == 0 {
                break;
            }
            let magnitude = self.magnitude(credential_type, member);
            let value = remaining.min(magnitude);
            if value == 0 {
                continue;
            }
            if value < magnitude && self.remaining_in_degree(credential_type, member) == 1 {
                // The member's last in-slot cannot take a partial fill and
                // still leave room for the rest of its demand: route
                // through a reissuance node with fresh slots.
                let node = self.add_vertex(VertexKind::Reissuance, [0; TYPE_COUNT]);
                self.add_edge(credential_type, node, member, magnitude)?;
                self.add_edge(credential_type, largest, node, value)?;
            } else {
                self.add_edge(credential_type, largest, member, value)?;
            }
            remaining -= value;
        }
        Ok(())
    }

    /// Discharges a negative node from the selected positives.
    fn fill_negative(
        &mut self,
        credential_type: CredentialType,
        largest: VertexId,
    ) -> Result<(), GraphError> {
        let (mut selection, sum) = self.select_opposite(credential_type, largest);
        let target = self.magnitude(credential_type, largest);
        if sum < target {
            // Funds were validated upfront; running dry means the resolver
            // routed value somewhere it cannot come back from.
            return Err(GraphError::BalanceNotDischarged {
                vertex: largest.index(),
                credential_type,
                balance: self.balance(credential_type, largest),
            });
        }
        let available = self.remaining_in_degree(credential_type, largest);
        if available == 0 {
            return Err(GraphError::DegreeExceeded {
                vertex: largest.index(),
                bound: "in-degree",
            });
        }
        self.reduce_selection(credential_type, &mut selection, available, Direction::FanIn)?;

        let mut remaining = target;
        for &member in &selection {
            if remaining == 0 {
                break;
            }
            let magnitude = self.magnitude(credential_type, member);
            let value = remaining.min(magnitude);
            if value == 0 {
                continue;
            }
            if value < magnitude && self.remaining_out_degree(credential_type, member) == 1 {
                // A partial drain through the member's last out-slot would
                // strand its remainder: park the whole balance on a
                // reissuance node, which pays the target and keeps the
                // rest with fresh slots.
                let node = self.add_vertex(VertexKind::Reissuance, [0; TYPE_COUNT]);
                self.add_edge(credential_type, member, node, magnitude)?;
                self.add_edge(credential_type, node, largest, value)?;
            } else {
                self.add_edge(credential_type, member, largest, value)?;
            }
            remaining -= value;
        }
        Ok(())
    }

    /// Folds the smallest selected nodes, up to `k` at a time, into fresh
    /// reissuance nodes until the selection fits the available degree.
    fn reduce_selection(
        &mut self,
        credential_type: CredentialType,
        selection: &mut Vec<VertexId>,
        limit: usize,
        direction: Direction,
    ) -> Result<(), GraphError> {
        while selection.len() > limit {
            let fold = K.min(selection.len() - limit + 1);
            if fold < 2 {
                break;
            }
            let node = self.add_vertex(VertexKind::Reissuance, [0; TYPE_COUNT]);
            let mut sum = 0u64;
            for &member in &selection[..fold] {
                let magnitude = self.magnitude(credential_type, member);
                sum += magnitude;
                match direction {
                    // The reissuance node fans values back out to the
                    // original sinks.
                    Direction::FanOut => {
                        self.add_edge(credential_type, node, member, magnitude)?
                    }
                    // The sources pool their values into the node.
                    Direction::FanIn => {
                        self.add_edge(credential_type, member, node, magnitude)?
                    }
                }
            }
            selection.drain(..fold);
            let position = selection
                .partition_point(|&v| self.magnitude(credential_type, v) < sum);
            selection.insert(position, node);
        }
        Ok(())
    }

    /// Fills every remaining presentation slot with a zero-valued edge
    /// from an already-saturated vertex, in topological order.
    fn resolve_zero_credentials(
        &mut self,
        credential_type: CredentialType,
    ) -> Result<(), GraphError> {
        let order = self.topological_order();
        for position in 0..order.len() {
            let vertex = order[position];
            while self.remaining_in_degree(credential_type, vertex) > 0 {
                let mut provider = None;
                let mut best = 0;
                for &candidate in &order[..position] {
                    if self.remaining_in_degree(credential_type, candidate) > 0 {
                        continue;
                    }
                    let capacity = self.remaining_zero_out_degree(credential_type, candidate);
                    if capacity > best {
                        provider = Some(candidate);
                        best = capacity;
                    }
                }
                let Some(provider) = provider else {
                    return Err(GraphError::DegreeExceeded {
                        vertex: vertex.index(),
                        bound: "zero-credential capacity",
                    });
                };
                self.add_edge(credential_type, provider, vertex, 0)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Direction {
    FanIn,
    FanOut,
}
