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

//! Drives a resolved dependency graph against a coordinator.
//!
//! Every edge of the graph carries exactly one credential per type, passed
//! through a single-shot single-producer single-consumer cell. A vertex
//! task awaits all of its in-edge cells, performs one composite request
//! through the caller's [`RequestHandler`], and fulfills its out-edge
//! cells from the response. The graph is acyclic, so the join cannot
//! deadlock; tasks run cooperatively on one thread and cancelling the
//! round drops every pending cell, which its consumer observes as
//! [`RuntimeError::EdgeNotFulfilled`].
//!
//! Request deadlines belong to the handler, which owns the network I/O; a
//! handler error fails its vertex and aborts the whole round.

use std::cell::RefCell;
use std::future::Future;

use futures::channel::oneshot;
use futures::future::try_join_all;
use futures::FutureExt;
use rand_core::CryptoRngCore;

use crate::credentials::client::{CredentialClient, RequestValidation};
use crate::credentials::{Credential, CredentialType};
use crate::errors::RuntimeError;
use crate::graph::{DependencyGraph, VertexId, VertexKind, TYPE_COUNT};
use crate::wire::{
    ConnectionConfirmation, ConnectionConfirmationResponse, CredentialsResponse,
    InputRegistration, InputRegistrationResponse, OutputRegistration,
    OutputRegistrationResponse, Reissuance, ReissuanceResponse, RoundId,
    ZeroCredentialsRequest,
};
use crate::K;

/// Wallet-supplied description of one input to register.
#[derive(Clone, Debug)]
pub struct InputSpec {
    pub outpoint: Vec<u8>,
    pub ownership_proof: Vec<u8>,
    pub amount: u64,
    pub vsize: u64,
}

/// Wallet-supplied description of one output to register.
#[derive(Clone, Debug)]
pub struct OutputSpec {
    pub script: Vec<u8>,
    pub amount: u64,
    pub vsize: u64,
}

/// Credentials left over after the round: change the graph reserved slots
/// for but no request consumed. The wallet decomposes these for display.
#[derive(Default)]
pub struct RoundOutcome {
    pub change_amount: Vec<Credential>,
    pub change_vsize: Vec<Credential>,
}

impl RoundOutcome {
    fn keep(&mut self, credential_type: CredentialType, credential: Credential) {
        match credential_type {
            CredentialType::Amount => self.change_amount.push(credential),
            CredentialType::Vsize => self.change_vsize.push(credential),
        }
    }
}

/// One function per wire message; the transport, retry policy, and
/// deadlines live behind it.
pub trait RequestHandler {
    type Error: std::fmt::Display;

    fn register_input(
        &self,
        request: InputRegistration,
    ) -> impl Future<Output = Result<InputRegistrationResponse, Self::Error>>;

    fn confirm_connection(
        &self,
        request: ConnectionConfirmation,
    ) -> impl Future<Output = Result<ConnectionConfirmationResponse, Self::Error>>;

    fn reissue(
        &self,
        request: Reissuance,
    ) -> impl Future<Output = Result<ReissuanceResponse, Self::Error>>;

    fn register_output(
        &self,
        request: OutputRegistration,
    ) -> impl Future<Output = Result<OutputRegistrationResponse, Self::Error>>;
}

/// The cells a vertex touches for one credential type.
struct VertexCells {
    incoming: Vec<(usize, oneshot::Receiver<Credential>)>,
    valued_out: Vec<(u64, oneshot::Sender<Credential>)>,
    zero_out: Vec<oneshot::Sender<Credential>>,
    /// Positive remainder this vertex keeps; requested as an extra
    /// credential in its change slot.
    change: u64,
}

/// Executes a resolved graph: registers every input, reissues along the
/// interior vertices, and registers every output, in dependency order.
///
/// `inputs` and `outputs` must match the graph's input and output vertices
/// one to one, in order. Returns the change credentials that remained
/// with the client.
pub async fn execute_round<H: RequestHandler, R: CryptoRngCore>(
    handler: &H,
    round_id: RoundId,
    clients: &[CredentialClient; TYPE_COUNT],
    graph: &DependencyGraph,
    inputs: &[InputSpec],
    outputs: &[OutputSpec],
    rng: R,
) -> Result<RoundOutcome, RuntimeError> {
    if inputs.len() != graph.inputs().count() || outputs.len() != graph.outputs().count() {
        return Err(RuntimeError::Request(
            "input/output specs do not match the graph".into(),
        ));
    }

    let rng = RefCell::new(rng);
    let outcome = RefCell::new(RoundOutcome::default());

    // One single-shot cell per edge and type.
    let mut senders: [Vec<Option<oneshot::Sender<Credential>>>; TYPE_COUNT] =
        [Vec::new(), Vec::new()];
    let mut receivers: [Vec<Option<oneshot::Receiver<Credential>>>; TYPE_COUNT] =
        [Vec::new(), Vec::new()];
    for credential_type in CredentialType::ALL {
        for _ in graph.edges(credential_type) {
            let (sender, receiver) = oneshot::channel();
            senders[credential_type.index()].push(Some(sender));
            receivers[credential_type.index()].push(Some(receiver));
        }
    }

    let mut tasks = Vec::with_capacity(graph.vertex_count());
    for vertex in graph.vertices() {
        let mut cells: Vec<VertexCells> = Vec::with_capacity(TYPE_COUNT);
        for credential_type in CredentialType::ALL {
            let type_index = credential_type.index();
            let incoming = graph
                .in_edges(credential_type, vertex)
                .map(|(edge, _)| (edge, receivers[type_index][edge].take().expect("one consumer per edge")))
                .collect();
            let mut valued_out = Vec::new();
            let mut zero_out = Vec::new();
            for (edge, data) in graph.out_edges(credential_type, vertex) {
                let sender = senders[type_index][edge].take().expect("one producer per edge");
                if data.value > 0 {
                    valued_out.push((data.value, sender));
                } else {
                    zero_out.push(sender);
                }
            }
            cells.push(VertexCells {
                incoming,
                valued_out,
                zero_out,
                change: graph.balance(credential_type, vertex).max(0) as u64,
            });
        }
        let cells: [VertexCells; TYPE_COUNT] =
            cells.try_into().unwrap_or_else(|_| unreachable!());

        let task = run_vertex(
            handler,
            round_id,
            clients,
            &rng,
            &outcome,
            graph.kind(vertex),
            vertex,
            inputs,
            outputs,
            cells,
        )
        .boxed_local();
        tasks.push(task);
    }

    try_join_all(tasks).await?;
    Ok(outcome.into_inner())
}

#[allow(clippy::too_many_arguments)]
async fn run_vertex<H: RequestHandler, R: CryptoRngCore>(
    handler: &H,
    round_id: RoundId,
    clients: &[CredentialClient; TYPE_COUNT],
    rng: &RefCell<R>,
    outcome: &RefCell<RoundOutcome>,
    kind: VertexKind,
    vertex: VertexId,
    inputs: &[InputSpec],
    outputs: &[OutputSpec],
    mut cells: [VertexCells; TYPE_COUNT],
) -> Result<(), RuntimeError> {
    match kind {
        VertexKind::Input => {
            let spec = &inputs[vertex.index()];

            // Bootstrap: register the input and obtain k zero credentials
            // of each type, to be presented at confirmation.
            let mut bootstrap_validations = Vec::with_capacity(TYPE_COUNT);
            let mut zero_requests = Vec::with_capacity(TYPE_COUNT);
            for client in clients {
                let (request, validation) = client
                    .create_request_for_zero_amount(&mut *rng.borrow_mut())
                    .map_err(RuntimeError::Credential)?;
                zero_requests.push(request);
                bootstrap_validations.push(validation);
            }
            let mut zero_requests = zero_requests.into_iter();
            let registration = InputRegistration {
                round_id,
                outpoint: spec.outpoint.clone(),
                ownership_proof: spec.ownership_proof.clone(),
                zero_amount: zero_requests.next().expect("one per type"),
                zero_vsize: zero_requests.next().expect("one per type"),
            };
            let registered = handler
                .register_input(registration)
                .await
                .map_err(|e| RuntimeError::Request(e.to_string()))?;

            let mut bootstrap = Vec::with_capacity(TYPE_COUNT);
            for ((client, validation), response) in clients
                .iter()
                .zip(bootstrap_validations)
                .zip([&registered.zero_amount, &registered.zero_vsize])
            {
                bootstrap.push(
                    client
                        .handle_response(response, validation)
                        .map_err(RuntimeError::Credential)?,
                );
            }

            // Confirmation: convert the input's value into the credentials
            // this vertex's out-edges carry.
            let mut real = Vec::with_capacity(TYPE_COUNT);
            let mut zero_batches = Vec::with_capacity(TYPE_COUNT);
            for (type_index, client) in clients.iter().enumerate() {
                real.push(build_real_request(
                    client,
                    &cells[type_index],
                    &bootstrap[type_index],
                    rng,
                )?);
                zero_batches.push(build_zero_requests(
                    client,
                    cells[type_index].zero_out.len(),
                    rng,
                )?);
            }
            let (vsize_real, vsize_zero) = (real.pop().unwrap(), zero_batches.pop().unwrap());
            let (amount_real, amount_zero) = (real.pop().unwrap(), zero_batches.pop().unwrap());
            let confirmation = ConnectionConfirmation {
                round_id,
                alice_id: registered.alice_id,
                amount: amount_real.0,
                vsize: vsize_real.0,
                zero_amount: amount_zero.0,
                zero_vsize: vsize_zero.0,
            };
            let confirmed = handler
                .confirm_connection(confirmation)
                .await
                .map_err(|e| RuntimeError::Request(e.to_string()))?;

            let [amount_cells, vsize_cells] = cells;
            fulfill(
                clients,
                CredentialType::Amount,
                amount_cells,
                &confirmed.amount,
                amount_real.1,
                &confirmed.zero_amount,
                amount_zero.1,
                outcome,
            )?;
            fulfill(
                clients,
                CredentialType::Vsize,
                vsize_cells,
                &confirmed.vsize,
                vsize_real.1,
                &confirmed.zero_vsize,
                vsize_zero.1,
                outcome,
            )?;
            Ok(())
        }
        VertexKind::Reissuance => {
            let mut presented = Vec::with_capacity(TYPE_COUNT);
            for type_cells in &mut cells {
                presented.push(collect_incoming(&mut type_cells.incoming).await?);
            }

            let mut real = Vec::with_capacity(TYPE_COUNT);
            let mut zero_batches = Vec::with_capacity(TYPE_COUNT);
            for (type_index, client) in clients.iter().enumerate() {
                real.push(build_real_request(
                    client,
                    &cells[type_index],
                    &presented[type_index],
                    rng,
                )?);
                zero_batches.push(build_zero_requests(
                    client,
                    cells[type_index].zero_out.len(),
                    rng,
                )?);
            }
            let (vsize_real, vsize_zero) = (real.pop().unwrap(), zero_batches.pop().unwrap());
            let (amount_real, amount_zero) = (real.pop().unwrap(), zero_batches.pop().unwrap());
            let request = Reissuance {
                round_id,
                amount: amount_real.0,
                vsize: vsize_real.0,
                zero_amount: amount_zero.0,
                zero_vsize: vsize_zero.0,
            };
            let response = handler
                .reissue(request)
                .await
                .map_err(|e| RuntimeError::Request(e.to_string()))?;

            let [amount_cells, vsize_cells] = cells;
            fulfill(
                clients,
                CredentialType::Amount,
                amount_cells,
                &response.amount,
                amount_real.1,
                &response.zero_amount,
                amount_zero.1,
                outcome,
            )?;
            fulfill(
                clients,
                CredentialType::Vsize,
                vsize_cells,
                &response.vsize,
                vsize_real.1,
                &response.zero_vsize,
                vsize_zero.1,
                outcome,
            )?;
            Ok(())
        }
        VertexKind::Output => {
            let spec = &outputs[vertex.index() - inputs.len()];
            let mut presented = Vec::with_capacity(TYPE_COUNT);
            for type_cells in &mut cells {
                presented.push(collect_incoming(&mut type_cells.incoming).await?);
            }

            let mut real = Vec::with_capacity(TYPE_COUNT);
            for (type_index, client) in clients.iter().enumerate() {
                real.push(
                    client
                        .create_request(&[], &presented[type_index], &mut *rng.borrow_mut())
                        .map_err(RuntimeError::Credential)?,
                );
            }
            let (vsize_real, amount_real) = (real.pop().unwrap(), real.pop().unwrap());
            let request = OutputRegistration {
                round_id,
                script: spec.script.clone(),
                amount: amount_real.0,
                vsize: vsize_real.0,
            };
            let response = handler
                .register_output(request)
                .await
                .map_err(|e| RuntimeError::Request(e.to_string()))?;

            // The issued credentials are all zero-valued; validating the
            // response still matters, discarding the credentials does not.
            clients[CredentialType::Amount.index()]
                .handle_response(&response.amount, amount_real.1)
                .map_err(RuntimeError::Credential)?;
            clients[CredentialType::Vsize.index()]
                .handle_response(&response.vsize, vsize_real.1)
                .map_err(RuntimeError::Credential)?;
            Ok(())
        }
    }
}

async fn collect_incoming(
    incoming: &mut Vec<(usize, oneshot::Receiver<Credential>)>,
) -> Result<Vec<Credential>, RuntimeError> {
    let mut credentials = Vec::with_capacity(incoming.len());
    for (edge, receiver) in incoming.drain(..) {
        let credential = receiver
            .await
            .map_err(|_| RuntimeError::EdgeNotFulfilled { edge })?;
        credentials.push(credential);
    }
    Ok(credentials)
}

type PreparedRequest = (crate::wire::RealCredentialsRequest, RequestValidation);

fn build_real_request<R: CryptoRngCore>(
    client: &CredentialClient,
    cells: &VertexCells,
    presented: &[Credential],
    rng: &RefCell<R>,
) -> Result<PreparedRequest, RuntimeError> {
    let mut values: Vec<u64> = cells.valued_out.iter().map(|(value, _)| *value).collect();
    if cells.change > 0 {
        values.push(cells.change);
    }
    client
        .create_request(&values, presented, &mut *rng.borrow_mut())
        .map_err(RuntimeError::Credential)
}

fn build_zero_requests<R: CryptoRngCore>(
    client: &CredentialClient,
    zero_edges: usize,
    rng: &RefCell<R>,
) -> Result<(Vec<ZeroCredentialsRequest>, Vec<RequestValidation>), RuntimeError> {
    let mut requests = Vec::new();
    let mut validations = Vec::new();
    for _ in 0..zero_edges.div_ceil(K) {
        let (request, validation) = client
            .create_request_for_zero_amount(&mut *rng.borrow_mut())
            .map_err(RuntimeError::Credential)?;
        requests.push(request);
        validations.push(validation);
    }
    Ok((requests, validations))
}

/// Validates the responses for one vertex and type, then passes each
/// credential to its edge cell: valued credentials in edge order, the
/// change credential into the round outcome, zero credentials onto the
/// zero edges.
#[allow(clippy::too_many_arguments)]
fn fulfill(
    clients: &[CredentialClient; TYPE_COUNT],
    credential_type: CredentialType,
    cells: VertexCells,
    response: &CredentialsResponse,
    validation: RequestValidation,
    zero_responses: &[CredentialsResponse],
    zero_validations: Vec<RequestValidation>,
    outcome: &RefCell<RoundOutcome>,
) -> Result<(), RuntimeError> {
    let client = &clients[credential_type.index()];
    let mut credentials = client
        .handle_response(response, validation)
        .map_err(RuntimeError::Credential)?
        .into_iter();

    let had_change = cells.change > 0;
    for (value, sender) in cells.valued_out {
        let credential = credentials.next().expect("one credential per requested value");
        debug_assert_eq!(credential.value(), value);
        // A dropped receiver means the round is already failing; the
        // error surfaces at the consumer.
        let _ = sender.send(credential);
    }
    if had_change {
        let change = credentials.next().expect("change slot was requested");
        outcome.borrow_mut().keep(credential_type, change);
    }

    if zero_responses.len() != zero_validations.len() {
        return Err(RuntimeError::Credential(
            crate::errors::CredentialError::IssuedCredentialNumberMismatch,
        ));
    }
    let mut zeros = Vec::new();
    for (response, validation) in zero_responses.iter().zip(zero_validations) {
        zeros.extend(
            client
                .handle_response(response, validation)
                .map_err(RuntimeError::Credential)?,
        );
    }
    for (sender, credential) in cells.zero_out.into_iter().zip(zeros) {
        let _ = sender.send(credential);
    }
    Ok(())
}
