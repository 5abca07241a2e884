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

use std::cell::{Cell, RefCell};

use futures::executor::block_on;
use rand_core::OsRng;

use crate::credentials::client::{CredentialClient, CredentialPool};
use crate::credentials::issuer::CredentialIssuer;
use crate::{scalar_from_u64, scalar_to_u64};
use crate::credentials::CredentialType;
use crate::errors::CredentialError;
use crate::graph::runtime::{
    execute_round, InputSpec, OutputSpec, RequestHandler, RoundOutcome,
};
use crate::graph::{DependencyGraph, RegistrationValues};
use crate::wire::{
    ConnectionConfirmation, ConnectionConfirmationResponse, InputRegistration,
    InputRegistrationResponse, OutputRegistration, OutputRegistrationResponse, Reissuance,
    ReissuanceResponse, RoundId, ZeroCredentialsRequest,
};
use crate::{K, RANGE_WIDTH};

/// An in-process coordinator: one issuer per credential type plus request
/// counters for asserting how many network calls a round needs.
struct Coordinator {
    amount: RefCell<CredentialIssuer>,
    vsize: RefCell<CredentialIssuer>,
    next_alice: Cell<u64>,
    input_registrations: Cell<usize>,
    reissuances: Cell<usize>,
    output_registrations: Cell<usize>,
}

impl Coordinator {
    fn new() -> Self {
        Coordinator {
            amount: RefCell::new(CredentialIssuer::new(CredentialType::Amount, &mut OsRng)),
            vsize: RefCell::new(CredentialIssuer::new(CredentialType::Vsize, &mut OsRng)),
            next_alice: Cell::new(0),
            input_registrations: Cell::new(0),
            reissuances: Cell::new(0),
            output_registrations: Cell::new(0),
        }
    }

    fn clients(&self) -> [CredentialClient; 2] {
        [
            CredentialClient::new(
                CredentialType::Amount,
                self.amount.borrow().parameters().clone(),
            ),
            CredentialClient::new(
                CredentialType::Vsize,
                self.vsize.borrow().parameters().clone(),
            ),
        ]
    }

    fn zero_batch(
        issuer: &RefCell<CredentialIssuer>,
        requests: &[ZeroCredentialsRequest],
    ) -> Result<Vec<crate::wire::CredentialsResponse>, CredentialError> {
        requests
            .iter()
            .map(|r| issuer.borrow().handle_request_for_zero_amount(r, &mut OsRng))
            .collect()
    }
}

impl RequestHandler for Coordinator {
    type Error = CredentialError;

    async fn register_input(
        &self,
        request: InputRegistration,
    ) -> Result<InputRegistrationResponse, CredentialError> {
        self.input_registrations
            .set(self.input_registrations.get() + 1);
        let alice_id = self.next_alice.get();
        self.next_alice.set(alice_id + 1);
        Ok(InputRegistrationResponse {
            alice_id,
            zero_amount: self
                .amount
                .borrow()
                .handle_request_for_zero_amount(&request.zero_amount, &mut OsRng)?,
            zero_vsize: self
                .vsize
                .borrow()
                .handle_request_for_zero_amount(&request.zero_vsize, &mut OsRng)?,
        })
    }

    async fn confirm_connection(
        &self,
        request: ConnectionConfirmation,
    ) -> Result<ConnectionConfirmationResponse, CredentialError> {
        Ok(ConnectionConfirmationResponse {
            amount: self
                .amount
                .borrow_mut()
                .handle_request(&request.amount, &mut OsRng)?,
            vsize: self
                .vsize
                .borrow_mut()
                .handle_request(&request.vsize, &mut OsRng)?,
            zero_amount: Self::zero_batch(&self.amount, &request.zero_amount)?,
            zero_vsize: Self::zero_batch(&self.vsize, &request.zero_vsize)?,
        })
    }

    async fn reissue(
        &self,
        request: Reissuance,
    ) -> Result<ReissuanceResponse, CredentialError> {
        self.reissuances.set(self.reissuances.get() + 1);
        Ok(ReissuanceResponse {
            amount: self
                .amount
                .borrow_mut()
                .handle_request(&request.amount, &mut OsRng)?,
            vsize: self
                .vsize
                .borrow_mut()
                .handle_request(&request.vsize, &mut OsRng)?,
            zero_amount: Self::zero_batch(&self.amount, &request.zero_amount)?,
            zero_vsize: Self::zero_batch(&self.vsize, &request.zero_vsize)?,
        })
    }

    async fn register_output(
        &self,
        request: OutputRegistration,
    ) -> Result<OutputRegistrationResponse, CredentialError> {
        self.output_registrations
            .set(self.output_registrations.get() + 1);
        Ok(OutputRegistrationResponse {
            amount: self
                .amount
                .borrow_mut()
                .handle_request(&request.amount, &mut OsRng)?,
            vsize: self
                .vsize
                .borrow_mut()
                .handle_request(&request.vsize, &mut OsRng)?,
        })
    }
}

const OUTPUT_VSIZE: u64 = 69;

fn run_round(
    coordinator: &Coordinator,
    input_amounts: &[u64],
    output_amounts: &[u64],
) -> RoundOutcome {
    // The whole round's vsize budget rides on the first input, sized
    // exactly, so the scenarios below keep their amount-driven shapes.
    let vsize_budget = OUTPUT_VSIZE * output_amounts.len() as u64;
    let inputs: Vec<InputSpec> = input_amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| InputSpec {
            outpoint: vec![i as u8; 36],
            ownership_proof: vec![0xab; 16],
            amount,
            vsize: if i == 0 { vsize_budget } else { 0 },
        })
        .collect();
    let outputs: Vec<OutputSpec> = output_amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| OutputSpec {
            script: vec![0x51, i as u8],
            amount,
            vsize: OUTPUT_VSIZE,
        })
        .collect();

    let graph = DependencyGraph::resolve(
        &inputs
            .iter()
            .map(|s| RegistrationValues {
                amount: s.amount,
                vsize: s.vsize,
            })
            .collect::<Vec<_>>(),
        &outputs
            .iter()
            .map(|s| RegistrationValues {
                amount: s.amount,
                vsize: s.vsize,
            })
            .collect::<Vec<_>>(),
    )
    .unwrap();

    block_on(execute_round(
        coordinator,
        RoundId([7u8; 32]),
        &coordinator.clients(),
        &graph,
        &inputs,
        &outputs,
        OsRng,
    ))
    .unwrap()
}

/// S1: a null request yields k zero-valued credentials with distinct
/// serial numbers.
#[test]
fn null_request_yields_zero_credentials() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();

    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    let credentials = amount_client.handle_response(&response, validation).unwrap();

    assert_eq!(credentials.len(), K);
    assert!(credentials.iter().all(|c| c.value() == 0));
    let (first, second) = (&credentials[0], &credentials[1]);
    assert_ne!(first.serial_commitment(), second.serial_commitment());
}

/// Property 5: requested values come back as credentials, padded with
/// zeros to k.
#[test]
fn credential_round_trip_preserves_values() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();

    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    let zeros = amount_client.handle_response(&response, validation).unwrap();

    let (request, validation) = amount_client
        .create_request(&[250_000], &zeros, &mut OsRng)
        .unwrap();
    assert_eq!(request.delta_value, -250_000);
    let response = coordinator
        .amount
        .borrow_mut()
        .handle_request(&request, &mut OsRng)
        .unwrap();
    let credentials = amount_client.handle_response(&response, validation).unwrap();

    let values: Vec<u64> = credentials.iter().map(|c| c.value()).collect();
    assert_eq!(values, vec![250_000, 0]);
}

/// S2: one input, one output, no reissuance, exactly one request of each
/// kind.
#[test]
fn single_input_single_output_round() {
    let coordinator = Coordinator::new();
    run_round(&coordinator, &[1_000_000], &[1_000_000]);
    assert_eq!(coordinator.input_registrations.get(), 1);
    assert_eq!(coordinator.reissuances.get(), 0);
    assert_eq!(coordinator.output_registrations.get(), 1);
}

/// S3: splitting one input into two outputs needs no reissuance.
#[test]
fn splitting_round() {
    let coordinator = Coordinator::new();
    run_round(&coordinator, &[1_000_000], &[600_000, 400_000]);
    assert_eq!(coordinator.reissuances.get(), 0);
    assert_eq!(coordinator.output_registrations.get(), 2);
}

/// S4: two inputs merge directly; three inputs need exactly one
/// reissuance.
#[test]
fn merging_rounds() {
    let coordinator = Coordinator::new();
    run_round(&coordinator, &[300_000, 700_000], &[1_000_000]);
    assert_eq!(coordinator.reissuances.get(), 0);

    let coordinator = Coordinator::new();
    run_round(&coordinator, &[300_000, 300_000, 400_000], &[1_000_000]);
    assert_eq!(coordinator.input_registrations.get(), 3);
    assert_eq!(coordinator.reissuances.get(), 1);
    assert_eq!(coordinator.output_registrations.get(), 1);
}

/// Change stays with the client when inputs exceed outputs.
#[test]
fn surplus_round_returns_change() {
    let coordinator = Coordinator::new();
    let outcome = run_round(&coordinator, &[1_000_000], &[250_000]);

    let mut pool = CredentialPool::default();
    for credential in outcome.change_amount {
        pool.insert(credential);
    }
    assert_eq!(pool.balance(), 750_000);
    let change = pool.take(750_000).expect("change credential is in the pool");
    assert_eq!(scalar_to_u64(&scalar_from_u64(change.value())), Some(750_000));
    assert!(pool.is_empty());
}

/// S5: tampering with a range-proof bit commitment invalidates the
/// request.
#[test]
fn tampered_bit_commitment_is_rejected() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();

    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    let zeros = amount_client.handle_response(&response, validation).unwrap();

    let (mut request, _) = amount_client
        .create_request(&[65_536], &zeros, &mut OsRng)
        .unwrap();
    let honest = request.requested[0].bit_commitments[0];
    request.requested[0].bit_commitments[0] = honest + honest;
    assert!(coordinator
        .amount
        .borrow_mut()
        .handle_request(&request, &mut OsRng)
        .is_err());
}

/// A declared delta that does not match the hidden values is rejected.
#[test]
fn tampered_delta_is_rejected() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();

    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    let zeros = amount_client.handle_response(&response, validation).unwrap();

    let (mut request, _) = amount_client
        .create_request(&[10_000], &zeros, &mut OsRng)
        .unwrap();
    request.delta_value += 1;
    assert!(coordinator
        .amount
        .borrow_mut()
        .handle_request(&request, &mut OsRng)
        .is_err());
}

/// S6: presenting the same credentials twice produces unlinkable
/// presentations, and the coordinator rejects the second spend.
#[test]
fn presentations_are_unlinkable_and_single_use() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();

    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    let zeros = amount_client.handle_response(&response, validation).unwrap();

    let (first, validation) = amount_client
        .create_request(&[1_000], &zeros, &mut OsRng)
        .unwrap();
    let (second, _) = amount_client
        .create_request(&[1_000], &zeros, &mut OsRng)
        .unwrap();

    // Fresh blinding per show: nothing in the two presentations of the
    // same credential coincides.
    for (a, b) in first.presentations.iter().zip(&second.presentations) {
        assert_eq!(a.serial, b.serial);
        assert_ne!(a.ca, b.ca);
        assert_ne!(a.cs, b.cs);
        assert_ne!(a.cx0, b.cx0);
        assert_ne!(a.cx1, b.cx1);
        assert_ne!(a.cv, b.cv);
    }

    let response = coordinator
        .amount
        .borrow_mut()
        .handle_request(&first, &mut OsRng)
        .unwrap();
    amount_client.handle_response(&response, validation).unwrap();

    assert_eq!(
        coordinator
            .amount
            .borrow_mut()
            .handle_request(&second, &mut OsRng)
            .unwrap_err(),
        CredentialError::SerialNumberAlreadyUsed
    );
}

/// Two rounds over the same input set never collide.
#[test]
fn successive_rounds_are_independent() {
    let coordinator = Coordinator::new();
    run_round(&coordinator, &[500_000, 500_000], &[600_000, 400_000]);
    run_round(&coordinator, &[500_000, 500_000], &[600_000, 400_000]);
    assert_eq!(coordinator.input_registrations.get(), 4);
    assert_eq!(coordinator.output_registrations.get(), 4);
}

#[test]
fn duplicated_presentation_is_rejected_client_side() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();

    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    let zeros = amount_client.handle_response(&response, validation).unwrap();

    let duplicated = vec![zeros[0].clone(), zeros[0].clone()];
    assert_eq!(
        amount_client
            .create_request(&[0], &duplicated, &mut OsRng)
            .unwrap_err(),
        CredentialError::CredentialToPresentDuplicated
    );
}

#[test]
fn out_of_range_value_is_rejected_client_side() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();
    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    let zeros = amount_client.handle_response(&response, validation).unwrap();

    assert_eq!(
        amount_client
            .create_request(&[1u64 << RANGE_WIDTH], &zeros, &mut OsRng)
            .unwrap_err(),
        CredentialError::ValueOutOfRange
    );
}

#[test]
fn truncated_response_is_rejected() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();
    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let mut response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    response.issued.pop();
    assert_eq!(
        amount_client.handle_response(&response, validation).unwrap_err(),
        CredentialError::IssuedCredentialNumberMismatch
    );
}

#[test]
fn tampered_issuance_proof_is_rejected() {
    let coordinator = Coordinator::new();
    let [amount_client, _] = coordinator.clients();
    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let mut response = coordinator
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    // Swap the two issued MACs: the proof no longer matches.
    response.issued.swap(0, 1);
    assert_eq!(
        amount_client.handle_response(&response, validation).unwrap_err(),
        CredentialError::InvalidIssuanceProof
    );
}

/// An issuer with a different key cannot satisfy the client's parameters.
#[test]
fn foreign_issuer_is_rejected() {
    let coordinator = Coordinator::new();
    let foreign = Coordinator::new();
    let [amount_client, _] = coordinator.clients();

    let (request, validation) = amount_client
        .create_request_for_zero_amount(&mut OsRng)
        .unwrap();
    let response = foreign
        .amount
        .borrow()
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    assert_eq!(
        amount_client.handle_response(&response, validation).unwrap_err(),
        CredentialError::InvalidIssuanceProof
    );
}
