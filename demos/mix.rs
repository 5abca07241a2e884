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

//! Runs one full mixing round against an in-process coordinator: three
//! inputs are consolidated into one output, which forces a reissuance.

use std::cell::RefCell;

use futures::executor::block_on;
use rand_core::OsRng;

use wabisabi::errors::CredentialError;
use wabisabi::graph::runtime::{execute_round, InputSpec, OutputSpec, RequestHandler};
use wabisabi::graph::{DependencyGraph, RegistrationValues, VertexKind};
use wabisabi::wire::{
    ConnectionConfirmation, ConnectionConfirmationResponse, CredentialsResponse,
    InputRegistration, InputRegistrationResponse, OutputRegistration,
    OutputRegistrationResponse, Reissuance, ReissuanceResponse, RoundId,
    ZeroCredentialsRequest,
};
use wabisabi::{CredentialClient, CredentialIssuer, CredentialType};

struct Coordinator {
    amount: RefCell<CredentialIssuer>,
    vsize: RefCell<CredentialIssuer>,
}

impl Coordinator {
    fn zero_batch(
        issuer: &RefCell<CredentialIssuer>,
        requests: &[ZeroCredentialsRequest],
    ) -> Result<Vec<CredentialsResponse>, CredentialError> {
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
        println!("coordinator: input registered ({} byte outpoint)", request.outpoint.len());
        Ok(InputRegistrationResponse {
            alice_id: 0,
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
        println!(
            "coordinator: connection confirmed (amount delta {})",
            request.amount.delta_value
        );
        Ok(ConnectionConfirmationResponse {
            amount: self.amount.borrow_mut().handle_request(&request.amount, &mut OsRng)?,
            vsize: self.vsize.borrow_mut().handle_request(&request.vsize, &mut OsRng)?,
            zero_amount: Self::zero_batch(&self.amount, &request.zero_amount)?,
            zero_vsize: Self::zero_batch(&self.vsize, &request.zero_vsize)?,
        })
    }

    async fn reissue(&self, request: Reissuance) -> Result<ReissuanceResponse, CredentialError> {
        println!("coordinator: reissuance");
        Ok(ReissuanceResponse {
            amount: self.amount.borrow_mut().handle_request(&request.amount, &mut OsRng)?,
            vsize: self.vsize.borrow_mut().handle_request(&request.vsize, &mut OsRng)?,
            zero_amount: Self::zero_batch(&self.amount, &request.zero_amount)?,
            zero_vsize: Self::zero_batch(&self.vsize, &request.zero_vsize)?,
        })
    }

    async fn register_output(
        &self,
        request: OutputRegistration,
    ) -> Result<OutputRegistrationResponse, CredentialError> {
        println!(
            "coordinator: output registered (amount delta {})",
            request.amount.delta_value
        );
        Ok(OutputRegistrationResponse {
            amount: self.amount.borrow_mut().handle_request(&request.amount, &mut OsRng)?,
            vsize: self.vsize.borrow_mut().handle_request(&request.vsize, &mut OsRng)?,
        })
    }
}

fn main() {
    let coordinator = Coordinator {
        amount: RefCell::new(CredentialIssuer::new(CredentialType::Amount, &mut OsRng)),
        vsize: RefCell::new(CredentialIssuer::new(CredentialType::Vsize, &mut OsRng)),
    };
    let clients = [
        CredentialClient::new(
            CredentialType::Amount,
            coordinator.amount.borrow().parameters().clone(),
        ),
        CredentialClient::new(
            CredentialType::Vsize,
            coordinator.vsize.borrow().parameters().clone(),
        ),
    ];

    let inputs: Vec<InputSpec> = [300_000u64, 300_000, 400_000]
        .iter()
        .enumerate()
        .map(|(i, &amount)| InputSpec {
            outpoint: vec![i as u8; 36],
            ownership_proof: vec![0xab; 16],
            amount,
            vsize: 255,
        })
        .collect();
    let outputs = vec![OutputSpec {
        script: vec![0x51],
        amount: 1_000_000,
        vsize: 69,
    }];

    println!("resolving dependency graph...");
    let graph = DependencyGraph::resolve(
        &inputs
            .iter()
            .map(|s| RegistrationValues { amount: s.amount, vsize: s.vsize })
            .collect::<Vec<_>>(),
        &outputs
            .iter()
            .map(|s| RegistrationValues { amount: s.amount, vsize: s.vsize })
            .collect::<Vec<_>>(),
    )
    .expect("decomposition is balanced");
    println!(
        "graph: {} vertices, {} reissuance",
        graph.vertex_count(),
        graph
            .vertices()
            .filter(|&v| graph.kind(v) == VertexKind::Reissuance)
            .count()
    );

    println!("executing round...");
    let outcome = block_on(execute_round(
        &coordinator,
        RoundId([1u8; 32]),
        &clients,
        &graph,
        &inputs,
        &outputs,
        OsRng,
    ))
    .expect("round succeeds");

    println!(
        "round complete; {} change credentials kept",
        outcome.change_amount.len() + outcome.change_vsize.len()
    );
}
