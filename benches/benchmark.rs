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

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand_core::OsRng;

use wabisabi::graph::{DependencyGraph, RegistrationValues};
use wabisabi::{Credential, CredentialClient, CredentialIssuer, CredentialType};

fn setup() -> (CredentialIssuer, CredentialClient) {
    let issuer = CredentialIssuer::new(CredentialType::Amount, &mut OsRng);
    let client = CredentialClient::new(CredentialType::Amount, issuer.parameters().clone());
    (issuer, client)
}

fn zero_credentials(issuer: &CredentialIssuer, client: &CredentialClient) -> Vec<Credential> {
    let (request, validation) = client.create_request_for_zero_amount(&mut OsRng).unwrap();
    let response = issuer
        .handle_request_for_zero_amount(&request, &mut OsRng)
        .unwrap();
    client.handle_response(&response, validation).unwrap()
}

fn zero_request_benchmark(c: &mut Criterion) {
    let (_, client) = setup();
    c.bench_function("zero_request", |b| {
        b.iter(|| black_box(client.create_request_for_zero_amount(&mut OsRng).unwrap()))
    });
}

fn real_request_benchmark(c: &mut Criterion) {
    let (issuer, client) = setup();
    c.bench_function("real_request", |b| {
        b.iter_batched(
            || zero_credentials(&issuer, &client),
            |zeros| black_box(client.create_request(&[1_000_000], &zeros, &mut OsRng).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn request_verification_benchmark(c: &mut Criterion) {
    let (issuer, client) = setup();
    let issuer = std::cell::RefCell::new(issuer);
    c.bench_function("request_verification", |b| {
        b.iter_batched(
            || {
                let zeros = zero_credentials(&issuer.borrow(), &client);
                client
                    .create_request(&[1_000_000], &zeros, &mut OsRng)
                    .unwrap()
                    .0
            },
            |request| {
                black_box(issuer.borrow_mut().handle_request(&request, &mut OsRng).unwrap())
            },
            BatchSize::SmallInput,
        )
    });
}

fn graph_resolution_benchmark(c: &mut Criterion) {
    let inputs: Vec<RegistrationValues> = (0..10)
        .map(|_| RegistrationValues {
            amount: 1 << 17,
            vsize: 255,
        })
        .collect();
    let outputs: Vec<RegistrationValues> = (0..40)
        .map(|i| RegistrationValues {
            amount: 1 << (12 + (i % 4)),
            vsize: 31,
        })
        .collect();
    c.bench_function("graph_resolution", |b| {
        b.iter(|| black_box(DependencyGraph::resolve(&inputs, &outputs).unwrap()))
    });
}

criterion_group!(
    benches,
    zero_request_benchmark,
    real_request_benchmark,
    request_verification_benchmark,
    graph_resolution_benchmark,
);
criterion_main!(benches);
