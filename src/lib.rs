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

//! # WabiSabi credential core
//!
//! The client-side cryptographic core of an anonymous-credential mixing
//! protocol for Bitcoin coinjoins. Participants register inputs and receive
//! keyed-verification anonymous credentials for two independent attribute
//! types (a monetary amount in satoshis and a virtual-size allowance), then
//! present those credentials unlinkably to register outputs, reissuing
//! intermediate credentials through a dependency graph to reshape amounts.
//!
//! ## WARNING
//!
//! This cryptography is experimental and unaudited. Do not use in production
//! environments without thorough security review.
//!
//! ## Protocol Sequence Diagram
//!
//! ```text
//! ┌──────┐                                  ┌───────────┐
//! │Client│                                  │Coordinator│
//! └──┬───┘                                  └─────┬─────┘
//!    │       ┌────────────────────┐               │
//!    │       │ Input registration │               │
//!    │       └────────────────────┘               │
//!    │ 1. ZeroCredentialsRequest (per type)       │
//!    │ ─────────────────────────────────────────> │
//!    │                                            │ 2. Verify, issue MACs
//!    │ <───────────────────────────────────────── │
//!    │ 3. RealCredentialsRequest presenting       │
//!    │    the zero credentials, delta = −amount   │
//!    │ ─────────────────────────────────────────> │
//!    │                                            │ 4. Verify show, range
//!    │                                            │    and balance proofs,
//!    │                                            │    issue valued MACs
//!    │ <───────────────────────────────────────── │
//!    │       ┌────────────────────┐               │
//!    │       │    Reissuance      │               │
//!    │       └────────────────────┘               │
//!    │ 5. Present k credentials, request k        │
//!    │    recombined ones, delta = 0              │
//!    │ ─────────────────────────────────────────> │
//!    │ <───────────────────────────────────────── │
//!    │       ┌────────────────────┐               │
//!    │       │Output registration │               │
//!    │       └────────────────────┘               │
//!    │ 6. Present credentials summing to the      │
//!    │    output, request zeros, delta = +amount  │
//!    │ ─────────────────────────────────────────> │
//! ┌──┴───┐                                  ┌─────┴─────┐
//! │Client│                                  │Coordinator│
//! └──────┘                                  └───────────┘
//! ```
//!
//! The order of requests, and which credentials fund which, is planned by
//! the [`graph`] module: [`graph::DependencyGraph::resolve`] turns a set of
//! inputs and an output decomposition into a DAG of registration and
//! reissuance requests, and [`graph::runtime::execute_round`] walks that
//! DAG against a caller-supplied request handler.
//!
//! ## Key Concepts
//!
//! - **Coordinator**: issues and verifies credentials with a secret key; its
//!   public [`mac::IssuerParameters`] commit to that key.
//! - **Credential**: a value (amount or vsize), a hidden serial number, and
//!   an algebraic MAC over Pedersen commitments to both. Single use: every
//!   presentation reveals the serial number, so presenting twice is caught.
//! - **Presentation**: a rerandomization of the credential's commitments
//!   that the coordinator can verify with its key but cannot link to the
//!   issuance.

use curve25519_dalek::Scalar;

/// Number of credentials presented and requested per request, per credential
/// type. The protocol fixes this multiplicity; nothing else in the crate
/// assumes its concrete value.
pub const K: usize = 2;

/// The bit width used for binary decomposition of values in range proofs.
/// Covers every representable amount of satoshis (max supply < 2^51).
pub const RANGE_WIDTH: usize = 51;

pub mod credentials;
pub mod errors;
pub mod generators;
pub mod graph;
pub mod mac;
pub mod proofs;
pub mod transcript;
pub mod wire;

pub use credentials::{
    client::CredentialClient, issuer::CredentialIssuer, Credential, CredentialType,
};
pub use errors::{CredentialError, GraphError, ProofError, RuntimeError};
pub use mac::{CoordinatorSecretKey, IssuerParameters, Mac};
pub use transcript::Transcript;

/// Converts a u64 value to a Scalar.
///
/// Every u64 is representable in the scalar field, so the conversion is
/// total.
pub fn scalar_from_u64(value: u64) -> Scalar {
    Scalar::from(value)
}

/// Converts a signed 64-bit value to a Scalar, mapping negative values to
/// the additive inverse of their magnitude.
pub fn scalar_from_i64(value: i64) -> Scalar {
    if value < 0 {
        -Scalar::from(value.unsigned_abs())
    } else {
        Scalar::from(value as u64)
    }
}

/// Attempts to convert a Scalar back to a u64 value.
///
/// Returns `None` if the scalar exceeds the u64 range; wallets use this to
/// decompose credential values for display.
pub fn scalar_to_u64(scalar: &Scalar) -> Option<u64> {
    let bytes = scalar.as_bytes();
    if bytes[8..].iter().all(|&b| b == 0) {
        let mut low = [0u8; 8];
        low.copy_from_slice(&bytes[..8]);
        Some(u64::from_le_bytes(low))
    } else {
        None
    }
}

#[cfg(test)]
mod tests;
