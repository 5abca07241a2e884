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

//! Error kinds surfaced by the credential core.
//!
//! Cryptographic failures are fatal to the current round. Graph-construction
//! failures indicate a resolver bug and name the violated invariant.

use thiserror::Error;

use crate::credentials::CredentialType;

/// Errors from statement construction and proof verification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProofError {
    /// A point at infinity was about to be committed to a transcript.
    #[error("statement or nonce commits a point at infinity")]
    InfinityInStatement,
    /// A scalar encoding does not reduce below the group order.
    #[error("scalar encoding overflows the group order")]
    ScalarOverflow,
    /// A zero scalar appeared where the protocol forbids one.
    #[error("zero scalar where a nonzero value is required")]
    ScalarZeroWhereDisallowed,
    /// An equation excludes every witness component.
    #[error("equation {0} has no effective generators")]
    EmptyEquation(usize),
    /// The proof tree does not match the shape of the statement tree.
    #[error("proof shape does not match the statement")]
    ShapeMismatch,
    /// A verification equation did not hold; the index identifies the
    /// failing leaf in depth-first order.
    #[error("sub-proof {0} failed verification")]
    VerificationFailed(usize),
}

/// Errors from credential requests, presentations and responses.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// Two presented credentials carry the same MAC.
    #[error("a credential to present is duplicated")]
    CredentialToPresentDuplicated,
    /// The response issued a different number of credentials than requested.
    #[error("issued credential count does not match the request")]
    IssuedCredentialNumberMismatch,
    /// The wrong number of credentials was supplied for presentation.
    #[error("a request must present exactly {expected} credentials, got {actual}")]
    WrongNumberOfCredentialsPresented { expected: usize, actual: usize },
    /// More credential values were requested than a request can carry.
    #[error("at most {limit} credentials can be requested at once")]
    TooManyCredentialsRequested { limit: usize },
    /// A requested value does not fit the range proof width.
    #[error("credential value exceeds the provable range")]
    ValueOutOfRange,
    /// A presented serial number was already registered.
    #[error("serial number already used")]
    SerialNumberAlreadyUsed,
    /// The issuance proof in a response did not verify.
    #[error("invalid issuance proof")]
    InvalidIssuanceProof,
    /// A presented credential's show proof did not verify.
    #[error("invalid show proof")]
    InvalidShowProof,
    /// A requested credential's range proof did not verify.
    #[error("invalid range proof")]
    InvalidRangeProof,
    /// The balance proof did not verify against the declared delta.
    #[error("invalid balance proof")]
    InvalidBalanceProof,
    /// A lower-level proof system error.
    #[error(transparent)]
    Proof(#[from] ProofError),
}

/// Violations of the dependency graph's degree and balance invariants.
///
/// These indicate a bug in the resolver rather than bad peer input, and
/// abort graph construction.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// Adding an edge would exceed a vertex's declared degree bound.
    #[error("vertex {vertex} would exceed its {bound} bound")]
    DegreeExceeded {
        vertex: usize,
        bound: &'static str,
    },
    /// A resolve pass terminated with a vertex still out of balance.
    #[error("vertex {vertex} left with undischarged {credential_type:?} balance {balance}")]
    BalanceNotDischarged {
        vertex: usize,
        credential_type: CredentialType,
        balance: i64,
    },
    /// The sum of outputs exceeds the sum of inputs for a credential type.
    #[error("outputs exceed inputs for {credential_type:?}")]
    InsufficientFunds { credential_type: CredentialType },
}

/// Errors observed while executing a resolved graph against a coordinator.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A vertex's in-edge was dropped before a credential arrived.
    #[error("edge {edge} was never fulfilled")]
    EdgeNotFulfilled { edge: usize },
    /// The request handler reported a protocol error; the round is aborted.
    #[error("request failed: {0}")]
    Request(String),
    /// Building or validating a credential exchange failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}
