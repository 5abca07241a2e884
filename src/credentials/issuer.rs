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

//! The coordinator side of credential requests.
//!
//! Verifies request proofs with the secret key, tracks presented serial
//! numbers to reject double spends, issues MACs, and proves correct
//! issuance back to the client over the shared transcript.

use std::collections::HashSet;

use curve25519_dalek::RistrettoPoint;
use rand_core::CryptoRngCore;

use crate::credentials::statements::{
    balance_point, balance_statement, bit_alternatives, classify_leaf, null_statement,
    request_label, requested_statement, show_statement, RequestProofRole,
};
use crate::credentials::CredentialType;
use crate::errors::{CredentialError, ProofError};
use crate::mac::{issuance_statement, CoordinatorSecretKey};
use crate::proofs::or::OrVerifier;
use crate::proofs::{KnowledgeProver, Prover, Verifier};
use crate::transcript::Transcript;
use crate::wire::{CredentialsResponse, RealCredentialsRequest, ZeroCredentialsRequest};
use crate::{IssuerParameters, K, RANGE_WIDTH};

/// A credential issuer for one credential type.
pub struct CredentialIssuer {
    secret: CoordinatorSecretKey,
    credential_type: CredentialType,
    used_serials: HashSet<[u8; 32]>,
}

impl CredentialIssuer {
    pub fn new(credential_type: CredentialType, rng: &mut impl CryptoRngCore) -> Self {
        CredentialIssuer {
            secret: CoordinatorSecretKey::random(rng),
            credential_type,
            used_serials: HashSet::new(),
        }
    }

    pub fn parameters(&self) -> &IssuerParameters {
        self.secret.parameters()
    }

    /// Verifies and answers a request for zero-valued credentials.
    pub fn handle_request_for_zero_amount(
        &self,
        request: &ZeroCredentialsRequest,
        rng: &mut impl CryptoRngCore,
    ) -> Result<CredentialsResponse, CredentialError> {
        if request.requested.len() != K {
            return Err(CredentialError::IssuedCredentialNumberMismatch);
        }
        let verifiers = request
            .requested
            .iter()
            .map(|r| {
                Verifier::Knowledge(null_statement(r.value_commitment, r.serial_commitment))
            })
            .collect();

        let mut transcript =
            Transcript::new(&request_label(self.credential_type, K, true));
        Verifier::Conjunction(verifiers).verify(&mut transcript, &request.proof)?;

        let commitments: Vec<_> = request
            .requested
            .iter()
            .map(|r| (r.value_commitment, r.serial_commitment))
            .collect();
        self.issue(&commitments, &mut transcript, rng)
    }

    /// Verifies and answers a real request: the show proofs of the
    /// presented credentials, the range proofs of the requested ones, and
    /// the balance proof, all over one transcript.
    ///
    /// Serial numbers are registered only after the whole request
    /// verifies.
    pub fn handle_request(
        &mut self,
        request: &RealCredentialsRequest,
        rng: &mut impl CryptoRngCore,
    ) -> Result<CredentialsResponse, CredentialError> {
        if request.presentations.len() != K {
            return Err(CredentialError::WrongNumberOfCredentialsPresented {
                expected: K,
                actual: request.presentations.len(),
            });
        }
        if request.requested.len() != K
            || request
                .requested
                .iter()
                .any(|r| r.bit_commitments.len() != RANGE_WIDTH)
        {
            return Err(CredentialError::IssuedCredentialNumberMismatch);
        }

        let serials: Vec<[u8; 32]> = request
            .presentations
            .iter()
            .map(|p| p.serial.to_bytes())
            .collect();
        for (index, serial) in serials.iter().enumerate() {
            if self.used_serials.contains(serial) || serials[..index].contains(serial) {
                return Err(CredentialError::SerialNumberAlreadyUsed);
            }
        }

        let mut verifiers = Vec::with_capacity(2 * K + 1);
        for presentation in &request.presentations {
            let z_point = self.secret.presentation_z(
                &presentation.cv,
                &presentation.cx0,
                &presentation.cx1,
                &presentation.ca,
                &presentation.cs,
            );
            verifiers.push(Verifier::Knowledge(show_statement(
                self.parameters(),
                z_point,
                presentation,
            )));
        }
        for requested in &request.requested {
            let mut block = vec![Verifier::Knowledge(requested_statement(
                requested.value_commitment,
                requested.serial_commitment,
                &requested.bit_commitments,
            ))];
            for commitment in &requested.bit_commitments {
                block.push(Verifier::Ring(OrVerifier::new(bit_alternatives(
                    *commitment,
                ))?));
            }
            verifiers.push(Verifier::Conjunction(block));
        }
        let balance = balance_point(
            &request.presentations,
            &request
                .requested
                .iter()
                .map(|r| r.value_commitment)
                .collect::<Vec<_>>(),
            request.delta_value,
        );
        verifiers.push(Verifier::Knowledge(balance_statement(balance)));

        let mut transcript =
            Transcript::new(&request_label(self.credential_type, K, false));
        Verifier::Conjunction(verifiers)
            .verify(&mut transcript, &request.proof)
            .map_err(|error| match error {
                ProofError::VerificationFailed(leaf) => match classify_leaf(leaf, K) {
                    RequestProofRole::Show => CredentialError::InvalidShowProof,
                    RequestProofRole::Range => CredentialError::InvalidRangeProof,
                    RequestProofRole::Balance => CredentialError::InvalidBalanceProof,
                },
                other => CredentialError::Proof(other),
            })?;

        self.used_serials.extend(serials);

        let commitments: Vec<_> = request
            .requested
            .iter()
            .map(|r| (r.value_commitment, r.serial_commitment))
            .collect();
        self.issue(&commitments, &mut transcript, rng)
    }

    /// Issues one MAC per commitment pair and proves correct issuance on
    /// the shared transcript.
    fn issue(
        &self,
        commitments: &[(RistrettoPoint, RistrettoPoint)],
        transcript: &mut Transcript,
        rng: &mut impl CryptoRngCore,
    ) -> Result<CredentialsResponse, CredentialError> {
        let issued: Vec<_> = commitments
            .iter()
            .map(|(ma, ms)| self.secret.compute_mac(ma, ms, rng))
            .collect();

        let provers = issued
            .iter()
            .zip(commitments)
            .map(|(mac, (ma, ms))| {
                KnowledgeProver::new(
                    issuance_statement(self.parameters(), ma, ms, mac),
                    self.secret.issuance_witness(),
                )
                .map(Prover::Knowledge)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let proof = Prover::Conjunction(provers).prove(transcript, rng)?;

        Ok(CredentialsResponse { issued, proof })
    }
}
