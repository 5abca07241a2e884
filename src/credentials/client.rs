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

//! The client side of credential requests.
//!
//! A request is created together with a validation state: the transcript as
//! it stood after proving, plus the secrets of the requested credentials.
//! The coordinator's response is verified against that same transcript, so
//! issuance proofs are bound to the request they answer.

use curve25519_dalek::{RistrettoPoint, Scalar};
use rand_core::CryptoRngCore;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::credentials::statements::{
    balance_point, balance_statement, bit_alternatives, null_statement, request_label,
    requested_statement, show_statement,
};
use crate::credentials::{Credential, CredentialType};
use crate::errors::CredentialError;
use crate::generators::Generators;
use crate::mac::{issuance_statement, IssuerParameters};
use crate::proofs::or::OrProver;
use crate::proofs::{KnowledgeProver, Prover, Verifier};
use crate::transcript::Transcript;
use crate::wire::{
    CredentialRequest, CredentialsResponse, RealCredentialsRequest, ZeroCredentialRequest,
    ZeroCredentialsRequest,
};
use crate::{K, RANGE_WIDTH};

/// Client-side state for one credential type.
#[derive(Clone, Debug)]
pub struct CredentialClient {
    credential_type: CredentialType,
    parameters: IssuerParameters,
}

/// The secrets of one requested credential, kept until the response
/// arrives.
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
struct PendingCredential {
    value: u64,
    serial: Scalar,
    value_blinding: Scalar,
    serial_blinding: Scalar,
    #[zeroize(skip)]
    value_commitment: RistrettoPoint,
    #[zeroize(skip)]
    serial_commitment: RistrettoPoint,
}

/// State needed to validate a [`CredentialsResponse`]; lives from request
/// creation to response handling.
pub struct RequestValidation {
    transcript: Transcript,
    pending: Vec<PendingCredential>,
}

impl std::fmt::Debug for RequestValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestValidation")
            .field("pending", &self.pending)
            .finish()
    }
}

fn random_nonzero(rng: &mut impl CryptoRngCore) -> Scalar {
    loop {
        let scalar = Scalar::random(rng);
        if scalar != Scalar::ZERO {
            break scalar;
        }
    }
}

impl CredentialClient {
    pub fn new(credential_type: CredentialType, parameters: IssuerParameters) -> Self {
        CredentialClient {
            credential_type,
            parameters,
        }
    }

    pub fn credential_type(&self) -> CredentialType {
        self.credential_type
    }

    fn pending_credential(&self, value: u64, rng: &mut impl CryptoRngCore) -> PendingCredential {
        let gens = Generators::standard();
        let serial = random_nonzero(rng);
        let value_blinding = random_nonzero(rng);
        let serial_blinding = random_nonzero(rng);
        PendingCredential {
            value,
            serial,
            value_blinding,
            serial_blinding,
            value_commitment: gens.gg * Scalar::from(value) + gens.gh * value_blinding,
            serial_commitment: gens.gg * serial + gens.gh * serial_blinding,
        }
    }

    /// Builds a request for `k` zero-valued credentials, presenting
    /// nothing. Used to bootstrap the credential pool at input
    /// registration.
    pub fn create_request_for_zero_amount(
        &self,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(ZeroCredentialsRequest, RequestValidation), CredentialError> {
        let pending: Vec<PendingCredential> =
            (0..K).map(|_| self.pending_credential(0, rng)).collect();

        let provers = pending
            .iter()
            .map(|p| {
                KnowledgeProver::new(
                    null_statement(p.value_commitment, p.serial_commitment),
                    vec![p.value_blinding, p.serial, p.serial_blinding],
                )
                .map(Prover::Knowledge)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut transcript =
            Transcript::new(&request_label(self.credential_type, K, true));
        let proof = Prover::Conjunction(provers).prove(&mut transcript, rng)?;

        let request = ZeroCredentialsRequest {
            requested: pending
                .iter()
                .map(|p| ZeroCredentialRequest {
                    value_commitment: p.value_commitment,
                    serial_commitment: p.serial_commitment,
                })
                .collect(),
            proof,
        };
        Ok((request, RequestValidation { transcript, pending }))
    }

    /// Builds a request presenting `k` credentials and asking for new ones
    /// of the given values (padded with zeros to `k`).
    ///
    /// The proof is a conjunction of one show sub-proof per presented
    /// credential, a range sub-proof per requested credential, and one
    /// balance sub-proof binding the declared value delta.
    pub fn create_request(
        &self,
        values: &[u64],
        presented: &[Credential],
        rng: &mut impl CryptoRngCore,
    ) -> Result<(RealCredentialsRequest, RequestValidation), CredentialError> {
        if values.len() > K {
            return Err(CredentialError::TooManyCredentialsRequested { limit: K });
        }
        if presented.len() != K {
            return Err(CredentialError::WrongNumberOfCredentialsPresented {
                expected: K,
                actual: presented.len(),
            });
        }
        for pair in 0..presented.len() {
            for other in pair + 1..presented.len() {
                if bool::from(presented[pair].mac().ct_eq(presented[other].mac())) {
                    return Err(CredentialError::CredentialToPresentDuplicated);
                }
            }
        }
        let mut values = values.to_vec();
        values.resize(K, 0);
        if values.iter().any(|v| *v >= 1u64 << RANGE_WIDTH) {
            return Err(CredentialError::ValueOutOfRange);
        }

        let gens = Generators::standard();
        let mut provers = Vec::with_capacity(2 * K + 1);
        let mut presentations = Vec::with_capacity(K);
        let mut blinding_sum = Scalar::ZERO;
        let mut randomness_delta = Scalar::ZERO;

        for credential in presented {
            let (presentation, witness) = credential.present(rng);
            let z_point = self.parameters.i * witness.z;
            blinding_sum += witness.z;
            randomness_delta += witness.value_blinding;
            provers.push(Prover::Knowledge(KnowledgeProver::new(
                show_statement(&self.parameters, z_point, &presentation),
                witness.as_vec(),
            )?));
            presentations.push(presentation);
        }

        let mut pending = Vec::with_capacity(K);
        let mut requested = Vec::with_capacity(K);
        for &value in &values {
            let credential = self.pending_credential(value, rng);
            randomness_delta -= credential.value_blinding;

            let mut bit_blinding_sum = Scalar::ZERO;
            let mut bit_commitments = Vec::with_capacity(RANGE_WIDTH);
            let mut bit_provers = Vec::with_capacity(RANGE_WIDTH);
            for position in 0..RANGE_WIDTH {
                let bit = (value >> position) & 1;
                let blinding = random_nonzero(rng);
                bit_blinding_sum += Scalar::from(1u64 << position) * blinding;
                let commitment = gens.gg * Scalar::from(bit) + gens.gh * blinding;
                bit_commitments.push(commitment);
                bit_provers.push(Prover::Ring(OrProver::new(
                    bit_alternatives(commitment),
                    bit as usize,
                    vec![blinding],
                )?));
            }

            let difference = credential.value_blinding - bit_blinding_sum;
            let mut block = vec![Prover::Knowledge(KnowledgeProver::new(
                requested_statement(
                    credential.value_commitment,
                    credential.serial_commitment,
                    &bit_commitments,
                ),
                vec![difference, credential.serial, credential.serial_blinding],
            )?)];
            block.extend(bit_provers);
            provers.push(Prover::Conjunction(block));

            requested.push(CredentialRequest {
                value_commitment: credential.value_commitment,
                serial_commitment: credential.serial_commitment,
                bit_commitments,
            });
            pending.push(credential);
        }

        let presented_sum: i64 = presented.iter().map(|c| c.value() as i64).sum();
        let requested_sum: i64 = values.iter().map(|v| *v as i64).sum();
        let delta_value = presented_sum - requested_sum;

        let balance = balance_point(
            &presentations,
            &requested.iter().map(|r| r.value_commitment).collect::<Vec<_>>(),
            delta_value,
        );
        debug_assert_eq!(balance, gens.ga * blinding_sum + gens.gh * randomness_delta);
        provers.push(Prover::Knowledge(KnowledgeProver::new(
            balance_statement(balance),
            vec![blinding_sum, randomness_delta],
        )?));

        let mut transcript =
            Transcript::new(&request_label(self.credential_type, K, false));
        let proof = Prover::Conjunction(provers).prove(&mut transcript, rng)?;

        let request = RealCredentialsRequest {
            delta_value,
            presentations,
            requested,
            proof,
        };
        Ok((request, RequestValidation { transcript, pending }))
    }

    /// Verifies a response against the request's validation state and
    /// materializes the issued credentials, in request order.
    pub fn handle_response(
        &self,
        response: &CredentialsResponse,
        validation: RequestValidation,
    ) -> Result<Vec<Credential>, CredentialError> {
        let RequestValidation {
            mut transcript,
            pending,
        } = validation;
        if response.issued.len() != pending.len() {
            return Err(CredentialError::IssuedCredentialNumberMismatch);
        }

        let verifiers = pending
            .iter()
            .zip(&response.issued)
            .map(|(p, mac)| {
                Verifier::Knowledge(issuance_statement(
                    &self.parameters,
                    &p.value_commitment,
                    &p.serial_commitment,
                    mac,
                ))
            })
            .collect();
        Verifier::Conjunction(verifiers)
            .verify(&mut transcript, &response.proof)
            .map_err(|_| CredentialError::InvalidIssuanceProof)?;

        Ok(pending
            .iter()
            .zip(&response.issued)
            .map(|(p, mac)| {
                Credential::new(
                    p.value,
                    p.serial,
                    p.value_blinding,
                    p.serial_blinding,
                    *mac,
                )
            })
            .collect())
    }
}

/// Credentials held between requests, per credential type.
///
/// Zero-valued credentials accumulate from null requests and fill
/// presentation slots; valued credentials fund outputs.
#[derive(Default)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    pub fn insert(&mut self, credential: Credential) {
        self.credentials.push(credential);
    }

    /// Removes and returns a credential of exactly the given value.
    pub fn take(&mut self, value: u64) -> Option<Credential> {
        let index = self.credentials.iter().position(|c| c.value() == value)?;
        Some(self.credentials.swap_remove(index))
    }

    /// Total value of the held credentials.
    pub fn balance(&self) -> u64 {
        self.credentials.iter().map(Credential::value).sum()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
