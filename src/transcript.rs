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

//! A transcript system for Fiat-Shamir transformations.
//!
//! Wraps a STROBE-128 transcript (merlin) behind the four operations the
//! proof system needs: committing statements, committing public nonces,
//! drawing challenges, and deriving synthetic secret nonces. Cloning yields
//! an independent fork, which the OR composition uses for its ring
//! challenges.

use curve25519_dalek::traits::IsIdentity;
use curve25519_dalek::{RistrettoPoint, Scalar};
use rand_core::CryptoRngCore;

use crate::errors::ProofError;
use crate::proofs::statement::Statement;

/// Domain separation tag prepended to every transcript.
pub const PROTOCOL_TAG: &[u8] = b"WabiSabi_v1.0";

/// A transcript that accumulates protocol messages and produces challenges.
///
/// A transcript lives for exactly one proof session. Both prover and
/// verifier must feed it identical bytes in identical order for the derived
/// challenges to agree.
#[derive(Clone)]
pub struct Transcript(merlin::Transcript);

impl Transcript {
    /// Creates a new transcript under the protocol tag and a caller label.
    ///
    /// The label domain-separates proof sessions; credential requests encode
    /// the credential multiplicity and whether the request is a null request
    /// into it.
    pub fn new(label: &[u8]) -> Self {
        let mut inner = merlin::Transcript::new(PROTOCOL_TAG);
        inner.append_message(b"dom-sep", label);
        Transcript(inner)
    }

    /// Commits a statement: its tag, the number of equations, and for each
    /// equation the public point followed by the ordered generators.
    ///
    /// A public point at infinity is rejected before anything is hashed.
    /// Generators at infinity are allowed; they are the sentinel that
    /// excludes a witness component from an equation and absorb as the
    /// canonical all-zero encoding.
    pub fn commit_statement(&mut self, statement: &Statement) -> Result<(), ProofError> {
        self.0.append_message(b"statement", statement.tag());
        self.append_count(b"equations", statement.equations().len());
        for equation in statement.equations() {
            if equation.public.is_identity() {
                return Err(ProofError::InfinityInStatement);
            }
            self.0
                .append_message(b"public", equation.public.compress().as_bytes());
            self.append_count(b"generators", equation.generators.len());
            for generator in &equation.generators {
                self.0
                    .append_message(b"generator", generator.compress().as_bytes());
            }
        }
        Ok(())
    }

    /// Commits the public nonces of one sub-proof.
    ///
    /// Infinity is rejected: a nonce commitment at infinity would collapse
    /// the verification equation.
    pub fn commit_public_nonces(&mut self, nonces: &[RistrettoPoint]) -> Result<(), ProofError> {
        self.append_count(b"nonce_commitment", nonces.len());
        for nonce in nonces {
            if nonce.is_identity() {
                return Err(ProofError::InfinityInStatement);
            }
            self.0
                .append_message(b"nonce", nonce.compress().as_bytes());
        }
        Ok(())
    }

    /// Draws a challenge scalar from the current transcript state.
    pub fn challenge(&mut self) -> Scalar {
        let mut buf = [0u8; 64];
        self.0.challenge_bytes(b"challenge", &mut buf);
        Scalar::from_bytes_mod_order_wide(&buf)
    }

    /// Derives `count` synthetic secret nonces.
    ///
    /// The transcript state is forked; each witness scalar is absorbed as
    /// key material, then 32 bytes of external randomness. The resulting
    /// nonces therefore depend on everything committed so far, on the
    /// witness, and on the randomness source. Should the randomness source
    /// fail, nonces degrade to deterministic ones, which stay safe unless
    /// the same witness is reused over an identical transcript.
    pub fn secret_nonces(
        &self,
        rng: &mut impl CryptoRngCore,
        witness: &[Scalar],
        count: usize,
    ) -> Vec<Scalar> {
        let mut builder = self.0.build_rng();
        for scalar in witness {
            builder = builder.rekey_with_witness_bytes(b"witness", scalar.as_bytes());
        }
        let mut nonce_rng = builder.finalize(rng);
        (0..count)
            .map(|_| loop {
                let nonce = Scalar::random(&mut nonce_rng);
                if nonce != Scalar::ZERO {
                    break nonce;
                }
            })
            .collect()
    }

    fn append_count(&mut self, label: &'static [u8], count: usize) {
        // Length prefixes are fixed 32-bit little-endian on every
        // implementation; a mismatch here is protocol-breaking.
        self.0.append_message(label, &(count as u32).to_le_bytes());
    }
}
