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

//! Linear-relation statements over a shared witness vector.
//!
//! A statement is a system of equations `P_i = Σ_j x_j · G_ij` sharing one
//! witness vector `x`. A generator at infinity excludes the corresponding
//! witness component from that equation.

use curve25519_dalek::traits::{Identity, IsIdentity, MultiscalarMul};
use curve25519_dalek::{RistrettoPoint, Scalar};

use crate::errors::ProofError;

/// One equation of a statement: a public point and its generator row.
#[derive(Clone, Debug)]
pub struct Equation {
    pub public: RistrettoPoint,
    pub generators: Vec<RistrettoPoint>,
}

impl Equation {
    /// `Σ_j scalars_j · G_j` over this equation's generator row.
    pub(crate) fn combine(&self, scalars: &[Scalar]) -> RistrettoPoint {
        RistrettoPoint::multiscalar_mul(scalars, &self.generators)
    }

    /// Checks `Σ_j s_j · G_j == R + e · P`.
    pub(crate) fn verify(
        &self,
        challenge: &Scalar,
        public_nonce: &RistrettoPoint,
        responses: &[Scalar],
    ) -> bool {
        self.combine(responses) == public_nonce + self.public * challenge
    }

    /// Recovers the public nonce `R = Σ_j s_j · G_j − e · P` that makes
    /// random responses verify under a given challenge.
    pub(crate) fn simulate(&self, challenge: &Scalar, responses: &[Scalar]) -> RistrettoPoint {
        self.combine(responses) - self.public * challenge
    }
}

/// A system of equations over a witness vector of fixed length.
#[derive(Clone, Debug)]
pub struct Statement {
    tag: Vec<u8>,
    equations: Vec<Equation>,
    witness_length: usize,
}

impl Statement {
    /// Builds a statement, validating that every equation covers the same
    /// witness vector and that no equation excludes every component.
    pub fn new(tag: &[u8], equations: Vec<Equation>) -> Result<Self, ProofError> {
        let witness_length = equations.first().map_or(0, |eq| eq.generators.len());
        if witness_length == 0 {
            return Err(ProofError::EmptyEquation(0));
        }
        for (index, equation) in equations.iter().enumerate() {
            if equation.generators.len() != witness_length {
                return Err(ProofError::ShapeMismatch);
            }
            if equation.generators.iter().all(|g| g.is_identity()) {
                return Err(ProofError::EmptyEquation(index));
            }
        }
        Ok(Statement {
            tag: tag.to_vec(),
            equations,
            witness_length,
        })
    }

    /// The statement-type identifier absorbed into transcripts.
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn witness_length(&self) -> usize {
        self.witness_length
    }

    /// Public nonces for one secret-nonce vector per equation.
    pub(crate) fn public_nonces(&self, secret_nonces: &[Vec<Scalar>]) -> Vec<RistrettoPoint> {
        self.equations
            .iter()
            .zip(secret_nonces)
            .map(|(equation, nonces)| equation.combine(nonces))
            .collect()
    }

    /// Responses `s_ij = k_ij + e · x_j` for every equation.
    ///
    /// A zero response is rejected rather than emitted; the probability is
    /// negligible for honestly sampled nonces.
    pub(crate) fn respond(
        &self,
        challenge: &Scalar,
        witness: &[Scalar],
        secret_nonces: &[Vec<Scalar>],
    ) -> Result<Vec<Vec<Scalar>>, ProofError> {
        let mut responses = Vec::with_capacity(self.equations.len());
        for nonces in secret_nonces {
            let row: Vec<Scalar> = nonces
                .iter()
                .zip(witness)
                .map(|(nonce, x)| nonce + challenge * x)
                .collect();
            if row.iter().any(|s| *s == Scalar::ZERO) {
                return Err(ProofError::ScalarZeroWhereDisallowed);
            }
            responses.push(row);
        }
        Ok(responses)
    }

    /// Checks every equation of the statement against a proof leaf.
    pub(crate) fn verify(
        &self,
        challenge: &Scalar,
        public_nonces: &[RistrettoPoint],
        responses: &[Vec<Scalar>],
    ) -> bool {
        if public_nonces.len() != self.equations.len() || responses.len() != self.equations.len() {
            return false;
        }
        self.equations
            .iter()
            .zip(public_nonces)
            .zip(responses)
            .all(|((equation, nonce), row)| {
                row.len() == self.witness_length && equation.verify(challenge, nonce, row)
            })
    }

    /// Simulates the statement for a given challenge and response matrix.
    pub(crate) fn simulate(
        &self,
        challenge: &Scalar,
        responses: &[Vec<Scalar>],
    ) -> Vec<RistrettoPoint> {
        self.equations
            .iter()
            .zip(responses)
            .map(|(equation, row)| equation.simulate(challenge, row))
            .collect()
    }
}

/// The generator used to exclude a witness component from an equation.
pub fn excluded() -> RistrettoPoint {
    RistrettoPoint::identity()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::Generators;

    #[test]
    fn respond_then_verify() {
        let gens = Generators::standard();
        let witness = vec![Scalar::from(3u64), Scalar::from(5u64)];
        let statement = Statement::new(
            b"test",
            vec![
                Equation {
                    public: gens.gg * witness[0] + gens.gh * witness[1],
                    generators: vec![gens.gg, gens.gh],
                },
                Equation {
                    public: gens.ga * witness[0],
                    generators: vec![gens.ga, excluded()],
                },
            ],
        )
        .unwrap();

        let secret_nonces = vec![
            vec![Scalar::from(101u64), Scalar::from(102u64)],
            vec![Scalar::from(103u64), Scalar::from(104u64)],
        ];
        let public_nonces = statement.public_nonces(&secret_nonces);
        let challenge = Scalar::from(77u64);
        let responses = statement
            .respond(&challenge, &witness, &secret_nonces)
            .unwrap();
        assert!(statement.verify(&challenge, &public_nonces, &responses));

        let other = Scalar::from(78u64);
        assert!(!statement.verify(&other, &public_nonces, &responses));
    }

    #[test]
    fn simulation_verifies() {
        let gens = Generators::standard();
        let statement = Statement::new(
            b"test",
            vec![Equation {
                public: gens.gg * Scalar::from(9u64),
                generators: vec![gens.gg, gens.gh],
            }],
        )
        .unwrap();
        let challenge = Scalar::from(13u64);
        let responses = vec![vec![Scalar::from(21u64), Scalar::from(34u64)]];
        let nonces = statement.simulate(&challenge, &responses);
        assert!(statement.verify(&challenge, &nonces, &responses));
    }

    #[test]
    fn all_infinity_row_is_invalid() {
        assert_eq!(
            Statement::new(
                b"test",
                vec![Equation {
                    public: Generators::standard().gg,
                    generators: vec![excluded(), excluded()],
                }],
            )
            .unwrap_err(),
            ProofError::EmptyEquation(0)
        );
    }
}
