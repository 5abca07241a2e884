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

//! Non-interactive proofs of knowledge for linear relations, composed by
//! conjunction and by witness-indistinguishable disjunction.
//!
//! Proving runs in three phases locked by the caller: every sub-proof
//! commits its statement, every sub-proof commits its public nonces, then a
//! single challenge is drawn and every sub-proof responds. The shared
//! challenge binds the conjuncts of an AND; an OR runs its
//! Abe–Ohkubo–Suzuki ring during the nonce phase and is bound through its
//! absorbed nonces.

use curve25519_dalek::{RistrettoPoint, Scalar};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use crate::errors::ProofError;
use crate::transcript::Transcript;

pub mod or;
pub mod statement;

use or::{OrProver, OrVerifier};
use statement::Statement;

/// The responses of one proved statement: a public nonce per equation and a
/// response per equation per witness component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeProof {
    pub public_nonces: Vec<RistrettoPoint>,
    pub responses: Vec<Vec<Scalar>>,
}

/// A proof tree mirroring the statement tree it was produced for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proof {
    /// A single proved statement.
    Knowledge(KnowledgeProof),
    /// An AND of sub-proofs sharing one challenge.
    Conjunction(Vec<Proof>),
    /// An OR ring; one alternative per statement, all verifying.
    Ring(Vec<KnowledgeProof>),
}

/// Prover for a single statement with a known witness.
pub struct KnowledgeProver {
    statement: Statement,
    witness: Vec<Scalar>,
    secret_nonces: Vec<Vec<Scalar>>,
    public_nonces: Vec<RistrettoPoint>,
}

impl KnowledgeProver {
    pub fn new(statement: Statement, witness: Vec<Scalar>) -> Result<Self, ProofError> {
        if witness.len() != statement.witness_length() {
            return Err(ProofError::ShapeMismatch);
        }
        debug_assert!(statement
            .equations()
            .iter()
            .all(|eq| eq.combine(&witness) == eq.public));
        Ok(KnowledgeProver {
            statement,
            witness,
            secret_nonces: Vec::new(),
            public_nonces: Vec::new(),
        })
    }
}

/// A composable prover: leaf, conjunction, or disjunction ring.
pub enum Prover {
    Knowledge(KnowledgeProver),
    Conjunction(Vec<Prover>),
    Ring(OrProver),
}

impl Prover {
    /// Phase one: absorb every statement in the tree.
    pub fn commit_statements(&self, transcript: &mut Transcript) -> Result<(), ProofError> {
        match self {
            Prover::Knowledge(prover) => transcript.commit_statement(&prover.statement),
            Prover::Conjunction(provers) => {
                for prover in provers {
                    prover.commit_statements(transcript)?;
                }
                Ok(())
            }
            Prover::Ring(prover) => prover.commit_statements(transcript),
        }
    }

    /// Phase two: derive synthetic secret nonces and absorb the public
    /// ones. Rings additionally run their full rotation here, so that
    /// containing conjunctions see the complete ring.
    pub fn commit_nonces(
        &mut self,
        transcript: &mut Transcript,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(), ProofError> {
        match self {
            Prover::Knowledge(prover) => {
                prover.secret_nonces = prover
                    .statement
                    .equations()
                    .iter()
                    .map(|_| {
                        transcript.secret_nonces(
                            rng,
                            &prover.witness,
                            prover.statement.witness_length(),
                        )
                    })
                    .collect();
                prover.public_nonces = prover.statement.public_nonces(&prover.secret_nonces);
                transcript.commit_public_nonces(&prover.public_nonces)
            }
            Prover::Conjunction(provers) => {
                for prover in provers.iter_mut() {
                    prover.commit_nonces(transcript, rng)?;
                }
                Ok(())
            }
            Prover::Ring(prover) => prover.commit_nonces(transcript, rng),
        }
    }

    /// Phase three: compute responses under the shared challenge.
    pub fn respond(&mut self, challenge: &Scalar) -> Result<Proof, ProofError> {
        match self {
            Prover::Knowledge(prover) => {
                let responses = prover.statement.respond(
                    challenge,
                    &prover.witness,
                    &prover.secret_nonces,
                )?;
                Ok(Proof::Knowledge(KnowledgeProof {
                    public_nonces: prover.public_nonces.clone(),
                    responses,
                }))
            }
            Prover::Conjunction(provers) => {
                let mut proofs = Vec::with_capacity(provers.len());
                for prover in provers.iter_mut() {
                    proofs.push(prover.respond(challenge)?);
                }
                Ok(Proof::Conjunction(proofs))
            }
            Prover::Ring(prover) => prover.respond(),
        }
    }

    /// Runs all three phases over one transcript.
    pub fn prove(
        mut self,
        transcript: &mut Transcript,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Proof, ProofError> {
        self.commit_statements(transcript)?;
        self.commit_nonces(transcript, rng)?;
        let challenge = transcript.challenge();
        self.respond(&challenge)
    }
}

/// A composable verifier mirroring [`Prover`].
pub enum Verifier {
    Knowledge(Statement),
    Conjunction(Vec<Verifier>),
    Ring(OrVerifier),
}

impl Verifier {
    fn commit_statements(&self, transcript: &mut Transcript) -> Result<(), ProofError> {
        match self {
            Verifier::Knowledge(statement) => transcript.commit_statement(statement),
            Verifier::Conjunction(verifiers) => {
                for verifier in verifiers {
                    verifier.commit_statements(transcript)?;
                }
                Ok(())
            }
            Verifier::Ring(verifier) => verifier.commit_statements(transcript),
        }
    }

    fn commit_nonces(
        &mut self,
        transcript: &mut Transcript,
        proof: &Proof,
    ) -> Result<(), ProofError> {
        match (self, proof) {
            (Verifier::Knowledge(statement), Proof::Knowledge(leaf)) => {
                if leaf.public_nonces.len() != statement.equations().len() {
                    return Err(ProofError::ShapeMismatch);
                }
                transcript.commit_public_nonces(&leaf.public_nonces)
            }
            (Verifier::Conjunction(verifiers), Proof::Conjunction(proofs)) => {
                if verifiers.len() != proofs.len() {
                    return Err(ProofError::ShapeMismatch);
                }
                for (verifier, proof) in verifiers.iter_mut().zip(proofs) {
                    verifier.commit_nonces(transcript, proof)?;
                }
                Ok(())
            }
            (Verifier::Ring(verifier), Proof::Ring(ring)) => {
                verifier.commit_nonces(transcript, ring)
            }
            _ => Err(ProofError::ShapeMismatch),
        }
    }

    fn check(
        &self,
        challenge: &Scalar,
        proof: &Proof,
        leaf_index: &mut usize,
    ) -> Result<(), ProofError> {
        match (self, proof) {
            (Verifier::Knowledge(statement), Proof::Knowledge(leaf)) => {
                let index = *leaf_index;
                *leaf_index += 1;
                if statement.verify(challenge, &leaf.public_nonces, &leaf.responses) {
                    Ok(())
                } else {
                    Err(ProofError::VerificationFailed(index))
                }
            }
            (Verifier::Conjunction(verifiers), Proof::Conjunction(proofs)) => {
                for (verifier, proof) in verifiers.iter().zip(proofs) {
                    verifier.check(challenge, proof, leaf_index)?;
                }
                Ok(())
            }
            (Verifier::Ring(verifier), Proof::Ring(ring)) => {
                let index = *leaf_index;
                *leaf_index += 1;
                verifier.check(ring).map_err(|_| ProofError::VerificationFailed(index))
            }
            _ => Err(ProofError::ShapeMismatch),
        }
    }

    /// Verifies a proof tree over one transcript, mirroring the prover's
    /// phases. On failure the error carries the depth-first index of the
    /// offending sub-proof.
    pub fn verify(mut self, transcript: &mut Transcript, proof: &Proof) -> Result<(), ProofError> {
        self.commit_statements(transcript)?;
        self.commit_nonces(transcript, proof)?;
        let challenge = transcript.challenge();
        self.check(&challenge, proof, &mut 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::Generators;
    use crate::proofs::statement::{excluded, Equation};
    use rand_core::OsRng;

    fn pedersen_statement(value: u64, blinding: u64) -> (Statement, Vec<Scalar>) {
        let gens = Generators::standard();
        let witness = vec![Scalar::from(value), Scalar::from(blinding)];
        let statement = Statement::new(
            b"pedersen",
            vec![Equation {
                public: gens.gg * witness[0] + gens.gh * witness[1],
                generators: vec![gens.gg, gens.gh],
            }],
        )
        .unwrap();
        (statement, witness)
    }

    #[test]
    fn knowledge_round_trip() {
        let (statement, witness) = pedersen_statement(42, 1001);
        let prover = Prover::Knowledge(KnowledgeProver::new(statement.clone(), witness).unwrap());
        let mut transcript = Transcript::new(b"unit");
        let proof = prover.prove(&mut transcript, &mut OsRng).unwrap();

        let mut transcript = Transcript::new(b"unit");
        Verifier::Knowledge(statement)
            .verify(&mut transcript, &proof)
            .unwrap();
    }

    #[test]
    fn verification_needs_matching_transcripts() {
        let (statement, witness) = pedersen_statement(42, 1001);
        let prover = Prover::Knowledge(KnowledgeProver::new(statement.clone(), witness).unwrap());
        let mut transcript = Transcript::new(b"unit");
        let proof = prover.prove(&mut transcript, &mut OsRng).unwrap();

        let mut transcript = Transcript::new(b"different");
        assert!(Verifier::Knowledge(statement)
            .verify(&mut transcript, &proof)
            .is_err());
    }

    #[test]
    fn conjunction_binds_sub_proofs() {
        let (first, first_witness) = pedersen_statement(1, 2);
        let (second, second_witness) = pedersen_statement(3, 4);
        let prover = Prover::Conjunction(vec![
            Prover::Knowledge(KnowledgeProver::new(first.clone(), first_witness).unwrap()),
            Prover::Knowledge(KnowledgeProver::new(second.clone(), second_witness).unwrap()),
        ]);
        let mut transcript = Transcript::new(b"unit");
        let proof = prover.prove(&mut transcript, &mut OsRng).unwrap();

        let mut transcript = Transcript::new(b"unit");
        Verifier::Conjunction(vec![
            Verifier::Knowledge(first.clone()),
            Verifier::Knowledge(second.clone()),
        ])
        .verify(&mut transcript, &proof)
        .unwrap();

        // Swapping the conjunct order must fail: the challenge binds it.
        let mut transcript = Transcript::new(b"unit");
        let swapped = Verifier::Conjunction(vec![
            Verifier::Knowledge(second),
            Verifier::Knowledge(first),
        ]);
        assert!(swapped.verify(&mut transcript, &proof).is_err());
    }

    #[test]
    fn tampered_response_is_rejected_with_leaf_index() {
        let (first, first_witness) = pedersen_statement(1, 2);
        let (second, second_witness) = pedersen_statement(3, 4);
        let prover = Prover::Conjunction(vec![
            Prover::Knowledge(KnowledgeProver::new(first.clone(), first_witness).unwrap()),
            Prover::Knowledge(KnowledgeProver::new(second.clone(), second_witness).unwrap()),
        ]);
        let mut transcript = Transcript::new(b"unit");
        let mut proof = prover.prove(&mut transcript, &mut OsRng).unwrap();

        if let Proof::Conjunction(parts) = &mut proof {
            if let Proof::Knowledge(leaf) = &mut parts[1] {
                leaf.responses[0][0] += Scalar::ONE;
            }
        }

        let mut transcript = Transcript::new(b"unit");
        let result = Verifier::Conjunction(vec![
            Verifier::Knowledge(first),
            Verifier::Knowledge(second),
        ])
        .verify(&mut transcript, &proof);
        assert_eq!(result, Err(ProofError::VerificationFailed(1)));
    }

    #[test]
    fn shared_witness_across_equations() {
        let gens = Generators::standard();
        let x = Scalar::from(12u64);
        let r = Scalar::from(99u64);
        // Same x ties both equations; the second excludes r.
        let statement = Statement::new(
            b"dleq",
            vec![
                Equation {
                    public: gens.gg * x + gens.gh * r,
                    generators: vec![gens.gg, gens.gh],
                },
                Equation {
                    public: gens.ga * x,
                    generators: vec![gens.ga, excluded()],
                },
            ],
        )
        .unwrap();
        let prover =
            Prover::Knowledge(KnowledgeProver::new(statement.clone(), vec![x, r]).unwrap());
        let mut transcript = Transcript::new(b"unit");
        let proof = prover.prove(&mut transcript, &mut OsRng).unwrap();
        let mut transcript = Transcript::new(b"unit");
        Verifier::Knowledge(statement)
            .verify(&mut transcript, &proof)
            .unwrap();
    }
}
