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

//! The statements composed into credential request proofs.
//!
//! Client and issuer must build identical statement trees in identical
//! order; everything that defines that order lives here.

use curve25519_dalek::traits::MultiscalarMul;
use curve25519_dalek::{RistrettoPoint, Scalar};

use crate::credentials::{CredentialType, Presentation};
use crate::generators::Generators;
use crate::mac::IssuerParameters;
use crate::proofs::statement::{excluded, Equation, Statement};
use crate::scalar_from_i64;
use crate::RANGE_WIDTH;

/// Transcript label for a credential request proof session.
///
/// Encodes the credential type, the multiplicity `k`, and whether this is a
/// null (zero-value) request.
pub(crate) fn request_label(
    credential_type: CredentialType,
    k: usize,
    is_null: bool,
) -> Vec<u8> {
    format!("UnifiedRegistration/{credential_type:?}/{k}/{is_null}").into_bytes()
}

/// The show statement for one presented credential.
///
/// Witness `(z, z0, t, a, ra, rs)` with `z0 = −t·z`:
///
/// ```text
/// Z         = z·I
/// Cx1       = z·Gx1 + z0·Gx0 + t·Cx0
/// Ca        = z·Ga + a·Gg + ra·Gh
/// Cs − s·Gg = z·Gs + rs·Gh
/// ```
///
/// The prover computes `Z = z·I`; the coordinator recomputes it from its
/// secret key, which is what makes verification keyed.
pub(crate) fn show_statement(
    parameters: &IssuerParameters,
    z: RistrettoPoint,
    presentation: &Presentation,
) -> Statement {
    let gens = Generators::standard();
    let o = excluded();
    Statement::new(
        b"show",
        vec![
            Equation {
                public: z,
                generators: vec![parameters.i, o, o, o, o, o],
            },
            Equation {
                public: presentation.cx1,
                generators: vec![gens.gx1, gens.gx0, presentation.cx0, o, o, o],
            },
            Equation {
                public: presentation.ca,
                generators: vec![gens.ga, o, o, gens.gg, gens.gh, o],
            },
            Equation {
                public: presentation.cs - gens.gg * presentation.serial,
                generators: vec![gens.gs, o, o, o, o, gens.gh],
            },
        ],
    )
    .expect("show statement rows are never empty")
}

/// The statement for one requested credential: the bit-sum tie and the
/// serial commitment opening, over witness `(d, s, rs)`.
///
/// `D = Ma − Σ 2^j·A_j` collects the randomness difference `d`; proving it
/// opens over `Gh` alone ties the value committed in `Ma` to the bits, and
/// the per-bit OR proofs (built separately) bound each bit to {0, 1}.
pub(crate) fn requested_statement(
    value_commitment: RistrettoPoint,
    serial_commitment: RistrettoPoint,
    bit_commitments: &[RistrettoPoint],
) -> Statement {
    let gens = Generators::standard();
    let o = excluded();
    Statement::new(
        b"requested",
        vec![
            Equation {
                public: value_commitment - bit_sum(bit_commitments),
                generators: vec![gens.gh, o, o],
            },
            Equation {
                public: serial_commitment,
                generators: vec![o, gens.gg, gens.gh],
            },
        ],
    )
    .expect("requested statement rows are never empty")
}

/// `Σ 2^j · A_j`
pub(crate) fn bit_sum(bit_commitments: &[RistrettoPoint]) -> RistrettoPoint {
    RistrettoPoint::multiscalar_mul(
        (0..bit_commitments.len()).map(|j| Scalar::from(1u64 << j)),
        bit_commitments,
    )
}

/// The two alternatives of one range-proof bit: the commitment opens to 0
/// or to 1 over `Gh`.
pub(crate) fn bit_alternatives(commitment: RistrettoPoint) -> Vec<Statement> {
    let gens = Generators::standard();
    vec![
        Statement::new(
            b"bit-zero",
            vec![Equation {
                public: commitment,
                generators: vec![gens.gh],
            }],
        )
        .expect("single-generator row"),
        Statement::new(
            b"bit-one",
            vec![Equation {
                public: commitment - gens.gg,
                generators: vec![gens.gh],
            }],
        )
        .expect("single-generator row"),
    ]
}

/// The statement for a requested zero-value credential, over witness
/// `(ra, s, rs)`: the value commitment opens to zero and the serial
/// commitment opens at all.
pub(crate) fn null_statement(
    value_commitment: RistrettoPoint,
    serial_commitment: RistrettoPoint,
) -> Statement {
    let gens = Generators::standard();
    let o = excluded();
    Statement::new(
        b"null",
        vec![
            Equation {
                public: value_commitment,
                generators: vec![gens.gh, o, o],
            },
            Equation {
                public: serial_commitment,
                generators: vec![o, gens.gg, gens.gh],
            },
        ],
    )
    .expect("null statement rows are never empty")
}

/// The publicly computable balance point
/// `B = Σ Ca_i − Σ Ma_j − delta·Gg`.
///
/// For an honest request `B = (Σ z_i)·Ga + ΔR·Gh`, which the balance
/// statement proves; this binds the declared delta (`presented − requested`)
/// to the hidden values.
pub(crate) fn balance_point(
    presented: &[Presentation],
    requested_value_commitments: &[RistrettoPoint],
    delta_value: i64,
) -> RistrettoPoint {
    let gens = Generators::standard();
    let mut balance = -(gens.gg * scalar_from_i64(delta_value));
    for presentation in presented {
        balance += presentation.ca;
    }
    for commitment in requested_value_commitments {
        balance -= commitment;
    }
    balance
}

/// The balance statement over witness `(Σ z_i, ΔR)`.
pub(crate) fn balance_statement(balance: RistrettoPoint) -> Statement {
    let gens = Generators::standard();
    Statement::new(
        b"balance",
        vec![Equation {
            public: balance,
            generators: vec![gens.ga, gens.gh],
        }],
    )
    .expect("balance statement row is never empty")
}

/// Depth-first leaf layout of a real request's proof tree, used to map a
/// failing leaf back to an error kind: `k` show leaves, then per requested
/// credential one opening leaf plus `RANGE_WIDTH` bit rings, then the
/// balance leaf.
pub(crate) fn classify_leaf(leaf: usize, k: usize) -> RequestProofRole {
    if leaf < k {
        RequestProofRole::Show
    } else if leaf < k + k * (1 + RANGE_WIDTH) {
        RequestProofRole::Range
    } else {
        RequestProofRole::Balance
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RequestProofRole {
    Show,
    Range,
    Balance,
}
