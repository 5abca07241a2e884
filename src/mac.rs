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

//! The algebraic MAC and the coordinator's key material.
//!
//! The coordinator authenticates attribute commitments with the MAC
//!
//! ```text
//! V = w·Gw + x0·U + x1·t·U + ya·Ma + ys·Ms
//! ```
//!
//! over a random tag scalar `t`, where `Ma` commits to the credential value
//! and `Ms` to its serial number. The MAC is unforgeable without the secret
//! key and rerandomizable by the holder, which is what makes presentations
//! unlinkable. The public issuer parameters `(Cw, I)` commit to the secret
//! key so that both issuance and presentation can be proven consistent with
//! one long-lived key.

use curve25519_dalek::{RistrettoPoint, Scalar};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::generators::Generators;
use crate::proofs::statement::{excluded, Equation, Statement};

/// The coordinator's public commitment to its secret key.
///
/// Long-lived: one per coordinator per credential type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerParameters {
    /// `Cw = w·Gw + w'·Gwp`
    pub cw: RistrettoPoint,
    /// `I = GV − (x0·Gx0 + x1·Gx1 + ya·Ga + ys·Gs)`
    pub i: RistrettoPoint,
}

/// The coordinator's secret MAC key.
#[derive(Serialize, Deserialize, ZeroizeOnDrop, Debug)]
pub struct CoordinatorSecretKey {
    w: Scalar,
    wp: Scalar,
    x0: Scalar,
    x1: Scalar,
    ya: Scalar,
    ys: Scalar,
    #[zeroize(skip)]
    parameters: IssuerParameters,
}

fn random_nonzero(rng: &mut impl CryptoRngCore) -> Scalar {
    loop {
        let scalar = Scalar::random(rng);
        if scalar != Scalar::ZERO {
            break scalar;
        }
    }
}

impl CoordinatorSecretKey {
    /// Creates a new random secret key and its public parameters.
    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        let gens = Generators::standard();
        let (w, wp) = (random_nonzero(rng), random_nonzero(rng));
        let (x0, x1) = (random_nonzero(rng), random_nonzero(rng));
        let (ya, ys) = (random_nonzero(rng), random_nonzero(rng));
        let parameters = IssuerParameters {
            cw: gens.gw * w + gens.gwp * wp,
            i: gens.gv - (gens.gx0 * x0 + gens.gx1 * x1 + gens.ga * ya + gens.gs * ys),
        };
        CoordinatorSecretKey {
            w,
            wp,
            x0,
            x1,
            ya,
            ys,
            parameters,
        }
    }

    pub fn parameters(&self) -> &IssuerParameters {
        &self.parameters
    }

    /// Computes a MAC over a pair of attribute commitments with a fresh tag.
    pub fn compute_mac(
        &self,
        value_commitment: &RistrettoPoint,
        serial_commitment: &RistrettoPoint,
        rng: &mut impl CryptoRngCore,
    ) -> Mac {
        let gens = Generators::standard();
        let t = random_nonzero(rng);
        let v = gens.gw * self.w
            + gens.u * (self.x0 + self.x1 * t)
            + value_commitment * self.ya
            + serial_commitment * self.ys;
        Mac { t, v }
    }

    /// The coordinator-side recomputation of `Z` for a presentation:
    /// `Z = CV − (w·Gw + x0·Cx0 + x1·Cx1 + ya·Ca + ys·Cs)`.
    ///
    /// For a valid rerandomization with blinding `z` this equals `z·I`,
    /// which is what the show proof demonstrates.
    pub(crate) fn presentation_z(
        &self,
        cv: &RistrettoPoint,
        cx0: &RistrettoPoint,
        cx1: &RistrettoPoint,
        ca: &RistrettoPoint,
        cs: &RistrettoPoint,
    ) -> RistrettoPoint {
        cv - (Generators::standard().gw * self.w
            + cx0 * self.x0
            + cx1 * self.x1
            + ca * self.ya
            + cs * self.ys)
    }

    /// The issuance statement's witness, ordered as in
    /// [`issuance_statement`].
    pub(crate) fn issuance_witness(&self) -> Vec<Scalar> {
        vec![self.w, self.wp, self.x0, self.x1, self.ya, self.ys]
    }
}

/// An algebraic MAC tag: `(t, V)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct Mac {
    pub t: Scalar,
    pub v: RistrettoPoint,
}

impl ConstantTimeEq for Mac {
    fn ct_eq(&self, other: &Mac) -> Choice {
        self.t.ct_eq(&other.t) & self.v.ct_eq(&other.v)
    }
}

/// The statement proved by the issuer alongside each issued MAC.
///
/// Three equations over the witness `(w, w', x0, x1, ya, ys)` fix `Cw`,
/// `GV − I`, and `V` to the correct combinations, so a verifying client
/// knows the MAC was produced by the key the parameters commit to.
pub fn issuance_statement(
    parameters: &IssuerParameters,
    value_commitment: &RistrettoPoint,
    serial_commitment: &RistrettoPoint,
    mac: &Mac,
) -> Statement {
    let gens = Generators::standard();
    let o = excluded();
    Statement::new(
        b"issuance",
        vec![
            Equation {
                public: parameters.cw,
                generators: vec![gens.gw, gens.gwp, o, o, o, o],
            },
            Equation {
                public: gens.gv - parameters.i,
                generators: vec![o, o, gens.gx0, gens.gx1, gens.ga, gens.gs],
            },
            Equation {
                public: mac.v,
                generators: vec![
                    gens.gw,
                    o,
                    gens.u,
                    gens.u * mac.t,
                    *value_commitment,
                    *serial_commitment,
                ],
            },
        ],
    )
    .expect("issuance statement rows are never empty")
}
