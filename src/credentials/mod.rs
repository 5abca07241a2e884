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

//! Credentials, their attribute commitments, and presentations.

use curve25519_dalek::{RistrettoPoint, Scalar};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::generators::Generators;
use crate::mac::Mac;

pub mod client;
pub mod issuer;
pub(crate) mod statements;

/// The two independent attribute types credentials account for.
///
/// Amount credentials carry satoshis; vsize credentials carry the virtual
/// size allowance needed to register outputs. Each type has its own issuer
/// key, and every registration step exchanges credentials of both types.
/// The array [`CredentialType::ALL`] fixes the order in which the
/// dependency graph resolves them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    Amount,
    Vsize,
}

impl CredentialType {
    pub const ALL: [CredentialType; 2] = [CredentialType::Amount, CredentialType::Vsize];

    pub(crate) fn index(self) -> usize {
        match self {
            CredentialType::Amount => 0,
            CredentialType::Vsize => 1,
        }
    }
}

/// A credential held by the client.
///
/// Single use: presenting it reveals the serial number, so the coordinator
/// will reject a second presentation.
#[derive(Clone, Debug, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    value: u64,
    serial: Scalar,
    value_blinding: Scalar,
    serial_blinding: Scalar,
    #[zeroize(skip)]
    mac: Mac,
}

impl Credential {
    pub(crate) fn new(
        value: u64,
        serial: Scalar,
        value_blinding: Scalar,
        serial_blinding: Scalar,
        mac: Mac,
    ) -> Self {
        Credential {
            value,
            serial,
            value_blinding,
            serial_blinding,
            mac,
        }
    }

    /// The attribute value this credential certifies.
    pub fn value(&self) -> u64 {
        self.value
    }

    pub(crate) fn mac(&self) -> &Mac {
        &self.mac
    }

    /// `Ma = a·Gg + ra·Gh`
    pub(crate) fn value_commitment(&self) -> RistrettoPoint {
        let gens = Generators::standard();
        gens.gg * Scalar::from(self.value) + gens.gh * self.value_blinding
    }

    /// `Ms = s·Gg + rs·Gh`
    pub(crate) fn serial_commitment(&self) -> RistrettoPoint {
        let gens = Generators::standard();
        gens.gg * self.serial + gens.gh * self.serial_blinding
    }

    /// Rerandomizes the credential under a fresh blinding `z`, yielding the
    /// presentation sent to the coordinator and the secret witness the show
    /// proof consumes.
    pub(crate) fn present(
        &self,
        rng: &mut impl CryptoRngCore,
    ) -> (Presentation, ShowWitness) {
        let gens = Generators::standard();
        let z = loop {
            let z = Scalar::random(rng);
            if z != Scalar::ZERO {
                break z;
            }
        };
        let presentation = Presentation {
            ca: self.value_commitment() + gens.ga * z,
            cs: self.serial_commitment() + gens.gs * z,
            cx0: gens.u + gens.gx0 * z,
            cx1: gens.u * self.mac.t + gens.gx1 * z,
            cv: self.mac.v + gens.gv * z,
            serial: self.serial,
        };
        let witness = ShowWitness {
            z,
            z0: -(self.mac.t * z),
            t: self.mac.t,
            value: Scalar::from(self.value),
            value_blinding: self.value_blinding,
            serial_blinding: self.serial_blinding,
        };
        (presentation, witness)
    }
}

/// A rerandomized credential as sent to the coordinator.
///
/// `(Ca, Cs, Cx0, Cx1, CV)` blind the attribute commitments and the MAC
/// under a fresh `z`; the serial number is revealed for double-spend
/// detection, unlinkable to issuance because its commitment was hiding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub ca: RistrettoPoint,
    pub cs: RistrettoPoint,
    pub cx0: RistrettoPoint,
    pub cx1: RistrettoPoint,
    pub cv: RistrettoPoint,
    pub serial: Scalar,
}

/// Secret witness for one show sub-proof, ordered `(z, z0, t, a, ra, rs)`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct ShowWitness {
    pub z: Scalar,
    pub z0: Scalar,
    pub t: Scalar,
    pub value: Scalar,
    pub value_blinding: Scalar,
    pub serial_blinding: Scalar,
}

impl ShowWitness {
    pub(crate) fn as_vec(&self) -> Vec<Scalar> {
        vec![
            self.z,
            self.z0,
            self.t,
            self.value,
            self.value_blinding,
            self.serial_blinding,
        ]
    }
}
