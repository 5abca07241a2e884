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

//! The fixed family of independent group generators.
//!
//! Every generator except the standard basepoint `G` is derived by hashing
//! a domain-separated label into a seed and sampling a point from the
//! resulting deterministic stream, so no party knows discrete-log relations
//! between any two of them.

use std::sync::OnceLock;

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::RistrettoPoint;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use crate::transcript::PROTOCOL_TAG;

/// The named generators of the credential scheme.
///
/// Roles:
/// - `g`: the standard basepoint.
/// - `gw`, `gwp`: commitment to the MAC key components `w`, `w'`.
/// - `gx0`, `gx1`: the `x0`/`x1` key components in issuer parameters and
///   presentations.
/// - `ga`, `gs`: randomization bases for the value and serial attribute
///   commitments during a show.
/// - `gg`, `gh`: Pedersen commitment bases for attribute values and their
///   randomness.
/// - `gv`: blinding base for the MAC tag `V` during a show.
/// - `u`: the fixed MAC base multiplied by `x0 + x1·t`.
#[derive(Clone, Debug)]
pub struct Generators {
    pub g: RistrettoPoint,
    pub gw: RistrettoPoint,
    pub gwp: RistrettoPoint,
    pub gx0: RistrettoPoint,
    pub gx1: RistrettoPoint,
    pub ga: RistrettoPoint,
    pub gs: RistrettoPoint,
    pub gg: RistrettoPoint,
    pub gh: RistrettoPoint,
    pub gv: RistrettoPoint,
    pub u: RistrettoPoint,
}

impl Generators {
    /// Derives a generator from a label.
    ///
    /// The label is hashed together with the protocol tag into a BLAKE3
    /// digest seeding a ChaCha20 stream, from which a uniformly random
    /// point is sampled. Distinct labels give independent generators.
    pub fn derive(label: &str) -> RistrettoPoint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(PROTOCOL_TAG);
        hasher.update(b"generator");
        hasher.update(label.as_bytes());
        let mut rng = ChaCha20Rng::from_seed(*hasher.finalize().as_bytes());
        RistrettoPoint::random(&mut rng)
    }

    fn new() -> Self {
        Generators {
            g: RISTRETTO_BASEPOINT_POINT,
            gw: Self::derive("Gw"),
            gwp: Self::derive("Gwp"),
            gx0: Self::derive("Gx0"),
            gx1: Self::derive("Gx1"),
            ga: Self::derive("Ga"),
            gs: Self::derive("Gs"),
            gg: Self::derive("Gg"),
            gh: Self::derive("Gh"),
            gv: Self::derive("GV"),
            u: Self::derive("U"),
        }
    }

    /// Returns the process-wide generator family, computed once.
    pub fn standard() -> &'static Generators {
        static GENERATORS: OnceLock<Generators> = OnceLock::new();
        GENERATORS.get_or_init(Generators::new)
    }
}
