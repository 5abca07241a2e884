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

//! Wire messages exchanged with the coordinator, and their CBOR encoding.
//!
//! Points and scalars travel in their canonical 32-byte encodings; a
//! non-canonical encoding fails to decode. The envelope types bundle the
//! per-credential-type requests that each protocol step carries.

use curve25519_dalek::RistrettoPoint;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::credentials::Presentation;
use crate::mac::Mac;
use crate::proofs::Proof;

/// Error type for CBOR serialization and deserialization.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("CBOR encoding failed: {0}")]
    Encode(String),
    #[error("CBOR decoding failed: {0}")]
    Decode(String),
}

/// Encodes any wire message as deterministic CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a wire message from CBOR.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    ciborium::from_reader(bytes).map_err(|e: ciborium::de::Error<std::io::Error>| {
        WireError::Decode(e.to_string())
    })
}

/// One requested credential inside a real request: commitments to its value
/// and serial number, plus the bit commitments of the value's range proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub value_commitment: RistrettoPoint,
    pub serial_commitment: RistrettoPoint,
    pub bit_commitments: Vec<RistrettoPoint>,
}

/// One requested zero-value credential: no range proof needed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroCredentialRequest {
    pub value_commitment: RistrettoPoint,
    pub serial_commitment: RistrettoPoint,
}

/// A request for `k` zero-valued credentials, presenting nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroCredentialsRequest {
    pub requested: Vec<ZeroCredentialRequest>,
    pub proof: Proof,
}

/// A request presenting `k` credentials and asking for `k` new ones.
///
/// `delta_value` is the publicly declared `presented − requested`
/// difference; at input registration it is negative (the input backs the
/// requested credentials), at reissuance zero, at output registration
/// positive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealCredentialsRequest {
    pub delta_value: i64,
    pub presentations: Vec<Presentation>,
    pub requested: Vec<CredentialRequest>,
    pub proof: Proof,
}

/// The coordinator's answer: one MAC per requested credential and a proof
/// that each was computed with the committed secret key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsResponse {
    pub issued: Vec<Mac>,
    pub proof: Proof,
}

/// Round identifier assigned by the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundId(pub [u8; 32]);

/// Registers an input and bootstraps the credential pool with zero
/// credentials of both types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputRegistration {
    pub round_id: RoundId,
    /// Serialized outpoint of the input being registered.
    pub outpoint: Vec<u8>,
    /// Proof of ownership of the input, opaque to the credential core.
    pub ownership_proof: Vec<u8>,
    pub zero_amount: ZeroCredentialsRequest,
    pub zero_vsize: ZeroCredentialsRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputRegistrationResponse {
    pub alice_id: u64,
    pub zero_amount: CredentialsResponse,
    pub zero_vsize: CredentialsResponse,
}

/// Confirms the connection, converting the input's value and vsize
/// allowance into real credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfirmation {
    pub round_id: RoundId,
    pub alice_id: u64,
    pub amount: RealCredentialsRequest,
    pub vsize: RealCredentialsRequest,
    pub zero_amount: Vec<ZeroCredentialsRequest>,
    pub zero_vsize: Vec<ZeroCredentialsRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfirmationResponse {
    pub amount: CredentialsResponse,
    pub vsize: CredentialsResponse,
    pub zero_amount: Vec<CredentialsResponse>,
    pub zero_vsize: Vec<CredentialsResponse>,
}

/// Exchanges presented credentials for recombined ones, unlinkably.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reissuance {
    pub round_id: RoundId,
    pub amount: RealCredentialsRequest,
    pub vsize: RealCredentialsRequest,
    pub zero_amount: Vec<ZeroCredentialsRequest>,
    pub zero_vsize: Vec<ZeroCredentialsRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReissuanceResponse {
    pub amount: CredentialsResponse,
    pub vsize: CredentialsResponse,
    pub zero_amount: Vec<CredentialsResponse>,
    pub zero_vsize: Vec<CredentialsResponse>,
}

/// Registers an output funded by the presented credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputRegistration {
    pub round_id: RoundId,
    /// The output script the registered value pays to.
    pub script: Vec<u8>,
    pub amount: RealCredentialsRequest,
    pub vsize: RealCredentialsRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputRegistrationResponse {
    pub amount: CredentialsResponse,
    pub vsize: CredentialsResponse,
}

/// Submits witnesses for the final transaction; produced by the wallet
/// after all outputs are registered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionSignatures {
    pub round_id: RoundId,
    /// `(input index, witness bytes)` pairs.
    pub witnesses: Vec<(u32, Vec<u8>)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::client::CredentialClient;
    use crate::credentials::CredentialType;
    use crate::mac::CoordinatorSecretKey;
    use rand_core::OsRng;

    #[test]
    fn zero_request_round_trips_through_cbor() {
        let sk = CoordinatorSecretKey::random(&mut OsRng);
        let client = CredentialClient::new(CredentialType::Amount, sk.parameters().clone());
        let (request, _) = client.create_request_for_zero_amount(&mut OsRng).unwrap();

        let bytes = to_cbor(&request).unwrap();
        let decoded: ZeroCredentialsRequest = from_cbor(&bytes).unwrap();
        assert_eq!(request, decoded);
    }

    #[test]
    fn signature_envelope_round_trips() {
        let message = TransactionSignatures {
            round_id: RoundId([3u8; 32]),
            witnesses: vec![(0, vec![0xde, 0xad]), (2, vec![0xbe, 0xef])],
        };
        let decoded: TransactionSignatures = from_cbor(&to_cbor(&message).unwrap()).unwrap();
        assert_eq!(decoded.round_id, message.round_id);
        assert_eq!(decoded.witnesses, message.witnesses);
    }

    #[test]
    fn truncated_message_fails_to_decode() {
        let sk = CoordinatorSecretKey::random(&mut OsRng);
        let client = CredentialClient::new(CredentialType::Amount, sk.parameters().clone());
        let (request, _) = client.create_request_for_zero_amount(&mut OsRng).unwrap();
        let bytes = to_cbor(&request).unwrap();
        assert!(from_cbor::<ZeroCredentialsRequest>(&bytes[..bytes.len() / 2]).is_err());
    }
}
