//! Blind Diffie-Hellman key exchange
//!
//! The client blinds `Y = hash_to_curve(secret)` with a fresh scalar `r`
//! into `B_ = Y + rG`, the mint signs `C_ = kB_`, and the client unblinds
//! `C = C_ - rK`. The hash-to-curve construction must be reproduced
//! bit-exactly: it fixes the point identity the mint observes for a
//! secret.

use bitcoin::hashes::sha256::Hash as Sha256Hash;
use bitcoin::hashes::Hash;
use thiserror::Error;

use crate::nuts::nut00::{BlindSignature, PreMintSecrets, Proof, Proofs};
use crate::nuts::nut01::{self, Keys, PublicKey, SecretKey};
use crate::Amount;

/// Re-hash rounds before giving up on finding a curve point
const MAX_HASH_ROUNDS: u32 = 100;

/// DHKE Error
#[derive(Debug, Error)]
pub enum Error {
    /// No valid point could be found within the hash bound
    #[error("No valid point found after {MAX_HASH_ROUNDS} rounds")]
    NoValidPoint,
    /// Mint public key missing for a denomination
    #[error("No mint public key for amount {0}")]
    MissingKey(Amount),
    /// Token could not be verified
    #[error("Token not verified")]
    TokenNotVerified,
    /// NUT-01 error
    #[error(transparent)]
    Nut01(#[from] nut01::Error),
}

/// Map a message to a point on the curve
///
/// `h = SHA-256(message)`; parse `0x02 || h` as a compressed point and,
/// while that x coordinate is not on the curve, re-hash `h = SHA-256(h)`.
pub fn hash_to_curve(message: &[u8]) -> Result<PublicKey, Error> {
    let mut hash: [u8; 32] = Sha256Hash::hash(message).to_byte_array();

    for _ in 0..MAX_HASH_ROUNDS {
        let mut candidate = [0u8; 33];
        candidate[0] = 0x02;
        candidate[1..].copy_from_slice(&hash);

        match PublicKey::from_slice(&candidate) {
            Ok(pubkey) => return Ok(pubkey),
            Err(_) => hash = Sha256Hash::hash(&hash).to_byte_array(),
        }
    }

    Err(Error::NoValidPoint)
}

/// Blind a message
///
/// `B_ = Y + rG`
pub fn blind_message(
    secret: &[u8],
    blinding_factor: Option<SecretKey>,
) -> Result<(PublicKey, SecretKey), Error> {
    let y: PublicKey = hash_to_curve(secret)?;
    let r: SecretKey = blinding_factor.unwrap_or_else(SecretKey::generate);
    Ok((y.combine(&r.public_key())?, r))
}

/// Unblind a signature
///
/// `C = C_ - rK`
pub fn unblind_message(
    // C_
    blinded_signature: &PublicKey,
    r: &SecretKey,
    // K
    mint_pubkey: &PublicKey,
) -> Result<PublicKey, Error> {
    // a = r * K
    let a: PublicKey = mint_pubkey.mul_tweak(&r.as_scalar())?;

    // C_ + (-a)
    Ok(blinded_signature.combine(&a.negate())?)
}

/// Pair the mint's signatures with the planned outputs and unblind
///
/// Outputs are walked in planning order; each consumes the first
/// remaining signature of equal amount. Outputs the mint did not sign are
/// skipped: a mint legitimately returns fewer signatures than requested
/// when fees consume part of the change.
pub fn construct_proofs(
    promises: Vec<BlindSignature>,
    premint: &PreMintSecrets,
    keys: &Keys,
) -> Result<Proofs, Error> {
    let mut remaining = promises;
    let mut proofs = Proofs::new();

    for pre in premint.iter() {
        let matched = remaining
            .iter()
            .position(|signature| signature.amount == pre.amount);

        let signature = match matched {
            Some(index) => remaining.remove(index),
            None => {
                tracing::warn!(
                    "No signature returned for output of {}, skipping",
                    pre.amount
                );
                continue;
            }
        };

        let mint_pubkey = keys
            .amount_key(signature.amount)
            .ok_or(Error::MissingKey(signature.amount))?;
        let c = unblind_message(&signature.c, &pre.r, &mint_pubkey)?;

        proofs.push(Proof::new(
            signature.amount,
            signature.keyset_id,
            pre.secret.clone(),
            c,
        ));
    }

    Ok(proofs)
}

/// Sign a blinded message
///
/// `C_ = kB_`, where `k` is the mint's private key for the amount
#[inline]
pub fn sign_message(k: &SecretKey, blinded_message: &PublicKey) -> Result<PublicKey, Error> {
    Ok(blinded_message.mul_tweak(&k.as_scalar())?)
}

/// Verify that an unblinded signature was produced with key `k`
pub fn verify_message(
    k: &SecretKey,
    unblinded_signature: PublicKey,
    secret: &[u8],
) -> Result<(), Error> {
    // Y
    let y: PublicKey = hash_to_curve(secret)?;

    if unblinded_signature == y.mul_tweak(&k.as_scalar())? {
        return Ok(());
    }

    Err(Error::TokenNotVerified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nuts::nut02::KeysetId;
    use crate::util::hex;

    #[test]
    fn test_hash_to_curve() {
        // x = SHA-256(message) is already a valid x coordinate
        let secret = "0000000000000000000000000000000000000000000000000000000000000000";
        let y = hash_to_curve(&hex::decode(secret).unwrap()).unwrap();
        let expected_y = PublicKey::from_hex(
            "0266687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925",
        )
        .unwrap();
        assert_eq!(y, expected_y);

        let secret = "0000000000000000000000000000000000000000000000000000000000000001";
        let y = hash_to_curve(&hex::decode(secret).unwrap()).unwrap();
        let expected_y = PublicKey::from_hex(
            "02ec4916dd28fc4c10d78e287ca5d9cc51ee1ae73cbfde08c6b37324cbfaac8bc5",
        )
        .unwrap();
        assert_eq!(y, expected_y);

        // This message takes a few rounds before a valid point is found
        let secret = "0000000000000000000000000000000000000000000000000000000000000002";
        let y = hash_to_curve(&hex::decode(secret).unwrap()).unwrap();
        let expected_y = PublicKey::from_hex(
            "02076c988b353fcbb748178ecb286bc9d0b4acf474d4ba31ba62334e46c97c416a",
        )
        .unwrap();
        assert_eq!(y, expected_y);
    }

    #[test]
    fn test_hash_to_curve_always_even_y() {
        for message in [b"a".as_slice(), b"hello", &[0x00], &[0xff; 77]] {
            let point = hash_to_curve(message).unwrap();
            assert_eq!(point.to_bytes()[0], 0x02);
        }
    }

    #[test]
    fn test_blind_unblind_round_trip() {
        // P3: unblind(k * (Y + rG), r, K) == k * Y
        let secret = b"411ae692383c3a9e4a26ad3ffe16a9a1eb4ca1b7f9f5e1a3f3bf2ae4ba45a1af";
        let k = SecretKey::generate();

        let (blinded, r) = blind_message(secret, None).unwrap();
        let signed = sign_message(&k, &blinded).unwrap();
        let unblinded = unblind_message(&signed, &r, &k.public_key()).unwrap();

        let expected = hash_to_curve(secret)
            .unwrap()
            .mul_tweak(&k.as_scalar())
            .unwrap();
        assert_eq!(unblinded, expected);
        assert!(verify_message(&k, unblinded, secret).is_ok());
    }

    #[test]
    fn test_blinding_hides_the_point() {
        let secret = b"some secret";
        let (blinded_a, _) = blind_message(secret, None).unwrap();
        let (blinded_b, _) = blind_message(secret, None).unwrap();

        // Fresh blinding factors yield unrelated points for the same secret
        assert_ne!(blinded_a, blinded_b);
    }

    #[test]
    fn test_construct_proofs_pairs_by_amount() {
        let keyset_id = KeysetId::new("00ad268c4d1f5826");
        let k = SecretKey::generate();
        let keys = Keys::new(
            [1u64, 2, 4, 8, 16]
                .into_iter()
                .map(|amount| (Amount::from(amount), k.public_key()))
                .collect(),
        );

        let premint = PreMintSecrets::ladder(keyset_id.clone(), Amount::from(24)).unwrap();
        assert_eq!(premint.len(), 5);

        // The mint signs only 1, 4 and 16 of the requested [1, 2, 4, 8, 16]
        let promises: Vec<BlindSignature> = premint
            .iter()
            .filter(|pre| [1u64, 4, 16].contains(&pre.amount.into()))
            .map(|pre| BlindSignature {
                amount: pre.amount,
                keyset_id: keyset_id.clone(),
                c: sign_message(&k, &pre.blinded_message.blinded_secret).unwrap(),
            })
            .collect();

        let proofs = construct_proofs(promises, &premint, &keys).unwrap();

        let amounts: Vec<u64> = proofs.iter().map(|p| p.amount.into()).collect();
        assert_eq!(amounts, vec![1, 4, 16]);
        for proof in &proofs {
            assert!(verify_message(&k, proof.c, proof.secret.as_bytes()).is_ok());
        }
    }
}
