//! Compact JWE: encrypt, decrypt.
//!
//! Key management covers RSAES-PKCS1-v1_5, RSAES-OAEP (SHA-1 and SHA-256),
//! and AES Key Wrap over a shared symmetric key. Content encryption covers
//! AES-GCM and AES-CBC with HMAC, including the draft-era `A128CBC+HS256`
//! composites whose CEK split order is reversed from RFC 7518.
//!
//! Decryption failures are opaque: a wrong unwrap and a bad authentication
//! tag both surface as [`JoseError::DecryptionFailed`] with no further
//! detail, and the MAC is always checked before any CBC unpadding.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use aes_kw::{KekAes128, KekAes192, KekAes256};
use aws_lc_rs::constant_time;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};

use crate::algorithm::{
    ContentEncryptionAlgorithm, HashAlgorithm, KeyManagementAlgorithm, KeyManagementFamily,
};
use crate::error::{JoseError, JoseResult};
use crate::jwk::JsonWebKey;

type Aes192Gcm = aes_gcm::AesGcm<aes::Aes192, aes_gcm::aead::consts::U12>;

/// JOSE header of an encrypted token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JweHeader {
    /// Key-management algorithm identifier.
    pub alg: String,

    /// Content-encryption algorithm identifier.
    pub enc: String,

    /// Token type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Key ID of the recipient key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Content type of the plaintext (`JWT` when a signed token is
    /// nested inside).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
}

impl JweHeader {
    /// Creates a header for the given algorithm pair with `typ: JWT`.
    #[must_use]
    pub fn new(alg: KeyManagementAlgorithm, enc: ContentEncryptionAlgorithm) -> Self {
        Self {
            alg: alg.jwa_name().to_string(),
            enc: enc.jwa_name().to_string(),
            typ: Some("JWT".to_string()),
            kid: None,
            cty: None,
        }
    }

    /// Sets the key ID.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Marks the plaintext as a nested signed token.
    #[must_use]
    pub fn nested(mut self) -> Self {
        self.cty = Some("JWT".to_string());
        self
    }

    /// Parses the declared key-management algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::UnsupportedAlgorithm`] for unknown identifiers.
    pub fn key_algorithm(&self) -> JoseResult<KeyManagementAlgorithm> {
        KeyManagementAlgorithm::from_jwa(&self.alg)
    }

    /// Parses the declared content-encryption algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::UnsupportedAlgorithm`] for unknown identifiers.
    pub fn content_algorithm(&self) -> JoseResult<ContentEncryptionAlgorithm> {
        ContentEncryptionAlgorithm::from_jwa(&self.enc)
    }
}

/// Recipient key for encryption.
pub enum JweRecipientKey<'a> {
    /// RSA public key for the RSA key-transport algorithms.
    RsaPublic(&'a RsaPublicKey),

    /// Key-encryption key for AES-KW, exactly the algorithm's KEK length.
    Secret(&'a [u8]),
}

/// Recipient key for decryption.
pub enum JweDecryptionKey<'a> {
    /// RSA private key for the RSA key-transport algorithms.
    RsaPrivate(&'a RsaPrivateKey),

    /// Key-encryption key for AES-KW.
    Secret(&'a [u8]),
}

/// A decrypted JWE: header plus recovered plaintext.
#[derive(Debug)]
pub struct DecryptedJwe {
    /// The protected header as transmitted.
    pub header: JweHeader,

    /// The recovered plaintext.
    pub plaintext: Vec<u8>,
}

impl DecryptedJwe {
    /// Returns whether the plaintext is a nested signed token.
    #[must_use]
    pub fn is_nested_jws(&self) -> bool {
        self.header.cty.as_deref() == Some("JWT")
    }
}

/// Builds an RSA public key from a JWK.
///
/// # Errors
///
/// Returns [`JoseError::InvalidKey`] if the JWK is not a usable RSA key.
pub fn rsa_public_from_jwk(jwk: &JsonWebKey) -> JoseResult<RsaPublicKey> {
    let (n, e) = jwk.rsa_components()?;
    RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(&n),
        rsa::BigUint::from_bytes_be(&e),
    )
    .map_err(|e| JoseError::InvalidKey(format!("invalid RSA public key: {e}")))
}

/// Derives an AES-KW key-encryption key from a shared secret.
///
/// The KEK is the left-most slice of SHA-256 over the secret, sized to the
/// key-wrap algorithm. Deterministic so both parties derive the same key
/// from a registered client secret.
///
/// # Errors
///
/// Returns [`JoseError::UnsupportedAlgorithm`] if the algorithm is not an
/// AES-KW algorithm.
pub fn symmetric_kek(secret: &[u8], alg: KeyManagementAlgorithm) -> JoseResult<Vec<u8>> {
    let len = alg
        .kek_len()
        .ok_or_else(|| JoseError::UnsupportedAlgorithm(alg.jwa_name().to_string()))?;
    let digest = crate::hash::sha256(secret);
    Ok(digest[..len].to_vec())
}

/// Encrypts a payload into a five-segment compact JWE.
///
/// A fresh content-encryption key and IV are generated per call; the CEK
/// is wrapped for the recipient with the key-management algorithm.
///
/// # Errors
///
/// Returns an error if the key material does not fit the algorithm or any
/// cryptographic step fails.
pub fn encrypt(
    payload: &[u8],
    key: &JweRecipientKey<'_>,
    header: JweHeader,
) -> JoseResult<String> {
    let alg = header.key_algorithm()?;
    let enc = header.content_algorithm()?;

    let header_bytes = serde_json::to_vec(&header)
        .map_err(|e| JoseError::Encryption(format!("header serialization failed: {e}")))?;
    let encoded_header = URL_SAFE_NO_PAD.encode(header_bytes);

    let mut cek = vec![0u8; enc.cek_len()];
    OsRng.fill_bytes(&mut cek);
    let mut iv = vec![0u8; enc.iv_len()];
    OsRng.fill_bytes(&mut iv);

    let encrypted_key = wrap_cek(&cek, key, alg)?;

    // The protected header is the additional authenticated data
    let aad = encoded_header.as_bytes();
    let (ciphertext, tag) = encrypt_content(payload, &cek, &iv, aad, enc)?;

    Ok(format!(
        "{}.{}.{}.{}.{}",
        encoded_header,
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(&iv),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ))
}

/// Parses the protected header of a compact JWE without decrypting.
///
/// Used to select the decryption key before committing to a decrypt.
///
/// # Errors
///
/// Returns [`JoseError::Malformed`] for structural problems.
pub fn peek_header(token: &str) -> JoseResult<JweHeader> {
    let first = token.split('.').next().unwrap_or_default();
    if token.split('.').count() != 5 {
        return Err(JoseError::Malformed(format!(
            "expected 5 segments, found {}",
            token.split('.').count()
        )));
    }
    let header_bytes = URL_SAFE_NO_PAD
        .decode(first)
        .map_err(|_| JoseError::Malformed("header is not base64url".to_string()))?;
    serde_json::from_slice(&header_bytes)
        .map_err(|_| JoseError::Malformed("header is not valid JSON".to_string()))
}

/// Decrypts a five-segment compact JWE.
///
/// # Errors
///
/// Returns [`JoseError::Malformed`] for structural problems (segment
/// count, base64url, header JSON) and [`JoseError::DecryptionFailed`] for
/// every cryptographic failure, without revealing which step failed.
pub fn decrypt(token: &str, key: &JweDecryptionKey<'_>) -> JoseResult<DecryptedJwe> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 5 {
        return Err(JoseError::Malformed(format!(
            "expected 5 segments, found {}",
            segments.len()
        )));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|_| JoseError::Malformed("header is not base64url".to_string()))?;
    let header: JweHeader = serde_json::from_slice(&header_bytes)
        .map_err(|_| JoseError::Malformed("header is not valid JSON".to_string()))?;

    let alg = header.key_algorithm()?;
    let enc = header.content_algorithm()?;

    let encrypted_key = decode_segment(segments[1])?;
    let iv = decode_segment(segments[2])?;
    let ciphertext = decode_segment(segments[3])?;
    let tag = decode_segment(segments[4])?;

    if iv.len() != enc.iv_len() || tag.len() != enc.tag_len() {
        return Err(JoseError::Malformed(format!(
            "IV or tag length does not match {}",
            enc.jwa_name()
        )));
    }

    let cek = unwrap_cek(&encrypted_key, key, alg)?;
    if cek.len() != enc.cek_len() {
        return Err(JoseError::DecryptionFailed);
    }

    let aad = segments[0].as_bytes();
    let plaintext = decrypt_content(&ciphertext, &tag, &cek, &iv, aad, enc)?;

    Ok(DecryptedJwe { header, plaintext })
}

fn decode_segment(segment: &str) -> JoseResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| JoseError::Malformed("segment is not base64url".to_string()))
}

fn wrap_cek(
    cek: &[u8],
    key: &JweRecipientKey<'_>,
    alg: KeyManagementAlgorithm,
) -> JoseResult<Vec<u8>> {
    match (alg.family(), key) {
        (KeyManagementFamily::RsaPkcs1, JweRecipientKey::RsaPublic(public)) => public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, cek)
            .map_err(|e| JoseError::Encryption(format!("RSA1_5 key wrap failed: {e}"))),
        (KeyManagementFamily::RsaOaep, JweRecipientKey::RsaPublic(public)) => public
            .encrypt(&mut OsRng, oaep_padding(alg), cek)
            .map_err(|e| JoseError::Encryption(format!("RSA-OAEP key wrap failed: {e}"))),
        (KeyManagementFamily::AesKeyWrap, JweRecipientKey::Secret(kek)) => {
            aes_key_wrap(kek, cek, alg)
        }
        _ => Err(JoseError::InvalidKey(format!(
            "key material does not fit {}",
            alg.jwa_name()
        ))),
    }
}

fn unwrap_cek(
    encrypted_key: &[u8],
    key: &JweDecryptionKey<'_>,
    alg: KeyManagementAlgorithm,
) -> JoseResult<Vec<u8>> {
    match (alg.family(), key) {
        (KeyManagementFamily::RsaPkcs1, JweDecryptionKey::RsaPrivate(private)) => private
            .decrypt(Pkcs1v15Encrypt, encrypted_key)
            .map_err(|_| JoseError::DecryptionFailed),
        (KeyManagementFamily::RsaOaep, JweDecryptionKey::RsaPrivate(private)) => private
            .decrypt(oaep_padding(alg), encrypted_key)
            .map_err(|_| JoseError::DecryptionFailed),
        (KeyManagementFamily::AesKeyWrap, JweDecryptionKey::Secret(kek)) => {
            aes_key_unwrap(kek, encrypted_key, alg)
        }
        _ => Err(JoseError::InvalidKey(format!(
            "key material does not fit {}",
            alg.jwa_name()
        ))),
    }
}

fn oaep_padding(alg: KeyManagementAlgorithm) -> Oaep {
    match alg {
        KeyManagementAlgorithm::RsaOaep256 => Oaep::new::<Sha256>(),
        _ => Oaep::new::<sha1::Sha1>(),
    }
}

fn aes_key_wrap(kek: &[u8], cek: &[u8], alg: KeyManagementAlgorithm) -> JoseResult<Vec<u8>> {
    let expected = alg.kek_len().unwrap_or(0);
    if kek.len() != expected {
        return Err(JoseError::InvalidKey(format!(
            "{} requires a {expected}-byte key-encryption key",
            alg.jwa_name()
        )));
    }

    let mut wrapped = vec![0u8; cek.len() + 8];
    let result = match alg {
        KeyManagementAlgorithm::A128Kw => {
            let kek: [u8; 16] = kek.try_into().expect("length checked");
            KekAes128::from(kek).wrap(cek, &mut wrapped)
        }
        KeyManagementAlgorithm::A192Kw => {
            let kek: [u8; 24] = kek.try_into().expect("length checked");
            KekAes192::from(kek).wrap(cek, &mut wrapped)
        }
        KeyManagementAlgorithm::A256Kw => {
            let kek: [u8; 32] = kek.try_into().expect("length checked");
            KekAes256::from(kek).wrap(cek, &mut wrapped)
        }
        _ => unreachable!("checked by caller"),
    };

    result.map_err(|e| JoseError::Encryption(format!("AES key wrap failed: {e}")))?;
    Ok(wrapped)
}

fn aes_key_unwrap(kek: &[u8], wrapped: &[u8], alg: KeyManagementAlgorithm) -> JoseResult<Vec<u8>> {
    let expected = alg.kek_len().unwrap_or(0);
    if kek.len() != expected {
        return Err(JoseError::InvalidKey(format!(
            "{} requires a {expected}-byte key-encryption key",
            alg.jwa_name()
        )));
    }

    if wrapped.len() < 16 {
        return Err(JoseError::DecryptionFailed);
    }
    let mut unwrapped = vec![0u8; wrapped.len() - 8];
    let result = match alg {
        KeyManagementAlgorithm::A128Kw => {
            let kek: [u8; 16] = kek.try_into().expect("length checked");
            KekAes128::from(kek).unwrap(wrapped, &mut unwrapped)
        }
        KeyManagementAlgorithm::A192Kw => {
            let kek: [u8; 24] = kek.try_into().expect("length checked");
            KekAes192::from(kek).unwrap(wrapped, &mut unwrapped)
        }
        KeyManagementAlgorithm::A256Kw => {
            let kek: [u8; 32] = kek.try_into().expect("length checked");
            KekAes256::from(kek).unwrap(wrapped, &mut unwrapped)
        }
        _ => unreachable!("checked by caller"),
    };

    result.map_err(|_| JoseError::DecryptionFailed)?;
    Ok(unwrapped)
}

fn encrypt_content(
    plaintext: &[u8],
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    enc: ContentEncryptionAlgorithm,
) -> JoseResult<(Vec<u8>, Vec<u8>)> {
    if enc.is_gcm() {
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        let mut out = gcm_encrypt(cek, iv, payload, enc)?;
        // aead appends the tag to the ciphertext
        let tag = out.split_off(out.len() - enc.tag_len());
        Ok((out, tag))
    } else {
        let (enc_key, mac_key) = split_cek(cek, enc);
        let ciphertext = cbc_encrypt(enc_key, iv, plaintext)?;
        let tag = cbc_hmac_tag(mac_key, aad, iv, &ciphertext, enc)?;
        Ok((ciphertext, tag))
    }
}

fn decrypt_content(
    ciphertext: &[u8],
    tag: &[u8],
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    enc: ContentEncryptionAlgorithm,
) -> JoseResult<Vec<u8>> {
    if enc.is_gcm() {
        let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(tag);
        let payload = Payload {
            msg: &combined,
            aad,
        };
        gcm_decrypt(cek, iv, payload, enc)
    } else {
        let (enc_key, mac_key) = split_cek(cek, enc);
        // MAC before unpadding
        let expected = cbc_hmac_tag(mac_key, aad, iv, ciphertext, enc)?;
        if constant_time::verify_slices_are_equal(&expected, tag).is_err() {
            return Err(JoseError::DecryptionFailed);
        }
        cbc_decrypt(enc_key, iv, ciphertext)
    }
}

/// Splits a CBC-HMAC CEK into its encryption and MAC halves.
///
/// RFC 7518 puts the MAC half first; the draft-era composites put the
/// encryption half first.
fn split_cek(cek: &[u8], enc: ContentEncryptionAlgorithm) -> (&[u8], &[u8]) {
    let half = cek.len() / 2;
    if enc.legacy_split() {
        (&cek[..half], &cek[half..])
    } else {
        let (mac, encryption) = cek.split_at(half);
        (encryption, mac)
    }
}

fn gcm_encrypt(
    cek: &[u8],
    iv: &[u8],
    payload: Payload<'_, '_>,
    enc: ContentEncryptionAlgorithm,
) -> JoseResult<Vec<u8>> {
    let nonce = aes_gcm::Nonce::from_slice(iv);
    let result = match enc {
        ContentEncryptionAlgorithm::A128Gcm => Aes128Gcm::new_from_slice(cek)
            .map_err(|_| JoseError::InvalidKey("bad CEK length".to_string()))?
            .encrypt(nonce, payload),
        ContentEncryptionAlgorithm::A192Gcm => Aes192Gcm::new_from_slice(cek)
            .map_err(|_| JoseError::InvalidKey("bad CEK length".to_string()))?
            .encrypt(nonce, payload),
        ContentEncryptionAlgorithm::A256Gcm => Aes256Gcm::new_from_slice(cek)
            .map_err(|_| JoseError::InvalidKey("bad CEK length".to_string()))?
            .encrypt(nonce, payload),
        _ => unreachable!("checked by caller"),
    };
    result.map_err(|_| JoseError::Encryption("AES-GCM encryption failed".to_string()))
}

fn gcm_decrypt(
    cek: &[u8],
    iv: &[u8],
    payload: Payload<'_, '_>,
    enc: ContentEncryptionAlgorithm,
) -> JoseResult<Vec<u8>> {
    let nonce = aes_gcm::Nonce::from_slice(iv);
    let result = match enc {
        ContentEncryptionAlgorithm::A128Gcm => Aes128Gcm::new_from_slice(cek)
            .map_err(|_| JoseError::DecryptionFailed)?
            .decrypt(nonce, payload),
        ContentEncryptionAlgorithm::A192Gcm => Aes192Gcm::new_from_slice(cek)
            .map_err(|_| JoseError::DecryptionFailed)?
            .decrypt(nonce, payload),
        ContentEncryptionAlgorithm::A256Gcm => Aes256Gcm::new_from_slice(cek)
            .map_err(|_| JoseError::DecryptionFailed)?
            .decrypt(nonce, payload),
        _ => unreachable!("checked by caller"),
    };
    result.map_err(|_| JoseError::DecryptionFailed)
}

fn cbc_encrypt(enc_key: &[u8], iv: &[u8], plaintext: &[u8]) -> JoseResult<Vec<u8>> {
    let bad_key = || JoseError::InvalidKey("bad CEK length".to_string());
    match enc_key.len() {
        16 => cbc::Encryptor::<aes::Aes128>::new_from_slices(enc_key, iv)
            .map_err(|_| bad_key())
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        24 => cbc::Encryptor::<aes::Aes192>::new_from_slices(enc_key, iv)
            .map_err(|_| bad_key())
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        32 => cbc::Encryptor::<aes::Aes256>::new_from_slices(enc_key, iv)
            .map_err(|_| bad_key())
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        _ => Err(bad_key()),
    }
}

fn cbc_decrypt(enc_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> JoseResult<Vec<u8>> {
    let result = match enc_key.len() {
        16 => cbc::Decryptor::<aes::Aes128>::new_from_slices(enc_key, iv)
            .map_err(|_| JoseError::DecryptionFailed)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => cbc::Decryptor::<aes::Aes192>::new_from_slices(enc_key, iv)
            .map_err(|_| JoseError::DecryptionFailed)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => cbc::Decryptor::<aes::Aes256>::new_from_slices(enc_key, iv)
            .map_err(|_| JoseError::DecryptionFailed)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        _ => return Err(JoseError::DecryptionFailed),
    };
    result.map_err(|_| JoseError::DecryptionFailed)
}

/// Computes the CBC-HMAC authentication tag.
///
/// `M = HMAC(mac_key, AAD || IV || ciphertext || AL)` where `AL` is the
/// big-endian bit length of the AAD; the tag is the left half of `M`.
fn cbc_hmac_tag(
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    enc: ContentEncryptionAlgorithm,
) -> JoseResult<Vec<u8>> {
    let al = (aad.len() as u64 * 8).to_be_bytes();

    let hash = enc
        .mac_hash()
        .ok_or_else(|| JoseError::UnsupportedAlgorithm(enc.jwa_name().to_string()))?;

    let bad_key = || JoseError::InvalidKey("bad MAC key length".to_string());
    let full = match hash {
        HashAlgorithm::Sha256 => {
            let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(mac_key).map_err(|_| bad_key())?;
            for part in [aad, iv, ciphertext, al.as_slice()] {
                mac.update(part);
            }
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha384 => {
            let mut mac = <Hmac<Sha384> as Mac>::new_from_slice(mac_key).map_err(|_| bad_key())?;
            for part in [aad, iv, ciphertext, al.as_slice()] {
                mac.update(part);
            }
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha512 => {
            let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(mac_key).map_err(|_| bad_key())?;
            for part in [aad, iv, ciphertext, al.as_slice()] {
                mac.update(part);
            }
            mac.finalize().into_bytes().to_vec()
        }
    };

    Ok(full[..enc.tag_len()].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn test_rsa_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).expect("RSA generation"))
    }

    const ALL_CONTENT_ALGS: [ContentEncryptionAlgorithm; 8] = [
        ContentEncryptionAlgorithm::A128Gcm,
        ContentEncryptionAlgorithm::A192Gcm,
        ContentEncryptionAlgorithm::A256Gcm,
        ContentEncryptionAlgorithm::A128CbcHs256,
        ContentEncryptionAlgorithm::A192CbcHs384,
        ContentEncryptionAlgorithm::A256CbcHs512,
        ContentEncryptionAlgorithm::A128CbcPlusHs256,
        ContentEncryptionAlgorithm::A256CbcPlusHs512,
    ];

    #[test]
    fn rsa_roundtrip_all_content_algorithms() {
        let private = test_rsa_key();
        let public = RsaPublicKey::from(private);
        let payload = br#"{"sub":"user-1","member_of":["g1","g2","g3"]}"#;

        for alg in [
            KeyManagementAlgorithm::Rsa1_5,
            KeyManagementAlgorithm::RsaOaep,
            KeyManagementAlgorithm::RsaOaep256,
        ] {
            for enc in ALL_CONTENT_ALGS {
                let token = encrypt(
                    payload,
                    &JweRecipientKey::RsaPublic(&public),
                    JweHeader::new(alg, enc),
                )
                .unwrap();
                assert_eq!(token.split('.').count(), 5);

                let decrypted =
                    decrypt(&token, &JweDecryptionKey::RsaPrivate(private)).unwrap();
                assert_eq!(decrypted.plaintext, payload, "{alg:?}/{enc:?}");
            }
        }
    }

    #[test]
    fn key_wrap_roundtrip_all_content_algorithms() {
        let payload = b"wrapped payload";

        for alg in [
            KeyManagementAlgorithm::A128Kw,
            KeyManagementAlgorithm::A192Kw,
            KeyManagementAlgorithm::A256Kw,
        ] {
            let kek = symmetric_kek(b"registered client secret", alg).unwrap();
            for enc in ALL_CONTENT_ALGS {
                let token = encrypt(
                    payload,
                    &JweRecipientKey::Secret(&kek),
                    JweHeader::new(alg, enc),
                )
                .unwrap();

                let decrypted = decrypt(&token, &JweDecryptionKey::Secret(&kek)).unwrap();
                assert_eq!(decrypted.plaintext, payload, "{alg:?}/{enc:?}");
            }
        }
    }

    #[test]
    fn tampered_ciphertext_is_decryption_failed() {
        let kek = symmetric_kek(b"secret", KeyManagementAlgorithm::A128Kw).unwrap();
        let token = encrypt(
            b"payload",
            &JweRecipientKey::Secret(&kek),
            JweHeader::new(
                KeyManagementAlgorithm::A128Kw,
                ContentEncryptionAlgorithm::A128CbcHs256,
            ),
        )
        .unwrap();

        let mut segments: Vec<String> = token.split('.').map(String::from).collect();
        let mut ct = URL_SAFE_NO_PAD.decode(&segments[3]).unwrap();
        ct[0] ^= 0x01;
        segments[3] = URL_SAFE_NO_PAD.encode(ct);
        let tampered = segments.join(".");

        assert!(matches!(
            decrypt(&tampered, &JweDecryptionKey::Secret(&kek)),
            Err(JoseError::DecryptionFailed)
        ));
    }

    #[test]
    fn wrong_kek_is_decryption_failed() {
        let kek = symmetric_kek(b"secret-a", KeyManagementAlgorithm::A256Kw).unwrap();
        let other = symmetric_kek(b"secret-b", KeyManagementAlgorithm::A256Kw).unwrap();
        let token = encrypt(
            b"payload",
            &JweRecipientKey::Secret(&kek),
            JweHeader::new(
                KeyManagementAlgorithm::A256Kw,
                ContentEncryptionAlgorithm::A256Gcm,
            ),
        )
        .unwrap();

        assert!(matches!(
            decrypt(&token, &JweDecryptionKey::Secret(&other)),
            Err(JoseError::DecryptionFailed)
        ));
    }

    #[test]
    fn legacy_split_reverses_key_halves() {
        let cek: Vec<u8> = (0u8..32).collect();

        let (enc_rfc, mac_rfc) = split_cek(&cek, ContentEncryptionAlgorithm::A128CbcHs256);
        assert_eq!(mac_rfc, &cek[..16]);
        assert_eq!(enc_rfc, &cek[16..]);

        let (enc_legacy, mac_legacy) =
            split_cek(&cek, ContentEncryptionAlgorithm::A128CbcPlusHs256);
        assert_eq!(enc_legacy, &cek[..16]);
        assert_eq!(mac_legacy, &cek[16..]);
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        assert!(matches!(
            decrypt("a.b.c", &JweDecryptionKey::Secret(&[0u8; 16])),
            Err(JoseError::Malformed(_))
        ));
    }

    #[test]
    fn kek_derivation_is_sized_to_algorithm() {
        let secret = b"client secret";
        assert_eq!(
            symmetric_kek(secret, KeyManagementAlgorithm::A128Kw)
                .unwrap()
                .len(),
            16
        );
        assert_eq!(
            symmetric_kek(secret, KeyManagementAlgorithm::A256Kw)
                .unwrap()
                .len(),
            32
        );
        assert!(symmetric_kek(secret, KeyManagementAlgorithm::RsaOaep).is_err());
    }
}
