//! # 자격증명 암호화 모듈
//!
//! AES-256-GCM을 사용한 API 시크릿 암호화/복호화 기능을 제공합니다.
//!
//! ## 보안 고려사항
//! - 마스터 키는 환경변수에서 한 번만 유도 (64자 hex 또는 SHA-256 해시)
//! - 각 암호화마다 고유한 nonce (12바이트) 사용
//! - 저장 형식: `base64url(nonce):base64url(ciphertext):base64url(tag)`
//! - 태그 검증에 실패하면 평문을 절대 반환하지 않음

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// 암호화 에러
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption master key not configured")]
    MasterKeyNotConfigured,

    #[error("master key must derive to {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid encrypted payload format")]
    InvalidFormat,

    #[error("authentication failed: payload tampered or wrong key")]
    AuthenticationFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

/// AES-256-GCM nonce 크기 (바이트)
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 크기 (바이트)
pub const KEY_SIZE: usize = 32;

/// GCM 인증 태그 크기 (바이트)
pub const TAG_SIZE: usize = 16;

/// API 시크릿 암호화 볼트
///
/// 프로세스 시작 시 한 번 생성되어 모든 요청이 읽기 전용으로 공유합니다.
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// 마스터 키 문자열로 볼트 생성
    ///
    /// 키 유도 규칙:
    /// - 정확히 64자의 hex 문자열이면 raw 키 바이트로 디코드
    /// - 그 외에는 UTF-8 바이트를 SHA-256으로 해시하여 32바이트 키 생성
    ///
    /// # Errors
    /// 빈 문자열이면 `MasterKeyNotConfigured`,
    /// 유도 결과가 32바이트가 아니면 `InvalidKeyLength`를 반환합니다.
    ///
    /// # Example
    /// ```ignore
    /// let key = std::env::var("APP_ENC_KEY")?;
    /// let vault = CredentialVault::new(&key)?;
    /// ```
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        let key_bytes = derive_master_key(master_key)?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// 문자열 암호화
    ///
    /// 호출마다 새로운 랜덤 nonce를 생성합니다. 같은 평문을 두 번 암호화해도
    /// 결과는 다릅니다 (nonce 재사용은 GCM에서 치명적).
    ///
    /// # Returns
    /// `base64url(nonce):base64url(ciphertext):base64url(tag)` 형식 문자열
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // aes-gcm은 ciphertext 뒤에 태그를 붙여 반환
        let sealed = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

        Ok(format!(
            "{}:{}:{}",
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode(tag),
        ))
    }

    /// 암호화된 페이로드 복호화
    ///
    /// 태그 검증은 평문 반환 전에 수행됩니다. 어떤 구성 요소든 변조되면
    /// `AuthenticationFailed`로 실패하며 손상된 평문이 반환되는 일은 없습니다.
    ///
    /// # Errors
    /// - `InvalidFormat`: 빈 페이로드, 구분자 개수 불일치, base64 디코드 실패
    /// - `AuthenticationFailed`: 태그 불일치 (변조 또는 잘못된 키)
    pub fn decrypt(&self, payload: &str) -> Result<String, CryptoError> {
        if payload.is_empty() {
            return Err(CryptoError::InvalidFormat);
        }

        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() != 3 {
            return Err(CryptoError::InvalidFormat);
        }

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(parts[0])
            .map_err(|_| CryptoError::InvalidFormat)?;
        let ciphertext = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| CryptoError::InvalidFormat)?;
        let tag = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| CryptoError::InvalidFormat)?;

        if nonce_bytes.len() != NONCE_SIZE || tag.len() != TAG_SIZE {
            return Err(CryptoError::InvalidFormat);
        }

        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(nonce, sealed.as_slice())
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(CryptoError::from)
    }
}

/// 마스터 키 문자열에서 32바이트 키 유도
///
/// 64자 hex면 직접 디코드, 아니면 SHA-256 해시. 같은 입력은 항상 같은
/// 키를 만듭니다.
pub fn derive_master_key(raw: &str) -> Result<[u8; KEY_SIZE], CryptoError> {
    if raw.is_empty() {
        return Err(CryptoError::MasterKeyNotConfigured);
    }

    let key_bytes = if raw.len() == KEY_SIZE * 2 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode(raw).map_err(|_| CryptoError::InvalidFormat)?
    } else {
        Sha256::digest(raw.as_bytes()).to_vec()
    };

    // 두 경로 모두 32바이트를 만들지만, 유도 규칙이 바뀌는 경우를 방어
    let actual = key_bytes.len();
    key_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual,
        })
}

/// 새로운 마스터 키 생성 (초기 설정용)
///
/// # Example
/// ```
/// let key = exgate_core::crypto::generate_master_key();
/// println!("APP_ENC_KEY={}", key);
/// ```
pub fn generate_master_key() -> String {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_vault() -> CredentialVault {
        CredentialVault::new(&generate_master_key()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let vault = test_vault();
        let plaintext = "my-secret-api-key-12345";

        let sealed = vault.encrypt(plaintext).unwrap();
        let decrypted = vault.decrypt(&sealed).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_roundtrip_edge_cases() {
        let vault = test_vault();

        // 빈 문자열, 구분자 포함, 비ASCII 모두 왕복 가능해야 함
        for plaintext in ["", "a:b:c:d", "시크릿-ключ-🔑", "  spaces  "] {
            let sealed = vault.encrypt(plaintext).unwrap();
            assert_eq!(vault.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_payload_format() {
        let vault = test_vault();
        let sealed = vault.encrypt("secret").unwrap();

        let parts: Vec<&str> = sealed.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(
            URL_SAFE_NO_PAD.decode(parts[0]).unwrap().len(),
            NONCE_SIZE
        );
        assert_eq!(URL_SAFE_NO_PAD.decode(parts[2]).unwrap().len(), TAG_SIZE);
    }

    #[test]
    fn test_nonce_uniqueness() {
        let vault = test_vault();

        let first = vault.encrypt("same-plaintext").unwrap();
        let second = vault.encrypt("same-plaintext").unwrap();

        assert_ne!(first, second);
        // nonce 구성 요소 자체가 달라야 함
        assert_ne!(
            first.split(':').next().unwrap(),
            second.split(':').next().unwrap()
        );
    }

    #[test]
    fn test_tamper_detection_ciphertext() {
        let vault = test_vault();
        let sealed = vault.encrypt("tamper-target").unwrap();

        let parts: Vec<&str> = sealed.split(':').collect();
        let mut ciphertext = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        ciphertext[0] ^= 0x01;
        let tampered = format!(
            "{}:{}:{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(&ciphertext),
            parts[2]
        );

        assert!(matches!(
            vault.decrypt(&tampered),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tamper_detection_tag() {
        let vault = test_vault();
        let sealed = vault.encrypt("tamper-target").unwrap();

        let parts: Vec<&str> = sealed.split(':').collect();
        let mut tag = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        tag[TAG_SIZE - 1] ^= 0x80;
        let tampered = format!(
            "{}:{}:{}",
            parts[0],
            parts[1],
            URL_SAFE_NO_PAD.encode(&tag)
        );

        assert!(matches!(
            vault.decrypt(&tampered),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = test_vault().encrypt("secret").unwrap();
        let other = test_vault();

        assert!(matches!(
            other.decrypt(&sealed),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_invalid_format_rejected() {
        let vault = test_vault();

        for payload in ["", "not-a-valid-payload", "only:one", "a:b:c:d", "!:!:!"] {
            assert!(
                matches!(vault.decrypt(payload), Err(CryptoError::InvalidFormat)),
                "payload {payload:?} should be rejected as InvalidFormat"
            );
        }
    }

    #[test]
    fn test_derive_key_hex_path() {
        let hex_key = "0f".repeat(32);
        let key = derive_master_key(&hex_key).unwrap();

        assert_eq!(key, [0x0f; KEY_SIZE]);
    }

    #[test]
    fn test_derive_key_digest_path() {
        // 64자가 아니므로 SHA-256 해시 경로
        let key = derive_master_key("passphrase-not-hex").unwrap();
        let again = derive_master_key("passphrase-not-hex").unwrap();

        assert_eq!(key.len(), KEY_SIZE);
        assert_eq!(key, again);
        assert_ne!(key, derive_master_key("another-passphrase").unwrap());
    }

    #[test]
    fn test_hex_length_but_not_hex_is_hashed() {
        // 64자이지만 hex가 아니면 해시 경로를 타야 함
        let source = "g".repeat(64);
        let key = derive_master_key(&source).unwrap();

        assert_eq!(key.to_vec(), Sha256::digest(source.as_bytes()).to_vec());
    }

    #[test]
    fn test_empty_master_key_is_fatal() {
        assert!(matches!(
            CredentialVault::new(""),
            Err(CryptoError::MasterKeyNotConfigured)
        ));
    }

    #[test]
    fn test_generate_master_key() {
        let key1 = generate_master_key();
        let key2 = generate_master_key();

        assert_ne!(key1, key2);
        assert_eq!(key1.len(), KEY_SIZE * 2);
        assert!(CredentialVault::new(&key1).is_ok());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in ".*") {
            let vault = test_vault();
            let sealed = vault.encrypt(&plaintext).unwrap();
            prop_assert_eq!(vault.decrypt(&sealed).unwrap(), plaintext);
        }
    }
}
