//! 租户名称解密
//!
//! 余额记录里的 `Nbre` 字段是 Fernet 加密后再做一次 URL-safe base64 的租户名称。
//! 旧数据里也存在只做了 base64 的明文，这里同样接受。

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use fernet::Fernet;
use sha2::Sha256;
use thiserror::Error;

/// PBKDF2 迭代次数
const KEY_DERIVATION_ROUNDS: u32 = 100_000;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("派生密钥无效")]
    InvalidKey,
    #[error("租户名称为空")]
    EmptyToken,
    #[error("租户名称无法解密")]
    Undecodable,
}

/// 租户名称解密器
pub struct TenantCipher {
    fernet: Fernet,
}

impl TenantCipher {
    /// 由口令和盐派生 Fernet 密钥
    pub fn new(passphrase: &str, salt: &str) -> Result<Self, CipherError> {
        let mut derived = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            passphrase.as_bytes(),
            salt.as_bytes(),
            KEY_DERIVATION_ROUNDS,
            &mut derived,
        );
        let key = URL_SAFE.encode(derived);
        let fernet = Fernet::new(&key).ok_or(CipherError::InvalidKey)?;
        Ok(Self { fernet })
    }

    /// 加密租户名称，输出格式与余额接口中存储的一致
    pub fn encrypt(&self, plain: &str) -> String {
        let token = self.fernet.encrypt(plain.as_bytes());
        URL_SAFE.encode(token.as_bytes())
    }

    /// 解密租户名称
    ///
    /// 依次尝试：外层 base64 + Fernet、原样 Fernet、纯 base64 文本。
    pub fn decrypt(&self, stored: &str) -> Result<String, CipherError> {
        let stored = stored.trim();
        if stored.is_empty() {
            return Err(CipherError::EmptyToken);
        }

        let unwrapped = decode_text(stored);
        let fernet_token = unwrapped.as_deref().unwrap_or(stored);
        if let Ok(plain) = self.fernet.decrypt(fernet_token) {
            if let Some(name) = non_empty_utf8(plain) {
                return Ok(name);
            }
        }

        unwrapped
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(CipherError::Undecodable)
    }
}

fn decode_text(value: &str) -> Option<String> {
    URL_SAFE
        .decode(value)
        .or_else(|_| STANDARD.decode(value))
        .ok()
        .and_then(non_empty_utf8)
}

fn non_empty_utf8(bytes: Vec<u8>) -> Option<String> {
    String::from_utf8(bytes)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TenantCipher {
        TenantCipher::new("LICENSE_DB_ENCRYPTION_KEY_2024", "license_salt_2024_stable").unwrap()
    }

    #[test]
    fn test_decrypts_wrapped_fernet_token() {
        let cipher = cipher();
        let stored = cipher.encrypt("IPS SALUD TOTAL");
        assert_eq!(cipher.decrypt(&stored).unwrap(), "IPS SALUD TOTAL");
    }

    #[test]
    fn test_plain_base64_fallback() {
        let stored = URL_SAFE.encode("CLINICA NORTE");
        assert_eq!(cipher().decrypt(&stored).unwrap(), "CLINICA NORTE");
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(matches!(cipher().decrypt("   "), Err(CipherError::EmptyToken)));
        assert!(matches!(
            cipher().decrypt("%%%not-base64%%%"),
            Err(CipherError::Undecodable)
        ));
    }

    #[test]
    fn test_different_passphrase_cannot_read_token() {
        let stored = cipher().encrypt("IPS SALUD TOTAL");
        let other = TenantCipher::new("otra-clave", "otra-sal").unwrap();
        // 外层 base64 仍可解开，但得到的是 Fernet 令牌而不是租户名
        let decoded = other.decrypt(&stored).unwrap();
        assert_ne!(decoded, "IPS SALUD TOTAL");
    }
}
