//! AES-256-GCM 私钥传输解密
//!
//! 客户端提交的 `pk` 为 hex(nonce(12) || ciphertext)，服务端用配置密钥解密后只在内存中使用。

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const NONCE_LEN: usize = 12;

/// 加密数据
///
/// 返回 nonce + ciphertext
pub fn encrypt_data(data: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| anyhow!("Invalid key: {}", e))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// 解密数据（nonce + ciphertext）
pub fn decrypt_data(encrypted: &[u8], key: &EncryptionKey) -> Result<Zeroizing<Vec<u8>>> {
    if encrypted.len() <= NONCE_LEN {
        return Err(anyhow!("Encrypted data too short"));
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| anyhow!("Invalid key: {}", e))?;

    let nonce = Nonce::from_slice(&encrypted[..NONCE_LEN]);
    let ciphertext = &encrypted[NONCE_LEN..];

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| anyhow!("Decryption failed"))?;

    Ok(Zeroizing::new(plaintext))
}

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.key
    }

    /// 支持三种格式：64位hex、32字节原文、至少16字符（SHA-256派生）
    pub fn parse(key_str: &str) -> Result<Self> {
        if key_str.is_empty() {
            return Err(anyhow!("PK_ENC_KEY empty"));
        }

        let bytes = Zeroizing::new(if key_str.len() == 64 {
            hex::decode(key_str).map_err(|e| anyhow!("Invalid hex key: {}", e))?
        } else if key_str.len() == 32 {
            key_str.as_bytes().to_vec()
        } else if key_str.len() >= 16 {
            let mut hasher = Sha256::new();
            hasher.update(key_str.as_bytes());
            hasher.finalize().to_vec()
        } else {
            return Err(anyhow!("PK_ENC_KEY too short (min 16)"));
        });

        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }
}

/// 加密私钥并输出 hex，供客户端/测试生成 `pk` 字段
pub fn encrypt_private_key(private_key: &str, key: &EncryptionKey) -> Result<String> {
    Ok(hex::encode(encrypt_data(private_key.as_bytes(), key)?))
}

/// 解密客户端提交的 `pk` 字段
pub fn decrypt_private_key(encoded: &str, key: &EncryptionKey) -> Result<Zeroizing<String>> {
    let encoded = encoded.trim();
    let raw = hex::decode(encoded.strip_prefix("0x").unwrap_or(encoded))
        .map_err(|_| anyhow!("pk is not valid hex"))?;

    let plaintext = decrypt_data(&raw, key)?;
    let text = std::str::from_utf8(&plaintext).map_err(|_| anyhow!("pk is not valid UTF-8"))?;

    Ok(Zeroizing::new(text.trim().to_string()))
}
