//! Password de-obfuscation
//!
//! Stored passwords are XOR-ed character by character with a repeating key.

use secrecy::SecretString;

use crate::errors::BridgeError;

/// XOR each character of `value` with the repeating `key`
pub fn deobfuscate(key: &str, value: &str) -> Result<SecretString, BridgeError> {
    let key: Vec<char> = key.chars().collect();
    if key.is_empty() {
        return Err(BridgeError::Config("password key is empty".to_string()));
    }

    let plain = value
        .chars()
        .zip(key.iter().cycle())
        .map(|(c, k)| char::from_u32(c as u32 ^ *k as u32))
        .collect::<Option<String>>()
        .ok_or_else(|| BridgeError::Config("password does not match its key".to_string()))?;
    Ok(SecretString::from(plain))
}
