//! Signed capability tokens
//!
//! A token proves that its bearer was handed a specific entity id by the
//! server: `base64url(purpose || uuid || hmac(purpose || uuid))`.
//! Nothing is stored server-side; rotating the secret invalidates all tokens.

use uuid::Uuid;

use crate::crypto::{constant_time_eq, from_base64url, hmac_sha256, to_base64url};

const ID_LEN: usize = 16;
const MAC_LEN: usize = 32;
const TOKEN_LEN: usize = 1 + ID_LEN + MAC_LEN;

/// What a token grants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenPurpose {
    /// Lifecycle control of one room (id = room id)
    Moderator = 1,
    /// Acting as one participant (id = participant id)
    Participant = 2,
}

impl TokenPurpose {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Moderator),
            2 => Some(Self::Participant),
            _ => None,
        }
    }
}

/// Error returned when a token cannot be verified
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,
    #[error("Token signature mismatch")]
    BadSignature,
    #[error("Token issued for a different purpose")]
    WrongPurpose,
}

/// Issue a token for `id`
pub fn issue(secret: &[u8; 32], purpose: TokenPurpose, id: &Uuid) -> String {
    let mut data = Vec::with_capacity(TOKEN_LEN);
    data.push(purpose as u8);
    data.extend_from_slice(id.as_bytes());
    let signature = hmac_sha256(secret, &data);
    data.extend_from_slice(&signature);
    to_base64url(&data)
}

/// Verify a token and return the id it was issued for
pub fn verify(secret: &[u8; 32], expected: TokenPurpose, token: &str) -> Result<Uuid, TokenError> {
    let data = from_base64url(token.trim()).map_err(|_| TokenError::Malformed)?;
    if data.len() != TOKEN_LEN {
        return Err(TokenError::Malformed);
    }

    let (payload, provided) = data.split_at(1 + ID_LEN);
    let expected_signature = hmac_sha256(secret, payload);
    if !constant_time_eq(provided, &expected_signature) {
        return Err(TokenError::BadSignature);
    }

    let (purpose, id_bytes) = payload.split_at(1);
    match purpose.first().copied().and_then(TokenPurpose::from_byte) {
        Some(p) if p == expected => {}
        Some(_) => return Err(TokenError::WrongPurpose),
        None => return Err(TokenError::Malformed),
    }

    let id: [u8; ID_LEN] = id_bytes.try_into().map_err(|_| TokenError::Malformed)?;
    Ok(Uuid::from_bytes(id))
}
