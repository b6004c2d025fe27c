use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use tastebud_shared::errors::AppError;
use tastebud_shared::middleware::encode_access_token;
use tastebud_shared::types::auth::TokenPair;

pub fn create_refresh_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Only the hash of a refresh token is stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns the pair handed to the client and the refresh hash to persist.
pub fn create_token_pair(
    credential_id: Uuid,
    secret: &str,
    access_ttl: i64,
) -> Result<(TokenPair, String), AppError> {
    let access_token = encode_access_token(credential_id, secret, access_ttl)?;
    let refresh_token = create_refresh_token();
    let refresh_hash = hash_token(&refresh_token);
    let pair = TokenPair::new(access_token, refresh_token, access_ttl);
    Ok((pair, refresh_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tastebud_shared::middleware::decode_access_token;

    #[test]
    fn refresh_tokens_are_random_hex() {
        let a = create_refresh_token();
        let b = create_refresh_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_and_not_the_token() {
        let token = create_refresh_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn pair_access_token_decodes_to_credential() {
        let id = Uuid::new_v4();
        let (pair, hash) = create_token_pair(id, "test-secret", 900).unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(hash, hash_token(&pair.refresh_token));
        assert_eq!(decode_access_token(&pair.access_token, "test-secret").unwrap().sub, id);
    }
}
