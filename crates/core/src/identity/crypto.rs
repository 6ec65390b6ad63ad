//! Password hashing for the in-process provider

use crate::error::AuthError;

/// Hash a password with bcrypt off the async runtime.
pub(super) async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(|e| AuthError::Internal(e.to_string()))
}

/// Verify a password against a bcrypt hash off the async runtime.
pub(super) async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(|e| AuthError::Internal(e.to_string()))
}

/// Opaque account id: 32 lowercase hex characters.
pub(super) fn generate_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MIN_BCRYPT_COST;

    #[tokio::test]
    async fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse", MIN_BCRYPT_COST).await.unwrap();

        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("wrong horse", &hash).await.unwrap());
    }

    #[test]
    fn test_generated_uid_is_safe_document_key() {
        let uid = generate_uid();
        assert_eq!(uid.len(), 32);
        assert!(uid.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(crate::validation::validate_document_key(&uid).is_ok());
    }
}
