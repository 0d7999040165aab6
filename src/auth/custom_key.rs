//! Custom Key Derivation
//! Mission: Bind refresh tokens to the user's current rotating secret

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

fn keyed(user_id: &Uuid, rotating_secret: &str) -> HmacSha256 {
    // HMAC takes keys of any length, including empty ones.
    let mut mac = HmacSha256::new_from_slice(rotating_secret.as_bytes())
        .expect("HMAC key length is unrestricted");
    mac.update(user_id.to_string().as_bytes());
    mac
}

/// HMAC-SHA256 keyed by the rotating secret over the user id, lowercase hex.
pub fn derive(user_id: &Uuid, rotating_secret: &str) -> String {
    hex::encode(keyed(user_id, rotating_secret).finalize().into_bytes())
}

/// Constant-time check of a presented key against the current secret.
pub fn verify(user_id: &Uuid, rotating_secret: &str, presented: &str) -> bool {
    let Ok(presented) = hex::decode(presented) else {
        return false;
    };
    keyed(user_id, rotating_secret)
        .verify_slice(&presented)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let user_id = Uuid::new_v4();
        assert_eq!(derive(&user_id, "secret-1"), derive(&user_id, "secret-1"));
        assert_eq!(derive(&user_id, "secret-1").len(), 64);
    }

    #[test]
    fn test_rotation_changes_key() {
        let user_id = Uuid::new_v4();
        assert_ne!(derive(&user_id, "secret-1"), derive(&user_id, "secret-2"));
    }

    #[test]
    fn test_different_users_get_different_keys() {
        assert_ne!(
            derive(&Uuid::new_v4(), "shared"),
            derive(&Uuid::new_v4(), "shared")
        );
    }

    #[test]
    fn test_known_vector() {
        // printf '<uuid>' | openssl dgst -sha256 -hmac key
        let user_id = Uuid::parse_str("6f1d1b7e-0d7a-4c2e-9a52-3f0b5c1d2e4f").unwrap();
        assert_eq!(
            derive(&user_id, "key"),
            "ac829369b2e22bbb1518f1170ce286f0561c5952cf369a25e8c66dac99c11cf3"
        );
    }

    #[test]
    fn test_verify() {
        let user_id = Uuid::new_v4();
        let key = derive(&user_id, "current");

        assert!(verify(&user_id, "current", &key));
        assert!(verify(&user_id, "current", &key.to_uppercase()));
        assert!(!verify(&user_id, "rotated", &key));
        assert!(!verify(&Uuid::new_v4(), "current", &key));
        assert!(!verify(&user_id, "current", "not-hex"));
        assert!(!verify(&user_id, "current", ""));
    }
}
