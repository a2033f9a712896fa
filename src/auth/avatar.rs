use sha2::{Digest, Sha256};

/// Gravatar URL for an email: 200px, rated PG, mystery-person fallback.
pub fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?s=200&r=pg&d=mm",
        hex::encode(digest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_email_same_avatar() {
        assert_eq!(gravatar_url("a@x.com"), gravatar_url(" A@X.com "));
        assert_ne!(gravatar_url("a@x.com"), gravatar_url("b@x.com"));
    }

    #[test]
    fn url_shape() {
        let url = gravatar_url("a@x.com");
        assert!(url.starts_with("https://www.gravatar.com/avatar/"));
        assert!(url.ends_with("?s=200&r=pg&d=mm"));
        // 32-byte digest, hex encoded
        let hash = url
            .trim_start_matches("https://www.gravatar.com/avatar/")
            .split('?')
            .next()
            .unwrap();
        assert_eq!(hash.len(), 64);
    }
}
