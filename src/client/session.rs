use std::sync::{Arc, RwLock};

/// Holds the bearer token for an API client.
///
/// Cloning a `Session` shares the token, so a client and the code that owns
/// it see the same login state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_token(token);
        session
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_token() {
        let session = Session::new();
        assert!(!session.is_authenticated());

        let other = session.clone();
        other.set_token("abc");
        assert_eq!(session.token().as_deref(), Some("abc"));

        session.clear();
        assert!(!other.is_authenticated());
    }

    #[test]
    fn with_token_starts_authenticated() {
        assert!(Session::with_token("t").is_authenticated());
    }
}
