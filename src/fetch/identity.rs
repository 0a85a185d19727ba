//! Outbound identity rotation.
//!
//! Every request draws a user agent uniformly at random from a small pool.
//! The platform distinguishes connections loosely, so there is no session
//! affinity. A configured session cookie is attached verbatim to every
//! request; running without one is valid but sees more blocking.

use rand::seq::IndexedRandom;

/// Used only when the configured pool is empty.
const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// The identity presented on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub cookie: Option<String>,
}

/// Read-only pool of user agents plus the optional session cookie.
#[derive(Debug, Clone)]
pub struct IdentityRotator {
    pool: Vec<String>,
    cookie: Option<String>,
}

impl IdentityRotator {
    /// Blank cookies are treated as absent.
    pub fn new(pool: Vec<String>, cookie: Option<String>) -> Self {
        let cookie = cookie
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Self { pool, cookie }
    }

    pub fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    pub fn next_identity(&self) -> Identity {
        let user_agent = self
            .pool
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string());
        Identity {
            user_agent,
            cookie: self.cookie.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_comes_from_pool() {
        let pool = vec!["UA-1".to_string(), "UA-2".to_string()];
        let rotator = IdentityRotator::new(pool.clone(), None);
        for _ in 0..50 {
            let identity = rotator.next_identity();
            assert!(pool.contains(&identity.user_agent));
            assert!(identity.cookie.is_none());
        }
    }

    #[test]
    fn test_cookie_attached_verbatim() {
        let rotator = IdentityRotator::new(vec!["UA".into()], Some("z_c0=abc; d_c0=def".into()));
        assert!(rotator.has_cookie());
        assert_eq!(
            rotator.next_identity().cookie.as_deref(),
            Some("z_c0=abc; d_c0=def")
        );
    }

    #[test]
    fn test_blank_cookie_is_absent() {
        let rotator = IdentityRotator::new(vec!["UA".into()], Some("   ".into()));
        assert!(!rotator.has_cookie());
    }

    #[test]
    fn test_empty_pool_falls_back() {
        let rotator = IdentityRotator::new(Vec::new(), None);
        assert!(rotator.next_identity().user_agent.starts_with("Mozilla/5.0"));
    }
}
