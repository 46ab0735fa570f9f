//! Per-session CAPTCHA challenge store.
//!
//! Holds the expected answer for each browser session, keyed by a random
//! session id carried in a signed `session` cookie.
//!
//! Key properties:
//! - Challenges live only in memory and expire after a fixed TTL
//! - Every verification attempt consumes the challenge (no replay)
//! - Cookie values are `<uuid>.<tag>`; the tag binds the id to the
//!   server secret so clients cannot mint their own ids

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// Upper bound on concurrently stored challenges.
///
/// Cookieless clients can fill the store and push out other sessions'
/// live challenges. Those callers just get a new challenge on their next
/// page load.
const MAX_SESSIONS: usize = 10_000;

/// Hex characters kept from the SHA-256 tag.
const TAG_LEN: usize = 32;

// ═══════════════════════════════════════════════════════════
// Challenge entries
// ═══════════════════════════════════════════════════════════

struct ChallengeEntry {
    text: String,
    issued_at: Instant,
}

impl ChallengeEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.issued_at.elapsed() >= ttl
    }
}

// ═══════════════════════════════════════════════════════════
// SessionStore
// ═══════════════════════════════════════════════════════════

/// Expected CAPTCHA answers per session id.
pub struct SessionStore {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<Uuid, ChallengeEntry>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_SESSIONS)
    }

    /// Store bounded to `capacity` challenges (at least one).
    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Store a fresh challenge for `session`, replacing any previous one.
    pub fn issue(&mut self, session: Uuid, text: String) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&session) {
            // Expired entries go first; a live one is dropped only when
            // nothing has expired
            self.evict_expired();
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }
        self.entries.insert(
            session,
            ChallengeEntry {
                text,
                issued_at: Instant::now(),
            },
        );
    }

    /// Peek at the live challenge for `session`.
    pub fn get(&self, session: &Uuid) -> Option<&str> {
        self.entries
            .get(session)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.text.as_str())
    }

    /// Remove and return the challenge for `session`.
    /// Expired challenges are removed but not returned.
    pub fn take(&mut self, session: &Uuid) -> Option<String> {
        let entry = self.entries.remove(session)?;
        if entry.is_expired(self.ttl) {
            return None;
        }
        Some(entry.text)
    }

    /// Drop every expired challenge. Returns how many were removed.
    pub fn evict_expired(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
        before - self.entries.len()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.issued_at)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            self.entries.remove(&id);
        }
    }

    /// Number of stored challenges (expired ones included until evicted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════
// Signed session cookie
// ═══════════════════════════════════════════════════════════

fn tag(session: &Uuid, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(session.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()[..TAG_LEN]
        .to_string()
}

/// Cookie value for `session`: `<uuid>.<tag>`.
pub fn sign_session(session: &Uuid, secret: &str) -> String {
    format!("{}.{}", session, tag(session, secret))
}

/// Parse and verify a cookie value. Returns `None` on any mismatch.
pub fn verify_session(value: &str, secret: &str) -> Option<Uuid> {
    let (id, provided) = value.split_once('.')?;
    let session = Uuid::parse_str(id).ok()?;
    let expected = tag(&session, secret);
    if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
        Some(session)
    } else {
        None
    }
}

/// Extract a verified session id from request `Cookie` headers.
pub fn session_from_headers(headers: &HeaderMap, secret: &str) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE)
        .find_map(|(_, value)| verify_session(value, secret))
}

/// `Set-Cookie` header value for `session`.
pub fn session_cookie_header(session: &Uuid, secret: &str) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        sign_session(session, secret)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(600))
    }

    // ── SessionStore ──

    #[test]
    fn issue_then_get() {
        let mut store = store();
        let id = Uuid::new_v4();
        store.issue(id, "ABC234".into());
        assert_eq!(store.get(&id), Some("ABC234"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reissue_overwrites_previous_challenge() {
        let mut store = store();
        let id = Uuid::new_v4();
        store.issue(id, "FIRST2".into());
        store.issue(id, "SECND3".into());
        assert_eq!(store.get(&id), Some("SECND3"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn take_consumes_challenge() {
        let mut store = store();
        let id = Uuid::new_v4();
        store.issue(id, "ABC234".into());
        assert_eq!(store.take(&id).as_deref(), Some("ABC234"));
        assert_eq!(store.take(&id), None);
        assert!(store.is_empty());
    }

    #[test]
    fn sessions_are_independent() {
        let mut store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.issue(a, "AAAAAA".into());
        store.issue(b, "BBBBBB".into());
        assert_eq!(store.take(&a).as_deref(), Some("AAAAAA"));
        assert_eq!(store.get(&b), Some("BBBBBB"));
    }

    #[test]
    fn expired_challenge_is_not_returned() {
        let mut store = SessionStore::new(Duration::ZERO);
        let id = Uuid::new_v4();
        store.issue(id, "ABC234".into());
        assert_eq!(store.get(&id), None);
        assert_eq!(store.take(&id), None);
        assert!(store.is_empty());
    }

    #[test]
    fn evict_expired_removes_stale_entries() {
        let mut store = SessionStore::new(Duration::ZERO);
        store.issue(Uuid::new_v4(), "AAAAAA".into());
        store.issue(Uuid::new_v4(), "BBBBBB".into());
        assert_eq!(store.evict_expired(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn store_is_bounded() {
        let mut store = store();
        for _ in 0..MAX_SESSIONS + 5 {
            store.issue(Uuid::new_v4(), "ABCDEF".into());
        }
        assert_eq!(store.len(), MAX_SESSIONS);
    }

    #[test]
    fn full_store_drops_expired_before_live() {
        let mut store = SessionStore::with_capacity(Duration::from_millis(50), 2);
        let stale = Uuid::new_v4();
        store.issue(stale, "STALE2".into());
        std::thread::sleep(Duration::from_millis(80));

        let live = Uuid::new_v4();
        store.issue(live, "LIVE23".into());
        store.issue(Uuid::new_v4(), "NEWER4".into());

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&live), Some("LIVE23"));
        assert!(store.take(&stale).is_none());
    }

    #[test]
    fn full_store_evicts_oldest_live_entry() {
        let mut store = SessionStore::with_capacity(Duration::from_secs(600), 2);
        let (first, second, third) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.issue(first, "AAAAAA".into());
        std::thread::sleep(Duration::from_millis(2));
        store.issue(second, "BBBBBB".into());
        store.issue(third, "CCCCCC".into());

        assert_eq!(store.get(&first), None);
        assert_eq!(store.get(&second), Some("BBBBBB"));
        assert_eq!(store.get(&third), Some("CCCCCC"));
    }

    #[test]
    fn reissue_at_capacity_evicts_nobody() {
        let mut store = SessionStore::with_capacity(Duration::from_secs(600), 2);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.issue(a, "AAAAAA".into());
        store.issue(b, "BBBBBB".into());
        store.issue(a, "AAAAA2".into());
        assert_eq!(store.get(&a), Some("AAAAA2"));
        assert_eq!(store.get(&b), Some("BBBBBB"));
    }

    // ── Cookie signing ──

    #[test]
    fn signed_cookie_round_trips() {
        let id = Uuid::new_v4();
        let value = sign_session(&id, SECRET);
        assert_eq!(verify_session(&value, SECRET), Some(id));
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        let id = Uuid::new_v4();
        let value = sign_session(&id, SECRET);
        let other = Uuid::new_v4();
        let forged = format!("{other}.{}", value.split_once('.').unwrap().1);
        assert_eq!(verify_session(&forged, SECRET), None);
        assert_eq!(verify_session(&id.to_string(), SECRET), None);
        assert_eq!(verify_session("garbage.tag", SECRET), None);
    }

    #[test]
    fn cookie_is_bound_to_secret() {
        let id = Uuid::new_v4();
        let value = sign_session(&id, SECRET);
        assert_eq!(verify_session(&value, "another-secret"), None);
    }

    #[test]
    fn session_found_among_other_cookies() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!(
                "theme=dark; session={}; lang=en",
                sign_session(&id, SECRET)
            ))
            .unwrap(),
        );
        assert_eq!(session_from_headers(&headers, SECRET), Some(id));
    }

    #[test]
    fn missing_cookie_yields_none() {
        assert_eq!(session_from_headers(&HeaderMap::new(), SECRET), None);
    }

    #[test]
    fn set_cookie_header_shape() {
        let id = Uuid::new_v4();
        let header = session_cookie_header(&id, SECRET);
        assert!(header.starts_with("session="));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Path=/"));
    }
}
