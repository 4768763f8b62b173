//! The context store: session lifecycle, conversation turns, and the
//! session-scoped tool-result cache.
//!
//! Every operation serializes on one lock, and the lock is only ever
//! held for in-memory work (map lookups, deque pushes) — no I/O.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canon::canonical_json;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One completed request/response exchange. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub turn_id: String,
    pub user_input: String,
    pub assistant_response: String,
    pub intent: String,
    pub confidence: f64,
    pub tools_used: Vec<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

/// Fields supplied by the runtime when appending a turn.
#[derive(Debug, Clone, Default)]
pub struct NewTurn {
    pub user_input: String,
    pub assistant_response: String,
    pub intent: String,
    pub confidence: f64,
    pub tools_used: Vec<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub metadata: serde_json::Map<String, Value>,
}

/// Projection of a turn handed to prompts and response meta.
#[derive(Debug, Clone, Serialize)]
pub struct RecentTurn {
    pub user_input: String,
    pub assistant_response: String,
    pub intent: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub session_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Bounded sliding window over `turns`.
    #[serde(skip)]
    window: VecDeque<ConversationTurn>,
    #[serde(skip)]
    tool_cache: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    ts: DateTime<Utc>,
    value: Value,
}

impl SessionContext {
    fn new(session_id: String, user_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            user_id,
            created_at: now,
            last_activity: now,
            turns: Vec::new(),
            metadata: serde_json::Map::new(),
            window: VecDeque::new(),
            tool_cache: HashMap::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ContextStore {
    window_max: usize,
    idle_timeout_hours: u64,
    sessions: Mutex<HashMap<String, SessionContext>>,
}

impl ContextStore {
    pub fn new(window_max: usize, idle_timeout_hours: u64) -> Self {
        Self {
            window_max,
            idle_timeout_hours,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a session id: touch a known id, adopt an unknown explicit
    /// id, or mint a fresh one.
    pub fn get_or_create(&self, session_id: Option<&str>, user_id: Option<&str>) -> String {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();

        if let Some(id) = session_id {
            if let Some(session) = sessions.get_mut(id) {
                session.last_activity = now;
                return id.to_owned();
            }
            sessions.insert(
                id.to_owned(),
                SessionContext::new(id.to_owned(), user_id.map(String::from), now),
            );
            return id.to_owned();
        }

        let id = Self::mint_session_id(now);
        sessions.insert(
            id.clone(),
            SessionContext::new(id.clone(), user_id.map(String::from), now),
        );
        id
    }

    fn mint_session_id(now: DateTime<Utc>) -> String {
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
        format!("session_{}_{suffix}", now.format("%Y%m%d_%H%M%S"))
    }

    /// Append a turn to the full history and the bounded window,
    /// creating the session if needed. Returns the turn id.
    pub fn append_turn(&self, session_id: &str, turn: NewTurn) -> String {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(session_id.to_owned()).or_insert_with(|| {
            SessionContext::new(session_id.to_owned(), None, now)
        });

        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..6];
        let turn_id = format!("turn_{}_{suffix}", session.turns.len());

        let record = ConversationTurn {
            turn_id: turn_id.clone(),
            user_input: turn.user_input,
            assistant_response: turn.assistant_response,
            intent: turn.intent,
            confidence: turn.confidence,
            tools_used: turn.tools_used,
            success: turn.success,
            timestamp: now,
            duration_ms: turn.duration_ms,
            metadata: turn.metadata,
        };

        session.turns.push(record.clone());
        if session.window.len() == self.window_max {
            session.window.pop_front();
        }
        session.window.push_back(record);
        session.last_activity = now;

        turn_id
    }

    /// Last `n` turns from the window, most recent last.
    pub fn recent_turns(&self, session_id: &str, n: usize) -> Vec<RecentTurn> {
        let sessions = self.sessions.lock();
        let Some(session) = sessions.get(session_id) else {
            return Vec::new();
        };
        let skip = session.window.len().saturating_sub(n);
        session
            .window
            .iter()
            .skip(skip)
            .map(|t| RecentTurn {
                user_input: t.user_input.clone(),
                assistant_response: t.assistant_response.clone(),
                intent: t.intent.clone(),
                success: t.success,
                timestamp: t.timestamp,
            })
            .collect()
    }

    // ── Tool-result cache ─────────────────────────────────────────

    /// Canonical cache key: `tool:{sorted-compact-json-args}`.
    pub fn cache_key(tool_name: &str, args: &serde_json::Map<String, Value>) -> String {
        format!(
            "{tool_name}:{}",
            canonical_json(&Value::Object(args.clone()))
        )
    }

    /// Fetch a cached value if present and fresh. `ttl_seconds: None`
    /// means entries never expire within the session's lifetime.
    pub fn get_cached(
        &self,
        session_id: &str,
        key: &str,
        ttl_seconds: Option<u64>,
    ) -> Option<Value> {
        let sessions = self.sessions.lock();
        let entry = sessions.get(session_id)?.tool_cache.get(key)?;
        if let Some(ttl) = ttl_seconds {
            let age = Utc::now().signed_duration_since(entry.ts);
            if age.num_seconds() > ttl as i64 {
                return None;
            }
        }
        Some(entry.value.clone())
    }

    /// Record a tool result, creating the session if needed.
    pub fn set_cached(&self, session_id: &str, key: &str, value: Value) {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(session_id.to_owned()).or_insert_with(|| {
            SessionContext::new(session_id.to_owned(), None, now)
        });
        session
            .tool_cache
            .insert(key.to_owned(), CacheEntry { ts: now, value });
    }

    // ── Inspection ────────────────────────────────────────────────

    pub fn get(&self, session_id: &str) -> Option<SessionContext> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// Summaries of all live sessions.
    pub fn list(&self) -> Vec<(String, DateTime<Utc>, usize)> {
        self.sessions
            .lock()
            .values()
            .map(|s| (s.session_id.clone(), s.last_activity, s.turns.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    // ── Reclamation ───────────────────────────────────────────────

    /// Drop sessions idle beyond the configured timeout. Returns how
    /// many were removed.
    pub fn reclaim_idle(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::hours(self.idle_timeout_hours as i64);
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.last_activity >= cutoff);
        before - sessions.len()
    }

    #[cfg(test)]
    fn backdate(&self, session_id: &str, hours: i64) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(session_id) {
            session.last_activity -= chrono::Duration::hours(hours);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> ContextStore {
        ContextStore::new(3, 24)
    }

    fn turn(text: &str) -> NewTurn {
        NewTurn {
            user_input: text.into(),
            assistant_response: format!("re: {text}"),
            intent: "chat".into(),
            confidence: 0.7,
            success: true,
            ..NewTurn::default()
        }
    }

    #[test]
    fn minted_session_id_has_expected_shape() {
        let store = store();
        let id = store.get_or_create(None, None);
        assert!(id.starts_with("session_"));
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[3].len(), 8);
    }

    #[test]
    fn explicit_unknown_id_is_adopted() {
        let store = store();
        let id = store.get_or_create(Some("external-77"), Some("u1"));
        assert_eq!(id, "external-77");
        assert_eq!(store.get_or_create(Some("external-77"), None), "external-77");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn window_is_bounded_but_history_is_not() {
        let store = store();
        let sid = store.get_or_create(None, None);
        for i in 0..5 {
            store.append_turn(&sid, turn(&format!("m{i}")));
        }
        let recent = store.recent_turns(&sid, 10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].user_input, "m2");
        assert_eq!(recent[2].user_input, "m4");
        assert_eq!(store.get(&sid).unwrap().turns.len(), 5);
    }

    #[test]
    fn cache_key_is_stable_under_key_permutation() {
        let a: serde_json::Map<String, Value> =
            serde_json::from_value(json!({"city": "서울", "units": "c"})).unwrap();
        let b: serde_json::Map<String, Value> =
            serde_json::from_value(json!({"units": "c", "city": "서울"})).unwrap();
        assert_eq!(
            ContextStore::cache_key("weather.get", &a),
            ContextStore::cache_key("weather.get", &b)
        );
        assert!(ContextStore::cache_key("weather.get", &a).starts_with("weather.get:{"));
    }

    #[test]
    fn cache_round_trip_and_ttl() {
        let store = store();
        let sid = store.get_or_create(None, None);
        store.set_cached(&sid, "k", json!({"v": 1}));

        assert_eq!(store.get_cached(&sid, "k", None), Some(json!({"v": 1})));
        assert_eq!(store.get_cached(&sid, "k", Some(3600)), Some(json!({"v": 1})));
        // Zero TTL: anything older than "now" is stale.
        assert_eq!(store.get_cached(&sid, "missing", None), None);
    }

    #[test]
    fn cache_tolerates_absent_session() {
        let store = store();
        assert_eq!(store.get_cached("nope", "k", None), None);
        store.set_cached("nope", "k", json!(1));
        assert_eq!(store.get_cached("nope", "k", None), Some(json!(1)));
    }

    #[test]
    fn reclaim_removes_only_idle_sessions() {
        let store = ContextStore::new(3, 24);
        let stale = store.get_or_create(None, None);
        let fresh = store.get_or_create(None, None);
        store.backdate(&stale, 25);

        assert_eq!(store.reclaim_idle(), 1);
        assert!(store.get(&stale).is_none());
        assert!(store.get(&fresh).is_some());
    }
}
