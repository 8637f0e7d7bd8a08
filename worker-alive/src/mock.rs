use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::redis::{Client, CustomRedisError, TTL_KEY_MISSING, TTL_NO_EXPIRY};

#[derive(Debug, Clone)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
}

struct Entry {
    value: String,
    /// Fake-clock timestamp past which the entry is gone, `None` = no expiry.
    expires_at: Option<i64>,
}

struct MockState {
    entries: HashMap<String, Entry>,
    now: i64,
    scan_page_size: usize,
    setex_err: Option<CustomRedisError>,
    del_err: Option<CustomRedisError>,
    ttl_err: Option<CustomRedisError>,
    scan_err: Option<CustomRedisError>,
    calls: Vec<MockRedisCall>,
}

/// In-memory store double with real TTL semantics against a fake clock.
///
/// Unlike a canned-response mock, entries written through the `Client` trait
/// are actually stored, and `advance_clock` moves time forward so expiry
/// behavior can be tested without sleeping. Clones share state, so a clone
/// can be handed out as `Arc<dyn Client>` while the test keeps its own copy
/// for assertions.
#[derive(Clone)]
pub struct MockRedisClient {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockRedisClient {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                entries: HashMap::new(),
                now: 1_700_000_000,
                scan_page_size: 1000,
                setex_err: None,
                del_err: None,
                ttl_err: None,
                scan_err: None,
                calls: Vec::new(),
            })),
        }
    }
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Move the fake clock forward, expiring any entries whose TTL elapses.
    pub fn advance_clock(&self, seconds: i64) {
        let mut state = self.lock();
        state.now += seconds;
    }

    /// Limit how many keys a single scan page returns, to force paging.
    pub fn scan_page_size(&self, page_size: usize) -> Self {
        self.lock().scan_page_size = page_size;
        self.clone()
    }

    pub fn setex_err(&self, err: CustomRedisError) -> Self {
        self.lock().setex_err = Some(err);
        self.clone()
    }

    pub fn del_err(&self, err: CustomRedisError) -> Self {
        self.lock().del_err = Some(err);
        self.clone()
    }

    pub fn ttl_err(&self, err: CustomRedisError) -> Self {
        self.lock().ttl_err = Some(err);
        self.clone()
    }

    pub fn scan_err(&self, err: CustomRedisError) -> Self {
        self.lock().scan_err = Some(err);
        self.clone()
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        self.lock().calls.clone()
    }

    /// Seed a key with no expiry, for exercising the "exists, persists"
    /// TTL state that setex can never produce.
    pub fn insert_persistent(&self, key: &str, value: &str) {
        self.lock().entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    /// Expiry-aware existence check for assertions.
    pub fn contains_key(&self, key: &str) -> bool {
        let state = self.lock();
        match state.entries.get(key) {
            Some(entry) => entry.expires_at.map_or(true, |at| at > state.now),
            None => false,
        }
    }

    fn live_entry_ttl(state: &MockState, key: &str) -> i64 {
        match state.entries.get(key) {
            None => TTL_KEY_MISSING,
            Some(entry) => match entry.expires_at {
                None => TTL_NO_EXPIRY,
                Some(at) if at > state.now => at - state.now,
                Some(_) => TTL_KEY_MISSING,
            },
        }
    }

    fn record(state: &mut MockState, op: &str, key: &str) {
        state.calls.push(MockRedisCall {
            op: op.to_string(),
            key: key.to_string(),
        });
    }

    fn matches(pattern: &str, key: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        }
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn setex(&self, k: String, v: String, seconds: u64) -> Result<(), CustomRedisError> {
        let mut state = self.lock();
        Self::record(&mut state, "setex", &k);

        if let Some(err) = &state.setex_err {
            return Err(err.clone());
        }

        let expires_at = Some(state.now + seconds as i64);
        state.entries.insert(
            k,
            Entry {
                value: v,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        let mut state = self.lock();
        Self::record(&mut state, "get", &k);

        if Self::live_entry_ttl(&state, &k) == TTL_KEY_MISSING {
            return Err(CustomRedisError::NotFound);
        }
        Ok(state.entries[&k].value.clone())
    }

    async fn del(&self, k: String) -> Result<(), CustomRedisError> {
        let mut state = self.lock();
        Self::record(&mut state, "del", &k);

        if let Some(err) = &state.del_err {
            return Err(err.clone());
        }

        state.entries.remove(&k);
        Ok(())
    }

    async fn ttl(&self, k: String) -> Result<i64, CustomRedisError> {
        let mut state = self.lock();
        Self::record(&mut state, "ttl", &k);

        if let Some(err) = &state.ttl_err {
            return Err(err.clone());
        }

        Ok(Self::live_entry_ttl(&state, &k))
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: String,
        _count: usize,
    ) -> Result<(u64, Vec<String>), CustomRedisError> {
        let mut state = self.lock();
        Self::record(&mut state, "scan", &pattern);

        if let Some(err) = &state.scan_err {
            return Err(err.clone());
        }

        // Sorted for deterministic paging across calls.
        let mut matched: Vec<String> = state
            .entries
            .keys()
            .filter(|k| {
                Self::matches(&pattern, k) && Self::live_entry_ttl(&state, k) != TTL_KEY_MISSING
            })
            .cloned()
            .collect();
        matched.sort();

        let offset = cursor as usize;
        let end = (offset + state.scan_page_size).min(matched.len());
        let page = matched[offset.min(end)..end].to_vec();
        let next_cursor = if end >= matched.len() { 0 } else { end as u64 };

        Ok((next_cursor, page))
    }
}
