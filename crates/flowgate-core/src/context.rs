//! Per-request state threaded through unit execution.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Authenticated principal as produced by an authentication callback.
///
/// Permission units read `permissions` / `roles` arrays from it; rate-limit
/// keys use its `sub` claim when present.
pub type Principal = serde_json::Value;

/// Transport-agnostic view of the inbound request.
///
/// Built by the inbound adapter. Header names are matched case-insensitively;
/// query parameters keep their order and the first occurrence wins on lookup.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    query: Vec<(String, String)>,
    cookies: HashMap<String, String>,
    client: Option<String>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Remote peer address (usually the IP).
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }
    pub fn path(&self) -> &str {
        &self.path
    }
    pub fn client(&self) -> Option<&str> {
        self.client.as_deref()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Open-ended key/value store for inter-unit communication.
///
/// Values are type-erased; readers name the type they expect.
#[derive(Default)]
pub struct StateStore {
    map: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.map.insert(key.into(), Box::new(value));
    }

    /// Typed read. Returns `None` when the key is absent or holds another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.map.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.map.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Typed removal. A value of another type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.map.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.map
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("StateStore").field("keys", &keys).finish()
    }
}

/// Per-request context. Created fresh for each execution and owned by it.
///
/// `state` is the application's store, shared by units and handlers.
/// `extensions` holds bookkeeping of hooks and adapters and stays out of it.
#[derive(Debug)]
pub struct RequestContext {
    request: Arc<InboundRequest>,
    principal: Option<Principal>,
    state: StateStore,
    extensions: StateStore,
}

impl RequestContext {
    pub fn new(request: impl Into<Arc<InboundRequest>>) -> Self {
        Self {
            request: request.into(),
            principal: None,
            state: StateStore::new(),
            extensions: StateStore::new(),
        }
    }

    pub fn request(&self) -> &InboundRequest {
        &self.request
    }

    /// Shared handle to the inbound request.
    pub fn request_handle(&self) -> Arc<InboundRequest> {
        Arc::clone(&self.request)
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    pub fn clear_principal(&mut self) -> Option<Principal> {
        self.principal.take()
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateStore {
        &mut self.state
    }

    /// Hook/adapter-private values, never visible through [`Self::get`].
    pub fn extensions(&self) -> &StateStore {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut StateStore {
        &mut self.extensions
    }

    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.state.insert(key, value);
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.state.get(key)
    }
}
