//! Request-scoped values handed from handlers back to the logger.
//!
//! The middleware installs a [`LogContext`] into the request extensions of every request
//! it logs. Handlers extract it and attach values; the logger reads them when the record
//! is flushed.
//!
//! ```rust
//! use httplog::LogContext;
//!
//! async fn create_user(ctx: LogContext) -> &'static str {
//!     ctx.set_operation("users.create");
//!     "created"
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts, http::Extensions};
use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard},
};

/// Key holding the operation name of a request.
pub const OPERATION: &str = "operation";

/// Cloneable per-request string store shared between a handler and the logger.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl LogContext {
    /// Context installed by the logging middleware, if any.
    pub fn from_extensions(extensions: &Extensions) -> Option<Self> {
        extensions.get::<Self>().cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Label the request with an operation name.
    pub fn set_operation(&self, operation: impl Into<String>) {
        self.insert(OPERATION, operation);
    }

    pub fn operation(&self) -> Option<String> {
        self.get(OPERATION)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A handler panicking mid-insert leaves a usable map.
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Extracts the installed context, or a detached one when the request is not logged.
impl<S> FromRequestParts<S> for LogContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_extensions(&parts.extensions).unwrap_or_default())
    }
}
