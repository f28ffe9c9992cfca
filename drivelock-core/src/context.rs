//! Dependency-injection handle for the security store.
//!
//! Pages and components receive a [`SecurityContext`] instead of reaching for a global. The
//! context is constructed once at application start with [`SecurityContext::provided`] and
//! cloned wherever it is needed.
use std::sync::Arc;

use crate::{Error, error::ContextError, services::AccountSecurity};

#[derive(Clone, Default)]
pub struct SecurityContext {
    security: Option<Arc<dyn AccountSecurity>>,
}

impl SecurityContext {
    pub fn provided(security: Arc<dyn AccountSecurity>) -> Self {
        Self {
            security: Some(security),
        }
    }

    /// A context with no store behind it.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_provided(&self) -> bool {
        self.security.is_some()
    }

    /// The security store.
    ///
    /// # Panics
    ///
    /// Panics if no store was provided. That is a wiring bug, not a runtime condition.
    pub fn security(&self) -> Arc<dyn AccountSecurity> {
        match self.try_security() {
            Ok(security) => security,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_security(&self) -> Result<Arc<dyn AccountSecurity>, Error> {
        self.security
            .clone()
            .ok_or(Error::Context(ContextError::MissingProvider))
    }
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("provided", &self.is_provided())
            .finish()
    }
}
