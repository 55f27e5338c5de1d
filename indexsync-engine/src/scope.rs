//! Resolution between API keys, scopes and account credentials.

use crate::config::ScopeConfig;
use crate::error::{IndexingError, IndexingResult};
use indexsync_types::{AccountCredentials, Scope};
use std::collections::BTreeMap;

/// A scope with the credentials configured for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeBinding {
    pub scope: Scope,
    pub credentials: AccountCredentials,
}

impl ScopeBinding {
    /// The API key records for this scope are stored under.
    pub fn api_key(&self) -> &str {
        &self.credentials.js_api_key
    }
}

/// Host lookup for scopes and their credentials.
pub trait ScopeProvider: Send + Sync {
    fn scope_for_api_key(&self, api_key: &str) -> Option<Scope>;

    fn credentials_for_scope(&self, scope: &Scope) -> Option<AccountCredentials>;

    /// Every scope with credentials, in scope id order.
    fn bindings(&self) -> Vec<ScopeBinding>;
}

/// Resolves an API key to its scope and credentials, failing with the
/// matching configuration error.
pub fn resolve_binding(provider: &dyn ScopeProvider, api_key: &str) -> IndexingResult<ScopeBinding> {
    let scope = provider
        .scope_for_api_key(api_key)
        .ok_or_else(|| IndexingError::ScopeNotFound {
            api_key: api_key.to_string(),
        })?;
    let credentials =
        provider
            .credentials_for_scope(&scope)
            .ok_or_else(|| IndexingError::CredentialsNotFound {
                scope: scope.code.clone(),
            })?;
    Ok(ScopeBinding { scope, credentials })
}

/// [`ScopeProvider`] over a fixed list of scopes.
#[derive(Debug, Clone, Default)]
pub struct StaticScopeRegistry {
    scopes_by_key: BTreeMap<String, Scope>,
    credentials: BTreeMap<u32, AccountCredentials>,
}

impl StaticScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(scopes: &[ScopeConfig]) -> Self {
        let mut registry = Self::new();
        for cfg in scopes {
            registry.register(
                Scope::new(cfg.id, cfg.code.clone()),
                AccountCredentials::new(cfg.js_api_key.clone(), cfg.rest_auth_key.clone()),
            );
        }
        registry
    }

    /// Binds credentials to a scope, replacing any previous binding.
    pub fn register(&mut self, scope: Scope, credentials: AccountCredentials) -> &mut Self {
        self.scopes_by_key.retain(|_, bound| bound.id != scope.id);
        self.scopes_by_key
            .insert(credentials.js_api_key.clone(), scope.clone());
        self.credentials.insert(scope.id, credentials);
        self
    }

    /// Associates an API key with a scope without storing credentials for it.
    pub fn bind_api_key(&mut self, api_key: impl Into<String>, scope: Scope) -> &mut Self {
        self.scopes_by_key.insert(api_key.into(), scope);
        self
    }
}

impl ScopeProvider for StaticScopeRegistry {
    fn scope_for_api_key(&self, api_key: &str) -> Option<Scope> {
        self.scopes_by_key.get(api_key).cloned()
    }

    fn credentials_for_scope(&self, scope: &Scope) -> Option<AccountCredentials> {
        self.credentials.get(&scope.id).cloned()
    }

    fn bindings(&self) -> Vec<ScopeBinding> {
        let mut bindings: Vec<ScopeBinding> = self
            .scopes_by_key
            .iter()
            .filter_map(|(api_key, scope)| {
                let credentials = self.credentials.get(&scope.id)?;
                (credentials.js_api_key == *api_key).then(|| ScopeBinding {
                    scope: scope.clone(),
                    credentials: credentials.clone(),
                })
            })
            .collect();
        bindings.sort_by_key(|binding| binding.scope.id);
        bindings
    }
}
