use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use client_logging::{client_info, client_warn};
use kb_core::{AuthState, CredentialStore, Role};

type ExpiryHook = Box<dyn Fn() + Send + Sync>;

/// In-memory credential mirrored to a durable [`CredentialStore`].
pub struct AuthSession {
    state: Mutex<Option<AuthState>>,
    store: Arc<dyn CredentialStore>,
    on_expired: OnceLock<ExpiryHook>,
}

impl AuthSession {
    /// Restores whatever the durable store holds, without contacting the backend.
    pub fn restore(store: Arc<dyn CredentialStore>) -> Self {
        let state = store.load();
        if let Some(state) = &state {
            client_info!("Restored saved login role={}", state.role);
        }
        Self {
            state: Mutex::new(state),
            store,
            on_expired: OnceLock::new(),
        }
    }

    /// Registers what runs after a credential expires. Only the first hook is kept.
    pub fn on_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        if self.on_expired.set(Box::new(hook)).is_err() {
            client_warn!("Expiry hook already registered; ignoring another");
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<AuthState>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                client_warn!("Auth state lock poisoned; continuing with last value");
                poisoned.into_inner()
            }
        }
    }

    pub fn current(&self) -> Option<AuthState> {
        self.slot().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.slot().as_ref().map(|state| state.token.clone())
    }

    pub fn role(&self) -> Option<Role> {
        self.slot().as_ref().map(|state| state.role)
    }

    pub fn is_logged_in(&self) -> bool {
        self.slot().is_some()
    }

    pub fn sign_in(&self, state: AuthState) {
        self.store.save(&state);
        *self.slot() = Some(state);
    }

    /// Returns `true` if a credential was actually cleared.
    pub fn sign_out(&self) -> bool {
        let mut slot = self.slot();
        let had_state = slot.take().is_some();
        self.store.clear();
        had_state
    }

    /// Clears the credential only if `token` is still the current one, so that
    /// several requests failing with the same stale token log out exactly once.
    pub fn expire(&self, token: &str) -> bool {
        let is_current = {
            let mut slot = self.slot();
            let is_current = slot.as_ref().is_some_and(|state| state.token == token);
            if is_current {
                *slot = None;
                self.store.clear();
            }
            is_current
        };
        if is_current {
            client_warn!("Authorization expired; credentials cleared");
            if let Some(hook) = self.on_expired.get() {
                hook();
            }
        }
        is_current
    }
}
