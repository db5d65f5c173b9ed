pub mod context;
pub mod roles;
pub mod timer;

use secrecy::SecretString;

use crate::approvals::ViewMode;

pub use context::{AppContext, InMemoryStore, JsonFileStore, KeyValueStore, StoreError, Theme};
pub use roles::{Capability, CapabilitySet, Role};
pub use timer::{SessionTimer, TimerEvent, TimerState};

/// Signed-in user. The role is resolved once when the session is created.
#[derive(Clone, Debug)]
pub struct Session {
    pub username: String,
    pub role: Role,
    pub capabilities: CapabilitySet,
    pub token: Option<SecretString>,
}

impl Session {
    pub fn new(username: impl Into<String>, raw_role: &str, token: Option<SecretString>) -> Self {
        let role = Role::resolve(raw_role);
        Self { username: username.into(), role, capabilities: role.capabilities(), token }
    }

    pub fn actor(&self) -> Actor {
        Actor { username: self.username.clone(), capabilities: self.capabilities.clone() }
    }

    pub fn default_view_mode(&self) -> ViewMode {
        match self.role {
            Role::Reviewer => ViewMode::Review,
            Role::Admin | Role::User => ViewMode::Editor,
        }
    }
}

/// Identity attached to a workflow action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
    pub capabilities: CapabilitySet,
}

impl Actor {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self { username: username.into(), capabilities: role.capabilities() }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.allows(capability)
    }
}
