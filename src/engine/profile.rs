//! Client profiles.
//!
//! An `initialize` request may carry a client name. The engine matches it
//! against a registry of profiles and applies the winning profile for the
//! rest of the session: extra default tools appended to `tools/list`,
//! additional capability bits, and an optional server-info override.
//!
//! Profiles are pure data — no I/O, selected once at `initialize`, and
//! immutable for the session.

use std::sync::Arc;

use crate::protocol::{Capabilities, ServerInfo, Tool};

/// Default tag applied when no registered prefix matches.
pub const GENERIC_PROFILE: &str = "generic";

/// A per-client-type augmentation of the server surface.
#[derive(Debug, Clone, Default)]
pub struct ClientProfile {
    /// The profile tag, used for logging.
    pub tag: String,

    /// Tools appended to every `tools/list` result for this client.
    pub default_tools: Vec<Tool>,

    /// Capability bits added on top of the handler-derived capabilities.
    pub extra_capabilities: Capabilities,

    /// Replacement server info, if the profile customises identity.
    pub server_info: Option<ServerInfo>,
}

impl ClientProfile {
    /// Creates an empty profile with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Merges this profile's capability bits into `base`.
    #[must_use]
    pub fn apply_capabilities(&self, base: Capabilities) -> Capabilities {
        Capabilities {
            tools: base.tools.or(self.extra_capabilities.tools),
            resources: base.resources.or(self.extra_capabilities.resources),
            prompts: base.prompts.or(self.extra_capabilities.prompts),
        }
    }
}

/// An ordered prefix-match registry of client profiles.
///
/// Matching lowercases the client name and tests each registered prefix
/// for containment, in registration order; the first match wins and
/// everything else falls through to the generic profile.
pub struct ProfileRegistry {
    profiles: Vec<(String, Arc<ClientProfile>)>,
    generic: Arc<ClientProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            generic: Arc::new(ClientProfile::new(GENERIC_PROFILE)),
        }
    }
}

impl ProfileRegistry {
    /// Creates a registry holding only the generic profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile for client names containing `prefix`.
    pub fn register(&mut self, prefix: impl Into<String>, profile: ClientProfile) {
        self.profiles
            .push((prefix.into().to_lowercase(), Arc::new(profile)));
    }

    /// Resolves the profile for a client name.
    ///
    /// `None` (no client info supplied) resolves to the generic profile.
    #[must_use]
    pub fn resolve(&self, client_name: Option<&str>) -> Arc<ClientProfile> {
        let Some(name) = client_name else {
            return Arc::clone(&self.generic);
        };

        let name = name.to_lowercase();
        self.profiles
            .iter()
            .find(|(prefix, _)| name.contains(prefix.as_str()))
            .map_or_else(|| Arc::clone(&self.generic), |(_, p)| Arc::clone(p))
    }
}
