use std::{env, fmt};

use log::{debug, warn};

use crate::error::{GenerationError, Result};

pub const KEY_ID_VAR: &str = "FAL_KEY_ID";
pub const KEY_SECRET_VAR: &str = "FAL_KEY_SECRET";

/// Two-part API credential. The secret never shows up in Debug output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    key_id: String,
    key_secret: String,
}

impl Credential {
    /// Blank parts are rejected, everything else is kept as given.
    pub fn try_new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Result<Self> {
        let key_id = key_id.into();
        let key_secret = key_secret.into();
        match (key_id.trim().is_empty(), key_secret.trim().is_empty()) {
            (false, false) => Ok(Self { key_id, key_secret }),
            (true, true) => Err(GenerationError::Auth(
                "please enter both parts of the API key".into(),
            )),
            (true, false) => Err(GenerationError::Auth("the API key id is missing".into())),
            (false, true) => Err(GenerationError::Auth("the API key secret is missing".into())),
        }
    }

    /// The `keyId:keySecret` value the service authenticates with
    pub fn combined(&self) -> String {
        format!("{}:{}", self.key_id, self.key_secret)
    }

    pub fn authorization_header(&self) -> String {
        format!("Key {}", self.combined())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .finish()
    }
}

/// What the user typed into the masked key fields. Read again on every submission
/// and never persisted.
#[derive(Debug, Clone, Default)]
pub struct ManualEntry {
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Configured,
    Manual,
}

/// Picks the credential for a submission: configured secrets win when both parts
/// are present, otherwise the manual entry is used.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    configured: Option<Credential>,
}

impl CredentialResolver {
    pub fn from_env() -> Self {
        Self::from_parts(env::var(KEY_ID_VAR).ok(), env::var(KEY_SECRET_VAR).ok())
    }

    pub fn from_parts(key_id: Option<String>, key_secret: Option<String>) -> Self {
        let configured = match (key_id, key_secret) {
            (Some(id), Some(secret)) => Credential::try_new(id, secret).ok(),
            _ => None,
        };

        if configured.is_some() {
            debug!("Using configured API credential");
        } else {
            warn!("No configured API credential, falling back to manual entry");
        }

        Self { configured }
    }

    pub fn source(&self) -> CredentialSource {
        if self.configured.is_some() {
            CredentialSource::Configured
        } else {
            CredentialSource::Manual
        }
    }

    /// True when the shell has to show the key fields together with a warning
    pub fn needs_manual_entry(&self) -> bool {
        self.source() == CredentialSource::Manual
    }

    pub fn resolve(&self, manual: &ManualEntry) -> Result<Credential> {
        match &self.configured {
            Some(credential) => Ok(credential.clone()),
            None => Credential::try_new(&*manual.key_id, &*manual.key_secret),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn manual(id: &str, secret: &str) -> ManualEntry {
        ManualEntry {
            key_id: id.into(),
            key_secret: secret.into(),
        }
    }

    #[test]
    fn configured_secrets_win() {
        let resolver = CredentialResolver::from_parts(Some("id".into()), Some("secret".into()));
        assert_eq!(resolver.source(), CredentialSource::Configured);
        assert!(!resolver.needs_manual_entry());

        let credential = resolver.resolve(&manual("other", "other")).unwrap();
        assert_eq!(credential.combined(), "id:secret");
    }

    #[test]
    fn configured_secrets_are_used_verbatim() {
        let resolver = CredentialResolver::from_parts(Some(" id".into()), Some("secret ".into()));
        let credential = resolver.resolve(&ManualEntry::default()).unwrap();
        assert_eq!(credential.combined(), " id:secret ");
        assert_eq!(credential.authorization_header(), "Key  id:secret ");
    }

    #[test]
    fn partial_configuration_falls_back_to_manual() {
        let resolver = CredentialResolver::from_parts(Some("id".into()), None);
        assert!(resolver.needs_manual_entry());

        let resolver = CredentialResolver::from_parts(Some("id".into()), Some("  ".into()));
        assert!(resolver.needs_manual_entry());

        let credential = resolver.resolve(&manual("abc", "def")).unwrap();
        assert_eq!(credential.authorization_header(), "Key abc:def");
    }

    #[test]
    fn missing_parts_fail_closed() {
        let resolver = CredentialResolver::from_parts(None, None);
        for (id, secret) in [("", ""), ("id", ""), ("", "secret"), (" ", "secret")] {
            assert!(matches!(
                resolver.resolve(&manual(id, secret)),
                Err(GenerationError::Auth(_))
            ));
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let credential = Credential::try_new("id", "hunter2").unwrap();
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("id"));
    }
}
