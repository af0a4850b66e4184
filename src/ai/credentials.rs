use dialoguer::Password;
use keyring::Entry;

const SERVICE_NAME: &str = "com.sentinel.rename";

/// Environment variable checked before the keychain
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Provider name used as the keychain account
pub const PROVIDER: &str = "openai";

/// Credential manager using the OS keychain, with an environment override
pub struct CredentialManager;

impl CredentialManager {
    /// Store an API key in the OS keychain
    pub fn store_api_key(provider: &str, api_key: &str) -> Result<(), String> {
        let entry = Entry::new(SERVICE_NAME, provider)
            .map_err(|e| format!("Keychain unavailable: {}", e))?;
        entry
            .set_password(api_key)
            .map_err(|e| format!("Failed to store API key: {}", e))?;

        tracing::debug!("[Credentials] Stored API key in keychain for: {}", provider);
        Ok(())
    }

    /// Get an API key from the environment, then the keychain
    pub fn get_api_key(provider: &str) -> Result<String, String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                tracing::debug!("[Credentials] Using API key from {}", API_KEY_ENV);
                return Ok(key.trim().to_string());
            }
        }

        if let Ok(entry) = Entry::new(SERVICE_NAME, provider) {
            if let Ok(password) = entry.get_password() {
                tracing::debug!("[Credentials] Retrieved API key from keychain for: {}", provider);
                return Ok(password);
            }
        }

        Err(format!(
            "API key not found (set {} or store one in the keychain)",
            API_KEY_ENV
        ))
    }

    /// Delete an API key from the keychain
    pub fn delete_api_key(provider: &str) -> Result<(), String> {
        if let Ok(entry) = Entry::new(SERVICE_NAME, provider) {
            let _ = entry.delete_credential();
            tracing::debug!("[Credentials] Deleted API key from keychain for: {}", provider);
        }
        Ok(())
    }

    /// Check if an API key is configured
    pub fn has_api_key(provider: &str) -> bool {
        Self::get_api_key(provider).is_ok()
    }

    /// Resolve the API key for a run.
    ///
    /// Non-interactive runs fail when no key is configured. Interactive runs
    /// ask without echoing and offer to remember the key in the keychain.
    pub fn resolve_api_key(provider: &str, non_interactive: bool) -> Result<String, String> {
        Self::resolve_api_key_with(
            || Self::get_api_key(provider),
            || {
                let key = prompt_secret("Enter your OpenAI API key")?;
                if let Err(e) = Self::store_api_key(provider, &key) {
                    tracing::warn!("[Credentials] {}; key will only be used for this run", e);
                }
                Ok(key)
            },
            non_interactive,
        )
    }

    /// `lookup` finds a configured key; `ask` is only consulted interactively
    pub fn resolve_api_key_with<L, A>(lookup: L, ask: A, non_interactive: bool) -> Result<String, String>
    where
        L: FnOnce() -> Result<String, String>,
        A: FnOnce() -> Result<String, String>,
    {
        match lookup() {
            Ok(key) => Ok(key),
            Err(e) if non_interactive => Err(e),
            Err(_) => {
                let key = ask()?;
                let key = key.trim();
                if key.is_empty() {
                    return Err("No API key provided".to_string());
                }
                Ok(key.to_string())
            }
        }
    }
}

/// Read a secret from the terminal without echoing it
pub fn prompt_secret(prompt: &str) -> Result<String, String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map(|key| key.trim().to_string())
        .map_err(|e| format!("Failed to read API key: {}", e))
}
