//! `key set|clear|status`

use crate::ai::credentials::{prompt_secret, CredentialManager, API_KEY_ENV, PROVIDER};
use crate::error::RenameError;

use super::KeyAction;

pub fn run_key(action: KeyAction) -> Result<u8, RenameError> {
    match action {
        KeyAction::Set => {
            let key = prompt_secret("OpenAI API key").map_err(RenameError::Fatal)?;
            if key.is_empty() {
                return Err(RenameError::fatal("No API key provided"));
            }
            CredentialManager::store_api_key(PROVIDER, &key).map_err(RenameError::Fatal)?;
            println!("API key stored in the OS keychain");
        }
        KeyAction::Clear => {
            CredentialManager::delete_api_key(PROVIDER).map_err(RenameError::Fatal)?;
            println!("Stored API key removed");
        }
        KeyAction::Status => {
            if std::env::var(API_KEY_ENV).is_ok() {
                println!("API key set through {}", API_KEY_ENV);
            } else if CredentialManager::has_api_key(PROVIDER) {
                println!("API key stored in the OS keychain");
            } else {
                println!("No API key configured");
                return Ok(1);
            }
        }
    }
    Ok(0)
}
