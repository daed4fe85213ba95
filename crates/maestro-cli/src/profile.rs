use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use maestro::providers::configs::{
    OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig, OPENAI_HOST, OPENAI_MODEL,
};
use maestro::providers::factory::ProviderType;
use maestro::providers::ollama::OLLAMA_MODEL;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::inputs::get_env_value_or_input;

pub const PROFILE_DEFAULT_NAME: &str = "default";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Profile {
    pub provider: String,
    pub model: String,
    /// Speak final replies aloud
    #[serde(default)]
    pub voice_output: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            provider: ProviderType::OpenAi.to_string(),
            model: OPENAI_MODEL.to_string(),
            voice_output: false,
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
pub struct Profiles {
    pub profile_items: HashMap<String, Profile>,
}

pub fn select_provider_lists() -> Vec<(String, String, &'static str)> {
    ProviderType::iter()
        .map(|provider| match provider {
            ProviderType::OpenAi => (provider.to_string(), "OpenAI".to_string(), "GPT-4o etc"),
            ProviderType::Ollama => (
                provider.to_string(),
                "Ollama".to_string(),
                "Local open source models",
            ),
        })
        .collect()
}

pub fn recommended_model(provider: ProviderType) -> &'static str {
    match provider {
        ProviderType::OpenAi => OPENAI_MODEL,
        ProviderType::Ollama => OLLAMA_MODEL,
    }
}

pub fn required_keys(provider: ProviderType) -> Vec<&'static str> {
    match provider {
        ProviderType::OpenAi => vec!["OPENAI_API_KEY"],
        ProviderType::Ollama => Vec::new(),
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or(anyhow!("Could not determine home directory"))?;
    Ok(home_dir.join(".config").join("maestro"))
}

pub fn profile_path() -> Result<PathBuf> {
    let config_dir = config_dir()?;
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }
    Ok(config_dir.join("profiles.json"))
}

pub fn load_profiles() -> Result<HashMap<String, Profile>> {
    load_profiles_from(&profile_path()?)
}

fn load_profiles_from(path: &Path) -> Result<HashMap<String, Profile>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)?;
    let profiles: Profiles = serde_json::from_str(&content)?;
    Ok(profiles.profile_items)
}

pub fn save_profile(name: &str, profile: Profile) -> Result<()> {
    save_profile_to(&profile_path()?, name, profile)
}

fn save_profile_to(path: &Path, name: &str, profile: Profile) -> Result<()> {
    let mut profile_items = load_profiles_from(path)?;
    profile_items.insert(name.to_string(), profile);
    let content = serde_json::to_string_pretty(&Profiles { profile_items })?;
    fs::write(path, content)?;
    Ok(())
}

pub fn find_existing_profile(name: &str) -> Option<Profile> {
    match load_profiles() {
        Ok(profiles) => profiles.get(name).cloned(),
        Err(_) => None,
    }
}

/// The named profile, or the default one when no name is given. A missing
/// default falls back to OpenAI so a fresh install works from the environment.
pub fn resolve_profile(name: Option<&str>) -> Result<Profile> {
    let profile_name = name.unwrap_or(PROFILE_DEFAULT_NAME);
    match find_existing_profile(profile_name) {
        Some(profile) => Ok(profile),
        None if name.is_none() => Ok(Profile::default()),
        None => Err(anyhow!(
            "No profile named '{}', create it with `maestro configure {}`",
            profile_name,
            profile_name
        )),
    }
}

pub fn provider_config(profile: &Profile) -> Result<ProviderConfig> {
    let provider = ProviderType::from_str(&profile.provider.to_lowercase())
        .map_err(|_| anyhow!("Unknown provider '{}'", profile.provider))?;
    Ok(match provider {
        ProviderType::OpenAi => {
            let api_key = get_env_value_or_input(
                "OPENAI_API_KEY",
                "Please enter your OpenAI API key:",
                true,
            )?;
            ProviderConfig::OpenAi(OpenAiProviderConfig {
                host: std::env::var("OPENAI_HOST").unwrap_or_else(|_| OPENAI_HOST.to_string()),
                api_key,
                model: profile.model.clone(),
                temperature: None,
                max_tokens: None,
            })
        }
        ProviderType::Ollama => ProviderConfig::Ollama(OllamaProviderConfig {
            model: profile.model.clone(),
            ..Default::default()
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        assert!(load_profiles_from(&path).unwrap().is_empty());

        let studio = Profile {
            provider: "ollama".to_string(),
            model: "qwen2.5".to_string(),
            voice_output: true,
        };
        save_profile_to(&path, "studio", studio.clone()).unwrap();
        save_profile_to(&path, "default", Profile::default()).unwrap();

        let profiles = load_profiles_from(&path).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["studio"], studio);
    }

    #[test]
    fn test_old_profiles_default_voice_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(
            &path,
            r#"{"profile_items": {"default": {"provider": "openai", "model": "gpt-4o"}}}"#,
        )
        .unwrap();
        let profiles = load_profiles_from(&path).unwrap();
        assert!(!profiles["default"].voice_output);
    }

    #[test]
    fn test_ollama_profile_needs_no_keys() {
        let profile = Profile {
            provider: "Ollama".to_string(),
            model: "llama3".to_string(),
            voice_output: false,
        };
        match provider_config(&profile).unwrap() {
            ProviderConfig::Ollama(config) => assert_eq!(config.model, "llama3"),
            other => panic!("unexpected config {:?}", other),
        }
        assert!(required_keys(ProviderType::Ollama).is_empty());
        assert_eq!(recommended_model(ProviderType::Ollama), OLLAMA_MODEL);
    }
}
