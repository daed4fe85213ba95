use std::str::FromStr;

use anyhow::{anyhow, Result};
use cliclack::spinner;
use console::style;
use maestro::models::message::Message;
use maestro::providers::factory::{self, ProviderType};

use crate::inputs::{get_env_value_or_input, get_user_input};
use crate::profile::{
    find_existing_profile, profile_path, provider_config, recommended_model, required_keys,
    save_profile, select_provider_lists, Profile, PROFILE_DEFAULT_NAME,
};

pub async fn handle_configure(
    provided_profile_name: Option<String>,
    provided_provider: Option<String>,
    provided_model: Option<String>,
) -> Result<()> {
    cliclack::intro(style(" configure-maestro ").on_cyan().black())?;

    let profile_name = match provided_profile_name {
        Some(name) => name,
        None => get_user_input("Which profile should we configure?", PROFILE_DEFAULT_NAME)?,
    };

    let existing_profile = find_existing_profile(&profile_name);
    if existing_profile.is_some() {
        let _ = cliclack::log::info(format!(
            "We are updating the existing profile for {}",
            profile_name
        ));
    }

    let provider_name = match provided_provider {
        Some(provider) => provider.to_lowercase(),
        None => {
            let default_provider = existing_profile
                .as_ref()
                .map_or(ProviderType::OpenAi.to_string(), |p| p.provider.clone());
            let items = select_provider_lists();
            let items: Vec<_> = items
                .iter()
                .map(|(value, label, hint)| (value.clone(), label.as_str(), *hint))
                .collect();
            cliclack::select("Which model provider should we use?")
                .initial_value(default_provider)
                .items(&items)
                .interact()?
        }
    };
    let provider = ProviderType::from_str(&provider_name)
        .map_err(|_| anyhow!("Unknown provider '{}'", provider_name))?;

    for key in required_keys(provider) {
        if std::env::var(key).is_ok() {
            let _ = cliclack::log::info(format!(
                "Detected {} in env, it will need to stay set for future maestro sessions.",
                key
            ));
        } else {
            get_env_value_or_input(
                key,
                &format!("Provider {} requires {}, please enter a value.", provider, key),
                true,
            )?;
        }
    }

    let model = match provided_model {
        Some(model) => model,
        None => {
            let default_model = existing_profile
                .as_ref()
                .map_or(recommended_model(provider), |p| p.model.as_str());
            get_user_input("Enter a model from that provider:", default_model)?
        }
    };

    let voice_output = cliclack::confirm("Should replies be spoken aloud?")
        .initial_value(existing_profile.as_ref().is_some_and(|p| p.voice_output))
        .interact()?;

    let profile = Profile {
        provider: provider.to_string(),
        model,
        voice_output,
    };

    // Confirm everything is configured correctly by calling the model
    let spin = spinner();
    spin.start("Checking your configuration...");
    let provider = factory::get_provider(provider_config(&profile)?)?;
    let message = Message::user().with_text(
        "Please give a nice welcome message (one sentence) and let them know they are all set to make music",
    );
    let result = provider
        .complete(
            &profile.model,
            "You are Maestro, a creative studio assistant.",
            &[message],
            &[],
        )
        .await;

    match result {
        Ok((message, _usage)) => {
            let text = message.text();
            if text.is_empty() {
                spin.stop("No response text available");
            } else {
                spin.stop(text);
            }

            let _ = match save_profile(&profile_name, profile) {
                Ok(()) => cliclack::outro(format!("Profile saved to: {:?}", profile_path()?)),
                Err(e) => cliclack::outro(format!("Failed to save profile: {}", e)),
            };
        }
        Err(_) => {
            spin.stop("We could not connect!");
            let _ = cliclack::outro("Try rerunning configure and check your credentials.");
        }
    }

    Ok(())
}
