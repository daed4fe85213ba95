use cliclack::{input, password};

/// Value of `env_name`, or ask for it and keep it for the rest of the process
pub fn get_env_value_or_input(
    env_name: &str,
    input_prompt: &str,
    mask: bool,
) -> std::io::Result<String> {
    if let Ok(value) = std::env::var(env_name) {
        return Ok(value);
    }

    let input_value = get_user_input_with_mask(input_prompt, mask)?;
    std::env::set_var(env_name, &input_value);
    Ok(input_value)
}

pub fn get_user_input_with_mask(input_prompt: &str, mask: bool) -> std::io::Result<String> {
    if mask {
        password(input_prompt).mask('▪').interact()
    } else {
        input(input_prompt).interact()
    }
}

pub fn get_user_input(message: &str, default_value: &str) -> std::io::Result<String> {
    input(message).default_input(default_value).interact()
}
