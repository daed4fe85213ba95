use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use bat::WrappingMode;
use cliclack::spinner;
use console::style;
use maestro::conversation::DisplayTurn;
use maestro::models::content::Content;
use maestro::models::role::Role;
use tracing::warn;

use super::{thinking::get_random_thinking_message, Input, InputType, Prompt, Theme};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30m♪ > \x1b[0m";

pub struct RustylinePrompt {
    spinner: cliclack::ProgressBar,
    theme: Theme,
}

impl RustylinePrompt {
    pub fn new() -> Self {
        RustylinePrompt {
            spinner: spinner(),
            theme: Theme::Dark,
        }
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

fn print_markdown(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(e) = printed {
        warn!("could not highlight reply: {}", e);
        println!("{}", content);
    }
}

fn print_auxiliary(content: &Content, theme: &str) {
    if let Some(text) = content.as_text() {
        print_markdown(text, theme);
    } else if let Some((data, mime_type)) = content.as_image() {
        println!(
            "{}",
            style(format!("[{} image, {} bytes]", mime_type, data.len())).dim()
        );
    }
}

/// Interpret one line typed at the prompt
pub fn parse_input(line: &str) -> Input {
    let text = line.trim();
    let (command, argument) = match text.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (text, ""),
    };

    match command.to_lowercase().as_str() {
        "/exit" | "/quit" => Input::command(InputType::Exit),
        "/attach" | "/render" if argument.is_empty() => {
            println!("{} needs a file path", command);
            Input::command(InputType::AskAgain)
        }
        "/attach" => Input::command(InputType::Attach(PathBuf::from(argument))),
        "/render" => Input::command(InputType::Render(PathBuf::from(argument))),
        "" => Input::command(InputType::AskAgain),
        _ => Input {
            input_type: InputType::Message,
            content: Some(text.to_string()),
        },
    }
}

fn print_help() {
    println!("Commands:");
    println!("/exit - Exit the session");
    println!("/t - Toggle Light/Dark theme");
    println!("/attach <path> - Attach a file to your next message");
    println!("/render <path> - Write everything the Code Lab has played to a WAV file");
    println!("/? | /help - Display this help message");
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, turn: &DisplayTurn) {
        let theme = self.theme_name();
        match turn.role {
            Role::User => {
                for name in &turn.attachments {
                    println!("{} {}", style("attached").dim(), style(name).green());
                }
            }
            Role::Assistant if turn.error => {
                println!("{}", style(&turn.text).red());
            }
            Role::Assistant => {
                print_markdown(&turn.text, theme);
                for content in &turn.auxiliary {
                    print_auxiliary(content, theme);
                }
            }
        }

        println!();
        let _ = io::stdout().flush();
    }

    fn notify(&mut self, text: &str) {
        println!("{}", style(text).dim());
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner
            .start(format!("{}...", get_random_thinking_message()));
    }

    fn hide_busy(&self) {
        self.spinner.stop("");
    }

    fn get_input(&mut self) -> Result<Input> {
        let mut editor = rustyline::DefaultEditor::new()?;
        let line = match editor.readline(PROMPT) {
            Ok(text) => text,
            Err(e) => {
                match e {
                    rustyline::error::ReadlineError::Interrupted => (),
                    _ => eprintln!("Input error: {}", e),
                }
                return Ok(Input::command(InputType::Exit));
            }
        };

        let text = line.trim();
        if text.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            return Ok(Input::command(InputType::AskAgain));
        }
        if text.eq_ignore_ascii_case("/?") || text.eq_ignore_ascii_case("/help") {
            print_help();
            return Ok(Input::command(InputType::AskAgain));
        }
        Ok(parse_input(text))
    }

    fn close(&self) {
        // No cleanup required
    }
}
