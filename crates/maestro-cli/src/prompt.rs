use std::path::PathBuf;

use anyhow::Result;
use maestro::conversation::DisplayTurn;

pub mod rustyline;
pub mod thinking;

pub trait Prompt {
    fn render(&mut self, turn: &DisplayTurn);
    /// Plain status text from the session itself
    fn notify(&mut self, text: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&self);
    fn close(&self);
    fn maestro_ready(&self) {
        println!("\n");
        println!("Maestro is ready! Ask for a beat, a score or a voice, or type /help.");
        println!("\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

impl Input {
    pub fn command(input_type: InputType) -> Self {
        Self {
            input_type,
            content: None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum InputType {
    AskAgain,        // Ask the user for input again. Control flow command.
    Message,         // User sent a message
    Attach(PathBuf), // Attach a file to the next message
    Render(PathBuf), // Write the mix bus to a WAV file
    Exit,            // User wants to exit the session
}

pub enum Theme {
    Light,
    Dark,
}
