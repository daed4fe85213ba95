pub mod agent;
pub mod attachments;
pub mod audio;
pub mod conversation;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod script;
pub mod services;
pub mod state;
pub mod tools;
