use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use maestro::models::message::Message;

use crate::profile::config_dir;

pub fn ensure_session_dir() -> Result<PathBuf> {
    let session_dir = config_dir()?.join("sessions");
    if !session_dir.exists() {
        fs::create_dir_all(&session_dir)?;
    }
    Ok(session_dir)
}

pub fn session_path(name: &str) -> Result<PathBuf> {
    Ok(ensure_session_dir()?.join(format!("{}.jsonl", name)))
}

/// Backend history recorded in `session_file`, one message per line
pub fn read_messages(session_file: &Path) -> Result<Vec<Message>> {
    let file = File::open(session_file)
        .with_context(|| format!("Failed to open session file {}", session_file.display()))?;
    let mut messages = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message = serde_json::from_str(&line).with_context(|| {
            format!("{} line {} is not a message", session_file.display(), index + 1)
        })?;
        messages.push(message);
    }
    Ok(messages)
}

pub fn persist_messages(session_file: &Path, messages: &[Message]) -> Result<()> {
    let file = File::create(session_file)?; // Create or truncate the file
    let mut writer = std::io::BufWriter::new(file);

    for message in messages {
        serde_json::to_writer(&mut writer, &message)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro::models::tool::ToolCall;
    use serde_json::json;

    #[test]
    fn test_history_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jam.jsonl");
        let messages = vec![
            Message::user().with_text("Set the tempo to 90"),
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("executeScript", json!({"script": "app.setBpm(90)"})))),
            Message::user().with_tool_response("1", "executeScript", Ok(vec![])),
            Message::assistant().with_text("Tempo is 90"),
        ];

        persist_messages(&path, &messages).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert_eq!(read_messages(&path).unwrap(), messages);
    }

    #[test]
    fn test_corrupt_line_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        persist_messages(&path, &[Message::user().with_text("hi")]).unwrap();
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let err = read_messages(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
