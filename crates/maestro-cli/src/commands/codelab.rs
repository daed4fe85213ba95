use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use console::style;
use maestro::audio::PolyglotRunner;
use maestro::services::Services;
use maestro::state::SCRIPT_LANGUAGE;
use maestro::tools::ToolContext;

pub enum CodeSource {
    File(PathBuf),
    Inline(String),
}

impl CodeSource {
    fn read(self) -> Result<String> {
        match self {
            CodeSource::File(path) => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display())),
            CodeSource::Inline(code) => Ok(code),
        }
    }
}

/// Run Code Lab source once, without a model, and write what it played to `out`
pub fn execute(language: &str, source: CodeSource, out: &Path) -> Result<()> {
    let code = source.read()?;
    let mut ctx = ToolContext::new(PolyglotRunner::in_memory(), Services::default());

    if language.eq_ignore_ascii_case(SCRIPT_LANGUAGE) {
        let outcome = ctx.execute_script(&code)?;
        for line in &outcome.logs {
            println!("{}", line);
        }
        println!(
            "{}",
            style(format!("{} capability calls", outcome.calls)).dim()
        );
    } else {
        let report = ctx.runner.run(language, &code)?;
        if let Some(warning) = &report.warning {
            return Err(anyhow!("{}", warning));
        }
        println!(
            "{}",
            style(format!(
                "Scheduled {} sounds over {:.2}s",
                report.scheduled(),
                report.end - report.epoch
            ))
            .dim()
        );
    }

    let Some(bus) = ctx.runner.bus() else {
        println!("Nothing was played, no file written.");
        return Ok(());
    };
    bus.write_wav(out)?;
    println!(
        "{} {:.2}s to {}",
        style("Rendered").bold().green(),
        bus.duration(),
        out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_dsl_source_to_wav() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("take.wav");
        let source = CodeSource::Inline("play 60\nsleep 0.25\nplay 64".into());
        execute("sonic-pi", source, &out).unwrap();

        let reader = hound::WavReader::open(&out).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert!(reader.len() > 0);
    }

    #[test]
    fn test_unknown_language_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("none.wav");
        let err = execute("basic", CodeSource::Inline("10 PRINT".into()), &out).unwrap_err();
        assert!(err.to_string().contains("Unsupported language"));
        assert!(!out.exists());
    }

    #[test]
    fn test_script_drives_the_runner() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("riff.script");
        std::fs::write(&script, "repeat 2 { runner.run(\"alda\", \"piano: c e g\") }").unwrap();
        let out = dir.path().join("riff.wav");

        execute("script", CodeSource::File(script), &out).unwrap();
        assert!(out.exists());
    }
}
