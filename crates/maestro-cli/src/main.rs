use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod inputs;
mod profile;
mod prompt;
mod session;

use commands::codelab::{execute as codelab, CodeSource};
use commands::configure::handle_configure;
use commands::run::execute as run;
use commands::session::build_session;
use commands::version::execute as version;

#[derive(Parser)]
#[command(author, about, long_about = None)]
struct Cli {
    #[arg(short = 'v', long = "version")]
    version: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Configure a provider profile
    Configure {
        /// Name of the profile to create or update
        profile_name: Option<String>,

        /// Provider to use (openai or ollama)
        #[arg(long)]
        provider: Option<String>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,
    },

    /// Start or resume an interactive studio session
    Session {
        /// Name of the session, recorded under ~/.config/maestro/sessions
        #[arg(short, long)]
        name: Option<String>,

        /// Profile to use
        #[arg(short, long)]
        profile: Option<String>,

        /// Continue the named session instead of starting over
        #[arg(short, long, requires = "name")]
        resume: bool,
    },

    /// Send a single message without a prompt
    Run {
        /// The message to send
        #[arg(short, long)]
        text: String,

        /// Files to attach to the message
        #[arg(short, long, num_args = 1..)]
        attach: Vec<PathBuf>,

        /// Profile to use
        #[arg(short, long)]
        profile: Option<String>,

        /// Name of the session to record into
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Run Code Lab source directly and render the result
    Codelab {
        /// alda, sonic-pi, strudel, tidal or script
        #[arg(short, long)]
        language: String,

        /// Read the source from a file
        #[arg(short, long, conflicts_with = "code", required_unless_present = "code")]
        file: Option<PathBuf>,

        /// Source given inline
        #[arg(short, long)]
        code: Option<String>,

        /// Where to write the rendered mix
        #[arg(short, long, default_value = "codelab.wav")]
        out: PathBuf,
    },
}

fn init_logging() {
    // Logs go to stderr so they never mix with rendered replies
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("MAESTRO_LOG").unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    if cli.version {
        version().await?;
        return Ok(());
    }

    match cli.command {
        Some(Command::Configure {
            profile_name,
            provider,
            model,
        }) => {
            handle_configure(profile_name, provider, model).await?;
        }
        Some(Command::Session {
            name,
            profile,
            resume,
        }) => {
            let mut session = build_session(name, profile, resume)?;
            session.start().await?;
        }
        Some(Command::Run {
            text,
            attach,
            profile,
            name,
        }) => {
            run(text, attach, profile, name).await?;
        }
        Some(Command::Codelab {
            language,
            file,
            code,
            out,
        }) => {
            let source = match (file, code) {
                (Some(path), _) => CodeSource::File(path),
                (None, Some(code)) => CodeSource::Inline(code),
                (None, None) => anyhow::bail!("Pass --file or --code"),
            };
            codelab(&language, source, &out)?;
        }
        None => {
            println!("No command provided - Run 'maestro help' to see available commands.");
        }
    }
    Ok(())
}
