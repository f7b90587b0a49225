use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    storyhub::logging::init().context("init logging")?;

    let cli = storyhub::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        storyhub::cli::Command::Story(args) => {
            storyhub::commands::story(args).await.context("story")?;
        }
        storyhub::cli::Command::Translate(args) => {
            storyhub::commands::translate(args)
                .await
                .context("translate")?;
        }
        storyhub::cli::Command::Quiz(args) => {
            storyhub::commands::quiz(args).await.context("quiz")?;
        }
        storyhub::cli::Command::Ask(args) => {
            storyhub::commands::ask(args).await.context("ask")?;
        }
        storyhub::cli::Command::Mindmap(args) => {
            storyhub::commands::mindmap(args).context("mindmap")?;
        }
        storyhub::cli::Command::Hub(args) => {
            storyhub::hub::run(args).await.context("hub")?;
        }
    }

    Ok(())
}
