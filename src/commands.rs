//! One-shot subcommands. Each drives the same session transitions as the hub
//! for a single request and reports failures as errors.

use std::path::Path;

use anyhow::Context as _;

use crate::cli::{AskArgs, MindmapArgs, QuizArgs, StoryArgs, TranslateArgs};
use crate::config;
use crate::diagram;
use crate::export;
use crate::model::{Language, MindMapGraph, StoryResult};
use crate::runner::{self, Services};
use crate::session::{DocumentState, Job, Mode, Operation, Primary, Session};

pub async fn story(args: StoryArgs) -> anyhow::Result<()> {
    let topic = match (&args.text, &args.input) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read input: {path}"))?,
        (None, None) => anyhow::bail!("either --text or --input is required"),
    };
    let out = Path::new(&args.out);
    let existing = out.join(export::STORY_JSON);
    if existing.exists() && !args.force {
        anyhow::bail!("output already exists: {}", existing.display());
    }

    let services = config::services(&args.service)?;
    let mut session = Session::new();
    let job = session
        .begin_story(&topic)
        .ok_or_else(|| anyhow::anyhow!("topic is empty"))?;
    settle(&mut session, job, &services).await;

    match session.primary() {
        Primary::Story { result } => {
            for path in export::export_story(out, result, args.force)? {
                println!("{}", path.display());
            }
            Ok(())
        }
        Primary::Failed { message, .. } => anyhow::bail!("{message}"),
        other => anyhow::bail!("story generation did not finish: {other:?}"),
    }
}

pub async fn translate(args: TranslateArgs) -> anyhow::Result<()> {
    let language = Language::parse(&args.to)?;
    let out = Path::new(&args.out);
    if out.exists() && !args.force {
        anyhow::bail!("output already exists: {}", out.display());
    }
    let source = export::read_story(Path::new(&args.story))?;

    let services = config::services(&args.service)?;
    let mut session = Session::with_story(source);
    let job = session
        .begin_translation(language)
        .ok_or_else(|| anyhow::anyhow!("nothing to translate"))?;
    settle(&mut session, job, &services).await;

    if let Some(message) = session.translation().error() {
        anyhow::bail!("{message}");
    }
    let translated = session
        .translated()
        .ok_or_else(|| anyhow::anyhow!("translation did not finish"))?;
    export::write_json(out, &translated.result, args.force)?;
    tracing::info!(language = %translated.language, out = %out.display(), "wrote translation");
    Ok(())
}

pub async fn quiz(args: QuizArgs) -> anyhow::Result<()> {
    if let Some(out) = &args.out
        && Path::new(out).exists()
        && !args.force
    {
        anyhow::bail!("output already exists: {out}");
    }
    let source = export::read_story(Path::new(&args.story))?;

    let services = config::services(&args.service)?;
    let mut session = Session::with_story(source);
    let job = session
        .begin_quiz()
        .ok_or_else(|| anyhow::anyhow!("nothing to quiz on"))?;
    settle(&mut session, job, &services).await;

    let items = match session.quiz() {
        Operation::Succeeded(attempt) => attempt.items(),
        Operation::Failed(message) => anyhow::bail!("{message}"),
        _ => anyhow::bail!("quiz generation did not finish"),
    };
    match &args.out {
        Some(out) => export::write_json(Path::new(out), &items, args.force),
        None => {
            let json = serde_json::to_string_pretty(items).context("serialize quiz")?;
            println!("{json}");
            Ok(())
        }
    }
}

pub async fn ask(args: AskArgs) -> anyhow::Result<()> {
    let services = config::services(&args.service)?;
    let mut session = Session::new();
    session.select_mode(Mode::Document);

    let job = session
        .begin_document_load(&args.pdf)
        .ok_or_else(|| anyhow::anyhow!("cannot load document"))?;
    settle(&mut session, job, &services).await;
    if let DocumentState::Failed { message } = session.document() {
        anyhow::bail!("{message}");
    }

    let job = session
        .begin_answer(&args.question)
        .ok_or_else(|| anyhow::anyhow!("question is empty"))?;
    settle(&mut session, job, &services).await;

    match session.primary() {
        Primary::Answer { answer } => {
            println!("{}", answer.answer);
            Ok(())
        }
        Primary::Failed { message, .. } => anyhow::bail!("{message}"),
        other => anyhow::bail!("answer did not finish: {other:?}"),
    }
}

/// Accepts a bare `{nodes, connections}` graph or a saved `story.json`.
pub fn mindmap(args: MindmapArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.graph)
        .with_context(|| format!("read graph: {}", args.graph))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parse graph: {}", args.graph))?;

    let graph: MindMapGraph = if value.get("mindMapData").is_some() {
        let story: StoryResult = serde_json::from_value(value).context("parse story")?;
        story.mind_map_data
    } else {
        serde_json::from_value(value).context("parse mind map graph")?
    };
    tracing::debug!(
        nodes = graph.nodes.len(),
        connections = graph.connections.len(),
        "compile mind map"
    );
    println!("{}", diagram::compile(&graph));
    Ok(())
}

async fn settle(session: &mut Session, job: Job, services: &Services) {
    let completion = runner::run(job, services).await;
    session.apply(completion);
}
