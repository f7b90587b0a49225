//! Interactive front end: reads commands from stdin, runs requests in the
//! background and prints the panels affected by each state change.

use std::path::PathBuf;

use anyhow::Context as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _, BufReader};
use tokio::sync::mpsc;

use crate::cli::HubArgs;
use crate::config;
use crate::diagram::{self, DiagramRenderer, DiagramView, MermaidCommandRenderer};
use crate::export;
use crate::model::Language;
use crate::prompt;
use crate::render;
use crate::runner::{self, Services};
use crate::session::{Completion, Job, Mode, Primary, Session};
use crate::speech::{self, SpeechPlayer, SpeechSection};

const HELP: &str = "\
Commands:
  mode topic|pdf              switch between studying a topic and asking a PDF
  story <text>                turn text into a visual story (topic mode)
  example                     generate a story for a sample topic
  open <path>                 load a PDF (pdf mode)
  ask <question>              answer a question from the loaded PDF (pdf mode)
  translate <code>            translate the story (es fr de ja zh hi ta te ml kn bn mr gu pa)
  revert                      show the original story again
  quiz                        generate a quiz from the story
  pick <question> <option>    choose an answer (both start at 1)
  submit                      score the quiz
  retake                      clear answers and try again
  speak story|takeaways|answer
                              read a section aloud (again to stop)
  show                        print the current panels
  state                       print the session as JSON
  save [dir] [--force]        write story.json, story.md, mindmap.mmd and the image
  wait                        block until running requests finish
  quit                        exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubCommand {
    Help,
    Mode(Mode),
    Story(String),
    Example,
    Open(PathBuf),
    Ask(String),
    Translate(Language),
    Revert,
    Quiz,
    /// 0-based indices.
    Pick { question: usize, option: usize },
    Submit,
    Retake,
    Speak(SpeechSection),
    Show,
    State,
    Save { dir: Option<PathBuf>, force: bool },
    Wait,
    Quit,
}

impl HubCommand {
    /// `Ok(None)` for blank lines and `#` comments.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "mode" => Self::Mode(parse_mode(rest)?),
            "story" => Self::Story(rest.to_owned()),
            "example" => Self::Example,
            "open" => {
                if rest.is_empty() {
                    anyhow::bail!("usage: open <path>");
                }
                Self::Open(PathBuf::from(rest))
            }
            "ask" => Self::Ask(rest.to_owned()),
            "translate" if rest.is_empty() => Self::Translate(Language::default()),
            "translate" => Self::Translate(Language::parse(rest)?),
            "revert" => Self::Revert,
            "quiz" => Self::Quiz,
            "pick" => parse_pick(rest)?,
            "submit" => Self::Submit,
            "retake" => Self::Retake,
            "speak" => Self::Speak(SpeechSection::parse(rest)?),
            "show" => Self::Show,
            "state" => Self::State,
            "save" => parse_save(rest),
            "wait" => Self::Wait,
            "quit" | "exit" => Self::Quit,
            other => anyhow::bail!("unknown command: {other} (try `help`)"),
        };
        Ok(Some(command))
    }
}

fn parse_mode(raw: &str) -> anyhow::Result<Mode> {
    match raw.to_ascii_lowercase().as_str() {
        "topic" => Ok(Mode::Topic),
        "pdf" | "document" => Ok(Mode::Document),
        other => anyhow::bail!("unknown mode: {other:?} (expected topic or pdf)"),
    }
}

fn parse_pick(rest: &str) -> anyhow::Result<HubCommand> {
    let mut parts = rest.split_whitespace();
    let (Some(question), Some(option), None) = (parts.next(), parts.next(), parts.next()) else {
        anyhow::bail!("usage: pick <question> <option>");
    };
    Ok(HubCommand::Pick {
        question: parse_ordinal(question).context("question")?,
        option: parse_ordinal(option).context("option")?,
    })
}

fn parse_ordinal(raw: &str) -> anyhow::Result<usize> {
    let n: usize = raw
        .parse()
        .with_context(|| format!("not a number: {raw}"))?;
    n.checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("numbering starts at 1"))
}

fn parse_save(rest: &str) -> HubCommand {
    let (dir, force) = match rest.strip_suffix("--force") {
        Some(head) if head.is_empty() || head.ends_with(char::is_whitespace) => (head.trim(), true),
        _ => (rest, false),
    };
    HubCommand::Save {
        dir: (!dir.is_empty()).then(|| PathBuf::from(dir)),
        force,
    }
}

fn default_save_dir() -> PathBuf {
    PathBuf::from(
        chrono::Local::now()
            .format("story-%Y%m%d-%H%M%S")
            .to_string(),
    )
}

enum Panel {
    Input,
    Output,
}

pub struct Hub<W> {
    session: Session,
    services: Services,
    speech: SpeechPlayer,
    renderer: Option<Box<dyn DiagramRenderer>>,
    /// Last rendered concept map, keyed by its source.
    diagram: Option<(String, DiagramView)>,
    out: W,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    outstanding: usize,
}

impl<W> Hub<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        services: Services,
        speech: SpeechPlayer,
        renderer: Option<Box<dyn DiagramRenderer>>,
        out: W,
    ) -> Self {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        Self {
            session: Session::new(),
            services,
            speech,
            renderer,
            diagram: None,
            out,
            completions_tx,
            completions,
            outstanding: 0,
        }
    }

    /// Runs until `quit`, Ctrl-C, or end of input once running requests have
    /// finished. Returns the output sink.
    pub async fn serve<R>(mut self, input: R) -> anyhow::Result<W>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;
        let mut waiting = false;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let banner = format!(
            "storyhub: type `help` for commands.\n{}",
            render::input_panel(&self.session)
        );
        self.emit(banner).await?;

        loop {
            if self.outstanding == 0 {
                waiting = false;
                if !input_open {
                    break;
                }
            }

            tokio::select! {
                line = lines.next_line(), if input_open && !waiting => {
                    let Some(line) = line.context("read hub input")? else {
                        tracing::debug!(outstanding = self.outstanding, "input closed");
                        input_open = false;
                        continue;
                    };
                    match HubCommand::parse(&line) {
                        Ok(Some(HubCommand::Quit)) => break,
                        Ok(Some(HubCommand::Wait)) => waiting = true,
                        Ok(Some(command)) => self.handle(command).await?,
                        Ok(None) => {}
                        Err(err) => self.emit(format!("{err:#}\n")).await?,
                    }
                }
                Some(completion) = self.completions.recv() => {
                    self.outstanding = self.outstanding.saturating_sub(1);
                    self.complete(completion).await?;
                }
                signal = &mut ctrl_c => {
                    signal.context("listen for ctrl-c")?;
                    tracing::info!(outstanding = self.outstanding, "interrupted");
                    break;
                }
            }
        }

        self.speech.cancel().await;
        Ok(self.out)
    }

    async fn handle(&mut self, command: HubCommand) -> anyhow::Result<()> {
        match command {
            HubCommand::Help => self.emit(HELP).await,
            HubCommand::Mode(mode) => {
                self.session.select_mode(mode);
                self.show(Panel::Input).await
            }
            HubCommand::Story(topic) => self.start_story(&topic).await,
            HubCommand::Example => self.start_story(prompt::EXAMPLE_TOPIC).await,
            HubCommand::Open(path) => {
                if !self.require_mode(Mode::Document, "open").await? {
                    return Ok(());
                }
                let job = self.session.begin_document_load(path);
                self.start(job, Panel::Input).await
            }
            HubCommand::Ask(question) => {
                if !self.require_mode(Mode::Document, "ask").await? {
                    return Ok(());
                }
                let job = self.session.begin_answer(&question);
                self.start(job, Panel::Output).await
            }
            HubCommand::Translate(language) => {
                let job = self.session.begin_translation(language);
                self.start(job, Panel::Output).await
            }
            HubCommand::Revert => {
                if self.session.translated().is_none() {
                    return Ok(());
                }
                self.session.clear_translation();
                self.show(Panel::Output).await
            }
            HubCommand::Quiz => {
                let job = self.session.begin_quiz();
                self.start(job, Panel::Output).await
            }
            HubCommand::Pick { question, option } => {
                let Some(attempt) = self.session.quiz_attempt_mut() else {
                    return Ok(());
                };
                if !attempt.select(question, option) {
                    return Ok(());
                }
                let text = render::attempt_text(attempt);
                self.emit(text).await
            }
            HubCommand::Submit => {
                let Some(attempt) = self.session.quiz_attempt_mut() else {
                    return Ok(());
                };
                if attempt.submit().is_none() {
                    return Ok(());
                }
                let text = render::attempt_text(attempt);
                self.emit(text).await
            }
            HubCommand::Retake => {
                let Some(attempt) = self.session.quiz_attempt_mut() else {
                    return Ok(());
                };
                attempt.reset();
                let text = render::attempt_text(attempt);
                self.emit(text).await
            }
            HubCommand::Speak(section) => self.speak(section).await,
            HubCommand::Show => {
                let mut text = render::input_panel(&self.session);
                text.push('\n');
                let view = self.diagram_view().await;
                text.push_str(&render::output_panel(&self.session, &view));
                if let Some(section) = self.speech.speaking() {
                    text.push_str(&format!("Speaking: {}\n", section.as_str()));
                }
                self.emit(text).await
            }
            HubCommand::State => {
                let mut json =
                    serde_json::to_string_pretty(&self.session).context("serialize session")?;
                json.push('\n');
                self.emit(json).await
            }
            HubCommand::Save { dir, force } => self.save(dir, force).await,
            // Handled by the input loop.
            HubCommand::Wait | HubCommand::Quit => Ok(()),
        }
    }

    async fn start_story(&mut self, topic: &str) -> anyhow::Result<()> {
        if !self.require_mode(Mode::Topic, "story").await? {
            return Ok(());
        }
        let job = self.session.begin_story(topic);
        self.start(job, Panel::Output).await
    }

    async fn require_mode(&mut self, mode: Mode, command: &str) -> anyhow::Result<bool> {
        if self.session.mode() == mode {
            return Ok(true);
        }
        let name = match mode {
            Mode::Topic => "topic",
            Mode::Document => "pdf",
        };
        self.emit(format!("`{command}` needs `mode {name}`.\n")).await?;
        Ok(false)
    }

    /// Refused transitions are silent.
    async fn start(&mut self, job: Option<Job>, panel: Panel) -> anyhow::Result<()> {
        let Some(job) = job else {
            tracing::debug!("request ignored");
            return Ok(());
        };
        self.dispatch(job);
        self.show(panel).await
    }

    fn dispatch(&mut self, job: Job) {
        self.outstanding += 1;
        let services = self.services.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let completion = runner::run(job, &services).await;
            if completions.send(completion).is_err() {
                tracing::debug!("hub closed before request finished");
            }
        });
    }

    async fn complete(&mut self, completion: Completion) -> anyhow::Result<()> {
        let panel = match completion {
            Completion::Document { .. } => Panel::Input,
            _ => Panel::Output,
        };
        if !self.session.apply(completion) {
            tracing::debug!("dropped stale completion");
            return Ok(());
        }
        self.show(panel).await
    }

    async fn show(&mut self, panel: Panel) -> anyhow::Result<()> {
        let text = match panel {
            Panel::Input => render::input_panel(&self.session),
            Panel::Output => {
                let view = self.diagram_view().await;
                render::output_panel(&self.session, &view)
            }
        };
        self.emit(text).await
    }

    async fn diagram_view(&mut self) -> DiagramView {
        let Some(source) = self.session.displayed_story().map(|s| s.mind_map.clone()) else {
            return DiagramView::Empty;
        };
        if let Some((cached, view)) = &self.diagram
            && *cached == source
        {
            return view.clone();
        }
        let view = diagram::view(self.renderer.as_deref(), &source).await;
        self.diagram = Some((source, view.clone()));
        view
    }

    async fn speak(&mut self, section: SpeechSection) -> anyhow::Result<()> {
        let text = match section {
            SpeechSection::Story => self
                .session
                .displayed_story()
                .map(|s| speech::plain_text(&s.story)),
            SpeechSection::Takeaways => self
                .session
                .displayed_story()
                .map(|s| speech::takeaways_text(&s.key_takeaways)),
            SpeechSection::Answer => match self.session.primary() {
                Primary::Answer { answer } => Some(speech::plain_text(&answer.answer)),
                _ => None,
            },
        };
        let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
            return Ok(());
        };

        let name = section.as_str();
        let message = match self.speech.toggle(section, &text).await {
            Ok(true) => format!("Speaking {name}... (`speak {name}` again to stop)\n"),
            Ok(false) => "Speech stopped.\n".to_owned(),
            Err(err) => {
                tracing::warn!(section = name, error = %format!("{err:#}"), "speech failed");
                format!("Speech failed: {err:#}\n")
            }
        };
        self.emit(message).await
    }

    async fn save(&mut self, dir: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
        let Some(result) = self.session.displayed_story() else {
            return self.emit("Nothing to save yet: generate a story first.\n").await;
        };
        let dir = dir.unwrap_or_else(default_save_dir);
        let message = match export::export_story(&dir, result, force) {
            Ok(files) => format!("Saved {} files to {}\n", files.len(), dir.display()),
            Err(err) => format!("Save failed: {err:#}\n"),
        };
        self.emit(message).await
    }

    async fn emit(&mut self, text: impl AsRef<str>) -> anyhow::Result<()> {
        self.out
            .write_all(text.as_ref().as_bytes())
            .await
            .context("write hub output")?;
        self.out.flush().await.context("flush hub output")
    }
}

pub async fn run(args: HubArgs) -> anyhow::Result<()> {
    let services = config::services(&args.service)?;
    let speech = SpeechPlayer::new(args.speech_command, args.speech_args);
    let renderer = args.mermaid_command.map(|program| {
        tracing::info!(program = %program, "concept maps rendered via command");
        Box::new(MermaidCommandRenderer::new(program, Vec::new())) as Box<dyn DiagramRenderer>
    });

    let hub = Hub::new(services, speech, renderer, tokio::io::stdout());
    hub.serve(BufReader::new(tokio::io::stdin())).await?;
    Ok(())
}
