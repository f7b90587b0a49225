use std::process::Stdio;

use anyhow::Context as _;
use pulldown_cmark::{Event, Parser, TagEnd};
use tokio::io::AsyncWriteExt as _;
use tokio::process::{Child, Command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechSection {
    Story,
    Takeaways,
    Answer,
}

impl SpeechSection {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "story" => Ok(Self::Story),
            "takeaways" => Ok(Self::Takeaways),
            "answer" => Ok(Self::Answer),
            other => anyhow::bail!("unknown section: {other} (expected story, takeaways or answer)"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Takeaways => "takeaways",
            Self::Answer => "answer",
        }
    }
}

/// Reads text aloud through an external TTS program fed on stdin.
/// At most one utterance is active; starting another cancels it.
pub struct SpeechPlayer {
    program: String,
    args: Vec<String>,
    current: Option<(SpeechSection, Child)>,
}

impl SpeechPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current: None,
        }
    }

    /// The section being read, after reaping a finished utterance.
    pub fn speaking(&mut self) -> Option<SpeechSection> {
        let finished = match &mut self.current {
            Some((_, child)) => !matches!(child.try_wait(), Ok(None)),
            None => return None,
        };
        if finished {
            if let Some((section, _)) = self.current.take() {
                tracing::debug!(?section, "speech ended");
            }
            return None;
        }
        self.current.as_ref().map(|(section, _)| *section)
    }

    pub fn is_speaking(&mut self) -> bool {
        self.speaking().is_some()
    }

    pub async fn speak(&mut self, section: SpeechSection, text: &str) -> anyhow::Result<()> {
        self.cancel().await;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn speech command: {}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(text.as_bytes()).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(err) => return Err(err).context("write speech command stdin"),
            }
        }

        tracing::info!(?section, chars = text.chars().count(), "speech started");
        self.current = Some((section, child));
        Ok(())
    }

    pub async fn cancel(&mut self) {
        if let Some((section, mut child)) = self.current.take() {
            if let Err(err) = child.kill().await {
                tracing::debug!(?section, %err, "speech already finished");
            } else {
                tracing::info!(?section, "speech cancelled");
            }
        }
    }

    /// Stops `section` if it is being read, otherwise starts it.
    /// Returns whether `section` is speaking afterwards.
    pub async fn toggle(&mut self, section: SpeechSection, text: &str) -> anyhow::Result<bool> {
        if self.speaking() == Some(section) {
            self.cancel().await;
            return Ok(false);
        }
        self.speak(section, text).await?;
        Ok(true)
    }
}

/// Plain text of a Markdown snippet, suitable for speech synthesis.
pub fn plain_text(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item) => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_owned()
}

pub fn takeaways_text(takeaways: &[String]) -> String {
    takeaways.join(". ")
}
