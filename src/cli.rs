use clap::{Args, Parser, Subcommand};

use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Turn educational text into a visual story (dialogue, concept map, takeaways, image).
    Story(StoryArgs),
    /// Translate a saved story into another language.
    Translate(TranslateArgs),
    /// Generate a three-question quiz from a saved story.
    Quiz(QuizArgs),
    /// Answer a question from a PDF's text.
    Ask(AskArgs),
    /// Compile a mind-map graph (JSON) into a Mermaid diagram description.
    Mindmap(MindmapArgs),
    /// Interactive learning hub.
    Hub(HubArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServiceArgs {
    /// Generation service base URL.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model used for story, translation, quiz and document answers.
    #[arg(long, default_value = DEFAULT_TEXT_MODEL)]
    pub text_model: String,

    /// Model used for the story illustration.
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    pub image_model: String,

    /// HTTP timeout per request.
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct StoryArgs {
    /// Topic or text to explain.
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    pub text: Option<String>,

    /// Read the topic from a file instead.
    #[arg(long)]
    pub input: Option<String>,

    /// Output directory (story.json, story.md, mindmap.mmd, image).
    #[arg(long)]
    pub out: String,

    /// Overwrite existing output files.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Debug, Args)]
pub struct TranslateArgs {
    /// Input path to `story.json` (created by `story`).
    #[arg(long)]
    pub story: String,

    /// Target language code (es, fr, de, ja, zh, hi, ta, te, ml, kn, bn, mr, gu, pa).
    #[arg(long, default_value = "es")]
    pub to: String,

    /// Output file path for the translated `story.json`.
    #[arg(long)]
    pub out: String,

    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Debug, Args)]
pub struct QuizArgs {
    /// Input path to `story.json`.
    #[arg(long)]
    pub story: String,

    /// Write the quiz as JSON here instead of printing it.
    #[arg(long)]
    pub out: Option<String>,

    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// PDF document to read.
    #[arg(long)]
    pub pdf: String,

    /// Question about the document.
    #[arg(long)]
    pub question: String,

    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Debug, Args)]
pub struct MindmapArgs {
    /// JSON file with `nodes` and `connections`, or a `story.json`.
    #[arg(long)]
    pub graph: String,
}

#[derive(Debug, Args)]
pub struct HubArgs {
    /// Text-to-speech program; the utterance is written to its stdin.
    #[arg(long, default_value = "espeak")]
    pub speech_command: String,

    /// Extra arguments for the speech program.
    #[arg(long = "speech-arg", allow_hyphen_values = true)]
    pub speech_args: Vec<String>,

    /// Mermaid CLI used to render concept maps (e.g. `mmdc`). Without it the
    /// diagram source is shown.
    #[arg(long)]
    pub mermaid_command: Option<String>,

    #[command(flatten)]
    pub service: ServiceArgs,
}
