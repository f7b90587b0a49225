use crate::dialogue::{self, DialogueLine};
use crate::diagram::DiagramView;
use crate::model::{DocumentAnswer, StoryResult};
use crate::quiz::QuizAttempt;
use crate::session::{DocumentState, Mode, Operation, OutputMode, Primary, Session};

pub fn input_panel(session: &Session) -> String {
    let mut out = String::new();
    match session.mode() {
        Mode::Topic => {
            out.push_str("[Study Topic] | Ask a PDF\n");
            out.push_str("Paste any educational text, question, or concept with `story <text>`.\n");
        }
        Mode::Document => {
            out.push_str("Study Topic | [Ask a PDF]\n");
            out.push_str("Open a PDF with `open <path>`, then `ask <question>`.\n");
            match session.document() {
                DocumentState::Empty => {}
                DocumentState::Parsing { file_name } => {
                    out.push_str(&format!("Parsing PDF... ({file_name})\n"));
                }
                DocumentState::Loaded {
                    file_name, chars, ..
                } => {
                    out.push_str(&format!("Loaded: {file_name} ({chars} characters)\n"));
                }
                DocumentState::Failed { message } => {
                    out.push_str(&format!("{message}\n"));
                }
            }
        }
    }
    out
}

/// Output panel for the current state. `diagram` is the concept map view of
/// the displayed story, if any.
pub fn output_panel(session: &Session, diagram: &DiagramView) -> String {
    match (session.output_mode(), session.primary()) {
        (OutputMode::Empty, _) => {
            "Your learning hub is ready.\nChoose a mode and provide your input to begin.\n"
                .to_owned()
        }
        (_, Primary::GeneratingStory) => "Crafting your visual story...\n".to_owned(),
        (_, Primary::Answering { .. }) => {
            "Reading your PDF and finding the answer...\n".to_owned()
        }
        (_, Primary::Failed { message, .. }) => {
            format!("Oops! Something went wrong.\n{message}\n")
        }
        (_, Primary::Answer { answer }) => answer_panel(answer),
        (_, Primary::Story { .. }) => story_panel(session, diagram),
        (_, Primary::Idle) => String::new(),
    }
}

fn answer_panel(answer: &DocumentAnswer) -> String {
    format!(
        "From: {}\n\n{}\n\n{}\n",
        answer.file_name,
        answer.question,
        answer.answer.trim()
    )
}

fn story_panel(session: &Session, diagram: &DiagramView) -> String {
    let Some(result) = session.displayed_story() else {
        return String::new();
    };
    let mut out = String::new();

    out.push_str("== Translate Story ==\n");
    match (session.translated(), session.translation()) {
        (_, Operation::InFlight) => out.push_str("Translating...\n"),
        (Some(translated), _) => {
            out.push_str(&format!(
                "Showing {} translation (`revert` for the original).\n",
                translated.language
            ));
        }
        (None, _) => out.push_str("`translate <code>` (es, fr, de, ja, zh, hi, ta, te, ml, kn, bn, mr, gu, pa)\n"),
    }
    if let Some(error) = session.translation().error() {
        out.push_str(&format!("{error}\n"));
    }
    let badge = if session.translated().is_some() {
        " (Translated)"
    } else {
        ""
    };

    out.push_str("\n== Visual Aid ==\n");
    out.push_str(&format!("{}\n", describe_image(&result.image_url)));

    if !result.key_takeaways.is_empty() {
        out.push_str(&format!("\n== Key Takeaways{badge} ==\n"));
        for takeaway in &result.key_takeaways {
            out.push_str(&format!("  * {takeaway}\n"));
        }
    }

    out.push_str(&format!("\n== Story Time{badge} ==\n"));
    out.push_str(&dialogue_text(&result.story));

    out.push_str("\n== Concept Map ==\n");
    out.push_str(&diagram_text(diagram));

    out.push_str("\n== Quiz ==\n");
    out.push_str(&quiz_text(session.quiz()));
    out
}

fn describe_image(image_url: &str) -> String {
    let mime = image_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .unwrap_or("unknown");
    if mime == "image/svg+xml" {
        "Image generation failed; a placeholder is attached (`save` to write it out).".to_owned()
    } else {
        format!("Illustration ready ({mime}, {} bytes encoded).", image_url.len())
    }
}

pub fn dialogue_text(story: &str) -> String {
    let mut out = String::new();
    for line in dialogue::parse(story) {
        match line {
            DialogueLine::Turn { speaker, utterance } => {
                out.push_str(&format!("{speaker}:\n    {utterance}\n"));
            }
            DialogueLine::Prose(text) => {
                out.push_str(&format!("{text}\n"));
            }
        }
    }
    out
}

pub fn diagram_text(diagram: &DiagramView) -> String {
    match diagram {
        DiagramView::Empty => "(no concept map)\n".to_owned(),
        DiagramView::Source(source) => format!("{}\n", source.trim()),
        DiagramView::Rendered(svg) => format!("Rendered concept map ({} bytes of SVG).\n", svg.len()),
        DiagramView::Failed { source, error } => format!(
            "Concept Map Rendering Failed\nThe generated syntax may be invalid. Raw code:\n{source}\nDetails: {error}\n"
        ),
    }
}

fn quiz_text(quiz: &Operation<QuizAttempt>) -> String {
    match quiz {
        Operation::Idle => "`quiz` to test your knowledge.\n".to_owned(),
        Operation::InFlight => "Generating quiz...\n".to_owned(),
        Operation::Failed(message) => format!("{message}\n"),
        Operation::Succeeded(attempt) => attempt_text(attempt),
    }
}

pub fn attempt_text(attempt: &QuizAttempt) -> String {
    let mut out = String::new();
    if let (Some(score), Some(verdict)) = (attempt.score(), attempt.verdict()) {
        out.push_str(&format!(
            "Quiz Complete! You scored {score} out of {}. {verdict} (`retake` to try again)\n",
            attempt.items().len()
        ));
    }

    for (q, item) in attempt.items().iter().enumerate() {
        out.push_str(&format!("{}. {}\n", q + 1, item.question));
        for (o, option) in item.options.iter().enumerate() {
            let selected = attempt.selection(q) == Some(o);
            let marker = match (attempt.is_submitted(), selected) {
                (true, _) if o == item.correct_answer_index => "[correct]",
                (true, true) => "[wrong]",
                (false, true) => "[x]",
                _ => "[ ]",
            };
            out.push_str(&format!("   {marker} {}) {option}\n", o + 1));
        }
    }

    if !attempt.is_submitted() {
        if attempt.can_submit() {
            out.push_str("`submit` to check your answers.\n");
        } else {
            out.push_str("`pick <question> <option>` for every question, then `submit`.\n");
        }
    }
    out
}

/// Markdown export of a story.
pub fn story_markdown(result: &StoryResult) -> String {
    let mut out = String::new();
    out.push_str("# Key Takeaways\n\n");
    for takeaway in &result.key_takeaways {
        out.push_str(&format!("- {takeaway}\n"));
    }
    out.push_str("\n# Story\n\n");
    for line in dialogue::parse(&result.story) {
        match line {
            DialogueLine::Turn { speaker, utterance } => {
                out.push_str(&format!("**{speaker}:** {utterance}\n\n"));
            }
            DialogueLine::Prose(text) => {
                out.push_str(&format!("{text}\n\n"));
            }
        }
    }
    if !result.mind_map.is_empty() {
        out.push_str(&format!("# Concept Map\n\n```mermaid\n{}\n```\n", result.mind_map.trim()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MindMapGraph, QuizItem};
    use crate::session::Completion;

    fn story() -> StoryResult {
        StoryResult {
            story: "Hoot: Light feeds plants.\nThe forest hums.".to_owned(),
            mind_map: "graph TD\nA[\"Light\"]\n".to_owned(),
            mind_map_data: MindMapGraph::default(),
            image_url: "data:image/png;base64,AAAA".to_owned(),
            key_takeaways: vec!["Light matters".to_owned()],
        }
    }

    #[test]
    fn empty_state_banner() {
        let session = Session::new();
        assert!(output_panel(&session, &DiagramView::Empty).contains("learning hub is ready"));
    }

    #[test]
    fn loading_and_error_panels() {
        let mut session = Session::new();
        session.begin_story("topic");
        assert_eq!(
            output_panel(&session, &DiagramView::Empty),
            "Crafting your visual story...\n"
        );
        session.apply(Completion::Story(Err("Failed to generate visual story: boom".to_owned())));
        let panel = output_panel(&session, &DiagramView::Empty);
        assert!(panel.starts_with("Oops! Something went wrong."));
        assert!(panel.contains("boom"));
    }

    #[test]
    fn story_panel_shows_sections() {
        let mut session = Session::new();
        session.begin_story("topic");
        session.apply(Completion::Story(Ok(story())));
        let panel = output_panel(
            &session,
            &DiagramView::Failed {
                source: "graph TD".to_owned(),
                error: "Parse error".to_owned(),
            },
        );
        assert!(panel.contains("== Key Takeaways ==\n  * Light matters"));
        assert!(panel.contains("Hoot:\n    Light feeds plants."));
        assert!(panel.contains("The forest hums."));
        assert!(panel.contains("Concept Map Rendering Failed"));
        assert!(panel.contains("Details: Parse error"));
        assert!(panel.contains("Illustration ready (image/png"));
    }

    #[test]
    fn submitted_quiz_marks_answers() {
        let items = vec![
            QuizItem {
                question: "Q?".to_owned(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer_index: 1,
            };
            3
        ];
        let mut attempt = QuizAttempt::new(items);
        attempt.select(0, 0);
        attempt.select(1, 1);
        attempt.select(2, 1);
        attempt.submit();
        let text = attempt_text(&attempt);
        assert!(text.starts_with("Quiz Complete! You scored 2 out of 3. Nice work!"));
        assert!(text.contains("[wrong] 1) a"));
        assert!(text.contains("[correct] 2) b"));
    }

    #[test]
    fn markdown_export_has_mermaid_block() {
        let markdown = story_markdown(&story());
        assert!(markdown.contains("- Light matters"));
        assert!(markdown.contains("**Hoot:** Light feeds plants."));
        assert!(markdown.contains("```mermaid\ngraph TD\nA[\"Light\"]\n```"));
    }
}
