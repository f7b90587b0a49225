/// One rendered line of a story script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueLine {
    Turn { speaker: String, utterance: String },
    Prose(String),
}

/// Splits a `Speaker: line` script into turns. Presentation only.
pub fn parse(story: &str) -> Vec<DialogueLine> {
    story
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> DialogueLine {
    if let Some((head, rest)) = line.split_once(':') {
        let speaker = clean_speaker(head);
        if !speaker.is_empty() {
            return DialogueLine::Turn {
                speaker,
                utterance: rest.trim_start_matches('*').trim().to_owned(),
            };
        }
    }
    DialogueLine::Prose(line.trim().to_owned())
}

// Models like to wrap names in bold or list markers: `**Hoot:**`, `- Hoot:`.
fn clean_speaker(head: &str) -> String {
    head.trim()
        .trim_start_matches(['-', '*', '#', '>'])
        .trim_matches(['*', '_'])
        .trim()
        .to_owned()
}

/// Leading `Speaker:` prefix of every non-blank line, `None` for prose lines.
pub fn speaker_prefixes(story: &str) -> Vec<Option<String>> {
    parse(story)
        .into_iter()
        .map(|line| match line {
            DialogueLine::Turn { speaker, .. } => Some(speaker),
            DialogueLine::Prose(_) => None,
        })
        .collect()
}
