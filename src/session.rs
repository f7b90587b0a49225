//! Single source of truth for what is shown, loading, or failed.
//!
//! Every user action is a `begin_*` transition that either refuses (returns
//! `None`, leaving state untouched) or moves an operation to in-flight and
//! hands back the [`Job`] to perform. The job's [`Completion`] is fed back
//! through [`Session::apply`]. Completions that no longer match the state they
//! were started from are dropped.

use std::path::PathBuf;

use serde::Serialize;

use crate::document;
use crate::model::{DocumentAnswer, Language, QuizItem, StoryResult};
use crate::quiz::{self, QuizAttempt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Topic,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Empty,
    Story,
    DocumentAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKind {
    Story,
    DocumentAnswer,
}

/// Story generation and document answering share one slot, so at most one of
/// them is ever in flight.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Primary {
    #[default]
    Idle,
    GeneratingStory,
    Answering {
        file_name: String,
        question: String,
    },
    Story {
        result: StoryResult,
    },
    Answer {
        answer: DocumentAnswer,
    },
    Failed {
        kind: PrimaryKind,
        message: String,
    },
}

impl Primary {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Primary::GeneratingStory | Primary::Answering { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Operation<T> {
    Idle,
    InFlight,
    Succeeded(T),
    Failed(String),
}

impl<T> Default for Operation<T> {
    fn default() -> Self {
        Operation::Idle
    }
}

impl<T> Operation<T> {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Operation::InFlight)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Operation::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentState {
    #[default]
    Empty,
    Parsing {
        file_name: String,
    },
    Loaded {
        file_name: String,
        #[serde(skip)]
        text: String,
        chars: usize,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatedStory {
    pub language: Language,
    pub result: StoryResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Story {
        topic: String,
    },
    LoadDocument {
        path: PathBuf,
        file_name: String,
    },
    Answer {
        document_text: String,
        question: String,
    },
    Translate {
        epoch: u64,
        source: StoryResult,
        language: Language,
    },
    Quiz {
        epoch: u64,
        context: String,
    },
}

/// Outcome of a [`Job`]; failures carry the user-facing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Story(Result<StoryResult, String>),
    Document {
        file_name: String,
        outcome: Result<String, String>,
    },
    Answer(Result<String, String>),
    Translation {
        epoch: u64,
        language: Language,
        outcome: Result<StoryResult, String>,
    },
    Quiz {
        epoch: u64,
        outcome: Result<Vec<QuizItem>, String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    mode: Mode,
    primary: Primary,
    translated: Option<TranslatedStory>,
    translation: Operation<()>,
    quiz: Operation<QuizAttempt>,
    document: DocumentState,
    /// Bumped whenever the displayed story is replaced; secondary jobs started
    /// under an older epoch are stale.
    epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session already displaying `result`, e.g. one loaded from disk.
    pub fn with_story(result: StoryResult) -> Self {
        Self {
            primary: Primary::Story { result },
            ..Self::default()
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn select_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn primary(&self) -> &Primary {
        &self.primary
    }

    pub fn document(&self) -> &DocumentState {
        &self.document
    }

    pub fn translation(&self) -> &Operation<()> {
        &self.translation
    }

    pub fn translated(&self) -> Option<&TranslatedStory> {
        self.translated.as_ref()
    }

    pub fn quiz(&self) -> &Operation<QuizAttempt> {
        &self.quiz
    }

    pub fn quiz_attempt_mut(&mut self) -> Option<&mut QuizAttempt> {
        match &mut self.quiz {
            Operation::Succeeded(attempt) => Some(attempt),
            _ => None,
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        match &self.primary {
            Primary::Idle => OutputMode::Empty,
            Primary::GeneratingStory
            | Primary::Story { .. }
            | Primary::Failed {
                kind: PrimaryKind::Story,
                ..
            } => OutputMode::Story,
            Primary::Answering { .. }
            | Primary::Answer { .. }
            | Primary::Failed {
                kind: PrimaryKind::DocumentAnswer,
                ..
            } => OutputMode::DocumentAnswer,
        }
    }

    pub fn original_story(&self) -> Option<&StoryResult> {
        match &self.primary {
            Primary::Story { result } => Some(result),
            _ => None,
        }
    }

    /// The translation when there is one, otherwise the original.
    pub fn displayed_story(&self) -> Option<&StoryResult> {
        let original = self.original_story()?;
        Some(
            self.translated
                .as_ref()
                .map(|t| &t.result)
                .unwrap_or(original),
        )
    }

    pub fn has_pending_work(&self) -> bool {
        self.primary.is_in_flight()
            || self.translation.is_in_flight()
            || self.quiz.is_in_flight()
            || matches!(self.document, DocumentState::Parsing { .. })
    }

    fn reset_outputs(&mut self) {
        self.primary = Primary::Idle;
        self.translated = None;
        self.translation = Operation::Idle;
        self.quiz = Operation::Idle;
        if matches!(self.document, DocumentState::Failed { .. }) {
            self.document = DocumentState::Empty;
        }
        self.epoch += 1;
    }

    pub fn begin_story(&mut self, input: &str) -> Option<Job> {
        if input.trim().is_empty() || self.primary.is_in_flight() {
            return None;
        }
        self.reset_outputs();
        self.primary = Primary::GeneratingStory;
        Some(Job::Story {
            topic: input.to_owned(),
        })
    }

    pub fn begin_document_load(&mut self, path: impl Into<PathBuf>) -> Option<Job> {
        if self.primary.is_in_flight() || matches!(self.document, DocumentState::Parsing { .. }) {
            return None;
        }
        let path = path.into();
        let file_name = document::file_name(&path);

        if matches!(
            self.primary,
            Primary::Answer { .. }
                | Primary::Failed {
                    kind: PrimaryKind::DocumentAnswer,
                    ..
                }
        ) {
            self.primary = Primary::Idle;
        }
        self.document = DocumentState::Parsing {
            file_name: file_name.clone(),
        };
        Some(Job::LoadDocument { path, file_name })
    }

    pub fn begin_answer(&mut self, question: &str) -> Option<Job> {
        let DocumentState::Loaded {
            file_name, text, ..
        } = &self.document
        else {
            return None;
        };
        if question.trim().is_empty() || self.primary.is_in_flight() {
            return None;
        }
        let job = Job::Answer {
            document_text: text.clone(),
            question: question.to_owned(),
        };
        let file_name = file_name.clone();

        self.reset_outputs();
        self.primary = Primary::Answering {
            file_name,
            question: question.to_owned(),
        };
        Some(job)
    }

    pub fn begin_translation(&mut self, language: Language) -> Option<Job> {
        if self.translation.is_in_flight() {
            return None;
        }
        let source = self.displayed_story()?.clone();
        self.translation = Operation::InFlight;
        Some(Job::Translate {
            epoch: self.epoch,
            source,
            language,
        })
    }

    /// Back to the original story. A quiz or translation built on the
    /// translated text is dropped with it.
    pub fn clear_translation(&mut self) {
        if self.translated.take().is_some() {
            self.epoch += 1;
            self.quiz = Operation::Idle;
            self.translation = Operation::Idle;
        } else if !self.translation.is_in_flight() {
            self.translation = Operation::Idle;
        }
    }

    pub fn begin_quiz(&mut self) -> Option<Job> {
        if self.quiz.is_in_flight() {
            return None;
        }
        let context = quiz::context(self.displayed_story()?);
        self.quiz = Operation::InFlight;
        Some(Job::Quiz {
            epoch: self.epoch,
            context,
        })
    }

    /// Returns whether the completion was applied.
    pub fn apply(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Story(outcome) => {
                if !matches!(self.primary, Primary::GeneratingStory) {
                    return false;
                }
                self.primary = match outcome {
                    Ok(result) => Primary::Story { result },
                    Err(message) => Primary::Failed {
                        kind: PrimaryKind::Story,
                        message,
                    },
                };
                true
            }
            Completion::Answer(outcome) => {
                let Primary::Answering {
                    file_name,
                    question,
                } = &self.primary
                else {
                    return false;
                };
                self.primary = match outcome {
                    Ok(answer) => Primary::Answer {
                        answer: DocumentAnswer {
                            file_name: file_name.clone(),
                            question: question.clone(),
                            answer,
                        },
                    },
                    Err(message) => Primary::Failed {
                        kind: PrimaryKind::DocumentAnswer,
                        message,
                    },
                };
                true
            }
            Completion::Document { file_name, outcome } => {
                match &self.document {
                    DocumentState::Parsing { file_name: parsing } if *parsing == file_name => {}
                    _ => return false,
                }
                self.document = match outcome {
                    Ok(text) => DocumentState::Loaded {
                        file_name,
                        chars: text.chars().count(),
                        text,
                    },
                    Err(message) => DocumentState::Failed { message },
                };
                true
            }
            Completion::Translation {
                epoch,
                language,
                outcome,
            } => {
                if epoch != self.epoch || !self.translation.is_in_flight() {
                    return false;
                }
                match outcome {
                    Ok(result) => {
                        self.translated = Some(TranslatedStory { language, result });
                        self.translation = Operation::Idle;
                        // The quiz was written against the previous text.
                        self.quiz = Operation::Idle;
                        self.epoch += 1;
                    }
                    Err(message) => self.translation = Operation::Failed(message),
                }
                true
            }
            Completion::Quiz { epoch, outcome } => {
                if epoch != self.epoch || !self.quiz.is_in_flight() {
                    return false;
                }
                self.quiz = match outcome {
                    Ok(items) => Operation::Succeeded(QuizAttempt::new(items)),
                    Err(message) => Operation::Failed(message),
                };
                true
            }
        }
    }
}
