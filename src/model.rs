use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bundled output of one story generation or translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryResult {
    pub story: String,
    /// Compiled diagram description (empty when there is nothing to render).
    pub mind_map: String,
    pub mind_map_data: MindMapGraph,
    pub image_url: String,
    pub key_takeaways: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapGraph {
    pub nodes: Vec<MindMapNode>,
    pub connections: Vec<MindMapEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnswer {
    pub file_name: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    Fr,
    De,
    Ja,
    Zh,
    Hi,
    Ta,
    Te,
    Ml,
    Kn,
    Bn,
    Mr,
    Gu,
    Pa,
}

impl Language {
    pub const ALL: [Language; 14] = [
        Language::Es,
        Language::Fr,
        Language::De,
        Language::Ja,
        Language::Zh,
        Language::Hi,
        Language::Ta,
        Language::Te,
        Language::Ml,
        Language::Kn,
        Language::Bn,
        Language::Mr,
        Language::Gu,
        Language::Pa,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
            Language::Ja => "ja",
            Language::Zh => "zh",
            Language::Hi => "hi",
            Language::Ta => "ta",
            Language::Te => "te",
            Language::Ml => "ml",
            Language::Kn => "kn",
            Language::Bn => "bn",
            Language::Mr => "mr",
            Language::Gu => "gu",
            Language::Pa => "pa",
        }
    }

    /// Name used in translation prompts and menus.
    pub fn name(self) -> &'static str {
        match self {
            Language::Es => "Spanish",
            Language::Fr => "French",
            Language::De => "German",
            Language::Ja => "Japanese",
            Language::Zh => "Mandarin Chinese",
            Language::Hi => "Hindi",
            Language::Ta => "Tamil",
            Language::Te => "Telugu",
            Language::Ml => "Malayalam",
            Language::Kn => "Kannada",
            Language::Bn => "Bengali",
            Language::Mr => "Marathi",
            Language::Gu => "Gujarati",
            Language::Pa => "Punjabi",
        }
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let code = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == code)
            .ok_or_else(|| {
                let supported = Self::ALL.map(Language::code).join(", ");
                anyhow::anyhow!("unsupported language: {raw:?} (expected one of: {supported})")
            })
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
