//! Request builders for every call made to the generation service.

use serde::Serialize;
use serde_json::{Value, json};

use crate::gemini::{GenerationRequest, ImageRequest};
use crate::model::{Language, MindMapNode, StoryResult};

/// Only this much extracted document text is sent with a question.
pub const MAX_DOCUMENT_CHARS: usize = 20_000;

/// Every image prompt must open with this style.
pub const IMAGE_STYLE: &str = "Charming educational cartoon style";

pub const IMAGE_ASPECT_RATIO: &str = "16:9";

pub const EXAMPLE_TOPIC: &str = "Explain the process of photosynthesis.";

const STORY_TEMPERATURE: f32 = 0.5;
const TRANSLATION_TEMPERATURE: f32 = 0.2;

pub fn story_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "imagePrompt": {
                "type": "STRING",
                "description": format!("A highly descriptive, vivid prompt for an image generation model, specifying characters, action, setting, and the artistic style '{IMAGE_STYLE}'. It must explicitly name the characters from the story and describe the exact action they are performing."),
            },
            "story": {
                "type": "STRING",
                "description": "A story in Markdown format, presented as a conversation between two named characters. Each line of dialogue MUST start with the character's name followed by a colon (e.g., \"Professor Hoot: ...\").",
            },
            "mindMap": {
                "type": "OBJECT",
                "description": "A structured object containing nodes and connections for a mind map.",
                "properties": {
                    "nodes": {
                        "type": "ARRAY",
                        "description": "All nodes in the mind map. Each node must have a unique ID.",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "id": { "type": "STRING", "description": "A short, unique identifier for the node (e.g., 'A', 'B', 'C1')." },
                                "text": { "type": "STRING", "description": "The display text for the node." },
                            },
                            "required": ["id", "text"],
                        },
                    },
                    "connections": {
                        "type": "ARRAY",
                        "description": "Directed edges between nodes, referencing node IDs.",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "from": { "type": "STRING", "description": "The ID of the source node." },
                                "to": { "type": "STRING", "description": "The ID of the target node." },
                            },
                            "required": ["from", "to"],
                        },
                    },
                },
                "required": ["nodes", "connections"],
            },
            "keyTakeaways": {
                "type": "ARRAY",
                "description": "3-5 short, concise key takeaways from the story's explanation.",
                "items": { "type": "STRING" },
            },
        },
        "required": ["imagePrompt", "story", "mindMap", "keyTakeaways"],
    })
}

pub fn story_request(model: &str, topic: &str) -> GenerationRequest {
    let prompt = format!(
        r#"You are an expert teacher and creative storyteller who simplifies complex educational topics for students. Your goal is to explain the following text by creating a cohesive learning package.

User's Text:
---
{topic}
---

Respond with a single JSON object containing four elements: a story, a mind map, a highly specific image prompt, and key takeaways.

1. story: a Markdown conversation between two named, memorable characters (e.g., a wise mentor and a curious student) who explain the text simply and engagingly. Each line of dialogue MUST start with the character's name followed by a colon (e.g., "Professor Hoot: ...").

2. mindMap: an object with "nodes" (each with a unique "id" such as "A" or "B1" and the "text" to display) and "connections" (each with "from" and "to" node IDs).
   Example: {{"nodes":[{{"id":"A","text":"Main Topic"}},{{"id":"B","text":"Sub-Topic 1"}}],"connections":[{{"from":"A","to":"B"}}]}}

3. imagePrompt: a vivid, detailed prompt for an image generator visualizing a scene from the story.
   - It MUST feature the exact same named characters as the story.
   - Describe the exact action they perform as it relates to the topic, and the setting.
   - The style MUST be "{IMAGE_STYLE}" and the prompt MUST start with these exact words.

4. keyTakeaways: 3-5 short, simple strings summarizing the most important points.

Output only the JSON object, with no text or markdown fences around it."#
    );

    GenerationRequest {
        model: model.to_owned(),
        prompt,
        response_schema: Some(story_schema()),
        temperature: Some(STORY_TEMPERATURE),
    }
}

pub fn image_request(model: &str, image_prompt: &str) -> ImageRequest {
    ImageRequest {
        model: model.to_owned(),
        prompt: image_prompt.to_owned(),
        number_of_images: 1,
        aspect_ratio: IMAGE_ASPECT_RATIO.to_owned(),
        output_mime_type: "image/png".to_owned(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslationInput<'a> {
    story: &'a str,
    key_takeaways: &'a [String],
    mind_map_nodes: &'a [MindMapNode],
}

pub fn translation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "story": { "type": "STRING" },
            "keyTakeaways": { "type": "ARRAY", "items": { "type": "STRING" } },
            "mindMapNodes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "text": { "type": "STRING" },
                    },
                    "required": ["id", "text"],
                },
            },
        },
        "required": ["story", "keyTakeaways", "mindMapNodes"],
    })
}

pub fn translation_request(
    model: &str,
    source: &StoryResult,
    language: Language,
) -> anyhow::Result<GenerationRequest> {
    let input = TranslationInput {
        story: &source.story,
        key_takeaways: &source.key_takeaways,
        mind_map_nodes: &source.mind_map_data.nodes,
    };
    let input_json = serde_json::to_string_pretty(&input)?;
    let language = language.name();

    let prompt = format!(
        r#"You are an expert translator. Translate the text content of the following JSON object into {language}.
- Translate the 'story' field.
- Translate each string in the 'keyTakeaways' array.
- Translate the 'text' property of each object in the 'mindMapNodes' array.
- CRITICAL RULE: Do NOT translate the character names that appear at the beginning of a line in the story (e.g., "Professor Hoot:"). Preserve them exactly as they are.
- CRITICAL RULE: Do NOT translate the 'id' property in the 'mindMapNodes' array. Preserve the IDs exactly.
- Return ONLY a single JSON object with the exact same structure as the input, with the text content translated.

Input JSON:
---
{input_json}
---
"#
    );

    Ok(GenerationRequest {
        model: model.to_owned(),
        prompt,
        response_schema: Some(translation_schema()),
        temperature: Some(TRANSLATION_TEMPERATURE),
    })
}

pub fn quiz_schema() -> Value {
    json!({
        "type": "ARRAY",
        "description": "An array of 3 quiz questions.",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING", "description": "The question text." },
                "options": { "type": "ARRAY", "description": "An array of 4 string options.", "items": { "type": "STRING" } },
                "correctAnswerIndex": { "type": "NUMBER", "description": "The 0-based index of the correct answer in the options array." },
            },
            "required": ["question", "options", "correctAnswerIndex"],
        },
    })
}

pub fn quiz_request(model: &str, context: &str) -> GenerationRequest {
    let prompt = format!(
        r#"You are an expert educator. Based on the provided learning material, create a multiple-choice quiz with exactly 3 questions to test a student's understanding.
- For each question, provide 4 distinct options.
- The questions should be relevant to the key concepts in the text.
- Make the options plausible, with exactly one correct answer.
- Return the quiz as a single JSON array matching the provided schema, with no other text.

CONTEXT:
---
{context}
---
"#
    );

    GenerationRequest {
        model: model.to_owned(),
        prompt,
        response_schema: Some(quiz_schema()),
        temperature: None,
    }
}

/// First `MAX_DOCUMENT_CHARS` characters (not bytes) of the document.
pub fn truncate_document(text: &str) -> &str {
    match text.char_indices().nth(MAX_DOCUMENT_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn document_answer_request(model: &str, document_text: &str, question: &str) -> GenerationRequest {
    let context = truncate_document(document_text);
    let prompt = format!(
        r#"You are a helpful academic assistant. Answer the user's question clearly and concisely, based *only* on the provided text extracted from a PDF document.
- Analyze the text thoroughly.
- If the answer is present in the text, synthesize it and present it as well-formatted Markdown.
- If the answer cannot be found in the provided text, you MUST state that clearly, for example: "I could not find an answer to your question in the provided PDF text." Do not use outside knowledge.

---
CONTEXT FROM PDF (first 20,000 characters):
{context}
---
USER'S QUESTION:
{question}
---

ANSWER:
"#
    );

    GenerationRequest {
        model: model.to_owned(),
        prompt,
        response_schema: None,
        temperature: None,
    }
}
