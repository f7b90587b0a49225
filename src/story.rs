use std::collections::HashSet;

use anyhow::Context as _;
use base64::Engine as _;
use serde::Deserialize;

use crate::diagram;
use crate::dialogue;
use crate::gemini::{GenerationService, ImageService};
use crate::model::{Language, MindMapGraph, MindMapNode, StoryResult};
use crate::prompt;

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="1024" height="576" viewBox="0 0 1024 576" style="background-color:#e2e8f0;">
  <text x="50%" y="50%" dominant-baseline="middle" text-anchor="middle" font-family="sans-serif" font-size="48px" fill="#64748b">Image Generation Failed</text>
  <text x="50%" y="55%" dy="1.2em" dominant-baseline="middle" text-anchor="middle" font-family="sans-serif" font-size="24px" fill="#94a3b8">Displaying a placeholder</text>
</svg>"##;

#[derive(Debug, Clone, Copy)]
pub struct Models<'a> {
    pub text: &'a str,
    pub image: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryResponse {
    image_prompt: String,
    story: String,
    mind_map: MindMapGraph,
    #[serde(default)]
    key_takeaways: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslationResponse {
    story: String,
    key_takeaways: Vec<String>,
    mind_map_nodes: Vec<MindMapNode>,
}

/// Text generation followed by image generation for the returned prompt.
pub async fn generate(
    text_service: &dyn GenerationService,
    image_service: &dyn ImageService,
    models: Models<'_>,
    topic: &str,
) -> anyhow::Result<StoryResult> {
    tracing::info!(model = models.text, chars = topic.chars().count(), "generate visual story");

    let request = prompt::story_request(models.text, topic);
    let raw = text_service
        .generate(&request)
        .await
        .context("Failed to generate visual story")?;
    let response: StoryResponse = serde_json::from_str(raw.trim())
        .context("Failed to generate visual story: response does not match the story schema")?;
    validate_story_response(&response).context("Failed to generate visual story")?;

    let image_url = illustrate(image_service, models.image, &response.image_prompt).await;
    let mind_map = diagram::compile(&response.mind_map);

    Ok(StoryResult {
        story: response.story,
        mind_map,
        mind_map_data: response.mind_map,
        image_url,
        key_takeaways: response.key_takeaways,
    })
}

fn validate_story_response(response: &StoryResponse) -> anyhow::Result<()> {
    if response.story.trim().is_empty() {
        anyhow::bail!("story text is empty");
    }
    if response.image_prompt.trim().is_empty() {
        anyhow::bail!("image prompt is empty");
    }
    if response.mind_map.nodes.is_empty() {
        anyhow::bail!("mind map has no nodes");
    }
    let mut seen = HashSet::new();
    for node in &response.mind_map.nodes {
        if node.id.trim().is_empty() {
            anyhow::bail!("mind map node has an empty id");
        }
        if !seen.insert(node.id.as_str()) {
            anyhow::bail!("mind map node id is duplicated: {}", node.id);
        }
    }
    Ok(())
}

/// Never fails: a missing or failed image becomes the placeholder.
async fn illustrate(image_service: &dyn ImageService, model: &str, image_prompt: &str) -> String {
    let request = prompt::image_request(model, image_prompt);
    match image_service.generate_images(&request).await {
        Ok(images) => match images.into_iter().next() {
            Some(bytes) => data_uri("image/png", &bytes),
            None => {
                tracing::warn!(model, "image generation returned no image; using placeholder");
                placeholder_image_uri()
            }
        },
        Err(err) => {
            tracing::warn!(model, error = %format!("{err:#}"), "image generation failed; using placeholder");
            placeholder_image_uri()
        }
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

pub fn placeholder_image_uri() -> String {
    data_uri("image/svg+xml", PLACEHOLDER_SVG.as_bytes())
}

/// Translates story, takeaways and node labels in one request and rebuilds
/// the result around the source's ids, connections and image.
pub async fn translate(
    service: &dyn GenerationService,
    model: &str,
    source: &StoryResult,
    language: Language,
) -> anyhow::Result<StoryResult> {
    tracing::info!(model, language = language.code(), "translate story");

    let request =
        prompt::translation_request(model, source, language).context("Failed to translate")?;
    let raw = service
        .generate(&request)
        .await
        .context("Failed to translate")?;
    let response: TranslationResponse = serde_json::from_str(raw.trim())
        .context("Failed to translate: response does not match the translation schema")?;

    reassemble(source, response).context("Failed to translate")
}

fn reassemble(source: &StoryResult, response: TranslationResponse) -> anyhow::Result<StoryResult> {
    if response.story.trim().is_empty() {
        anyhow::bail!("translated story is empty");
    }

    let mut labels = std::collections::HashMap::new();
    for node in response.mind_map_nodes {
        // Ids are matched byte for byte.
        if labels.insert(node.id.clone(), node.text).is_some() {
            anyhow::bail!("translated mind map repeats node id: {}", node.id);
        }
    }

    let mut nodes = Vec::with_capacity(source.mind_map_data.nodes.len());
    for node in &source.mind_map_data.nodes {
        let text = labels
            .remove(node.id.as_str())
            .ok_or_else(|| anyhow::anyhow!("translated mind map is missing node id: {}", node.id))?;
        nodes.push(MindMapNode {
            id: node.id.clone(),
            text,
        });
    }
    if let Some(extra) = labels.keys().next() {
        anyhow::bail!("translated mind map has unknown node id: {extra}");
    }

    if !speaker_prefixes_preserved(&source.story, &response.story) {
        tracing::warn!("translated story changed speaker names");
    }

    let mind_map_data = MindMapGraph {
        nodes,
        connections: source.mind_map_data.connections.clone(),
    };
    Ok(StoryResult {
        story: response.story,
        mind_map: diagram::compile(&mind_map_data),
        mind_map_data,
        image_url: source.image_url.clone(),
        key_takeaways: response.key_takeaways,
    })
}

/// Whether every `Speaker:` prefix of the source reappears on the same line.
pub fn speaker_prefixes_preserved(source: &str, translated: &str) -> bool {
    let before = dialogue::speaker_prefixes(source);
    let after = dialogue::speaker_prefixes(translated);
    if before.len() != after.len() {
        return false;
    }
    before
        .iter()
        .zip(after.iter())
        .all(|(b, a)| b.is_none() || b == a)
}
