use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use base64::Engine as _;
use serde::Serialize;

use crate::model::StoryResult;
use crate::render;

pub const STORY_JSON: &str = "story.json";
pub const STORY_MD: &str = "story.md";
pub const MINDMAP_MMD: &str = "mindmap.mmd";

/// Writes a story bundle into `dir` and returns the files written.
///
/// Without `force` every target must be new; nothing is written if any of
/// them already exists.
pub fn export_story(dir: &Path, result: &StoryResult, force: bool) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output dir: {}", dir.display()))?;

    let (mime, image) = decode_data_uri(&result.image_url).context("decode story image")?;
    let image_name = match mime.as_str() {
        "image/svg+xml" => "image.svg",
        "image/jpeg" => "image.jpg",
        _ => "image.png",
    };

    let mut json = serde_json::to_vec_pretty(result).context("serialize story")?;
    json.push(b'\n');
    let files: Vec<(PathBuf, Vec<u8>)> = vec![
        (dir.join(STORY_JSON), json),
        (
            dir.join(STORY_MD),
            render::story_markdown(result).into_bytes(),
        ),
        (dir.join(MINDMAP_MMD), result.mind_map.clone().into_bytes()),
        (dir.join(image_name), image),
    ];

    if !force
        && let Some((existing, _)) = files.iter().find(|(path, _)| path.exists())
    {
        anyhow::bail!(
            "output already exists: {} (pass --force to overwrite)",
            existing.display()
        );
    }

    for (path, contents) in &files {
        write_output(path, contents, force)?;
    }
    tracing::info!(dir = %dir.display(), image = image_name, "exported story");
    Ok(files.into_iter().map(|(path, _)| path).collect())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T, force: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    let mut json = serde_json::to_vec_pretty(value).context("serialize output")?;
    json.push(b'\n');
    write_output(path, &json, force)
}

pub fn write_output(path: &Path, contents: &[u8], force: bool) -> anyhow::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("open output: {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("write output: {}", path.display()))?;
    file.flush()
        .with_context(|| format!("flush output: {}", path.display()))?;
    Ok(())
}

pub fn read_story(path: &Path) -> anyhow::Result<StoryResult> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read story: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse story: {}", path.display()))
}

/// Splits a base64 `data:` URI into its media type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| anyhow::anyhow!("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("data URI has no payload"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow::anyhow!("data URI is not base64 encoded"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("decode base64 payload")?;
    Ok((mime.to_owned(), bytes))
}
