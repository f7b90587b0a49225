use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::model::MindMapGraph;

/// Compiles a mind map into a Mermaid flowchart.
///
/// Returns an empty string when the graph has no nodes, which callers treat as
/// "nothing to render". Edges are emitted as given: dangling or duplicate
/// connections are left for the renderer to reject.
pub fn compile(graph: &MindMapGraph) -> String {
    if graph.nodes.is_empty() {
        return String::new();
    }

    let nodes = graph
        .nodes
        .iter()
        .map(|node| format!("{}[{}]", node.id, quote_label(&node.text)))
        .collect::<Vec<_>>();
    let edges = graph
        .connections
        .iter()
        .map(|edge| format!("{} --> {}", edge.from, edge.to))
        .collect::<Vec<_>>();

    format!("graph TD\n{}\n{}", nodes.join("\n"), edges.join("\n"))
}

fn quote_label(text: &str) -> String {
    // JSON string escaping keeps brackets, pipes and quotes inside the label.
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text.replace('"', "'")))
}

pub fn new_element_id() -> String {
    format!("mindmap-{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    /// Renders a diagram description into SVG markup.
    async fn render(&self, element_id: &str, source: &str) -> anyhow::Result<String>;
}

/// Renders through an external Mermaid CLI (`mmdc`-compatible arguments).
#[derive(Debug, Clone)]
pub struct MermaidCommandRenderer {
    program: String,
    args: Vec<String>,
}

impl MermaidCommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCommandRenderer {
    async fn render(&self, element_id: &str, source: &str) -> anyhow::Result<String> {
        let dir = tempfile::TempDir::new().context("create diagram temp dir")?;
        let input: PathBuf = dir.path().join(format!("{element_id}.mmd"));
        let output: PathBuf = dir.path().join(format!("{element_id}.svg"));
        tokio::fs::write(&input, source)
            .await
            .with_context(|| format!("write diagram source: {}", input.display()))?;

        tracing::debug!(program = %self.program, element_id, "render diagram");
        let result = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .output()
            .await
            .with_context(|| format!("spawn diagram renderer: {}", self.program))?;
        if !result.status.success() {
            anyhow::bail!(
                "diagram renderer failed ({}): {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        tokio::fs::read_to_string(&output)
            .await
            .with_context(|| format!("read rendered diagram: {}", output.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramView {
    Empty,
    /// No renderer is configured; the description is shown as-is.
    Source(String),
    Rendered(String),
    Failed { source: String, error: String },
}

pub async fn view(renderer: Option<&dyn DiagramRenderer>, source: &str) -> DiagramView {
    if source.trim().is_empty() {
        return DiagramView::Empty;
    }
    let Some(renderer) = renderer else {
        return DiagramView::Source(source.to_owned());
    };

    let element_id = new_element_id();
    match renderer.render(&element_id, source).await {
        Ok(svg) => DiagramView::Rendered(svg),
        Err(err) => {
            tracing::warn!(element_id = %element_id, error = %format!("{err:#}"), "concept map rendering failed");
            DiagramView::Failed {
                source: source.trim().to_owned(),
                error: format!("{err:#}"),
            }
        }
    }
}
