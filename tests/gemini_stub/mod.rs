use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context as _;
use serde_json::Value;

pub const API_KEY: &str = "stub-key";

/// Base64 of the PNG signature; enough for the client to hand back bytes.
pub const PNG_BASE64: &str = "iVBORw0KGgo=";

pub const STORY_JSON: &str = r#"{
  "imagePrompt": "Charming educational cartoon style: Professor Hoot shows Sam how a leaf drinks sunlight",
  "story": "Professor Hoot: Plants turn sunlight into food.\nSam: So leaves are tiny kitchens?\nProfessor Hoot: Exactly, and chlorophyll is the chef.",
  "mindMap": {
    "nodes": [
      {"id": "A", "text": "Photosynthesis"},
      {"id": "B", "text": "Sunlight"},
      {"id": "C", "text": "Chlorophyll"}
    ],
    "connections": [
      {"from": "A", "to": "B"},
      {"from": "A", "to": "C"}
    ]
  },
  "keyTakeaways": ["Plants make food from light", "Chlorophyll captures light"]
}"#;

const QUIZ_JSON: &str = r#"[
  {"question": "What do plants turn into food?", "options": ["Rocks", "Sunlight", "Wind", "Salt"], "correctAnswerIndex": 1},
  {"question": "Who is the chef?", "options": ["Chlorophyll", "Sam", "Water", "Soil"], "correctAnswerIndex": 0},
  {"question": "What are leaves compared to?", "options": ["Kitchens", "Cars", "Books", "Clouds"], "correctAnswerIndex": 0}
]"#;

const INVALID_QUIZ_JSON: &str = r#"[
  {"question": "Only one question?", "options": ["Yes", "No"], "correctAnswerIndex": 0}
]"#;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum ImageBehavior {
    Png,
    Empty,
    Error,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum QuizBehavior {
    Valid,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct GeminiStubConfig {
    pub images: ImageBehavior,
    pub quiz: QuizBehavior,
}

impl Default for GeminiStubConfig {
    fn default() -> Self {
        Self {
            images: ImageBehavior::Png,
            quiz: QuizBehavior::Valid,
        }
    }
}

pub struct GeminiStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl GeminiStub {
    pub fn spawn(config: GeminiStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start gemini stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1beta");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let is_post = request.method() == &tiny_http::Method::Post;
                let Some(call) = path.strip_prefix("/v1beta/models/").filter(|_| is_post) else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                };
                let call = call.to_owned();

                let api_key = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("x-goog-api-key"))
                    .map(|h| h.value.as_str().to_owned());
                if api_key.as_deref() != Some(API_KEY) {
                    let _ = request.respond(json_response(
                        403,
                        serde_json::json!({"error": {"code": 403, "message": "API key not valid"}}),
                    ));
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };

                let response = if call.ends_with(":predict") {
                    predict_response(config.images)
                } else if call.ends_with(":generateContent") {
                    match generate_content_response(&parsed, config.quiz) {
                        Ok(text) => json_response(
                            200,
                            serde_json::json!({
                                "candidates": [{
                                    "content": { "role": "model", "parts": [{ "text": text }] },
                                    "finishReason": "STOP"
                                }]
                            }),
                        ),
                        Err(err) => json_response(
                            400,
                            serde_json::json!({"error": {"code": 400, "message": format!("{err:#}")}}),
                        ),
                    }
                } else {
                    tiny_http::Response::from_string("unknown method").with_status_code(404)
                };
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for GeminiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn json_response(status: u16, body: Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}

fn predict_response(behavior: ImageBehavior) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    match behavior {
        ImageBehavior::Png => json_response(
            200,
            serde_json::json!({
                "predictions": [{ "bytesBase64Encoded": PNG_BASE64, "mimeType": "image/png" }]
            }),
        ),
        ImageBehavior::Empty => json_response(200, serde_json::json!({})),
        ImageBehavior::Error => json_response(
            429,
            serde_json::json!({"error": {"code": 429, "message": "quota exceeded"}}),
        ),
    }
}

fn extract_between<'a>(text: &'a str, begin: &str, end: &str) -> Option<&'a str> {
    let start = text.find(begin)? + begin.len();
    let rest = &text[start..];
    let end_rel = rest.find(end)?;
    Some(&rest[..end_rel])
}

/// Picks the canned answer from the response schema the client asked for.
fn generate_content_response(request: &Value, quiz: QuizBehavior) -> anyhow::Result<String> {
    let prompt = request
        .pointer("/contents/0/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing prompt text"))?;
    let schema = request
        .pointer("/generationConfig/responseSchema")
        .map(Value::to_string)
        .unwrap_or_default();

    if schema.contains("imagePrompt") {
        Ok(STORY_JSON.to_owned())
    } else if schema.contains("mindMapNodes") {
        translation_response(prompt)
    } else if schema.contains("correctAnswerIndex") {
        Ok(match quiz {
            QuizBehavior::Valid => QUIZ_JSON,
            QuizBehavior::Invalid => INVALID_QUIZ_JSON,
        }
        .to_owned())
    } else if let Some(question) = extract_between(prompt, "USER'S QUESTION:\n", "\n---") {
        Ok(format!("The document does not say anything about: {question}"))
    } else {
        anyhow::bail!("unknown prompt mode")
    }
}

/// Marks every translatable string while keeping speaker names and ids.
fn translation_response(prompt: &str) -> anyhow::Result<String> {
    let raw = extract_between(prompt, "Input JSON:\n---\n", "\n---")
        .ok_or_else(|| anyhow::anyhow!("missing translation input markers"))?;
    let input: Value = serde_json::from_str(raw).context("parse translation input json")?;

    let story = input
        .get("story")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing story"))?
        .lines()
        .map(|line| match line.split_once(':') {
            Some((speaker, rest)) => format!("{speaker}: [fr]{rest}"),
            None => format!("[fr] {line}"),
        })
        .collect::<Vec<_>>()
        .join("\n");
    let takeaways = input
        .get("keyTakeaways")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("missing keyTakeaways"))?
        .iter()
        .filter_map(Value::as_str)
        .map(|t| format!("[fr] {t}"))
        .collect::<Vec<_>>();
    let nodes = input
        .get("mindMapNodes")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("missing mindMapNodes"))?
        .iter()
        .map(|node| {
            serde_json::json!({
                "id": node.get("id").cloned().unwrap_or(Value::Null),
                "text": format!("[fr] {}", node.get("text").and_then(Value::as_str).unwrap_or("")),
            })
        })
        .collect::<Vec<_>>();

    Ok(serde_json::json!({
        "story": story,
        "keyTakeaways": takeaways,
        "mindMapNodes": nodes,
    })
    .to_string())
}
