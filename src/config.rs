use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::cli::ServiceArgs;
use crate::document::PdfParser;
use crate::gemini::GeminiClient;
use crate::runner::Services;

/// Checked in order; the first non-blank value wins.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

pub fn api_key_from_env() -> anyhow::Result<String> {
    api_key_from(|name| std::env::var(name).ok())
}

fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(*name))
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} is not set", API_KEY_VARS.join(" or ")))
}

pub fn validate_base_url(raw: &str) -> anyhow::Result<String> {
    let url = url::Url::parse(raw.trim()).with_context(|| format!("invalid --base-url: {raw}"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!("--base-url must be http or https (got {other})"),
    }
    Ok(url.as_str().trim_end_matches('/').to_owned())
}

pub fn services(args: &ServiceArgs) -> anyhow::Result<Services> {
    let api_key = api_key_from_env()?;
    let base_url = validate_base_url(&args.base_url)?;
    if args.timeout_secs == 0 {
        anyhow::bail!("--timeout-secs must be > 0");
    }

    tracing::debug!(
        base_url = %base_url,
        text_model = %args.text_model,
        image_model = %args.image_model,
        "configure generation service"
    );
    let client = Arc::new(GeminiClient::new(
        &base_url,
        api_key,
        Duration::from_secs(args.timeout_secs),
    )?);

    Ok(Services {
        text: client.clone(),
        images: client,
        documents: Arc::new(PdfParser),
        text_model: args.text_model.clone(),
        image_model: args.image_model.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_gemini_key_and_skips_blank_values() {
        let key = api_key_from(|name| match name {
            "GEMINI_API_KEY" => Some("  ".to_owned()),
            "API_KEY" => Some("fallback".to_owned()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "fallback");

        let key = api_key_from(|name| Some(format!("{name}-value"))).unwrap();
        assert_eq!(key, "GEMINI_API_KEY-value");
    }

    #[test]
    fn missing_key_names_both_variables() {
        let err = api_key_from(|_| None).unwrap_err().to_string();
        assert_eq!(err, "GEMINI_API_KEY or API_KEY is not set");
    }

    #[test]
    fn base_url_must_be_http() {
        assert_eq!(
            validate_base_url("http://127.0.0.1:9/v1beta/").unwrap(),
            "http://127.0.0.1:9/v1beta"
        );
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("not a url").is_err());
    }
}
