use mnemo_core::MnemoError;

use crate::MediatorConfig;

/// Batched embedding call against an Ollama-compatible `/api/embed` endpoint.
pub(crate) async fn embed_http(
    client: &reqwest::Client,
    config: &MediatorConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, MnemoError> {
    let url = format!("{}/api/embed", config.base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "model": config.embed_model,
        "input": texts,
    });

    let response = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|err| MnemoError::UpstreamTransient(err.to_string()))?;

    if !response.status().is_success() {
        return Err(MnemoError::UpstreamTransient(format!(
            "embed endpoint returned {}",
            response.status()
        )));
    }

    let parsed: serde_json::Value = response
        .json()
        .await
        .map_err(|err| MnemoError::UpstreamMalformed(err.to_string()))?;

    let embeddings = parsed
        .get("embeddings")
        .and_then(|v| v.as_array())
        .ok_or_else(|| MnemoError::UpstreamMalformed("missing 'embeddings' array".to_string()))?;

    embeddings
        .iter()
        .map(|vec| {
            vec.as_array()
                .ok_or_else(|| MnemoError::UpstreamMalformed("embedding entry not an array".to_string()))
                .map(|arr| arr.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect())
        })
        .collect()
}

/// Chat call against an Ollama-compatible `/api/chat` endpoint, requesting
/// JSON-formatted output and parsing the assistant message's content.
pub(crate) async fn chat_http(
    client: &reqwest::Client,
    config: &MediatorConfig,
    system: &str,
    user: &str,
) -> Result<serde_json::Value, MnemoError> {
    let url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "model": config.chat_model,
        "stream": false,
        "format": "json",
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ],
    });

    let response = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|err| MnemoError::UpstreamTransient(err.to_string()))?;

    if !response.status().is_success() {
        return Err(MnemoError::UpstreamTransient(format!(
            "chat endpoint returned {}",
            response.status()
        )));
    }

    let parsed: serde_json::Value = response
        .json()
        .await
        .map_err(|err| MnemoError::UpstreamMalformed(err.to_string()))?;

    let content = parsed
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| MnemoError::UpstreamMalformed("missing message.content".to_string()))?;

    serde_json::from_str(content)
        .map_err(|err| MnemoError::UpstreamMalformed(format!("non-JSON chat content: {err}")))
}
