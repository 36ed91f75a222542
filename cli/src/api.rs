use crate::conversation::{ChatMessage, Conversation};
use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    model: String,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str) -> Result<Self> {
        let base_url = Url::parse(&with_trailing_slash(base_url))
            .with_context(|| format!("invalid chat endpoint URL {base_url}"))?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.map(str::to_string),
            model: model.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn complete(
        &self,
        conversation: Conversation,
        user: String,
    ) -> Result<(Conversation, String)> {
        let conversation = conversation.with_user(user);
        let url = self.base_url.join("chat/completions").context("failed to build chat URL")?;
        let body = ChatRequest { model: &self.model, messages: conversation.messages() };

        info!(model = %self.model, turns = conversation.len(), "requesting composition");
        let mut request = self.http.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("chat endpoint responded with status {status}: {detail}");
        }
        let payload: ChatResponse =
            response.json().await.context("failed to decode chat completion")?;
        let reply = first_reply(payload)?;
        debug!(chars = reply.len(), "received model reply");

        Ok((conversation.with_assistant(reply.clone()), reply))
    }
}

fn first_reply(payload: ChatResponse) -> Result<String> {
    payload
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("chat completion returned no choices"))?
        .message
        .content
        .ok_or_else(|| anyhow!("chat completion returned no content"))
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}
