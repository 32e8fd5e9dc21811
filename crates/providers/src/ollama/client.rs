use crate::ollama::config::{normalize_base_url, OllamaConfig};
use crate::ollama::decode::decode_ndjson;
use crate::ollama::error::{map_body_err, map_reqwest_err, map_status_err};
use crate::ollama::exchange::ChatExchange;
use crate::ollama::wire::{build_chat_request, ChatRequest, TagsResponse};
use olama_core::{
    ChatStream, ErrorKind, ExchangeHandle, Message, ModelClient, ModelDescriptor, OllamaError,
};
use reqwest::{header, Client};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pooled HTTP access to one Ollama server. Cloning shares the pool.
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    cfg: OllamaConfig,
}

impl OllamaClient {
    pub fn new(cfg: OllamaConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .connect_timeout(cfg.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .build()?;
        Ok(Self { http, cfg })
    }

    pub fn base_url(&self) -> &str {
        &self.cfg.base_url
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.cfg
    }

    pub fn set_base_url(&mut self, raw: &str) -> anyhow::Result<()> {
        self.cfg.base_url = normalize_base_url(raw)?;
        info!(target:"providers::ollama","base url set to {}", self.cfg.base_url);
        Ok(())
    }

    /// Prepares an exchange without starting it.
    pub fn exchange(&self, model: &str, history: &[Message]) -> ChatExchange {
        ChatExchange::new(
            self.http.clone(),
            &self.cfg.base_url,
            build_chat_request(model, history),
            self.cfg.chat_timeout,
        )
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.cfg.base_url)
    }
}

#[allow(async_fn_in_trait)]
impl ModelClient for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, OllamaError> {
        let url = self.tags_url();
        debug!(target:"providers::ollama","list models url={}", url);
        let resp = self
            .http
            .get(&url)
            .timeout(self.cfg.models_timeout)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        let status = resp.status();
        if !status.is_success() {
            error!(target:"providers::ollama","list models non-200 status={}", status);
            return Err(OllamaError::new(
                ErrorKind::ServerError,
                format!("Failed to fetch models. Status: {}", status.as_u16()),
            ));
        }
        let body = resp.bytes().await.map_err(map_body_err)?;
        let tags: TagsResponse = serde_json::from_slice(&body)
            .map_err(|e| OllamaError::parse("Failed to parse models response").with_cause(e))?;
        let mut models: Vec<ModelDescriptor> =
            tags.models.into_iter().map(ModelDescriptor::from).collect();
        models.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        info!(target:"providers::ollama","listed {} models", models.len());
        Ok(models)
    }

    async fn check_connection(&self) -> bool {
        let res = self
            .http
            .get(self.tags_url())
            .timeout(self.cfg.probe_timeout)
            .send()
            .await;
        match res {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(target:"providers::ollama","probe failed: {}", e);
                false
            }
        }
    }

    /// Spawns onto the ambient tokio runtime; must be called from within one.
    fn send_chat<F>(&self, model: &str, history: &[Message], on_token: F) -> ExchangeHandle
    where
        F: FnMut(&str) + Send + 'static,
    {
        let mut exchange = self.exchange(model, history);
        let cancel = exchange.cancel_token();
        let task = tokio::spawn(async move { exchange.run(on_token).await });
        ExchangeHandle::new(cancel, task)
    }

    async fn stream_chat<'a>(
        &'a self,
        model: &str,
        history: &[Message],
    ) -> Result<ChatStream<'a>, OllamaError> {
        let request = build_chat_request(model, history);
        open_chat_stream(&self.http, &self.cfg.base_url, &request, self.cfg.chat_timeout).await
    }
}

/// Sends `POST /api/chat` and, on a success status, returns the decoded body.
///
/// `timeout` bounds the wait for the response head and then each read of the
/// body separately; a long generation that keeps streaming is never cut off.
pub(crate) async fn open_chat_stream(
    http: &Client,
    base_url: &str,
    request: &ChatRequest,
    timeout: Duration,
) -> Result<ChatStream<'static>, OllamaError> {
    let url = format!("{}/api/chat", base_url);
    info!(target:"providers::ollama","start chat stream model={} url={}", request.model, url);
    let send = http
        .post(&url)
        .header(header::CONTENT_TYPE, "application/json")
        .json(request)
        .send();
    let resp = match tokio::time::timeout(timeout, send).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            let err = map_reqwest_err(e);
            warn!(target:"providers::ollama","chat request failed kind={} cause={:?}", err.kind, err.cause);
            return Err(err);
        }
        Err(_) => {
            warn!(target:"providers::ollama","no response head within {:?}", timeout);
            return Err(OllamaError::timeout()
                .with_cause(format!("no response within {timeout:?}")));
        }
    };
    let status = resp.status();
    if !status.is_success() {
        let body = tokio::time::timeout(timeout, resp.text())
            .await
            .ok()
            .and_then(Result::ok);
        error!(target:"providers::ollama","chat stream non-200 status={} body={:?}", status, body);
        return Err(map_status_err(status, &request.model, body));
    }
    Ok(decode_ndjson(resp.bytes_stream(), timeout))
}
