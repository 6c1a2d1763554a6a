//! HTTP-клиент бэкенда поддержки.
//!
//! Каждый запрос несёт init data в заголовке `X-Telegram-Init-Data`, если он
//! непустой. Ответы вида `{ ok: false, error }` превращаются в
//! [`ApiError::Domain`]; коды HTTP-статусов смысла не несут.

#[path = "api/models.rs"]
mod models;

pub use models::*;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const HEADER_INIT_DATA: &str = "X-Telegram-Init-Data";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Ошибка сети: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Некорректный ответ сервера: {0}")]
    Decode(String),
    /// `ok: false` с кодом ошибки от бэкенда.
    #[error("{code}")]
    Domain { code: String },
}

impl ApiError {
    pub fn domain_code(&self) -> Option<&str> {
        match self {
            ApiError::Domain { code } => Some(code),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
    init_data: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &Url, timeout: Duration, init_data: &str) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url.as_str(), init_data))
    }

    pub fn with_client(client: Client, base_url: &str, init_data: &str) -> Self {
        Self {
            client,
            base: base_url.trim_end_matches('/').to_string(),
            init_data: Some(init_data.to_string()).filter(|raw| !raw.is_empty()),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.init_data.is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base, path))
            .header(CONTENT_TYPE, "application/json");
        match self.init_data.as_deref() {
            Some(init_data) => builder.header(HEADER_INIT_DATA, init_data),
            None => builder,
        }
    }

    async fn fetch_value(&self, builder: RequestBuilder) -> Result<Value, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        serde_json::from_slice::<Value>(&bytes).map_err(|error| {
            tracing::debug!(status = %status, error = %error, "Response body is not JSON");
            ApiError::Decode(error.to_string())
        })
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let value = check_envelope(self.fetch_value(builder).await?)?;
        serde_json::from_value(value).map_err(|error| ApiError::Decode(error.to_string()))
    }

    async fn call_unit(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        check_envelope(self.fetch_value(builder).await?).map(|_| ())
    }

    fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RequestBuilder {
        self.request(Method::POST, path).json(body)
    }

    // Настройки и провайдеры

    pub async fn settings(&self) -> Result<Settings, ApiError> {
        self.call(self.request(Method::GET, "/api/settings")).await
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<(), ApiError> {
        self.call_unit(self.request(Method::PUT, "/api/settings").json(update))
            .await
    }

    pub async fn providers(&self) -> Result<Vec<Provider>, ApiError> {
        let reply: ProvidersReply = self
            .call(self.request(Method::GET, "/api/settings/providers"))
            .await?;
        Ok(reply.providers)
    }

    pub async fn set_provider_enabled(&self, name: &str, enabled: bool) -> Result<(), ApiError> {
        let path = format!("/api/settings/providers/{}", urlencoding::encode(name));
        self.call_unit(
            self.request(Method::PUT, &path)
                .json(&json!({ "enabled": enabled })),
        )
        .await
    }

    pub async fn add_provider_key(&self, name: &str, key: &str) -> Result<(), ApiError> {
        let path = format!("/api/settings/providers/{}/keys", urlencoding::encode(name));
        self.call_unit(self.post(&path, &json!({ "key": key }))).await
    }

    pub async fn remove_provider_key(&self, name: &str, index: usize) -> Result<(), ApiError> {
        let path = format!(
            "/api/settings/providers/{}/keys/{}",
            urlencoding::encode(name),
            index
        );
        self.call_unit(self.request(Method::DELETE, &path)).await
    }

    // AI

    pub async fn test_connection(&self, provider: &str) -> Result<ConnectionTest, ApiError> {
        self.call(self.post("/api/ai/test-connection", &json!({ "provider": provider })))
            .await
    }

    pub async fn set_model(&self, provider: &str, model: &str) -> Result<(), ApiError> {
        self.call_unit(self.post(
            "/api/ai/set-model",
            &json!({ "provider": provider, "model": model }),
        ))
        .await
    }

    pub async fn set_active_provider(&self, provider: &str) -> Result<(), ApiError> {
        self.call_unit(self.post(
            "/api/ai/set-active-provider",
            &json!({ "provider": provider }),
        ))
        .await
    }

    pub async fn chat(&self, message: &str) -> Result<ChatReply, ApiError> {
        self.call(self.post("/api/ai/chat", &json!({ "message": message })))
            .await
    }

    pub async fn stock_prompt(&self) -> Result<StockPrompt, ApiError> {
        self.call(self.request(Method::GET, "/api/ai/stock-prompt"))
            .await
    }

    // База знаний

    pub async fn articles(&self) -> Result<Vec<Article>, ApiError> {
        let reply: ArticlesReply = self.call(self.request(Method::GET, "/api/knowledge")).await?;
        Ok(reply.articles)
    }

    pub async fn search_articles(&self, query: &str) -> Result<Vec<Article>, ApiError> {
        let path = format!("/api/knowledge/search/{}", urlencoding::encode(query));
        let reply: ArticlesReply = self.call(self.request(Method::GET, &path)).await?;
        Ok(reply.articles)
    }

    pub async fn article(&self, id: &str) -> Result<Article, ApiError> {
        let path = format!("/api/knowledge/{}", urlencoding::encode(id));
        let reply: ArticleReply = self.call(self.request(Method::GET, &path)).await?;
        Ok(reply.article)
    }

    /// Возвращает id созданной статьи.
    pub async fn create_article(&self, draft: &ArticleDraft) -> Result<String, ApiError> {
        let reply: CreatedReply = self.call(self.post("/api/knowledge", draft)).await?;
        Ok(reply.id)
    }

    pub async fn update_article(&self, id: &str, draft: &ArticleDraft) -> Result<(), ApiError> {
        let path = format!("/api/knowledge/{}", urlencoding::encode(id));
        self.call_unit(self.request(Method::PUT, &path).json(draft))
            .await
    }

    pub async fn delete_article(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/api/knowledge/{}", urlencoding::encode(id));
        self.call_unit(self.request(Method::DELETE, &path)).await
    }

    // Поиск пользователя и действия

    pub async fn lookup(&self, query: &str) -> Result<LookupResult, ApiError> {
        self.call(self.post("/api/lookup", &json!({ "query": query })))
            .await
    }

    /// Ответ действия не проходит через envelope: `message` показывается и при `ok: false`.
    pub async fn perform_action(
        &self,
        action: UserAction,
        target: &ActionTarget,
    ) -> Result<ActionOutcome, ApiError> {
        let path = format!("/api/actions/{}", action.path());
        let value = self.fetch_value(self.post(&path, target)).await?;
        serde_json::from_value(value).map_err(|error| ApiError::Decode(error.to_string()))
    }

    // Тикеты

    pub async fn active_tickets(&self) -> Result<Vec<Ticket>, ApiError> {
        let reply: TicketsReply = self
            .call(self.request(Method::GET, "/api/tickets/active"))
            .await?;
        Ok(reply.tickets)
    }

    pub async fn reply_ticket(
        &self,
        ticket_id: &str,
        message: &str,
        manager_name: &str,
    ) -> Result<(), ApiError> {
        let path = format!("/api/tickets/{}/reply", urlencoding::encode(ticket_id));
        self.call_unit(self.post(
            &path,
            &json!({ "message": message, "manager_name": manager_name }),
        ))
        .await
    }

    pub async fn close_ticket(&self, ticket_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/tickets/{}/close", urlencoding::encode(ticket_id));
        self.call_unit(self.request(Method::POST, &path)).await
    }

    pub async fn remove_ticket(&self, ticket_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/tickets/{}/remove", urlencoding::encode(ticket_id));
        self.call_unit(self.request(Method::POST, &path)).await
    }

    // Bedolaga

    pub async fn balance(&self, telegram_id: i64) -> Result<Balance, ApiError> {
        let path = format!("/api/bedolaga/balance/{}", telegram_id);
        self.call(self.request(Method::GET, &path)).await
    }

    pub async fn deposits(&self, telegram_id: i64) -> Result<Vec<Deposit>, ApiError> {
        let path = format!("/api/bedolaga/deposits/{}", telegram_id);
        let reply: DepositsReply = self.call(self.request(Method::GET, &path)).await?;
        Ok(reply.deposits)
    }
}

/// `ok: false`, либо `error` без `ok`, означает доменную ошибку.
pub fn check_envelope(value: Value) -> Result<Value, ApiError> {
    let failed = match value.get("ok") {
        Some(Value::Bool(false)) => true,
        None => value.get("error").is_some_and(Value::is_string),
        _ => false,
    };
    if failed {
        let code = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(ApiError::Domain { code });
    }
    Ok(value)
}
