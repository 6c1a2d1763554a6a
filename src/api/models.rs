//! Типы ответов и запросов бэкенда поддержки.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Значение неожиданного типа становится `None`, документ целиком не падает.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Числовой id; строка с числом тоже подходит.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    })
}

/// `null` читается как значение по умолчанию.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Настройки сервиса. Строго читается только `allowed_manager_ids`: от него
/// зависит доступ. Остальные поля терпят чужие типы, незнакомые ключи
/// остаются в `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub allowed_manager_ids: Vec<i64>,
    #[serde(deserialize_with = "lenient")]
    pub service_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub main_bot_username: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub bot_token: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub remnawave_api_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub remnawave_api_token: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub support_group_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub mini_app_domain: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub bedolaga_webhook_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub bedolaga_web_api_token: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub system_prompt_override: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub active_provider: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    pub fn allows(&self, manager_id: i64) -> bool {
        self.allowed_manager_ids.contains(&manager_id)
    }

    /// Строковое значение из незнакомых типизированной части ключей.
    pub fn extra_text(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Тело `PUT /api/settings`: только поля формы. Бэкенд применяет его как
/// частичное обновление, остальные ключи документа не трогаются.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsUpdate {
    pub service_name: String,
    pub main_bot_username: String,
    pub bot_token: String,
    pub remnawave_api_url: String,
    pub remnawave_api_token: String,
    pub allowed_manager_ids: Vec<i64>,
    pub support_group_id: Option<i64>,
    pub mini_app_domain: String,
    pub bedolaga_webhook_url: String,
    pub bedolaga_web_api_token: String,
    pub system_prompt_override: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub name: String,
    pub display_name: String,
    pub enabled: bool,
    pub keys_count: usize,
    pub models: Vec<String>,
    pub selected_model: Option<String>,
    pub active_key_index: usize,
    pub api_keys_masked: Vec<String>,
}

impl Provider {
    pub fn title(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Включён, есть ключ и хотя бы одна модель.
    pub fn is_ready(&self) -> bool {
        self.enabled && self.keys_count > 0 && !self.models.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProvidersReply {
    #[serde(default)]
    pub providers: Vec<Provider>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectionTest {
    pub models: Vec<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    #[serde(default)]
    pub needs_escalation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StockPrompt {
    pub prompt: String,
    pub variables: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub category: String,
}

impl ArticleDraft {
    pub fn new(title: &str, content: &str, category: &str) -> Self {
        let category = category.trim();
        Self {
            title: title.trim().to_string(),
            content: content.trim().to_string(),
            category: if category.is_empty() {
                "general".to_string()
            } else {
                category.to_string()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArticlesReply {
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArticleReply {
    pub article: Article,
}

/// Ответ `/api/lookup`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LookupResult {
    pub user: RemnaUser,
    #[serde(default)]
    pub subscription: Option<Subscription>,
    #[serde(default)]
    pub hwid_devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemnaUser {
    pub uuid: String,
    pub short_uuid: Option<String>,
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub telegram_id: Option<i64>,
    pub status: Option<String>,
    pub tag: Option<String>,
    pub hwid_device_limit: Option<i64>,
    pub user_traffic: Option<UserTraffic>,
    pub traffic_limit_bytes: Option<u64>,
    pub traffic_limit_strategy: Option<String>,
    pub expire_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub sub_revoked_at: Option<String>,
    pub sub_last_opened_at: Option<String>,
}

impl RemnaUser {
    pub fn is_disabled(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status.eq_ignore_ascii_case("DISABLED"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserTraffic {
    pub used_traffic_bytes: Option<u64>,
    pub lifetime_used_traffic_bytes: Option<u64>,
    pub online_at: Option<String>,
    pub first_connected_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Subscription {
    pub is_found: bool,
    pub user: Option<SubscriptionUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionUser {
    pub days_left: Option<i64>,
    pub traffic_used: Option<String>,
    pub traffic_limit: Option<String>,
    pub is_active: bool,
    pub user_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Device {
    pub hwid: String,
    pub platform: Option<String>,
    pub os_version: Option<String>,
    pub device_model: Option<String>,
    pub created_at: Option<String>,
}

/// Действие над пользователем Remnawave, `/api/actions/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    ResetTraffic,
    RevokeSubscription,
    EnableUser,
    DisableUser,
    HwidDeleteAll,
    HwidDelete,
}

impl UserAction {
    pub const ALL: [UserAction; 6] = [
        UserAction::ResetTraffic,
        UserAction::RevokeSubscription,
        UserAction::EnableUser,
        UserAction::DisableUser,
        UserAction::HwidDeleteAll,
        UserAction::HwidDelete,
    ];

    pub fn path(self) -> &'static str {
        match self {
            UserAction::ResetTraffic => "reset-traffic",
            UserAction::RevokeSubscription => "revoke-subscription",
            UserAction::EnableUser => "enable-user",
            UserAction::DisableUser => "disable-user",
            UserAction::HwidDeleteAll => "hwid-delete-all",
            UserAction::HwidDelete => "hwid-delete",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.path() == raw.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTarget {
    pub user_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hwid: Option<String>,
}

/// Действия отвечают `{ ok, message }` и при неудаче: текст показывается как есть.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActionOutcome {
    pub ok: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Open,
    Escalated,
    Suspicious,
    Closed,
}

impl TicketStatus {
    pub fn badge(self) -> &'static str {
        match self {
            TicketStatus::Open => "💬 Открыт",
            TicketStatus::Escalated => "🔥 Эскалация",
            TicketStatus::Suspicious => "🚨 Подозрительный",
            TicketStatus::Closed => "✅ Закрыт",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TicketMessage {
    pub role: String,
    pub content: String,
    pub name: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Ticket {
    pub id: String,
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub client_username: Option<String>,
    pub topic_id: Option<i64>,
    pub status: TicketStatus,
    pub reason: Option<String>,
    pub escalated_at: Option<String>,
    pub created_at: Option<String>,
    pub last_messages: Vec<TicketMessage>,
    pub history: Vec<TicketMessage>,
    /// Данные клиента из Remnawave, если бот его нашёл.
    #[serde(deserialize_with = "lenient")]
    pub user_data: Option<LookupResult>,
}

impl Ticket {
    pub fn client_label(&self) -> String {
        match self.client_name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("ID {}", self.client_id.unwrap_or_default()),
        }
    }

    /// История, если есть, иначе последние сообщения.
    pub fn conversation(&self) -> &[TicketMessage] {
        if self.history.is_empty() {
            &self.last_messages
        } else {
            &self.history
        }
    }

    /// Пользователь Remnawave с непустым uuid.
    pub fn user(&self) -> Option<&RemnaUser> {
        self.user_data
            .as_ref()
            .map(|data| &data.user)
            .filter(|user| !user.uuid.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TicketsReply {
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Balance {
    pub balance: f64,
    pub currency: Option<String>,
    pub message: Option<String>,
    pub total_deposits: Option<f64>,
    pub last_deposit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Deposit {
    #[serde(deserialize_with = "null_default")]
    pub amount: f64,
    pub currency: Option<String>,
    #[serde(rename = "type", deserialize_with = "null_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub method: String,
    #[serde(deserialize_with = "null_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DepositsReply {
    #[serde(default)]
    pub deposits: Vec<Deposit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedReply {
    #[serde(default)]
    pub id: String,
}
