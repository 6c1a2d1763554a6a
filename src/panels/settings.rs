use super::format::{NETWORK_ERROR, error_text};
use crate::api::{ApiClient, ApiError, Settings, SettingsUpdate};
use crate::shell::ShellRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ServiceName,
    MainBotUsername,
    AllowedManagerIds,
    SupportGroupId,
    MiniAppDomain,
    BotToken,
    RemnawaveApiUrl,
    RemnawaveApiToken,
    BedolagaWebhookUrl,
    BedolagaWebApiToken,
    SystemPrompt,
}

impl SettingsField {
    pub const ALL: [SettingsField; 11] = [
        SettingsField::ServiceName,
        SettingsField::MainBotUsername,
        SettingsField::AllowedManagerIds,
        SettingsField::SupportGroupId,
        SettingsField::MiniAppDomain,
        SettingsField::BotToken,
        SettingsField::RemnawaveApiUrl,
        SettingsField::RemnawaveApiToken,
        SettingsField::BedolagaWebhookUrl,
        SettingsField::BedolagaWebApiToken,
        SettingsField::SystemPrompt,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SettingsField::ServiceName => "service_name",
            SettingsField::MainBotUsername => "main_bot_username",
            SettingsField::AllowedManagerIds => "allowed_manager_ids",
            SettingsField::SupportGroupId => "support_group_id",
            SettingsField::MiniAppDomain => "mini_app_domain",
            SettingsField::BotToken => "bot_token",
            SettingsField::RemnawaveApiUrl => "remnawave_api_url",
            SettingsField::RemnawaveApiToken => "remnawave_api_token",
            SettingsField::BedolagaWebhookUrl => "bedolaga_webhook_url",
            SettingsField::BedolagaWebApiToken => "bedolaga_web_api_token",
            SettingsField::SystemPrompt => "system_prompt_override",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SettingsField::ServiceName => "Название сервиса",
            SettingsField::MainBotUsername => "Username основного бота",
            SettingsField::AllowedManagerIds => "ID менеджеров (через запятую)",
            SettingsField::SupportGroupId => "ID группы поддержки",
            SettingsField::MiniAppDomain => "Домен Mini App",
            SettingsField::BotToken => "Bot Token",
            SettingsField::RemnawaveApiUrl => "Remnawave API URL",
            SettingsField::RemnawaveApiToken => "Remnawave API Token",
            SettingsField::BedolagaWebhookUrl => "Bedolaga WEBHOOK_URL",
            SettingsField::BedolagaWebApiToken => "Bedolaga WEB_API_DEFAULT_TOKEN",
            SettingsField::SystemPrompt => "Системный промпт AI",
        }
    }

    fn secret(self) -> bool {
        matches!(
            self,
            SettingsField::BotToken
                | SettingsField::RemnawaveApiToken
                | SettingsField::BedolagaWebApiToken
        )
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|field| field.key() == raw)
    }
}

/// Форма настроек: все поля хранятся строками, как их ввёл менеджер.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsForm {
    pub service_name: String,
    pub main_bot_username: String,
    pub allowed_manager_ids: String,
    pub support_group_id: String,
    pub mini_app_domain: String,
    pub bot_token: String,
    pub remnawave_api_url: String,
    pub remnawave_api_token: String,
    pub bedolaga_webhook_url: String,
    pub bedolaga_web_api_token: String,
    pub system_prompt_override: String,
}

impl SettingsForm {
    pub fn from_settings(settings: Option<&Settings>) -> Self {
        let Some(settings) = settings else {
            return Self::default();
        };
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        // Бэкенд при первом запуске кладёт Bedolaga под старыми ключами.
        let with_legacy = |value: &Option<String>, legacy: &str| {
            value
                .as_deref()
                .filter(|value| !value.is_empty())
                .or_else(|| settings.extra_text(legacy))
                .unwrap_or_default()
                .to_string()
        };
        Self {
            service_name: text(&settings.service_name),
            main_bot_username: text(&settings.main_bot_username),
            allowed_manager_ids: settings
                .allowed_manager_ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            support_group_id: settings
                .support_group_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            mini_app_domain: text(&settings.mini_app_domain),
            bot_token: text(&settings.bot_token),
            remnawave_api_url: text(&settings.remnawave_api_url),
            remnawave_api_token: text(&settings.remnawave_api_token),
            bedolaga_webhook_url: with_legacy(&settings.bedolaga_webhook_url, "bedolaga_api_url"),
            bedolaga_web_api_token: with_legacy(
                &settings.bedolaga_web_api_token,
                "bedolaga_api_token",
            ),
            system_prompt_override: text(&settings.system_prompt_override),
        }
    }

    pub fn get(&self, field: SettingsField) -> &str {
        match field {
            SettingsField::ServiceName => &self.service_name,
            SettingsField::MainBotUsername => &self.main_bot_username,
            SettingsField::AllowedManagerIds => &self.allowed_manager_ids,
            SettingsField::SupportGroupId => &self.support_group_id,
            SettingsField::MiniAppDomain => &self.mini_app_domain,
            SettingsField::BotToken => &self.bot_token,
            SettingsField::RemnawaveApiUrl => &self.remnawave_api_url,
            SettingsField::RemnawaveApiToken => &self.remnawave_api_token,
            SettingsField::BedolagaWebhookUrl => &self.bedolaga_webhook_url,
            SettingsField::BedolagaWebApiToken => &self.bedolaga_web_api_token,
            SettingsField::SystemPrompt => &self.system_prompt_override,
        }
    }

    pub fn set(&mut self, field: SettingsField, value: &str) {
        let slot = match field {
            SettingsField::ServiceName => &mut self.service_name,
            SettingsField::MainBotUsername => &mut self.main_bot_username,
            SettingsField::AllowedManagerIds => &mut self.allowed_manager_ids,
            SettingsField::SupportGroupId => &mut self.support_group_id,
            SettingsField::MiniAppDomain => &mut self.mini_app_domain,
            SettingsField::BotToken => &mut self.bot_token,
            SettingsField::RemnawaveApiUrl => &mut self.remnawave_api_url,
            SettingsField::RemnawaveApiToken => &mut self.remnawave_api_token,
            SettingsField::BedolagaWebhookUrl => &mut self.bedolaga_webhook_url,
            SettingsField::BedolagaWebApiToken => &mut self.bedolaga_web_api_token,
            SettingsField::SystemPrompt => &mut self.system_prompt_override,
        };
        *slot = value.to_string();
    }

    pub fn to_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            service_name: self.service_name.clone(),
            main_bot_username: self.main_bot_username.clone(),
            bot_token: self.bot_token.clone(),
            remnawave_api_url: self.remnawave_api_url.clone(),
            remnawave_api_token: self.remnawave_api_token.clone(),
            allowed_manager_ids: parse_manager_ids(&self.allowed_manager_ids),
            support_group_id: parse_group_id(&self.support_group_id),
            mini_app_domain: self.mini_app_domain.clone(),
            bedolaga_webhook_url: self.bedolaga_webhook_url.clone(),
            bedolaga_web_api_token: self.bedolaga_web_api_token.clone(),
            system_prompt_override: self.system_prompt_override.clone(),
        }
    }
}

/// Список через запятую; всё, что не число, отбрасывается.
pub fn parse_manager_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

pub fn parse_group_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

#[derive(Debug, Default)]
pub struct SettingsPanel {
    form: SettingsForm,
    message: Option<String>,
}

impl SettingsPanel {
    pub fn new(settings: Option<&Settings>) -> Self {
        Self {
            form: SettingsForm::from_settings(settings),
            message: None,
        }
    }

    pub fn set(&mut self, field: SettingsField, value: &str) {
        self.form.set(field, value);
    }

    /// Отправляет только поля формы.
    pub async fn save(&mut self, api: &ApiClient) -> Option<ShellRequest> {
        let payload = self.form.to_update();
        match api.update_settings(&payload).await {
            Ok(()) => {
                tracing::info!(
                    managers = payload.allowed_manager_ids.len(),
                    "Settings saved"
                );
                self.message = Some("Настройки сохранены".to_string());
                Some(ShellRequest::RefreshSettings)
            }
            Err(ApiError::Domain { code }) => {
                tracing::warn!(code = %code, "Settings rejected");
                self.message = Some(format!("Ошибка: {}", code));
                None
            }
            Err(error) => {
                tracing::warn!(error = %error, "Settings save failed");
                self.message = Some(NETWORK_ERROR.to_string());
                None
            }
        }
    }

    /// Подставляет стоковый промпт в форму; сохранять нужно отдельно.
    pub async fn load_stock_prompt(&mut self, api: &ApiClient) {
        match api.stock_prompt().await {
            Ok(stock) if !stock.prompt.is_empty() => {
                self.form.system_prompt_override = stock.prompt;
                self.message = Some("Стоковый промпт загружен. Не забудьте сохранить!".to_string());
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(error = %error, "Stock prompt fetch failed");
                self.message = Some(match error {
                    ApiError::Domain { .. } => error_text(&error),
                    _ => "Ошибка загрузки промпта".to_string(),
                });
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Конфигурация бота и API\n");
        if let Some(message) = &self.message {
            out.push_str(&format!("ℹ️ {}\n", message));
        }
        for field in SettingsField::ALL {
            let value = self.form.get(field);
            let shown = if field.secret() && !value.is_empty() {
                mask(value)
            } else if field == SettingsField::SystemPrompt {
                format!("{} символов", value.chars().count())
            } else {
                value.to_string()
            };
            out.push_str(&format!("  {} [{}]: {}\n", field.label(), field.key(), shown));
        }
        out
    }
}

fn mask(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("••••{}", tail)
}
