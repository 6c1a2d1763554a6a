use std::collections::HashMap;

use super::format::error_text;
use crate::api::{ApiClient, ApiError, Provider};
use crate::shell::ShellRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderSummary {
    pub enabled: usize,
    pub ready: usize,
}

pub fn summarize(providers: &[Provider]) -> ProviderSummary {
    ProviderSummary {
        enabled: providers.iter().filter(|p| p.enabled).count(),
        ready: providers.iter().filter(|p| p.is_ready()).count(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionResult {
    Connected { models: usize },
    Failed(String),
}

/// Карточки провайдеров. Сам список принадлежит Shell; здесь только
/// результаты проверок соединения и последнее сообщение.
#[derive(Debug, Default)]
pub struct ProvidersPanel {
    tests: HashMap<String, ConnectionResult>,
    message: Option<String>,
}

impl ProvidersPanel {
    fn settle(&mut self, provider: &str, result: Result<(), ApiError>) -> ShellRequest {
        match result {
            Ok(()) => self.message = None,
            Err(error) => {
                tracing::warn!(provider, error = %error, "Provider update failed");
                self.message = Some(error_text(&error));
            }
        }
        ShellRequest::RefreshAll
    }

    pub async fn toggle(&mut self, api: &ApiClient, provider: &Provider) -> ShellRequest {
        let enabled = !provider.enabled;
        tracing::info!(provider = %provider.name, enabled, "Toggling provider");
        let result = api.set_provider_enabled(&provider.name, enabled).await;
        self.settle(&provider.name, result)
    }

    pub async fn add_key(
        &mut self,
        api: &ApiClient,
        provider: &str,
        key: &str,
    ) -> Option<ShellRequest> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        let result = api.add_provider_key(provider, key).await;
        Some(self.settle(provider, result))
    }

    pub async fn remove_key(&mut self, api: &ApiClient, provider: &str, index: usize) -> ShellRequest {
        let result = api.remove_provider_key(provider, index).await;
        self.settle(provider, result)
    }

    /// Проверка соединения подгружает список моделей; при успехе перечитываем
    /// провайдеров.
    pub async fn test_connection(&mut self, api: &ApiClient, provider: &str) -> Option<ShellRequest> {
        let (result, refresh) = match api.test_connection(provider).await {
            Ok(test) => {
                tracing::info!(provider, models = test.models.len(), "Connection test passed");
                (
                    ConnectionResult::Connected {
                        models: test.models.len(),
                    },
                    Some(ShellRequest::RefreshProviders),
                )
            }
            Err(error) => {
                tracing::info!(provider, error = %error, "Connection test failed");
                (ConnectionResult::Failed(error_text(&error)), None)
            }
        };
        self.tests.insert(provider.to_string(), result);
        refresh
    }

    pub async fn set_model(&mut self, api: &ApiClient, provider: &str, model: &str) -> ShellRequest {
        let result = api.set_model(provider, model.trim()).await;
        self.settle(provider, result)
    }

    pub async fn set_active(&mut self, api: &ApiClient, provider: &str) -> ShellRequest {
        let result = api.set_active_provider(provider).await;
        self.settle(provider, result)
    }

    pub fn render(&self, providers: &[Provider], active: Option<&str>) -> String {
        let summary = summarize(providers);
        let mut out = format!(
            "AI Провайдеры: {} вкл, {} готовых\n",
            summary.enabled, summary.ready
        );
        if let Some(message) = &self.message {
            out.push_str(&format!("❗ {}\n", message));
        }
        if providers.is_empty() {
            out.push_str("Список провайдеров пуст.\n");
            return out;
        }

        for provider in providers {
            let is_active = active == Some(provider.name.as_str());
            out.push_str(&format!(
                "\n{} {}{} [{}]\n",
                if provider.enabled { "●" } else { "○" },
                provider.title(),
                if is_active { " (Active)" } else { "" },
                status_badge(provider),
            ));
            out.push_str(&format!(
                "  Ключей: {} | Модель: {}\n",
                provider.keys_count,
                if provider.models.is_empty() {
                    "нет моделей"
                } else {
                    provider.selected_model.as_deref().unwrap_or("выберите модель")
                }
            ));
            for (i, key) in provider.api_keys_masked.iter().enumerate() {
                let mark = if i == provider.active_key_index { " ✓" } else { "" };
                out.push_str(&format!("    {}. {}{}\n", i, key, mark));
            }
            if !provider.models.is_empty() {
                out.push_str(&format!(
                    "  Доступно моделей: {} ({})\n",
                    provider.models.len(),
                    provider.models.join(", ")
                ));
            }
            match self.tests.get(&provider.name) {
                Some(ConnectionResult::Connected { models }) => {
                    out.push_str(&format!("  ✅ Соединение установлено, моделей: {}\n", models));
                }
                Some(ConnectionResult::Failed(reason)) => {
                    out.push_str(&format!("  ❌ Ошибка соединения: {}\n", reason));
                }
                None => {}
            }
        }
        out
    }
}

fn status_badge(provider: &Provider) -> &'static str {
    if provider.is_ready() {
        "Готов"
    } else if provider.keys_count == 0 {
        "Нужен ключ"
    } else if provider.models.is_empty() {
        "Проверьте соединение"
    } else {
        "Выключен"
    }
}
