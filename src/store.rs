//! Загрузка удалённой конфигурации: настройки сервиса и список AI-провайдеров.
//!
//! Ошибки не пробрасываются: настройки превращаются в `None`, провайдеры в
//! пустой список, причина уходит в лог.

use crate::api::{ApiClient, Provider, Settings};

pub async fn load_settings(api: &ApiClient) -> Option<Settings> {
    match api.settings().await {
        Ok(settings) => {
            tracing::info!(
                allowed_managers = settings.allowed_manager_ids.len(),
                "Settings loaded"
            );
            Some(settings)
        }
        Err(error) => {
            tracing::warn!(
                error = %error,
                code = error.domain_code(),
                "Settings fetch failed"
            );
            None
        }
    }
}

pub async fn load_providers(api: &ApiClient) -> Vec<Provider> {
    match api.providers().await {
        Ok(providers) => {
            tracing::info!(count = providers.len(), "Providers loaded");
            providers
        }
        Err(error) => {
            tracing::warn!(error = %error, "Providers fetch failed");
            Vec::new()
        }
    }
}
