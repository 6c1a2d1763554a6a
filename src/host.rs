//! Интеграция с хостом Telegram: подписанный init data и личность менеджера.
//!
//! Личность, извлечённая здесь, используется только для UX. Подпись проверяет
//! исключительно бэкенд, которому init data уходит в каждом запросе.

use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Менеджер, как его сообщил хост. Не проверен до ответа бэкенда.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Identity {
    pub fn display_name(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{}", username);
        }
        let mut full_name = self.first_name.clone().unwrap_or_default();
        if let Some(last_name) = self.last_name.as_deref()
            && !last_name.trim().is_empty()
        {
            if !full_name.is_empty() {
                full_name.push(' ');
            }
            full_name.push_str(last_name);
        }
        if full_name.trim().is_empty() {
            format!("id {}", self.id)
        } else {
            full_name
        }
    }
}

/// Хост, внутри которого запущено приложение.
pub trait HostIntegration: Send + Sync {
    /// Рукопожатие `ready` + `expand`. Повторный вызов ничего не делает.
    fn activate(&self);
    /// Сырой init data; пустая строка, если хоста нет.
    fn payload(&self) -> &str;
    /// Оптимистично разобранный пользователь из init data.
    fn identity(&self) -> Option<Identity>;
}

/// Результат разрешения личности при старте.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub identity: Option<Identity>,
    pub payload: String,
}

impl Resolved {
    pub fn payload_present(&self) -> bool {
        !self.payload.is_empty()
    }
}

/// Хост, передавший init data строкой (через конфиг или окружение).
pub struct InitDataHost {
    raw: String,
    identity: Option<Identity>,
    activated: AtomicBool,
}

impl InitDataHost {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let identity = parse_init_data_user(&raw);
        Self {
            raw,
            identity,
            activated: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    fn is_activated(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }
}

impl HostIntegration for InitDataHost {
    fn activate(&self) {
        if self.activated.swap(true, Ordering::SeqCst) {
            tracing::debug!("Host handshake already performed");
            return;
        }
        tracing::info!(
            has_user = self.identity.is_some(),
            "Host handshake: ready, expand"
        );
    }

    fn payload(&self) -> &str {
        &self.raw
    }

    fn identity(&self) -> Option<Identity> {
        self.identity.clone()
    }
}

/// Хоста нет: режим разработчика.
pub struct NoHost;

impl HostIntegration for NoHost {
    fn activate(&self) {}

    fn payload(&self) -> &str {
        ""
    }

    fn identity(&self) -> Option<Identity> {
        None
    }
}

/// Выбирает реализацию один раз при старте.
pub fn detect(init_data: Option<&str>) -> Box<dyn HostIntegration> {
    match init_data.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Box::new(InitDataHost::new(raw)),
        None => {
            tracing::info!("No host integration detected, running in developer mode");
            Box::new(NoHost)
        }
    }
}

pub fn resolve(host: &dyn HostIntegration) -> Resolved {
    host.activate();
    Resolved {
        identity: host.identity(),
        payload: host.payload().to_string(),
    }
}

/// Достаёт поле `user` из query-строки init data.
pub fn parse_init_data_user(raw: &str) -> Option<Identity> {
    let encoded = raw
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find_map(|(key, value)| (key == "user").then_some(value))?;
    let decoded = match urlencoding::decode(&encoded.replace('+', " ")) {
        Ok(value) => value.into_owned(),
        Err(error) => {
            tracing::warn!(error = %error, "Init data user field is not valid UTF-8");
            return None;
        }
    };
    match serde_json::from_str::<Identity>(&decoded) {
        Ok(identity) => Some(identity),
        Err(error) => {
            tracing::warn!(error = %error, "Init data user field is not a valid user object");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT_DATA: &str = "query_id=AAH&user=%7B%22id%22%3A111%2C%22first_name%22%3A%22Ivan%22%2C%22username%22%3A%22ivan_support%22%7D&auth_date=1700000000&hash=deadbeef";

    #[test]
    fn parses_user_from_init_data() {
        let identity = parse_init_data_user(INIT_DATA).expect("user present");
        assert_eq!(identity.id, 111);
        assert_eq!(identity.username.as_deref(), Some("ivan_support"));
        assert_eq!(identity.display_name(), "@ivan_support");
    }

    #[test]
    fn plus_signs_decode_as_spaces() {
        let raw = "user=%7B%22id%22%3A5%2C%22first_name%22%3A%22Anna+Maria%22%7D&hash=x";
        let identity = parse_init_data_user(raw).expect("user present");
        assert_eq!(identity.first_name.as_deref(), Some("Anna Maria"));
        assert_eq!(identity.display_name(), "Anna Maria");
    }

    #[test]
    fn missing_or_broken_user_yields_none() {
        assert!(parse_init_data_user("auth_date=1&hash=abc").is_none());
        assert!(parse_init_data_user("user=%7Bnot-json&hash=abc").is_none());
        assert!(parse_init_data_user("").is_none());
    }

    #[test]
    fn handshake_is_idempotent() {
        let host = InitDataHost::new(INIT_DATA);
        assert!(!host.is_activated());
        let first = resolve(&host);
        let second = resolve(&host);
        assert!(host.is_activated());
        assert_eq!(first, second);
        assert_eq!(first.payload, INIT_DATA);
    }

    #[test]
    fn no_host_resolves_to_empty_payload() {
        let resolved = resolve(&NoHost);
        assert_eq!(
            resolved,
            Resolved {
                identity: None,
                payload: String::new(),
            }
        );
        assert!(!resolved.payload_present());
    }

    #[test]
    fn detect_treats_blank_init_data_as_absent() {
        let resolved = resolve(detect(Some("   ")).as_ref());
        assert!(!resolved.payload_present());

        let resolved = resolve(detect(Some("auth_date=1&hash=abc")).as_ref());
        assert!(resolved.payload_present());
        assert!(resolved.identity.is_none());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let identity = Identity {
            id: 42,
            username: None,
            first_name: None,
            last_name: None,
        };
        assert_eq!(identity.display_name(), "id 42");
    }
}
