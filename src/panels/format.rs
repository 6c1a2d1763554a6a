use crate::api::ApiError;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

pub const NETWORK_ERROR: &str = "Ошибка сети";

/// Коды ошибок бэкенда, которые показываем по-русски. Остальные как есть.
const ERROR_MESSAGES: &[(&str, &str)] = &[
    ("user_not_found", "Пользователь не найден"),
    ("remnawave_not_configured", "API Remnawave не настроен"),
    ("query_required", "Введите запрос"),
    ("provider required", "Не указан провайдер"),
    ("provider not found", "Провайдер не найден"),
    ("provider and model required", "Не указаны провайдер и модель"),
    ("key required", "Введите ключ"),
    ("invalid index", "Ключ с таким номером не найден"),
    ("nothing to update", "Нечего сохранять"),
    ("message required", "Введите сообщение"),
    ("title and content required", "Заполните заголовок и текст"),
    ("invalid_id", "Некорректный ID"),
    ("not_found", "Не найдено"),
    ("no settings", "Настройки не найдены"),
];

pub fn localize_error_code(code: &str) -> String {
    ERROR_MESSAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, message)| (*message).to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Текст для баннера ошибки: сеть и разбор ответа неотличимы для менеджера.
pub fn error_text(error: &ApiError) -> String {
    match error {
        ApiError::Domain { code } => localize_error_code(code),
        ApiError::Transport(_) | ApiError::Decode(_) => NETWORK_ERROR.to_string(),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// ISO-строка бэкенда в локальное время. Нераспознанное возвращается как есть.
pub fn format_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return "Не указано".to_string();
    };
    parse_timestamp(raw)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%d.%m.%Y %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| raw.to_string())
}

pub fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("—")
}

pub fn data_row(label: &str, value: impl std::fmt::Display) -> String {
    format!("  {}: {}\n", label, value)
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag { "Да" } else { "Нет" }
}
