use crate::api::{ApiClient, ApiError};
use chrono::Local;

pub const QUICK_QUESTIONS: [&str; 4] = [
    "Как подключить VPN?",
    "Не работает подписка",
    "Какие тарифы есть?",
    "Как сбросить устройства?",
];

const CHAT_NETWORK_ERROR: &str = "Ошибка сети. Проверьте подключение.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
    pub time: String,
    pub error: bool,
    pub escalation: bool,
}

impl ChatEntry {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            time: Local::now().format("%H:%M").to_string(),
            error: false,
            escalation: false,
        }
    }
}

/// Песочница AI-ассистента: история живёт только в памяти вкладки.
#[derive(Debug, Default)]
pub struct ChatPanel {
    history: Vec<ChatEntry>,
}

impl ChatPanel {
    /// Номер из списка быстрых вопросов (с 1).
    pub fn quick_question(index: usize) -> Option<&'static str> {
        index.checked_sub(1).and_then(|i| QUICK_QUESTIONS.get(i).copied())
    }

    pub async fn send(&mut self, api: &ApiClient, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.history
            .push(ChatEntry::new(Role::User, text.to_string()));

        let entry = match api.chat(text).await {
            Ok(reply) => {
                tracing::debug!(escalation = reply.needs_escalation, "Chat reply received");
                let mut entry = ChatEntry::new(Role::Assistant, reply.reply);
                entry.escalation = reply.needs_escalation;
                entry
            }
            Err(ApiError::Domain { code }) => {
                let reason = if code == "unknown" {
                    "Не удалось получить ответ".to_string()
                } else {
                    code
                };
                let mut entry = ChatEntry::new(Role::Assistant, format!("Ошибка: {}", reason));
                entry.error = true;
                entry
            }
            Err(error) => {
                tracing::warn!(error = %error, "Chat request failed");
                let mut entry = ChatEntry::new(Role::Assistant, CHAT_NETWORK_ERROR.to_string());
                entry.error = true;
                entry
            }
        };
        self.history.push(entry);
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Быстрые вопросы:\n");
        for (i, question) in QUICK_QUESTIONS.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, question));
        }
        out.push('\n');

        if self.history.is_empty() {
            out.push_str("Начните диалог: напишите сообщение для тестирования AI-ассистента.\n");
            return out;
        }
        for entry in &self.history {
            let who = match entry.role {
                Role::User => "👤",
                Role::Assistant if entry.error => "⚠️",
                Role::Assistant => "🤖",
            };
            out.push_str(&format!("[{}] {} {}\n", entry.time, who, entry.content));
            if entry.escalation {
                out.push_str("    (ассистент передал бы диалог менеджеру)\n");
            }
        }
        out
    }
}
