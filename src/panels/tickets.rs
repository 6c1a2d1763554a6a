use super::format::{NETWORK_ERROR, data_row, error_text, format_bytes, format_date, or_dash};
use crate::api::{ActionTarget, ApiClient, ApiError, RemnaUser, Ticket, TicketStatus, UserAction};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TicketFilter {
    #[default]
    All,
    Escalated,
    Suspicious,
}

impl TicketFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "all" => Some(TicketFilter::All),
            "escalated" => Some(TicketFilter::Escalated),
            "suspicious" => Some(TicketFilter::Suspicious),
            _ => None,
        }
    }

    pub fn matches(self, ticket: &Ticket) -> bool {
        match self {
            TicketFilter::All => true,
            TicketFilter::Escalated => ticket.status == TicketStatus::Escalated,
            TicketFilter::Suspicious => ticket.status == TicketStatus::Suspicious,
        }
    }

    fn empty_text(self) -> &'static str {
        match self {
            TicketFilter::All => "Нет активных тикетов",
            TicketFilter::Escalated => "Нет эскалированных тикетов",
            TicketFilter::Suspicious => "Нет подозрительных пользователей",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketCounts {
    pub all: usize,
    pub escalated: usize,
    pub suspicious: usize,
}

/// Вкладка тикетов. Список периодически перечитывается консолью; неудачный
/// опрос оставляет предыдущий список.
#[derive(Debug, Default)]
pub struct TicketsPanel {
    tickets: Vec<Ticket>,
    filter: TicketFilter,
    selected: Option<String>,
    message: Option<String>,
}

impl TicketsPanel {
    pub async fn refresh(&mut self, api: &ApiClient) -> bool {
        match api.active_tickets().await {
            Ok(tickets) => {
                tracing::debug!(count = tickets.len(), "Tickets refreshed");
                self.tickets = tickets;
                true
            }
            Err(error) => {
                tracing::warn!(error = %error, "Tickets fetch failed");
                false
            }
        }
    }

    pub fn set_filter(&mut self, filter: TicketFilter) {
        self.filter = filter;
    }

    pub fn filtered(&self) -> Vec<&Ticket> {
        self.tickets
            .iter()
            .filter(|ticket| self.filter.matches(ticket))
            .collect()
    }

    pub fn counts(&self) -> TicketCounts {
        TicketCounts {
            all: self.tickets.len(),
            escalated: self
                .tickets
                .iter()
                .filter(|t| t.status == TicketStatus::Escalated)
                .count(),
            suspicious: self
                .tickets
                .iter()
                .filter(|t| t.status == TicketStatus::Suspicious)
                .count(),
        }
    }

    /// Раскрыть тикет; повторный выбор сворачивает.
    pub fn select(&mut self, ticket_id: &str) {
        if self.selected.as_deref() == Some(ticket_id) {
            self.selected = None;
        } else {
            self.selected = Some(ticket_id.to_string());
        }
    }

    pub async fn reply(
        &mut self,
        api: &ApiClient,
        ticket_id: &str,
        text: &str,
        manager_name: &str,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match api.reply_ticket(ticket_id, text, manager_name).await {
            Ok(()) => {
                tracing::info!(ticket_id, "Reply sent");
                self.message = Some("Ответ отправлен клиенту в Telegram".to_string());
                self.refresh(api).await;
            }
            Err(ApiError::Domain { code }) => {
                self.message = Some(if code == "unknown" {
                    "Ошибка отправки".to_string()
                } else {
                    code
                });
            }
            Err(error) => {
                tracing::warn!(ticket_id, error = %error, "Reply failed");
                self.message = Some(error_text(&error));
            }
        }
    }

    /// Действие над клиентом тикета. Удаление одного HWID отсюда недоступно:
    /// у тикета нет списка устройств.
    pub async fn perform(&mut self, api: &ApiClient, ticket_id: &str, action: UserAction) {
        if action == UserAction::HwidDelete {
            self.message = Some("Действие недоступно для тикета".to_string());
            return;
        }
        let Some(uuid) = self
            .tickets
            .iter()
            .find(|ticket| ticket.id == ticket_id)
            .and_then(Ticket::user)
            .map(|user| user.uuid.clone())
        else {
            self.message = Some("У тикета нет данных пользователя".to_string());
            return;
        };

        let target = ActionTarget {
            user_uuid: uuid,
            hwid: None,
        };
        match api.perform_action(action, &target).await {
            Ok(outcome) => {
                tracing::info!(
                    ticket_id,
                    action = action.path(),
                    ok = outcome.ok,
                    "Ticket user action performed"
                );
                let fallback = if outcome.ok { "Готово" } else { "Ошибка" };
                self.message = Some(outcome.message.unwrap_or_else(|| fallback.to_string()));
                if outcome.ok {
                    self.refresh(api).await;
                }
            }
            Err(error) => {
                tracing::warn!(
                    ticket_id,
                    action = action.path(),
                    error = %error,
                    "Ticket user action failed"
                );
                self.message = Some(NETWORK_ERROR.to_string());
            }
        }
    }

    pub async fn close(&mut self, api: &ApiClient, ticket_id: &str) {
        self.finish(api, ticket_id, "Тикет закрыт", api.close_ticket(ticket_id).await)
            .await;
    }

    pub async fn remove(&mut self, api: &ApiClient, ticket_id: &str) {
        self.finish(api, ticket_id, "Тикет удалён", api.remove_ticket(ticket_id).await)
            .await;
    }

    async fn finish(
        &mut self,
        api: &ApiClient,
        ticket_id: &str,
        done: &str,
        result: Result<(), ApiError>,
    ) {
        match result {
            Ok(()) => {
                tracing::info!(ticket_id, done, "Ticket updated");
                self.message = Some(done.to_string());
                self.selected = None;
            }
            Err(error) => {
                tracing::warn!(ticket_id, error = %error, "Ticket update failed");
                self.message = Some(error_text(&error));
            }
        }
        self.refresh(api).await;
    }

    pub fn render(&self) -> String {
        let counts = self.counts();
        let mut out = format!(
            "Фильтр: {}все ({}) | {}🔥 эскалация ({}) | {}🚨 подозрительные ({})\n",
            marker(self.filter == TicketFilter::All),
            counts.all,
            marker(self.filter == TicketFilter::Escalated),
            counts.escalated,
            marker(self.filter == TicketFilter::Suspicious),
            counts.suspicious,
        );
        if let Some(message) = &self.message {
            out.push_str(&format!("ℹ️ {}\n", message));
        }

        let tickets = self.filtered();
        if tickets.is_empty() {
            out.push_str(self.filter.empty_text());
            out.push('\n');
            return out;
        }

        for ticket in tickets {
            let suspicious = ticket.status == TicketStatus::Suspicious;
            out.push_str(&format!(
                "\n#{} {}{} | @{} • ID: {} | {} | {}\n",
                ticket.id,
                ticket.client_label(),
                if suspicious { " [НЕТ В СИСТЕМЕ]" } else { "" },
                or_dash(ticket.client_username.as_deref()),
                ticket
                    .client_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "—".to_string()),
                ticket.status.badge(),
                format_date(ticket.escalated_at.as_deref().or(ticket.created_at.as_deref())),
            ));

            if self.selected.as_deref() != Some(ticket.id.as_str()) {
                continue;
            }
            if suspicious {
                out.push_str(
                    "  ⚠️ Пользователь не найден в панели Remnawave. \
                     Возможно мошенник или использует чужую подписку.\n",
                );
            } else {
                out.push_str(&format!(
                    "  Причина эскалации: {}\n",
                    ticket
                        .reason
                        .as_deref()
                        .unwrap_or("Пользователь запросил менеджера")
                ));
                if let Some(user) = ticket.user() {
                    out.push_str(&render_user(user));
                }
            }
            let conversation = ticket.conversation();
            if !conversation.is_empty() {
                out.push_str(&format!("  💬 Переписка ({} сообщений)\n", conversation.len()));
                let skip = conversation.len().saturating_sub(15);
                for message in &conversation[skip..] {
                    let who = match message.role.as_str() {
                        "user" => "👤 Клиент".to_string(),
                        "manager" => format!(
                            "👨‍💼 {}",
                            message.name.as_deref().unwrap_or("Менеджер")
                        ),
                        _ => "🤖 AI".to_string(),
                    };
                    out.push_str(&format!("    {}: {}\n", who, message.content));
                }
            }
        }
        out
    }
}

fn render_user(user: &RemnaUser) -> String {
    let mut out = String::from("  Данные пользователя\n");
    out.push_str(&data_row("UUID", &user.uuid));
    out.push_str(&data_row(
        "Username",
        user.username
            .as_deref()
            .map(|name| format!("@{}", name))
            .unwrap_or_else(|| "—".to_string()),
    ));
    out.push_str(&data_row("Статус", or_dash(user.status.as_deref())));
    out.push_str(&data_row("Истекает", format_date(user.expire_at.as_deref())));
    if let Some(traffic) = &user.user_traffic {
        out.push_str(&data_row(
            "Трафик",
            format!(
                "{} / {}",
                format_bytes(traffic.used_traffic_bytes.unwrap_or_default()),
                match user.traffic_limit_bytes {
                    Some(limit) if limit > 0 => format_bytes(limit),
                    _ => "∞".to_string(),
                }
            ),
        ));
    }
    out.push_str(&format!(
        "  Действия: reset-traffic, revoke-subscription, hwid-delete-all, {}\n",
        if user.is_disabled() { "enable-user" } else { "disable-user" }
    ));
    out
}

fn marker(active: bool) -> &'static str {
    if active { "▶" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;

    fn ticket(id: &str, status: TicketStatus) -> Ticket {
        Ticket {
            id: id.to_string(),
            status,
            ..Ticket::default()
        }
    }

    fn panel_with_tickets() -> TicketsPanel {
        TicketsPanel {
            tickets: vec![
                ticket("a", TicketStatus::Suspicious),
                ticket("b", TicketStatus::Escalated),
                ticket("c", TicketStatus::Escalated),
                ticket("d", TicketStatus::Open),
            ],
            ..TicketsPanel::default()
        }
    }

    #[test]
    fn filters_and_counts() {
        let mut panel = panel_with_tickets();
        assert_eq!(
            panel.counts(),
            TicketCounts {
                all: 4,
                escalated: 2,
                suspicious: 1,
            }
        );
        assert_eq!(panel.filtered().len(), 4);

        panel.set_filter(TicketFilter::Escalated);
        let ids: Vec<&str> = panel.filtered().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        panel.set_filter(TicketFilter::Suspicious);
        let ids: Vec<&str> = panel.filtered().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn selecting_twice_collapses() {
        let mut panel = panel_with_tickets();
        panel.select("b");
        assert!(panel.render().contains("Причина эскалации"));
        panel.select("b");
        assert!(!panel.render().contains("Причина эскалации"));
    }

    #[test]
    fn empty_filter_text() {
        let mut panel = TicketsPanel::default();
        panel.set_filter(TicketFilter::Suspicious);
        assert!(panel.render().contains("Нет подозрительных пользователей"));
    }

    #[tokio::test]
    async fn failed_poll_keeps_previous_list() {
        let api = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = panel_with_tickets();
        assert!(!panel.refresh(&api).await);
        assert_eq!(panel.tickets.len(), 4);
    }

    #[tokio::test]
    async fn blank_reply_is_not_sent() {
        // Отправка на недоступный адрес оставила бы сообщение об ошибке сети.
        let api = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = panel_with_tickets();
        panel.reply(&api, "b", "   ", "Менеджер").await;
        assert!(panel.message.as_deref().is_none());
    }

    #[tokio::test]
    async fn reply_is_sent_and_list_refreshed() {
        let server = MockServer::start_async().await;
        let reply = server.mock(|when, then| {
            when.method(POST)
                .path("/api/tickets/b/reply")
                .json_body(json!({ "message": "Здравствуйте", "manager_name": "Анна" }));
            then.status(200).json_body(json!({ "ok": true }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/tickets/active");
            then.status(200)
                .json_body(json!({ "tickets": [{ "id": "b", "status": "escalated" }] }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = panel_with_tickets();
        panel.reply(&api, "b", " Здравствуйте ", "Анна").await;
        reply.assert();
        assert_eq!(panel.message.as_deref(), Some("Ответ отправлен клиенту в Telegram"));
        assert_eq!(panel.tickets.len(), 1);
    }

    #[tokio::test]
    async fn close_reports_and_clears_selection() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/tickets/b/close");
            then.status(200).json_body(json!({ "ok": true }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/tickets/active");
            then.status(200).json_body(json!({ "tickets": [] }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = panel_with_tickets();
        panel.select("b");
        panel.close(&api, "b").await;
        assert_eq!(panel.message.as_deref(), Some("Тикет закрыт"));
        assert!(panel.selected.is_none());
        assert!(panel.tickets.is_empty());
    }

    fn ticket_with_user(id: &str, status: &str) -> Ticket {
        serde_json::from_value(json!({
            "id": id,
            "status": "escalated",
            "user_data": { "user": { "uuid": "u-1", "username": "client", "status": status } }
        }))
        .expect("ticket")
    }

    #[test]
    fn user_actions_follow_account_status() {
        let mut panel = TicketsPanel {
            tickets: vec![ticket_with_user("b", "DISABLED")],
            ..TicketsPanel::default()
        };
        panel.select("b");
        let rendered = panel.render();
        assert!(rendered.contains("@client"), "{rendered}");
        assert!(rendered.contains("enable-user"), "{rendered}");

        panel.tickets = vec![ticket_with_user("b", "ACTIVE")];
        assert!(panel.render().contains("disable-user"));
    }

    #[tokio::test]
    async fn action_needs_user_data() {
        let api = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = panel_with_tickets();
        panel.perform(&api, "b", UserAction::ResetTraffic).await;
        assert_eq!(panel.message.as_deref(), Some("У тикета нет данных пользователя"));
    }

    #[tokio::test]
    async fn action_on_ticket_user_refreshes_list() {
        let server = MockServer::start_async().await;
        let action = server.mock(|when, then| {
            when.method(POST)
                .path("/api/actions/disable-user")
                .json_body(json!({ "userUuid": "u-1" }));
            then.status(200).json_body(json!({ "ok": true }));
        });
        let tickets = server.mock(|when, then| {
            when.method(GET).path("/api/tickets/active");
            then.status(200).json_body(json!({ "tickets": [] }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = TicketsPanel {
            tickets: vec![ticket_with_user("b", "ACTIVE")],
            ..TicketsPanel::default()
        };
        panel.perform(&api, "b", UserAction::DisableUser).await;
        action.assert();
        tickets.assert();
        assert_eq!(panel.message.as_deref(), Some("Готово"));
        assert!(panel.tickets.is_empty());
    }

    #[tokio::test]
    async fn failed_action_shows_backend_message_and_keeps_list() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/actions/reset-traffic");
            then.status(200)
                .json_body(json!({ "ok": false, "message": "HTTP 500" }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = TicketsPanel {
            tickets: vec![ticket_with_user("b", "ACTIVE")],
            ..TicketsPanel::default()
        };
        panel.perform(&api, "b", UserAction::ResetTraffic).await;
        assert_eq!(panel.message.as_deref(), Some("HTTP 500"));
        assert_eq!(panel.tickets.len(), 1);
    }
}
