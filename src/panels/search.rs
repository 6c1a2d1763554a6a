use super::format::{
    NETWORK_ERROR, data_row, error_text, format_bytes, format_date, localize_error_code, or_dash,
    yes_no,
};
use crate::api::{
    ActionTarget, ApiClient, ApiError, Balance, Deposit, LookupResult, RemnaUser, UserAction,
};
use crate::shell::{SearchSection, SearchState};

const EMPTY_QUERY: &str = "Введите Telegram ID или @username";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceView {
    pub balance: Option<Balance>,
    pub deposits: Vec<Deposit>,
    pub error: Option<String>,
}

/// Вкладка поиска. Тройка query/result/section живёт в Shell: после каждого
/// изменения её забирают через [`SearchPanel::state`].
#[derive(Debug, Default)]
pub struct SearchPanel {
    state: SearchState,
    error: Option<String>,
    action_message: Option<String>,
    balance: Option<BalanceView>,
}

impl SearchPanel {
    pub fn new(state: SearchState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Возврат на вкладку: снимок из Shell.
    pub fn restore(&mut self, state: SearchState) {
        self.state = state;
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn balance(&self) -> Option<&BalanceView> {
        self.balance.as_ref()
    }

    pub fn set_query(&mut self, query: &str) {
        self.state.query = query.to_string();
    }

    pub async fn search(&mut self, api: &ApiClient) {
        let query = self.state.query.trim().to_string();
        if query.is_empty() {
            self.error = Some(EMPTY_QUERY.to_string());
            return;
        }
        self.error = None;
        self.action_message = None;
        self.state.result = None;
        self.balance = None;

        match api.lookup(&query).await {
            Ok(result) => {
                tracing::info!(query = %query, uuid = %result.user.uuid, "User found");
                self.state.result = Some(result);
                self.state.section = SearchSection::Profile;
            }
            Err(error) => {
                tracing::info!(query = %query, error = %error, "Lookup failed");
                self.error = Some(error_text(&error));
            }
        }
    }

    pub fn select_section(&mut self, section: SearchSection) {
        self.state.section = section;
    }

    fn user(&self) -> Option<&RemnaUser> {
        self.state.result.as_ref().map(|result| &result.user)
    }

    /// Действие над найденным пользователем; после успеха поиск повторяется.
    pub async fn perform(&mut self, api: &ApiClient, action: UserAction, hwid: Option<&str>) {
        let Some(uuid) = self
            .user()
            .map(|user| user.uuid.clone())
            .filter(|uuid| !uuid.is_empty())
        else {
            self.action_message = Some("Сначала найдите пользователя".to_string());
            return;
        };
        let hwid = hwid.map(str::trim).filter(|value| !value.is_empty());
        if action == UserAction::HwidDelete && hwid.is_none() {
            self.action_message = Some("Укажите HWID устройства".to_string());
            return;
        }

        let target = ActionTarget {
            user_uuid: uuid,
            hwid: hwid.map(str::to_string),
        };
        self.action_message = None;
        let message = match api.perform_action(action, &target).await {
            Ok(outcome) => {
                tracing::info!(
                    action = action.path(),
                    user_uuid = %target.user_uuid,
                    ok = outcome.ok,
                    "User action performed"
                );
                let message = outcome
                    .message
                    .or_else(|| outcome.error.map(|code| localize_error_code(&code)))
                    .unwrap_or_else(|| if outcome.ok { "Готово" } else { "Ошибка" }.to_string());
                if outcome.ok && !self.state.query.trim().is_empty() {
                    self.search(api).await;
                }
                message
            }
            Err(error) => {
                tracing::warn!(action = action.path(), error = %error, "User action failed");
                NETWORK_ERROR.to_string()
            }
        };
        self.action_message = Some(message);
    }

    /// Баланс и история пополнений Bedolaga, запрашиваются параллельно.
    pub async fn load_balance(&mut self, api: &ApiClient) {
        let Some(telegram_id) = self.user().and_then(|user| user.telegram_id) else {
            self.balance = Some(BalanceView {
                error: Some("Telegram ID не найден".to_string()),
                ..BalanceView::default()
            });
            return;
        };

        let (balance, deposits) = tokio::join!(api.balance(telegram_id), api.deposits(telegram_id));
        let mut view = BalanceView::default();
        match balance {
            Ok(balance) => view.balance = Some(balance),
            Err(ApiError::Domain { code }) => view.error = Some(code),
            Err(error) => {
                tracing::warn!(telegram_id, error = %error, "Balance fetch failed");
                view.error = Some(NETWORK_ERROR.to_string());
            }
        }
        match deposits {
            Ok(deposits) => view.deposits = deposits,
            Err(error) => tracing::warn!(telegram_id, error = %error, "Deposits fetch failed"),
        }
        self.balance = Some(view);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(error) = &self.error {
            out.push_str(&format!("❗ {}\n", error));
        }
        if let Some(message) = &self.action_message {
            out.push_str(&format!("ℹ️ {}\n", message));
        }

        let Some(result) = &self.state.result else {
            if self.error.is_none() {
                out.push_str("Введите Telegram ID или @username для поиска пользователя.\n");
            }
            return out;
        };

        let user = &result.user;
        out.push_str(&format!(
            "👤 {} — {}\n",
            user.username
                .as_deref()
                .map(|name| format!("@{}", name))
                .unwrap_or_else(|| or_dash(Some(user.uuid.as_str())).to_string()),
            or_dash(user.status.as_deref())
        ));
        out.push_str(&render_section_tabs(self.state.section));
        out.push_str(&match self.state.section {
            SearchSection::Profile => render_profile(user),
            SearchSection::Traffic => render_traffic(user),
            SearchSection::Dates => render_dates(user),
            SearchSection::Subscription => render_subscription(result),
            SearchSection::Hwid => render_devices(result),
            SearchSection::Balance => render_balance(self.balance.as_ref()),
        });
        out.push_str(&format!(
            "\nДействия: reset-traffic, revoke-subscription, {}, hwid-delete-all\n",
            if user.is_disabled() { "enable-user" } else { "disable-user" }
        ));
        out
    }
}

fn render_section_tabs(active: SearchSection) -> String {
    let tabs = SearchSection::ALL
        .iter()
        .map(|section| {
            if *section == active {
                format!("[{}]", section.label())
            } else {
                section.label().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" | ");
    format!("{}\n", tabs)
}

fn render_profile(user: &RemnaUser) -> String {
    let mut out = String::from("Профиль\n");
    out.push_str(&data_row("UUID", or_dash(Some(user.uuid.as_str()))));
    out.push_str(&data_row("Short UUID", or_dash(user.short_uuid.as_deref())));
    out.push_str(&data_row(
        "ID",
        user.id.map(|id| id.to_string()).unwrap_or_else(|| "—".to_string()),
    ));
    out.push_str(&data_row(
        "Username",
        user.username
            .as_deref()
            .map(|name| format!("@{}", name))
            .unwrap_or_else(|| "N/A".to_string()),
    ));
    out.push_str(&data_row("Email", or_dash(user.email.as_deref())));
    out.push_str(&data_row(
        "Telegram ID",
        user.telegram_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "—".to_string()),
    ));
    out.push_str(&data_row("Статус", or_dash(user.status.as_deref())));
    out.push_str(&data_row("Тег", user.tag.as_deref().unwrap_or("Не указан")));
    if let Some(limit) = user.hwid_device_limit {
        out.push_str(&data_row("Лимит устройств", limit));
    }
    out
}

fn render_traffic(user: &RemnaUser) -> String {
    let mut out = String::from("Трафик\n");
    let Some(traffic) = user
        .user_traffic
        .as_ref()
        .filter(|traffic| traffic.used_traffic_bytes.is_some())
    else {
        out.push_str("  Нет данных о трафике\n");
        return out;
    };
    out.push_str(&data_row(
        "Использовано",
        format_bytes(traffic.used_traffic_bytes.unwrap_or_default()),
    ));
    out.push_str(&data_row(
        "Всего за всё время",
        format_bytes(traffic.lifetime_used_traffic_bytes.unwrap_or_default()),
    ));
    out.push_str(&data_row(
        "Лимит",
        match user.traffic_limit_bytes {
            Some(limit) if limit > 0 => format_bytes(limit),
            _ => "Безлимит".to_string(),
        },
    ));
    out.push_str(&data_row(
        "Стратегия сброса",
        user.traffic_limit_strategy.as_deref().unwrap_or("NO_RESET"),
    ));
    if traffic.online_at.is_some() {
        out.push_str(&data_row("Онлайн", format_date(traffic.online_at.as_deref())));
    }
    if traffic.first_connected_at.is_some() {
        out.push_str(&data_row(
            "Первое подключение",
            format_date(traffic.first_connected_at.as_deref()),
        ));
    }
    out
}

fn render_dates(user: &RemnaUser) -> String {
    let mut out = String::from("Даты\n");
    out.push_str(&data_row("Истекает", format_date(user.expire_at.as_deref())));
    out.push_str(&data_row("Создан", format_date(user.created_at.as_deref())));
    out.push_str(&data_row("Обновлён", format_date(user.updated_at.as_deref())));
    if user.sub_revoked_at.is_some() {
        out.push_str(&data_row(
            "Подписка отозвана",
            format_date(user.sub_revoked_at.as_deref()),
        ));
    }
    if user.sub_last_opened_at.is_some() {
        out.push_str(&data_row(
            "Последнее открытие",
            format_date(user.sub_last_opened_at.as_deref()),
        ));
    }
    out
}

fn render_subscription(result: &LookupResult) -> String {
    let mut out = String::from("Подписка\n");
    let Some(subscription) = &result.subscription else {
        out.push_str("  Данные недоступны\n");
        return out;
    };
    out.push_str(&data_row("Найдена", yes_no(subscription.is_found)));
    let user = subscription.user.clone().unwrap_or_default();
    if let Some(days_left) = user.days_left {
        out.push_str(&data_row("Дней осталось", days_left));
    }
    if let Some(used) = user.traffic_used.as_deref() {
        out.push_str(&data_row("Использовано", used));
    }
    if let Some(limit) = user.traffic_limit.as_deref() {
        out.push_str(&data_row("Лимит", limit));
    }
    out.push_str(&data_row("Активна", yes_no(user.is_active)));
    out.push_str(&data_row("Статус", or_dash(user.user_status.as_deref())));
    out
}

fn render_devices(result: &LookupResult) -> String {
    let mut out = String::from("Устройства (HWID)\n");
    if result.hwid_devices.is_empty() {
        out.push_str("  Устройства не найдены\n");
        return out;
    }
    out.push_str(&format!("  Всего: {}\n", result.hwid_devices.len()));
    for (index, device) in result.hwid_devices.iter().enumerate() {
        out.push_str(&format!("Устройство {}\n", index + 1));
        out.push_str(&data_row("HWID", &device.hwid));
        if let Some(platform) = device.platform.as_deref() {
            out.push_str(&data_row("Платформа", platform));
        }
        if let Some(os) = device.os_version.as_deref() {
            out.push_str(&data_row("ОС", os));
        }
        if let Some(model) = device.device_model.as_deref() {
            out.push_str(&data_row("Модель", model));
        }
        if device.created_at.is_some() {
            out.push_str(&data_row("Добавлено", format_date(device.created_at.as_deref())));
        }
    }
    out
}

fn render_balance(view: Option<&BalanceView>) -> String {
    let mut out = String::from("Баланс (Bedolaga)\n");
    let Some(view) = view else {
        out.push_str("  Загрузка...\n");
        return out;
    };
    if let Some(error) = &view.error {
        out.push_str(&format!("  ❗ {}\n", error));
    }
    if let Some(balance) = &view.balance {
        out.push_str(&data_row(
            "Баланс",
            format!(
                "{} {}",
                balance.balance,
                balance.currency.as_deref().unwrap_or("RUB")
            ),
        ));
        if let Some(total) = balance.total_deposits {
            out.push_str(&data_row("Всего пополнений", total));
        }
        if balance.last_deposit.is_some() {
            out.push_str(&data_row(
                "Последнее пополнение",
                format_date(balance.last_deposit.as_deref()),
            ));
        }
        if let Some(message) = balance.message.as_deref() {
            out.push_str(&format!("  {}\n", message));
        }
    }
    if !view.deposits.is_empty() {
        out.push_str(&format!("История пополнений ({})\n", view.deposits.len()));
        for deposit in &view.deposits {
            out.push_str(&format!(
                "  • {} {} [{}] | {} | {} | {}\n",
                deposit.amount,
                deposit.currency.as_deref().unwrap_or("RUB"),
                or_dash(Some(deposit.kind.as_str())),
                or_dash(Some(deposit.method.as_str())),
                format_date(Some(deposit.created_at.as_str())),
                or_dash(Some(deposit.status.as_str())),
            ));
            if !deposit.description.is_empty() {
                out.push_str(&format!("    {}\n", deposit.description));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;

    fn found_user() -> serde_json::Value {
        json!({
            "ok": true,
            "user": {
                "uuid": "u-1",
                "username": "client",
                "telegramId": 12345,
                "status": "ACTIVE",
                "userTraffic": { "usedTrafficBytes": 2048, "lifetimeUsedTrafficBytes": 4096 }
            },
            "subscription": { "isFound": true, "user": { "daysLeft": 10, "isActive": true } },
            "hwid_devices": [{ "hwid": "h-1", "platform": "iOS" }]
        })
    }

    #[tokio::test]
    async fn empty_query_is_rejected_locally() {
        let api = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = SearchPanel::new(SearchState::default());
        panel.set_query("   ");
        panel.search(&api).await;
        assert_eq!(panel.error.as_deref(), Some(EMPTY_QUERY));
    }

    #[tokio::test]
    async fn successful_search_resets_section_to_profile() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/lookup")
                .json_body(json!({ "query": "12345" }));
            then.status(200).json_body(found_user());
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = SearchPanel::new(SearchState {
            query: " 12345 ".to_string(),
            result: None,
            section: SearchSection::Hwid,
        });
        panel.search(&api).await;
        assert!(panel.error.as_deref().is_none());
        assert_eq!(panel.state().section, SearchSection::Profile);
        let result = panel.state().result.as_ref().expect("result");
        assert_eq!(result.user.telegram_id, Some(12345));
        assert_eq!(result.hwid_devices.len(), 1);

        panel.select_section(SearchSection::Traffic);
        let rendered = panel.render();
        assert!(rendered.contains("2.00 KB"), "{rendered}");
        assert!(rendered.contains("disable-user"), "{rendered}");
    }

    #[tokio::test]
    async fn unknown_user_shows_localized_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/lookup");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "user_not_found" }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");
        let mut panel = SearchPanel::default();
        panel.set_query("@ghost");
        panel.search(&api).await;
        assert_eq!(panel.error.as_deref(), Some("Пользователь не найден"));
        assert!(panel.state().result.is_none());
    }

    #[tokio::test]
    async fn network_failure_is_reported_inline() {
        let api = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = SearchPanel::default();
        panel.set_query("1");
        panel.search(&api).await;
        assert_eq!(panel.error.as_deref(), Some(NETWORK_ERROR));
    }

    #[tokio::test]
    async fn action_without_result_is_refused() {
        let api = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = SearchPanel::default();
        panel.perform(&api, UserAction::ResetTraffic, None).await;
        assert_eq!(panel.action_message.as_deref(), Some("Сначала найдите пользователя"));
    }

    #[tokio::test]
    async fn successful_action_reruns_search_and_keeps_message() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/lookup");
            then.status(200).json_body(found_user());
        });
        let action = server.mock(|when, then| {
            when.method(POST)
                .path("/api/actions/reset-traffic")
                .json_body(json!({ "userUuid": "u-1" }));
            then.status(200)
                .json_body(json!({ "ok": true, "message": "Трафик сброшен." }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = SearchPanel::default();
        panel.set_query("12345");
        panel.search(&api).await;
        panel.perform(&api, UserAction::ResetTraffic, None).await;

        action.assert();
        assert_eq!(panel.action_message.as_deref(), Some("Трафик сброшен."));
        assert!(panel.state().result.is_some());
    }

    #[tokio::test]
    async fn balance_requires_telegram_id() {
        let api = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = SearchPanel::new(SearchState {
            query: "x".to_string(),
            result: Some(LookupResult {
                user: RemnaUser {
                    uuid: "u-1".to_string(),
                    ..RemnaUser::default()
                },
                subscription: None,
                hwid_devices: Vec::new(),
            }),
            section: SearchSection::Balance,
        });
        panel.load_balance(&api).await;
        let view = panel.balance().expect("view");
        assert_eq!(view.error.as_deref(), Some("Telegram ID не найден"));
    }

    #[tokio::test]
    async fn balance_and_deposits_load_together() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/lookup");
            then.status(200).json_body(found_user());
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/bedolaga/balance/12345");
            then.status(200)
                .json_body(json!({ "ok": true, "balance": 150.5, "currency": "RUB" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/bedolaga/deposits/12345");
            then.status(200).json_body(json!({
                "ok": true,
                "deposits": [{ "amount": 100.0, "type": "deposit", "method": "card",
                               "created_at": "2024-01-01T00:00:00Z", "status": "completed" }]
            }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = SearchPanel::default();
        panel.set_query("12345");
        panel.search(&api).await;
        panel.select_section(SearchSection::Balance);
        panel.load_balance(&api).await;

        let view = panel.balance().expect("view");
        assert_eq!(view.balance.as_ref().map(|b| b.balance), Some(150.5));
        assert_eq!(view.deposits.len(), 1);
        assert!(panel.render().contains("150.5 RUB"));
    }

    #[test]
    fn deposits_render_without_balance() {
        let view = BalanceView {
            balance: None,
            deposits: vec![Deposit {
                amount: 300.0,
                method: "sbp".to_string(),
                status: "completed".to_string(),
                ..Deposit::default()
            }],
            error: Some("Пользователь не найден в Bedolaga".to_string()),
        };
        let rendered = render_balance(Some(&view));
        assert!(rendered.contains("❗ Пользователь не найден в Bedolaga"), "{rendered}");
        assert!(rendered.contains("История пополнений (1)"), "{rendered}");
        assert!(rendered.contains("sbp"), "{rendered}");
    }
}
