//! Оболочка приложения: загрузка, проверка доступа, вкладки.
//!
//! Shell единолично владеет настройками, списком провайдеров и состоянием
//! вкладки поиска. Панели получают снимки и просят изменений через
//! [`ShellRequest`] или [`Shell::store_search`].

use crate::api::{ApiClient, LookupResult, Provider, Settings};
use crate::guard::Guard;
use crate::host::{Identity, Resolved};
use crate::store;

pub const DENIED_TEXT: &str = "⛔ Доступ запрещён\n\n\
     Mini App доступен только для менеджеров.\n\
     Если вы менеджер — обратитесь к администратору для добавления вашего ID.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Search,
    Tickets,
    ChatTest,
    Providers,
    Knowledge,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Search,
        Tab::Tickets,
        Tab::ChatTest,
        Tab::Providers,
        Tab::Knowledge,
        Tab::Settings,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Tab::Search => "search",
            Tab::Tickets => "tickets",
            Tab::ChatTest => "chat-test",
            Tab::Providers => "providers",
            Tab::Knowledge => "knowledge",
            Tab::Settings => "settings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Search => "🔍 Поиск",
            Tab::Tickets => "🔥 Тикеты",
            Tab::ChatTest => "💬 AI Чат",
            Tab::Providers => "🧠 AI",
            Tab::Knowledge => "📚 База",
            Tab::Settings => "⚙️ Настройки",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|tab| tab.id() == raw)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchSection {
    #[default]
    Profile,
    Traffic,
    Dates,
    Subscription,
    Hwid,
    Balance,
}

impl SearchSection {
    pub const ALL: [SearchSection; 6] = [
        SearchSection::Profile,
        SearchSection::Traffic,
        SearchSection::Dates,
        SearchSection::Subscription,
        SearchSection::Hwid,
        SearchSection::Balance,
    ];

    pub fn id(self) -> &'static str {
        match self {
            SearchSection::Profile => "profile",
            SearchSection::Traffic => "traffic",
            SearchSection::Dates => "dates",
            SearchSection::Subscription => "subscription",
            SearchSection::Hwid => "hwid",
            SearchSection::Balance => "balance",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SearchSection::Profile => "Профиль",
            SearchSection::Traffic => "Трафик",
            SearchSection::Dates => "Даты",
            SearchSection::Subscription => "Подписка",
            SearchSection::Hwid => "Устройства",
            SearchSection::Balance => "Баланс",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|section| section.id() == raw)
    }
}

/// Состояние вкладки поиска, переживающее переключение вкладок.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub result: Option<LookupResult>,
    pub section: SearchSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Denied,
    Active(Tab),
}

/// Просьба панели к Shell перечитать общие данные.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellRequest {
    RefreshSettings,
    RefreshProviders,
    RefreshAll,
}

pub struct Shell {
    api: ApiClient,
    guard: Guard,
    identity: Option<Identity>,
    payload_present: bool,
    phase: Phase,
    settings: Option<Settings>,
    providers: Vec<Provider>,
    search: SearchState,
}

impl Shell {
    pub fn new(api: ApiClient, guard: Guard, resolved: Resolved) -> Self {
        Self {
            api,
            guard,
            payload_present: resolved.payload_present(),
            identity: resolved.identity,
            phase: Phase::Loading,
            settings: None,
            providers: Vec::new(),
            search: SearchState::default(),
        }
    }

    /// Загружает настройки и провайдеров параллельно и решает о доступе.
    /// Из `Loading` выходит ровно один раз; повторный вызов ничего не делает.
    pub async fn start(&mut self) -> Phase {
        if self.phase != Phase::Loading {
            tracing::debug!(phase = ?self.phase, "Shell already started");
            return self.phase;
        }

        let (settings, providers) = tokio::join!(
            store::load_settings(&self.api),
            store::load_providers(&self.api)
        );
        self.settings = settings;
        self.providers = providers;

        let access = self.guard.decide(
            self.settings.as_ref(),
            self.identity.as_ref(),
            self.payload_present,
        );
        self.phase = if access.is_denied() {
            Phase::Denied
        } else {
            Phase::Active(Tab::Search)
        };
        tracing::info!(
            manager_id = ?self.identity.as_ref().map(|identity| identity.id),
            payload_present = self.payload_present,
            settings_loaded = self.settings.is_some(),
            access = ?access,
            "Access decided"
        );
        self.phase
    }

    pub fn active_tab(&self) -> Option<Tab> {
        match self.phase {
            Phase::Active(tab) => Some(tab),
            _ => None,
        }
    }

    /// Переход между вкладками. Доступ повторно не проверяется.
    pub fn navigate(&mut self, tab: Tab) -> bool {
        match self.phase {
            Phase::Active(_) => {
                self.phase = Phase::Active(tab);
                true
            }
            _ => false,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn search_state(&self) -> SearchState {
        self.search.clone()
    }

    pub fn store_search(&mut self, state: SearchState) {
        self.search = state;
    }

    /// Перечитать настройки. Неудача оставляет прежнюю копию.
    pub async fn refresh_settings(&mut self) {
        if let Some(settings) = store::load_settings(&self.api).await {
            self.settings = Some(settings);
        }
    }

    /// Перечитать провайдеров. Новый список заменяет старый целиком.
    pub async fn refresh_providers(&mut self) {
        self.providers = store::load_providers(&self.api).await;
    }

    pub async fn apply(&mut self, request: ShellRequest) {
        match request {
            ShellRequest::RefreshSettings => self.refresh_settings().await,
            ShellRequest::RefreshProviders => self.refresh_providers().await,
            ShellRequest::RefreshAll => {
                self.refresh_providers().await;
                self.refresh_settings().await;
            }
        }
    }

    pub fn header(&self) -> String {
        let service = self
            .settings
            .as_ref()
            .and_then(|settings| settings.service_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or("Решала support");
        match (&self.phase, &self.identity) {
            (Phase::Active(_), Some(identity)) => {
                format!("{} | {}", service, identity.display_name())
            }
            _ => service.to_string(),
        }
    }

    pub fn navigation(&self) -> String {
        Tab::ALL
            .iter()
            .map(|tab| {
                if self.active_tab() == Some(*tab) {
                    format!("[{}]", tab.label())
                } else {
                    tab.label().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}
