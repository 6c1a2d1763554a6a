//! Текстовая оболочка панели менеджера: строки из stdin, экран в stdout.
//!
//! Обычный текст без `/` уходит в «основное» поле вкладки: запрос поиска,
//! сообщение AI-чату, запрос по базе знаний. Остальное это команды.

use crate::api::{ArticleDraft, UserAction};
use crate::panels::{
    ChatPanel, KnowledgePanel, ProvidersPanel, SearchPanel, SettingsField, SettingsPanel,
    TicketFilter, TicketsPanel,
};
use crate::shell::{SearchSection, Shell, ShellRequest, Tab};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

const HELP_TEXT: &str = "Команды:\n\
     /tab <search|tickets|chat-test|providers|knowledge|settings>\n\
     /refresh, /help, /quit\n\
     Поиск: <id или @username>, /section <id>, /action <действие> [hwid], /balance\n\
     Тикеты: /filter <all|escalated|suspicious>, /open <id>, /reply <id> <текст>, /action <id> <действие>, /close <id>, /remove <id>\n\
     AI чат: <сообщение>, /q <номер>, /clear\n\
     Провайдеры: /toggle <name>, /key <name> <ключ>, /unkey <name> <номер>, /test <name>, /model <name> <модель>, /activate <name>\n\
     База знаний: <запрос>, /new <заголовок> | <категория> | <текст>, /edit <id> <заголовок> | <категория> | <текст>, /delete <id>, /expand <id>\n\
     Настройки: /set <поле> <значение>, /save, /stock-prompt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Разобранная строка ввода.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Text(&'a str),
    Command { name: &'a str, args: &'a str },
}

impl<'a> Input<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Input::Text(line);
        };
        let (name, args) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        Input::Command {
            name,
            args: args.trim(),
        }
    }
}

fn split_first(args: &str) -> Option<(&str, &str)> {
    let (first, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    if first.is_empty() {
        None
    } else {
        Some((first, rest.trim()))
    }
}

/// `<заголовок> | <категория> | <текст>`.
fn parse_draft(args: &str) -> Option<ArticleDraft> {
    let mut parts = args.splitn(3, '|');
    let title = parts.next()?;
    let category = parts.next()?;
    let content = parts.next()?;
    Some(ArticleDraft::new(title, content, category))
}

pub struct Console {
    shell: Shell,
    manager_name: String,
    notice: Option<String>,
    search: SearchPanel,
    tickets: TicketsPanel,
    chat: ChatPanel,
    providers: ProvidersPanel,
    knowledge: KnowledgePanel,
    settings: SettingsPanel,
}

impl Console {
    pub fn new(shell: Shell, manager_name: &str) -> Self {
        let search = SearchPanel::new(shell.search_state());
        let settings = SettingsPanel::new(shell.settings());
        Self {
            shell,
            manager_name: manager_name.to_string(),
            notice: None,
            search,
            tickets: TicketsPanel::default(),
            chat: ChatPanel::default(),
            providers: ProvidersPanel::default(),
            knowledge: KnowledgePanel::default(),
            settings,
        }
    }

    pub async fn run(mut self, poll_interval: Duration) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut poll = tokio::time::interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Первый тик срабатывает сразу.
        poll.tick().await;

        println!("{}", self.render());
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        tracing::info!("stdin closed");
                        break;
                    };
                    if self.handle(&line).await == Flow::Quit {
                        break;
                    }
                    println!("{}", self.render());
                }
                _ = poll.tick() => {
                    if self.shell.active_tab() == Some(Tab::Tickets)
                        && self.tickets.refresh(self.shell.api()).await
                    {
                        println!("{}", self.render());
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn handle(&mut self, line: &str) -> Flow {
        self.notice = None;
        let Some(tab) = self.shell.active_tab() else {
            return Flow::Quit;
        };
        match Input::parse(line) {
            Input::Empty => {}
            Input::Text(text) => self.handle_text(tab, text).await,
            Input::Command { name: "quit", .. } => return Flow::Quit,
            Input::Command { name: "help", .. } => self.notice = Some(HELP_TEXT.to_string()),
            Input::Command { name: "tab", args } => match Tab::parse(args) {
                Some(next) => self.switch_tab(next).await,
                None => self.notice = Some(format!("Нет такой вкладки: {}", args)),
            },
            Input::Command { name: "refresh", .. } => self.refresh(tab).await,
            Input::Command { name, args } => {
                if !self.handle_command(tab, name, args).await {
                    self.notice = Some(format!("Не понял команду /{}. /help для списка.", name));
                }
            }
        }
        Flow::Continue
    }

    async fn switch_tab(&mut self, next: Tab) {
        if self.shell.active_tab() == Some(Tab::Search) {
            self.shell.store_search(self.search.state().clone());
        }
        if !self.shell.navigate(next) {
            return;
        }
        tracing::debug!(tab = next.id(), "Tab switched");
        match next {
            Tab::Search => self.search.restore(self.shell.search_state()),
            Tab::Tickets => {
                self.tickets.refresh(self.shell.api()).await;
            }
            Tab::Knowledge => self.knowledge.refresh(self.shell.api()).await,
            Tab::Settings => self.settings = SettingsPanel::new(self.shell.settings()),
            Tab::ChatTest | Tab::Providers => {}
        }
    }

    async fn refresh(&mut self, tab: Tab) {
        match tab {
            Tab::Tickets => {
                self.tickets.refresh(self.shell.api()).await;
            }
            Tab::Knowledge => self.knowledge.refresh(self.shell.api()).await,
            Tab::Providers => self.shell.apply(ShellRequest::RefreshAll).await,
            Tab::Settings => {
                self.shell.refresh_settings().await;
                self.settings = SettingsPanel::new(self.shell.settings());
            }
            Tab::Search => {
                self.search.search(self.shell.api()).await;
                self.shell.store_search(self.search.state().clone());
            }
            Tab::ChatTest => {}
        }
    }

    async fn handle_text(&mut self, tab: Tab, text: &str) {
        match tab {
            Tab::Search => {
                self.search.set_query(text);
                self.search.search(self.shell.api()).await;
                self.shell.store_search(self.search.state().clone());
            }
            Tab::ChatTest => self.chat.send(self.shell.api(), text).await,
            Tab::Knowledge => {
                self.knowledge.set_query(text);
                self.knowledge.refresh(self.shell.api()).await;
            }
            Tab::Tickets | Tab::Providers | Tab::Settings => {
                self.notice = Some(HELP_TEXT.to_string());
            }
        }
    }

    /// `false`, если команда не относится к вкладке.
    async fn handle_command(&mut self, tab: Tab, name: &str, args: &str) -> bool {
        match tab {
            Tab::Search => self.search_command(name, args).await,
            Tab::Tickets => self.tickets_command(name, args).await,
            Tab::ChatTest => self.chat_command(name, args).await,
            Tab::Providers => self.providers_command(name, args).await,
            Tab::Knowledge => self.knowledge_command(name, args).await,
            Tab::Settings => self.settings_command(name, args).await,
        }
    }

    async fn search_command(&mut self, name: &str, args: &str) -> bool {
        let api = self.shell.api();
        match name {
            "section" => match SearchSection::parse(args) {
                Some(section) => {
                    self.search.select_section(section);
                    if section == SearchSection::Balance && self.search.balance().is_none() {
                        self.search.load_balance(api).await;
                    }
                }
                None => self.notice = Some(format!("Нет такого раздела: {}", args)),
            },
            "balance" => {
                self.search.select_section(SearchSection::Balance);
                self.search.load_balance(api).await;
            }
            "action" => {
                let Some((action, hwid)) = split_first(args) else {
                    return false;
                };
                let Some(action) = UserAction::parse(action) else {
                    self.notice = Some(format!("Нет такого действия: {}", action));
                    return true;
                };
                self.search.perform(api, action, Some(hwid)).await;
            }
            _ => return false,
        }
        self.shell.store_search(self.search.state().clone());
        true
    }

    async fn tickets_command(&mut self, name: &str, args: &str) -> bool {
        let api = self.shell.api();
        match name {
            "filter" => match TicketFilter::parse(args) {
                Some(filter) => self.tickets.set_filter(filter),
                None => self.notice = Some(format!("Нет такого фильтра: {}", args)),
            },
            "open" if !args.is_empty() => self.tickets.select(args),
            "reply" => {
                let Some((ticket_id, text)) = split_first(args) else {
                    return false;
                };
                self.tickets
                    .reply(api, ticket_id, text, &self.manager_name)
                    .await;
            }
            "action" => {
                let Some((ticket_id, action)) = split_first(args) else {
                    return false;
                };
                let Some(action) = UserAction::parse(action) else {
                    self.notice = Some(format!("Нет такого действия: {}", action));
                    return true;
                };
                self.tickets.perform(api, ticket_id, action).await;
            }
            "close" if !args.is_empty() => self.tickets.close(api, args).await,
            "remove" if !args.is_empty() => self.tickets.remove(api, args).await,
            _ => return false,
        }
        true
    }

    async fn chat_command(&mut self, name: &str, args: &str) -> bool {
        match name {
            "clear" => self.chat.clear(),
            "q" => {
                let question = args.parse().ok().and_then(ChatPanel::quick_question);
                match question {
                    Some(question) => self.chat.send(self.shell.api(), question).await,
                    None => self.notice = Some("Нет такого быстрого вопроса".to_string()),
                }
            }
            _ => return false,
        }
        true
    }

    async fn providers_command(&mut self, name: &str, args: &str) -> bool {
        let (provider, rest) = split_first(args).unwrap_or(("", ""));
        if provider.is_empty() {
            return false;
        }
        let api = self.shell.api();
        let request = match name {
            "toggle" => {
                let Some(current) = self
                    .shell
                    .providers()
                    .iter()
                    .find(|p| p.name == provider)
                    .cloned()
                else {
                    self.notice = Some(format!("Провайдер {} не найден", provider));
                    return true;
                };
                Some(self.providers.toggle(api, &current).await)
            }
            "key" => self.providers.add_key(api, provider, rest).await,
            "unkey" => {
                let Ok(index) = rest.parse::<usize>() else {
                    self.notice = Some("Укажите номер ключа".to_string());
                    return true;
                };
                Some(self.providers.remove_key(api, provider, index).await)
            }
            "test" => self.providers.test_connection(api, provider).await,
            "model" if !rest.is_empty() => Some(self.providers.set_model(api, provider, rest).await),
            "activate" => Some(self.providers.set_active(api, provider).await),
            _ => return false,
        };
        if let Some(request) = request {
            self.shell.apply(request).await;
        }
        true
    }

    async fn knowledge_command(&mut self, name: &str, args: &str) -> bool {
        let api = self.shell.api();
        match name {
            "new" => {
                let Some(draft) = parse_draft(args) else {
                    self.notice = Some("Формат: /new <заголовок> | <категория> | <текст>".to_string());
                    return true;
                };
                self.knowledge.save(api, draft, None).await;
            }
            "edit" => {
                let draft = split_first(args)
                    .and_then(|(id, rest)| parse_draft(rest).map(|draft| (id, draft)));
                let Some((id, draft)) = draft else {
                    self.notice =
                        Some("Формат: /edit <id> <заголовок> | <категория> | <текст>".to_string());
                    return true;
                };
                self.knowledge.save(api, draft, Some(id)).await;
            }
            "delete" if !args.is_empty() => self.knowledge.delete(api, args).await,
            "expand" if !args.is_empty() => self.knowledge.expand(api, args).await,
            _ => return false,
        }
        true
    }

    async fn settings_command(&mut self, name: &str, args: &str) -> bool {
        match name {
            "set" => {
                let Some((field, value)) = split_first(args) else {
                    return false;
                };
                match SettingsField::parse(field) {
                    Some(field) => self.settings.set(field, value),
                    None => self.notice = Some(format!("Нет такого поля: {}", field)),
                }
            }
            "save" => {
                let request = self.settings.save(self.shell.api()).await;
                if let Some(request) = request {
                    self.shell.apply(request).await;
                }
            }
            "stock-prompt" => self.settings.load_stock_prompt(self.shell.api()).await,
            _ => return false,
        }
        true
    }

    pub fn render(&self) -> String {
        let mut out = format!("{}\n{}\n\n", self.shell.header(), self.shell.navigation());
        if let Some(notice) = &self.notice {
            out.push_str(notice);
            out.push_str("\n\n");
        }
        let body = match self.shell.active_tab() {
            Some(Tab::Search) => self.search.render(),
            Some(Tab::Tickets) => self.tickets.render(),
            Some(Tab::ChatTest) => self.chat.render(),
            Some(Tab::Providers) => {
                let active = self
                    .shell
                    .settings()
                    .and_then(|settings| settings.active_provider.as_deref());
                self.providers.render(self.shell.providers(), active)
            }
            Some(Tab::Knowledge) => self.knowledge.render(),
            Some(Tab::Settings) => self.settings.render(),
            None => String::new(),
        };
        out.push_str(&body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::guard::Guard;
    use crate::host::{NoHost, resolve};
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;

    #[test]
    fn input_is_split_into_command_and_args() {
        assert_eq!(Input::parse("   "), Input::Empty);
        assert_eq!(Input::parse(" @alice "), Input::Text("@alice"));
        assert_eq!(
            Input::parse("/reply 42  Здравствуйте, проверьте "),
            Input::Command {
                name: "reply",
                args: "42  Здравствуйте, проверьте"
            }
        );
        assert_eq!(
            Input::parse("/save"),
            Input::Command {
                name: "save",
                args: ""
            }
        );
    }

    #[test]
    fn drafts_need_three_parts() {
        let draft = parse_draft(" Тарифы | | Базовый и премиум ").unwrap();
        assert_eq!(draft.title, "Тарифы");
        assert_eq!(draft.category, "general");
        assert_eq!(draft.content, "Базовый и премиум");
        assert!(parse_draft("Только заголовок").is_none());
    }

    async fn started_console(server: &MockServer) -> Console {
        server.mock(|when, then| {
            when.method(GET).path("/api/settings");
            then.status(200)
                .json_body(json!({ "allowed_manager_ids": [], "service_name": "VPN" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/settings/providers");
            then.status(200).json_body(json!({ "providers": [] }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");
        let mut shell = Shell::new(api, Guard::default(), resolve(&NoHost));
        shell.start().await;
        Console::new(shell, "Менеджер")
    }

    #[tokio::test]
    async fn search_query_survives_tab_round_trip() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/lookup");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "user_not_found" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/knowledge");
            then.status(200).json_body(json!({ "ok": true, "articles": [] }));
        });
        let mut console = started_console(&server).await;

        console.handle("@ghost").await;
        console.handle("/tab knowledge").await;
        assert_eq!(console.shell.active_tab(), Some(Tab::Knowledge));
        console.handle("/tab search").await;

        assert_eq!(console.shell.search_state().query, "@ghost");
        assert!(console.render().starts_with("VPN"));
    }

    #[tokio::test]
    async fn unknown_commands_and_quit() {
        let server = MockServer::start_async().await;
        let mut console = started_console(&server).await;

        assert_eq!(console.handle("/fly").await, Flow::Continue);
        assert!(console.render().contains("Не понял команду /fly"));
        assert_eq!(console.handle("/tab nowhere").await, Flow::Continue);
        assert_eq!(console.shell.active_tab(), Some(Tab::Search));
        assert_eq!(console.handle("/quit").await, Flow::Quit);
    }
}
