//! Вкладки панели менеджера. Каждая держит своё состояние и ходит в бэкенд
//! только через [`crate::api::ApiClient`].

#[path = "panels/chat.rs"]
mod chat;
#[path = "panels/format.rs"]
mod format;
#[path = "panels/knowledge.rs"]
mod knowledge;
#[path = "panels/providers.rs"]
mod providers;
#[path = "panels/search.rs"]
mod search;
#[path = "panels/settings.rs"]
mod settings;
#[path = "panels/tickets.rs"]
mod tickets;

pub use chat::ChatPanel;
pub use knowledge::KnowledgePanel;
pub use providers::ProvidersPanel;
pub use search::SearchPanel;
pub use settings::{SettingsField, SettingsPanel};
pub use tickets::{TicketFilter, TicketsPanel};
