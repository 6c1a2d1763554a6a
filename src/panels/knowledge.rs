use super::format::{error_text, format_date};
use crate::api::{ApiClient, Article, ArticleDraft};

const DEFAULT_CATEGORY: &str = "general";

/// База знаний AI. Запрос поиска хранится в панели: пустой означает весь
/// список, иначе `/api/knowledge/search/{q}`.
///
/// `message` несёт итог последнего действия, `error` только ошибку загрузки
/// списка и сбрасывается удачным перечитыванием.
#[derive(Debug, Default)]
pub struct KnowledgePanel {
    articles: Vec<Article>,
    query: String,
    expanded: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl KnowledgePanel {
    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_string();
    }

    /// Раскрыть статью целиком, свежей версией с бэкенда. Повторный вызов
    /// сворачивает.
    pub async fn expand(&mut self, api: &ApiClient, id: &str) {
        if self.expanded.as_deref() == Some(id) {
            self.expanded = None;
            return;
        }
        match api.article(id).await {
            Ok(article) => {
                match self.articles.iter().position(|known| known.id == article.id) {
                    Some(index) => self.articles[index] = article,
                    None => self.articles.push(article),
                }
                self.expanded = Some(id.to_string());
            }
            Err(error) => {
                tracing::warn!(article_id = %id, error = %error, "Article fetch failed");
                self.message = Some(error_text(&error));
            }
        }
    }

    pub async fn refresh(&mut self, api: &ApiClient) {
        let result = if self.query.is_empty() {
            api.articles().await
        } else {
            api.search_articles(&self.query).await
        };
        match result {
            Ok(articles) => {
                tracing::debug!(count = articles.len(), query = %self.query, "Articles loaded");
                self.articles = articles;
                self.error = None;
            }
            Err(error) => {
                tracing::warn!(error = %error, "Articles fetch failed");
                self.articles.clear();
                self.error = Some(error_text(&error));
            }
        }
    }

    /// Создать статью или, при заданном `id`, обновить существующую.
    /// Без заголовка или текста ничего не отправляется.
    pub async fn save(&mut self, api: &ApiClient, draft: ArticleDraft, id: Option<&str>) -> bool {
        if draft.title.is_empty() || draft.content.is_empty() {
            self.message = Some("Заполните заголовок и текст".to_string());
            return false;
        }
        let result = match id {
            Some(id) => api.update_article(id, &draft).await.map(|()| id.to_string()),
            None => api.create_article(&draft).await,
        };
        let saved = match result {
            Ok(id) => {
                tracing::info!(article_id = %id, title = %draft.title, "Article saved");
                self.message = Some("Статья сохранена".to_string());
                true
            }
            Err(error) => {
                tracing::warn!(error = %error, "Article save failed");
                self.message = Some(error_text(&error));
                false
            }
        };
        self.refresh(api).await;
        saved
    }

    pub async fn delete(&mut self, api: &ApiClient, id: &str) {
        match api.delete_article(id).await {
            Ok(()) => {
                tracing::info!(article_id = %id, "Article deleted");
                self.message = Some("Статья удалена".to_string());
                if self.expanded.as_deref() == Some(id) {
                    self.expanded = None;
                }
            }
            Err(error) => {
                tracing::warn!(article_id = %id, error = %error, "Article delete failed");
                self.message = Some(error_text(&error));
            }
        }
        self.refresh(api).await;
    }

    /// Категории в порядке первого появления.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for article in &self.articles {
            let category = if article.category.is_empty() {
                DEFAULT_CATEGORY
            } else {
                article.category.as_str()
            };
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }

    pub fn render(&self) -> String {
        let mut out = format!("База знаний AI: {} статей\n", self.articles.len());
        if !self.query.is_empty() {
            out.push_str(&format!("Поиск: {}\n", self.query));
        }
        if let Some(message) = &self.message {
            out.push_str(&format!("ℹ️ {}\n", message));
        }
        if let Some(error) = &self.error {
            out.push_str(&format!("❗ {}\n", error));
        }
        let categories = self.categories();
        if categories.len() > 1 {
            out.push_str(&format!("Категории: {}\n", categories.join(", ")));
        }
        if self.articles.is_empty() {
            out.push_str("База знаний пуста. Добавьте статьи, FAQ и инструкции для AI ассистента.\n");
            return out;
        }

        for article in &self.articles {
            let category = if article.category.is_empty() {
                DEFAULT_CATEGORY
            } else {
                article.category.as_str()
            };
            out.push_str(&format!("\n📄 [{}] {} ({})", article.id, article.title, category));
            if article.updated_at.is_some() {
                out.push_str(&format!(" {}", format_date(article.updated_at.as_deref())));
            }
            out.push('\n');

            if self.expanded.as_deref() == Some(article.id.as_str()) {
                out.push_str(&article.content);
                out.push('\n');
            } else {
                let preview: String = article.content.chars().take(120).collect();
                let ellipsis = if article.content.chars().count() > 120 { "…" } else { "" };
                out.push_str(&format!("  {}{}\n", preview, ellipsis));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;

    fn article(id: &str, category: &str) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Статья {id}"),
            content: "Текст".to_string(),
            category: category.to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn categories_default_and_dedupe() {
        let panel = KnowledgePanel {
            articles: vec![
                article("1", "tariffs"),
                article("2", ""),
                article("3", "tariffs"),
                article("4", "general"),
            ],
            ..KnowledgePanel::default()
        };
        assert_eq!(panel.categories(), vec!["tariffs", "general"]);
    }

    #[tokio::test]
    async fn non_empty_query_uses_search_endpoint() {
        let server = MockServer::start_async().await;
        let search = server.mock(|when, then| {
            when.method(GET).path("/api/knowledge/search/vpn");
            then.status(200)
                .json_body(json!({ "ok": true, "articles": [{ "id": "7", "title": "VPN", "content": "..." }] }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = KnowledgePanel::default();
        panel.set_query("  vpn ");
        panel.refresh(&api).await;
        search.assert();
        assert_eq!(panel.articles.len(), 1);
        assert_eq!(panel.articles[0].id, "7");
    }

    #[tokio::test]
    async fn new_article_is_posted_with_default_category() {
        let server = MockServer::start_async().await;
        let create = server.mock(|when, then| {
            when.method(POST).path("/api/knowledge").json_body(json!({
                "title": "Тарифы",
                "content": "Описание тарифов",
                "category": "general"
            }));
            then.status(200).json_body(json!({ "ok": true, "id": "abc" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/knowledge");
            then.status(200).json_body(json!({ "ok": true, "articles": [] }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = KnowledgePanel::default();
        let draft = ArticleDraft::new(" Тарифы ", "Описание тарифов", "  ");
        assert!(panel.save(&api, draft, None).await);
        create.assert();
        assert_eq!(panel.message.as_deref(), Some("Статья сохранена"));
    }

    #[tokio::test]
    async fn incomplete_draft_is_rejected_locally() {
        let api = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = KnowledgePanel::default();
        let draft = ArticleDraft::new("Заголовок", "   ", "faq");
        assert!(!panel.save(&api, draft, Some("1")).await);
        assert_eq!(panel.message.as_deref(), Some("Заполните заголовок и текст"));
    }

    #[tokio::test]
    async fn delete_hits_article_path() {
        let server = MockServer::start_async().await;
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/api/knowledge/42");
            then.status(200).json_body(json!({ "ok": true }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/knowledge");
            then.status(200).json_body(json!({ "ok": true, "articles": [] }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = KnowledgePanel::default();
        panel.delete(&api, "42").await;
        delete.assert();
        assert_eq!(panel.message.as_deref(), Some("Статья удалена"));
    }

    #[tokio::test]
    async fn successful_refresh_clears_load_error() {
        let unreachable = ApiClient::with_client(Client::new(), "http://127.0.0.1:1", "");
        let mut panel = KnowledgePanel::default();
        panel.refresh(&unreachable).await;
        assert!(panel.error.is_some());
        assert!(panel.render().contains("❗"));

        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/knowledge");
            then.status(200)
                .json_body(json!({ "ok": true, "articles": [{ "id": "1", "title": "FAQ", "content": "..." }] }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");
        panel.refresh(&api).await;
        assert!(panel.error.is_none());
        assert!(!panel.render().contains("❗"));
    }

    #[tokio::test]
    async fn expand_fetches_full_article_and_collapses() {
        let server = MockServer::start_async().await;
        let fetch = server.mock(|when, then| {
            when.method(GET).path("/api/knowledge/1");
            then.status(200).json_body(json!({
                "ok": true,
                "article": { "id": "1", "title": "Статья 1", "content": "Полный текст статьи", "category": "faq" }
            }));
        });
        let api = ApiClient::with_client(Client::new(), &server.base_url(), "");

        let mut panel = KnowledgePanel {
            articles: vec![article("1", "faq")],
            ..KnowledgePanel::default()
        };
        panel.expand(&api, "1").await;
        fetch.assert();
        assert_eq!(panel.expanded.as_deref(), Some("1"));
        assert_eq!(panel.articles.len(), 1);
        assert!(panel.render().contains("Полный текст статьи"));

        panel.expand(&api, "1").await;
        assert!(panel.expanded.is_none());
    }
}
