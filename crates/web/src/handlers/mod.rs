use axum::{
    Router,
    routing::{get, put},
};

use crate::AppState;

mod common;
mod dashboard;
mod projects;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/ping", get(common::ping))
        .route("/projects", get(projects::list).post(projects::create))
        .route("/projects/{id}", put(projects::update_status).delete(projects::delete))
        .route("/projects/{id}/analytics", get(projects::analytics))
        .fallback(common::not_found)
        .method_not_allowed_fallback(common::not_found)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::response::Response;
    use codecollab_core::config::{Config, DbConfig, GitHubConfig};
    use codecollab_db::Database;
    use codecollab_github::GitHub;
    use http_body_util::BodyExt;

    use crate::{App, AppState, app};

    /// Full application over an in-memory database. Without `api_url` the
    /// GitHub client points at a closed port so no request leaves the host.
    pub async fn test_app(api_url: Option<&str>) -> App { test_app_with_db(api_url).await.0 }

    /// Like [`test_app`], also returning the database handle shared with the app.
    pub async fn test_app_with_db(api_url: Option<&str>) -> (App, Arc<Database>) {
        let config = Config {
            db: DbConfig { url: "sqlite::memory:".to_string(), max_connections: 1 },
            github: GitHubConfig {
                token: None,
                api_url: api_url.unwrap_or("http://127.0.0.1:1").to_string(),
            },
            ..Default::default()
        };
        let db = Arc::new(Database::new(&config.db).await.unwrap());
        let github = GitHub::new(&config.github).await.unwrap();
        let app = app(AppState { config: Arc::new(config), db: db.clone(), github });
        (app, db)
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }
}
