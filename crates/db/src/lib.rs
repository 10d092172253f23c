use anyhow::{Context, Result, anyhow};
use codecollab_core::{
    config::DbConfig,
    models::{NewProject, Project, ProjectId, ProjectStatus},
};
use sqlx::{
    FromRow, Pool, Sqlite,
    migrate::MigrateDatabase,
    sqlite::SqlitePoolOptions,
};
use time::OffsetDateTime;

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Sqlite>,
}

#[derive(FromRow)]
struct ProjectRow {
    id: String,
    user_email: String,
    repo_link: String,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ProjectRow> for Project {
    type Error = anyhow::Error;

    fn try_from(row: ProjectRow) -> Result<Self> {
        Ok(Project {
            id: row.id.parse().map_err(|_| anyhow!("Malformed project ID {:?}", row.id))?,
            user_email: row.user_email,
            repo_link: row.repo_link,
            status: row
                .status
                .parse()
                .map_err(|_| anyhow!("Unknown status {:?} for project {}", row.status, row.id))?,
            created_at: from_micros(row.created_at)?,
            updated_at: from_micros(row.updated_at)?,
        })
    }
}

const PROJECT_COLUMNS: &str = "id, user_email, repo_link, status, created_at, updated_at";

impl Database {
    pub async fn new(config: &DbConfig) -> Result<Self> {
        let in_memory = is_in_memory(&config.url);
        if !in_memory && !Sqlite::database_exists(&config.url).await.unwrap_or(false) {
            tracing::info!(url = %config.url, "Creating database");
            Sqlite::create_database(&config.url).await.context("Failed to create database")?;
            tracing::info!("Database created");
        }
        let options = if in_memory {
            // Every connection to :memory: is its own database, so keep exactly one alive
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };
        let pool =
            options.connect(&config.url).await.context("Failed to connect to database")?;
        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    pub async fn close(&self) { self.pool.close().await }

    /// All projects, newest first.
    pub async fn get_projects(&self) -> Result<Vec<Project>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC, seq DESC"
        ))
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Project::try_from)
        .collect()
    }

    pub async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .map(Project::try_from)
        .transpose()
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project> {
        let mut conn = self.pool.acquire().await?;
        let now = now_micros();
        let created = Project {
            id: ProjectId::generate(),
            user_email: project.user_email.clone(),
            repo_link: project.repo_link.clone(),
            status: ProjectStatus::default(),
            created_at: from_micros(now)?,
            updated_at: from_micros(now)?,
        };
        sqlx::query(
            r#"
            INSERT INTO projects (id, user_email, repo_link, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(created.id.as_str())
        .bind(&created.user_email)
        .bind(&created.repo_link)
        .bind(created.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        tracing::debug!("Created project {} ({})", created.id, created.repo_link);
        Ok(created)
    }

    /// Returns the updated project, or `None` if no project has this ID.
    pub async fn update_project_status(
        &self,
        id: &ProjectId,
        status: ProjectStatus,
    ) -> Result<Option<Project>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            UPDATE projects
            SET status = ?, updated_at = ?
            WHERE id = ?
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(status.as_str())
        .bind(now_micros())
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .map(Project::try_from)
        .transpose()
    }

    /// Returns whether a project was deleted.
    pub async fn delete_project(&self, id: &ProjectId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let deleted = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *conn)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

fn is_in_memory(url: &str) -> bool { url.contains(":memory:") || url.contains("mode=memory") }

#[inline]
fn now_micros() -> i64 { (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1000) as i64 }

#[inline]
fn from_micros(micros: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(micros as i128 * 1000)
        .with_context(|| format!("Timestamp out of range: {micros}"))
}
