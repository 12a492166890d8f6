use async_trait::async_trait;
use sqlx::PgPool;

/// The gateway's only direct database use: the readiness probe's
/// connectivity check. Business reads and writes live in collaborators
/// outside this service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

pub struct PgProbe {
    pub pool: PgPool,
}

#[async_trait]
impl DatabaseProbe for PgProbe {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}
