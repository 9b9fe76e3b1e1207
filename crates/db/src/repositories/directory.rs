use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use leadflow_core::domain::directory::{
    AccountStatus, AgentAccount, AssignableTargets, SalesUser,
};
use leadflow_core::domain::operator::Role;

use super::{encode_timestamp, DirectoryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDirectoryRepository {
    pool: DbPool,
}

impl SqlDirectoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DirectoryRepository for SqlDirectoryRepository {
    async fn find_user(&self, id: &str) -> Result<Option<SalesUser>, RepositoryError> {
        let row = sqlx::query("SELECT id, username, role, status FROM app_user WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(sales_user_from_row).transpose()
    }

    async fn find_agent(&self, id: &str) -> Result<Option<AgentAccount>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, company_name, contact_person, status FROM agent WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(agent_from_row).transpose()
    }

    async fn list_assignable(&self) -> Result<AssignableTargets, RepositoryError> {
        let user_rows = sqlx::query(
            "SELECT id, username, role, status FROM app_user
             WHERE role = 'FACTORY_SALES' AND status = 'approved'
             ORDER BY username ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let agent_rows = sqlx::query(
            "SELECT id, company_name, contact_person, status FROM agent
             WHERE status = 'approved'
             ORDER BY company_name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(AssignableTargets {
            sales_users: user_rows
                .into_iter()
                .map(sales_user_from_row)
                .collect::<Result<Vec<_>, _>>()?,
            agents: agent_rows.into_iter().map(agent_from_row).collect::<Result<Vec<_>, _>>()?,
        })
    }

    async fn save_user(&self, user: SalesUser) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, username, role, status, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                role = excluded.role,
                status = excluded.status",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_agent(&self, agent: AgentAccount) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agent (id, company_name, contact_person, status, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                company_name = excluded.company_name,
                contact_person = excluded.contact_person,
                status = excluded.status",
        )
        .bind(&agent.id)
        .bind(&agent.company_name)
        .bind(&agent.contact_person)
        .bind(agent.status.as_str())
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn sales_user_from_row(row: SqliteRow) -> Result<SalesUser, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown user role `{role_raw}`")))?;

    Ok(SalesUser {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        role,
        status: decode_status(row.try_get("status")?)?,
    })
}

fn agent_from_row(row: SqliteRow) -> Result<AgentAccount, RepositoryError> {
    Ok(AgentAccount {
        id: row.try_get("id")?,
        company_name: row.try_get("company_name")?,
        contact_person: row.try_get("contact_person")?,
        status: decode_status(row.try_get("status")?)?,
    })
}

fn decode_status(value: String) -> Result<AccountStatus, RepositoryError> {
    AccountStatus::parse(&value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown account status `{value}`")))
}

#[cfg(test)]
mod tests {
    use leadflow_core::domain::directory::{AccountStatus, AgentAccount, SalesUser};
    use leadflow_core::domain::operator::Role;

    use super::SqlDirectoryRepository;
    use crate::migrations;
    use crate::repositories::DirectoryRepository;
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn list_assignable_keeps_only_approved_factory_sales_and_agents() {
        let pool = setup_pool().await;
        let repo = SqlDirectoryRepository::new(pool.clone());

        let sam = user("s-1", "sam", Role::FactorySales, AccountStatus::Approved);
        repo.save_user(sam.clone()).await.expect("save sam");
        repo.save_user(user("s-2", "pat", Role::FactorySales, AccountStatus::Pending))
            .await
            .expect("save pat");
        repo.save_user(user("u-1", "root", Role::SuperAdmin, AccountStatus::Approved))
            .await
            .expect("save admin");

        let agency = agent("a-1", "Agency", AccountStatus::Approved);
        repo.save_agent(agency.clone()).await.expect("save agency");
        repo.save_agent(agent("a-2", "Rejected Co", AccountStatus::Rejected))
            .await
            .expect("save rejected agent");

        let targets = repo.list_assignable().await.expect("list assignable");

        assert_eq!(targets.sales_users, vec![sam]);
        assert_eq!(targets.agents, vec![agency]);
        pool.close().await;
    }

    #[tokio::test]
    async fn save_user_updates_existing_rows() {
        let pool = setup_pool().await;
        let repo = SqlDirectoryRepository::new(pool.clone());

        repo.save_user(user("s-1", "sam", Role::FactorySales, AccountStatus::Pending))
            .await
            .expect("save pending");
        let approved = user("s-1", "sam", Role::FactorySales, AccountStatus::Approved);
        repo.save_user(approved.clone()).await.expect("approve");

        assert_eq!(repo.find_user("s-1").await.expect("find user"), Some(approved));
        assert_eq!(repo.find_agent("s-1").await.expect("find agent"), None);
        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn user(id: &str, username: &str, role: Role, status: AccountStatus) -> SalesUser {
        SalesUser { id: id.to_string(), username: username.to_string(), role, status }
    }

    fn agent(id: &str, company: &str, status: AccountStatus) -> AgentAccount {
        AgentAccount {
            id: id.to_string(),
            company_name: company.to_string(),
            contact_person: "Lee".to_string(),
            status,
        }
    }
}
