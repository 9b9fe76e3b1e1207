use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use leadflow_core::domain::customer::{CustomerProgress, PartyRef};
use leadflow_core::domain::history::{
    AssignmentHistory, AssignmentHistoryFilter, AssignmentOperation, HistoryId, ProgressHistory,
    ProgressHistoryFilter,
};

use super::{
    encode_timestamp, parse_timestamp, AssignmentHistoryRepository, ProgressHistoryRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlAssignmentHistoryRepository {
    pool: DbPool,
}

impl SqlAssignmentHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AssignmentHistoryRepository for SqlAssignmentHistoryRepository {
    async fn append(&self, entry: AssignmentHistory) -> Result<(), RepositoryError> {
        let (from_sales_id, from_sales_name) = party_columns(entry.from_sales.as_ref());
        let (from_agent_id, from_agent_name) = party_columns(entry.from_agent.as_ref());
        let (to_sales_id, to_sales_name) = party_columns(entry.to_sales.as_ref());
        let (to_agent_id, to_agent_name) = party_columns(entry.to_agent.as_ref());

        sqlx::query(
            "INSERT INTO customer_assignment_history (
                id,
                customer_id,
                customer_name,
                from_sales_id,
                from_sales_name,
                from_agent_id,
                from_agent_name,
                to_sales_id,
                to_sales_name,
                to_agent_id,
                to_agent_name,
                operator_id,
                operator_name,
                operation_type,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id.0)
        .bind(&entry.customer_id)
        .bind(&entry.customer_name)
        .bind(from_sales_id)
        .bind(from_sales_name)
        .bind(from_agent_id)
        .bind(from_agent_name)
        .bind(to_sales_id)
        .bind(to_sales_name)
        .bind(to_agent_id)
        .bind(to_agent_name)
        .bind(&entry.operator.id)
        .bind(&entry.operator.name)
        .bind(entry.operation.as_str())
        .bind(encode_timestamp(entry.created_at))
        .bind(encode_timestamp(entry.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        filter: &AssignmentHistoryFilter,
    ) -> Result<Vec<AssignmentHistory>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT
                id,
                customer_id,
                customer_name,
                from_sales_id,
                from_sales_name,
                from_agent_id,
                from_agent_name,
                to_sales_id,
                to_sales_name,
                to_agent_id,
                to_agent_name,
                operator_id,
                operator_name,
                operation_type,
                created_at,
                updated_at
             FROM customer_assignment_history
             WHERE 1 = 1",
        );

        if let Some(customer_id) = &filter.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        if let Some(operation) = filter.operation {
            query.push(" AND operation_type = ").push_bind(operation.as_str());
        }
        if let Some(start) = filter.start {
            query.push(" AND created_at >= ").push_bind(encode_timestamp(start));
        }
        if let Some(end) = filter.end {
            query.push(" AND created_at <= ").push_bind(encode_timestamp(end));
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(assignment_history_from_row).collect()
    }
}

pub struct SqlProgressHistoryRepository {
    pool: DbPool,
}

impl SqlProgressHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProgressHistoryRepository for SqlProgressHistoryRepository {
    async fn append(&self, entry: ProgressHistory) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customer_progress_history (
                id,
                customer_id,
                customer_name,
                from_progress,
                to_progress,
                operator_id,
                operator_name,
                remark,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id.0)
        .bind(&entry.customer_id)
        .bind(&entry.customer_name)
        .bind(entry.from_progress.as_str())
        .bind(entry.to_progress.as_str())
        .bind(&entry.operator.id)
        .bind(&entry.operator.name)
        .bind(&entry.remark)
        .bind(encode_timestamp(entry.created_at))
        .bind(encode_timestamp(entry.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        filter: &ProgressHistoryFilter,
    ) -> Result<Vec<ProgressHistory>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT
                id,
                customer_id,
                customer_name,
                from_progress,
                to_progress,
                operator_id,
                operator_name,
                remark,
                created_at,
                updated_at
             FROM customer_progress_history
             WHERE 1 = 1",
        );

        if let Some(customer_id) = &filter.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        if let Some(progress) = filter.progress {
            query
                .push(" AND (from_progress = ")
                .push_bind(progress.as_str())
                .push(" OR to_progress = ")
                .push_bind(progress.as_str())
                .push(")");
        }
        if let Some(start) = filter.start {
            query.push(" AND created_at >= ").push_bind(encode_timestamp(start));
        }
        if let Some(end) = filter.end {
            query.push(" AND created_at <= ").push_bind(encode_timestamp(end));
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(progress_history_from_row).collect()
    }
}

fn assignment_history_from_row(row: SqliteRow) -> Result<AssignmentHistory, RepositoryError> {
    let operation_raw = row.try_get::<String, _>("operation_type")?;
    let operation = AssignmentOperation::parse(&operation_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown assignment operation `{operation_raw}`"))
    })?;

    Ok(AssignmentHistory {
        id: HistoryId(row.try_get("id")?),
        customer_id: row.try_get("customer_id")?,
        customer_name: row.try_get("customer_name")?,
        from_sales: party(row.try_get("from_sales_id")?, row.try_get("from_sales_name")?),
        from_agent: party(row.try_get("from_agent_id")?, row.try_get("from_agent_name")?),
        to_sales: party(row.try_get("to_sales_id")?, row.try_get("to_sales_name")?),
        to_agent: party(row.try_get("to_agent_id")?, row.try_get("to_agent_name")?),
        operator: PartyRef { id: row.try_get("operator_id")?, name: row.try_get("operator_name")? },
        operation,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn progress_history_from_row(row: SqliteRow) -> Result<ProgressHistory, RepositoryError> {
    Ok(ProgressHistory {
        id: HistoryId(row.try_get("id")?),
        customer_id: row.try_get("customer_id")?,
        customer_name: row.try_get("customer_name")?,
        from_progress: decode_progress("from_progress", row.try_get("from_progress")?)?,
        to_progress: decode_progress("to_progress", row.try_get("to_progress")?)?,
        operator: PartyRef { id: row.try_get("operator_id")?, name: row.try_get("operator_name")? },
        remark: row.try_get("remark")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn decode_progress(column: &str, value: String) -> Result<CustomerProgress, RepositoryError> {
    CustomerProgress::parse(&value).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown progress in `{column}`: `{value}`"))
    })
}

fn party(id: Option<String>, name: Option<String>) -> Option<PartyRef> {
    id.filter(|id| !id.is_empty()).map(|id| PartyRef { id, name: name.unwrap_or_default() })
}

fn party_columns(party: Option<&PartyRef>) -> (Option<&str>, Option<&str>) {
    match party {
        Some(party) => (Some(party.id.as_str()), Some(party.name.as_str())),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use leadflow_core::domain::customer::{CustomerProgress, PartyRef};
    use leadflow_core::domain::history::{
        AssignmentHistory, AssignmentHistoryFilter, AssignmentOperation, HistoryId,
        ProgressHistory, ProgressHistoryFilter,
    };

    use super::{SqlAssignmentHistoryRepository, SqlProgressHistoryRepository};
    use crate::migrations;
    use crate::repositories::{AssignmentHistoryRepository, ProgressHistoryRepository};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn assignment_history_lists_newest_first_with_filters() {
        let pool = setup_pool().await;
        let repo = SqlAssignmentHistoryRepository::new(pool.clone());

        let first = assignment("c-1", AssignmentOperation::Assign, "2026-03-01T08:00:00Z");
        let second = assignment("c-1", AssignmentOperation::Claim, "2026-03-02T08:00:00Z");
        let other = assignment("c-2", AssignmentOperation::Assign, "2026-03-03T08:00:00Z");
        for entry in [&first, &second, &other] {
            repo.append(entry.clone()).await.expect("append history");
        }

        let for_customer = repo
            .list(&AssignmentHistoryFilter {
                customer_id: Some("c-1".to_string()),
                ..AssignmentHistoryFilter::default()
            })
            .await
            .expect("list history");
        assert_eq!(for_customer, vec![second.clone(), first.clone()]);

        let claims = repo
            .list(&AssignmentHistoryFilter {
                operation: Some(AssignmentOperation::Claim),
                ..AssignmentHistoryFilter::default()
            })
            .await
            .expect("list claims");
        assert_eq!(claims, vec![second]);

        let windowed = repo
            .list(&AssignmentHistoryFilter {
                start: Some(parse_ts("2026-03-02T12:00:00Z")),
                end: Some(parse_ts("2026-03-04T00:00:00Z")),
                ..AssignmentHistoryFilter::default()
            })
            .await
            .expect("list window");
        assert_eq!(windowed, vec![other]);
        pool.close().await;
    }

    #[tokio::test]
    async fn pool_entry_history_keeps_empty_destination() {
        let pool = setup_pool().await;
        let repo = SqlAssignmentHistoryRepository::new(pool.clone());
        let mut entry =
            assignment("c-9", AssignmentOperation::MoveToPublicPool, "2026-03-05T08:00:00Z");
        entry.to_sales = None;
        entry.to_agent = None;

        repo.append(entry.clone()).await.expect("append history");
        let listed = repo.list(&AssignmentHistoryFilter::default()).await.expect("list");

        assert_eq!(listed, vec![entry]);
        assert_eq!(listed[0].operation.as_str(), "移入公海池");
        pool.close().await;
    }

    #[tokio::test]
    async fn progress_history_filter_matches_either_side_of_the_transition() {
        let pool = setup_pool().await;
        let repo = SqlProgressHistoryRepository::new(pool.clone());

        let promoted = progress(
            CustomerProgress::InitialContact,
            CustomerProgress::Normal,
            "2026-03-01T08:00:00Z",
        );
        let pooled = progress(
            CustomerProgress::Normal,
            CustomerProgress::PublicPool,
            "2026-03-02T08:00:00Z",
        );
        let sampled = progress(
            CustomerProgress::PublicPool,
            CustomerProgress::SampleEvaluation,
            "2026-03-03T08:00:00Z",
        );
        for entry in [&promoted, &pooled, &sampled] {
            repo.append(entry.clone()).await.expect("append progress history");
        }

        let touching_pool = repo
            .list(&ProgressHistoryFilter {
                progress: Some(CustomerProgress::PublicPool),
                ..ProgressHistoryFilter::default()
            })
            .await
            .expect("list progress history");

        assert_eq!(touching_pool, vec![sampled, pooled]);
        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn assignment(
        customer_id: &str,
        operation: AssignmentOperation,
        at: &str,
    ) -> AssignmentHistory {
        let at = parse_ts(at);
        AssignmentHistory {
            id: HistoryId::generate(),
            customer_id: customer_id.to_string(),
            customer_name: "Acme Foods".to_string(),
            from_sales: Some(PartyRef::new("s-1", "Sam")),
            from_agent: None,
            to_sales: Some(PartyRef::new("s-2", "Sue")),
            to_agent: Some(PartyRef::new("a-1", "Agency")),
            operator: PartyRef::new("u-1", "Admin"),
            operation,
            created_at: at,
            updated_at: at,
        }
    }

    fn progress(from: CustomerProgress, to: CustomerProgress, at: &str) -> ProgressHistory {
        let at = parse_ts(at);
        ProgressHistory {
            id: HistoryId::generate(),
            customer_id: "c-1".to_string(),
            customer_name: "Acme Foods".to_string(),
            from_progress: from,
            to_progress: to,
            operator: PartyRef::new("u-1", "Admin"),
            remark: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("timestamp").with_timezone(&Utc)
    }
}
