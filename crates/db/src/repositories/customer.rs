use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use leadflow_core::domain::customer::{
    Customer, CustomerId, CustomerProgress, OwnerRef, PartyRef, PublicPoolFilter,
};
use leadflow_core::domain::operator::Role;
use leadflow_core::lifecycle::{AssignmentUpdate, PoolEntryUpdate, PoolExitUpdate};

use super::{
    encode_timestamp, parse_optional_timestamp, parse_timestamp, CustomerRepository,
    RepositoryError,
};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "id,
    name,
    nature,
    importance,
    application_field,
    address,
    contact_person,
    contact_phone,
    progress,
    owner_id,
    owner_name,
    owner_type,
    related_sales_id,
    related_sales_name,
    related_agent_id,
    related_agent_name,
    is_in_public_pool,
    previous_owner_id,
    previous_owner_name,
    previous_owner_type,
    initial_contact_time,
    last_update_time,
    created_at,
    updated_at";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(customer_from_row).transpose()
    }

    async fn insert(&self, customer: Customer) -> Result<(), RepositoryError> {
        let (owner_id, owner_name, owner_type) = owner_columns(customer.owner.as_ref());
        let (previous_id, previous_name, previous_type) =
            owner_columns(customer.previous_owner.as_ref());
        let (sales_id, sales_name) = party_columns(customer.related_sales.as_ref());
        let (agent_id, agent_name) = party_columns(customer.related_agent.as_ref());

        sqlx::query(&format!(
            "INSERT INTO customer ({CUSTOMER_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&customer.id.0)
        .bind(&customer.name)
        .bind(&customer.nature)
        .bind(&customer.importance)
        .bind(&customer.application_field)
        .bind(&customer.address)
        .bind(&customer.contact_person)
        .bind(&customer.contact_phone)
        .bind(customer.progress.as_str())
        .bind(owner_id)
        .bind(owner_name)
        .bind(owner_type)
        .bind(sales_id)
        .bind(sales_name)
        .bind(agent_id)
        .bind(agent_name)
        .bind(customer.is_in_public_pool)
        .bind(previous_id)
        .bind(previous_name)
        .bind(previous_type)
        .bind(customer.initial_contact_at.map(encode_timestamp))
        .bind(customer.last_update_time.map(encode_timestamp))
        .bind(encode_timestamp(customer.created_at))
        .bind(encode_timestamp(customer.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_progress(
        &self,
        progress: CustomerProgress,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE progress = ?
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(progress.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(customer_from_row).collect()
    }

    async fn list_public_pool(
        &self,
        filter: &PublicPoolFilter,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE is_in_public_pool = 1 AND progress = 'PUBLIC_POOL'"
        ));

        if let Some(keyword) = non_blank(filter.keyword.as_deref()) {
            query.push(" AND instr(lower(name), lower(").push_bind(keyword).push(")) > 0");
        }
        if let Some(field) = non_blank(filter.application_field.as_deref()) {
            query
                .push(" AND instr(lower(application_field), lower(")
                .push_bind(field)
                .push(")) > 0");
        }
        if let Some(nature) = non_blank(filter.nature.as_deref()) {
            query.push(" AND nature = ").push_bind(nature);
        }
        if let Some(importance) = non_blank(filter.importance.as_deref()) {
            query.push(" AND importance = ").push_bind(importance);
        }
        query.push(" ORDER BY COALESCE(last_update_time, updated_at) DESC, id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(customer_from_row).collect()
    }

    async fn apply_assignment(
        &self,
        id: &CustomerId,
        update: &AssignmentUpdate,
    ) -> Result<bool, RepositoryError> {
        let (agent_id, agent_name) = party_columns(update.agent.as_ref());
        let at = encode_timestamp(update.at);

        let result = sqlx::query(
            "UPDATE customer SET
                related_sales_id = ?,
                related_sales_name = ?,
                related_agent_id = ?,
                related_agent_name = ?,
                is_in_public_pool = 0,
                progress = ?,
                initial_contact_time = COALESCE(?, initial_contact_time),
                last_update_time = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&update.sales.id)
        .bind(&update.sales.name)
        .bind(agent_id)
        .bind(agent_name)
        .bind(update.progress.as_str())
        .bind(update.initial_contact_at.map(encode_timestamp))
        .bind(&at)
        .bind(&at)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_progress(
        &self,
        id: &CustomerId,
        progress: CustomerProgress,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let at = encode_timestamp(at);
        let result = sqlx::query(
            "UPDATE customer SET
                progress = ?,
                initial_contact_time = CASE WHEN ? THEN ? ELSE initial_contact_time END,
                last_update_time = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(progress.as_str())
        .bind(progress == CustomerProgress::InitialContact)
        .bind(&at)
        .bind(&at)
        .bind(&at)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn disable_namesakes(
        &self,
        name: &str,
        except: &CustomerId,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let at = encode_timestamp(at);
        let result = sqlx::query(
            "UPDATE customer SET progress = 'DISABLED', last_update_time = ?, updated_at = ?
             WHERE name = ? AND progress = 'INITIAL_CONTACT' AND id <> ?",
        )
        .bind(&at)
        .bind(&at)
        .bind(name)
        .bind(&except.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn move_to_public_pool(
        &self,
        id: &CustomerId,
        update: &PoolEntryUpdate,
    ) -> Result<bool, RepositoryError> {
        let (previous_id, previous_name, previous_type) =
            owner_columns(update.previous_owner.as_ref());
        let at = encode_timestamp(update.at);

        let result = sqlx::query(
            "UPDATE customer SET
                is_in_public_pool = 1,
                progress = 'PUBLIC_POOL',
                related_sales_id = NULL,
                related_sales_name = NULL,
                related_agent_id = NULL,
                related_agent_name = NULL,
                previous_owner_id = ?,
                previous_owner_name = ?,
                previous_owner_type = ?,
                contact_person = CASE WHEN ? THEN '' ELSE contact_person END,
                contact_phone = CASE WHEN ? THEN '' ELSE contact_phone END,
                last_update_time = ?,
                updated_at = ?
             WHERE id = ? AND is_in_public_pool = 0",
        )
        .bind(previous_id)
        .bind(previous_name)
        .bind(previous_type)
        .bind(update.clear_contact)
        .bind(update.clear_contact)
        .bind(&at)
        .bind(&at)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn assign_from_public_pool(
        &self,
        id: &CustomerId,
        update: &PoolExitUpdate,
    ) -> Result<bool, RepositoryError> {
        let (sales_id, sales_name) = party_columns(update.target.sales());
        let (agent_id, agent_name) = party_columns(update.target.agent());
        let at = encode_timestamp(update.at);

        let result = sqlx::query(
            "UPDATE customer SET
                related_sales_id = ?,
                related_sales_name = ?,
                related_agent_id = ?,
                related_agent_name = ?,
                is_in_public_pool = 0,
                progress = ?,
                last_update_time = ?,
                updated_at = ?
             WHERE id = ? AND is_in_public_pool = 1",
        )
        .bind(sales_id)
        .bind(sales_name)
        .bind(agent_id)
        .bind(agent_name)
        .bind(update.progress.as_str())
        .bind(&at)
        .bind(&at)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn customer_from_row(row: SqliteRow) -> Result<Customer, RepositoryError> {
    let progress_raw = row.try_get::<String, _>("progress")?;
    let progress = CustomerProgress::parse(&progress_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown customer progress `{progress_raw}`"))
    })?;

    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        name: row.try_get("name")?,
        nature: row.try_get("nature")?,
        importance: row.try_get("importance")?,
        application_field: row.try_get("application_field")?,
        address: row.try_get("address")?,
        contact_person: row.try_get("contact_person")?,
        contact_phone: row.try_get("contact_phone")?,
        progress,
        owner: owner_from_columns(
            "owner_type",
            row.try_get("owner_id")?,
            row.try_get("owner_name")?,
            row.try_get("owner_type")?,
        )?,
        related_sales: party_from_columns(
            row.try_get("related_sales_id")?,
            row.try_get("related_sales_name")?,
        ),
        related_agent: party_from_columns(
            row.try_get("related_agent_id")?,
            row.try_get("related_agent_name")?,
        ),
        is_in_public_pool: row.try_get("is_in_public_pool")?,
        previous_owner: owner_from_columns(
            "previous_owner_type",
            row.try_get("previous_owner_id")?,
            row.try_get("previous_owner_name")?,
            row.try_get("previous_owner_type")?,
        )?,
        initial_contact_at: parse_optional_timestamp(
            "initial_contact_time",
            row.try_get("initial_contact_time")?,
        )?,
        last_update_time: parse_optional_timestamp(
            "last_update_time",
            row.try_get("last_update_time")?,
        )?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn party_from_columns(id: Option<String>, name: Option<String>) -> Option<PartyRef> {
    id.filter(|id| !id.is_empty()).map(|id| PartyRef { id, name: name.unwrap_or_default() })
}

fn owner_from_columns(
    column: &str,
    id: Option<String>,
    name: Option<String>,
    role: Option<String>,
) -> Result<Option<OwnerRef>, RepositoryError> {
    let Some(id) = id.filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    let role_raw = role.unwrap_or_default();
    let role = Role::parse(&role_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown role in `{column}`: `{role_raw}`"))
    })?;

    Ok(Some(OwnerRef { id, name: name.unwrap_or_default(), role }))
}

fn party_columns(party: Option<&PartyRef>) -> (Option<&str>, Option<&str>) {
    match party {
        Some(party) => (Some(party.id.as_str()), Some(party.name.as_str())),
        None => (None, None),
    }
}

fn owner_columns(owner: Option<&OwnerRef>) -> (Option<&str>, Option<&str>, Option<&str>) {
    match owner {
        Some(owner) => {
            (Some(owner.id.as_str()), Some(owner.name.as_str()), Some(owner.role.as_str()))
        }
        None => (None, None, None),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
