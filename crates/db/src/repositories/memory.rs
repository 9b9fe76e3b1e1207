use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use leadflow_core::domain::auto_transfer::SystemConfig;
use leadflow_core::domain::customer::{Customer, CustomerId, CustomerProgress, PublicPoolFilter};
use leadflow_core::domain::directory::{AgentAccount, AssignableTargets, SalesUser};
use leadflow_core::domain::history::{
    AssignmentHistory, AssignmentHistoryFilter, ProgressHistory, ProgressHistoryFilter,
};
use leadflow_core::domain::operator::Operator;
use leadflow_core::domain::work_item::WorkItem;
use leadflow_core::lifecycle::{AssignmentUpdate, PoolEntryUpdate, PoolExitUpdate};

use super::{
    AssignmentHistoryRepository, CustomerRepository, DirectoryRepository,
    OperatorTokenRepository, ProgressHistoryRepository, RepositoryError, SystemConfigRepository,
    WorkItemRepository,
};

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn insert(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }

    async fn list_by_progress(
        &self,
        progress: CustomerProgress,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        let mut matching: Vec<Customer> =
            customers.values().filter(|customer| customer.progress == progress).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(matching)
    }

    async fn list_public_pool(
        &self,
        filter: &PublicPoolFilter,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        let mut matching: Vec<Customer> =
            customers.values().filter(|customer| filter.matches(customer)).cloned().collect();
        matching.sort_by(|a, b| {
            b.entered_pool_at().cmp(&a.entered_pool_at()).then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(matching)
    }

    async fn apply_assignment(
        &self,
        id: &CustomerId,
        update: &AssignmentUpdate,
    ) -> Result<bool, RepositoryError> {
        let mut customers = self.customers.write().await;
        let Some(customer) = customers.get_mut(&id.0) else {
            return Ok(false);
        };

        customer.related_sales = Some(update.sales.clone());
        customer.related_agent = update.agent.clone();
        customer.is_in_public_pool = false;
        customer.progress = update.progress;
        if let Some(at) = update.initial_contact_at {
            customer.initial_contact_at = Some(at);
        }
        customer.last_update_time = Some(update.at);
        customer.updated_at = update.at;
        Ok(true)
    }

    async fn update_progress(
        &self,
        id: &CustomerId,
        progress: CustomerProgress,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut customers = self.customers.write().await;
        let Some(customer) = customers.get_mut(&id.0) else {
            return Ok(false);
        };

        customer.progress = progress;
        if progress == CustomerProgress::InitialContact {
            customer.initial_contact_at = Some(at);
        }
        customer.last_update_time = Some(at);
        customer.updated_at = at;
        Ok(true)
    }

    async fn disable_namesakes(
        &self,
        name: &str,
        except: &CustomerId,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut customers = self.customers.write().await;
        let mut changed = 0;
        for customer in customers.values_mut().filter(|customer| {
            customer.name == name
                && customer.progress == CustomerProgress::InitialContact
                && customer.id != *except
        }) {
            customer.progress = CustomerProgress::Disabled;
            customer.last_update_time = Some(at);
            customer.updated_at = at;
            changed += 1;
        }
        Ok(changed)
    }

    async fn move_to_public_pool(
        &self,
        id: &CustomerId,
        update: &PoolEntryUpdate,
    ) -> Result<bool, RepositoryError> {
        let mut customers = self.customers.write().await;
        let Some(customer) = customers.get_mut(&id.0).filter(|c| !c.is_in_public_pool) else {
            return Ok(false);
        };

        customer.is_in_public_pool = true;
        customer.progress = CustomerProgress::PublicPool;
        customer.related_sales = None;
        customer.related_agent = None;
        customer.previous_owner = update.previous_owner.clone();
        if update.clear_contact {
            customer.contact_person.clear();
            customer.contact_phone.clear();
        }
        customer.last_update_time = Some(update.at);
        customer.updated_at = update.at;
        Ok(true)
    }

    async fn assign_from_public_pool(
        &self,
        id: &CustomerId,
        update: &PoolExitUpdate,
    ) -> Result<bool, RepositoryError> {
        let mut customers = self.customers.write().await;
        let Some(customer) = customers.get_mut(&id.0).filter(|c| c.is_in_public_pool) else {
            return Ok(false);
        };

        customer.related_sales = update.target.sales().cloned();
        customer.related_agent = update.target.agent().cloned();
        customer.is_in_public_pool = false;
        customer.progress = update.progress;
        customer.last_update_time = Some(update.at);
        customer.updated_at = update.at;
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryAssignmentHistoryRepository {
    entries: RwLock<Vec<AssignmentHistory>>,
}

#[async_trait::async_trait]
impl AssignmentHistoryRepository for InMemoryAssignmentHistoryRepository {
    async fn append(&self, entry: AssignmentHistory) -> Result<(), RepositoryError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list(
        &self,
        filter: &AssignmentHistoryFilter,
    ) -> Result<Vec<AssignmentHistory>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<AssignmentHistory> =
            entries.iter().filter(|entry| filter.matches(entry)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.0.cmp(&a.id.0)));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryProgressHistoryRepository {
    entries: RwLock<Vec<ProgressHistory>>,
}

#[async_trait::async_trait]
impl ProgressHistoryRepository for InMemoryProgressHistoryRepository {
    async fn append(&self, entry: ProgressHistory) -> Result<(), RepositoryError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list(
        &self,
        filter: &ProgressHistoryFilter,
    ) -> Result<Vec<ProgressHistory>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<ProgressHistory> =
            entries.iter().filter(|entry| filter.matches(entry)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.0.cmp(&a.id.0)));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryDirectoryRepository {
    users: RwLock<HashMap<String, SalesUser>>,
    agents: RwLock<HashMap<String, AgentAccount>>,
}

#[async_trait::async_trait]
impl DirectoryRepository for InMemoryDirectoryRepository {
    async fn find_user(&self, id: &str) -> Result<Option<SalesUser>, RepositoryError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_agent(&self, id: &str) -> Result<Option<AgentAccount>, RepositoryError> {
        Ok(self.agents.read().await.get(id).cloned())
    }

    async fn list_assignable(&self) -> Result<AssignableTargets, RepositoryError> {
        let mut sales_users: Vec<SalesUser> =
            self.users.read().await.values().filter(|user| user.is_assignable()).cloned().collect();
        sales_users.sort_by(|a, b| a.username.cmp(&b.username).then_with(|| a.id.cmp(&b.id)));

        let mut agents: Vec<AgentAccount> = self
            .agents
            .read()
            .await
            .values()
            .filter(|agent| agent.is_assignable())
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.company_name.cmp(&b.company_name).then_with(|| a.id.cmp(&b.id)));

        Ok(AssignableTargets { sales_users, agents })
    }

    async fn save_user(&self, user: SalesUser) -> Result<(), RepositoryError> {
        self.users.write().await.insert(user.id.clone(), user);
        Ok(())
    }

    async fn save_agent(&self, agent: AgentAccount) -> Result<(), RepositoryError> {
        self.agents.write().await.insert(agent.id.clone(), agent);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWorkItemRepository {
    items: RwLock<HashMap<String, WorkItem>>,
}

#[async_trait::async_trait]
impl WorkItemRepository for InMemoryWorkItemRepository {
    async fn has_visible_work_items(&self, customer_id: &str) -> Result<bool, RepositoryError> {
        let items = self.items.read().await;
        Ok(items.values().any(|item| item.customer_id == customer_id && !item.web_hidden))
    }

    async fn hide_all_for_customer(
        &self,
        customer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut items = self.items.write().await;
        let mut hidden = 0;
        for item in items
            .values_mut()
            .filter(|item| item.customer_id == customer_id && !item.web_hidden)
        {
            item.web_hidden = true;
            item.updated_at = at;
            hidden += 1;
        }
        Ok(hidden)
    }

    async fn save(&self, item: WorkItem) -> Result<(), RepositoryError> {
        self.items.write().await.insert(item.id.clone(), item);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySystemConfigRepository {
    configs: RwLock<HashMap<(String, String), SystemConfig>>,
}

#[async_trait::async_trait]
impl SystemConfigRepository for InMemorySystemConfigRepository {
    async fn find_enabled(
        &self,
        config_type: &str,
    ) -> Result<Option<SystemConfig>, RepositoryError> {
        let configs = self.configs.read().await;
        Ok(configs
            .values()
            .filter(|config| config.config_type == config_type && config.is_enabled)
            .max_by_key(|config| config.updated_at)
            .cloned())
    }

    async fn save(&self, config: SystemConfig) -> Result<(), RepositoryError> {
        let mut configs = self.configs.write().await;
        let key = (config.config_type.clone(), config.config_key.clone());
        let id = configs.get(&key).map(|existing| existing.id.clone());
        configs.insert(key, SystemConfig { id: id.unwrap_or(config.id.clone()), ..config });
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOperatorTokenRepository {
    tokens: RwLock<HashMap<String, (Operator, Option<DateTime<Utc>>)>>,
}

#[async_trait::async_trait]
impl OperatorTokenRepository for InMemoryOperatorTokenRepository {
    async fn find_operator(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Operator>, RepositoryError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .get(token_hash)
            .filter(|(_, expires_at)| expires_at.map_or(true, |expires_at| expires_at > now))
            .map(|(operator, _)| operator.clone()))
    }

    async fn save(
        &self,
        token_hash: &str,
        operator: Operator,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        self.tokens.write().await.insert(token_hash.to_string(), (operator, expires_at));
        Ok(())
    }
}
