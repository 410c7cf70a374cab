//! Account repository: lookups and persistence for the account aggregate.
//!
//! # Responsibility
//! - Expose account-shaped entry points over the generic engine.
//! - Own the predicate SQL for each lookup; callers never see SQL text.
//!
//! # Invariants
//! - Every required string argument is validated before any store access.
//! - Predicate clauses interpolate identifiers only; scalar arguments bind
//!   as named parameters.

use crate::model::account::{Account, Certificate, LinkedAccount};
use crate::repo::engine::{AggregateRepository, RepositoryConfig};
use crate::repo::tables::quote;
use crate::repo::{ensure_arg, StoreResult};
use rusqlite::types::Value;
use rusqlite::Connection;
use uuid::Uuid;

/// SQLite-backed repository for [`Account`] aggregates.
pub struct AccountRepository<'conn> {
    engine: AggregateRepository<'conn, Account>,
}

impl std::fmt::Debug for AccountRepository<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRepository").finish_non_exhaustive()
    }
}

impl<'conn> AccountRepository<'conn> {
    /// Constructs a repository with default table bindings.
    pub fn new(conn: &'conn mut Connection) -> StoreResult<Self> {
        Ok(Self {
            engine: AggregateRepository::new(conn)?,
        })
    }

    /// Constructs a repository, applying table-name overrides.
    pub fn with_config(conn: &'conn mut Connection, config: RepositoryConfig) -> StoreResult<Self> {
        Ok(Self {
            engine: AggregateRepository::with_config(conn, config)?,
        })
    }

    /// Allocates a new, unpersisted account with empty child collections.
    pub fn create(&self) -> Account {
        self.engine.create()
    }

    /// Gets an account by its external id.
    pub fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        self.engine.get_by_id(id)
    }

    /// Gets an account by username, across tenants.
    pub fn get_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        ensure_arg("username", username)?;
        let clause = format!(
            "{root}.{username} = :username",
            root = quote("root"),
            username = quote("username"),
        );
        let params = [(":username".to_string(), Value::Text(username.to_string()))];
        self.engine.find_one(&clause, &params)
    }

    /// Gets an account by tenant and username.
    pub fn get_by_username_in_tenant(
        &self,
        tenant: &str,
        username: &str,
    ) -> StoreResult<Option<Account>> {
        ensure_arg("tenant", tenant)?;
        ensure_arg("username", username)?;
        let clause = format!(
            "{root}.{tenant} = :tenant AND {root}.{username} = :username",
            root = quote("root"),
            tenant = quote("tenant"),
            username = quote("username"),
        );
        let params = [
            (":tenant".to_string(), Value::Text(tenant.to_string())),
            (":username".to_string(), Value::Text(username.to_string())),
        ];
        self.engine.find_one(&clause, &params)
    }

    /// Gets an account by tenant and email.
    pub fn get_by_email(&self, tenant: &str, email: &str) -> StoreResult<Option<Account>> {
        ensure_arg("tenant", tenant)?;
        ensure_arg("email", email)?;
        let clause = format!(
            "{root}.{tenant} = :tenant AND {root}.{email} = :email",
            root = quote("root"),
            tenant = quote("tenant"),
            email = quote("email"),
        );
        let params = [
            (":tenant".to_string(), Value::Text(tenant.to_string())),
            (":email".to_string(), Value::Text(email.to_string())),
        ];
        self.engine.find_one(&clause, &params)
    }

    /// Gets an account by tenant and mobile phone number.
    pub fn get_by_mobile_phone(&self, tenant: &str, phone: &str) -> StoreResult<Option<Account>> {
        ensure_arg("tenant", tenant)?;
        ensure_arg("phone", phone)?;
        let clause = format!(
            "{root}.{tenant} = :tenant AND {root}.{phone} = :phone",
            root = quote("root"),
            tenant = quote("tenant"),
            phone = quote("mobile_phone"),
        );
        let params = [
            (":tenant".to_string(), Value::Text(tenant.to_string())),
            (":phone".to_string(), Value::Text(phone.to_string())),
        ];
        self.engine.find_one(&clause, &params)
    }

    /// Gets an account by its pending verification key.
    pub fn get_by_verification_key(&self, key: &str) -> StoreResult<Option<Account>> {
        ensure_arg("key", key)?;
        let clause = format!(
            "{root}.{verification_key} = :key",
            root = quote("root"),
            verification_key = quote("verification_key"),
        );
        let params = [(":key".to_string(), Value::Text(key.to_string()))];
        self.engine.find_one(&clause, &params)
    }

    /// Gets an account owning a certificate with the given thumbprint.
    pub fn get_by_certificate(
        &self,
        tenant: &str,
        thumbprint: &str,
    ) -> StoreResult<Option<Account>> {
        ensure_arg("tenant", tenant)?;
        ensure_arg("thumbprint", thumbprint)?;
        let certificates = self.engine.child_table::<Certificate>()?;
        let clause = format!(
            "{root}.{tenant} = :tenant AND EXISTS (\
             SELECT 1 FROM {certificates} AS {cert} \
             WHERE {cert}.{parent_key} = {root}.{key} \
               AND {cert}.{thumbprint} = :thumbprint)",
            root = quote("root"),
            tenant = quote("tenant"),
            cert = quote("cert"),
            parent_key = quote("parent_key"),
            key = quote("key"),
            thumbprint = quote("thumbprint"),
        );
        let params = [
            (":tenant".to_string(), Value::Text(tenant.to_string())),
            (
                ":thumbprint".to_string(),
                Value::Text(thumbprint.to_string()),
            ),
        ];
        self.engine.find_one(&clause, &params)
    }

    /// Gets an account owning a linked login at the given provider.
    pub fn get_by_linked_account(
        &self,
        tenant: &str,
        provider: &str,
        id: &str,
    ) -> StoreResult<Option<Account>> {
        ensure_arg("tenant", tenant)?;
        ensure_arg("provider", provider)?;
        ensure_arg("id", id)?;
        let linked = self.engine.child_table::<LinkedAccount>()?;
        let clause = format!(
            "{root}.{tenant} = :tenant AND EXISTS (\
             SELECT 1 FROM {linked} AS {link} \
             WHERE {link}.{parent_key} = {root}.{key} \
               AND {link}.{provider_name} = :provider \
               AND {link}.{provider_account_id} = :id)",
            root = quote("root"),
            tenant = quote("tenant"),
            link = quote("link"),
            parent_key = quote("parent_key"),
            key = quote("key"),
            provider_name = quote("provider_name"),
            provider_account_id = quote("provider_account_id"),
        );
        let params = [
            (":tenant".to_string(), Value::Text(tenant.to_string())),
            (":provider".to_string(), Value::Text(provider.to_string())),
            (":id".to_string(), Value::Text(id.to_string())),
        ];
        self.engine.find_one(&clause, &params)
    }

    /// Inserts the account and its children atomically; assigns the key.
    pub fn add(&mut self, account: &mut Account) -> StoreResult<()> {
        self.engine.add(account)
    }

    /// Updates the account row and reconciles every child collection.
    pub fn update(&mut self, account: &Account) -> StoreResult<()> {
        self.engine.update(account)
    }

    /// Deletes the account and all of its children.
    pub fn remove(&mut self, account: &Account) -> StoreResult<()> {
        self.engine.remove(account)
    }
}
