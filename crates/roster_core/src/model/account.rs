//! Account aggregate model.
//!
//! # Responsibility
//! - Define the account root and its five owned child collections.
//!
//! # Invariants
//! - `id` is the stable caller-visible identity; `key` is store-assigned.
//! - Child collections are always present, possibly empty, never unset.

use crate::model::{flag_from_int, optional_text, parse_uuid};
use crate::repo::shape::{AggregateRoot, ChildBinding, ChildFieldAccess, ChildRecord, Record};
use crate::repo::StoreResult;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned surrogate key; `0` until persisted.
    #[serde(default)]
    pub key: i64,
    /// Stable external identifier.
    pub id: Uuid,
    pub tenant: String,
    pub username: String,
    pub email: Option<String>,
    pub mobile_phone: Option<String>,
    pub verification_key: Option<String>,
    pub is_login_allowed: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub certificates: Vec<Certificate>,
    pub claims: Vec<AccountClaim>,
    pub linked_accounts: Vec<LinkedAccount>,
    pub two_factor_tokens: Vec<TwoFactorToken>,
    pub password_reset_secrets: Vec<PasswordResetSecret>,
}

impl Account {
    /// Creates an unpersisted account with a generated external id.
    pub fn new(tenant: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant: tenant.into(),
            username: username.into(),
            ..Self::default()
        }
    }
}

impl Record for Account {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant",
        "username",
        "email",
        "mobile_phone",
        "verification_key",
        "is_login_allowed",
        "created_at",
    ];

    fn key(&self) -> i64 {
        self.key
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "id" => Value::Text(self.id.to_string()),
            "tenant" => Value::Text(self.tenant.clone()),
            "username" => Value::Text(self.username.clone()),
            "email" => optional_text(self.email.clone()),
            "mobile_phone" => optional_text(self.mobile_phone.clone()),
            "verification_key" => optional_text(self.verification_key.clone()),
            "is_login_allowed" => Value::Integer(i64::from(self.is_login_allowed)),
            "created_at" => Value::Integer(self.created_at),
            _ => Value::Null,
        }
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        let id_text: String = row.get("id")?;
        Ok(Self {
            key: row.get("key")?,
            id: parse_uuid(&id_text, "accounts.id")?,
            tenant: row.get("tenant")?,
            username: row.get("username")?,
            email: row.get("email")?,
            mobile_phone: row.get("mobile_phone")?,
            verification_key: row.get("verification_key")?,
            is_login_allowed: flag_from_int(
                row.get("is_login_allowed")?,
                "accounts.is_login_allowed",
            )?,
            created_at: row.get("created_at")?,
            certificates: Vec::new(),
            claims: Vec::new(),
            linked_accounts: Vec::new(),
            two_factor_tokens: Vec::new(),
            password_reset_secrets: Vec::new(),
        })
    }
}

impl AggregateRoot for Account {
    const DEFAULT_ROOT_TABLE: &'static str = "accounts";

    fn external_id(&self) -> Uuid {
        self.id
    }

    fn child_fields() -> &'static [&'static dyn ChildFieldAccess<Self>] {
        static CERTIFICATES: ChildBinding<Account, Certificate> = ChildBinding {
            field: "certificates",
            get: |account: &Account| &account.certificates,
            get_mut: |account: &mut Account| &mut account.certificates,
        };
        static CLAIMS: ChildBinding<Account, AccountClaim> = ChildBinding {
            field: "claims",
            get: |account: &Account| &account.claims,
            get_mut: |account: &mut Account| &mut account.claims,
        };
        static LINKED_ACCOUNTS: ChildBinding<Account, LinkedAccount> = ChildBinding {
            field: "linked_accounts",
            get: |account: &Account| &account.linked_accounts,
            get_mut: |account: &mut Account| &mut account.linked_accounts,
        };
        static TWO_FACTOR_TOKENS: ChildBinding<Account, TwoFactorToken> = ChildBinding {
            field: "two_factor_tokens",
            get: |account: &Account| &account.two_factor_tokens,
            get_mut: |account: &mut Account| &mut account.two_factor_tokens,
        };
        static PASSWORD_RESET_SECRETS: ChildBinding<Account, PasswordResetSecret> = ChildBinding {
            field: "password_reset_secrets",
            get: |account: &Account| &account.password_reset_secrets,
            get_mut: |account: &mut Account| &mut account.password_reset_secrets,
        };
        static FIELDS: [&'static dyn ChildFieldAccess<Account>; 5] = [
            &CERTIFICATES,
            &CLAIMS,
            &LINKED_ACCOUNTS,
            &TWO_FACTOR_TOKENS,
            &PASSWORD_RESET_SECRETS,
        ];
        &FIELDS
    }
}

/// Client certificate registered to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(default)]
    pub key: i64,
    #[serde(default)]
    pub parent_key: i64,
    pub thumbprint: String,
    pub subject: String,
}

impl Certificate {
    pub fn new(thumbprint: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            thumbprint: thumbprint.into(),
            subject: subject.into(),
            ..Self::default()
        }
    }
}

impl Record for Certificate {
    const COLUMNS: &'static [&'static str] = &["thumbprint", "subject"];

    fn key(&self) -> i64 {
        self.key
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "thumbprint" => Value::Text(self.thumbprint.clone()),
            "subject" => Value::Text(self.subject.clone()),
            _ => Value::Null,
        }
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        Ok(Self {
            key: row.get("key")?,
            parent_key: row.get("parent_key")?,
            thumbprint: row.get("thumbprint")?,
            subject: row.get("subject")?,
        })
    }
}

impl ChildRecord for Certificate {
    const DEFAULT_TABLE: &'static str = "account_certificates";

    fn parent_key(&self) -> i64 {
        self.parent_key
    }

    fn set_parent_key(&mut self, parent_key: i64) {
        self.parent_key = parent_key;
    }
}

/// Arbitrary claim attached to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClaim {
    #[serde(default)]
    pub key: i64,
    #[serde(default)]
    pub parent_key: i64,
    pub claim_type: String,
    pub claim_value: String,
}

impl AccountClaim {
    pub fn new(claim_type: impl Into<String>, claim_value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            claim_value: claim_value.into(),
            ..Self::default()
        }
    }
}

impl Record for AccountClaim {
    const COLUMNS: &'static [&'static str] = &["claim_type", "claim_value"];

    fn key(&self) -> i64 {
        self.key
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "claim_type" => Value::Text(self.claim_type.clone()),
            "claim_value" => Value::Text(self.claim_value.clone()),
            _ => Value::Null,
        }
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        Ok(Self {
            key: row.get("key")?,
            parent_key: row.get("parent_key")?,
            claim_type: row.get("claim_type")?,
            claim_value: row.get("claim_value")?,
        })
    }
}

impl ChildRecord for AccountClaim {
    const DEFAULT_TABLE: &'static str = "account_claims";

    fn parent_key(&self) -> i64 {
        self.parent_key
    }

    fn set_parent_key(&mut self, parent_key: i64) {
        self.parent_key = parent_key;
    }
}

/// External login provider linked to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    #[serde(default)]
    pub key: i64,
    #[serde(default)]
    pub parent_key: i64,
    pub provider_name: String,
    pub provider_account_id: String,
}

impl LinkedAccount {
    pub fn new(
        provider_name: impl Into<String>,
        provider_account_id: impl Into<String>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            provider_account_id: provider_account_id.into(),
            ..Self::default()
        }
    }
}

impl Record for LinkedAccount {
    const COLUMNS: &'static [&'static str] = &["provider_name", "provider_account_id"];

    fn key(&self) -> i64 {
        self.key
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "provider_name" => Value::Text(self.provider_name.clone()),
            "provider_account_id" => Value::Text(self.provider_account_id.clone()),
            _ => Value::Null,
        }
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        Ok(Self {
            key: row.get("key")?,
            parent_key: row.get("parent_key")?,
            provider_name: row.get("provider_name")?,
            provider_account_id: row.get("provider_account_id")?,
        })
    }
}

impl ChildRecord for LinkedAccount {
    const DEFAULT_TABLE: &'static str = "linked_accounts";

    fn parent_key(&self) -> i64 {
        self.parent_key
    }

    fn set_parent_key(&mut self, parent_key: i64) {
        self.parent_key = parent_key;
    }
}

/// Issued two-factor authentication token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorToken {
    #[serde(default)]
    pub key: i64,
    #[serde(default)]
    pub parent_key: i64,
    pub token: String,
    /// Unix epoch milliseconds.
    pub issued_at: i64,
}

impl TwoFactorToken {
    pub fn new(token: impl Into<String>, issued_at: i64) -> Self {
        Self {
            token: token.into(),
            issued_at,
            ..Self::default()
        }
    }
}

impl Record for TwoFactorToken {
    const COLUMNS: &'static [&'static str] = &["token", "issued_at"];

    fn key(&self) -> i64 {
        self.key
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "token" => Value::Text(self.token.clone()),
            "issued_at" => Value::Integer(self.issued_at),
            _ => Value::Null,
        }
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        Ok(Self {
            key: row.get("key")?,
            parent_key: row.get("parent_key")?,
            token: row.get("token")?,
            issued_at: row.get("issued_at")?,
        })
    }
}

impl ChildRecord for TwoFactorToken {
    const DEFAULT_TABLE: &'static str = "two_factor_tokens";

    fn parent_key(&self) -> i64 {
        self.parent_key
    }

    fn set_parent_key(&mut self, parent_key: i64) {
        self.parent_key = parent_key;
    }
}

/// Password reset challenge registered to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetSecret {
    #[serde(default)]
    pub key: i64,
    #[serde(default)]
    pub parent_key: i64,
    pub question: String,
    pub answer: String,
}

impl PasswordResetSecret {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            ..Self::default()
        }
    }
}

impl Record for PasswordResetSecret {
    const COLUMNS: &'static [&'static str] = &["question", "answer"];

    fn key(&self) -> i64 {
        self.key
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "question" => Value::Text(self.question.clone()),
            "answer" => Value::Text(self.answer.clone()),
            _ => Value::Null,
        }
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        Ok(Self {
            key: row.get("key")?,
            parent_key: row.get("parent_key")?,
            question: row.get("question")?,
            answer: row.get("answer")?,
        })
    }
}

impl ChildRecord for PasswordResetSecret {
    const DEFAULT_TABLE: &'static str = "password_reset_secrets";

    fn parent_key(&self) -> i64 {
        self.parent_key
    }

    fn set_parent_key(&mut self, parent_key: i64) {
        self.parent_key = parent_key;
    }
}
