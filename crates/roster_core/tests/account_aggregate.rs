mod common;

use common::{count_children, count_roots, open_store};
use roster_core::{
    Account, AccountClaim, AccountRepository, Certificate, LinkedAccount, PasswordResetSecret,
    RepositoryConfig, StoreError, TwoFactorToken,
};
use rusqlite::Connection;
use uuid::Uuid;

fn sample_account() -> Account {
    let mut account = Account::new("default", "alice");
    account.email = Some("alice@example.test".to_string());
    account.mobile_phone = Some("555-0100".to_string());
    account.verification_key = Some("verify-alice".to_string());
    account.is_login_allowed = true;
    account.created_at = 1_700_000_000_000;
    account
}

#[test]
fn create_returns_empty_collections_and_zero_key() {
    let mut conn = open_store();
    let repo = AccountRepository::new(&mut conn).unwrap();

    let account = repo.create();
    assert_eq!(account.key, 0);
    assert!(account.certificates.is_empty());
    assert!(account.claims.is_empty());
    assert!(account.linked_accounts.is_empty());
    assert!(account.two_factor_tokens.is_empty());
    assert!(account.password_reset_secrets.is_empty());
}

#[test]
fn add_then_get_by_id_round_trips_scalars_and_children() {
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut account = sample_account();
    account.certificates.push(Certificate::new("aa11", "CN=alice"));
    account.certificates.push(Certificate::new("bb22", "CN=alice-backup"));
    account.claims.push(AccountClaim::new("role", "admin"));
    account
        .linked_accounts
        .push(LinkedAccount::new("github", "alice-gh"));
    account
        .two_factor_tokens
        .push(TwoFactorToken::new("token-1", 1_700_000_100_000));
    // password_reset_secrets intentionally left empty.

    repo.add(&mut account).unwrap();
    assert!(account.key > 0);

    let loaded = repo.get_by_id(account.id).unwrap().unwrap();
    assert_eq!(loaded.key, account.key);
    assert_eq!(loaded.id, account.id);
    assert_eq!(loaded.tenant, "default");
    assert_eq!(loaded.username, "alice");
    assert_eq!(loaded.email.as_deref(), Some("alice@example.test"));
    assert_eq!(loaded.mobile_phone.as_deref(), Some("555-0100"));
    assert_eq!(loaded.verification_key.as_deref(), Some("verify-alice"));
    assert!(loaded.is_login_allowed);
    assert_eq!(loaded.created_at, 1_700_000_000_000);

    assert_eq!(loaded.certificates.len(), 2);
    for (stored, expected) in loaded.certificates.iter().zip(&account.certificates) {
        assert!(stored.key > 0);
        assert_eq!(stored.parent_key, account.key);
        assert_eq!(stored.thumbprint, expected.thumbprint);
        assert_eq!(stored.subject, expected.subject);
    }

    assert_eq!(loaded.claims.len(), 1);
    assert!(loaded.claims[0].key > 0);
    assert_eq!(loaded.claims[0].parent_key, account.key);
    assert_eq!(loaded.claims[0].claim_type, "role");
    assert_eq!(loaded.claims[0].claim_value, "admin");

    assert_eq!(loaded.linked_accounts.len(), 1);
    assert_eq!(loaded.linked_accounts[0].provider_name, "github");
    assert_eq!(loaded.two_factor_tokens.len(), 1);
    assert_eq!(loaded.two_factor_tokens[0].token, "token-1");
    assert!(loaded.password_reset_secrets.is_empty());
}

#[test]
fn add_stamps_parent_keys_onto_in_memory_children() {
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut account = sample_account();
    account.claims.push(AccountClaim::new("role", "admin"));
    account.claims.push(AccountClaim::new("plan", "pro"));

    repo.add(&mut account).unwrap();
    for claim in &account.claims {
        assert_eq!(claim.parent_key, account.key);
    }
}

#[test]
fn get_by_id_of_unknown_account_returns_none() {
    let mut conn = open_store();
    let repo = AccountRepository::new(&mut conn).unwrap();
    assert!(repo.get_by_id(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn lookup_predicates_resolve_the_right_account() {
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut alice = sample_account();
    alice.certificates.push(Certificate::new("aa11", "CN=alice"));
    alice
        .linked_accounts
        .push(LinkedAccount::new("github", "alice-gh"));
    repo.add(&mut alice).unwrap();

    let mut bob = Account::new("other", "bob");
    bob.email = Some("bob@example.test".to_string());
    repo.add(&mut bob).unwrap();

    let by_username = repo.get_by_username("alice").unwrap().unwrap();
    assert_eq!(by_username.id, alice.id);
    assert_eq!(by_username.certificates.len(), 1);

    let by_tenant = repo
        .get_by_username_in_tenant("default", "alice")
        .unwrap()
        .unwrap();
    assert_eq!(by_tenant.id, alice.id);
    assert!(repo
        .get_by_username_in_tenant("other", "alice")
        .unwrap()
        .is_none());

    let by_email = repo
        .get_by_email("default", "alice@example.test")
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, alice.id);

    let by_phone = repo
        .get_by_mobile_phone("default", "555-0100")
        .unwrap()
        .unwrap();
    assert_eq!(by_phone.id, alice.id);

    let by_verification = repo
        .get_by_verification_key("verify-alice")
        .unwrap()
        .unwrap();
    assert_eq!(by_verification.id, alice.id);

    let by_certificate = repo.get_by_certificate("default", "aa11").unwrap().unwrap();
    assert_eq!(by_certificate.id, alice.id);
    assert!(repo.get_by_certificate("other", "aa11").unwrap().is_none());

    let by_link = repo
        .get_by_linked_account("default", "github", "alice-gh")
        .unwrap()
        .unwrap();
    assert_eq!(by_link.id, alice.id);
    assert!(repo
        .get_by_linked_account("default", "github", "bob-gh")
        .unwrap()
        .is_none());
}

#[test]
fn blank_arguments_fail_before_any_store_access() {
    // No schema on purpose: if validation ever reached the store, these
    // calls would surface a missing-table error instead.
    let mut conn = Connection::open_in_memory().unwrap();
    let repo = AccountRepository::new(&mut conn).unwrap();

    let cases: Vec<(StoreError, &str)> = vec![
        (repo.get_by_username("   ").unwrap_err(), "username"),
        (
            repo.get_by_username_in_tenant("", "alice").unwrap_err(),
            "tenant",
        ),
        (repo.get_by_email("default", " ").unwrap_err(), "email"),
        (
            repo.get_by_mobile_phone("default", "").unwrap_err(),
            "phone",
        ),
        (repo.get_by_verification_key("\t").unwrap_err(), "key"),
        (
            repo.get_by_certificate("default", "  ").unwrap_err(),
            "thumbprint",
        ),
        (
            repo.get_by_linked_account("default", "github", "")
                .unwrap_err(),
            "id",
        ),
    ];

    for (err, expected) in cases {
        match err {
            StoreError::InvalidArgument { param, .. } => assert_eq!(param, expected),
            other => panic!("expected InvalidArgument, got {other}"),
        }
    }
}

#[test]
fn remove_deletes_children_and_root() {
    let mut conn = open_store();
    let key;
    {
        let mut repo = AccountRepository::new(&mut conn).unwrap();
        let mut account = sample_account();
        account.certificates.push(Certificate::new("aa11", "CN=alice"));
        account.certificates.push(Certificate::new("bb22", "CN=alice-backup"));
        account.claims.push(AccountClaim::new("role", "admin"));
        account
            .password_reset_secrets
            .push(PasswordResetSecret::new("first pet", "rex"));
        repo.add(&mut account).unwrap();
        key = account.key;

        repo.remove(&account).unwrap();
        assert!(repo.get_by_id(account.id).unwrap().is_none());
    }

    for table in [
        "account_certificates",
        "account_claims",
        "linked_accounts",
        "two_factor_tokens",
        "password_reset_secrets",
    ] {
        assert_eq!(count_children(&conn, table, key), 0, "table {table}");
    }
    assert_eq!(count_roots(&conn, "accounts", key), 0);
}

#[test]
fn table_overrides_are_applied_once_at_construction() {
    let mut conn = open_store();
    conn.execute_batch(
        "CREATE TABLE \"members\" (
             \"key\" INTEGER PRIMARY KEY AUTOINCREMENT,
             \"id\" TEXT NOT NULL UNIQUE,
             \"tenant\" TEXT NOT NULL,
             \"username\" TEXT NOT NULL,
             \"email\" TEXT,
             \"mobile_phone\" TEXT,
             \"verification_key\" TEXT,
             \"is_login_allowed\" INTEGER NOT NULL DEFAULT 0,
             \"created_at\" INTEGER NOT NULL DEFAULT 0
         );
         CREATE TABLE \"member_certificates\" (
             \"key\" INTEGER PRIMARY KEY AUTOINCREMENT,
             \"parent_key\" INTEGER NOT NULL,
             \"thumbprint\" TEXT NOT NULL,
             \"subject\" TEXT NOT NULL
         );",
    )
    .unwrap();

    let config = RepositoryConfig::new()
        .root_table("members")
        .child_table::<Certificate>("member_certificates");
    let mut repo = AccountRepository::with_config(&mut conn, config).unwrap();

    let mut account = sample_account();
    account.certificates.push(Certificate::new("cc33", "CN=alice"));
    repo.add(&mut account).unwrap();

    let loaded = repo.get_by_id(account.id).unwrap().unwrap();
    assert_eq!(loaded.certificates.len(), 1);
    assert_eq!(loaded.certificates[0].thumbprint, "cc33");
}

#[test]
fn blank_table_override_is_rejected_at_construction() {
    let mut conn = open_store();
    let config = RepositoryConfig::new().child_table::<Certificate>("   ");
    let err = AccountRepository::with_config(&mut conn, config).unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidArgument { param: "table", .. }
    ));
}

#[test]
fn account_serializes_and_deserializes_with_children() {
    let mut account = sample_account();
    account.certificates.push(Certificate::new("aa11", "CN=alice"));
    account.claims.push(AccountClaim::new("role", "admin"));

    let json = serde_json::to_string(&account).unwrap();
    let restored: Account = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, account);
}
