mod common;

use common::{count_children, open_store};
use roster_core::{Account, AccountClaim, AccountRepository, Certificate};

fn seeded_account(repo: &mut AccountRepository<'_>) -> Account {
    let mut account = Account::new("default", "alice");
    account.created_at = 1_700_000_000_000;
    account.claims.push(AccountClaim::new("role", "admin"));
    account.claims.push(AccountClaim::new("plan", "free"));
    repo.add(&mut account).unwrap();
    repo.get_by_id(account.id).unwrap().unwrap()
}

#[test]
fn update_diffs_collection_preserving_identity() {
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut account = seeded_account(&mut repo);
    let kept = account.claims[0].clone();
    let changed_key = account.claims[1].key;

    // Keep one claim, change the other's value, add a brand-new one.
    account.claims[1].claim_value = "pro".to_string();
    account.claims.push(AccountClaim::new("team", "core"));
    repo.update(&account).unwrap();

    let loaded = repo.get_by_id(account.id).unwrap().unwrap();
    assert_eq!(loaded.claims.len(), 3);

    let loaded_kept = loaded
        .claims
        .iter()
        .find(|claim| claim.claim_type == "role")
        .unwrap();
    assert_eq!(loaded_kept.key, kept.key);
    assert_eq!(loaded_kept.claim_value, "admin");

    let loaded_changed = loaded
        .claims
        .iter()
        .find(|claim| claim.claim_type == "plan")
        .unwrap();
    assert_eq!(loaded_changed.key, changed_key);
    assert_eq!(loaded_changed.claim_value, "pro");

    let loaded_new = loaded
        .claims
        .iter()
        .find(|claim| claim.claim_type == "team")
        .unwrap();
    assert!(loaded_new.key > 0);
    assert_ne!(loaded_new.key, kept.key);
    assert_ne!(loaded_new.key, changed_key);
}

#[test]
fn update_with_empty_collection_deletes_every_row() {
    let mut conn = open_store();
    let key;
    {
        let mut repo = AccountRepository::new(&mut conn).unwrap();
        let mut account = seeded_account(&mut repo);
        key = account.key;

        account.claims.clear();
        repo.update(&account).unwrap();

        let loaded = repo.get_by_id(account.id).unwrap().unwrap();
        assert!(loaded.claims.is_empty());
    }
    assert_eq!(count_children(&conn, "account_claims", key), 0);
}

#[test]
fn full_replacement_nets_to_delete_all_and_insert_all() {
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut account = seeded_account(&mut repo);
    let old_keys: Vec<i64> = account.claims.iter().map(|claim| claim.key).collect();

    account.claims.clear();
    account.claims.push(AccountClaim::new("scope", "read"));
    account.claims.push(AccountClaim::new("scope", "write"));
    repo.update(&account).unwrap();

    let loaded = repo.get_by_id(account.id).unwrap().unwrap();
    assert_eq!(loaded.claims.len(), 2);
    for claim in &loaded.claims {
        assert!(claim.key > 0);
        assert!(!old_keys.contains(&claim.key));
        assert_eq!(claim.claim_type, "scope");
    }
}

#[test]
fn scalar_only_update_leaves_children_untouched() {
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut account = seeded_account(&mut repo);
    let before: Vec<i64> = account.claims.iter().map(|claim| claim.key).collect();

    account.email = Some("alice@new.example.test".to_string());
    repo.update(&account).unwrap();

    let loaded = repo.get_by_id(account.id).unwrap().unwrap();
    assert_eq!(loaded.email.as_deref(), Some("alice@new.example.test"));
    let after: Vec<i64> = loaded.claims.iter().map(|claim| claim.key).collect();
    assert_eq!(after, before);
}

#[test]
fn failed_child_statement_rolls_back_the_root_update() {
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut account = Account::new("default", "alice");
    account
        .certificates
        .push(Certificate::new("aa11", "CN=alice"));
    repo.add(&mut account).unwrap();
    let mut account = repo.get_by_id(account.id).unwrap().unwrap();

    // Second certificate with a duplicate thumbprint violates the
    // per-parent uniqueness constraint mid-sync.
    account.username = "alice-renamed".to_string();
    account
        .certificates
        .push(Certificate::new("aa11", "CN=alice-dup"));
    assert!(repo.update(&account).is_err());

    let reloaded = repo.get_by_id(account.id).unwrap().unwrap();
    assert_eq!(reloaded.username, "alice");
    assert_eq!(reloaded.certificates.len(), 1);
    assert_eq!(reloaded.certificates[0].subject, "CN=alice");
}

#[test]
fn sync_reparents_a_child_carrying_a_foreign_key() {
    // Keys are store-assigned and never reused, so the synchronizer trusts
    // the surrogate key it is handed; a key borrowed from another parent
    // moves that row. This pins the documented behavior.
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut first = Account::new("default", "alice");
    first
        .certificates
        .push(Certificate::new("aa11", "CN=alice"));
    repo.add(&mut first).unwrap();
    let first = repo.get_by_id(first.id).unwrap().unwrap();

    let mut second = Account::new("default", "bob");
    repo.add(&mut second).unwrap();
    let mut second = repo.get_by_id(second.id).unwrap().unwrap();

    let stray = first.certificates[0].clone();
    second.certificates.push(stray.clone());
    repo.update(&second).unwrap();

    let first_after = repo.get_by_id(first.id).unwrap().unwrap();
    let second_after = repo.get_by_id(second.id).unwrap().unwrap();
    assert!(first_after.certificates.is_empty());
    assert_eq!(second_after.certificates.len(), 1);
    assert_eq!(second_after.certificates[0].key, stray.key);
    assert_eq!(second_after.certificates[0].parent_key, second_after.key);
}

#[test]
fn sync_applies_per_collection_independently() {
    let mut conn = open_store();
    let mut repo = AccountRepository::new(&mut conn).unwrap();

    let mut account = Account::new("default", "alice");
    account.claims.push(AccountClaim::new("role", "admin"));
    account
        .certificates
        .push(Certificate::new("aa11", "CN=alice"));
    repo.add(&mut account).unwrap();
    let mut account = repo.get_by_id(account.id).unwrap().unwrap();

    // Drop all claims while leaving certificates untouched.
    account.claims.clear();
    repo.update(&account).unwrap();

    let loaded = repo.get_by_id(account.id).unwrap().unwrap();
    assert!(loaded.claims.is_empty());
    assert_eq!(loaded.certificates.len(), 1);
}
