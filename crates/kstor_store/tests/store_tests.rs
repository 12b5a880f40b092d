//! Repository tests against a real on-disk SQLite database.

use tempfile::TempDir;

use kstor_crypto::generate_keypair;
use kstor_model::{ActivationToken, KeychainItem, Secret, User, UserStatus};
use kstor_store::Store;

async fn open_store() -> (TempDir, Store) {
    let dir = TempDir::new().expect("tempdir");
    let store = Store::open(&dir.path().join("kstor.db"))
        .await
        .expect("open store");
    (dir, store)
}

/// Create an initialized user and persist everything.
async fn make_user(store: &Store, login: &str, status: UserStatus) -> User {
    let mut tx = store.begin().await.unwrap();
    let id = store
        .create_user(&mut tx, login, login, status)
        .await
        .unwrap();
    let mut user = User::new(id, login, login, status);
    user.reset_password("pw").unwrap();
    store.save_user_crypto(&mut tx, &user).await.unwrap();
    tx.commit().await.unwrap();
    user
}

/// Create a group and enroll `owner` as its first member.
async fn make_group(store: &Store, name: &str, owner: &User) -> (kstor_model::Group, kstor_crypto::BoxSecretKey) {
    let (group_pubk, group_privk) = generate_keypair();
    let mut tx = store.begin().await.unwrap();
    let group = store.create_group(&mut tx, name, &group_pubk).await.unwrap();
    let item = KeychainItem::seal_for(group.id, &group_pubk, &group_privk, owner.pubk().unwrap())
        .unwrap();
    store
        .add_group_member(&mut tx, owner.id, group.id, &item.encrypted_privk)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    (group, group_privk)
}

async fn share_secret(store: &Store, author: &User, group_ids: &[i64]) -> i64 {
    let mut tx = store.begin().await.unwrap();
    let secret_id = store
        .create_secret(&mut tx, author.id, author.id)
        .await
        .unwrap();
    for group_id in group_ids {
        let group = store.group_by_id(&mut tx, *group_id).await.unwrap().unwrap();
        let ct = Secret::seal_value(&group.pubk, author.privk().unwrap(), b"p@ss").unwrap();
        let meta_ct =
            Secret::seal_metadata(&group.pubk, author.privk().unwrap(), &Default::default())
                .unwrap();
        store
            .insert_secret_value(&mut tx, secret_id, *group_id, &ct, &meta_ct)
            .await
            .unwrap();
    }
    tx.commit().await.unwrap();
    secret_id
}

#[tokio::test]
async fn user_crypto_roundtrip_with_keychain() {
    let (_dir, store) = open_store().await;
    let alice = make_user(&store, "alice", UserStatus::Admin).await;
    let (group, _gk) = make_group(&store, "ops", &alice).await;

    let mut tx = store.begin().await.unwrap();
    let loaded = store
        .user_by_login(&mut tx, "alice")
        .await
        .unwrap()
        .expect("alice exists");
    assert!(loaded.is_initialized());
    assert!(!loaded.is_unlocked());
    assert_eq!(loaded.keychain.len(), 1);
    assert!(loaded.keychain.contains_key(&group.id));

    // The persisted keychain item opens with the user's passphrase.
    let mut loaded = loaded;
    let key = loaded.secret_key("pw").unwrap();
    loaded.unlock(&key).unwrap();
    assert!(loaded.keychain.get(&group.id).unwrap().privk.is_some());
}

#[tokio::test]
async fn non_member_sees_no_secrets() {
    let (_dir, store) = open_store().await;
    let alice = make_user(&store, "alice", UserStatus::Admin).await;
    let bob = make_user(&store, "bob", UserStatus::Active).await;
    let (group, _gk) = make_group(&store, "ops", &alice).await;
    let secret_id = share_secret(&store, &alice, &[group.id]).await;

    let mut tx = store.begin().await.unwrap();
    let alice_view = store.secrets_for_user(&mut tx, alice.id).await.unwrap();
    assert_eq!(alice_view.len(), 1);
    assert_eq!(alice_view[0].id, secret_id);

    let bob_view = store.secrets_for_user(&mut tx, bob.id).await.unwrap();
    assert!(bob_view.is_empty());
    assert!(store
        .secret_for_user(&mut tx, bob.id, secret_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn multi_group_secret_is_one_row_with_lowest_group() {
    let (_dir, store) = open_store().await;
    let alice = make_user(&store, "alice", UserStatus::Admin).await;
    let (g1, _) = make_group(&store, "ops", &alice).await;
    let (g2, _) = make_group(&store, "dev", &alice).await;
    let secret_id = share_secret(&store, &alice, &[g1.id, g2.id]).await;

    let mut tx = store.begin().await.unwrap();
    let view = store.secrets_for_user(&mut tx, alice.id).await.unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].group_id, g1.id.min(g2.id));

    let groups = store.groups_of_secret(&mut tx, secret_id).await.unwrap();
    assert_eq!(groups.len(), 2);
}

#[tokio::test]
async fn removing_membership_hides_secrets() {
    let (_dir, store) = open_store().await;
    let alice = make_user(&store, "alice", UserStatus::Admin).await;
    let (group, _gk) = make_group(&store, "ops", &alice).await;
    let secret_id = share_secret(&store, &alice, &[group.id]).await;

    let mut tx = store.begin().await.unwrap();
    assert!(store
        .remove_group_member(&mut tx, group.id, alice.id)
        .await
        .unwrap());
    assert!(store
        .secret_for_user(&mut tx, alice.id, secret_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn group_delete_cascades_to_memberships_and_values() {
    let (_dir, store) = open_store().await;
    let alice = make_user(&store, "alice", UserStatus::Admin).await;
    let (group, _gk) = make_group(&store, "ops", &alice).await;
    let secret_id = share_secret(&store, &alice, &[group.id]).await;

    let mut tx = store.begin().await.unwrap();
    assert!(store.delete_group(&mut tx, group.id).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = store.user_by_id(&mut tx, alice.id).await.unwrap().unwrap();
    assert!(loaded.keychain.is_empty());
    assert!(store
        .groups_of_secret(&mut tx, secret_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn secret_delete_cascades_to_values() {
    let (_dir, store) = open_store().await;
    let alice = make_user(&store, "alice", UserStatus::Admin).await;
    let (group, _gk) = make_group(&store, "ops", &alice).await;
    let secret_id = share_secret(&store, &alice, &[group.id]).await;

    let mut tx = store.begin().await.unwrap();
    assert!(store.delete_secret(&mut tx, secret_id).await.unwrap());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM secret_values")
        .fetch_one(&mut *tx)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn status_change_invalidates_cached_user() {
    let (_dir, store) = open_store().await;
    let alice = make_user(&store, "alice", UserStatus::Admin).await;

    let mut tx = store.begin().await.unwrap();
    // Prime the cache.
    let cached = store.user_by_id(&mut tx, alice.id).await.unwrap().unwrap();
    assert_eq!(cached.status, UserStatus::Admin);

    store
        .set_user_status(&mut tx, alice.id, UserStatus::Archived)
        .await
        .unwrap();
    let reloaded = store.user_by_id(&mut tx, alice.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, UserStatus::Archived);
}

#[tokio::test]
async fn activation_tokens_roundtrip_and_purge() {
    let (_dir, store) = open_store().await;
    let bob = make_user(&store, "bob", UserStatus::New).await;

    let token = ActivationToken::generate(bob.id, 3600);
    let mut tx = store.begin().await.unwrap();
    store.create_activation(&mut tx, &token).await.unwrap();
    let found = store.activations_for_user(&mut tx, bob.id).await.unwrap();
    assert_eq!(found, vec![token]);

    store.purge_activations(&mut tx, bob.id).await.unwrap();
    assert!(store
        .activations_for_user(&mut tx, bob.id)
        .await
        .unwrap()
        .is_empty());
}
