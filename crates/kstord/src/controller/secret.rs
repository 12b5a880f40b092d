//! Secret operations.
//!
//! Every operation requires an unlocked user. Reachability is delegated to
//! the repository (membership-scoped queries); anything unreachable is
//! reported as `SECRET/NOTFOUND`, whether it exists or not.
//!
//! Mutations fan the re-encryption out over every sharing group BEFORE the
//! first write, so a failure mid-way leaves the stored ciphertext intact.

use std::collections::HashMap;

use sqlx::SqliteConnection;

use kstor_crypto::ArmoredPublicKey;
use kstor_model::Secret;
use kstor_proto::{Request, Response, SecretMeta, SecretSummary};
use kstor_store::Store;

use crate::controller::{group_summary, user_summary, Ctx};
use crate::error::Error;

pub async fn handle(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    request: &Request,
) -> Result<Response, Error> {
    match request {
        Request::SecretCreate {
            plaintext,
            group_ids,
            meta,
        } => create(conn, ctx, plaintext, group_ids, meta).await,
        Request::SecretSearch { meta } => search(conn, ctx, meta).await,
        Request::SecretUnlock { secret_id } => unlock(conn, ctx, *secret_id).await,
        Request::SecretUpdateMeta { secret_id, meta } => {
            update_meta(conn, ctx, *secret_id, meta).await
        }
        Request::SecretUpdateValue {
            secret_id,
            plaintext,
        } => update_value(conn, ctx, *secret_id, plaintext).await,
        Request::SecretDelete { secret_id } => delete(conn, ctx, *secret_id).await,
        other => Err(Error::UnknownRequest(other.wire_type().to_string())),
    }
}

async fn create(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    plaintext: &str,
    group_ids: &[i64],
    meta: &SecretMeta,
) -> Result<Response, Error> {
    if group_ids.is_empty() {
        return Err(Error::MissingArgs(
            "secret_create".into(),
            "group_ids is empty".into(),
        ));
    }
    let privk = ctx.user.privk()?;

    // Seal for every group first; nothing is written until all succeed.
    let mut sealed = Vec::with_capacity(group_ids.len());
    for group_id in group_ids {
        let group = ctx
            .store
            .group_by_id(conn, *group_id)
            .await?
            .ok_or(Error::UnknownGroup(*group_id))?;
        let ciphertext = Secret::seal_value(&group.pubk, privk, plaintext.as_bytes())?;
        let encrypted_metadata = Secret::seal_metadata(&group.pubk, privk, meta)?;
        sealed.push((group.id, ciphertext, encrypted_metadata));
    }

    let secret_id = ctx
        .store
        .create_secret(conn, ctx.user.id, ctx.user.id)
        .await?;
    for (group_id, ciphertext, encrypted_metadata) in &sealed {
        ctx.store
            .insert_secret_value(conn, secret_id, *group_id, ciphertext, encrypted_metadata)
            .await?;
    }
    Ok(Response::SecretCreated { secret_id })
}

async fn search(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    pattern: &SecretMeta,
) -> Result<Response, Error> {
    if ctx.user.keychain.is_empty() {
        return Ok(Response::SecretList { secrets: vec![] });
    }

    let mut rows = ctx.store.secrets_for_user(conn, ctx.user.id).await?;
    let mut pubks: HashMap<i64, ArmoredPublicKey> = HashMap::new();
    let mut secrets = Vec::new();
    for secret in rows.iter_mut() {
        let Some(item) = ctx.user.keychain.get(&secret.group_id) else {
            continue;
        };
        let author_pubk =
            author_pubk(ctx.store, conn, &mut pubks, secret.meta_author_id).await?;
        let metadata = secret.unlock_metadata(&author_pubk, item.privk()?)?.clone();
        if metadata.matches(pattern) {
            secrets.push(SecretSummary {
                secret_id: secret.id,
                group_id: secret.group_id,
                metadata,
            });
        }
    }
    Ok(Response::SecretList { secrets })
}

async fn unlock(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    secret_id: i64,
) -> Result<Response, Error> {
    let mut secret = fetch_reachable(conn, ctx, secret_id).await?;
    let item = ctx
        .user
        .keychain
        .get(&secret.group_id)
        .ok_or(Error::SecretNotFound(secret_id))?;
    let group_privk = item.privk()?;

    let value_author = ctx
        .store
        .user_by_id(conn, secret.value_author_id)
        .await?
        .ok_or_else(|| Error::UnknownUser(secret.value_author_id.to_string()))?;
    let meta_author = if secret.meta_author_id == secret.value_author_id {
        value_author.clone()
    } else {
        ctx.store
            .user_by_id(conn, secret.meta_author_id)
            .await?
            .ok_or_else(|| Error::UnknownUser(secret.meta_author_id.to_string()))?
    };

    let plaintext = secret.unlock_value(value_author.pubk()?, group_privk)?.to_vec();
    let metadata = secret
        .unlock_metadata(meta_author.pubk()?, group_privk)?
        .clone();
    let groups = ctx
        .store
        .groups_of_secret(conn, secret.id)
        .await?
        .iter()
        .map(group_summary)
        .collect();

    Ok(Response::SecretValue {
        secret_id: secret.id,
        plaintext: String::from_utf8_lossy(&plaintext).into_owned(),
        metadata,
        value_author: user_summary(&value_author),
        meta_author: user_summary(&meta_author),
        groups,
    })
}

async fn update_meta(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    secret_id: i64,
    partial: &SecretMeta,
) -> Result<Response, Error> {
    let mut secret = fetch_reachable(conn, ctx, secret_id).await?;
    let item = ctx
        .user
        .keychain
        .get(&secret.group_id)
        .ok_or(Error::SecretNotFound(secret_id))?;

    let mut pubks = HashMap::new();
    let meta_author_pubk =
        author_pubk(ctx.store, conn, &mut pubks, secret.meta_author_id).await?;
    let current = secret
        .unlock_metadata(&meta_author_pubk, item.privk()?)?
        .clone();
    let merged = current.merge(partial);

    let groups = ctx.store.groups_of_secret(conn, secret.id).await?;
    let privk = ctx.user.privk()?;
    let mut sealed = Vec::with_capacity(groups.len());
    for group in &groups {
        sealed.push((group.id, Secret::seal_metadata(&group.pubk, privk, &merged)?));
    }
    for (group_id, encrypted_metadata) in &sealed {
        ctx.store
            .set_meta_ciphertext(conn, secret.id, *group_id, encrypted_metadata)
            .await?;
    }
    ctx.store.set_meta_author(conn, secret.id, ctx.user.id).await?;
    Ok(Response::SecretUpdated {
        secret_id: secret.id,
    })
}

async fn update_value(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    secret_id: i64,
    plaintext: &str,
) -> Result<Response, Error> {
    let secret = fetch_reachable(conn, ctx, secret_id).await?;

    let groups = ctx.store.groups_of_secret(conn, secret.id).await?;
    let privk = ctx.user.privk()?;
    let mut sealed = Vec::with_capacity(groups.len());
    for group in &groups {
        sealed.push((
            group.id,
            Secret::seal_value(&group.pubk, privk, plaintext.as_bytes())?,
        ));
    }
    for (group_id, ciphertext) in &sealed {
        ctx.store
            .set_value_ciphertext(conn, secret.id, *group_id, ciphertext)
            .await?;
    }
    ctx.store.set_value_author(conn, secret.id, ctx.user.id).await?;
    Ok(Response::SecretUpdated {
        secret_id: secret.id,
    })
}

async fn delete(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    secret_id: i64,
) -> Result<Response, Error> {
    let secret = fetch_reachable(conn, ctx, secret_id).await?;
    ctx.store.delete_secret(conn, secret.id).await?;
    Ok(Response::SecretDeleted {
        secret_id: secret.id,
    })
}

async fn fetch_reachable(
    conn: &mut SqliteConnection,
    ctx: &Ctx<'_>,
    secret_id: i64,
) -> Result<Secret, Error> {
    ctx.store
        .secret_for_user(conn, ctx.user.id, secret_id)
        .await?
        .ok_or(Error::SecretNotFound(secret_id))
}

async fn author_pubk(
    store: &Store,
    conn: &mut SqliteConnection,
    cache: &mut HashMap<i64, ArmoredPublicKey>,
    author_id: i64,
) -> Result<ArmoredPublicKey, Error> {
    if let Some(pubk) = cache.get(&author_id) {
        return Ok(pubk.clone());
    }
    let author = store
        .user_by_id(conn, author_id)
        .await?
        .ok_or_else(|| Error::UnknownUser(author_id.to_string()))?;
    let pubk = author.pubk()?.clone();
    cache.insert(author_id, pubk.clone());
    Ok(pubk)
}
