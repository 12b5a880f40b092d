//! Group and user administration.
//!
//! Admin-only, except `user_change_password`, which any authenticated user
//! runs against their own account. Group membership is key possession: a
//! caller can only grant a group they can decrypt the private key of.

use glob_match::glob_match;
use sqlx::SqliteConnection;
use tracing::info;

use kstor_crypto::{derive_key, generate_keypair};
use kstor_model::activation::DEFAULT_LIFESPAN;
use kstor_model::{ActivationToken, KeychainItem, UserStatus};
use kstor_proto::{Request, Response, UserSummary};

use crate::controller::{group_summary, user_summary, Ctx};
use crate::error::Error;

pub async fn handle(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    request: &Request,
) -> Result<Response, Error> {
    match request {
        Request::GroupCreate { name } => group_create(conn, ctx, name).await,
        Request::GroupRename { group_id, name } => {
            group_rename(conn, ctx, *group_id, name).await
        }
        Request::GroupDelete { group_id } => group_delete(conn, ctx, *group_id).await,
        Request::GroupSearch { name } => group_search(conn, ctx, name).await,
        Request::GroupGet { group_id } => group_get(conn, ctx, *group_id).await,
        Request::GroupAddUser { group_id, user_id } => {
            group_add_user(conn, ctx, *group_id, *user_id).await
        }
        Request::GroupRemoveUser { group_id, user_id } => {
            group_remove_user(conn, ctx, *group_id, *user_id).await
        }
        Request::UserCreate {
            login,
            name,
            token_lifespan,
        } => user_create(conn, ctx, login, name, *token_lifespan).await,
        // Activation itself runs on the authentication path; reaching the
        // handler just acknowledges it.
        Request::UserActivate { .. } => Ok(Response::UserUpdated {
            user_id: ctx.user.id,
        }),
        Request::UserChangePassword { new_password } => {
            user_change_password(conn, ctx, new_password).await
        }
        other => Err(Error::UnknownRequest(other.wire_type().to_string())),
    }
}

fn require_admin(ctx: &Ctx<'_>) -> Result<(), Error> {
    if ctx.user.status == UserStatus::Admin {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

async fn group_create(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    name: &str,
) -> Result<Response, Error> {
    require_admin(ctx)?;
    let (group_pubk, group_privk) = generate_keypair();
    let group = ctx.store.create_group(conn, name, &group_pubk).await?;

    // The creator is the group's first member: seal the fresh private key
    // for them. Their in-memory keychain is NOT refreshed within this
    // request; the entry becomes visible on their next authentication.
    let item = KeychainItem::seal_for(group.id, &group_pubk, &group_privk, ctx.user.pubk()?)?;
    ctx.store
        .add_group_member(conn, ctx.user.id, group.id, &item.encrypted_privk)
        .await?;
    info!(group = %group.name, id = group.id, "group created");
    Ok(Response::GroupCreated {
        group_id: group.id,
        name: group.name,
    })
}

async fn group_rename(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    group_id: i64,
    name: &str,
) -> Result<Response, Error> {
    require_admin(ctx)?;
    if !ctx.store.rename_group(conn, group_id, name).await? {
        return Err(Error::UnknownGroup(group_id));
    }
    Ok(Response::GroupUpdated { group_id })
}

async fn group_delete(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    group_id: i64,
) -> Result<Response, Error> {
    require_admin(ctx)?;
    let group = ctx
        .store
        .group_by_id(conn, group_id)
        .await?
        .ok_or(Error::UnknownGroup(group_id))?;
    if ctx
        .store
        .other_member_count(conn, group.id, ctx.user.id)
        .await?
        > 0
    {
        return Err(Error::GroupHasMembers(group.id));
    }
    ctx.store.delete_group(conn, group.id).await?;
    info!(group = %group.name, id = group.id, "group deleted");
    Ok(Response::GroupDeleted { group_id: group.id })
}

async fn group_search(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    name: &str,
) -> Result<Response, Error> {
    require_admin(ctx)?;
    let pattern = name.to_ascii_lowercase();
    let groups = ctx
        .store
        .all_groups(conn)
        .await?
        .into_iter()
        .filter(|g| glob_match(&pattern, &g.name.to_ascii_lowercase()))
        .map(|g| group_summary(&g))
        .collect();
    Ok(Response::GroupList { groups })
}

async fn group_get(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    group_id: i64,
) -> Result<Response, Error> {
    require_admin(ctx)?;
    let group = ctx
        .store
        .group_by_id(conn, group_id)
        .await?
        .ok_or(Error::UnknownGroup(group_id))?;
    let members = ctx
        .store
        .group_members(conn, group.id)
        .await?
        .iter()
        .map(user_summary)
        .collect();
    Ok(Response::GroupInfo {
        group: group_summary(&group),
        members,
    })
}

async fn group_add_user(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    group_id: i64,
    user_id: i64,
) -> Result<Response, Error> {
    require_admin(ctx)?;
    let group = ctx
        .store
        .group_by_id(conn, group_id)
        .await?
        .ok_or(Error::UnknownGroup(group_id))?;

    // Granting membership means re-sealing the group key, which only an
    // existing member can decrypt.
    let item = ctx
        .user
        .keychain
        .get(&group.id)
        .ok_or_else(|| Error::UnknownGroupPrivk(ctx.user.login.clone(), group.id))?;
    let group_privk = item.privk()?;

    let target = ctx
        .store
        .user_by_id(conn, user_id)
        .await?
        .ok_or_else(|| Error::UnknownUser(user_id.to_string()))?;
    if target.keychain.contains_key(&group.id) {
        return Ok(Response::GroupUpdated { group_id: group.id });
    }
    let new_item = KeychainItem::seal_for(group.id, &group.pubk, group_privk, target.pubk()?)?;
    ctx.store
        .add_group_member(conn, target.id, group.id, &new_item.encrypted_privk)
        .await?;
    info!(group = group.id, user = %target.login, "user added to group");
    Ok(Response::GroupUpdated { group_id: group.id })
}

async fn group_remove_user(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    group_id: i64,
    user_id: i64,
) -> Result<Response, Error> {
    require_admin(ctx)?;
    ctx.store
        .group_by_id(conn, group_id)
        .await?
        .ok_or(Error::UnknownGroup(group_id))?;
    if !ctx.store.remove_group_member(conn, group_id, user_id).await? {
        return Err(Error::UnknownUser(user_id.to_string()));
    }
    info!(group = group_id, user = user_id, "user removed from group");
    Ok(Response::GroupUpdated { group_id })
}

async fn user_create(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    login: &str,
    name: &str,
    token_lifespan: Option<i64>,
) -> Result<Response, Error> {
    require_admin(ctx)?;
    let user_id = ctx
        .store
        .create_user(conn, login, name, UserStatus::New)
        .await?;
    let token = ActivationToken::generate(user_id, token_lifespan.unwrap_or(DEFAULT_LIFESPAN));
    ctx.store.create_activation(conn, &token).await?;
    info!(login, user_id, "user created, pending activation");
    Ok(Response::UserCreated {
        user: UserSummary {
            user_id,
            login: login.to_string(),
            name: name.to_string(),
            status: UserStatus::New.as_str().to_string(),
        },
        token: token.token,
        not_after: token.not_after,
    })
}

async fn user_change_password(
    conn: &mut SqliteConnection,
    ctx: &mut Ctx<'_>,
    new_password: &str,
) -> Result<Response, Error> {
    let new_key = derive_key(new_password, None)?;
    ctx.user.encrypt(&new_key)?;
    ctx.store.save_user_crypto(conn, ctx.user).await?;
    ctx.store.save_user_keychain(conn, ctx.user).await?;
    ctx.new_secret_key = Some(new_key);
    info!(login = %ctx.user.login, "passphrase changed");
    Ok(Response::UserPasswordChanged {
        user_id: ctx.user.id,
    })
}
