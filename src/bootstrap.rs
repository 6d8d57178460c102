use crate::{
    AppState,
    routes::user::model::{NewUser, Role, User, role_names},
    utils::hash_password,
};

/// Seeds the fixed role catalog and, when configured, a bootstrap admin
/// account. Safe to run on every startup.
pub async fn run(state: &AppState) -> anyhow::Result<()> {
    for name in role_names::ALL {
        Role::ensure(&state.pool, name, None).await?;
    }

    let (Some(email), Some(password)) = (
        state.config.admin_email.clone(),
        state.config.admin_password.clone(),
    ) else {
        return Ok(());
    };

    if User::find_by_email(&state.pool, &email).await?.is_some() {
        return Ok(());
    }

    let (password_hash, password_salt) = hash_password(&password, state.config.pbkdf2_iterations);
    let mut tx = state.pool.begin().await?;
    let admin = User::create(
        &mut *tx,
        NewUser {
            email: email.clone(),
            password_hash,
            password_salt,
            first_name: "System".into(),
            last_name: "Administrator".into(),
            phone: None,
            is_active: true,
            email_confirmed: true,
        },
    )
    .await?;
    User::add_role(&mut *tx, admin.id, role_names::ADMIN).await?;
    tx.commit().await?;

    tracing::info!("created admin user: {}", email);
    Ok(())
}
