use axum::extract::{Json, Path, Query, State};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, is_unique_violation},
    result::ApiResponse,
    routes::auth::model::UserDto,
    utils::hash_password,
};

use super::model::{
    AssignRoleRequest, CreateUserRequest, NewUser, PaginatedUsersResponse, Role,
    UpdateUserRequest, User, UserQueryParams,
};
use crate::routes::auth::model::{validate_email, validate_name, validate_password_pair};

async fn to_dto(state: &AppState, user: &User) -> Result<UserDto, AppError> {
    let roles = User::roles(&state.pool, user.id).await?;
    Ok(UserDto::from_user(user, roles))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    let user = User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(ApiResponse::success(to_dto(&state, &user).await?)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UserQueryParams>,
) -> Result<Json<ApiResponse<PaginatedUsersResponse>>, AppError> {
    let (users, total_count) = User::list(&state.pool, &params).await?;

    let mut dtos = Vec::with_capacity(users.len());
    for user in &users {
        dtos.push(to_dto(&state, user).await?);
    }

    let page = params.page.max(1);
    let page_size = params.page_size.clamp(1, 100);
    Ok(Json(ApiResponse::success(PaginatedUsersResponse {
        users: dtos,
        total_count,
        page,
        page_size,
        total_pages: (total_count + page_size - 1) / page_size,
    })))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    let mut errors = Vec::new();
    validate_email(&req.email, &mut errors);
    validate_password_pair(&req.password, &req.password, &mut errors);
    validate_name(&req.first_name, "First name", &mut errors);
    validate_name(&req.last_name, "Last name", &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let (password_hash, password_salt) =
        hash_password(&req.password, state.config.pbkdf2_iterations);

    // The user row and its role links commit together.
    let mut tx = state.pool.begin().await?;
    let user = User::create(
        &mut *tx,
        NewUser {
            email: req.email,
            password_hash,
            password_salt,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            is_active: req.is_active,
            email_confirmed: false,
        },
    )
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::Conflict("User with this email already exists".into())
        } else {
            err.into()
        }
    })?;

    // Unknown role names are skipped rather than failing the whole create.
    for role_name in &req.role_names {
        if Role::exists(&state.pool, role_name).await? {
            User::add_role(&mut *tx, user.id, role_name).await?;
        }
    }
    tx.commit().await?;

    Ok(Json(ApiResponse::success_with_message(
        to_dto(&state, &user).await?,
        "User created successfully",
    )))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    let mut errors = Vec::new();
    if let Some(email) = &req.email {
        validate_email(email, &mut errors);
    }
    if let Some(first_name) = &req.first_name {
        validate_name(first_name, "First name", &mut errors);
    }
    if let Some(last_name) = &req.last_name {
        validate_name(last_name, "Last name", &mut errors);
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let user = User::update_profile(
        &state.pool,
        id,
        req.email.as_deref(),
        req.first_name.as_deref(),
        req.last_name.as_deref(),
        req.phone.as_deref(),
        req.is_active,
    )
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::Conflict("Email already exists".into())
        } else {
            err.into()
        }
    })?
    .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    // Replace the role set wholesale when one was supplied; the clear and
    // the re-links land as one unit.
    if let Some(role_names) = &req.role_names {
        let mut tx = state.pool.begin().await?;
        User::clear_roles(&mut *tx, user.id).await?;
        for role_name in role_names {
            if Role::exists(&state.pool, role_name).await? {
                User::add_role(&mut *tx, user.id, role_name).await?;
            }
        }
        tx.commit().await?;
    }

    Ok(Json(ApiResponse::success_with_message(
        to_dto(&state, &user).await?,
        "User updated successfully",
    )))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !User::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    Ok(Json(ApiResponse::ok("User deleted successfully")))
}

pub async fn get_user_roles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let roles = User::roles(&state.pool, id).await?;
    Ok(Json(ApiResponse::success(roles)))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let linked = User::add_role(&state.pool, id, &req.role_name)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict("User already has this role".into())
            } else {
                err.into()
            }
        })?;
    if !linked {
        return Err(AppError::NotFound("Role not found".into()));
    }

    Ok(Json(ApiResponse::ok("Role assigned successfully")))
}

pub async fn remove_role(
    State(state): State<AppState>,
    Path((id, role_name)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !User::remove_role(&state.pool, id, &role_name).await? {
        return Err(AppError::NotFound("Role assignment not found".into()));
    }
    Ok(Json(ApiResponse::ok("Role removed successfully")))
}
