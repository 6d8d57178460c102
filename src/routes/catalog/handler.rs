use axum::extract::{Json, Path, Query, State};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    result::ApiResponse,
};

use super::model::{
    CreateItemRequest, CreateNamedRequest, Item, ItemAttributes, ItemCategory, ItemDetail,
    ItemPricing, ItemQueryParams, Unit, UpdateItemRequest, UpdateNamedRequest, validate_offering,
    validate_pricing, validate_tax_treatment,
};

fn validate_named(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    Ok(())
}

// Units and item categories share the same shape; the handlers are generated
// per table to keep the routes explicit.
macro_rules! named_entity_handlers {
    ($list:ident, $get:ident, $create:ident, $update:ident, $delete:ident,
     $entity:ident, $label:literal) => {
        pub async fn $list(
            State(state): State<AppState>,
        ) -> Result<Json<ApiResponse<Vec<$entity>>>, AppError> {
            Ok(Json(ApiResponse::success($entity::list(&state.pool).await?)))
        }

        pub async fn $get(
            State(state): State<AppState>,
            Path(id): Path<Uuid>,
        ) -> Result<Json<ApiResponse<$entity>>, AppError> {
            let entity = $entity::find_by_id(&state.pool, id)
                .await?
                .ok_or_else(|| AppError::NotFound(concat!($label, " not found").into()))?;
            Ok(Json(ApiResponse::success(entity)))
        }

        pub async fn $create(
            State(state): State<AppState>,
            Json(req): Json<CreateNamedRequest>,
        ) -> Result<Json<ApiResponse<$entity>>, AppError> {
            validate_named(&req.name)?;
            let entity = $entity::create(&state.pool, &req).await.map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::Conflict(concat!($label, " with this name already exists").into())
                } else {
                    err.into()
                }
            })?;
            Ok(Json(ApiResponse::success_with_message(
                entity,
                concat!($label, " created successfully"),
            )))
        }

        pub async fn $update(
            State(state): State<AppState>,
            Path(id): Path<Uuid>,
            Json(req): Json<UpdateNamedRequest>,
        ) -> Result<Json<ApiResponse<$entity>>, AppError> {
            if let Some(name) = &req.name {
                validate_named(name)?;
            }
            let entity = $entity::update(&state.pool, id, &req)
                .await
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        AppError::Conflict(concat!($label, " with this name already exists").into())
                    } else {
                        err.into()
                    }
                })?
                .ok_or_else(|| AppError::NotFound(concat!($label, " not found").into()))?;
            Ok(Json(ApiResponse::success_with_message(
                entity,
                concat!($label, " updated successfully"),
            )))
        }

        pub async fn $delete(
            State(state): State<AppState>,
            Path(id): Path<Uuid>,
        ) -> Result<Json<ApiResponse<()>>, AppError> {
            let deleted = $entity::delete(&state.pool, id).await.map_err(|err| {
                if is_foreign_key_violation(&err) {
                    AppError::Conflict(concat!($label, " is still referenced by items").into())
                } else {
                    err.into()
                }
            })?;
            if !deleted {
                return Err(AppError::NotFound(concat!($label, " not found").into()));
            }
            Ok(Json(ApiResponse::ok(concat!($label, " deleted successfully"))))
        }
    };
}

named_entity_handlers!(list_units, get_unit, create_unit, update_unit, delete_unit, Unit, "Unit");
named_entity_handlers!(
    list_categories,
    get_category,
    create_category,
    update_category,
    delete_category,
    ItemCategory,
    "Category"
);

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ItemQueryParams>,
) -> Result<Json<ApiResponse<Vec<Item>>>, AppError> {
    Ok(Json(ApiResponse::success(
        Item::list(&state.pool, &params).await?,
    )))
}

async fn item_detail(state: &AppState, item: Item) -> Result<ItemDetail, AppError> {
    let pricing = ItemPricing::fetch(&state.pool, item.id)
        .await?
        .unwrap_or_default();
    let attributes = ItemAttributes::fetch(&state.pool, item.id)
        .await?
        .unwrap_or_default();
    Ok(ItemDetail {
        item,
        pricing,
        attributes,
    })
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ItemDetail>>, AppError> {
    let item = Item::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".into()))?;
    Ok(Json(ApiResponse::success(item_detail(&state, item).await?)))
}

pub async fn create_item(
    State(state): State<AppState>,
    Json(req): Json<CreateItemRequest>,
) -> Result<Json<ApiResponse<ItemDetail>>, AppError> {
    let mut errors = Vec::new();
    if req.sku.trim().is_empty() {
        errors.push("SKU is required".into());
    }
    if req.name.trim().is_empty() {
        errors.push("Name is required".into());
    }
    validate_offering(&req.offering, &mut errors);
    validate_tax_treatment(&req.tax_treatment, &mut errors);
    if let Some(pricing) = &req.pricing {
        validate_pricing(pricing, &mut errors);
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    // The item and its one-to-one records commit together.
    let mut tx = state.pool.begin().await?;
    let item = Item::create(&mut *tx, &req).await.map_err(|err| {
        if is_unique_violation(&err) {
            AppError::Conflict("Item with this SKU already exists".into())
        } else if is_foreign_key_violation(&err) {
            AppError::validation("Unknown category or unit")
        } else {
            err.into()
        }
    })?;
    let pricing = req.pricing.clone().unwrap_or_default();
    let attributes = req.attributes.clone().unwrap_or_default();
    ItemPricing::upsert(&mut *tx, item.id, &pricing).await?;
    ItemAttributes::upsert(&mut *tx, item.id, &attributes).await?;
    tx.commit().await?;

    Ok(Json(ApiResponse::success_with_message(
        ItemDetail {
            item,
            pricing,
            attributes,
        },
        "Item created successfully",
    )))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ApiResponse<ItemDetail>>, AppError> {
    let mut errors = Vec::new();
    if let Some(offering) = &req.offering {
        validate_offering(offering, &mut errors);
    }
    if let Some(tax_treatment) = &req.tax_treatment {
        validate_tax_treatment(tax_treatment, &mut errors);
    }
    if let Some(pricing) = &req.pricing {
        validate_pricing(pricing, &mut errors);
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let mut tx = state.pool.begin().await?;
    let item = Item::update(&mut *tx, id, &req)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict("Item with this SKU already exists".into())
            } else if is_foreign_key_violation(&err) {
                AppError::validation("Unknown category or unit")
            } else {
                err.into()
            }
        })?
        .ok_or_else(|| AppError::NotFound("Item not found".into()))?;
    if let Some(pricing) = &req.pricing {
        ItemPricing::upsert(&mut *tx, item.id, pricing).await?;
    }
    if let Some(attributes) = &req.attributes {
        ItemAttributes::upsert(&mut *tx, item.id, attributes).await?;
    }
    tx.commit().await?;

    Ok(Json(ApiResponse::success_with_message(
        item_detail(&state, item).await?,
        "Item updated successfully",
    )))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !Item::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Item not found".into()));
    }
    Ok(Json(ApiResponse::ok("Item deleted successfully")))
}
