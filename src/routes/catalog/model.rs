use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// Goods-or-service classification of an item.
pub const OFFERINGS: [&str; 2] = ["goods", "service"];

/// Tax treatment catalog, mirroring the accounting side.
pub const TAX_TREATMENTS: [&str; 15] = [
    "none",
    "taxable",
    "non_taxable",
    "exempt",
    "out_of_scope",
    "standard_rated",
    "zero_rated",
    "nil_rated",
    "reduced_rated",
    "mixed_rated",
    "reverse_charge",
    "exports",
    "imports",
    "special_rate",
    "not_applicable",
];

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: Uuid,
    pub short_name: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ItemCategory {
    pub id: Uuid,
    pub short_name: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub unit_id: Uuid,
    pub offering: String,
    pub tax_treatment: String,
    pub is_barcoded: bool,
    pub is_expiry_dated: bool,
    pub is_returnable: bool,
    pub is_discontinued: bool,
    pub warranty: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-item price book. One row per item, created with it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemPricing {
    pub purchase_price: Option<f64>,
    pub wholesale_price: Option<f64>,
    pub retail_price: Option<f64>,
    pub mrp: Option<f64>,
    pub margin: Option<f64>,
    pub is_discountable: bool,
}

/// Free-form physical attributes. One row per item, created with it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemAttributes {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub material: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub weight: Option<String>,
    pub dimensions: Option<String>,
    pub country_of_origin: Option<String>,
}

/// Item with its one-to-one records, as returned by the single-item routes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub pricing: ItemPricing,
    pub attributes: ItemAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNamedRequest {
    pub name: String,
    pub short_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNamedRequest {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub unit_id: Uuid,
    #[serde(default = "default_offering")]
    pub offering: String,
    #[serde(default = "default_tax_treatment")]
    pub tax_treatment: String,
    #[serde(default)]
    pub is_barcoded: bool,
    #[serde(default)]
    pub is_expiry_dated: bool,
    #[serde(default)]
    pub is_returnable: bool,
    pub warranty: Option<String>,
    pub notes: Option<String>,
    pub pricing: Option<ItemPricing>,
    pub attributes: Option<ItemAttributes>,
}

fn default_offering() -> String {
    "goods".into()
}

fn default_tax_treatment() -> String {
    "none".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub offering: Option<String>,
    pub tax_treatment: Option<String>,
    pub is_barcoded: Option<bool>,
    pub is_expiry_dated: Option<bool>,
    pub is_returnable: Option<bool>,
    pub is_discontinued: Option<bool>,
    pub warranty: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
    // Sub-records replace wholesale when supplied.
    pub pricing: Option<ItemPricing>,
    pub attributes: Option<ItemAttributes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQueryParams {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

pub fn validate_offering(value: &str, errors: &mut Vec<String>) {
    if !OFFERINGS.contains(&value) {
        errors.push(format!("Offering must be one of: {}", OFFERINGS.join(", ")));
    }
}

pub fn validate_tax_treatment(value: &str, errors: &mut Vec<String>) {
    if !TAX_TREATMENTS.contains(&value) {
        errors.push(format!("Unknown tax treatment '{value}'"));
    }
}

pub fn validate_pricing(pricing: &ItemPricing, errors: &mut Vec<String>) {
    let prices = [
        ("Purchase price", pricing.purchase_price),
        ("Wholesale price", pricing.wholesale_price),
        ("Retail price", pricing.retail_price),
        ("MRP", pricing.mrp),
    ];
    for (label, value) in prices {
        if value.is_some_and(|v| v < 0.0) {
            errors.push(format!("{label} cannot be negative"));
        }
    }
}

const NAMED_COLUMNS: &str = "id, short_name, name, description, is_active, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, sku, name, description, category_id, unit_id, offering, \
     tax_treatment, is_barcoded, is_expiry_dated, is_returnable, is_discontinued, warranty, \
     notes, is_active, created_at, updated_at";

const PRICING_COLUMNS: &str =
    "purchase_price, wholesale_price, retail_price, mrp, margin, is_discountable";

const ATTRIBUTE_COLUMNS: &str =
    "brand, model, material, color, size, weight, dimensions, country_of_origin";

macro_rules! named_entity_queries {
    ($entity:ident, $table:literal) => {
        impl $entity {
            pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
                let sql =
                    format!("SELECT {NAMED_COLUMNS} FROM {} ORDER BY name", $table);
                sqlx::query_as::<_, $entity>(&sql).fetch_all(pool).await
            }

            pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
                let sql = format!("SELECT {NAMED_COLUMNS} FROM {} WHERE id = $1", $table);
                sqlx::query_as::<_, $entity>(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
            }

            pub async fn create(
                pool: &PgPool,
                req: &CreateNamedRequest,
            ) -> Result<Self, sqlx::Error> {
                let sql = format!(
                    "INSERT INTO {} (id, short_name, name, description) \
                     VALUES ($1, $2, $3, $4) RETURNING {NAMED_COLUMNS}",
                    $table
                );
                sqlx::query_as::<_, $entity>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(&req.short_name)
                    .bind(&req.name)
                    .bind(&req.description)
                    .fetch_one(pool)
                    .await
            }

            pub async fn update(
                pool: &PgPool,
                id: Uuid,
                req: &UpdateNamedRequest,
            ) -> Result<Option<Self>, sqlx::Error> {
                let sql = format!(
                    "UPDATE {} SET \
                         name = COALESCE($1, name), \
                         short_name = COALESCE($2, short_name), \
                         description = COALESCE($3, description), \
                         is_active = COALESCE($4, is_active), \
                         updated_at = now() \
                     WHERE id = $5 RETURNING {NAMED_COLUMNS}",
                    $table
                );
                sqlx::query_as::<_, $entity>(&sql)
                    .bind(&req.name)
                    .bind(&req.short_name)
                    .bind(&req.description)
                    .bind(req.is_active)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
            }

            pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
                let sql = format!("DELETE FROM {} WHERE id = $1", $table);
                let result = sqlx::query(&sql).bind(id).execute(pool).await?;
                Ok(result.rows_affected() == 1)
            }
        }
    };
}

named_entity_queries!(Unit, "units");
named_entity_queries!(ItemCategory, "item_categories");

impl Item {
    pub async fn list(
        pool: &PgPool,
        params: &ItemQueryParams,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR sku ILIKE '%' || $1 || '%') \
               AND ($2::uuid IS NULL OR category_id = $2) \
               AND ($3::uuid IS NULL OR unit_id = $3) \
               AND ($4::boolean IS NULL OR is_active = $4) \
             ORDER BY name"
        );
        sqlx::query_as::<_, Item>(&sql)
            .bind(&params.search)
            .bind(params.category_id)
            .bind(params.unit_id)
            .bind(params.is_active)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1");
        sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        executor: impl PgExecutor<'_>,
        req: &CreateItemRequest,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO items \
                 (id, sku, name, description, category_id, unit_id, offering, tax_treatment, \
                  is_barcoded, is_expiry_dated, is_returnable, warranty, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {ITEM_COLUMNS}"
        );
        sqlx::query_as::<_, Item>(&sql)
            .bind(Uuid::new_v4())
            .bind(&req.sku)
            .bind(&req.name)
            .bind(&req.description)
            .bind(req.category_id)
            .bind(req.unit_id)
            .bind(&req.offering)
            .bind(&req.tax_treatment)
            .bind(req.is_barcoded)
            .bind(req.is_expiry_dated)
            .bind(req.is_returnable)
            .bind(&req.warranty)
            .bind(&req.notes)
            .fetch_one(executor)
            .await
    }

    pub async fn update(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        req: &UpdateItemRequest,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE items SET \
                 sku = COALESCE($1, sku), \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 category_id = COALESCE($4, category_id), \
                 unit_id = COALESCE($5, unit_id), \
                 offering = COALESCE($6, offering), \
                 tax_treatment = COALESCE($7, tax_treatment), \
                 is_barcoded = COALESCE($8, is_barcoded), \
                 is_expiry_dated = COALESCE($9, is_expiry_dated), \
                 is_returnable = COALESCE($10, is_returnable), \
                 is_discontinued = COALESCE($11, is_discontinued), \
                 warranty = COALESCE($12, warranty), \
                 notes = COALESCE($13, notes), \
                 is_active = COALESCE($14, is_active), \
                 updated_at = now() \
             WHERE id = $15 RETURNING {ITEM_COLUMNS}"
        );
        sqlx::query_as::<_, Item>(&sql)
            .bind(&req.sku)
            .bind(&req.name)
            .bind(&req.description)
            .bind(req.category_id)
            .bind(req.unit_id)
            .bind(&req.offering)
            .bind(&req.tax_treatment)
            .bind(req.is_barcoded)
            .bind(req.is_expiry_dated)
            .bind(req.is_returnable)
            .bind(req.is_discontinued)
            .bind(&req.warranty)
            .bind(&req.notes)
            .bind(req.is_active)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Sub-records go with the item via cascade.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

impl ItemPricing {
    pub async fn fetch(pool: &PgPool, item_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {PRICING_COLUMNS} FROM item_pricing WHERE item_id = $1");
        sqlx::query_as::<_, ItemPricing>(&sql)
            .bind(item_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn upsert(
        executor: impl PgExecutor<'_>,
        item_id: Uuid,
        pricing: &ItemPricing,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO item_pricing \
                 (item_id, purchase_price, wholesale_price, retail_price, mrp, margin, \
                  is_discountable) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (item_id) DO UPDATE SET \
                 purchase_price = EXCLUDED.purchase_price, \
                 wholesale_price = EXCLUDED.wholesale_price, \
                 retail_price = EXCLUDED.retail_price, \
                 mrp = EXCLUDED.mrp, \
                 margin = EXCLUDED.margin, \
                 is_discountable = EXCLUDED.is_discountable",
        )
        .bind(item_id)
        .bind(pricing.purchase_price)
        .bind(pricing.wholesale_price)
        .bind(pricing.retail_price)
        .bind(pricing.mrp)
        .bind(pricing.margin)
        .bind(pricing.is_discountable)
        .execute(executor)
        .await?;
        Ok(())
    }
}

impl ItemAttributes {
    pub async fn fetch(pool: &PgPool, item_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {ATTRIBUTE_COLUMNS} FROM item_attributes WHERE item_id = $1");
        sqlx::query_as::<_, ItemAttributes>(&sql)
            .bind(item_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn upsert(
        executor: impl PgExecutor<'_>,
        item_id: Uuid,
        attributes: &ItemAttributes,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO item_attributes \
                 (item_id, brand, model, material, color, size, weight, dimensions, \
                  country_of_origin) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (item_id) DO UPDATE SET \
                 brand = EXCLUDED.brand, \
                 model = EXCLUDED.model, \
                 material = EXCLUDED.material, \
                 color = EXCLUDED.color, \
                 size = EXCLUDED.size, \
                 weight = EXCLUDED.weight, \
                 dimensions = EXCLUDED.dimensions, \
                 country_of_origin = EXCLUDED.country_of_origin",
        )
        .bind(item_id)
        .bind(&attributes.brand)
        .bind(&attributes.model)
        .bind(&attributes.material)
        .bind(&attributes.color)
        .bind(&attributes.size)
        .bind(&attributes.weight)
        .bind(&attributes.dimensions)
        .bind(&attributes.country_of_origin)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offering_validation() {
        let mut errors = Vec::new();
        validate_offering("goods", &mut errors);
        validate_offering("service", &mut errors);
        assert!(errors.is_empty());

        validate_offering("licence", &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn tax_treatment_validation() {
        let mut errors = Vec::new();
        validate_tax_treatment("zero_rated", &mut errors);
        assert!(errors.is_empty());

        validate_tax_treatment("magic", &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn negative_prices_are_rejected() {
        let mut errors = Vec::new();
        validate_pricing(
            &ItemPricing {
                retail_price: Some(9.99),
                ..ItemPricing::default()
            },
            &mut errors,
        );
        assert!(errors.is_empty());

        validate_pricing(
            &ItemPricing {
                purchase_price: Some(-1.0),
                mrp: Some(-5.0),
                ..ItemPricing::default()
            },
            &mut errors,
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn item_detail_nests_pricing_and_attributes() {
        let now = Utc::now();
        let detail = ItemDetail {
            item: Item {
                id: Uuid::new_v4(),
                sku: "SKU-1".into(),
                name: "Widget".into(),
                description: None,
                category_id: Uuid::new_v4(),
                unit_id: Uuid::new_v4(),
                offering: "goods".into(),
                tax_treatment: "taxable".into(),
                is_barcoded: false,
                is_expiry_dated: false,
                is_returnable: true,
                is_discontinued: false,
                warranty: Some("12 months".into()),
                notes: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
            pricing: ItemPricing {
                retail_price: Some(19.5),
                ..ItemPricing::default()
            },
            attributes: ItemAttributes {
                brand: Some("Acme".into()),
                ..ItemAttributes::default()
            },
        };

        let json = serde_json::to_value(&detail).unwrap();
        // Item fields are flattened, sub-records stay nested.
        assert_eq!(json["sku"], "SKU-1");
        assert_eq!(json["warranty"], "12 months");
        assert_eq!(json["pricing"]["retailPrice"], 19.5);
        assert_eq!(json["attributes"]["brand"], "Acme");
    }

    #[test]
    fn pricing_deserializes_from_a_partial_object() {
        let pricing: ItemPricing =
            serde_json::from_str(r#"{"retailPrice": 10.0, "isDiscountable": true}"#).unwrap();
        assert_eq!(pricing.retail_price, Some(10.0));
        assert!(pricing.is_discountable);
        assert!(pricing.purchase_price.is_none());
    }
}
