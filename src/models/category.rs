use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::validate_hex_color;

pub const DEFAULT_CATEGORY_COLOR: &str = "#3498db";

/// Category entity shared by every member of the household
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Mercado",
    "color": "#27ae60"
}))]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_hex_color"))]
    pub color: Option<String>,
}

/// Request payload for updating a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_hex_color"))]
    pub color: Option<String>,
}

/// A category about to be inserted
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
}
