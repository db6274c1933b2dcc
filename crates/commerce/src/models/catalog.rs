//! Catalog types used for seeding and stock inspection.

use serde::{Deserialize, Serialize};

use threadline_core::{Money, ProductId, StockLevel, VariantId};

/// Input for creating a product together with its variants and stock rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub variants: Vec<NewVariant>,
}

/// Input for one variant of a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVariant {
    pub sku: String,
    pub title: String,
    /// Price in minor units.
    pub price: Money,
    /// Initial on-hand stock.
    #[serde(default)]
    pub on_hand: i32,
}

/// Replacement text for an existing product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Replacement title and price for an existing variant.
///
/// Orders placed before the change keep the title and price they were
/// placed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantUpdate {
    pub title: String,
    /// Price in minor units.
    pub price: Money,
}

/// A product with its variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub variants: Vec<Variant>,
}

/// A sellable variant and its current stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub title: String,
    pub price: Money,
    pub stock: StockLevel,
}
