//! Seed the catalog from a YAML file.
//!
//! # File format
//!
//! ```yaml
//! products:
//!   - slug: linen-shirt
//!     name: Linen Shirt
//!     description: Breathable summer shirt
//!     variants:
//!       - sku: LS-M
//!         title: M
//!         price: 149900   # paise
//!         on_hand: 12
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use threadline_commerce::CommerceError;
use threadline_commerce::models::NewProduct;

use super::{CliError, connect};

/// Products to create.
#[derive(Debug, Deserialize)]
pub struct SeedCatalog {
    pub products: Vec<NewProduct>,
}

/// Parse a catalog file's contents.
///
/// # Errors
///
/// Returns `CliError::Seed` if the YAML is malformed or lists no products.
pub fn parse_catalog(content: &str) -> Result<SeedCatalog, CliError> {
    let catalog: SeedCatalog =
        serde_yaml::from_str(content).map_err(|e| CliError::Seed(e.to_string()))?;
    if catalog.products.is_empty() {
        return Err(CliError::Seed("no products listed".to_string()));
    }
    Ok(catalog)
}

/// Create every product in the file.
///
/// Products whose slug or SKU already exists are skipped and reported.
///
/// # Errors
///
/// Returns `CliError` if the file cannot be read or parsed, or the database
/// is unreachable.
pub async fn catalog(file_path: &str) -> Result<(), CliError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(CliError::Seed(format!("File not found: {file_path}")));
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Seed(e.to_string()))?;
    let catalog = parse_catalog(&content)?;

    info!(products = catalog.products.len(), "Parsed catalog");

    let commerce = connect().await?;

    let mut created = 0usize;
    let mut skipped = Vec::new();
    for product in &catalog.products {
        match commerce.create_product(product).await {
            Ok(_) => created += 1,
            Err(CommerceError::InvalidInput(reason)) => skipped.push((product.slug.clone(), reason)),
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Products created: {created}");
    if !skipped.is_empty() {
        error!("  Products skipped: {}", skipped.len());
        for (slug, reason) in &skipped {
            error!("    - {slug}: {reason}");
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::Money;

    use super::*;

    #[test]
    fn test_parse_catalog() {
        let yaml = r"
products:
  - slug: linen-shirt
    name: Linen Shirt
    variants:
      - sku: LS-M
        title: M
        price: 149900
        on_hand: 12
      - sku: LS-L
        title: L
        price: 149900
";
        let catalog = parse_catalog(yaml).unwrap();
        let product = &catalog.products[0];
        assert_eq!(product.slug, "linen-shirt");
        assert_eq!(product.description, "");
        assert_eq!(product.variants[0].price, Money::from_minor(149_900));
        assert_eq!(product.variants[0].on_hand, 12);
        assert_eq!(product.variants[1].on_hand, 0);
    }

    #[test]
    fn test_parse_catalog_rejects_empty() {
        assert!(matches!(
            parse_catalog("products: []"),
            Err(CliError::Seed(_))
        ));
        assert!(matches!(parse_catalog("- not a map"), Err(CliError::Seed(_))));
    }
}
