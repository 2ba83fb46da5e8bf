//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Enamel Mug
//!     price: "18.00"
//!     stock: 40
//!     category: kitchen
//! coupons:
//!   - code: welcome10
//!     kind: percentage
//!     value: "10"
//! ```
//!
//! Products are upserted by slug and coupons by code, so re-running the same
//! file updates rows in place. The whole file is validated before the
//! database is touched.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use shopfront_storefront::db::{self, CouponRepository, ProductRepository};
use shopfront_storefront::models::{CouponInput, ProductInput};

use super::database_url;

/// Seed file layout.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub products: Vec<ProductInput>,
    #[serde(default)]
    pub coupons: Vec<CouponInput>,
}

/// Counts reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub products: usize,
    pub coupons_created: usize,
    pub coupons_updated: usize,
}

/// Normalize every entry, collecting one message per invalid entry.
///
/// # Errors
///
/// Returns the list of problems if any entry is invalid.
pub fn validate(file: CatalogFile) -> Result<CatalogFile, Vec<String>> {
    let mut errors = Vec::new();

    let products = file
        .products
        .into_iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let label = format!("products[{i}] ({})", p.name);
            p.normalized().map_err(|e| errors.push(format!("{label}: {e}"))).ok()
        })
        .collect::<Vec<_>>();

    let coupons = file
        .coupons
        .into_iter()
        .enumerate()
        .filter_map(|(i, c)| {
            let label = format!("coupons[{i}] ({})", c.code);
            c.normalized().map_err(|e| errors.push(format!("{label}: {e}"))).ok()
        })
        .collect::<Vec<_>>();

    let mut slugs: Vec<&str> = products.iter().map(|p| p.slug.as_str()).collect();
    slugs.sort_unstable();
    for pair in slugs.windows(2) {
        if let [a, b] = pair
            && a == b
        {
            errors.push(format!("duplicate product slug: {a}"));
        }
    }

    if errors.is_empty() {
        Ok(CatalogFile { products, coupons })
    } else {
        Err(errors)
    }
}

/// Seed products and coupons from `file_path`.
///
/// # Errors
///
/// Returns an error if the file can't be read or parsed, any entry is
/// invalid, or a database write fails.
pub async fn catalog(file_path: &str) -> Result<SeedResult, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog");
    let content = tokio::fs::read_to_string(path).await?;
    let parsed: CatalogFile = serde_yaml::from_str(&content)?;

    let file = match validate(parsed) {
        Ok(file) => file,
        Err(errors) => {
            error!("Catalog validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(format!("{} validation errors found", errors.len()).into());
        }
    };
    info!(
        products = file.products.len(),
        coupons = file.coupons.len(),
        "Catalog validated"
    );

    let pool = db::create_pool(&database_url()?).await?;
    let products = ProductRepository::new(&pool);
    let coupons = CouponRepository::new(&pool);
    let mut result = SeedResult::default();

    for input in &file.products {
        let product = products.upsert_by_slug(input).await?;
        info!(slug = %product.slug, "Seeded product");
        result.products += 1;
    }

    for input in &file.coupons {
        if let Some(existing) = coupons.get_by_code(&input.code).await? {
            coupons.update(existing.id, input).await?;
            result.coupons_updated += 1;
        } else {
            coupons.create(input).await?;
            result.coupons_created += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Products: {}", result.products);
    info!(
        "  Coupons: {} created, {} updated",
        result.coupons_created, result.coupons_updated
    );
    Ok(result)
}
