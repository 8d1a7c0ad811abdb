//! Product field validation.
//!
//! Every field is checked and every failure is kept, so one response can
//! report all of them.

use std::collections::BTreeMap;

use common::Money;
use rust_decimal::Decimal;

use super::{CatalogError, ProductInput, ProductPatch};

/// Field name to failure message.
pub type FieldErrors = BTreeMap<String, String>;

const NAME_LEN: (usize, usize) = (3, 100);
const DESCRIPTION_LEN: (usize, usize) = (10, 500);
const MAX_PRICE_SCALE: u32 = 4;

fn check_name(name: &str) -> Option<String> {
    let len = name.chars().count();
    if len == 0 {
        Some("name cannot be empty".to_string())
    } else if !(NAME_LEN.0..=NAME_LEN.1).contains(&len) {
        Some(format!(
            "name must be between {} and {} characters",
            NAME_LEN.0, NAME_LEN.1
        ))
    } else {
        None
    }
}

fn check_description(description: &str) -> Option<String> {
    let len = description.chars().count();
    if len == 0 {
        Some("description cannot be empty".to_string())
    } else if !(DESCRIPTION_LEN.0..=DESCRIPTION_LEN.1).contains(&len) {
        Some(format!(
            "description must be between {} and {} characters",
            DESCRIPTION_LEN.0, DESCRIPTION_LEN.1
        ))
    } else {
        None
    }
}

fn check_price(price: Decimal) -> Option<String> {
    if price <= Decimal::ZERO {
        Some("price must be greater than 0".to_string())
    } else if price > Money::max_unit_price().amount() {
        Some(format!("price cannot exceed {}", Money::max_unit_price().amount()))
    } else if price.normalize().scale() > MAX_PRICE_SCALE {
        Some(format!("price must have at most {MAX_PRICE_SCALE} decimal places"))
    } else {
        None
    }
}

fn check_stock(stock: i64) -> Option<String> {
    if stock < 0 {
        Some("stock cannot be negative".to_string())
    } else if i32::try_from(stock).is_err() {
        Some(format!("stock cannot exceed {}", i32::MAX))
    } else {
        None
    }
}

fn collect(checks: [(&str, Option<String>); 4]) -> Result<(), CatalogError> {
    let errors: FieldErrors = checks
        .into_iter()
        .filter_map(|(field, message)| message.map(|m| (field.to_string(), m)))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::Validation(errors))
    }
}

/// Validates every field of a new product.
pub fn validate_product(input: &ProductInput) -> Result<(), CatalogError> {
    collect([
        ("name", check_name(&input.name)),
        ("description", check_description(&input.description)),
        ("price", check_price(input.price)),
        ("stock", check_stock(input.stock)),
    ])
}

/// Validates the fields present in a patch.
pub fn validate_patch(patch: &ProductPatch) -> Result<(), CatalogError> {
    collect([
        ("name", patch.name.as_deref().and_then(check_name)),
        (
            "description",
            patch.description.as_deref().and_then(check_description),
        ),
        ("price", patch.price.and_then(check_price)),
        ("stock", patch.stock.and_then(check_stock)),
    ])
}
