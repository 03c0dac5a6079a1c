use crate::schema::Product;
use crate::utils::humanize_identifier;

pub fn product_profit(products: &[Product]) -> f64 {
    products.iter().map(|p| p.profit).sum()
}

pub fn product_revenue(products: &[Product]) -> f64 {
    products.iter().map(|p| p.sold_price).sum()
}

/// Legacy comma-separated lists are already split into one product per
/// non-empty segment by the normalizer, so this is just the length.
pub fn product_count(products: &[Product]) -> usize {
    products.len()
}

/// Name used when grouping products: the stored name, else a humanized id.
pub fn product_display_name(product: &Product) -> String {
    let name = product.name.trim();
    if !name.is_empty() {
        name.to_string()
    } else if !product.id.trim().is_empty() {
        humanize_identifier(product.id.trim())
    } else {
        "Unnamed Product".to_string()
    }
}
