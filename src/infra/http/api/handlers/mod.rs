mod actions;
mod products;
mod system;

pub use actions::{
    bulk_update_prices, create_product, delete_product, update_product, update_product_stock,
};
pub use products::{get_product, homepage, list_products, product_stats};
pub use system::{recent_invalidations, social_feed};
