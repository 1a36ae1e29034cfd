use std::error::Error;
use std::sync::Arc;

use retail::handlers::AppState;
use retail::payments::HttpPaymentGateway;
use retail::server::{initialize_executable, initialize_tracing, run_server};
use shop::admin_query::AdminQueryStorage;
use shop::shop_storage::ProdShopStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Starting storefront backend...");
    let config = initialize_executable()?;
    initialize_tracing(&config.server.log_level);

    let shop_storage = Arc::new(ProdShopStorage::new(&config.common.database_url).await?);
    let admin_query = Arc::new(AdminQueryStorage::new(&config.common.database_url).await?);
    let payments = Arc::new(HttpPaymentGateway::new(config.payments.clone()));

    let state = AppState {
        catalog: shop_storage.clone(),
        cart: shop_storage.clone(),
        orders: shop_storage.clone(),
        profiles: shop_storage.clone(),
        revenue: shop_storage.clone(),
        admin: admin_query,
        payments,
        admin_config: config.admin.clone(),
        currency: config.payments.currency.clone(),
    };

    run_server(&config, state).await
}
