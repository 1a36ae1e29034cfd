//! Shared fixtures for the shop integration suites.
//!
//! Every test gets its own in-memory SQLite database with the real
//! schema installed, so suites run in parallel without a database
//! server.
#![allow(dead_code)]

use sea_orm::{ActiveModelTrait, ConnectOptions, NotSet, Set};

use retail::model::{CategoryRecord, ItemLabel, ItemRecord, ModelId, NewAddress, NewCategory, NewItem};
use retail::storage::CatalogStorage;
use shop::entities::user;
use shop::shop_storage::ProdShopStorage;

pub async fn setup_storage() -> ProdShopStorage {
    let mut options = ConnectOptions::new(common::get_test_in_memory_database_url());
    // A pool would hand every connection its own empty :memory: db.
    options.max_connections(1).sqlx_logging(false);

    let storage = ProdShopStorage::with_options(options)
        .await
        .expect("Failed to open in-memory database");
    storage
        .initialize_schema()
        .await
        .expect("Failed to install schema");
    storage
}

pub async fn seed_user(storage: &ProdShopStorage) -> ModelId {
    let username = common::generate_unique_id("user");
    user::ActiveModel {
        id: NotSet,
        username: Set(username.clone()),
        email: Set(format!("{}@example.com", username)),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(&storage.db)
    .await
    .expect("Failed to seed user")
    .id
}

pub async fn seed_category(storage: &ProdShopStorage) -> CategoryRecord {
    storage
        .create_category(&NewCategory {
            title: "Knitwear".to_string(),
            slug: Some(common::generate_unique_id("knitwear").to_lowercase()),
            description: "Jumpers and cardigans".to_string(),
            image_url: "/media/knitwear.jpg".to_string(),
        })
        .await
        .expect("Failed to seed category")
}

pub fn new_item(category_id: ModelId, title: &str, price: f64, stock_no: i32) -> NewItem {
    NewItem {
        title: title.to_string(),
        slug: None,
        price,
        discount_price: None,
        category_id,
        label: ItemLabel::New,
        stock_no,
        description_short: "Short description".to_string(),
        description_long: "A longer description of the item.".to_string(),
        image_url: "/media/item.jpg".to_string(),
    }
}

pub async fn seed_item(
    storage: &ProdShopStorage,
    category_id: ModelId,
    title: &str,
    price: f64,
    stock_no: i32,
) -> ItemRecord {
    storage
        .create_item(&new_item(category_id, title, price, stock_no))
        .await
        .expect("Failed to seed item")
}

pub fn new_address() -> NewAddress {
    NewAddress {
        street_address: "Invalidenstr. 117".to_string(),
        apartment_address: "Apt 4".to_string(),
        country: "DE".to_string(),
        zip: "10115".to_string(),
        set_default: false,
    }
}
