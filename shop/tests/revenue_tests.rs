mod helpers;

use std::error::Error;

use chrono::NaiveDate;
use helpers::{new_address, seed_category, seed_item, seed_user, setup_storage};
use retail::model::{CheckoutRequest, ModelId};
use retail::storage::{CartStorage, CatalogStorage, OrderStorage, RevenueStorage};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use shop::entities::order;
use shop::shop_storage::ProdShopStorage;

async fn place_order_on(
    storage: &ProdShopStorage,
    user_id: ModelId,
    slugs: &[&str],
    date: NaiveDate,
) -> Result<i64, Box<dyn Error + Send + Sync>> {
    for slug in slugs {
        storage.add_to_cart(user_id, slug).await?;
    }
    storage
        .checkout(&CheckoutRequest {
            user_id,
            shipping: Some(new_address()),
            use_default_shipping: false,
            billing: None,
            use_default_billing: false,
            same_billing_address: true,
        })
        .await?;
    let summary = storage.cart_summary(user_id).await?;
    let placed = storage
        .record_payment(user_id, "ch_test_1", summary.total())
        .await?;

    // Pin the order date so the buckets are deterministic.
    let model = order::Entity::find_by_id(placed.id)
        .one(&storage.db)
        .await?
        .unwrap();
    let mut active = model.into_active_model();
    active.ordered_date = Set(Some(date.and_hms_opt(12, 0, 0).unwrap()));
    active.update(&storage.db).await?;

    Ok(placed.id)
}

#[tokio::test]
async fn test_daily_revenue_buckets_by_order_date() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let jumper = seed_item(&storage, category.id, "Wool Jumper", 50.0, 100).await;
    let scarf = seed_item(&storage, category.id, "Wool Scarf", 20.0, 100).await;

    // Two jumpers on Jan 15, one jumper + one scarf on Jan 16.
    place_order_on(
        &storage,
        user_id,
        &[&jumper.slug, &jumper.slug],
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
    )
    .await?;
    place_order_on(
        &storage,
        user_id,
        &[&jumper.slug, &scarf.slug],
        NaiveDate::from_ymd_opt(2026, 1, 16).unwrap(),
    )
    .await?;

    let daily = storage.daily_revenue().await?;
    assert_eq!(daily.len(), 2);
    assert_eq!(daily[0].bucket, "2026-01-15");
    assert_eq!(daily[0].total_revenue, 100.0);
    assert_eq!(daily[1].bucket, "2026-01-16");
    assert_eq!(daily[1].total_revenue, 70.0);
    Ok(())
}

#[tokio::test]
async fn test_monthly_revenue_spans_months() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let jumper = seed_item(&storage, category.id, "Wool Jumper", 50.0, 100).await;

    place_order_on(
        &storage,
        user_id,
        &[&jumper.slug],
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
    )
    .await?;
    place_order_on(
        &storage,
        user_id,
        &[&jumper.slug, &jumper.slug],
        NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
    )
    .await?;

    let monthly = storage.monthly_revenue().await?;
    assert_eq!(monthly.len(), 2);
    assert_eq!(monthly[0].bucket, "2026-01");
    assert_eq!(monthly[0].total_revenue, 50.0);
    assert_eq!(monthly[1].bucket, "2026-02");
    assert_eq!(monthly[1].total_revenue, 100.0);
    Ok(())
}

#[tokio::test]
async fn test_item_monthly_revenue_breaks_out_titles() -> Result<(), Box<dyn Error + Send + Sync>>
{
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let jumper = seed_item(&storage, category.id, "Wool Jumper", 50.0, 100).await;
    let scarf = seed_item(&storage, category.id, "Wool Scarf", 20.0, 100).await;

    place_order_on(
        &storage,
        user_id,
        &[&jumper.slug, &scarf.slug, &scarf.slug],
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
    )
    .await?;

    let rows = storage.item_monthly_revenue().await?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.bucket == "2026-03"));

    let jumper_row = rows.iter().find(|r| r.item_title == "Wool Jumper").unwrap();
    assert_eq!(jumper_row.total_revenue, 50.0);
    let scarf_row = rows.iter().find(|r| r.item_title == "Wool Scarf").unwrap();
    assert_eq!(scarf_row.total_revenue, 40.0);
    Ok(())
}

#[tokio::test]
async fn test_unplaced_carts_do_not_count() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let jumper = seed_item(&storage, category.id, "Wool Jumper", 50.0, 100).await;

    storage.add_to_cart(user_id, &jumper.slug).await?;

    assert!(storage.daily_revenue().await?.is_empty());
    assert!(storage.monthly_revenue().await?.is_empty());
    assert!(storage.item_monthly_revenue().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_revenue_uses_list_price_not_discount() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;

    let mut discounted = helpers::new_item(category.id, "Sale Jumper", 80.0, 100);
    discounted.discount_price = Some(60.0);
    let item = storage.create_item(&discounted).await?;

    place_order_on(
        &storage,
        user_id,
        &[&item.slug],
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
    )
    .await?;

    let daily = storage.daily_revenue().await?;
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].total_revenue, 80.0);
    Ok(())
}
