mod helpers;

use std::error::Error;

use helpers::{new_address, seed_category, seed_item, seed_user, setup_storage};
use retail::model::{
    CheckoutRequest, ModelId, OrderRecord, RefundRequest, ShopError,
};
use retail::storage::{CartStorage, CatalogStorage, OrderStorage};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use shop::entities::refund;
use shop::shop_storage::ProdShopStorage;

fn checkout_request(user_id: ModelId) -> CheckoutRequest {
    CheckoutRequest {
        user_id,
        shipping: Some(new_address()),
        use_default_shipping: false,
        billing: None,
        use_default_billing: false,
        same_billing_address: true,
    }
}

/// Cart → checkout → payment, returning the placed order.
async fn place_order(
    storage: &ProdShopStorage,
    user_id: ModelId,
    slugs: &[&str],
) -> Result<OrderRecord, Box<dyn Error + Send + Sync>> {
    for slug in slugs {
        storage.add_to_cart(user_id, slug).await?;
    }
    storage.checkout(&checkout_request(user_id)).await?;
    let summary = storage.cart_summary(user_id).await?;
    storage
        .record_payment(user_id, "ch_test_1", summary.total())
        .await
}

#[tokio::test]
async fn test_checkout_requires_items() {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;

    let err = storage
        .checkout(&checkout_request(user_id))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ShopError>(),
        Some(ShopError::EmptyCart { .. })
    ));
}

#[tokio::test]
async fn test_checkout_links_addresses() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;

    storage.add_to_cart(user_id, &item.slug).await?;
    let order = storage.checkout(&checkout_request(user_id)).await?;

    let shipping_id = order.shipping_address_id.expect("shipping address linked");
    let billing_id = order.billing_address_id.expect("billing address linked");
    assert_ne!(shipping_id, billing_id);

    let addresses = storage.addresses_by_ids(&[shipping_id, billing_id]).await?;
    assert_eq!(addresses.len(), 2);
    let billing = addresses.iter().find(|a| a.id == billing_id).unwrap();
    // "Same as shipping" clones the row under the billing type.
    assert_eq!(billing.address_type, "B");
    assert_eq!(billing.zip, "10115");
    Ok(())
}

#[tokio::test]
async fn test_checkout_with_missing_default_is_not_found(
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;

    storage.add_to_cart(user_id, &item.slug).await?;
    let request = CheckoutRequest {
        user_id,
        shipping: None,
        use_default_shipping: true,
        billing: None,
        use_default_billing: false,
        same_billing_address: true,
    };

    let err = storage.checkout(&request).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ShopError>(),
        Some(ShopError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_saved_default_address_is_reused() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;

    // First checkout saves the shipping address as the default.
    storage.add_to_cart(user_id, &item.slug).await?;
    let mut shipping = new_address();
    shipping.set_default = true;
    let first = storage
        .checkout(&CheckoutRequest {
            user_id,
            shipping: Some(shipping),
            use_default_shipping: false,
            billing: None,
            use_default_billing: false,
            same_billing_address: true,
        })
        .await?;
    let summary = storage.cart_summary(user_id).await?;
    storage
        .record_payment(user_id, "ch_test_1", summary.total())
        .await?;

    // Second order reuses it via use_default_shipping.
    storage.add_to_cart(user_id, &item.slug).await?;
    let second = storage
        .checkout(&CheckoutRequest {
            user_id,
            shipping: None,
            use_default_shipping: true,
            billing: None,
            use_default_billing: false,
            same_billing_address: true,
        })
        .await?;

    assert_eq!(second.shipping_address_id, first.shipping_address_id);
    Ok(())
}

#[tokio::test]
async fn test_payment_finalizes_order_and_decrements_stock(
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;

    storage.add_to_cart(user_id, &item.slug).await?;
    storage.add_to_cart(user_id, &item.slug).await?;
    storage.checkout(&checkout_request(user_id)).await?;
    let order = storage.record_payment(user_id, "ch_test_9", 118.0).await?;

    assert!(order.ordered);
    assert!(order.ordered_date.is_some());
    assert!(order.payment_id.is_some());
    let ref_code = order.ref_code.expect("ref code assigned");
    assert!(ref_code.starts_with("ORD-"));

    let restocked = storage.get_item(&item.slug).await?;
    assert_eq!(restocked.stock_no, 8);
    assert!(restocked.last_purchased_at.is_some());

    // The cart is gone once the order is placed.
    let err = storage.cart_summary(user_id).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ShopError>(),
        Some(ShopError::EmptyCart { .. })
    ));

    let payments = storage
        .payments_by_ids(&[order.payment_id.unwrap()])
        .await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].charge_id, "ch_test_9");
    assert_eq!(payments[0].amount, 118.0);
    Ok(())
}

#[tokio::test]
async fn test_payment_before_checkout_is_rejected() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;

    storage.add_to_cart(user_id, &item.slug).await?;
    let err = storage
        .record_payment(user_id, "ch_test_1", 59.0)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ShopError>(),
        Some(ShopError::InvalidInput(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_insufficient_stock_rolls_payment_back() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Last Jumper", 59.0, 1).await;

    storage.add_to_cart(user_id, &item.slug).await?;
    storage.add_to_cart(user_id, &item.slug).await?;
    storage.checkout(&checkout_request(user_id)).await?;

    let err = storage
        .record_payment(user_id, "ch_test_1", 118.0)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ShopError>(),
        Some(ShopError::OutOfStock {
            requested: 2,
            available: 1,
            ..
        })
    ));

    // Nothing was committed: stock intact, cart still active.
    let intact = storage.get_item(&item.slug).await?;
    assert_eq!(intact.stock_no, 1);
    assert!(intact.last_purchased_at.is_none());
    let summary = storage.cart_summary(user_id).await?;
    assert_eq!(summary.lines[0].quantity, 2);
    Ok(())
}

#[tokio::test]
async fn test_receipt_requires_delivery() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;
    let order = place_order(&storage, user_id, &[&item.slug]).await?;
    let ref_code = order.ref_code.clone().unwrap();

    let err = storage
        .confirm_received(user_id, &ref_code)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ShopError>(),
        Some(ShopError::InvalidInput(_))
    ));

    let updated = storage.mark_delivered(&[order.id]).await?;
    assert_eq!(updated, 1);

    let received = storage.confirm_received(user_id, &ref_code).await?;
    assert!(received.received);
    assert!(!received.being_delivered);
    Ok(())
}

#[tokio::test]
async fn test_mark_delivered_skips_unplaced_orders() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;

    let summary = storage.add_to_cart(user_id, &item.slug).await?;
    let updated = storage.mark_delivered(&[summary.order_id]).await?;
    assert_eq!(updated, 0);
    Ok(())
}

#[tokio::test]
async fn test_refund_request_flags_order() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;
    let order = place_order(&storage, user_id, &[&item.slug]).await?;

    let refund_record = storage
        .request_refund(&RefundRequest {
            ref_code: order.ref_code.clone().unwrap(),
            reason: "Wrong size".to_string(),
            email: "buyer@example.com".to_string(),
        })
        .await?;

    assert_eq!(refund_record.order_id, order.id);
    assert!(!refund_record.accepted);

    let orders = storage.orders_by_ids(&[order.id]).await?;
    assert!(orders[0].refund_requested);
    assert!(!orders[0].refund_granted);
    Ok(())
}

#[tokio::test]
async fn test_refund_for_unknown_ref_code_is_not_found() {
    let storage = setup_storage().await;

    let err = storage
        .request_refund(&RefundRequest {
            ref_code: "ORD-NOPE".to_string(),
            reason: "Lost".to_string(),
            email: "buyer@example.com".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ShopError>(),
        Some(ShopError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_accepting_refund_restocks_items() -> Result<(), Box<dyn Error + Send + Sync>> {
    let storage = setup_storage().await;
    let user_id = seed_user(&storage).await;
    let category = seed_category(&storage).await;
    let item = seed_item(&storage, category.id, "Wool Jumper", 59.0, 10).await;

    storage.add_to_cart(user_id, &item.slug).await?;
    let order = place_order(&storage, user_id, &[&item.slug]).await?;
    assert_eq!(storage.get_item(&item.slug).await?.stock_no, 8);

    storage
        .request_refund(&RefundRequest {
            ref_code: order.ref_code.clone().unwrap(),
            reason: "Changed my mind".to_string(),
            email: "buyer@example.com".to_string(),
        })
        .await?;

    let updated = storage.accept_refunds(&[order.id]).await?;
    assert_eq!(updated, 1);

    let orders = storage.orders_by_ids(&[order.id]).await?;
    assert!(orders[0].refund_granted);
    assert!(!orders[0].refund_requested);

    assert_eq!(storage.get_item(&item.slug).await?.stock_no, 10);

    let refunds = refund::Entity::find()
        .filter(refund::Column::OrderId.eq(order.id))
        .all(&storage.db)
        .await?;
    assert!(refunds.iter().all(|r| r.accepted));

    // Granting again must not restock twice.
    let repeated = storage.accept_refunds(&[order.id]).await?;
    assert_eq!(repeated, 0);
    assert_eq!(storage.get_item(&item.slug).await?.stock_no, 10);
    Ok(())
}
