//! Model registries for the admin filter endpoints.
//!
//! Each root mirrors one of the admin list screens: orders, items,
//! addresses and payments. The field lists are what those screens
//! filter and search on, not the full column set.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use retail::ui_model::{
    Field, FieldType, ModelRegistry, ModelRegistryProvider, Relatable, Relation, RelationKind,
    Table,
};

struct Orders;
struct OrderLines;
struct Items;
struct Categories;
struct Addresses;
struct Payments;
struct Coupons;
struct Users;

impl Relatable for Orders {
    fn table_name() -> &'static str {
        "orders"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field { name: "ref_code", field_type: FieldType::String },
            Field { name: "ordered", field_type: FieldType::Boolean },
            Field { name: "being_delivered", field_type: FieldType::Boolean },
            Field { name: "received", field_type: FieldType::Boolean },
            Field { name: "refund_requested", field_type: FieldType::Boolean },
            Field { name: "refund_granted", field_type: FieldType::Boolean },
            Field { name: "start_date", field_type: FieldType::DateTime },
            Field { name: "ordered_date", field_type: FieldType::DateTime },
            Field { name: "user_id", field_type: FieldType::Number },
        ]
    }

    fn relations() -> HashMap<&'static str, Relation> {
        HashMap::from([
            (
                "customer",
                Relation { kind: RelationKind::BelongsTo, target: "users", foreign_key: "user_id" },
            ),
            (
                "coupon",
                Relation { kind: RelationKind::BelongsTo, target: "coupons", foreign_key: "coupon_id" },
            ),
            (
                "payment",
                Relation { kind: RelationKind::BelongsTo, target: "payments", foreign_key: "payment_id" },
            ),
            (
                "shipping_address",
                Relation { kind: RelationKind::BelongsTo, target: "addresses", foreign_key: "shipping_address_id" },
            ),
            (
                "billing_address",
                Relation { kind: RelationKind::BelongsTo, target: "addresses", foreign_key: "billing_address_id" },
            ),
            (
                "lines",
                Relation { kind: RelationKind::HasMany, target: "order_items", foreign_key: "order_id" },
            ),
        ])
    }
}

impl Relatable for OrderLines {
    fn table_name() -> &'static str {
        "order_items"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field { name: "item_id", field_type: FieldType::Number },
            Field { name: "quantity", field_type: FieldType::Number },
        ]
    }
}

impl Relatable for Items {
    fn table_name() -> &'static str {
        "items"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field { name: "title", field_type: FieldType::String },
            Field { name: "slug", field_type: FieldType::String },
            Field { name: "label", field_type: FieldType::String },
            Field { name: "price", field_type: FieldType::Number },
            Field { name: "discount_price", field_type: FieldType::Number },
            Field { name: "stock_no", field_type: FieldType::Number },
            Field { name: "is_active", field_type: FieldType::Boolean },
            Field { name: "created_at", field_type: FieldType::DateTime },
            Field { name: "updated_at", field_type: FieldType::DateTime },
            Field { name: "last_purchased_at", field_type: FieldType::DateTime },
            Field { name: "category_id", field_type: FieldType::Number },
        ]
    }

    fn relations() -> HashMap<&'static str, Relation> {
        HashMap::from([(
            "category",
            Relation { kind: RelationKind::BelongsTo, target: "categories", foreign_key: "category_id" },
        )])
    }
}

impl Relatable for Categories {
    fn table_name() -> &'static str {
        "categories"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field { name: "title", field_type: FieldType::String },
            Field { name: "slug", field_type: FieldType::String },
            Field { name: "is_active", field_type: FieldType::Boolean },
        ]
    }
}

impl Relatable for Addresses {
    fn table_name() -> &'static str {
        "addresses"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field { name: "street_address", field_type: FieldType::String },
            Field { name: "apartment_address", field_type: FieldType::String },
            Field { name: "country", field_type: FieldType::String },
            Field { name: "zip", field_type: FieldType::String },
            Field { name: "address_type", field_type: FieldType::String },
            Field { name: "is_default", field_type: FieldType::Boolean },
            Field { name: "user_id", field_type: FieldType::Number },
        ]
    }

    fn relations() -> HashMap<&'static str, Relation> {
        HashMap::from([(
            "customer",
            Relation { kind: RelationKind::BelongsTo, target: "users", foreign_key: "user_id" },
        )])
    }
}

impl Relatable for Payments {
    fn table_name() -> &'static str {
        "payments"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field { name: "charge_id", field_type: FieldType::String },
            Field { name: "amount", field_type: FieldType::Number },
            Field { name: "created_at", field_type: FieldType::DateTime },
            Field { name: "user_id", field_type: FieldType::Number },
        ]
    }

    fn relations() -> HashMap<&'static str, Relation> {
        HashMap::from([(
            "customer",
            Relation { kind: RelationKind::BelongsTo, target: "users", foreign_key: "user_id" },
        )])
    }
}

impl Relatable for Coupons {
    fn table_name() -> &'static str {
        "coupons"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field { name: "code", field_type: FieldType::String },
            Field { name: "amount", field_type: FieldType::Number },
        ]
    }
}

impl Relatable for Users {
    fn table_name() -> &'static str {
        "users"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field { name: "username", field_type: FieldType::String },
            Field { name: "email", field_type: FieldType::String },
        ]
    }
}

/// Root marker for the order list screen.
pub struct OrderRows;

/// Root marker for the item list screen.
pub struct ItemRows;

/// Root marker for the address list screen.
pub struct AddressRows;

/// Root marker for the payment list screen.
pub struct PaymentRows;

static ORDERS_REGISTRY: Lazy<ModelRegistry> = Lazy::new(|| {
    ModelRegistry::new(Orders::into_table())
        .with_table(Users::into_table())
        .with_table(Coupons::into_table())
        .with_table(Payments::into_table())
        .with_table(Addresses::into_table())
        .with_table(OrderLines::into_table())
});

static ITEMS_REGISTRY: Lazy<ModelRegistry> = Lazy::new(|| {
    ModelRegistry::new(Items::into_table()).with_table(Categories::into_table())
});

static ADDRESSES_REGISTRY: Lazy<ModelRegistry> =
    Lazy::new(|| ModelRegistry::new(Addresses::into_table()).with_table(Users::into_table()));

static PAYMENTS_REGISTRY: Lazy<ModelRegistry> =
    Lazy::new(|| ModelRegistry::new(Payments::into_table()).with_table(Users::into_table()));

impl ModelRegistryProvider for OrderRows {
    fn registry() -> &'static ModelRegistry {
        &ORDERS_REGISTRY
    }
}

impl ModelRegistryProvider for ItemRows {
    fn registry() -> &'static ModelRegistry {
        &ITEMS_REGISTRY
    }
}

impl ModelRegistryProvider for AddressRows {
    fn registry() -> &'static ModelRegistry {
        &ADDRESSES_REGISTRY
    }
}

impl ModelRegistryProvider for PaymentRows {
    fn registry() -> &'static ModelRegistry {
        &PAYMENTS_REGISTRY
    }
}
