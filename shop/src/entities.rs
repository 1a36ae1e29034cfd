use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM User Entity
///
/// Stand-in for the host deployment's account system; everything that
/// belongs to somebody hangs off this table.
pub mod user {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub username: String,
        pub email: String,
        pub created_at: NaiveDateTime,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_one = "super::profile::Entity")]
        Profile,
        #[sea_orm(has_many = "super::order::Entity")]
        Orders,
        #[sea_orm(has_many = "super::address::Entity")]
        Addresses,
    }

    impl Related<super::profile::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Profile.def()
        }
    }

    impl Related<super::order::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Orders.def()
        }
    }

    impl Related<super::address::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Addresses.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Profile Entity
pub mod profile {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "profiles")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: i64,
        pub avatar_url: Option<String>,
        pub bio: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(belongs_to = "super::user::Entity", from = "Column::UserId", to = "super::user::Column::Id")]
        User,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Category Entity
pub mod category {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "categories")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub title: String,
        pub slug: String,
        pub description: String,
        pub image_url: String,
        pub is_active: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::item::Entity")]
        Items,
    }

    impl Related<super::item::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Items.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Item Entity
///
/// `label` holds the single-character merchandising code; the API layer
/// translates it to the `ItemLabel` enum.
pub mod item {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "items")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub title: String,
        pub slug: String,
        pub price: f64,
        pub discount_price: Option<f64>,
        pub category_id: i64,
        pub label: String,
        pub stock_no: i32,
        pub description_short: String,
        pub description_long: String,
        pub image_url: String,
        pub is_active: bool,
        pub created_at: NaiveDateTime,
        pub updated_at: NaiveDateTime,
        pub last_purchased_at: Option<NaiveDateTime>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(belongs_to = "super::category::Entity", from = "Column::CategoryId", to = "super::category::Column::Id")]
        Category,
        #[sea_orm(has_many = "super::order_item::Entity")]
        OrderItems,
        #[sea_orm(has_many = "super::review::Entity")]
        Reviews,
    }

    impl Related<super::category::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Category.def()
        }
    }

    impl Related<super::order_item::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::OrderItems.def()
        }
    }

    impl Related<super::review::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Reviews.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Address Entity
///
/// `address_type` is `B` for billing, `S` for shipping.
pub mod address {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "addresses")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: i64,
        pub street_address: String,
        pub apartment_address: String,
        pub country: String,
        pub zip: String,
        pub address_type: String,
        pub is_default: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(belongs_to = "super::user::Entity", from = "Column::UserId", to = "super::user::Column::Id")]
        User,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Payment Entity
pub mod payment {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "payments")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub charge_id: String,
        pub user_id: Option<i64>,
        pub amount: f64,
        pub created_at: NaiveDateTime,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(belongs_to = "super::user::Entity", from = "Column::UserId", to = "super::user::Column::Id")]
        User,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Coupon Entity
pub mod coupon {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "coupons")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub code: String,
        pub amount: f64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::order::Entity")]
        Orders,
    }

    impl Related<super::order::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Orders.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Order Entity
///
/// The user's cart is the row with `ordered = false`; the lifecycle
/// flags flip as the order moves through payment, delivery, receipt and
/// refunds.
pub mod order {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "orders")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: i64,
        pub ref_code: Option<String>,
        pub start_date: NaiveDateTime,
        pub ordered_date: Option<NaiveDateTime>,
        pub ordered: bool,
        pub being_delivered: bool,
        pub received: bool,
        pub refund_requested: bool,
        pub refund_granted: bool,
        pub shipping_address_id: Option<i64>,
        pub billing_address_id: Option<i64>,
        pub payment_id: Option<i64>,
        pub coupon_id: Option<i64>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(belongs_to = "super::user::Entity", from = "Column::UserId", to = "super::user::Column::Id")]
        User,
        #[sea_orm(has_many = "super::order_item::Entity")]
        OrderItems,
        #[sea_orm(has_many = "super::refund::Entity")]
        Refunds,
        #[sea_orm(belongs_to = "super::payment::Entity", from = "Column::PaymentId", to = "super::payment::Column::Id")]
        Payment,
        #[sea_orm(belongs_to = "super::coupon::Entity", from = "Column::CouponId", to = "super::coupon::Column::Id")]
        Coupon,
        #[sea_orm(belongs_to = "super::address::Entity", from = "Column::ShippingAddressId", to = "super::address::Column::Id")]
        ShippingAddress,
        #[sea_orm(belongs_to = "super::address::Entity", from = "Column::BillingAddressId", to = "super::address::Column::Id")]
        BillingAddress,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl Related<super::order_item::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::OrderItems.def()
        }
    }

    impl Related<super::refund::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Refunds.def()
        }
    }

    impl Related<super::payment::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Payment.def()
        }
    }

    impl Related<super::coupon::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Coupon.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Order Item Entity
pub mod order_item {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "order_items")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub order_id: i64,
        pub item_id: i64,
        pub quantity: i32,
        pub created_at: NaiveDateTime,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(belongs_to = "super::order::Entity", from = "Column::OrderId", to = "super::order::Column::Id")]
        Order,
        #[sea_orm(belongs_to = "super::item::Entity", from = "Column::ItemId", to = "super::item::Column::Id")]
        Item,
    }

    impl Related<super::order::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Order.def()
        }
    }

    impl Related<super::item::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Item.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Refund Entity
pub mod refund {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "refunds")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub order_id: i64,
        pub reason: String,
        pub email: String,
        pub accepted: bool,
        pub created_at: NaiveDateTime,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(belongs_to = "super::order::Entity", from = "Column::OrderId", to = "super::order::Column::Id")]
        Order,
    }

    impl Related<super::order::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Order.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// SeaORM Review Entity
pub mod review {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "reviews")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: Option<i64>,
        pub item_id: i64,
        pub content: String,
        pub created_at: NaiveDateTime,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(belongs_to = "super::user::Entity", from = "Column::UserId", to = "super::user::Column::Id")]
        User,
        #[sea_orm(belongs_to = "super::item::Entity", from = "Column::ItemId", to = "super::item::Column::Id")]
        Item,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl Related<super::item::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Item.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamp() -> NaiveDateTime {
        chrono::DateTime::from_timestamp(1640995200, 0).unwrap().naive_utc()
    }

    #[test]
    fn test_item_entity_creation() {
        let item = item::Model {
            id: 1,
            title: "Wool Jumper".to_string(),
            slug: "wool-jumper".to_string(),
            price: 59.0,
            discount_price: Some(49.0),
            category_id: 1,
            label: "S".to_string(),
            stock_no: 40,
            description_short: "Chunky knit".to_string(),
            description_long: "A chunky knit jumper in undyed wool.".to_string(),
            image_url: "/media/wool-jumper.jpg".to_string(),
            is_active: true,
            created_at: timestamp(),
            updated_at: timestamp(),
            last_purchased_at: None,
        };

        assert_eq!(item.id, 1);
        assert_eq!(item.slug, "wool-jumper");
        assert_eq!(item.discount_price, Some(49.0));
    }

    #[test]
    fn test_order_entity_creation() {
        let order = order::Model {
            id: 1,
            user_id: 7,
            ref_code: None,
            start_date: timestamp(),
            ordered_date: None,
            ordered: false,
            being_delivered: false,
            received: false,
            refund_requested: false,
            refund_granted: false,
            shipping_address_id: None,
            billing_address_id: None,
            payment_id: None,
            coupon_id: None,
        };

        assert_eq!(order.user_id, 7);
        assert!(!order.ordered);
        assert!(order.ref_code.is_none());
    }

    #[test]
    fn test_order_entity_serialization() {
        let order_item = order_item::Model {
            id: 3,
            order_id: 1,
            item_id: 2,
            quantity: 4,
            created_at: timestamp(),
        };

        let json = serde_json::to_string(&order_item).unwrap();
        assert!(json.contains("\"quantity\":4"));

        let decoded: order_item::Model = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, order_item);
    }
}
