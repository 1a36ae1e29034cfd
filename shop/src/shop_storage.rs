use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbBackend, EntityTrait, FromQueryResult, IntoActiveModel, ModelTrait,
    NotSet, PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};
use tracing::{debug, error, info};

use crate::entities::{
    address, category, coupon, item, order, order_item, payment, profile, refund, review, user,
};
use retail::model::{
    slugify, AddressKind, AddressRecord, CartLine, CartSummary, CategoryRecord, CheckoutRequest,
    CouponRecord, GenericError, ItemRecord, ItemRevenueBucket, ModelId, NewAddress, NewCategory,
    NewCoupon, NewItem, NewReview, OrderRecord, PaymentRecord, ProfileRecord, ProfileUpdate,
    RefundRecord, RefundRequest, ReviewRecord, RevenueBucket, ShopError, StaleItem, StockAlert,
};
use retail::storage::{CartStorage, CatalogStorage, OrderStorage, ProfileStorage, RevenueStorage};

static REF_CODE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Production storage over a SeaORM connection.
///
/// Runs against PostgreSQL in deployments; the integration suites point
/// it at in-memory SQLite, which is why the raw SQL sticks to the
/// portable subset.
#[derive(Clone)]
pub struct ProdShopStorage {
    pub db: DatabaseConnection,
}

impl ProdShopStorage {
    pub async fn new(database_url: &str) -> Result<Self, GenericError> {
        let db = Database::connect(database_url).await?;
        Ok(Self { db })
    }

    pub async fn with_options(options: ConnectOptions) -> Result<Self, GenericError> {
        let db = Database::connect(options).await?;
        Ok(Self { db })
    }

    /// Install the schema for the connected backend.
    pub async fn initialize_schema(&self) -> Result<(), GenericError> {
        let ddl = match self.db.get_database_backend() {
            DbBackend::Postgres => include_str!("../resources/schema_postgres.sql"),
            DbBackend::Sqlite => include_str!("../resources/schema_sqlite.sql"),
            other => return Err(format!("unsupported database backend: {:?}", other).into()),
        };
        for statement in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            self.db.execute_unprepared(statement).await?;
        }
        Ok(())
    }

    fn now() -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }

    fn generate_ref_code() -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let counter = REF_CODE_COUNTER.fetch_add(1, Ordering::SeqCst);
        format!("ORD-{:X}-{:X}", millis, counter)
    }

    async fn active_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: ModelId,
    ) -> Result<Option<order::Model>, GenericError> {
        Ok(order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::Ordered.eq(false))
            .one(conn)
            .await?)
    }

    async fn load_summary<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_model: &order::Model,
    ) -> Result<CartSummary, GenericError> {
        let rows = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_model.id))
            .find_also_related(item::Entity)
            .all(conn)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (line, maybe_item) in rows {
            let item_row =
                maybe_item.ok_or_else(|| format!("order item {} lost its item", line.id))?;
            lines.push(CartLine {
                order_item_id: line.id,
                item_id: item_row.id,
                title: item_row.title,
                slug: item_row.slug,
                quantity: line.quantity,
                price: item_row.price,
                discount_price: item_row.discount_price,
            });
        }

        let applied_coupon = match order_model.coupon_id {
            Some(coupon_id) => coupon::Entity::find_by_id(coupon_id)
                .one(conn)
                .await?
                .map(|c| CouponRecord {
                    id: c.id,
                    code: c.code,
                    amount: c.amount,
                }),
            None => None,
        };

        Ok(CartSummary {
            order_id: order_model.id,
            user_id: order_model.user_id,
            ref_code: order_model.ref_code.clone(),
            lines,
            coupon: applied_coupon,
        })
    }

    async fn find_item_by_slug<C: ConnectionTrait>(
        &self,
        conn: &C,
        slug: &str,
    ) -> Result<item::Model, GenericError> {
        item::Entity::find()
            .filter(item::Column::Slug.eq(slug))
            .filter(item::Column::IsActive.eq(true))
            .one(conn)
            .await?
            .ok_or_else(|| ShopError::not_found("item", slug))
    }

    async fn default_address<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: ModelId,
        kind: AddressKind,
    ) -> Result<Option<address::Model>, GenericError> {
        Ok(address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .filter(address::Column::AddressType.eq(kind.code()))
            .filter(address::Column::IsDefault.eq(true))
            .one(conn)
            .await?)
    }

    async fn insert_address<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: ModelId,
        new_address: &NewAddress,
        kind: AddressKind,
    ) -> Result<address::Model, GenericError> {
        if new_address.set_default {
            // One default per address type and user.
            address::Entity::update_many()
                .col_expr(address::Column::IsDefault, Expr::value(false))
                .filter(address::Column::UserId.eq(user_id))
                .filter(address::Column::AddressType.eq(kind.code()))
                .exec(conn)
                .await?;
        }

        Ok(address::ActiveModel {
            id: NotSet,
            user_id: Set(user_id),
            street_address: Set(new_address.street_address.clone()),
            apartment_address: Set(new_address.apartment_address.clone()),
            country: Set(new_address.country.clone()),
            zip: Set(new_address.zip.clone()),
            address_type: Set(kind.code().to_string()),
            is_default: Set(new_address.set_default),
        }
        .insert(conn)
        .await?)
    }

    fn day_expr(backend: DbBackend) -> &'static str {
        match backend {
            DbBackend::Postgres => "to_char(date_trunc('day', o.ordered_date), 'YYYY-MM-DD')",
            _ => "strftime('%Y-%m-%d', o.ordered_date)",
        }
    }

    fn month_expr(backend: DbBackend) -> &'static str {
        match backend {
            DbBackend::Postgres => "to_char(date_trunc('month', o.ordered_date), 'YYYY-MM')",
            _ => "strftime('%Y-%m', o.ordered_date)",
        }
    }
}

fn item_record(model: item::Model) -> ItemRecord {
    ItemRecord {
        id: model.id,
        title: model.title,
        slug: model.slug,
        price: model.price,
        discount_price: model.discount_price,
        category_id: model.category_id,
        label: model.label,
        stock_no: model.stock_no,
        description_short: model.description_short,
        description_long: model.description_long,
        image_url: model.image_url,
        is_active: model.is_active,
        created_at: model.created_at,
        updated_at: model.updated_at,
        last_purchased_at: model.last_purchased_at,
    }
}

fn category_record(model: category::Model) -> CategoryRecord {
    CategoryRecord {
        id: model.id,
        title: model.title,
        slug: model.slug,
        description: model.description,
        image_url: model.image_url,
        is_active: model.is_active,
    }
}

fn review_record(model: review::Model) -> ReviewRecord {
    ReviewRecord {
        id: model.id,
        item_id: model.item_id,
        user_id: model.user_id,
        content: model.content,
        created_at: model.created_at,
    }
}

fn address_record(model: address::Model) -> AddressRecord {
    AddressRecord {
        id: model.id,
        user_id: model.user_id,
        street_address: model.street_address,
        apartment_address: model.apartment_address,
        country: model.country,
        zip: model.zip,
        address_type: model.address_type,
        is_default: model.is_default,
    }
}

fn order_record(model: order::Model) -> OrderRecord {
    OrderRecord {
        id: model.id,
        user_id: model.user_id,
        ref_code: model.ref_code,
        start_date: model.start_date,
        ordered_date: model.ordered_date,
        ordered: model.ordered,
        being_delivered: model.being_delivered,
        received: model.received,
        refund_requested: model.refund_requested,
        refund_granted: model.refund_granted,
        shipping_address_id: model.shipping_address_id,
        billing_address_id: model.billing_address_id,
        payment_id: model.payment_id,
        coupon_id: model.coupon_id,
    }
}

fn refund_record(model: refund::Model) -> RefundRecord {
    RefundRecord {
        id: model.id,
        order_id: model.order_id,
        reason: model.reason,
        email: model.email,
        accepted: model.accepted,
        created_at: model.created_at,
    }
}

fn payment_record(model: payment::Model) -> PaymentRecord {
    PaymentRecord {
        id: model.id,
        charge_id: model.charge_id,
        user_id: model.user_id,
        amount: model.amount,
        created_at: model.created_at,
    }
}

#[async_trait]
impl CatalogStorage for ProdShopStorage {
    async fn list_items(&self, page: u64, per_page: u64) -> Result<Vec<ItemRecord>, GenericError> {
        let items = item::Entity::find()
            .filter(item::Column::IsActive.eq(true))
            .order_by_desc(item::Column::CreatedAt)
            .paginate(&self.db, per_page.max(1))
            .fetch_page(page)
            .await?;
        Ok(items.into_iter().map(item_record).collect())
    }

    async fn get_item(&self, slug: &str) -> Result<ItemRecord, GenericError> {
        let model = self.find_item_by_slug(&self.db, slug).await?;
        Ok(item_record(model))
    }

    async fn items_by_ids(&self, ids: &[ModelId]) -> Result<Vec<ItemRecord>, GenericError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let items = item::Entity::find()
            .filter(item::Column::Id.is_in(ids.iter().copied()))
            .order_by_desc(item::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(items.into_iter().map(item_record).collect())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, GenericError> {
        let categories = category::Entity::find()
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::Title)
            .all(&self.db)
            .await?;
        Ok(categories.into_iter().map(category_record).collect())
    }

    async fn get_category(
        &self,
        slug: &str,
    ) -> Result<(CategoryRecord, Vec<ItemRecord>), GenericError> {
        let model = category::Entity::find()
            .filter(category::Column::Slug.eq(slug))
            .filter(category::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| ShopError::not_found("category", slug))?;

        let items = item::Entity::find()
            .filter(item::Column::CategoryId.eq(model.id))
            .filter(item::Column::IsActive.eq(true))
            .order_by_desc(item::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok((
            category_record(model),
            items.into_iter().map(item_record).collect(),
        ))
    }

    async fn search_items(&self, query: &str) -> Result<Vec<ItemRecord>, GenericError> {
        let pattern = query.trim();
        if pattern.is_empty() {
            return Ok(vec![]);
        }
        let items = item::Entity::find()
            .filter(item::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(item::Column::Title.contains(pattern))
                    .add(item::Column::DescriptionShort.contains(pattern))
                    .add(item::Column::DescriptionLong.contains(pattern)),
            )
            .order_by_desc(item::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(items.into_iter().map(item_record).collect())
    }

    async fn create_item(&self, new_item: &NewItem) -> Result<ItemRecord, GenericError> {
        if new_item.price < 0.0 {
            return Err(ShopError::invalid_input("price must not be negative"));
        }
        if new_item.stock_no < 0 {
            return Err(ShopError::invalid_input("stock_no must not be negative"));
        }

        let category_exists = category::Entity::find_by_id(new_item.category_id)
            .one(&self.db)
            .await?
            .is_some();
        if !category_exists {
            return Err(ShopError::not_found(
                "category",
                new_item.category_id.to_string(),
            ));
        }

        let slug = new_item
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&new_item.title));
        if slug.is_empty() {
            return Err(ShopError::invalid_input("title yields an empty slug"));
        }

        let now = Self::now();
        let model = item::ActiveModel {
            id: NotSet,
            title: Set(new_item.title.clone()),
            slug: Set(slug),
            price: Set(new_item.price),
            discount_price: Set(new_item.discount_price),
            category_id: Set(new_item.category_id),
            label: Set(new_item.label.code().to_string()),
            stock_no: Set(new_item.stock_no),
            description_short: Set(new_item.description_short.clone()),
            description_long: Set(new_item.description_long.clone()),
            image_url: Set(new_item.image_url.clone()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            last_purchased_at: Set(None),
        }
        .insert(&self.db)
        .await?;

        info!("Created item {} ({})", model.id, model.slug);
        Ok(item_record(model))
    }

    async fn create_category(
        &self,
        new_category: &NewCategory,
    ) -> Result<CategoryRecord, GenericError> {
        let slug = new_category
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&new_category.title));
        if slug.is_empty() {
            return Err(ShopError::invalid_input("title yields an empty slug"));
        }

        let model = category::ActiveModel {
            id: NotSet,
            title: Set(new_category.title.clone()),
            slug: Set(slug),
            description: Set(new_category.description.clone()),
            image_url: Set(new_category.image_url.clone()),
            is_active: Set(true),
        }
        .insert(&self.db)
        .await?;

        Ok(category_record(model))
    }

    async fn create_coupon(&self, new_coupon: &NewCoupon) -> Result<CouponRecord, GenericError> {
        if new_coupon.amount < 0.0 {
            return Err(ShopError::invalid_input(
                "coupon amount must not be negative",
            ));
        }
        let duplicate = coupon::Entity::find()
            .filter(coupon::Column::Code.eq(new_coupon.code.as_str()))
            .one(&self.db)
            .await?;
        if duplicate.is_some() {
            return Err(ShopError::invalid_input(format!(
                "coupon code already exists: {}",
                new_coupon.code
            )));
        }

        let model = coupon::ActiveModel {
            id: NotSet,
            code: Set(new_coupon.code.clone()),
            amount: Set(new_coupon.amount),
        }
        .insert(&self.db)
        .await?;

        Ok(CouponRecord {
            id: model.id,
            code: model.code,
            amount: model.amount,
        })
    }

    async fn copy_items(&self, item_ids: &[ModelId]) -> Result<Vec<ItemRecord>, GenericError> {
        let txn = self.db.begin().await?;
        let mut copies = Vec::with_capacity(item_ids.len());
        for &item_id in item_ids {
            let source = item::Entity::find_by_id(item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ShopError::not_found("item", item_id.to_string()))?;

            let now = Self::now();
            let copy = item::ActiveModel {
                id: NotSet,
                title: Set(source.title.clone()),
                slug: Set(source.slug.clone()),
                price: Set(source.price),
                discount_price: Set(source.discount_price),
                category_id: Set(source.category_id),
                label: Set(source.label.clone()),
                stock_no: Set(source.stock_no),
                description_short: Set(source.description_short.clone()),
                description_long: Set(source.description_long.clone()),
                image_url: Set(source.image_url.clone()),
                is_active: Set(source.is_active),
                created_at: Set(now),
                updated_at: Set(now),
                last_purchased_at: Set(None),
            }
            .insert(&txn)
            .await?;
            copies.push(item_record(copy));
        }
        txn.commit().await?;

        info!("Copied {} items", copies.len());
        Ok(copies)
    }

    async fn stock_alerts(
        &self,
        low_stock_threshold: i32,
        stale_cutoff: NaiveDateTime,
    ) -> Result<(Vec<StockAlert>, Vec<StaleItem>), GenericError> {
        let low = item::Entity::find()
            .filter(item::Column::IsActive.eq(true))
            .filter(item::Column::StockNo.lt(low_stock_threshold))
            .order_by_asc(item::Column::StockNo)
            .all(&self.db)
            .await?;

        // NULL last_purchased_at never matches: an item that has never
        // sold is not "stale", it is new.
        let stale = item::Entity::find()
            .filter(item::Column::IsActive.eq(true))
            .filter(item::Column::LastPurchasedAt.lte(stale_cutoff))
            .order_by_asc(item::Column::LastPurchasedAt)
            .all(&self.db)
            .await?;

        Ok((
            low.into_iter()
                .map(|i| StockAlert {
                    item_id: i.id,
                    title: i.title,
                    stock_no: i.stock_no,
                })
                .collect(),
            stale
                .into_iter()
                .map(|i| StaleItem {
                    item_id: i.id,
                    title: i.title,
                    last_purchased_at: i.last_purchased_at,
                })
                .collect(),
        ))
    }

    async fn add_review(
        &self,
        slug: &str,
        new_review: &NewReview,
    ) -> Result<ReviewRecord, GenericError> {
        let item_row = self.find_item_by_slug(&self.db, slug).await?;

        if let Some(user_id) = new_review.user_id {
            let user_exists = user::Entity::find_by_id(user_id)
                .one(&self.db)
                .await?
                .is_some();
            if !user_exists {
                return Err(ShopError::not_found("user", user_id.to_string()));
            }
        }

        let model = review::ActiveModel {
            id: NotSet,
            user_id: Set(new_review.user_id),
            item_id: Set(item_row.id),
            content: Set(new_review.content.clone()),
            created_at: Set(Self::now()),
        }
        .insert(&self.db)
        .await?;

        Ok(review_record(model))
    }

    async fn item_reviews(&self, slug: &str) -> Result<Vec<ReviewRecord>, GenericError> {
        let item_row = self.find_item_by_slug(&self.db, slug).await?;
        let reviews = review::Entity::find()
            .filter(review::Column::ItemId.eq(item_row.id))
            .order_by_desc(review::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(reviews.into_iter().map(review_record).collect())
    }
}

#[async_trait]
impl CartStorage for ProdShopStorage {
    async fn add_to_cart(
        &self,
        user_id: ModelId,
        slug: &str,
    ) -> Result<CartSummary, GenericError> {
        debug!("Adding {} to cart for user {}", slug, user_id);
        let txn = self.db.begin().await?;

        let item_row = self.find_item_by_slug(&txn, slug).await?;

        let order_model = match self.active_order(&txn, user_id).await? {
            Some(existing) => existing,
            None => {
                let user_exists = user::Entity::find_by_id(user_id).one(&txn).await?.is_some();
                if !user_exists {
                    return Err(ShopError::not_found("user", user_id.to_string()));
                }
                order::ActiveModel {
                    id: NotSet,
                    user_id: Set(user_id),
                    ref_code: Set(None),
                    start_date: Set(Self::now()),
                    ordered_date: Set(None),
                    ordered: Set(false),
                    being_delivered: Set(false),
                    received: Set(false),
                    refund_requested: Set(false),
                    refund_granted: Set(false),
                    shipping_address_id: Set(None),
                    billing_address_id: Set(None),
                    payment_id: Set(None),
                    coupon_id: Set(None),
                }
                .insert(&txn)
                .await?
            }
        };

        let existing_line = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_model.id))
            .filter(order_item::Column::ItemId.eq(item_row.id))
            .one(&txn)
            .await?;

        match existing_line {
            Some(line) => {
                let quantity = line.quantity + 1;
                let mut active = line.into_active_model();
                active.quantity = Set(quantity);
                active.update(&txn).await?;
            }
            None => {
                order_item::ActiveModel {
                    id: NotSet,
                    order_id: Set(order_model.id),
                    item_id: Set(item_row.id),
                    quantity: Set(1),
                    created_at: Set(Self::now()),
                }
                .insert(&txn)
                .await?;
            }
        }

        let summary = self.load_summary(&txn, &order_model).await?;
        txn.commit().await?;
        info!("Cart for user {} now has {} lines", user_id, summary.lines.len());
        Ok(summary)
    }

    async fn remove_from_cart(
        &self,
        user_id: ModelId,
        slug: &str,
    ) -> Result<CartSummary, GenericError> {
        let txn = self.db.begin().await?;

        let order_model = self
            .active_order(&txn, user_id)
            .await?
            .ok_or_else(|| ShopError::empty_cart(user_id))?;
        let item_row = self.find_item_by_slug(&txn, slug).await?;

        let deleted = order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_model.id))
            .filter(order_item::Column::ItemId.eq(item_row.id))
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(ShopError::not_found("cart line", slug));
        }

        let summary = self.load_summary(&txn, &order_model).await?;
        txn.commit().await?;
        Ok(summary)
    }

    async fn remove_single_from_cart(
        &self,
        user_id: ModelId,
        slug: &str,
    ) -> Result<CartSummary, GenericError> {
        let txn = self.db.begin().await?;

        let order_model = self
            .active_order(&txn, user_id)
            .await?
            .ok_or_else(|| ShopError::empty_cart(user_id))?;
        let item_row = self.find_item_by_slug(&txn, slug).await?;

        let line = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_model.id))
            .filter(order_item::Column::ItemId.eq(item_row.id))
            .one(&txn)
            .await?
            .ok_or_else(|| ShopError::not_found("cart line", slug))?;

        if line.quantity > 1 {
            let quantity = line.quantity - 1;
            let mut active = line.into_active_model();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
        } else {
            line.delete(&txn).await?;
        }

        let summary = self.load_summary(&txn, &order_model).await?;
        txn.commit().await?;
        Ok(summary)
    }

    async fn cart_summary(&self, user_id: ModelId) -> Result<CartSummary, GenericError> {
        let order_model = self
            .active_order(&self.db, user_id)
            .await?
            .ok_or_else(|| ShopError::empty_cart(user_id))?;
        self.load_summary(&self.db, &order_model).await
    }

    async fn apply_coupon(
        &self,
        user_id: ModelId,
        code: &str,
    ) -> Result<CartSummary, GenericError> {
        let txn = self.db.begin().await?;

        let order_model = self
            .active_order(&txn, user_id)
            .await?
            .ok_or_else(|| ShopError::empty_cart(user_id))?;

        let coupon_row = coupon::Entity::find()
            .filter(coupon::Column::Code.eq(code))
            .one(&txn)
            .await?
            .ok_or_else(|| ShopError::not_found("coupon", code))?;

        let mut active = order_model.clone().into_active_model();
        active.coupon_id = Set(Some(coupon_row.id));
        let updated = active.update(&txn).await?;

        let summary = self.load_summary(&txn, &updated).await?;
        txn.commit().await?;
        info!("Applied coupon {} to order {}", code, updated.id);
        Ok(summary)
    }
}

#[async_trait]
impl OrderStorage for ProdShopStorage {
    async fn checkout(&self, request: &CheckoutRequest) -> Result<OrderRecord, GenericError> {
        debug!("Processing checkout for user {}", request.user_id);
        let txn = self.db.begin().await?;

        let order_model = self
            .active_order(&txn, request.user_id)
            .await?
            .ok_or_else(|| ShopError::empty_cart(request.user_id))?;

        let line_count = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_model.id))
            .count(&txn)
            .await?;
        if line_count == 0 {
            return Err(ShopError::empty_cart(request.user_id));
        }

        let shipping = if request.use_default_shipping {
            self.default_address(&txn, request.user_id, AddressKind::Shipping)
                .await?
                .ok_or_else(|| {
                    ShopError::not_found("default shipping address", request.user_id.to_string())
                })?
        } else {
            let new_address = request
                .shipping
                .as_ref()
                .ok_or_else(|| ShopError::invalid_input("a shipping address is required"))?;
            self.insert_address(&txn, request.user_id, new_address, AddressKind::Shipping)
                .await?
        };

        let billing = if request.same_billing_address {
            // Clone the shipping address as a billing-typed row.
            address::ActiveModel {
                id: NotSet,
                user_id: Set(request.user_id),
                street_address: Set(shipping.street_address.clone()),
                apartment_address: Set(shipping.apartment_address.clone()),
                country: Set(shipping.country.clone()),
                zip: Set(shipping.zip.clone()),
                address_type: Set(AddressKind::Billing.code().to_string()),
                is_default: Set(false),
            }
            .insert(&txn)
            .await?
        } else if request.use_default_billing {
            self.default_address(&txn, request.user_id, AddressKind::Billing)
                .await?
                .ok_or_else(|| {
                    ShopError::not_found("default billing address", request.user_id.to_string())
                })?
        } else {
            let new_address = request
                .billing
                .as_ref()
                .ok_or_else(|| ShopError::invalid_input("a billing address is required"))?;
            self.insert_address(&txn, request.user_id, new_address, AddressKind::Billing)
                .await?
        };

        let mut active = order_model.into_active_model();
        active.shipping_address_id = Set(Some(shipping.id));
        active.billing_address_id = Set(Some(billing.id));
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        info!("Checkout recorded for order {}", updated.id);
        Ok(order_record(updated))
    }

    async fn record_payment(
        &self,
        user_id: ModelId,
        charge_id: &str,
        amount: f64,
    ) -> Result<OrderRecord, GenericError> {
        debug!("Recording payment for user {}", user_id);
        let txn = self.db.begin().await?;

        let order_model = self
            .active_order(&txn, user_id)
            .await?
            .ok_or_else(|| ShopError::empty_cart(user_id))?;
        let summary = self.load_summary(&txn, &order_model).await?;
        if summary.is_empty() {
            return Err(ShopError::empty_cart(user_id));
        }
        if order_model.billing_address_id.is_none() {
            return Err(ShopError::invalid_input(
                "checkout must be completed before payment",
            ));
        }

        let now = Self::now();
        let payment_row = payment::ActiveModel {
            id: NotSet,
            charge_id: Set(charge_id.to_string()),
            user_id: Set(Some(user_id)),
            amount: Set(amount),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        // Guarded decrement: losing the race or selling out rolls the
        // whole payment back.
        for line in &summary.lines {
            let updated = item::Entity::update_many()
                .col_expr(
                    item::Column::StockNo,
                    Expr::col(item::Column::StockNo).sub(line.quantity),
                )
                .col_expr(item::Column::LastPurchasedAt, Expr::value(now))
                .col_expr(item::Column::UpdatedAt, Expr::value(now))
                .filter(item::Column::Id.eq(line.item_id))
                .filter(item::Column::StockNo.gte(line.quantity))
                .exec(&txn)
                .await?;

            if updated.rows_affected == 0 {
                let available = item::Entity::find_by_id(line.item_id)
                    .one(&txn)
                    .await?
                    .map(|i| i.stock_no)
                    .unwrap_or(0);
                error!("Stock exhausted for {} during payment", line.slug);
                return Err(ShopError::out_of_stock(
                    line.title.clone(),
                    line.quantity,
                    available,
                ));
            }
        }

        let mut active = order_model.into_active_model();
        active.ref_code = Set(Some(Self::generate_ref_code()));
        active.ordered = Set(true);
        active.ordered_date = Set(Some(now));
        active.payment_id = Set(Some(payment_row.id));
        let placed = active.update(&txn).await?;

        txn.commit().await?;
        info!(
            "Order {} placed with payment {} ({} lines)",
            placed.id,
            payment_row.id,
            summary.lines.len()
        );
        Ok(order_record(placed))
    }

    async fn confirm_received(
        &self,
        user_id: ModelId,
        ref_code: &str,
    ) -> Result<OrderRecord, GenericError> {
        let order_model = order::Entity::find()
            .filter(order::Column::RefCode.eq(ref_code))
            .filter(order::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| ShopError::not_found("order", ref_code))?;

        if !order_model.being_delivered {
            return Err(ShopError::invalid_input("order is not out for delivery"));
        }

        let mut active = order_model.into_active_model();
        active.received = Set(true);
        active.being_delivered = Set(false);
        let updated = active.update(&self.db).await?;
        Ok(order_record(updated))
    }

    async fn request_refund(&self, refund: &RefundRequest) -> Result<RefundRecord, GenericError> {
        let txn = self.db.begin().await?;

        let order_model = order::Entity::find()
            .filter(order::Column::RefCode.eq(refund.ref_code.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| ShopError::not_found("order", refund.ref_code.clone()))?;
        if !order_model.ordered {
            return Err(ShopError::invalid_input(
                "only placed orders can be refunded",
            ));
        }

        let order_id = order_model.id;
        let mut active = order_model.into_active_model();
        active.refund_requested = Set(true);
        active.update(&txn).await?;

        let refund_row = refund::ActiveModel {
            id: NotSet,
            order_id: Set(order_id),
            reason: Set(refund.reason.clone()),
            email: Set(refund.email.clone()),
            accepted: Set(false),
            created_at: Set(Self::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!("Refund requested for order {}", order_id);
        Ok(refund_record(refund_row))
    }

    async fn accept_refunds(&self, order_ids: &[ModelId]) -> Result<u64, GenericError> {
        let txn = self.db.begin().await?;
        let mut updated = 0u64;

        for &order_id in order_ids {
            let order_model = match order::Entity::find_by_id(order_id).one(&txn).await? {
                Some(model) => model,
                None => continue,
            };
            if order_model.refund_granted {
                // Already granted, restocking again would double-count.
                continue;
            }

            if order_model.ordered {
                let lines = order_item::Entity::find()
                    .filter(order_item::Column::OrderId.eq(order_model.id))
                    .all(&txn)
                    .await?;
                for line in &lines {
                    item::Entity::update_many()
                        .col_expr(
                            item::Column::StockNo,
                            Expr::col(item::Column::StockNo).add(line.quantity),
                        )
                        .filter(item::Column::Id.eq(line.item_id))
                        .exec(&txn)
                        .await?;
                }
            }

            let mut active = order_model.into_active_model();
            active.refund_requested = Set(false);
            active.refund_granted = Set(true);
            active.update(&txn).await?;
            updated += 1;
        }

        refund::Entity::update_many()
            .col_expr(refund::Column::Accepted, Expr::value(true))
            .filter(refund::Column::OrderId.is_in(order_ids.iter().copied()))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        info!("Granted refunds for {} orders", updated);
        Ok(updated)
    }

    async fn mark_delivered(&self, order_ids: &[ModelId]) -> Result<u64, GenericError> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::BeingDelivered, Expr::value(true))
            .filter(order::Column::Id.is_in(order_ids.iter().copied()))
            .filter(order::Column::Ordered.eq(true))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn orders_by_ids(&self, ids: &[ModelId]) -> Result<Vec<OrderRecord>, GenericError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let orders = order::Entity::find()
            .filter(order::Column::Id.is_in(ids.iter().copied()))
            .order_by_desc(order::Column::StartDate)
            .all(&self.db)
            .await?;
        Ok(orders.into_iter().map(order_record).collect())
    }

    async fn user_orders(&self, user_id: ModelId) -> Result<Vec<OrderRecord>, GenericError> {
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::Ordered.eq(true))
            .order_by_desc(order::Column::OrderedDate)
            .all(&self.db)
            .await?;
        Ok(orders.into_iter().map(order_record).collect())
    }

    async fn addresses_by_ids(
        &self,
        ids: &[ModelId],
    ) -> Result<Vec<AddressRecord>, GenericError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let addresses = address::Entity::find()
            .filter(address::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?;
        Ok(addresses.into_iter().map(address_record).collect())
    }

    async fn payments_by_ids(
        &self,
        ids: &[ModelId],
    ) -> Result<Vec<PaymentRecord>, GenericError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let payments = payment::Entity::find()
            .filter(payment::Column::Id.is_in(ids.iter().copied()))
            .order_by_desc(payment::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(payments.into_iter().map(payment_record).collect())
    }
}

#[async_trait]
impl ProfileStorage for ProdShopStorage {
    async fn get_profile(&self, user_id: ModelId) -> Result<ProfileRecord, GenericError> {
        let user_model = user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ShopError::not_found("user", user_id.to_string()))?;

        let profile_model = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        let (avatar_url, bio) = match profile_model {
            Some(p) => (p.avatar_url, p.bio),
            None => (None, String::new()),
        };

        Ok(ProfileRecord {
            user_id,
            username: user_model.username,
            email: user_model.email,
            avatar_url,
            bio,
        })
    }

    async fn update_profile(
        &self,
        user_id: ModelId,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, GenericError> {
        if update.avatar_url.is_none() && update.bio.is_none() {
            return self.get_profile(user_id).await;
        }

        let txn = self.db.begin().await?;
        let user_exists = user::Entity::find_by_id(user_id).one(&txn).await?.is_some();
        if !user_exists {
            return Err(ShopError::not_found("user", user_id.to_string()));
        }

        let existing = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&txn)
            .await?;
        match existing {
            Some(profile_model) => {
                let mut active = profile_model.into_active_model();
                if let Some(avatar_url) = &update.avatar_url {
                    active.avatar_url = Set(Some(avatar_url.clone()));
                }
                if let Some(bio) = &update.bio {
                    active.bio = Set(bio.clone());
                }
                active.update(&txn).await?;
            }
            None => {
                profile::ActiveModel {
                    id: NotSet,
                    user_id: Set(user_id),
                    avatar_url: Set(update.avatar_url.clone()),
                    bio: Set(update.bio.clone().unwrap_or_default()),
                }
                .insert(&txn)
                .await?;
            }
        }
        txn.commit().await?;

        self.get_profile(user_id).await
    }
}

#[async_trait]
impl RevenueStorage for ProdShopStorage {
    async fn daily_revenue(&self) -> Result<Vec<RevenueBucket>, GenericError> {
        let backend = self.db.get_database_backend();
        let sql = format!(
            "SELECT {bucket} AS bucket, SUM(oi.quantity * i.price) AS total_revenue \
             FROM orders o \
             JOIN order_items oi ON oi.order_id = o.id \
             JOIN items i ON i.id = oi.item_id \
             WHERE o.ordered = TRUE \
             GROUP BY bucket ORDER BY bucket",
            bucket = Self::day_expr(backend),
        );
        Ok(RevenueBucket::find_by_statement(Statement::from_string(backend, sql))
            .all(&self.db)
            .await?)
    }

    async fn monthly_revenue(&self) -> Result<Vec<RevenueBucket>, GenericError> {
        let backend = self.db.get_database_backend();
        let sql = format!(
            "SELECT {bucket} AS bucket, SUM(oi.quantity * i.price) AS total_revenue \
             FROM orders o \
             JOIN order_items oi ON oi.order_id = o.id \
             JOIN items i ON i.id = oi.item_id \
             WHERE o.ordered = TRUE \
             GROUP BY bucket ORDER BY bucket",
            bucket = Self::month_expr(backend),
        );
        Ok(RevenueBucket::find_by_statement(Statement::from_string(backend, sql))
            .all(&self.db)
            .await?)
    }

    async fn item_monthly_revenue(&self) -> Result<Vec<ItemRevenueBucket>, GenericError> {
        let backend = self.db.get_database_backend();
        let sql = format!(
            "SELECT {bucket} AS bucket, i.title AS item_title, \
             SUM(oi.quantity * i.price) AS total_revenue \
             FROM order_items oi \
             JOIN orders o ON o.id = oi.order_id \
             JOIN items i ON i.id = oi.item_id \
             WHERE o.ordered = TRUE \
             GROUP BY bucket, item_title ORDER BY bucket, item_title",
            bucket = Self::month_expr(backend),
        );
        Ok(
            ItemRevenueBucket::find_by_statement(Statement::from_string(backend, sql))
                .all(&self.db)
                .await?,
        )
    }
}
