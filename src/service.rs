//! Storefront service
//!
//! Async cart and checkout operations against a [`Store`]. Each operation loads the cart,
//! applies one mutation in memory and writes the result back in a single [`Store::save_cart`]
//! call. That call checks the revision read at load time and writes the header and the changed
//! line together, so concurrent sessions conflict instead of silently overwriting each other.
//! Nothing is retried.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rusty_money::iso::Currency;
use thiserror::Error;
use tracing::{Span, debug, info, warn};

use crate::{
    cart::{Cart, CartChange, CartError, CustomerUuid},
    coupons::{Coupon, normalize_code},
    orders::{CheckoutError, Order, OrderStatus, OrderUuid, materialize},
    pricing::TaxPolicy,
    products::{Product, ProductUuid},
    store::{CartRecord, LineWrite, Store, StoreError},
};

/// Errors returned by the storefront services.
#[derive(Debug, Error, PartialEq)]
pub enum ShopError {
    /// The cart mutation was rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Checkout was rejected.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// The store failed; the whole operation may be retried.
    #[error("storage error: {0}")]
    Persistence(#[source] StoreError),
}

impl From<StoreError> for ShopError {
    fn from(error: StoreError) -> Self {
        Self::Persistence(error)
    }
}

/// A cart after a line mutation, with what happened to the line.
#[derive(Debug, Clone, PartialEq)]
pub struct CartUpdate {
    /// Cart after the mutation
    pub cart: Cart,

    /// Line outcome, including any stock clamp
    pub change: CartChange,
}

/// Cart operations for a single customer.
#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// Load a customer's cart with freshly computed totals.
    async fn get_cart(&self, customer: CustomerUuid) -> Result<Cart, ShopError>;

    /// Add units of a product, clamped to stock.
    async fn add_item(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<CartUpdate, ShopError>;

    /// Set a line's quantity; zero removes the line.
    async fn update_quantity(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<CartUpdate, ShopError>;

    /// Remove a line. Missing lines are ignored.
    async fn remove_item(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
    ) -> Result<Cart, ShopError>;

    /// Apply a coupon by code.
    async fn apply_coupon(&self, customer: CustomerUuid, code: String) -> Result<Cart, ShopError>;

    /// Detach the applied coupon, if any.
    async fn remove_coupon(&self, customer: CustomerUuid) -> Result<Cart, ShopError>;
}

/// Checkout and order history.
#[automock]
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Turn the customer's cart into a pending order and empty the cart.
    async fn checkout(&self, customer: CustomerUuid) -> Result<Order, ShopError>;

    /// A customer's orders, newest first.
    async fn orders(&self, customer: CustomerUuid) -> Result<Vec<Order>, ShopError>;

    /// Change an order's fulfilment status.
    async fn set_order_status(
        &self,
        order: OrderUuid,
        status: OrderStatus,
    ) -> Result<Order, ShopError>;
}

/// A cart rebuilt from the store.
#[derive(Debug)]
struct Loaded {
    cart: Cart,

    /// Header revision the cart was read at
    revision: u64,

    /// Stored lines whose product no longer exists
    orphans: Vec<ProductUuid>,
}

/// Cart and checkout services backed by a [`Store`].
#[derive(Debug)]
pub struct Storefront<S> {
    store: S,
    currency: &'static Currency,
    tax_policy: TaxPolicy,
}

impl<S: Store> Storefront<S> {
    /// Services over `store`, pricing carts in `currency` under `tax_policy`.
    pub fn new(store: S, currency: &'static Currency, tax_policy: TaxPolicy) -> Self {
        Self {
            store,
            currency,
            tax_policy,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    async fn product(&self, product: ProductUuid) -> Result<Product, ShopError> {
        match self.store.fetch_product(product).await {
            Ok(found) => Ok(found),
            Err(StoreError::NotFound) => Err(CartError::ProductNotFound(product).into()),
            Err(error) => Err(error.into()),
        }
    }

    async fn coupon(&self, code: &str) -> Result<Option<Coupon>, ShopError> {
        match self.store.fetch_coupon(code).await {
            Ok(coupon) => Ok(Some(coupon)),
            Err(StoreError::NotFound) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Rebuild the cart from its stored lines and header.
    async fn load(&self, customer: CustomerUuid) -> Result<Loaded, ShopError> {
        let record = self.store.fetch_cart(customer).await?;
        let lines = self.store.fetch_cart_lines(customer).await?;

        let mut products = Vec::with_capacity(lines.len());
        let mut orphans = Vec::new();

        for line in lines {
            match self.store.fetch_product(line.product).await {
                Ok(product) => products.push((product, line.quantity)),
                Err(StoreError::NotFound) => {
                    warn!(
                        %customer,
                        product = %line.product,
                        "skipping cart line for missing product"
                    );
                    orphans.push(line.product);
                }
                Err(error) => return Err(error.into()),
            }
        }

        let coupon = match &record.coupon_code {
            Some(code) => self
                .coupon(code)
                .await?
                .filter(|coupon| coupon.is_valid_at(Timestamp::now())),
            None => None,
        };

        if record.coupon_code.is_some() && coupon.is_none() {
            info!(
                %customer,
                code = record.coupon_code.as_deref(),
                "dropping coupon that is no longer valid"
            );
        }

        let cart = Cart::restore(customer, self.currency, self.tax_policy, products, coupon)?;

        debug!(
            %customer,
            revision = record.revision,
            lines = cart.lines().count(),
            "loaded cart"
        );

        Ok(Loaded {
            cart,
            revision: record.revision,
            orphans,
        })
    }

    async fn save(
        &self,
        cart: &Cart,
        line: Option<LineWrite>,
        revision: u64,
    ) -> Result<u64, ShopError> {
        let saved = self
            .store
            .save_cart(cart.customer(), CartRecord::of(cart, revision), line, revision)
            .await?;

        Ok(saved)
    }

    async fn commit_line(
        &self,
        cart: Cart,
        revision: u64,
        change: CartChange,
    ) -> Result<CartUpdate, ShopError> {
        self.save(&cart, Some(LineWrite::of(&change)), revision).await?;

        if let Some(exceeded) = change.stock_exceeded {
            Span::current().record("stock_exceeded", exceeded.requested);
        }

        Ok(CartUpdate { cart, change })
    }
}

#[async_trait]
impl<S: Store> CartsService for Storefront<S> {
    #[tracing::instrument(
        name = "storefront.carts.get_cart",
        skip_all,
        fields(customer = %customer),
        err
    )]
    async fn get_cart(&self, customer: CustomerUuid) -> Result<Cart, ShopError> {
        Ok(self.load(customer).await?.cart)
    }

    #[tracing::instrument(
        name = "storefront.carts.add_item",
        skip_all,
        fields(
            customer = %customer,
            product = %product,
            quantity,
            stock_exceeded = tracing::field::Empty
        ),
        err
    )]
    async fn add_item(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<CartUpdate, ShopError> {
        let Loaded {
            mut cart, revision, ..
        } = self.load(customer).await?;
        let product = self.product(product).await?;

        let change = cart.add_item(&product, quantity)?;

        self.commit_line(cart, revision, change).await
    }

    #[tracing::instrument(
        name = "storefront.carts.update_quantity",
        skip_all,
        fields(
            customer = %customer,
            product = %product,
            quantity,
            stock_exceeded = tracing::field::Empty
        ),
        err
    )]
    async fn update_quantity(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<CartUpdate, ShopError> {
        let Loaded {
            mut cart,
            revision,
            orphans,
        } = self.load(customer).await?;

        let change = if orphans.contains(&product) {
            if quantity > 0 {
                return Err(CartError::ProductNotFound(product).into());
            }

            CartChange {
                product,
                quantity: 0,
                stock_exceeded: None,
            }
        } else {
            cart.update_quantity(product, quantity)?
        };

        self.commit_line(cart, revision, change).await
    }

    #[tracing::instrument(
        name = "storefront.carts.remove_item",
        skip_all,
        fields(customer = %customer, product = %product),
        err
    )]
    async fn remove_item(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
    ) -> Result<Cart, ShopError> {
        let Loaded {
            mut cart,
            revision,
            orphans,
        } = self.load(customer).await?;

        if cart.remove_item(product)? || orphans.contains(&product) {
            self.save(&cart, Some(LineWrite::Delete(product)), revision)
                .await?;
        }

        Ok(cart)
    }

    #[tracing::instrument(
        name = "storefront.carts.apply_coupon",
        skip_all,
        fields(customer = %customer),
        err
    )]
    async fn apply_coupon(&self, customer: CustomerUuid, code: String) -> Result<Cart, ShopError> {
        let code = normalize_code(&code);
        let Loaded {
            mut cart, revision, ..
        } = self.load(customer).await?;

        let coupon = self
            .coupon(&code)
            .await?
            .ok_or_else(|| CartError::InvalidCoupon(code.clone()))?;

        cart.apply_coupon(coupon, Timestamp::now())?;

        self.save(&cart, None, revision).await?;

        Ok(cart)
    }

    #[tracing::instrument(
        name = "storefront.carts.remove_coupon",
        skip_all,
        fields(customer = %customer),
        err
    )]
    async fn remove_coupon(&self, customer: CustomerUuid) -> Result<Cart, ShopError> {
        let Loaded {
            mut cart, revision, ..
        } = self.load(customer).await?;

        if cart.remove_coupon()?.is_some() {
            self.save(&cart, None, revision).await?;
        }

        Ok(cart)
    }
}

#[async_trait]
impl<S: Store> CheckoutService for Storefront<S> {
    #[tracing::instrument(
        name = "storefront.checkout.checkout",
        skip_all,
        fields(customer = %customer, order = tracing::field::Empty),
        err
    )]
    async fn checkout(&self, customer: CustomerUuid) -> Result<Order, ShopError> {
        let Loaded { cart, revision, .. } = self.load(customer).await?;

        let snapshot = materialize(&cart)?;
        let order = self.store.create_order(snapshot, revision).await?;

        Span::current().record("order", tracing::field::display(order.uuid()));

        info!(
            %customer,
            order = %order.uuid(),
            items = order.item_count(),
            final_amount = %order.final_amount(),
            "order created"
        );

        Ok(order)
    }

    #[tracing::instrument(
        name = "storefront.checkout.orders",
        skip_all,
        fields(customer = %customer),
        err
    )]
    async fn orders(&self, customer: CustomerUuid) -> Result<Vec<Order>, ShopError> {
        Ok(self.store.orders_for_customer(customer).await?)
    }

    #[tracing::instrument(
        name = "storefront.checkout.set_order_status",
        skip_all,
        fields(order = %order, status = %status),
        err
    )]
    async fn set_order_status(
        &self,
        order: OrderUuid,
        status: OrderStatus,
    ) -> Result<Order, ShopError> {
        let updated = self.store.update_order_status(order, status).await?;

        info!(order = %order, %status, "order status changed");

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use jiff::ToSpan;
    use rusty_money::{Money, iso::INR};
    use testresult::TestResult;
    use tokio::sync::{Mutex, oneshot};

    use crate::{
        cart::{CartLine, CartState},
        discounts::Percent,
        orders::OrderSnapshot,
        pricing::{Amount, InvalidPricingInput, PricingError},
        products::tests::new_product,
        store::{InMemoryStore, MockStore},
    };

    use super::*;

    fn rupees(minor: i64) -> Amount {
        Money::from_minor(minor, INR)
    }

    fn shop() -> TestResult<(Storefront<InMemoryStore>, Product)> {
        let product = Product::try_from(new_product(100_00, 3))?;
        let expired = Coupon::new("OLD", Percent::from_points(50)?)
            .expiring_at(Timestamp::now().checked_sub(1.hour())?);

        let store = InMemoryStore::new(
            INR,
            [product.clone()],
            [Coupon::new("SAVE20", Percent::from_points(20)?), expired],
        );

        Ok((
            Storefront::new(store, INR, TaxPolicy::Flat(Percent::ZERO)),
            product,
        ))
    }

    /// An in-memory store whose next `save_cart` waits for a signal before it runs.
    #[derive(Debug)]
    struct Paused {
        inner: InMemoryStore,
        gate: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    }

    #[async_trait]
    impl Store for Paused {
        async fn fetch_product(&self, product: ProductUuid) -> Result<Product, StoreError> {
            self.inner.fetch_product(product).await
        }

        async fn fetch_cart_lines(
            &self,
            customer: CustomerUuid,
        ) -> Result<Vec<CartLine>, StoreError> {
            self.inner.fetch_cart_lines(customer).await
        }

        async fn upsert_cart_line(
            &self,
            customer: CustomerUuid,
            product: ProductUuid,
            quantity: u32,
        ) -> Result<(), StoreError> {
            self.inner.upsert_cart_line(customer, product, quantity).await
        }

        async fn delete_cart_line(
            &self,
            customer: CustomerUuid,
            product: ProductUuid,
        ) -> Result<(), StoreError> {
            self.inner.delete_cart_line(customer, product).await
        }

        async fn fetch_coupon(&self, code: &str) -> Result<Coupon, StoreError> {
            self.inner.fetch_coupon(code).await
        }

        async fn fetch_cart(&self, customer: CustomerUuid) -> Result<CartRecord, StoreError> {
            self.inner.fetch_cart(customer).await
        }

        async fn save_cart(
            &self,
            customer: CustomerUuid,
            record: CartRecord,
            line: Option<LineWrite>,
            expected_revision: u64,
        ) -> Result<u64, StoreError> {
            let gate = self.gate.lock().await.take();

            if let Some((paused, resume)) = gate {
                _ = paused.send(());
                _ = resume.await;
            }

            self.inner
                .save_cart(customer, record, line, expected_revision)
                .await
        }

        async fn create_order(
            &self,
            snapshot: OrderSnapshot,
            expected_revision: u64,
        ) -> Result<Order, StoreError> {
            self.inner.create_order(snapshot, expected_revision).await
        }

        async fn clear_cart(&self, customer: CustomerUuid) -> Result<(), StoreError> {
            self.inner.clear_cart(customer).await
        }

        async fn orders_for_customer(
            &self,
            customer: CustomerUuid,
        ) -> Result<Vec<Order>, StoreError> {
            self.inner.orders_for_customer(customer).await
        }

        async fn update_order_status(
            &self,
            order: OrderUuid,
            status: OrderStatus,
        ) -> Result<Order, StoreError> {
            self.inner.update_order_status(order, status).await
        }
    }

    fn orphaned_cart(store: &mut MockStore, orphan: ProductUuid) {
        store
            .expect_fetch_cart()
            .returning(|_| Ok(CartRecord::empty(INR)));
        store.expect_fetch_cart_lines().returning(move |customer| {
            Ok(vec![CartLine {
                customer,
                product: orphan,
                quantity: 2,
            }])
        });
        store
            .expect_fetch_product()
            .returning(|_| Err(StoreError::NotFound));
    }

    fn mocked_cart(store: &mut MockStore, product: &Product, quantity: u32) {
        let uuid = product.uuid();
        let product = product.clone();

        store
            .expect_fetch_cart()
            .returning(|_| Ok(CartRecord::empty(INR)));
        store.expect_fetch_cart_lines().returning(move |customer| {
            Ok(vec![CartLine {
                customer,
                product: uuid,
                quantity,
            }])
        });
        store
            .expect_fetch_product()
            .returning(move |_| Ok(product.clone()));
    }

    #[tokio::test]
    async fn add_item_persists_line_and_header() -> TestResult {
        let (shop, product) = shop()?;
        let customer = CustomerUuid::new();

        let update = shop.add_item(customer, product.uuid(), 2).await?;

        assert_eq!(update.change.quantity, 2);
        assert_eq!(update.cart.total_cost(), rupees(200_00));

        let lines = shop.store().fetch_cart_lines(customer).await?;
        assert_eq!(lines.first().map(|line| line.quantity), Some(2));

        let header = shop.store().fetch_cart(customer).await?;
        assert_eq!(header.revision, 1);
        assert_eq!(header.total_cost, rupees(200_00));

        Ok(())
    }

    #[tokio::test]
    async fn repeated_adds_merge_and_clamp() -> TestResult {
        let (shop, product) = shop()?;
        let customer = CustomerUuid::new();

        shop.add_item(customer, product.uuid(), 1).await?;
        let update = shop.add_item(customer, product.uuid(), 5).await?;

        assert_eq!(update.change.quantity, 3);
        assert_eq!(update.change.stock_exceeded.map(|e| e.requested), Some(6));
        assert_eq!(shop.get_cart(customer).await?.total_item_count(), 3);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_product_is_reported() -> TestResult {
        let (shop, _) = shop()?;
        let missing = ProductUuid::new();

        let result = shop.add_item(CustomerUuid::new(), missing, 1).await;

        assert_eq!(result, Err(ShopError::Cart(CartError::ProductNotFound(missing))));

        Ok(())
    }

    #[tokio::test]
    async fn zero_quantity_is_invalid_input() -> TestResult {
        let (shop, product) = shop()?;

        let result = shop.add_item(CustomerUuid::new(), product.uuid(), 0).await;

        assert_eq!(
            result,
            Err(ShopError::Cart(CartError::Pricing(PricingError::InvalidInput(
                InvalidPricingInput::ZeroQuantity
            ))))
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_to_zero_deletes_line() -> TestResult {
        let (shop, product) = shop()?;
        let customer = CustomerUuid::new();

        shop.add_item(customer, product.uuid(), 2).await?;
        let update = shop.update_quantity(customer, product.uuid(), 0).await?;

        assert_eq!(update.cart.state(), CartState::Empty);
        assert!(shop.store().fetch_cart_lines(customer).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn remove_item_twice_is_a_noop() -> TestResult {
        let (shop, product) = shop()?;
        let customer = CustomerUuid::new();

        shop.add_item(customer, product.uuid(), 1).await?;
        shop.remove_item(customer, product.uuid()).await?;
        let cart = shop.remove_item(customer, product.uuid()).await?;

        assert_eq!(cart.total_cost(), rupees(0));
        assert_eq!(cart.total_item_count(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn coupon_codes_are_normalised_and_persisted() -> TestResult {
        let (shop, product) = shop()?;
        let customer = CustomerUuid::new();

        shop.add_item(customer, product.uuid(), 1).await?;
        let cart = shop.apply_coupon(customer, " save20".to_string()).await?;

        assert_eq!(cart.final_amount(), rupees(80_00));

        let reloaded = shop.get_cart(customer).await?;
        assert_eq!(reloaded.coupon().map(Coupon::code), Some("SAVE20"));

        let cart = shop.remove_coupon(customer).await?;
        assert_eq!(cart.final_amount(), rupees(100_00));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_and_expired_coupons_are_invalid() -> TestResult {
        let (shop, product) = shop()?;
        let customer = CustomerUuid::new();

        shop.add_item(customer, product.uuid(), 1).await?;

        assert_eq!(
            shop.apply_coupon(customer, "nope".to_string()).await,
            Err(ShopError::Cart(CartError::InvalidCoupon("NOPE".to_string())))
        );
        assert_eq!(
            shop.apply_coupon(customer, "old".to_string()).await,
            Err(ShopError::Cart(CartError::InvalidCoupon("OLD".to_string())))
        );
        assert!(shop.get_cart(customer).await?.coupon().is_none());

        Ok(())
    }

    #[tokio::test]
    async fn checkout_creates_order_and_empties_cart() -> TestResult {
        let (shop, product) = shop()?;
        let customer = CustomerUuid::new();

        shop.add_item(customer, product.uuid(), 2).await?;
        shop.apply_coupon(customer, "SAVE20".to_string()).await?;

        let order = shop.checkout(customer).await?;

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.final_amount(), rupees(160_00));
        assert_eq!(order.coupon_code(), Some("SAVE20"));

        let cart = shop.get_cart(customer).await?;
        assert_eq!(cart.state(), CartState::Empty);
        assert!(cart.coupon().is_none());

        assert_eq!(shop.orders(customer).await?, [order]);

        Ok(())
    }

    #[tokio::test]
    async fn checkout_of_empty_cart_creates_nothing() -> TestResult {
        let mut store = MockStore::new();

        store
            .expect_fetch_cart()
            .returning(|_| Ok(CartRecord::empty(INR)));
        store.expect_fetch_cart_lines().returning(|_| Ok(Vec::new()));
        store.expect_create_order().never();

        let shop = Storefront::new(store, INR, TaxPolicy::default());

        let result = shop.checkout(CustomerUuid::new()).await;

        assert_eq!(result, Err(ShopError::Checkout(CheckoutError::EmptyCart)));

        Ok(())
    }

    #[tokio::test]
    async fn checkout_failure_is_propagated_untouched() -> TestResult {
        let product = Product::try_from(new_product(10_00, 5))?;
        let mut store = MockStore::new();

        mocked_cart(&mut store, &product, 1);
        store
            .expect_create_order()
            .once()
            .returning(|_, _| Err(StoreError::Unavailable("connection reset".to_string())));

        let shop = Storefront::new(store, INR, TaxPolicy::default());

        let result = shop.checkout(CustomerUuid::new()).await;

        assert_eq!(
            result,
            Err(ShopError::Persistence(StoreError::Unavailable(
                "connection reset".to_string()
            )))
        );
        assert_eq!(
            result.err().map(|error| error.to_string()).as_deref(),
            Some("storage error: store unavailable: connection reset")
        );

        Ok(())
    }

    #[tokio::test]
    async fn revision_conflict_is_reported_without_other_writes() -> TestResult {
        let product = Product::try_from(new_product(10_00, 5))?;
        let uuid = product.uuid();
        let mut store = MockStore::new();

        mocked_cart(&mut store, &product, 1);
        store
            .expect_save_cart()
            .once()
            .withf(move |_, _, line, _| {
                *line
                    == Some(LineWrite::Upsert {
                        product: uuid,
                        quantity: 2,
                    })
            })
            .returning(|_, _, _, expected| Err(StoreError::Conflict {
                expected,
                actual: expected + 1,
            }));
        store.expect_upsert_cart_line().never();
        store.expect_delete_cart_line().never();

        let shop = Storefront::new(store, INR, TaxPolicy::default());

        let result = shop.add_item(CustomerUuid::new(), product.uuid(), 1).await;

        assert_eq!(
            result,
            Err(ShopError::Persistence(StoreError::Conflict {
                expected: 0,
                actual: 1,
            }))
        );

        Ok(())
    }

    #[tokio::test]
    async fn interleaved_sessions_conflict_instead_of_losing_updates() -> TestResult {
        let product = Product::try_from(new_product(100_00, 10))?;
        let uuid = product.uuid();
        let customer = CustomerUuid::new();

        let (paused_tx, paused_rx) = oneshot::channel();
        let (resume_tx, resume_rx) = oneshot::channel();

        let store = Paused {
            inner: InMemoryStore::new(INR, [product], Vec::<Coupon>::new()),
            gate: Mutex::new(None),
        };
        let shop = Storefront::new(store, INR, TaxPolicy::Flat(Percent::ZERO));

        shop.add_item(customer, uuid, 1).await?;
        *shop.store().gate.lock().await = Some((paused_tx, resume_rx));

        let (second, first) = tokio::join!(shop.add_item(customer, uuid, 1), async {
            _ = paused_rx.await;
            let first = shop.add_item(customer, uuid, 1).await;
            _ = resume_tx.send(());
            first
        });

        assert_eq!(first?.change.quantity, 2);
        assert_eq!(
            second,
            Err(ShopError::Persistence(StoreError::Conflict {
                expected: 1,
                actual: 2,
            }))
        );

        let cart = shop.get_cart(customer).await?;
        let header = shop.store().fetch_cart(customer).await?;

        assert_eq!(cart.quantity_of(uuid), 2);
        assert_eq!(header.item_count, 2);
        assert_eq!(header.revision, 2);

        Ok(())
    }

    #[tokio::test]
    async fn remove_item_deletes_line_for_missing_product() -> TestResult {
        let orphan = ProductUuid::new();
        let mut store = MockStore::new();

        orphaned_cart(&mut store, orphan);
        store
            .expect_save_cart()
            .once()
            .withf(move |_, record, line, expected| {
                *line == Some(LineWrite::Delete(orphan)) && record.item_count == 0 && *expected == 0
            })
            .returning(|_, _, _, expected| Ok(expected + 1));

        let shop = Storefront::new(store, INR, TaxPolicy::default());

        let cart = shop.remove_item(CustomerUuid::new(), orphan).await?;

        assert!(cart.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn zero_quantity_on_missing_product_deletes_line() -> TestResult {
        let orphan = ProductUuid::new();
        let mut store = MockStore::new();

        orphaned_cart(&mut store, orphan);
        store
            .expect_save_cart()
            .once()
            .withf(move |_, _, line, _| *line == Some(LineWrite::Delete(orphan)))
            .returning(|_, _, _, expected| Ok(expected + 1));

        let shop = Storefront::new(store, INR, TaxPolicy::default());
        let customer = CustomerUuid::new();

        let update = shop.update_quantity(customer, orphan, 0).await?;

        assert_eq!(update.change.quantity, 0);

        let result = shop.update_quantity(customer, orphan, 1).await;

        assert_eq!(result, Err(ShopError::Cart(CartError::ProductNotFound(orphan))));

        Ok(())
    }

    #[tokio::test]
    async fn set_order_status_goes_through_store() -> TestResult {
        let (shop, product) = shop()?;
        let customer = CustomerUuid::new();

        shop.add_item(customer, product.uuid(), 1).await?;
        let order = shop.checkout(customer).await?;

        let updated = shop.set_order_status(order.uuid(), OrderStatus::Completed).await?;

        assert_eq!(updated.status(), OrderStatus::Completed);
        assert!(matches!(
            shop.set_order_status(order.uuid(), OrderStatus::Pending).await,
            Err(ShopError::Persistence(StoreError::InvalidTransition(_)))
        ));

        Ok(())
    }
}
