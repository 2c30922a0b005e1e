//! In-memory store

use async_trait::async_trait;
use jiff::Timestamp;
use rusty_money::iso::Currency;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    cart::{CartLine, CustomerUuid},
    coupons::{Coupon, normalize_code},
    orders::{Order, OrderSnapshot, OrderStatus, OrderUuid},
    products::{Product, ProductUuid},
    store::{CartRecord, LineWrite, Store, StoreError},
};

#[derive(Debug, Default)]
struct State {
    products: FxHashMap<ProductUuid, Product>,
    coupons: FxHashMap<String, Coupon>,
    lines: FxHashMap<CustomerUuid, Vec<CartLine>>,
    carts: FxHashMap<CustomerUuid, CartRecord>,
    orders: Vec<Order>,
}

impl State {
    fn revision(&self, customer: CustomerUuid) -> u64 {
        self.carts.get(&customer).map_or(0, |record| record.revision)
    }

    fn check_revision(&self, customer: CustomerUuid, expected: u64) -> Result<u64, StoreError> {
        let actual = self.revision(customer);

        if actual != expected {
            return Err(StoreError::Conflict { expected, actual });
        }

        Ok(actual)
    }

    fn write_line(&mut self, customer: CustomerUuid, write: LineWrite) -> Result<(), StoreError> {
        match write {
            LineWrite::Upsert { product, quantity } => {
                if !self.products.contains_key(&product) {
                    return Err(StoreError::NotFound);
                }

                let lines = self.lines.entry(customer).or_default();

                match lines.iter_mut().find(|line| line.product == product) {
                    Some(line) => line.quantity = quantity,
                    None => lines.push(CartLine {
                        customer,
                        product,
                        quantity,
                    }),
                }
            }
            LineWrite::Delete(product) => {
                if let Some(lines) = self.lines.get_mut(&customer) {
                    lines.retain(|line| line.product != product);
                }
            }
        }

        Ok(())
    }
}

/// A [`Store`] held in process memory behind a single lock.
///
/// Every operation takes the lock once, so multi-step writes are atomic.
#[derive(Debug)]
pub struct InMemoryStore {
    currency: &'static Currency,
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Store seeded with `products` and `coupons`.
    pub fn new(
        currency: &'static Currency,
        products: impl IntoIterator<Item = Product>,
        coupons: impl IntoIterator<Item = Coupon>,
    ) -> Self {
        let state = State {
            products: products
                .into_iter()
                .map(|product| (product.uuid(), product))
                .collect(),
            coupons: coupons
                .into_iter()
                .map(|coupon| (coupon.code().to_string(), coupon))
                .collect(),
            ..State::default()
        };

        Self {
            currency,
            state: Mutex::new(state),
        }
    }

    /// Add or replace a product.
    pub async fn insert_product(&self, product: Product) {
        self.state
            .lock()
            .await
            .products
            .insert(product.uuid(), product);
    }

    /// Add or replace a coupon.
    pub async fn insert_coupon(&self, coupon: Coupon) {
        self.state
            .lock()
            .await
            .coupons
            .insert(coupon.code().to_string(), coupon);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn fetch_product(&self, product: ProductUuid) -> Result<Product, StoreError> {
        self.state
            .lock()
            .await
            .products
            .get(&product)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn fetch_cart_lines(&self, customer: CustomerUuid) -> Result<Vec<CartLine>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .lines
            .get(&customer)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_cart_line(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .write_line(customer, LineWrite::Upsert { product, quantity })
    }

    async fn delete_cart_line(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .write_line(customer, LineWrite::Delete(product))
    }

    async fn fetch_coupon(&self, code: &str) -> Result<Coupon, StoreError> {
        self.state
            .lock()
            .await
            .coupons
            .get(&normalize_code(code))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn fetch_cart(&self, customer: CustomerUuid) -> Result<CartRecord, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .carts
            .get(&customer)
            .cloned()
            .unwrap_or_else(|| CartRecord::empty(self.currency)))
    }

    async fn save_cart(
        &self,
        customer: CustomerUuid,
        record: CartRecord,
        line: Option<LineWrite>,
        expected_revision: u64,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;

        let revision = state.check_revision(customer, expected_revision)? + 1;

        if let Some(write) = line {
            state.write_line(customer, write)?;
        }

        state.carts.insert(customer, CartRecord { revision, ..record });

        Ok(revision)
    }

    async fn create_order(
        &self,
        snapshot: OrderSnapshot,
        expected_revision: u64,
    ) -> Result<Order, StoreError> {
        let mut state = self.state.lock().await;
        let customer = snapshot.customer;

        let revision = state.check_revision(customer, expected_revision)? + 1;

        let order = Order::from_snapshot(OrderUuid::new(), snapshot, Timestamp::now());

        state.orders.push(order.clone());
        state.lines.remove(&customer);
        state.carts.insert(customer, CartRecord {
            revision,
            ..CartRecord::empty(self.currency)
        });

        debug!(order = %order.uuid(), %customer, "stored order and cleared cart");

        Ok(order)
    }

    async fn clear_cart(&self, customer: CustomerUuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let revision = state.revision(customer) + 1;

        state.lines.remove(&customer);
        state.carts.insert(customer, CartRecord {
            revision,
            ..CartRecord::empty(self.currency)
        });

        Ok(())
    }

    async fn orders_for_customer(&self, customer: CustomerUuid) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .iter()
            .rev()
            .filter(|order| order.customer() == customer)
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        order: OrderUuid,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut state = self.state.lock().await;

        let stored = state
            .orders
            .iter_mut()
            .find(|stored| stored.uuid() == order)
            .ok_or(StoreError::NotFound)?;

        stored.set_status(status)?;

        Ok(stored.clone())
    }
}
