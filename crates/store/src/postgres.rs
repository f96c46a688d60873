use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartItem, CartLine, NewOrder, NewProduct, Order, OrderLine, OrderStatus, Product, Result,
    StoreError,
    store::{Session, Store},
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Session = PostgresSession;

    async fn begin(&self) -> Result<PostgresSession> {
        Ok(PostgresSession {
            tx: self.pool.begin().await?,
        })
    }
}

/// Session over a PostgreSQL transaction.
///
/// Exclusive reads are `SELECT ... FOR UPDATE`; the row locks live until the
/// transaction commits or rolls back.
pub struct PostgresSession {
    tx: Transaction<'static, Postgres>,
}

/// Maps constraint violations to [`StoreError::Constraint`].
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation()
            || db_err.is_check_violation()
            || db_err.is_foreign_key_violation())
    {
        return StoreError::Constraint(db_err.constraint().unwrap_or("unknown").to_string());
    }
    StoreError::Database(e)
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: row.try_get("stock")?,
    })
}

#[async_trait]
impl Session for PostgresSession {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, sku, name, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, sku, name, price_cents, stock FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, price_cents, stock)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sku, name, price_cents, stock
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row_to_product(&row)
    }

    async fn update_stock(&mut self, id: ProductId, stock: i64) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(stock)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound {
                table: "products",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>> {
        let quantity: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT quantity FROM cart_lines
            WHERE user_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(quantity.map(|quantity| CartLine {
            user_id,
            product_id,
            quantity,
        }))
    }

    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT c.quantity, p.id, p.sku, p.name, p.price_cents, p.stock
            FROM cart_lines c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.seq ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartItem {
                    quantity: row.try_get("quantity")?,
                    product: row_to_product(row)?,
                })
            })
            .collect()
    }

    async fn upsert_cart_line(&mut self, line: CartLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_lines (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(line.user_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(line.quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn delete_cart_line(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_cart(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let id = OrderId::new();

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (id, user_id, total_cents, status, transaction_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(&order.transaction_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        for (line_no, line) in (1_i32..).zip(order.lines.iter()) {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id.as_uuid())
            .bind(line_no)
            .bind(line.product_id.as_uuid())
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        }

        Ok(order.into_order(id, created_at))
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, transaction_id, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let status: OrderStatus = status.parse().map_err(StoreError::CorruptRow)?;

        let lines = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?
        .iter()
        .map(|line| {
            Ok(OrderLine {
                order_id: id,
                product_id: ProductId::from_uuid(line.try_get::<Uuid, _>("product_id")?),
                quantity: line.try_get("quantity")?,
                unit_price: Money::from_cents(line.try_get("unit_price_cents")?),
            })
        })
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(Order {
            id,
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            status,
            transaction_id: row.try_get("transaction_id")?,
            created_at: row.try_get("created_at")?,
            lines,
        }))
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        metrics::counter!("store_commits_total").increment(1);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        metrics::counter!("store_rollbacks_total").increment(1);
        Ok(())
    }
}
