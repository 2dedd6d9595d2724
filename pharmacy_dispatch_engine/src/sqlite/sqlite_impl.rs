//! `SqliteDatabase` is a concrete implementation of a pharmacy dispatch backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use pds_common::GeoPoint;
use sqlx::SqlitePool;

use super::db::{directory, new_pool, orders};
use crate::{
    db_types::{EmergencyOrder, NearbyPharmacy, NewEmergencyOrder, NewPharmacyResponse, Product},
    traits::{DispatchError, EmergencyOrderStore, MarketplaceDirectory, SweepResult},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Opens (and if necessary, creates) the database at `url`.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), DispatchError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DispatchError::DatabaseError(format!("Could not run database migrations. {e}")))?;
        debug!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), DispatchError> {
        self.pool.close().await;
        Ok(())
    }

    async fn fetch_existing(
        order_id: i64,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<EmergencyOrder, DispatchError> {
        orders::fetch_order(order_id, conn)
            .await?
            .ok_or_else(|| DispatchError::DatabaseError(format!("Emergency order #{order_id} vanished mid-transaction")))
    }
}

impl EmergencyOrderStore for SqliteDatabase {
    async fn insert_emergency_order(&self, order: NewEmergencyOrder) -> Result<EmergencyOrder, DispatchError> {
        let mut tx = self.pool.begin().await?;
        let id = orders::insert_order(order, &mut tx).await?;
        let order = Self::fetch_existing(id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_emergency_order(&self, order_id: i64) -> Result<Option<EmergencyOrder>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn record_response(
        &self,
        order_id: i64,
        response: NewPharmacyResponse,
    ) -> Result<EmergencyOrder, DispatchError> {
        let mut tx = self.pool.begin().await?;
        // The guarded update must be the first statement so that SQLite takes the write lock before reading anything.
        if !orders::claim_for_response(order_id, &response, &mut tx).await? {
            return Err(DispatchError::not_available_for_response());
        }
        let pharmacy_id = response.pharmacy_id;
        let decision = response.decision;
        orders::insert_response(order_id, response, &mut tx).await?;
        let order = Self::fetch_existing(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Pharmacy #{pharmacy_id} response ({decision}) stored against emergency order #{order_id}");
        Ok(order)
    }

    async fn cancel_emergency_order(
        &self,
        order_id: i64,
        requester_id: i64,
        now: DateTime<Utc>,
    ) -> Result<EmergencyOrder, DispatchError> {
        let mut tx = self.pool.begin().await?;
        if !orders::cancel_order(order_id, requester_id, now, &mut tx).await? {
            return Err(DispatchError::Conflict(format!(
                "Emergency order #{order_id} cannot be canceled by user #{requester_id}. It does not exist, belongs to \
                 someone else, or has already been accepted, fulfilled or canceled"
            )));
        }
        let order = Self::fetch_existing(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_order_fulfilled(&self, order_id: i64, now: DateTime<Utc>) -> Result<EmergencyOrder, DispatchError> {
        let mut tx = self.pool.begin().await?;
        if !orders::mark_fulfilled(order_id, now, &mut tx).await? {
            return Err(DispatchError::Conflict(format!("Emergency order #{order_id} is no longer accepted")));
        }
        let order = Self::fetch_existing(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn expire_overdue_orders(&self, now: DateTime<Utc>) -> Result<SweepResult, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let expired = orders::expire_overdue_orders(now, &mut conn).await?;
        trace!("🗃️ {} overdue orders moved to no_response", expired.len());
        Ok(SweepResult::new(expired))
    }

    async fn fetch_orders_for_requester(&self, requester_id: i64) -> Result<Vec<EmergencyOrder>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_requester(requester_id, &mut conn).await
    }

    async fn fetch_pending_orders_for_pharmacy(
        &self,
        pharmacy_id: i64,
    ) -> Result<Vec<EmergencyOrder>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_pending_orders_for_pharmacy(pharmacy_id, &mut conn).await
    }
}

impl MarketplaceDirectory for SqliteDatabase {
    async fn find_product_by_name(&self, fragment: &str) -> Result<Option<Product>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        let product = directory::find_product_by_name(fragment, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_user_location(&self, user_id: i64) -> Result<Option<GeoPoint>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        directory::fetch_user_location(user_id, &mut conn).await
    }

    async fn active_pharmacies_near(
        &self,
        point: &GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<NearbyPharmacy>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        directory::active_pharmacies_near(point, radius_m, &mut conn).await
    }
}
