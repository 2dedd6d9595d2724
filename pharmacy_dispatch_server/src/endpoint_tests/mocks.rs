use chrono::{DateTime, Utc};
use mockall::mock;
use pds_common::GeoPoint;
use pharmacy_dispatch_engine::{
    db_types::{EmergencyOrder, NearbyPharmacy, NewEmergencyOrder, NewPharmacyResponse, Product},
    traits::{DispatchError, EmergencyOrderStore, MarketplaceDirectory, SweepResult},
};

mock! {
    pub Backend {}
    impl EmergencyOrderStore for Backend {
        async fn insert_emergency_order(&self, order: NewEmergencyOrder) -> Result<EmergencyOrder, DispatchError>;
        async fn fetch_emergency_order(&self, order_id: i64) -> Result<Option<EmergencyOrder>, DispatchError>;
        async fn record_response(&self, order_id: i64, response: NewPharmacyResponse) -> Result<EmergencyOrder, DispatchError>;
        async fn cancel_emergency_order(&self, order_id: i64, requester_id: i64, now: DateTime<Utc>) -> Result<EmergencyOrder, DispatchError>;
        async fn mark_order_fulfilled(&self, order_id: i64, now: DateTime<Utc>) -> Result<EmergencyOrder, DispatchError>;
        async fn expire_overdue_orders(&self, now: DateTime<Utc>) -> Result<SweepResult, DispatchError>;
        async fn fetch_orders_for_requester(&self, requester_id: i64) -> Result<Vec<EmergencyOrder>, DispatchError>;
        async fn fetch_pending_orders_for_pharmacy(&self, pharmacy_id: i64) -> Result<Vec<EmergencyOrder>, DispatchError>;
    }
    impl MarketplaceDirectory for Backend {
        async fn find_product_by_name(&self, fragment: &str) -> Result<Option<Product>, DispatchError>;
        async fn fetch_user_location(&self, user_id: i64) -> Result<Option<GeoPoint>, DispatchError>;
        async fn active_pharmacies_near(&self, point: &GeoPoint, radius_m: f64) -> Result<Vec<NearbyPharmacy>, DispatchError>;
    }
}
