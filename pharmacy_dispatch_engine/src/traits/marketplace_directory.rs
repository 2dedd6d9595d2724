use pds_common::GeoPoint;

use crate::{
    db_types::{NearbyPharmacy, Product},
    traits::DispatchError,
};

/// Read-only lookups against the rest of the marketplace. Users, products and pharmacies are owned elsewhere; the
/// dispatch flow only ever reads them.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDirectory {
    /// Finds the first product (in catalog order) whose name contains `fragment`, ignoring case.
    async fn find_product_by_name(&self, fragment: &str) -> Result<Option<Product>, DispatchError>;

    /// The location stored against the user's address, if they have one.
    async fn fetch_user_location(&self, user_id: i64) -> Result<Option<GeoPoint>, DispatchError>;

    /// Active pharmacies within `radius_m` metres of `point`, nearest first, with their stock lists.
    async fn active_pharmacies_near(
        &self,
        point: &GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<NearbyPharmacy>, DispatchError>;
}
