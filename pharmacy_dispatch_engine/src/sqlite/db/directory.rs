//! Reads against the marketplace directory tables (users, products, pharmacies and their stock), plus the insert
//! helpers used to seed them.
use std::collections::HashMap;

use log::trace;
use pds_common::GeoPoint;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NearbyPharmacy, Pharmacy, Product, StockItem},
    traits::DispatchError,
};

/// The bounding box prefilter is widened slightly so that rounding in the box arithmetic can never drop a pharmacy that
/// lies exactly on the radius.
const BOUNDING_BOX_SLACK: f64 = 1.01;

#[derive(Debug, FromRow)]
struct PharmacyRow {
    id: i64,
    name: String,
    longitude: f64,
    latitude: f64,
    is_active: bool,
    average_rating: f64,
}

#[derive(Debug, FromRow)]
struct StockRow {
    pharmacy_id: i64,
    product_id: i64,
    quantity: i64,
    price: f64,
}

/// Returns the first product (lowest id) whose name contains `fragment`, ignoring ASCII case.
pub async fn find_product_by_name(fragment: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, name, sub_category FROM products WHERE instr(lower(name), lower($1)) > 0 ORDER BY id LIMIT 1",
    )
    .bind(fragment)
    .fetch_optional(conn)
    .await?
    .map(|(id, name, sub_category)| Product { id, name, sub_category });
    Ok(product)
}

pub async fn fetch_user_location(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<GeoPoint>, DispatchError> {
    let coords: Option<(Option<f64>, Option<f64>)> =
        sqlx::query_as("SELECT longitude, latitude FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    match coords {
        Some((Some(longitude), Some(latitude))) => {
            let point = GeoPoint::new(longitude, latitude)
                .map_err(|e| DispatchError::DatabaseError(format!("User #{user_id} has an invalid location. {e}")))?;
            Ok(Some(point))
        },
        _ => Ok(None),
    }
}

/// Active pharmacies within `radius_m` metres of `point`, sorted by ascending distance, with their stock lists.
///
/// SQLite has no spatial index, so candidates are first narrowed down with a latitude/longitude box in SQL, and the
/// exact great-circle distance is then computed for each of them.
pub async fn active_pharmacies_near(
    point: &GeoPoint,
    radius_m: f64,
    conn: &mut SqliteConnection,
) -> Result<Vec<NearbyPharmacy>, DispatchError> {
    let (min_lng, min_lat, max_lng, max_lat) = point.bounding_box(radius_m * BOUNDING_BOX_SLACK);
    let rows: Vec<PharmacyRow> = sqlx::query_as(
        r#"
        SELECT id, name, longitude, latitude, is_active, average_rating FROM pharmacies
        WHERE is_active AND longitude BETWEEN $1 AND $3 AND latitude BETWEEN $2 AND $4
        "#,
    )
    .bind(min_lng)
    .bind(min_lat)
    .bind(max_lng)
    .bind(max_lat)
    .fetch_all(&mut *conn)
    .await?;
    let box_count = rows.len();
    let mut nearby = Vec::with_capacity(rows.len());
    for row in rows {
        let location = GeoPoint::new(row.longitude, row.latitude)
            .map_err(|e| DispatchError::DatabaseError(format!("Pharmacy #{} has an invalid location. {e}", row.id)))?;
        let distance = point.distance_to(&location);
        if distance > radius_m {
            continue;
        }
        let pharmacy = Pharmacy {
            id: row.id,
            name: row.name,
            location,
            is_active: row.is_active,
            average_rating: row.average_rating,
            stock: Vec::new(),
        };
        nearby.push(NearbyPharmacy { pharmacy, distance });
    }
    nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.pharmacy.id.cmp(&b.pharmacy.id)));
    trace!("🗃️ {box_count} pharmacies in the bounding box around {point}, {} within {radius_m}m", nearby.len());
    if nearby.is_empty() {
        return Ok(nearby);
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT pharmacy_id, product_id, quantity, price FROM pharmacy_stock WHERE pharmacy_id IN (",
    );
    let mut ids = query.separated(", ");
    for n in &nearby {
        ids.push_bind(n.pharmacy.id);
    }
    query.push(") ORDER BY pharmacy_id, product_id");
    let stock_rows = query.build_query_as::<StockRow>().fetch_all(&mut *conn).await?;
    let mut stock = HashMap::<i64, Vec<StockItem>>::new();
    for row in stock_rows {
        let item = StockItem { product_id: row.product_id, quantity: row.quantity, price: row.price };
        stock.entry(row.pharmacy_id).or_default().push(item);
    }
    for n in &mut nearby {
        n.pharmacy.stock = stock.remove(&n.pharmacy.id).unwrap_or_default();
    }
    Ok(nearby)
}

//-------------------------------------------   Seeding   ------------------------------------------------------------

pub async fn insert_user(name: &str, location: Option<GeoPoint>, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let id = sqlx::query_scalar("INSERT INTO users (name, longitude, latitude) VALUES ($1, $2, $3) RETURNING id")
        .bind(name)
        .bind(location.map(|p| p.longitude()))
        .bind(location.map(|p| p.latitude()))
        .fetch_one(conn)
        .await?;
    Ok(id)
}

pub async fn insert_product(name: &str, sub_category: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let id = sqlx::query_scalar("INSERT INTO products (name, sub_category) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(sub_category)
        .fetch_one(conn)
        .await?;
    Ok(id)
}

pub async fn insert_pharmacy(
    name: &str,
    location: GeoPoint,
    average_rating: f64,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let id = sqlx::query_scalar(
        "INSERT INTO pharmacies (name, longitude, latitude, average_rating) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(name)
    .bind(location.longitude())
    .bind(location.latitude())
    .bind(average_rating)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn set_pharmacy_active(pharmacy_id: i64, active: bool, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE pharmacies SET is_active = $1 WHERE id = $2").bind(active).bind(pharmacy_id).execute(conn).await?;
    Ok(())
}

/// Sets the quantity and price of a product at a pharmacy, creating the stock line if needed.
pub async fn upsert_stock(
    pharmacy_id: i64,
    product_id: i64,
    quantity: i64,
    price: f64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pharmacy_stock (pharmacy_id, product_id, quantity, price) VALUES ($1, $2, $3, $4)
        ON CONFLICT (pharmacy_id, product_id) DO UPDATE SET quantity = excluded.quantity, price = excluded.price
        "#,
    )
    .bind(pharmacy_id)
    .bind(product_id)
    .bind(quantity)
    .bind(price)
    .execute(conn)
    .await?;
    Ok(())
}
