use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use pds_common::GeoPoint;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{
        DispatchTarget,
        EmergencyOrder,
        EmergencyStatus,
        NewEmergencyOrder,
        NewPharmacyResponse,
        PharmacyResponse,
        Priority,
        ResponseDecision,
    },
    traits::DispatchError,
};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    requester_id: i64,
    product_id: i64,
    requested_medicine_name: String,
    additional_notes: String,
    delivery_address: String,
    longitude: f64,
    latitude: f64,
    status: EmergencyStatus,
    accepted_pharmacy_id: Option<i64>,
    priority: Priority,
    response_deadline: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TargetRow {
    order_id: i64,
    pharmacy_id: i64,
    score: f64,
    distance: f64,
}

#[derive(Debug, FromRow)]
struct ResponseRow {
    order_id: i64,
    pharmacy_id: i64,
    decision: ResponseDecision,
    rejection_reason: Option<String>,
    responded_at: DateTime<Utc>,
}

impl From<ResponseRow> for PharmacyResponse {
    fn from(row: ResponseRow) -> Self {
        Self {
            pharmacy_id: row.pharmacy_id,
            decision: row.decision,
            rejection_reason: row.rejection_reason,
            responded_at: row.responded_at,
        }
    }
}

const ACCEPT_GUARD: &str = r#"
    UPDATE emergency_orders
    SET status = 'accepted', accepted_pharmacy_id = $2, updated_at = $3
    WHERE id = $1
      AND status = 'pending'
      AND EXISTS (SELECT 1 FROM emergency_order_targets t WHERE t.order_id = $1 AND t.pharmacy_id = $2)
      AND NOT EXISTS (SELECT 1 FROM emergency_order_responses r WHERE r.order_id = $1 AND r.pharmacy_id = $2)
    RETURNING id
"#;

const REJECT_GUARD: &str = r#"
    UPDATE emergency_orders
    SET updated_at = $3
    WHERE id = $1
      AND status = 'pending'
      AND EXISTS (SELECT 1 FROM emergency_order_targets t WHERE t.order_id = $1 AND t.pharmacy_id = $2)
      AND NOT EXISTS (SELECT 1 FROM emergency_order_responses r WHERE r.order_id = $1 AND r.pharmacy_id = $2)
    RETURNING id
"#;

/// Inserts a new emergency order, along with its ranked target set, and returns the new order id.
///
/// This is not atomic on its own. Embed the call in a transaction and pass `&mut tx` as the connection.
pub async fn insert_order(order: NewEmergencyOrder, conn: &mut SqliteConnection) -> Result<i64, DispatchError> {
    if order.targets.is_empty() {
        return Err(DispatchError::ValidationError("An emergency order must target at least one pharmacy".into()));
    }
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO emergency_orders (
                requester_id,
                product_id,
                requested_medicine_name,
                additional_notes,
                delivery_address,
                longitude,
                latitude,
                priority,
                response_deadline,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id;
        "#,
    )
    .bind(order.requester_id)
    .bind(order.product_id)
    .bind(&order.requested_medicine_name)
    .bind(&order.additional_notes)
    .bind(&order.delivery_address)
    .bind(order.location.longitude())
    .bind(order.location.latitude())
    .bind(order.priority)
    .bind(order.response_deadline)
    .bind(order.created_at)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    let mut builder = QueryBuilder::<Sqlite>::new(
        "INSERT INTO emergency_order_targets (order_id, pharmacy_id, target_rank, score, distance) ",
    );
    builder.push_values(order.targets.iter().enumerate(), |mut row, (rank, target)| {
        #[allow(clippy::cast_possible_wrap)]
        let rank = rank as i64;
        row.push_bind(id)
            .push_bind(target.pharmacy_id)
            .push_bind(rank)
            .push_bind(target.score.total())
            .push_bind(target.distance);
    });
    builder.build().execute(&mut *conn).await?;
    debug!("🗃️ Emergency order #{id} inserted with {} targets", order.targets.len());
    Ok(id)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<EmergencyOrder>, DispatchError> {
    let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM emergency_orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(hydrate(vec![row], conn).await?.pop()),
        None => Ok(None),
    }
}

/// Orders created by `requester_id`, newest first.
pub async fn fetch_orders_for_requester(
    requester_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<EmergencyOrder>, DispatchError> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        "SELECT * FROM emergency_orders WHERE requester_id = $1 ORDER BY julianday(created_at) DESC, id DESC",
    )
    .bind(requester_id)
    .fetch_all(&mut *conn)
    .await?;
    hydrate(rows, conn).await
}

/// Pending orders that target `pharmacy_id`. High priority orders come first, and within a priority, the oldest.
pub async fn fetch_pending_orders_for_pharmacy(
    pharmacy_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<EmergencyOrder>, DispatchError> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        r#"
        SELECT o.* FROM emergency_orders o
        JOIN emergency_order_targets t ON t.order_id = o.id
        WHERE t.pharmacy_id = $1 AND o.status = 'pending'
        ORDER BY CASE o.priority WHEN 'high' THEN 0 ELSE 1 END, julianday(o.created_at), o.id
        "#,
    )
    .bind(pharmacy_id)
    .fetch_all(&mut *conn)
    .await?;
    hydrate(rows, conn).await
}

/// Claims the right to append `response` to the order. The claim succeeds only while the order is pending, targets the
/// responding pharmacy, and holds no earlier response from it. For an acceptance, the same statement also moves the
/// order to `accepted`.
///
/// Returns `false` (and changes nothing) if the guard fails. On success, the caller must follow up with
/// [`insert_response`] in the same transaction.
pub async fn claim_for_response(
    order_id: i64,
    response: &NewPharmacyResponse,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let guard = if response.is_acceptance() { ACCEPT_GUARD } else { REJECT_GUARD };
    let claimed: Option<i64> = sqlx::query_scalar(guard)
        .bind(order_id)
        .bind(response.pharmacy_id)
        .bind(response.responded_at)
        .fetch_optional(&mut *conn)
        .await?;
    trace!("🗃️ Response claim on order #{order_id} by pharmacy #{}: {}", response.pharmacy_id, claimed.is_some());
    Ok(claimed.is_some())
}

pub async fn insert_response(
    order_id: i64,
    response: NewPharmacyResponse,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO emergency_order_responses (order_id, pharmacy_id, decision, rejection_reason, responded_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(order_id)
    .bind(response.pharmacy_id)
    .bind(response.decision)
    .bind(response.rejection_reason)
    .bind(response.responded_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Cancels the order if it belongs to `requester_id` and is still `pending` or `no_response`. Returns `false` if the
/// guard failed.
pub async fn cancel_order(
    order_id: i64,
    requester_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let canceled: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE emergency_orders SET status = 'canceled', updated_at = $3
        WHERE id = $1 AND requester_id = $2 AND status IN ('pending', 'no_response')
        RETURNING id
        "#,
    )
    .bind(order_id)
    .bind(requester_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(canceled.is_some())
}

/// Moves an `accepted` order to `fulfilled`. Returns `false` if the order was in any other state.
pub async fn mark_fulfilled(order_id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let fulfilled: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE emergency_orders SET status = 'fulfilled', updated_at = $2
        WHERE id = $1 AND status = 'accepted'
        RETURNING id
        "#,
    )
    .bind(order_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(fulfilled.is_some())
}

/// Moves every pending order with a deadline before `now` to `no_response`, returning the ids of the orders that
/// changed, in ascending order.
pub async fn expire_overdue_orders(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<i64>, sqlx::Error> {
    let mut expired: Vec<i64> = sqlx::query_scalar(
        r#"
        UPDATE emergency_orders SET status = 'no_response', updated_at = $1
        WHERE status = 'pending' AND julianday(response_deadline) < julianday($1)
        RETURNING id
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    expired.sort_unstable();
    Ok(expired)
}

/// Upper bound on the ids bound into a single `IN (...)` list. Older SQLite builds cap a statement at 999 parameters.
const MAX_IDS_PER_QUERY: usize = 500;

fn id_list_query(prefix: &str, ids: &[i64], suffix: &str) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(prefix);
    builder.push(" IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    builder.push(") ");
    builder.push(suffix);
    builder
}

/// Attaches targets and responses to each order row. The order of `rows` is preserved.
async fn hydrate(rows: Vec<OrderRow>, conn: &mut SqliteConnection) -> Result<Vec<EmergencyOrder>, DispatchError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids = rows.iter().map(|r| r.id).collect::<Vec<_>>();

    let mut targets = HashMap::<i64, Vec<DispatchTarget>>::new();
    let mut responses = HashMap::<i64, Vec<PharmacyResponse>>::new();
    for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
        let mut query = id_list_query(
            "SELECT order_id, pharmacy_id, score, distance FROM emergency_order_targets WHERE order_id",
            chunk,
            "ORDER BY order_id, target_rank",
        );
        for row in query.build_query_as::<TargetRow>().fetch_all(&mut *conn).await? {
            let target = DispatchTarget { pharmacy_id: row.pharmacy_id, score: row.score, distance: row.distance };
            targets.entry(row.order_id).or_default().push(target);
        }

        let mut query = id_list_query(
            "SELECT order_id, pharmacy_id, decision, rejection_reason, responded_at FROM emergency_order_responses \
             WHERE order_id",
            chunk,
            "ORDER BY order_id, id",
        );
        for row in query.build_query_as::<ResponseRow>().fetch_all(&mut *conn).await? {
            responses.entry(row.order_id).or_default().push(row.into());
        }
    }

    rows.into_iter()
        .map(|row| {
            let location = GeoPoint::new(row.longitude, row.latitude).map_err(|e| {
                DispatchError::DatabaseError(format!("Emergency order #{} has an invalid location. {e}", row.id))
            })?;
            let dispatch_targets = targets.remove(&row.id).unwrap_or_default();
            Ok(EmergencyOrder {
                id: row.id,
                requester_id: row.requester_id,
                product_id: row.product_id,
                requested_medicine_name: row.requested_medicine_name,
                additional_notes: row.additional_notes,
                delivery_address: row.delivery_address,
                location,
                status: row.status,
                targeted_pharmacy_ids: dispatch_targets.iter().map(|t| t.pharmacy_id).collect(),
                dispatch_targets,
                responses: responses.remove(&row.id).unwrap_or_default(),
                accepted_pharmacy_id: row.accepted_pharmacy_id,
                priority: row.priority,
                response_deadline: row.response_deadline,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        })
        .collect()
}
