/// Entity identifiers are UUIDv7, so ordering by id follows creation order.
pub type Id = uuid::Uuid;

/// Opaque user identifier issued by the authentication layer.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Calendar dates (birth, death, marriage) carry no time-of-day.
pub type Date = chrono::NaiveDate;

/// Generate a fresh entity id.
pub fn new_id() -> Id {
    uuid::Uuid::now_v7()
}
