pub mod booking;
pub mod property;
pub mod response;
pub mod review;
pub mod user;

/// Fresh document id, hex encoded.
pub fn new_id() -> String {
    bson::oid::ObjectId::new().to_hex()
}
