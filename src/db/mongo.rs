use bson::{doc, Document};
use log::{info, warn};
use mongodb::{
    options::{ClientOptions, IndexOptions, ServerApi, ServerApiVersion},
    Client, Database, IndexModel,
};
use std::time::Duration;

pub const PROPERTIES: &str = "properties";
pub const BOOKINGS: &str = "bookings";
pub const BOOKING_NIGHTS: &str = "bookingNights";
pub const REVIEWS: &str = "reviews";
pub const USERS: &str = "users";

pub async fn create_mongo_client(uri: &str) -> Result<Client, mongodb::error::Error> {
    info!("Connecting to MongoDB");

    let mut client_options = ClientOptions::parse(uri).await?;

    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    let client = Client::with_options(client_options)?;

    match client
        .database("admin")
        .run_command(doc! {"ping": 1})
        .await
    {
        Ok(_) => info!("Connected to MongoDB and verified with ping"),
        Err(e) => warn!("Connected to MongoDB but ping failed: {}", e),
    }

    Ok(client)
}

/// Creates the indexes the write path depends on. The unique indexes are
/// what keep two bookings off the same night, one review per booking and
/// user, and one account per email.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    create_index(db, BOOKING_NIGHTS, doc! { "property": 1, "night": 1 }, true).await?;
    create_index(db, BOOKING_NIGHTS, doc! { "booking": 1 }, false).await?;
    create_index(
        db,
        BOOKINGS,
        doc! { "property": 1, "startDate": 1, "endDate": 1 },
        false,
    )
    .await?;
    create_index(db, BOOKINGS, doc! { "user": 1 }, false).await?;
    create_index(db, REVIEWS, doc! { "booking": 1, "user": 1 }, true).await?;
    create_index(db, REVIEWS, doc! { "property": 1 }, false).await?;
    create_index(db, USERS, doc! { "email": 1 }, true).await?;
    create_index(db, PROPERTIES, doc! { "createdBy": 1 }, false).await?;
    info!("MongoDB indexes ensured");
    Ok(())
}

async fn create_index(
    db: &Database,
    collection: &str,
    keys: Document,
    unique: bool,
) -> Result<(), mongodb::error::Error> {
    let options = IndexOptions::builder().unique(unique).build();
    let model = IndexModel::builder().keys(keys).options(options).build();
    db.collection::<Document>(collection)
        .create_index(model)
        .await?;
    Ok(())
}
