//! Apprise Marketplace data and the tools that read it.
//!
//! The database tools go through a [`MarketplaceStore`] handed to them at
//! construction. The support tools answer from fixed copy.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};

use crate::config::Settings;
use crate::error::Result;
use crate::tool::{FunctionTool, Tool, ToolResult};

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// The booking with the most reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularBooking {
    pub booking: String,
    pub destination_name: String,
    pub count: u64,
}

/// Read-only view of the marketplace database.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// Number of active listings.
    async fn listing_count(&self) -> Result<u64>;

    /// The most booked destination, or `None` when there are no bookings.
    /// Ties go to the booking id that sorts first.
    async fn most_booked_destination(&self) -> Result<Option<PopularBooking>>;
}

/// A [`MarketplaceStore`] on SQLite.
#[derive(Debug, Clone)]
pub struct SqliteMarketplace {
    pool: Pool<Sqlite>,
}

impl SqliteMarketplace {
    /// Open (creating if needed) the database at `url`, e.g.
    /// `sqlite://marketplace.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // One long-lived connection keeps `:memory:` databases alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::run_migrations(&pool).await?;
        tracing::debug!(url, "marketplace database ready");
        Ok(Self { pool })
    }

    /// Connect to the configured `DATABASE_URL`, or an empty in-memory
    /// database when unset.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        Self::connect(settings.database_url()).await
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                location TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                booking TEXT NOT NULL,
                destination_name TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn add_listing(&self, id: &str, title: &str, location: Option<&str>) -> Result<()> {
        sqlx::query("INSERT INTO listings (id, title, location) VALUES (?, ?, ?)")
            .bind(id)
            .bind(title)
            .bind(location)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_booking(&self, booking: &str, destination_name: &str) -> Result<()> {
        sqlx::query("INSERT INTO bookings (booking, destination_name) VALUES (?, ?)")
            .bind(booking)
            .bind(destination_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MarketplaceStore for SqliteMarketplace {
    async fn listing_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn most_booked_destination(&self) -> Result<Option<PopularBooking>> {
        // The destination name comes from the earliest row of each booking.
        let row = sqlx::query(
            r#"
            SELECT b.booking AS booking,
                   COUNT(*) AS count,
                   (SELECT e.destination_name FROM bookings e
                     WHERE e.booking = b.booking
                     ORDER BY e.id LIMIT 1) AS destination_name
            FROM bookings b
            GROUP BY b.booking
            ORDER BY count DESC, b.booking ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<PopularBooking> {
            let count: i64 = row.try_get("count")?;
            Ok(PopularBooking {
                booking: row.try_get("booking")?,
                destination_name: row.try_get("destination_name")?,
                count: count.max(0) as u64,
            })
        })
        .transpose()
    }
}

/// Fixed answers, for tests and offline demos.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketplace {
    pub listings: u64,
    pub popular: Option<PopularBooking>,
}

#[async_trait]
impl MarketplaceStore for StaticMarketplace {
    async fn listing_count(&self) -> Result<u64> {
        Ok(self.listings)
    }

    async fn most_booked_destination(&self) -> Result<Option<PopularBooking>> {
        Ok(self.popular.clone())
    }
}

fn no_params() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// `get_listing_count` over a store.
#[derive(Clone)]
pub struct ListingCountTool {
    store: Arc<dyn MarketplaceStore>,
}

impl ListingCountTool {
    pub fn new(store: Arc<dyn MarketplaceStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for ListingCountTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ListingCountTool")
    }
}

#[async_trait]
impl Tool for ListingCountTool {
    fn name(&self) -> &str {
        "get_listing_count"
    }

    fn description(&self) -> &str {
        "Get the current number of active listings on Apprise Marketplace."
    }

    fn parameters_schema(&self) -> Value {
        no_params()
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolResult> {
        match self.store.listing_count().await {
            Ok(n) => Ok(ToolResult::success(Value::String(format!(
                "There are currently {n} active listings on Apprise Marketplace."
            )))),
            Err(e) => {
                tracing::warn!(error = %e, "listing count query failed");
                Ok(ToolResult::error(e.to_string()))
            }
        }
    }
}

/// `get_popular_listing` over a store.
#[derive(Clone)]
pub struct PopularListingTool {
    store: Arc<dyn MarketplaceStore>,
}

impl PopularListingTool {
    pub fn new(store: Arc<dyn MarketplaceStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for PopularListingTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PopularListingTool")
    }
}

#[async_trait]
impl Tool for PopularListingTool {
    fn name(&self) -> &str {
        "get_popular_listing"
    }

    fn description(&self) -> &str {
        "Get the most booked destination on Apprise Marketplace."
    }

    fn parameters_schema(&self) -> Value {
        no_params()
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolResult> {
        let text = match self.store.most_booked_destination().await {
            Ok(Some(top)) => format!(
                "Most popular booking: {} ({}) with {} bookings.",
                top.destination_name, top.booking, top.count
            ),
            Ok(None) => "No bookings found.".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "popular booking query failed");
                return Ok(ToolResult::error(e.to_string()));
            }
        };
        Ok(ToolResult::success(Value::String(text)))
    }
}

/// Both database tools over one store.
pub fn database_tools(store: Arc<dyn MarketplaceStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListingCountTool::new(store.clone())),
        Arc::new(PopularListingTool::new(store)),
    ]
}

pub const POPULAR_LOCATIONS: [&str; 5] = ["New York City", "Miami", "Los Angeles", "Austin", "Chicago"];

const BOOKING_PROCESS: &str = "The booking process on Apprise Marketplace is simple:
1. Create an account or log in
2. Browse listings and select one you're interested in
3. Check availability on the calendar
4. Click 'Request to Book' and enter your details
5. Wait for host approval (usually within 24 hours)
6. Once approved, complete payment to confirm your booking";

const HOST_REQUIREMENTS: &str = "To become a host on Apprise Marketplace, you need:
1. A verified account with complete profile
2. Clear photos and detailed description of your space
3. Availability calendar
4. Valid payment information
5. Compliance with local regulations for short-term rentals";

const CANCELLATION_POLICY: &str = "Apprise Marketplace offers three cancellation policy options:
1. Flexible: Full refund if cancelled 24 hours before check-in
2. Moderate: Full refund if cancelled 5 days before check-in
3. Strict: 50% refund if cancelled 7 days before check-in, no refund after
The specific policy is set by each host and is clearly displayed on the listing page.";

const CONTACT_SUPPORT: &str = "You can contact Apprise Marketplace support through:
1. Email: support@apprisemarketplace.com
2. Phone: 1-800-APP-RISE (available 24/7)
3. Live chat on our website or mobile app
For urgent matters related to a current stay, please use the emergency support option in the app.";

/// The voice assistant's tools. The listing count here is a canned figure,
/// not a database read.
pub fn support_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(FunctionTool::no_args(
            "get_listing_count",
            "Get the current number of active listings on Apprise Marketplace.",
            || "There are currently 1,248 active listings on Apprise Marketplace.".to_string(),
        )),
        Arc::new(FunctionTool::no_args(
            "get_popular_locations",
            "Get the most popular locations on Apprise Marketplace.",
            || {
                format!(
                    "The most popular locations on Apprise Marketplace are {}.",
                    POPULAR_LOCATIONS.join(", ")
                )
            },
        )),
        Arc::new(FunctionTool::no_args(
            "get_booking_process",
            "Explain the booking process on Apprise Marketplace.",
            || BOOKING_PROCESS.to_string(),
        )),
        Arc::new(FunctionTool::no_args(
            "get_host_requirements",
            "Explain the requirements to become a host on Apprise Marketplace.",
            || HOST_REQUIREMENTS.to_string(),
        )),
        Arc::new(FunctionTool::no_args(
            "get_cancellation_policy",
            "Explain the cancellation policies on Apprise Marketplace.",
            || CANCELLATION_POLICY.to_string(),
        )),
        Arc::new(FunctionTool::no_args(
            "contact_support",
            "Provide information about contacting customer support.",
            || CONTACT_SUPPORT.to_string(),
        )),
    ]
}

/// `get_time`: the local time as `YYYY-MM-DD HH:MM:SS`.
pub fn time_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::no_args(
        "get_time",
        "Get the current local date and time.",
        || chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    ))
}

/// `get_email_address`: the address the assistant sends on behalf of.
pub fn email_address_tool(address: impl Into<String>) -> Arc<dyn Tool> {
    let address = address.into();
    Arc::new(FunctionTool::no_args(
        "get_email_address",
        "Get the email address of the current user.",
        move || address.clone(),
    ))
}
