//! Triage over billing, technical and business-information agents, the
//! last of which reads the marketplace database.

use std::sync::Arc;

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::marketplace::{database_tools, MarketplaceStore, SqliteMarketplace};
use apprise_agents::{Agent, Handoff, Runner, TransitionLog};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;
    let model = settings.default_model.clone();

    let db = SqliteMarketplace::from_settings(&settings).await?;
    if db.listing_count().await? == 0 {
        db.add_listing("lst-001", "Sunny loft near the river", Some("Austin")).await?;
        db.add_listing("lst-002", "Ocean view studio", Some("Miami")).await?;
        db.add_booking("bk-miami-01", "Miami Beach House").await?;
        db.add_booking("bk-miami-01", "Miami Beach House").await?;
        db.add_booking("bk-nyc-07", "Brooklyn Brownstone").await?;
    }
    let store: Arc<dyn MarketplaceStore> = Arc::new(db);

    let business = Agent::simple(
        "Business Information Agent",
        "You are a business information specialist who helps customers understand what Apprise \
Marketplace is about. Focus on providing information, including what listings are, what Apprise \
Marketplace is about, and why the customer should use the service. If asked about technical \
problems or account settings, explain that you specialise in customer information only.",
    )
    .with_model(model.clone())
    .with_tools(database_tools(store));

    let billing = Agent::simple(
        "Billing Agent",
        "You are a billing specialist who helps customers with payment issues. \
Focus on resolving billing inquiries, subscription changes, and refund requests.",
    )
    .with_model(model.clone());

    let technical = Agent::simple(
        "Technical Agent",
        "You are a technical support specialist who helps with product issues. \
Assist users with troubleshooting, error messages, and how-to questions.",
    )
    .with_model(model.clone());

    let triage = Agent::simple(
        "Customer Service",
        "You are the initial customer service contact who helps direct customers to the right specialist.

If the customer has billing or payment questions, hand off to the Billing Agent.
If the customer has technical problems or how-to questions, hand off to the Technical Agent.
If the customer has inquiries about Apprise Marketplace or its listings, hand off to the Business Information Agent.
For general inquiries or questions about products, you can answer directly.",
    )
    .with_model(model)
    .with_handoffs(vec![
        Handoff::to(billing),
        Handoff::to(technical),
        Handoff::to(business),
    ])
    .build()?;

    let log = Arc::new(TransitionLog::new());
    let result = Runner::run(
        triage,
        "Okay, do you have any listing recommendations from the marketplace",
        settings.run_config().with_observer(log.clone()),
    )
    .await?;

    for transfer in log.transfers() {
        println!("[handoff] {transfer}");
    }
    println!("{}", result.final_text());
    println!("{}", result.usage.summary());
    Ok(())
}
