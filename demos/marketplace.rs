//! Walks one trade through the marketplace on a throwaway store:
//! a farmer lists tomatoes, a buyer bids, the farmer accepts, and the
//! resulting order is completed.
//!
//! Run with `cargo run --example marketplace`. Set `RUST_LOG=debug` to see
//! the store's conditional writes.
use agro_market::config::MarketConfig;
use agro_market::model::{OfferDraft, OrderDraft, ProductDraft, UserDraft};
use agro_market::profile::FarmerProfile;
use agro_market::{Identity, MarketService, Role, telemetry};
use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let config = MarketConfig::ephemeral();
    telemetry::init(&config.log)?;

    let service = MarketService::open(config).context("failed to open the store")?;

    let farmer = service.register_user(
        UserDraft::new()
            .set_full_name("Ram Bahadur Thapa")
            .set_email("ram@krishi.np")
            .set_phone("9841000001")
            .set_role(Role::Farmer)
            .set_district("Chitwan"),
    )?;
    let buyer = service.register_user(
        UserDraft::new()
            .set_full_name("Sita Shrestha")
            .set_email("sita@bazaar.np")
            .set_phone("9841000002")
            .set_language("ne"),
    )?;
    let as_farmer = Identity::new(farmer.id, farmer.role);
    let as_buyer = Identity::new(buyer.id, buyer.role);

    service.create_profile(
        &as_farmer,
        FarmerProfile::new(farmer.id, &farmer.full_name, "Thapa Organic Farm")?,
    )?;

    let product = service
        .create_product(
            &as_farmer,
            ProductDraft::new()
                .set_name("Tomato", Some("गोलभेडा"))
                .set_category("vegetables")
                .set_quantity(500.0, "kg")
                .set_price_per_unit(60.0),
            None,
        )?
        .product;
    println!("listed: {product:#?}");

    let offer = service.create_offer(
        &as_buyer,
        OfferDraft::new()
            .set_product(product.id)
            .set_quantity(120.0)
            .set_price(55.0)
            .set_pickup_date("2025-03-02"),
    )?;
    println!("offer placed: {} ({})", offer.id, offer.status);

    let offer = service
        .update_offer_status(&as_farmer, offer.id, "ACCEPTED")
        .context("farmer could not accept the offer")?;
    println!("offer {} is now {}", offer.id, offer.status);

    if let Err(err) = service.update_offer_status(&as_farmer, offer.id, "REJECTED") {
        println!("second decision refused ({}): {err}", err.status_code());
    }

    let order = service.create_order(
        &as_buyer,
        OrderDraft::new()
            .set_offer(offer.id)
            .set_farmer(farmer.id)
            .set_product(product.id),
    )?;
    let order = service.update_order_status(&as_farmer, order.id, "completed")?;
    println!("order: {order:#?}");

    service.store().flush()?;
    Ok(())
}
