//! Property-based tests for the authorization policy
//!
//! The policy is a pure function over (identity, operation, resource), which
//! makes it a good fit for proptest: we generate arbitrary identities and
//! offers/orders and check that the access rules hold for all of them, not
//! only for the handful of ids the scenario tests use.

use agro_market::identity::{Identity, Role};
use agro_market::model::{Offer, OfferDraft, Order, OrderDraft};
use agro_market::policy::{OfferView, Operation, Resource, authorize};
use proptest::prelude::*;

// PROPERTY TEST STRATEGIES

/// Strategy to generate every role
fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Farmer),
        Just(Role::Buyer),
        Just(Role::Transporter),
        Just(Role::Admin),
    ]
}

/// Strategy to generate the per-record operations
fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Create),
        Just(Operation::Read),
        Just(Operation::Update),
        Just(Operation::UpdateStatus),
        Just(Operation::Delete),
        Just(Operation::List),
        Just(Operation::Moderate),
    ]
}

/// Small id space so that identities collide with record parties often
fn id_strategy() -> impl Strategy<Value = u64> {
    1u64..=6
}

fn offer(buyer_id: u64, product_id: u64) -> Offer {
    OfferDraft::new()
        .set_product(product_id)
        .set_quantity(5.0)
        .set_price(40.0)
        .validate_and_finalise(100, buyer_id)
        .unwrap()
}

fn order(buyer_id: u64, farmer_id: u64) -> Order {
    OrderDraft::new()
        .set_buyer(buyer_id)
        .set_farmer(farmer_id)
        .set_product(50)
        .validate_and_finalise(200)
        .unwrap()
}

proptest! {
    /// Admins are allowed every operation on every offer, whoever owns it
    #[test]
    fn admin_is_always_allowed(
        me in id_strategy(),
        buyer in id_strategy(),
        owner in proptest::option::of(id_strategy()),
        op in operation_strategy(),
    ) {
        let offer = offer(buyer, 5);
        let view = Resource::Offer(OfferView { offer: &offer, product_owner: owner });
        prop_assert!(authorize(&Identity::admin(me), op, view).is_allowed());
    }

    /// A non-admin who is neither the buyer nor the product owner is denied
    /// every operation on the offer
    #[test]
    fn strangers_are_denied_offers(
        role in role_strategy().prop_filter("non-admin", |r| *r != Role::Admin),
        me in id_strategy(),
        buyer in id_strategy(),
        owner in id_strategy(),
        op in operation_strategy(),
    ) {
        prop_assume!(me != buyer && me != owner);
        let offer = offer(buyer, 5);
        let view = Resource::Offer(OfferView { offer: &offer, product_owner: Some(owner) });
        prop_assert!(!authorize(&Identity::new(me, role), op, view).is_allowed());
    }

    /// Status decisions on an offer belong to the product owner only; being
    /// the buyer grants nothing here
    #[test]
    fn offer_status_is_the_owners_call(
        role in role_strategy().prop_filter("non-admin", |r| *r != Role::Admin),
        me in id_strategy(),
        buyer in id_strategy(),
        owner in id_strategy(),
    ) {
        let offer = offer(buyer, 5);
        let view = Resource::Offer(OfferView { offer: &offer, product_owner: Some(owner) });
        let identity = Identity::new(me, role);
        let allowed = authorize(&identity, Operation::UpdateStatus, view).is_allowed();
        prop_assert_eq!(allowed, me == owner);
    }

    /// Read on an order never implies UpdateStatus: only a farmer identity
    /// that is the farmer party may move it
    #[test]
    fn order_status_needs_farmer_party(
        role in role_strategy().prop_filter("non-admin", |r| *r != Role::Admin),
        me in id_strategy(),
        buyer in id_strategy(),
        farmer in id_strategy(),
    ) {
        let order = order(buyer, farmer);
        let identity = Identity::new(me, role);
        let resource = Resource::Order(&order);
        let can_read = authorize(&identity, Operation::Read, resource).is_allowed();
        let can_move = authorize(&identity, Operation::UpdateStatus, resource).is_allowed();

        prop_assert_eq!(can_read, me == buyer || me == farmer);
        prop_assert_eq!(can_move, role == Role::Farmer && me == farmer);
        prop_assert!(!can_move || can_read);
    }
}
