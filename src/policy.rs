//! Authorization policy.
//!
//! One pure function decides every access in the marketplace. Handlers load the
//! target record, call [`authorize`], and turn a [`Decision::Deny`] into a 403.
//! Collection endpoints use [`offer_scope`] / [`order_scope`] instead, which
//! yield a row predicate rather than a per-row decision.
use crate::error::{MarketError, MarketResult};
use crate::identity::{Identity, Role};
use crate::model::{Offer, Order, Product};
use crate::profile::ProfileKind;
use crate::types::{ResourceKind, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    UpdateStatus,
    Delete,
    List,
    /// Admin-only side operations: role changes, profile verification.
    Moderate,
}

impl Operation {
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::UpdateStatus => "change the status of",
            Operation::Delete => "delete",
            Operation::List => "list",
            Operation::Moderate => "moderate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        *self == Decision::Allow
    }

    pub fn or_forbidden(self, kind: ResourceKind, operation: Operation) -> MarketResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(MarketError::forbidden(kind, operation.verb())),
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed { Decision::Allow } else { Decision::Deny }
    }
}

/// An offer together with the owner of the product it targets. The owner is
/// `None` when the product has since been deleted.
#[derive(Debug, Clone, Copy)]
pub struct OfferView<'a> {
    pub offer: &'a Offer,
    pub product_owner: Option<UserId>,
}

#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Offer(OfferView<'a>),
    Order(&'a Order),
    Product(&'a Product),
    /// A user account, by id.
    Account(UserId),
    Profile { kind: ProfileKind, user_id: UserId },
    /// The collection itself, for create and list gates.
    Collection(ResourceKind),
    /// Offers or orders filed under one party (by-buyer / by-farmer listings).
    PartyRecords { kind: ResourceKind, party: UserId },
    /// Offers placed on one product.
    OffersOnProduct(&'a Product),
}

impl Resource<'_> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Offer(_) | Resource::OffersOnProduct(_) => ResourceKind::Offer,
            Resource::Order(_) => ResourceKind::Order,
            Resource::Product(_) => ResourceKind::Product,
            Resource::Account(_) => ResourceKind::User,
            Resource::Profile { kind, .. } => kind.resource(),
            Resource::Collection(kind) | Resource::PartyRecords { kind, .. } => *kind,
        }
    }
}

pub fn authorize(identity: &Identity, operation: Operation, resource: Resource<'_>) -> Decision {
    let me = identity.user_id;

    let allowed = match identity.role {
        Role::Admin => true,
        Role::Farmer | Role::Buyer | Role::Transporter => match resource {
            Resource::Offer(view) => offer_rule(me, operation, view),
            Resource::Order(order) => order_rule(identity, operation, order),
            Resource::Product(product) => match operation {
                Operation::Read | Operation::List => true,
                Operation::Update | Operation::UpdateStatus | Operation::Delete => {
                    product.owner == me
                }
                Operation::Create | Operation::Moderate => false,
            },
            Resource::Account(user_id) => match operation {
                Operation::Read | Operation::Update | Operation::Delete => user_id == me,
                _ => false,
            },
            Resource::Profile { kind, user_id } => match operation {
                Operation::Read | Operation::List => true,
                Operation::Create => identity.role == kind.role() && user_id == me,
                Operation::Update | Operation::Delete => user_id == me,
                Operation::UpdateStatus | Operation::Moderate => false,
            },
            Resource::Collection(kind) => collection_rule(identity.role, operation, kind),
            Resource::PartyRecords { party, .. } => {
                matches!(operation, Operation::List | Operation::Read) && party == me
            }
            Resource::OffersOnProduct(product) => match identity.role {
                Role::Farmer => product.owner == me,
                Role::Buyer => operation == Operation::List,
                Role::Transporter | Role::Admin => false,
            },
        },
    };

    Decision::from(allowed)
}

/// Shorthand for handlers: authorize or fail with `Forbidden`.
pub fn ensure(
    identity: &Identity,
    operation: Operation,
    resource: Resource<'_>,
) -> MarketResult<()> {
    let kind = resource.kind();
    authorize(identity, operation, resource).or_forbidden(kind, operation)
}

fn offer_rule(me: UserId, operation: Operation, view: OfferView<'_>) -> bool {
    let is_buyer = view.offer.buyer_id == me;
    let owns_product = view.product_owner == Some(me);

    match operation {
        Operation::Read => is_buyer || owns_product,
        Operation::Update | Operation::Delete => is_buyer,
        Operation::UpdateStatus => owns_product,
        Operation::Create | Operation::List | Operation::Moderate => false,
    }
}

fn order_rule(identity: &Identity, operation: Operation, order: &Order) -> bool {
    let me = identity.user_id;

    match operation {
        Operation::Read | Operation::Update | Operation::Delete => {
            order.buyer_id == me || order.farmer_id == me
        }
        Operation::UpdateStatus => identity.role == Role::Farmer && order.farmer_id == me,
        Operation::Create | Operation::List | Operation::Moderate => false,
    }
}

fn collection_rule(role: Role, operation: Operation, kind: ResourceKind) -> bool {
    match operation {
        Operation::Create => match kind {
            ResourceKind::Product => role == Role::Farmer,
            ResourceKind::Offer => role == Role::Buyer,
            ResourceKind::Order => matches!(role, Role::Buyer | Role::Farmer),
            ResourceKind::User
            | ResourceKind::FarmerProfile
            | ResourceKind::BuyerProfile
            | ResourceKind::TransporterProfile => false,
        },
        Operation::List => match kind {
            ResourceKind::Product
            | ResourceKind::FarmerProfile
            | ResourceKind::BuyerProfile
            | ResourceKind::TransporterProfile => true,
            ResourceKind::Offer | ResourceKind::Order => {
                matches!(role, Role::Buyer | Role::Farmer)
            }
            ResourceKind::User => false,
        },
        Operation::Read
        | Operation::Update
        | Operation::UpdateStatus
        | Operation::Delete
        | Operation::Moderate => false,
    }
}

/// Which offers a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferScope {
    All,
    PlacedBy(UserId),
    OnProductsOf(UserId),
}

impl OfferScope {
    pub fn admits(&self, offer: &Offer, product_owner: Option<UserId>) -> bool {
        match self {
            OfferScope::All => true,
            OfferScope::PlacedBy(buyer) => offer.buyer_id == *buyer,
            OfferScope::OnProductsOf(farmer) => product_owner == Some(*farmer),
        }
    }
}

/// Which orders a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    All,
    BoughtBy(UserId),
    /// Orders where the farmer is the farmer party or that touch their products.
    SoldBy(UserId),
}

impl OrderScope {
    pub fn admits(&self, order: &Order, product_owner: Option<UserId>) -> bool {
        match self {
            OrderScope::All => true,
            OrderScope::BoughtBy(buyer) => order.buyer_id == *buyer,
            OrderScope::SoldBy(farmer) => {
                order.farmer_id == *farmer || product_owner == Some(*farmer)
            }
        }
    }
}

pub fn offer_scope(identity: &Identity) -> MarketResult<OfferScope> {
    match identity.role {
        Role::Admin => Ok(OfferScope::All),
        Role::Buyer => Ok(OfferScope::PlacedBy(identity.user_id)),
        Role::Farmer => Ok(OfferScope::OnProductsOf(identity.user_id)),
        Role::Transporter => Err(MarketError::forbidden(ResourceKind::Offer, "list")),
    }
}

pub fn order_scope(identity: &Identity) -> MarketResult<OrderScope> {
    match identity.role {
        Role::Admin => Ok(OrderScope::All),
        Role::Buyer => Ok(OrderScope::BoughtBy(identity.user_id)),
        Role::Farmer => Ok(OrderScope::SoldBy(identity.user_id)),
        Role::Transporter => Err(MarketError::forbidden(ResourceKind::Order, "list")),
    }
}
