//! Service layer: the resource handlers behind the HTTP routes.
//!
//! Every public method takes the caller's [`Identity`], loads what it needs
//! from the [`Store`], asks the policy, and returns a record or a tagged
//! [`MarketError`](crate::error::MarketError) for the transport to map.
mod offers;
mod orders;
mod products;
mod profiles;
mod users;

pub use offers::OfferFilter;
pub use orders::OrderFilter;
pub use products::ProductWrite;
pub use profiles::BuyerProfileFilter;

use crate::config::MarketConfig;
use crate::error::{MarketError, MarketResult};
use crate::identity::Role;
use crate::model::{Product, User};
use crate::store::{Store, Table};
use crate::transition::{Lifecycle, Stateful};
use crate::types::{ProductId, RecordId, UserId};
use std::collections::HashMap;

pub struct MarketService {
    store: Store,
    config: MarketConfig,
}

impl MarketService {
    pub fn new(store: Store, config: MarketConfig) -> Self {
        Self { store, config }
    }

    pub fn open(config: MarketConfig) -> MarketResult<Self> {
        let store = Store::open(&config.store)?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Owner of a product, or `None` once the product is gone.
    fn product_owner(&self, product_id: ProductId) -> MarketResult<Option<UserId>> {
        Ok(self
            .store
            .get::<Product>(Table::Products, product_id)?
            .map(|p| p.owner))
    }

    /// Owner lookup for listings, touching each product once.
    fn product_owners(&self) -> MarketResult<HashMap<ProductId, UserId>> {
        Ok(self
            .store
            .scan::<Product>(Table::Products)?
            .into_iter()
            .map(|p| (p.id, p.owner))
            .collect())
    }

    /// Counterparty checks on creation: the user must exist and hold `role`.
    fn require_party(&self, user_id: UserId, role: Role, field: &str) -> MarketResult<User> {
        let user = self
            .store
            .get::<User>(Table::Users, user_id)?
            .ok_or_else(|| {
                MarketError::validation(format!("{field} {user_id} is not a registered user"))
            })?;
        if user.role != role {
            return Err(MarketError::validation(format!(
                "{field} {user_id} is a {}, expected a {role}",
                user.role
            )));
        }
        Ok(user)
    }

    /// Field edits stop once an offer or order reaches a terminal status.
    fn ensure_editable<R: Stateful>(id: RecordId, record: &R) -> MarketResult<()> {
        let status = record.status();
        if status.is_terminal() {
            return Err(MarketError::Finalized {
                kind: <R::Status as Lifecycle>::KIND,
                id,
                status: status.as_str().to_string(),
            });
        }
        Ok(())
    }
}
