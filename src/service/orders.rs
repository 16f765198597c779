use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::identity::{Identity, Role};
use crate::model::{Offer, OfferStatus, Order, OrderDraft, OrderStatus, OrderUpdate, Product};
use crate::policy::{Operation, Resource, ensure, order_scope};
use crate::store::{Index, Table};
use crate::transition::{Transition, parse_status, transition};
use crate::types::{OrderId, ProductId, ResourceKind, TimeStamp, UserId};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub product_id: Option<ProductId>,
}

impl OrderFilter {
    fn matcher(&self) -> MarketResult<impl Fn(&Order) -> bool> {
        let status = self
            .status
            .as_deref()
            .map(parse_status::<OrderStatus>)
            .transpose()?;
        let product_id = self.product_id;

        Ok(move |order: &Order| {
            status.is_none_or(|s| order.status == s)
                && product_id.is_none_or(|p| order.product_id == p)
        })
    }
}

impl MarketService {
    /// Open an order. The caller fills their own side: a buyer is the buyer
    /// party, a farmer the farmer party. Admins must name both.
    pub fn create_order(&self, identity: &Identity, draft: OrderDraft) -> MarketResult<Order> {
        ensure(identity, Operation::Create, Resource::Collection(ResourceKind::Order))?;

        let draft = match identity.role {
            Role::Buyer => draft.set_buyer(identity.user_id),
            Role::Farmer => draft.set_farmer(identity.user_id),
            Role::Admin | Role::Transporter => draft,
        };
        let id = self.store.next_id()?;
        let order = draft.validate_and_finalise(id)?;

        self.require_party(order.buyer_id, Role::Buyer, "buyer_id")?;
        self.require_party(order.farmer_id, Role::Farmer, "farmer_id")?;

        let product: Product = self.store.load(Table::Products, order.product_id)?;
        if product.owner != order.farmer_id {
            return Err(MarketError::validation(format!(
                "farmer_id {} does not own product {}",
                order.farmer_id, product.id
            )));
        }

        let offer_key = order.offer_id.map(|offer_id| offer_id.to_string());
        if let Some(offer_id) = order.offer_id {
            let offer: Offer = self.store.load(Table::Offers, offer_id)?;
            if offer.buyer_id != order.buyer_id || offer.product_id != order.product_id {
                return Err(MarketError::validation(format!(
                    "offer {offer_id} belongs to a different buyer or product"
                )));
            }
            if offer.status != OfferStatus::Accepted {
                return Err(MarketError::Conflict(format!(
                    "offer {offer_id} is {} and cannot back an order",
                    offer.status
                )));
            }
        }

        // an accepted offer backs at most one order
        if let Some(offer_key) = &offer_key {
            if !self.store.claim(Index::OrderOffer, offer_key, id)? {
                return Err(MarketError::Conflict(format!(
                    "offer {offer_key} already backs an order"
                )));
            }
        }

        if let Err(err) = self.store.insert_new(Table::Orders, id, &order) {
            if let Some(offer_key) = &offer_key {
                self.store.release(Index::OrderOffer, offer_key)?;
            }
            return Err(err);
        }
        info!(
            order_id = id,
            buyer_id = order.buyer_id,
            farmer_id = order.farmer_id,
            product_id = order.product_id,
            "order opened"
        );
        Ok(order)
    }

    pub fn get_order(&self, identity: &Identity, id: OrderId) -> MarketResult<Order> {
        let order: Order = self.store.load(Table::Orders, id)?;
        ensure(identity, Operation::Read, Resource::Order(&order))?;
        Ok(order)
    }

    pub fn list_orders(
        &self,
        identity: &Identity,
        filter: &OrderFilter,
    ) -> MarketResult<Vec<Order>> {
        ensure(identity, Operation::List, Resource::Collection(ResourceKind::Order))?;
        let scope = order_scope(identity)?;
        let matches = filter.matcher()?;
        let owners = self.product_owners()?;

        Ok(self
            .store
            .scan::<Order>(Table::Orders)?
            .into_iter()
            .filter(|o| scope.admits(o, owners.get(&o.product_id).copied()))
            .filter(|o| matches(o))
            .collect())
    }

    pub fn list_orders_by_buyer(
        &self,
        identity: &Identity,
        buyer_id: UserId,
        filter: &OrderFilter,
    ) -> MarketResult<Vec<Order>> {
        self.list_party_orders(identity, buyer_id, filter, |o| o.buyer_id == buyer_id)
    }

    pub fn list_orders_by_farmer(
        &self,
        identity: &Identity,
        farmer_id: UserId,
        filter: &OrderFilter,
    ) -> MarketResult<Vec<Order>> {
        self.list_party_orders(identity, farmer_id, filter, |o| o.farmer_id == farmer_id)
    }

    fn list_party_orders(
        &self,
        identity: &Identity,
        party: UserId,
        filter: &OrderFilter,
        is_party: impl Fn(&Order) -> bool,
    ) -> MarketResult<Vec<Order>> {
        ensure(
            identity,
            Operation::List,
            Resource::PartyRecords {
                kind: ResourceKind::Order,
                party,
            },
        )?;
        let matches = filter.matcher()?;

        Ok(self
            .store
            .scan::<Order>(Table::Orders)?
            .into_iter()
            .filter(|o| is_party(o) && matches(o))
            .collect())
    }

    pub fn update_order(
        &self,
        identity: &Identity,
        id: OrderId,
        update: OrderUpdate,
    ) -> MarketResult<Order> {
        let order = self.store.update_with(Table::Orders, id, |current: &Order| {
            ensure(identity, Operation::Update, Resource::Order(current))?;
            Self::ensure_editable(id, current)?;

            let mut next = current.clone();
            update.apply(&mut next);
            Ok(Some(next))
        })?;

        info!(order_id = id, by = identity.user_id, "order updated");
        Ok(order)
    }

    pub fn update_order_status(
        &self,
        identity: &Identity,
        id: OrderId,
        requested: &str,
    ) -> MarketResult<Order> {
        let mut moved = None;

        let order = self.store.update_with(Table::Orders, id, |current: &Order| {
            ensure(identity, Operation::UpdateStatus, Resource::Order(current))?;

            match transition(current, requested)? {
                Transition::Applied { mut record, from, to } => {
                    record.updated_at = TimeStamp::new();
                    moved = Some((from, to));
                    Ok(Some(record))
                }
                Transition::Unchanged(_) => {
                    moved = None;
                    Ok(None)
                }
            }
        })?;

        match moved {
            Some((from, to)) => info!(
                order_id = id,
                from,
                to,
                by = identity.user_id,
                "order status changed"
            ),
            None => info!(order_id = id, status = %order.status, "order status unchanged"),
        }
        Ok(order)
    }

    pub fn delete_order(&self, identity: &Identity, id: OrderId) -> MarketResult<Order> {
        let order: Order = self.store.load(Table::Orders, id)?;
        ensure(identity, Operation::Delete, Resource::Order(&order))?;

        self.store.remove::<Order>(Table::Orders, id)?;
        if let Some(offer_id) = order.offer_id {
            self.store.release(Index::OrderOffer, &offer_id.to_string())?;
        }
        info!(order_id = id, by = identity.user_id, "order deleted");
        Ok(order)
    }
}
