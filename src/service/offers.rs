use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::identity::{Identity, Role};
use crate::model::{Offer, OfferDraft, OfferStatus, OfferUpdate, Product, ProductStatus};
use crate::policy::{OfferView, Operation, Resource, ensure, offer_scope};
use crate::store::Table;
use crate::transition::{Transition, parse_status, transition};
use crate::types::{OfferId, ProductId, ResourceKind, TimeStamp, UserId};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct OfferFilter {
    /// Exact status name, e.g. `PENDING`.
    pub status: Option<String>,
}

impl OfferFilter {
    pub fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
        }
    }

    fn parsed(&self) -> MarketResult<Option<OfferStatus>> {
        Ok(self
            .status
            .as_deref()
            .map(parse_status::<OfferStatus>)
            .transpose()?)
    }
}

impl MarketService {
    pub fn create_offer(&self, identity: &Identity, draft: OfferDraft) -> MarketResult<Offer> {
        ensure(identity, Operation::Create, Resource::Collection(ResourceKind::Offer))?;

        let product: Product = self.store.load(Table::Products, draft.product_id()?)?;
        if product.status != ProductStatus::Available {
            return Err(MarketError::Conflict(format!(
                "product {} is {} and not taking offers",
                product.id, product.status
            )));
        }

        let id = self.store.next_id()?;
        let offer = draft.validate_and_finalise(id, identity.user_id)?;
        self.store.insert_new(Table::Offers, id, &offer)?;

        info!(
            offer_id = id,
            buyer_id = offer.buyer_id,
            product_id = offer.product_id,
            "offer placed"
        );
        Ok(offer)
    }

    pub fn get_offer(&self, identity: &Identity, id: OfferId) -> MarketResult<Offer> {
        let offer: Offer = self.store.load(Table::Offers, id)?;
        let product_owner = self.product_owner(offer.product_id)?;
        ensure(
            identity,
            Operation::Read,
            Resource::Offer(OfferView {
                offer: &offer,
                product_owner,
            }),
        )?;
        Ok(offer)
    }

    /// Offers visible to the caller: all for admins, own for buyers, those on
    /// their products for farmers.
    pub fn list_offers(
        &self,
        identity: &Identity,
        filter: &OfferFilter,
    ) -> MarketResult<Vec<Offer>> {
        ensure(identity, Operation::List, Resource::Collection(ResourceKind::Offer))?;
        let scope = offer_scope(identity)?;
        let status = filter.parsed()?;
        let owners = self.product_owners()?;

        Ok(self
            .store
            .scan::<Offer>(Table::Offers)?
            .into_iter()
            .filter(|o| scope.admits(o, owners.get(&o.product_id).copied()))
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect())
    }

    pub fn list_offers_by_buyer(
        &self,
        identity: &Identity,
        buyer_id: UserId,
        filter: &OfferFilter,
    ) -> MarketResult<Vec<Offer>> {
        ensure(
            identity,
            Operation::List,
            Resource::PartyRecords {
                kind: ResourceKind::Offer,
                party: buyer_id,
            },
        )?;
        let status = filter.parsed()?;

        Ok(self
            .store
            .scan::<Offer>(Table::Offers)?
            .into_iter()
            .filter(|o| o.buyer_id == buyer_id)
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect())
    }

    /// The product owner sees every offer on it; a buyer only their own.
    pub fn list_offers_by_product(
        &self,
        identity: &Identity,
        product_id: ProductId,
    ) -> MarketResult<Vec<Offer>> {
        let product: Product = self.store.load(Table::Products, product_id)?;
        ensure(identity, Operation::List, Resource::OffersOnProduct(&product))?;

        Ok(self
            .store
            .scan::<Offer>(Table::Offers)?
            .into_iter()
            .filter(|o| o.product_id == product_id)
            .filter(|o| identity.role != Role::Buyer || o.buyer_id == identity.user_id)
            .collect())
    }

    pub fn update_offer(
        &self,
        identity: &Identity,
        id: OfferId,
        update: OfferUpdate,
    ) -> MarketResult<Offer> {
        let offer = self.store.update_with(Table::Offers, id, |current: &Offer| {
            let product_owner = self.product_owner(current.product_id)?;
            ensure(
                identity,
                Operation::Update,
                Resource::Offer(OfferView {
                    offer: current,
                    product_owner,
                }),
            )?;
            Self::ensure_editable(id, current)?;

            let mut next = current.clone();
            update.apply(&mut next)?;
            Ok(Some(next))
        })?;

        info!(offer_id = id, by = identity.user_id, "offer updated");
        Ok(offer)
    }

    /// Accept or reject. Policy and transition are re-checked against the
    /// stored offer on every commit attempt, so of two racing decisions the
    /// later one fails with `IllegalTransition`.
    pub fn update_offer_status(
        &self,
        identity: &Identity,
        id: OfferId,
        requested: &str,
    ) -> MarketResult<Offer> {
        let mut moved = None;

        let offer = self.store.update_with(Table::Offers, id, |current: &Offer| {
            let product_owner = self.product_owner(current.product_id)?;
            ensure(
                identity,
                Operation::UpdateStatus,
                Resource::Offer(OfferView {
                    offer: current,
                    product_owner,
                }),
            )?;

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
                offer_id = id,
                from,
                to,
                by = identity.user_id,
                "offer status changed"
            ),
            None => info!(offer_id = id, status = %offer.status, "offer status unchanged"),
        }
        Ok(offer)
    }

    pub fn delete_offer(&self, identity: &Identity, id: OfferId) -> MarketResult<Offer> {
        let offer: Offer = self.store.load(Table::Offers, id)?;
        let product_owner = self.product_owner(offer.product_id)?;
        ensure(
            identity,
            Operation::Delete,
            Resource::Offer(OfferView {
                offer: &offer,
                product_owner,
            }),
        )?;

        self.store.remove::<Offer>(Table::Offers, id)?;
        info!(offer_id = id, by = identity.user_id, "offer deleted");
        Ok(offer)
    }
}
