//! Entity store over sled.
//!
//! Every record lives in its own tree, CBOR-encoded under its big-endian id.
//! Mutations go through [`Store::update_with`], a compare-and-swap loop against
//! the exact bytes that were read, so concurrent writers never lose updates and
//! a status change is evaluated against whatever is stored at commit time.
use crate::config::StoreConfig;
use crate::error::{MarketError, MarketResult};
use crate::types::{RecordId, ResourceKind};
use sled::{IVec, Tree};
use std::sync::Arc;
use tracing::{debug, info};

/// Anything that can be stored as a CBOR record.
pub trait Record: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> {}

impl<T> Record for T where T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    Products,
    Offers,
    Orders,
    FarmerProfiles,
    BuyerProfiles,
    TransporterProfiles,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Products => "products",
            Table::Offers => "offers",
            Table::Orders => "orders",
            Table::FarmerProfiles => "farmer_profiles",
            Table::BuyerProfiles => "buyer_profiles",
            Table::TransporterProfiles => "transporter_profiles",
        }
    }
    pub fn kind(&self) -> ResourceKind {
        match self {
            Table::Users => ResourceKind::User,
            Table::Products => ResourceKind::Product,
            Table::Offers => ResourceKind::Offer,
            Table::Orders => ResourceKind::Order,
            Table::FarmerProfiles => ResourceKind::FarmerProfile,
            Table::BuyerProfiles => ResourceKind::BuyerProfile,
            Table::TransporterProfiles => ResourceKind::TransporterProfile,
        }
    }
}

/// Unique secondary keys, mapping a value to the id that claimed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    UserEmail,
    BuyerPan,
    OrderOffer,
}

impl Index {
    fn name(&self) -> &'static str {
        match self {
            Index::UserEmail => "users_by_email",
            Index::BuyerPan => "buyer_profiles_by_pan",
            Index::OrderOffer => "orders_by_offer",
        }
    }
}

#[derive(Clone)]
pub struct Store {
    instance: Arc<sled::Db>,
    users: Tree,
    products: Tree,
    offers: Tree,
    orders: Tree,
    farmer_profiles: Tree,
    buyer_profiles: Tree,
    transporter_profiles: Tree,
    users_by_email: Tree,
    buyer_profiles_by_pan: Tree,
    orders_by_offer: Tree,
}

pub fn key(id: RecordId) -> [u8; 8] {
    id.to_be_bytes()
}

pub fn encode<T: Record>(value: &T) -> MarketResult<Vec<u8>> {
    minicbor::to_vec(value).map_err(|e| MarketError::Codec(e.to_string()))
}

pub fn decode<T: Record>(bytes: &[u8]) -> MarketResult<T> {
    minicbor::decode(bytes).map_err(|e| MarketError::Codec(e.to_string()))
}

impl Store {
    pub fn new(instance: Arc<sled::Db>) -> MarketResult<Self> {
        Ok(Self {
            users: instance.open_tree(Table::Users.name())?,
            products: instance.open_tree(Table::Products.name())?,
            offers: instance.open_tree(Table::Offers.name())?,
            orders: instance.open_tree(Table::Orders.name())?,
            farmer_profiles: instance.open_tree(Table::FarmerProfiles.name())?,
            buyer_profiles: instance.open_tree(Table::BuyerProfiles.name())?,
            transporter_profiles: instance.open_tree(Table::TransporterProfiles.name())?,
            users_by_email: instance.open_tree(Index::UserEmail.name())?,
            buyer_profiles_by_pan: instance.open_tree(Index::BuyerPan.name())?,
            orders_by_offer: instance.open_tree(Index::OrderOffer.name())?,
            instance,
        })
    }

    pub fn open(config: &StoreConfig) -> MarketResult<Self> {
        // temporary stores get a fresh scratch path from sled
        let db = if config.temporary {
            sled::Config::new().temporary(true).open()?
        } else {
            sled::Config::new().path(&config.path).open()?
        };
        info!(
            path = %config.path.display(),
            temporary = config.temporary,
            "entity store opened"
        );
        Self::new(Arc::new(db))
    }

    fn tree(&self, table: Table) -> &Tree {
        match table {
            Table::Users => &self.users,
            Table::Products => &self.products,
            Table::Offers => &self.offers,
            Table::Orders => &self.orders,
            Table::FarmerProfiles => &self.farmer_profiles,
            Table::BuyerProfiles => &self.buyer_profiles,
            Table::TransporterProfiles => &self.transporter_profiles,
        }
    }

    fn index(&self, index: Index) -> &Tree {
        match index {
            Index::UserEmail => &self.users_by_email,
            Index::BuyerPan => &self.buyer_profiles_by_pan,
            Index::OrderOffer => &self.orders_by_offer,
        }
    }

    /// Fresh surrogate id. Ids are shared across tables and start at 1.
    pub fn next_id(&self) -> MarketResult<RecordId> {
        Ok(self.instance.generate_id()? + 1)
    }

    pub fn get<T: Record>(&self, table: Table, id: RecordId) -> MarketResult<Option<T>> {
        self.tree(table)
            .get(key(id))?
            .map(|raw| decode(&raw))
            .transpose()
    }

    pub fn load<T: Record>(&self, table: Table, id: RecordId) -> MarketResult<T> {
        self.get(table, id)?
            .ok_or_else(|| MarketError::not_found(table.kind(), id))
    }

    pub fn contains(&self, table: Table, id: RecordId) -> MarketResult<bool> {
        Ok(self.tree(table).contains_key(key(id))?)
    }

    /// Insert a record under an id nobody holds yet.
    pub fn insert_new<T: Record>(
        &self,
        table: Table,
        id: RecordId,
        value: &T,
    ) -> MarketResult<()> {
        let swapped = self
            .tree(table)
            .compare_and_swap(key(id), None::<&[u8]>, Some(encode(value)?))?;

        swapped.map_err(|_| MarketError::Conflict(format!("{} {id} already exists", table.kind())))
    }

    pub fn scan<T: Record>(&self, table: Table) -> MarketResult<Vec<T>> {
        self.tree(table)
            .iter()
            .values()
            .map(|raw| decode(&raw?))
            .collect()
    }

    pub fn remove<T: Record>(&self, table: Table, id: RecordId) -> MarketResult<Option<T>> {
        self.tree(table)
            .remove(key(id))?
            .map(|raw| decode(&raw))
            .transpose()
    }

    /// Read-modify-write with a conditional commit.
    ///
    /// `edit` sees the current record and returns the replacement, or `None`
    /// when nothing needs writing. If another writer commits first the record
    /// is re-read and `edit` runs again against the fresh state, so checks made
    /// inside `edit` always hold for the value that is finally written.
    pub fn update_with<T, F>(&self, table: Table, id: RecordId, mut edit: F) -> MarketResult<T>
    where
        T: Record,
        F: FnMut(&T) -> MarketResult<Option<T>>,
    {
        let tree = self.tree(table);

        loop {
            let raw: IVec = tree
                .get(key(id))?
                .ok_or_else(|| MarketError::not_found(table.kind(), id))?;
            let current: T = decode(&raw)?;

            let Some(next) = edit(&current)? else {
                return Ok(current);
            };

            match tree.compare_and_swap(key(id), Some(raw), Some(encode(&next)?))? {
                Ok(()) => return Ok(next),
                Err(_) => {
                    debug!(
                        table = table.name(),
                        id, "conditional write lost a race, re-reading"
                    );
                }
            }
        }
    }

    /// Claim a unique key for `owner`. Returns false if someone else holds it.
    /// Re-claiming a key already held by `owner` succeeds.
    pub fn claim(&self, index: Index, value: &str, owner: RecordId) -> MarketResult<bool> {
        let tree = self.index(index);

        match tree.compare_and_swap(value.as_bytes(), None::<&[u8]>, Some(&key(owner)[..]))? {
            Ok(()) => Ok(true),
            Err(existing) => Ok(existing.current.as_deref() == Some(&key(owner)[..])),
        }
    }

    pub fn release(&self, index: Index, value: &str) -> MarketResult<()> {
        self.index(index).remove(value.as_bytes())?;
        Ok(())
    }

    pub fn lookup(&self, index: Index, value: &str) -> MarketResult<Option<RecordId>> {
        Ok(self.index(index).get(value.as_bytes())?.and_then(|raw| {
            let bytes: [u8; 8] = raw.as_ref().try_into().ok()?;
            Some(RecordId::from_be_bytes(bytes))
        }))
    }

    pub fn flush(&self) -> MarketResult<()> {
        self.instance.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Offer, OfferStatus};

    fn temp_store() -> Store {
        let db = sled::Config::new().temporary(true).open().unwrap();
        Store::new(Arc::new(db)).unwrap()
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let store = temp_store();
        let a = store.next_id().unwrap();
        let b = store.next_id().unwrap();
        assert!(a >= 1);
        assert!(b > a);
    }

    #[test]
    fn insert_new_refuses_to_overwrite() {
        let store = temp_store();
        let offer = Offer::sample(1, 7, 5);

        store.insert_new(Table::Offers, 1, &offer).unwrap();
        let err = store.insert_new(Table::Offers, 1, &offer).unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }

    #[test]
    fn update_with_skips_write_on_none() {
        let store = temp_store();
        let offer = Offer::sample(1, 7, 5);
        store.insert_new(Table::Offers, 1, &offer).unwrap();

        let unchanged: Offer = store.update_with(Table::Offers, 1, |_| Ok(None)).unwrap();
        assert_eq!(unchanged, offer);

        let accepted: Offer = store
            .update_with(Table::Offers, 1, |current: &Offer| {
                let mut next = current.clone();
                next.status = OfferStatus::Accepted;
                Ok(Some(next))
            })
            .unwrap();
        assert_eq!(accepted.status, OfferStatus::Accepted);
        let stored: Offer = store.load(Table::Offers, 1).unwrap();
        assert_eq!(stored.status, OfferStatus::Accepted);
    }

    #[test]
    fn update_on_missing_record_is_not_found() {
        let store = temp_store();
        let err = store
            .update_with(Table::Orders, 42, |o: &crate::model::Order| Ok(Some(o.clone())))
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn claims_are_exclusive() {
        let store = temp_store();

        assert!(store.claim(Index::UserEmail, "a@b.np", 1).unwrap());
        assert!(store.claim(Index::UserEmail, "a@b.np", 1).unwrap());
        assert!(!store.claim(Index::UserEmail, "a@b.np", 2).unwrap());
        assert_eq!(store.lookup(Index::UserEmail, "a@b.np").unwrap(), Some(1));

        store.release(Index::UserEmail, "a@b.np").unwrap();
        assert!(store.claim(Index::UserEmail, "a@b.np", 2).unwrap());
    }
}
