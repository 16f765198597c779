use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::identity::Identity;
use crate::pagination::{Page, PageRequest};
use crate::policy::{Operation, Resource, ensure};
use crate::profile::{
    BusinessType, BuyerProfile, FarmerProfile, Profile, ProfileKind, TransporterProfile,
};
use crate::types::UserId;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuyerProfileFilter {
    pub business_type: Option<BusinessType>,
    pub verified: Option<bool>,
}

impl BuyerProfileFilter {
    fn admits(&self, profile: &BuyerProfile) -> bool {
        self.business_type.is_none_or(|t| profile.business_type == t)
            && self.verified.is_none_or(|v| profile.verified == v)
    }
}

fn profile(kind: ProfileKind, user_id: UserId) -> Resource<'static> {
    Resource::Profile { kind, user_id }
}

impl MarketService {
    /// Opens the profile for `profile.user_id()`. The user must exist and hold
    /// the matching role; a second profile of the same kind is a conflict.
    pub fn create_profile<P: Profile>(
        &self,
        identity: &Identity,
        profile_data: P,
    ) -> MarketResult<P> {
        let user_id = profile_data.user_id();
        ensure(identity, Operation::Create, profile(P::KIND, user_id))?;
        self.require_party(user_id, P::KIND.role(), "user_id")?;
        profile_data.validate()?;

        if self.store.contains(P::KIND.table(), user_id)? {
            return Err(MarketError::Conflict(format!(
                "user {user_id} already has a {}",
                P::KIND.resource()
            )));
        }

        let unique = profile_data.unique_key();
        if let Some((index, value)) = &unique {
            if !self.store.claim(*index, value, user_id)? {
                return Err(MarketError::Conflict(format!(
                    "{} {value} is already registered",
                    P::KIND.resource()
                )));
            }
        }
        if let Err(err) = self.store.insert_new(P::KIND.table(), user_id, &profile_data) {
            if let Some((index, value)) = &unique {
                self.store.release(*index, value)?;
            }
            return Err(err);
        }

        info!(user_id, kind = %P::KIND.resource(), "profile created");
        Ok(profile_data)
    }

    pub fn get_profile<P: Profile>(&self, identity: &Identity, user_id: UserId) -> MarketResult<P> {
        ensure(identity, Operation::Read, profile(P::KIND, user_id))?;
        self.store.load(P::KIND.table(), user_id)
    }

    pub fn list_profiles<P: Profile>(
        &self,
        identity: &Identity,
        page: PageRequest,
    ) -> MarketResult<Page<P>> {
        ensure(identity, Operation::List, Resource::Collection(P::KIND.resource()))?;
        let profiles = self.store.scan::<P>(P::KIND.table())?;
        Ok(Page::slice(profiles, page, &self.config.pagination))
    }

    pub fn list_buyer_profiles(
        &self,
        identity: &Identity,
        filter: BuyerProfileFilter,
        page: PageRequest,
    ) -> MarketResult<Page<BuyerProfile>> {
        ensure(identity, Operation::List, Resource::Collection(ProfileKind::Buyer.resource()))?;
        let profiles = self
            .store
            .scan::<BuyerProfile>(ProfileKind::Buyer.table())?
            .into_iter()
            .filter(|p| filter.admits(p))
            .collect();
        Ok(Page::slice(profiles, page, &self.config.pagination))
    }

    /// Applies `edit` to the stored profile. The owning user id cannot change
    /// and required fields are re-validated before the write.
    pub fn update_profile<P, F>(
        &self,
        identity: &Identity,
        user_id: UserId,
        edit: F,
    ) -> MarketResult<P>
    where
        P: Profile,
        F: Fn(&mut P) -> MarketResult<()>,
    {
        ensure(identity, Operation::Update, profile(P::KIND, user_id))?;
        let mut previous_key = None;

        let updated = self.store.update_with(P::KIND.table(), user_id, |current: &P| {
            let mut next = current.clone();
            edit(&mut next)?;
            next.set_user_id(user_id);
            next.validate()?;

            if let Some((index, value)) = next.unique_key() {
                if !self.store.claim(index, &value, user_id)? {
                    return Err(MarketError::Conflict(format!(
                        "{} {value} is already registered",
                        P::KIND.resource()
                    )));
                }
            }
            previous_key = current.unique_key();
            next.touch();
            Ok(Some(next))
        })?;

        if let Some((index, value)) = previous_key {
            let kept = updated.unique_key().is_some_and(|(_, now)| now == value);
            if !kept {
                self.store.release(index, &value)?;
            }
        }

        info!(user_id, kind = %P::KIND.resource(), by = identity.user_id, "profile updated");
        Ok(updated)
    }

    pub fn verify_buyer_profile(
        &self,
        identity: &Identity,
        user_id: UserId,
    ) -> MarketResult<BuyerProfile> {
        ensure(identity, Operation::Moderate, profile(ProfileKind::Buyer, user_id))?;

        let updated = self
            .store
            .update_with(ProfileKind::Buyer.table(), user_id, |current: &BuyerProfile| {
                if current.verified {
                    return Ok(None);
                }
                let mut next = current.clone();
                next.verified = true;
                next.touch();
                Ok(Some(next))
            })?;

        info!(user_id, by = identity.user_id, "buyer profile verified");
        Ok(updated)
    }

    pub fn delete_profile<P: Profile>(
        &self,
        identity: &Identity,
        user_id: UserId,
    ) -> MarketResult<P> {
        ensure(identity, Operation::Delete, profile(P::KIND, user_id))?;

        let removed = self
            .drop_profile::<P>(user_id)?
            .ok_or_else(|| MarketError::not_found(P::KIND.resource(), user_id))?;
        info!(
            user_id,
            kind = %P::KIND.resource(),
            by = identity.user_id,
            "profile deleted"
        );
        Ok(removed)
    }

    /// Removes a profile along with its unique key, without any policy check.
    /// Used when the owning account goes away.
    pub(super) fn drop_profile_of(&self, kind: ProfileKind, user_id: UserId) -> MarketResult<()> {
        let dropped = match kind {
            ProfileKind::Farmer => self.drop_profile::<FarmerProfile>(user_id)?.is_some(),
            ProfileKind::Buyer => self.drop_profile::<BuyerProfile>(user_id)?.is_some(),
            ProfileKind::Transporter => self.drop_profile::<TransporterProfile>(user_id)?.is_some(),
        };
        if dropped {
            info!(user_id, kind = %kind.resource(), "profile removed with its account");
        }
        Ok(())
    }

    fn drop_profile<P: Profile>(&self, user_id: UserId) -> MarketResult<Option<P>> {
        let removed: Option<P> = self.store.remove(P::KIND.table(), user_id)?;
        if let Some((index, value)) = removed.as_ref().and_then(|p| p.unique_key()) {
            self.store.release(index, &value)?;
        }
        Ok(removed)
    }
}
