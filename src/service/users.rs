use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::identity::{Identity, Role};
use crate::model::{User, UserDraft, UserUpdate};
use crate::pagination::{Page, PageRequest};
use crate::policy::{Operation, Resource, ensure};
use crate::profile::ProfileKind;
use crate::store::{Index, Table};
use crate::types::{ResourceKind, TimeStamp, UserId};
use tracing::info;

impl MarketService {
    /// Self-service sign-up. Admin accounts are only created by admins.
    pub fn register_user(&self, draft: UserDraft) -> MarketResult<User> {
        if draft.role() == Role::Admin {
            return Err(MarketError::forbidden(ResourceKind::User, "create"));
        }
        self.insert_user(draft)
    }

    pub fn create_user(&self, identity: &Identity, draft: UserDraft) -> MarketResult<User> {
        ensure(identity, Operation::Moderate, Resource::Collection(ResourceKind::User))?;
        self.insert_user(draft)
    }

    fn insert_user(&self, draft: UserDraft) -> MarketResult<User> {
        let id = self.store.next_id()?;
        let user = draft.validate_and_finalise(id)?;

        if !self.store.claim(Index::UserEmail, &user.email, id)? {
            return Err(MarketError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        if let Err(err) = self.store.insert_new(Table::Users, id, &user) {
            self.store.release(Index::UserEmail, &user.email)?;
            return Err(err);
        }

        info!(user_id = id, role = %user.role, "user registered");
        Ok(user)
    }

    pub fn get_user(&self, identity: &Identity, id: UserId) -> MarketResult<User> {
        ensure(identity, Operation::Read, Resource::Account(id))?;
        self.store.load(Table::Users, id)
    }

    /// Admins search every account. Anyone else only ever finds their own,
    /// so an unknown email and another user's email both give `None`.
    pub fn find_user_by_email(
        &self,
        identity: &Identity,
        email: &str,
    ) -> MarketResult<Option<User>> {
        let email = email.trim().to_lowercase();

        if !identity.is_admin() {
            let me: Option<User> = self.store.get(Table::Users, identity.user_id)?;
            return Ok(me.filter(|user| user.email == email));
        }
        let Some(id) = self.store.lookup(Index::UserEmail, &email)? else {
            return Ok(None);
        };
        self.store.get(Table::Users, id)
    }

    pub fn list_users(&self, identity: &Identity, page: PageRequest) -> MarketResult<Page<User>> {
        ensure(identity, Operation::List, Resource::Collection(ResourceKind::User))?;
        let users = self.store.scan::<User>(Table::Users)?;
        Ok(Page::slice(users, page, &self.config.pagination))
    }

    pub fn update_user(
        &self,
        identity: &Identity,
        id: UserId,
        update: UserUpdate,
    ) -> MarketResult<User> {
        ensure(identity, Operation::Update, Resource::Account(id))?;

        let user = self.store.update_with(Table::Users, id, |current: &User| {
            let mut next = current.clone();
            update.apply(&mut next)?;
            Ok(Some(next))
        })?;

        info!(user_id = id, by = identity.user_id, "user updated");
        Ok(user)
    }

    pub fn change_role(&self, identity: &Identity, id: UserId, role: Role) -> MarketResult<User> {
        ensure(identity, Operation::Moderate, Resource::Account(id))?;

        let user = self.store.update_with(Table::Users, id, |current: &User| {
            if current.role == role {
                return Ok(None);
            }
            let mut next = current.clone();
            next.role = role;
            next.updated_at = TimeStamp::new();
            Ok(Some(next))
        })?;

        info!(user_id = id, role = %user.role, by = identity.user_id, "user role changed");
        Ok(user)
    }

    pub fn verify_user(&self, identity: &Identity, id: UserId) -> MarketResult<User> {
        ensure(identity, Operation::Moderate, Resource::Account(id))?;

        self.store.update_with(Table::Users, id, |current: &User| {
            if current.verified {
                return Ok(None);
            }
            let mut next = current.clone();
            next.verified = true;
            next.updated_at = TimeStamp::new();
            Ok(Some(next))
        })
    }

    /// Removes the account, its email claim and any role profiles.
    pub fn delete_user(&self, identity: &Identity, id: UserId) -> MarketResult<User> {
        ensure(identity, Operation::Delete, Resource::Account(id))?;

        let user: User = self
            .store
            .remove(Table::Users, id)?
            .ok_or_else(|| MarketError::not_found(ResourceKind::User, id))?;
        self.store.release(Index::UserEmail, &user.email)?;

        for kind in [ProfileKind::Farmer, ProfileKind::Buyer, ProfileKind::Transporter] {
            self.drop_profile_of(kind, id)?;
        }

        info!(user_id = id, by = identity.user_id, "user deleted");
        Ok(user)
    }
}
