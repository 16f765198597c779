//! Marketplace records and the drafts they are built from
use crate::error::{MarketError, MarketResult};
use crate::identity::Role;
use crate::transition::{Lifecycle, Stateful};
use crate::types::{OfferId, OrderId, ProductId, RecordId, ResourceKind, TimeStamp, UserId};
use chrono::Utc;
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
}

impl Lifecycle for OfferStatus {
    const KIND: ResourceKind = ResourceKind::Offer;
    const STATES: &'static [Self] = &[
        OfferStatus::Pending,
        OfferStatus::Accepted,
        OfferStatus::Rejected,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "PENDING",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Rejected => "REJECTED",
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            OfferStatus::Pending => &[OfferStatus::Accepted, OfferStatus::Rejected],
            OfferStatus::Accepted | OfferStatus::Rejected => &[],
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    #[n(0)]
    Processing,
    #[n(1)]
    Completed,
    #[n(2)]
    Canceled,
}

impl Lifecycle for OrderStatus {
    const KIND: ResourceKind = ResourceKind::Order;
    const STATES: &'static [Self] = &[
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Canceled,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            OrderStatus::Processing => &[OrderStatus::Completed, OrderStatus::Canceled],
            OrderStatus::Completed | OrderStatus::Canceled => &[],
        }
    }
}

// Product availability is a flag, not a workflow: any value may follow any other.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductStatus {
    #[n(0)]
    Available,
    #[n(1)]
    Pending,
    #[n(2)]
    Sold,
    #[n(3)]
    Inactive,
}

impl ProductStatus {
    pub const ALL: [ProductStatus; 4] = [
        ProductStatus::Available,
        ProductStatus::Pending,
        ProductStatus::Sold,
        ProductStatus::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Available => "available",
            ProductStatus::Pending => "pending",
            ProductStatus::Sold => "sold",
            ProductStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> MarketResult<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == value)
            .ok_or_else(|| MarketError::InvalidStatus {
                kind: ResourceKind::Product,
                value: value.to_string(),
            })
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(OfferStatus, OrderStatus, ProductStatus);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct User {
    #[n(0)]
    pub id: UserId,
    #[n(1)]
    pub full_name: String,
    #[n(2)]
    pub email: String, // unique, stored lowercase
    #[n(3)]
    pub phone: String,
    #[n(4)]
    pub role: Role,
    #[n(5)]
    pub language: String, // "en" or "ne"
    #[n(6)]
    pub address: Option<String>,
    #[n(7)]
    pub district: Option<String>,
    #[n(8)]
    pub province: Option<String>,
    #[n(9)]
    pub profile_picture: Option<String>,
    #[n(10)]
    pub verified: bool,
    #[n(11)]
    pub created_at: TimeStamp<Utc>,
    #[n(12)]
    pub updated_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Product {
    #[n(0)]
    pub id: ProductId,
    #[n(1)]
    pub owner: UserId, // the farmer selling it
    #[n(2)]
    pub name_en: String,
    #[n(3)]
    pub name_np: Option<String>,
    #[n(4)]
    pub description_en: Option<String>,
    #[n(5)]
    pub description_np: Option<String>,
    #[n(6)]
    pub category: String, // vegetables, fruits, dairy..
    #[n(7)]
    pub quantity: f64,
    #[n(8)]
    pub unit: String, // kg, litre..
    #[n(9)]
    pub price_per_unit: f64,
    #[n(10)]
    pub available_from: Option<String>,
    #[n(11)]
    pub available_to: Option<String>,
    #[n(12)]
    pub status: ProductStatus,
    #[n(13)]
    pub image_url: Option<String>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub updated_at: TimeStamp<Utc>,
}

impl Product {
    /// Case-insensitive substring match over both languages' names and descriptions.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [
            Some(&self.name_en),
            self.name_np.as_ref(),
            self.description_en.as_ref(),
            self.description_np.as_ref(),
        ]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(&needle))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Offer {
    #[n(0)]
    pub id: OfferId,
    #[n(1)]
    pub buyer_id: UserId,
    #[n(2)]
    pub product_id: ProductId,
    #[n(3)]
    pub quantity: f64,
    #[n(4)]
    pub price: f64,
    #[n(5)]
    pub pickup_date: Option<String>,
    #[n(6)]
    pub status: OfferStatus,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
    #[n(8)]
    pub updated_at: TimeStamp<Utc>,
}

impl Stateful for Offer {
    type Status = OfferStatus;

    fn status(&self) -> OfferStatus {
        self.status
    }
    fn set_status(&mut self, status: OfferStatus) {
        self.status = status;
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Order {
    #[n(0)]
    pub id: OrderId,
    #[n(1)]
    pub offer_id: Option<OfferId>,
    #[n(2)]
    pub buyer_id: UserId,
    #[n(3)]
    pub farmer_id: UserId,
    #[n(4)]
    pub product_id: ProductId,
    #[n(5)]
    pub order_date: Option<String>,
    #[n(6)]
    pub status: OrderStatus,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
    #[n(8)]
    pub updated_at: TimeStamp<Utc>,
}

impl Stateful for Order {
    type Status = OrderStatus;

    fn status(&self) -> OrderStatus {
        self.status
    }
    fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
    }
}

fn required(value: Option<String>, field: &str) -> MarketResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(MarketError::validation(field)),
    }
}

fn positive(value: Option<f64>, field: &str) -> MarketResult<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(MarketError::validation(format!("{field} must be greater than zero"))),
    }
}

// used for constructing users at registration
#[derive(Debug, Default, Clone)]
pub struct UserDraft {
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    role: Option<Role>,
    language: Option<String>,
    address: Option<String>,
    district: Option<String>,
    province: Option<String>,
}

impl UserDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_full_name(mut self, name: &str) -> Self {
        self.full_name = Some(name.to_string());
        self
    }
    pub fn set_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
    pub fn set_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }
    pub fn set_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
    pub fn set_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }
    pub fn set_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }
    pub fn set_district(mut self, district: &str) -> Self {
        self.district = Some(district.to_string());
        self
    }
    pub fn set_province(mut self, province: &str) -> Self {
        self.province = Some(province.to_string());
        self
    }

    pub fn role(&self) -> Role {
        self.role.unwrap_or(Role::Buyer)
    }

    /// Email in canonical (trimmed, lowercase) form, used as the uniqueness key.
    pub fn email_key(&self) -> MarketResult<String> {
        let email = required(self.email.clone(), "email")?.to_lowercase();
        if !email.contains('@') {
            return Err(MarketError::validation(format!("email {email:?} is malformed")));
        }
        Ok(email)
    }

    /// Checks required fields and produces the stored record. Role defaults to buyer.
    pub fn validate_and_finalise(self, id: UserId) -> MarketResult<User> {
        let email = self.email_key()?;
        let role = self.role();
        let now = TimeStamp::new();

        Ok(User {
            id,
            full_name: required(self.full_name, "full_name")?,
            email,
            phone: required(self.phone, "phone")?,
            role,
            language: self.language.unwrap_or_else(|| "en".to_string()),
            address: self.address,
            district: self.district,
            province: self.province,
            profile_picture: None,
            verified: false,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

/// Profile edits a user may make to their own account. Role and email are not here.
#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub language: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub province: Option<String>,
    pub profile_picture: Option<String>,
}

impl UserUpdate {
    pub fn apply(&self, user: &mut User) -> MarketResult<()> {
        if let Some(name) = &self.full_name {
            user.full_name = required(Some(name.clone()), "full_name")?;
        }
        if let Some(phone) = &self.phone {
            user.phone = required(Some(phone.clone()), "phone")?;
        }
        if let Some(language) = &self.language {
            user.language = language.clone();
        }
        if self.address.is_some() {
            user.address = self.address.clone();
        }
        if self.district.is_some() {
            user.district = self.district.clone();
        }
        if self.province.is_some() {
            user.province = self.province.clone();
        }
        if self.profile_picture.is_some() {
            user.profile_picture = self.profile_picture.clone();
        }
        user.updated_at = TimeStamp::new();
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProductDraft {
    name_en: Option<String>,
    name_np: Option<String>,
    description_en: Option<String>,
    description_np: Option<String>,
    category: Option<String>,
    quantity: Option<f64>,
    unit: Option<String>,
    price_per_unit: Option<f64>,
    available_from: Option<String>,
    available_to: Option<String>,
}

impl ProductDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name(mut self, en: &str, np: Option<&str>) -> Self {
        self.name_en = Some(en.to_string());
        self.name_np = np.map(str::to_string);
        self
    }
    pub fn set_description(mut self, en: &str, np: Option<&str>) -> Self {
        self.description_en = Some(en.to_string());
        self.description_np = np.map(str::to_string);
        self
    }
    pub fn set_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
    pub fn set_quantity(mut self, quantity: f64, unit: &str) -> Self {
        self.quantity = Some(quantity);
        self.unit = Some(unit.to_string());
        self
    }
    pub fn set_price_per_unit(mut self, price: f64) -> Self {
        self.price_per_unit = Some(price);
        self
    }
    pub fn set_availability(mut self, from: &str, to: &str) -> Self {
        self.available_from = Some(from.to_string());
        self.available_to = Some(to.to_string());
        self
    }

    pub fn validate_and_finalise(
        self,
        id: ProductId,
        owner: UserId,
        image_url: Option<String>,
    ) -> MarketResult<Product> {
        let now = TimeStamp::new();

        Ok(Product {
            id,
            owner,
            name_en: required(self.name_en, "name_en")?,
            name_np: self.name_np,
            description_en: self.description_en,
            description_np: self.description_np,
            category: required(self.category, "category")?,
            quantity: positive(self.quantity, "quantity")?,
            unit: required(self.unit, "unit")?,
            price_per_unit: positive(self.price_per_unit, "price_per_unit")?,
            available_from: self.available_from,
            available_to: self.available_to,
            status: ProductStatus::Available,
            image_url,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

/// Editable product fields. The owner is fixed at creation.
#[derive(Debug, Default, Clone)]
pub struct ProductUpdate {
    pub name_en: Option<String>,
    pub name_np: Option<String>,
    pub description_en: Option<String>,
    pub description_np: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub price_per_unit: Option<f64>,
    pub available_from: Option<String>,
    pub available_to: Option<String>,
}

impl ProductUpdate {
    pub fn apply(&self, product: &mut Product) -> MarketResult<()> {
        if let Some(name) = &self.name_en {
            product.name_en = required(Some(name.clone()), "name_en")?;
        }
        if let Some(category) = &self.category {
            product.category = required(Some(category.clone()), "category")?;
        }
        if let Some(unit) = &self.unit {
            product.unit = required(Some(unit.clone()), "unit")?;
        }
        if self.quantity.is_some() {
            product.quantity = positive(self.quantity, "quantity")?;
        }
        if self.price_per_unit.is_some() {
            product.price_per_unit = positive(self.price_per_unit, "price_per_unit")?;
        }
        if self.name_np.is_some() {
            product.name_np = self.name_np.clone();
        }
        if self.description_en.is_some() {
            product.description_en = self.description_en.clone();
        }
        if self.description_np.is_some() {
            product.description_np = self.description_np.clone();
        }
        if self.available_from.is_some() {
            product.available_from = self.available_from.clone();
        }
        if self.available_to.is_some() {
            product.available_to = self.available_to.clone();
        }
        product.updated_at = TimeStamp::new();
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct OfferDraft {
    product_id: Option<ProductId>,
    quantity: Option<f64>,
    price: Option<f64>,
    pickup_date: Option<String>,
}

impl OfferDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }
    pub fn set_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }
    pub fn set_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
    pub fn set_pickup_date(mut self, date: &str) -> Self {
        self.pickup_date = Some(date.to_string());
        self
    }
    pub fn product_id(&self) -> MarketResult<ProductId> {
        self.product_id
            .filter(|id| *id != 0)
            .ok_or_else(|| MarketError::validation("product_id"))
    }

    /// The buyer comes from the identity, never from the payload.
    pub fn validate_and_finalise(self, id: OfferId, buyer_id: UserId) -> MarketResult<Offer> {
        let now = TimeStamp::new();

        Ok(Offer {
            id,
            buyer_id,
            product_id: self.product_id()?,
            quantity: positive(self.quantity, "quantity")?,
            price: positive(self.price, "price")?,
            pickup_date: self.pickup_date,
            status: OfferStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct OfferUpdate {
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub pickup_date: Option<String>,
}

impl OfferUpdate {
    pub fn apply(&self, offer: &mut Offer) -> MarketResult<()> {
        if self.quantity.is_some() {
            offer.quantity = positive(self.quantity, "quantity")?;
        }
        if self.price.is_some() {
            offer.price = positive(self.price, "price")?;
        }
        if self.pickup_date.is_some() {
            offer.pickup_date = self.pickup_date.clone();
        }
        offer.updated_at = TimeStamp::new();
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct OrderDraft {
    offer_id: Option<OfferId>,
    buyer_id: Option<UserId>,
    farmer_id: Option<UserId>,
    product_id: Option<ProductId>,
    order_date: Option<String>,
}

impl OrderDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_offer(mut self, offer_id: OfferId) -> Self {
        self.offer_id = Some(offer_id);
        self
    }
    pub fn set_buyer(mut self, buyer_id: UserId) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }
    pub fn set_farmer(mut self, farmer_id: UserId) -> Self {
        self.farmer_id = Some(farmer_id);
        self
    }
    pub fn set_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }
    pub fn set_order_date(mut self, date: &str) -> Self {
        self.order_date = Some(date.to_string());
        self
    }

    pub fn validate_and_finalise(self, id: OrderId) -> MarketResult<Order> {
        let present = |value: Option<RecordId>, field: &str| {
            value
                .filter(|id| *id != 0)
                .ok_or_else(|| MarketError::validation(field))
        };
        let now = TimeStamp::new();

        Ok(Order {
            id,
            offer_id: self.offer_id.filter(|id| *id != 0),
            buyer_id: present(self.buyer_id, "buyer_id")?,
            farmer_id: present(self.farmer_id, "farmer_id")?,
            product_id: present(self.product_id, "product_id")?,
            order_date: self.order_date,
            status: OrderStatus::Processing,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

/// Parties, product and offer link are fixed at creation; only scheduling data moves.
#[derive(Debug, Default, Clone)]
pub struct OrderUpdate {
    pub order_date: Option<String>,
}

impl OrderUpdate {
    pub fn apply(&self, order: &mut Order) {
        if self.order_date.is_some() {
            order.order_date = self.order_date.clone();
        }
        order.updated_at = TimeStamp::new();
    }
}

#[cfg(test)]
impl Offer {
    pub(crate) fn sample(id: OfferId, buyer_id: UserId, product_id: ProductId) -> Self {
        OfferDraft::new()
            .set_product(product_id)
            .set_quantity(10.0)
            .set_price(120.0)
            .validate_and_finalise(id, buyer_id)
            .unwrap()
    }
}

#[cfg(test)]
impl Order {
    pub(crate) fn sample(
        id: OrderId,
        buyer_id: UserId,
        farmer_id: UserId,
        product_id: ProductId,
    ) -> Self {
        OrderDraft::new()
            .set_buyer(buyer_id)
            .set_farmer(farmer_id)
            .set_product(product_id)
            .validate_and_finalise(id)
            .unwrap()
    }
}

#[cfg(test)]
impl Product {
    pub(crate) fn sample(id: ProductId, owner: UserId) -> Self {
        ProductDraft::new()
            .set_name("Tomato", Some("गोलभेडा"))
            .set_category("vegetables")
            .set_quantity(50.0, "kg")
            .set_price_per_unit(80.0)
            .validate_and_finalise(id, owner, None)
            .unwrap()
    }
}
