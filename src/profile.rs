//! Role profiles. Each is keyed by the owning user's id, so a user has at most
//! one profile of each kind.
use crate::error::{MarketError, MarketResult};
use crate::identity::Role;
use crate::store::{Index, Table};
use crate::types::{ResourceKind, TimeStamp, UserId};
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Farmer,
    Buyer,
    Transporter,
}

impl ProfileKind {
    /// Role an identity must hold to open this kind of profile for itself.
    pub fn role(&self) -> Role {
        match self {
            ProfileKind::Farmer => Role::Farmer,
            ProfileKind::Buyer => Role::Buyer,
            ProfileKind::Transporter => Role::Transporter,
        }
    }
    pub fn resource(&self) -> ResourceKind {
        match self {
            ProfileKind::Farmer => ResourceKind::FarmerProfile,
            ProfileKind::Buyer => ResourceKind::BuyerProfile,
            ProfileKind::Transporter => ResourceKind::TransporterProfile,
        }
    }
    pub fn table(&self) -> Table {
        match self {
            ProfileKind::Farmer => Table::FarmerProfiles,
            ProfileKind::Buyer => Table::BuyerProfiles,
            ProfileKind::Transporter => Table::TransporterProfiles,
        }
    }
}

/// Common surface the profile handlers work through.
pub trait Profile:
    minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> + Clone + std::fmt::Debug
{
    const KIND: ProfileKind;

    fn user_id(&self) -> UserId;
    fn set_user_id(&mut self, user_id: UserId);
    fn touch(&mut self);

    /// Required fields must stay filled after an edit.
    fn validate(&self) -> MarketResult<()> {
        Ok(())
    }

    /// Secondary key that must be unique across profiles of this kind.
    fn unique_key(&self) -> Option<(Index, String)> {
        None
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct FarmerProfile {
    #[n(0)]
    pub user_id: UserId,
    #[n(1)]
    pub farmer_name: String,
    #[n(2)]
    pub farm_name: String,
    #[n(3)]
    pub farm_size: Option<f64>, // ropani or bigha
    #[n(4)]
    pub farm_location: Option<String>,
    #[n(5)]
    pub certifications: Option<String>, // organic, GAP
    #[n(6)]
    pub updated_at: TimeStamp<Utc>,
}

impl Profile for FarmerProfile {
    const KIND: ProfileKind = ProfileKind::Farmer;

    fn user_id(&self) -> UserId {
        self.user_id
    }
    fn set_user_id(&mut self, user_id: UserId) {
        self.user_id = user_id;
    }
    fn touch(&mut self) {
        self.updated_at = TimeStamp::new();
    }
    fn validate(&self) -> MarketResult<()> {
        non_empty(&self.farmer_name, "farmer_name")?;
        non_empty(&self.farm_name, "farm_name")?;
        Ok(())
    }
}

impl FarmerProfile {
    pub fn new(user_id: UserId, farmer_name: &str, farm_name: &str) -> MarketResult<Self> {
        Ok(Self {
            user_id,
            farmer_name: non_empty(farmer_name, "farmer_name")?,
            farm_name: non_empty(farm_name, "farm_name")?,
            farm_size: None,
            farm_location: None,
            certifications: None,
            updated_at: TimeStamp::new(),
        })
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusinessType {
    #[n(0)]
    Wholesaler,
    #[n(1)]
    Restaurant,
    #[default]
    #[n(2)]
    Retailer,
    #[n(3)]
    Hotel,
    #[n(4)]
    Processor,
    #[n(5)]
    Other,
}

impl BusinessType {
    pub fn parse(value: &str) -> MarketResult<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "WHOLESALER" => Ok(Self::Wholesaler),
            "RESTAURANT" => Ok(Self::Restaurant),
            "RETAILER" => Ok(Self::Retailer),
            "HOTEL" => Ok(Self::Hotel),
            "PROCESSOR" => Ok(Self::Processor),
            "OTHER" => Ok(Self::Other),
            _ => Err(MarketError::validation(format!("business_type {value:?}"))),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuyerCategory {
    #[default]
    #[n(0)]
    Small,
    #[n(1)]
    Medium,
    #[n(2)]
    Large,
    #[n(3)]
    Institutional,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct BuyerProfile {
    #[n(0)]
    pub user_id: UserId,
    #[n(1)]
    pub business_name: String,
    #[n(2)]
    pub business_type: BusinessType,
    #[n(3)]
    pub pan_number: Option<String>, // unique when present
    #[n(4)]
    pub vat_number: Option<String>,
    #[n(5)]
    pub business_reg_no: Option<String>,
    #[n(6)]
    pub contact_person: Option<String>,
    #[n(7)]
    pub contact_phone: String,
    #[n(8)]
    pub business_address: Option<String>,
    #[n(9)]
    pub district: String,
    #[n(10)]
    pub municipality: Option<String>,
    #[n(11)]
    pub ward_number: Option<u32>,
    #[n(12)]
    pub verified: bool,
    #[n(13)]
    pub buyer_category: BuyerCategory,
    #[n(14)]
    pub profile_photo: Option<String>,
    #[n(15)]
    pub updated_at: TimeStamp<Utc>,
}

impl Profile for BuyerProfile {
    const KIND: ProfileKind = ProfileKind::Buyer;

    fn user_id(&self) -> UserId {
        self.user_id
    }
    fn set_user_id(&mut self, user_id: UserId) {
        self.user_id = user_id;
    }
    fn touch(&mut self) {
        self.updated_at = TimeStamp::new();
    }
    fn validate(&self) -> MarketResult<()> {
        non_empty(&self.business_name, "business_name")?;
        non_empty(&self.contact_phone, "contact_phone")?;
        non_empty(&self.district, "district")?;
        if self.pan_key().is_some_and(|pan| pan.len() > 15) {
            return Err(MarketError::validation("pan_number longer than 15"));
        }
        Ok(())
    }
    fn unique_key(&self) -> Option<(Index, String)> {
        self.pan_key().map(|pan| (Index::BuyerPan, pan))
    }
}

impl BuyerProfile {
    /// Business name, contact phone and district are mandatory.
    pub fn new(
        user_id: UserId,
        business_name: &str,
        contact_phone: &str,
        district: &str,
    ) -> MarketResult<Self> {
        Ok(Self {
            user_id,
            business_name: non_empty(business_name, "business_name")?,
            business_type: BusinessType::default(),
            pan_number: None,
            vat_number: None,
            business_reg_no: None,
            contact_person: None,
            contact_phone: non_empty(contact_phone, "contact_phone")?,
            business_address: None,
            district: non_empty(district, "district")?,
            municipality: None,
            ward_number: None,
            verified: false,
            buyer_category: BuyerCategory::default(),
            profile_photo: None,
            updated_at: TimeStamp::new(),
        })
    }

    pub fn pan_key(&self) -> Option<String> {
        self.pan_number
            .as_ref()
            .map(|pan| pan.trim().to_ascii_uppercase())
            .filter(|pan| !pan.is_empty())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct TransporterProfile {
    #[n(0)]
    pub user_id: UserId,
    #[n(1)]
    pub vehicle_type: String,
    #[n(2)]
    pub license_no: String,
    #[n(3)]
    pub capacity: f64, // kg
    #[n(4)]
    pub updated_at: TimeStamp<Utc>,
}

impl Profile for TransporterProfile {
    const KIND: ProfileKind = ProfileKind::Transporter;

    fn user_id(&self) -> UserId {
        self.user_id
    }
    fn set_user_id(&mut self, user_id: UserId) {
        self.user_id = user_id;
    }
    fn touch(&mut self) {
        self.updated_at = TimeStamp::new();
    }
    fn validate(&self) -> MarketResult<()> {
        non_empty(&self.vehicle_type, "vehicle_type")?;
        non_empty(&self.license_no, "license_no")?;
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(MarketError::validation("capacity must be greater than zero"));
        }
        Ok(())
    }
}

impl TransporterProfile {
    pub fn new(
        user_id: UserId,
        vehicle_type: &str,
        license_no: &str,
        capacity: f64,
    ) -> MarketResult<Self> {
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(MarketError::validation("capacity must be greater than zero"));
        }
        Ok(Self {
            user_id,
            vehicle_type: non_empty(vehicle_type, "vehicle_type")?,
            license_no: non_empty(license_no, "license_no")?,
            capacity,
            updated_at: TimeStamp::new(),
        })
    }
}

fn non_empty(value: &str, field: &str) -> MarketResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MarketError::validation(field));
    }
    Ok(value.to_string())
}
