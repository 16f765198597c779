//! Smoke screen tests for the marketplace components
//!
//! Happy-path checks that span the crate: configuration, accounts, profiles,
//! products and image uploads, each against a throwaway store.

use agro_market::config::MarketConfig;
use agro_market::model::{ProductDraft, ProductUpdate, UserDraft, UserUpdate};
use agro_market::pagination::PageRequest;
use agro_market::profile::{BusinessType, BuyerProfile, FarmerProfile, TransporterProfile};
use agro_market::service::BuyerProfileFilter;
use agro_market::upload::ImageUpload;
use agro_market::{Identity, MarketError, MarketService, Role};

fn service() -> MarketService {
    MarketService::open(MarketConfig::ephemeral()).unwrap()
}

fn png(name: &str) -> ImageUpload {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    ImageUpload::new(name, bytes)
}

fn user(service: &MarketService, email: &str, role: Role) -> u64 {
    service
        .register_user(
            UserDraft::new()
                .set_full_name("Test User")
                .set_email(email)
                .set_phone("9811111111")
                .set_role(role),
        )
        .unwrap()
        .id
}

// CONFIG TESTS
mod config_tests {
    use super::*;

    /// A partial file keeps the defaults of every section it leaves out
    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MarketConfig::from_toml("[pagination]\nmax_page_size = 50\n").unwrap();
        assert_eq!(config.pagination.max_page_size, 50);
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.uploads.max_bytes, 2 * 1024 * 1024);
    }

    /// Config files are read from disk with the same rules as inline TOML
    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.toml");
        std::fs::write(&path, "[uploads]\ndir = \"media\"\n\n[log]\nfilter = \"debug\"\n").unwrap();

        let config = MarketConfig::from_file(&path).unwrap();
        assert_eq!(config.uploads.dir, "media");
        assert_eq!(config.log.filter, "debug");
        assert!(MarketConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}

// USER TESTS
mod user_tests {
    use super::*;

    /// Emails are unique regardless of case
    #[test]
    fn duplicate_email_is_a_conflict() {
        let service = service();
        user(&service, "hari@krishi.np", Role::Farmer);

        let err = service
            .register_user(
                UserDraft::new()
                    .set_full_name("Hari Again")
                    .set_email(" HARI@krishi.np ")
                    .set_phone("9822222222"),
            )
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }

    /// Self sign-up cannot mint administrators; admins can
    #[test]
    fn admins_are_created_by_admins() {
        let service = service();
        let draft = UserDraft::new()
            .set_full_name("Root")
            .set_email("root@krishi.np")
            .set_phone("9800000001")
            .set_role(Role::Admin);

        let err = service.register_user(draft.clone()).unwrap_err();
        assert_eq!(err.status_code(), 403);
        let admin = service.create_user(&Identity::admin(1), draft).unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    /// Users edit themselves; role changes are admin-only
    #[test]
    fn self_edit_and_role_change() {
        let service = service();
        let id = user(&service, "gita@krishi.np", Role::Buyer);
        let me = Identity::buyer(id);

        let update = UserUpdate {
            district: Some("Kaski".into()),
            ..UserUpdate::default()
        };
        let updated = service.update_user(&me, id, update).unwrap();
        assert_eq!(updated.district.as_deref(), Some("Kaski"));

        assert!(service.change_role(&me, id, Role::Farmer).is_err());
        let promoted = service.change_role(&Identity::admin(1), id, Role::Farmer).unwrap();
        assert_eq!(promoted.role, Role::Farmer);

        assert!(service.list_users(&me, PageRequest::default()).is_err());
        let page = service.list_users(&Identity::admin(1), PageRequest::default()).unwrap();
        assert_eq!(page.total, 1);
    }

    /// Deleting an account frees its email and removes its profiles
    #[test]
    fn delete_releases_email_and_profiles() {
        let service = service();
        let id = user(&service, "sita@krishi.np", Role::Buyer);
        let me = Identity::buyer(id);

        let mut profile = BuyerProfile::new(id, "Sita Traders", "061-555", "Kaski").unwrap();
        profile.pan_number = Some("123456789".into());
        service.create_profile(&me, profile).unwrap();

        service.delete_user(&me, id).unwrap();
        assert!(
            service
                .get_profile::<BuyerProfile>(&Identity::admin(1), id)
                .is_err()
        );

        let again = user(&service, "sita@krishi.np", Role::Buyer);
        let mut profile = BuyerProfile::new(again, "Sita Traders", "061-555", "Kaski").unwrap();
        profile.pan_number = Some("123456789".into());
        assert!(service.create_profile(&Identity::buyer(again), profile).is_ok());
    }
}

// PROFILE TESTS
mod profile_tests {
    use super::*;

    /// One profile per user and kind; the role has to match
    #[test]
    fn farmer_profile_is_opened_once() {
        let service = service();
        let id = user(&service, "ram@krishi.np", Role::Farmer);
        let me = Identity::farmer(id);

        let profile = FarmerProfile::new(id, "Ram", "Thapa Farm").unwrap();
        service.create_profile(&me, profile.clone()).unwrap();
        let err = service.create_profile(&me, profile).unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));

        let transporter = TransporterProfile::new(id, "truck", "BA-2-KHA", 3_000.0).unwrap();
        let err = service.create_profile(&me, transporter).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    /// PAN numbers are unique across buyer profiles and move with edits
    #[test]
    fn pan_numbers_are_unique() {
        let service = service();
        let a = user(&service, "a@krishi.np", Role::Buyer);
        let b = user(&service, "b@krishi.np", Role::Buyer);

        let mut first = BuyerProfile::new(a, "A Mart", "01-1", "Kathmandu").unwrap();
        first.pan_number = Some("pan-1".into());
        service.create_profile(&Identity::buyer(a), first).unwrap();

        let mut second = BuyerProfile::new(b, "B Mart", "01-2", "Kathmandu").unwrap();
        second.pan_number = Some(" PAN-1 ".into());
        let err = service.create_profile(&Identity::buyer(b), second.clone()).unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));

        // A gives up the number, then B can take it
        service
            .update_profile(&Identity::buyer(a), a, |p: &mut BuyerProfile| {
                p.pan_number = Some("PAN-2".into());
                Ok(())
            })
            .unwrap();
        service.create_profile(&Identity::buyer(b), second).unwrap();

        // edits cannot blank a required field
        let err = service
            .update_profile(&Identity::buyer(a), a, |p: &mut BuyerProfile| {
                p.district = String::new();
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    /// Verification is an admin action and shows up in filtered listings
    #[test]
    fn buyer_verification_and_filters() {
        let service = service();
        let a = user(&service, "hotel@krishi.np", Role::Buyer);
        let b = user(&service, "shop@krishi.np", Role::Buyer);

        let mut hotel = BuyerProfile::new(a, "Lakeside Hotel", "061-9", "Kaski").unwrap();
        hotel.business_type = BusinessType::Hotel;
        service.create_profile(&Identity::buyer(a), hotel).unwrap();
        let shop = BuyerProfile::new(b, "Corner Shop", "061-8", "Kaski").unwrap();
        service.create_profile(&Identity::buyer(b), shop).unwrap();

        assert!(service.verify_buyer_profile(&Identity::buyer(a), a).is_err());
        assert!(service.verify_buyer_profile(&Identity::admin(1), a).unwrap().verified);

        let verified = BuyerProfileFilter {
            verified: Some(true),
            ..BuyerProfileFilter::default()
        };
        let page = service
            .list_buyer_profiles(&Identity::buyer(b), verified, PageRequest::default())
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].user_id, a);

        let retailers = BuyerProfileFilter {
            business_type: Some(BusinessType::Retailer),
            ..BuyerProfileFilter::default()
        };
        let page = service
            .list_buyer_profiles(&Identity::buyer(b), retailers, PageRequest::default())
            .unwrap();
        assert_eq!(page.items[0].user_id, b);
    }

    /// Profile directories are open to every signed-in role and paginate
    #[test]
    fn farmer_directory_pages() {
        let service = service();
        for i in 1..=3 {
            let id = user(&service, &format!("f{i}@krishi.np"), Role::Farmer);
            let profile = FarmerProfile::new(id, "Farmer", &format!("Farm {i}")).unwrap();
            service.create_profile(&Identity::farmer(id), profile).unwrap();
        }
        let buyer = Identity::buyer(user(&service, "reader@krishi.np", Role::Buyer));

        let page = service
            .list_profiles::<FarmerProfile>(&buyer, PageRequest::new(1, 2))
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);

        let transporters = service
            .list_profiles::<TransporterProfile>(&buyer, PageRequest::default())
            .unwrap();
        assert_eq!(transporters.total, 0);
    }
}

// PRODUCT TESTS
mod product_tests {
    use super::*;

    fn draft(name: &str) -> ProductDraft {
        ProductDraft::new()
            .set_name(name, None)
            .set_description("Fresh from Chitwan", None)
            .set_category("vegetables")
            .set_quantity(100.0, "kg")
            .set_price_per_unit(45.0)
    }

    /// Uploaded images get a generated name and the product links to it
    #[test]
    fn product_with_image() {
        let service = service();
        let farmer = Identity::farmer(user(&service, "f@krishi.np", Role::Farmer));

        let write = service
            .create_product(&farmer, draft("Cauliflower"), Some(png("cauli.png")))
            .unwrap();
        let image = write.image.unwrap();
        assert_eq!(write.product.image_url.as_deref(), Some(image.url.as_str()));

        let replaced = service
            .update_product(
                &farmer,
                write.product.id,
                ProductUpdate::default(),
                Some(png("new.png")),
            )
            .unwrap();
        assert_eq!(replaced.replaced_image_url, Some(image.url));

        let err = service
            .create_product(&farmer, draft("Bad"), Some(ImageUpload::new("x.exe", vec![1, 2, 3])))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    /// A stranger's edit is refused before the attached image is looked at
    #[test]
    fn non_owner_upload_is_forbidden() {
        let service = service();
        let owner = Identity::farmer(user(&service, "own@krishi.np", Role::Farmer));
        let other = Identity::farmer(user(&service, "oth@krishi.np", Role::Farmer));
        let product = service
            .create_product(&owner, draft("Garlic"), None)
            .unwrap()
            .product;

        let bad = ImageUpload::new("x.exe", vec![1, 2, 3]);
        let err = service
            .update_product(&other, product.id, ProductUpdate::default(), Some(bad))
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let bad = ImageUpload::new("x.exe", vec![1, 2, 3]);
        let err = service
            .update_product(&owner, product.id, ProductUpdate::default(), Some(bad))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    /// Only the owner edits; availability takes any listed value
    #[test]
    fn owner_controls_product() {
        let service = service();
        let owner = Identity::farmer(user(&service, "o@krishi.np", Role::Farmer));
        let other = Identity::farmer(user(&service, "x@krishi.np", Role::Farmer));
        let product = service
            .create_product(&owner, draft("Potato"), None)
            .unwrap()
            .product;

        assert!(service.update_product_status(&other, product.id, "sold").is_err());
        let sold = service.update_product_status(&owner, product.id, "sold").unwrap();
        assert_eq!(sold.status.as_str(), "sold");
        let back = service.update_product_status(&owner, product.id, "available").unwrap();
        assert_eq!(back.status.as_str(), "available");

        let err = service
            .update_product_status(&owner, product.id, "gone")
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidStatus { .. }));

        assert!(service.delete_product(&other, product.id).is_err());
        service.delete_product(&owner, product.id).unwrap();
        let err = service.get_product(&other, product.id).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    /// Search matches names and descriptions; listings paginate
    #[test]
    fn search_and_pages() {
        let service = service();
        let farmer = Identity::farmer(user(&service, "s@krishi.np", Role::Farmer));
        for name in ["Red Onion", "Green Chilli", "Onion Seeds"] {
            service.create_product(&farmer, draft(name), None).unwrap();
        }

        let hits = service
            .search_products(&farmer, "onion", PageRequest::default())
            .unwrap();
        assert_eq!(hits.total, 2);
        assert_eq!(
            service
                .search_products(&farmer, "chitwan", PageRequest::default())
                .unwrap()
                .total,
            3
        );
        assert!(matches!(
            service.search_products(&farmer, "  ", PageRequest::default()),
            Err(MarketError::Validation(_))
        ));

        let page = service.list_products(&farmer, PageRequest::new(2, 2)).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 3);
        let owned = service.list_products_by_owner(&farmer, farmer.user_id).unwrap();
        assert_eq!(owned.len(), 3);
    }
}
