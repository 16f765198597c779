use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::identity::Identity;
use crate::model::{Product, ProductDraft, ProductStatus, ProductUpdate};
use crate::pagination::{Page, PageRequest};
use crate::policy::{Operation, Resource, ensure};
use crate::store::Table;
use crate::types::{ProductId, ResourceKind, TimeStamp, UserId};
use crate::upload::{AcceptedImage, ImageUpload};
use tracing::info;

/// Result of a product write. `image` is the upload the caller still has to
/// persist under `stored_name`; `replaced_image_url` is the file it superseded.
#[derive(Debug, Clone)]
pub struct ProductWrite {
    pub product: Product,
    pub image: Option<AcceptedImage>,
    pub replaced_image_url: Option<String>,
}

impl MarketService {
    pub fn create_product(
        &self,
        identity: &Identity,
        draft: ProductDraft,
        image: Option<ImageUpload>,
    ) -> MarketResult<ProductWrite> {
        ensure(identity, Operation::Create, Resource::Collection(ResourceKind::Product))?;

        let image = image
            .map(|upload| upload.accept(&self.config.uploads))
            .transpose()?;
        let id = self.store.next_id()?;
        let product = draft.validate_and_finalise(
            id,
            identity.user_id,
            image.as_ref().map(|i| i.url.clone()),
        )?;
        self.store.insert_new(Table::Products, id, &product)?;

        info!(product_id = id, owner = identity.user_id, "product listed");
        Ok(ProductWrite {
            product,
            image,
            replaced_image_url: None,
        })
    }

    pub fn get_product(&self, identity: &Identity, id: ProductId) -> MarketResult<Product> {
        let product: Product = self.store.load(Table::Products, id)?;
        ensure(identity, Operation::Read, Resource::Product(&product))?;
        Ok(product)
    }

    pub fn list_products(
        &self,
        identity: &Identity,
        page: PageRequest,
    ) -> MarketResult<Page<Product>> {
        ensure(identity, Operation::List, Resource::Collection(ResourceKind::Product))?;
        let products = self.store.scan::<Product>(Table::Products)?;
        Ok(Page::slice(products, page, &self.config.pagination))
    }

    pub fn search_products(
        &self,
        identity: &Identity,
        query: &str,
        page: PageRequest,
    ) -> MarketResult<Page<Product>> {
        ensure(identity, Operation::List, Resource::Collection(ResourceKind::Product))?;

        let query = query.trim();
        if query.is_empty() {
            return Err(MarketError::validation("search query"));
        }
        let hits = self
            .store
            .scan::<Product>(Table::Products)?
            .into_iter()
            .filter(|p| p.matches(query))
            .collect();
        Ok(Page::slice(hits, page, &self.config.pagination))
    }

    pub fn list_products_by_owner(
        &self,
        identity: &Identity,
        owner: UserId,
    ) -> MarketResult<Vec<Product>> {
        ensure(identity, Operation::List, Resource::Collection(ResourceKind::Product))?;
        Ok(self
            .store
            .scan::<Product>(Table::Products)?
            .into_iter()
            .filter(|p| p.owner == owner)
            .collect())
    }

    pub fn update_product(
        &self,
        identity: &Identity,
        id: ProductId,
        update: ProductUpdate,
        image: Option<ImageUpload>,
    ) -> MarketResult<ProductWrite> {
        // owner check precedes upload validation
        let current: Product = self.store.load(Table::Products, id)?;
        ensure(identity, Operation::Update, Resource::Product(&current))?;

        let image = image
            .map(|upload| upload.accept(&self.config.uploads))
            .transpose()?;
        let mut replaced_image_url = None;

        let product = self.store.update_with(Table::Products, id, |current: &Product| {
            ensure(identity, Operation::Update, Resource::Product(current))?;
            let mut next = current.clone();
            update.apply(&mut next)?;
            if let Some(accepted) = &image {
                replaced_image_url = next.image_url.replace(accepted.url.clone());
            }
            Ok(Some(next))
        })?;

        info!(product_id = id, by = identity.user_id, "product updated");
        Ok(ProductWrite {
            product,
            image,
            replaced_image_url,
        })
    }

    /// Availability flag. Any value may replace any other.
    pub fn update_product_status(
        &self,
        identity: &Identity,
        id: ProductId,
        requested: &str,
    ) -> MarketResult<Product> {
        let status = ProductStatus::parse(requested)?;

        let product = self.store.update_with(Table::Products, id, |current: &Product| {
            ensure(identity, Operation::UpdateStatus, Resource::Product(current))?;
            if current.status == status {
                return Ok(None);
            }
            let mut next = current.clone();
            next.status = status;
            next.updated_at = TimeStamp::new();
            Ok(Some(next))
        })?;

        info!(
            product_id = id,
            status = %product.status,
            by = identity.user_id,
            "product status set"
        );
        Ok(product)
    }

    pub fn delete_product(&self, identity: &Identity, id: ProductId) -> MarketResult<Product> {
        let product: Product = self.store.load(Table::Products, id)?;
        ensure(identity, Operation::Delete, Resource::Product(&product))?;

        self.store.remove::<Product>(Table::Products, id)?;
        info!(product_id = id, by = identity.user_id, "product deleted");
        Ok(product)
    }
}
