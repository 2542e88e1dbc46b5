//! Online shop product pipeline
//!
//! Shop products are matched by template name. Each new template keeps its
//! website categories and publication flag, and gets one variant per size
//! of the remote attribute lines, tagged with the remote brand, when the
//! local store defines brand and size attributes.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use super::invoice::read_many;
use super::product::PRODUCT_TEMPLATE_MODEL;
use super::{Fetched, Outcome, RecordPipeline, RunContext, SyncOptions};
use crate::db::{
    AttachmentRepository, CatalogRepository, ProductRepository, SqliteAttachmentRepository,
    SqliteCatalogRepository, SqliteProductRepository,
};
use crate::error::Result;
use crate::models::{NewProduct, RemoteRecord};
use crate::rpc::{read_ordered, Domain, RemoteSession};

pub(super) const PUBLIC_CATEGORY_MODEL: &str = "product.public.category";
const ATTRIBUTE_LINE_MODEL: &str = "product.template.attribute.line";

/// Local attribute names looked up with a case-insensitive substring match
const BRAND_ATTRIBUTE: &str = "Marca";
const SIZE_ATTRIBUTE: &str = "Talla";

const TEMPLATE_FIELDS: &[&str] = &[
    "id",
    "name",
    "lst_price",
    "type",
    "standard_price",
    "default_code",
    "barcode",
    "image_1920",
    "description_sale",
    "public_categ_ids",
    "is_published",
    "dr_brand_id",
    "attribute_line_ids",
    "product_template_image_ids",
];

/// `(name, parent name)` of a website category
pub type PublicCategory = (String, Option<String>);

#[derive(Debug, Clone, Default)]
pub struct RemoteShopProduct {
    pub record: RemoteRecord,
    pub public_categories: Vec<PublicCategory>,
    /// Base64 images, main image first
    pub images: Vec<String>,
    pub brand: Option<String>,
    /// Value names of the remote attribute lines
    pub sizes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShopProductDraft {
    #[serde(flatten)]
    pub values: NewProduct,
    pub public_categories: Vec<PublicCategory>,
    pub brand: Option<String>,
    pub sizes: Vec<String>,
    #[serde(skip)]
    pub images: Vec<String>,
}

/// Website categories of `record`, in remote order
pub(super) fn public_categories(
    categories: &HashMap<i64, RemoteRecord>,
    record: &RemoteRecord,
) -> Vec<PublicCategory> {
    record
        .ids("public_categ_ids")
        .iter()
        .filter_map(|id| categories.get(id))
        .filter_map(|category| {
            let name = category.text("name")?;
            let parent = category.many2one_name("parent_id").map(str::to_string);
            Some((name, parent))
        })
        .collect()
}

/// Local ids of `categories`, creating the missing ones
pub(super) fn ensure_public_categories(conn: &Connection, categories: &[PublicCategory]) -> Result<Vec<i64>> {
    let catalog = SqliteCatalogRepository::new(conn);
    categories
        .iter()
        .map(|(name, parent)| catalog.ensure_public_category(name, parent.as_deref()))
        .collect()
}

/// Imports shop products with website data and brand/size variants
#[derive(Debug, Clone, Copy, Default)]
pub struct EcommercePipeline;

impl EcommercePipeline {
    pub const fn new() -> Self {
        Self
    }

    fn create_variants(conn: &Connection, item: &ShopProductDraft, template_id: i64) -> Result<usize> {
        let catalog = SqliteCatalogRepository::new(conn);
        let (Some(brand_attribute), Some(size_attribute)) = (
            catalog.find_attribute_like(BRAND_ATTRIBUTE)?,
            catalog.find_attribute_like(SIZE_ATTRIBUTE)?,
        ) else {
            tracing::debug!("No brand or size attribute; {} keeps no variants", item.values.name);
            return Ok(0);
        };

        let brand_value = item
            .brand
            .as_deref()
            .map(|brand| catalog.ensure_value(brand_attribute, brand))
            .transpose()?;
        let mut combinations: Vec<Vec<i64>> = Vec::new();
        for size in &item.sizes {
            let size_value = catalog.ensure_value(size_attribute, size)?;
            combinations.push(brand_value.into_iter().chain([size_value]).collect());
        }
        if combinations.is_empty() {
            combinations.extend(brand_value.map(|value| vec![value]));
        }

        let mut created = 0;
        for values in combinations {
            if catalog.find_variant(template_id, &values)?.is_none() {
                catalog.create_variant(template_id, &values)?;
                created += 1;
            }
        }
        Ok(created)
    }
}

impl RecordPipeline for EcommercePipeline {
    type Source = RemoteShopProduct;
    type Item = ShopProductDraft;

    fn remote_model(&self) -> &'static str {
        PRODUCT_TEMPLATE_MODEL
    }

    fn order(&self) -> &'static str {
        "name"
    }

    fn domain(&self, options: &SyncOptions) -> Domain {
        match options.company_id {
            Some(company_id) => Domain::new().filter("company_id", "=", company_id),
            None => Domain::new(),
        }
    }

    fn key_fields(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn is_imported(&self, conn: &Connection, key: &RemoteRecord) -> Result<bool> {
        match key.text("name") {
            Some(name) => Ok(SqliteProductRepository::new(conn).find_template(&name)?.is_some()),
            None => Ok(false),
        }
    }

    fn fetch(&self, session: &dyn RemoteSession, ids: &[i64]) -> Result<Vec<Fetched<RemoteShopProduct>>> {
        let records = read_ordered(session, PRODUCT_TEMPLATE_MODEL, ids, TEMPLATE_FIELDS)?;
        let categories = read_many(
            session,
            PUBLIC_CATEGORY_MODEL,
            &records,
            "public_categ_ids",
            &["name", "parent_id"],
        )?;
        let images = read_many(session, "product.image", &records, "product_template_image_ids", &["image_1920"])?;
        let lines = read_many(session, ATTRIBUTE_LINE_MODEL, &records, "attribute_line_ids", &["value_ids"])?;
        let line_rows: Vec<RemoteRecord> = lines.values().cloned().collect();
        let values = read_many(session, "product.attribute.value", &line_rows, "value_ids", &["name"])?;

        Ok(records
            .into_iter()
            .map(|record| {
                let mut product_images: Vec<String> = record.text("image_1920").into_iter().collect();
                product_images.extend(
                    record
                        .ids("product_template_image_ids")
                        .iter()
                        .filter_map(|id| images.get(id))
                        .filter_map(|image| image.text("image_1920")),
                );
                let mut sizes: Vec<String> = Vec::new();
                for line in record.ids("attribute_line_ids").iter().filter_map(|id| lines.get(id)) {
                    for value in line.ids("value_ids").iter().filter_map(|id| values.get(id)) {
                        if let Some(name) = value.text("name") {
                            if !sizes.contains(&name) {
                                sizes.push(name);
                            }
                        }
                    }
                }
                Fetched {
                    remote_id: record.id(),
                    name: record.text("name").unwrap_or_default(),
                    source: RemoteShopProduct {
                        public_categories: public_categories(&categories, &record),
                        images: product_images,
                        brand: record.many2one_name("dr_brand_id").map(str::to_string),
                        sizes,
                        record,
                    },
                }
            })
            .collect())
    }

    fn transform(
        &self,
        conn: &Connection,
        ctx: &mut RunContext,
        source: &RemoteShopProduct,
    ) -> Result<Outcome<ShopProductDraft>> {
        let record = &source.record;
        let Some(name) = record.text("name") else {
            return Ok(Outcome::Skip("product has no name".into()));
        };
        if self.is_imported(conn, record)? {
            return Ok(Outcome::AlreadyImported);
        }

        Ok(Outcome::Create(ShopProductDraft {
            values: NewProduct {
                list_price: record.f64("lst_price").unwrap_or_default(),
                standard_price: record.f64("standard_price").unwrap_or_default(),
                detailed_type: record
                    .str("type")
                    .and_then(|kind| kind.parse().ok())
                    .unwrap_or_default(),
                default_code: record.text("default_code"),
                barcode: record.text("barcode"),
                description_sale: record.text("description_sale"),
                is_published: record.bool("is_published"),
                company_id: ctx.options.local_company_id,
                tax_ids: ctx.options.default_taxes(),
                import_id: Some(record.id()),
                ..NewProduct::named(name)
            },
            public_categories: source.public_categories.clone(),
            brand: source.brand.clone(),
            sizes: source.sizes.clone(),
            images: source.images.clone(),
        }))
    }

    fn create(&self, conn: &Connection, item: &ShopProductDraft) -> Result<i64> {
        let id = SqliteProductRepository::new(conn).create(&item.values)?;
        let categ_ids = ensure_public_categories(conn, &item.public_categories)?;
        SqliteCatalogRepository::new(conn).set_public_categories(id, &categ_ids)?;
        Ok(id)
    }

    fn post_process(&self, conn: &Connection, item: &ShopProductDraft, local_id: i64) -> Result<()> {
        let attachments = SqliteAttachmentRepository::new(conn);
        for image in &item.images {
            attachments.create(&item.values.name, PRODUCT_TEMPLATE_MODEL, local_id, image)?;
        }
        let variants = Self::create_variants(conn, item, local_id)?;
        tracing::debug!(
            "{}: {} image(s), {} variant(s)",
            item.values.name,
            item.images.len(),
            variants
        );
        Ok(())
    }
}
