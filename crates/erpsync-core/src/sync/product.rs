//! Product template pipeline

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use super::resolver::ensure_category;
use super::{Fetched, Outcome, RecordPipeline, RunContext, SyncOptions};
use crate::db::{
    AttachmentRepository, ProductRepository, SqliteAttachmentRepository, SqliteProductRepository,
};
use crate::error::Result;
use crate::models::{NewProduct, RemoteRecord};
use crate::rpc::{read_ordered, Domain, RemoteSession};

/// Remote product model, and the model product images are attached to
pub const PRODUCT_TEMPLATE_MODEL: &str = "product.template";

const TEMPLATE_FIELDS: &[&str] = &[
    "id",
    "name",
    "list_price",
    "type",
    "standard_price",
    "default_code",
    "image_1920",
    "categ_id",
    "product_template_image_ids",
];

/// Remote template plus its category path and images
#[derive(Debug, Clone, Default)]
pub struct RemoteProduct {
    pub record: RemoteRecord,
    /// `(name, parent name)` of the remote category
    pub category: Option<(String, Option<String>)>,
    /// Base64 images, main image first
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDraft {
    #[serde(flatten)]
    pub values: NewProduct,
    #[serde(skip)]
    pub images: Vec<String>,
}

/// Imports product templates with their category and images
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductPipeline;

impl ProductPipeline {
    pub const fn new() -> Self {
        Self
    }
}

impl RecordPipeline for ProductPipeline {
    type Source = RemoteProduct;
    type Item = ProductDraft;

    fn remote_model(&self) -> &'static str {
        PRODUCT_TEMPLATE_MODEL
    }

    fn order(&self) -> &'static str {
        "name"
    }

    fn domain(&self, options: &SyncOptions) -> Domain {
        let mut domain = Domain::new();
        if let Some(start) = options.start_id {
            domain = domain.filter("id", ">=", start);
        }
        if let Some(end) = options.end_id {
            domain = domain.filter("id", "<=", end);
        }
        domain
    }

    fn key_fields(&self) -> &'static [&'static str] {
        &["default_code"]
    }

    fn is_imported(&self, conn: &Connection, key: &RemoteRecord) -> Result<bool> {
        SqliteProductRepository::new(conn).exists(key.id(), key.text("default_code").as_deref())
    }

    fn fetch(&self, session: &dyn RemoteSession, ids: &[i64]) -> Result<Vec<Fetched<RemoteProduct>>> {
        let records = read_ordered(session, PRODUCT_TEMPLATE_MODEL, ids, TEMPLATE_FIELDS)?;

        let mut category_ids: Vec<i64> = records
            .iter()
            .filter_map(|record| record.many2one_id("categ_id"))
            .collect();
        category_ids.sort_unstable();
        category_ids.dedup();
        let categories: HashMap<i64, RemoteRecord> =
            read_ordered(session, "product.category", &category_ids, &["name", "parent_id"])?
                .into_iter()
                .map(|category| (category.id(), category))
                .collect();

        let image_ids: Vec<i64> = records
            .iter()
            .flat_map(|record| record.ids("product_template_image_ids"))
            .collect();
        let images: HashMap<i64, String> = read_ordered(session, "product.image", &image_ids, &["image_1920"])?
            .into_iter()
            .filter_map(|image| image.text("image_1920").map(|data| (image.id(), data)))
            .collect();

        Ok(records
            .into_iter()
            .map(|record| {
                let category = record.many2one("categ_id").map(|(id, display_name)| {
                    let remote = categories.get(&id);
                    let name = remote
                        .and_then(|category| category.text("name"))
                        .unwrap_or_else(|| display_name.to_string());
                    let parent = remote
                        .and_then(|category| category.many2one_name("parent_id"))
                        .map(str::to_string);
                    (name, parent)
                });
                let mut product_images: Vec<String> = record.text("image_1920").into_iter().collect();
                product_images.extend(
                    record
                        .ids("product_template_image_ids")
                        .iter()
                        .filter_map(|id| images.get(id).cloned()),
                );
                Fetched {
                    remote_id: record.id(),
                    name: record.text("name").unwrap_or_default(),
                    source: RemoteProduct {
                        category,
                        images: product_images,
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
        source: &RemoteProduct,
    ) -> Result<Outcome<ProductDraft>> {
        let record = &source.record;
        let Some(name) = record.text("name") else {
            return Ok(Outcome::Skip("product has no name".into()));
        };
        if self.is_imported(conn, record)? {
            return Ok(Outcome::AlreadyImported);
        }

        let categ_id = match source.category.as_ref() {
            Some((category, parent)) => Some(ensure_category(conn, ctx, category, parent.as_deref())?),
            None => None,
        };

        Ok(Outcome::Create(ProductDraft {
            values: NewProduct {
                list_price: record.f64("list_price").unwrap_or_default(),
                standard_price: record.f64("standard_price").unwrap_or_default(),
                detailed_type: record
                    .str("type")
                    .and_then(|kind| kind.parse().ok())
                    .unwrap_or_default(),
                default_code: record.text("default_code"),
                categ_id,
                company_id: ctx.options.local_company_id,
                tax_ids: ctx.options.default_taxes(),
                import_id: Some(record.id()),
                ..NewProduct::named(name)
            },
            images: source.images.clone(),
        }))
    }

    fn create(&self, conn: &Connection, item: &ProductDraft) -> Result<i64> {
        SqliteProductRepository::new(conn).create(&item.values)
    }

    fn post_process(&self, conn: &Connection, item: &ProductDraft, local_id: i64) -> Result<()> {
        let attachments = SqliteAttachmentRepository::new(conn);
        for (index, image) in item.images.iter().enumerate() {
            let name = if index == 0 {
                item.values.name.clone()
            } else {
                format!("{} ({index})", item.values.name)
            };
            attachments.create(&name, PRODUCT_TEMPLATE_MODEL, local_id, image)?;
        }
        if !item.images.is_empty() {
            tracing::debug!("Attached {} image(s) to {}", item.images.len(), item.values.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordKind, SourceVersion};
    use serde_json::json;

    #[test]
    fn domain_uses_id_range() {
        let mut options = SyncOptions::new(RecordKind::Product, SourceVersion::V13);
        assert!(ProductPipeline.domain(&options).is_empty());

        options.start_id = Some(10);
        options.end_id = Some(20);
        assert_eq!(
            ProductPipeline.domain(&options).to_value(),
            json!([["id", ">=", 10], ["id", "<=", 20]])
        );
    }
}
