//! Catalog - read access to purchasable items, plus the seeding write path.
//!
//! Listings are ordered by `sort_key`, then id, so the numeric selectors shown to
//! users (`1`, `2`, `3`, ...) keep pointing at the same items between listings.
//! Creating items and toggling them is the catalog-management collaborator's job;
//! the functions for it live here so seeding and tests share one implementation.

use crate::{
    config::CatalogItemConfig,
    entities::{CatalogItem, ItemEffect, catalog_item},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// How a caller names an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSelector {
    /// 1-based position in [`list_active`]
    Ordinal(u32),
    /// Catalog item id
    Id(i64),
}

impl fmt::Display for ItemSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinal(n) => write!(f, "{n}"),
            Self::Id(id) => write!(f, "#{id}"),
        }
    }
}

impl FromStr for ItemSelector {
    type Err = Error;

    /// `"3"` selects the third listed item, `"#12"` the item with id 12.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let not_found = || Error::ItemNotFound {
            selector: s.to_string(),
        };
        if let Some(id) = s.strip_prefix('#') {
            id.parse().map(Self::Id).map_err(|_| not_found())
        } else {
            s.parse().map(Self::Ordinal).map_err(|_| not_found())
        }
    }
}

/// One row of the shop listing as the chat adapter renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Number the user types to buy this item
    pub ordinal: u32,
    /// Item name
    pub name: String,
    /// Price in points
    pub price: i64,
    /// Listing text
    pub description: String,
}

/// Fields for a new catalog item.
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    /// Display name, unique across the catalog
    pub name: String,
    /// Price in points, must be positive
    pub price: i64,
    /// Listing text
    pub description: String,
    /// What the item grants
    pub effect: ItemEffect,
    /// Maximum unexpired purchases per user (0 = unlimited)
    pub purchase_limit: i32,
    /// Seconds between purchases by the same user (0 = none)
    pub cooldown_secs: i64,
    /// Listing position
    pub sort_key: i32,
}

impl From<&CatalogItemConfig> for NewCatalogItem {
    fn from(config: &CatalogItemConfig) -> Self {
        Self {
            name: config.name.clone(),
            price: config.price,
            description: config.description.clone(),
            effect: config.effect.clone(),
            purchase_limit: config.purchase_limit,
            cooldown_secs: config.cooldown_secs,
            sort_key: config.sort_key,
        }
    }
}

/// All active items in listing order.
pub async fn list_active<C>(db: &C) -> Result<Vec<catalog_item::Model>>
where
    C: ConnectionTrait,
{
    CatalogItem::find()
        .filter(catalog_item::Column::IsActive.eq(true))
        .order_by_asc(catalog_item::Column::SortKey)
        .order_by_asc(catalog_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The listing shown to users, numbered from 1.
pub async fn list_catalog<C>(db: &C) -> Result<Vec<CatalogEntry>>
where
    C: ConnectionTrait,
{
    Ok(list_active(db)
        .await?
        .into_iter()
        .zip(1..)
        .map(|(item, ordinal)| CatalogEntry {
            ordinal,
            name: item.name,
            price: item.price,
            description: item.description,
        })
        .collect())
}

/// Resolves a selector to an active item.
///
/// # Errors
/// [`Error::ItemNotFound`] if the ordinal is out of range, the id is unknown, or
/// the item is inactive.
pub async fn resolve<C>(db: &C, selector: ItemSelector) -> Result<catalog_item::Model>
where
    C: ConnectionTrait,
{
    let found = match selector {
        ItemSelector::Ordinal(ordinal) => {
            let index = usize::try_from(ordinal).ok().and_then(|n| n.checked_sub(1));
            match index {
                Some(index) => list_active(db).await?.into_iter().nth(index),
                None => None,
            }
        }
        ItemSelector::Id(id) => CatalogItem::find_by_id(id)
            .one(db)
            .await?
            .filter(|item| item.is_active),
    };

    found.ok_or_else(|| Error::ItemNotFound {
        selector: selector.to_string(),
    })
}

fn validate(item: &NewCatalogItem) -> Result<()> {
    if item.name.trim().is_empty() {
        return Err(Error::Config {
            message: "Item name cannot be empty".to_string(),
        });
    }
    if item.price <= 0 {
        return Err(Error::InvalidAmount { amount: item.price });
    }
    if item.purchase_limit < 0 || item.cooldown_secs < 0 {
        return Err(Error::Config {
            message: format!("Item '{}' has a negative limit or cooldown", item.name),
        });
    }
    let bad_duration = match &item.effect {
        ItemEffect::TimedUnlimitedAction { duration_secs, .. } => *duration_secs <= 0,
        ItemEffect::Broadcast { delay_secs } => *delay_secs < 0,
        ItemEffect::OneShotRequest { .. } => false,
    };
    if bad_duration {
        return Err(Error::Config {
            message: format!("Item '{}' has an invalid effect duration", item.name),
        });
    }
    Ok(())
}

/// Creates an active catalog item.
///
/// # Errors
/// - [`Error::Config`] for an empty name, negative limit/cooldown or a bad duration
/// - [`Error::InvalidAmount`] if the price is not positive
/// - [`Error::Database`] if the name is already taken
pub async fn create_item<C>(db: &C, item: NewCatalogItem) -> Result<catalog_item::Model>
where
    C: ConnectionTrait,
{
    validate(&item)?;

    let model = catalog_item::ActiveModel {
        name: Set(item.name.trim().to_string()),
        price: Set(item.price),
        description: Set(item.description),
        effect: Set(item.effect),
        purchase_limit: Set(item.purchase_limit),
        cooldown_secs: Set(item.cooldown_secs),
        sort_key: Set(item.sort_key),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Shows or hides an item.
///
/// # Errors
/// [`Error::ItemNotFound`] if no item has this id.
pub async fn set_item_active<C>(db: &C, item_id: i64, active: bool) -> Result<catalog_item::Model>
where
    C: ConnectionTrait,
{
    let mut item: catalog_item::ActiveModel = CatalogItem::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::ItemNotFound {
            selector: ItemSelector::Id(item_id).to_string(),
        })?
        .into();
    item.is_active = Set(active);
    item.update(db).await.map_err(Into::into)
}

/// Creates configured items that do not exist yet, matching by name.
///
/// Existing items are left untouched so their ids, and the purchases that point
/// at them, survive a restart. Returns the number of items created.
pub async fn seed_catalog<C>(db: &C, items: &[CatalogItemConfig]) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut created = 0;
    for config in items {
        let existing = CatalogItem::find()
            .filter(catalog_item::Column::Name.eq(config.name.trim()))
            .one(db)
            .await?;
        if let Some(existing) = existing {
            if existing.price != config.price || existing.effect != config.effect {
                warn!(
                    item = %existing.name,
                    "Configured item differs from stored item; stored item kept"
                );
            }
            continue;
        }
        create_item(db, NewCatalogItem::from(config)).await?;
        created += 1;
    }
    info!(created, configured = items.len(), "Catalog seeded");
    Ok(created)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_selector_parsing() {
        assert_eq!("3".parse::<ItemSelector>().unwrap(), ItemSelector::Ordinal(3));
        assert_eq!(" #12 ".parse::<ItemSelector>().unwrap(), ItemSelector::Id(12));
        assert!(matches!(
            "sticker".parse::<ItemSelector>(),
            Err(Error::ItemNotFound { .. })
        ));
        assert!(matches!(
            "#x".parse::<ItemSelector>(),
            Err(Error::ItemNotFound { .. })
        ));
        assert_eq!(ItemSelector::Id(4).to_string(), "#4");
    }

    #[tokio::test]
    async fn test_create_item_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let mut item = one_shot_item("Request", 10);
        item.price = 0;
        assert!(matches!(
            create_item(&db, item).await,
            Err(Error::InvalidAmount { amount: 0 })
        ));

        let item = one_shot_item("   ", 10);
        assert!(matches!(
            create_item(&db, item).await,
            Err(Error::Config { .. })
        ));

        let item = timed_item("Broken Pass", 10, "stickers", 0);
        assert!(matches!(
            create_item(&db, item).await,
            Err(Error::Config { .. })
        ));

        assert!(list_active(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_active_orders_by_sort_key_then_id() -> Result<()> {
        let db = setup_test_db().await?;

        let mut late = one_shot_item("Late", 10);
        late.sort_key = 5;
        let late = create_item(&db, late).await?;
        let mut early = one_shot_item("Early", 10);
        early.sort_key = 1;
        let early = create_item(&db, early).await?;
        let mut tie = one_shot_item("Tie", 10);
        tie.sort_key = 5;
        let tie = create_item(&db, tie).await?;

        let names: Vec<i64> = list_active(&db).await?.into_iter().map(|i| i.id).collect();
        assert_eq!(names, vec![early.id, late.id, tie.id]);

        let entries = list_catalog(&db).await?;
        assert_eq!(entries[0].ordinal, 1);
        assert_eq!(entries[0].name, "Early");
        assert_eq!(entries[2].ordinal, 3);
        assert_eq!(entries[2].name, "Tie");
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_by_ordinal_and_id() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_item(&db, one_shot_item("First", 10)).await?;
        let second = create_item(&db, one_shot_item("Second", 20)).await?;

        assert_eq!(resolve(&db, ItemSelector::Ordinal(1)).await?.id, first.id);
        assert_eq!(resolve(&db, ItemSelector::Ordinal(2)).await?.id, second.id);
        assert_eq!(resolve(&db, ItemSelector::Id(second.id)).await?.name, "Second");

        assert!(matches!(
            resolve(&db, ItemSelector::Ordinal(0)).await,
            Err(Error::ItemNotFound { .. })
        ));
        assert!(matches!(
            resolve(&db, ItemSelector::Ordinal(3)).await,
            Err(Error::ItemNotFound { .. })
        ));
        assert!(matches!(
            resolve(&db, ItemSelector::Id(999)).await,
            Err(Error::ItemNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_items_are_hidden_and_unresolvable() -> Result<()> {
        let db = setup_test_db().await?;
        let hidden = create_item(&db, one_shot_item("Hidden", 10)).await?;
        let shown = create_item(&db, one_shot_item("Shown", 10)).await?;

        set_item_active(&db, hidden.id, false).await?;

        let entries = list_catalog(&db).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Shown");
        // Ordinals close the gap left by the hidden item
        assert_eq!(resolve(&db, ItemSelector::Ordinal(1)).await?.id, shown.id);
        assert!(matches!(
            resolve(&db, ItemSelector::Id(hidden.id)).await,
            Err(Error::ItemNotFound { .. })
        ));

        set_item_active(&db, hidden.id, true).await?;
        assert_eq!(list_catalog(&db).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_catalog_is_idempotent_by_name() -> Result<()> {
        let db = setup_test_db().await?;
        let config = vec![
            CatalogItemConfig {
                name: "Sticker Pass".to_string(),
                price: 100,
                description: "Unlimited stickers".to_string(),
                effect: ItemEffect::TimedUnlimitedAction {
                    action: "stickers".to_string(),
                    duration_secs: 86_400,
                },
                purchase_limit: 1,
                cooldown_secs: 0,
                sort_key: 1,
            },
            CatalogItemConfig {
                name: "Shout".to_string(),
                price: 50,
                description: String::new(),
                effect: ItemEffect::Broadcast { delay_secs: 0 },
                purchase_limit: 0,
                cooldown_secs: 60,
                sort_key: 2,
            },
        ];

        assert_eq!(seed_catalog(&db, &config).await?, 2);
        let ids: Vec<i64> = list_active(&db).await?.into_iter().map(|i| i.id).collect();

        assert_eq!(seed_catalog(&db, &config).await?, 0);
        let ids_after: Vec<i64> = list_active(&db).await?.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, ids_after);
        Ok(())
    }
}
