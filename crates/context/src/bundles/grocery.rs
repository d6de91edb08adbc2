//! Grocery list bundle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use steward_cache::{CacheOptions, DomainCache};
use steward_core::{
    AppContext, BundleBuilder, BundleError, ContextBundle, Domain, GrocerySource, bundle_names,
};

use crate::bundles::finish;

pub(crate) const CACHE_KEY: &str = "grocery:items";

pub struct GroceryBundle {
    source: Arc<dyn GrocerySource>,
    cache: Arc<DomainCache>,
    ttl: Duration,
}

impl GroceryBundle {
    pub fn new(source: Arc<dyn GrocerySource>, cache: Arc<DomainCache>, ttl: Duration) -> Self {
        Self { source, cache, ttl }
    }
}

#[async_trait]
impl BundleBuilder for GroceryBundle {
    fn name(&self) -> &str {
        bundle_names::GROCERY
    }
    async fn build(
        &self,
        _ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError> {
        let items = self
            .cache
            .get_or_compute(CACHE_KEY, CacheOptions::tagged(self.ttl, Domain::Grocery), || {
                self.source.items()
            })
            .await?;

        let mut out = String::from("## Grocery List\n");
        let needed: Vec<_> = items.iter().filter(|i| !i.checked).collect();
        if needed.is_empty() {
            out.push_str("Grocery list is empty.");
        } else {
            let lines: Vec<String> = needed
                .iter()
                .map(|item| match &item.quantity {
                    Some(qty) => format!("- {} ({qty})", item.name),
                    None => format!("- {}", item.name),
                })
                .collect();
            out.push_str(&lines.join("\n"));
        }
        Ok(finish(self.name(), out, max_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::{GroceryItem, SourceError};

    struct List(Vec<GroceryItem>);

    #[async_trait]
    impl GrocerySource for List {
        async fn items(&self) -> Result<Vec<GroceryItem>, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn item(name: &str, quantity: Option<&str>, checked: bool) -> GroceryItem {
        GroceryItem {
            id: name.into(),
            name: name.into(),
            quantity: quantity.map(str::to_string),
            checked,
        }
    }

    #[tokio::test]
    async fn lists_unchecked_items() {
        let source = List(vec![
            item("Oat milk", Some("2"), false),
            item("Bread", None, true),
            item("Apples", None, false),
        ]);
        let b = GroceryBundle::new(
            Arc::new(source),
            Arc::new(DomainCache::default()),
            Duration::from_secs(60),
        );
        let out = b.build(&AppContext::new("/grocery", ""), 2000).await.unwrap();
        assert_eq!(out.content, "## Grocery List\n- Oat milk (2)\n- Apples");
    }

    #[tokio::test]
    async fn empty_list() {
        let b = GroceryBundle::new(
            Arc::new(List(vec![])),
            Arc::new(DomainCache::default()),
            Duration::from_secs(60),
        );
        let out = b.build(&AppContext::new("/grocery", ""), 2000).await.unwrap();
        assert!(out.content.ends_with("Grocery list is empty."));
    }
}
