//! # Filtered Menu View
//!
//! Search box and category tabs over the catalog. The filtered list is
//! derived data: it is recomputed whenever the query, the category or the
//! catalog items change, and it never touches the catalog itself.

use tokio::sync::watch;

use crate::menu::catalog::CatalogSnapshot;
use crate::menu::model::{Category, MenuItem};

/// Query + optional category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuFilter {
    /// Case-insensitive substring matched against item names. Surrounding
    /// whitespace is ignored; an empty query matches everything.
    pub query: String,
    /// `None` is the "All" tab.
    pub category: Option<Category>,
}

impl MenuFilter {
    pub fn new(query: impl Into<String>, category: Option<Category>) -> Self {
        Self {
            query: query.into(),
            category,
        }
    }

    pub fn matches(&self, item: &MenuItem) -> bool {
        let category_ok = match &self.category {
            None => true,
            Some(wanted) => item.category.as_ref() == Some(wanted),
        };
        if !category_ok {
            return false;
        }
        let needle = self.query.trim().to_lowercase();
        needle.is_empty() || item.name.to_lowercase().contains(&needle)
    }

    /// Matching items, in catalog order.
    pub fn apply(&self, items: &[MenuItem]) -> Vec<MenuItem> {
        items.iter().filter(|item| self.matches(item)).cloned().collect()
    }
}

/// # Menu Browser
///
/// Keeps a filter and a cached filtered list in sync with the catalog
/// through its `watch` receiver.
pub struct MenuBrowser {
    catalog: watch::Receiver<CatalogSnapshot>,
    filter: MenuFilter,
    visible: Vec<MenuItem>,
}

impl MenuBrowser {
    pub fn new(catalog: watch::Receiver<CatalogSnapshot>) -> Self {
        let mut browser = Self {
            catalog,
            filter: MenuFilter::default(),
            visible: Vec::new(),
        };
        browser.recompute();
        browser
    }

    pub fn filter(&self) -> &MenuFilter {
        &self.filter
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query != self.filter.query {
            self.filter.query = query;
            self.recompute();
        }
    }

    pub fn set_category(&mut self, category: Option<Category>) {
        if category != self.filter.category {
            self.filter.category = category;
            self.recompute();
        }
    }

    /// The filtered list, refreshed first if the catalog changed.
    pub fn visible(&mut self) -> &[MenuItem] {
        if self.catalog.has_changed().unwrap_or(false) {
            self.recompute();
        }
        &self.visible
    }

    /// Waits until the catalog publishes a change, then recomputes.
    /// Returns `false` once the catalog is gone.
    pub async fn changed(&mut self) -> bool {
        if self.catalog.changed().await.is_err() {
            return false;
        }
        self.recompute();
        true
    }

    fn recompute(&mut self) {
        let snapshot = self.catalog.borrow_and_update();
        self.visible = self.filter.apply(&snapshot.items);
    }
}
