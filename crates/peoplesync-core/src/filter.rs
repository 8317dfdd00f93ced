//! Derived views over the contact snapshot
//!
//! Everything here is a pure function of its inputs: the same snapshot and
//! filter always produce the same view.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{Contact, ContactStatus};

/// Number of contacts shown on the dashboard
pub const DASHBOARD_RECENT: usize = 4;

/// Which tab the view is derived for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Unfiltered membership, search ignored
    All,
    /// The "all contacts" tab: search only
    #[default]
    Contacts,
    Active,
    Inactive,
    /// First [`DASHBOARD_RECENT`] items of the snapshot, filter ignored
    Dashboard,
}

impl Category {
    pub fn title(&self) -> &'static str {
        match self {
            Category::All => "Contacts",
            Category::Contacts => "All Contacts",
            Category::Active => "Active Contacts",
            Category::Inactive => "Inactive Contacts",
            Category::Dashboard => "Dashboard",
        }
    }

    fn required_status(&self) -> Option<ContactStatus> {
        match self {
            Category::Active => Some(ContactStatus::Active),
            Category::Inactive => Some(ContactStatus::Inactive),
            _ => None,
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Category::All),
            "contacts" => Ok(Category::Contacts),
            "active" => Ok(Category::Active),
            "inactive" => Ok(Category::Inactive),
            "dashboard" => Ok(Category::Dashboard),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// Ephemeral view state; never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search_term: String,
    pub category: Category,
}

impl FilterState {
    pub fn new(search_term: impl Into<String>, category: Category) -> Self {
        Self {
            search_term: search_term.into(),
            category,
        }
    }

    /// Whether `contact` belongs in this view. Dashboard membership is
    /// positional, so this only describes the filtering categories.
    pub fn matches(&self, contact: &Contact) -> bool {
        matches_search(contact, &self.search_term.to_lowercase())
            && self
                .category
                .required_status()
                .map_or(true, |status| contact.status == status)
    }
}

/// Case-insensitive substring match on name, email or role.
/// `needle` must already be lowercase.
fn matches_search(contact: &Contact, needle: &str) -> bool {
    needle.is_empty()
        || [&contact.name, &contact.email, &contact.role]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
}

/// Derive the view for `filter` from `snapshot`, preserving snapshot order.
pub fn derive(snapshot: &[Contact], filter: &FilterState) -> Vec<Contact> {
    match filter.category {
        Category::Dashboard => snapshot.iter().take(DASHBOARD_RECENT).cloned().collect(),
        Category::All => snapshot.to_vec(),
        _ => snapshot
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect(),
    }
}

/// Message shown when a derived view is empty
pub fn empty_hint(search_term: &str) -> &'static str {
    if search_term.trim().is_empty() {
        "Get started by adding a new contact."
    } else {
        "Try adjusting your search terms."
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    /// Contacts whose `date_added` falls in the same calendar month and year
    /// as `today`
    pub added_this_month: usize,
}

impl DashboardStats {
    pub fn compute(snapshot: &[Contact], today: NaiveDate) -> Self {
        let mut stats = Self {
            total: snapshot.len(),
            ..Self::default()
        };
        for contact in snapshot {
            match contact.status {
                ContactStatus::Active => stats.active += 1,
                ContactStatus::Inactive => stats.inactive += 1,
            }
            if contact.date_added.year() == today.year()
                && contact.date_added.month() == today.month()
            {
                stats.added_this_month += 1;
            }
        }
        stats
    }
}
