use std::collections::HashMap;

use crate::formatter::{Outcome, Table};

/// Outcome of a single access review.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Denied,
    Allowed,
    /// The resource does not support the verb, no review was made.
    NotApplicable,
    /// The review request itself failed.
    RequestErr,
}

impl From<Access> for Outcome {
    fn from(access: Access) -> Self {
        match access {
            Access::Denied => Outcome::Down,
            Access::Allowed => Outcome::Up,
            Access::NotApplicable => Outcome::None,
            Access::RequestErr => Outcome::Err,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceAccessItem {
    pub name: String,
    pub access: HashMap<String, Access>,
}

/// Access matrix for resources, sorted by resource name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceAccess {
    items: Vec<ResourceAccessItem>,
}

impl ResourceAccess {
    /// Sorts by name, ties keep their relative order.
    pub fn new(mut items: Vec<ResourceAccessItem>) -> Self {
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Self { items }
    }

    pub fn items(&self) -> &[ResourceAccessItem] {
        &self.items
    }

    pub fn get(&self, name: &str) -> Option<&ResourceAccessItem> {
        self.items.iter().find(|item| item.name == name)
    }

    pub fn to_table(&self, verbs: &[String]) -> Table {
        let mut table = Table::with_headers(&["NAME"], verbs);
        for item in &self.items {
            let outcomes = verbs
                .iter()
                .map(|v| item.access.get(v).copied().map_or(Outcome::None, Outcome::from))
                .collect();
            table.add_row(vec![item.name.clone()], outcomes);
        }
        table
    }
}
