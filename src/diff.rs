use crate::formatter::{Outcome, Table};
use crate::types::{Access, ResourceAccess};

/// Compares two access matrices from the perspective of `left`.
///
/// Only resources with at least one changed verb get a row. A cell is `Up`
/// when the verb became allowed on the right, `Down` when it stopped being
/// allowed, and `None` otherwise.
pub fn diff(left: &ResourceAccess, right: &ResourceAccess, verbs: &[String]) -> Table {
    let mut table = Table::with_headers(&["NAME"], verbs);

    for l in left.items() {
        let r = right.get(&l.name);
        tracing::trace!(name = %l.name, left = ?l.access, right = ?r.map(|r| &r.access));

        let mut changed = false;
        let outcomes = verbs
            .iter()
            .map(|verb| {
                let ll = outcome(l.access.get(verb));
                let rr = outcome(r.and_then(|r| r.access.get(verb)));
                if ll == rr {
                    return Outcome::None;
                }
                changed = true;
                if rr == Access::Allowed {
                    Outcome::Up
                } else if ll == Access::Allowed {
                    Outcome::Down
                } else {
                    Outcome::None
                }
            })
            .collect::<Vec<Outcome>>();

        if changed {
            table.add_row(vec![l.name.clone()], outcomes);
        }
    }

    if hides_differences(left, right) {
        tracing::warn!("Some differences may be hidden, please swap the roles to get the full picture.");
    }

    table
}

// Resources only seen on the right never get a row.
fn hides_differences(left: &ResourceAccess, right: &ResourceAccess) -> bool {
    right.items().iter().any(|r| left.get(&r.name).is_none())
}

// Verbs missing on a side count as denied.
fn outcome(access: Option<&Access>) -> Access {
    access.copied().unwrap_or(Access::Denied)
}
