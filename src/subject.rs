use std::collections::{BTreeSet, HashMap};

use k8s_openapi::api::rbac::v1::{PolicyRule, Subject};

use crate::constants::{ALL, VALID_VERBS};
use crate::formatter::{Outcome, Table};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoleRef {
    pub name: String,
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectRef {
    pub name: String,
    pub kind: String,
    pub namespace: String,
}

impl From<&Subject> for SubjectRef {
    fn from(subject: &Subject) -> Self {
        Self {
            name: subject.name.clone(),
            kind: subject.kind.clone(),
            namespace: subject.namespace.clone().unwrap_or_default(),
        }
    }
}

/// Who may do what to one resource kind (or one named instance of it).
///
/// Verb sets only ever grow: both `match_rules` and `resolve_role_ref` union
/// into what was recorded before.
#[derive(Clone, Debug, Default)]
pub struct SubjectAccess {
    pub resource: String,
    pub resource_name: String,
    role_to_verbs: HashMap<RoleRef, BTreeSet<String>>,
    subject_to_verbs: HashMap<SubjectRef, BTreeSet<String>>,
}

impl SubjectAccess {
    pub fn new(resource: &str, resource_name: &str) -> Self {
        Self {
            resource: resource.to_string(),
            resource_name: resource_name.to_string(),
            ..Default::default()
        }
    }

    pub fn get(&self) -> &HashMap<SubjectRef, BTreeSet<String>> {
        &self.subject_to_verbs
    }

    pub fn is_empty(&self) -> bool {
        self.subject_to_verbs.is_empty()
    }

    /// Records the verbs a rule of `role` grants on the target resource.
    pub fn match_rules(&mut self, role: &RoleRef, rule: &PolicyRule) {
        if let Some(names) = rule.resource_names.as_ref().filter(|n| !n.is_empty()) {
            if self.resource_name.is_empty() || !names.contains(&self.resource_name) {
                return;
            }
        }

        let matches = rule
            .resources
            .iter()
            .flatten()
            .any(|r| r == ALL || *r == self.resource);
        if !matches {
            return;
        }

        self.role_to_verbs
            .entry(role.clone())
            .or_default()
            .extend(expand_verbs(&rule.verbs));
    }

    /// Grants the verbs recorded for `role` to every subject of a binding.
    pub fn resolve_role_ref(&mut self, role: &RoleRef, subjects: &[Subject]) {
        let verbs = match self.role_to_verbs.get(role) {
            Some(verbs) => verbs,
            None => return,
        };
        for subject in subjects {
            self.subject_to_verbs
                .entry(SubjectRef::from(subject))
                .or_default()
                .extend(verbs.iter().cloned());
        }
    }

    /// One row per subject holding at least one of `verbs`, sorted by name and kind.
    pub fn to_table(&self, verbs: &[String]) -> Table {
        let mut table = Table::with_headers(&["NAME", "KIND", "SA-NAMESPACE"], verbs);

        let mut subjects = self
            .subject_to_verbs
            .iter()
            .filter(|(_, granted)| verbs.iter().any(|v| granted.contains(v)))
            .collect::<Vec<_>>();
        subjects.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (subject, granted) in subjects {
            let outcomes = verbs
                .iter()
                .map(|v| {
                    if granted.contains(v) {
                        Outcome::Up
                    } else {
                        Outcome::Down
                    }
                })
                .collect();
            table.add_row(
                vec![
                    subject.name.clone(),
                    subject.kind.clone(),
                    subject.namespace.clone(),
                ],
                outcomes,
            );
        }
        table
    }
}

fn expand_verbs(verbs: &[String]) -> Vec<String> {
    if verbs.iter().any(|v| v == ALL) {
        VALID_VERBS.iter().map(|v| v.to_string()).collect()
    } else {
        verbs.to_vec()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn rule(resources: &[&str], resource_names: &[&str], verbs: &[&str]) -> PolicyRule {
        serde_json::from_value(json!({
            "resources": resources,
            "resourceNames": resource_names,
            "verbs": verbs,
        }))
        .expect("valid PolicyRule")
    }

    pub(crate) fn subject(name: &str, kind: &str, namespace: Option<&str>) -> Subject {
        serde_json::from_value(json!({
            "name": name,
            "kind": kind,
            "namespace": namespace,
        }))
        .expect("valid Subject")
    }

    fn set(verbs: &[&str]) -> BTreeSet<String> {
        verbs.iter().map(|v| v.to_string()).collect()
    }

    fn role() -> RoleRef {
        RoleRef {
            name: "some-role".into(),
            kind: "some-kind".into(),
        }
    }

    #[test]
    fn test_match_rules() {
        let resource = "deployments";
        let cases: Vec<(&str, &str, Option<&[&str]>, PolicyRule, Option<Vec<&str>>)> = vec![
            (
                "simple rule",
                "",
                None,
                rule(&[resource], &[], &["create", "get"]),
                Some(vec!["create", "get"]),
            ),
            (
                "simple rule with initial verbs",
                "",
                Some(&["initial", "other"][..]),
                rule(&[resource], &[], &["create", "get"]),
                Some(vec!["create", "get", "initial", "other"]),
            ),
            (
                "rule for multiple resources",
                "",
                None,
                rule(&["resource-other", resource, "resource-yet-another"], &[], &["create", "get"]),
                Some(vec!["create", "get"]),
            ),
            (
                "no matching resource",
                "",
                None,
                rule(&["resource-other", "resource-yet-another"], &[], &["create", "get"]),
                None,
            ),
            (
                "resource wildcard",
                "",
                None,
                rule(&["*"], &[], &["list"]),
                Some(vec!["list"]),
            ),
            (
                "verb wildcard",
                "",
                None,
                rule(&[resource], &[], &["get", "*"]),
                Some(VALID_VERBS.to_vec()),
            ),
            (
                "rule with resourceNames does not match kind query",
                "",
                None,
                rule(&[resource], &["no-match"], &["create", "get"]),
                None,
            ),
            (
                "rule with matching resourceName",
                "my-resource-name",
                None,
                rule(&[resource], &["my-resource-name"], &["create", "get"]),
                Some(vec!["create", "get"]),
            ),
            (
                "rule with wrong resourceName",
                "my-resource-name",
                None,
                rule(&[resource], &["wrong-resource-name"], &["create", "get"]),
                None,
            ),
            (
                "rule without resourceNames matches any instance",
                "my-resource-name",
                None,
                rule(&[resource], &[], &["get"]),
                Some(vec!["get"]),
            ),
        ];

        for (name, resource_name, initial, rule, expected) in cases {
            let mut sa = SubjectAccess::new(resource, resource_name);
            if let Some(initial) = initial {
                sa.role_to_verbs.insert(role(), set(initial));
            }
            sa.match_rules(&role(), &rule);
            assert_eq!(
                sa.role_to_verbs.get(&role()),
                expected.map(|v| set(&v)).as_ref(),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_resolve_role_ref() {
        let main = SubjectRef {
            name: "main".into(),
            kind: "some-kind".into(),
            namespace: "some-ns".into(),
        };
        let cases: Vec<(&str, Option<&[&str]>, Vec<&str>, Vec<&str>)> = vec![
            ("no role", None, vec!["main"], vec!["initial-verb"]),
            (
                "match with one subject",
                Some(&["get", "list"][..]),
                vec!["main"],
                vec!["initial-verb", "get", "list"],
            ),
            (
                "match with multiple subjects",
                Some(&["get", "list"][..]),
                vec!["other", "main", "yet-another"],
                vec!["initial-verb", "get", "list"],
            ),
            (
                "no match with other subjects",
                Some(&["get", "list"][..]),
                vec!["other", "yet-another"],
                vec!["initial-verb"],
            ),
        ];

        for (name, role_verbs, subjects, expected) in cases {
            let mut sa = SubjectAccess::new("deployments", "");
            sa.subject_to_verbs.insert(main.clone(), set(&["initial-verb"]));
            if let Some(verbs) = role_verbs {
                sa.role_to_verbs.insert(role(), set(verbs));
            }
            let subjects = subjects
                .into_iter()
                .map(|s| subject(s, "some-kind", Some("some-ns")))
                .collect::<Vec<_>>();
            sa.resolve_role_ref(&role(), &subjects);
            assert_eq!(sa.get()[&main], set(&expected), "{}", name);
        }
    }

    #[test]
    fn test_resolve_role_ref_only_grows() {
        let mut sa = SubjectAccess::new("deployments", "");
        let other = RoleRef {
            name: "other".into(),
            kind: "ClusterRole".into(),
        };
        sa.role_to_verbs.insert(role(), set(&["get", "list"]));
        sa.role_to_verbs.insert(other.clone(), set(&["create"]));
        let alice = [subject("alice", "User", None)];

        sa.resolve_role_ref(&role(), &alice);
        sa.resolve_role_ref(&other, &alice);
        sa.resolve_role_ref(&role(), &alice);

        let alice = SubjectRef::from(&alice[0]);
        assert_eq!(sa.get()[&alice], set(&["create", "get", "list"]));
    }

    #[test]
    fn test_to_table() {
        let mut sa = SubjectAccess::new("deployments", "");
        sa.subject_to_verbs.insert(
            SubjectRef::from(&subject("bob", "User", None)),
            set(&["get"]),
        );
        sa.subject_to_verbs.insert(
            SubjectRef::from(&subject("alice", "User", None)),
            set(&["get", "list"]),
        );
        sa.subject_to_verbs.insert(
            SubjectRef::from(&subject("alice", "Group", None)),
            set(&["list"]),
        );
        sa.subject_to_verbs.insert(
            SubjectRef::from(&subject("watcher", "ServiceAccount", Some("ns"))),
            set(&["watch"]),
        );

        let verbs = vec!["get".to_string(), "list".to_string()];
        let table = sa.to_table(&verbs);
        assert_eq!(
            table.headers(),
            &["NAME", "KIND", "SA-NAMESPACE", "GET", "LIST"]
        );
        let rows = table
            .rows()
            .iter()
            .map(|r| (r.labels.clone(), r.entries.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            rows,
            vec![
                (
                    vec!["alice".to_string(), "Group".into(), "".into()],
                    vec![Outcome::Down, Outcome::Up]
                ),
                (
                    vec!["alice".to_string(), "User".into(), "".into()],
                    vec![Outcome::Up, Outcome::Up]
                ),
                (
                    vec!["bob".to_string(), "User".into(), "".into()],
                    vec![Outcome::Up, Outcome::Down]
                ),
            ]
        );
    }
}
