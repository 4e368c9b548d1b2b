use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// One registered device-to-identity association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub username: String,
    pub fingerprint: String,
}

/// All bindings, keyed by username, with a fingerprint → usernames index
/// kept in step with the primary map.
///
/// On disk this is a flat JSON object (`{"alice": "HW-1"}`); the reverse
/// index is rebuilt on load and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Bindings {
    by_user: BTreeMap<String, String>,
    by_fingerprint: HashMap<String, BTreeSet<String>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.by_user.get(username).map(String::as_str)
    }

    /// Reverse lookup. When several usernames share a fingerprint (only
    /// possible through direct edits of the stored document) the
    /// lexicographically smallest one is returned.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<&str> {
        self.by_fingerprint
            .get(fingerprint)
            .and_then(|owners| owners.iter().next())
            .map(String::as_str)
    }

    /// Upsert. Returns the fingerprint previously bound to `username`.
    pub fn insert(&mut self, username: &str, fingerprint: &str) -> Option<String> {
        let previous = self
            .by_user
            .insert(username.to_string(), fingerprint.to_string());

        if let Some(old) = previous.as_deref() {
            self.unindex(old, username);
        }
        self.by_fingerprint
            .entry(fingerprint.to_string())
            .or_default()
            .insert(username.to_string());

        previous
    }

    pub fn iter(&self) -> impl Iterator<Item = Binding> + '_ {
        self.by_user.iter().map(|(username, fingerprint)| Binding {
            username: username.clone(),
            fingerprint: fingerprint.clone(),
        })
    }

    fn unindex(&mut self, fingerprint: &str, username: &str) {
        if let Some(owners) = self.by_fingerprint.get_mut(fingerprint) {
            owners.remove(username);
            if owners.is_empty() {
                self.by_fingerprint.remove(fingerprint);
            }
        }
    }
}

impl From<BTreeMap<String, String>> for Bindings {
    fn from(by_user: BTreeMap<String, String>) -> Self {
        let mut by_fingerprint: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (username, fingerprint) in &by_user {
            by_fingerprint
                .entry(fingerprint.clone())
                .or_default()
                .insert(username.clone());
        }
        Self {
            by_user,
            by_fingerprint,
        }
    }
}

impl From<Bindings> for BTreeMap<String, String> {
    fn from(bindings: Bindings) -> Self {
        bindings.by_user
    }
}
