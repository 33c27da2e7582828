//! Compact IRI (`prefix:local`) expansion.

use super::vocab::{OWL_NS, RDF_NS, RDFS_NS, XSD_NS};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Ordered prefix → namespace table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixMapping {
    prefixes: IndexMap<String, String>,
}

static GLOBAL_PREFIXES: Lazy<RwLock<PrefixMapping>> =
    Lazy::new(|| RwLock::new(PrefixMapping::standard()));

impl PrefixMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// rdf, rdfs, xsd and owl.
    pub fn standard() -> Self {
        let mut mapping = Self::new();
        mapping.insert("rdf", RDF_NS);
        mapping.insert("rdfs", RDFS_NS);
        mapping.insert("xsd", XSD_NS);
        mapping.insert("owl", OWL_NS);
        mapping
    }

    pub fn insert(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, n)| (p.as_str(), n.as_str()))
    }

    /// Expands `prefix:local` when `prefix` is known; anything else is
    /// returned unchanged, including absolute IRIs such as `http://...`.
    pub fn expand(&self, value: &str) -> String {
        if let Some((prefix, local)) = value.split_once(':') {
            if !local.starts_with("//") {
                if let Some(ns) = self.prefixes.get(prefix) {
                    return format!("{ns}{local}");
                }
            }
        }
        value.to_string()
    }

    /// Shortest `prefix:local` form of `iri`, if any namespace matches.
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter_map(|(p, ns)| iri.strip_prefix(ns.as_str()).map(|local| (p, local)))
            .min_by_key(|(_, local)| local.len())
            .map(|(p, local)| format!("{p}:{local}"))
    }

    /// Snapshot of the process-wide table.
    pub fn global() -> PrefixMapping {
        GLOBAL_PREFIXES.read().clone()
    }

    pub fn register_global(prefix: impl Into<String>, namespace: impl Into<String>) {
        GLOBAL_PREFIXES.write().insert(prefix, namespace);
    }

    pub fn expand_global(value: &str) -> String {
        GLOBAL_PREFIXES.read().expand(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_prefixes_only() {
        let mut mapping = PrefixMapping::standard();
        mapping.insert("test", "urn:test:");

        assert_eq!(mapping.expand("test:foo"), "urn:test:foo");
        assert_eq!(mapping.expand("xsd:int"), format!("{XSD_NS}int"));
        assert_eq!(mapping.expand("nope:foo"), "nope:foo");
        assert_eq!(mapping.expand("http://example.org/x"), "http://example.org/x");
    }

    #[test]
    fn compact_prefers_longest_namespace() {
        let mut mapping = PrefixMapping::new();
        mapping.insert("ex", "http://example.org/");
        mapping.insert("people", "http://example.org/people/");
        assert_eq!(
            mapping.compact("http://example.org/people/ada").as_deref(),
            Some("people:ada")
        );
        assert_eq!(mapping.compact("urn:other"), None);
    }

    #[test]
    fn global_table_accepts_registrations() {
        PrefixMapping::register_global("globaltest", "urn:global-test:");
        assert_eq!(
            PrefixMapping::expand_global("globaltest:foo"),
            "urn:global-test:foo"
        );
    }
}
