//! Stream schemas and the index-rule locators derived from them.
//!
//! A locator is rebuilt whenever the schema changes and published through an
//! atomic snapshot pointer: a batcher call observes one consistent view for
//! its whole run, and readers never take a lock.

use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::Arc,
};

use arc_swap::ArcSwap;

use crate::tag::TagType;

/// Two indexing modes: inverted for full term lookup, skipping for
/// block-skipping range filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexRuleType {
    Inverted,
    Skipping,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRule {
    pub rule_id: u32,
    pub rule_type: IndexRuleType,
    pub analyzer: String,
    pub no_sort: bool,
}

/// An index rule together with the tag names it covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRuleBinding {
    pub rule: IndexRule,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSpec {
    pub name: String,
    pub tag_type: TagType,
    /// The tag is projected only into the index, never into column storage.
    pub indexed_only: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFamilySpec {
    pub name: String,
    pub tags: Vec<TagSpec>,
}

/// Per-stream definition: ordered tag families of ordered tag specs, plus
/// the tag names forming the series identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSchema {
    pub group: String,
    pub name: String,
    pub tag_families: Vec<TagFamilySpec>,
    pub entity: Vec<String>,
}

/// Derived from a schema: for each tag family (in schema order) the rule
/// covering each tag name, plus the entity tag set. Always has exactly one
/// entry per schema tag family, which the write path re-checks on every
/// element.
#[derive(Clone, Debug, Default)]
pub struct IndexRuleLocator {
    pub tag_family_rules: Vec<HashMap<String, Arc<IndexRule>>>,
    pub entity_set: HashSet<String>,
}

impl IndexRuleLocator {
    pub fn build(schema: &StreamSchema, bindings: &[IndexRuleBinding]) -> Self {
        let mut by_tag: HashMap<&str, Arc<IndexRule>> = HashMap::new();
        for binding in bindings {
            let rule = Arc::new(binding.rule.clone());
            for tag in &binding.tags {
                by_tag.insert(tag.as_str(), rule.clone());
            }
        }
        let tag_family_rules = schema
            .tag_families
            .iter()
            .map(|family| {
                family
                    .tags
                    .iter()
                    .filter_map(|spec| {
                        by_tag
                            .get(spec.name.as_str())
                            .map(|rule| (spec.name.clone(), rule.clone()))
                    })
                    .collect()
            })
            .collect();
        Self {
            tag_family_rules,
            entity_set: schema.entity.iter().cloned().collect(),
        }
    }
}

/// Copy-on-write holder for the locator. Stores publish whole snapshots;
/// loads are wait-free and stable for the duration of a call.
pub struct IndexSchemaSlot {
    inner: ArcSwap<IndexRuleLocator>,
}

impl IndexSchemaSlot {
    pub fn new(locator: IndexRuleLocator) -> Self {
        Self {
            inner: ArcSwap::from_pointee(locator),
        }
    }

    pub fn load(&self) -> Arc<IndexRuleLocator> {
        self.inner.load_full()
    }

    pub fn store(&self, locator: IndexRuleLocator) {
        self.inner.store(Arc::new(locator));
    }
}
