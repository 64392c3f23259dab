//! Heuristic node classification.
//!
//! Catalog nodes rarely label their own type, so the classifier infers it from
//! the node's position, its descriptor and the shape of its URL. Rules are kept
//! in a table and evaluated in order; the first match wins and anything left
//! over is `unknown`.

use serde_json::Value;

use crate::descriptor::{self, keys};
use crate::{Classification, ResourceType};

/// Inputs a classification rule may inspect.
#[derive(Debug, Clone, Copy)]
pub struct NodeFacts<'a> {
    pub url: &'a str,
    pub descriptor: Option<&'a Value>,
    pub has_parent: bool,
}

type Rule = fn(&NodeFacts<'_>) -> Option<Classification>;

/// Ordered rule table.
const RULES: &[(&str, Rule)] = &[
    ("root-is-server", root_is_server),
    ("listing-is-folder", listing_is_folder),
    ("server-suffix-is-service", server_suffix_is_service),
];

/// Suffix carried by service endpoint URLs (`MapServer`, `FeatureServer`, ...).
pub const SERVICE_URL_SUFFIX: &str = "Server";

/// Classify a catalog node. Total and deterministic: a missing descriptor still
/// yields a classification.
pub fn classify(url: &str, descriptor: Option<&Value>, has_parent: bool) -> Classification {
    let facts = NodeFacts {
        url,
        descriptor,
        has_parent,
    };
    RULES
        .iter()
        .find_map(|(_, rule)| rule(&facts))
        .unwrap_or_default()
}

/// Name of the rule that would classify these facts, for diagnostics.
pub fn matching_rule(facts: &NodeFacts<'_>) -> Option<&'static str> {
    RULES
        .iter()
        .find(|(_, rule)| rule(facts).is_some())
        .map(|(name, _)| *name)
}

/// Classification for a node reached as an explicit layer/table child.
///
/// The type is pinned by the parent listing; the subtype comes straight from
/// the descriptor's declared `type`.
pub fn classify_leaf(kind: ResourceType, descriptor: Option<&Value>) -> Classification {
    Classification {
        kind,
        subtype: descriptor.and_then(|d| descriptor::str_field(d, keys::TYPE)),
    }
}

fn root_is_server(facts: &NodeFacts<'_>) -> Option<Classification> {
    (!facts.has_parent).then(|| Classification::new(ResourceType::Server))
}

fn listing_is_folder(facts: &NodeFacts<'_>) -> Option<Classification> {
    let descriptor = facts.descriptor?.as_object()?;
    (descriptor.contains_key(keys::FOLDERS) || descriptor.contains_key(keys::SERVICES))
        .then(|| Classification::new(ResourceType::Folder))
}

fn server_suffix_is_service(facts: &NodeFacts<'_>) -> Option<Classification> {
    let path = facts.url.trim_end_matches('/');
    if !path.ends_with(SERVICE_URL_SUFFIX) {
        return None;
    }
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    Some(Classification::with_subtype(
        ResourceType::Service,
        last_segment,
    ))
}
