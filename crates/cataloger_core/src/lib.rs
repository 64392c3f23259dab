//! Cataloger core: pure classification, descriptor and scheduling logic.
mod classify;
pub mod descriptor;
mod paths;
mod resource;
mod schedule;
mod server;

pub use classify::{classify, classify_leaf, matching_rule, NodeFacts, SERVICE_URL_SUFFIX};
pub use descriptor::{
    canonical_json, ChildRef, CodedValue, DisplayInfo, FieldSpec, ServiceError, ServiceRef,
};
pub use paths::{
    child_url, count_query_url, descriptor_request_url, folder_url, last_segment, service_url,
    strip_folder_prefix, UrlError,
};
pub use resource::{Classification, ParseResourceTypeError, ResourceType};
pub use schedule::{revisit_due, RunKind};
pub use server::ServerSpec;
