//! Catalog URL construction.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::descriptor::ServiceRef;

/// Path segments that name the catalog root rather than a folder.
const ROOT_SEGMENTS: &[&str] = &["rest", "services"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid catalog url {url:?}: {message}")]
pub struct UrlError {
    pub url: String,
    pub message: String,
}

impl UrlError {
    fn new(url: &str, err: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Parse `url` as a directory so relative joins append instead of replace.
fn as_directory(url: &str) -> Result<Url, UrlError> {
    let dir = format!("{}/", url.trim_end_matches('/'));
    Url::parse(&dir).map_err(|err| UrlError::new(url, err))
}

fn join(parent: &str, relative: &str) -> Result<String, UrlError> {
    as_directory(parent)?
        .join(relative)
        .map(String::from)
        .map_err(|err| UrlError::new(parent, err))
}

/// Last non-empty path segment of a URL string.
pub fn last_segment(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn folder_url(parent: &str, folder: &str) -> Result<String, UrlError> {
    join(parent, folder)
}

/// URL of a layer or table listed by id under `parent`.
pub fn child_url(parent: &str, id: &str) -> Result<String, UrlError> {
    join(parent, id)
}

/// Canonical URL of a service listed under the folder at `parent`.
pub fn service_url(parent: &str, service: &ServiceRef) -> Result<String, UrlError> {
    let name = strip_folder_prefix(parent, &service.name);
    join(parent, &format!("{name}/{}", service.service_type))
}

/// Last path segment with percent-escapes resolved, comparable to listing names.
fn decoded_last_segment(url: &str) -> Cow<'_, str> {
    percent_decode_str(last_segment(url)).decode_utf8_lossy()
}

/// Folder listings declare services as `Folder/Name`; joining that under the
/// folder URL would double the folder segment (`/BV/BV/`), so the prefix is
/// dropped when it repeats the current folder.
pub fn strip_folder_prefix<'a>(parent: &str, name: &'a str) -> &'a str {
    let current = decoded_last_segment(parent);
    if current.is_empty()
        || ROOT_SEGMENTS
            .iter()
            .any(|root| current.eq_ignore_ascii_case(root))
    {
        return name;
    }
    name.strip_prefix(current.as_ref())
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(name)
}

/// Descriptor request URL: the node URL with `f=json` appended.
pub fn descriptor_request_url(url: &str) -> Result<Url, UrlError> {
    let mut parsed = Url::parse(url).map_err(|err| UrlError::new(url, err))?;
    let has_format = parsed.query_pairs().any(|(key, _)| key == "f");
    if !has_format {
        parsed.query_pairs_mut().append_pair("f", "json");
    }
    Ok(parsed)
}

/// Unfiltered count query for a layer.
pub fn count_query_url(layer_url: &str) -> Result<Url, UrlError> {
    let mut query = as_directory(layer_url)?
        .join("query")
        .map_err(|err| UrlError::new(layer_url, err))?;
    query
        .query_pairs_mut()
        .append_pair("where", "1=1")
        .append_pair("returnCountOnly", "true")
        .append_pair("f", "json");
    Ok(query)
}
