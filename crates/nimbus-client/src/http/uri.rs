//! Hostname and request address construction.

use std::collections::HashMap;

use url::{Position, Url};

use crate::{Error, Result};

/// Prefix marking a query parameter as object metadata.
pub const META_PREFIX: &str = "__nimbus_io__";

/// Path segment under which objects of a collection live.
pub const DATA_RESOURCE: &str = "data";

/// Returns the host serving account-level requests.
pub fn default_hostname(service_domain: &str) -> String {
    service_domain.to_string()
}

/// Returns the host serving requests for objects in `collection`.
pub fn collection_hostname(collection: &str, service_domain: &str) -> String {
    format!("{collection}.{service_domain}")
}

/// Returns the name of the collection every account owns.
pub fn default_collection_name(user_name: &str) -> String {
    format!("dd-{user_name}")
}

/// Builds a request address from `base`, path `segments` and query `params`.
///
/// Segments are percent-encoded, including `/`. An empty final segment
/// produces a trailing slash. Parameters keep their given order, and no `?`
/// is emitted when there are none.
pub fn compute_uri(base: &Url, segments: &[&str], params: &[(&str, &str)]) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("'{base}' cannot be used as a base address")))?
        .pop_if_empty()
        .extend(segments);

    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }

    Ok(url)
}

/// Returns the path and query of `url`, the part covered by the signature.
pub fn path_and_query(url: &Url) -> &str {
    &url[Position::BeforePath..Position::AfterQuery]
}

/// Turns metadata into prefixed query parameters, sorted by key.
pub fn metadata_params(metadata: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = metadata
        .iter()
        .map(|(key, value)| (format!("{META_PREFIX}{key}"), value.clone()))
        .collect();
    params.sort();
    params
}
