//! Request identity keys.

use sha2::{Digest, Sha256};

use crate::ResourceRequest;

/// Compute the cache key for a method and canonical URL.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// URL under which a request is stored. The fragment never reaches the
/// network, so it is not part of the identity.
pub fn request_url(request: &ResourceRequest) -> String {
    let mut url = request.url.clone();
    url.set_fragment(None);
    url.into()
}

/// Cache key of an intercepted request. The request mode is not part of it.
pub fn request_key(request: &ResourceRequest) -> String {
    compute_cache_key(&request.method, &request_url(request))
}
