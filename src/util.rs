//! Small helpers shared by the remote-service clients.

use url::Url;

use crate::types::RagError;

/// Appends path segments to a base URL without clobbering any path the
/// base already carries (plain `Url::join` would replace the last
/// segment of `.../v1`).
pub(crate) fn join_endpoint(base: &Url, segments: &[&str]) -> Result<Url, RagError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| RagError::Config(format!("base URL '{base}' cannot carry a path")))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}
