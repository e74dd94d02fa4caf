use crate::Artifact;
use crate::error::FetchError;
use url::Url;

/// The outcome of one `load`, as broadcast to every listener.
///
/// Listeners receive responses for every identifier the service handles;
/// [`url`](Self::url) is there so each listener can ignore the ones it did
/// not ask for.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub url: Url,
    pub result: Result<Artifact, FetchError>,
}

impl Response {
    pub fn success(url: Url, artifact: Artifact) -> Self {
        Self { url, result: Ok(artifact) }
    }

    pub fn failure(url: Url, error: FetchError) -> Self {
        Self { url, result: Err(error) }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.result.as_ref().err()
    }
}
