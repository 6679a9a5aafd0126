//!
//! Checks that a content path can be resolved before a name points at it.
//!

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::path::ContentPath;

/// Public gateway used when none is configured.
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io/";

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// Network/protocol failure while asking the gateway.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered, but not with the content.
    #[error("gateway responded with {status} for {url}")]
    Unavailable { status: StatusCode, url: Url },

    #[error("can't build a gateway url for {path}: {source}")]
    InvalidUrl {
        path: String,
        source: url::ParseError,
    },
}

/// Resolves content paths. Only success matters to the caller.
#[async_trait]
pub trait ContentResolver: Send + Sync + Debug {
    async fn resolve(&self, path: &ContentPath) -> Result<(), ResolveError>;
}

/// Resolves paths by asking an HTTP gateway for them with a `HEAD` request.
#[derive(Debug, Clone)]
pub struct GatewayResolver {
    client: reqwest::Client,
    gateway: Url,
}

impl GatewayResolver {
    pub fn new(gateway: Url) -> Self {
        Self::with_client(reqwest::Client::new(), gateway)
    }

    pub fn with_client(client: reqwest::Client, gateway: Url) -> Self {
        Self { client, gateway }
    }

    pub fn gateway(&self) -> &Url {
        &self.gateway
    }

    /// Gateway url of `path`. Every segment is percent-encoded, so `%`, `?`
    /// and `#` stay part of the path.
    fn url_for(&self, path: &ContentPath) -> Result<Url, ResolveError> {
        let mut url = self.gateway.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| ResolveError::InvalidUrl {
                path: path.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .extend(path.segments());
        Ok(url)
    }
}

impl Default for GatewayResolver {
    /// Resolver using [`DEFAULT_GATEWAY`].
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_GATEWAY).expect("default gateway is a valid url"))
    }
}

#[async_trait]
impl ContentResolver for GatewayResolver {
    async fn resolve(&self, path: &ContentPath) -> Result<(), ResolveError> {
        let url = self.url_for(path)?;
        tracing::debug!("Resolving {path} through {url}");
        let response = self.client.head(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Unavailable { status, url });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{prelude::*, Method::HEAD};

    fn url_for(gateway: &str, path: &str) -> Url {
        let resolver = GatewayResolver::new(Url::parse(gateway).unwrap());
        resolver.url_for(&ContentPath::parse(path).unwrap()).unwrap()
    }

    #[test]
    fn gateway_urls() {
        let path = "/ipfs/QmatmE9msSfkKxoffpHwNLNKgwZG8eT9Bud6YoPab52vpy/a";
        let expected =
            "https://gateway.example/base/ipfs/QmatmE9msSfkKxoffpHwNLNKgwZG8eT9Bud6YoPab52vpy/a";
        assert_eq!(url_for("https://gateway.example/base", path).as_str(), expected);
        assert_eq!(url_for("https://gateway.example/base/", path).as_str(), expected);
        assert_eq!(
            url_for("https://gateway.example", "/content/abc").as_str(),
            "https://gateway.example/content/abc"
        );
    }

    #[test]
    fn encoded_dot_segments_stay_in_place() {
        let url = url_for("https://gateway.example/", "/ipns/%2e%2e/%2e%2e/other");
        assert_eq!(
            url.as_str(),
            "https://gateway.example/ipns/%252e%252e/%252e%252e/other"
        );
    }

    #[test]
    fn query_and_fragment_characters_stay_in_the_path() {
        let url = url_for("https://gateway.example/", "/content/abc?x=1");
        assert_eq!(url.path(), "/content/abc%3Fx=1");
        assert_eq!(url.query(), None);

        let url = url_for("https://gateway.example/", "/content/abc#frag");
        assert_eq!(url.path(), "/content/abc%23frag");
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn gateway_query_is_dropped() {
        let url = url_for("https://gateway.example/base?token=1#top", "/content/abc");
        assert_eq!(url.as_str(), "https://gateway.example/base/content/abc");
    }

    #[test]
    fn default_gateway() {
        assert_eq!(GatewayResolver::default().gateway().as_str(), DEFAULT_GATEWAY);
    }

    #[tokio::test]
    async fn resolves_available_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/content/abc");
                then.status(200);
            })
            .await;

        let resolver = GatewayResolver::new(Url::parse(&server.base_url()).unwrap());
        let path = ContentPath::parse("/content/abc").unwrap();
        resolver.resolve(&path).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/content/missing");
                then.status(404);
            })
            .await;

        let resolver = GatewayResolver::new(Url::parse(&server.base_url()).unwrap());
        let path = ContentPath::parse("/content/missing").unwrap();
        let err = resolver.resolve(&path).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Unavailable { status, .. } if status == StatusCode::NOT_FOUND
        ));
    }
}
