use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Contact, ContactDraft, ContactId},
    error::{DirectoryError, ErrorBody},
    protocol::{bearer, collection_path, item_path, AUTH_HEADER},
};
use url::Url;

/// Typed operations against the remote contact resource. A thin mapping:
/// no retries, no caching, errors always propagated.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Contact>, DirectoryError>;
    async fn get_by_id(&self, id: &ContactId) -> Result<Contact, DirectoryError>;
    async fn create(&self, draft: &ContactDraft) -> Result<Contact, DirectoryError>;
    async fn update(&self, id: &ContactId, draft: &ContactDraft)
        -> Result<Contact, DirectoryError>;
    async fn delete(&self, id: &ContactId) -> Result<(), DirectoryError>;
}

/// Seam to the externally managed auth token store. The repository attaches
/// a bearer header whenever a token is present.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

pub struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

pub struct HttpContactRepository {
    http: Client,
    base_url: Url,
    token: Arc<dyn TokenProvider>,
}

impl HttpContactRepository {
    pub fn new(base_url: Url, token: Arc<dyn TokenProvider>) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(http: Client, mut base_url: Url, token: Arc<dyn TokenProvider>) -> Self {
        // Url::join treats a path without a trailing slash as a file and
        // would drop its last segment.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Self {
            http,
            base_url,
            token,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, DirectoryError> {
        self.base_url
            .join(path)
            .map_err(|err| DirectoryError::Network {
                message: format!("invalid endpoint {path}: {err}"),
            })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.token() {
            Some(token) => request.header(AUTH_HEADER, bearer(&token)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DirectoryError> {
        self.authorized(request)
            .send()
            .await
            .map_err(|err| DirectoryError::Network {
                message: err.to_string(),
            })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, DirectoryError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::response_error(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|err| DirectoryError::Server {
                status: status.as_u16(),
                message: format!("undecodable response body: {err}"),
            })
    }

    async fn expect_success(response: Response) -> Result<(), DirectoryError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::response_error(response).await)
        }
    }

    async fn response_error(response: Response) -> DirectoryError {
        let status = response.status();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        };
        match status {
            StatusCode::NOT_FOUND => DirectoryError::NotFound,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                DirectoryError::Rejected { message }
            }
            _ => DirectoryError::Server {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl ContactRepository for HttpContactRepository {
    async fn list(&self) -> Result<Vec<Contact>, DirectoryError> {
        let url = self.endpoint(&collection_path())?;
        let response = self.send(self.http.get(url)).await?;
        Self::decode(response).await
    }

    async fn get_by_id(&self, id: &ContactId) -> Result<Contact, DirectoryError> {
        let url = self.endpoint(&item_path(id))?;
        let response = self.send(self.http.get(url)).await?;
        Self::decode(response).await
    }

    async fn create(&self, draft: &ContactDraft) -> Result<Contact, DirectoryError> {
        let url = self.endpoint(&collection_path())?;
        let response = self.send(self.http.post(url).json(draft)).await?;
        Self::decode(response).await
    }

    async fn update(
        &self,
        id: &ContactId,
        draft: &ContactDraft,
    ) -> Result<Contact, DirectoryError> {
        let url = self.endpoint(&item_path(id))?;
        let response = self.send(self.http.put(url).json(draft)).await?;
        Self::decode(response).await
    }

    async fn delete(&self, id: &ContactId) -> Result<(), DirectoryError> {
        let url = self.endpoint(&item_path(id))?;
        let response = self.send(self.http.delete(url)).await?;
        Self::expect_success(response).await
    }
}

#[cfg(test)]
#[path = "tests/repository_tests.rs"]
mod tests;
