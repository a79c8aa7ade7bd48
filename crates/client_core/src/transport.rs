use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use shared::{
    domain::{Story, StoryFields, StoryId, User},
    error::{ApiErrorEnvelope, ApiException, ErrorCode},
    protocol::{
        AuthRequest, AuthResponse, Credentials, StoriesResponse, StoryRequest, StoryResponse,
        TokenRequest, UserResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::{RemoteResult, RemoteStoryService, RemoteUserService};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Talks to the story feed REST API.
pub struct HttpFeedService {
    http: Client,
    base_url: Url,
    story_limit: Option<u32>,
}

impl HttpFeedService {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Self::with_client(base_url, http)
    }

    pub fn with_client(base_url: &str, http: Client) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid api base url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("api base url '{base_url}' cannot be used as a base"));
        }
        Ok(Self {
            http,
            base_url,
            story_limit: None,
        })
    }

    pub fn with_story_limit(mut self, limit: Option<u32>) -> Self {
        self.story_limit = limit;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn favorite_endpoint(&self, user: &User, story_id: &StoryId) -> Url {
        self.endpoint(&[
            "users",
            user.username.as_str(),
            "favorites",
            story_id.as_str(),
        ])
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let response = request
            .send()
            .await
            .map_err(|err| ApiException::network(format!("request failed: {err}")))?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "http: response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = ErrorCode::from_status(status.as_u16());
            return Err(match serde_json::from_str::<ApiErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let mut err = ApiException::from(envelope.error);
                    err.code = code;
                    err
                }
                Err(_) => ApiException::new(code, status.to_string()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ApiException::network(format!("invalid response body: {err}")))
    }

    async fn authenticate(&self, path: &str, credentials: Credentials) -> RemoteResult<User> {
        let response: AuthResponse = self
            .send(
                self.http
                    .post(self.endpoint(&[path]))
                    .json(&AuthRequest { user: credentials }),
            )
            .await?;
        Ok(response.user.into_user(response.token))
    }
}

#[async_trait]
impl RemoteUserService for HttpFeedService {
    async fn login(&self, username: &str, password: &str) -> RemoteResult<User> {
        self.authenticate(
            "login",
            Credentials {
                username: username.to_string(),
                password: password.to_string(),
                name: None,
            },
        )
        .await
    }

    async fn signup(&self, username: &str, password: &str, name: &str) -> RemoteResult<User> {
        self.authenticate(
            "signup",
            Credentials {
                username: username.to_string(),
                password: password.to_string(),
                name: Some(name.to_string()),
            },
        )
        .await
    }

    async fn fetch_by_token(&self, token: &str, username: &str) -> RemoteResult<User> {
        let response: UserResponse = self
            .send(
                self.http
                    .get(self.endpoint(&["users", username]))
                    .query(&[("token", token)]),
            )
            .await?;
        Ok(response.user.into_user(token))
    }

    async fn add_favorite(&self, user: &User, story_id: &StoryId) -> RemoteResult<()> {
        let _: IgnoredAny = self
            .send(
                self.http
                    .post(self.favorite_endpoint(user, story_id))
                    .json(&TokenRequest {
                        token: user.login_token.clone(),
                    }),
            )
            .await?;
        Ok(())
    }

    async fn remove_favorite(&self, user: &User, story_id: &StoryId) -> RemoteResult<()> {
        let _: IgnoredAny = self
            .send(
                self.http
                    .delete(self.favorite_endpoint(user, story_id))
                    .json(&TokenRequest {
                        token: user.login_token.clone(),
                    }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStoryService for HttpFeedService {
    async fn fetch_all(&self) -> RemoteResult<Vec<Story>> {
        let mut request = self.http.get(self.endpoint(&["stories"]));
        if let Some(limit) = self.story_limit {
            request = request.query(&[("limit", limit)]);
        }
        let response: StoriesResponse = self.send(request).await?;
        Ok(response.stories.into_iter().map(Story::from).collect())
    }

    async fn create(&self, user: &User, fields: &StoryFields) -> RemoteResult<Story> {
        let response: StoryResponse = self
            .send(self.http.post(self.endpoint(&["stories"])).json(&StoryRequest {
                token: user.login_token.clone(),
                story: fields.clone(),
            }))
            .await?;
        Ok(response.story.into())
    }

    async fn update(
        &self,
        user: &User,
        story_id: &StoryId,
        fields: &StoryFields,
    ) -> RemoteResult<Story> {
        let response: StoryResponse = self
            .send(
                self.http
                    .patch(self.endpoint(&["stories", story_id.as_str()]))
                    .json(&StoryRequest {
                        token: user.login_token.clone(),
                        story: fields.clone(),
                    }),
            )
            .await?;
        Ok(response.story.into())
    }

    async fn delete(&self, user: &User, story_id: &StoryId) -> RemoteResult<()> {
        let _: IgnoredAny = self
            .send(
                self.http
                    .delete(self.endpoint(&["stories", story_id.as_str()]))
                    .json(&TokenRequest {
                        token: user.login_token.clone(),
                    }),
            )
            .await?;
        Ok(())
    }
}
