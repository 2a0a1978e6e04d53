//! HTTP task store: REST client for the board server.
//!
//! Talks to the `/api/tasks` routes. Status codes map onto
//! [`StoreError`]: 404 is [`StoreError::NotFound`], 409 is
//! [`StoreError::VersionConflict`], anything else non-2xx is
//! [`StoreError::Status`].

use reqwest::StatusCode;
use url::Url;

use boardsync_proto::task::{NewTask, Task, TaskId, TaskUpdate};

use super::{StoreError, TaskStore};

/// REST client for the board's task API.
pub struct HttpTaskStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTaskStore {
    /// Creates a store for the given base URL (e.g., `http://127.0.0.1:9100`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Request`] if the base URL cannot be parsed.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Request(format!("invalid base url {base_url}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the task collection.
    fn collection_url(&self) -> Result<Url, StoreError> {
        self.base_url
            .join("/api/tasks")
            .map_err(|e| StoreError::Request(e.to_string()))
    }

    /// URL of a single task.
    fn item_url(&self, id: TaskId) -> Result<Url, StoreError> {
        self.base_url
            .join(&format!("/api/tasks/{id}"))
            .map_err(|e| StoreError::Request(e.to_string()))
    }
}

impl TaskStore for HttpTaskStore {
    async fn fetch_all(&self) -> Result<Vec<Task>, StoreError> {
        let response = self
            .client
            .get(self.collection_url()?)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response, None)?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        let response = self
            .client
            .post(self.collection_url()?)
            .json(&new)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response, None)?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<Task, StoreError> {
        let response = self
            .client
            .put(self.item_url(id)?)
            .json(&update)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response, Some(id))?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.item_url(id)?)
            .send()
            .await
            .map_err(request_error)?;
        check_status(response, Some(id))?;
        Ok(())
    }
}

/// Maps transport-level failures onto [`StoreError::Request`].
fn request_error(e: reqwest::Error) -> StoreError {
    StoreError::Request(e.to_string())
}

/// Maps the response status onto the store error taxonomy.
fn check_status(
    response: reqwest::Response,
    id: Option<TaskId>,
) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.unwrap_or_default())),
        StatusCode::CONFLICT => Err(StoreError::VersionConflict(id.unwrap_or_default())),
        other => Err(StoreError::Status(other.as_u16())),
    }
}
