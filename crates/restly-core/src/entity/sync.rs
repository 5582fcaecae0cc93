// ── Entity synchronization ──
//
// The four network verbs share one dispatcher. Each verb decides its
// HTTP method, whether it sends the data as a body, and which response
// statuses count as success.

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use restly_api::{Method, Reply, RestRequest, StatusCode};

use super::Entity;
use crate::error::CoreError;
use crate::observable::Flag;

/// Completion hook run after a successful response has been applied.
pub type Callback = Box<dyn FnOnce() + Send>;

/// A network operation on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// `GET`, replaces the data on `200 OK`.
    Fetch,
    /// `POST` the data, replaces it on `201 Created`.
    Create,
    /// `PUT` the data, replaces it on `201 Created`.
    Replace,
    /// `DELETE`, replaces the data on any `2xx`.
    Remove,
}

impl Verb {
    pub fn method(self) -> Method {
        match self {
            Self::Fetch => Method::GET,
            Self::Create => Method::POST,
            Self::Replace => Method::PUT,
            Self::Remove => Method::DELETE,
        }
    }

    /// Whether a response with `status` is applied to the entity.
    pub fn accepts(self, status: StatusCode) -> bool {
        match self {
            Self::Fetch => status == StatusCode::OK,
            Self::Create | Self::Replace => status == StatusCode::CREATED,
            Self::Remove => status.is_success(),
        }
    }

    fn sends_body(self) -> bool {
        matches!(self, Self::Create | Self::Replace)
    }

    fn request(self, url: &str) -> RestRequest {
        let request = RestRequest::new(self.method(), url);
        match self {
            Self::Fetch => request,
            Self::Create | Self::Replace | Self::Remove => request.json_content(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Create => "create",
            Self::Replace => "replace",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a completed request affected the entity.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The response body replaced the data.
    Applied { status: StatusCode },
    /// `304 Not Modified`: nothing changed.
    NotModified,
    /// A success status this verb does not handle: nothing changed.
    Ignored { status: StatusCode },
    /// The request failed and the error flag is raised. The data is
    /// untouched.
    Failed { error: CoreError },
}

impl SyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Holds the updating flag raised until dropped, so it also comes down
/// when the request future is cancelled.
struct Updating(Flag);

impl Updating {
    fn begin(flag: &Flag) -> Self {
        flag.replace_if_changed(true);
        Self(flag.clone())
    }
}

impl Drop for Updating {
    fn drop(&mut self) {
        self.0.replace_if_changed(false);
    }
}

impl Entity {
    /// `GET` the resource at `url` into the data.
    pub async fn fetch(
        &mut self,
        url: &str,
        callback: Option<Callback>,
    ) -> Result<SyncOutcome, CoreError> {
        self.sync(Verb::Fetch, url, callback).await
    }

    /// `POST` the data to `url` and take the server's representation.
    pub async fn create(
        &mut self,
        url: &str,
        callback: Option<Callback>,
    ) -> Result<SyncOutcome, CoreError> {
        self.sync(Verb::Create, url, callback).await
    }

    /// `PUT` the data to `url` and take the server's representation.
    pub async fn replace(
        &mut self,
        url: &str,
        callback: Option<Callback>,
    ) -> Result<SyncOutcome, CoreError> {
        self.sync(Verb::Replace, url, callback).await
    }

    /// `DELETE` the resource at `url`.
    pub async fn remove(
        &mut self,
        url: &str,
        callback: Option<Callback>,
    ) -> Result<SyncOutcome, CoreError> {
        self.sync(Verb::Remove, url, callback).await
    }

    /// Run `verb` against `url`.
    ///
    /// The updating flag is raised for as long as the request is in flight.
    /// Network and HTTP failures do not return `Err`: they raise the error
    /// flag and come back as [`SyncOutcome::Failed`]. `Err` means the
    /// request could not be built or a response could not be applied.
    ///
    /// On an accepted response the body (an empty object if there is none)
    /// becomes the new data, change tracking restarts from it, `is_got` is
    /// raised, `is_error` is cleared and then `callback` runs.
    pub async fn sync(
        &mut self,
        verb: Verb,
        url: &str,
        callback: Option<Callback>,
    ) -> Result<SyncOutcome, CoreError> {
        let mut request = verb.request(url);
        if verb.sends_body() {
            request = request.body(self.to_json()?);
        }

        let _updating = Updating::begin(&self.is_updating);
        debug!(%verb, url, "sending entity request");

        let reply = match self.client.send(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%verb, url, error = %e, "entity request failed");
                self.is_error.replace_if_changed(true);
                return Ok(SyncOutcome::Failed { error: e.into() });
            }
        };

        match reply {
            Reply::Content { status, body } if verb.accepts(status) => {
                let body = body.unwrap_or_else(|| Value::Object(Map::new()));
                self.set_data(&body)?;
                self.is_got.replace_if_changed(true);
                self.is_error.replace_if_changed(false);
                info!(%verb, url, status = status.as_u16(), "entity synchronized");

                if let Some(callback) = callback {
                    callback();
                }
                Ok(SyncOutcome::Applied { status })
            }
            Reply::Content { status, .. } => {
                debug!(%verb, url, status = status.as_u16(), "response status not handled");
                Ok(SyncOutcome::Ignored { status })
            }
            Reply::NotModified => {
                debug!(%verb, url, "resource not modified");
                Ok(SyncOutcome::NotModified)
            }
        }
    }
}
