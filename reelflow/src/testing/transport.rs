//! An in-memory transport with canned responses.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::errors::JobError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};

type Reply = Result<HttpResponse, JobError>;

#[derive(Debug)]
struct Route {
    method: Method,
    fragment: String,
    replies: VecDeque<Reply>,
}

/// Answers requests from scripted routes and records every request.
///
/// A route matches on the method and a URL fragment; when several routes
/// match, the longest fragment wins. Replies for a route are served in the
/// order they were scripted and the last one repeats, which suits status
/// polling. Unmatched requests fail with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for requests to `fragment`.
    pub fn respond(&self, method: Method, fragment: &str, response: HttpResponse) {
        self.push(method, fragment, Ok(response));
    }

    /// Queues several responses in order.
    pub fn respond_seq(&self, method: Method, fragment: &str, responses: Vec<HttpResponse>) {
        for response in responses {
            self.respond(method, fragment, response);
        }
    }

    /// Queues a transport-level failure.
    pub fn fail(&self, method: Method, fragment: &str, error: JobError) {
        self.push(method, fragment, Err(error));
    }

    fn push(&self, method: Method, fragment: &str, reply: Reply) {
        let mut routes = self.routes.lock();
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.fragment == fragment)
        {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                fragment: fragment.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// Every request sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    /// Requests whose URL contains `fragment`.
    #[must_use]
    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .cloned()
            .collect()
    }

    /// Number of requests whose URL contains `fragment`.
    #[must_use]
    pub fn call_count(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }

    fn reply_for(&self, request: &HttpRequest) -> Reply {
        let mut routes = self.routes.lock();
        let route = routes
            .iter_mut()
            .filter(|r| r.method == request.method && request.url.contains(&r.fragment))
            .max_by_key(|r| r.fragment.len());

        match route {
            Some(route) if route.replies.len() > 1 => route
                .replies
                .pop_front()
                .unwrap_or_else(|| Err(JobError::transport("route drained"))),
            Some(route) => route
                .replies
                .front()
                .cloned()
                .unwrap_or_else(|| Err(JobError::transport("route drained"))),
            None => Err(JobError::transport(format!(
                "no scripted response for {} {}",
                request.method, request.url
            ))),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, JobError> {
        let reply = self.reply_for(&request);
        self.requests.lock().push(request);
        reply
    }
}
