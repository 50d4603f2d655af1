use super::basic::SError;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON text
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: String) -> HttpRequest {
        HttpRequest { method: HttpMethod::Get, url, headers: Vec::new(), body: None }
    }

    pub fn post_json(url: String, body: String) -> HttpRequest {
        HttpRequest { method: HttpMethod::Post, url, headers: Vec::new(), body: Some(body) }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> HttpRequest {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Used to permit multiple http implementations, so the REST store can be
/// exercised in tests without a network.
///
/// async_trait is required to be able to hold a Box<dyn HttpRequester>.
/// This is marked ?Send because surf's futures are not Send under every
/// client backend, and nothing here is shared across threads.
#[async_trait::async_trait(?Send)]
pub trait HttpRequester {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, SError>;
}

#[cfg(all(not(target_arch = "wasm32"), feature = "http_standalone"))]
pub mod standalone {
    use std::time::Duration;

    use crate::util::basic::SError;

    use super::{HttpMethod, HttpRequest, HttpRequester, HttpResponse};

    pub struct StandaloneAppRequester {
        timeout: Duration,
    }

    impl StandaloneAppRequester {
        pub fn new(timeout: Duration) -> StandaloneAppRequester {
            StandaloneAppRequester { timeout }
        }

        pub fn new_boxed(timeout: Duration) -> Box<StandaloneAppRequester> {
            Box::new(StandaloneAppRequester::new(timeout))
        }
    }

    #[async_trait::async_trait(?Send)]
    impl HttpRequester for StandaloneAppRequester {
        async fn send(&self, req: HttpRequest) -> Result<HttpResponse, SError> {
            // surf has no dependence on tokio, so this runs directly
            // under async_std::task::block_on.
            let mut builder = match req.method {
                HttpMethod::Get => surf::get(&req.url),
                HttpMethod::Post => surf::post(&req.url),
            };
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = req.body {
                builder = builder
                    .body(surf::Body::from_string(body))
                    .content_type(surf::http::mime::JSON);
            }

            let url = req.url.clone();
            let exchange = async move {
                let mut res = builder.await.map_err(|e| format!("{e}"))?;
                let status = res.status() as u16;
                let body = res.body_string().await.map_err(|e| format!("{e}"))?;
                Ok::<HttpResponse, SError>(HttpResponse { status, body })
            };

            match async_std::future::timeout(self.timeout, exchange).await {
                Ok(res) => res,
                Err(_) => {
                    tracing::warn!("Request to {} timed out after {:?}", url, self.timeout);
                    Err(format!("Request to {url} timed out after {:?}", self.timeout))
                }
            }
        }
    }
}

#[cfg(any(test, feature = "testlib"))]
pub mod testlib {
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    use crate::util::basic::SError;

    use super::{HttpRequest, HttpRequester, HttpResponse};

    /// Replays canned responses in order, and records every request made.
    /// `requests` can be cloned out before the requester is boxed away.
    pub struct ScriptedHttpRequester {
        pub responses: RefCell<VecDeque<Result<HttpResponse, SError>>>,
        pub requests: Rc<RefCell<Vec<HttpRequest>>>,
    }

    impl ScriptedHttpRequester {
        pub fn new(responses: Vec<Result<HttpResponse, SError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into_iter().collect()),
                requests: Rc::new(RefCell::new(Vec::new())),
            }
        }

        pub fn ok(status: u16, body: &str) -> Result<HttpResponse, SError> {
            Ok(HttpResponse { status, body: body.to_string() })
        }
    }

    #[async_trait::async_trait(?Send)]
    impl HttpRequester for ScriptedHttpRequester {
        async fn send(&self, req: HttpRequest) -> Result<HttpResponse, SError> {
            self.requests.borrow_mut().push(req);
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err("No scripted response left".to_string()))
        }
    }
}
