//! Byte sources for the resource loader.
//!
//! The loader only needs "give me the bytes behind this location"; where
//! they come from depends on the platform. Native builds read from an asset
//! directory, the browser build goes through `fetch()`, and tests or
//! bundled builds serve bytes from memory.

use std::collections::HashMap;

use futures::future::LocalBoxFuture;

use crate::error::FetchError;

pub trait Fetch {
    fn fetch<'a>(&'a self, location: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// In-memory fetcher keyed by location.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(location, bytes);
        self
    }

    pub fn insert(&mut self, location: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(location.into(), bytes.into());
    }
}

impl Fetch for StaticFetcher {
    fn fetch<'a>(&'a self, location: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        let result = self.files.get(location).cloned().ok_or(FetchError::Missing);
        Box::pin(async move { result })
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{FileFetcher, FETCH_THREADS};

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::io;
    use std::path::PathBuf;

    use futures::channel::oneshot;
    use futures::executor::ThreadPool;
    use futures::future::LocalBoxFuture;

    use super::Fetch;
    use crate::error::FetchError;

    /// Worker threads shared by every read of one fetcher.
    pub const FETCH_THREADS: usize = 4;

    /// Reads locations relative to an asset root on a small worker pool, so
    /// a batch of fetches overlaps without a thread per file.
    #[derive(Debug, Clone)]
    pub struct FileFetcher {
        root: PathBuf,
        pool: ThreadPool,
    }

    impl FileFetcher {
        pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
            let pool = ThreadPool::builder()
                .pool_size(FETCH_THREADS)
                .name_prefix("roomview-fetch-")
                .create()?;
            Ok(Self { root: root.into(), pool })
        }
    }

    impl Fetch for FileFetcher {
        fn fetch<'a>(&'a self, location: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
            let path = self.root.join(location);
            Box::pin(async move {
                let (tx, rx) = oneshot::channel();
                self.pool.spawn_ok(async move {
                    let _ = tx.send(std::fs::read(&path));
                });
                let bytes = rx.await.map_err(|_| FetchError::Cancelled)??;
                Ok(bytes)
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::HttpFetcher;

#[cfg(target_arch = "wasm32")]
mod web {
    use futures::future::LocalBoxFuture;
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;
    use web_sys::Response;

    use super::Fetch;
    use crate::error::FetchError;

    /// Fetches locations relative to `base_url` with the browser `fetch()` API.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        base_url: String,
    }

    impl HttpFetcher {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self { base_url: base_url.into() }
        }

        fn url(&self, location: &str) -> String {
            if self.base_url.is_empty() || self.base_url == "." {
                location.to_string()
            } else {
                format!("{}/{}", self.base_url.trim_end_matches('/'), location)
            }
        }
    }

    fn js_error(value: JsValue) -> FetchError {
        FetchError::Js(format!("{value:?}"))
    }

    impl Fetch for HttpFetcher {
        fn fetch<'a>(&'a self, location: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
            let url = self.url(location);
            Box::pin(async move {
                let window = web_sys::window().ok_or_else(|| FetchError::Js("no global `window`".into()))?;
                let response: Response = JsFuture::from(window.fetch_with_str(&url))
                    .await
                    .map_err(js_error)?
                    .dyn_into()
                    .map_err(js_error)?;
                if !response.ok() {
                    return Err(FetchError::Http { status: response.status() });
                }
                let buffer = JsFuture::from(response.array_buffer().map_err(js_error)?)
                    .await
                    .map_err(js_error)?;
                Ok(js_sys::Uint8Array::new(&buffer).to_vec())
            })
        }
    }
}
