//! Local asset CDN for download tests.
//!
//! Registered bodies are served as `application/javascript`; unknown paths answer 404.
//! Extra routes (slow or failing endpoints) take precedence over registered assets.
//! Every request is recorded with its headers.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use tokio::{net::TcpListener, sync::oneshot};
use url::Url;

/// One request as seen by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Default)]
struct Cdn {
    assets: Mutex<BTreeMap<String, Vec<u8>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

async fn serve_asset(State(cdn): State<Arc<Cdn>>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    cdn.requests.lock().push(RecordedRequest {
        path: path.clone(),
        headers: headers
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect(),
    });

    match cdn.assets.lock().get(&path) {
        Some(body) => ([("content-type", "application/javascript")], body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serves registered asset bodies on a random localhost port until dropped.
pub struct AssetServer {
    base_url: Url,
    cdn: Arc<Cdn>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AssetServer {
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        Self::with_routes(Router::new()).await
    }

    /// Server with `routes` in front of the asset table.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn with_routes(routes: Router) -> Self {
        let cdn = Arc::new(Cdn::default());
        let assets = Router::new()
            .fallback(serve_asset)
            .with_state(Arc::clone(&cdn));
        let app = routes.merge(assets);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind asset server");
        let addr = listener.local_addr().expect("asset server addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("run asset server");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("asset server base URL"),
            cdn,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Serve `body` at `path` (leading slash optional).
    pub fn serve<B: Into<Vec<u8>>>(&self, path: &str, body: B) {
        let path = format!("/{}", path.trim_start_matches('/'));
        self.cdn.assets.lock().insert(path, body.into());
    }

    /// # Panics
    ///
    /// Panics if `path` cannot be joined onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.base_url
            .join(path.trim_start_matches('/'))
            .expect("asset server URL")
    }

    /// Requests that reached the asset table, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.cdn.requests.lock().clone()
    }

    #[must_use]
    pub fn hits(&self, path: &str) -> usize {
        self.cdn
            .requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

impl Drop for AssetServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
