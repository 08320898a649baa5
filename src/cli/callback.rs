//! Loopback listener that receives the federated sign-in redirect.
//!
//! Browsers never send the fragment to a server, so a request without a query
//! string gets a small page that moves the fragment into the query and reloads.
//! The first request that carries a query is handed back to the caller.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Router,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Span};
use url::Url;

/// Time allowed for the last response to flush before the server is dropped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const FORWARD_PAGE: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>EduFlow sign-in</title></head>
  <body>
    <p>Completing sign-in...</p>
    <script>
      var fragment = window.location.hash.slice(1);
      window.location.replace(window.location.pathname + "?" + (fragment || "empty=1"));
    </script>
  </body>
</html>
"#;

const DONE_PAGE: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>EduFlow sign-in</title></head>
  <body><p>Sign-in received. You can close this tab and return to the terminal.</p></body>
</html>
"#;

#[derive(Clone)]
struct CallbackState {
    origin: Url,
    sender: Arc<Mutex<Option<oneshot::Sender<Url>>>>,
}

pub struct CallbackListener {
    listener: TcpListener,
    origin: Url,
}

impl CallbackListener {
    /// Binds on the loopback interface. Port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// Returns an error if the port is unavailable.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind callback listener on port {port}"))?;
        let addr = listener.local_addr()?;
        let origin = Url::parse(&format!("http://{addr}/"))?;

        Ok(Self { listener, origin })
    }

    /// Address the sign-in provider should redirect to.
    #[must_use]
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Serves until a redirect arrives or `timeout` elapses. Returns the full
    /// redirect URL, or `None` on timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while waiting.
    pub async fn wait(self, timeout: Duration) -> Result<Option<Url>> {
        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = CallbackState {
            origin: self.origin.clone(),
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        let app = Router::new()
            .fallback(receive)
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(make_span));

        info!("Listening on {}", self.origin);

        let mut server = tokio::spawn(async move {
            axum::serve(self.listener, app.into_make_service())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                    debug!("callback listener shutting down");
                })
                .await
        });

        let received = tokio::time::timeout(timeout, rx).await;

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => return Err(err).context("callback listener failed"),
            Ok(Err(err)) => warn!(%err, "callback listener task ended abnormally"),
            Err(_) => {
                debug!("open connections after grace period, aborting listener");
                server.abort();
            }
        }

        match received {
            Ok(Ok(url)) => Ok(Some(url)),
            Ok(Err(_)) | Err(_) => Ok(None),
        }
    }
}

async fn receive(State(state): State<CallbackState>, uri: Uri) -> Response {
    if uri.query().is_none() {
        return Html(FORWARD_PAGE).into_response();
    }

    let Ok(url) = state.origin.join(&uri.to_string()) else {
        return (StatusCode::BAD_REQUEST, "malformed redirect").into_response();
    };

    let sender = match state.sender.lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => None,
    };
    match sender {
        Some(sender) => {
            let _ = sender.send(url);
            Html(DONE_PAGE).into_response()
        }
        None => (StatusCode::GONE, "sign-in already received").into_response(),
    }
}

fn make_span(request: &Request<Body>) -> Span {
    info_span!(
        "callback.request",
        http.method = %request.method(),
        http.path = request.uri().path(),
    )
}
