//! Captive-portal provisioning routes.
//!
//! Registers the provisioning page on the root path and the known OS
//! captive-portal probe paths, plus the `/configure` endpoint that
//! persists submitted credentials and schedules the restart that applies
//! them.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info};

use provlink_core::{CredentialStore, Credentials, DeviceControl};
use provlink_protocol::http::{html_response, text_response, Method, Request};

use crate::web_server::{ProvisioningServer, RouteHandler};

/// The provisioning form served for every page request.
pub const PROVISION_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Device Setup</title>
<style>
body { font-family: sans-serif; max-width: 22em; margin: 2em auto; padding: 0 1em; }
input { width: 100%; padding: 0.5em; margin: 0.3em 0 1em; box-sizing: border-box; }
button { width: 100%; padding: 0.7em; }
</style>
</head>
<body>
<h1>Connect to WiFi</h1>
<p>Enter the credentials of your wireless network.</p>
<form method="POST" action="/configure">
<label for="ssid">Network name</label>
<input id="ssid" name="ssid" required>
<label for="password">Password</label>
<input id="password" name="password" type="password">
<button type="submit">Save</button>
</form>
</body>
</html>
"#;

/// Served after credentials were persisted successfully.
pub const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Device Setup</title>
</head>
<body>
<h1>Saved</h1>
<p>Credentials stored. The device is restarting and will join your network shortly.</p>
</body>
</html>
"#;

/// Register the captive-portal route set on `server`.
///
/// On a successful submission the handler persists credentials through
/// `store` and schedules `device.restart()` after `restart_delay`, giving
/// the HTTP response time to flush.
pub fn register_routes(
    server: &mut ProvisioningServer,
    store: Arc<dyn CredentialStore>,
    device: Arc<dyn DeviceControl>,
    restart_delay: Duration,
) {
    let page: RouteHandler =
        Arc::new(|_request| async { html_response(200, "OK", PROVISION_PAGE) }.boxed());

    server.add_route("/", Method::Get, page.clone());
    server.add_route("/hotspot-detect.html", Method::Get, page.clone()); // Apple
    server.add_route("/generate_204", Method::Get, page); // Android

    let configure: RouteHandler = Arc::new(move |request| {
        let store = store.clone();
        let device = device.clone();
        async move { handle_configure(request, store, device, restart_delay).await }.boxed()
    });
    server.add_route("/configure", Method::Post, configure);
}

/// Process the provisioning form submission.
async fn handle_configure(
    request: Request,
    store: Arc<dyn CredentialStore>,
    device: Arc<dyn DeviceControl>,
    restart_delay: Duration,
) -> Vec<u8> {
    let Some(ssid) = request.params.get("ssid").filter(|s| !s.is_empty()) else {
        return text_response(400, "Bad Request", "Missing SSID");
    };
    let password = request.params.get("password").cloned().unwrap_or_default();

    let credentials = Credentials::new(ssid.clone(), password);
    match store.save(&credentials) {
        Ok(()) => {
            info!(
                "credentials for '{}' saved, restarting in {:?}",
                credentials.ssid, restart_delay
            );
            tokio::spawn(async move {
                tokio::time::sleep(restart_delay).await;
                device.restart();
            });
            html_response(200, "OK", SUCCESS_PAGE)
        }
        Err(err) => {
            error!("failed to persist credentials: {}", err);
            text_response(500, "Internal Server Error", "Failed to save configuration")
        }
    }
}
