// Configuration portal: open access point plus a small HTTP form
// GET  /            setup page
// GET  /api/config  current values, secrets redacted
// PUT  /api/config  JSON body of `ConfigUpdate`; accepted values end the portal
// The boot task blocks here until a submission arrives or the timeout passes.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_svc::http::{Headers, Method};
use embedded_svc::io::{Read, Write};
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpConnection, EspHttpServer, Request};

use anyhow::{anyhow, Result};
use log::{info, warn};
use serde::Serialize;

use climate_node_shared::config::Configuration;
use climate_node_shared::portal::{ConfigUpdate, ConfigView, PortalOutcome, PORTAL_TIMEOUT_SECS};

use crate::wifi_client::WiFiClient;

const MAX_HTTP_BODY: usize = 1024;
const SERVER_STACK_SIZE: usize = 10 * 1024;
const POLL_MS: u32 = 250;
// Lets the browser receive the save response before the radio goes down
const RESPONSE_GRACE_MS: u32 = 1000;

static SUBMISSION: Signal<CriticalSectionRawMutex, Configuration> = Signal::new();

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Climate Node Setup</title>
<style>
body { font-family: sans-serif; max-width: 420px; margin: 1em auto; padding: 0 1em; }
label { display: block; margin-top: .6em; }
input { width: 100%; box-sizing: border-box; padding: .3em; }
button { margin-top: 1em; padding: .5em 1.5em; }
#msg { margin-top: 1em; }
</style>
</head>
<body>
<h2>Climate Node Setup</h2>
<form id="f">
<label>WiFi SSID<input name="wifi_ssid"></label>
<label>WiFi password<input name="wifi_password" type="password" placeholder="unchanged"></label>
<label><input data-clears="wifi_password" type="checkbox" style="width:auto"> Open network (clear password)</label>
<label>MQTT host<input name="mqtt_host"></label>
<label>MQTT port<input name="mqtt_port" type="number" min="1" max="65535"></label>
<label>MQTT user<input name="mqtt_user"></label>
<label>MQTT password<input name="mqtt_password" type="password" placeholder="unchanged"></label>
<label><input data-clears="mqtt_password" type="checkbox" style="width:auto"> Clear MQTT password</label>
<label>Topic prefix<input name="topic_prefix"></label>
<label>Sleep interval (s)<input name="sleep_interval_secs" type="number" min="1"></label>
<label>Contrast (0-255)<input name="contrast" type="number" min="0" max="255"></label>
<label><input name="send_telemetry" type="checkbox" style="width:auto"> Send telemetry</label>
<button type="submit">Save and restart</button>
</form>
<div id="msg"></div>
<script>
const f = document.getElementById('f');
const numeric = ['mqtt_port', 'sleep_interval_secs', 'contrast'];
fetch('/api/config').then(r => r.json()).then(c => {
  for (const k of ['wifi_ssid', 'mqtt_host', 'mqtt_user', 'topic_prefix', ...numeric]) f.elements[k].value = c[k];
  f.elements.send_telemetry.checked = c.send_telemetry;
});
f.addEventListener('submit', e => {
  e.preventDefault();
  const body = {};
  for (const el of f.elements) {
    if (!el.name) continue;
    if (el.type === 'checkbox') body[el.name] = el.checked;
    else if (numeric.includes(el.name)) { if (el.value !== '') body[el.name] = Number(el.value); }
    else body[el.name] = el.value;
  }
  for (const el of f.querySelectorAll('[data-clears]')) if (el.checked) body[el.dataset.clears] = null;
  fetch('/api/config', { method: 'PUT', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body) })
    .then(r => r.json())
    .then(r => { document.getElementById('msg').textContent = r.error ? r.error : 'Saved, restarting...'; });
});
</script>
</body>
</html>
"#;

fn read_request_body(req: &mut Request<&mut EspHttpConnection<'_>>) -> Result<Vec<u8>> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len > MAX_HTTP_BODY {
        return Err(anyhow!("request body too large"));
    }

    let mut body = vec![0_u8; len];
    if len > 0 {
        req.read_exact(&mut body)?;
    }
    Ok(body)
}

fn write_json<T: Serialize>(
    req: Request<&mut EspHttpConnection<'_>>,
    status: u16,
    payload: &T,
) -> Result<()> {
    let body = serde_json::to_vec(payload)?;
    req.into_response(
        status,
        None,
        &[("Content-Type", "application/json; charset=utf-8")],
    )?
    .write_all(&body)?;
    Ok(())
}

fn write_error(req: Request<&mut EspHttpConnection<'_>>, message: &str) -> Result<()> {
    write_json(req, 400, &serde_json::json!({ "error": message }))
}

fn start_server(current: Configuration) -> Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: SERVER_STACK_SIZE,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&conf)?;

    server.fn_handler::<anyhow::Error, _>("/", Method::Get, move |req| {
        req.into_ok_response()?.write_all(INDEX_HTML.as_bytes())?;
        Ok(())
    })?;

    {
        let view = ConfigView::from(&current);
        server.fn_handler::<anyhow::Error, _>("/api/config", Method::Get, move |req| {
            write_json(req, 200, &view)
        })?;
    }

    server.fn_handler::<anyhow::Error, _>("/api/config", Method::Put, move |mut req| {
        let body = read_request_body(&mut req)?;
        let update = match ConfigUpdate::from_json(&body) {
            Ok(update) => update,
            Err(e) => return write_error(req, &e.to_string()),
        };
        if let Err(e) = update.validate() {
            warn!("⚠️ Rejected portal submission: {}", e);
            return write_error(req, &e.to_string());
        }

        let next = update.apply(&current);
        info!("📝 Portal submission accepted for SSID '{}'", next.wifi_ssid);
        let view = ConfigView::from(&next);
        SUBMISSION.signal(next);
        write_json(req, 200, &view)
    })?;

    Ok(server)
}

/// Serve the portal until a valid submission or the timeout
pub fn serve(wifi: &mut WiFiClient, current: &Configuration) -> PortalOutcome {
    SUBMISSION.reset();

    if let Err(e) = wifi.start_access_point() {
        return PortalOutcome::Failed(format!("access point failed: {:?}", e));
    }
    let _server = match start_server(current.clone()) {
        Ok(server) => server,
        Err(e) => return PortalOutcome::Failed(format!("http server failed: {}", e)),
    };
    info!("🌐 Portal listening, timeout {}s", PORTAL_TIMEOUT_SECS);

    let polls = PORTAL_TIMEOUT_SECS * 1000 / u64::from(POLL_MS);
    for _ in 0..polls {
        if let Some(config) = SUBMISSION.try_take() {
            FreeRtos::delay_ms(RESPONSE_GRACE_MS);
            return PortalOutcome::Submitted(config);
        }
        FreeRtos::delay_ms(POLL_MS);
    }
    PortalOutcome::TimedOut
}
