use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::data::ingest::IngestError;
use crate::server::api::{self, ApiError};
use crate::server::AppState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
    /// Binary payload; sent instead of `body` when set.
    pub bytes: Option<Vec<u8>>,
    /// Download file name, sent as `Content-Disposition: attachment`.
    pub attachment: Option<&'static str>,
}

impl HttpResponse {
    fn json(status_code: u16, status_text: &'static str, body: String) -> Self {
        Self {
            status_code,
            status_text,
            content_type: "application/json",
            body,
            bytes: None,
            attachment: None,
        }
    }

    fn ok(body: String) -> Self {
        Self::json(200, "OK", body)
    }

    fn created(body: String) -> Self {
        Self::json(201, "Created", body)
    }

    fn download(content_type: &'static str, file_name: &'static str, body: String) -> Self {
        Self {
            status_code: 200,
            status_text: "OK",
            content_type,
            body,
            bytes: None,
            attachment: Some(file_name),
        }
    }

    fn download_bytes(content_type: &'static str, file_name: &'static str, bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            ..Self::download(content_type, file_name, String::new())
        }
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let headers = [(header::CONTENT_TYPE, self.content_type)];
        let mut response = match self.bytes {
            Some(bytes) => (status, headers, bytes).into_response(),
            None => (status, headers, self.body).into_response(),
        };
        if let Some(name) = self.attachment {
            if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
                response
                    .headers_mut()
                    .insert(header::CONTENT_DISPOSITION, value);
            }
        }
        response
    }
}

/// Dispatches one request. `path` may carry a query string.
pub fn route_request(state: &AppState, method: &str, path: &str, body: &[u8]) -> HttpResponse {
    let (path, query) = path.split_once('?').unwrap_or((path, ""));
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let result = match (method, segments.as_slice()) {
        ("GET", []) => Ok(HttpResponse {
            status_code: 200,
            status_text: "OK",
            content_type: "text/html; charset=utf-8",
            body: index_html(),
            bytes: None,
            attachment: None,
        }),
        ("GET", ["api", "health"]) => api::health_payload(state).map(HttpResponse::ok),
        ("GET", ["api", "palette"]) => api::palette_payload(&state.config).map(HttpResponse::ok),
        ("POST", ["api", "sessions"]) => {
            api::create_session_payload(state, query, body).map(HttpResponse::created)
        }
        ("POST", ["api", "sessions", "restore"]) => {
            api::restore_session_payload(state, body).map(HttpResponse::created)
        }
        (method, ["api", "sessions", id, rest @ ..]) => session_route(state, method, id, rest, body),
        _ => return error_response(404, "Not Found", "Route not found"),
    };

    result.unwrap_or_else(api_error_response)
}

fn session_route(
    state: &AppState,
    method: &str,
    id: &str,
    rest: &[&str],
    body: &[u8],
) -> Result<HttpResponse, ApiError> {
    let id = api::parse_session_id(id)?;
    let response = match (method, rest) {
        ("GET", []) => HttpResponse::ok(api::session_payload(state, id)?),
        ("DELETE", []) => HttpResponse::ok(api::delete_session_payload(state, id)?),
        ("PUT", ["columns"]) => HttpResponse::ok(api::columns_payload(state, id, body)?),
        ("GET", ["filters"]) => HttpResponse::ok(api::filter_options_payload(state, id)?),
        ("PUT", ["filters"]) => HttpResponse::ok(api::filters_put_payload(state, id, body)?),
        ("PUT", ["reference"]) => HttpResponse::ok(api::reference_payload(state, id, body)?),
        ("GET", ["reference", "values"]) => {
            HttpResponse::ok(api::reference_values_payload(state, id)?)
        }
        ("GET", ["colors"]) => HttpResponse::ok(api::colors_payload(state, id)?),
        ("POST", ["colors"]) => HttpResponse::ok(api::colors_assign_payload(state, id, body)?),
        ("DELETE", ["colors"]) => HttpResponse::ok(api::colors_reset_payload(state, id)?),
        ("PUT", ["display"]) => HttpResponse::ok(api::display_payload(state, id, body)?),
        ("GET", ["map"]) => HttpResponse::ok(api::map_payload(state, id)?),
        ("GET", ["export.csv"]) => HttpResponse::download(
            "text/csv; charset=utf-8",
            "geodash-export.csv",
            api::export_csv_payload(state, id)?,
        ),
        ("GET", ["export.xlsx"]) => HttpResponse::download_bytes(
            XLSX_CONTENT_TYPE,
            "geodash-export.xlsx",
            api::export_xlsx_payload(state, id)?,
        ),
        ("GET", ["settings"]) => HttpResponse::download(
            "application/json",
            "geodash-settings.json",
            api::settings_payload(state, id)?,
        ),
        ("POST", ["settings"]) => HttpResponse::ok(api::settings_load_payload(state, id, body)?),
        _ => error_response(404, "Not Found", "Route not found"),
    };
    Ok(response)
}

fn api_error_response(err: ApiError) -> HttpResponse {
    match err {
        ApiError::BadRequest(message) => error_response(400, "Bad Request", &message),
        ApiError::NotFound => error_response(404, "Not Found", "Session not found"),
        ApiError::Prompt(IngestError::MissingSelection { missing }) => prompt_response(&missing),
        ApiError::Prompt(other) => error_response(400, "Bad Request", &other.to_string()),
        ApiError::Internal(message) => {
            error!(%message, "request failed");
            error_response(500, "Internal Server Error", &message)
        }
    }
}

/// 409 asking the user to finish the column selection.
fn prompt_response(missing: &[&'static str]) -> HttpResponse {
    let message = IngestError::MissingSelection {
        missing: missing.to_vec(),
    }
    .to_string();
    let fallback = "{\n  \"status\": \"error\",\n  \"message\": \"Select columns first\"\n}".to_string();
    let body = serde_json::to_string_pretty(&serde_json::json!({
        "status": "error",
        "message": message,
        "prompt": missing,
    }))
    .unwrap_or(fallback);
    HttpResponse::json(409, "Conflict", body)
}

pub fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse::json(
        status_code,
        status_text,
        format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    )
}

fn index_html() -> String {
    r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>Geodash</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.Default.css" />
  <style>
    body { font-family: Arial, sans-serif; margin: 0; display: flex; height: 100vh; }
    aside { width: 340px; overflow: auto; padding: 12px; border-right: 1px solid #ddd; box-sizing: border-box; }
    main { flex: 1; display: flex; flex-direction: column; }
    #map { flex: 1; }
    .card { border: 1px solid #ddd; border-radius: 8px; padding: 10px; margin: 10px 0; }
    label { display: block; margin: 6px 0 2px; font-weight: 600; }
    select, input { width: 100%; box-sizing: border-box; padding: 4px; }
    select[multiple] { min-height: 80px; }
    button { margin-top: 8px; padding: 6px 10px; }
    #status { font-size: 0.85rem; color: #555; padding: 6px 10px; border-top: 1px solid #ddd; white-space: pre-wrap; }
  </style>
</head>
<body>
  <aside>
    <h2>Geodash</h2>
    <div class="card">
      <label for="file">Spreadsheet (.xlsx, .csv)</label>
      <input id="file" type="file" accept=".xlsx,.csv" />
      <label for="restore">Or restore saved settings (.json)</label>
      <input id="restore" type="file" accept=".json" />
    </div>
    <div class="card">
      <label for="lat">Latitude column</label><select id="lat"></select>
      <label for="lon">Longitude column</label><select id="lon"></select>
      <label for="name">Name column</label><select id="name"></select>
      <button id="columns-btn">Use columns</button>
    </div>
    <div class="card"><strong>Filters</strong><div id="filters"></div>
      <button id="filters-btn">Apply filters</button></div>
    <div class="card">
      <label for="reference">Reference column</label><select id="reference"></select>
      <label for="values">Values</label><select id="values" multiple></select>
      <label for="color">Color</label><select id="color"></select>
      <button id="assign-btn">Assign color</button>
      <button id="reset-btn">Reset colors</button>
    </div>
    <div class="card">
      <label><input id="show-circle" type="checkbox" style="width:auto" /> Show circles</label>
      <label for="radius">Circle radius (km)</label><input id="radius" type="number" min="0" step="0.1" value="1" />
      <label for="shape-color">Circle color</label><select id="shape-color"></select>
      <label for="target-color">Circle around markers colored</label><select id="target-color"></select>
      <label><input id="cluster" type="checkbox" style="width:auto" /> Cluster markers</label>
      <button id="display-btn">Apply</button>
    </div>
    <div class="card">
      <button id="export-btn">Download CSV</button>
      <button id="export-xlsx-btn">Download Excel</button>
      <button id="save-btn">Save progress</button>
      <label for="load">Load progress into this session</label>
      <input id="load" type="file" accept=".json" />
    </div>
  </aside>
  <main>
    <div id="map"></div>
    <div id="status">Upload a spreadsheet to begin.</div>
  </main>
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <script src="https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"></script>
  <script>
    const $ = (id) => document.getElementById(id);
    const statusEl = $('status');
    const map = L.map('map').setView([-2.5, 118], 5);
    L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', { attribution: '&copy; OpenStreetMap' }).addTo(map);
    let layer = L.layerGroup().addTo(map);
    let circles = L.layerGroup().addTo(map);
    let cssColors = {};
    const css = (name) => cssColors[name] || name;
    let session = null;

    async function call(method, path, body, raw) {
      const options = { method };
      if (body !== undefined) {
        options.body = raw ? body : JSON.stringify(body);
        if (!raw) options.headers = { 'Content-Type': 'application/json' };
      }
      const response = await fetch(path, options);
      const text = await response.text();
      let data = null;
      try { data = JSON.parse(text); } catch (e) { data = text; }
      if (!response.ok) {
        statusEl.textContent = 'HTTP ' + response.status + ': ' + (data.message || text);
        throw data;
      }
      return data;
    }
    const api = (suffix) => '/api/sessions/' + session.id + suffix;

    function fill(select, values, selected, blank) {
      select.innerHTML = '';
      if (blank) select.add(new Option('', ''));
      values.forEach(v => select.add(new Option(String(v), String(v), false, selected === v)));
    }

    async function loadPalette() {
      const palette = await call('GET', '/api/palette');
      cssColors = palette.css || {};
      ['color', 'shape-color', 'target-color'].forEach(id => fill($(id), palette.colors));
      $('shape-color').value = 'red';
      $('target-color').value = 'green';
    }

    function showSession(summary) {
      session = summary;
      const sel = summary.selection;
      fill($('lat'), summary.columns, sel.latitude, true);
      fill($('lon'), summary.columns, sel.longitude, true);
      fill($('name'), summary.columns, sel.name, true);
      fill($('reference'), summary.columns, summary.reference_column, true);
      const d = summary.display;
      $('show-circle').checked = d.show_circle;
      $('radius').value = d.circle_radius;
      $('shape-color').value = d.shape_color;
      $('target-color').value = d.shape_target_color;
      $('cluster').checked = d.enable_cluster;
      statusEl.textContent = summary.row_count + ' rows loaded.';
      if (summary.ingest) refresh();
    }

    async function refresh() {
      const filters = await call('GET', api('/filters'));
      const box = $('filters');
      box.innerHTML = '';
      filters.options.forEach(f => {
        const label = document.createElement('label');
        label.textContent = f.column;
        const select = document.createElement('select');
        select.multiple = true;
        select.dataset.column = f.column;
        const active = (filters.active[f.column] || []).map(String);
        f.options.forEach(v => select.add(new Option(String(v), String(v), false, active.includes(String(v)))));
        box.append(label, select);
      });
      await refreshValues();
      await drawMap();
    }

    async function refreshValues() {
      const values = await call('GET', api('/reference/values'));
      fill($('values'), values.values);
    }

    async function drawMap() {
      const result = await call('GET', api('/map'));
      map.removeLayer(layer);
      circles.clearLayers();
      layer = result.view.cluster ? L.markerClusterGroup() : L.layerGroup();
      result.geojson.features.forEach(f => {
        const [lon, lat] = f.geometry.coordinates;
        const p = f.properties;
        if (p.kind === 'circle') {
          L.circle([lat, lon], { radius: p.radius_m, color: css(p.color), fillOpacity: p.fill_opacity }).addTo(circles);
        } else {
          L.circleMarker([lat, lon], { radius: 7, color: css(p.color), fillColor: css(p.color), fillOpacity: 0.9 })
            .bindPopup(String(p.name)).addTo(layer);
        }
      });
      layer.addTo(map);
      if (result.view.center) map.setView(result.view.center, result.view.zoom);
      statusEl.textContent = result.view.markers + ' markers, ' + result.view.circles + ' circles.';
    }

    $('file').addEventListener('change', async (e) => {
      const file = e.target.files[0];
      if (!file) return;
      showSession(await call('POST', '/api/sessions?filename=' + encodeURIComponent(file.name), await file.arrayBuffer(), true));
    });
    $('restore').addEventListener('change', async (e) => {
      const file = e.target.files[0];
      if (!file) return;
      showSession(await call('POST', '/api/sessions/restore', await file.text(), true));
    });
    $('columns-btn').addEventListener('click', async () => {
      const body = { latitude: $('lat').value || null, longitude: $('lon').value || null, name: $('name').value || null };
      await call('PUT', api('/columns'), body);
      await refresh();
    });
    $('filters-btn').addEventListener('click', async () => {
      const body = {};
      document.querySelectorAll('#filters select').forEach(s => {
        body[s.dataset.column] = Array.from(s.selectedOptions).map(o => o.value);
      });
      await call('PUT', api('/filters'), body);
      await refreshValues();
      await drawMap();
    });
    $('reference').addEventListener('change', async () => {
      await call('PUT', api('/reference'), { column: $('reference').value || null });
      await refreshValues();
      await drawMap();
    });
    $('assign-btn').addEventListener('click', async () => {
      const values = Array.from($('values').selectedOptions).map(o => o.value);
      await call('POST', api('/colors'), { values, color: $('color').value });
      await drawMap();
    });
    $('reset-btn').addEventListener('click', async () => {
      await call('DELETE', api('/colors'));
      await drawMap();
    });
    $('display-btn').addEventListener('click', async () => {
      await call('PUT', api('/display'), {
        show_circle: $('show-circle').checked,
        circle_radius: Number($('radius').value) || 0,
        shape_color: $('shape-color').value,
        shape_target_color: $('target-color').value,
        enable_cluster: $('cluster').checked,
      });
      await drawMap();
    });
    $('export-btn').addEventListener('click', () => { if (session) window.location = api('/export.csv'); });
    $('export-xlsx-btn').addEventListener('click', () => { if (session) window.location = api('/export.xlsx'); });
    $('save-btn').addEventListener('click', () => { if (session) window.location = api('/settings'); });
    $('load').addEventListener('change', async (e) => {
      const file = e.target.files[0];
      if (!file || !session) return;
      showSession(await call('POST', api('/settings'), await file.text(), true));
    });
    loadPalette();
  </script>
</body>
</html>
"#
    .to_string()
}
