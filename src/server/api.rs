use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::data::ingest::{ColumnSelection, IngestError, IngestReport};
use crate::data::loader::{load_bytes, SpreadsheetFormat};
use crate::data::options::FilterOptions;
use crate::data::value::Scalar;
use crate::resolve::FilterSet;
use crate::session::{Session, SessionError};
use crate::settings::{DisplaySettings, SettingsError, SettingsFile};

use super::AppState;

/// Zip local-file magic; every `.xlsx` starts with it.
const XLSX_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("session not found")]
    NotFound,
    /// Column selection is incomplete; carries the fields still unset.
    #[error("{0}")]
    Prompt(IngestError),
    #[error("{0}")]
    Internal(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingSelection { .. } => Self::Prompt(err),
            IngestError::UnknownColumn { .. } => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => Self::NotFound,
            SessionError::Ingest(err) => err.into(),
            SessionError::Load(_)
            | SessionError::Settings(SettingsError::Parse(_))
            | SessionError::UnknownColumn(_)
            | SessionError::InvalidColor(_)
            | SessionError::InvalidDisplay(_) => Self::BadRequest(err.to_string()),
            SessionError::Poisoned | SessionError::Settings(_) | SessionError::Export(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("Invalid request body: {err}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceRequest {
    #[serde(default)]
    pub column: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignColorsRequest {
    pub values: Vec<Scalar>,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
struct ColumnsResponse<'a> {
    status: &'static str,
    report: IngestReport,
    filter_options: &'a [FilterOptions],
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(|err| ApiError::Internal(err.to_string()))
}

pub fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

pub fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key.trim() == name).then(|| value.trim())
    })
}

/// Picks the upload format from `format=`, then `filename=`, then the
/// leading bytes.
fn upload_format(query: &str, body: &[u8]) -> Result<SpreadsheetFormat, ApiError> {
    if let Some(name) = query_param(query, "format") {
        return SpreadsheetFormat::from_name(name)
            .ok_or_else(|| ApiError::BadRequest(format!("unsupported format '{name}'")));
    }
    if let Some(name) = query_param(query, "filename") {
        if let Some(ext) = name.rsplit_once('.').map(|(_, ext)| ext) {
            return SpreadsheetFormat::from_name(ext)
                .ok_or_else(|| ApiError::BadRequest(format!("unsupported file '{name}'")));
        }
    }
    Ok(if body.starts_with(XLSX_MAGIC) {
        SpreadsheetFormat::Xlsx
    } else {
        SpreadsheetFormat::Csv
    })
}

fn body_str(body: &[u8]) -> Result<&str, ApiError> {
    std::str::from_utf8(body)
        .map_err(|err| ApiError::BadRequest(format!("request body is not utf-8: {err}")))
}

pub fn health_payload(state: &AppState) -> Result<String, ApiError> {
    to_json(&serde_json::json!({
        "status": "ok",
        "service": "geodash",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len(),
    }))
}

pub fn palette_payload(config: &AppConfig) -> Result<String, ApiError> {
    to_json(&serde_json::json!({
        "colors": config.palette.colors(),
        "css": config.palette.css_colors(),
        "default_color": config.default_color,
    }))
}

pub fn create_session_payload(state: &AppState, query: &str, body: &[u8]) -> Result<String, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("upload body is empty".to_string()));
    }
    let format = upload_format(query, body)?;
    let table = load_bytes(body, format).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let session = Session::new(table);
    let summary = session.summary();
    state.sessions.insert(session)?;
    to_json(&summary)
}

pub fn restore_session_payload(state: &AppState, body: &[u8]) -> Result<String, ApiError> {
    let settings = SettingsFile::parse(body_str(body)?).map_err(SessionError::from)?;
    let session = Session::from_settings(settings);
    let summary = session.summary();
    state.sessions.insert(session)?;
    to_json(&summary)
}

pub fn session_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    let summary = state.sessions.with_session(id, |s| s.summary())?;
    to_json(&summary)
}

pub fn delete_session_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    if !state.sessions.remove(id)? {
        return Err(ApiError::NotFound);
    }
    to_json(&serde_json::json!({ "status": "ok", "id": id }))
}

pub fn columns_payload(state: &AppState, id: Uuid, body: &[u8]) -> Result<String, ApiError> {
    let selection: ColumnSelection = serde_json::from_slice(body)?;
    let max_options = state.config.max_filter_options;
    let (report, options) = state.sessions.with_session(id, |s| {
        let report = s.select_columns(selection)?;
        Ok::<_, IngestError>((report, s.filter_options(max_options)?))
    })??;
    to_json(&ColumnsResponse {
        status: "ok",
        report,
        filter_options: &options,
    })
}

pub fn filter_options_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    let max_options = state.config.max_filter_options;
    let (options, active) = state.sessions.with_session(id, |s| {
        s.filter_options(max_options)
            .map(|options| (options, s.filters().clone()))
    })??;
    to_json(&serde_json::json!({ "options": options, "active": active }))
}

/// Body is `{"column": [values...]}`; an empty list lifts that column's
/// constraint.
pub fn filters_put_payload(state: &AppState, id: Uuid, body: &[u8]) -> Result<String, ApiError> {
    let requested: BTreeMap<String, Vec<Scalar>> = serde_json::from_slice(body)?;
    let filters: FilterSet = requested.into_iter().collect();
    let active = state.sessions.with_session(id, |s| {
        s.set_filters(filters);
        s.filters().clone()
    })?;
    to_json(&serde_json::json!({ "status": "ok", "active": active }))
}

pub fn reference_payload(state: &AppState, id: Uuid, body: &[u8]) -> Result<String, ApiError> {
    let request: ReferenceRequest = serde_json::from_slice(body)?;
    let column = state.sessions.with_session(id, |s| {
        s.set_reference_column(request.column)
            .map(|()| s.reference_column().map(str::to_string))
    })??;
    to_json(&serde_json::json!({ "status": "ok", "reference_column": column }))
}

pub fn reference_values_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    let (column, values) = state.sessions.with_session(id, |s| {
        s.reference_values()
            .map(|values| (s.reference_column().map(str::to_string), values))
    })??;
    to_json(&serde_json::json!({ "column": column, "values": values }))
}

pub fn colors_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    let colors = state.sessions.with_session(id, |s| s.colors().clone())?;
    to_json(&colors)
}

pub fn colors_assign_payload(state: &AppState, id: Uuid, body: &[u8]) -> Result<String, ApiError> {
    let request: AssignColorsRequest = serde_json::from_slice(body)?;
    let palette = &state.config.palette;
    let colors = state.sessions.with_session(id, |s| {
        s.assign_colors(&request.values, &request.color, palette)
            .map(|_| s.colors().clone())
    })??;
    to_json(&colors)
}

pub fn colors_reset_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    state.sessions.with_session(id, Session::reset_colors)?;
    to_json(&serde_json::json!({ "status": "ok" }))
}

pub fn display_payload(state: &AppState, id: Uuid, body: &[u8]) -> Result<String, ApiError> {
    let display: DisplaySettings = serde_json::from_slice(body)?;
    let palette = &state.config.palette;
    let display = state.sessions.with_session(id, |s| {
        s.set_display(display, palette).map(|()| s.display().clone())
    })??;
    to_json(&display)
}

pub fn map_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    let style = state.config.marker_style();
    let view = state.sessions.with_session(id, |s| s.map_view(style))??;
    to_json(&serde_json::json!({
        "view": {
            "center": view.center,
            "zoom": view.zoom,
            "cluster": view.cluster,
            "markers": view.markers.len(),
            "circles": view.circles.len(),
        },
        "geojson": view.to_geojson(),
    }))
}

pub fn export_csv_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    let style = state.config.marker_style();
    let column = state.config.export_color_column.as_str();
    Ok(state
        .sessions
        .with_session(id, |s| s.export_csv(style, column))??)
}

pub fn export_xlsx_payload(state: &AppState, id: Uuid) -> Result<Vec<u8>, ApiError> {
    let style = state.config.marker_style();
    let column = state.config.export_color_column.as_str();
    Ok(state
        .sessions
        .with_session(id, |s| s.export_xlsx(style, column))??)
}

pub fn settings_payload(state: &AppState, id: Uuid) -> Result<String, ApiError> {
    let settings = state.sessions.with_session(id, |s| s.settings())?;
    settings
        .to_json()
        .map_err(|err| ApiError::Internal(err.to_string()))
}

pub fn settings_load_payload(state: &AppState, id: Uuid, body: &[u8]) -> Result<String, ApiError> {
    let raw = body_str(body)?;
    let summary = state.sessions.with_session(id, |s| {
        s.load_settings(raw).map(|()| s.summary())
    })??;
    to_json(&summary)
}
