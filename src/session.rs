//! Per-user dashboard state and the store that owns it.
//!
//! A [`Session`] is created by an upload (or a settings restore), mutated by
//! discrete user actions, and dropped explicitly or after sitting idle past
//! the store's TTL. All access goes through [`SessionStore::with_session`].
//! The store lock covers only the lookup; each session has its own lock for
//! the duration of one action.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data::ingest::{locate, ColumnSelection, GeoTable, IngestError, IngestReport};
use crate::data::loader::LoadError;
use crate::data::options::{distinct_values, filter_options, FilterOptions};
use crate::data::table::Table;
use crate::data::value::Scalar;
use crate::export::{colored_csv_string, colored_xlsx, ExportError};
use crate::map::{build_map, MapView, MarkerStyle, Selections};
use crate::palette::Palette;
use crate::resolve::{apply_filters, assign_color, reset_colors, ColorAssignment, FilterSet};
use crate::settings::{DisplaySettings, SettingsError, SettingsFile};

/// Column names the original dashboard wrote into saved settings after
/// renaming the user's picks.
const LEGACY_COLUMNS: (&str, &str, &str) = ("Latitude", "Longitude", "NamaTitik");

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session store lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("column '{0}' does not exist")]
    UnknownColumn(String),
    #[error("color '{0}' is not in the palette")]
    InvalidColor(String),
    #[error("{0}")]
    InvalidDisplay(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub selection: ColumnSelection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestReport>,
    pub filters: FilterSet,
    pub reference_column: Option<String>,
    pub colors: ColorAssignment,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    table: Table,
    selection: ColumnSelection,
    located: Option<GeoTable>,
    filters: FilterSet,
    colors: ColorAssignment,
    reference_column: Option<String>,
    display: DisplaySettings,
}

impl Session {
    pub fn new(table: Table) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_used: now,
            table,
            selection: ColumnSelection::default(),
            located: None,
            filters: FilterSet::new(),
            colors: ColorAssignment::new(),
            reference_column: None,
            display: DisplaySettings::default(),
        }
    }

    /// A session rebuilt from a saved settings file.
    pub fn from_settings(settings: SettingsFile) -> Self {
        let mut session = Self::new(Table::default());
        session.apply_settings(settings);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn colors(&self) -> &ColorAssignment {
        &self.colors
    }

    pub fn display(&self) -> &DisplaySettings {
        &self.display
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn reference_column(&self) -> Option<&str> {
        self.reference_column.as_deref()
    }

    /// The located records, or the prompt for whichever columns are unset.
    pub fn located(&self) -> Result<&GeoTable, IngestError> {
        self.located.as_ref().ok_or_else(|| IngestError::MissingSelection {
            missing: self.selection.missing(),
        })
    }

    /// Picks the coordinate and name columns. On error the previous
    /// selection stays in effect.
    pub fn select_columns(&mut self, selection: ColumnSelection) -> Result<IngestReport, IngestError> {
        let located = locate(&self.table, &selection)?;
        let report = located.report();
        self.selection = selection;
        self.located = Some(located);
        debug!(session = %self.id, kept = report.kept_rows, dropped = report.dropped_rows, "columns selected");
        Ok(report)
    }

    pub fn filter_options(&self, max_options: usize) -> Result<Vec<FilterOptions>, IngestError> {
        Ok(filter_options(self.located()?, max_options))
    }

    pub fn set_filters(&mut self, filters: FilterSet) {
        self.filters = filters;
    }

    pub fn set_reference_column(&mut self, column: Option<String>) -> Result<(), SessionError> {
        let column = column.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        if let Some(column) = &column {
            if !self.table.schema().contains(column) {
                return Err(SessionError::UnknownColumn(column.clone()));
            }
        }
        self.reference_column = column;
        Ok(())
    }

    /// Distinct values of the reference column among the filtered records.
    pub fn reference_values(&self) -> Result<Vec<Scalar>, SessionError> {
        let located = self.located()?;
        let Some(column) = self.reference_column.as_deref() else {
            return Ok(Vec::new());
        };
        let position = located
            .schema()
            .position(column)
            .ok_or_else(|| SessionError::UnknownColumn(column.to_string()))?;
        let compiled = self.filters.compile(located.schema());
        Ok(distinct_values(apply_filters(located.records(), &compiled), position))
    }

    /// Assigns `color` to every value in `values`. The color is checked
    /// against `palette` first; nothing changes when it is not a member.
    pub fn assign_colors(
        &mut self,
        values: &[Scalar],
        color: &str,
        palette: &Palette,
    ) -> Result<usize, SessionError> {
        if !palette.contains(color) {
            return Err(SessionError::InvalidColor(color.to_string()));
        }
        for value in values {
            assign_color(&mut self.colors, value, color);
        }
        Ok(self.colors.len())
    }

    pub fn reset_colors(&mut self) {
        reset_colors(&mut self.colors);
    }

    pub fn set_display(&mut self, display: DisplaySettings, palette: &Palette) -> Result<(), SessionError> {
        if !display.circle_radius.is_finite() || display.circle_radius < 0.0 {
            return Err(SessionError::InvalidDisplay(
                "circle_radius must be a non-negative number".to_string(),
            ));
        }
        for color in [&display.shape_color, &display.shape_target_color] {
            if !palette.contains(color) {
                return Err(SessionError::InvalidColor(color.clone()));
            }
        }
        self.display = display;
        Ok(())
    }

    /// Parses `raw` and applies it. A file that fails to parse leaves the
    /// session untouched.
    pub fn load_settings(&mut self, raw: &str) -> Result<(), SessionError> {
        let settings = SettingsFile::parse(raw)?;
        self.apply_settings(settings);
        Ok(())
    }

    fn apply_settings(&mut self, settings: SettingsFile) {
        self.colors = settings.colors.clone();
        self.display = settings.display.clone();
        if settings.reference_column.is_some() {
            self.reference_column = settings.reference_column.clone();
        }
        if settings.data.is_empty() {
            return;
        }

        self.table = settings.table();
        self.located = None;
        // Saved rows are already filtered.
        self.filters = FilterSet::new();
        let selection = settings
            .columns
            .clone()
            .filter(ColumnSelection::is_complete)
            .or_else(|| legacy_selection(&self.table))
            .unwrap_or_else(|| self.selection.clone());
        if let Err(err) = self.select_columns(selection) {
            warn!(session = %self.id, %err, "restored data needs a new column selection");
            self.selection = ColumnSelection::default();
        }
    }

    pub fn map_view(&self, style: MarkerStyle<'_>) -> Result<MapView, IngestError> {
        Ok(build_map(self.located()?, self.selections(), style))
    }

    pub fn export_csv(&self, style: MarkerStyle<'_>, color_column: &str) -> Result<String, SessionError> {
        let located = self.located()?;
        Ok(colored_csv_string(located, self.selections(), style, color_column)?)
    }

    pub fn export_xlsx(&self, style: MarkerStyle<'_>, color_column: &str) -> Result<Vec<u8>, SessionError> {
        let located = self.located()?;
        let (workbook, _) = colored_xlsx(located, self.selections(), style, color_column)?;
        Ok(workbook)
    }

    /// Current state as a settings file. `data` holds the filtered located
    /// records, or every loaded row before columns are selected.
    pub fn settings(&self) -> SettingsFile {
        let data = match &self.located {
            Some(located) => {
                let compiled = self.filters.compile(located.schema());
                apply_filters(located.records(), &compiled)
                    .map(|r| self.table.record_to_json(&r.record))
                    .collect()
            }
            None => self
                .table
                .records()
                .iter()
                .map(|r| self.table.record_to_json(r))
                .collect(),
        };
        SettingsFile {
            data,
            colors: self.colors.clone(),
            display: self.display.clone(),
            columns: self.selection.is_complete().then(|| self.selection.clone()),
            reference_column: self.reference_column.clone(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            last_used: self.last_used,
            columns: self.table.schema().columns().to_vec(),
            row_count: self.table.len(),
            selection: self.selection.clone(),
            ingest: self.located.as_ref().map(GeoTable::report),
            filters: self.filters.clone(),
            reference_column: self.reference_column.clone(),
            colors: self.colors.clone(),
            display: self.display.clone(),
        }
    }

    fn selections(&self) -> Selections<'_> {
        Selections {
            filters: &self.filters,
            colors: &self.colors,
            reference_column: self.reference_column.as_deref(),
            display: &self.display,
        }
    }
}

fn legacy_selection(table: &Table) -> Option<ColumnSelection> {
    let (lat, lon, name) = LEGACY_COLUMNS;
    let schema = table.schema();
    (schema.contains(lat) && schema.contains(lon) && schema.contains(name))
        .then(|| ColumnSelection::new(lat, lon, name))
}

struct StoreEntry {
    session: Arc<Mutex<Session>>,
    last_used: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, StoreEntry>>,
    ttl_secs: i64,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn insert(&self, session: Session) -> Result<Uuid, SessionError> {
        let id = session.id;
        let entry = StoreEntry {
            last_used: session.last_used,
            session: Arc::new(Mutex::new(session)),
        };
        let mut sessions = self.lock()?;
        self.prune(&mut sessions);
        sessions.insert(id, entry);
        info!(session = %id, active = sessions.len(), "session created");
        Ok(id)
    }

    /// Runs one action against a session and marks it used. Other sessions
    /// stay available while the action runs.
    pub fn with_session<T>(
        &self,
        id: Uuid,
        action: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, SessionError> {
        let session = self.checkout(id)?;
        let mut session = session.lock().map_err(|_| SessionError::Poisoned)?;
        session.last_used = Utc::now();
        Ok(action(&mut session))
    }

    fn checkout(&self, id: Uuid) -> Result<Arc<Mutex<Session>>, SessionError> {
        let mut sessions = self.lock()?;
        self.prune(&mut sessions);
        let entry = sessions.get_mut(&id).ok_or(SessionError::NotFound)?;
        entry.last_used = Utc::now();
        Ok(Arc::clone(&entry.session))
    }

    pub fn remove(&self, id: Uuid) -> Result<bool, SessionError> {
        let mut sessions = self.lock()?;
        let removed = sessions.remove(&id).is_some();
        if removed {
            info!(session = %id, "session dropped");
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, StoreEntry>>, SessionError> {
        self.sessions.lock().map_err(|_| SessionError::Poisoned)
    }

    fn prune(&self, sessions: &mut HashMap<Uuid, StoreEntry>) {
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, s| (now - s.last_used).num_seconds() <= self.ttl_secs);
        let expired = before - sessions.len();
        if expired > 0 {
            info!(expired, "idle sessions expired");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::data::table::Schema;

    fn session() -> Session {
        Session::new(Table::new(
            Schema::new(["Lat", "Lon", "Nama", "Cabang", "Warna"]),
            vec![
                vec![(-6.0).into(), 106.0.into(), "A".into(), "Jakarta".into(), "red".into()],
                vec![(-7.0).into(), 110.0.into(), "B".into(), "Bandung".into(), Scalar::Missing],
                vec!["?".into(), 110.0.into(), "C".into(), "Bandung".into(), Scalar::Missing],
            ],
        ))
    }

    #[test]
    fn map_requires_column_selection() {
        let config = AppConfig::default();
        let session = session();
        assert_eq!(
            session.map_view(config.marker_style()).unwrap_err(),
            IngestError::MissingSelection {
                missing: vec!["latitude", "longitude", "name"]
            }
        );
    }

    #[test]
    fn failed_selection_keeps_previous_one() {
        let mut session = session();
        session
            .select_columns(ColumnSelection::new("Lat", "Lon", "Nama"))
            .unwrap();
        assert!(session
            .select_columns(ColumnSelection::new("Lat", "Nope", "Nama"))
            .is_err());
        assert_eq!(session.located().unwrap().records().len(), 2);
    }

    #[test]
    fn invalid_assignment_color_is_rejected_without_change() {
        let palette = Palette::default();
        let mut session = session();
        let err = session
            .assign_colors(&["Jakarta".into()], "teal", &palette)
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidColor(c) if c == "teal"));
        assert!(session.colors().is_empty());
        assert_eq!(
            session.assign_colors(&["Jakarta".into(), "Bandung".into()], "green", &palette).unwrap(),
            2
        );
    }

    #[test]
    fn malformed_settings_leave_state_unchanged() {
        let palette = Palette::default();
        let mut session = session();
        session.assign_colors(&["Jakarta".into()], "green", &palette).unwrap();
        let before = session.colors().clone();
        assert!(matches!(
            session.load_settings("{\"kcp_custom_colors\": "),
            Err(SessionError::Settings(SettingsError::Parse(_)))
        ));
        assert_eq!(session.colors(), &before);
        assert_eq!(session.table().len(), 3);
    }

    #[test]
    fn settings_round_trip_restores_session() {
        let config = AppConfig::default();
        let mut session = session();
        session
            .select_columns(ColumnSelection::new("Lat", "Lon", "Nama"))
            .unwrap();
        session.set_reference_column(Some("Cabang".into())).unwrap();
        session
            .assign_colors(&["Bandung".into()], "purple", &config.palette)
            .unwrap();
        let saved = session.settings();
        assert_eq!(saved.data.len(), 2);

        let raw = saved.to_json().unwrap();
        let restored = Session::from_settings(SettingsFile::parse(&raw).unwrap());
        let view = restored.map_view(config.marker_style()).unwrap();
        let colors: Vec<&str> = view.markers.iter().map(|m| m.color.as_str()).collect();
        assert_eq!(colors, vec!["red", "purple"]);
    }

    #[test]
    fn legacy_settings_locate_renamed_columns() {
        let raw = r#"{"data":[{"Latitude":-6.2,"Longitude":106.8,"NamaTitik":"KCP 1","Cabang":"A"}],
                     "kcp_custom_colors":{"A":"green"}}"#;
        let restored = Session::from_settings(SettingsFile::parse(raw).unwrap());
        assert_eq!(restored.located().unwrap().records()[0].name, "KCP 1");
    }

    #[test]
    fn reference_values_respect_filters() {
        let mut session = session();
        session
            .select_columns(ColumnSelection::new("Lat", "Lon", "Nama"))
            .unwrap();
        session.set_reference_column(Some("Cabang".into())).unwrap();
        let mut filters = FilterSet::new();
        filters.allow("Nama", vec!["B".into()]);
        session.set_filters(filters);
        assert_eq!(session.reference_values().unwrap(), vec![Scalar::Text("Bandung".into())]);
        assert!(matches!(
            session.set_reference_column(Some("Wilayah".into())),
            Err(SessionError::UnknownColumn(_))
        ));
    }

    #[test]
    fn store_runs_actions_and_forgets_removed_sessions() {
        let store = SessionStore::new(60);
        let id = store.insert(session()).unwrap();
        assert_eq!(store.with_session(id, |s| s.table().len()).unwrap(), 3);
        assert!(store.remove(id).unwrap());
        assert!(matches!(
            store.with_session(id, |_| ()),
            Err(SessionError::NotFound)
        ));
    }

    #[test]
    fn loading_settings_clears_filters_for_restored_rows() {
        let config = AppConfig::default();
        let mut session = session();
        session
            .select_columns(ColumnSelection::new("Lat", "Lon", "Nama"))
            .unwrap();
        let mut filters = FilterSet::new();
        filters.allow("Cabang", vec!["Jakarta".into()]);
        session.set_filters(filters);

        let raw = r#"{"data":[{"Lat":-6.9,"Lon":107.6,"Nama":"D","Cabang":"Bandung"}],
                     "columns":{"latitude":"Lat","longitude":"Lon","name":"Nama"}}"#;
        session.load_settings(raw).unwrap();
        assert!(session.filters().is_empty());
        let view = session.map_view(config.marker_style()).unwrap();
        assert_eq!(view.markers.len(), 1);
        assert_eq!(session.export_csv(config.marker_style(), "Warna_Akhir").unwrap().lines().count(), 2);
    }

    #[test]
    fn actions_on_one_session_leave_others_available() {
        let store = SessionStore::new(60);
        let first = store.insert(session()).unwrap();
        let second = store.insert(session()).unwrap();
        let rows = store
            .with_session(first, |_| store.with_session(second, |s| s.table().len()))
            .unwrap()
            .unwrap();
        assert_eq!(rows, 3);
    }

    #[test]
    fn zero_ttl_expires_idle_sessions() {
        let store = SessionStore::new(0);
        let mut stale = session();
        stale.last_used = Utc::now() - chrono::Duration::seconds(5);
        let id = store.insert(stale).unwrap();
        store.insert(session()).unwrap();
        assert!(matches!(store.with_session(id, |_| ()), Err(SessionError::NotFound)));
    }
}
