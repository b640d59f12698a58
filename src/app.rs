use crate::history::{HistoryOptions, PageRequest, RunHistory};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

// UI constants
pub const NOTIFICATION_TTL_SECS: u64 = 5;
pub const SPINNER_FRAME_COUNT: usize = 10;
pub const NARROW_WIDTH_THRESHOLD: u16 = 60;
pub const ERROR_TTL_SECS: u64 = 10;

// Paging defaults
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Keeps a field only when it has the expected shape; `null`, wrongly typed
/// and missing values all become the default.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Epoch milliseconds given as a number or a numeric string.
pub(crate) fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_millis(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Started,
    Running,
    Completed,
    Failed,
    Active,
    ActiveError,
    Stopped,
    Success,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Status shown for records whose status is missing or unrecognized.
    pub const FALLBACK: RunStatus = RunStatus::Failed;

    pub fn label(self) -> &'static str {
        match self {
            RunStatus::Started => "Started",
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
            RunStatus::Active => "Active",
            RunStatus::ActiveError => "Activeerror",
            RunStatus::Stopped => "Stopped",
            RunStatus::Success => "Success",
            RunStatus::Unknown => "Unknown",
        }
    }
}

/// One execution of an application, as returned by the catalog server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub app_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub app_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub run_type: String,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<RunStatus>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub start_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub end_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub execution_time: Option<i64>,
    #[serde(default)]
    pub success_context: Option<serde_json::Value>,
    #[serde(default)]
    pub failure_context: Option<serde_json::Value>,
    #[serde(default)]
    pub schedule_info: Option<serde_json::Value>,
}

/// Row key for a run. Stable for the same (app, run type, timestamp) triple.
pub fn run_row_id(app_id: &str, run_type: &str, timestamp: i64) -> String {
    format!("{app_id}-{run_type}-{timestamp}")
}

/// A run record prepared for display: row key and effective status.
#[derive(Debug, Clone)]
pub struct DisplayRunRecord {
    pub id: String,
    pub status: RunStatus,
    pub record: RunRecord,
}

impl From<RunRecord> for DisplayRunRecord {
    fn from(record: RunRecord) -> Self {
        let status = match record.status {
            Some(RunStatus::Unknown) | None => RunStatus::FALLBACK,
            Some(s) => s,
        };
        Self {
            id: run_row_id(&record.app_id, &record.run_type, record.timestamp),
            status,
            record,
        }
    }
}

impl DisplayRunRecord {
    pub fn has_success_context(&self) -> bool {
        self.record
            .success_context
            .as_ref()
            .is_some_and(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PagingCursor {
    pub offset: usize,
    pub limit: usize,
    pub total: usize,
}

/// One page of runs plus the server-side total.
#[derive(Debug, Clone, Default)]
pub struct RunPage {
    pub records: Vec<RunRecord>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl CurrentUser {
    pub fn shown_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceApp {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub developer: Option<String>,
    #[serde(default)]
    pub developer_url: Option<String>,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub updated_at: Option<i64>,
}

impl MarketplaceApp {
    pub fn entity_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub timestamp: std::time::Instant,
}

/// Authorization card shown before the run history.
#[derive(Debug, Clone)]
pub struct AuthorizeCard {
    pub app_name: String,
    pub developer: String,
    pub developer_url: Option<String>,
    pub updated_at: Option<i64>,
    pub user_name: String,
}

impl AuthorizeCard {
    pub fn new(app: &MarketplaceApp, user: &CurrentUser) -> Self {
        Self {
            app_name: app.entity_name().to_string(),
            developer: app.developer.clone().unwrap_or_default(),
            developer_url: app.developer_url.clone(),
            updated_at: app.updated_at,
            user_name: user.shown_name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeDecision {
    Configure,
    Cancel,
}

pub enum ActiveOverlay {
    None,
    Authorize(AuthorizeCard),
}

/// Immutable configuration set at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: String,
    pub app: String,
    pub page_size: usize,
    pub max_records: Option<usize>,
    pub show_pagination: bool,
}

impl AppConfig {
    pub fn history_options(&self) -> HistoryOptions {
        HistoryOptions {
            page_size: self.page_size,
            max_records: self.max_records,
            show_pagination: self.show_pagination,
        }
    }
}

pub struct AppState {
    pub config: AppConfig,

    pub history: RunHistory,

    // Table navigation
    pub cursor: usize,

    // Transient UI
    pub notifications: Vec<Notification>,
    pub error: Option<(String, std::time::Instant)>,
    pub spinner_frame: usize,
    pub should_quit: bool,

    pub overlay: ActiveOverlay,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let history = RunHistory::new(config.app.clone(), config.history_options());
        Self {
            config,
            history,
            cursor: 0,
            notifications: Vec::new(),
            error: None,
            spinner_frame: 0,
            should_quit: false,
            overlay: ActiveOverlay::None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.history.is_loading()
    }

    pub fn move_cursor_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn move_cursor_down(&mut self) {
        let len = self.history.records().len();
        if len > 0 && self.cursor < len - 1 {
            self.cursor += 1;
        }
    }

    /// Keeps the cursor inside the current page after the list was replaced.
    pub fn clamp_cursor(&mut self) {
        let len = self.history.records().len();
        if len == 0 {
            self.cursor = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
    }

    pub fn selected_record(&self) -> Option<&DisplayRunRecord> {
        self.history.records().get(self.cursor)
    }

    /// Expands or collapses the log detail of the selected row.
    pub fn toggle_selected_logs(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        if RunHistory::is_log_action_disabled(record) {
            self.set_error("No logs available for this run".to_string());
            return;
        }
        let id = record.id.clone();
        self.history.toggle_row_expansion(&id);
    }

    pub fn next_page(&mut self) -> Option<PageRequest> {
        if !self.history.has_next_page() {
            return None;
        }
        let page = self.history.current_page() + 1;
        self.history.change_page(page)
    }

    pub fn prev_page(&mut self) -> Option<PageRequest> {
        let page = self.history.current_page().checked_sub(1)?;
        self.history.change_page(page)
    }

    pub fn push_notification(&mut self, message: String) {
        self.notifications.push(Notification {
            message,
            timestamp: std::time::Instant::now(),
        });
    }

    pub fn prune_notifications(&mut self) {
        let now = std::time::Instant::now();
        self.notifications
            .retain(|n| now.duration_since(n.timestamp).as_secs() < NOTIFICATION_TTL_SECS);
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAME_COUNT;
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some((msg, std::time::Instant::now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn prune_error(&mut self) {
        if let Some((_, ts)) = &self.error {
            if ts.elapsed().as_secs() >= ERROR_TTL_SECS {
                self.error = None;
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(msg, _)| msg.as_str())
    }

    // --- Authorize card ---

    pub fn has_authorize_card(&self) -> bool {
        matches!(self.overlay, ActiveOverlay::Authorize(_))
    }

    pub fn open_authorize_card(&mut self, card: AuthorizeCard) {
        self.overlay = ActiveOverlay::Authorize(card);
    }

    /// Closes the card. Cancelling quits, configuring continues to the history.
    pub fn resolve_authorize_card(&mut self, decision: AuthorizeDecision) {
        if !self.has_authorize_card() {
            return;
        }
        self.overlay = ActiveOverlay::None;
        match decision {
            AuthorizeDecision::Configure => {
                tracing::info!(app = %self.config.app, "application authorized");
            }
            AuthorizeDecision::Cancel => {
                tracing::info!(app = %self.config.app, "authorization cancelled");
                self.should_quit = true;
            }
        }
    }
}
