use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::alert::{ChannelOutcome, Dispatcher, category_message};
use crate::aws::AwsContext;
use crate::checks::{CheckContext, Checker, default_checkers};
use crate::core::{Category, CategoryResult, Report, ScanState, ScanStatus, normalize};
use crate::export;

const SESSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_TIMEOUT_CAP: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeout: Duration,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartScan {
    Started,
    AlreadyRunning,
}

#[derive(Clone)]
pub struct ScanEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    opts: EngineOptions,
    aws: AwsContext,
    checkers: Vec<Box<dyn Checker>>,
    state: Mutex<ScanState>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ScanEngine {
    pub fn new(opts: EngineOptions, aws: AwsContext) -> Self {
        Self::with_checkers(opts, aws, default_checkers())
    }

    pub fn with_checkers(
        opts: EngineOptions,
        aws: AwsContext,
        checkers: Vec<Box<dyn Checker>>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                opts,
                aws,
                checkers,
                state: Mutex::new(ScanState::new()),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn aws(&self) -> &AwsContext {
        &self.inner.aws
    }

    pub fn state(&self) -> ScanState {
        self.lock_state().clone()
    }

    pub fn report(&self) -> Report {
        let state = self.state();
        Report {
            schema_version: "1.0".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: now_rfc3339(),
            summary: state.summary(),
            categories: state.categories,
            last_error: state.last_error,
        }
    }

    pub fn start_scan(&self) -> StartScan {
        {
            let mut state = self.lock_state();
            if state.status == ScanStatus::Scanning {
                return StartScan::AlreadyRunning;
            }
            state.status = ScanStatus::Scanning;
            state.last_scan = Some(now_rfc3339());
        }

        let engine = self.clone();
        let handle = thread::spawn(move || engine.run_scan_body());
        let previous = self.lock_worker().replace(handle);
        if let Some(previous) = previous {
            let _ = previous.join();
        }
        StartScan::Started
    }

    pub fn join(&self) {
        let handle = self.lock_worker().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn run_scan_body(&self) {
        let body = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.scan_inner()));
        if body.is_err() {
            let mut state = self.lock_state();
            state.status = ScanStatus::Error;
            state.last_error = Some("スキャン中に内部エラーが発生しました".to_string());
        }
    }

    fn scan_inner(&self) {
        let probe_timeout = std::cmp::min(self.inner.opts.timeout, SESSION_PROBE_TIMEOUT);
        if let Err(err) = self.inner.aws.caller_identity(probe_timeout) {
            let mut state = self.lock_state();
            state.status = ScanStatus::Error;
            state.last_error = Some(format!("{err:#}"));
            return;
        }

        {
            let mut state = self.lock_state();
            state.categories.clear();
            state.total_issues = 0;
            state.last_error = None;
        }

        let ctx = CheckContext {
            aws: self.inner.aws.clone(),
            timeout: std::cmp::min(self.inner.opts.timeout, COMMAND_TIMEOUT_CAP),
            deadline: Some(Instant::now() + self.inner.opts.timeout),
        };
        let progress_enabled = self.inner.opts.show_progress && std::io::stderr().is_terminal();

        for checker in &self.inner.checkers {
            let category = checker.category();
            let pb = if progress_enabled {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                pb.set_message(format!("{} を確認中...", category.label()));
                pb.enable_steady_tick(Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let result = match checker.check(&ctx) {
                Ok(raw) => CategoryResult::ok(raw.iter().map(normalize).collect()),
                Err(err) => CategoryResult::failed(err.to_string()),
            };

            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            self.lock_state().categories.insert(category, result);
        }

        let mut state = self.lock_state();
        state.recompute_total();
        state.status = ScanStatus::Completed;
    }

    fn lock_state(&self) -> MutexGuard<'_, ScanState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<thread::JoinHandle<()>>> {
        self.inner
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub alerts: Vec<(Category, Vec<ChannelOutcome>)>,
    pub exports: Vec<(Category, Result<PathBuf, String>)>,
}

pub fn deliver(
    state: &ScanState,
    dispatcher: &Dispatcher,
    export_dir: Option<&Path>,
) -> DeliveryOutcome {
    let mut alerts = Vec::new();
    let mut exports = Vec::new();
    let empty = CategoryResult::default();

    for category in Category::ALL {
        let result = state.categories.get(&category).unwrap_or(&empty);
        if !dispatcher.is_empty() && !result.findings.is_empty() {
            let message = category_message(category, &result.findings);
            alerts.push((category, dispatcher.dispatch(&message)));
        }
        if let Some(dir) = export_dir {
            let exported =
                export::write_category(dir, category, result).map_err(|err| format!("{err:#}"));
            exports.push((category, exported));
        }
    }

    DeliveryOutcome { alerts, exports }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
