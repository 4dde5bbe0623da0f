use std::io;
use std::panic;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap};

use crate::core::{Category, Finding, RiskLevel, ScanState, ScanStatus};
use crate::engine::{ScanEngine, StartScan};

pub fn run(engine: ScanEngine, color: bool) -> Result<()> {
    enable_raw_mode().context("raw mode の有効化")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("代替画面への切り替え")?;

    let mut tui = Tui {
        terminal: Terminal::new(CrosstermBackend::new(stdout)).context("ターミナルの初期化")?,
    };
    tui.terminal.clear().ok();

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        run_app(&mut tui.terminal, &engine, color)
    }));

    let _ = tui.terminal.show_cursor();
    let _ = disable_raw_mode();
    let mut stdout = io::stdout();
    let _ = execute!(stdout, LeaveAlternateScreen);

    engine.join();

    match res {
        Ok(res) => res,
        Err(_) => Err(anyhow::anyhow!(
            "ダッシュボード内部で panic が発生しました（端末状態は復旧済みのはずです）"
        )),
    }
}

struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

struct App {
    tab: Category,
    findings_state: ListState,
    notice: Option<String>,
    color: bool,
}

impl App {
    fn new(color: bool) -> Self {
        let mut findings_state = ListState::default();
        findings_state.select(Some(0));
        Self {
            tab: Category::Storage,
            findings_state,
            notice: None,
            color,
        }
    }

    fn select_tab(&mut self, tab: Category) {
        self.tab = tab;
        self.findings_state.select(Some(0));
    }
}

fn next_category(category: Category) -> Category {
    let idx = Category::ALL.iter().position(|&c| c == category).unwrap_or(0);
    Category::ALL[(idx + 1) % Category::ALL.len()]
}

fn prev_category(category: Category) -> Category {
    let idx = Category::ALL.iter().position(|&c| c == category).unwrap_or(0);
    Category::ALL[(idx + Category::ALL.len() - 1) % Category::ALL.len()]
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    engine: &ScanEngine,
    color: bool,
) -> Result<()> {
    let mut app = App::new(color);

    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        let state = engine.state();
        terminal
            .draw(|f| draw(f, &mut app, &state))
            .context("画面描画")?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("入力の監視")? {
            if let Event::Key(key) = event::read().context("入力の読み取り")? {
                if key.kind == KeyEventKind::Press && handle_key(&mut app, engine, key, &state) {
                    break;
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    if engine.state().status == ScanStatus::Scanning {
        terminal
            .draw(|f| {
                let area = f.size();
                let message =
                    Paragraph::new("実行中のスキャンの完了を待機しています...").wrap(Wrap { trim: true });
                f.render_widget(message, area);
            })
            .ok();
        engine.join();
    }

    Ok(())
}

fn handle_key(app: &mut App, engine: &ScanEngine, key: KeyEvent, state: &ScanState) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
        KeyCode::Char('s') | KeyCode::Char('r') => match engine.start_scan() {
            StartScan::Started => {
                app.notice = Some("スキャンを開始しました。".to_string());
            }
            StartScan::AlreadyRunning => {
                app.notice = Some("スキャンは既に実行中です。".to_string());
            }
        },
        KeyCode::Tab | KeyCode::Right => {
            app.select_tab(next_category(app.tab));
            app.notice = None;
        }
        KeyCode::BackTab | KeyCode::Left => {
            app.select_tab(prev_category(app.tab));
            app.notice = None;
        }
        KeyCode::Char(c @ '1'..='5') => {
            let idx = (c as usize) - ('1' as usize);
            app.select_tab(Category::ALL[idx]);
            app.notice = None;
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let len = findings_len(state, app.tab);
            move_selection(&mut app.findings_state, len, 1);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let len = findings_len(state, app.tab);
            move_selection(&mut app.findings_state, len, -1);
        }
        _ => {}
    }
    false
}

fn findings_len(state: &ScanState, category: Category) -> usize {
    state
        .categories
        .get(&category)
        .map(|r| r.findings.len())
        .unwrap_or(0)
}

fn move_selection(list_state: &mut ListState, len: usize, delta: i64) {
    if len == 0 {
        list_state.select(Some(0));
        return;
    }
    let current = list_state.selected().unwrap_or(0) as i64;
    let next = (current + delta).clamp(0, len as i64 - 1);
    list_state.select(Some(next as usize));
}

fn draw(f: &mut ratatui::Frame, app: &mut App, state: &ScanState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.size());

    f.render_widget(header(app, state), chunks[0]);

    let titles: Vec<Line> = Category::ALL
        .iter()
        .map(|&category| {
            Line::from(format!(
                "{}({})",
                category.label(),
                findings_len(state, category)
            ))
        })
        .collect();
    let selected = Category::ALL
        .iter()
        .position(|&c| c == app.tab)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .block(Block::default().borders(Borders::ALL).title("カテゴリ"))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[1]);

    draw_findings(f, app, state, chunks[2]);

    let help = Paragraph::new(
        "s: スキャン開始  Tab/←→/1-5: カテゴリ切替  ↑↓: 選択  q: 終了",
    )
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[3]);
}

fn header<'a>(app: &App, state: &ScanState) -> Paragraph<'a> {
    let summary = state.summary();
    let status_span = match summary.status {
        ScanStatus::Idle => Span::styled("idle", Style::default().fg(Color::DarkGray)),
        ScanStatus::Scanning => Span::styled(
            "scanning...",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        ScanStatus::Completed => Span::styled("completed", Style::default().fg(Color::Green)),
        ScanStatus::Error => Span::styled(
            "error",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };

    let mut lines = vec![Line::from(vec![
        Span::raw("状態: "),
        status_span,
        Span::raw(format!(
            "  検出合計: {}  最終スキャン: {}",
            summary.total_issues,
            summary.last_scan.as_deref().unwrap_or("なし")
        )),
    ])];

    if let Some(last_error) = &state.last_error {
        lines.push(Line::from(Span::styled(
            format!("エラー: {last_error}"),
            Style::default().fg(Color::Red),
        )));
    } else if let Some(notice) = &app.notice {
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Cyan),
        )));
    } else if !summary.failed.is_empty() {
        let failed: Vec<&str> = summary.failed.iter().map(|c| c.as_str()).collect();
        lines.push(Line::from(Span::styled(
            format!("確認できなかったカテゴリ: {}", failed.join(", ")),
            Style::default().fg(Color::Yellow),
        )));
    }

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("awscan ダッシュボード"),
    )
}

fn draw_findings(f: &mut ratatui::Frame, app: &mut App, state: &ScanState, area: ratatui::layout::Rect) {
    let result = state.categories.get(&app.tab);
    let title = format!("所見 - {}", app.tab.label());

    let Some(result) = result else {
        let body = if state.status == ScanStatus::Scanning {
            "確認中..."
        } else {
            "まだスキャンしていません。s でスキャンを開始してください。"
        };
        let paragraph = Paragraph::new(body)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    };

    if let Some(error) = &result.error {
        let paragraph = Paragraph::new(format!("このカテゴリは確認できませんでした:\n{error}"))
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    if result.findings.is_empty() {
        let paragraph = Paragraph::new("問題は見つかりませんでした。")
            .style(Style::default().fg(Color::Green))
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = result
        .findings
        .iter()
        .map(|finding| ListItem::new(finding_line(finding, app.color)))
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, area, &mut app.findings_state);
}

fn finding_line(finding: &Finding, color: bool) -> Line<'static> {
    let risk_style = if !color {
        Style::default()
    } else {
        match finding.risk {
            RiskLevel::Low => Style::default().fg(Color::Green),
            RiskLevel::Medium => Style::default().fg(Color::Yellow),
            RiskLevel::High => Style::default().fg(Color::Red),
        }
    };

    let mut spans = vec![
        Span::styled(format!("[{}] ", finding.risk.as_str()), risk_style),
        Span::raw(finding.resource.clone()),
        Span::raw(format!("  {}", finding.finding_type)),
    ];
    let detail = crate::ui::detail_string(finding);
    if !detail.is_empty() {
        spans.push(Span::styled(
            format!("  {detail}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}
