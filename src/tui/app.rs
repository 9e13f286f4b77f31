use crate::config::AppConfig;
use crate::service::preferences::{self, Theme};
use crate::service::query::{self, ColorFilter};
use crate::service::{NoteStore, StoreError};
use crate::storage::kv::{FileKvStore, KeyValueStore};
use crate::storage::note::{Note, Swatch};
use anyhow::Result;
use ratatui::prelude::*;
use ratatui::widgets::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    List,
    Compose,
    Search,
    FilterMenu,
    TrashConfirm,
    Trash,
    PurgeConfirm,
    EmptyTrashConfirm,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Content,
}

/// The add/edit form
#[derive(Debug, Clone)]
pub struct NoteForm {
    pub title: String,
    pub content: String,
    pub swatch: Swatch,
    pub focus: FormField,
}

impl Default for NoteForm {
    fn default() -> Self {
        NoteForm {
            title: String::new(),
            content: String::new(),
            swatch: Swatch::default(),
            focus: FormField::Title,
        }
    }
}

impl NoteForm {
    fn from_note(note: &Note) -> Self {
        NoteForm {
            title: note.title.clone(),
            content: note.content.clone(),
            swatch: note.color.swatch(),
            focus: FormField::Title,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Title => &mut self.title,
            FormField::Content => &mut self.content,
        }
    }
}

struct Palette {
    bg: Color,
    fg: Color,
    muted: Color,
    accent: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            bg: Color::Black,
            fg: Color::White,
            muted: Color::DarkGray,
            accent: Color::Cyan,
        },
        Theme::Light => Palette {
            bg: Color::White,
            fg: Color::Black,
            muted: Color::Gray,
            accent: Color::Blue,
        },
    }
}

fn swatch_color(swatch: Swatch) -> Color {
    match swatch {
        Swatch::Yellow => Color::Yellow,
        Swatch::Pink => Color::LightMagenta,
        Swatch::Green => Color::Green,
        Swatch::Blue => Color::Blue,
        Swatch::Orange => Color::Rgb(255, 165, 0),
        Swatch::Red => Color::Red,
        Swatch::Teal => Color::Cyan,
        Swatch::Purple => Color::Magenta,
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    if first.chars().count() > max_chars {
        format!("{}...", first.chars().take(max_chars).collect::<String>())
    } else {
        first.to_string()
    }
}

fn format_time(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Fixed-height box centered in `area`
fn popup_area(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

pub struct App {
    pub store: NoteStore<Box<dyn KeyValueStore>>,
    pub visible: Vec<Note>,
    pub filter: ColorFilter,
    pub search_query: String,
    pub selected_index: usize,
    pub trash_selected_index: usize,
    pub filter_selected_index: usize,
    pub mode: AppMode,
    pub form: NoteForm,
    pub editing_id: Option<String>,
    pub input_buffer: String,
    pub theme: Theme,
    pub should_quit: bool,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let backend = FileKvStore::open(&config.data_dir)?;
        log::info!("using data directory {}", backend.root().display());
        Ok(Self::with_backend(Box::new(backend)))
    }

    pub fn with_backend(backend: Box<dyn KeyValueStore>) -> Self {
        let theme = preferences::load_theme(&backend);
        let store = NoteStore::open(backend);

        let mut app = App {
            store,
            visible: Vec::new(),
            filter: ColorFilter::All,
            search_query: String::new(),
            selected_index: 0,
            trash_selected_index: 0,
            filter_selected_index: 0,
            mode: AppMode::List,
            form: NoteForm::default(),
            editing_id: None,
            input_buffer: String::new(),
            theme,
            should_quit: false,
            status_message: None,
        };
        app.refresh();
        app
    }

    /// Re-derive the visible notes after any change to the store or filters
    fn refresh(&mut self) {
        self.visible = query::visible_notes(self.store.active(), self.filter, &self.search_query)
            .into_iter()
            .cloned()
            .collect();
        if self.selected_index >= self.visible.len() {
            self.selected_index = self.visible.len().saturating_sub(1);
        }
        let trash_len = self.store.trashed().len();
        if self.trash_selected_index >= trash_len {
            self.trash_selected_index = trash_len.saturating_sub(1);
        }
    }

    fn select_note(&mut self, id: &str) {
        if let Some(idx) = self.visible.iter().position(|n| n.id == id) {
            self.selected_index = idx;
        }
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.visible.get(self.selected_index)
    }

    pub fn selected_trashed(&self) -> Option<&Note> {
        self.store.trashed().get(self.trash_selected_index)
    }

    fn report(&mut self, err: StoreError) {
        let message = match &err {
            StoreError::NotFound(id) => {
                log::debug!("stale reference to note {}", id);
                "ℹ That note no longer exists, view refreshed".to_string()
            }
            StoreError::Validation => format!("✗ {}", err),
            StoreError::Persistence(e) => {
                log::error!("store write failed: {:#}", e);
                format!("✗ Failed to save: {}", e)
            }
        };
        self.status_message = Some(message);
        self.refresh();
    }

    fn clear_form(&mut self) {
        self.form = NoteForm::default();
        self.editing_id = None;
    }

    pub fn handle_key(&mut self, key: crossterm::event::KeyCode, modifiers: crossterm::event::KeyModifiers) -> Result<()> {
        match self.mode {
            AppMode::List => self.handle_list_key(key)?,
            AppMode::Compose => self.handle_compose_key(key, modifiers)?,
            AppMode::Search => self.handle_search_key(key)?,
            AppMode::FilterMenu => self.handle_filter_menu_key(key)?,
            AppMode::TrashConfirm => self.handle_trash_confirm_key(key)?,
            AppMode::Trash => self.handle_trash_key(key)?,
            AppMode::PurgeConfirm => self.handle_purge_confirm_key(key)?,
            AppMode::EmptyTrashConfirm => self.handle_empty_trash_confirm_key(key)?,
            AppMode::Help => self.handle_help_key(key)?,
        }
        Ok(())
    }

    fn handle_list_key(&mut self, key: crossterm::event::KeyCode) -> Result<()> {
        match key {
            crossterm::event::KeyCode::Esc => {
                if !self.search_query.is_empty() || self.filter != ColorFilter::All {
                    // Clear search and color filter first
                    self.search_query.clear();
                    self.filter = ColorFilter::All;
                    self.selected_index = 0;
                    self.refresh();
                } else {
                    self.should_quit = true;
                }
            }
            crossterm::event::KeyCode::Char('q') => {
                self.should_quit = true;
            }
            crossterm::event::KeyCode::Char('j') | crossterm::event::KeyCode::Down => {
                if self.selected_index + 1 < self.visible.len() {
                    self.selected_index += 1;
                }
            }
            crossterm::event::KeyCode::Char('k') | crossterm::event::KeyCode::Up => {
                if self.selected_index > 0 {
                    self.selected_index -= 1;
                }
            }
            crossterm::event::KeyCode::Char('n') => {
                self.clear_form();
                self.mode = AppMode::Compose;
                self.status_message = None;
            }
            crossterm::event::KeyCode::Char('e') | crossterm::event::KeyCode::Enter => {
                if let Some(note) = self.selected_note().cloned() {
                    self.form = NoteForm::from_note(&note);
                    self.editing_id = Some(note.id);
                    self.mode = AppMode::Compose;
                    self.status_message = None;
                }
            }
            crossterm::event::KeyCode::Char('p') => {
                if let Some(id) = self.selected_note().map(|n| n.id.clone()) {
                    match self.store.toggle_pinned(&id) {
                        Ok(note) => {
                            self.refresh();
                            self.select_note(&note.id);
                            let verb = if note.pinned { "Pinned" } else { "Unpinned" };
                            self.status_message = Some(format!("✓ {}: {}", verb, note.display_title()));
                        }
                        Err(e) => self.report(e),
                    }
                }
            }
            crossterm::event::KeyCode::Char('d') => {
                if self.selected_note().is_some() {
                    self.mode = AppMode::TrashConfirm;
                }
            }
            crossterm::event::KeyCode::Char('K') => self.move_selected(true),
            crossterm::event::KeyCode::Char('J') => self.move_selected(false),
            crossterm::event::KeyCode::Char('/') => {
                self.mode = AppMode::Search;
                self.input_buffer = self.search_query.clone();
            }
            crossterm::event::KeyCode::Char('f') => {
                self.filter_selected_index = ColorFilter::options()
                    .iter()
                    .position(|f| *f == self.filter)
                    .unwrap_or(0);
                self.mode = AppMode::FilterMenu;
            }
            crossterm::event::KeyCode::Char('c') => {
                self.filter = ColorFilter::All;
                self.refresh();
            }
            crossterm::event::KeyCode::Char('t') => {
                self.trash_selected_index = 0;
                self.mode = AppMode::Trash;
                self.status_message = None;
            }
            crossterm::event::KeyCode::Char('T') => self.toggle_theme(),
            crossterm::event::KeyCode::Char('?') => {
                self.mode = AppMode::Help;
            }
            _ => {}
        }
        Ok(())
    }

    /// Swap the selected note with its visible neighbour in the same pin group
    fn move_selected(&mut self, up: bool) {
        let Some(current) = self.selected_note().map(|n| n.id.clone()) else {
            return;
        };
        let neighbour = if up {
            self.selected_index.checked_sub(1)
        } else {
            Some(self.selected_index + 1)
        };
        let Some(other) = neighbour
            .and_then(|idx| self.visible.get(idx))
            .map(|n| n.id.clone())
        else {
            return;
        };

        let result = if up {
            self.store.reorder(&current, &other)
        } else {
            self.store.reorder(&other, &current)
        };
        match result {
            Ok(true) => {
                self.refresh();
                self.select_note(&current);
            }
            Ok(false) => {
                self.status_message =
                    Some("ℹ Pinned and unpinned notes are ordered separately".to_string());
            }
            Err(e) => self.report(e),
        }
    }

    fn toggle_theme(&mut self) {
        let theme = self.theme.toggled();
        match preferences::save_theme(self.store.backend_mut(), theme) {
            Ok(()) => {
                self.theme = theme;
                self.status_message = Some(format!("✓ Theme: {}", theme.as_str()));
            }
            Err(e) => {
                log::error!("failed to save theme: {:#}", e);
                self.status_message = Some(format!("✗ Failed to save theme: {}", e));
            }
        }
    }

    fn handle_compose_key(&mut self, key: crossterm::event::KeyCode, modifiers: crossterm::event::KeyModifiers) -> Result<()> {
        match key {
            crossterm::event::KeyCode::Esc => {
                self.clear_form();
                self.mode = AppMode::List;
                self.status_message = None;
            }
            crossterm::event::KeyCode::Char('s') if modifiers.contains(crossterm::event::KeyModifiers::CONTROL) => {
                self.save_form();
            }
            crossterm::event::KeyCode::Tab | crossterm::event::KeyCode::BackTab => {
                self.form.focus = match self.form.focus {
                    FormField::Title => FormField::Content,
                    FormField::Content => FormField::Title,
                };
            }
            crossterm::event::KeyCode::Left => {
                self.form.swatch = self.form.swatch.prev();
            }
            crossterm::event::KeyCode::Right => {
                self.form.swatch = self.form.swatch.next();
            }
            crossterm::event::KeyCode::Enter => match self.form.focus {
                FormField::Title => self.form.focus = FormField::Content,
                FormField::Content => self.form.content.push('\n'),
            },
            crossterm::event::KeyCode::Char(c) if !modifiers.contains(crossterm::event::KeyModifiers::CONTROL) => {
                self.form.focused_mut().push(c);
            }
            crossterm::event::KeyCode::Backspace => {
                self.form.focused_mut().pop();
            }
            _ => {}
        }
        Ok(())
    }

    fn save_form(&mut self) {
        let title = self.form.title.trim().to_string();
        let content = self.form.content.trim().to_string();
        let swatch = self.form.swatch;

        let result = match self.editing_id.clone() {
            Some(id) => self.store.update(&id, title, content, swatch),
            None => self.store.create(title, content, swatch),
        };
        let verb = if self.editing_id.is_some() { "Saved" } else { "Added" };

        match result {
            Ok(note) => {
                self.clear_form();
                self.mode = AppMode::List;
                self.refresh();
                self.select_note(&note.id);
                self.status_message = Some(format!("✓ {}: {}", verb, note.display_title()));
            }
            // Keep the form open so the input can be fixed
            Err(StoreError::Validation) => {
                self.status_message = Some(format!("✗ {}", StoreError::Validation));
            }
            Err(e) => {
                self.clear_form();
                self.mode = AppMode::List;
                self.report(e);
            }
        }
    }

    fn handle_search_key(&mut self, key: crossterm::event::KeyCode) -> Result<()> {
        match key {
            crossterm::event::KeyCode::Esc => {
                self.mode = AppMode::List;
                self.input_buffer.clear();
                self.search_query.clear();
                self.selected_index = 0;
                self.refresh();
            }
            crossterm::event::KeyCode::Enter => {
                self.search_query = self.input_buffer.trim().to_string();
                self.input_buffer.clear();
                self.mode = AppMode::List;
                self.refresh();
            }
            crossterm::event::KeyCode::Char(c) => {
                self.input_buffer.push(c);
                // Live search as you type
                self.search_query = self.input_buffer.clone();
                self.selected_index = 0;
                self.refresh();
            }
            crossterm::event::KeyCode::Backspace => {
                self.input_buffer.pop();
                self.search_query = self.input_buffer.clone();
                self.selected_index = 0;
                self.refresh();
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_filter_menu_key(&mut self, key: crossterm::event::KeyCode) -> Result<()> {
        let options = ColorFilter::options();
        match key {
            crossterm::event::KeyCode::Esc => {
                self.mode = AppMode::List;
            }
            crossterm::event::KeyCode::Char('j') | crossterm::event::KeyCode::Down => {
                if self.filter_selected_index + 1 < options.len() {
                    self.filter_selected_index += 1;
                }
            }
            crossterm::event::KeyCode::Char('k') | crossterm::event::KeyCode::Up => {
                if self.filter_selected_index > 0 {
                    self.filter_selected_index -= 1;
                }
            }
            crossterm::event::KeyCode::Enter => {
                if let Some(filter) = options.get(self.filter_selected_index) {
                    self.filter = *filter;
                }
                self.selected_index = 0;
                self.mode = AppMode::List;
                self.refresh();
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_trash_confirm_key(&mut self, key: crossterm::event::KeyCode) -> Result<()> {
        match key {
            crossterm::event::KeyCode::Char('y') | crossterm::event::KeyCode::Enter => {
                if let Some(note) = self.selected_note().cloned() {
                    match self.store.move_to_trash(&note.id) {
                        Ok(()) => {
                            self.refresh();
                            self.status_message = Some(format!("✓ Moved to trash: {}", note.display_title()));
                        }
                        Err(e) => self.report(e),
                    }
                }
                self.mode = AppMode::List;
            }
            crossterm::event::KeyCode::Esc | crossterm::event::KeyCode::Char('n') => {
                self.mode = AppMode::List;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_trash_key(&mut self, key: crossterm::event::KeyCode) -> Result<()> {
        match key {
            crossterm::event::KeyCode::Esc | crossterm::event::KeyCode::Char('t') => {
                self.mode = AppMode::List;
                self.status_message = None;
            }
            crossterm::event::KeyCode::Char('j') | crossterm::event::KeyCode::Down => {
                if self.trash_selected_index + 1 < self.store.trashed().len() {
                    self.trash_selected_index += 1;
                }
            }
            crossterm::event::KeyCode::Char('k') | crossterm::event::KeyCode::Up => {
                if self.trash_selected_index > 0 {
                    self.trash_selected_index -= 1;
                }
            }
            crossterm::event::KeyCode::Char('r') => {
                if let Some(id) = self.selected_trashed().map(|n| n.id.clone()) {
                    match self.store.restore(&id) {
                        Ok(note) => {
                            self.refresh();
                            self.select_note(&note.id);
                            self.status_message = Some(format!("✓ Restored: {}", note.display_title()));
                        }
                        Err(e) => self.report(e),
                    }
                }
            }
            crossterm::event::KeyCode::Char('d') => {
                if self.selected_trashed().is_some() {
                    self.mode = AppMode::PurgeConfirm;
                }
            }
            crossterm::event::KeyCode::Char('E') => {
                if self.store.trashed().is_empty() {
                    self.status_message = Some("ℹ Trash is already empty".to_string());
                } else {
                    self.mode = AppMode::EmptyTrashConfirm;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_purge_confirm_key(&mut self, key: crossterm::event::KeyCode) -> Result<()> {
        match key {
            crossterm::event::KeyCode::Char('y') | crossterm::event::KeyCode::Enter => {
                if let Some(note) = self.selected_trashed().cloned() {
                    match self.store.purge(&note.id) {
                        Ok(()) => {
                            self.refresh();
                            self.status_message = Some(format!("✓ Deleted permanently: {}", note.display_title()));
                        }
                        Err(e) => self.report(e),
                    }
                }
                self.mode = AppMode::Trash;
            }
            crossterm::event::KeyCode::Esc | crossterm::event::KeyCode::Char('n') => {
                self.mode = AppMode::Trash;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_empty_trash_confirm_key(&mut self, key: crossterm::event::KeyCode) -> Result<()> {
        match key {
            crossterm::event::KeyCode::Char('y') | crossterm::event::KeyCode::Enter => {
                match self.store.purge_all() {
                    Ok(count) => {
                        self.refresh();
                        self.status_message = Some(format!("✓ Emptied trash ({} notes)", count));
                    }
                    Err(e) => self.report(e),
                }
                self.mode = AppMode::Trash;
            }
            crossterm::event::KeyCode::Esc | crossterm::event::KeyCode::Char('n') => {
                self.mode = AppMode::Trash;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_help_key(&mut self, key: crossterm::event::KeyCode) -> Result<()> {
        match key {
            crossterm::event::KeyCode::Esc
            | crossterm::event::KeyCode::Char('q')
            | crossterm::event::KeyCode::Char('?') => {
                self.mode = AppMode::List;
            }
            _ => {}
        }
        Ok(())
    }

    pub fn render(&self, frame: &mut Frame) {
        let colors = palette(self.theme);
        frame.render_widget(
            Block::default().style(Style::default().bg(colors.bg).fg(colors.fg)),
            frame.area(),
        );

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.render_title(frame, chunks[0], &colors);
        match self.mode {
            AppMode::List => self.render_list(frame, chunks[1], &colors),
            AppMode::Compose => self.render_compose(frame, chunks[1], &colors),
            AppMode::Search => self.render_search(frame, chunks[1], &colors),
            AppMode::FilterMenu => {
                self.render_list(frame, chunks[1], &colors);
                self.render_filter_menu(frame, chunks[1], &colors);
            }
            AppMode::TrashConfirm => {
                self.render_list(frame, chunks[1], &colors);
                let title = self.selected_note().map(|n| n.display_title()).unwrap_or("");
                self.render_confirm(frame, chunks[1], "Move to Trash", &format!("Move \"{}\" to the trash?", title));
            }
            AppMode::Trash => self.render_trash(frame, chunks[1], &colors),
            AppMode::PurgeConfirm => {
                self.render_trash(frame, chunks[1], &colors);
                let title = self.selected_trashed().map(|n| n.display_title()).unwrap_or("");
                self.render_confirm(
                    frame,
                    chunks[1],
                    "Delete Permanently",
                    &format!("Delete \"{}\" permanently? This cannot be undone.", title),
                );
            }
            AppMode::EmptyTrashConfirm => {
                self.render_trash(frame, chunks[1], &colors);
                self.render_confirm(frame, chunks[1], "Empty Trash", "Empty trash permanently?");
            }
            AppMode::Help => self.render_help(frame, chunks[1], &colors),
        }
        self.render_status(frame, chunks[2]);
        self.render_help_bar(frame, chunks[3], &colors);
    }

    fn render_title(&self, frame: &mut Frame, area: Rect, colors: &Palette) {
        let mut title_text = format!("Sticky Notes  {} {}", self.filter.emoji(), self.filter.label());
        if !self.search_query.is_empty() {
            title_text.push_str(&format!("  (Search: {})", self.search_query));
        }
        let title = Paragraph::new(title_text)
            .block(Block::default().borders(Borders::ALL).title("stickynotes"))
            .style(Style::default().fg(colors.accent));
        frame.render_widget(title, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some(ref message) = self.status_message {
            let color = if message.starts_with('✓') {
                Color::Green
            } else if message.starts_with('✗') {
                Color::Red
            } else {
                Color::Yellow
            };
            frame.render_widget(
                Paragraph::new(message.as_str()).style(Style::default().fg(color)),
                area,
            );
        }
    }

    fn render_help_bar(&self, frame: &mut Frame, area: Rect, colors: &Palette) {
        let text = match self.mode {
            AppMode::List | AppMode::FilterMenu | AppMode::TrashConfirm => {
                "j/k: navigate | n: new | e: edit | p: pin | J/K: move | d: trash | /: search | f: filter | c: clear filter | t: trash | T: theme | ?: help | q: quit"
            }
            AppMode::Compose => "Tab: switch field | ←/→: color | Ctrl+S: save | Esc: cancel",
            AppMode::Search => "type to search | Enter: apply | Esc: clear",
            AppMode::Trash | AppMode::PurgeConfirm | AppMode::EmptyTrashConfirm => {
                "j/k: navigate | r: restore | d: delete permanently | E: empty trash | Esc: back"
            }
            AppMode::Help => "Esc: back",
        };
        let help = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .style(Style::default().fg(colors.muted));
        frame.render_widget(help, area);
    }

    fn note_item<'a>(&self, note: &'a Note, colors: &Palette) -> ListItem<'a> {
        let swatch_style = Style::default().fg(swatch_color(note.color.swatch()));
        let mut lines = vec![Line::from(vec![
            Span::styled("█ ", swatch_style),
            Span::raw(if note.pinned { "📌 " } else { "" }),
            Span::styled(
                note.display_title(),
                Style::default().fg(colors.fg).add_modifier(Modifier::BOLD),
            ),
        ])];

        let body = preview(&note.content, 60);
        if !body.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("  ", Style::default()),
                Span::styled(body, Style::default().fg(colors.muted)),
            ]));
        }

        let stamp = match note.deleted_at {
            Some(ref deleted) => format!("  🗑️ {}", format_time(deleted)),
            None => format!("  📅 {}", format_time(&note.updated_at)),
        };
        lines.push(Line::from(Span::styled(stamp, Style::default().fg(colors.muted))));
        ListItem::new(lines)
    }

    fn render_list(&self, frame: &mut Frame, area: Rect, colors: &Palette) {
        let block_title = format!("Notes ({})", self.visible.len());
        if self.visible.is_empty() {
            let message = if self.store.active().is_empty() {
                "No notes yet. Press n to add one."
            } else {
                "No notes match the current search or filter."
            };
            let empty = Paragraph::new(message)
                .block(Block::default().borders(Borders::ALL).title(block_title))
                .style(Style::default().fg(colors.muted))
                .wrap(Wrap { trim: true });
            frame.render_widget(empty, area);
            return;
        }

        let items: Vec<ListItem> = self
            .visible
            .iter()
            .map(|note| self.note_item(note, colors))
            .collect();

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected_index));

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(block_title))
            .highlight_style(Style::default().bg(colors.muted))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_compose(&self, frame: &mut Frame, area: Rect, colors: &Palette) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(area);

        let field_style = |field: FormField| {
            if self.form.focus == field {
                Style::default().fg(colors.accent)
            } else {
                Style::default().fg(colors.muted)
            }
        };

        let heading = if self.editing_id.is_some() { "Edit Note" } else { "Add Note" };
        let title = Paragraph::new(self.form.title.as_str())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(field_style(FormField::Title))
                    .title(format!("{}: Title", heading)),
            )
            .style(Style::default().fg(colors.fg));
        frame.render_widget(title, chunks[0]);

        let content_title = format!(
            "Content ({} chars, {} lines)",
            self.form.content.chars().count(),
            self.form.content.lines().count()
        );
        let content = Paragraph::new(self.form.content.as_str())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(field_style(FormField::Content))
                    .title(content_title),
            )
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(colors.fg));
        frame.render_widget(content, chunks[1]);

        let mut swatches = Vec::new();
        for swatch in Swatch::ALL {
            let style = Style::default().fg(swatch_color(swatch));
            if swatch == self.form.swatch {
                swatches.push(Span::styled(
                    format!("[{} {}] ", swatch.emoji(), swatch.label()),
                    style.add_modifier(Modifier::BOLD),
                ));
            } else {
                swatches.push(Span::styled(format!(" {}  ", swatch.emoji()), style));
            }
        }
        let palette_row = Paragraph::new(Line::from(swatches))
            .block(Block::default().borders(Borders::ALL).title("Color"));
        frame.render_widget(palette_row, chunks[2]);
    }

    fn render_search(&self, frame: &mut Frame, area: Rect, colors: &Palette) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let search = Paragraph::new(format!("🔍 {}", self.input_buffer))
            .block(Block::default().borders(Borders::ALL).title("Search (type to search, Enter to apply)"))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(search, chunks[0]);

        self.render_list(frame, chunks[1], colors);
    }

    fn render_filter_menu(&self, frame: &mut Frame, area: Rect, colors: &Palette) {
        let options = ColorFilter::options();
        let popup = popup_area(area, 40, options.len() as u16 + 2);
        let items: Vec<ListItem> = options
            .iter()
            .map(|f| {
                let marker = if *f == self.filter { " ✓" } else { "" };
                ListItem::new(format!("{} {}{}", f.emoji(), f.label(), marker))
            })
            .collect();

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.filter_selected_index));
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Filter by color"))
            .style(Style::default().bg(colors.bg).fg(colors.fg))
            .highlight_style(Style::default().fg(colors.accent).add_modifier(Modifier::BOLD))
            .highlight_symbol("▶ ");
        frame.render_widget(Clear, popup);
        frame.render_stateful_widget(list, popup, &mut state);
    }

    fn render_trash(&self, frame: &mut Frame, area: Rect, colors: &Palette) {
        let trashed = self.store.trashed();
        let block_title = format!("Trash ({})", trashed.len());
        if trashed.is_empty() {
            let empty = Paragraph::new("Trash is empty.")
                .block(Block::default().borders(Borders::ALL).title(block_title))
                .style(Style::default().fg(colors.muted));
            frame.render_widget(empty, area);
            return;
        }

        let items: Vec<ListItem> = trashed.iter().map(|note| self.note_item(note, colors)).collect();
        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.trash_selected_index));
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(block_title))
            .highlight_style(Style::default().bg(colors.muted))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_confirm(&self, frame: &mut Frame, area: Rect, heading: &str, message: &str) {
        let popup = popup_area(area, 60, 5);
        let confirm = Paragraph::new(format!("{}\n\nEnter/y: confirm | Esc/n: cancel", message))
            .block(Block::default().borders(Borders::ALL).title(heading))
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Red));
        frame.render_widget(Clear, popup);
        frame.render_widget(confirm, popup);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect, colors: &Palette) {
        let rows = [
            ("j / k", "move the selection"),
            ("n", "add a note"),
            ("e / Enter", "edit the selected note"),
            ("p", "pin or unpin"),
            ("J / K", "move the note down / up within its group"),
            ("d", "move to trash"),
            ("/", "search titles and content"),
            ("f / c", "filter by color / clear the color filter"),
            ("t", "open the trash (r restore, d delete, E empty)"),
            ("T", "switch between dark and light"),
            ("Ctrl+S", "save while editing"),
            ("Esc", "clear search and filter, then quit"),
        ];
        let lines: Vec<Line> = rows
            .iter()
            .map(|(keys, what)| {
                Line::from(vec![
                    Span::styled(format!("{:>12}  ", keys), Style::default().fg(colors.accent)),
                    Span::styled(*what, Style::default().fg(colors.fg)),
                ])
            })
            .collect();
        let help = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Keys"));
        frame.render_widget(help, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryKvStore;
    use crate::storage::records::THEME_KEY;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn app() -> App {
        App::with_backend(Box::new(MemoryKvStore::new()))
    }

    fn press(app: &mut App, key: KeyCode) {
        app.handle_key(key, KeyModifiers::NONE).unwrap();
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn save(app: &mut App) {
        app.handle_key(KeyCode::Char('s'), KeyModifiers::CONTROL).unwrap();
    }

    fn add_note(app: &mut App, title: &str, content: &str) {
        press(app, KeyCode::Char('n'));
        type_text(app, title);
        press(app, KeyCode::Tab);
        type_text(app, content);
        save(app);
    }

    fn visible_titles(app: &App) -> Vec<&str> {
        app.visible.iter().map(|n| n.title.as_str()).collect()
    }

    #[test]
    fn compose_creates_a_colored_note() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "  Milk ");
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Buy milk");
        press(&mut app, KeyCode::Right);
        save(&mut app);

        assert_eq!(app.mode, AppMode::List);
        let note = &app.store.active()[0];
        assert_eq!(note.title, "Milk");
        assert_eq!(note.content, "Buy milk");
        assert_eq!(note.color.swatch(), Swatch::Pink);
        assert!(app.status_message.as_deref().unwrap().starts_with('✓'));
    }

    #[test]
    fn control_chords_are_not_typed_into_the_form() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Mi");
        app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL).unwrap();
        app.handle_key(KeyCode::Char('K'), KeyModifiers::SHIFT).unwrap();
        press(&mut app, KeyCode::Tab);
        app.handle_key(KeyCode::Char('x'), KeyModifiers::CONTROL).unwrap();

        assert_eq!(app.mode, AppMode::Compose);
        assert_eq!(app.form.title, "MiK");
        assert!(app.form.content.is_empty());
    }

    #[test]
    fn blank_form_stays_open() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "   ");
        save(&mut app);

        assert_eq!(app.mode, AppMode::Compose);
        assert!(app.store.active().is_empty());
        assert_eq!(app.status_message.as_deref(), Some("✗ Please add title or content."));
    }

    #[test]
    fn editing_updates_in_place() {
        let mut app = app();
        add_note(&mut app, "first", "");
        add_note(&mut app, "second", "");
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.form.title, "first");

        press(&mut app, KeyCode::Backspace);
        save(&mut app);
        assert_eq!(visible_titles(&app), vec!["second", "firs"]);
        assert_eq!(app.store.active().len(), 2);
        assert!(app.editing_id.is_none());
    }

    #[test]
    fn editing_a_vanished_note_refreshes() {
        let mut app = app();
        add_note(&mut app, "gone", "");
        press(&mut app, KeyCode::Char('e'));
        let id = app.editing_id.clone().unwrap();
        app.store.move_to_trash(&id).unwrap();
        save(&mut app);

        assert_eq!(app.mode, AppMode::List);
        assert!(app.visible.is_empty());
        assert!(app.status_message.as_deref().unwrap().starts_with('ℹ'));
    }

    #[test]
    fn pin_moves_note_to_top_and_keeps_selection() {
        let mut app = app();
        add_note(&mut app, "a", "");
        add_note(&mut app, "b", "");
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('p'));

        assert_eq!(visible_titles(&app), vec!["a", "b"]);
        assert!(app.visible[0].pinned);
        assert_eq!(app.selected_note().unwrap().title, "a");
    }

    #[test]
    fn move_keys_reorder_within_group() {
        let mut app = app();
        add_note(&mut app, "c", "");
        add_note(&mut app, "b", "");
        add_note(&mut app, "a", "");
        // a selected
        press(&mut app, KeyCode::Char('J'));
        assert_eq!(visible_titles(&app), vec!["b", "a", "c"]);
        assert_eq!(app.selected_note().unwrap().title, "a");

        press(&mut app, KeyCode::Char('K'));
        assert_eq!(visible_titles(&app), vec!["a", "b", "c"]);

        press(&mut app, KeyCode::Char('p'));
        press(&mut app, KeyCode::Char('J'));
        assert_eq!(visible_titles(&app), vec!["a", "b", "c"]);
        assert!(app.status_message.as_deref().unwrap().starts_with('ℹ'));
    }

    #[test]
    fn trash_restore_and_purge_flow() {
        let mut app = app();
        add_note(&mut app, "keep", "");
        add_note(&mut app, "toss", "");

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.mode, AppMode::TrashConfirm);
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(visible_titles(&app), vec!["keep"]);
        assert_eq!(app.store.trashed().len(), 1);

        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('r'));
        assert!(app.store.trashed().is_empty());
        assert_eq!(app.store.active().len(), 2);

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.mode, AppMode::List);
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.mode, AppMode::PurgeConfirm);
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.mode, AppMode::Trash);
        assert!(app.store.trashed().is_empty());

        press(&mut app, KeyCode::Char('E'));
        assert_eq!(app.mode, AppMode::Trash);
        assert_eq!(app.status_message.as_deref(), Some("ℹ Trash is already empty"));
    }

    #[test]
    fn empty_trash_needs_confirmation() {
        let mut app = app();
        add_note(&mut app, "one", "");
        add_note(&mut app, "two", "");
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));

        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('E'));
        assert_eq!(app.mode, AppMode::EmptyTrashConfirm);
        press(&mut app, KeyCode::Char('y'));
        assert!(app.store.trashed().is_empty());
        assert_eq!(app.status_message.as_deref(), Some("✓ Emptied trash (2 notes)"));
    }

    #[test]
    fn search_filters_live_and_escape_clears() {
        let mut app = app();
        add_note(&mut app, "Groceries", "buy milk");
        add_note(&mut app, "Work", "standup");

        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "MILK");
        assert_eq!(visible_titles(&app), vec!["Groceries"]);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, AppMode::List);
        assert_eq!(app.search_query, "MILK");

        press(&mut app, KeyCode::Esc);
        assert_eq!(visible_titles(&app).len(), 2);
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit);
    }

    #[test]
    fn filter_menu_selects_a_color() {
        let mut app = app();
        add_note(&mut app, "yellow note", "");
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "pink note");
        press(&mut app, KeyCode::Right);
        save(&mut app);

        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.mode, AppMode::FilterMenu);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.filter, ColorFilter::Only(Swatch::Pink));
        assert_eq!(visible_titles(&app), vec!["pink note"]);

        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.filter, ColorFilter::All);
        assert_eq!(visible_titles(&app).len(), 2);
    }

    #[test]
    fn theme_toggle_is_persisted() {
        let mut app = app();
        assert_eq!(app.theme, Theme::Dark);
        press(&mut app, KeyCode::Char('T'));
        assert_eq!(app.theme, Theme::Light);
        assert_eq!(
            app.store.backend().get(THEME_KEY).unwrap().as_deref(),
            Some("light")
        );
    }

    #[test]
    fn renders_every_mode() {
        use ratatui::backend::TestBackend;

        let mut app = app();
        add_note(&mut app, "Milk", "Buy milk");
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        for key in ['?', '\u{1b}', 'f', '\u{1b}', 'd', 'n', 'n', '\u{1b}', 't', '\u{1b}', '/'] {
            terminal.draw(|f| app.render(f)).unwrap();
            let code = if key == '\u{1b}' { KeyCode::Esc } else { KeyCode::Char(key) };
            press(&mut app, code);
        }
        terminal.draw(|f| app.render(f)).unwrap();
    }

    #[test]
    fn preview_is_char_safe() {
        assert_eq!(preview("héllo wörld\nsecond", 5), "héllo...");
        assert_eq!(preview("short", 60), "short");
    }
}
