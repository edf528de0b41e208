use crate::bridge::StreamingBridge;
use crate::event::{ConnectionState, RelayEvent};
use crate::session::{store, Role, SessionStore};
use crate::theme::Theme;
use eframe::egui::{self, Color32, RichText, ScrollArea};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

/// Drain cadence while a reply is streaming, and the relaxed cadence that
/// keeps health-state changes surfacing when nothing is in flight.
const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(50);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct SpotterApp {
    rx: Receiver<RelayEvent>,
    bridge: StreamingBridge,
    store: SessionStore,
    connection_state: ConnectionState,
    model: String,
    input_buffer: String,
    scroll_to_bottom: bool,
    theme: Theme,
}

impl SpotterApp {
    pub fn new(rx: Receiver<RelayEvent>, bridge: StreamingBridge, model: String) -> Self {
        let (records, warnings) = store::load_all();
        for warning in warnings {
            log::warn!("session load: {warning}");
        }

        let mut store = SessionStore::from_records(records);
        if store.is_empty() {
            let id = store.create_chat();
            Self::persist(&store, &id);
        }

        Self {
            rx,
            bridge,
            store,
            connection_state: ConnectionState::Connecting,
            model,
            input_buffer: String::new(),
            scroll_to_bottom: false,
            theme: Theme::default(),
        }
    }

    fn persist(store: &SessionStore, id: &str) {
        let Some(session) = store.get(id) else {
            return;
        };
        let record = store::SessionRecord::from_session(session);
        if let Err(err) = store::save(&record) {
            log::warn!("failed to persist session {id}: {err}");
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, Some(ctx)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("relay channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: RelayEvent, ctx: Option<&egui::Context>) {
        match event {
            RelayEvent::Chunk { session, text } => {
                self.store.push_chunk(&session, &text);
                self.scroll_to_bottom = true;
                if let Some(ctx) = ctx {
                    ctx.request_repaint();
                }
            }
            RelayEvent::Completed { session, content } => {
                if self.store.complete_exchange(&session, content) {
                    Self::persist(&self.store, &session);
                }
                self.scroll_to_bottom = true;
                if let Some(ctx) = ctx {
                    ctx.request_repaint();
                }
            }
            RelayEvent::Failed { session, failure } => {
                log::warn!("stream failed for {session}: {failure:?}");
                if self.store.fail_exchange(&session, failure.user_message()) {
                    Self::persist(&self.store, &session);
                }
                if let Some(ctx) = ctx {
                    ctx.request_repaint();
                }
            }
            RelayEvent::StatusChanged(state) => {
                log::info!("ollama connection state: {state:?}");
                self.connection_state = state;
            }
        }
    }

    fn submit_prompt(&mut self, ctx: &egui::Context) {
        let prompt = self.input_buffer.trim().to_string();
        if prompt.is_empty() {
            return;
        }
        let Some(id) = self.store.active_id().map(str::to_string) else {
            return;
        };

        self.store.begin_exchange(&id, &prompt);
        Self::persist(&self.store, &id);

        let history = self
            .store
            .get(&id)
            .map(|session| session.history.clone())
            .unwrap_or_default();
        self.bridge.send(id, &history);

        self.input_buffer.clear();
        self.scroll_to_bottom = true;
        ctx.request_repaint();
    }

    fn connection_label(&self) -> (&'static str, Color32) {
        match self.connection_state {
            ConnectionState::Connected => ("Ollama Connected", self.theme.success),
            ConnectionState::Connecting => ("Connecting...", self.theme.warning),
            ConnectionState::Disconnected => ("Ollama Unreachable", self.theme.text_muted),
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let (status_label, status_color) = self.connection_label();
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Spotter");
                ui.separator();
                ui.label(RichText::new(status_label).color(status_color));
                ui.separator();
                ui.label(
                    RichText::new(format!("model: {}", self.model)).color(self.theme.text_muted),
                );
            });
        });
    }

    fn render_sidebar(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("chat_list_panel")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("AI Fitness Coach");
                ui.add_space(self.theme.spacing_8);

                let new_chat = egui::Button::new(
                    RichText::new("New Chat").color(self.theme.text_primary),
                )
                .fill(self.theme.accent_new_chat);
                if ui
                    .add_sized([ui.available_width(), self.theme.button_height], new_chat)
                    .clicked()
                {
                    let id = self.store.create_chat();
                    Self::persist(&self.store, &id);
                    self.scroll_to_bottom = true;
                }

                ui.separator();
                let mut clicked: Option<String> = None;
                ScrollArea::vertical().id_salt("chat_list").show(ui, |ui| {
                    for session in self.store.sessions() {
                        let selected = self.store.is_active(&session.id);
                        if ui.selectable_label(selected, &session.title).clicked() {
                            clicked = Some(session.id.clone());
                        }
                    }
                });

                if let Some(id) = clicked {
                    self.store.activate(&id);
                    self.scroll_to_bottom = true;
                }
            });
    }

    fn render_central(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.store.active().is_none() {
                self.render_welcome(ui);
                return;
            }
            self.render_transcript(ui);
            ui.add_space(self.theme.spacing_8);
            self.render_composer(ui, ctx);
        });
    }

    fn render_welcome(&self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(120.0);
            ui.heading(
                RichText::new("Welcome to Your AI Fitness Coach")
                    .color(self.theme.accent_new_chat)
                    .size(24.0),
            );
            ui.add_space(self.theme.spacing_16);
            ui.label(
                "I can help you with:\n\n\
                 - Workout Plans\n\
                 - Diet & Nutrition\n\
                 - Weight Loss or Muscle Gain Goals\n\
                 - Personalized Coaching",
            );
            ui.add_space(self.theme.spacing_16);
            ui.label(
                RichText::new(format!("Running locally using {} via Ollama", self.model))
                    .color(self.theme.text_muted),
            );
        });
    }

    fn render_transcript(&mut self, ui: &mut egui::Ui) {
        let theme = &self.theme;
        let Some(session) = self.store.active() else {
            return;
        };

        let transcript_height = (ui.available_height() - 110.0).max(120.0);
        theme.transcript_frame().show(ui, |ui| {
            ScrollArea::vertical()
                .id_salt("chat_transcript")
                .max_height(transcript_height)
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for turn in &session.history {
                        Self::bubble(theme, ui, turn.role, &turn.content);
                    }

                    if session.pending && !session.partial.is_empty() {
                        Self::bubble(theme, ui, Role::Assistant, &session.partial);
                    }

                    if let Some(error) = &session.last_error {
                        Self::error_notice(theme, ui, error);
                    }

                    if self.scroll_to_bottom {
                        ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                    }
                });
        });
        self.scroll_to_bottom = false;
    }

    fn bubble(theme: &Theme, ui: &mut egui::Ui, role: Role, text: &str) {
        let (fill, align) = match role {
            Role::User => (theme.bubble_user, egui::Align::Max),
            Role::Assistant => (theme.bubble_assistant, egui::Align::Min),
        };
        let max_width = ui.available_width() * 0.75;
        ui.with_layout(egui::Layout::top_down(align), |ui| {
            theme.bubble_frame(fill).show(ui, |ui| {
                ui.set_max_width(max_width);
                ui.label(RichText::new(text).color(theme.text_primary));
            });
        });
        ui.add_space(theme.spacing_4);
    }

    fn error_notice(theme: &Theme, ui: &mut egui::Ui, text: &str) {
        ui.with_layout(egui::Layout::top_down(egui::Align::Min), |ui| {
            theme.bubble_frame(theme.surface_2).show(ui, |ui| {
                ui.set_max_width(ui.available_width() * 0.75);
                ui.label(RichText::new(text).color(theme.danger));
            });
        });
        ui.add_space(theme.spacing_4);
    }

    fn render_composer(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let connected = self.connection_state == ConnectionState::Connected;
        let pending = self.store.active().map(|s| s.pending).unwrap_or(false);
        let input_enabled = connected && !pending;
        let hint = if !connected {
            "Ollama is not reachable"
        } else if pending {
            "Waiting for response..."
        } else {
            "Type a message..."
        };

        let mut send_now = false;
        self.theme.composer_frame().show(ui, |ui| {
            ui.horizontal(|ui| {
                let response = ui.add_enabled(
                    input_enabled,
                    egui::TextEdit::singleline(&mut self.input_buffer)
                        .desired_width(f32::INFINITY)
                        .hint_text(hint),
                );
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    send_now = true;
                }

                let clicked = ui
                    .add_enabled(
                        input_enabled && !self.input_buffer.trim().is_empty(),
                        egui::Button::new("Send"),
                    )
                    .clicked();
                send_now |= clicked;
            });
        });

        if send_now && input_enabled {
            self.submit_prompt(ctx);
        }
    }
}

impl eframe::App for SpotterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);

        let poll = if self.store.any_pending() {
            STREAM_POLL_INTERVAL
        } else {
            IDLE_POLL_INTERVAL
        };
        ctx.request_repaint_after(poll);

        self.render_top_bar(ctx);
        self.render_sidebar(ctx);
        self.render_central(ctx);
    }
}
