use anyhow::{bail, Context};
use controller::EsdConfig;
use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints};
use safety::{BlinkPhase, SafetyState};
use sim::{Bench, BenchConfig, TraceRow};
use std::fs;
use tracing::{info, warn};

/// Keep the plot bounded during long live runs.
const MAX_SAMPLES: usize = 20_000;

#[derive(Clone, Debug)]
struct Sample {
    t: f64,
    shutdown: bool,
    indicator: bool,
    sync_out: bool,
    /// Watchdog elapsed as a fraction of the timeout the row was recorded with.
    wdg: f64,
}

impl Sample {
    fn from_row(row: &TraceRow) -> Self {
        Self {
            t: row.t_s,
            shutdown: row.shutdown,
            indicator: row.indicator,
            sync_out: row.sync_out,
            wdg: f64::from(row.watchdog_elapsed) / f64::from(row.watchdog_timeout.max(1)),
        }
    }
}

fn level(on: bool, offset: f64) -> f64 {
    offset + if on { 0.8 } else { 0.0 }
}

struct App {
    // Settings
    cfg: EsdConfig,
    clock_hz: u32,
    seed: u64,
    ticks_per_frame: u64,
    sample_every: u64,
    ack_hold_ticks: u32,
    kick_period_ticks: u32,

    // Panel controls
    estop_a: bool,
    estop_b: bool,
    auto_kick: bool,
    async_in: bool,
    async_free: bool,
    async_period_ticks: u32,
    enable: bool,

    // Live simulation state
    running: bool,
    bench: Option<Bench>,
    samples: Vec<Sample>,

    // Replay
    replay_loaded: bool,
    replay_path: String,
    replay_all: Vec<Sample>,
    replay_pos: usize,
    replay_playing: bool,
    replay_speed: usize, // samples per frame
    last_error: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        let cfg = EsdConfig::default();
        let bench_cfg = BenchConfig::new(cfg);

        let mut app = Self {
            cfg,
            clock_hz: bench_cfg.clock_hz,
            seed: bench_cfg.seed,
            ticks_per_frame: 1_000,
            sample_every: 100,
            ack_hold_ticks: bench_cfg.ack_hold_ticks,
            kick_period_ticks: bench_cfg.kick_period_ticks,

            estop_a: false,
            estop_b: false,
            auto_kick: true,
            async_in: false,
            async_free: false,
            async_period_ticks: 50,
            enable: true,

            running: false,
            bench: None,
            samples: Vec::new(),

            replay_loaded: false,
            replay_path: "out/full_sequence.jsonl".to_string(),
            replay_all: Vec::new(),
            replay_pos: 0,
            replay_playing: false,
            replay_speed: 50,
            last_error: None,
        };

        app.reset_live();
        app
    }
}

impl App {
    fn clear_replay(&mut self) {
        self.replay_loaded = false;
        self.replay_all.clear();
        self.replay_pos = 0;
        self.replay_playing = false;
        self.last_error = None;
    }

    fn bench_config(&self) -> BenchConfig {
        let mut b = BenchConfig::new(self.cfg);
        b.clock_hz = self.clock_hz;
        b.seed = self.seed;
        b.ack_hold_ticks = self.ack_hold_ticks;
        b.kick_period_ticks = self.kick_period_ticks;
        b
    }

    fn reset_live(&mut self) {
        self.running = false;
        self.samples.clear();

        match Bench::new(self.bench_config()) {
            Ok(mut bench) => {
                bench.apply_reset(10);
                self.bench = Some(bench);
                self.last_error = None;
                self.apply_panel();
            }
            Err(e) => {
                warn!(error = %e, "rejected controller configuration");
                self.bench = None;
                self.last_error = Some(format!("Invalid configuration: {e}"));
            }
        }
    }

    fn reset(&mut self) {
        self.clear_replay();
        self.reset_live();
    }

    /// Push the panel switch positions onto the bench.
    fn apply_panel(&mut self) {
        let Some(bench) = self.bench.as_mut() else {
            return;
        };
        bench.set_estop_a(self.estop_a);
        bench.set_estop_b(self.estop_b);
        bench.set_auto_kick(self.auto_kick);
        bench.set_async_in(self.async_in);
        bench.set_async_period(self.async_free.then_some(self.async_period_ticks));
        bench.set_enable(self.enable);
    }

    fn press_ack(&mut self) {
        if let Some(bench) = self.bench.as_mut() {
            bench.tap_ack_button(self.ack_hold_ticks);
        }
    }

    fn pulse_reset(&mut self) {
        if let Some(bench) = self.bench.as_mut() {
            bench.apply_reset(10);
        }
    }

    fn kick_once(&mut self) {
        if let Some(bench) = self.bench.as_mut() {
            bench.set_wdg_kick(true);
            bench.step();
            bench.set_wdg_kick(false);
        }
    }

    fn step_live(&mut self, ticks: u64) {
        let every = self.sample_every.max(1);
        let Some(bench) = self.bench.as_mut() else {
            self.running = false;
            return;
        };

        for _ in 0..ticks {
            let before = bench.uo_out();
            bench.step();
            if bench.tick() % every == 0 || bench.uo_out() != before {
                self.samples
                    .push(Sample::from_row(&bench.trace_row()));
            }
        }

        if self.samples.len() > MAX_SAMPLES {
            let excess = self.samples.len() - MAX_SAMPLES;
            self.samples.drain(..excess);
        }
    }

    fn load_jsonl(&mut self, path: &str) {
        self.last_error = None;

        let loaded = match read_trace(path) {
            Ok(v) => v,
            Err(e) => {
                self.last_error = Some(format!("{e:#}"));
                return;
            }
        };

        info!(path, samples = loaded.len(), "loaded replay trace");

        // Enter replay mode
        self.running = false;
        self.clear_replay();
        self.replay_loaded = true;
        self.replay_all = loaded;

        // Start with an initial chunk so the plot isn't empty
        self.samples.clear();
        let initial = self.replay_speed.min(self.replay_all.len()).max(1);
        self.samples.extend_from_slice(&self.replay_all[..initial]);
        self.replay_pos = initial;
    }

    fn replay_advance(&mut self, n: usize) {
        if !self.replay_loaded || self.replay_pos >= self.replay_all.len() {
            self.replay_playing = false;
            return;
        }
        let end = (self.replay_pos + n.max(1)).min(self.replay_all.len());
        self.samples
            .extend_from_slice(&self.replay_all[self.replay_pos..end]);
        self.replay_pos = end;
        if self.replay_pos >= self.replay_all.len() {
            self.replay_playing = false;
        }
    }

    fn replay_tick(&mut self) {
        if self.replay_loaded && self.replay_playing {
            self.replay_advance(self.replay_speed);
        }
    }

    fn status_text(&self) -> (String, egui::Color32) {
        if self.replay_loaded {
            let shutdown = self.samples.last().map(|s| s.shutdown).unwrap_or(true);
            return if shutdown {
                ("SHUTDOWN".to_string(), egui::Color32::RED)
            } else {
                ("RUNNING".to_string(), egui::Color32::GREEN)
            };
        }
        match self.bench.as_ref().map(|b| b.controller()) {
            Some(c) if c.state() == SafetyState::Running => {
                ("RUNNING".to_string(), egui::Color32::GREEN)
            }
            Some(c) => (
                format!(
                    "SHUTDOWN ({})",
                    c.trip_reason()
                        .map(|r| format!("{r:?}"))
                        .unwrap_or_else(|| "none".to_string())
                ),
                egui::Color32::RED,
            ),
            None => ("NO CONTROLLER".to_string(), egui::Color32::GRAY),
        }
    }

    fn lamps(&self) -> Option<(bool, bool, bool)> {
        if self.replay_loaded {
            return self
                .samples
                .last()
                .map(|s| (s.shutdown, s.indicator, s.sync_out));
        }
        self.bench
            .as_ref()
            .map(|b| (b.shutdown_active(), b.led_status(), b.sync_out()))
    }
}

fn read_trace(path: &str) -> anyhow::Result<Vec<Sample>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;

    let mut loaded = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let row: TraceRow = serde_json::from_str(line)
            .with_context(|| format!("JSON parse error at line {}", i + 1))?;
        loaded.push(Sample::from_row(&row));
    }

    if loaded.is_empty() {
        bail!("No samples found in {path}");
    }
    Ok(loaded)
}

fn lamp(ui: &mut egui::Ui, label: &str, on: bool, color: egui::Color32) {
    let c = if on { color } else { egui::Color32::DARK_GRAY };
    ui.colored_label(c, format!("● {label}"));
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.replay_tick();
        if self.replay_playing {
            ctx.request_repaint();
        }

        let mode_txt = if self.replay_loaded { "REPLAY" } else { "LIVE" };
        let (status, status_color) = self.status_text();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("ESD Controller Front Panel");
                ui.separator();
                ui.label(format!("MODE: {mode_txt}"));
                ui.separator();
                ui.colored_label(status_color, status);

                if let Some((shutdown, indicator, sync_out)) = self.lamps() {
                    ui.separator();
                    lamp(ui, "SHUTDOWN", shutdown, egui::Color32::RED);
                    lamp(ui, "STATUS", indicator, egui::Color32::YELLOW);
                    lamp(ui, "SYNC", sync_out, egui::Color32::LIGHT_BLUE);
                }

                if let Some(b) = self.bench.as_ref().filter(|_| !self.replay_loaded) {
                    ui.separator();
                    let w = b.controller().watchdog();
                    ui.label(format!("watchdog {}/{}", w.elapsed(), w.timeout()));
                    ui.separator();
                    ui.label(format!(
                        "t = {:.3}s",
                        b.tick() as f64 / f64::from(self.clock_hz.max(1))
                    ));
                }
            });
        });

        egui::SidePanel::left("left")
            .resizable(false)
            .show(ctx, |ui| {
                let live_enabled = !self.replay_loaded;
                let ack_pending = self
                    .bench
                    .as_ref()
                    .is_some_and(|b| b.ack_tap_pending());

                ui.label("Inputs");
                let mut changed = false;
                changed |= ui
                    .add_enabled(live_enabled, egui::Checkbox::new(&mut self.estop_a, "E-STOP A pressed"))
                    .changed();
                changed |= ui
                    .add_enabled(live_enabled, egui::Checkbox::new(&mut self.estop_b, "E-STOP B pressed"))
                    .changed();
                changed |= ui
                    .add_enabled(live_enabled, egui::Checkbox::new(&mut self.auto_kick, "Auto kick"))
                    .changed();
                changed |= ui
                    .add_enabled(live_enabled, egui::Checkbox::new(&mut self.async_in, "Async input"))
                    .changed();
                changed |= ui
                    .add_enabled(live_enabled, egui::Checkbox::new(&mut self.async_free, "Free-running async"))
                    .changed();
                changed |= ui
                    .add_enabled(
                        live_enabled && self.async_free,
                        egui::Slider::new(&mut self.async_period_ticks, 2..=10_000).text("async half period (ticks)"),
                    )
                    .changed();
                changed |= ui
                    .add_enabled(live_enabled, egui::Checkbox::new(&mut self.enable, "Enable"))
                    .changed();
                if changed {
                    self.apply_panel();
                }

                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(live_enabled && !ack_pending, egui::Button::new("ACK"))
                        .clicked()
                    {
                        self.press_ack();
                    }
                    if ui.add_enabled(live_enabled, egui::Button::new("Kick")).clicked() {
                        self.kick_once();
                    }
                    if ui.add_enabled(live_enabled, egui::Button::new("Reset")).clicked() {
                        self.pulse_reset();
                    }
                });

                ui.separator();
                ui.label("Controller configuration");
                let mut cfg_changed = false;
                cfg_changed |= ui
                    .add_enabled(
                        live_enabled,
                        egui::Slider::new(&mut self.cfg.debounce_ticks, 1..=5_000).text("debounce (ticks)"),
                    )
                    .changed();
                cfg_changed |= ui
                    .add_enabled(
                        live_enabled,
                        egui::Slider::new(&mut self.cfg.watchdog_timeout_ticks, 100..=200_000)
                            .text("watchdog timeout (ticks)"),
                    )
                    .changed();
                cfg_changed |= ui
                    .add_enabled(
                        live_enabled,
                        egui::Slider::new(&mut self.cfg.sync_depth, 2..=6).text("sync depth"),
                    )
                    .changed();
                cfg_changed |= ui
                    .add_enabled(
                        live_enabled,
                        egui::Slider::new(&mut self.cfg.blink_half_period_ticks, 10..=100_000)
                            .text("blink half period (ticks)"),
                    )
                    .changed();

                let mut phase = self.cfg.blink_phase;
                egui::ComboBox::from_id_salt("blink_phase")
                    .selected_text(format!("{phase:?}"))
                    .show_ui(ui, |ui| {
                        for p in [BlinkPhase::RestartOnEntry, BlinkPhase::FreeRunning] {
                            ui.selectable_value(&mut phase, p, format!("{p:?}"));
                        }
                    });
                if phase != self.cfg.blink_phase {
                    self.cfg.blink_phase = phase;
                    cfg_changed = true;
                }
                if cfg_changed {
                    self.reset_live();
                }

                ui.separator();
                ui.label("Simulation settings");
                ui.add(egui::Slider::new(&mut self.ticks_per_frame, 1..=20_000).text("ticks/frame"));
                ui.add(egui::Slider::new(&mut self.sample_every, 1..=5_000).text("sample every (ticks)"));
                ui.add(egui::Slider::new(&mut self.ack_hold_ticks, 1..=10_000).text("ACK hold (ticks)"));
                if ui
                    .add_enabled(
                        live_enabled,
                        egui::Slider::new(&mut self.kick_period_ticks, 2..=100_000).text("kick period (ticks)"),
                    )
                    .changed()
                {
                    self.reset_live();
                }
                ui.add(egui::DragValue::new(&mut self.seed).prefix("seed: "));

                ui.horizontal(|ui| {
                    if ui.button("Restart").clicked() {
                        self.reset();
                    }

                    let run_label = if self.running { "Pause" } else { "Run" };
                    if ui
                        .add_enabled(live_enabled, egui::Button::new(run_label))
                        .clicked()
                    {
                        self.running = !self.running;
                    }

                    if ui
                        .add_enabled(live_enabled, egui::Button::new("Step"))
                        .clicked()
                    {
                        self.step_live(1);
                    }
                });

                ui.separator();
                ui.label("Replay (JSONL)");
                ui.horizontal(|ui| {
                    ui.label("path:");
                    ui.text_edit_singleline(&mut self.replay_path);
                });

                ui.horizontal(|ui| {
                    if ui.button("Load").clicked() {
                        let p = self.replay_path.clone();
                        self.load_jsonl(&p);
                    }

                    if ui
                        .button(if self.replay_playing {
                            "Pause replay"
                        } else {
                            "Play replay"
                        })
                        .clicked()
                        && self.replay_loaded
                    {
                        self.replay_playing = !self.replay_playing;
                        ctx.request_repaint();
                    }

                    if ui.button("Step replay").clicked() && self.replay_loaded {
                        self.replay_advance(1);
                    }
                });

                ui.add(
                    egui::Slider::new(&mut self.replay_speed, 1..=500)
                        .text("replay speed (samples/frame)"),
                );

                if self.replay_loaded {
                    ui.small(format!(
                        "Loaded: {}/{} samples",
                        self.samples.len(),
                        self.replay_all.len()
                    ));
                } else {
                    ui.small("No replay loaded.");
                }

                if let Some(err) = &self.last_error {
                    ui.separator();
                    ui.colored_label(egui::Color32::RED, err);
                }

                ui.separator();
                ui.small("Tip: esd-sim --trace > out/full_sequence.jsonl, then Load.");
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.running && !self.replay_loaded {
                self.step_live(self.ticks_per_frame);
                ctx.request_repaint();
            }

            if self.samples.is_empty() {
                ui.label("No data yet. Run LIVE or Load a REPLAY file.");
                return;
            }

            let shutdown: PlotPoints = self
                .samples
                .iter()
                .map(|s| [s.t, level(s.shutdown, 2.0)])
                .collect();
            let indicator: PlotPoints = self
                .samples
                .iter()
                .map(|s| [s.t, level(s.indicator, 1.0)])
                .collect();
            let sync: PlotPoints = self
                .samples
                .iter()
                .map(|s| [s.t, level(s.sync_out, 0.0)])
                .collect();
            let wdg: PlotPoints = self.samples.iter().map(|s| [s.t, s.wdg]).collect();

            ui.heading("Outputs");
            Plot::new("out_plot").height(260.0).show(ui, |plot_ui| {
                plot_ui.line(Line::new(shutdown).name("Shutdown"));
                plot_ui.line(Line::new(indicator).name("Status lamp"));
                plot_ui.line(Line::new(sync).name("Sync out"));
            });

            Plot::new("wdg_plot").height(160.0).show(ui, |plot_ui| {
                plot_ui.line(Line::new(wdg).name("Watchdog elapsed / timeout"));
            });

            if let Some(last) = self.samples.last() {
                ui.separator();
                ui.label(format!(
                    "t={:.3}s  shutdown={}  lamp={}  sync={}  watchdog={:.0}%",
                    last.t,
                    last.shutdown,
                    last.indicator,
                    last.sync_out,
                    last.wdg * 100.0
                ));
            }
        });
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "ESD Controller Front Panel",
        native_options,
        Box::new(|_cc| Ok(Box::new(App::default()))),
    )
}
