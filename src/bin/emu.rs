use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use pixels::{Pixels, SurfaceTexture};
use tracing_subscriber::EnvFilter;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey},
    window::{Window, WindowId},
};

use chip8_vm::{
    machine::{
        DEFAULT_CYCLES_PER_FRAME, DISPLAY_HEIGHT, DISPLAY_WIDTH, Machine, RandomSource, Runner,
        RunnerConfig, SeededRandom, ThreadRandom, UnknownInstructionPolicy,
    },
    u4,
};

const WINDOW_TITLE: &str = "chip8-vm";

/// The rate at which pixels fade out (phosphor decay).
const DISPLAY_PHOSPHOR_RATE: f32 = 10.0;

/// Mapping from physical keyboard keys to the hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x00
    KeyCode::Digit1, // 0x01
    KeyCode::Digit2, // 0x02
    KeyCode::Digit3, // 0x03
    KeyCode::KeyQ,   // 0x04
    KeyCode::KeyW,   // 0x05
    KeyCode::KeyE,   // 0x06
    KeyCode::KeyA,   // 0x07
    KeyCode::KeyS,   // 0x08
    KeyCode::KeyD,   // 0x09
    KeyCode::KeyZ,   // 0x0A
    KeyCode::KeyC,   // 0x0B
    KeyCode::Digit4, // 0x0C
    KeyCode::KeyR,   // 0x0D
    KeyCode::KeyF,   // 0x0E
    KeyCode::KeyV,   // 0x0F
];

struct App {
    pixels: Option<Pixels<'static>>,
    window: Option<Arc<Window>>,
    scale: u32,
    /// Brightness of each pixel (0.0 to 1.0), row-major like the framebuffer.
    brightness: Vec<f32>,
    /// Whether the title currently shows the sound indicator.
    sound_shown: bool,

    runner: Runner,
    /// Used for delta time calculation.
    last_frame_instant: Instant,

    /// Stores the result of the application to be returned from main.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(args: &Args) -> anyhow::Result<Self> {
        let random: Box<dyn RandomSource> = match args.seed {
            Some(seed) => Box::new(SeededRandom::new(seed)),
            None => Box::new(ThreadRandom),
        };

        let mut machine = Machine::with_random(random);
        machine
            .load_program_file(&args.program_path)
            .with_context(|| format!("Failed to load {}", args.program_path.display()))?;

        let config = RunnerConfig {
            cycles_per_frame: args.cycles_per_frame,
            on_unknown: args.on_unknown,
        };
        tracing::info!(?config, "starting");

        Ok(Self {
            pixels: None,
            window: None,
            scale: args.scale,
            brightness: vec![0.0; DISPLAY_WIDTH * DISPLAY_HEIGHT],
            sound_shown: false,

            runner: Runner::new(machine, config),
            last_frame_instant: Instant::now(),
            exit_result: Ok(()),
        })
    }

    fn process_display(&mut self, dt: f32) -> anyhow::Result<()> {
        let pixels = self.pixels.as_mut().context("Pixels surface missing")?;
        let framebuffer = self.runner.machine_ref().framebuffer();

        for ((pxl, level), &on) in pixels
            .frame_mut()
            .chunks_exact_mut(4)
            .zip(self.brightness.iter_mut())
            .zip(framebuffer.iter())
        {
            // Lit pixels jump to full brightness, unlit ones fade out over time
            *level = if on != 0 {
                1.0
            } else {
                (*level - DISPLAY_PHOSPHOR_RATE * dt).max(0.0)
            };

            let rgba = [0, 0xff, 0, (*level * 255.0) as u8];
            pxl.copy_from_slice(&rgba);
        }

        Ok(())
    }

    fn update_sound_indicator(&mut self) {
        let active = self.runner.sound_active();
        if active == self.sound_shown {
            return;
        }

        self.sound_shown = active;
        if let Some(window) = &self.window {
            if active {
                window.set_title(&format!("{WINDOW_TITLE} [sound]"));
            } else {
                window.set_title(WINDOW_TITLE);
            }
        }
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = {
            let size = LogicalSize::new(
                DISPLAY_WIDTH as u32 * self.scale,
                DISPLAY_HEIGHT as u32 * self.scale,
            );
            let min_size = LogicalSize::new(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32);

            Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title(WINDOW_TITLE)
                            .with_inner_size(size)
                            .with_min_inner_size(min_size),
                    )
                    .context("Failed to create window")?,
            )
        };

        self.window = Some(window.clone());
        self.pixels = {
            let window_size = window.inner_size();
            let surface_texture =
                SurfaceTexture::new(window_size.width, window_size.height, window.clone());

            let pixels = Pixels::new(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32, surface_texture)
                .context("Failed to create pixels surface")?;

            window.request_redraw();
            Some(pixels)
        };

        // Avoid large dt on first frame
        self.last_frame_instant = Instant::now();
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(pixels) = self.pixels.as_mut() {
                    pixels
                        .resize_surface(size.width, size.height)
                        .context("Failed to resize pixels surface")?;
                }
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame_instant).as_secs_f32();
                self.last_frame_instant = now;

                self.runner.update(dt).context("Execution error")?;

                self.update_sound_indicator();
                self.process_display(dt)?;

                if let Some(pixels) = self.pixels.as_ref() {
                    pixels.render().context("Pixels render error")?;
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(key) = KEY_MAP.iter().position(|&k| k == event.physical_key) {
                    let pressed = event.state == ElementState::Pressed;
                    self.runner.set_key(u4::new(key as u8), pressed);
                }
            }

            _ => (),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }
}

/// CHIP-8 virtual machine.
///
/// Keys 1-4, Q-R, A-F, Z-V map to the hex keypad.
/// Escape is used to exit.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the raw program image
    program_path: PathBuf,

    /// Instructions executed per 60Hz frame
    #[arg(short, long, default_value_t = DEFAULT_CYCLES_PER_FRAME)]
    cycles_per_frame: u32,

    /// What to do when an unrecognized instruction is fetched
    #[arg(long, value_enum, default_value_t = UnknownInstructionPolicy::Halt)]
    on_unknown: UnknownInstructionPolicy,

    /// Seed for the random number instruction, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Initial window scale factor
    #[arg(long, default_value_t = 10)]
    scale: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&args).context("Failed to initialize application")?;
    event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution")?;

    // Return the result captured during the event loop
    app.exit_result
}
