use std::{
    fs::File,
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    DefaultTerminal, Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Paragraph, Widget},
};
use tracing_subscriber::EnvFilter;

use chip8_vm::{
    debugger::{Cli, Command, CommandResult, Executor},
    machine::{
        DEFAULT_CYCLES_PER_FRAME, DISPLAY_HEIGHT, DISPLAY_WIDTH, Machine, Runner, RunnerConfig,
        RunnerStatus, STACK_SIZE, UnknownInstructionPolicy,
    },
    u4,
};

const KEY_MAP: [KeyCode; 16] = [
    KeyCode::Char('x'), // 0x0
    KeyCode::Char('1'), // 0x1
    KeyCode::Char('2'), // 0x2
    KeyCode::Char('3'), // 0x3
    KeyCode::Char('q'), // 0x4
    KeyCode::Char('w'), // 0x5
    KeyCode::Char('e'), // 0x6
    KeyCode::Char('a'), // 0x7
    KeyCode::Char('s'), // 0x8
    KeyCode::Char('d'), // 0x9
    KeyCode::Char('z'), // 0xA
    KeyCode::Char('c'), // 0xB
    KeyCode::Char('4'), // 0xC
    KeyCode::Char('r'), // 0xD
    KeyCode::Char('f'), // 0xE
    KeyCode::Char('v'), // 0xF
];

/// Most terminals only report presses, so a key counts as released once this
/// long has passed without a repeat.
const KEY_RELEASE_TIMEOUT: Duration = Duration::from_millis(50);

const SCREEN_WIDTH: u16 = DISPLAY_WIDTH as u16 + 2;
const SCREEN_HEIGHT: u16 = DISPLAY_HEIGHT as u16 / 2 + 2;
const SIDE_WIDTH: u16 = 27;
const MIN_WIDTH: u16 = SCREEN_WIDTH + SIDE_WIDTH;
const MIN_HEIGHT: u16 = 25;

struct App {
    executor: Executor,
    input: String,
    output: String,
    should_quit: bool,
    last_tick: Instant,
    last_command: Option<Command>,
    /// When each keypad key was last seen pressed
    held_keys: [Option<Instant>; 16],
}

impl App {
    fn new(program: Vec<u8>, config: RunnerConfig) -> anyhow::Result<Self> {
        let mut machine = Machine::new();
        machine
            .load_program(&program)
            .context("Failed to load program into memory")?;

        Ok(Self {
            executor: Executor::new(Runner::new(machine, config), program),
            input: String::new(),
            output: String::new(),
            should_quit: false,
            last_tick: Instant::now(),
            last_command: None,
            held_keys: [None; 16],
        })
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        while !self.should_quit {
            let dt = self.last_tick.elapsed().as_secs_f32();
            self.last_tick = Instant::now();

            match self.executor.poll(dt) {
                Ok(RunnerStatus::HitBreakpoint) => {
                    self.output = format!("Hit breakpoint at {:03X}", self.executor.pc());
                }
                Err(e) => {
                    tracing::warn!("execution stopped: {e}");
                    self.output = e.to_string();
                }
                Ok(RunnerStatus::Ok) => {}
            }

            terminal.draw(|frame| self.draw(frame))?;

            self.release_stale_keys();

            if event::poll(Duration::from_millis(16))?
                && let Event::Key(key) = event::read()?
            {
                self.handle_key_event(key);
            }
        }

        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn release_stale_keys(&mut self) {
        let now = Instant::now();

        for (key, held_since) in self.held_keys.iter_mut().enumerate() {
            if held_since.is_some_and(|since| now - since > KEY_RELEASE_TIMEOUT) {
                *held_since = None;
                self.executor
                    .runner_mut()
                    .set_key(u4::new(key as u8), false);
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(event::KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        // While running, keystrokes go to the keypad and Esc breaks into the prompt
        if self.executor.is_running() {
            if key.code == KeyCode::Esc {
                self.executor.pause();
                self.output = format!("Paused at {:03X}", self.executor.pc());
            } else if let Some(idx) = KEY_MAP.iter().position(|&k| k == key.code) {
                self.executor.runner_mut().set_key(u4::new(idx as u8), true);
                self.held_keys[idx] = Some(Instant::now());
            }
            return;
        }

        if key.kind != KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => self.handle_enter(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    fn handle_enter(&mut self) {
        // An empty line repeats the previous command
        if self.input.trim().is_empty() {
            if let Some(command) = self.last_command.clone() {
                self.execute_command(command);
            }
        } else {
            match Cli::try_parse_from(self.input.split_whitespace()) {
                Ok(cli) => {
                    self.last_command = Some(cli.command.clone());
                    self.execute_command(cli.command);
                }
                Err(e) => {
                    self.output = e.to_string();
                    self.last_command = None;
                }
            }
        }

        self.input.clear();
    }

    fn execute_command(&mut self, command: Command) {
        tracing::debug!(?command, "debugger command");

        self.output = match self.executor.execute(command) {
            Ok(CommandResult::Ok) => "OK".to_string(),
            Ok(CommandResult::Quit) => {
                self.should_quit = true;
                String::new()
            }
            Ok(CommandResult::BreakpointList { breakpoints }) => {
                let list: Vec<String> = breakpoints.iter().map(|bp| bp.to_string()).collect();
                format!("Breakpoints: [{}]", list.join(", "))
            }
            Ok(CommandResult::MemDump { data, offset }) => {
                let mut output = String::new();

                for (i, byte) in data.iter().enumerate() {
                    if i % 16 == 0 {
                        let addr = offset.wrapping_add(i as u16) & 0x0FFF;
                        output.push_str(&format!("\n{:03X}: ", addr));
                    }
                    output.push_str(&format!("{:02X} ", byte));
                }

                output
            }
            Ok(CommandResult::Disasm { instructions }) => instructions
                .iter()
                .map(|(addr, word, ins)| match ins {
                    Some(ins) => format!("{:03X}: {:04X}  {}", addr & 0x0FFF, word, ins),
                    None => format!("{:03X}: {:04X}  ???", addr & 0x0FFF, word),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => e.to_string(),
        };
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            Paragraph::new(format!("Need at least {MIN_WIDTH}x{MIN_HEIGHT} cells"))
                .style(Style::default().fg(Color::Red))
                .render(area, buf);
            return;
        }

        let [left, right] =
            Layout::horizontal([Constraint::Min(SCREEN_WIDTH), Constraint::Length(SIDE_WIDTH)])
                .areas(area);
        let [screen, output, input] = Layout::vertical([
            Constraint::Length(SCREEN_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .areas(left);
        let [status, registers, code, stack] = Layout::vertical([
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Min(5),
            Constraint::Length(6),
        ])
        .areas(right);

        self.render_screen(screen, buf);
        self.render_status(status, buf);
        self.render_registers(registers, buf);
        self.render_code(code, buf);
        self.render_stack(stack, buf);

        Paragraph::new(self.output.as_str())
            .block(Block::bordered().title(" Output "))
            .render(output, buf);
        Paragraph::new(format!("> {}", self.input))
            .block(Block::bordered().title(" Command "))
            .render(input, buf);
    }
}

impl App {
    /// Two framebuffer rows per terminal line using half blocks.
    fn render_screen(&self, area: Rect, buf: &mut Buffer) {
        let framebuffer = self.executor.framebuffer();
        let lines: Vec<Line> = framebuffer
            .chunks_exact(DISPLAY_WIDTH * 2)
            .map(|pair| {
                let (top, bottom) = pair.split_at(DISPLAY_WIDTH);
                let row: String = top
                    .iter()
                    .zip(bottom)
                    .map(|(&t, &b)| match (t != 0, b != 0) {
                        (true, true) => '█',
                        (true, false) => '▀',
                        (false, true) => '▄',
                        (false, false) => ' ',
                    })
                    .collect();
                Line::from(row)
            })
            .collect();

        Paragraph::new(lines)
            .style(Style::default().fg(Color::Green))
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" Display "))
            .render(area, buf);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let config = self.executor.config();
        let (state, color) = if self.executor.is_running() {
            ("running", Color::Green)
        } else {
            ("paused", Color::Yellow)
        };
        let policy = config
            .on_unknown
            .to_possible_value()
            .map(|value| value.get_name().to_string())
            .unwrap_or_default();
        let held: Vec<String> = self
            .executor
            .keypad()
            .iter()
            .enumerate()
            .filter(|&(_, &pressed)| pressed)
            .map(|(key, _)| format!("{key:X}"))
            .collect();

        let lines = vec![
            Line::styled(state, Style::default().fg(color)),
            Line::from(format!("{} cycles/frame", config.cycles_per_frame)),
            Line::from(format!("unknown op: {policy}")),
            Line::from(format!("keys: {}", held.join(" "))),
        ];

        Paragraph::new(lines)
            .block(Block::bordered().title(" Status "))
            .render(area, buf);
    }

    fn render_registers(&self, area: Rect, buf: &mut Buffer) {
        let mut lines = vec![
            Line::from(format!(
                "PC {:03X}   I {:04X}",
                self.executor.pc(),
                self.executor.index()
            )),
            Line::from(format!(
                "DT {:02X}    ST {:02X}",
                self.executor.delay_timer(),
                self.executor.sound_timer()
            )),
        ];

        for (row, regs) in self.executor.registers().chunks_exact(4).enumerate() {
            let cells: Vec<String> = regs
                .iter()
                .enumerate()
                .map(|(col, value)| format!("V{:X} {value:02X}", row * 4 + col))
                .collect();
            lines.push(Line::from(cells.join(" ")));
        }

        Paragraph::new(lines)
            .block(Block::bordered().title(" Registers "))
            .render(area, buf);
    }

    /// Disassembly around PC. `>` marks PC and `*` marks a breakpoint.
    fn render_code(&self, area: Rect, buf: &mut Buffer) {
        let rows = area.height.saturating_sub(2);
        let pc = self.executor.pc();
        let start = pc.wrapping_sub((rows / 3) * 2);

        let lines: Vec<Line> = self
            .executor
            .listing(start, rows)
            .into_iter()
            .map(|(addr, word, instruction)| {
                let at_pc = addr & 0x0FFF == pc & 0x0FFF;
                let text = format!(
                    "{}{}{:03X} {}",
                    if at_pc { '>' } else { ' ' },
                    if self.executor.is_breakpoint(addr) { '*' } else { ' ' },
                    addr & 0x0FFF,
                    match instruction {
                        Some(instruction) => instruction.to_string(),
                        None => format!("{word:04X}"),
                    }
                );

                if at_pc {
                    Line::styled(text, Style::default().fg(Color::Black).bg(Color::White))
                } else {
                    Line::from(text)
                }
            })
            .collect();

        Paragraph::new(lines)
            .block(Block::bordered().title(" Code "))
            .render(area, buf);
    }

    /// Newest return address first.
    fn render_stack(&self, area: Rect, buf: &mut Buffer) {
        let stack = self.executor.call_stack();
        let rows = area.height.saturating_sub(2) as usize;

        let lines: Vec<Line> = stack
            .iter()
            .rev()
            .take(rows)
            .map(|addr| Line::from(format!("{addr:03X}")))
            .collect();

        Paragraph::new(lines)
            .block(Block::bordered().title(format!(" Stack {}/{STACK_SIZE} ", stack.len())))
            .render(area, buf);
    }
}

/// TUI debugger for the CHIP-8 virtual machine
#[derive(Parser)]
struct Args {
    /// Path to the raw program image
    program_path: PathBuf,

    /// Instructions executed per 60Hz frame while running
    #[arg(short, long, default_value_t = DEFAULT_CYCLES_PER_FRAME)]
    cycles_per_frame: u32,

    /// What to do when an unrecognized instruction is fetched while running
    #[arg(long, value_enum, default_value_t = UnknownInstructionPolicy::Halt)]
    on_unknown: UnknownInstructionPolicy,

    /// Write logs to this file; the terminal is owned by the UI
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }

    let program = std::fs::read(&args.program_path).context("Failed to read program file")?;
    let config = RunnerConfig {
        cycles_per_frame: args.cycles_per_frame,
        on_unknown: args.on_unknown,
    };
    let mut app = App::new(program, config).context("Failed to initialize application")?;

    let mut terminal = ratatui::init();
    let app_result = app.run(&mut terminal);
    ratatui::restore();

    app_result
}
