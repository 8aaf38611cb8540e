pub mod breakpoints;
pub mod command;
pub mod log;
pub mod step_state;

use crate::{
    clock::RunStatus,
    console::Console,
    cpu::{
        assembler::{Assembler, Statement},
        flags::AccessFlags,
        instructions::{self, INSTRUCTIONS},
        Machine, Memory, Outcome,
    },
    error::Error,
    program::{self, ProgramImage},
    util,
    view::{DisplayMode, Snapshot},
};
use breakpoints::Breakpoints;
use command::Command;
use log::Log;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use step_state::{ControllerState, StepState};

/// Cancellation token for a run, observed once per instruction.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct Config {
    pub log_path: PathBuf,
    pub clock_hz: f64,
    pub display: DisplayMode,
}

impl Config {
    pub const DEFAULT_LOG_FILE: &'static str = "computer.log";
    pub const DEFAULT_CLOCK_HZ: f64 = 100.0;

    /// Session logs always end up in a `.log` file.
    pub fn log_file(name: &str) -> PathBuf {
        if name.ends_with(".log") {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("{}.log", name))
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(Self::DEFAULT_LOG_FILE),
            clock_hz: Self::DEFAULT_CLOCK_HZ,
            display: DisplayMode::default(),
        }
    }
}

/// Everything a debugging session works on, owned by the [`Debugger`].
#[derive(Debug)]
pub struct Session {
    pub machine: Machine,
    pub access: AccessFlags,
    pub breakpoints: Breakpoints,
    /// Written back into memory on every reset
    pub image: Option<ProgramImage>,
    pub log: Log,
    pub step: StepState,
    pub display: DisplayMode,
    pub clock_hz: f64,
    /// Address being edited in program or assembly mode
    pub cursor: Option<u8>,
    /// Time spent running
    pub run_time: Duration,
    initialized: bool,
}

impl Session {
    const LOG_TAIL: usize = 10;

    pub fn new(clock_hz: f64, display: DisplayMode) -> Self {
        Self {
            machine: Machine::new(),
            access: AccessFlags::default(),
            breakpoints: Breakpoints::default(),
            image: None,
            log: Log::new(),
            step: StepState::default(),
            display,
            clock_hz,
            cursor: None,
            run_time: Duration::ZERO,
            initialized: false,
        }
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            machine: &self.machine,
            access: &self.access,
            breakpoints: &self.breakpoints,
            step: &self.step,
            log: self.log.tail(Self::LOG_TAIL),
            clock_hz: self.clock_hz,
            run_time: self.run_time,
            display: self.display,
            cursor: self.cursor,
        }
    }

    /// Delay between two instructions, or two bytes written during a reset.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.clock_hz).unwrap_or_default()
    }

    fn write_memory(&mut self, address: u8, value: u8) {
        self.machine.memory[address] = value;
        self.access.memory_write = Some(address);
    }
}

/// Why a run came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Halted,
    InvalidInstruction,
    Breakpoint { slot: usize, address: u8 },
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

enum ByteInput {
    Value(u8),
    Invalid,
    Quit,
}

#[derive(Clone, Copy)]
enum ByteKind {
    Address,
    Value,
}

impl ByteKind {
    fn error(self, text: &str) -> Error {
        match self {
            Self::Address => Error::InvalidAddress(text.to_string()),
            Self::Value => Error::InvalidValue(text.to_string()),
        }
    }
}

enum Target {
    Register(&'static str),
    Memory,
}

fn parse_target(name: &str) -> Option<Target> {
    match name.trim().to_uppercase().as_str() {
        "PC" => Some(Target::Register("PC")),
        "PTR" => Some(Target::Register("PTR")),
        "R1" | "REG1" => Some(Target::Register("R1")),
        "R2" | "REG2" => Some(Target::Register("R2")),
        "M" => Some(Target::Memory),
        _ => None,
    }
}

pub fn parse_clock_speed(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|hz| hz.is_finite() && *hz > 0.0)
        .filter(|hz| Duration::try_from_secs_f64(1.0 / hz).is_ok())
}

/// The KRIS manual.
pub fn manual() -> String {
    let mut text = String::from(
        "KRIS 8-bit computer\n\
         \n\
         Registers: PC, PTR, R1, R2. 8 bits each, arithmetic wraps at 0x100.\n\
         Memory:    256 bytes, programs are loaded at 0x00.\n\
         Display:   0xf0-0xff is mapped to a 16 character screen.\n\
         \n\
         Instructions:\n",
    );
    for instr in INSTRUCTIONS.iter() {
        let argument = if instr.has_argument() { " <xx>" } else { "" };
        text.push_str(&format!(
            "  0x{:02x}  {}{}\n",
            instr.opcode, instr.name, argument
        ));
    }
    text.push_str(
        "\nAssembly mode:\n  \
         address_xxh:   move the cursor to 0xXX\n  \
         # comment      ignored\n  \
         0xXX 0xYY      raw data bytes\n  \
         q              leave assembly mode\n\
         \nCommands:\n",
    );
    text.push_str(&Command::help());
    text
}

pub struct Debugger<C: Console> {
    span: tracing::Span,
    session: Session,
    console: C,
    interrupt: Interrupt,
    status: Arc<RunStatus>,
    log_path: PathBuf,
}

impl<C: Console> Debugger<C> {
    pub fn new(console: C, config: Config, interrupt: Interrupt, status: Arc<RunStatus>) -> Self {
        Self {
            span: tracing::span!(tracing::Level::INFO, "debugger"),
            session: Session::new(config.clock_hz, config.display),
            console,
            interrupt,
            status,
            log_path: config.log_path,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    #[cfg(test)]
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    #[cfg(test)]
    pub fn console(&self) -> &C {
        &self.console
    }

    fn refresh(&mut self) {
        self.console.refresh(&self.session.snapshot());
    }

    fn read(&mut self, prompt: &str) -> Option<String> {
        self.refresh();
        self.console.read_line(prompt)
    }

    /// Ask a yes/no question until it gets an answer. `on_eof` is the answer
    /// once input runs out.
    fn confirm(&mut self, question: &str, on_eof: bool) -> bool {
        let prompt = format!("{} (Y/N) ?", question);
        loop {
            match self.read(&prompt) {
                None => return on_eof,
                Some(answer) => match answer.trim().to_lowercase().as_str() {
                    "y" => return true,
                    "n" => return false,
                    _ => continue,
                },
            }
        }
    }

    fn read_byte(&mut self, context: &str, prompt: &str, kind: ByteKind) -> ByteInput {
        let Some(text) = self.read(&format!("{}: {}", context, prompt)) else {
            return ByteInput::Quit;
        };
        if text.trim() == util::QUIT_TOKEN {
            return ByteInput::Quit;
        }

        match util::parse_hex_byte(&text) {
            Some(value) => ByteInput::Value(value),
            None => {
                self.session.log.error(context, kind.error(text.trim()).to_string());
                ByteInput::Invalid
            }
        }
    }

    /// Prompt for commands until the user quits or input runs out.
    pub fn run_loop(&mut self) {
        loop {
            let flow = match self.read(">") {
                Some(line) => self.handle_line(&line),
                // Nobody left to confirm anything
                None => self.quit(),
            };
            if flow == Flow::Quit {
                break;
            }
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Flow {
        match Command::parse(line) {
            Some(command) => self.execute(command),
            None => {
                self.session
                    .log
                    .error("CMD", format!("INVALID Command '{}'", line.trim()));
                Flow::Continue
            }
        }
    }

    #[tracing::instrument(skip(self), parent = &self.span)]
    pub fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Help => {
                self.session.log.info("HELP", "Displaying KRIS manual");
                self.console.show(&manual());
            }
            Command::Step => {
                self.session.log.info("STEP", "Executing 1 instruction");
                self.step();
            }
            Command::Run => {
                self.session
                    .log
                    .info("STATUS", "Running; press CTRL+C to interrupt");
                self.run();
            }
            Command::Assemble => self.assembly_mode(),
            Command::AddBreakpoint => self.add_breakpoint(),
            Command::DeleteBreakpoint => self.delete_breakpoint(),
            Command::Display => self.toggle_display(),
            Command::Clock => self.change_clock(),
            Command::Clear => {
                self.session.log.info("CLEAR", "Refreshing Screen");
                self.console.clear();
            }
            Command::Log => self.show_log(),
            Command::Load => self.load(),
            Command::Save => self.save(),
            Command::Edit => self.edit(),
            Command::Program => self.program_mode(),
            Command::Reset => {
                if self.confirm("Are you SURE you want to Reset", false) {
                    self.reset();
                }
            }
            Command::Quit => {
                if self.confirm("Are you SURE you want to Quit", true) {
                    return self.quit();
                }
            }
            Command::ForceQuit => return self.quit(),
        }

        self.session.step.finish();
        Flow::Continue
    }

    /// Execute the instruction at PC and log what it did.
    fn execute_instruction(&mut self) -> Outcome {
        let step = self.session.machine.step();
        self.session.machine = step.machine;
        self.session.access = step.access;

        let log = &mut self.session.log;
        match step.outcome {
            Outcome::Executed => log.info(&step.context, step.message),
            Outcome::Halted | Outcome::AlreadyHalted => log.warning(&step.context, step.message),
            Outcome::InvalidInstruction => {
                log.error(&step.context, step.message);
                self.session.step.pause();
            }
        }
        step.outcome
    }

    #[tracing::instrument(skip(self), parent = &self.span)]
    pub fn step(&mut self) -> Outcome {
        self.session.step.step();
        let outcome = self.execute_instruction();
        self.session.step.finish();
        outcome
    }

    /// Execute instructions until the machine halts, a breakpoint is reached or
    /// the run gets interrupted. The instruction at PC always executes, so a run
    /// can continue from a breakpoint.
    #[tracing::instrument(skip(self), parent = &self.span)]
    pub fn run(&mut self) -> StopCause {
        self.interrupt.clear();
        self.session.step.run();
        self.status.set_running(true);
        let started = Instant::now();

        let cause = loop {
            match self.execute_instruction() {
                Outcome::Executed => {}
                Outcome::Halted | Outcome::AlreadyHalted => break StopCause::Halted,
                Outcome::InvalidInstruction => break StopCause::InvalidInstruction,
            }

            self.refresh();
            std::thread::sleep(self.session.period());

            if self.interrupt.is_triggered() {
                self.session.log.warning("INT", "User Interruption");
                break StopCause::Interrupted;
            }

            let pc = self.session.machine.registers.pc;
            if let Some(slot) = self.session.breakpoints.slot_of(pc) {
                self.session.log.warning(
                    "INT",
                    format!("Hit Breakpoint {} at address 0x{:02x}", slot, pc),
                );
                break StopCause::Breakpoint { slot, address: pc };
            }
        };

        self.session.step.pause();
        self.session.step.finish();
        self.session.run_time += started.elapsed();
        self.status.set_running(false);
        self.status.set_run_time(self.session.run_time);
        tracing::debug!("run stopped: {:?}", cause);
        cause
    }

    /// Zero the machine, then write the program image back into memory one byte at a time.
    #[tracing::instrument(skip(self), parent = &self.span)]
    pub fn reset(&mut self) {
        if self.session.initialized {
            self.session.log.info("STATUS", "Reinitializing computer");
        } else {
            self.session.log.info("STATUS", "Initializing computer");
            self.session.initialized = true;
        }

        self.session.machine = Machine::new();
        self.session.access.clear();
        self.refresh();

        if let Some(image) = self.session.image.clone() {
            self.session
                .log
                .info("LOAD", format!("Loading program '{}'", image.name));
            if image.is_oversized() {
                self.session.log.warning(
                    "LOAD",
                    format!(
                        "Program is {} bytes long, only the first {} are loaded",
                        image.bytes.len(),
                        Memory::SIZE
                    ),
                );
            }

            for (address, byte) in image.loadable().iter().enumerate() {
                self.session.write_memory(address as u8, *byte);
                self.refresh();
                std::thread::sleep(self.session.period());
            }
            self.session.access.clear();
        }

        self.session.step = StepState::default();
        self.session.log.info("STATUS", "Ready");
    }

    #[tracing::instrument(skip(self), parent = &self.span)]
    fn add_breakpoint(&mut self) {
        let context = "BP_ADD";
        let ByteInput::Value(address) =
            self.read_byte(context, "Enter BreakPoint Address:", ByteKind::Address)
        else {
            return;
        };

        let log = &mut self.session.log;
        match self.session.breakpoints.add(address) {
            Ok(slot) => log.info(
                context,
                format!("Added Breakpoint {} at address 0x{:02x}", slot, address),
            ),
            Err(err @ Error::BreakpointDuplicate(_)) => log.warning(context, err.to_string()),
            Err(err) => log.error(context, err.to_string()),
        }
    }

    #[tracing::instrument(skip(self), parent = &self.span)]
    fn delete_breakpoint(&mut self) {
        let context = "BP_DEL";
        let Some(text) = self.read("Enter BreakPoint Number:") else {
            return;
        };
        let text = text.trim();

        if text == "*" {
            self.session.breakpoints.clear();
            self.session.log.info(context, "Deleted all breakpoints");
            return;
        }

        let result = text
            .parse::<usize>()
            .map_err(|_| Error::InvalidBreakpointSlot(text.to_string()))
            .and_then(|number| {
                self.session
                    .breakpoints
                    .remove(number)
                    .map(|address| (number, address))
            });

        let log = &mut self.session.log;
        match result {
            Ok((number, address)) => log.info(
                context,
                format!("Deleted Breakpoint {} at address 0x{:02x}", number, address),
            ),
            Err(err @ Error::BreakpointNotSet(_)) => log.warning(context, err.to_string()),
            Err(err) => log.error(context, err.to_string()),
        }
    }

    fn toggle_display(&mut self) {
        self.session.display = self.session.display.next();
        let message = match self.session.display {
            DisplayMode::Disabled => "Display deactivated - ASCII/Hex views",
            DisplayMode::Hex => "Display activated - Hex view",
            DisplayMode::Ascii => "Display activated - ASCII view",
        };
        self.session.log.info("STATUS", message);
    }

    fn change_clock(&mut self) {
        let Some(text) = self.read("Enter the new clock speed:") else {
            return;
        };

        match parse_clock_speed(&text) {
            Some(hz) => {
                self.session.clock_hz = hz;
                self.session
                    .log
                    .info("CLK", format!("Clock speed adjusted to {:.2} Hz", hz));
            }
            None => self
                .session
                .log
                .error("CLK", Error::InvalidClockSpeed(text.trim().to_string()).to_string()),
        }
    }

    fn show_log(&mut self) {
        let text = self
            .read("Number of previous log lines to display:")
            .unwrap_or_default();

        let entries = match text.trim().parse::<usize>() {
            Ok(count) => {
                self.session
                    .log
                    .info("LOG", format!("Displaying last {} status lines", count));
                self.session.log.tail(count)
            }
            Err(_) => {
                self.session
                    .log
                    .info("LOG", "Displaying complete status lines log");
                self.session.log.entries()
            }
        };

        let rendered = self.session.log.render(entries);
        self.console.show(&rendered);
    }

    #[tracing::instrument(skip(self), parent = &self.span)]
    fn load(&mut self) {
        let binary = loop {
            match self.read("Load (B)inary or (S)ource code ?") {
                None => return,
                Some(answer) => match answer.trim().to_lowercase().as_str() {
                    "b" => break true,
                    "s" => break false,
                    "q" => return,
                    _ => continue,
                },
            }
        };

        let Some(name) = self.read("Enter filename:") else {
            return;
        };
        let path = PathBuf::from(name.trim());

        if binary {
            if self.load_binary(&path) {
                self.reset();
            }
        } else if path.is_file() {
            self.session.image = None;
            self.reset();
            self.load_source(&path);
        } else {
            self.session
                .log
                .error("LOAD", Error::FileNotFound(path).to_string());
        }
    }

    /// Make a binary file the program image. Memory only changes on the next reset.
    pub fn load_binary(&mut self, path: &Path) -> bool {
        match ProgramImage::load(path) {
            Ok(image) => {
                self.session.image = Some(image);
                true
            }
            Err(err) => {
                self.session.log.error("LOAD", err.to_string());
                false
            }
        }
    }

    /// Assemble a source file from address 0. Everything up to the final cursor
    /// becomes the program image.
    #[tracing::instrument(skip(self), parent = &self.span)]
    pub fn load_source(&mut self, path: &Path) -> bool {
        let source = match program::read_source(path) {
            Ok(source) => source,
            Err(err) => {
                self.session.log.error("ASM", err.to_string());
                return false;
            }
        };

        let name = path.display().to_string();
        self.session
            .log
            .info("ASM", format!("Loading program source code '{}'", name));

        let mut assembler = Assembler::new(0);
        for line in source.lines() {
            self.session.cursor = u8::try_from(assembler.cursor()).ok();
            self.assemble_line(&mut assembler, line);
            self.refresh();
            std::thread::sleep(self.session.period());
        }
        self.session.cursor = None;

        let end = usize::from(assembler.cursor()).min(Memory::SIZE);
        let bytes = self.session.machine.memory.as_slice()[..end].to_vec();
        let image_name = name.strip_suffix(".kris").unwrap_or(&name).to_string();
        self.session.image = Some(ProgramImage::new(image_name, bytes));
        self.session
            .log
            .info("ASM", format!("Source code '{}' loaded", name));
        true
    }

    #[tracing::instrument(skip(self), parent = &self.span)]
    fn save(&mut self) {
        let context = "SAVE";
        let ByteInput::Value(end) =
            self.read_byte(context, "Save mode - End offset ?", ByteKind::Address)
        else {
            return;
        };
        let Some(name) = self.read("Save mode - Filename ?") else {
            return;
        };
        let path = PathBuf::from(name.trim());

        match program::save(&self.session.machine.memory, end, &path) {
            Ok(()) => self.session.log.info(
                context,
                format!(
                    "Program saved to file as '{}' (Memory 0x00-0x{:02x})",
                    path.display(),
                    end
                ),
            ),
            Err(err) => self.session.log.error(context, err.to_string()),
        }
        self.session.log.info(context, "Leaving save mode");
    }

    fn edit(&mut self) {
        let context = "EDIT";
        let Some(name) = self.read("Which register do you want to update ?") else {
            return;
        };

        match parse_target(&name) {
            Some(Target::Register(register)) => {
                let prompt = format!("New value for register {}:", register);
                let ByteInput::Value(value) = self.read_byte(context, &prompt, ByteKind::Value)
                else {
                    return;
                };

                let regs = &mut self.session.machine.registers;
                match register {
                    "PC" => regs.pc = value,
                    "PTR" => regs.ptr = value,
                    "R1" => regs.reg1 = value,
                    _ => regs.reg2 = value,
                }
                self.session
                    .log
                    .info(context, format!("{} = 0x{:02x}", register, value));
            }
            Some(Target::Memory) => {
                let ByteInput::Value(address) = self.read_byte(
                    context,
                    "Which memory address do you want to update ?",
                    ByteKind::Address,
                ) else {
                    return;
                };
                let prompt = format!("New value for memory address 0x{:02x}:", address);
                let ByteInput::Value(value) = self.read_byte(context, &prompt, ByteKind::Value)
                else {
                    return;
                };

                self.session.write_memory(address, value);
                self.session
                    .log
                    .info(context, format!("*0x{:02x} = 0x{:02x}", address, value));
            }
            None => self.session.log.error(
                context,
                Error::InvalidRegister(name.trim().to_string()).to_string(),
            ),
        }
    }

    /// Write memory byte by byte from a chosen start address.
    #[tracing::instrument(skip(self), parent = &self.span)]
    fn program_mode(&mut self) {
        let context = "PROG";
        self.session.step.enter(ControllerState::ProgramEditing);
        self.session.log.info(context, "Entering programming mode");

        let start = self.read_byte(context, "Program mode - Start offset ?", ByteKind::Address);
        if let ByteInput::Value(start) = start {
            let mut address = u16::from(start);
            loop {
                let Ok(current) = u8::try_from(address) else {
                    self.session
                        .log
                        .warning(context, "Reached end of memory space");
                    break;
                };
                self.session.cursor = Some(current);

                let prompt = format!("Program mode - 0x{:02x}:", current);
                match self.read_byte(context, &prompt, ByteKind::Value) {
                    ByteInput::Value(value) => {
                        self.session.write_memory(current, value);
                        self.session
                            .log
                            .info(context, format!("*0x{:02x} = 0x{:02x}", current, value));
                        address += 1;
                    }
                    ByteInput::Invalid => continue,
                    ByteInput::Quit => break,
                }
            }
            self.session.log.info(context, "Leaving programming mode");
        }

        self.session.cursor = None;
        self.session.step.finish();
    }

    /// Assemble lines typed by the user, starting at PC.
    #[tracing::instrument(skip(self), parent = &self.span)]
    fn assembly_mode(&mut self) {
        let context = "ASM";
        self.session.step.enter(ControllerState::AssemblyEditing);
        self.session.log.info(context, "Entering Assembly mode");

        let mut assembler = Assembler::new(self.session.machine.registers.pc);
        loop {
            if assembler.is_exhausted() {
                self.session
                    .log
                    .warning(context, "Reached end of memory space");
                break;
            }
            self.session.cursor = u8::try_from(assembler.cursor()).ok();

            let Some(line) = self.read("ASM: Enter Assembly Instruction:") else {
                break;
            };
            match self.assemble_line(&mut assembler, &line) {
                Some(Statement::Quit) => break,
                Some(Statement::Help) => self.console.show(&manual()),
                _ => {}
            }
        }

        self.session.log.info(context, "Leaving Assembly Mode");
        self.session.cursor = None;
        self.session.step.finish();
    }

    /// Assemble one line into memory and log the result.
    fn assemble_line(&mut self, assembler: &mut Assembler, line: &str) -> Option<Statement> {
        let context = "ASM";
        let assembled = match assembler.assemble(line, &mut self.session.machine.memory) {
            Ok(assembled) => assembled,
            Err(err) => {
                self.session.log.error(context, err.to_string());
                return None;
            }
        };

        let address = assembled.address;
        let log = &mut self.session.log;
        match &assembled.statement {
            Statement::Instruction { instr, argument } => {
                let text = format!("'{}'", instr.format(argument.unwrap_or_default()));
                let bytes: String = assembled
                    .statement
                    .bytes()
                    .iter()
                    .map(|byte| format!("{:02x}", byte))
                    .collect();
                log.info(
                    context,
                    format!("*0x{:02x}: {:<15}=> '0x{}'", address, text, bytes),
                );
            }
            Statement::Data(data) => {
                for (offset, byte) in data.iter().enumerate() {
                    log.info(
                        context,
                        format!(
                            "*0x{:02x}: {:<15}=> '0x{:02x}'",
                            address as usize + offset,
                            format!("'{}'", instructions::data_name(*byte)),
                            byte
                        ),
                    );
                }
            }
            Statement::Origin(origin) => log.info(context, format!("Address 0x{:02x}", origin)),
            Statement::Comment(comment) => log.info("ASM-C", comment.as_str()),
            Statement::Empty | Statement::Help | Statement::Quit => {}
        }

        let written = assembled.statement.bytes().len();
        if written > 0 {
            self.session.access.memory_write = Some((address as usize + written - 1) as u8);
        }

        Some(assembled.statement)
    }

    /// Write the session log to disk. Failing to do so does not stop the debugger from quitting.
    #[tracing::instrument(skip(self), parent = &self.span)]
    pub fn quit(&mut self) -> Flow {
        self.session.log.info(
            "STATUS",
            format!("Writing debugger's log to '{}'", self.log_path.display()),
        );
        self.session.log.info("STATUS", "Exiting debugger");
        self.refresh();

        if let Err(err) = self.session.log.write_to(&self.log_path) {
            tracing::debug!("failed to write log file: {}", err);
        }
        Flow::Quit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Scripted;
    use std::fs;

    const FAST_CLOCK: f64 = 1e9;

    fn debugger(lines: &[&str]) -> Debugger<Scripted> {
        let config = Config {
            log_path: std::env::temp_dir().join("kris-emu-test.log"),
            clock_hz: FAST_CLOCK,
            display: DisplayMode::Disabled,
        };
        Debugger::new(
            Scripted::new(lines.iter().copied()),
            config,
            Interrupt::new(),
            Arc::new(RunStatus::default()),
        )
    }

    fn with_program(program: &[u8], lines: &[&str]) -> Debugger<Scripted> {
        let mut debugger = debugger(lines);
        debugger.session_mut().image = Some(ProgramImage::new("test", program.to_vec()));
        debugger.reset();
        debugger
    }

    fn last_message(debugger: &Debugger<Scripted>) -> String {
        debugger
            .session()
            .log
            .last()
            .map(|entry| entry.message.clone())
            .unwrap_or_default()
    }

    #[test]
    fn reset_loads_image() {
        let debugger = with_program(&[0x20, 0x41, 0x0F], &[]);
        let session = debugger.session();
        assert_eq!(&session.machine.memory.as_slice()[..3], &[0x20, 0x41, 0x0F]);
        assert_eq!(session.access, AccessFlags::default());
        assert!(session.step.step_mode);
        assert!(!session.machine.halted);
        assert_eq!(last_message(&debugger), "Ready");
        assert_eq!(session.log.entries()[0].message, "Initializing computer");
        // Once after clearing, then once per loaded byte
        assert_eq!(debugger.console().refreshes, 4);
    }

    #[test]
    fn run_stops_before_breakpoint() {
        let mut program = vec![0x10; 10]; // XOR
        program.push(0x0F); // HALT
        let mut debugger = with_program(&program, &["5"]);
        debugger.execute(Command::AddBreakpoint);

        assert_eq!(
            debugger.run(),
            StopCause::Breakpoint {
                slot: 1,
                address: 0x05
            }
        );
        assert_eq!(debugger.session().machine.registers.pc, 0x05);
        assert_eq!(debugger.session().machine.opc, Some(0x04));
        assert!(debugger.session().step.step_mode);
        assert_eq!(last_message(&debugger), "Hit Breakpoint 1 at address 0x05");

        // Continue past it
        assert_eq!(debugger.run(), StopCause::Halted);
        assert_eq!(debugger.session().machine.registers.pc, 0x0A);
        assert!(debugger.session().machine.halted);
    }

    #[test]
    fn run_stops_on_invalid_instruction() {
        let mut debugger = with_program(&[0x10, 0x10, 0x99], &[]);
        assert_eq!(debugger.run(), StopCause::InvalidInstruction);
        assert_eq!(debugger.session().machine.registers.pc, 0x02);
        assert_eq!(debugger.session().machine.opc, Some(0x02));
        assert!(debugger.session().step.step_mode);
    }

    #[test]
    fn run_can_be_interrupted() {
        // SET_R1 0x01; XOR; JNZ 0x00 loops forever since R2 stays 0
        let mut debugger = with_program(&[0x20, 0x01, 0x10, 0x21, 0x00], &[]);
        let interrupt = debugger.interrupt.clone();
        let done = Arc::new(AtomicBool::new(false));

        let thread_done = Arc::clone(&done);
        let trigger = std::thread::spawn(move || {
            while !thread_done.load(Ordering::SeqCst) {
                interrupt.trigger();
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        let cause = debugger.run();
        done.store(true, Ordering::SeqCst);
        trigger.join().unwrap();

        assert_eq!(cause, StopCause::Interrupted);
        assert_eq!(last_message(&debugger), "User Interruption");
        assert!(debugger.session().step.step_mode);
        assert!(!debugger.status.is_running());
    }

    #[test]
    fn stepping_while_halted_changes_nothing() {
        let mut debugger = with_program(&[0x0F], &[]);
        assert_eq!(debugger.step(), Outcome::Halted);

        let before = debugger.session().machine.clone();
        let entries = debugger.session().log.entries().len();
        assert_eq!(debugger.step(), Outcome::AlreadyHalted);
        assert_eq!(debugger.session().machine, before);
        assert_eq!(debugger.session().log.entries().len(), entries + 1);
        assert_eq!(
            debugger.session().log.last().map(|e| e.level),
            Some(log::Level::Warning)
        );
    }

    #[test]
    fn breakpoint_commands() {
        let mut debugger = debugger(&["10", "10", "zz", "1", "1", "14", "*"]);
        debugger.execute(Command::AddBreakpoint);
        assert!(debugger.session().breakpoints.contains(0x10));

        debugger.execute(Command::AddBreakpoint);
        assert_eq!(last_message(&debugger), "breakpoint at address 0x10 was already set");

        debugger.execute(Command::AddBreakpoint);
        assert_eq!(last_message(&debugger), "invalid address 'zz'");

        debugger.execute(Command::DeleteBreakpoint);
        assert_eq!(last_message(&debugger), "Deleted Breakpoint 1 at address 0x10");
        assert!(debugger.session().breakpoints.is_empty());

        debugger.execute(Command::DeleteBreakpoint);
        assert_eq!(last_message(&debugger), "breakpoint 1 not set");

        debugger.execute(Command::DeleteBreakpoint);
        assert_eq!(last_message(&debugger), "invalid breakpoint number '14'");

        debugger.session_mut().breakpoints.add(0x20).unwrap();
        debugger.execute(Command::DeleteBreakpoint);
        assert!(debugger.session().breakpoints.is_empty());
    }

    #[test]
    fn thirteenth_breakpoint_is_rejected() {
        let mut debugger = debugger(&["ff"]);
        for address in 0..Breakpoints::SLOTS as u8 {
            debugger.session_mut().breakpoints.add(address).unwrap();
        }
        debugger.execute(Command::AddBreakpoint);
        assert!(!debugger.session().breakpoints.contains(0xFF));
        assert_eq!(
            debugger.session().log.last().map(|e| e.level),
            Some(log::Level::Error)
        );
    }

    #[test]
    fn assembly_mode_from_pc() {
        let mut debugger = debugger(&["SET_R1 0x2A", "BOGUS", "HLT", "q"]);
        debugger.session_mut().machine.registers.pc = 0x10;
        debugger.execute(Command::Assemble);

        let memory = &debugger.session().machine.memory;
        assert_eq!(&memory.as_slice()[0x10..0x13], &[0x20, 0x2A, 0x0F]);
        assert!(debugger
            .session()
            .log
            .entries()
            .iter()
            .any(|e| e.message == "'BOGUS' invalid instruction"));
        assert_eq!(last_message(&debugger), "Leaving Assembly Mode");
        assert_eq!(debugger.session().cursor, None);
        assert_eq!(debugger.session().step.state, ControllerState::AwaitingCommand);
    }

    #[test]
    fn assembly_mode_ends_with_memory() {
        let mut debugger = debugger(&["XOR", "ADD"]);
        debugger.session_mut().machine.registers.pc = 0xFE;
        debugger.execute(Command::Assemble);

        let memory = &debugger.session().machine.memory;
        assert_eq!(memory[0xFE], 0x10);
        assert_eq!(memory[0xFF], 0x11);
        assert!(debugger
            .session()
            .log
            .entries()
            .iter()
            .any(|e| e.message == "Reached end of memory space"));
    }

    #[test]
    fn program_mode_stops_at_end_of_memory() {
        let mut debugger = debugger(&["fe", "01", "nope", "02", "03"]);
        debugger.execute(Command::Program);

        let memory = &debugger.session().machine.memory;
        assert_eq!(memory[0xFE], 0x01);
        assert_eq!(memory[0xFF], 0x02);
        assert_eq!(memory[0x00], 0x00);
        // "03" is never asked for
        assert_eq!(debugger.console().prompts.len(), 4);
        assert!(debugger
            .session()
            .log
            .entries()
            .iter()
            .any(|e| e.message == "invalid value 'nope'"));
    }

    #[test]
    fn program_mode_quit() {
        let mut debugger = debugger(&["10", "aa", "q"]);
        debugger.execute(Command::Program);
        assert_eq!(debugger.session().machine.memory[0x10], 0xAA);
        assert_eq!(last_message(&debugger), "Leaving programming mode");
    }

    #[test]
    fn edit_registers_and_memory() {
        let mut debugger = debugger(&["pc", "42", "REG2", "0x07", "M", "f5", "41", "SP"]);
        debugger.execute(Command::Edit);
        debugger.execute(Command::Edit);
        debugger.execute(Command::Edit);

        let session = debugger.session();
        assert_eq!(session.machine.registers.pc, 0x42);
        assert_eq!(session.machine.registers.reg2, 0x07);
        assert_eq!(session.machine.memory[0xF5], 0x41);
        assert_eq!(session.access.memory_write, Some(0xF5));

        debugger.execute(Command::Edit);
        assert_eq!(last_message(&debugger), "invalid register 'SP'");
    }

    #[test]
    fn save_and_load_binary() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("program.kris");
        let path_text = path.display().to_string();

        let mut debugger = debugger(&["04", path_text.as_str(), "x", "B", path_text.as_str()]);
        let program = [0x20, 0x41, 0x14, 0x13, 0x0F];
        debugger.session_mut().machine.memory.load(&program);
        debugger.session_mut().machine.memory[0x05] = 0x99;
        debugger.execute(Command::Save);
        assert_eq!(fs::read(&path).unwrap(), program);

        debugger.session_mut().machine = Machine::new();
        debugger.execute(Command::Load);
        let memory = &debugger.session().machine.memory;
        assert_eq!(&memory.as_slice()[..5], &program);
        assert_eq!(memory[0x05], 0x00);
    }

    #[test]
    fn save_refuses_existing_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("existing.kris");
        fs::write(&path, b"keep").unwrap();
        let path_text = path.display().to_string();

        let mut debugger = debugger(&["ff", path_text.as_str()]);
        debugger.execute(Command::Save);
        assert_eq!(fs::read(&path).unwrap(), b"keep");
        let messages: Vec<_> = debugger
            .session()
            .log
            .entries()
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert!(messages.contains(&format!("file '{}' already exists", path_text)));
    }

    #[test]
    fn load_source() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("hello.kris");
        fs::write(&path, "# hello\nSET_R1 0x48\naddress_08h:\nHLT\n").unwrap();
        let path_text = path.display().to_string();

        let mut debugger = debugger(&["s", path_text.as_str()]);
        debugger.execute(Command::Load);

        let image = debugger.session().image.clone().unwrap();
        assert_eq!(image.bytes.len(), 9);
        assert_eq!(&image.bytes[..2], &[0x20, 0x48]);
        assert_eq!(image.bytes[8], 0x0F);
        assert!(!image.name.ends_with(".kris"));
        assert!(debugger
            .session()
            .log
            .entries()
            .iter()
            .any(|e| e.context == "ASM-C" && e.message == "# hello"));

        // The image survives a reset
        debugger.reset();
        assert_eq!(debugger.session().machine.memory[0x08], 0x0F);
    }

    #[test]
    fn load_missing_source() {
        let mut debugger = debugger(&["S", "/nonexistent/kris/source.kris"]);
        debugger.execute(Command::Load);
        assert_eq!(
            last_message(&debugger),
            "file '/nonexistent/kris/source.kris' not found"
        );
        assert!(debugger.session().image.is_none());
    }

    #[test]
    fn oversized_image_is_truncated() {
        let debugger = with_program(&[0x10; 300], &[]);
        assert!(debugger.session().machine.memory.as_slice().iter().all(|&b| b == 0x10));
        assert!(debugger
            .session()
            .log
            .entries()
            .iter()
            .any(|e| e.level == log::Level::Warning && e.context == "LOAD"));
    }

    #[test]
    fn clock_and_display() {
        let mut debugger = debugger(&["12.5", "-3", "fast"]);
        debugger.execute(Command::Clock);
        assert_eq!(debugger.session().clock_hz, 12.5);
        assert_eq!(last_message(&debugger), "Clock speed adjusted to 12.50 Hz");

        debugger.execute(Command::Clock);
        assert_eq!(last_message(&debugger), "invalid clock speed '-3'");
        debugger.execute(Command::Clock);
        assert_eq!(debugger.session().clock_hz, 12.5);

        debugger.execute(Command::Display);
        assert_eq!(debugger.session().display, DisplayMode::Hex);
        debugger.execute(Command::Display);
        assert_eq!(debugger.session().display, DisplayMode::Ascii);
        debugger.execute(Command::Display);
        assert_eq!(debugger.session().display, DisplayMode::Disabled);
    }

    #[test]
    fn invalid_command() {
        let mut debugger = debugger(&[]);
        assert_eq!(debugger.handle_line("jump"), Flow::Continue);
        assert_eq!(last_message(&debugger), "INVALID Command 'jump'");
        assert_eq!(debugger.session().log.last().map(|e| e.context.as_str()), Some("CMD"));
    }

    #[test]
    fn log_and_help_are_shown() {
        let mut debugger = debugger(&["2"]);
        debugger.session_mut().log.info("A", "one");
        debugger.session_mut().log.info("B", "two");
        debugger.execute(Command::Log);
        debugger.execute(Command::Help);

        let shown = &debugger.console().shown;
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].lines().count(), 2);
        assert!(shown[0].ends_with("LOG     : Displaying last 2 status lines"));
        assert!(shown[1].contains("SET_REG1"));
    }

    #[test]
    fn reset_needs_confirmation() {
        let mut debugger = with_program(&[0x20, 0x01], &["maybe", "n", "Y"]);
        debugger.session_mut().machine.registers.reg2 = 9;
        debugger.execute(Command::Reset);
        assert_eq!(debugger.session().machine.registers.reg2, 9);

        debugger.execute(Command::Reset);
        assert_eq!(debugger.session().machine.registers.reg2, 0);
        assert_eq!(last_message(&debugger), "Ready");
    }

    #[test]
    fn quit_writes_log() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let log_path = dir.path().join("session.log");

        let mut debugger = debugger(&["n", "y"]);
        debugger.log_path = log_path.clone();

        assert_eq!(debugger.handle_line("quit"), Flow::Continue);
        assert!(!log_path.exists());

        assert_eq!(debugger.handle_line("q"), Flow::Quit);
        let written = fs::read_to_string(&log_path).unwrap();
        assert!(written.lines().last().unwrap().ends_with("STATUS  : Exiting debugger"));
    }

    #[test]
    fn run_loop_quits_when_input_ends() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut debugger = with_program(&[0x10, 0x0F], &["", "s"]);
        debugger.log_path = dir.path().join("session.log");

        debugger.run_loop();
        assert!(debugger.session().machine.halted);
        assert!(debugger.log_path.exists());
    }

    #[test]
    fn log_file_suffix() {
        assert_eq!(Config::log_file("computer.log"), PathBuf::from("computer.log"));
        assert_eq!(Config::log_file("trace"), PathBuf::from("trace.log"));
    }
}
