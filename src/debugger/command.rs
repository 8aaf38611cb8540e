/// Every debugger command. Single letters are case sensitive: `a` adds a
/// breakpoint while `A` enters assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Step,
    Run,
    Assemble,
    AddBreakpoint,
    DeleteBreakpoint,
    Display,
    Clock,
    Clear,
    Log,
    Load,
    Save,
    Edit,
    Program,
    Reset,
    Quit,
    ForceQuit,
}

struct Entry {
    command: Command,
    /// Matched as typed
    exact: &'static [&'static str],
    /// Matched against the lowercased input
    folded: &'static [&'static str],
    description: &'static str,
}

#[rustfmt::skip]
const COMMANDS: [Entry; 17] = [
    Entry { command: Command::Help,             exact: &[],    folded: &["h", "m", "help", "man", "?"],   description: "Displays the manual" },
    Entry { command: Command::Step,             exact: &["s"], folded: &["step"],                         description: "Executes a single instruction; it's the default command" },
    Entry { command: Command::Run,              exact: &["r"], folded: &["run"],                          description: "Executes instructions until interrupted by user/breakpoint" },
    Entry { command: Command::Assemble,         exact: &["A"], folded: &["asm", "assemble"],              description: "Enters assembly mode ('address_xxh:' moves the cursor)" },
    Entry { command: Command::AddBreakpoint,    exact: &["a"], folded: &["b", "addbp", "bp", "breakpoint"], description: "Adds an execution breakpoint" },
    Entry { command: Command::DeleteBreakpoint, exact: &["d"], folded: &["delbp"],                        description: "Removes a breakpoint ('*' removes all of them)" },
    Entry { command: Command::Display,          exact: &["D"], folded: &["display"],                      description: "Toggles the KRIS display (hex/ascii views)" },
    Entry { command: Command::Clock,            exact: &["C"], folded: &["clk", "clock"],                 description: "Changes the CPU clock speed" },
    Entry { command: Command::Clear,            exact: &["c"], folded: &["clr", "clear"],                 description: "Clears and refreshes the screen" },
    Entry { command: Command::Log,              exact: &["l"], folded: &["log", "status"],                description: "Displays the last n lines of the status/trace log" },
    Entry { command: Command::Load,             exact: &["L"], folded: &["load"],                         description: "Loads a program from disk" },
    Entry { command: Command::Save,             exact: &["S"], folded: &["save"],                         description: "Saves memory to disk up to an address" },
    Entry { command: Command::Edit,             exact: &[],    folded: &["e", "edit", "editreg"],         description: "Edits a register or memory value" },
    Entry { command: Command::Program,          exact: &[],    folded: &["p", "prog", "program"],         description: "Enters programming mode to edit memory byte by byte" },
    Entry { command: Command::Reset,            exact: &["R"], folded: &["reset"],                        description: "Resets the KRIS computer" },
    Entry { command: Command::Quit,             exact: &[],    folded: &["q", ":q", "quit", "exit"],      description: "Exits the debugger" },
    Entry { command: Command::ForceQuit,        exact: &[],    folded: &["q!"],                           description: "Exits the debugger without confirmation" },
];

impl Command {
    /// Parse a line typed at the command prompt. An empty line steps.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Some(Self::Step);
        }

        let folded = input.to_lowercase();
        COMMANDS
            .iter()
            .find(|entry| entry.exact.contains(&input) || entry.folded.contains(&folded.as_str()))
            .map(|entry| entry.command)
    }

    /// One line per command, for the manual.
    pub fn help() -> String {
        COMMANDS
            .iter()
            .map(|entry| {
                let name = entry
                    .exact
                    .first()
                    .or_else(|| entry.folded.first())
                    .copied()
                    .unwrap_or_default();
                let long = entry.folded.last().copied().unwrap_or_default();
                format!("  {:<3} {:<12} {}", name, long, entry.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
