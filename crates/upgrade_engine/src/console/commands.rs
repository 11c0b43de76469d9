use std::collections::{HashMap, VecDeque};

use super::ConsoleState;

const MAX_PENDING_UPGRADE_COMMANDS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeCommand {
    Start { variant: String },
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAction {
    Help,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Local(LocalAction),
    Queueable(UpgradeCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    pub fn new(reason: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.into(),
        }
    }
}

type ParseFn = dyn Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync;

struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

pub struct ConsoleCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl Default for ConsoleCommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleCommandRegistry {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("help", "List commands", "", parse_help_command)
            .expect("built-in command registration should not fail");
        registry
            .register("clear", "Clear console output", "", parse_clear_command)
            .expect("built-in command registration should not fail");
        registry
            .register(
                "auto_upgrade",
                "Rebuild the whole fleet for another track type",
                "<variant:string>",
                parse_auto_upgrade_command,
            )
            .expect("built-in command registration should not fail");
        registry
            .register(
                "auto_upgrade_status",
                "Show progress of the running upgrade",
                "",
                parse_auto_upgrade_status_command,
            )
            .expect("built-in command registration should not fail");
        registry
    }

    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    pub fn iter_specs_in_order(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.specs.iter().map(|spec| {
            (
                spec.name.as_str(),
                spec.help.as_str(),
                spec.arg_schema.as_str(),
            )
        })
    }
}

/// Turns pending console lines into local replies or queued upgrade commands.
pub struct ConsoleCommandProcessor {
    registry: ConsoleCommandRegistry,
    pending_upgrade_commands: VecDeque<UpgradeCommand>,
}

impl Default for ConsoleCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleCommandProcessor {
    pub fn new() -> Self {
        Self {
            registry: ConsoleCommandRegistry::with_builtins(),
            pending_upgrade_commands: VecDeque::new(),
        }
    }

    pub fn registry_mut(&mut self) -> &mut ConsoleCommandRegistry {
        &mut self.registry
    }

    pub fn process_pending_lines(&mut self, console: &mut ConsoleState) {
        let mut lines = Vec::new();
        console.drain_pending_lines_into(&mut lines);

        for raw_line in lines {
            self.process_line(console, &raw_line);
        }
    }

    pub fn drain_pending_upgrade_commands_into(&mut self, out: &mut Vec<UpgradeCommand>) {
        out.extend(self.pending_upgrade_commands.drain(..));
    }

    fn process_line(&mut self, console: &mut ConsoleState, raw_line: &str) {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return;
        }

        let tokens = match tokenize_line(trimmed) {
            Ok(tokens) => tokens,
            Err(reason) => {
                console.append_output_line(format!("error: {reason}. usage: help"));
                return;
            }
        };
        let Some((command_name, args)) = tokens.split_first() else {
            return;
        };
        let Some(spec) = self.registry.lookup(command_name) else {
            console.append_output_line(format!(
                "error: unknown command '{command_name}'. try: help"
            ));
            return;
        };

        match (spec.parse)(args) {
            Ok(ParsedCommand::Local(action)) => self.apply_local_action(console, action),
            Ok(ParsedCommand::Queueable(command)) => self.push_queueable(command),
            Err(error) => {
                console
                    .append_output_line(format!("error: {}. usage: {}", error.reason, error.usage));
            }
        }
    }

    fn apply_local_action(&self, console: &mut ConsoleState, action: LocalAction) {
        match action {
            LocalAction::Help => {
                for (name, help, arg_schema) in self.registry.iter_specs_in_order() {
                    let line = if arg_schema.is_empty() {
                        format!("{name} - {help}")
                    } else {
                        format!("{name} {arg_schema} - {help}")
                    };
                    console.append_output_line(line);
                }
            }
            LocalAction::Clear => console.clear_output_lines(),
        }
    }

    fn push_queueable(&mut self, command: UpgradeCommand) {
        if self.pending_upgrade_commands.len() == MAX_PENDING_UPGRADE_COMMANDS {
            self.pending_upgrade_commands.pop_front();
        }
        self.pending_upgrade_commands.push_back(command);
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if seen_token_content {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_help_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedCommand::Local(LocalAction::Help))
}

fn parse_clear_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "clear")?;
    Ok(ParsedCommand::Local(LocalAction::Clear))
}

fn parse_auto_upgrade_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let [variant] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <variant>",
            "auto_upgrade <variant>",
        ));
    };
    Ok(ParsedCommand::Queueable(UpgradeCommand::Start {
        variant: variant.clone(),
    }))
}

fn parse_auto_upgrade_status_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "auto_upgrade_status")?;
    Ok(ParsedCommand::Queueable(UpgradeCommand::Status))
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}
