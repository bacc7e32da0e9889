//! REPL (Read-Eval-Print Loop)

use crate::ast::{Node, optimize};
use crate::config::Config;
use crate::error::{ScriptError, report_error};
use crate::interp::{Context, SymbolTable, Value};
use crate::parser::parse_source;
use crate::util::is_reserved_name;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::{Path, PathBuf};

const PROMPT: &str = "> ";
const SOURCE_NAME: &str = "<repl>";

/// Interpreter state shared by consecutive REPL lines
pub struct Session {
    context: Context,
    /// Variables of the interactive pseudo-function, kept between lines
    locals: SymbolTable,
}

impl Session {
    pub fn new(context: Context) -> Self {
        Session {
            context,
            locals: SymbolTable::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn locals(&self) -> &SymbolTable {
        &self.locals
    }

    /// Evaluate one input line.
    ///
    /// Function definitions are added to the context; every other item runs
    /// as an interactive command. The result is the value of the last item
    /// that produced one.
    pub fn eval_line(&mut self, input: &str) -> Result<Option<Value>, ScriptError> {
        let root = parse_source(SOURCE_NAME, input)?;
        let root = if self.context.config().optimize {
            optimize(root)
        } else {
            root
        };
        let Node::Module(items) = root else {
            return Ok(None);
        };

        let mut last = None;
        for item in &items {
            if let Node::Function(def) = item {
                self.context.define_function(def.clone());
                continue;
            }
            let locals = std::mem::take(&mut self.locals);
            let (result, locals) = self.context.eval_interactive(item, locals);
            self.locals = locals;
            if let Some(value) = result? {
                last = Some(value);
            }
        }
        Ok(last)
    }

    /// Text printed for a `:` command, `None` for commands that end the session
    pub fn command(&mut self, cmd: &str) -> Option<String> {
        let text = match cmd {
            ":quit" | ":q" | ":exit" => return None,
            ":help" | ":h" | ":?" => HELP.to_string(),
            ":globals" => {
                let mut lines: Vec<String> = self
                    .locals
                    .entries()
                    .into_iter()
                    .filter(|(name, _)| !is_reserved_name(name))
                    .map(|(name, sym)| {
                        let value = sym.borrow();
                        format!("{name} = {value} ({}, session)", value.type_name())
                    })
                    .collect();
                lines.extend(self.context.dump_globals());
                lines.join("\n")
            }
            ":functions" => self.context.function_names().join("\n"),
            ":builtins" => self.context.builtin_names().join(" "),
            ":clear" => "\x1B[2J\x1B[1;1H".to_string(),
            _ => format!("Unknown command: {cmd}\nType :help for help."),
        };
        Some(text)
    }
}

const HELP: &str = "\
Commands:
  :help, :h, :?   Show this help
  :quit, :q       Exit the REPL
  :globals        List variables
  :functions      List user-defined functions
  :builtins       List built-in functions
  :clear          Clear the screen

Enter statements (`x = 2 * 3`), expressions (`sqrt(x)`) or
function definitions (`square(x) { return x * x; }`).";

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    session: Session,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Create a new REPL
    pub fn new(config: Config) -> RlResult<Self> {
        let editor = DefaultEditor::new()?;
        let history_path = config
            .history_file
            .as_deref()
            .and_then(|file| resolve_history(file, dirs_home()));

        let mut repl = Repl {
            editor,
            session: Session::new(Context::with_config(config)),
            history_path,
        };

        if let Some(path) = &repl.history_path
            && let Err(err) = repl.editor.load_history(path)
        {
            tracing::debug!(path = %path.display(), error = %err, "no history loaded");
        }

        Ok(repl)
    }

    /// Run the REPL
    pub fn run(&mut self) -> RlResult<()> {
        println!("hermelin {}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with(':') {
                        match self.session.command(line) {
                            Some(text) => println!("{text}"),
                            None => break,
                        }
                        continue;
                    }

                    self.eval_input(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path
            && let Err(err) = self.editor.save_history(path)
        {
            tracing::warn!(path = %path.display(), error = %err, "cannot save history");
        }

        Ok(())
    }

    fn eval_input(&mut self, input: &str) {
        match self.session.eval_line(input) {
            Ok(Some(value)) => println!("{value}"),
            Ok(None) => {}
            Err(ScriptError::Compile(err)) => report_error(SOURCE_NAME, input, &err),
            Err(ScriptError::Runtime(err)) => {
                eprintln!("{err}");
                for entry in &err.traceback {
                    eprintln!("  in {entry}");
                }
            }
        }
    }
}

/// Relative history files live in the home directory
fn resolve_history(file: &Path, home: Option<PathBuf>) -> Option<PathBuf> {
    if file.is_absolute() {
        Some(file.to_path_buf())
    } else {
        home.map(|h| h.join(file))
    }
}

/// Get home directory
fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
