//! Interactive REPL for regexlab.
//!
//! Edits rules, shows the debounced preview, imports/exports script JSON,
//! and chats with the assistant. Chat calls run to completion before the
//! next prompt is read, so a conversation never has two calls in flight.

use std::path::PathBuf;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::assistant::{self, ChatMessage, models};
use crate::config::Settings;
use crate::pipeline::PipelineResult;
use crate::rules::RulePatch;
use crate::state::Workspace;

pub struct Repl {
    editor: DefaultEditor,
    workspace: Workspace,
    settings: Settings,
    /// User-visible conversation history.
    chat_history: Vec<ChatMessage>,
    history_path: PathBuf,
}

impl Repl {
    pub fn new(workspace: Workspace, settings: Settings) -> Result<Self> {
        let editor = DefaultEditor::new()?;

        let history_path = dirs::home_dir()
            .unwrap_or_default()
            .join(".regexlab")
            .join("history");

        Ok(Self {
            editor,
            workspace,
            settings,
            chat_history: Vec::new(),
            history_path,
        })
    }

    fn load_history(&mut self) {
        if self.history_path.exists() {
            let _ = self.editor.load_history(&self.history_path);
        }
    }

    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = self.editor.save_history(&self.history_path);
    }

    /// Run the REPL loop
    pub async fn run(&mut self) -> Result<()> {
        self.load_history();

        println!("regexlab - regex pipeline workbench");
        println!("Type a message to chat, or /help for commands");
        println!();

        loop {
            let readline = self.editor.readline(">>> ");

            match readline {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.editor.add_history_entry(&line)?;

                    if let Some(command) = trimmed.strip_prefix('/') {
                        if !self.handle_command(command).await {
                            break;
                        }
                    } else {
                        self.chat(trimmed).await;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("Readline error: {e}");
                    break;
                }
            }
        }

        self.save_history();
        Ok(())
    }

    /// Handle one slash command; returns false to exit.
    async fn handle_command(&mut self, command: &str) -> bool {
        let (verb, rest) = command.split_once(' ').unwrap_or((command, ""));
        let rest = rest.trim();

        match verb {
            "help" => print_help(),
            "quit" | "exit" => return false,
            "rules" => self.print_rules(),
            "run" => print_result(&self.workspace.run_now()),
            "text" => {
                let (_, text) = self.workspace.snapshot();
                println!("{text}");
            }
            "settext" => self.workspace.set_source_text(rest),
            "add" => {
                let name = if rest.is_empty() { "New Rule" } else { rest };
                let rule = self.workspace.add_rule(name, "", "");
                println!("Added rule {} ({})", rule.name, rule.id);
            }
            "pattern" | "replace" | "rename" => match rest.split_once(' ') {
                Some((id, value)) => {
                    let patch = match verb {
                        "pattern" => RulePatch {
                            pattern: Some(value.to_string()),
                            ..Default::default()
                        },
                        "replace" => RulePatch {
                            replacement: Some(value.to_string()),
                            ..Default::default()
                        },
                        _ => RulePatch {
                            name: Some(value.to_string()),
                            ..Default::default()
                        },
                    };
                    if let Err(e) = self.workspace.update_rule(id, patch) {
                        eprintln!("{e}");
                    }
                }
                None => eprintln!("Usage: /{verb} <id> <value>"),
            },
            "toggle" => match self.workspace.toggle_rule(rest) {
                Ok(active) => println!("{rest} -> {}", if active { "active" } else { "inactive" }),
                Err(e) => eprintln!("{e}"),
            },
            "delete" => {
                if let Err(e) = self.workspace.delete_rule(rest) {
                    eprintln!("{e}");
                }
            }
            "move" => match rest
                .split_once(' ')
                .and_then(|(id, idx)| idx.trim().parse::<usize>().ok().map(|i| (id, i)))
            {
                Some((id, index)) => {
                    if let Err(e) = self.workspace.move_rule(id, index) {
                        eprintln!("{e}");
                    }
                }
                None => eprintln!("Usage: /move <id> <index>"),
            },
            "import" => match std::fs::read_to_string(rest) {
                Ok(json) => match self.workspace.import_json(&json) {
                    Ok(count) => println!("Imported {count} rule(s)"),
                    Err(e) => eprintln!("Import failed: {e}"),
                },
                Err(e) => eprintln!("Cannot read {rest}: {e}"),
            },
            "export" => {
                let json = self.workspace.export_json();
                match std::fs::write(rest, json) {
                    Ok(()) => println!("Exported to {rest}"),
                    Err(e) => eprintln!("Export failed: {e}"),
                }
            }
            "clear" => {
                self.workspace.clear();
                self.chat_history.clear();
                println!("Workspace cleared");
            }
            "reset" => {
                self.workspace.reset_defaults();
                println!("Defaults restored");
            }
            "models" => self.list_models().await,
            _ => eprintln!("Unknown command: /{verb} (try /help)"),
        }
        true
    }

    fn print_rules(&self) {
        let (rules, _) = self.workspace.snapshot();
        if rules.is_empty() {
            println!("(no rules)");
            return;
        }
        for rule in rules {
            println!(
                "[{}] {} {} ({})\n    regex:   {}\n    replace: {}",
                rule.order,
                if rule.active { "on " } else { "off" },
                rule.name,
                rule.id,
                rule.pattern,
                truncate(&rule.replacement, 80),
            );
        }
    }

    async fn list_models(&self) {
        match models::list_models(&self.settings).await {
            Ok(models) => {
                for model in models {
                    println!("{model}");
                }
            }
            Err(e) => eprintln!("{}", e.user_message(self.settings.language)),
        }
    }

    async fn chat(&mut self, message: &str) {
        self.chat_history.push(ChatMessage::user(message));

        let (rules, source_text) = self.workspace.snapshot();
        let outcome = assistant::send_message(
            &self.chat_history,
            &rules,
            &source_text,
            &self.settings,
            &self.workspace,
        )
        .await;

        let reply = match outcome {
            Ok(text) => text,
            Err(e) => e.user_message(self.settings.language),
        };
        println!("{reply}");
        self.chat_history.push(ChatMessage::model(reply));
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}…")
    }
}

fn print_result(result: &PipelineResult) {
    for entry in &result.diagnostics {
        let status = match &entry.error {
            Some(error) => format!("ERROR {error}"),
            None => format!("{} match(es)", entry.match_count),
        };
        println!(
            "  {} [{:.2}ms] {}",
            entry.rule_name, entry.elapsed_ms, status
        );
    }
    println!("{}", result.final_text);
}

fn print_help() {
    println!(
        "Commands:\n\
         /rules                 list rules\n\
         /add [name]            add an empty rule\n\
         /pattern <id> <spec>   set a rule's pattern\n\
         /replace <id> <tmpl>   set a rule's replacement\n\
         /rename <id> <name>    rename a rule\n\
         /toggle <id>           flip activation\n\
         /delete <id>           delete a rule\n\
         /move <id> <index>     reorder a rule\n\
         /text                  show source text\n\
         /settext <text>        replace source text\n\
         /run                   run the pipeline now\n\
         /import <path>         import script JSON\n\
         /export <path>         export script JSON\n\
         /models                list available models\n\
         /clear                 clear rules, text and chat\n\
         /reset                 restore sample rules\n\
         /quit                  exit\n\
         Anything else is sent to the assistant."
    );
}
