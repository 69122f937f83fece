//! Interactive prompt built on rustyline
//!
//! Completion candidates are snapshotted from the session before every
//! prompt, since the editor cannot borrow the session while it reads.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use crate::commands::Suggestion;
use crate::router::Router;
use crate::session::Session;

/// Lines loaded from the history file into the editor at startup
const HISTORY_SEED: usize = 500;

#[derive(Debug, Default, Clone)]
struct CompletionData {
    verbs: Vec<Suggestion>,
    arguments: BTreeMap<String, Vec<Suggestion>>,
    aliases: Vec<Suggestion>,
    tables: Vec<Suggestion>,
}

fn pair(suggestion: &Suggestion) -> Pair {
    let display = if suggestion.description.is_empty() {
        suggestion.text.clone()
    } else {
        format!("{}  ({})", suggestion.text, suggestion.description)
    };
    Pair {
        display,
        replacement: suggestion.text.clone(),
    }
}

fn refresh_completion_data(data: &RwLock<CompletionData>, router: &Router, session: &Session) {
    let mut snapshot = CompletionData::default();

    for command in router.commands().iter() {
        snapshot
            .verbs
            .push(Suggestion::new(command.name(), command.help()));
        let line = format!("{} ", command.name());
        let candidates = command.suggest(session, &line);
        snapshot
            .arguments
            .insert(command.name().to_string(), candidates);
    }

    for alias in session.aliases().iter() {
        let suggestion = Suggestion::new(alias.name.clone(), alias.command.clone());
        snapshot.verbs.push(suggestion.clone());
        snapshot.aliases.push(suggestion);
    }

    if let Ok(host) = session.registry().current_host() {
        snapshot.tables = host
            .tables
            .iter()
            .map(|table| Suggestion::new(table.clone(), ""))
            .collect();
    }

    *data.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
}

struct ShellHelper {
    data: Arc<RwLock<CompletionData>>,
}

impl ShellHelper {
    fn filter(items: &[Suggestion], prefix: &str) -> Vec<Pair> {
        items
            .iter()
            .filter(|item| item.text.starts_with(prefix))
            .map(pair)
            .collect()
    }
}

impl Helper for ShellHelper {}

impl Highlighter for ShellHelper {}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Validator for ShellHelper {}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &line[start..pos];
        let tokens: Vec<&str> = line[..start].split_whitespace().collect();

        let data = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());

        let Some(&verb) = tokens.first() else {
            return Ok((start, Self::filter(&data.verbs, word)));
        };

        if tokens
            .last()
            .is_some_and(|token| token.eq_ignore_ascii_case("from"))
        {
            return Ok((start, Self::filter(&data.tables, word)));
        }
        if verb == ".alias" && tokens.get(1) == Some(&"--remove") && tokens.len() == 2 {
            return Ok((start, Self::filter(&data.aliases, word)));
        }
        if tokens.len() == 1 {
            if let Some(candidates) = data.arguments.get(verb) {
                return Ok((start, Self::filter(candidates, word)));
            }
        }
        Ok((start, Vec::new()))
    }
}

/// Read lines until `.exit` or end of input. Ctrl-C at the prompt clears
/// the line. Ctrl-C while a query is waiting cancels the wait.
pub async fn run(router: &Router, session: &mut Session) -> Result<()> {
    let completions = Arc::new(RwLock::new(CompletionData::default()));
    let mut editor: Editor<ShellHelper, DefaultHistory> =
        Editor::new().map_err(|e| anyhow!("failed to init line editor: {e}"))?;
    editor.set_helper(Some(ShellHelper {
        data: completions.clone(),
    }));

    match session.history().recent(HISTORY_SEED) {
        Ok(lines) => {
            for line in lines {
                let _ = editor.add_history_entry(line);
            }
        }
        Err(e) => tracing::warn!("failed to load history: {}", e),
    }

    let cancel = session.cancel_token();
    let interrupt_listener = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, cancelling current wait");
            cancel.cancel();
        }
    });

    while !session.exit_requested() {
        refresh_completion_data(&completions, router, session);

        let prompt = session.prompt();
        let line = match tokio::task::block_in_place(|| editor.readline(&prompt)) {
            Ok(line) => line,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => {
                interrupt_listener.abort();
                return Err(anyhow!("readline error: {e}"));
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        // errors are already printed by the router
        let _ = router.dispatch(session, line).await;
        session.out().flush()?;
    }

    interrupt_listener.abort();
    Ok(())
}
