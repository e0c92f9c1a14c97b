//! `dassie query`: one action per invocation over an opened store.

use crate::render;
use anyhow::Result;
use clap::Args;
use dassie_hierarchy::{collect_statistics, outline, HierarchyError, PathTracer, TraversalConfig};
use dassie_store::TermStore;
use regex::RegexBuilder;

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Print details about the given LCSH term(s)
    #[arg(short, long)]
    pub describe: bool,
    /// Find terms whose label, alt labels or note match a regex
    #[arg(short, long)]
    pub find: bool,
    /// Trace paths from the given term(s) to root terms
    #[arg(short, long)]
    pub trace: bool,
    /// Print summary statistics about the database
    #[arg(short = 'm', long)]
    pub summarize: bool,
    /// List the narrower terms below the given term(s)
    #[arg(short, long)]
    pub outline: bool,
    /// With --find: match whole words in labels instead of a regex
    #[arg(long)]
    pub words: bool,
    /// Levels shown by --outline
    #[arg(long, default_value_t = 3)]
    pub depth: usize,
    /// A regex to search for, or one or more LCSH identifiers
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Describe,
    Find,
    Trace,
    Summarize,
    Outline,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("can only perform one action at a time (got {})", .0.join(", "))]
    SeveralActions(Vec<&'static str>),

    #[error("no action specified (use -h for help)")]
    NoAction,

    #[error("{0} needs arguments (use -h for help)")]
    MissingArguments(&'static str),

    #[error("identifiers must be LCSH identifiers, like sh89003287 (got {0:?})")]
    MalformedId(String),

    #[error("invalid pattern {pattern:?}: {reason}")]
    BadPattern { pattern: String, reason: String },
}

impl QueryArgs {
    pub fn action(&self) -> Result<Action, QueryError> {
        let chosen: Vec<(Action, &'static str)> = [
            (self.describe, Action::Describe, "--describe"),
            (self.find, Action::Find, "--find"),
            (self.trace, Action::Trace, "--trace"),
            (self.summarize, Action::Summarize, "--summarize"),
            (self.outline, Action::Outline, "--outline"),
        ]
        .into_iter()
        .filter(|(on, _, _)| *on)
        .map(|(_, action, flag)| (action, flag))
        .collect();

        match chosen.as_slice() {
            [] => Err(QueryError::NoAction),
            [(action, flag)] => {
                let needs_args = !matches!(action, Action::Summarize);
                if needs_args && self.args.is_empty() {
                    return Err(QueryError::MissingArguments(*flag));
                }
                Ok(*action)
            }
            several => Err(QueryError::SeveralActions(
                several.iter().map(|(_, flag)| *flag).collect(),
            )),
        }
    }

    /// [`QueryArgs::action`] plus identifier checks for the actions that
    /// take identifiers.
    pub fn validate(&self) -> Result<Action, QueryError> {
        let action = self.action()?;
        if matches!(action, Action::Describe | Action::Trace | Action::Outline) {
            validate_ids(&self.args)?;
        }
        Ok(action)
    }
}

/// `sh` followed by one or more ASCII digits.
pub fn is_lcsh_id(id: &str) -> bool {
    id.strip_prefix("sh")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

pub fn validate_ids(ids: &[String]) -> Result<(), QueryError> {
    match ids.iter().find(|id| !is_lcsh_id(id)) {
        Some(bad) => Err(QueryError::MalformedId(bad.clone())),
        None => Ok(()),
    }
}

/// Rendered output of one query, plus the requested ids that name no term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    pub text: String,
    pub missing: Vec<String>,
}

/// Run the selected action and render its output. Unknown identifiers are
/// reported inline and collected in [`QueryOutput::missing`]; the other
/// identifiers are still rendered.
pub fn run<S: TermStore + ?Sized>(
    store: &S,
    args: &QueryArgs,
    traversal: TraversalConfig,
) -> Result<QueryOutput> {
    let action = args.validate()?;

    let mut missing = Vec::new();
    let mut known = |id: &String, out: &mut String| -> Result<bool> {
        if store.contains(id)? {
            return Ok(true);
        }
        out.push_str(&format!("Could not find {id} in the database.\n"));
        missing.push(id.clone());
        Ok(false)
    };

    let mut out = String::new();
    out.push_str(&render::rule('='));
    out.push('\n');
    match action {
        Action::Summarize => out.push_str(&render::summary(&collect_statistics(store)?)),
        Action::Describe => {
            for (i, id) in args.args.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                if !known(id, &mut out)? {
                    continue;
                }
                let term = store
                    .find_one(id)?
                    .ok_or_else(|| HierarchyError::MissingTerm(id.clone()))?;
                out.push_str(&render::describe(&term));
            }
        }
        Action::Trace => {
            let mut tracer = PathTracer::new(store, traversal);
            for id in &args.args {
                if known(id, &mut out)? {
                    out.push_str(&render::paths(&tracer.trace(id)?));
                }
            }
        }
        Action::Outline => {
            for id in &args.args {
                if known(id, &mut out)? {
                    out.push_str(&render::outline(&outline(store, id, args.depth)?));
                }
            }
        }
        Action::Find => {
            let text = args.args.join(" ");
            let found = if args.words {
                store.ensure_indexes()?;
                store.search_words(&text)?
            } else {
                let pattern = RegexBuilder::new(&text)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| QueryError::BadPattern {
                        pattern: text.clone(),
                        reason: e.to_string(),
                    })?;
                store.search(&pattern)?
            };
            if found.is_empty() {
                out.push_str(&format!("Found no LCSH entries containing \"{text}\".\n"));
            } else {
                out.push_str(&format!(
                    "Found {} entries containing \"{text}\" in label, alt_label, or notes\n",
                    render::intcomma(found.len())
                ));
                for (i, term) in found.iter().enumerate() {
                    if i > 0 {
                        out.push_str(&render::rule('-'));
                        out.push('\n');
                    }
                    out.push_str(&render::describe(term));
                }
            }
        }
    }
    out.push_str(&render::rule('='));
    out.push('\n');
    Ok(QueryOutput { text: out, missing })
}
