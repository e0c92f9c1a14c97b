//! Human-readable output for `dassie query`.
//!
//! Everything returns a `String`; colors come from `colored` and vanish when
//! `--no-color` turns the global override off.

use colored::Colorize;
use dassie_hierarchy::{OutlineRow, Path, Statistics};
use dassie_store::{Term, Topmost};
use std::fmt::Write as _;

const RULE_WIDTH: usize = 70;
const FIELD_WIDTH: usize = 14;
const NOTE_WIDTH: usize = 77 - FIELD_WIDTH;

pub fn rule(ch: char) -> String {
    ch.to_string().repeat(RULE_WIDTH).dimmed().to_string()
}

/// `1234567` → `1,234,567`.
pub fn intcomma(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn field(name: &str) -> String {
    format!("{name:>width$}: ", width = FIELD_WIDTH - 2)
        .dimmed()
        .to_string()
}

fn label_of(term: &Term) -> &str {
    if term.label.is_empty() {
        "(no label)"
    } else {
        &term.label
    }
}

fn joined<'a>(items: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let items: Vec<&str> = items.into_iter().collect();
    (!items.is_empty()).then(|| items.join(", "))
}

/// Greedy word wrap; continuation lines are indented to the field column.
fn wrap(text: &str) -> String {
    let indent = " ".repeat(FIELD_WIDTH);
    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.len() + 1 + word.len() > NOTE_WIDTH {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines.join(&format!("\n{indent}"))
}

/// Detail block for one term.
pub fn describe(term: &Term) -> String {
    let none = || "(none)".to_string();
    let mut out = String::new();
    let _ = writeln!(out, "{}", term.id.bold().reversed());
    let _ = writeln!(out, "{}{}", field("URL"), term.url());
    let _ = writeln!(out, "{}{}", field("label"), label_of(term));

    let alt = if term.alt_labels.is_empty() {
        none()
    } else {
        term.alt_labels
            .join(&format!("\n{}", " ".repeat(FIELD_WIDTH)))
    };
    let _ = writeln!(out, "{}{}", field("alt labels"), alt);
    let narrower = joined(term.narrower.iter().map(String::as_str)).unwrap_or_else(none);
    let _ = writeln!(out, "{}{}", field("narrower"), narrower);
    let broader = joined(term.broader.iter().map(String::as_str)).unwrap_or_else(none);
    let _ = writeln!(out, "{}{}", field("broader"), broader);
    let topmost = match &term.topmost {
        Topmost::Uncomputed => "(not computed)".to_string(),
        Topmost::Root => none(),
        Topmost::Ancestors(_) => joined(term.topmost.ancestors()).unwrap_or_else(none),
    };
    let _ = writeln!(out, "{}{}", field("topmost"), topmost);
    let note = term.note.as_deref().map(wrap).unwrap_or_else(none);
    let _ = writeln!(out, "{}{}", field("note"), note);

    let flags = [
        (term.flags.validation_record, "validation record"),
        (term.flags.topic_subdivision, "topic subdivision"),
        (term.flags.genre_form, "genre/form"),
    ];
    if let Some(set) = joined(flags.iter().filter(|(on, _)| *on).map(|(_, name)| *name)) {
        let _ = writeln!(out, "{}{}", field("flags"), set.yellow());
    }
    out
}

fn one_line(term: &Term) -> String {
    format!("{}: {}", term.id.bold(), label_of(term))
}

/// Each path root-first, children indented under `└─ `.
pub fn paths(paths: &[Path]) -> String {
    let mut out = String::new();
    for path in paths {
        let mut indent = String::new();
        for (depth, term) in path.iter().rev().enumerate() {
            if depth == 1 {
                indent = "└─ ".to_string();
            } else if depth > 1 {
                indent.insert_str(0, "   ");
            }
            let _ = writeln!(out, "{indent}{}", one_line(term));
        }
        out.push('\n');
    }
    out
}

pub fn outline(rows: &[OutlineRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let indent = match row.depth {
            0 => String::new(),
            d => format!("{}└─ ", "   ".repeat(d - 1)),
        };
        let _ = writeln!(out, "{indent}{}", one_line(&row.term));
    }
    out
}

pub fn summary(stats: &Statistics) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Number of LCSH terms in database: {}",
        intcomma(stats.terms).bold()
    );
    let unknown = || "(unknown)".to_string();
    let (issued, source, built) = match &stats.info {
        Some(info) => (
            info.issued.clone().unwrap_or_else(unknown),
            info.source.clone(),
            info.built_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        None => (unknown(), unknown(), unknown()),
    };
    let _ = writeln!(out, "Date of issue of LCSH terms: {issued}");
    let _ = writeln!(out, "Source of LCSH terms: {source}");
    let _ = writeln!(out, "Database built: {built}");
    let _ = writeln!(out, "Root terms: {}", intcomma(stats.roots));
    let _ = writeln!(out, "Terms with narrower terms: {}", intcomma(stats.with_narrower));
    let _ = writeln!(
        out,
        "Roots per term: max {}, mean {:.2}",
        stats.max_roots_per_term, stats.mean_roots_per_term
    );
    let _ = writeln!(
        out,
        "Validation records: {}, topic subdivisions: {}, genre/form: {}",
        intcomma(stats.validation_records),
        intcomma(stats.topic_subdivisions),
        intcomma(stats.genre_forms)
    );
    if stats.unresolved > 0 {
        let _ = writeln!(
            out,
            "{} {} terms have no topmost value (run `dassie rederive`)",
            "warning:".yellow().bold(),
            intcomma(stats.unresolved)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dassie_store::DbInfo;

    fn plain() {
        colored::control::set_override(false);
    }

    fn term(id: &str, label: &str) -> Term {
        Term::new(id, label)
    }

    #[test]
    fn test_intcomma() {
        assert_eq!(intcomma(0), "0");
        assert_eq!(intcomma(999), "999");
        assert_eq!(intcomma(1000), "1,000");
        assert_eq!(intcomma(1234567), "1,234,567");
    }

    #[test]
    fn test_paths_are_root_first_and_indented() {
        plain();
        let path = vec![
            term("sh3", "Biophysics"),
            term("sh2", "Physics"),
            term("sh1", "Science"),
        ];
        let text = paths(&[path]);
        assert_eq!(
            text,
            "sh1: Science\n└─ sh2: Physics\n   └─ sh3: Biophysics\n\n"
        );
    }

    #[test]
    fn test_describe_block() {
        plain();
        let mut t = term("sh2", "Physics").with_broader(["sh1"]);
        t.topmost = Topmost::Ancestors(["sh1".to_string()].into());
        t.note = Some("Here are entered works on physics.".to_string());
        let text = describe(&t);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sh2");
        assert_eq!(
            lines[1],
            "         URL: http://id.loc.gov/authorities/subjects/sh2.html"
        );
        assert_eq!(lines[2], "       label: Physics");
        assert_eq!(lines[3], "  alt labels: (none)");
        assert_eq!(lines[4], "    narrower: (none)");
        assert_eq!(lines[5], "     broader: sh1");
        assert_eq!(lines[6], "     topmost: sh1");
        assert_eq!(lines[7], "        note: Here are entered works on physics.");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn test_long_notes_wrap_under_the_field() {
        let note = "word ".repeat(40);
        let wrapped = wrap(note.trim());
        for line in wrapped.lines().skip(1) {
            assert!(line.starts_with(&" ".repeat(FIELD_WIDTH)));
        }
        assert!(wrapped.lines().all(|l| l.trim().len() <= NOTE_WIDTH));
    }

    #[test]
    fn test_summary_uses_thousands_separators() {
        plain();
        let stats = Statistics {
            terms: 451_234,
            roots: 12_000,
            info: Some(DbInfo {
                source: "lcsh.nt".to_string(),
                issued: Some("2016-04-01".to_string()),
                built_at: chrono::Utc::now(),
            }),
            ..Statistics::default()
        };
        let text = summary(&stats);
        assert!(text.contains("Number of LCSH terms in database: 451,234"));
        assert!(text.contains("Date of issue of LCSH terms: 2016-04-01"));
        assert!(text.contains("Source of LCSH terms: lcsh.nt"));
        assert!(text.contains("Root terms: 12,000"));
        assert!(!text.contains("warning"));
    }

    #[test]
    fn test_outline_indentation() {
        plain();
        let rows = vec![
            OutlineRow { depth: 0, term: term("sh1", "Science") },
            OutlineRow { depth: 1, term: term("sh2", "Physics") },
            OutlineRow { depth: 2, term: term("sh5", "Optics") },
        ];
        assert_eq!(
            outline(&rows),
            "sh1: Science\n└─ sh2: Physics\n   └─ sh5: Optics\n"
        );
    }
}
