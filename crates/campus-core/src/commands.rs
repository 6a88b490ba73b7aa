mod admin;
mod modifiers;
mod views;

use std::io::{self, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::{DataStore, SlotSource};
use crate::render::Renderer;
use crate::roster::{Class, Named, Subject, Teacher, resolve};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "today",
        "tomorrow",
        "week",
        "now",
        "bands",
        "class",
        "subject",
        "teacher",
        "slot",
        "export",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    dispatch_at(store, cfg, renderer, inv, Utc::now(), &mut out)
}

/// Runs one command against a fixed clock reading, writing to `out`.
#[instrument(skip(store, cfg, renderer, inv, now, out))]
pub fn dispatch_at<W: Write>(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    let args = inv.command_args.as_slice();

    debug!(command, ?args, "dispatching command");

    match command {
        "today" => views::cmd_day(store, cfg, renderer, "today", args, now, out),
        "tomorrow" => views::cmd_day(store, cfg, renderer, "tomorrow", args, now, out),
        "week" => views::cmd_week(store, cfg, renderer, args, out),
        "now" => views::cmd_now(store, cfg, renderer, args, now, out),
        "bands" => views::cmd_bands(renderer, out),
        "export" => views::cmd_export(store, cfg, args, out),
        "class" => admin::cmd_class(store, renderer, args, now, out),
        "subject" => admin::cmd_subject(store, renderer, args, now, out),
        "teacher" => admin::cmd_teacher(store, renderer, args, now, out),
        "slot" => admin::cmd_slot(store, cfg, renderer, args, now, out),
        "_commands" => {
            for name in known_command_names() {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }
        "_show" => {
            for (key, value) in cfg.iter() {
                writeln!(out, "{key}={value}")?;
            }
            Ok(())
        }
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Views: today [class], tomorrow [class], week [class], now [class] [--watch] [--ticks N], bands, export [class]"
    )?;
    writeln!(
        out,
        "Admin: class add|list|rename|delete, subject add|list|rename|delete|assign|unassign, teacher add|list|rename|delete, slot add|list|modify|delete"
    )?;
    writeln!(
        out,
        "Slot fields: class:<ref> subject:<ref> teacher:<ref> day:<name|0-6> time:HH:MM-HH:MM band:<n> start:HH:MM end:HH:MM room:<text>"
    )?;
    Ok(())
}

/// Classes, subjects and teachers loaded once per command so references
/// typed on the command line can be resolved.
#[derive(Debug, Clone)]
pub(crate) struct Roster {
    pub classes: Vec<Class>,
    pub subjects: Vec<Subject>,
    pub teachers: Vec<Teacher>,
}

impl Roster {
    pub fn load(store: &DataStore) -> anyhow::Result<Self> {
        Ok(Self {
            classes: store.load_classes()?,
            subjects: store.load_subjects()?,
            teachers: store.load_teachers()?,
        })
    }

    pub fn class(&self, reference: &str) -> anyhow::Result<&Class> {
        lookup(&self.classes, reference, "class")
    }

    pub fn subject(&self, reference: &str) -> anyhow::Result<&Subject> {
        lookup(&self.subjects, reference, "subject")
    }

    pub fn teacher(&self, reference: &str) -> anyhow::Result<&Teacher> {
        lookup(&self.teachers, reference, "teacher")
    }
}

fn lookup<'a, T: Named>(items: &'a [T], reference: &str, kind: &str) -> anyhow::Result<&'a T> {
    resolve(items, reference).ok_or_else(|| anyhow!("no {kind} matches '{reference}'"))
}

/// Picks the class a view is about: explicit argument, then the
/// `timetable.class` setting, then the first class by name.
pub(crate) fn select_class(
    source: &impl SlotSource,
    cfg: &Config,
    reference: Option<&str>,
) -> anyhow::Result<Class> {
    let classes = source.fetch_classes()?;
    if classes.is_empty() {
        return Err(anyhow!(
            "no classes configured yet; add one with `campus class add <name>`"
        ));
    }

    let configured = cfg.get("timetable.class");
    let wanted = reference
        .map(str::to_string)
        .or(configured)
        .filter(|value| !value.trim().is_empty());

    match wanted {
        Some(reference) => Ok(lookup(&classes, &reference, "class")?.clone()),
        None => classes
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no classes configured yet")),
    }
}

pub(crate) fn find_slot_index(
    slots: &[crate::slot::TimetableSlot],
    reference: &str,
) -> anyhow::Result<usize> {
    let needle = reference.trim().to_ascii_lowercase();
    if let Ok(uuid) = Uuid::parse_str(&needle) {
        return slots
            .iter()
            .position(|slot| slot.id == uuid)
            .ok_or_else(|| anyhow!("slot not found: {reference}"));
    }

    let matches: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| !needle.is_empty() && slot.id.simple().to_string().starts_with(&needle))
        .map(|(idx, _)| idx)
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("slot not found: {reference}")),
        [only] => Ok(*only),
        _ => Err(anyhow!("slot id prefix is ambiguous: {reference}")),
    }
}
