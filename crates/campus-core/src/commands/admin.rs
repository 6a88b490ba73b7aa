use std::io::Write;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use super::modifiers::{apply_draft, parse_slot_mods, resolve_draft, validate_slot};
use super::{Roster, find_slot_index, select_class};
use crate::config::Config;
use crate::datastore::{DataStore, SlotSource};
use crate::datetime::school_now;
use crate::render::Renderer;
use crate::roster::{Class, ClassSubject, Subject, Teacher};
use crate::slot::{TimeBand, TimetableSlot};

fn split_action(args: &[String]) -> (&str, &[String]) {
    match args.split_first() {
        Some((action, rest)) => (action.as_str(), rest),
        None => ("list", args),
    }
}

fn required_name(parts: &[String], what: &str) -> anyhow::Result<String> {
    let name = parts.join(" ").trim().to_string();
    if name.is_empty() {
        return Err(anyhow!("{what} name is required"));
    }
    Ok(name)
}

fn rename_args<'a>(args: &'a [String], what: &str) -> anyhow::Result<(&'a str, String)> {
    let (reference, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("{what} rename requires <ref> <new name>"))?;
    Ok((reference.as_str(), required_name(rest, what)?))
}

fn ensure_unique_name<'a, I>(existing: I, name: &str, what: &str) -> anyhow::Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    if existing
        .into_iter()
        .any(|other| other.eq_ignore_ascii_case(name))
    {
        return Err(anyhow!("{what} already exists: {name}"));
    }
    Ok(())
}

#[instrument(skip(store, renderer, args, now, out))]
pub(super) fn cmd_class<W: Write>(
    store: &DataStore,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let (action, rest) = split_action(args);
    info!(action, "command class");

    match action {
        "add" => {
            let name = required_name(rest, "class")?;
            let mut classes = store.load_classes()?;
            ensure_unique_name(classes.iter().map(|c| c.name.as_str()), &name, "class")?;
            let class = Class::new(name, now);
            let created = format!("Created class {} ({}).", class.name, short(&class.id));
            classes.push(class);
            store.save_classes(&classes)?;
            writeln!(out, "{created}")?;
            Ok(())
        }
        "list" => {
            let classes = store.load_classes()?;
            let slots = store.load_slots()?;
            let rows = classes
                .iter()
                .map(|class| {
                    let count = slots.iter().filter(|slot| slot.class_id == class.id).count();
                    vec![short(&class.id), class.name.clone(), count.to_string()]
                })
                .collect();
            renderer.write_rows(out, &["ID", "Name", "Slots"], rows)
        }
        "rename" => {
            let (reference, name) = rename_args(rest, "class")?;
            let roster = Roster::load(store)?;
            let id = roster.class(reference)?.id;
            let mut classes = roster.classes;
            ensure_unique_name(
                classes.iter().filter(|c| c.id != id).map(|c| c.name.as_str()),
                &name,
                "class",
            )?;
            for class in classes.iter_mut().filter(|class| class.id == id) {
                class.name = name.clone();
                class.updated_at = now;
            }
            store.save_classes(&classes)?;
            writeln!(out, "Renamed class to {name}.")?;
            Ok(())
        }
        "delete" => {
            let reference = rest
                .first()
                .ok_or_else(|| anyhow!("class delete requires <ref>"))?;
            let id = Roster::load(store)?.class(reference)?.id;
            let removed = store.delete_class(id)?;
            writeln!(out, "Deleted class {}.", removed.name)?;
            Ok(())
        }
        other => Err(anyhow!("unknown class action: {other} (add, list, rename, delete)")),
    }
}

#[instrument(skip(store, renderer, args, now, out))]
pub(super) fn cmd_subject<W: Write>(
    store: &DataStore,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let (action, rest) = split_action(args);
    info!(action, "command subject");

    match action {
        "add" => {
            let name = required_name(rest, "subject")?;
            let mut subjects = store.load_subjects()?;
            ensure_unique_name(subjects.iter().map(|s| s.name.as_str()), &name, "subject")?;
            let subject = Subject::new(name, now);
            let created = format!("Created subject {} ({}).", subject.name, short(&subject.id));
            subjects.push(subject);
            store.save_subjects(&subjects)?;
            writeln!(out, "{created}")?;
            Ok(())
        }
        "list" => {
            let roster = Roster::load(store)?;
            let links = store.load_class_subjects()?;
            let subjects: Vec<&Subject> = match rest.first() {
                Some(reference) => {
                    let class_id = roster.class(reference)?.id;
                    roster
                        .subjects
                        .iter()
                        .filter(|subject| {
                            links
                                .iter()
                                .any(|link| link.class_id == class_id && link.subject_id == subject.id)
                        })
                        .collect()
                }
                None => roster.subjects.iter().collect(),
            };
            let rows = subjects
                .into_iter()
                .map(|subject| {
                    let classes: Vec<&str> = roster
                        .classes
                        .iter()
                        .filter(|class| {
                            links
                                .iter()
                                .any(|link| link.class_id == class.id && link.subject_id == subject.id)
                        })
                        .map(|class| class.name.as_str())
                        .collect();
                    vec![short(&subject.id), subject.name.clone(), classes.join(", ")]
                })
                .collect();
            renderer.write_rows(out, &["ID", "Name", "Classes"], rows)
        }
        "rename" => {
            let (reference, name) = rename_args(rest, "subject")?;
            let roster = Roster::load(store)?;
            let id = roster.subject(reference)?.id;
            let mut subjects = roster.subjects;
            ensure_unique_name(
                subjects.iter().filter(|s| s.id != id).map(|s| s.name.as_str()),
                &name,
                "subject",
            )?;
            for subject in subjects.iter_mut().filter(|subject| subject.id == id) {
                subject.name = name.clone();
                subject.updated_at = now;
            }
            store.save_subjects(&subjects)?;
            writeln!(out, "Renamed subject to {name}.")?;
            Ok(())
        }
        "delete" => {
            let reference = rest
                .first()
                .ok_or_else(|| anyhow!("subject delete requires <ref>"))?;
            let id = Roster::load(store)?.subject(reference)?.id;
            let removed = store.delete_subject(id)?;
            writeln!(out, "Deleted subject {}.", removed.name)?;
            Ok(())
        }
        "assign" | "unassign" => {
            let [subject_ref, class_ref] = rest else {
                return Err(anyhow!("subject {action} requires <subject> <class>"));
            };
            let roster = Roster::load(store)?;
            let subject = roster.subject(subject_ref)?;
            let class = roster.class(class_ref)?;
            let mut links = store.load_class_subjects()?;
            let existing = links
                .iter()
                .position(|link| link.class_id == class.id && link.subject_id == subject.id);

            let message = match (action, existing) {
                ("assign", Some(_)) => {
                    return Err(anyhow!(
                        "{} is already assigned to {}",
                        subject.name,
                        class.name
                    ));
                }
                ("assign", None) => {
                    links.push(ClassSubject::new(class.id, subject.id, now));
                    format!("Assigned {} to {}.", subject.name, class.name)
                }
                (_, Some(idx)) => {
                    links.remove(idx);
                    format!("Removed {} from {}.", subject.name, class.name)
                }
                (_, None) => {
                    return Err(anyhow!(
                        "{} is not assigned to {}",
                        subject.name,
                        class.name
                    ));
                }
            };
            store.save_class_subjects(&links)?;
            writeln!(out, "{message}")?;
            Ok(())
        }
        other => Err(anyhow!(
            "unknown subject action: {other} (add, list, rename, delete, assign, unassign)"
        )),
    }
}

#[instrument(skip(store, renderer, args, now, out))]
pub(super) fn cmd_teacher<W: Write>(
    store: &DataStore,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let (action, rest) = split_action(args);
    info!(action, "command teacher");

    match action {
        "add" => {
            let mut email = None;
            let mut name_parts = Vec::new();
            for part in rest {
                match part.strip_prefix("email:") {
                    Some(value) if !value.trim().is_empty() => email = Some(value.trim().to_string()),
                    _ => name_parts.push(part.clone()),
                }
            }
            let name = required_name(&name_parts, "teacher")?;
            let mut teachers = store.load_teachers()?;
            ensure_unique_name(
                teachers.iter().map(|t| t.full_name.as_str()),
                &name,
                "teacher",
            )?;
            let mut teacher = Teacher::new(name, now);
            teacher.email = email;
            let created = format!("Created teacher {} ({}).", teacher.full_name, short(&teacher.id));
            teachers.push(teacher);
            store.save_teachers(&teachers)?;
            writeln!(out, "{created}")?;
            Ok(())
        }
        "list" => {
            let teachers = store.load_teachers()?;
            let rows = teachers
                .iter()
                .map(|teacher| {
                    vec![
                        short(&teacher.id),
                        teacher.full_name.clone(),
                        teacher.email.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            renderer.write_rows(out, &["ID", "Name", "Email"], rows)
        }
        "rename" => {
            let (reference, name) = rename_args(rest, "teacher")?;
            let roster = Roster::load(store)?;
            let id = roster.teacher(reference)?.id;
            let mut teachers = roster.teachers;
            ensure_unique_name(
                teachers.iter().filter(|t| t.id != id).map(|t| t.full_name.as_str()),
                &name,
                "teacher",
            )?;
            for teacher in teachers.iter_mut().filter(|teacher| teacher.id == id) {
                teacher.full_name = name.clone();
                teacher.updated_at = now;
            }
            store.save_teachers(&teachers)?;
            writeln!(out, "Renamed teacher to {name}.")?;
            Ok(())
        }
        "delete" => {
            let reference = rest
                .first()
                .ok_or_else(|| anyhow!("teacher delete requires <ref>"))?;
            let id = Roster::load(store)?.teacher(reference)?.id;
            let removed = store.delete_teacher(id)?;
            writeln!(out, "Deleted teacher {}.", removed.full_name)?;
            Ok(())
        }
        other => Err(anyhow!("unknown teacher action: {other} (add, list, rename, delete)")),
    }
}

#[instrument(skip(store, cfg, renderer, args, now, out))]
pub(super) fn cmd_slot<W: Write>(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let (action, rest) = split_action(args);
    info!(action, "command slot");

    match action {
        "add" => slot_add(store, cfg, rest, now, out),
        "list" => {
            let slots = match rest.first().map(String::as_str) {
                None | Some("all") => store.fetch_all_slots()?,
                Some(_) => {
                    let class = select_class(store, cfg, Some(rest.join(" ").as_str()))?;
                    store.fetch_slots_for_class(class.id)?
                }
            };
            renderer.write_slot_list(out, &slots)
        }
        "modify" => {
            let (reference, fields) = rest
                .split_first()
                .ok_or_else(|| anyhow!("slot modify requires <id> <field:value>..."))?;
            if fields.is_empty() {
                return Err(anyhow!("slot modify: nothing to change"));
            }
            let roster = Roster::load(store)?;
            let mods = parse_slot_mods(fields, school_now(now))?;
            let draft = resolve_draft(&roster, &mods)?;

            let mut slots = store.load_slots()?;
            let idx = find_slot_index(&slots, reference)?;
            let mut updated = slots[idx].clone();
            apply_draft(&mut updated, &draft, now);
            validate_slot(&updated)?;
            warn_if_unassigned(store, &updated)?;

            let message = format!(
                "Modified slot {} ({} {}).",
                updated.short_id(),
                updated.day_of_week.name(),
                updated.band()
            );
            slots[idx] = updated;
            store.save_slots(&slots)?;
            writeln!(out, "{message}")?;
            Ok(())
        }
        "delete" => {
            let reference = rest
                .first()
                .ok_or_else(|| anyhow!("slot delete requires <id>"))?;
            let mut slots = store.load_slots()?;
            let idx = find_slot_index(&slots, reference)?;
            let removed = slots.remove(idx);
            store.save_slots(&slots)?;
            writeln!(out, "Deleted slot {}.", removed.short_id())?;
            Ok(())
        }
        other => Err(anyhow!("unknown slot action: {other} (add, list, modify, delete)")),
    }
}

fn slot_add<W: Write>(
    store: &DataStore,
    cfg: &Config,
    fields: &[String],
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let roster = Roster::load(store)?;
    let mods = parse_slot_mods(fields, school_now(now))?;
    let draft = resolve_draft(&roster, &mods)?;

    let class_id = match draft.class_id {
        Some(id) => id,
        None => select_class(store, cfg, None)?.id,
    };
    let subject_id = draft
        .subject_id
        .ok_or_else(|| anyhow!("slot add: subject:<ref> is required"))?;
    let day = draft
        .day
        .ok_or_else(|| anyhow!("slot add: day:<name|0-6> is required"))?;
    let (Some(start), Some(end)) = (draft.start, draft.end) else {
        return Err(anyhow!(
            "slot add: a time is required (time:HH:MM-HH:MM, band:<n>, or start:/end:)"
        ));
    };

    let mut slot = TimetableSlot::new(class_id, subject_id, day, TimeBand::new(start, end), now);
    apply_draft(&mut slot, &draft, now);
    validate_slot(&slot)?;
    warn_if_unassigned(store, &slot)?;

    let mut slots = store.load_slots()?;
    let message = format!(
        "Created slot {} ({} {}).",
        slot.short_id(),
        slot.day_of_week.name(),
        slot.band()
    );
    slots.push(slot);
    store.save_slots(&slots)?;
    writeln!(out, "{message}")?;
    Ok(())
}

fn warn_if_unassigned(store: &DataStore, slot: &TimetableSlot) -> anyhow::Result<()> {
    let links = store.load_class_subjects()?;
    let class_has_links = links.iter().any(|link| link.class_id == slot.class_id);
    let assigned = links
        .iter()
        .any(|link| link.class_id == slot.class_id && link.subject_id == slot.subject_id);
    if class_has_links && !assigned {
        warn!(
            class = %slot.class_id,
            subject = %slot.subject_id,
            "subject is not assigned to this class"
        );
    }
    Ok(())
}

fn short(id: &uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
