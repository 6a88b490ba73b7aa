use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::roster::{Class, ClassSubject, Named, Subject, Teacher, sort_by_name};
use crate::slot::TimetableSlot;

/// Read side of the timetable store, as seen by the views.
///
/// Slots come back with their class, subject and teacher names filled in
/// and ordered by class, day and start time.
pub trait SlotSource {
    fn fetch_classes(&self) -> anyhow::Result<Vec<Class>>;

    fn fetch_all_slots(&self) -> anyhow::Result<Vec<TimetableSlot>>;

    fn fetch_slots_for_class(&self, class_id: Uuid) -> anyhow::Result<Vec<TimetableSlot>> {
        Ok(self
            .fetch_all_slots()?
            .into_iter()
            .filter(|slot| slot.class_id == class_id)
            .collect())
    }
}

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub classes_path: PathBuf,
    pub subjects_path: PathBuf,
    pub teachers_path: PathBuf,
    pub class_subjects_path: PathBuf,
    pub slots_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let classes_path = data_dir.join("classes.data");
        let subjects_path = data_dir.join("subjects.data");
        let teachers_path = data_dir.join("teachers.data");
        let class_subjects_path = data_dir.join("class_subjects.data");
        let slots_path = data_dir.join("slots.data");

        for path in [
            &classes_path,
            &subjects_path,
            &teachers_path,
            &class_subjects_path,
            &slots_path,
        ] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            classes = %classes_path.display(),
            subjects = %subjects_path.display(),
            teachers = %teachers_path.display(),
            slots = %slots_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            classes_path,
            subjects_path,
            teachers_path,
            class_subjects_path,
            slots_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_classes(&self) -> anyhow::Result<Vec<Class>> {
        let mut classes: Vec<Class> =
            load_jsonl(&self.classes_path).context("failed to load classes.data")?;
        sort_by_name(&mut classes);
        Ok(classes)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        let mut subjects: Vec<Subject> =
            load_jsonl(&self.subjects_path).context("failed to load subjects.data")?;
        sort_by_name(&mut subjects);
        Ok(subjects)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_teachers(&self) -> anyhow::Result<Vec<Teacher>> {
        let mut teachers: Vec<Teacher> =
            load_jsonl(&self.teachers_path).context("failed to load teachers.data")?;
        sort_by_name(&mut teachers);
        Ok(teachers)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_class_subjects(&self) -> anyhow::Result<Vec<ClassSubject>> {
        load_jsonl(&self.class_subjects_path).context("failed to load class_subjects.data")
    }

    /// Raw slot rows as stored, without display names.
    #[tracing::instrument(skip(self))]
    pub fn load_slots(&self) -> anyhow::Result<Vec<TimetableSlot>> {
        load_jsonl(&self.slots_path).context("failed to load slots.data")
    }

    #[tracing::instrument(skip(self, classes))]
    pub fn save_classes(&self, classes: &[Class]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.classes_path, classes).context("failed to save classes.data")
    }

    #[tracing::instrument(skip(self, subjects))]
    pub fn save_subjects(&self, subjects: &[Subject]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.subjects_path, subjects).context("failed to save subjects.data")
    }

    #[tracing::instrument(skip(self, teachers))]
    pub fn save_teachers(&self, teachers: &[Teacher]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.teachers_path, teachers).context("failed to save teachers.data")
    }

    #[tracing::instrument(skip(self, links))]
    pub fn save_class_subjects(&self, links: &[ClassSubject]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.class_subjects_path, links)
            .context("failed to save class_subjects.data")
    }

    #[tracing::instrument(skip(self, slots))]
    pub fn save_slots(&self, slots: &[TimetableSlot]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.slots_path, slots).context("failed to save slots.data")
    }

    #[tracing::instrument(skip(self), fields(class = %class_id))]
    pub fn delete_class(&self, class_id: Uuid) -> anyhow::Result<Class> {
        let mut classes = self.load_classes()?;
        let idx = classes
            .iter()
            .position(|class| class.id == class_id)
            .ok_or_else(|| anyhow!("class not found: {class_id}"))?;
        let removed = classes.remove(idx);

        let mut slots = self.load_slots()?;
        let slots_before = slots.len();
        slots.retain(|slot| slot.class_id != class_id);

        let mut links = self.load_class_subjects()?;
        links.retain(|link| link.class_id != class_id);

        self.save_slots(&slots)?;
        self.save_class_subjects(&links)?;
        self.save_classes(&classes)?;

        info!(
            class = %removed.name,
            removed_slots = slots_before - slots.len(),
            "deleted class"
        );
        Ok(removed)
    }

    #[tracing::instrument(skip(self), fields(subject = %subject_id))]
    pub fn delete_subject(&self, subject_id: Uuid) -> anyhow::Result<Subject> {
        let mut subjects = self.load_subjects()?;
        let idx = subjects
            .iter()
            .position(|subject| subject.id == subject_id)
            .ok_or_else(|| anyhow!("subject not found: {subject_id}"))?;
        let removed = subjects.remove(idx);

        let mut slots = self.load_slots()?;
        let slots_before = slots.len();
        slots.retain(|slot| slot.subject_id != subject_id);

        let mut links = self.load_class_subjects()?;
        links.retain(|link| link.subject_id != subject_id);

        self.save_slots(&slots)?;
        self.save_class_subjects(&links)?;
        self.save_subjects(&subjects)?;

        info!(
            subject = %removed.name,
            removed_slots = slots_before - slots.len(),
            "deleted subject"
        );
        Ok(removed)
    }

    #[tracing::instrument(skip(self), fields(teacher = %teacher_id))]
    pub fn delete_teacher(&self, teacher_id: Uuid) -> anyhow::Result<Teacher> {
        let mut teachers = self.load_teachers()?;
        let idx = teachers
            .iter()
            .position(|teacher| teacher.id == teacher_id)
            .ok_or_else(|| anyhow!("teacher not found: {teacher_id}"))?;
        let removed = teachers.remove(idx);

        let mut slots = self.load_slots()?;
        let mut cleared = 0_usize;
        for slot in &mut slots {
            if slot.teacher_id == Some(teacher_id) {
                slot.teacher_id = None;
                cleared += 1;
            }
        }

        self.save_slots(&slots)?;
        self.save_teachers(&teachers)?;

        info!(teacher = %removed.full_name, cleared, "deleted teacher");
        Ok(removed)
    }
}

impl SlotSource for DataStore {
    fn fetch_classes(&self) -> anyhow::Result<Vec<Class>> {
        self.load_classes()
    }

    #[tracing::instrument(skip(self))]
    fn fetch_all_slots(&self) -> anyhow::Result<Vec<TimetableSlot>> {
        let class_names = names_by_id(&self.load_classes()?);
        let subject_names = names_by_id(&self.load_subjects()?);
        let teacher_names = names_by_id(&self.load_teachers()?);

        let mut slots = self.load_slots()?;
        for slot in &mut slots {
            slot.class_name = class_names.get(&slot.class_id).cloned();
            slot.subject_name = subject_names.get(&slot.subject_id).cloned();
            slot.teacher_name = slot
                .teacher_id
                .and_then(|id| teacher_names.get(&id).cloned());
        }

        slots.sort_by(|a, b| {
            a.class_name
                .cmp(&b.class_name)
                .then_with(|| a.class_id.cmp(&b.class_id))
                .then_with(|| a.day_of_week.cmp(&b.day_of_week))
                .then_with(|| a.start_time.cmp(&b.start_time))
                .then_with(|| a.end_time.cmp(&b.end_time))
        });

        debug!(count = slots.len(), "joined slot rows");
        Ok(slots)
    }
}

fn names_by_id<T: Named>(items: &[T]) -> HashMap<Uuid, String> {
    items
        .iter()
        .map(|item| (item.id(), item.name().to_string()))
        .collect()
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(row);
    }

    debug!(count = out.len(), "loaded rows from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, rows))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = rows.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for row in rows {
        let serialized = serde_json::to_string(row)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
