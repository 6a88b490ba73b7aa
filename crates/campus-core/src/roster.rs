use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::compact_date_serde;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Class {
    pub id: Uuid,

    pub name: String,

    #[serde(with = "compact_date_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "compact_date_serde")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: Uuid,

    pub name: String,

    #[serde(with = "compact_date_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "compact_date_serde")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Teacher {
    pub id: Uuid,

    pub full_name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(with = "compact_date_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "compact_date_serde")]
    pub updated_at: DateTime<Utc>,
}

/// Assignment of a subject to a class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassSubject {
    pub id: Uuid,

    pub class_id: Uuid,

    pub subject_id: Uuid,

    #[serde(with = "compact_date_serde")]
    pub created_at: DateTime<Utc>,
}

/// Anything in the roster that can be looked up by id or by name.
pub trait Named {
    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
}

impl Class {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Subject {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Teacher {
    pub fn new(full_name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name,
            email: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl ClassSubject {
    pub fn new(class_id: Uuid, subject_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_id,
            subject_id,
            created_at: now,
        }
    }
}

impl Named for Class {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Subject {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Teacher {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.full_name
    }
}

/// Resolves a user-supplied reference: full UUID, unique UUID prefix, or
/// case-insensitive exact name.
pub fn resolve<'a, T: Named>(items: &'a [T], reference: &str) -> Option<&'a T> {
    let needle = reference.trim();
    if needle.is_empty() {
        return None;
    }

    if let Ok(uuid) = Uuid::parse_str(needle) {
        return items.iter().find(|item| item.id() == uuid);
    }

    if let Some(found) = items
        .iter()
        .find(|item| item.name().eq_ignore_ascii_case(needle))
    {
        return Some(found);
    }

    let prefix = needle.to_ascii_lowercase();
    if prefix.len() < 4 || !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        return None;
    }

    let mut matches = items
        .iter()
        .filter(|item| item.id().to_string().starts_with(&prefix));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

pub fn sort_by_name<T: Named>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.id().cmp(&b.id()))
    });
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Class, resolve, sort_by_name};

    #[test]
    fn resolves_by_name_uuid_and_prefix() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 16, 8, 0, 0)
            .single()
            .expect("valid now");
        let mut classes = vec![
            Class::new("Grade 10B".to_string(), now),
            Class::new("grade 10a".to_string(), now),
        ];
        sort_by_name(&mut classes);
        assert_eq!(classes[0].name, "grade 10a");

        let by_name = resolve(&classes, "GRADE 10A").expect("resolve by name");
        assert_eq!(by_name.id, classes[0].id);

        let full = classes[1].id.to_string();
        let by_uuid = resolve(&classes, &full).expect("resolve by uuid");
        assert_eq!(by_uuid.name, "Grade 10B");

        let by_prefix = resolve(&classes, &full[..8]).expect("resolve by prefix");
        assert_eq!(by_prefix.id, classes[1].id);

        assert!(resolve(&classes, "Grade 11").is_none());
        assert!(resolve(&classes, "").is_none());
    }
}
