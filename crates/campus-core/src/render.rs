use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDateTime;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::slot::TimetableSlot;
use crate::timetable::{StatusKind, WeeklyGrid, status_for_today};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// One day's slots in order. With `now` set, a status column shows the
    /// live countdown for slots that fall on `now`'s weekday.
    #[tracing::instrument(skip(self, out, slots, now))]
    pub fn write_day<W: Write>(
        &self,
        out: &mut W,
        slots: &[&TimetableSlot],
        now: Option<NaiveDateTime>,
    ) -> anyhow::Result<()> {
        if slots.is_empty() {
            writeln!(out, "No classes scheduled.")?;
            return Ok(());
        }

        let mut headers = vec![
            "Time".to_string(),
            "Subject".to_string(),
            "Teacher".to_string(),
            "Room".to_string(),
        ];
        if now.is_some() {
            headers.push("Status".to_string());
        }

        let mut rows = Vec::with_capacity(slots.len());
        for slot in slots {
            let mut row = vec![
                self.paint(&slot.band().to_string(), "33"),
                slot.subject_label().to_string(),
                slot.teacher_name.clone().unwrap_or_default(),
                slot.classroom.clone().unwrap_or_default(),
            ];
            if let Some(now) = now {
                let cell = match status_for_today(slot, now) {
                    Some(status) => {
                        let code = match status.kind {
                            StatusKind::Upcoming => "36",
                            StatusKind::Ongoing => "32",
                            StatusKind::Finished => "2",
                        };
                        self.paint(&status.to_string(), code)
                    }
                    None => String::new(),
                };
                row.push(cell);
            }
            rows.push(row);
        }

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, out, grid))]
    pub fn write_week<W: Write>(&self, out: &mut W, grid: &WeeklyGrid<'_>) -> anyhow::Result<()> {
        if grid.is_empty() {
            writeln!(out, "No classes scheduled.")?;
            return Ok(());
        }

        let mut headers = vec!["Time".to_string()];
        headers.extend(grid.days.iter().map(|day| day.name().to_string()));

        let mut rows = Vec::with_capacity(grid.bands.len());
        for band in &grid.bands {
            let mut row = vec![self.paint(&band.to_string(), "33")];
            for day in &grid.days {
                let cell = grid
                    .cell(*band, *day)
                    .map(|slot| match &slot.classroom {
                        Some(room) => format!("{} ({room})", slot.subject_label()),
                        None => slot.subject_label().to_string(),
                    })
                    .unwrap_or_else(|| "-".to_string());
                row.push(cell);
            }
            rows.push(row);
        }

        write_table(&mut *out, headers, rows)?;

        for collision in &grid.collisions {
            writeln!(
                out,
                "{} {} {}: {} hides {} ({})",
                self.paint("clash", "31"),
                collision.day.name(),
                collision.band,
                collision.kept.subject_label(),
                collision.displaced.subject_label(),
                collision.displaced.short_id(),
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, out, slots))]
    pub fn write_slot_list<W: Write>(
        &self,
        out: &mut W,
        slots: &[TimetableSlot],
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Class".to_string(),
            "Day".to_string(),
            "Time".to_string(),
            "Subject".to_string(),
            "Teacher".to_string(),
            "Room".to_string(),
        ];

        let rows = slots
            .iter()
            .map(|slot| {
                vec![
                    self.paint(&slot.short_id(), "33"),
                    slot.class_name.clone().unwrap_or_default(),
                    slot.day_of_week.short_name().to_string(),
                    slot.band().to_string(),
                    slot.subject_label().to_string(),
                    slot.teacher_name.clone().unwrap_or_default(),
                    slot.classroom.clone().unwrap_or_default(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_rows<W: Write>(
        &self,
        out: &mut W,
        headers: &[&str],
        rows: Vec<Vec<String>>,
    ) -> anyhow::Result<()> {
        let headers = headers.iter().map(|h| h.to_string()).collect();
        write_table(out, headers, rows)
    }

    pub fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = row.get(idx).map(String::as_str).unwrap_or_default();
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
