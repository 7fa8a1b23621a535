//! Row-ordered batch generation.
//!
//! One pass over the roster produces either a zip of JPEG cards or a single document. The first
//! failing card aborts the pass; nothing partial is returned.

use anyhow::{anyhow, Context};
use image::DynamicImage;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assets::BrandAssets;
use crate::photos::{PhotoIndex, PhotoSource};
use crate::render::card::{CardContent, SchoolIdentity};
use crate::render::docx::DocxBuilder;
use crate::render::raster::{render_card_jpeg, CardImages, FontBook};
use crate::roster::{Roster, StudentRecord};
use crate::schedule::ScheduleEntry;
use crate::template::Template;

const UNNAMED_ENTRY: &str = "Siswa";

/// Everything a pass reads. Borrowed for the whole pass, so nothing can change underneath it.
#[derive(Clone, Copy)]
pub struct RenderInputs<'a> {
    pub roster: &'a Roster,
    pub template: Template,
    pub school: &'a SchoolIdentity,
    pub brand: &'a BrandAssets,
    pub photos: &'a PhotoIndex,
    pub schedule: &'a [ScheduleEntry],
    pub fonts: &'a FontBook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardOutcome {
    pub row: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_name: Option<String>,
    pub photo: PhotoSource,
    pub photo_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchArchive {
    pub bytes: Vec<u8>,
    /// Entry names in archive order.
    pub entry_names: Vec<String>,
    pub outcomes: Vec<CardOutcome>,
    /// Cards whose name was already taken and which replaced the earlier entry.
    pub collisions: usize,
}

#[derive(Debug, Clone)]
pub struct BatchDocument {
    pub bytes: Vec<u8>,
    pub cards: usize,
    pub page_breaks: usize,
    pub outcomes: Vec<CardOutcome>,
}

/// `"{name}.jpg"` with the trimmed display name; path separators become `_`.
pub fn archive_entry_name(display_name: &str) -> String {
    let trimmed = display_name.trim();
    let base = if trimmed.is_empty() {
        UNNAMED_ENTRY
    } else {
        trimmed
    };
    format!("{}.jpg", base.replace(['/', '\\'], "_"))
}

struct Prepared<'a> {
    content: CardContent,
    outcome: CardOutcome,
    photo: Option<&'a DynamicImage>,
}

fn prepare<'a>(inputs: &RenderInputs<'a>, record: &StudentRecord) -> Prepared<'a> {
    let content = CardContent::build(record, inputs.template, inputs.school, inputs.schedule);
    let primary = record.primary_id();
    let fallback = record.fallback_id();
    let found = inputs.photos.resolve(&primary, &fallback);
    let source = found.source;
    let key = found.key.map(str::to_string);

    let photos: &'a PhotoIndex = inputs.photos;
    let photo = key.as_deref().and_then(|k| photos.get(k));
    if source == PhotoSource::Placeholder {
        tracing::debug!(row = record.row(), "no photo indexed; placeholder drawn");
    }

    Prepared {
        outcome: CardOutcome {
            row: record.row(),
            name: content.display_name.clone(),
            entry_name: None,
            photo: source,
            photo_key: key,
        },
        content,
        photo,
    }
}

fn card_images<'a>(inputs: &RenderInputs<'a>, photo: Option<&'a DynamicImage>) -> CardImages<'a> {
    let brand: &'a BrandAssets = inputs.brand;
    CardImages {
        photo,
        logo: brand.logo.as_ref(),
        signature: brand.signature.as_ref(),
    }
}

/// Render one card as JPEG, e.g. for the UI preview.
pub fn render_preview(
    inputs: &RenderInputs<'_>,
    index: usize,
) -> anyhow::Result<(Vec<u8>, CardOutcome)> {
    let record = inputs
        .roster
        .records()
        .get(index)
        .ok_or_else(|| anyhow!("no student at index {}", index))?;
    let p = prepare(inputs, record);
    let jpeg = render_card_jpeg(
        &p.content,
        inputs.template,
        &card_images(inputs, p.photo),
        inputs.fonts,
    )
    .with_context(|| format!("failed to render card for row {}", record.row()))?;
    Ok((jpeg, p.outcome))
}

pub fn render_zip(
    inputs: &RenderInputs<'_>,
    progress: &mut dyn FnMut(usize, usize),
) -> anyhow::Result<BatchArchive> {
    let records = inputs.roster.records();
    let total = records.len();
    let mut entries: Vec<(String, Vec<u8>)> = Vec::with_capacity(total);
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut outcomes = Vec::with_capacity(total);
    let mut collisions = 0usize;

    for (i, record) in records.iter().enumerate() {
        let mut p = prepare(inputs, record);
        let jpeg = render_card_jpeg(
            &p.content,
            inputs.template,
            &card_images(inputs, p.photo),
            inputs.fonts,
        )
        .with_context(|| format!("failed to render card for row {}", record.row()))?;

        let name = archive_entry_name(&p.content.display_name);
        match slots.get(&name) {
            Some(&at) => {
                tracing::warn!(entry = %name, row = record.row(), "duplicate card name; earlier card replaced");
                entries[at].1 = jpeg;
                collisions += 1;
            }
            None => {
                slots.insert(name.clone(), entries.len());
                entries.push((name.clone(), jpeg));
            }
        }
        p.outcome.entry_name = Some(name);
        outcomes.push(p.outcome);
        progress(i + 1, total);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in &entries {
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start archive entry {}", name))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write archive entry {}", name))?;
    }
    let bytes = zip
        .finish()
        .context("failed to finalize card archive")?
        .into_inner();

    tracing::info!(
        cards = total,
        entries = entries.len(),
        collisions,
        template = inputs.template.id(),
        "card archive rendered"
    );
    Ok(BatchArchive {
        bytes,
        entry_names: entries.into_iter().map(|(n, _)| n).collect(),
        outcomes,
        collisions,
    })
}

pub fn render_docx(
    inputs: &RenderInputs<'_>,
    progress: &mut dyn FnMut(usize, usize),
) -> anyhow::Result<BatchDocument> {
    let records = inputs.roster.records();
    let total = records.len();
    let mut builder = DocxBuilder::new(inputs.template, inputs.brand);
    let mut outcomes = Vec::with_capacity(total);

    for (i, record) in records.iter().enumerate() {
        let p = prepare(inputs, record);
        builder
            .push_card(&p.content, p.photo)
            .with_context(|| format!("failed to lay out card for row {}", record.row()))?;
        outcomes.push(p.outcome);
        progress(i + 1, total);
    }

    let cards = builder.cards();
    let page_breaks = builder.page_breaks();
    let bytes = builder.finish()?;
    tracing::info!(
        cards,
        page_breaks,
        template = inputs.template.id(),
        "card document rendered"
    );
    Ok(BatchDocument {
        bytes,
        cards,
        page_breaks,
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_are_trimmed_and_safe() {
        assert_eq!(archive_entry_name("  Siti Aminah "), "Siti Aminah.jpg");
        assert_eq!(archive_entry_name("   "), "Siswa.jpg");
        assert_eq!(archive_entry_name("A/B\\C"), "A_B_C.jpg");
    }
}
