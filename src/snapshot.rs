//! Routine snapshot bundles: a zip holding the course dataset, the time
//! slot templates and a manifest with a sha256 of the course payload, so a
//! tampered or truncated bundle is refused before any state changes.

use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::model::{DefaultTimeSlot, SectionEntry};

const MANIFEST_ENTRY: &str = "manifest.json";
const COURSES_ENTRY: &str = "data/courses.json";
const SLOTS_ENTRY: &str = "data/timeslots.json";
pub const BUNDLE_FORMAT_V1: &str = "routine-snapshot-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub sections: usize,
    pub slots: usize,
    pub checksum: String,
}

#[derive(Debug)]
pub struct ImportedSnapshot {
    pub bundle_format_detected: String,
    pub entries: Vec<SectionEntry>,
    pub slots: Option<Vec<DefaultTimeSlot>>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn export_snapshot_bundle(
    entries: &[SectionEntry],
    slots: &[DefaultTimeSlot],
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let courses_text =
        serde_json::to_string_pretty(entries).context("failed to serialize course data")?;
    let slots_text =
        serde_json::to_string_pretty(slots).context("failed to serialize time slots")?;
    let checksum = sha256_hex(courses_text.as_bytes());

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "coursesSha256": checksum,
    });

    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(COURSES_ENTRY, opts)
        .context("failed to start course data entry")?;
    zip.write_all(courses_text.as_bytes())
        .context("failed to write course data entry")?;

    zip.start_file(SLOTS_ENTRY, opts)
        .context("failed to start time slot entry")?;
    zip.write_all(slots_text.as_bytes())
        .context("failed to write time slot entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        sections: entries.len(),
        slots: slots.len(),
        checksum,
    })
}

pub fn import_snapshot_bundle(in_path: &Path) -> anyhow::Result<ImportedSnapshot> {
    if !is_zip_file(in_path)? {
        return Err(anyhow!("not a snapshot bundle (zip signature missing)"));
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected_checksum = manifest
        .get("coursesSha256")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let mut courses_text = String::new();
    archive
        .by_name(COURSES_ENTRY)
        .context("bundle missing data/courses.json")?
        .read_to_string(&mut courses_text)
        .context("failed to read course data")?;
    let actual_checksum = sha256_hex(courses_text.as_bytes());
    if expected_checksum != actual_checksum {
        return Err(anyhow!(
            "bundle checksum mismatch: manifest {} != payload {}",
            expected_checksum,
            actual_checksum
        ));
    }

    let entries: Vec<SectionEntry> =
        serde_json::from_str(&courses_text).context("course data is invalid")?;

    let slots = match archive.by_name(SLOTS_ENTRY) {
        Ok(mut entry) => {
            let mut slots_text = String::new();
            entry
                .read_to_string(&mut slots_text)
                .context("failed to read time slots")?;
            Some(
                serde_json::from_str::<Vec<DefaultTimeSlot>>(&slots_text)
                    .context("time slot data is invalid")?,
            )
        }
        Err(_) => None,
    };

    Ok(ImportedSnapshot {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        entries,
        slots,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
