//! # Artifact Packager
//!
//! Packs rendered tickets into one ZIP bundle with a CSV manifest.
//!
//! ```text
//! tickets.zip
//! ├── Alice_ticket.png
//! ├── Bob_ticket.png
//! ├── Alice_2_ticket.png      second "Alice" in the roster
//! └── manifest.csv            name,token,filename  (issuance order)
//! ```
//!
//! Packing is pure: the same credentials always produce the same entries.
//! Exporting replaces any previous `tickets.zip` in the output directory.

use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::batch::Credential;
use crate::error::{PackError, PackResult};

/// Archive file name written by [`Bundle::write_to`].
pub const BUNDLE_FILENAME: &str = "tickets.zip";

/// Manifest entry name inside the archive.
pub const MANIFEST_FILENAME: &str = "manifest.csv";

const TICKET_SUFFIX: &str = "_ticket.png";
const MAX_STEM_CHARS: usize = 64;

/// One manifest row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRow {
    pub name: String,
    pub token: String,
    pub filename: String,
}

/// Reduces a display name to a portable file stem.
///
/// Letters and digits of any script are kept, whitespace runs become `_`,
/// anything else is dropped.
pub fn sanitize(name: &str) -> String {
    let mut stem = String::new();
    let mut pending_sep = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '-' {
            if pending_sep && !stem.is_empty() {
                stem.push('_');
            }
            pending_sep = false;
            stem.push(ch);
        } else if ch.is_whitespace() || ch == '_' {
            pending_sep = true;
        }
        if stem.chars().count() >= MAX_STEM_CHARS {
            break;
        }
    }

    if stem.is_empty() {
        "attendee".to_string()
    } else {
        stem
    }
}

/// Hands out collision-free ticket file names in call order.
#[derive(Debug, Default)]
pub struct FilenameAllocator {
    used: HashSet<String>,
}

impl FilenameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<stem>_ticket.png`, or `<stem>_2_ticket.png`, `<stem>_3_ticket.png`
    /// if taken. Comparison ignores case so bundles unpack cleanly on
    /// case-insensitive file systems.
    pub fn allocate(&mut self, name: &str) -> String {
        let stem = sanitize(name);
        let mut candidate = format!("{stem}{TICKET_SUFFIX}");
        let mut n = 1;
        while !self.used.insert(candidate.to_lowercase()) {
            n += 1;
            candidate = format!("{stem}_{n}{TICKET_SUFFIX}");
        }
        candidate
    }
}

/// A packed bundle held in memory.
#[derive(Debug, Clone)]
pub struct Bundle {
    archive: Vec<u8>,
    manifest: Vec<ManifestRow>,
}

impl Bundle {
    /// The ZIP archive bytes.
    pub fn archive(&self) -> &[u8] {
        &self.archive
    }

    /// Manifest rows in issuance order.
    pub fn manifest(&self) -> &[ManifestRow] {
        &self.manifest
    }

    pub fn manifest_row_count(&self) -> usize {
        self.manifest.len()
    }

    /// Writes `tickets.zip` into `dir`, creating it if needed, and returns
    /// the archive path. The archive is written beside the target and
    /// renamed into place.
    pub fn write_to(&self, dir: &Path) -> PackResult<PathBuf> {
        let io_error = |path: &Path, source| PackError::Io {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

        let target = dir.join(BUNDLE_FILENAME);
        let staging = dir.join(format!("{BUNDLE_FILENAME}.partial"));
        fs::write(&staging, &self.archive).map_err(|e| io_error(&staging, e))?;
        fs::rename(&staging, &target).map_err(|e| io_error(&target, e))?;

        info!(
            path = %target.display(),
            tickets = self.manifest.len(),
            bytes = self.archive.len(),
            "Bundle exported"
        );
        Ok(target)
    }
}

/// Packs `credentials` into a bundle.
///
/// ## Errors
/// - [`PackError::Empty`] for an empty slice
/// - [`PackError::Archive`] / [`PackError::Manifest`] on write failures
pub fn pack(credentials: &[Credential]) -> PackResult<Bundle> {
    if credentials.is_empty() {
        return Err(PackError::Empty);
    }

    let archive_error = |entry: &str, e: &dyn std::fmt::Display| PackError::Archive {
        entry: entry.to_string(),
        reason: e.to_string(),
    };

    let mut allocator = FilenameAllocator::new();
    let mut manifest = Vec::with_capacity(credentials.len());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    // PNG is already deflated.
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    for credential in credentials {
        let filename = allocator.allocate(&credential.record.name);
        zip.start_file(filename.as_str(), stored)
            .map_err(|e| archive_error(&filename, &e))?;
        zip.write_all(credential.image.as_bytes())
            .map_err(|e| archive_error(&filename, &e))?;

        manifest.push(ManifestRow {
            name: credential.record.name.clone(),
            token: credential.record.token.to_string(),
            filename,
        });
    }

    let manifest_csv = write_manifest(&manifest)?;
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(MANIFEST_FILENAME, deflated)
        .map_err(|e| archive_error(MANIFEST_FILENAME, &e))?;
    zip.write_all(&manifest_csv)
        .map_err(|e| archive_error(MANIFEST_FILENAME, &e))?;

    let archive = zip
        .finish()
        .map_err(|e| archive_error(BUNDLE_FILENAME, &e))?
        .into_inner();

    info!(
        tickets = manifest.len(),
        bytes = archive.len(),
        "Bundle packed"
    );
    Ok(Bundle { archive, manifest })
}

fn write_manifest(rows: &[ManifestRow]) -> PackResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| PackError::Manifest(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| PackError::Manifest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::ImageBlob;
    use gatepass_core::{AttendeeRecord, Token};
    use std::io::Read;

    fn credential(name: &str, token: &str) -> Credential {
        Credential {
            record: AttendeeRecord {
                name: name.to_string(),
                token: Token::parse(token).unwrap(),
            },
            image: ImageBlob::new(format!("png:{token}").into_bytes()),
        }
    }

    fn read_entry(archive: &[u8], name: &str) -> Vec<u8> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut entry = zip.by_name(name).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Alice"), "Alice");
        assert_eq!(sanitize("  Mary   Jane  Watson "), "Mary_Jane_Watson");
        assert_eq!(sanitize("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize("Zoë O'Brien-Núñez"), "Zoë_OBrien-Núñez");
        assert_eq!(sanitize("王小明"), "王小明");
        assert_eq!(sanitize("!!!"), "attendee");
        assert_eq!(sanitize(&"a".repeat(300)).len(), MAX_STEM_CHARS);
    }

    #[test]
    fn test_collisions_get_suffixes_in_order() {
        let mut allocator = FilenameAllocator::new();
        assert_eq!(allocator.allocate("Alice"), "Alice_ticket.png");
        assert_eq!(allocator.allocate("Bob"), "Bob_ticket.png");
        assert_eq!(allocator.allocate("Alice"), "Alice_2_ticket.png");
        assert_eq!(allocator.allocate("alice"), "alice_3_ticket.png");
        assert_eq!(allocator.allocate("Alice 2"), "Alice_2_2_ticket.png");
    }

    #[test]
    fn test_empty_input_is_packaging_failure() {
        assert!(matches!(pack(&[]), Err(PackError::Empty)));
    }

    #[test]
    fn test_manifest_matches_images() {
        let credentials = vec![
            credential("Alice", "t-1"),
            credential("Bob", "t-2"),
            credential("Alice", "t-3"),
        ];
        let bundle = pack(&credentials).unwrap();

        assert_eq!(bundle.manifest_row_count(), credentials.len());

        let mut zip = zip::ZipArchive::new(Cursor::new(bundle.archive())).unwrap();
        let pngs = (0..zip.len())
            .filter(|&i| zip.by_index(i).unwrap().name().ends_with(".png"))
            .count();
        assert_eq!(pngs, credentials.len());

        let csv = String::from_utf8(read_entry(bundle.archive(), MANIFEST_FILENAME)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "name,token,filename",
                "Alice,t-1,Alice_ticket.png",
                "Bob,t-2,Bob_ticket.png",
                "Alice,t-3,Alice_2_ticket.png",
            ]
        );

        assert_eq!(read_entry(bundle.archive(), "Alice_2_ticket.png"), b"png:t-3");
    }

    #[test]
    fn test_manifest_quotes_awkward_names() {
        let bundle = pack(&[credential("Smith, Jane \"JJ\"", "t-1")]).unwrap();
        let bytes = read_entry(bundle.archive(), MANIFEST_FILENAME);

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "Smith, Jane \"JJ\"");
        assert_eq!(&row[2], "Smith_Jane_JJ_ticket.png");
    }

    #[tokio::test]
    async fn test_issued_roster_round_trips_through_bundle() {
        use crate::batch::render_batch;
        use crate::renderer::{CredentialRenderer, RenderOptions};
        use gatepass_core::{issue, RosterRow};
        use std::sync::Arc;

        let records = issue(&[RosterRow::named("Alice"), RosterRow::named("Bob")]).unwrap();
        let renderer = Arc::new(CredentialRenderer::new(RenderOptions::default()).unwrap());

        let report = render_batch(renderer.clone(), records.clone(), None).await;
        assert!(report.is_complete());
        let bundle = pack(&report.rendered).unwrap();

        let mut zip = zip::ZipArchive::new(Cursor::new(bundle.archive())).unwrap();
        let mut pngs: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .filter(|name| name.ends_with(".png"))
            .collect();
        pngs.sort();
        assert_eq!(pngs, vec!["Alice_ticket.png", "Bob_ticket.png"]);

        let csv = read_entry(bundle.archive(), MANIFEST_FILENAME);
        let mut reader = csv::Reader::from_reader(csv.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);

        for (row, record) in rows.iter().zip(&records) {
            assert_eq!(&row[0], record.name);
            assert_eq!(&row[1], record.token.as_str());

            let png = read_entry(bundle.archive(), &row[2]);
            let img = image::load_from_memory(&png).unwrap().to_luma8();
            let code = renderer.layout_for(&record.name).unwrap().code;
            let code = image::imageops::crop_imm(&img, code.x, code.y, code.width, code.height)
                .to_image();

            let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
                code.width() as usize,
                code.height() as usize,
                |x, y| code.get_pixel(x as u32, y as u32).0[0],
            );
            let grids = prepared.detect_grids();
            assert_eq!(grids.len(), 1);
            let (_, content) = grids[0].decode().unwrap();
            assert_eq!(content, record.token.as_str());
        }
    }

    #[test]
    fn test_write_to_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let bundle = pack(&[credential("Alice", "t-1")]).unwrap();

        let first = bundle.write_to(&out).unwrap();
        let second = bundle.write_to(&out).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.file_name().unwrap(), BUNDLE_FILENAME);
        assert_eq!(fs::read(&first).unwrap(), bundle.archive());
        assert!(!out.join(format!("{BUNDLE_FILENAME}.partial")).exists());
    }
}
