//! Word strategies: Office Open XML (`.docx`) and Word 97–2003 (`.doc`).
//!
//! `.docx` is a ZIP container; the body lives in `word/document.xml`. We walk
//! it with a streaming XML reader and keep only run text, turning tabs,
//! breaks and paragraph ends into whitespace. All formatting is discarded.
//!
//! `.doc` is an OLE2 compound file. Text lives in the `WordDocument` stream,
//! split into pieces that the piece table (the Clx, stored in the `0Table` or
//! `1Table` stream) maps to character positions. We read the FIB, follow the
//! piece table, and keep the first `ccpText` characters: the main story.
//! Directory entries, property-set streams, headers and footnotes are never
//! touched. Files labelled `application/msword` that are really `.docx` (a
//! common mislabelling) take the OOXML path.

use crate::error::PipelineError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read, Seek};
use tracing::debug;

const FORMAT_DOCX: &str = "Word";
const FORMAT_DOC: &str = "Word 97-2003";

const DOCX_HINT: &str = "The file is not a readable .docx document. Open it in Word and save it again.";
const DOC_HINT: &str = "The file is not a readable Word 97-2003 document. Save it as .docx and upload it again.";

const DOCUMENT_PART: &str = "word/document.xml";

/// Upper bound on the decompressed size of `word/document.xml`.
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const WORD_STREAM: &str = "/WordDocument";

// FIB (File Information Block) at the start of the WordDocument stream.
const FIB_IDENT: u16 = 0xA5EC;
/// Word 97 is nFib 0x00C1; anything below 101 is a Word 6/95 layout.
const MIN_NFIB: u16 = 101;
const FIB_FLAGS: usize = 0x0A;
const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_WHICH_TABLE: u16 = 0x0200;
const FIB_CSW: usize = 0x20;
/// Index of `ccpText` in `fibRgLw`.
const CCP_TEXT_INDEX: usize = 3;
/// Index of the `fcClx`/`lcbClx` pair in `fibRgFcLcb`.
const CLX_INDEX: usize = 33;

// Clx entries.
const CLXT_PRC: u8 = 0x01;
const CLXT_PCDT: u8 = 0x02;

const FC_COMPRESSED: u32 = 0x4000_0000;
const FC_MASK: u32 = 0x3FFF_FFFF;

const FIELD_BEGIN: char = '\u{13}';
const FIELD_SEPARATOR: char = '\u{14}';
const FIELD_END: char = '\u{15}';

// ── OOXML ────────────────────────────────────────────────────────────────

/// Extract raw text from a `.docx` payload.
pub fn extract_docx(bytes: &[u8]) -> Result<String, PipelineError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        PipelineError::extraction(FORMAT_DOCX, format!("failed to open ZIP: {e}"), DOCX_HINT)
    })?;

    let part = archive.by_name(DOCUMENT_PART).map_err(|e| {
        PipelineError::extraction(
            FORMAT_DOCX,
            format!("{DOCUMENT_PART} missing: {e}"),
            DOCX_HINT,
        )
    })?;

    if part.size() > MAX_PART_BYTES {
        return Err(PipelineError::extraction(
            FORMAT_DOCX,
            format!(
                "{DOCUMENT_PART} expands to {} bytes (limit {MAX_PART_BYTES})",
                part.size()
            ),
            DOCX_HINT,
        ));
    }

    let mut xml = String::new();
    part.take(MAX_PART_BYTES + 1)
        .read_to_string(&mut xml)
        .map_err(|e| {
            PipelineError::extraction(
                FORMAT_DOCX,
                format!("failed to read {DOCUMENT_PART}: {e}"),
                DOCX_HINT,
            )
        })?;
    if xml.len() as u64 > MAX_PART_BYTES {
        return Err(PipelineError::extraction(
            FORMAT_DOCX,
            format!("{DOCUMENT_PART} exceeds {MAX_PART_BYTES} bytes"),
            DOCX_HINT,
        ));
    }

    document_xml_text(&xml)
}

/// Collect the text content of a WordprocessingML body.
fn document_xml_text(xml: &str) -> Result<String, PipelineError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len() / 4);
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" | b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|err| {
                    PipelineError::extraction(
                        FORMAT_DOCX,
                        format!("bad text entity: {err}"),
                        DOCX_HINT,
                    )
                })?;
                out.push_str(&text);
            }
            Ok(Event::CData(e)) if in_text => {
                out.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PipelineError::extraction(
                    FORMAT_DOCX,
                    format!(
                        "malformed XML at byte {}: {e}",
                        reader.buffer_position()
                    ),
                    DOCX_HINT,
                ));
            }
            _ => {}
        }
    }

    Ok(out)
}

// ── Word 97–2003 ─────────────────────────────────────────────────────────

/// Extract raw text from a payload declared as `application/msword`.
pub fn extract_legacy(bytes: &[u8]) -> Result<String, PipelineError> {
    if bytes.starts_with(ZIP_MAGIC) {
        debug!("application/msword payload is a ZIP container; reading as .docx");
        return extract_docx(bytes);
    }

    if !bytes.starts_with(OLE_MAGIC) {
        return Err(doc_failure("not an OLE2 compound document"));
    }

    let mut file = cfb::CompoundFile::open(Cursor::new(bytes))
        .map_err(|e| doc_failure(format!("failed to open compound file: {e}")))?;

    let word = read_stream(&mut file, WORD_STREAM)?;
    let fib = Fib::parse(&word)?;
    if fib.encrypted {
        return Err(doc_failure("document is password protected"));
    }

    let table = read_stream(&mut file, fib.table_stream())?;
    let clx = fib
        .clx_range()
        .and_then(|range| table.get(range))
        .ok_or_else(|| doc_failure("piece table lies outside the table stream"))?;
    let pieces = parse_piece_table(clx)?;
    let raw = decode_pieces(&word, &pieces, fib.ccp_text)?;

    debug!(
        "Legacy Word: {} pieces, {} main-story chars from {}",
        pieces.len(),
        fib.ccp_text,
        fib.table_stream()
    );
    Ok(plain_text(&raw))
}

fn doc_failure(detail: impl Into<String>) -> PipelineError {
    PipelineError::extraction(FORMAT_DOC, detail, DOC_HINT)
}

fn read_stream<F: Read + Seek>(
    file: &mut cfb::CompoundFile<F>,
    path: &str,
) -> Result<Vec<u8>, PipelineError> {
    let mut stream = file
        .open_stream(path)
        .map_err(|e| doc_failure(format!("{path} stream missing: {e}")))?;
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .map_err(|e| doc_failure(format!("failed to read {path}: {e}")))?;
    Ok(buf)
}

/// The FIB fields the text decoder needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fib {
    encrypted: bool,
    which_table: bool,
    ccp_text: u32,
    fc_clx: u32,
    lcb_clx: u32,
}

impl Fib {
    fn parse(word: &[u8]) -> Result<Self, PipelineError> {
        let truncated = || doc_failure("FIB is truncated");

        let ident = read_u16(word, 0).ok_or_else(truncated)?;
        if ident != FIB_IDENT {
            return Err(doc_failure(format!("bad FIB signature {ident:#06x}")));
        }
        let n_fib = read_u16(word, 2).ok_or_else(truncated)?;
        if n_fib < MIN_NFIB {
            return Err(doc_failure(format!(
                "nFib {n_fib} predates Word 97; only Word 97-2003 files are supported"
            )));
        }
        let flags = read_u16(word, FIB_FLAGS).ok_or_else(truncated)?;

        // FibBase, then three counted arrays: u16 fibRgW, u32 fibRgLw and
        // the (fc, lcb) pairs of fibRgFcLcb.
        let csw = read_u16(word, FIB_CSW).ok_or_else(truncated)? as usize;
        let rg_lw = FIB_CSW + 2 + csw * 2 + 2;
        let cslw = read_u16(word, rg_lw - 2).ok_or_else(truncated)? as usize;
        let ccp_text = read_u32(word, rg_lw + CCP_TEXT_INDEX * 4).ok_or_else(truncated)?;

        let rg_fc_lcb = rg_lw + cslw * 4 + 2;
        let cb_rg_fc_lcb = read_u16(word, rg_fc_lcb - 2).ok_or_else(truncated)? as usize;
        if cb_rg_fc_lcb <= CLX_INDEX {
            return Err(doc_failure("FIB has no piece table entry"));
        }
        let fc_clx = read_u32(word, rg_fc_lcb + CLX_INDEX * 8).ok_or_else(truncated)?;
        let lcb_clx = read_u32(word, rg_fc_lcb + CLX_INDEX * 8 + 4).ok_or_else(truncated)?;

        Ok(Self {
            encrypted: flags & FLAG_ENCRYPTED != 0,
            which_table: flags & FLAG_WHICH_TABLE != 0,
            ccp_text,
            fc_clx,
            lcb_clx,
        })
    }

    fn table_stream(&self) -> &'static str {
        if self.which_table {
            "/1Table"
        } else {
            "/0Table"
        }
    }

    fn clx_range(&self) -> Option<std::ops::Range<usize>> {
        let start = self.fc_clx as usize;
        Some(start..start.checked_add(self.lcb_clx as usize)?)
    }
}

/// One entry of the piece table: characters `cp_start..cp_end` of the
/// document live at `fc` in the WordDocument stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Piece {
    cp_start: u32,
    cp_end: u32,
    fc: u32,
}

/// Skip the formatting records of a Clx and decode its `PlcPcd`.
fn parse_piece_table(clx: &[u8]) -> Result<Vec<Piece>, PipelineError> {
    let truncated = || doc_failure("piece table is truncated");

    let mut pos = 0usize;
    loop {
        match clx.get(pos) {
            Some(&CLXT_PRC) => {
                let cb = read_u16(clx, pos + 1).ok_or_else(truncated)? as usize;
                pos += 3 + cb;
            }
            Some(&CLXT_PCDT) => break,
            Some(other) => {
                return Err(doc_failure(format!("unexpected Clx entry {other:#04x}")));
            }
            None => return Err(doc_failure("Clx has no piece table")),
        }
    }

    let lcb = read_u32(clx, pos + 1).ok_or_else(truncated)? as usize;
    let plc = clx
        .get(pos + 5..)
        .and_then(|rest| rest.get(..lcb))
        .ok_or_else(truncated)?;
    if lcb < 4 || (lcb - 4) % 12 != 0 {
        return Err(doc_failure(format!("piece table size {lcb} is not 4 + 12n")));
    }

    // n + 1 character positions, then n 8-byte piece descriptors.
    let n = (lcb - 4) / 12;
    let descriptors = 4 * (n + 1);
    (0..n)
        .map(|i| {
            let cp_start = read_u32(plc, 4 * i).ok_or_else(truncated)?;
            let cp_end = read_u32(plc, 4 * (i + 1)).ok_or_else(truncated)?;
            let fc = read_u32(plc, descriptors + 8 * i + 2).ok_or_else(truncated)?;
            if cp_end < cp_start {
                return Err(doc_failure(format!("piece {i} ends before it starts")));
            }
            Ok(Piece {
                cp_start,
                cp_end,
                fc,
            })
        })
        .collect()
}

/// Concatenate the pieces that make up the first `ccp_text` characters.
fn decode_pieces(word: &[u8], pieces: &[Piece], ccp_text: u32) -> Result<String, PipelineError> {
    let mut out = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        if piece.cp_start >= ccp_text {
            break;
        }
        let count = (piece.cp_end.min(ccp_text) - piece.cp_start) as usize;
        let outside = || doc_failure(format!("piece {i} lies outside the WordDocument stream"));

        if piece.fc & FC_COMPRESSED != 0 {
            let start = (piece.fc & FC_MASK) as usize / 2;
            let bytes = word
                .get(start..start.saturating_add(count))
                .ok_or_else(outside)?;
            out.extend(bytes.iter().map(|&b| cp1252_char(b)));
        } else {
            let start = (piece.fc & FC_MASK) as usize;
            let bytes = word
                .get(start..start.saturating_add(count * 2))
                .ok_or_else(outside)?;
            let units = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
            out.extend(char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)));
        }
    }
    Ok(out)
}

/// Turn Word's in-band control characters into plain text.
///
/// Paragraph marks, cell marks and manual breaks become newlines. A field
/// keeps its displayed result and loses its instruction, so `{ PAGE }`
/// contributes only the page number. Anchors for pictures, footnotes and
/// other objects are dropped.
fn plain_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    // One entry per open field; true while inside its instruction.
    let mut fields: Vec<bool> = Vec::new();

    for c in raw.chars() {
        match c {
            FIELD_BEGIN => {
                fields.push(true);
                continue;
            }
            FIELD_SEPARATOR => {
                if let Some(top) = fields.last_mut() {
                    *top = false;
                }
                continue;
            }
            FIELD_END => {
                fields.pop();
                continue;
            }
            _ => {}
        }
        if fields.iter().any(|&instruction| instruction) {
            continue;
        }
        match c {
            '\r' | '\u{07}' | '\u{0B}' | '\u{0C}' => out.push('\n'),
            '\t' => out.push('\t'),
            // non-breaking hyphen
            '\u{1E}' => out.push('-'),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

/// Decode one byte of a compressed (Windows-1252) piece.
fn cp1252_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        b => char::from(b),
    }
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
