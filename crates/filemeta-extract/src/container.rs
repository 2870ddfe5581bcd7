//! Container-level image metadata.
//!
//! The `image` crate supplies the format, pixel dimensions, and the EXIF
//! and ICC blocks. IPTC and XMP are not surfaced by its decoders, so a
//! segment scanner walks the container structure to locate them:
//!
//! - JPEG: APP13 (`Photoshop 3.0`) and APP1 (`http://ns.adobe.com/xap/1.0/`)
//! - PNG: uncompressed `iTXt` with keyword `XML:com.adobe.xmp`
//! - WebP: `XMP ` RIFF chunk
//! - TIFF: IFD tags 33723 (IPTC-NAA), 34377 (Photoshop), 700 (XMP)
//!
//! The scanner also picks up EXIF from JPEG APP1 and WebP `EXIF` chunks
//! for decoders that do not report it.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use tracing::debug;

use filemeta_core::{Error, Result};

use crate::decoders::iptc::PHOTOSHOP_HEADER;

const JPEG_APP1: u8 = 0xE1;
const JPEG_APP13: u8 = 0xED;
const JPEG_SOS: u8 = 0xDA;
const JPEG_EOI: u8 = 0xD9;
const JPEG_EXIF_HEADER: &[u8] = b"Exif\0\0";
const JPEG_XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const PNG_XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

const TIFF_TAG_XMP: u16 = 700;
const TIFF_TAG_IPTC: u16 = 33723;
const TIFF_TAG_PHOTOSHOP: u16 = 34377;
/// Guards against IFD chains that loop back on themselves.
const TIFF_MAX_IFDS: usize = 16;

/// Container metadata and the raw tag blocks found in an image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerInfo {
    pub format: Option<ImageFormat>,
    /// Stored width, before any orientation correction.
    pub width: u32,
    /// Stored height, before any orientation correction.
    pub height: u32,
    pub exif: Option<Vec<u8>>,
    pub icc: Option<Vec<u8>>,
    pub iptc: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
}

/// Raw blocks located by the segment scanner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannedBlocks {
    pub exif: Option<Vec<u8>>,
    pub iptc: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
}

/// Read container metadata, then fully decode the pixels.
///
/// The container read must succeed; the pixel decode is returned as its
/// own `Result` so a corrupt image body still yields dimensions and tags.
pub fn read_image(bytes: &[u8]) -> Result<(ContainerInfo, Result<DynamicImage>)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::Image(format!("Failed to sniff image format: {}", e)))?;
    let format = reader.format();
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| Error::Image(format!("Failed to read image header: {}", e)))?;

    let (width, height) = decoder.dimensions();
    let icc = decoder.icc_profile().unwrap_or_else(|e| {
        debug!(error = %e, "ICC profile unreadable");
        None
    });
    let exif = decoder.exif_metadata().unwrap_or_else(|e| {
        debug!(error = %e, "EXIF block unreadable");
        None
    });

    let scanned = format.map(|f| scan_blocks(bytes, f)).unwrap_or_default();
    let exif = exif
        .or(scanned.exif)
        // TIFF files are themselves a TIFF-structured EXIF container.
        .or_else(|| (format == Some(ImageFormat::Tiff)).then(|| bytes.to_vec()));

    let info = ContainerInfo {
        format,
        width,
        height,
        exif: exif.filter(|b| !b.is_empty()),
        icc: icc.filter(|b| !b.is_empty()),
        iptc: scanned.iptc,
        xmp: scanned.xmp,
    };

    let pixels = DynamicImage::from_decoder(decoder)
        .map_err(|e| Error::Image(format!("Failed to decode image: {}", e)));

    Ok((info, pixels))
}

/// Locate raw IPTC, XMP, and EXIF blocks for a known container format.
pub fn scan_blocks(bytes: &[u8], format: ImageFormat) -> ScannedBlocks {
    match format {
        ImageFormat::Jpeg => scan_jpeg(bytes),
        ImageFormat::Png => scan_png(bytes),
        ImageFormat::WebP => scan_webp(bytes),
        ImageFormat::Tiff => scan_tiff(bytes),
        _ => ScannedBlocks::default(),
    }
}

fn scan_jpeg(data: &[u8]) -> ScannedBlocks {
    let mut blocks = ScannedBlocks::default();
    let mut pos = 2;

    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        match marker {
            // Fill byte before a marker
            0xFF => {
                pos += 1;
                continue;
            }
            JPEG_SOS | JPEG_EOI => break,
            // Markers without a length field
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            break;
        }
        let seg_end = (pos + 2 + seg_len).min(data.len());
        let segment = &data[pos + 4..seg_end];

        match marker {
            JPEG_APP13 if segment.starts_with(PHOTOSHOP_HEADER) => {
                blocks.iptc.get_or_insert_with(|| segment.to_vec());
            }
            JPEG_APP1 => {
                if let Some(packet) = segment.strip_prefix(JPEG_XMP_HEADER) {
                    blocks.xmp.get_or_insert_with(|| packet.to_vec());
                } else if let Some(tiff) = segment.strip_prefix(JPEG_EXIF_HEADER) {
                    blocks.exif.get_or_insert_with(|| tiff.to_vec());
                }
            }
            _ => {}
        }

        pos += 2 + seg_len;
    }

    blocks
}

fn scan_png(data: &[u8]) -> ScannedBlocks {
    let mut blocks = ScannedBlocks::default();
    if !data.starts_with(PNG_SIGNATURE) {
        return blocks;
    }

    // length (4) + type (4) + data + crc (4)
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let kind = &data[pos + 4..pos + 8];
        let start = pos + 8;
        let Some(end) = start.checked_add(len).filter(|end| *end <= data.len()) else {
            break;
        };

        match kind {
            b"iTXt" => {
                if let Some(text) = itxt_xmp(&data[start..end]) {
                    blocks.xmp = Some(text.to_vec());
                }
            }
            b"IEND" => break,
            _ => {}
        }

        pos = end + 4;
    }

    blocks
}

/// Text of an uncompressed XMP `iTXt` chunk.
///
/// Layout: keyword NUL, compression flag, compression method,
/// language tag NUL, translated keyword NUL, text.
fn itxt_xmp(chunk: &[u8]) -> Option<&[u8]> {
    let keyword_end = chunk.iter().position(|b| *b == 0)?;
    if &chunk[..keyword_end] != PNG_XMP_KEYWORD {
        return None;
    }
    let rest = chunk.get(keyword_end + 1..)?;
    let (&compressed, rest) = rest.split_first()?;
    if compressed != 0 {
        debug!("Skipping compressed XMP iTXt chunk");
        return None;
    }
    let rest = rest.get(1..)?;
    let lang_end = rest.iter().position(|b| *b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|b| *b == 0)?;
    Some(&rest[translated_end + 1..])
}

fn scan_webp(data: &[u8]) -> ScannedBlocks {
    let mut blocks = ScannedBlocks::default();
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return blocks;
    }

    // fourcc (4) + little-endian size (4) + data, padded to even
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let fourcc = &data[pos..pos + 4];
        let len = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
            as usize;
        let start = pos + 8;
        let Some(end) = start.checked_add(len).filter(|end| *end <= data.len()) else {
            break;
        };

        match fourcc {
            b"XMP " => blocks.xmp = Some(data[start..end].to_vec()),
            b"EXIF" => blocks.exif = Some(data[start..end].to_vec()),
            _ => {}
        }

        pos = end + (len % 2);
    }

    blocks
}

fn scan_tiff(data: &[u8]) -> ScannedBlocks {
    let mut blocks = ScannedBlocks::default();
    if data.len() < 8 {
        return blocks;
    }
    let big_endian = match &data[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return blocks,
    };

    let read_u16 = |offset: usize| -> Option<u16> {
        let b = data.get(offset..offset + 2)?;
        Some(if big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    };
    let read_u32 = |offset: usize| -> Option<u32> {
        let b = data.get(offset..offset + 4)?;
        Some(if big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    };

    if read_u16(2) != Some(42) {
        return blocks;
    }

    // TIFF counts values, not bytes.
    let type_size = |typ: u16| -> usize {
        match typ {
            1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
            3 | 8 => 2,         // SHORT, SSHORT
            4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
            5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
            _ => 1,
        }
    };

    let mut ifd_offset = read_u32(4).unwrap_or(0) as usize;
    let mut visited = 0;

    while ifd_offset > 0 && visited < TIFF_MAX_IFDS {
        visited += 1;
        let Some(entry_count) = read_u16(ifd_offset) else {
            break;
        };
        let entries_start = ifd_offset + 2;

        for i in 0..entry_count as usize {
            let entry = entries_start + i * 12;
            let (Some(tag), Some(typ), Some(count)) =
                (read_u16(entry), read_u16(entry + 2), read_u32(entry + 4))
            else {
                return blocks;
            };
            let byte_len = count as usize * type_size(typ);
            // Values of four bytes or fewer are stored inline.
            let value_offset = if byte_len <= 4 {
                entry + 8
            } else {
                read_u32(entry + 8).unwrap_or(u32::MAX) as usize
            };
            let Some(value) = data.get(value_offset..value_offset.saturating_add(byte_len))
            else {
                continue;
            };

            match tag {
                TIFF_TAG_IPTC | TIFF_TAG_PHOTOSHOP if blocks.iptc.is_none() => {
                    blocks.iptc = Some(value.to_vec());
                }
                TIFF_TAG_XMP if blocks.xmp.is_none() => blocks.xmp = Some(value.to_vec()),
                _ => {}
            }
        }

        ifd_offset = read_u32(entries_start + entry_count as usize * 12).unwrap_or(0) as usize;
    }

    blocks
}
