//! Display-width helpers for the renderer.
//!
//! Widths follow UAX #11 (via `unicode-width`); cells are extended grapheme
//! clusters (via `unicode-segmentation`), so a base character plus combining
//! marks or a multi-scalar emoji occupies one cell run.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// One grapheme cluster of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphemeCell {
    /// Absolute byte offset of the cluster
    pub offset: usize,
    /// Byte length of the cluster
    pub len: usize,
    /// Display width in cells (tabs report 1; use [`cell_width_at`] for tab stops)
    pub width: usize,
}

/// Width of a grapheme cluster; control characters count as one cell.
pub fn grapheme_width(cluster: &str) -> usize {
    if cluster.chars().any(char::is_control) {
        return 1;
    }
    UnicodeWidthStr::width(cluster)
}

/// Visual width (in cells) of a cluster at a specific cell offset within the line.
///
/// `'\t'` advances to the next tab stop based on `tab_width`.
pub fn cell_width_at(cluster: &str, cell_offset_in_line: usize, tab_width: usize) -> usize {
    if cluster == "\t" {
        let tab_width = tab_width.max(1);
        tab_width - cell_offset_in_line % tab_width
    } else {
        grapheme_width(cluster)
    }
}

/// Split raw `line` bytes (starting at absolute offset `base`) into grapheme cells.
///
/// Valid UTF-8 runs are segmented into extended grapheme clusters. Every byte
/// of an invalid sequence is its own one-cell run, drawn as `U+FFFD`.
pub fn cells(line: impl AsRef<[u8]>, base: usize) -> Vec<GraphemeCell> {
    let mut cells = Vec::new();
    let mut offset = base;
    for chunk in line.as_ref().utf8_chunks() {
        cells.extend(chunk.valid().grapheme_indices(true).map(|(index, cluster)| GraphemeCell {
            offset: offset + index,
            len: cluster.len(),
            width: grapheme_width(cluster),
        }));
        offset += chunk.valid().len();
        for _ in chunk.invalid() {
            cells.push(GraphemeCell {
                offset,
                len: 1,
                width: 1,
            });
            offset += 1;
        }
    }
    cells
}

/// Display column of byte `index` within raw `line` bytes, expanding tabs.
///
/// An index inside a cluster reports the column of the cluster's start.
pub fn display_column(line: impl AsRef<[u8]>, index: usize, tab_width: usize) -> usize {
    let line = line.as_ref();
    let mut x = 0usize;
    for cell in cells(line, 0) {
        if cell.offset + cell.len > index {
            break;
        }
        let advance = match &line[cell.offset..cell.offset + cell.len] {
            b"\t" => cell_width_at("\t", x, tab_width),
            _ => cell.width,
        };
        x = x.saturating_add(advance);
    }
    x
}
