//! Terminal output utilities: notes, preview table, and the phase view.

use kaitai_core::{PendingImage, Phase, SessionState, MAX_IMAGES};

// ---------------------------------------------------------------------------
// ANSI Color/Style helpers
// ---------------------------------------------------------------------------

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip until 'm'
            for next in chars.by_ref() {
                if next == 'm' { break; }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn styled(style: &str, text: &str) -> String {
    if supports_color() {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// Formatted notes
// ---------------------------------------------------------------------------

/// Print a formatted INFO note to stderr.
pub fn note_info(msg: &str) {
    if supports_color() {
        eprintln!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        eprintln!("INFO: {msg}");
    }
}

/// Print a formatted WARNING note.
pub fn note_warn(msg: &str) {
    if supports_color() {
        eprintln!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        eprintln!("WARN: {msg}");
    }
}

/// Print a formatted ERROR note.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

/// Print a formatted SUCCESS note.
pub fn note_success(msg: &str) {
    if supports_color() {
        eprintln!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        eprintln!("OK: {msg}");
    }
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Column alignment.
pub enum Align { Left, Right }

/// A table column definition.
pub struct Column {
    pub header: String,
    pub align: Align,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Left }
    }
    pub fn right(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Right }
    }
}

/// Render a table with given columns and rows.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let num_cols = columns.len();
    let mut widths: Vec<usize> = columns.iter().map(|c| visible_width(&c.header)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(num_cols) {
            widths[i] = widths[i].max(visible_width(cell));
        }
    }

    let mut out = String::new();

    let header_cells: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| pad_cell(&col.header, widths[i], &col.align))
        .collect();
    out.push_str(&format!("  {}  \n", styled(BOLD, &header_cells.join("  "))));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}  \n", sep.join("  ")));

    for row in rows {
        let cells: Vec<String> = (0..num_cols)
            .map(|i| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                pad_cell(cell, widths[i], &columns[i].align)
            })
            .collect();
        out.push_str(&format!("  {}  \n", cells.join("  ")));
    }

    out
}

fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

fn pad_cell(s: &str, width: usize, align: &Align) -> String {
    let pad = width.saturating_sub(visible_width(s));
    match align {
        Align::Left => format!("{s}{}", " ".repeat(pad)),
        Align::Right => format!("{}{s}", " ".repeat(pad)),
    }
}

// ---------------------------------------------------------------------------
// Session views
// ---------------------------------------------------------------------------

fn human_size(bytes: usize) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{b} B"),
    }
}

/// Preview list: one row per pending image, in collection order.
pub fn render_previews(images: &[PendingImage]) -> String {
    let columns = [
        Column::right("#"),
        Column::left("Photo"),
        Column::left("Type"),
        Column::right("Size"),
        Column::left("Id"),
    ];
    let rows: Vec<Vec<String>> = images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            vec![
                (i + 1).to_string(),
                image.file().name.clone(),
                image.mime_type().to_string(),
                human_size(image.file().bytes.len()),
                image.id().to_string(),
            ]
        })
        .collect();

    let mut out = format!("Photos ({}/{MAX_IMAGES}):\n", images.len());
    out.push_str(&render_table(&columns, &rows));
    out
}

/// The view for the current phase. Result text is printed verbatim.
pub fn render_session(state: &SessionState) -> String {
    match state.phase {
        Phase::Idle => format!("{}\n", styled(DIM, "No estimate requested yet.")),
        Phase::Loading => format!("{}\n", styled(DIM, "Estimating...")),
        Phase::Success => {
            let text = state
                .result
                .as_ref()
                .map(|r| r.result_text.as_str())
                .unwrap_or_default();
            format!("{}\n\n{text}\n", styled(BOLD, "Demolition estimate"))
        }
        Phase::Error => {
            let message = state
                .error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("The estimate failed.");
            format!("{} {message}\n", styled(RED, "Error:"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaitai_core::{EstimateError, EstimationOutcome, ErrorState, ImageFile};

    #[test]
    fn strips_ansi() {
        let colored = format!("{GREEN}hello{RESET}");
        assert_eq!(strip_ansi(&colored), "hello");
    }

    #[test]
    fn previews_list_every_image_in_order() {
        let images: Vec<PendingImage> = ["front.jpg", "side.jpg"]
            .iter()
            .map(|n| {
                PendingImage::new(
                    ImageFile::new(*n, "image/jpeg", vec![0u8; 2048]),
                    "data:image/jpeg;base64,AA==",
                )
            })
            .collect();

        let out = strip_ansi(&render_previews(&images));
        assert!(out.starts_with("Photos (2/10):"));
        let front = out.find("front.jpg").unwrap();
        let side = out.find("side.jpg").unwrap();
        assert!(front < side);
        assert!(out.contains("2.0 KB"));
        assert!(out.contains(&images[1].id().to_string()));
    }

    #[test]
    fn success_view_shows_result_verbatim() {
        let state = SessionState {
            phase: Phase::Success,
            result: Some(EstimationOutcome {
                result_text: "解体費用は約200万円です".into(),
            }),
            ..SessionState::default()
        };
        let out = strip_ansi(&render_session(&state));
        assert!(out.ends_with("解体費用は約200万円です\n"));
    }

    #[test]
    fn error_view_shows_message() {
        let state = SessionState {
            phase: Phase::Error,
            error: Some(ErrorState::from(EstimateError::no_images())),
            ..SessionState::default()
        };
        let out = strip_ansi(&render_session(&state));
        assert!(out.starts_with("Error: Please upload at least one photo"));
    }

    #[test]
    fn pads_wide_characters_by_char_count() {
        let table = render_table(
            &[Column::left("Name"), Column::right("N")],
            &[vec!["屋根".to_string(), "1".to_string()]],
        );
        assert!(strip_ansi(&table).contains("屋根    1"));
    }
}
