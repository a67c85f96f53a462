use serde::Serialize;

/// Background and accent colour for one lesson card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Swatch {
    pub bg: &'static str,
    pub border: &'static str,
}

const PALETTE: [Swatch; 12] = [
    Swatch { bg: "#e0f2fe", border: "#0369a1" },
    Swatch { bg: "#dcfce7", border: "#15803d" },
    Swatch { bg: "#f3e8ff", border: "#7e22ce" },
    Swatch { bg: "#ffedd5", border: "#c2410c" },
    Swatch { bg: "#fce7f3", border: "#be185d" },
    Swatch { bg: "#fee2e2", border: "#b91c1c" },
    Swatch { bg: "#fef9c3", border: "#a16207" },
    Swatch { bg: "#ccfbf1", border: "#0f766e" },
    Swatch { bg: "#e0e7ff", border: "#4338ca" },
    Swatch { bg: "#fae8ff", border: "#86198f" },
    Swatch { bg: "#ecfccb", border: "#3f6212" },
    Swatch { bg: "#ffe4e6", border: "#e11d48" },
];

const BLANK: Swatch = Swatch {
    bg: "#ffffff",
    border: "#e2e8f0",
};

/// Pick a palette colour for a person's name.
///
/// The hash walks UTF-16 code units with 32-bit shifts so a name keeps the
/// same colour the browser-side code gave it.
pub fn color_for_name(name: &str) -> Swatch {
    if name.is_empty() {
        return BLANK;
    }
    PALETTE[palette_index(name)]
}

fn palette_index(name: &str) -> usize {
    let mut hash: i64 = 0;
    for unit in name.encode_utf16() {
        let shifted = i64::from((hash as i32) << 5);
        hash = i64::from(unit) + shifted - hash;
    }
    (hash % PALETTE.len() as i64).unsigned_abs() as usize
}
