//! Static font-metric tables for the two standard PDF faces the stream
//! renderer uses (Helvetica and Helvetica-Bold).
//!
//! Widths are in em units (AFM width / 1000) and cover ASCII 0x20..=0x7E.
//! Index = (char as usize) - 32. Non-ASCII characters fall back to the
//! face's average width, which is close enough for the Latin-1 accents the
//! Spanish label set uses.

// ────────────────────────────────────────────────────────────────────────────
// Font faces
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Regular,
    Bold,
}

impl Face {
    /// Resource name under which the face is registered in the page resources.
    pub fn resource_name(&self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
        }
    }

    pub fn base_font(&self) -> &'static str {
        match self {
            Face::Regular => "Helvetica",
            Face::Bold => "Helvetica-Bold",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Width slot layout:
/// ```text
/// [0]=sp  [1]=!   [2]="   [3]=#   [4]=$   [5]=%   [6]=&   [7]='
/// [8]=(   [9]=)   [10]=*  [11]=+  [12]=,  [13]=-  [14]=.  [15]=/
/// [16..25]=0-9
/// [26]=:  [27]=;  [28]=<  [29]==  [30]=>  [31]=?  [32]=@
/// [33..58]=A-Z
/// [59]=[  [60]=\  [61]=]  [62]=^  [63]=_  [64]=`
/// [65..90]=a-z
/// [91]={  [92]=|  [93]=}  [94]=~
/// ```
pub struct FontMetricTable {
    pub face: Face,
    widths: [f32; 95],
    /// Fallback width for characters outside the table.
    pub average_char_width: f32,
    pub space_width: f32,
}

impl FontMetricTable {
    /// Width of a string in em units.
    pub fn measure_em(&self, s: &str) -> f32 {
        s.chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    self.widths[code - 32]
                } else {
                    self.average_char_width
                }
            })
            .sum()
    }

    /// Width of a string in points at the given font size.
    pub fn measure(&self, s: &str, size_pt: f32) -> f32 {
        self.measure_em(s) * size_pt
    }

    /// Greedy word-wrap at `max_width_pt`. Words wider than a whole line are
    /// broken between characters. Empty or whitespace-only input yields no
    /// lines.
    pub fn wrap(&self, text: &str, size_pt: f32, max_width_pt: f32) -> Vec<String> {
        let max_em = (max_width_pt / size_pt).max(0.0);
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut current_width = 0.0_f32;

        for word in text.split_whitespace() {
            for piece in self.split_oversized(word, max_em) {
                let piece_w = self.measure_em(&piece);
                let space_w = if current.is_empty() {
                    0.0
                } else {
                    self.space_width
                };

                if !current.is_empty() && current_width + space_w + piece_w > max_em {
                    // Current line is full — push it and start a new line.
                    lines.push(std::mem::take(&mut current));
                    current.push_str(&piece);
                    current_width = piece_w;
                } else {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(&piece);
                    current_width += space_w + piece_w;
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    fn split_oversized(&self, word: &str, max_em: f32) -> Vec<String> {
        if self.measure_em(word) <= max_em {
            return vec![word.to_string()];
        }
        let mut pieces = Vec::new();
        let mut piece = String::new();
        let mut width = 0.0_f32;
        for ch in word.chars() {
            let w = self.measure_em(ch.encode_utf8(&mut [0u8; 4]));
            if !piece.is_empty() && width + w > max_em {
                pieces.push(std::mem::take(&mut piece));
                width = 0.0;
            }
            piece.push(ch);
            width += w;
        }
        if !piece.is_empty() {
            pieces.push(piece);
        }
        pieces
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Static width tables  (95 ASCII printable characters each)
// ────────────────────────────────────────────────────────────────────────────

static HELVETICA_TABLE: FontMetricTable = FontMetricTable {
    face: Face::Regular,
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500, 0.667, 0.556, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222, 0.500, 0.222, 0.833,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278, 0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {      |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    average_char_width: 0.556,
    space_width: 0.278,
};

static HELVETICA_BOLD_TABLE: FontMetricTable = FontMetricTable {
    face: Face::Bold,
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.333, 0.474, 0.556, 0.556, 0.889, 0.722, 0.238, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.333, 0.333, 0.584, 0.584, 0.584, 0.611, 0.975,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.722, 0.722, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.556, 0.722, 0.611, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.333, 0.278, 0.333, 0.584, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.611, 0.556, 0.611, 0.556, 0.333, 0.611, 0.611, 0.278, 0.278, 0.556, 0.278, 0.889,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.611, 0.611, 0.611, 0.611, 0.389, 0.556, 0.333, 0.611, 0.556, 0.778, 0.556, 0.556, 0.500,
        // {      |      }      ~
        0.389, 0.280, 0.389, 0.584,
    ],
    average_char_width: 0.611,
    space_width: 0.278,
};

/// Returns the static metric table for a face.
pub fn get_metrics(face: Face) -> &'static FontMetricTable {
    match face {
        Face::Regular => &HELVETICA_TABLE,
        Face::Bold => &HELVETICA_BOLD_TABLE,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_empty_returns_zero() {
        assert_eq!(get_metrics(Face::Regular).measure("", 10.0), 0.0);
    }

    #[test]
    fn test_measure_ascii_characters() {
        // "Tax" = T(0.611) + a(0.556) + x(0.500) = 1.667em
        let width = get_metrics(Face::Regular).measure("Tax", 10.0);
        assert!((width - 16.67).abs() < 1e-3, "got {width}");
    }

    #[test]
    fn test_non_ascii_falls_back_to_average() {
        let metrics = get_metrics(Face::Regular);
        assert!((metrics.measure_em("é") - metrics.average_char_width).abs() < 1e-6);
    }

    #[test]
    fn test_bold_is_wider_than_regular() {
        let text = "Labor Cost";
        assert!(
            get_metrics(Face::Bold).measure(text, 12.0)
                > get_metrics(Face::Regular).measure(text, 12.0)
        );
    }

    #[test]
    fn test_wrap_short_text_is_one_line() {
        let lines = get_metrics(Face::Regular).wrap("Framing lumber", 10.0, 200.0);
        assert_eq!(lines, vec!["Framing lumber"]);
    }

    #[test]
    fn test_wrap_long_text_stays_within_width() {
        let metrics = get_metrics(Face::Regular);
        let text = "Remove existing drywall, inspect framing for water damage, \
                    replace insulation and hang new moisture-resistant board";
        let lines = metrics.wrap(text, 10.0, 150.0);
        assert!(lines.len() > 2, "expected wrapping, got {lines:?}");
        for line in &lines {
            assert!(metrics.measure(line, 10.0) <= 150.0 + 1e-3, "{line} overflows");
        }
        assert_eq!(lines.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_wrap_breaks_oversized_word() {
        let metrics = get_metrics(Face::Regular);
        let lines = metrics.wrap(&"W".repeat(40), 10.0, 60.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| metrics.measure(l, 10.0) <= 60.0 + 1e-3));
        assert_eq!(lines.concat().len(), 40);
    }

    #[test]
    fn test_wrap_whitespace_only_is_empty() {
        assert!(get_metrics(Face::Bold).wrap("   \t ", 10.0, 100.0).is_empty());
    }
}
