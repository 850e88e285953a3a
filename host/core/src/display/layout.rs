//! Text layout by measured pixel width
//!
//! Two flavours:
//!
//! - [`wrap_text`]: plain greedy word wrap.
//! - [`layout_highlighted`]: the same greedy packing over text that may carry
//!   `[bracketed]` highlight spans, which render as inverted blocks.

use super::font::FontFace;

/// Horizontal padding on each side of a highlighted block
pub const HIGHLIGHT_PAD: f32 = 1.0;

/// Wrap `text` into lines no wider than `max_width` pixels.
///
/// Words are split on single spaces and packed greedily. A word wider than
/// the whole line is hard-broken one character at a time and its tail starts
/// the next line.
#[must_use]
pub fn wrap_text(text: &str, font: &dyn FontFace, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if font.measure(&candidate) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if font.measure(word) > max_width {
            let mut partial = String::new();
            for ch in word.chars() {
                partial.push(ch);
                if font.measure(&partial) > max_width {
                    partial.pop();
                    if !partial.is_empty() {
                        lines.push(std::mem::take(&mut partial));
                    }
                    partial.push(ch);
                }
            }
            current = partial;
        } else {
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// A run of text drawn in one style on one line
#[derive(Clone, Debug, PartialEq)]
pub struct Piece {
    /// Text of the run
    pub text: String,
    /// Whether the run is drawn inverted
    pub highlighted: bool,
    /// X offset of the run's box relative to the line start
    pub x: f32,
    /// Width of the run's box (includes highlight padding)
    pub width: f32,
}

/// One laid-out line
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutLine {
    /// Pieces in drawing order
    pub pieces: Vec<Piece>,
    /// Total width of the line including highlight padding
    pub width: f32,
}

impl LayoutLine {
    /// Concatenated text of the line without markers
    #[must_use]
    pub fn text(&self) -> String {
        self.pieces.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Result of laying out highlighted text
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HighlightLayout {
    /// Laid-out lines
    pub lines: Vec<LayoutLine>,
}

impl HighlightLayout {
    /// Cursor x-position after the last character of the last line
    #[must_use]
    pub fn cursor_x(&self) -> f32 {
        self.lines.last().map_or(0.0, |l| l.width)
    }
}

#[derive(Clone, Debug)]
struct Run {
    text: String,
    highlighted: bool,
    space: bool,
}

/// Split `text` into alternating space/non-space runs, tracking highlight state
fn tokenize(text: &str) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut highlighted = false;

    for ch in text.chars() {
        match ch {
            '[' => highlighted = true,
            ']' => highlighted = false,
            _ => {
                let space = ch == ' ';
                match runs.last_mut() {
                    Some(run) if run.space == space && run.highlighted == highlighted => {
                        run.text.push(ch);
                    }
                    _ => runs.push(Run {
                        text: ch.to_string(),
                        highlighted,
                        space,
                    }),
                }
            }
        }
    }
    runs
}

/// A wrap unit: either a whitespace run or a word glued from adjacent runs
enum Unit {
    Space(Run),
    Word(Vec<Run>),
}

fn group_units(runs: Vec<Run>) -> Vec<Unit> {
    let mut units = Vec::new();
    for run in runs {
        if run.space {
            units.push(Unit::Space(run));
            continue;
        }
        match units.last_mut() {
            Some(Unit::Word(parts)) => parts.push(run),
            _ => units.push(Unit::Word(vec![run])),
        }
    }
    units
}

struct LineBuilder<'a> {
    font: &'a dyn FontFace,
    line: LayoutLine,
}

impl<'a> LineBuilder<'a> {
    fn new(font: &'a dyn FontFace) -> Self {
        Self {
            font,
            line: LayoutLine::default(),
        }
    }

    fn is_empty(&self) -> bool {
        self.line.pieces.is_empty()
    }

    /// Width `text` would add if appended in the given style
    fn added_width(&self, text: &str, highlighted: bool) -> f32 {
        let glyphs = self.font.measure(text);
        if !highlighted {
            return glyphs;
        }
        match self.line.pieces.last() {
            Some(prev) if prev.highlighted => glyphs,
            Some(prev) if prev.text.ends_with(' ') => glyphs + HIGHLIGHT_PAD,
            _ => glyphs + 2.0 * HIGHLIGHT_PAD,
        }
    }

    /// Width a glued word would add, padding each highlight boundary once
    fn word_width(&self, parts: &[Run]) -> f32 {
        // (highlighted, ends with space) of the piece before each part
        let mut prev = self
            .line
            .pieces
            .last()
            .map(|p| (p.highlighted, p.text.ends_with(' ')));
        let mut width = 0.0;
        for part in parts {
            let glyphs = self.font.measure(&part.text);
            width += match (part.highlighted, prev) {
                (false, _) | (true, Some((true, _))) => glyphs,
                (true, Some((false, true))) => glyphs + HIGHLIGHT_PAD,
                (true, _) => glyphs + 2.0 * HIGHLIGHT_PAD,
            };
            prev = Some((part.highlighted, part.text.ends_with(' ')));
        }
        width
    }

    fn push(&mut self, text: &str, highlighted: bool) {
        if text.is_empty() {
            return;
        }
        let glyphs = self.font.measure(text);

        if let Some(prev) = self.line.pieces.last_mut() {
            if prev.highlighted == highlighted {
                prev.text.push_str(text);
                prev.width += glyphs;
                self.line.width += glyphs;
                return;
            }
        }

        let (x, width) = if highlighted {
            let follows_space = self
                .line
                .pieces
                .last()
                .is_some_and(|p| !p.highlighted && p.text.ends_with(' '));
            if follows_space {
                // left pad sits inside the preceding space
                (self.line.width - HIGHLIGHT_PAD, glyphs + 2.0 * HIGHLIGHT_PAD)
            } else {
                (self.line.width, glyphs + 2.0 * HIGHLIGHT_PAD)
            }
        } else {
            (self.line.width, glyphs)
        };

        self.line.width = x + width;
        self.line.pieces.push(Piece {
            text: text.to_string(),
            highlighted,
            x,
            width,
        });
    }

    fn finish(&mut self) -> Option<LayoutLine> {
        if self.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.line))
    }
}

/// Lay out text containing `[highlight]` spans, wrapping at `max_width`.
#[must_use]
pub fn layout_highlighted(text: &str, font: &dyn FontFace, max_width: f32) -> HighlightLayout {
    let mut lines = Vec::new();
    let mut builder = LineBuilder::new(font);

    for unit in group_units(tokenize(text)) {
        match unit {
            Unit::Space(run) => {
                // spaces never start a wrapped line
                if builder.is_empty() {
                    continue;
                }
                if builder.line.width + builder.added_width(&run.text, run.highlighted) > max_width
                {
                    trim_trailing_space(&mut builder.line, font);
                    lines.extend(builder.finish());
                    continue;
                }
                builder.push(&run.text, run.highlighted);
            }
            Unit::Word(parts) => {
                let word_width = builder.word_width(&parts);
                let fits_here = builder.line.width + word_width <= max_width;
                if !fits_here && !builder.is_empty() {
                    trim_trailing_space(&mut builder.line, font);
                    lines.extend(builder.finish());
                }

                for part in parts {
                    for ch in part.text.chars() {
                        let mut buf = [0u8; 4];
                        let s = ch.encode_utf8(&mut buf);
                        if !builder.is_empty()
                            && builder.line.width + builder.added_width(s, part.highlighted)
                                > max_width
                        {
                            lines.extend(builder.finish());
                        }
                        builder.push(s, part.highlighted);
                    }
                }
            }
        }
    }

    lines.extend(builder.finish());
    HighlightLayout { lines }
}

/// Drop trailing plain spaces from a line that is about to wrap
fn trim_trailing_space(line: &mut LayoutLine, font: &dyn FontFace) {
    while let Some(last) = line.pieces.last_mut() {
        if last.highlighted {
            break;
        }
        let trimmed_len = last.text.trim_end_matches(' ').len();
        let removed = &last.text[trimmed_len..];
        let removed_width = font.measure(removed);
        last.text.truncate(trimmed_len);
        last.width -= removed_width;
        line.width -= removed_width;
        if last.text.is_empty() {
            line.pieces.pop();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedWidthFont;
    use pretty_assertions::assert_eq;

    fn font() -> FixedWidthFont {
        // 4 px per character makes widths easy to reason about
        FixedWidthFont::new(4, 6)
    }

    #[test]
    fn test_wrap_packs_greedily() {
        let lines = wrap_text("the quick brown fox", &font(), 40.0);
        assert_eq!(lines, vec!["the quick", "brown fox"]);
    }

    #[test]
    fn test_wrap_hard_breaks_long_word() {
        let lines = wrap_text("hi abcdefghijkl", &font(), 20.0);
        assert_eq!(lines, vec!["hi", "abcde", "fghij", "kl"]);
    }

    #[test]
    fn test_wrap_long_word_tail_continues_line() {
        let lines = wrap_text("abcdefg hi", &font(), 20.0);
        assert_eq!(lines, vec!["abcde", "fg hi"]);
    }

    #[test]
    fn test_wrap_empty_text() {
        assert!(wrap_text("", &font(), 20.0).is_empty());
    }

    #[test]
    fn test_highlight_markers_are_not_rendered() {
        let layout = layout_highlighted("hel[lo]", &font(), 100.0);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].text(), "hello");
        let pieces = &layout.lines[0].pieces;
        assert_eq!(pieces.len(), 2);
        assert!(!pieces[0].highlighted);
        assert!(pieces[1].highlighted);
        // 3 chars, then 2 chars plus a pad on each side
        assert_eq!(pieces[1].x, 12.0);
        assert_eq!(pieces[1].width, 10.0);
        assert_eq!(layout.cursor_x(), 22.0);
    }

    #[test]
    fn test_highlight_after_space_absorbs_left_pad() {
        let layout = layout_highlighted("go [on]", &font(), 100.0);
        let pieces = &layout.lines[0].pieces;
        assert_eq!(pieces[0].text, "go ");
        assert_eq!(pieces[1].x, 11.0);
        assert_eq!(pieces[1].width, 10.0);
        assert_eq!(layout.cursor_x(), 21.0);
    }

    #[test]
    fn test_spacing_preserved_across_segments() {
        let layout = layout_highlighted("a  b[c] d", &font(), 100.0);
        assert_eq!(layout.lines[0].text(), "a  bc d");
    }

    #[test]
    fn test_glued_word_wraps_as_unit() {
        // "abc" + "[de]" is one 22 px word and does not fit after "xy "
        let layout = layout_highlighted("xy abc[de]", &font(), 30.0);
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.lines[0].text(), "xy");
        assert_eq!(layout.lines[1].text(), "abcde");
    }

    #[test]
    fn test_word_with_two_highlights_counts_both_pads() {
        // "[a]b[c]" after "xx " needs 15 px, not 14, so it moves down whole
        let layout = layout_highlighted("xx [a]b[c]", &font(), 26.0);
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.lines[0].text(), "xx");
        assert_eq!(layout.lines[1].text(), "abc");
        assert_eq!(layout.lines[1].width, 16.0);
    }

    #[test]
    fn test_long_space_run_wraps() {
        let text = format!("ab{}cd", " ".repeat(20));
        let layout = layout_highlighted(&text, &font(), 40.0);
        let texts: Vec<String> = layout.lines.iter().map(LayoutLine::text).collect();
        assert_eq!(texts, vec!["ab", "cd"]);
        assert!(layout.lines.iter().all(|l| l.width <= 40.0));
    }

    #[test]
    fn test_unclosed_highlight_runs_to_end() {
        let layout = layout_highlighted("ab[cd", &font(), 100.0);
        assert!(layout.lines[0].pieces[1].highlighted);
        assert_eq!(layout.lines[0].pieces[1].text, "cd");
    }

    #[test]
    fn test_empty_layout_cursor_at_origin() {
        let layout = layout_highlighted("", &font(), 100.0);
        assert!(layout.lines.is_empty());
        assert_eq!(layout.cursor_x(), 0.0);
    }
}
