//! Language-agnostic block segmentation.
//!
//! Activated when no language-specific parser exists for a file. Splits on
//! blank-line runs, heading markers, indentation resets, and tag lines while
//! holding blocks open across unbalanced brackets. Each block is re-submitted
//! to detection with a narrowed content sample; the segmenter's own output is
//! always `detectors-only` / basic and is never preferred over a registered
//! parser.

/// One segmented block with a sample for content re-detection.
#[derive(Debug, Clone)]
pub struct Block {
    pub start_line: u32,
    pub end_line: u32,
    pub sample: String,
}

#[derive(Debug, Clone)]
pub struct Segmenter {
    /// Blank lines required to split two blocks.
    pub blank_run: usize,
    /// Max lines carried into a block's detection sample.
    pub sample_lines: usize,
    /// Blocks shorter than this merge into their neighbor.
    pub min_block_lines: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Segmenter {
            blank_run: 1,
            sample_lines: 40,
            min_block_lines: 2,
        }
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Divide `content` into blocks. Lines are 1-based inclusive; blank
    /// separator lines belong to no block.
    pub fn segment(&self, content: &str) -> Vec<Block> {
        let lines: Vec<&str> = content.lines().collect();
        let mut raw: Vec<(usize, usize)> = Vec::new(); // 0-based inclusive
        let mut start: Option<usize> = None;
        let mut blanks = 0usize;
        let mut depth = 0i64;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                blanks += 1;
                // Split only on a sufficient blank run outside any bracket.
                if blanks >= self.blank_run && depth <= 0 {
                    if let Some(s) = start.take() {
                        raw.push((s, i - blanks));
                    }
                }
                continue;
            }

            let starts_block =
                start.is_none() || (depth <= 0 && blanks == 0 && is_block_opener(trimmed));
            blanks = 0;
            depth += bracket_delta(trimmed);

            if starts_block {
                if let Some(s) = start.take() {
                    if i > 0 {
                        raw.push((s, i - 1));
                    }
                }
                start = Some(i);
            }
        }
        if let Some(s) = start {
            raw.push((s, lines.len().saturating_sub(1)));
        }

        // Merge runt blocks forward so detection has something to chew on.
        let mut merged: Vec<(usize, usize)> = Vec::new();
        for (s, e) in raw {
            if e < s {
                continue;
            }
            match merged.last_mut() {
                Some(last) if (e - s + 1) < self.min_block_lines && last.1 + 2 >= s => {
                    last.1 = e;
                }
                _ => merged.push((s, e)),
            }
        }

        merged
            .into_iter()
            .map(|(s, e)| {
                let sample_end = (s + self.sample_lines).min(e + 1);
                Block {
                    start_line: s as u32 + 1,
                    end_line: e as u32 + 1,
                    sample: lines[s..sample_end].join("\n"),
                }
            })
            .collect()
    }
}

/// Heading markers and tag openers start a new block even without a blank
/// separator.
fn is_block_opener(trimmed: &str) -> bool {
    if trimmed.starts_with('#') && trimmed.len() > 1 {
        return true;
    }
    if trimmed.starts_with('<') && !trimmed.starts_with("</") {
        return true;
    }
    // Underline-style headings.
    if trimmed.chars().all(|c| c == '=') && trimmed.len() >= 3 {
        return true;
    }
    if trimmed.chars().all(|c| c == '-') && trimmed.len() >= 3 {
        return true;
    }
    false
}

fn bracket_delta(line: &str) -> i64 {
    let mut delta = 0i64;
    for ch in line.chars() {
        match ch {
            '{' | '[' | '(' => delta += 1,
            '}' | ']' | ')' => delta -= 1,
            _ => {}
        }
    }
    delta
}
