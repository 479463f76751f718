//! Markdown-aware splitting of long replies into platform-sized chunks.
//!
//! Text is cut on blank lines first, then on whitespace, and only as a last
//! resort at an exact character count. Fenced code blocks stay balanced in
//! every chunk: when a cut lands inside a fence, the chunk is closed with
//! ```` ``` ```` and the next one re-opens the fence with the same language tag.
//!
//! Fence tracking is a marker-count heuristic, not a markdown parser. It
//! assumes fences are well formed and not nested; mismatched markers leave
//! the fence state undefined but never cause a failure.
//!
//! All lengths are in characters (Unicode scalar values), which is how chat
//! platforms count their limits.

const FENCE: &str = "```";
const CLOSE_FENCE: &str = "\n```";
const CLOSE_FENCE_LEN: usize = 4;
const PARAGRAPH_SEP: &str = "\n\n";
const PARAGRAPH_SEP_LEN: usize = 2;

/// Split `text` into chunks of at most `max_len` characters.
///
/// Never returns an empty vector. Text that already fits is returned as the
/// single chunk, untouched (including the empty string).
pub fn split(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    if char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut splitter = Splitter::new(max_len);
    for paragraph in text.split(PARAGRAPH_SEP) {
        splitter.push_paragraph(paragraph);
    }
    enforce_limit(splitter.finish(), max_len)
}

/// Cut `text` into pieces of exactly `max_len` characters (the last may be
/// shorter), ignoring words and formatting.
pub fn hard_split(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    if text.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_len)
        .map(|piece| piece.iter().collect())
        .collect()
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Hard-slice anything still over the limit (whitespace-free runs).
fn enforce_limit(chunks: Vec<String>, max_len: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if char_len(&chunk) <= max_len {
            out.push(chunk);
        } else {
            out.extend(hard_split(&chunk, max_len));
        }
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

#[derive(Debug, Default)]
struct Fence {
    open: bool,
    /// Tag of the most recently opened fence; empty for an untagged fence.
    lang: String,
}

impl Fence {
    /// Whether the fence would be open after `text` is appended.
    fn open_after(&self, text: &str) -> bool {
        self.open ^ (text.matches(FENCE).count() % 2 == 1)
    }

    fn scan(&mut self, text: &str) {
        if text.matches(FENCE).count() % 2 == 0 {
            return;
        }
        self.open = !self.open;
        if self.open {
            // With an odd count, the last marker is the unmatched opener.
            if let Some(pos) = text.rfind(FENCE) {
                let rest = &text[pos + FENCE.len()..];
                self.lang = rest.lines().next().unwrap_or("").trim().to_string();
            }
        }
    }

    fn reopen_marker(&self) -> String {
        format!("{FENCE}{}\n", self.lang)
    }
}

struct Splitter {
    max_len: usize,
    chunks: Vec<String>,
    buffer: String,
    buffer_len: usize,
    /// False while `buffer` is empty or holds only a re-opened fence marker.
    has_content: bool,
    fence: Fence,
}

impl Splitter {
    fn new(max_len: usize) -> Self {
        Self {
            max_len,
            chunks: Vec::new(),
            buffer: String::new(),
            buffer_len: 0,
            has_content: false,
            fence: Fence::default(),
        }
    }

    fn push_paragraph(&mut self, paragraph: &str) {
        if !self.has_content && paragraph.trim().is_empty() {
            return;
        }
        let len = char_len(paragraph);
        let reserve = self.close_reserve(paragraph);

        if self.has_content && self.buffer_len + PARAGRAPH_SEP_LEN + len + reserve > self.max_len {
            self.flush();
        }

        let sep = if self.has_content { PARAGRAPH_SEP_LEN } else { 0 };
        if self.buffer_len + sep + len + reserve <= self.max_len {
            if self.has_content {
                self.push_str(PARAGRAPH_SEP);
            }
            self.push_str(paragraph);
            self.has_content = true;
            self.fence.scan(paragraph);
        } else {
            self.flush();
            self.pack_words(paragraph);
        }
    }

    /// Greedily pack an oversized paragraph word by word. Each word keeps its
    /// trailing whitespace so line structure inside code blocks survives.
    fn pack_words(&mut self, paragraph: &str) {
        for word in paragraph.split_inclusive(char::is_whitespace) {
            // A chunk never starts with bare whitespace.
            if !self.has_content && word.trim().is_empty() {
                continue;
            }
            let len = char_len(word);
            let reserve = self.close_reserve(word);
            if self.has_content && self.buffer_len + len + reserve > self.max_len {
                self.flush();
            }
            self.push_str(word);
            self.has_content = true;
            self.fence.scan(word);
        }
    }

    /// Room needed for a closing marker if the fence would be open after `next`.
    fn close_reserve(&self, next: &str) -> usize {
        if self.fence.open_after(next) {
            CLOSE_FENCE_LEN
        } else {
            0
        }
    }

    fn push_str(&mut self, s: &str) {
        self.buffer.push_str(s);
        self.buffer_len += char_len(s);
    }

    fn flush(&mut self) {
        if !self.has_content {
            return;
        }
        if self.fence.open {
            self.buffer.push_str(CLOSE_FENCE);
        }
        self.chunks.push(std::mem::take(&mut self.buffer));
        self.buffer_len = 0;
        self.has_content = false;

        if self.fence.open {
            let marker = self.fence.reopen_marker();
            self.push_str(&marker);
        }
    }

    fn finish(mut self) -> Vec<String> {
        if self.has_content {
            if self.fence.open {
                self.buffer.push_str(CLOSE_FENCE);
            }
            self.chunks.push(self.buffer);
        }
        self.chunks
    }
}
