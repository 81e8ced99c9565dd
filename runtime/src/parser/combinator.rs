//! A minimal parser-combinator kernel (§4.7/§9: "a generic parser-combinator
//! kernel is a prerequisite").
//!
//! [`Cursor`] is a cheap, `Copy` position into a byte slice that tracks
//! line/column as it advances (the parser "consumes a byte iterator
//! producing line/column positions"). Combinators never raise — a failed
//! alternative returns `None` and leaves the caller's cursor untouched,
//! matching "it never throws for backtracking — it returns success/fail".
//! Committed failures (raised by the grammar layer in `canon`, not here)
//! use [`threadscript_core::ThreadScriptError::parse_error`].

#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    pub line: u32,
    pub col: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }
}

/// Matches an exact byte-string literal, backtracking on any mismatch.
pub fn lit<'a>(tag: &'static str) -> impl Fn(Cursor<'a>) -> Option<Cursor<'a>> {
    move |mut cur| {
        for b in tag.bytes() {
            if cur.advance() != Some(b) {
                return None;
            }
        }
        Some(cur)
    }
}

/// Tries each alternative in order, returning the first success. Each
/// alternative only sees the original `cur` (no partial consumption leaks
/// across a failed branch, since `Cursor` is `Copy`).
pub fn alt<'a, T>(cur: Cursor<'a>, parsers: &[&dyn Fn(Cursor<'a>) -> Option<(Cursor<'a>, T)>]) -> Option<(Cursor<'a>, T)> {
    for p in parsers {
        if let Some(r) = p(cur) {
            return Some(r);
        }
    }
    None
}

/// Repeats `p` zero or more times, collecting results; never fails.
pub fn many0<'a, T>(
    mut cur: Cursor<'a>,
    mut p: impl FnMut(Cursor<'a>) -> Option<(Cursor<'a>, T)>,
) -> (Cursor<'a>, Vec<T>) {
    let mut out = Vec::new();
    while let Some((next, v)) = p(cur) {
        cur = next;
        out.push(v);
    }
    (cur, out)
}

/// Runs `p`, transforming a success's value with `f`.
pub fn map<'a, T, U>(
    result: Option<(Cursor<'a>, T)>,
    f: impl FnOnce(T) -> U,
) -> Option<(Cursor<'a>, U)> {
    result.map(|(c, v)| (c, f(v)))
}

/// Runs `p1` then `p2`, succeeding only if both do.
pub fn seq2<'a, T, U>(
    cur: Cursor<'a>,
    p1: impl FnOnce(Cursor<'a>) -> Option<(Cursor<'a>, T)>,
    p2: impl FnOnce(Cursor<'a>) -> Option<(Cursor<'a>, U)>,
) -> Option<(Cursor<'a>, (T, U))> {
    let (cur, a) = p1(cur)?;
    let (cur, b) = p2(cur)?;
    Some((cur, (a, b)))
}
