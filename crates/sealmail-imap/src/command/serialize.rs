//! Compiles requests into wire chunks.
//!
//! A command is sent as one or more chunks. The first chunk goes out
//! immediately; every further chunk waits for a `+` continuation from the
//! server. Literals and [`Attribute::Chunk`] nodes are where a command splits.
//! The final CRLF is not part of the last chunk; the sender appends it.

use crate::types::{Attribute, Request};

/// Compiles a request into wire chunks.
///
/// Every chunk but the last ends with CRLF (either the `{n}\r\n` of a literal
/// announcement or the line end before a continuation chunk).
#[must_use]
pub fn compile(request: &Request, tag: &str) -> Vec<Vec<u8>> {
    let mut compiler = Compiler::default();
    compiler.buf.extend_from_slice(tag.as_bytes());
    compiler.buf.push(b' ');
    compiler.buf.extend_from_slice(request.command.trim().as_bytes());
    compiler.write_all(&request.attributes);
    compiler.finish()
}

/// Renders a request for logs. Sensitive requests show the verb only.
#[must_use]
pub fn redacted(request: &Request, tag: &str) -> String {
    if request.sensitive {
        return format!("{tag} {} [redacted]", request.verb());
    }
    let mut out = Vec::new();
    for (i, chunk) in compile(request, tag).iter().enumerate() {
        if i > 0 {
            out.push(b'~');
        }
        out.extend_from_slice(chunk);
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Default)]
struct Compiler {
    chunks: Vec<Vec<u8>>,
    buf: Vec<u8>,
}

impl Compiler {
    fn finish(mut self) -> Vec<Vec<u8>> {
        self.chunks.push(self.buf);
        self.chunks
    }

    fn end_chunk(&mut self) {
        self.chunks.push(std::mem::take(&mut self.buf));
    }

    fn write_all(&mut self, attributes: &[Attribute]) {
        for attr in attributes {
            if !matches!(attr, Attribute::Chunk(_)) {
                self.buf.push(b' ');
            }
            self.write(attr);
        }
    }

    fn write_joined(&mut self, attributes: &[Attribute]) {
        for (i, attr) in attributes.iter().enumerate() {
            if i > 0 && !matches!(attr, Attribute::Chunk(_)) {
                self.buf.push(b' ');
            }
            self.write(attr);
        }
    }

    fn write(&mut self, attr: &Attribute) {
        match attr {
            Attribute::Atom(s) | Attribute::Sequence(s) | Attribute::Text(s) => {
                self.buf.extend_from_slice(s.as_bytes());
            }
            Attribute::Number(n) => self.buf.extend_from_slice(n.to_string().as_bytes()),
            Attribute::String(s) => {
                if s.bytes().any(needs_literal) {
                    self.write_literal(s.as_bytes());
                } else {
                    write_quoted(&mut self.buf, s);
                }
            }
            Attribute::Literal(data) => self.write_literal(data),
            Attribute::Chunk(s) => {
                self.buf.extend_from_slice(b"\r\n");
                self.end_chunk();
                self.buf.extend_from_slice(s.as_bytes());
            }
            Attribute::List(items) => {
                self.buf.push(b'(');
                self.write_joined(items);
                self.buf.push(b')');
            }
            Attribute::Section {
                name,
                items,
                partial,
            } => {
                self.buf.extend_from_slice(name.as_bytes());
                self.buf.push(b'[');
                self.write_joined(items);
                self.buf.push(b']');
                if let Some(partial) = partial {
                    let range = match partial.length {
                        Some(length) => format!("<{}.{length}>", partial.start),
                        None => format!("<{}>", partial.start),
                    };
                    self.buf.extend_from_slice(range.as_bytes());
                }
            }
            Attribute::Nil => self.buf.extend_from_slice(b"NIL"),
        }
    }

    fn write_literal(&mut self, data: &[u8]) {
        self.buf
            .extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.end_chunk();
        self.buf.extend_from_slice(data);
    }
}

/// Writes a quoted string, escaping `"` and `\`.
fn write_quoted(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Bytes that can't appear in a quoted string.
const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\r' | b'\n' | 0) || b > 0x7F
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Partial;

    fn compile_str(request: &Request, tag: &str) -> Vec<String> {
        compile(request, tag)
            .into_iter()
            .map(|c| String::from_utf8(c).unwrap())
            .collect()
    }

    #[test]
    fn test_simple() {
        assert_eq!(compile_str(&Request::new("NOOP"), "W1"), ["W1 NOOP"]);
    }

    #[test]
    fn test_select_quotes_mailbox() {
        let request = Request::new("SELECT").attribute(Attribute::string("Sent \"Items\""));
        assert_eq!(compile_str(&request, "W2"), ["W2 SELECT \"Sent \\\"Items\\\"\""]);
    }

    #[test]
    fn test_fetch_with_section() {
        let request = Request::new("UID FETCH").attributes(vec![
            Attribute::sequence("1:*"),
            Attribute::List(vec![
                Attribute::atom("UID"),
                Attribute::Section {
                    name: "BODY.PEEK".to_string(),
                    items: vec![Attribute::atom("HEADER")],
                    partial: Some(Partial {
                        start: 0,
                        length: Some(100),
                    }),
                },
            ]),
        ]);
        assert_eq!(
            compile_str(&request, "W3"),
            ["W3 UID FETCH 1:* (UID BODY.PEEK[HEADER]<0.100>)"]
        );
    }

    #[test]
    fn test_literal_splits_chunks() {
        let request = Request::new("APPEND").attributes(vec![
            Attribute::string("INBOX"),
            Attribute::List(vec![Attribute::atom("\\Seen")]),
            Attribute::literal(&b"Subject: hi\r\n\r\nbody"[..]),
        ]);
        assert_eq!(
            compile_str(&request, "W4"),
            [
                "W4 APPEND \"INBOX\" (\\Seen) {19}\r\n",
                "Subject: hi\r\n\r\nbody"
            ]
        );
    }

    #[test]
    fn test_non_ascii_string_becomes_literal() {
        let request = Request::new("LOGIN")
            .attributes(vec![Attribute::string("jürgen"), Attribute::string("pw")]);
        let chunks = compile(&request, "W5");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], b"W5 LOGIN {7}\r\n");
        assert_eq!(chunks[1], "jürgen \"pw\"".as_bytes());
    }

    #[test]
    fn test_chunk_waits_for_continuation() {
        let request = Request::new("AUTHENTICATE")
            .attributes(vec![Attribute::atom("PLAIN"), Attribute::Chunk("AGZvbwBiYXI=".into())]);
        assert_eq!(
            compile_str(&request, "W6"),
            ["W6 AUTHENTICATE PLAIN\r\n", "AGZvbwBiYXI="]
        );
    }

    #[test]
    fn test_nil_and_numbers() {
        let request = Request::new("ID").attribute(Attribute::Nil);
        assert_eq!(compile_str(&request, "W7"), ["W7 ID NIL"]);
        let request = Request::new("FETCH")
            .attributes(vec![Attribute::Number(5), Attribute::atom("FLAGS")]);
        assert_eq!(compile_str(&request, "W8"), ["W8 FETCH 5 FLAGS"]);
    }

    #[test]
    fn test_redacted() {
        let request = Request::new("LOGIN")
            .attributes(vec![Attribute::string("me"), Attribute::string("secret")])
            .sensitive();
        let line = redacted(&request, "W1");
        assert!(!line.contains("secret"));
        assert_eq!(line, "W1 LOGIN [redacted]");
    }
}
