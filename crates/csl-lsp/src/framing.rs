//! LSP base-protocol framing over a byte channel.
//!
//! A message is `Content-Length: N` followed by a blank line and `N`
//! bytes of UTF-8 JSON. Header lines may end in `\n` or `\r\n`; the
//! style seen first on input is reused for output.

use std::io::{self, BufRead, Write};

/// Header line-ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Crlf,
}

impl LineEnding {
    fn separator(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }
}

/// Read one framed message. Returns `Ok(None)` at end of input.
///
/// The first blank header line seen decides `detected` when it is still
/// unset.
pub fn read_message<R: BufRead>(
    reader: &mut R,
    detected: &mut Option<LineEnding>,
) -> io::Result<Option<String>> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = Vec::new();
        let read = read_header_line(reader, &mut line)?;
        if read == 0 {
            // End of input. Mid-header EOF means the peer went away.
            return Ok(None);
        }

        let is_blank = line == b"\n" || line == b"\r\n";
        if is_blank {
            if detected.is_none() {
                *detected = Some(if line.len() == 1 {
                    LineEnding::Lf
                } else {
                    LineEnding::Crlf
                });
            }
            if let Some(len) = content_length {
                let mut body = vec![0u8; len];
                reader.read_exact(&mut body)?;
                return Ok(Some(String::from_utf8_lossy(&body).into_owned()));
            }
            continue;
        }

        let text = String::from_utf8_lossy(&line);
        if let Some(rest) = text.strip_prefix("Content-Length:") {
            content_length = rest.trim().parse::<usize>().ok();
        }
    }
}

fn read_header_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<usize> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte)? {
            0 => return Ok(line.len()),
            _ => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    return Ok(line.len());
                }
            }
        }
    }
}

/// Write one framed message using the given (or default LF) line ending.
pub fn write_message<W: Write>(
    writer: &mut W,
    ending: Option<LineEnding>,
    content: &str,
) -> io::Result<()> {
    let sep = ending.unwrap_or(LineEnding::Lf).separator();
    write!(
        writer,
        "Content-Length: {}{}{}",
        content.len(),
        sep,
        sep
    )?;
    writer.write_all(content.as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_lf_frame() {
        let data = b"Content-Length: 2\n\n{}".to_vec();
        let mut reader = Cursor::new(data);
        let mut detected = None;
        let msg = read_message(&mut reader, &mut detected).unwrap();
        assert_eq!(msg.as_deref(), Some("{}"));
        assert_eq!(detected, Some(LineEnding::Lf));
    }

    #[test]
    fn test_read_crlf_frame() {
        let data = b"Content-Length: 4\r\n\r\nnull".to_vec();
        let mut reader = Cursor::new(data);
        let mut detected = None;
        let msg = read_message(&mut reader, &mut detected).unwrap();
        assert_eq!(msg.as_deref(), Some("null"));
        assert_eq!(detected, Some(LineEnding::Crlf));
    }

    #[test]
    fn test_eof_returns_none() {
        let mut reader = Cursor::new(Vec::new());
        let mut detected = None;
        assert!(read_message(&mut reader, &mut detected).unwrap().is_none());
    }

    #[test]
    fn test_extra_headers_ignored() {
        let data =
            b"Content-Length: 2\r\nContent-Type: application/vscode-jsonrpc\r\n\r\n{}".to_vec();
        let mut reader = Cursor::new(data);
        let mut detected = None;
        let msg = read_message(&mut reader, &mut detected).unwrap();
        assert_eq!(msg.as_deref(), Some("{}"));
    }

    #[test]
    fn test_write_uses_detected_style() {
        let mut out = Vec::new();
        write_message(&mut out, Some(LineEnding::Crlf), "{}").unwrap();
        assert_eq!(out, b"Content-Length: 2\r\n\r\n{}");

        let mut out = Vec::new();
        write_message(&mut out, Some(LineEnding::Lf), "{}").unwrap();
        assert_eq!(out, b"Content-Length: 2\n\n{}");
    }

    #[test]
    fn test_round_trip_sequence() {
        let mut stream = Vec::new();
        write_message(&mut stream, Some(LineEnding::Lf), "first").unwrap();
        write_message(&mut stream, Some(LineEnding::Lf), "second").unwrap();
        let mut reader = Cursor::new(stream);
        let mut detected = None;
        assert_eq!(
            read_message(&mut reader, &mut detected).unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            read_message(&mut reader, &mut detected).unwrap().as_deref(),
            Some("second")
        );
        assert!(read_message(&mut reader, &mut detected).unwrap().is_none());
    }
}
