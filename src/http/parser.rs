use crate::http::request::{Method, Request, RequestBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    InvalidRequest,
    MissingTarget,
    InvalidMethod,
}

/// Parses a request head out of whatever the client has sent so far.
///
/// The head ends at the first blank line. When no blank line has arrived
/// the whole buffer is treated as the head, so a truncated request still
/// yields its request line. Only the request line is validated; header
/// lines are kept raw. Returns the request (with an empty body) and the
/// number of bytes consumed; anything after that belongs to the body.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let (head, consumed) = match find_headers_end(buf) {
        Some((head_len, consumed)) => (&buf[..head_len], consumed),
        None => (buf, buf.len()),
    };

    let mut lines = head.split(|&b| b == b'\n').map(trim_cr);

    // Request line
    let request_line = lines.next().ok_or(ParseError::Empty)?;
    let request_line =
        std::str::from_utf8(request_line).map_err(|_| ParseError::InvalidRequest)?;

    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::Empty)?;
    let target = parts.next().ok_or(ParseError::MissingTarget)?;
    let version = parts.next().unwrap_or("HTTP/1.0");

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    // Headers
    let request = lines
        .filter(|line| !line.is_empty())
        .fold(
            RequestBuilder::new().method(method).target(target).version(version),
            |builder, line| builder.header_line(String::from_utf8_lossy(line)),
        )
        .build()
        .map_err(|_| ParseError::MissingTarget)?;

    Ok((request, consumed))
}

/// Locates the blank line ending a request head.
///
/// Accepts `\r\n\r\n` as well as bare `\n\n`. Returns the length of the
/// head (without the terminator) and the offset where the body starts.
pub fn find_headers_end(buf: &[u8]) -> Option<(usize, usize)> {
    buf.iter().enumerate().find_map(|(i, &b)| {
        if b != b'\n' {
            return None;
        }
        match &buf[i + 1..] {
            [b'\n', ..] => Some((i, i + 2)),
            [b'\r', b'\n', ..] => Some((i, i + 3)),
            _ => None,
        }
    })
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
