//! SMTP reply parsing.
//!
//! Canonical line grammar: `<3-digit code><'-' or ' '><text>`. A `'-'`
//! separator continues the reply on the next line; the final line uses a
//! space. Every line of one reply must carry the same code.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::SmtpError;

/// One complete (possibly multi-line) server reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub code: u16,
    /// Text of each line, separator stripped. The first line is the
    /// human-readable banner; EHLO capability keywords follow.
    pub lines: Vec<String>,
}

impl Reply {
    /// All line texts joined, for error messages.
    pub fn text(&self) -> String {
        self.lines.join(" / ")
    }
}

/// Read one full reply off the wire.
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Reply, SmtpError> {
    let mut code: Option<u16> = None;
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        let n = reader.read_line(&mut raw).await?;
        if n == 0 {
            return Err(SmtpError::Closed);
        }
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.len() < 3 || !line.as_bytes()[..3].iter().all(u8::is_ascii_digit) {
            return Err(SmtpError::Malformed(line.to_string()));
        }
        let this_code: u16 = line[..3].parse().unwrap_or(0);
        match code {
            None => code = Some(this_code),
            Some(c) if c != this_code => return Err(SmtpError::Malformed(line.to_string())),
            Some(_) => {}
        }
        let (done, text) = match line.as_bytes().get(3) {
            None => (true, ""),
            Some(b' ') => (true, &line[4..]),
            Some(b'-') => (false, &line[4..]),
            Some(_) => return Err(SmtpError::Malformed(line.to_string())),
        };
        lines.push(text.to_string());
        if done {
            // code is always Some here
            return Ok(Reply {
                code: code.unwrap_or(0),
                lines,
            });
        }
    }
}
