//! Message rendering and DATA-phase escaping.

use chrono::Utc;
use uuid::Uuid;

/// One outgoing email. `html`, when present, is sent as a
/// multipart/alternative sibling of the plain text part.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Header values must never smuggle line breaks into the message.
fn sanitize_header(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Render the full RFC 5322 message: headers, MIME structure, body.
/// Dot-stuffing happens later, on the wire.
pub fn render_message(email: &OutgoingEmail, client_name: &str) -> String {
    let mut msg = String::new();
    msg.push_str(&format!("From: {}\r\n", sanitize_header(&email.from)));
    msg.push_str(&format!("To: {}\r\n", sanitize_header(&email.to)));
    msg.push_str(&format!("Subject: {}\r\n", sanitize_header(&email.subject)));
    msg.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
    msg.push_str(&format!(
        "Message-ID: <{}@{}>\r\n",
        Uuid::new_v4().simple(),
        sanitize_header(client_name)
    ));
    msg.push_str("MIME-Version: 1.0\r\n");

    match &email.html {
        Some(html) => {
            let boundary = format!("=_pw_{}", Uuid::new_v4().simple());
            msg.push_str(&format!(
                "Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n\r\n"
            ));
            msg.push_str(&format!("--{boundary}\r\n"));
            msg.push_str("Content-Type: text/plain; charset=utf-8\r\n");
            msg.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
            msg.push_str(&email.text);
            msg.push_str(&format!("\r\n--{boundary}\r\n"));
            msg.push_str("Content-Type: text/html; charset=utf-8\r\n");
            msg.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
            msg.push_str(html);
            msg.push_str(&format!("\r\n--{boundary}--\r\n"));
        }
        None => {
            msg.push_str("Content-Type: text/plain; charset=utf-8\r\n");
            msg.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
            msg.push_str(&email.text);
            msg.push_str("\r\n");
        }
    }
    msg
}

/// Normalize line endings to CRLF and escape leading dots so the body can
/// never contain an unescaped `\r\n.\r\n` terminator sequence.
pub fn dot_stuff(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 16);
    for line in body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}
