//! CSV rendering for report downloads
//!
//! Output is UTF-8 with a byte order mark so spreadsheet tools detect the
//! encoding, CRLF record separators and RFC 4180 quoting.

const BOM: &str = "\u{feff}";

pub struct CsvWriter {
    buf: String,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self {
            buf: String::from(BOM),
        }
    }

    pub fn write_record<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
            }
            push_field(&mut self.buf, field.as_ref());
        }
        self.buf.push_str("\r\n");
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn push_field(buf: &mut String, field: &str) {
    let needs_quotes = field
        .chars()
        .any(|c| matches!(c, ',' | '"' | '\r' | '\n'))
        || field.starts_with(' ')
        || field.ends_with(' ');
    if needs_quotes {
        buf.push('"');
        buf.push_str(&field.replace('"', "\"\""));
        buf.push('"');
    } else {
        buf.push_str(field);
    }
}

/// Empty string for absent values
pub fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
