//! HTML projection of the record log for `GET /history`.

use std::fmt::Write;

use crate::storage::Record;

pub const NO_TEXT_PLACEHOLDER: &str = "(no text)";

/// Render records in the order given (storage hands them over newest first).
pub fn render_history(records: &[Record]) -> String {
    let mut html = String::from("<h2>📜 History</h2>\n");

    if records.is_empty() {
        html.push_str("<p>No records yet.</p>\n");
        return html;
    }

    for record in records {
        let text = record
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
            .map_or_else(|| NO_TEXT_PLACEHOLDER.to_string(), escape_html);

        let _ = writeln!(html, "<div class=\"record\">");
        let _ = writeln!(
            html,
            "  <p><b>{}</b><br>{}</p>",
            escape_html(&record.timestamp),
            text
        );
        if let Some(path) = record.image_path.as_deref().filter(|p| !p.is_empty()) {
            let _ = writeln!(
                html,
                "  <img src=\"/{}\" width=\"200\">",
                escape_html(path.trim_start_matches('/'))
            );
        }
        let _ = writeln!(html, "</div>\n<hr>");
    }

    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, text: Option<&str>, image_path: Option<&str>, timestamp: &str) -> Record {
        Record {
            id,
            text: text.map(ToOwned::to_owned),
            image_path: image_path.map(ToOwned::to_owned),
            timestamp: timestamp.to_owned(),
        }
    }

    #[test]
    fn renders_entries_in_given_order() {
        let records = vec![
            record(
                2,
                None,
                Some("static/images/image_20240101100100.jpg"),
                "2024-01-01 10:01:00",
            ),
            record(1, Some("hello"), None, "2024-01-01 10:00:00"),
        ];

        let html = render_history(&records);

        let newer = html.find("2024-01-01 10:01:00").unwrap();
        let older = html.find("2024-01-01 10:00:00").unwrap();
        assert!(newer < older);
        assert!(html.contains("<img src=\"/static/images/image_20240101100100.jpg\""));
        assert!(html.contains("hello"));
        assert_eq!(html.matches("class=\"record\"").count(), 2);
    }

    #[test]
    fn missing_text_shows_placeholder() {
        let html = render_history(&[record(1, None, Some("static/images/a.jpg"), "t")]);
        assert!(html.contains(NO_TEXT_PLACEHOLDER));
    }

    #[test]
    fn text_only_record_has_no_image_tag() {
        let html = render_history(&[record(1, Some("hi"), None, "t")]);
        assert!(!html.contains("<img"));
    }

    #[test]
    fn text_is_escaped() {
        let html = render_history(&[record(1, Some("<script>alert('x')</script>"), None, "t")]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn empty_log_renders_empty_state() {
        let html = render_history(&[]);
        assert!(html.contains("No records yet."));
        assert!(!html.contains("class=\"record\""));
    }
}
