/// Template renderer for the demo page.
///
/// `studio/assets/demo.html` is loaded at compile time; handlers fill its
/// `{{TOKEN}}` placeholders through a closure and anything left over is
/// blanked.

const TEMPLATE: &str = include_str!("assets/demo.html");

pub fn render_page<F>(fill: F) -> String
where
    F: FnOnce(String) -> String,
{
    let html = TEMPLATE.replace("{{VERSION}}", env!("CARGO_PKG_VERSION"));
    blank_remaining(fill(html))
}

/// Replaces any `{{TOKEN}}` that wasn't already substituted with an empty
/// string.
fn blank_remaining(mut html: String) -> String {
    while let Some(start) = html.find("{{") {
        if let Some(end) = html[start..].find("}}") {
            let abs_end = start + end + 2;
            html.replace_range(start..abs_end, "");
        } else {
            break;
        }
    }
    html
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfilled_tokens_are_blanked() {
        assert_eq!(blank_remaining("a{{X}}b{{Y_Z}}c".into()), "abc");
        assert_eq!(blank_remaining("open {{ only".into()), "open {{ only");
    }

    #[test]
    fn page_has_no_placeholders_left() {
        let html = render_page(|h| h.replace("{{RESULT}}", "<p>done</p>"));
        assert!(html.contains("<p>done</p>"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
