//! HTML pages shown to the browser.

use crate::SsoError;

const STYLES: &str = r#"
body { font-family: system-ui, -apple-system, "Segoe UI", sans-serif; background: #f4f5f7; color: #1d2327; margin: 0; }
.container { max-width: 560px; margin: 10vh auto; padding: 0 16px; }
.card { background: #fff; border-radius: 8px; box-shadow: 0 1px 3px rgba(0,0,0,.12); padding: 32px; }
.error-title { font-size: 20px; font-weight: 600; margin-bottom: 12px; }
.error-description { line-height: 1.5; }
.error-code { margin-top: 16px; font-family: ui-monospace, monospace; font-size: 12px; color: #646970; }
a { color: #2271b1; }
"#;

fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str("    <title>");
    html.push_str(&html_escape(title));
    html.push_str("</title>\n    <style>");
    html.push_str(STYLES);
    html.push_str("</style>\n</head>\n<body>\n    <div class=\"container\">\n");
    html.push_str(content);
    html.push_str("\n    </div>\n</body>\n</html>");
    html
}

/// Renders the page shown when a login aborts.
///
/// The message carries the stable login error prefix followed by the
/// reason; the error code is shown underneath for support requests.
pub fn render_login_error(error: &SsoError, home_url: &str) -> String {
    let mut content = String::with_capacity(512);
    content.push_str("<div class=\"card\">\n");
    content.push_str("<div class=\"error-title\">Login failed</div>\n");
    content.push_str("<div class=\"error-description\">");
    content.push_str(&html_escape(&error.user_message()));
    content.push_str("</div>\n<div class=\"error-code\">");
    content.push_str(&html_escape(error.code()));
    content.push_str("</div>\n<p><a href=\"");
    content.push_str(&html_escape(home_url));
    content.push_str("\">Back to the site</a></p>\n</div>");
    html_page("Login failed", &content)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LOGIN_ERROR_PREFIX;

    #[test]
    fn test_login_error_page() {
        let html = render_login_error(&SsoError::IssuerMismatch, "https://site.example.com/");
        assert!(html.contains(LOGIN_ERROR_PREFIX));
        assert!(html.contains("Issuer does not match."));
        assert!(html.contains("issuer_mismatch"));
        assert!(html.contains("href=\"https://site.example.com/\""));
    }

    #[test]
    fn test_error_text_is_escaped() {
        let html = render_login_error(&SsoError::token_exchange(400, "<script>x</script>"), "/");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
