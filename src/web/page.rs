//! Static landing page.

/// Render the landing page for `api_base`.
///
/// The health link is `{api_base}/health` with the base used as given.
/// The base is HTML-escaped, so a base carrying a query string such as
/// `?a=1&b=2` shows up as `?a=1&amp;b=2` in the raw markup. Browsers decode
/// it back, so the displayed text and the followed href match the input.
pub fn render_index(api_base: &str) -> String {
    let base = escape_html(api_base);
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>ClimSystems AI Agent</title>
  </head>
  <body>
    <h1>ClimSystems AI Agent</h1>
    <p>Web placeholder. The API is served from <code>{base}</code>.</p>
    <p><a href="{base}/health">Check API health</a></p>
  </body>
</html>
"#
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
