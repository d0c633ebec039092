// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTML view of the pending fragment sets.

use crate::frame::Frame;
use std::collections::BTreeMap;
use std::fmt::Write as _;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="10">
<title>Fragment buffer</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
th { background: #eee; }
td.hex { font-family: monospace; word-break: break-all; }
</style>
</head>
<body>
<h1>Fragment buffer</h1>
"#;

/// Render every pending set as an HTML table.
pub fn render(pending: &BTreeMap<String, Vec<Frame>>) -> String {
    let mut html = String::from(HEAD);

    if pending.is_empty() {
        html.push_str("<p>No pending fragments.</p>\n</body>\n</html>\n");
        return html;
    }

    let fragments: usize = pending.values().map(Vec::len).sum();
    // Writing into a String cannot fail.
    let _ = writeln!(
        html,
        "<p>{} device(s), {} fragment(s)</p>",
        pending.len(),
        fragments
    );
    html.push_str(
        "<table>\n<tr><th>DevEUI</th><th>#</th><th>FPort</th>\
         <th>Received</th><th>Payload</th></tr>\n",
    );

    for (dev_eui, frames) in pending {
        let dev_eui = escape(dev_eui);
        for (index, frame) in frames.iter().enumerate() {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"hex\">{}</td></tr>",
                dev_eui,
                index + 1,
                frame.f_port,
                frame.received_at.format(TIME_FORMAT),
                frame.payload_hex()
            );
        }
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
