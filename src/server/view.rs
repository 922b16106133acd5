//! Page rendering for room views.
//!
//! Rendering is pluggable: the server only hands a room id and a needs
//! snapshot to a [`RoomRenderer`]. [`HtmlRenderer`] is bare markup wired
//! for a Datastar frontend; deployments with real templates supply their
//! own renderer.

use crate::needs::NeedsState;

/// Renders the pages served for a room.
pub trait RoomRenderer: Send + Sync {
    /// Read-only viewer page.
    fn render_room(&self, room: &str, needs: &NeedsState) -> String;

    /// Controller page with editable gauges.
    fn render_control(&self, room: &str, needs: &NeedsState) -> String;
}

/// Minimal built-in HTML renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    fn page(title: &str, needs: &NeedsState, body_attrs: &str, content: &str) -> String {
        // Serializing plain integers cannot fail.
        let signals = serde_json::to_string(needs).unwrap_or_default();
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n\
             <body data-signals='{}' {}>\n{}</body>\n</html>\n",
            escape_html(title),
            escape_html(&signals),
            body_attrs,
            content
        )
    }
}

impl RoomRenderer for HtmlRenderer {
    fn render_room(&self, room: &str, needs: &NeedsState) -> String {
        let title = format!("Sim {}", room);
        let room = escape_html(room);
        let mut content = format!("<h1>Sim {}</h1>\n<ul>\n", room);
        for (name, level, _) in needs.gauges() {
            content.push_str(&format!(
                "<li>{}: <span data-text=\"${}\">{}</span></li>\n",
                name, name, level
            ));
        }
        content.push_str("</ul>\n");

        let attrs = format!("data-on-load=\"@get('/{}/connect')\"", room);
        Self::page(&title, needs, &attrs, &content)
    }

    fn render_control(&self, room: &str, needs: &NeedsState) -> String {
        let title = format!("Control sim {}", room);
        let room = escape_html(room);
        let mut content = format!("<h1>Control sim {}</h1>\n", room);
        for (name, level, rate) in needs.gauges() {
            content.push_str(&format!(
                "<label>{name} <input type=\"number\" data-bind=\"{name}\" value=\"{level}\"></label>\n\
                 <label>{name} rate <input type=\"number\" data-bind=\"{name}Rate\" value=\"{rate}\"></label>\n",
            ));
        }
        content.push_str(&format!(
            "<button data-on-click=\"@post('/{}/control')\">Update</button>\n",
            room
        ));

        Self::page(&title, needs, "", &content)
    }
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
