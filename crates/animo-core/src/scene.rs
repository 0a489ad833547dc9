//! Scene source generation.
//!
//! Requests either carry a complete scene (`code`) or are expanded from a
//! fixed template: a title card, one body block chosen by [`SceneKind`], and
//! a closing card. User-supplied code goes through [`sanitize`] first.

use crate::error::RenderError;
use crate::types::{Palette, RenderRequest, SceneKind};

/// Modules a submitted scene may not import.
const FORBIDDEN_IMPORTS: &[&str] = &["os", "sys", "subprocess", "eval", "exec", "__import__"];

/// Call tokens a submitted scene may not contain.
const FORBIDDEN_KEYWORDS: &[&str] = &["open(", "file(", "input(", "raw_input("];

/// Body shown when the request carries no text.
const DEFAULT_EQUATION: &str = r"a^2 + b^2 = c^2";

const CLOSING_TEXT: &str = "Ders Sonu";

/// Line width used when wrapping plain text bodies.
const WRAP_WIDTH: usize = 42;

/// Build the Python source rendered for `req`.
pub fn scene_source(req: &RenderRequest) -> Result<String, RenderError> {
    match &req.code {
        Some(code) => sanitize(code).map(str::to_owned),
        None => Ok(render_template(req)),
    }
}

/// Reject scene code that reaches outside the renderer sandbox.
pub fn sanitize(code: &str) -> Result<&str, RenderError> {
    for module in FORBIDDEN_IMPORTS {
        if imports_module(code, "import", module) || imports_module(code, "from", module) {
            return Err(RenderError::Rejected(format!("Forbidden import: {module}")));
        }
    }
    for keyword in FORBIDDEN_KEYWORDS {
        if code.contains(keyword) {
            return Err(RenderError::Rejected(format!("Forbidden keyword: {keyword}")));
        }
    }
    Ok(code)
}

/// Returns `true` if `name` is usable as a Python class name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// `"{keyword} {module}"` followed by a non-identifier character or the end.
fn imports_module(code: &str, keyword: &str, module: &str) -> bool {
    let needle = format!("{keyword} {module}");
    code.match_indices(&needle).any(|(at, _)| {
        let before_ok = code[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !(c == '_' || c.is_ascii_alphanumeric()));
        let after_ok = code[at + needle.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c == '_' || c.is_ascii_alphanumeric()));
        before_ok && after_ok
    })
}

fn render_template(req: &RenderRequest) -> String {
    let Palette {
        background,
        primary,
        secondary,
    } = req.style.palette();
    let scene = req.scene_name();
    let title = py_str(req.topic.as_deref().unwrap_or("Animo"));
    let subtitle = py_str(&subtitle(req));
    let body = body_block(req, primary, secondary);
    let closing = py_str(CLOSING_TEXT);

    format!(
        r#"from manim import *


class {scene}(Scene):
    def construct(self):
        self.camera.background_color = "{background}"

        title = Text({title}, font_size=48, color="{primary}")
        subtitle = Text({subtitle}, font_size=24, color="{secondary}")
        title.to_edge(UP, buff=1)
        subtitle.next_to(title, DOWN, buff=0.5)

        self.play(Write(title))
        self.play(FadeIn(subtitle))
        self.wait(2)

{body}
        thanks = Text({closing}, font_size=36, color="{primary}")
        self.play(FadeOut(title), FadeOut(subtitle))
        self.play(Write(thanks))
        self.wait(2)
"#
    )
}

fn subtitle(req: &RenderRequest) -> String {
    match (req.grade, req.course.as_deref()) {
        (Some(grade), Some(course)) => format!("{grade}. Sınıf - {course}"),
        (None, Some(course)) => course.to_owned(),
        _ => req.kind.to_string(),
    }
}

fn body_block(req: &RenderRequest, primary: &str, secondary: &str) -> String {
    let text = req.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let (constructor, color) = match (req.kind, text) {
        (SceneKind::Equation, Some(tex)) => (format!("MathTex({}, font_size=48", py_str(tex)), primary),
        (_, Some(text)) => (
            format!("Text({}, font_size=28, line_spacing=1.2", py_str(&wrap(text, WRAP_WIDTH))),
            secondary,
        ),
        (_, None) => (
            format!("MathTex({}, font_size=48", py_str(DEFAULT_EQUATION)),
            primary,
        ),
    };
    format!(
        "        body = {constructor}, color=\"{color}\")\n\
         \x20       body.next_to(subtitle, DOWN, buff=1)\n\
         \x20       self.play(Write(body))\n\
         \x20       self.wait(3)\n\
         \x20       self.play(FadeOut(body))\n"
    )
}

/// Greedy word wrap; words longer than `width` stay on their own line.
fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Quote `s` as a double-quoted Python string literal.
fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
