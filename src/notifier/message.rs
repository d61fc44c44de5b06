// file: src/notifier/message.rs
// description: rendering of ranked items into channel message bodies

use crate::models::Item;
use chrono::{DateTime, Local};
use std::fmt::Write;

pub const REPORT_TITLE: &str = "TrendHub 热点监控报告";

fn rank_of(item: &Item) -> u32 {
    item.best_rank().unwrap_or(0)
}

/// Calls `header` whenever the source changes between consecutive items,
/// then `line` for the item itself.
fn grouped_lines(
    out: &mut String,
    items: &[Item],
    mut header: impl FnMut(&mut String, &str),
    mut line: impl FnMut(&mut String, &Item),
) {
    let mut current: Option<&str> = None;
    for item in items {
        if current != Some(item.source_name.as_str()) {
            header(out, &item.source_name);
            current = Some(item.source_name.as_str());
        }
        line(out, item);
    }
}

/// Plain text used by Feishu and WPS.
pub fn plain_text(items: &[Item], now: DateTime<Local>) -> String {
    let mut out = format!("{} ({})\n\n", REPORT_TITLE, now.format("%Y-%m-%d %H:%M"));
    grouped_lines(
        &mut out,
        items,
        |out, source| {
            let _ = writeln!(out, "\n【{}】", source);
        },
        |out, item| {
            let _ = writeln!(out, "{}. {}", rank_of(item), item.title);
            if !item.url.is_empty() {
                let _ = writeln!(out, "   {}", item.url);
            }
        },
    );
    out
}

pub fn markdown(items: &[Item], now: DateTime<Local>) -> String {
    let mut out = format!("# {} ({})\n\n", REPORT_TITLE, now.format("%H:%M"));
    grouped_lines(
        &mut out,
        items,
        |out, source| {
            let _ = writeln!(out, "\n## {}", source);
        },
        |out, item| {
            let title = if item.url.is_empty() {
                item.title.clone()
            } else {
                format!("[{}]({})", item.title, item.url)
            };
            let _ = writeln!(out, "- **{}.** {}", rank_of(item), title);
        },
    );
    out
}

pub fn html(items: &[Item], now: DateTime<Local>) -> String {
    let mut out = format!("<b>{}</b> ({})\n", REPORT_TITLE, now.format("%H:%M"));
    grouped_lines(
        &mut out,
        items,
        |out, source| {
            let _ = writeln!(out, "\n<b>{}</b>", escape_html(source));
        },
        |out, item| {
            let title = escape_html(&item.title);
            if item.url.is_empty() {
                let _ = writeln!(out, "{}. {}", rank_of(item), title);
            } else {
                let _ = writeln!(
                    out,
                    "{}. <a href=\"{}\">{}</a>",
                    rank_of(item),
                    escape_html(&item.url),
                    title
                );
            }
        },
    );
    out
}

/// Short body for push notifications; only the first `limit` items.
pub fn summary(items: &[Item], limit: usize, now: DateTime<Local>) -> String {
    let shown = &items[..items.len().min(limit)];
    let mut out = format!("热点监控 ({})\n", now.format("%H:%M"));
    grouped_lines(
        &mut out,
        shown,
        |out, source| {
            let _ = writeln!(out, "\n【{}】", source);
        },
        |out, item| {
            let _ = writeln!(out, "{}. {}", rank_of(item), item.title);
        },
    );
    if items.len() > limit {
        let _ = write!(out, "\n...还有 {} 条", items.len() - limit);
    }
    out
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
