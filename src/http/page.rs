// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Grid page rendering.
//!
//! The page is one table of clickable cells. Clicking a cell cycles it through
//! "O", "X", and blank. The clear button blanks every cell locally, and the
//! submit button posts the whole grid to "/submit".

use crate::grid::{CellState, Grid};

use std::fmt::Write;

const STYLE: &str = r#"
    body { font-family: sans-serif; margin: 20px; }
    .date-header { font-family: 'FangSong', sans-serif; font-size: 28px; margin-bottom: 5px; }
    table { border-collapse: collapse; width: 100%; text-align: center; margin-bottom: 1em; }
    th, td { border: 1px solid #000; padding: 0; font-size: 16px; height: 35px; }
    th { background-color: #f2f2f2; padding: 10px; }
    .day-header { background-color: #f9f9f9; font-weight: bold; padding: 10px; }
    td.selectable { cursor: pointer; min-width: 50px; line-height: 35px; user-select: none; font-weight: bold; font-size: 18px; }
    td.selectable:hover { background-color: #eef; }
    td.selectable.is-o { color: green; }
    td.selectable.is-x { color: red; }
    .button-container { display: flex; justify-content: space-between; margin-top: 15px; }
    button { padding: 10px 15px; font-size: 16px; cursor: pointer; border: none; border-radius: 4px; min-width: 150px; color: white; }
    #submitBtn { background-color: #4CAF50; }
    #clearAllBtn { background-color: #FF0000; font-weight: bold; }
    #status-message { margin-top: 20px; padding: 10px; border-radius: 4px; display: none; }
    .success { background-color: #dff0d8; color: #3c763d; border: 1px solid #d6e9c6; }
    .error { background-color: #f2dede; color: #a94442; border: 1px solid #ebccd1; }
"#;

const SCRIPT: &str = r#"
    const CLASS = { "": "selectable is-blank", "O": "selectable is-o", "X": "selectable is-x" };

    function paint(cell, value) {
        cell.dataset.value = value;
        cell.textContent = value === "" ? " " : value;
        cell.className = CLASS[value];
    }

    function flash(kind, text) {
        const status = document.getElementById("status-message");
        status.style.display = "block";
        status.className = kind;
        status.textContent = text;
    }

    document.querySelectorAll("td.selectable").forEach(cell => {
        cell.addEventListener("click", () => paint(cell, NEXT[cell.dataset.value] ?? "O"));
    });

    function clearAllData() {
        document.querySelectorAll("td.selectable").forEach(cell => paint(cell, ""));
        flash("success", "✅ 已清除所有 O 和 X，請點擊「提交資料」以保存變更。");
        setTimeout(() => { document.getElementById("status-message").style.display = "none"; }, 3000);
    }

    async function submitData() {
        const button = document.getElementById("submitBtn");
        button.disabled = true;
        button.textContent = "處理中...";

        const data = {};
        document.querySelectorAll("td.selectable").forEach(cell => {
            data[cell.dataset.day] ??= {};
            data[cell.dataset.day][cell.dataset.name] = cell.dataset.value;
        });

        try {
            const response = await fetch("/submit", {
                method: "POST",
                headers: { "Content-Type": "application/json" },
                body: JSON.stringify(data),
            });
            const result = await response.json();
            flash(result.success ? "success" : "error", (result.success ? "✅ " : "❌ ") + result.message);
        } catch (error) {
            flash("error", "❌ 發生網路錯誤: " + error);
        } finally {
            button.disabled = false;
            button.textContent = "提交資料並更新 GitHub";
        }
    }
"#;

/// Render full grid page.
///
/// The date header is passed in already formatted, e.g., "2025 年 03 月份".
pub fn render(grid: &Grid, date_header: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"zh-TW\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str("<title>互動排程表格</title>\n<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n");

    let _ = writeln!(html, "<div class=\"date-header\">{}</div>", escape(date_header));
    html.push_str("<h1>互動排程表格</h1>\n");
    html.push_str("<p>請直接點擊下方表格中的格子，即可輪流切換 \"O\" (綠色)、\"X\" (紅色) 或空白。</p>\n");
    html.push_str("<div id=\"status-message\"></div>\n");

    html.push_str("<table>\n<thead>\n<tr><th></th>");
    for person in grid.layout().people() {
        let _ = write!(html, "<th>{}</th>", escape(person));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for (day, cells) in grid.rows() {
        let _ = write!(html, "<tr><td class=\"day-header\">{}</td>", escape(day));
        for (person, state) in grid.layout().people().iter().zip(cells) {
            let _ = write!(
                html,
                "<td class=\"{}\" data-day=\"{}\" data-name=\"{}\" data-value=\"{}\">{}</td>",
                cell_class(*state),
                escape(day),
                escape(person),
                state.as_str(),
                cell_text(*state),
            );
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");

    html.push_str("<div class=\"button-container\">\n");
    html.push_str("<button type=\"button\" id=\"submitBtn\" onclick=\"submitData()\">提交資料並更新 GitHub</button>\n");
    html.push_str("<button type=\"button\" id=\"clearAllBtn\" onclick=\"clearAllData()\">全部清除</button>\n");
    html.push_str("</div>\n<script>\n");
    html.push_str(&click_cycle());
    html.push_str(SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");

    html
}

fn cell_class(state: CellState) -> &'static str {
    match state {
        CellState::Present => "selectable is-o",
        CellState::Absent => "selectable is-x",
        CellState::Unset => "selectable is-blank",
    }
}

fn cell_text(state: CellState) -> &'static str {
    if state.is_unset() {
        "&nbsp;"
    } else {
        state.as_str()
    }
}

// INVARIANT: Page cycles cells exactly like CellState::next.
fn click_cycle() -> String {
    let entries = [CellState::Unset, CellState::Present, CellState::Absent]
        .iter()
        .map(|state| format!("\"{}\": \"{}\"", state.as_str(), state.next().as_str()))
        .collect::<Vec<_>>();
    format!("    const NEXT = {{ {} }};\n", entries.join(", "))
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
