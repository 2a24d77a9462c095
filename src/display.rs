use crate::filter::NodeId;
use crate::model::{
    COLUMN_HEADERS, CellRole, CellValue, FilterEditModel, KEY_COLUMN, MATCH_TYPE_COLUMN,
    NAME_COLUMN, VALUE_COLUMN,
};
use crate::rows::Row;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use serde_json::{Value, json};
use std::fmt::Write as _;

pub fn create_styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h)));
    table
}

fn cell_text(model: &FilterEditModel, node: NodeId, column: usize) -> String {
    match model.cell_value(node, column, CellRole::Display) {
        CellValue::Text(text) => text,
        CellValue::MatchType(match_type) => match_type.to_string(),
        _ => String::new(),
    }
}

/// Render the filter tree as an indented grid
pub fn format_tree_text(model: &FilterEditModel) -> String {
    let tree = model.tree();
    let mut out = String::new();

    if !tree.has_filters() {
        let _ = writeln!(out, "Filter tree is empty.");
        return out;
    }

    let mut headers = vec!["On", "Kind"];
    headers.extend(COLUMN_HEADERS);
    let mut table = create_styled_table(&headers);

    for (node, depth) in tree.depth_first() {
        let Some(filter) = tree.node(node) else {
            continue;
        };
        let marker = if filter.enabled() {
            "✓".green().to_string()
        } else {
            "✗".red().to_string()
        };
        let kind = match model.cell_value(node, NAME_COLUMN, CellRole::Decoration) {
            CellValue::Icon(icon) => icon.as_str().to_string(),
            _ => filter.kind().tag().tag_name().to_lowercase(),
        };
        let name = format!("{}{}", "  ".repeat(depth), cell_text(model, node, NAME_COLUMN));
        let name = if filter.is_combinator() {
            name.bold().to_string()
        } else {
            name
        };

        table.add_row(vec![
            Cell::new(marker),
            Cell::new(kind),
            Cell::new(name),
            Cell::new(cell_text(model, node, MATCH_TYPE_COLUMN)),
            Cell::new(cell_text(model, node, KEY_COLUMN)),
            Cell::new(cell_text(model, node, VALUE_COLUMN)),
        ]);
    }

    let _ = writeln!(out, "{table}");
    out
}

fn node_to_json(model: &FilterEditModel, node: NodeId) -> Value {
    let tree = model.tree();
    let Some(filter) = tree.node(node) else {
        return Value::Null;
    };

    let mut object = json!({
        "kind": filter.kind().tag().tag_name(),
        "name": filter.name(),
        "enabled": filter.enabled(),
    });
    if let Some(m) = filter.as_match() {
        object["type"] = json!(m.match_type().as_str());
        object["key"] = json!(m.key());
        object["value"] = json!(m.value());
    }
    if filter.is_combinator() {
        let children: Vec<Value> = filter
            .children()
            .iter()
            .map(|child| node_to_json(model, *child))
            .collect();
        object["children"] = Value::Array(children);
    }
    object
}

pub fn format_tree_json(model: &FilterEditModel) -> String {
    let root = model.tree().root();
    serde_json::to_string_pretty(&json!({ "filters": node_to_json(model, root) }))
        .unwrap_or_else(|_| "{\"error\":\"failed to serialize filter tree\"}".to_string())
}

/// Report of a `check` run
pub fn format_check_text(rows: &[Row], accepted: &[bool], show_rejected: bool) -> String {
    let mut out = String::new();
    let accepted_count = accepted.iter().filter(|a| **a).count();
    let _ = writeln!(
        out,
        "{} of {} row{} accepted",
        accepted_count.to_string().green().bold(),
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    );

    let listed: Vec<(usize, &Row)> = rows
        .iter()
        .zip(accepted)
        .enumerate()
        .filter(|(_, (_, accepted))| **accepted != show_rejected)
        .map(|(index, (row, _))| (index, row))
        .collect();
    if listed.is_empty() {
        return out;
    }

    let _ = writeln!(
        out,
        "\n{}",
        (if show_rejected { "REJECTED" } else { "ACCEPTED" }).bold()
    );
    for (index, row) in listed {
        let fields: Vec<String> = row
            .columns
            .iter()
            .zip(&row.values)
            .map(|(c, v)| format!("{}={}", c.cyan(), v))
            .collect();
        let _ = writeln!(out, "{:>6}: {}", index + 1, fields.join(" "));
    }
    out
}

pub fn format_check_json(rows: &[Row], accepted: &[bool]) -> String {
    let entries: Vec<Value> = rows
        .iter()
        .zip(accepted)
        .enumerate()
        .map(|(index, (row, accepted))| {
            let fields: serde_json::Map<String, Value> = row
                .columns
                .iter()
                .cloned()
                .zip(row.values.iter().cloned().map(Value::String))
                .collect();
            json!({
                "row": index + 1,
                "accepted": accepted,
                "fields": fields,
            })
        })
        .collect();

    serde_json::to_string_pretty(&json!({
        "check": {
            "total": rows.len(),
            "accepted": accepted.iter().filter(|a| **a).count(),
            "rows": entries,
        }
    }))
    .unwrap_or_else(|_| "{\"check\":{\"error\":\"failed to serialize results\"}}".to_string())
}
